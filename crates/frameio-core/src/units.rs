const LABELS: [&str; 5] = ["B", "KB", "MB", "GB", "TB"];

/// Human readable byte count, e.g. `1.5 MB`.
pub fn format_size(bytes: u64) -> String {
    let mut value = bytes as f64;
    let mut n = 0;
    while value > 1024.0 && n < LABELS.len() - 1 {
        value /= 1024.0;
        n += 1;
    }
    let rounded = (value * 100.0).round() / 100.0;
    format!("{} {}", rounded, LABELS[n])
}

/// Human readable throughput, e.g. `12.3 MB/s`.
pub fn format_speed(bytes_per_second: f64) -> String {
    format!("{}/s", format_size(bytes_per_second.max(0.0) as u64))
}
