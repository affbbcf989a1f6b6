/// Format a key-value pair for display.
pub fn kv(key: &str, value: &str) -> String {
    format!("{key:>12}: {value}")
}

/// One row of an asset listing.
pub fn asset_row(kind: &str, id: &str, size: &str, name: &str) -> String {
    format!("{kind:<8} {id:<38} {size:>10}  {name}")
}

/// Show only the first characters of a secret.
pub fn mask(secret: &str) -> String {
    match secret.get(..8) {
        Some(head) if secret.len() > 12 => format!("{head}..."),
        _ => "***".to_string(),
    }
}
