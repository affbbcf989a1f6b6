const VALID_PUNCTUATION: &str = "-_.() ";

/// Replace every character that is not alphanumeric or in `-_.() ` with `_`.
pub fn normalize_filename(name: &str) -> String {
    name.chars()
        .map(|c| {
            if c.is_alphanumeric() || VALID_PUNCTUATION.contains(c) {
                c
            } else {
                '_'
            }
        })
        .collect()
}

/// Local file name for an asset: optional prefix followed by the normalized name.
pub fn local_filename(name: &str, prefix: Option<&str>) -> String {
    let normalized = normalize_filename(name);
    match prefix {
        Some(prefix) => format!("{prefix}{normalized}"),
        None => normalized,
    }
}
