const UNITS: [(&str, u64); 4] = [
    ("GB", 1024 * 1024 * 1024),
    ("MB", 1024 * 1024),
    ("KB", 1024),
    ("B", 1),
];

/// Parse `1500`, `500KB`, `1.5 MB` and the like into bytes (binary multiples).
pub fn parse_size(input: &str) -> Result<u64, String> {
    let trimmed = input.trim();
    let upper = trimmed.to_ascii_uppercase();
    let (number, multiplier) = UNITS
        .iter()
        .find_map(|(suffix, mult)| upper.strip_suffix(suffix).map(|n| (n.trim(), *mult)))
        .unwrap_or((upper.as_str(), 1));

    let value: f64 = number
        .parse()
        .map_err(|_| format!("invalid size '{}': expected e.g. 800KB or 2MB", trimmed))?;
    if !value.is_finite() || value <= 0.0 {
        return Err(format!("size must be positive, got '{}'", trimmed));
    }
    Ok((value * multiplier as f64).round() as u64)
}
