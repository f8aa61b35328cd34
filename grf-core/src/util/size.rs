const UNITS: [&str; 3] = ["kiB", "MiB", "GiB"];

/// Human-readable byte count. A unit is used once the value exceeds 1.4 of
/// it, so 1400 bytes stay in bytes and 1500 become `1.5 kiB`.
pub fn format_size(bytes: u64) -> String {
    let mut unit = None;
    let mut scale = 1u64;
    for (i, _) in UNITS.iter().enumerate() {
        let next = 1u64 << (10 * (i + 1));
        if bytes as f64 > next as f64 * 1.4 {
            unit = Some(i);
            scale = next;
        }
    }
    match unit {
        None => format!("{bytes} B"),
        Some(i) => format!("{:.1} {}", bytes as f64 / scale as f64, UNITS[i]),
    }
}
