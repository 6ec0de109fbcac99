pub fn format_bytes(bytes: u64) -> String {
    const UNIT: f64 = 1024.0;
    let bytes = bytes as f64;

    if bytes < UNIT {
        return format!("{bytes:.0} B");
    }

    let kb = bytes / UNIT;
    if kb < UNIT {
        return format!("{kb:.1} KiB");
    }

    let mb = kb / UNIT;
    if mb < UNIT {
        return format!("{mb:.1} MiB");
    }

    let gb = mb / UNIT;
    format!("{gb:.1} GiB")
}

pub fn yes_no(value: bool) -> &'static str {
    if value { "yes" } else { "no" }
}

/// Pad `label` so that values line up in a column of `width`
pub fn label_line(label: &str, value: impl std::fmt::Display, width: usize) -> String {
    format!("{label:<width$}: {value}")
}
