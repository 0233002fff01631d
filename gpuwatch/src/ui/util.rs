//! Small UI helpers: human-readable sizes, unknown-aware number formatting.

/// Format a megabyte count, e.g. 40960 -> "40.0G".
pub fn human_mb(mb: f64) -> String {
    const K: f64 = 1024.0;
    if mb < K {
        return format!("{mb:.0}M");
    }
    let gb = mb / K;
    if gb < K {
        return format!("{gb:.1}G");
    }
    format!("{:.2}T", gb / K)
}

/// "N/A" for unknown, otherwise the value with its unit.
pub fn fmt_opt(v: Option<f64>, unit: &str) -> String {
    match v {
        Some(x) if x.fract() == 0.0 => format!("{x:.0}{unit}"),
        Some(x) => format!("{x:.1}{unit}"),
        None => "N/A".into(),
    }
}

pub fn truncate_middle(s: &str, max: usize) -> String {
    let chars: Vec<char> = s.chars().collect();
    if chars.len() <= max {
        return s.to_string();
    }
    if max <= 3 {
        return "...".into();
    }
    let keep = max - 3;
    let left = keep / 2;
    let right = keep - left;
    let head: String = chars[..left].iter().collect();
    let tail: String = chars[chars.len() - right..].iter().collect();
    format!("{head}...{tail}")
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn formats_sizes_and_unknowns() {
        assert_eq!(human_mb(512.0), "512M");
        assert_eq!(human_mb(40960.0), "40.0G");
        assert_eq!(fmt_opt(None, "%"), "N/A");
        assert_eq!(fmt_opt(Some(0.0), "%"), "0%");
        assert_eq!(fmt_opt(Some(61.27), "°C"), "61.3°C");
    }

    #[test]
    fn truncates_long_names() {
        assert_eq!(truncate_middle("NVIDIA A100-SXM4-80GB", 12), "NVID...-80GB");
        assert_eq!(truncate_middle("A100", 12), "A100");
    }
}
