use std::time::Duration;

/// One rounded component in `us`, `ms` or `s`, short enough for progress lines.
pub(crate) fn format_duration(d: Duration) -> String {
    const NS_PER_US: u128 = 1_000;
    const NS_PER_MS: u128 = 1_000_000;
    const NS_PER_S: u128 = 1_000_000_000;

    // Ties round up.
    fn round_div(value: u128, unit: u128) -> u128 {
        (value + (unit / 2)) / unit
    }

    let total_ns = d.as_nanos();
    if total_ns >= NS_PER_S {
        return format!("{}s", round_div(total_ns, NS_PER_S));
    }
    if total_ns >= NS_PER_MS {
        return format!("{}ms", round_div(total_ns, NS_PER_MS));
    }
    format!("{}us", round_div(total_ns, NS_PER_US))
}

/// Milliseconds from a histogram summary; `-` when nothing was recorded.
pub(crate) fn format_ms_opt(ms: Option<f64>) -> String {
    match ms {
        Some(ms) if ms.is_finite() && ms >= 0.0 => {
            if ms >= 1000.0 {
                format!("{:.2}s", ms / 1000.0)
            } else if ms >= 1.0 {
                format!("{ms:.2}ms")
            } else {
                format!("{:.0}us", ms * 1000.0)
            }
        }
        _ => "-".to_string(),
    }
}

pub(crate) fn format_rate(v: f64) -> String {
    if v.is_finite() {
        format!("{v:.0}")
    } else {
        "0".to_string()
    }
}

pub(crate) fn format_percent(ratio: f64) -> String {
    if ratio.is_finite() {
        format!("{:.2}%", ratio * 100.0)
    } else {
        "0.00%".to_string()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn durations_use_a_single_rounded_unit() {
        assert_eq!(format_duration(Duration::from_millis(1500)), "2s");
        assert_eq!(format_duration(Duration::from_micros(2_400)), "2ms");
        assert_eq!(format_duration(Duration::from_nanos(1_600)), "2us");
    }

    #[test]
    fn milliseconds_pick_a_readable_unit() {
        assert_eq!(format_ms_opt(None), "-");
        assert_eq!(format_ms_opt(Some(0.25)), "250us");
        assert_eq!(format_ms_opt(Some(12.3456)), "12.35ms");
        assert_eq!(format_ms_opt(Some(2500.0)), "2.50s");
    }

    #[test]
    fn rates_and_percentages() {
        assert_eq!(format_rate(12.6), "13");
        assert_eq!(format_rate(f64::NAN), "0");
        assert_eq!(format_percent(0.125), "12.50%");
    }
}
