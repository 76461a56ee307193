use std::time::Duration;

/// Renders a single rounded component in one of: us, ms, s.
pub(crate) fn format_duration(d: Duration) -> String {
    const NS_PER_US: u128 = 1_000;
    const NS_PER_MS: u128 = 1_000_000;
    const NS_PER_S: u128 = 1_000_000_000;

    fn round_div(value: u128, unit: u128) -> u128 {
        // Ties round up.
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

/// Latency with millisecond precision below 10s (e.g. `12.34ms`, `1.50s`).
pub(crate) fn format_latency(d: Duration) -> String {
    let us = d.as_micros();
    if us < 1_000 {
        return format!("{us}us");
    }
    if us < 1_000_000 {
        return format!("{:.2}ms", d.as_secs_f64() * 1_000.0);
    }
    format!("{:.2}s", d.as_secs_f64())
}

pub(crate) fn format_rate(v: f64) -> String {
    if v.is_finite() {
        format!("{v:.0}")
    } else {
        "0".to_string()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn durations_use_one_rounded_unit() {
        assert_eq!(format_duration(Duration::from_secs(90)), "90s");
        assert_eq!(format_duration(Duration::from_millis(1_500)), "2s");
        assert_eq!(format_duration(Duration::from_millis(250)), "250ms");
        assert_eq!(format_duration(Duration::from_micros(40)), "40us");
    }

    #[test]
    fn latencies_keep_two_decimals() {
        assert_eq!(format_latency(Duration::from_micros(800)), "800us");
        assert_eq!(format_latency(Duration::from_micros(12_346)), "12.35ms");
        assert_eq!(format_latency(Duration::from_millis(1_500)), "1.50s");
    }

    #[test]
    fn rates_are_whole_numbers() {
        assert_eq!(format_rate(49.6), "50");
        assert_eq!(format_rate(f64::NAN), "0");
    }
}
