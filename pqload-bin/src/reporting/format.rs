use std::time::Duration;

pub fn fmt_duration(d: &Duration) -> String {
    if d.as_secs() >= 5 {
        format!("{:.3}s", d.as_secs_f64())
    } else {
        format!("{:.3}ms", d.as_secs_f64() * 1000.0)
    }
}

/// Milliseconds with three decimals, as written to the CSV files.
pub fn fmt_millis(d: Duration) -> String {
    format!("{:.3}", d.as_secs_f64() * 1000.0)
}

pub fn fmt_size(s: u64) -> String {
    let magnitudes = &["B", "KB", "MB", "GB"];
    let max_magnitude = magnitudes.len() - 1;
    let mut total = s as f64;
    let mut cur_magnitude = 0;
    while total > 1024.0 && cur_magnitude < max_magnitude {
        total /= 1024.0;
        cur_magnitude += 1;
    }
    if cur_magnitude == 0 {
        format!("{:.0}{}", total, magnitudes[cur_magnitude])
    } else {
        format!("{:.1}{}", total, magnitudes[cur_magnitude])
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn durations() {
        assert_eq!(fmt_duration(&Duration::from_micros(12_345)), "12.345ms");
        assert_eq!(fmt_duration(&Duration::from_millis(7_250)), "7.250s");
        assert_eq!(fmt_millis(Duration::from_micros(1_500)), "1.500");
    }

    #[test]
    fn sizes() {
        assert_eq!(fmt_size(512), "512B");
        assert_eq!(fmt_size(5324), "5.2KB");
        assert_eq!(fmt_size(3 * 1024 * 1024 + 1), "3.0MB");
    }
}
