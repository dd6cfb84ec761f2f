use std::time::Duration;

/// Durations are stored as whole microseconds; anything that overflows saturates.
pub fn duration_to_micros(d: Duration) -> u64 {
    d.as_secs()
        .saturating_mul(1_000_000)
        .saturating_add(d.subsec_micros().into())
}

pub fn micros_to_duration(v: u64) -> Duration {
    Duration::from_micros(v)
}
