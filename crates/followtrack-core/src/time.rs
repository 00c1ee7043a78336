use std::time::Duration;

/// Whole milliseconds in `d` for log fields, saturating at `u64::MAX`.
#[must_use]
pub fn duration_ms(d: Duration) -> u64 {
    u64::try_from(d.as_millis()).unwrap_or(u64::MAX)
}
