//! Human-readable rendering of second counts for player-facing messages.

const MINUTE: u64 = 60;
const HOUR: u64 = 60 * MINUTE;
const YEAR: u64 = 365 * 24 * HOUR;

/// Break `total_secs` into years, hours, minutes and seconds.
///
/// Days are folded into hours (a year is 365 days), e.g. `3661` renders as
/// `"0y 1h 1m 1s"` and two days as `"0y 48h 0m 0s"`.
pub fn format_duration(total_secs: u64) -> String {
    let years = total_secs / YEAR;
    let rest = total_secs % YEAR;
    let hours = rest / HOUR;
    let rest = rest % HOUR;
    let minutes = rest / MINUTE;
    let seconds = rest % MINUTE;
    format!("{years}y {hours}h {minutes}m {seconds}s")
}
