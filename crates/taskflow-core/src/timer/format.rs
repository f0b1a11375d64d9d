//! Display helpers for the countdown.

/// `MM:SS`, zero padded. Minutes are not wrapped at the hour.
pub fn format_clock(secs: u64) -> String {
    format!("{:02}:{:02}", secs / 60, secs % 60)
}

/// Elapsed share of the phase, 0.0 ..= 100.0.
pub fn progress_pct(remaining_secs: u64, total_secs: u64) -> f64 {
    if total_secs == 0 {
        return 0.0;
    }
    let elapsed = total_secs.saturating_sub(remaining_secs);
    (elapsed as f64 / total_secs as f64 * 100.0).clamp(0.0, 100.0)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn formats_minutes_and_seconds() {
        assert_eq!(format_clock(1500), "25:00");
        assert_eq!(format_clock(65), "01:05");
        assert_eq!(format_clock(0), "00:00");
        assert_eq!(format_clock(90 * 60), "90:00");
    }

    #[test]
    fn progress_is_elapsed_share() {
        assert_eq!(progress_pct(1500, 1500), 0.0);
        assert_eq!(progress_pct(750, 1500), 50.0);
        assert_eq!(progress_pct(0, 1500), 100.0);
        assert_eq!(progress_pct(10, 0), 0.0);
    }
}
