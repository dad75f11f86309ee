//! Time formatting helpers.

/// Format a voting-window countdown for display.
///
/// The window is short-lived (minutes to hours), so the format stops at
/// hours rather than days.
pub fn format_remaining(secs: u64) -> String {
    if secs == 0 {
        "closed".to_string()
    } else if secs < 60 {
        format!("{}s", secs)
    } else if secs < 3600 {
        format!("{}m {:02}s", secs / 60, secs % 60)
    } else {
        format!("{}h {:02}m", secs / 3600, (secs % 3600) / 60)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn formats_each_magnitude() {
        assert_eq!(format_remaining(0), "closed");
        assert_eq!(format_remaining(45), "45s");
        assert_eq!(format_remaining(192), "3m 12s");
        assert_eq!(format_remaining(3720), "1h 02m");
    }
}
