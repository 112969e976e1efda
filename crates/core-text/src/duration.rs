//! Duration formatting.

/// Format a duration in seconds as `"Z.z sec"` below one minute and as
/// `"X min Y sec"` from one minute upwards (seconds truncated).
///
/// Examples: `0.5 -> "0.5 sec"`, `60.0 -> "1 min 0 sec"`, `125.0 -> "2 min 5 sec"`.
pub fn format_duration(seconds: f64) -> String {
    if seconds < 60.0 {
        return format!("{seconds:.1} sec");
    }
    let minutes = (seconds / 60.0).floor() as u64;
    let secs = (seconds % 60.0).floor() as u64;
    format!("{minutes} min {secs} sec")
}

/// Format whole seconds as `H:MM:SS`, prefixed with `N day(s), ` past 24h.
///
/// Fractions are truncated and negative or non-finite input renders as
/// `0:00:00`; progress lines must never show a negative remaining time.
pub fn format_clock(seconds: f64) -> String {
    let total = if seconds.is_finite() && seconds > 0.0 {
        seconds as u64
    } else {
        0
    };
    let days = total / 86_400;
    let rem = total % 86_400;
    let (h, m, s) = (rem / 3600, (rem % 3600) / 60, rem % 60);
    match days {
        0 => format!("{h}:{m:02}:{s:02}"),
        1 => format!("1 day, {h}:{m:02}:{s:02}"),
        n => format!("{n} days, {h}:{m:02}:{s:02}"),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn below_a_minute_keeps_one_decimal() {
        assert_eq!(format_duration(0.5), "0.5 sec");
        assert_eq!(format_duration(1.0), "1.0 sec");
        assert_eq!(format_duration(59.9), "59.9 sec");
        assert_eq!(format_duration(0.0), "0.0 sec");
    }

    #[test]
    fn minutes_truncate_seconds() {
        assert_eq!(format_duration(60.0), "1 min 0 sec");
        assert_eq!(format_duration(61.0), "1 min 1 sec");
        assert_eq!(format_duration(65.5), "1 min 5 sec");
        assert_eq!(format_duration(125.0), "2 min 5 sec");
        assert_eq!(format_duration(3600.0), "60 min 0 sec");
        assert_eq!(format_duration(3665.0), "61 min 5 sec");
    }

    #[test]
    fn clock_matches_hms_layout() {
        assert_eq!(format_clock(0.0), "0:00:00");
        assert_eq!(format_clock(12.9), "0:00:12");
        assert_eq!(format_clock(3665.0), "1:01:05");
        assert_eq!(format_clock(90_061.0), "1 day, 1:01:01");
        assert_eq!(format_clock(2.0 * 86_400.0), "2 days, 0:00:00");
    }

    #[test]
    fn clock_clamps_negative_and_nan() {
        assert_eq!(format_clock(-5.0), "0:00:00");
        assert_eq!(format_clock(f64::NAN), "0:00:00");
    }
}
