//! Byte totals as MB / GB.

const BYTES_PER_MB: f64 = 1024.0 * 1024.0;
/// Megabyte count at which the report switches to gigabytes.
pub const GB_THRESHOLD_MB: f64 = 1024.0;

/// Format a byte count with two decimals, in MB below 1024 MB and in GB above.
pub fn format_size(bytes: u64) -> String {
    let mb = bytes as f64 / BYTES_PER_MB;
    if mb >= GB_THRESHOLD_MB {
        format!("{:.2} GB", mb / 1024.0)
    } else {
        format!("{mb:.2} MB")
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn megabytes_below_threshold() {
        assert_eq!(format_size(0), "0.00 MB");
        assert_eq!(format_size(1024 * 1024), "1.00 MB");
        assert_eq!(format_size(1023 * 1024 * 1024), "1023.00 MB");
    }

    #[test]
    fn gigabytes_from_threshold() {
        assert_eq!(format_size(1024 * 1024 * 1024), "1.00 GB");
        assert_eq!(format_size(3 * 512 * 1024 * 1024), "1.50 GB");
    }
}
