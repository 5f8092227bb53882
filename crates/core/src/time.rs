use std::time::Duration;

use crate::error::{Result, TracelensError};

/// Human-readable duration for report tables: "123.45 ms", "2.34 s", "1m 30.50s".
pub fn format_ms(ms: f64) -> String {
    if ms < 1000.0 {
        format!("{ms:.2} ms")
    } else if ms < 60_000.0 {
        format!("{:.2} s", ms / 1000.0)
    } else {
        let minutes = (ms / 60_000.0) as u64;
        let seconds = (ms % 60_000.0) / 1000.0;
        format!("{minutes}m {seconds:.2}s")
    }
}

pub fn nanos_to_ms(nanos: u64) -> f64 {
    nanos as f64 / 1_000_000.0
}

pub fn parse_duration_str(input: &str) -> Result<Duration> {
    humantime::parse_duration(input)
        .map_err(|e| TracelensError::Parse(format!("invalid duration {input}: {e}")))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn formats_millis_seconds_minutes() {
        assert_eq!(format_ms(123.451), "123.45 ms");
        assert_eq!(format_ms(2_340.0), "2.34 s");
        assert_eq!(format_ms(90_500.0), "1m 30.50s");
    }

    #[test]
    fn converts_nanos() {
        assert_eq!(nanos_to_ms(1_500_000), 1.5);
    }

    #[test]
    fn parses_duration() {
        assert_eq!(parse_duration_str("30d").unwrap(), Duration::from_secs(30 * 86_400));
        assert!(parse_duration_str("later").is_err());
    }
}
