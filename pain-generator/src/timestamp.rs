use chrono::{DateTime, Utc};

/// `CreDtTm` layout: UTC, second precision, trailing `Z`
pub const ISO_UTC_FORMAT: &str = "%Y-%m-%dT%H:%M:%SZ";

/// Source of the creation timestamp stamped on each message
pub trait Clock {
    fn now_utc(&self) -> DateTime<Utc>;
}

/// Wall clock
#[derive(Debug, Clone, Copy, Default)]
pub struct SystemClock;

/// Always reports the same instant
#[derive(Debug, Clone, Copy)]
pub struct FixedClock(pub DateTime<Utc>);

impl Clock for SystemClock {
    fn now_utc(&self) -> DateTime<Utc> {
        Utc::now()
    }
}

impl Clock for FixedClock {
    fn now_utc(&self) -> DateTime<Utc> {
        self.0
    }
}

#[must_use]
pub fn format_utc_iso(instant: &DateTime<Utc>) -> String {
    instant.format(ISO_UTC_FORMAT).to_string()
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;

    #[test]
    fn test_format_drops_subseconds() {
        let instant = Utc.with_ymd_and_hms(2024, 1, 15, 10, 30, 0).unwrap()
            + chrono::Duration::milliseconds(999);
        assert_eq!(format_utc_iso(&instant), "2024-01-15T10:30:00Z");
    }

    #[test]
    fn test_system_clock_format_shape() {
        let stamp = format_utc_iso(&SystemClock.now_utc());
        assert_eq!(stamp.len(), 20);
        assert!(stamp.ends_with('Z'));
        assert_eq!(&stamp[10..11], "T");
    }
}
