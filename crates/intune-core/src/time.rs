//! UTC timestamps without a calendar dependency.
//!
//! Stored as Unix seconds; rendered as ISO-8601 via Howard Hinnant's
//! civil_from_days.

use std::fmt;
use std::time::{SystemTime, UNIX_EPOCH};

use serde::{Deserialize, Serialize};

/// Seconds since the Unix epoch, UTC.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct Timestamp(pub u64);

impl Timestamp {
    pub fn now() -> Self {
        Self(
            SystemTime::now()
                .duration_since(UNIX_EPOCH)
                .unwrap_or_default()
                .as_secs(),
        )
    }

    pub fn as_secs(self) -> u64 {
        self.0
    }

    pub fn to_iso8601(self) -> String {
        let days = (self.0 / 86400) as i64;
        let time_of_day = self.0 % 86400;
        let hours = time_of_day / 3600;
        let minutes = (time_of_day % 3600) / 60;
        let seconds = time_of_day % 60;

        let (y, m, d) = civil_from_days(days);
        format!("{y:04}-{m:02}-{d:02}T{hours:02}:{minutes:02}:{seconds:02}Z")
    }
}

impl fmt::Display for Timestamp {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.to_iso8601())
    }
}

/// Source of "now" for the lifecycle. Injected so tests can pin time.
pub trait Clock {
    fn now(&self) -> Timestamp;
}

/// Wall clock.
#[derive(Debug, Clone, Copy, Default)]
pub struct SystemClock;

impl Clock for SystemClock {
    fn now(&self) -> Timestamp {
        Timestamp::now()
    }
}

/// A clock that always reports the same instant.
#[derive(Debug, Clone, Copy)]
pub struct FixedClock(pub Timestamp);

impl Clock for FixedClock {
    fn now(&self) -> Timestamp {
        self.0
    }
}

fn civil_from_days(days: i64) -> (i64, u64, u64) {
    let z = days + 719468;
    let era = if z >= 0 { z } else { z - 146096 } / 146097;
    let doe = (z - era * 146097) as u64;
    let yoe = (doe - doe / 1460 + doe / 36524 - doe / 146096) / 365;
    let y = yoe as i64 + era * 400;
    let doy = doe - (365 * yoe + yoe / 4 - yoe / 100);
    let mp = (5 * doy + 2) / 153;
    let d = doy - (153 * mp + 2) / 5 + 1;
    let m = if mp < 10 { mp + 3 } else { mp - 9 };
    let y = if m <= 2 { y + 1 } else { y };
    (y, m, d)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_epoch_renders() {
        assert_eq!(Timestamp(0).to_string(), "1970-01-01T00:00:00Z");
    }

    #[test]
    fn test_known_instant() {
        // 2026-02-21T13:45:07Z
        assert_eq!(
            Timestamp(1771632000 + 13 * 3600 + 45 * 60 + 7).to_iso8601(),
            "2026-02-21T13:45:07Z"
        );
    }

    #[test]
    fn test_fixed_clock_is_stable() {
        let clock = FixedClock(Timestamp(42));
        assert_eq!(clock.now(), clock.now());
        assert_eq!(clock.now().as_secs(), 42);
    }

    #[test]
    fn test_system_clock_is_recent() {
        let ts = SystemClock.now().to_iso8601();
        assert!(ts.starts_with("20"), "timestamp should be this century: {ts}");
    }
}
