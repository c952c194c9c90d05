// Time Provider Port (for testability)

use chrono::{Local, TimeZone};

/// Time provider interface (allows mocking in tests)
pub trait TimeProvider: Send + Sync {
    /// Get current time in milliseconds since epoch
    fn now_millis(&self) -> i64;

    /// Local `YYYYmmdd-HHMMSS` stamp used in job script names
    fn stamp(&self) -> String {
        Local
            .timestamp_millis_opt(self.now_millis())
            .single()
            .map(|t| t.format("%Y%m%d-%H%M%S").to_string())
            .unwrap_or_else(|| self.now_millis().to_string())
    }
}

/// System time provider (production)
pub struct SystemTimeProvider;

impl TimeProvider for SystemTimeProvider {
    fn now_millis(&self) -> i64 {
        chrono::Utc::now().timestamp_millis()
    }
}

/// Frozen clock (tests)
pub struct FixedTimeProvider {
    pub millis: i64,
    pub stamp: String,
}

impl FixedTimeProvider {
    pub fn new(millis: i64, stamp: impl Into<String>) -> Self {
        Self {
            millis,
            stamp: stamp.into(),
        }
    }
}

impl TimeProvider for FixedTimeProvider {
    fn now_millis(&self) -> i64 {
        self.millis
    }

    fn stamp(&self) -> String {
        self.stamp.clone()
    }
}
