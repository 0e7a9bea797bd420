//! Time Provider Abstraction
//!
//! Services take timestamps (creation, modification, reorder base) from a
//! `TimeProvider` so tests can pin the clock instead of sleeping.
//!
//! All persisted timestamps have millisecond precision; `truncate_to_millis`
//! is applied wherever a `DateTime` is produced so that a node read back from
//! the store compares equal to the node that was written.
//!
//! # Examples
//!
//! ```rust
//! use rubix_core::models::time::{TimeProvider, SystemTimeProvider};
//! use chrono::Utc;
//!
//! let provider = SystemTimeProvider;
//! let now = provider.now();
//! assert!(now <= Utc::now());
//! assert_eq!(now.timestamp_subsec_nanos() % 1_000_000, 0);
//! ```

use chrono::{DateTime, Utc};

/// Trait for providing current time
pub trait TimeProvider: Send + Sync {
    /// Get the current UTC time, truncated to milliseconds
    fn now(&self) -> DateTime<Utc>;

    /// Current time as epoch milliseconds
    fn now_millis(&self) -> i64 {
        self.now().timestamp_millis()
    }
}

/// System time provider using actual system clock
#[derive(Debug, Clone, Copy, Default)]
pub struct SystemTimeProvider;

impl TimeProvider for SystemTimeProvider {
    fn now(&self) -> DateTime<Utc> {
        truncate_to_millis(Utc::now())
    }
}

/// Drop sub-millisecond precision
pub fn truncate_to_millis(time: DateTime<Utc>) -> DateTime<Utc> {
    from_millis(time.timestamp_millis())
}

/// Convert epoch milliseconds (the storage format) back to a `DateTime`.
///
/// Out-of-range values clamp to the Unix epoch.
pub fn from_millis(millis: i64) -> DateTime<Utc> {
    DateTime::from_timestamp_millis(millis).unwrap_or(DateTime::UNIX_EPOCH)
}

/// Mock time provider for testing
///
/// Uses interior mutability so a single instance can be shared behind an
/// `Arc<dyn TimeProvider>` and still be advanced by the test.
#[cfg(test)]
#[derive(Debug)]
pub struct MockTimeProvider {
    current_time: std::sync::Mutex<DateTime<Utc>>,
}

#[cfg(test)]
impl MockTimeProvider {
    /// Create a new mock time provider starting at the current time
    pub fn new() -> Self {
        Self::with_time(Utc::now())
    }

    /// Create a mock time provider with a specific starting time
    pub fn with_time(time: DateTime<Utc>) -> Self {
        Self {
            current_time: std::sync::Mutex::new(truncate_to_millis(time)),
        }
    }

    /// Create a mock time provider at the given epoch milliseconds
    pub fn at_millis(millis: i64) -> Self {
        Self::with_time(from_millis(millis))
    }

    /// Set the current time to a specific value
    pub fn set_time(&self, time: DateTime<Utc>) {
        *self.current_time.lock().unwrap() = truncate_to_millis(time);
    }

    /// Advance time by the given duration
    pub fn advance(&self, duration: chrono::Duration) {
        *self.current_time.lock().unwrap() += duration;
    }
}

#[cfg(test)]
impl TimeProvider for MockTimeProvider {
    fn now(&self) -> DateTime<Utc> {
        *self.current_time.lock().unwrap()
    }
}

#[cfg(test)]
impl Default for MockTimeProvider {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Duration;

    #[test]
    fn test_system_time_provider() {
        let provider = SystemTimeProvider;
        let now1 = provider.now();
        let now2 = Utc::now();

        // Should be very close (within 1 second)
        assert!((now2 - now1).num_milliseconds().abs() < 1000);
        assert_eq!(now1.timestamp_subsec_nanos() % 1_000_000, 0);
    }

    #[test]
    fn test_from_millis_round_trip() {
        let time = from_millis(1_700_000_000_123);
        assert_eq!(time.timestamp_millis(), 1_700_000_000_123);
        assert_eq!(truncate_to_millis(time), time);
    }

    #[test]
    fn test_mock_time_provider_with_time() {
        let provider = MockTimeProvider::at_millis(5_000);
        assert_eq!(provider.now_millis(), 5_000);
    }

    #[test]
    fn test_mock_time_provider_set_time() {
        let provider = MockTimeProvider::new();
        let new_time = truncate_to_millis(Utc::now() + Duration::hours(3));

        provider.set_time(new_time);

        assert_eq!(provider.now(), new_time);
    }

    #[test]
    fn test_mock_time_provider_advance_through_shared_ref() {
        let provider = std::sync::Arc::new(MockTimeProvider::at_millis(0));
        let shared: std::sync::Arc<dyn TimeProvider> = provider.clone();

        provider.advance(Duration::seconds(2));

        assert_eq!(shared.now_millis(), 2_000);
    }
}
