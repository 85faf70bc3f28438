use chrono::{DateTime, NaiveDate, Utc};
use std::time::Duration;

/// Wall-clock and monotonic time, injectable so services stay deterministic
/// under test (spec.md §4.B).
pub trait Clock: Send + Sync {
    /// Current wall-clock instant.
    fn now(&self) -> DateTime<Utc>;

    /// Monotonic duration since an arbitrary, process-local epoch. Only
    /// meaningful for measuring elapsed time within a single run; never
    /// compare values across process restarts.
    fn monotonic(&self) -> Duration;

    /// The user's local calendar date, used only for "problems solved
    /// today" aggregations.
    fn today(&self) -> NaiveDate {
        self.now().date_naive()
    }
}

/// Production clock backed by `std`/`chrono`.
#[derive(Debug, Clone, Copy, Default)]
pub struct SystemClock;

impl Clock for SystemClock {
    fn now(&self) -> DateTime<Utc> {
        Utc::now()
    }

    fn monotonic(&self) -> Duration {
        use std::sync::OnceLock;
        use std::time::Instant;
        static START: OnceLock<Instant> = OnceLock::new();
        START.get_or_init(Instant::now).elapsed()
    }
}

/// Deterministic clock for tests: `now()` is fixed unless advanced.
#[derive(Debug, Clone)]
pub struct FixedClock {
    now: std::sync::Arc<std::sync::Mutex<DateTime<Utc>>>,
}

impl FixedClock {
    pub fn new(now: DateTime<Utc>) -> Self {
        Self {
            now: std::sync::Arc::new(std::sync::Mutex::new(now)),
        }
    }

    pub fn advance(&self, delta: chrono::Duration) {
        let mut guard = self.now.lock().unwrap();
        *guard += delta;
    }

    pub fn set(&self, now: DateTime<Utc>) {
        *self.now.lock().unwrap() = now;
    }
}

impl Clock for FixedClock {
    fn now(&self) -> DateTime<Utc> {
        *self.now.lock().unwrap()
    }

    fn monotonic(&self) -> Duration {
        Duration::ZERO
    }
}
