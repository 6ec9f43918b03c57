//! Bounded fixed-delay retry
//!
//! Window managers often still hold a grab while the keystroke that launched
//! the locker is being processed. Those grabs go away within about a second,
//! so grabs are retried a fixed number of times with a short sleep between
//! attempts instead of waiting indefinitely.

use std::time::Duration;

use serde::{Deserialize, Serialize};

/// Default number of attempts per device
pub const DEFAULT_ATTEMPTS: u32 = 100;
/// Default delay between attempts
pub const DEFAULT_DELAY: Duration = Duration::from_millis(10);

/// Source of delays between attempts
pub trait Sleeper {
    fn sleep(&mut self, duration: Duration);
}

/// Sleeps the current thread
#[derive(Clone, Copy, Debug, Default)]
pub struct ThreadSleeper;

impl Sleeper for ThreadSleeper {
    fn sleep(&mut self, duration: Duration) {
        std::thread::sleep(duration);
    }
}

/// Retry policy: at most `max_attempts` calls, `delay` apart
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct Retry {
    pub max_attempts: u32,
    #[serde(with = "millis")]
    pub delay: Duration,
}

impl Default for Retry {
    fn default() -> Self {
        Self {
            max_attempts: DEFAULT_ATTEMPTS,
            delay: DEFAULT_DELAY,
        }
    }
}

impl Retry {
    pub fn new(max_attempts: u32, delay: Duration) -> Self {
        Self {
            max_attempts,
            delay,
        }
    }

    /// Call `attempt` until it yields `Some`, sleeping between failures
    ///
    /// `attempt` receives the 1-based attempt number. Returns `None` once
    /// `max_attempts` calls have failed. No sleep follows the final attempt.
    pub fn run<T, S, F>(&self, sleeper: &mut S, mut attempt: F) -> Option<T>
    where
        S: Sleeper + ?Sized,
        F: FnMut(u32) -> Option<T>,
    {
        for n in 1..=self.max_attempts {
            if let Some(value) = attempt(n) {
                return Some(value);
            }
            if n < self.max_attempts {
                sleeper.sleep(self.delay);
            }
        }
        None
    }
}

mod millis {
    use serde::{Deserialize, Deserializer, Serializer};
    use std::time::Duration;

    pub fn serialize<S>(duration: &Duration, serializer: S) -> Result<S::Ok, S::Error>
    where
        S: Serializer,
    {
        serializer.serialize_u64(duration.as_millis() as u64)
    }

    pub fn deserialize<'de, D>(deserializer: D) -> Result<Duration, D::Error>
    where
        D: Deserializer<'de>,
    {
        u64::deserialize(deserializer).map(Duration::from_millis)
    }
}
