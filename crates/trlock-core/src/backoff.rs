//! Goodwill-based lockout after failed unlock attempts
//!
//! Every failed attempt imposes a lockout of up to [`TIMEOUT_PER_ATTEMPT`]
//! milliseconds, discounted by a portion of the accumulated goodwill:
//!
//! - goodwill starts at (and is capped by) [`MAX_GOODWILL`]
//! - each failure spends [`GOODWILL_PORTION`] of the current goodwill
//! - time waited past a lockout deadline is credited back as goodwill
//!
//! A user who waits out each lockout is not punished further, while rapid
//! guessing drains goodwill and converges on the full per-attempt penalty.
//! All times are X server timestamps in milliseconds, which wrap every
//! 2^32 ms.

use serde::{Deserialize, Serialize};

/// Base lockout per failed attempt (ms)
pub const TIMEOUT_PER_ATTEMPT: i64 = 30_000;
/// Upper bound on accumulated goodwill (ms)
pub const MAX_GOODWILL: i64 = TIMEOUT_PER_ATTEMPT * 5;
/// Fraction of goodwill spent on each failed attempt
pub const GOODWILL_PORTION: f64 = 0.3;

/// Tunable constants of the backoff algorithm
#[derive(Clone, Copy, Debug, PartialEq, Serialize, Deserialize)]
pub struct BackoffPolicy {
    /// Lockout imposed by a failure with no goodwill left (ms)
    pub timeout_per_attempt: i64,
    /// Goodwill cap and initial value (ms)
    pub max_goodwill: i64,
    /// Portion of goodwill spent per failure, in `[0, 1]`
    pub goodwill_portion: f64,
}

impl Default for BackoffPolicy {
    fn default() -> Self {
        Self {
            timeout_per_attempt: TIMEOUT_PER_ATTEMPT,
            max_goodwill: MAX_GOODWILL,
            goodwill_portion: GOODWILL_PORTION,
        }
    }
}

/// Backoff state: goodwill credit and the current lockout deadline
#[derive(Clone, Debug)]
pub struct Backoff {
    policy: BackoffPolicy,
    goodwill: i64,
    /// Deadline on the wrapping 32-bit event clock, 0 when no lockout is active
    timeout: u32,
}

impl Backoff {
    pub fn new(policy: BackoffPolicy) -> Self {
        Self {
            goodwill: policy.max_goodwill,
            timeout: 0,
            policy,
        }
    }

    /// Record a failed attempt at event time `now`, returning the new deadline
    ///
    /// A deadline that lands exactly on 0 reads as "no lockout", so the next
    /// failure earns no credit for it.
    pub fn on_failed_attempt(&mut self, now: u32) -> u32 {
        if self.timeout != 0 {
            let slack = self.since(self.timeout, now);
            self.goodwill = self
                .goodwill
                .saturating_add(slack)
                .clamp(0, self.policy.max_goodwill);
        }

        let spend = (self.goodwill as f64 * self.policy.goodwill_portion) as i64;
        let spend = spend.clamp(0, self.goodwill);

        let penalty = self.policy.timeout_per_attempt.saturating_sub(spend);
        self.timeout = advance(now, penalty);
        self.goodwill -= spend;

        self.timeout
    }

    /// Whether input at event time `now` falls inside the lockout window
    pub fn is_locked(&self, now: u32) -> bool {
        self.remaining(now) > 0
    }

    /// Milliseconds left in the lockout window at `now`
    pub fn remaining(&self, now: u32) -> i64 {
        if self.timeout == 0 {
            return 0;
        }
        (-self.since(self.timeout, now)).max(0)
    }

    /// Signed time from `deadline` to `now`
    ///
    /// Server timestamps wrap every 2^32 ms. A deadline can be at most one
    /// lockout period ahead of the clock; anything further ahead is a
    /// deadline from before a wrap and lies in the past.
    fn since(&self, deadline: u32, now: u32) -> i64 {
        let ahead = i64::from(deadline.wrapping_sub(now));
        if ahead <= self.policy.timeout_per_attempt.max(0) {
            -ahead
        } else {
            i64::from(now.wrapping_sub(deadline))
        }
    }

    /// Remaining goodwill credit (ms)
    pub fn goodwill(&self) -> i64 {
        self.goodwill
    }

    /// Current lockout deadline, 0 when none is active
    pub fn timeout(&self) -> u32 {
        self.timeout
    }

    pub fn policy(&self) -> &BackoffPolicy {
        &self.policy
    }
}

impl Default for Backoff {
    fn default() -> Self {
        Self::new(BackoffPolicy::default())
    }
}

/// `now + delta` on the wrapping event clock
fn advance(now: u32, delta: i64) -> u32 {
    (i64::from(now) + delta).rem_euclid(1 << 32) as u32
}
