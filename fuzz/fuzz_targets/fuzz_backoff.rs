#![no_main]

use libfuzzer_sys::fuzz_target;
use trlock_core::backoff::{MAX_GOODWILL, TIMEOUT_PER_ATTEMPT};
use trlock_core::Backoff;

fuzz_target!(|times: Vec<u32>| {
    let mut backoff = Backoff::default();

    for now in times {
        if backoff.is_locked(now) {
            continue;
        }
        backoff.on_failed_attempt(now);

        assert!((0..=MAX_GOODWILL).contains(&backoff.goodwill()));
        assert!(backoff.remaining(now) <= TIMEOUT_PER_ATTEMPT);
    }
});
