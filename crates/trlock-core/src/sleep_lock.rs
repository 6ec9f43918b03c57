//! `XSS_SLEEP_LOCK_FD` handshake
//!
//! xss-lock can hold off suspend until the locker is up. It passes a file
//! descriptor in `XSS_SLEEP_LOCK_FD`; closing it signals that the screen is
//! locked. A bad value must never stop the lock from running.

use std::os::unix::io::RawFd;

use tracing::debug;

/// Environment variable carrying the descriptor number
pub const SLEEP_LOCK_FD_VAR: &str = "XSS_SLEEP_LOCK_FD";

/// What happened to the sleep-lock descriptor
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum SleepLockRelease {
    /// Variable not set
    Absent,
    /// Descriptor closed
    Closed(RawFd),
    /// Value was not a descriptor number, or close failed
    Ignored,
}

/// Close the descriptor named by `value`, ignoring anything invalid
pub fn release(value: Option<&str>) -> SleepLockRelease {
    let Some(value) = value else {
        return SleepLockRelease::Absent;
    };

    let fd: RawFd = match value.trim().parse() {
        Ok(fd) => fd,
        Err(_) => {
            debug!("{} is not a descriptor number, ignoring", SLEEP_LOCK_FD_VAR);
            return SleepLockRelease::Ignored;
        }
    };

    match nix::unistd::close(fd) {
        Ok(()) => SleepLockRelease::Closed(fd),
        Err(e) => {
            debug!("Could not close {}={}: {}", SLEEP_LOCK_FD_VAR, fd, e);
            SleepLockRelease::Ignored
        }
    }
}

/// Release the descriptor named by the process environment
pub fn release_from_env() -> SleepLockRelease {
    let value = std::env::var(SLEEP_LOCK_FD_VAR).ok();
    release(value.as_deref())
}
