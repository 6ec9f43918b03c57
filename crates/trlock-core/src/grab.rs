//! Exclusive input acquisition
//!
//! Creates the invisible input-only surface, installs the lock cursor and
//! grabs keyboard and pointer. Each grab is retried under a bounded policy
//! because the window manager may still hold a grab from the keystroke that
//! started the locker.

use tracing::{debug, error, info};

use crate::config::LockConfig;
use crate::cursor::CursorDescriptor;
use crate::display::{GrabStatus, LockDisplay};
use crate::error::{DisplayError, LockError, Result};
use crate::retry::{Retry, Sleeper, ThreadSleeper};
use crate::sleep_lock::{self, SleepLockRelease};

/// Proof that keyboard and pointer are grabbed on `surface`
#[derive(Debug)]
pub struct GrabbedInput<S> {
    pub surface: S,
}

/// Acquires exclusive keyboard and pointer input
pub struct InputGrabber<Z = ThreadSleeper> {
    keyboard_retry: Retry,
    pointer_retry: Retry,
    sleep_lock_fd: Option<String>,
    sleeper: Z,
}

impl InputGrabber<ThreadSleeper> {
    pub fn new(config: &LockConfig) -> Self {
        Self::with_sleeper(config, ThreadSleeper)
    }
}

impl<Z: Sleeper> InputGrabber<Z> {
    pub fn with_sleeper(config: &LockConfig, sleeper: Z) -> Self {
        Self {
            keyboard_retry: config.keyboard_retry,
            pointer_retry: config.pointer_retry,
            sleep_lock_fd: None,
            sleeper,
        }
    }

    /// Descriptor to close once the grabs are in place (`XSS_SLEEP_LOCK_FD`)
    pub fn with_sleep_lock(mut self, value: Option<String>) -> Self {
        self.sleep_lock_fd = value;
        self
    }

    pub fn sleeper(&self) -> &Z {
        &self.sleeper
    }

    /// Grab keyboard and pointer
    pub fn acquire<D: LockDisplay>(
        &mut self,
        display: &mut D,
        cursor: &CursorDescriptor,
    ) -> Result<GrabbedInput<D::Surface>> {
        let surface = display
            .create_surface()
            .map_err(LockError::SurfaceCreation)?;

        let background = display
            .alloc_color(cursor.bg_color)
            .map_err(LockError::ColorAllocation)?;
        let foreground = display
            .alloc_color(cursor.fg_color)
            .map_err(LockError::ColorAllocation)?;
        let pointer_shape = display
            .create_cursor(surface, cursor, foreground, background)
            .map_err(LockError::CursorCreation)?;

        // Some window managers refuse grabs on unmapped windows
        display.map_surface(surface)?;

        let attempts = self.keyboard_retry.max_attempts;
        retry_grab(&self.keyboard_retry, &mut self.sleeper, "keyboard", || {
            display.grab_keyboard(surface)
        })
        .ok_or_else(|| {
            error!("Keyboard grab failed {} times", attempts);
            LockError::KeyboardGrab { attempts }
        })?;

        let attempts = self.pointer_retry.max_attempts;
        retry_grab(&self.pointer_retry, &mut self.sleeper, "pointer", || {
            display.grab_pointer(surface, pointer_shape)
        })
        .ok_or_else(|| {
            error!("Pointer grab failed {} times", attempts);
            LockError::PointerGrab { attempts }
        })?;

        display.flush()?;
        info!("Keyboard and pointer grabbed");

        match sleep_lock::release(self.sleep_lock_fd.as_deref()) {
            SleepLockRelease::Closed(fd) => debug!("Released sleep lock fd {}", fd),
            SleepLockRelease::Ignored | SleepLockRelease::Absent => {}
        }

        Ok(GrabbedInput { surface })
    }
}

/// Run one device's grab under `policy`; protocol errors count as failures
fn retry_grab<Z, F>(policy: &Retry, sleeper: &mut Z, device: &str, mut grab: F) -> Option<u32>
where
    Z: Sleeper,
    F: FnMut() -> std::result::Result<GrabStatus, DisplayError>,
{
    policy.run(sleeper, |attempt| match grab() {
        Ok(GrabStatus::Success) => {
            debug!("{} grabbed on attempt {}", device, attempt);
            Some(attempt)
        }
        Ok(status) => {
            debug!("{} grab attempt {} returned {:?}", device, attempt, status);
            None
        }
        Err(e) => {
            debug!("{} grab attempt {} failed: {}", device, attempt, e);
            None
        }
    })
}
