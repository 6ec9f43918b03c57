//! Refuse to lock a session whose input we cannot actually own
//!
//! Under a Wayland compositor an X client only sees the XWayland server, so
//! an X grab leaves native Wayland clients free to receive input while the
//! screen looks locked. Any hint of Wayland is treated as fatal.

use std::collections::HashMap;
use std::ffi::{OsStr, OsString};
use std::os::unix::net::UnixStream;
use std::path::{Path, PathBuf};

use tracing::debug;

use crate::error::{LockError, Result};

/// Session type that skips all probing
pub const EXPECTED_SESSION_TYPE: &str = "x11";
/// Compositor socket checked inside the runtime directory
pub const WAYLAND_SOCKET_NAME: &str = "wayland-0";

/// Read access to environment variables
pub trait VarSource {
    fn var_os(&self, key: &str) -> Option<OsString>;
}

/// The real process environment
#[derive(Clone, Copy, Debug, Default)]
pub struct ProcessEnvironment;

impl VarSource for ProcessEnvironment {
    fn var_os(&self, key: &str) -> Option<OsString> {
        std::env::var_os(key)
    }
}

impl VarSource for HashMap<String, String> {
    fn var_os(&self, key: &str) -> Option<OsString> {
        self.get(key).map(OsString::from)
    }
}

/// Startup check that the session is plain X11
pub struct EnvironmentGuard<V> {
    vars: V,
}

impl<V: VarSource> EnvironmentGuard<V> {
    pub fn new(vars: V) -> Self {
        Self { vars }
    }

    /// Fail with [`LockError::IncompatibleSession`] unless this is X11
    ///
    /// A false positive only costs convenience, so any indicator is enough.
    pub fn check(&self) -> Result<()> {
        if self.non_empty("XDG_SESSION_TYPE").as_deref() == Some(OsStr::new(EXPECTED_SESSION_TYPE)) {
            debug!("XDG_SESSION_TYPE confirms an X11 session");
            return Ok(());
        }

        for indicator in ["WAYLAND_DISPLAY", "WAYLAND_SOCKET"] {
            if self.non_empty(indicator).is_some() {
                return Err(LockError::IncompatibleSession(format!(
                    "{} is set, suspecting Wayland session",
                    indicator
                )));
            }
        }

        let socket = self.socket_path()?;
        if compositor_listening(&socket) {
            return Err(LockError::IncompatibleSession(
                "Successfully connected to Wayland socket, suspecting Wayland session".into(),
            ));
        }

        debug!("No Wayland compositor found at {:?}", socket);
        Ok(())
    }

    /// `$XDG_RUNTIME_DIR/wayland-0`
    fn socket_path(&self) -> Result<PathBuf> {
        let runtime_dir = self
            .non_empty("XDG_RUNTIME_DIR")
            .ok_or(LockError::RuntimeDirUnavailable)?;
        Ok(PathBuf::from(runtime_dir).join(WAYLAND_SOCKET_NAME))
    }

    fn non_empty(&self, key: &str) -> Option<OsString> {
        self.vars.var_os(key).filter(|value| !value.is_empty())
    }
}

/// Whether something accepts stream connections at `path`
fn compositor_listening(path: &Path) -> bool {
    UnixStream::connect(path).is_ok()
}
