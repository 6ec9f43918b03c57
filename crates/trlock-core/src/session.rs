//! The lock session event loop
//!
//! ```text
//!            key press            decode
//! AWAITING ------------> [lockout?] -----> EDIT / SUBMIT / IGNORE --+
//!    ^                       | yes                                  |
//!    +-----------------------+--------------------------------------+
//!
//! SUBMIT accepted      -> UNLOCKED
//! connection failure   -> ABORTED
//! ```
//!
//! Authentication runs inline: no further input is read while the identity
//! service is deciding.

use tracing::{debug, info, trace, warn};

use crate::auth::Authenticator;
use crate::backoff::Backoff;
use crate::config::LockConfig;
use crate::display::{DecodedKey, DisplayEvent, KeyPress, Keysym, LockDisplay};
use crate::error::{LockError, Result};
use crate::grab::GrabbedInput;
use crate::secret::SecretBuffer;

/// How a session ended
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum SessionOutcome {
    /// The secret was accepted and input released
    Unlocked,
    /// The display connection failed while waiting for input
    ConnectionLost,
}

/// Effect of a single event on the session
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Transition {
    /// Not a key press, inside the lockout window, or nothing to store
    Ignored,
    /// Secret discarded (escape/clear)
    Cleared,
    /// Last chunk removed (delete/backspace)
    Deleted,
    /// Text appended to the secret
    Appended,
    /// Secret rejected; input is ignored until `timeout`
    Rejected { timeout: u32 },
    /// Secret accepted
    Unlocked,
}

/// Control action bound to a keysym
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
enum KeyAction {
    Clear,
    Delete,
    Submit,
}

impl KeyAction {
    fn for_keysym(keysym: Keysym) -> Option<Self> {
        match keysym {
            Keysym::ESCAPE | Keysym::CLEAR => Some(Self::Clear),
            Keysym::DELETE | Keysym::BACKSPACE => Some(Self::Delete),
            Keysym::LINEFEED | Keysym::RETURN => Some(Self::Submit),
            _ => None,
        }
    }
}

/// A running lock: owns the grabbed display and all secret state
pub struct LockSession<D: LockDisplay, A> {
    display: D,
    input: GrabbedInput<D::Surface>,
    authenticator: A,
    username: String,
    secret: SecretBuffer,
    backoff: Backoff,
}

impl<D: LockDisplay, A: Authenticator> LockSession<D, A> {
    /// Open the input context on a grabbed display and start a session
    pub fn new(
        mut display: D,
        input: GrabbedInput<D::Surface>,
        authenticator: A,
        username: impl Into<String>,
        config: &LockConfig,
    ) -> Result<Self> {
        display
            .open_input_context()
            .map_err(LockError::InputContext)?;

        Ok(Self {
            display,
            input,
            authenticator,
            username: username.into(),
            secret: SecretBuffer::with_ceiling(config.secret_ceiling),
            backoff: Backoff::new(config.backoff),
        })
    }

    /// Process events until the secret is accepted or the connection fails
    pub fn run(&mut self) -> SessionOutcome {
        loop {
            let Some(event) = self.display.wait_for_event() else {
                if self.display.connection_has_error() {
                    warn!("Display connection lost, ending lock session");
                    return SessionOutcome::ConnectionLost;
                }
                continue;
            };

            if self.handle_event(event) == Transition::Unlocked {
                if let Err(e) = self.display.release(self.input.surface) {
                    warn!("Could not release input cleanly: {}", e);
                }
                info!("Unlocked");
                return SessionOutcome::Unlocked;
            }
        }
    }

    /// Apply one display event
    pub fn handle_event(&mut self, event: DisplayEvent) -> Transition {
        match event {
            DisplayEvent::KeyPress(key) => self.handle_key_press(&key),
            DisplayEvent::Other => Transition::Ignored,
        }
    }

    fn handle_key_press(&mut self, key: &KeyPress) -> Transition {
        let now = key.time;
        if self.backoff.is_locked(now) {
            trace!("Key press at {} inside lockout window", now);
            return Transition::Ignored;
        }

        let decoded = DecodedKey::decode(&mut self.display, key);

        match decoded.keysym.and_then(KeyAction::for_keysym) {
            Some(KeyAction::Clear) => {
                self.secret.clear();
                Transition::Cleared
            }
            Some(KeyAction::Delete) => {
                self.secret.pop_last();
                Transition::Deleted
            }
            Some(KeyAction::Submit) => self.submit(now),
            None if !decoded.text.is_empty() => {
                if self.secret.append(&decoded.text) {
                    Transition::Appended
                } else {
                    trace!("Secret at ceiling, dropping input");
                    Transition::Ignored
                }
            }
            None => Transition::Ignored,
        }
    }

    fn submit(&mut self, now: u32) -> Transition {
        let secret = self.secret.concat();
        debug!("Verifying {} byte secret for {}", secret.len(), self.username);

        if self.authenticator.authenticate(&self.username, &secret) {
            return Transition::Unlocked;
        }

        self.secret.clear();
        let timeout = self.backoff.on_failed_attempt(now);
        info!(
            "Authentication failed, ignoring input for {} ms",
            self.backoff.remaining(now)
        );
        Transition::Rejected { timeout }
    }

    pub fn secret(&self) -> &SecretBuffer {
        &self.secret
    }

    pub fn backoff(&self) -> &Backoff {
        &self.backoff
    }

    pub fn display(&self) -> &D {
        &self.display
    }

    pub fn authenticator(&self) -> &A {
        &self.authenticator
    }

    pub fn username(&self) -> &str {
        &self.username
    }
}
