//! trlock Core - Lock session state machine
//!
//! This crate holds everything a transparent screen lock needs that does not
//! depend on a concrete windowing system or identity service:
//!
//! - [`EnvironmentGuard`] refuses to lock inside an incompatible session
//! - [`InputGrabber`] acquires exclusive keyboard and pointer input
//! - [`SecretBuffer`] accumulates the typed secret under a hard ceiling
//! - [`Backoff`] throttles failed attempts with a goodwill credit
//! - [`LockSession`] runs the event loop until the secret is accepted
//!
//! Windowing and authentication are reached through the [`LockDisplay`] and
//! [`Authenticator`] traits so the state machine can be driven by mocks.

pub mod auth;
pub mod backoff;
pub mod config;
pub mod cursor;
pub mod display;
pub mod environment;
pub mod error;
pub mod grab;
pub mod retry;
pub mod secret;
pub mod session;
pub mod sleep_lock;

pub use auth::Authenticator;
pub use backoff::{Backoff, BackoffPolicy};
pub use config::LockConfig;
pub use cursor::{CursorDescriptor, Rgb};
pub use display::{
    DecodedKey, DisplayEvent, GrabStatus, KeyPress, Keysym, LockDisplay, Lookup, LookupStatus,
};
pub use environment::{EnvironmentGuard, ProcessEnvironment, VarSource};
pub use error::{CursorError, DisplayError, LockError, Result};
pub use grab::{GrabbedInput, InputGrabber};
pub use retry::{Retry, Sleeper, ThreadSleeper};
pub use secret::SecretBuffer;
pub use session::{LockSession, SessionOutcome, Transition};
pub use sleep_lock::SleepLockRelease;

/// Name used to prefix diagnostics and to locate data files
pub const PROGRAM_NAME: &str = "trlock";
