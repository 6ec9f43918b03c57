//! Error types for the lock session

use thiserror::Error;

/// Result type alias for lock operations
pub type Result<T> = std::result::Result<T, LockError>;

/// Fatal errors that abort the lock before or during the input grab
///
/// Everything in here terminates the process with a failure status. Failed
/// authentication attempts are not errors and never show up here.
#[derive(Debug, Error)]
pub enum LockError {
    /// The session belongs to a display protocol we cannot lock
    #[error("{0}. Locking an incompatible session is insecure, aborting")]
    IncompatibleSession(String),

    /// XDG_RUNTIME_DIR is unset, so the compositor check cannot run
    #[error("XDG_RUNTIME_DIR is not set, cannot check for a Wayland session")]
    RuntimeDirUnavailable,

    /// Cursor descriptor could not be read
    #[error("error reading cursor: {0}")]
    Cursor(#[from] CursorError),

    /// Display connection could not be established or failed during setup
    #[error("display error: {0}")]
    Display(#[from] DisplayError),

    /// Input surface could not be created
    #[error("could not create input window: {0}")]
    SurfaceCreation(DisplayError),

    /// Cursor colors could not be allocated
    #[error("could not allocate colors: {0}")]
    ColorAllocation(DisplayError),

    /// Cursor shape could not be created
    #[error("could not create cursor: {0}")]
    CursorCreation(DisplayError),

    /// Keyboard grab failed on every attempt
    #[error("could not grab keyboard after {attempts} attempts")]
    KeyboardGrab { attempts: u32 },

    /// Pointer grab failed on every attempt
    #[error("could not grab pointing device after {attempts} attempts")]
    PointerGrab { attempts: u32 },

    /// Key decoding state could not be set up
    #[error("could not open input context: {0}")]
    InputContext(DisplayError),
}

/// Failure reported by a windowing-system binding
#[derive(Debug, Error)]
#[error("{0}")]
pub struct DisplayError(pub String);

impl DisplayError {
    pub fn new(message: impl Into<String>) -> Self {
        Self(message.into())
    }
}

/// Errors loading a cursor descriptor file
#[derive(Debug, Error)]
pub enum CursorError {
    /// IO error
    #[error("{0}")]
    Io(#[from] std::io::Error),

    /// Malformed JSON or out-of-range values
    #[error("malformed cursor file: {0}")]
    Json(#[from] serde_json::Error),

    /// Well-formed JSON describing an impossible cursor
    #[error("invalid cursor: {0}")]
    Invalid(String),
}
