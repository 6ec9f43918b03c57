//! Lock session configuration

use serde::{Deserialize, Serialize};

use crate::backoff::BackoffPolicy;
use crate::retry::Retry;
use crate::secret::DEFAULT_SECRET_CEILING;

/// Default PAM service used to verify the secret
pub const DEFAULT_PAM_SERVICE: &str = "login";

/// Tunables of a lock session
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct LockConfig {
    /// Retry policy for the keyboard grab
    pub keyboard_retry: Retry,

    /// Retry policy for the pointer grab
    pub pointer_retry: Retry,

    /// Maximum cumulative secret length in bytes
    pub secret_ceiling: usize,

    /// Failed-attempt throttling
    pub backoff: BackoffPolicy,

    /// PAM service name
    pub pam_service: String,
}

impl Default for LockConfig {
    fn default() -> Self {
        Self {
            keyboard_retry: Retry::default(),
            pointer_retry: Retry::default(),
            secret_ceiling: DEFAULT_SECRET_CEILING,
            backoff: BackoffPolicy::default(),
            pam_service: DEFAULT_PAM_SERVICE.to_string(),
        }
    }
}
