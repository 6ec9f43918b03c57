//! Identity service seam
//!
//! Retry and throttling policy lives in [`crate::backoff`], not here: an
//! authenticator answers exactly one question per call.

/// Verifies a secret for a named account
pub trait Authenticator {
    /// Returns `true` only if the identity service accepts `secret` for
    /// `username`. Any error or unexpected outcome must map to `false`.
    fn authenticate(&mut self, username: &str, secret: &[u8]) -> bool;
}

impl<F> Authenticator for F
where
    F: FnMut(&str, &[u8]) -> bool,
{
    fn authenticate(&mut self, username: &str, secret: &[u8]) -> bool {
        self(username, secret)
    }
}
