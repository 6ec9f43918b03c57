//! [`Authenticator`] backed by PAM

use std::ffi::{CStr, CString};

use pam_client::{ConversationHandler, ErrorCode, Flag};
use tracing::{debug, info, warn};
use zeroize::Zeroizing;

use trlock_core::Authenticator;

/// Verifies secrets through a PAM service
#[derive(Clone, Debug)]
pub struct PamAuthenticator {
    service: String,
}

impl PamAuthenticator {
    pub fn new(service: impl Into<String>) -> Self {
        Self {
            service: service.into(),
        }
    }

    pub fn service(&self) -> &str {
        &self.service
    }
}

impl Authenticator for PamAuthenticator {
    fn authenticate(&mut self, username: &str, secret: &[u8]) -> bool {
        let conversation = SecretConversation::new(username, secret);

        let mut context =
            match pam_client::Context::new(&self.service, Some(username), conversation) {
                Ok(context) => context,
                Err(e) => {
                    warn!("Could not start PAM service {}: {}", self.service, e);
                    return false;
                }
            };

        match context.authenticate(Flag::NONE) {
            Ok(()) => true,
            Err(e) => {
                info!("PAM rejected {}: {}", username, e);
                false
            }
        }
    }
}

/// Answers PAM prompts non-interactively: hidden prompts get the secret,
/// visible prompts get the username
pub struct SecretConversation {
    username: String,
    secret: Zeroizing<Vec<u8>>,
}

impl SecretConversation {
    pub fn new(username: &str, secret: &[u8]) -> Self {
        Self {
            username: username.to_owned(),
            secret: Zeroizing::new(secret.to_vec()),
        }
    }
}

impl ConversationHandler for SecretConversation {
    fn prompt_echo_on(&mut self, _msg: &CStr) -> Result<CString, ErrorCode> {
        CString::new(self.username.as_bytes()).map_err(|_| ErrorCode::CONV_ERR)
    }

    fn prompt_echo_off(&mut self, _msg: &CStr) -> Result<CString, ErrorCode> {
        // A secret with an interior NUL cannot cross the C boundary intact
        CString::new(self.secret.as_slice()).map_err(|_| ErrorCode::CONV_ERR)
    }

    fn text_info(&mut self, msg: &CStr) {
        debug!("PAM: {}", msg.to_string_lossy());
    }

    fn error_msg(&mut self, msg: &CStr) {
        warn!("PAM: {}", msg.to_string_lossy());
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn prompt() -> CString {
        CString::new("Password: ").unwrap()
    }

    #[test]
    fn test_hidden_prompt_answers_secret() {
        let mut conversation = SecretConversation::new("alice", b"hunter2");
        let answer = conversation.prompt_echo_off(&prompt()).unwrap();
        assert_eq!(answer.as_bytes(), b"hunter2");
    }

    #[test]
    fn test_visible_prompt_answers_username() {
        let mut conversation = SecretConversation::new("alice", b"hunter2");
        let answer = conversation.prompt_echo_on(&prompt()).unwrap();
        assert_eq!(answer.as_bytes(), b"alice");
    }

    #[test]
    fn test_interior_nul_is_conversation_error() {
        let mut conversation = SecretConversation::new("alice", b"hun\0ter");
        assert!(matches!(
            conversation.prompt_echo_off(&prompt()),
            Err(ErrorCode::CONV_ERR)
        ));
    }

    #[test]
    fn test_service_name_kept() {
        assert_eq!(PamAuthenticator::new("login").service(), "login");
    }
}
