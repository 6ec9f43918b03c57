//! Invoking user and the root check

use nix::unistd::{Uid, User};
use thiserror::Error;

#[derive(Error, Debug)]
pub enum PrivilegeError {
    #[error(
        "refusing to run as root. Use -f to force. Warning: Your PAM configuration may deny \
         unlocking as root."
    )]
    RefusingRoot,

    #[error("no passwd entry for uid {0}")]
    UnknownUser(u32),

    #[error("user database lookup failed: {0}")]
    Lookup(#[from] nix::Error),
}

/// The account the lock authenticates against
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct Invoker {
    pub name: String,
    pub uid: u32,
}

impl Invoker {
    pub fn is_root(&self) -> bool {
        self.uid == 0
    }
}

/// Resolve the real uid of this process through the user database
pub fn current_invoker() -> Result<Invoker, PrivilegeError> {
    let uid = Uid::current();
    let user = User::from_uid(uid)?.ok_or(PrivilegeError::UnknownUser(uid.as_raw()))?;

    Ok(Invoker {
        name: user.name,
        uid: uid.as_raw(),
    })
}

/// Root may only lock when forced
pub fn ensure_allowed(invoker: &Invoker, force: bool) -> Result<(), PrivilegeError> {
    if invoker.is_root() && !force {
        return Err(PrivilegeError::RefusingRoot);
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use rstest::rstest;

    fn invoker(uid: u32) -> Invoker {
        Invoker {
            name: if uid == 0 { "root" } else { "alice" }.to_string(),
            uid,
        }
    }

    #[rstest]
    #[case::user(1000, false, true)]
    #[case::user_forced(1000, true, true)]
    #[case::root(0, false, false)]
    #[case::root_forced(0, true, true)]
    fn test_root_needs_force(#[case] uid: u32, #[case] force: bool, #[case] allowed: bool) {
        assert_eq!(ensure_allowed(&invoker(uid), force).is_ok(), allowed);
    }

    #[test]
    fn test_refusal_mentions_force_flag() {
        let err = ensure_allowed(&invoker(0), false).unwrap_err();
        assert!(err.to_string().contains("-f"));
    }

    #[test]
    fn test_current_invoker_matches_uid() {
        // Build environments normally have a passwd entry for the running uid
        if let Ok(invoker) = current_invoker() {
            assert_eq!(invoker.uid, Uid::current().as_raw());
            assert!(!invoker.name.is_empty());
        }
    }
}
