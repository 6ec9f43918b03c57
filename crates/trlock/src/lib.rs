//! trlock - Transparent X screen locker
//!
//! Platform bindings for the lock session in `trlock-core`: an X11 display
//! over x11rb with xkbcommon key decoding, PAM authentication and the
//! invoking-user lookup.

pub mod keymap;
pub mod pam;
pub mod privilege;
pub mod x11;

pub use keymap::{KeyDecoder, StateMasks};
pub use pam::PamAuthenticator;
pub use privilege::{Invoker, PrivilegeError};
pub use x11::X11Display;
