//! XKB keyboard decoding
//!
//! Key presses are translated through an xkbcommon keyboard state that
//! follows the server: groups (layouts), level 3 and above, and dead keys
//! composed with the locale's compose table.

use std::ffi::OsString;

use tracing::debug;
use xkbcommon::xkb::{self, compose};
use zeroize::Zeroizing;

use trlock_core::{KeyPress, Keysym, Lookup, LookupStatus};

/// Modifier and group components of an XKB state update
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub struct StateMasks {
    pub base_mods: u32,
    pub latched_mods: u32,
    pub locked_mods: u32,
    pub base_group: u32,
    pub latched_group: u32,
    pub locked_group: u32,
}

/// Keysym and text produced by one key press
struct Decoded {
    keysym: Option<u32>,
    text: Zeroizing<Vec<u8>>,
}

impl Decoded {
    fn nothing() -> Self {
        Self {
            keysym: None,
            text: Zeroizing::new(Vec::new()),
        }
    }
}

/// Keyboard state plus an optional compose sequence in progress
pub struct KeyDecoder {
    state: xkb::State,
    compose: Option<compose::State>,
    /// Result held across the two calls of an overflowing lookup
    pending: Option<(KeyPress, Decoded)>,
}

impl KeyDecoder {
    pub fn new(state: xkb::State) -> Self {
        Self {
            state,
            compose: None,
            pending: None,
        }
    }

    /// Compose dead keys and multi-key sequences through `table`
    pub fn with_compose(mut self, table: Option<&compose::Table>) -> Self {
        self.compose = table.map(|table| compose::State::new(table, compose::STATE_NO_FLAGS));
        self
    }

    /// Swap in the state of a reloaded keymap
    pub fn replace_state(&mut self, state: xkb::State) {
        self.state = state;
        self.pending = None;
        if let Some(compose) = self.compose.as_mut() {
            compose.reset();
        }
    }

    /// Apply a state notification from the server
    pub fn update_state(&mut self, masks: StateMasks) {
        self.state.update_mask(
            masks.base_mods,
            masks.latched_mods,
            masks.locked_mods,
            masks.base_group,
            masks.latched_group,
            masks.locked_group,
        );
    }

    fn decode(&mut self, key: &KeyPress) -> Decoded {
        let keycode = xkb::Keycode::new(u32::from(key.keycode));
        let keysym = self.state.key_get_one_sym(keycode);

        if let Some(compose) = self.compose.as_mut() {
            if matches!(compose.feed(keysym), compose::FeedResult::Accepted) {
                match compose.status() {
                    compose::Status::Composing => return Decoded::nothing(),
                    compose::Status::Cancelled => {
                        compose.reset();
                        return Decoded::nothing();
                    }
                    compose::Status::Composed => {
                        let text = compose.utf8().unwrap_or_default();
                        let keysym = compose.keysym().map(|k| k.raw()).filter(|&k| k != 0);
                        compose.reset();
                        return Decoded {
                            keysym,
                            text: Zeroizing::new(text.into_bytes()),
                        };
                    }
                    compose::Status::Nothing => {}
                }
            }
        }

        Decoded {
            keysym: Some(keysym.raw()).filter(|&k| k != 0),
            text: Zeroizing::new(self.state.key_get_utf8(keycode).into_bytes()),
        }
    }

    /// Two-call lookup: reports `BufferOverflow` with the needed length when
    /// `buf` cannot hold the text, and answers the retry for the same key
    /// without decoding it again
    pub fn lookup_into(&mut self, key: &KeyPress, buf: &mut [u8]) -> Lookup {
        let decoded = match self.pending.take() {
            Some((pending, decoded)) if pending == *key => decoded,
            _ => self.decode(key),
        };
        let keysym = decoded.keysym.map(Keysym);

        if decoded.text.is_empty() {
            return Lookup {
                status: if keysym.is_some() {
                    LookupStatus::Keysym
                } else {
                    LookupStatus::Nothing
                },
                keysym,
                len: 0,
            };
        }

        let len = decoded.text.len();
        if buf.len() < len {
            self.pending = Some((*key, decoded));
            return Lookup {
                status: LookupStatus::BufferOverflow,
                keysym: None,
                len,
            };
        }

        buf[..len].copy_from_slice(&decoded.text);
        Lookup {
            status: if keysym.is_some() {
                LookupStatus::Both
            } else {
                LookupStatus::Chars
            },
            keysym,
            len,
        }
    }
}

/// Locale that selects the compose table, as the C library resolves it
fn compose_locale() -> OsString {
    ["LC_ALL", "LC_CTYPE", "LANG"]
        .iter()
        .filter_map(std::env::var_os)
        .find(|value| !value.is_empty())
        .unwrap_or_else(|| OsString::from("C"))
}

/// Compose table for the current locale, if one is installed
pub fn compose_table(context: &xkb::Context) -> Option<compose::Table> {
    let locale = compose_locale();
    match compose::Table::new_from_locale(context, &locale, compose::COMPILE_NO_FLAGS) {
        Ok(table) => Some(table),
        Err(()) => {
            debug!("No compose table for locale {:?}", locale);
            None
        }
    }
}
