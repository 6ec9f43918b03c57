//! Capability interface to the windowing system
//!
//! The lock session only needs a handful of operations from the display:
//! surface creation, color allocation, cursor creation, keyboard and pointer
//! grabs, event polling, a connection-error query and key decoding. A
//! platform binding implements [`LockDisplay`]; tests implement it with
//! scripted mocks.

use std::fmt;

use zeroize::Zeroizing;

use crate::cursor::{CursorDescriptor, Rgb};
use crate::error::DisplayError;

/// Symbolic key identifier (X keysym value)
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub struct Keysym(pub u32);

impl Keysym {
    pub const BACKSPACE: Keysym = Keysym(0xff08);
    pub const LINEFEED: Keysym = Keysym(0xff0a);
    pub const CLEAR: Keysym = Keysym(0xff0b);
    pub const RETURN: Keysym = Keysym(0xff0d);
    pub const ESCAPE: Keysym = Keysym(0xff1b);
    pub const DELETE: Keysym = Keysym(0xffff);
    pub const NO_SYMBOL: Keysym = Keysym(0);
}

/// Raw key press as delivered by the display connection
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct KeyPress {
    /// Server timestamp in milliseconds
    pub time: u32,
    /// Hardware keycode
    pub keycode: u8,
    /// Modifier and button state mask
    pub state: u16,
}

/// Event delivered by [`LockDisplay::wait_for_event`]
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum DisplayEvent {
    KeyPress(KeyPress),
    /// Anything the lock does not act on
    Other,
}

/// Outcome of a single grab request
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum GrabStatus {
    Success,
    AlreadyGrabbed,
    InvalidTime,
    NotViewable,
    Frozen,
}

impl GrabStatus {
    pub fn is_success(self) -> bool {
        self == GrabStatus::Success
    }
}

/// What a key lookup produced
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum LookupStatus {
    /// Neither text nor a keysym
    Nothing,
    /// Text only
    Chars,
    /// Keysym only
    Keysym,
    /// Both text and a keysym
    Both,
    /// Text did not fit; `len` holds the required buffer size
    BufferOverflow,
}

/// Result of [`LockDisplay::lookup_string`]
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct Lookup {
    pub status: LookupStatus,
    pub keysym: Option<Keysym>,
    /// Bytes written, or bytes required on overflow
    pub len: usize,
}

impl Lookup {
    pub fn nothing() -> Self {
        Self {
            status: LookupStatus::Nothing,
            keysym: None,
            len: 0,
        }
    }
}

/// Windowing-system operations used by the lock
pub trait LockDisplay {
    /// Handle of the input-only surface
    type Surface: Copy + fmt::Debug;
    /// Handle of a cursor shape
    type Cursor: Copy + fmt::Debug;
    /// Handle of an allocated palette color
    type Color: Copy + fmt::Debug;

    /// Create a 1x1 invisible input-only surface at the origin of the root
    fn create_surface(&mut self) -> Result<Self::Surface, DisplayError>;

    /// Allocate a color in the default palette
    fn alloc_color(&mut self, color: Rgb) -> Result<Self::Color, DisplayError>;

    /// Build a pointer shape from a cursor descriptor and two allocated colors
    fn create_cursor(
        &mut self,
        surface: Self::Surface,
        descriptor: &CursorDescriptor,
        foreground: Self::Color,
        background: Self::Color,
    ) -> Result<Self::Cursor, DisplayError>;

    /// Make the surface visible
    fn map_surface(&mut self, surface: Self::Surface) -> Result<(), DisplayError>;

    /// One asynchronous keyboard grab attempt
    fn grab_keyboard(&mut self, surface: Self::Surface) -> Result<GrabStatus, DisplayError>;

    /// One asynchronous pointer grab attempt showing `cursor`
    fn grab_pointer(
        &mut self,
        surface: Self::Surface,
        cursor: Self::Cursor,
    ) -> Result<GrabStatus, DisplayError>;

    /// Push pending requests to the server
    fn flush(&mut self) -> Result<(), DisplayError>;

    /// Prepare key decoding state (input method and context)
    fn open_input_context(&mut self) -> Result<(), DisplayError>;

    /// Block for the next event; `None` when nothing could be read
    fn wait_for_event(&mut self) -> Option<DisplayEvent>;

    /// Whether the connection has failed
    fn connection_has_error(&self) -> bool;

    /// Decode a key press into `buf`
    ///
    /// When the text does not fit the status is
    /// [`LookupStatus::BufferOverflow`] and `len` is the size required.
    fn lookup_string(&mut self, key: &KeyPress, buf: &mut [u8]) -> Lookup;

    /// Give up both grabs and destroy the surface
    fn release(&mut self, surface: Self::Surface) -> Result<(), DisplayError>;
}

/// Logical view of one key press after decoding
pub struct DecodedKey {
    pub time: u32,
    pub keysym: Option<Keysym>,
    pub text: Zeroizing<Vec<u8>>,
}

impl DecodedKey {
    /// Decode `key`, growing the buffer once if the display asks for more room
    pub fn decode<D: LockDisplay + ?Sized>(display: &mut D, key: &KeyPress) -> Self {
        let mut buf = Zeroizing::new(Vec::new());
        let mut lookup = display.lookup_string(key, &mut buf);

        if lookup.status == LookupStatus::BufferOverflow {
            buf.resize(lookup.len, 0);
            lookup = display.lookup_string(key, &mut buf);
        }

        let keysym = match lookup.status {
            LookupStatus::Keysym | LookupStatus::Both => lookup.keysym,
            _ => None,
        };
        let text_len = match lookup.status {
            LookupStatus::Chars | LookupStatus::Both => lookup.len.min(buf.len()),
            _ => 0,
        };
        buf.truncate(text_len);

        Self {
            time: key.time,
            keysym,
            text: buf,
        }
    }
}

impl fmt::Debug for DecodedKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("DecodedKey")
            .field("time", &self.time)
            .field("keysym", &self.keysym)
            .field("text_len", &self.text.len())
            .finish()
    }
}
