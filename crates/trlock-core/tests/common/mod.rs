//! Scripted display and authenticator shared by the integration tests

#![allow(dead_code)]

use std::collections::{HashMap, VecDeque};
use std::time::Duration;

use trlock_core::{
    CursorDescriptor, DisplayError, DisplayEvent, GrabStatus, KeyPress, Keysym, LockDisplay,
    Lookup, LookupStatus, Rgb, Sleeper,
};

pub const KEY_ESCAPE: u8 = 9;
pub const KEY_BACKSPACE: u8 = 22;
pub const KEY_RETURN: u8 = 36;
pub const KEY_SHIFT: u8 = 50;
pub const KEY_DELETE: u8 = 119;
pub const KEY_EURO: u8 = 130;
pub const KEY_DASH: u8 = 20;
pub const FIRST_LETTER: u8 = 100;

/// Surface handle handed out by the mock
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct MockSurface(pub u32);

/// In-memory display driven by a script of events
pub struct MockDisplay {
    pub events: VecDeque<Option<DisplayEvent>>,
    keys: HashMap<u8, (Option<Keysym>, Vec<u8>)>,
    pub keyboard_script: VecDeque<Result<GrabStatus, DisplayError>>,
    pub pointer_script: VecDeque<Result<GrabStatus, DisplayError>>,
    pub keyboard_attempts: u32,
    pub pointer_attempts: u32,
    pub fail_color_allocation: bool,
    pub allocated: Vec<Rgb>,
    pub calls: Vec<&'static str>,
    pub lookup_calls: usize,
    pub broken: bool,
    pub released: bool,
}

impl MockDisplay {
    pub fn new() -> Self {
        let mut display = Self {
            events: VecDeque::new(),
            keys: HashMap::new(),
            keyboard_script: VecDeque::new(),
            pointer_script: VecDeque::new(),
            keyboard_attempts: 0,
            pointer_attempts: 0,
            fail_color_allocation: false,
            allocated: Vec::new(),
            calls: Vec::new(),
            lookup_calls: 0,
            broken: false,
            released: false,
        };
        display.bind(KEY_ESCAPE, Some(Keysym::ESCAPE), b"\x1b");
        display.bind(KEY_BACKSPACE, Some(Keysym::BACKSPACE), b"\x08");
        display.bind(KEY_RETURN, Some(Keysym::RETURN), b"\r");
        display.bind(KEY_DELETE, Some(Keysym::DELETE), b"\x7f");
        display.bind(KEY_SHIFT, Some(Keysym(0xffe1)), b"");
        display.bind(KEY_EURO, Some(Keysym(0x20ac)), "€".as_bytes());
        display.bind(KEY_DASH, Some(Keysym(0x2d)), b"-");
        for (i, letter) in (b'a'..=b'z').enumerate() {
            display.bind(FIRST_LETTER + i as u8, Some(Keysym(u32::from(letter))), &[letter]);
        }
        display
    }

    pub fn bind(&mut self, keycode: u8, keysym: Option<Keysym>, text: &[u8]) {
        self.keys.insert(keycode, (keysym, text.to_vec()));
    }

    pub fn push(&mut self, event: DisplayEvent) {
        self.events.push_back(Some(event));
    }

    pub fn push_all(&mut self, events: impl IntoIterator<Item = DisplayEvent>) {
        self.events.extend(events.into_iter().map(Some));
    }
}

/// Key press event for `keycode` at `time`
pub fn press(keycode: u8, time: u32) -> DisplayEvent {
    DisplayEvent::KeyPress(KeyPress {
        time,
        keycode,
        state: 0,
    })
}

/// Keycode producing `c` in the mock keymap
pub fn keycode_for(c: char) -> u8 {
    match c {
        'a'..='z' => FIRST_LETTER + (c as u8 - b'a'),
        '-' => KEY_DASH,
        '€' => KEY_EURO,
        _ => panic!("no key for {:?}", c),
    }
}

/// Key presses typing `text`, one millisecond apart from `start`
pub fn type_text(text: &str, start: u32) -> Vec<DisplayEvent> {
    text.chars()
        .enumerate()
        .map(|(i, c)| press(keycode_for(c), start + i as u32))
        .collect()
}

impl LockDisplay for MockDisplay {
    type Surface = MockSurface;
    type Cursor = u32;
    type Color = u32;

    fn create_surface(&mut self) -> Result<MockSurface, DisplayError> {
        self.calls.push("create_surface");
        Ok(MockSurface(7))
    }

    fn alloc_color(&mut self, color: Rgb) -> Result<u32, DisplayError> {
        self.calls.push("alloc_color");
        if self.fail_color_allocation {
            return Err(DisplayError::new("colormap full"));
        }
        self.allocated.push(color);
        Ok(self.allocated.len() as u32)
    }

    fn create_cursor(
        &mut self,
        _surface: MockSurface,
        descriptor: &CursorDescriptor,
        _foreground: u32,
        _background: u32,
    ) -> Result<u32, DisplayError> {
        self.calls.push("create_cursor");
        descriptor
            .validate()
            .map_err(|e| DisplayError::new(e.to_string()))?;
        Ok(99)
    }

    fn map_surface(&mut self, _surface: MockSurface) -> Result<(), DisplayError> {
        self.calls.push("map_surface");
        Ok(())
    }

    fn grab_keyboard(&mut self, _surface: MockSurface) -> Result<GrabStatus, DisplayError> {
        self.calls.push("grab_keyboard");
        self.keyboard_attempts += 1;
        self.keyboard_script
            .pop_front()
            .unwrap_or(Ok(GrabStatus::Success))
    }

    fn grab_pointer(
        &mut self,
        _surface: MockSurface,
        _cursor: u32,
    ) -> Result<GrabStatus, DisplayError> {
        self.calls.push("grab_pointer");
        self.pointer_attempts += 1;
        self.pointer_script
            .pop_front()
            .unwrap_or(Ok(GrabStatus::Success))
    }

    fn flush(&mut self) -> Result<(), DisplayError> {
        self.calls.push("flush");
        Ok(())
    }

    fn open_input_context(&mut self) -> Result<(), DisplayError> {
        self.calls.push("open_input_context");
        Ok(())
    }

    fn wait_for_event(&mut self) -> Option<DisplayEvent> {
        match self.events.pop_front() {
            Some(event) => event,
            None => {
                // Script exhausted: behave like a dead connection
                self.broken = true;
                None
            }
        }
    }

    fn connection_has_error(&self) -> bool {
        self.broken
    }

    fn lookup_string(&mut self, key: &KeyPress, buf: &mut [u8]) -> Lookup {
        self.lookup_calls += 1;
        let Some((keysym, text)) = self.keys.get(&key.keycode) else {
            return Lookup::nothing();
        };

        if text.len() > buf.len() {
            return Lookup {
                status: LookupStatus::BufferOverflow,
                keysym: None,
                len: text.len(),
            };
        }
        buf[..text.len()].copy_from_slice(text);

        let status = match (keysym.is_some(), !text.is_empty()) {
            (true, true) => LookupStatus::Both,
            (true, false) => LookupStatus::Keysym,
            (false, true) => LookupStatus::Chars,
            (false, false) => LookupStatus::Nothing,
        };
        Lookup {
            status,
            keysym: *keysym,
            len: text.len(),
        }
    }

    fn release(&mut self, _surface: MockSurface) -> Result<(), DisplayError> {
        self.calls.push("release");
        self.released = true;
        Ok(())
    }
}

/// Records sleeps instead of sleeping
#[derive(Default)]
pub struct RecordingSleeper {
    pub sleeps: Vec<Duration>,
}

impl Sleeper for RecordingSleeper {
    fn sleep(&mut self, duration: Duration) {
        self.sleeps.push(duration);
    }
}

/// Authenticator accepting one secret and recording every attempt
pub struct ScriptedAuth {
    pub accept: Vec<u8>,
    pub attempts: Vec<(String, Vec<u8>)>,
}

impl ScriptedAuth {
    pub fn accepting(secret: &str) -> Self {
        Self {
            accept: secret.as_bytes().to_vec(),
            attempts: Vec::new(),
        }
    }
}

impl trlock_core::Authenticator for ScriptedAuth {
    fn authenticate(&mut self, username: &str, secret: &[u8]) -> bool {
        self.attempts.push((username.to_string(), secret.to_vec()));
        secret == self.accept.as_slice()
    }
}
