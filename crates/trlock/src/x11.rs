//! [`LockDisplay`] over an X11 connection (x11rb)
//!
//! The connection goes through libxcb so that xkbcommon can read the
//! server keymap from it directly.

use std::ffi::CString;

use tracing::{debug, info, warn};
use x11rb::connection::Connection;
use x11rb::protocol::xkb::{
    self as xkb_proto, ConnectionExt as _, EventType, MapPart, SelectEventsAux,
};
use x11rb::protocol::xproto::{
    self, ConnectionExt as _, CreateGCAux, CreateWindowAux, EventMask, GrabMode, ImageFormat,
    ImageOrder, Pixmap, Window, WindowClass,
};
use x11rb::protocol::Event;
use x11rb::xcb_ffi::XCBConnection;
use x11rb::{COPY_DEPTH_FROM_PARENT, COPY_FROM_PARENT, CURRENT_TIME, NONE};
use xkbcommon::xkb;

use trlock_core::{
    CursorDescriptor, DisplayError, DisplayEvent, GrabStatus, KeyPress, LockDisplay, Lookup, Rgb,
};

use crate::keymap::{self, KeyDecoder, StateMasks};

fn x11_error(e: impl std::fmt::Display) -> DisplayError {
    DisplayError::new(e.to_string())
}

/// Colormap entry returned by the server
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct AllocatedColor {
    pub red: u16,
    pub green: u16,
    pub blue: u16,
}

/// Server layout for depth-1 images
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct BitmapFormat {
    /// Scanline padding in bits
    pub scanline_pad: u8,
    /// Scanline unit in bits
    pub scanline_unit: u8,
    /// Leftmost pixel in the most significant bit
    pub msb_bit_order: bool,
    /// Most significant byte first within a scanline unit
    pub msb_byte_order: bool,
}

impl BitmapFormat {
    fn from_setup(setup: &xproto::Setup) -> Self {
        Self {
            scanline_pad: setup.bitmap_format_scanline_pad,
            scanline_unit: setup.bitmap_format_scanline_unit,
            msb_bit_order: setup.bitmap_format_bit_order == ImageOrder::MSB_FIRST,
            msb_byte_order: setup.image_byte_order == ImageOrder::MSB_FIRST,
        }
    }
}

/// Re-lay an LSB-first bitmap with byte-aligned rows into the server format
pub fn server_bitmap(bits: &[u8], width: u16, height: u16, format: BitmapFormat) -> Vec<u8> {
    let src_stride = usize::from(width).div_ceil(8);
    let pad = usize::from(format.scanline_pad.max(8));
    let dst_stride = usize::from(width).div_ceil(pad) * pad / 8;
    let unit = usize::from(format.scanline_unit.max(8)) / 8;

    let mut out = vec![0u8; dst_stride * usize::from(height)];
    for (src_row, dst_row) in bits
        .chunks(src_stride)
        .zip(out.chunks_mut(dst_stride))
        .take(usize::from(height))
    {
        dst_row[..src_row.len()].copy_from_slice(src_row);
        if format.msb_bit_order {
            dst_row.iter_mut().for_each(|b| *b = b.reverse_bits());
        }
        if format.msb_byte_order && unit > 1 {
            dst_row.chunks_mut(unit).for_each(|chunk| chunk.reverse());
        }
    }
    out
}

/// XKB protocol version the keymap is read with
const XKB_MAJOR: u16 = 1;
const XKB_MINOR: u16 = 0;

/// Map components whose change invalidates the compiled keymap
fn keymap_parts() -> MapPart {
    MapPart::KEY_TYPES
        | MapPart::KEY_SYMS
        | MapPart::MODIFIER_MAP
        | MapPart::EXPLICIT_COMPONENTS
        | MapPart::KEY_ACTIONS
        | MapPart::VIRTUAL_MODS
        | MapPart::VIRTUAL_MOD_MAP
}

impl From<&xkb_proto::StateNotifyEvent> for StateMasks {
    fn from(event: &xkb_proto::StateNotifyEvent) -> Self {
        Self {
            base_mods: u32::from(event.base_mods),
            latched_mods: u32::from(event.latched_mods),
            locked_mods: u32::from(event.locked_mods),
            // Relative groups may be negative
            base_group: event.base_group as u32,
            latched_group: event.latched_group as u32,
            locked_group: u32::from(event.locked_group),
        }
    }
}

/// A live X11 connection holding the lock
pub struct X11Display {
    conn: XCBConnection,
    screen_num: usize,
    context: xkb::Context,
    device_id: i32,
    decoder: Option<KeyDecoder>,
    failed: bool,
}

impl X11Display {
    /// Connect to `display_name`, or `$DISPLAY` when `None`
    pub fn connect(display_name: Option<&str>) -> Result<Self, DisplayError> {
        let display_name = display_name.map(CString::new).transpose().map_err(x11_error)?;
        let (conn, screen_num) =
            XCBConnection::connect(display_name.as_deref()).map_err(x11_error)?;
        debug!("Connected to X server, screen {}", screen_num);

        Ok(Self {
            conn,
            screen_num,
            context: xkb::Context::new(xkb::CONTEXT_NO_FLAGS),
            device_id: -1,
            decoder: None,
            failed: false,
        })
    }

    /// Compile the core keyboard's current keymap and state from the server
    fn load_keymap(&mut self) {
        let keymap = xkb::x11::keymap_new_from_device(
            &self.context,
            &self.conn,
            self.device_id,
            xkb::KEYMAP_COMPILE_NO_FLAGS,
        );
        let state = xkb::x11::state_new_from_device(&keymap, &self.conn, self.device_id);

        match self.decoder.as_mut() {
            Some(decoder) => decoder.replace_state(state),
            None => {
                let compose = keymap::compose_table(&self.context);
                self.decoder = Some(KeyDecoder::new(state).with_compose(compose.as_ref()));
            }
        }
        debug!("Loaded keymap of keyboard device {}", self.device_id);
    }

    fn screen(&self) -> &xproto::Screen {
        &self.conn.setup().roots[self.screen_num]
    }

    /// Upload a depth-1 bitmap into a fresh pixmap
    fn upload_bitmap(
        &self,
        drawable: Window,
        width: u16,
        height: u16,
        bits: &[u8],
    ) -> Result<Pixmap, DisplayError> {
        let data = server_bitmap(bits, width, height, BitmapFormat::from_setup(self.conn.setup()));

        let pixmap = self.conn.generate_id().map_err(x11_error)?;
        self.conn
            .create_pixmap(1, pixmap, drawable, width, height)
            .map_err(x11_error)?
            .check()
            .map_err(x11_error)?;

        let gc = self.conn.generate_id().map_err(x11_error)?;
        self.conn
            .create_gc(gc, pixmap, &CreateGCAux::new().foreground(1).background(0))
            .map_err(x11_error)?;
        self.conn
            .put_image(ImageFormat::XY_PIXMAP, pixmap, gc, width, height, 0, 0, 0, 1, &data)
            .map_err(x11_error)?
            .check()
            .map_err(x11_error)?;
        self.conn.free_gc(gc).map_err(x11_error)?;

        Ok(pixmap)
    }
}

fn grab_status(status: xproto::GrabStatus) -> GrabStatus {
    if status == xproto::GrabStatus::SUCCESS {
        GrabStatus::Success
    } else if status == xproto::GrabStatus::ALREADY_GRABBED {
        GrabStatus::AlreadyGrabbed
    } else if status == xproto::GrabStatus::INVALID_TIME {
        GrabStatus::InvalidTime
    } else if status == xproto::GrabStatus::NOT_VIEWABLE {
        GrabStatus::NotViewable
    } else {
        GrabStatus::Frozen
    }
}

impl LockDisplay for X11Display {
    type Surface = Window;
    type Cursor = xproto::Cursor;
    type Color = AllocatedColor;

    fn create_surface(&mut self) -> Result<Window, DisplayError> {
        let root = self.screen().root;
        let window = self.conn.generate_id().map_err(x11_error)?;

        // Input-only and override-redirect: never drawn, never managed
        let aux = CreateWindowAux::new()
            .override_redirect(1)
            .event_mask(EventMask::KEY_PRESS);
        self.conn
            .create_window(
                COPY_DEPTH_FROM_PARENT,
                window,
                root,
                0,
                0,
                1,
                1,
                0,
                WindowClass::INPUT_ONLY,
                COPY_FROM_PARENT,
                &aux,
            )
            .map_err(x11_error)?
            .check()
            .map_err(x11_error)?;

        Ok(window)
    }

    fn alloc_color(&mut self, color: Rgb) -> Result<AllocatedColor, DisplayError> {
        let (red, green, blue) = color.to_u16();
        let colormap = self.screen().default_colormap;
        let reply = self
            .conn
            .alloc_color(colormap, red, green, blue)
            .map_err(x11_error)?
            .reply()
            .map_err(x11_error)?;

        Ok(AllocatedColor {
            red: reply.red,
            green: reply.green,
            blue: reply.blue,
        })
    }

    fn create_cursor(
        &mut self,
        surface: Window,
        descriptor: &CursorDescriptor,
        fg: AllocatedColor,
        bg: AllocatedColor,
    ) -> Result<xproto::Cursor, DisplayError> {
        descriptor
            .validate()
            .map_err(|e| DisplayError::new(e.to_string()))?;

        let root = self.screen().root;
        let (width, height) = (descriptor.width, descriptor.height);
        let source = self.upload_bitmap(root, width, height, &descriptor.fg_bitmap)?;
        let mask = self.upload_bitmap(root, width, height, &descriptor.bg_bitmap)?;

        let cursor = self.conn.generate_id().map_err(x11_error)?;
        self.conn
            .create_cursor(
                cursor,
                source,
                mask,
                fg.red,
                fg.green,
                fg.blue,
                bg.red,
                bg.green,
                bg.blue,
                descriptor.x_hot,
                descriptor.y_hot,
            )
            .map_err(x11_error)?
            .check()
            .map_err(x11_error)?;

        self.conn.free_pixmap(source).map_err(x11_error)?;
        self.conn.free_pixmap(mask).map_err(x11_error)?;
        debug!("Created {}x{} cursor on window {:#x}", width, height, surface);

        Ok(cursor)
    }

    fn map_surface(&mut self, surface: Window) -> Result<(), DisplayError> {
        self.conn.map_window(surface).map_err(x11_error)?;
        Ok(())
    }

    fn grab_keyboard(&mut self, surface: Window) -> Result<GrabStatus, DisplayError> {
        let reply = self
            .conn
            .grab_keyboard(false, surface, CURRENT_TIME, GrabMode::ASYNC, GrabMode::ASYNC)
            .map_err(x11_error)?
            .reply()
            .map_err(x11_error)?;
        Ok(grab_status(reply.status))
    }

    fn grab_pointer(
        &mut self,
        surface: Window,
        cursor: xproto::Cursor,
    ) -> Result<GrabStatus, DisplayError> {
        let reply = self
            .conn
            .grab_pointer(
                false,
                surface,
                EventMask::NO_EVENT,
                GrabMode::ASYNC,
                GrabMode::ASYNC,
                NONE,
                cursor,
                CURRENT_TIME,
            )
            .map_err(x11_error)?
            .reply()
            .map_err(x11_error)?;
        Ok(grab_status(reply.status))
    }

    fn flush(&mut self) -> Result<(), DisplayError> {
        self.conn.flush().map_err(x11_error)
    }

    fn open_input_context(&mut self) -> Result<(), DisplayError> {
        let version = self
            .conn
            .xkb_use_extension(XKB_MAJOR, XKB_MINOR)
            .map_err(x11_error)?
            .reply()
            .map_err(x11_error)?;
        if !version.supported {
            return Err(DisplayError::new(format!(
                "X server has XKB {}.{}, need {}.{}",
                version.server_major, version.server_minor, XKB_MAJOR, XKB_MINOR
            )));
        }

        self.device_id = xkb::x11::get_core_keyboard_device_id(&self.conn);
        if self.device_id < 0 {
            return Err(DisplayError::new("no XKB core keyboard device"));
        }

        let parts = keymap_parts();
        self.conn
            .xkb_select_events(
                xkb_proto::ID::USE_CORE_KBD.into(),
                EventType::from(0u16),
                EventType::NEW_KEYBOARD_NOTIFY | EventType::MAP_NOTIFY | EventType::STATE_NOTIFY,
                parts,
                parts,
                &SelectEventsAux::new(),
            )
            .map_err(x11_error)?
            .check()
            .map_err(x11_error)?;

        self.load_keymap();
        Ok(())
    }

    fn wait_for_event(&mut self) -> Option<DisplayEvent> {
        match self.conn.wait_for_event() {
            Ok(Event::KeyPress(event)) => Some(DisplayEvent::KeyPress(KeyPress {
                time: event.time,
                keycode: event.detail,
                state: u16::from(event.state),
            })),
            Ok(Event::XkbStateNotify(event)) => {
                if let Some(decoder) = self.decoder.as_mut() {
                    decoder.update_state(StateMasks::from(&event));
                }
                Some(DisplayEvent::Other)
            }
            Ok(Event::XkbNewKeyboardNotify(_)) | Ok(Event::XkbMapNotify(_)) => {
                info!("Keyboard mapping changed, reloading");
                self.load_keymap();
                Some(DisplayEvent::Other)
            }
            Ok(Event::Error(e)) => {
                debug!("Ignoring X error: {:?}", e.error_kind);
                Some(DisplayEvent::Other)
            }
            Ok(_) => Some(DisplayEvent::Other),
            Err(e) => {
                warn!("X connection error: {}", e);
                self.failed = true;
                None
            }
        }
    }

    fn connection_has_error(&self) -> bool {
        self.failed
    }

    fn lookup_string(&mut self, key: &KeyPress, buf: &mut [u8]) -> Lookup {
        match self.decoder.as_mut() {
            Some(decoder) => decoder.lookup_into(key, buf),
            None => Lookup::nothing(),
        }
    }

    fn release(&mut self, surface: Window) -> Result<(), DisplayError> {
        self.conn.ungrab_pointer(CURRENT_TIME).map_err(x11_error)?;
        self.conn.ungrab_keyboard(CURRENT_TIME).map_err(x11_error)?;
        self.conn.destroy_window(surface).map_err(x11_error)?;
        self.conn.flush().map_err(x11_error)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const LSB_BYTE_PAD: BitmapFormat = BitmapFormat {
        scanline_pad: 8,
        scanline_unit: 8,
        msb_bit_order: false,
        msb_byte_order: false,
    };

    #[test]
    fn test_byte_padded_lsb_is_unchanged() {
        let bits = [0b0000_0001, 0b1000_0000];
        assert_eq!(server_bitmap(&bits, 8, 2, LSB_BYTE_PAD), bits.to_vec());
    }

    #[test]
    fn test_rows_padded_to_scanline() {
        let format = BitmapFormat {
            scanline_pad: 32,
            ..LSB_BYTE_PAD
        };
        // 10 pixels wide: 2 source bytes per row, 4 on the server
        let bits = [0xff, 0x03, 0x01, 0x02];
        assert_eq!(
            server_bitmap(&bits, 10, 2, format),
            vec![0xff, 0x03, 0, 0, 0x01, 0x02, 0, 0]
        );
    }

    #[test]
    fn test_msb_bit_order_reverses_bits() {
        let format = BitmapFormat {
            msb_bit_order: true,
            ..LSB_BYTE_PAD
        };
        assert_eq!(server_bitmap(&[0b0000_0001], 8, 1, format), vec![0b1000_0000]);
    }

    #[test]
    fn test_msb_byte_order_swaps_within_unit() {
        let format = BitmapFormat {
            scanline_pad: 32,
            scanline_unit: 32,
            msb_bit_order: false,
            msb_byte_order: true,
        };
        assert_eq!(
            server_bitmap(&[0x01, 0x02], 16, 1, format),
            vec![0, 0, 0x02, 0x01]
        );
    }

    #[test]
    fn test_short_input_is_zero_filled() {
        assert_eq!(server_bitmap(&[0xaa], 8, 2, LSB_BYTE_PAD), vec![0xaa, 0]);
    }

    #[test]
    fn test_grab_status_mapping() {
        assert_eq!(grab_status(xproto::GrabStatus::SUCCESS), GrabStatus::Success);
        assert_eq!(
            grab_status(xproto::GrabStatus::ALREADY_GRABBED),
            GrabStatus::AlreadyGrabbed
        );
        assert_eq!(grab_status(xproto::GrabStatus::FROZEN), GrabStatus::Frozen);
    }
}
