//! Cursor shown while the pointer is grabbed
//!
//! The descriptor is read from the first `trlock/cursor.json` found on the
//! XDG data search path. Bitmaps use XBM layout: rows padded to whole bytes,
//! least significant bit first. Without a file the built-in padlock is used.

use std::ffi::OsString;
use std::fs;
use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};
use tracing::debug;

use crate::error::CursorError;
use crate::PROGRAM_NAME;

/// File name looked up in each data directory
pub const CURSOR_FILE_NAME: &str = "cursor.json";

/// Fallback for an unset or empty `XDG_DATA_DIRS`
const DEFAULT_DATA_DIRS: &str = "/usr/local/share:/usr/share";

/// 8-bit RGB color, stored in files as `[r, g, b]`
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct Rgb(pub u8, pub u8, pub u8);

impl Rgb {
    pub const BLACK: Rgb = Rgb(0, 0, 0);
    pub const WHITE: Rgb = Rgb(255, 255, 255);

    /// Scale to the 16-bit channels used by the X protocol
    pub fn to_u16(self) -> (u16, u16, u16) {
        let scale = |c: u8| u16::from(c) * 257;
        (scale(self.0), scale(self.1), scale(self.2))
    }
}

/// Pointer shape: two 1-bit bitmaps, a hotspot and two colors
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct CursorDescriptor {
    pub width: u16,
    pub height: u16,
    pub x_hot: u16,
    pub y_hot: u16,
    /// Pixels drawn in `fg_color`
    #[serde(with = "base64_bitmap")]
    pub fg_bitmap: Vec<u8>,
    /// Mask: pixels drawn at all (in `bg_color` where `fg_bitmap` is clear)
    #[serde(with = "base64_bitmap")]
    pub bg_bitmap: Vec<u8>,
    pub fg_color: Rgb,
    pub bg_color: Rgb,
}

mod base64_bitmap {
    use base64::{engine::general_purpose::STANDARD, Engine as _};
    use serde::{Deserialize, Deserializer, Serializer};

    pub fn serialize<S>(bytes: &[u8], serializer: S) -> Result<S::Ok, S::Error>
    where
        S: Serializer,
    {
        serializer.serialize_str(&STANDARD.encode(bytes))
    }

    pub fn deserialize<'de, D>(deserializer: D) -> Result<Vec<u8>, D::Error>
    where
        D: Deserializer<'de>,
    {
        let s = String::deserialize(deserializer)?;
        STANDARD.decode(s.as_bytes()).map_err(serde::de::Error::custom)
    }
}

/// Built-in padlock. `#` is foreground, `+` is background, `.` is clear.
const PADLOCK: [&str; 16] = [
    "................",
    ".....++++++.....",
    "....+######+....",
    "...+##++++##+...",
    "...+#+....+#+...",
    "...+#+....+#+...",
    "..++#++++++#++..",
    "..+##########+..",
    "..+####++####+..",
    "..+###+..+###+..",
    "..+####++####+..",
    "..+####++####+..",
    "..+##########+..",
    "..+##########+..",
    "..++++++++++++..",
    "................",
];

impl CursorDescriptor {
    /// Bytes per bitmap row
    pub fn stride(&self) -> usize {
        (usize::from(self.width) + 7) / 8
    }

    /// Check geometry and bitmap sizes
    pub fn validate(&self) -> Result<(), CursorError> {
        if self.width == 0 || self.height == 0 {
            return Err(CursorError::Invalid(format!(
                "dimensions must be non-zero, got {}x{}",
                self.width, self.height
            )));
        }
        if self.x_hot >= self.width || self.y_hot >= self.height {
            return Err(CursorError::Invalid(format!(
                "hotspot ({}, {}) outside {}x{} image",
                self.x_hot, self.y_hot, self.width, self.height
            )));
        }
        let expected = self.stride() * usize::from(self.height);
        for (name, bitmap) in [("fg_bitmap", &self.fg_bitmap), ("bg_bitmap", &self.bg_bitmap)] {
            if bitmap.len() != expected {
                return Err(CursorError::Invalid(format!(
                    "{} has {} bytes, expected {}",
                    name,
                    bitmap.len(),
                    expected
                )));
            }
        }
        Ok(())
    }

    /// Parse and validate a JSON descriptor
    pub fn from_json(data: &[u8]) -> Result<Self, CursorError> {
        let cursor: Self = serde_json::from_slice(data)?;
        cursor.validate()?;
        Ok(cursor)
    }

    /// Read a descriptor file
    pub fn load_file(path: &Path) -> Result<Self, CursorError> {
        let data = fs::read(path)?;
        Self::from_json(&data)
    }

    /// Load the first cursor file on the search path, or the built-in one
    pub fn load(search_dirs: &[PathBuf]) -> Result<Self, CursorError> {
        match find_cursor_file(search_dirs) {
            Some(path) => {
                debug!("Loading cursor from {:?}", path);
                Self::load_file(&path)
            }
            None => {
                debug!("No cursor file found, using built-in cursor");
                Ok(Self::default())
            }
        }
    }

    /// Build a cursor from ASCII art rows of equal width
    fn from_art(rows: &[&str], x_hot: u16, y_hot: u16) -> Self {
        let width = rows.first().map(|r| r.len()).unwrap_or(0);
        let stride = (width + 7) / 8;
        let mut fg_bitmap = vec![0u8; stride * rows.len()];
        let mut bg_bitmap = vec![0u8; stride * rows.len()];

        for (y, row) in rows.iter().enumerate() {
            for (x, pixel) in row.bytes().enumerate() {
                let index = y * stride + x / 8;
                let bit = 1u8 << (x % 8);
                match pixel {
                    b'#' => {
                        fg_bitmap[index] |= bit;
                        bg_bitmap[index] |= bit;
                    }
                    b'+' => bg_bitmap[index] |= bit,
                    _ => {}
                }
            }
        }

        Self {
            width: width as u16,
            height: rows.len() as u16,
            x_hot,
            y_hot,
            fg_bitmap,
            bg_bitmap,
            fg_color: Rgb::BLACK,
            bg_color: Rgb::WHITE,
        }
    }
}

impl Default for CursorDescriptor {
    fn default() -> Self {
        Self::from_art(&PADLOCK, 8, 8)
    }
}

/// Data directories in lookup order: `$XDG_DATA_HOME`, then `$XDG_DATA_DIRS`
pub fn data_search_dirs() -> Vec<PathBuf> {
    search_dirs_from(dirs::data_dir(), std::env::var_os("XDG_DATA_DIRS"))
}

fn search_dirs_from(data_home: Option<PathBuf>, data_dirs: Option<OsString>) -> Vec<PathBuf> {
    let data_dirs = data_dirs
        .filter(|dirs| !dirs.is_empty())
        .unwrap_or_else(|| OsString::from(DEFAULT_DATA_DIRS));

    data_home
        .into_iter()
        .chain(std::env::split_paths(&data_dirs).filter(|p| p.is_absolute()))
        .map(|dir| dir.join(PROGRAM_NAME))
        .collect()
}

/// First existing `cursor.json` among `search_dirs`
pub fn find_cursor_file(search_dirs: &[PathBuf]) -> Option<PathBuf> {
    search_dirs
        .iter()
        .map(|dir| dir.join(CURSOR_FILE_NAME))
        .find(|path| path.exists())
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::tempdir;

    fn sample_json() -> String {
        // 8x2 cursor: one byte per row
        r#"{
            "width": 8, "height": 2, "x_hot": 1, "y_hot": 1,
            "fg_bitmap": "AP8=", "bg_bitmap": "//8=",
            "fg_color": [0, 0, 0], "bg_color": [255, 128, 0]
        }"#
        .to_string()
    }

    #[test]
    fn test_default_cursor_is_valid() {
        let cursor = CursorDescriptor::default();
        cursor.validate().unwrap();
        assert_eq!((cursor.width, cursor.height), (16, 16));
        assert_eq!(cursor.fg_bitmap.len(), 32);
    }

    #[test]
    fn test_default_cursor_foreground_is_inside_mask() {
        let cursor = CursorDescriptor::default();
        for (fg, mask) in cursor.fg_bitmap.iter().zip(&cursor.bg_bitmap) {
            assert_eq!(fg & !mask, 0);
        }
    }

    #[test]
    fn test_art_bit_order_is_lsb_first() {
        let cursor = CursorDescriptor::from_art(&["#.......+"], 0, 0);
        assert_eq!(cursor.stride(), 2);
        assert_eq!(cursor.fg_bitmap, vec![0b0000_0001, 0]);
        assert_eq!(cursor.bg_bitmap, vec![0b0000_0001, 0b0000_0001]);
    }

    #[test]
    fn test_parse_json() {
        let cursor = CursorDescriptor::from_json(sample_json().as_bytes()).unwrap();
        assert_eq!(cursor.fg_bitmap, vec![0x00, 0xff]);
        assert_eq!(cursor.bg_bitmap, vec![0xff, 0xff]);
        assert_eq!(cursor.bg_color, Rgb(255, 128, 0));
    }

    #[test]
    fn test_color_out_of_range_is_rejected() {
        let json = sample_json().replace("[255, 128, 0]", "[256, 0, 0]");
        assert!(matches!(
            CursorDescriptor::from_json(json.as_bytes()),
            Err(CursorError::Json(_))
        ));
    }

    #[test]
    fn test_bitmap_size_mismatch_is_rejected() {
        let json = sample_json().replace("\"AP8=\"", "\"AA==\"");
        assert!(matches!(
            CursorDescriptor::from_json(json.as_bytes()),
            Err(CursorError::Invalid(_))
        ));
    }

    #[test]
    fn test_hotspot_outside_is_rejected() {
        let json = sample_json().replace("\"x_hot\": 1", "\"x_hot\": 8");
        assert!(matches!(
            CursorDescriptor::from_json(json.as_bytes()),
            Err(CursorError::Invalid(_))
        ));
    }

    #[test]
    fn test_rgb_scaling() {
        assert_eq!(Rgb::WHITE.to_u16(), (65535, 65535, 65535));
        assert_eq!(Rgb(1, 0, 128).to_u16(), (257, 0, 32896));
    }

    #[test]
    fn test_search_dirs_order_and_default() {
        let dirs = search_dirs_from(Some(PathBuf::from("/home/u/.local/share")), None);
        assert_eq!(
            dirs,
            vec![
                PathBuf::from("/home/u/.local/share/trlock"),
                PathBuf::from("/usr/local/share/trlock"),
                PathBuf::from("/usr/share/trlock"),
            ]
        );

        let dirs = search_dirs_from(None, Some(OsString::from("/opt/share:relative")));
        assert_eq!(dirs, vec![PathBuf::from("/opt/share/trlock")]);
    }

    #[test]
    fn test_load_prefers_first_match() {
        let first = tempdir().unwrap();
        let second = tempdir().unwrap();
        fs::write(second.path().join(CURSOR_FILE_NAME), sample_json()).unwrap();

        let search = vec![first.path().to_path_buf(), second.path().to_path_buf()];
        let cursor = CursorDescriptor::load(&search).unwrap();
        assert_eq!(cursor.width, 8);

        fs::write(first.path().join(CURSOR_FILE_NAME), "{not json").unwrap();
        assert!(CursorDescriptor::load(&search).is_err());
    }

    #[test]
    fn test_load_falls_back_to_default() {
        let empty = tempdir().unwrap();
        let cursor = CursorDescriptor::load(&[empty.path().to_path_buf()]).unwrap();
        assert_eq!(cursor, CursorDescriptor::default());
    }
}
