//! Key events and the raw keyboard record they are decoded from.

use std::fmt;

use serde::{Deserialize, Serialize};

/// Which numbering a key code belongs to.
///
/// The two spaces are never mixed inside a single key map.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum CodeSpace {
    /// OS-normalised logical key (`VK_*`).
    VirtualKey,
    /// Hardware-dependent scan code.
    Scancode,
}

/// Direction of a key transition.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum KeyAction {
    /// Key-down.
    Make,
    /// Key-up.
    Break,
}

impl KeyAction {
    /// `true` for [`KeyAction::Make`].
    pub fn is_make(self) -> bool {
        matches!(self, KeyAction::Make)
    }
}

/// An immutable, normalised key transition.
///
/// Codes are kept at their delivered width; key maps wrap them on lookup.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct KeyEvent {
    pub virtual_key: u16,
    pub scancode: u16,
    /// The `E0` extended-key prefix was present.
    pub e0: bool,
    /// The `E1` extended-key prefix was present.
    pub e1: bool,
    pub extra_info: u32,
    pub action: KeyAction,
}

impl KeyEvent {
    /// Returns this event's code in the given space.
    pub fn code(&self, space: CodeSpace) -> u16 {
        match space {
            CodeSpace::VirtualKey => self.virtual_key,
            CodeSpace::Scancode => self.scancode,
        }
    }

    /// Normalises a raw keyboard record.
    pub fn from_raw(raw: &RawKeyboard) -> Self {
        Self {
            virtual_key: raw.vkey,
            scancode: raw.make_code,
            e0: raw.flags & RawKeyboard::KEY_E0 != 0,
            e1: raw.flags & RawKeyboard::KEY_E1 != 0,
            extra_info: raw.extra_information,
            action: if raw.flags & RawKeyboard::KEY_BREAK != 0 {
                KeyAction::Break
            } else {
                KeyAction::Make
            },
        }
    }
}

/// Compact form used in debug logs: `M:E0 1d:11`, with `:extra` appended
/// when extra info is non-zero.
impl fmt::Display for KeyEvent {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(if self.action.is_make() { "M:" } else { "B:" })?;
        if self.e0 {
            f.write_str("E0 ")?;
        }
        if self.e1 {
            f.write_str("E1 ")?;
        }
        write!(f, "{:x}:{:x}", self.scancode, self.virtual_key)?;
        if self.extra_info != 0 {
            write!(f, ":{:x}", self.extra_info)?;
        }
        Ok(())
    }
}

/// The keyboard half of a `RAWINPUT` record, mirroring `RAWKEYBOARD`.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct RawKeyboard {
    pub make_code: u16,
    pub flags: u16,
    pub vkey: u16,
    pub message: u32,
    pub extra_information: u32,
}

impl RawKeyboard {
    /// `RI_KEY_BREAK`
    pub const KEY_BREAK: u16 = 0x01;
    /// `RI_KEY_E0`
    pub const KEY_E0: u16 = 0x02;
    /// `RI_KEY_E1`
    pub const KEY_E1: u16 = 0x04;
    /// `KEYBOARD_OVERRUN_MAKE_CODE`: the device's buffer overflowed.
    pub const OVERRUN_MAKE_CODE: u16 = 0xFF;

    /// Returns `true` if this record reports a keyboard buffer overrun.
    pub fn is_overrun(&self) -> bool {
        self.make_code == Self::OVERRUN_MAKE_CODE
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_from_raw_make_with_e0() {
        // Arrange
        let raw = RawKeyboard {
            make_code: 0x1d,
            flags: RawKeyboard::KEY_E0,
            vkey: 0x11,
            message: 0x100,
            extra_information: 0,
        };

        // Act
        let event = KeyEvent::from_raw(&raw);

        // Assert
        assert_eq!(event.action, KeyAction::Make);
        assert!(event.e0);
        assert!(!event.e1);
        assert_eq!(event.code(CodeSpace::Scancode), 0x1d);
        assert_eq!(event.code(CodeSpace::VirtualKey), 0x11);
        assert_eq!(event.to_string(), "M:E0 1d:11");
    }

    #[test]
    fn test_from_raw_break_with_extra_info() {
        let raw = RawKeyboard {
            make_code: 0x1e,
            flags: RawKeyboard::KEY_BREAK | RawKeyboard::KEY_E1,
            vkey: 0x41,
            message: 0x101,
            extra_information: 0xbeef,
        };

        let event = KeyEvent::from_raw(&raw);

        assert_eq!(event.action, KeyAction::Break);
        assert!(event.e1);
        assert_eq!(event.extra_info, 0xbeef);
        assert_eq!(event.to_string(), "B:E1 1e:41:beef");
    }

    #[test]
    fn test_overrun_sentinel_detected() {
        let raw = RawKeyboard {
            make_code: RawKeyboard::OVERRUN_MAKE_CODE,
            ..Default::default()
        };
        assert!(raw.is_overrun());
        assert!(!RawKeyboard::default().is_overrun());
    }
}
