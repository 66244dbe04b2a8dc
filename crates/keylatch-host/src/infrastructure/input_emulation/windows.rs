//! Windows input emulation via `SendInput`.
//!
//! # Safety
//!
//! This module uses `unsafe` code exclusively for Windows API FFI calls.
//! All `unsafe` blocks are annotated with `// SAFETY:` comments.

#![cfg(target_os = "windows")]

use keylatch_core::synth::{CharKey, InputInjector, KeyInput, KeyLayout, SynthError};
use keylatch_core::KeyAction;
use windows::Win32::UI::Input::KeyboardAndMouse::{
    MapVirtualKeyW, SendInput, VkKeyScanW, INPUT, INPUT_0, INPUT_KEYBOARD, KEYBDINPUT,
    KEYBD_EVENT_FLAGS, KEYEVENTF_EXTENDEDKEY, KEYEVENTF_KEYUP, KEYEVENTF_SCANCODE,
    MAPVK_VK_TO_VSC, MAPVK_VSC_TO_VK_EX, VIRTUAL_KEY,
};

/// [`InputInjector`] backed by `SendInput`.
pub struct SendInputInjector;

impl SendInputInjector {
    pub fn new() -> Self {
        Self
    }
}

impl Default for SendInputInjector {
    fn default() -> Self {
        Self::new()
    }
}

impl InputInjector for SendInputInjector {
    fn inject(&self, inputs: &[KeyInput]) -> Result<(), SynthError> {
        if inputs.is_empty() {
            return Ok(());
        }
        let records: Vec<INPUT> = inputs.iter().map(to_input).collect();

        // SAFETY: records is a slice of fully initialised INPUT structures.
        let accepted =
            unsafe { SendInput(&records, std::mem::size_of::<INPUT>() as i32) } as usize;

        if accepted == records.len() {
            Ok(())
        } else {
            let os_error = std::io::Error::last_os_error()
                .raw_os_error()
                .unwrap_or_default() as u32;
            Err(SynthError::Injection {
                requested: records.len(),
                accepted,
                os_error,
            })
        }
    }
}

/// The `dwFlags` of the `KEYBDINPUT` for `input`.
fn keybd_flags(input: &KeyInput) -> KEYBD_EVENT_FLAGS {
    let mut flags = KEYBD_EVENT_FLAGS(0);
    if input.action == KeyAction::Break {
        flags |= KEYEVENTF_KEYUP;
    }
    if input.extended {
        flags |= KEYEVENTF_EXTENDEDKEY;
    }
    if input.use_scancode {
        flags |= KEYEVENTF_SCANCODE;
    }
    flags
}

fn to_input(input: &KeyInput) -> INPUT {
    INPUT {
        r#type: INPUT_KEYBOARD,
        Anonymous: INPUT_0 {
            ki: KEYBDINPUT {
                wVk: VIRTUAL_KEY(input.virtual_key),
                wScan: input.scancode,
                dwFlags: keybd_flags(input),
                time: 0,
                dwExtraInfo: 0,
            },
        },
    }
}

/// [`KeyLayout`] answering from the calling thread's active keyboard layout.
pub struct Win32Layout;

impl Win32Layout {
    pub fn new() -> Self {
        Self
    }
}

impl Default for Win32Layout {
    fn default() -> Self {
        Self::new()
    }
}

impl KeyLayout for Win32Layout {
    fn scan_char(&self, unit: u16) -> Option<CharKey> {
        // SAFETY: VkKeyScanW only reads the active layout.
        CharKey::from_vk_key_scan(unsafe { VkKeyScanW(unit) })
    }

    fn virtual_key_to_scancode(&self, virtual_key: u16) -> u16 {
        // SAFETY: MapVirtualKeyW only reads the active layout.
        unsafe { MapVirtualKeyW(u32::from(virtual_key), MAPVK_VK_TO_VSC) as u16 }
    }

    fn scancode_to_virtual_key(&self, extended_scancode: u16) -> u16 {
        // SAFETY: MapVirtualKeyW only reads the active layout.
        unsafe { MapVirtualKeyW(u32::from(extended_scancode), MAPVK_VSC_TO_VK_EX) as u16 }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn record(action: KeyAction, extended: bool, use_scancode: bool) -> KeyInput {
        KeyInput {
            virtual_key: 0xA3,
            scancode: 0x1d,
            action,
            extended,
            use_scancode,
        }
    }

    #[test]
    fn test_make_by_virtual_key_has_no_flags() {
        let flags = keybd_flags(&record(KeyAction::Make, false, false));

        assert_eq!(flags, KEYBD_EVENT_FLAGS(0));
    }

    #[test]
    fn test_extended_scancode_break_sets_all_flags() {
        let flags = keybd_flags(&record(KeyAction::Break, true, true));

        assert_eq!(flags, KEYEVENTF_KEYUP | KEYEVENTF_EXTENDEDKEY | KEYEVENTF_SCANCODE);
    }

    #[test]
    fn test_to_input_copies_codes() {
        let input = to_input(&record(KeyAction::Make, true, true));

        assert_eq!(input.r#type, INPUT_KEYBOARD);
        // SAFETY: the union was written through its `ki` member.
        let ki = unsafe { input.Anonymous.ki };
        assert_eq!(ki.wVk, VIRTUAL_KEY(0xA3));
        assert_eq!(ki.wScan, 0x1d);
    }

    #[test]
    fn test_empty_batch_is_not_submitted() {
        assert!(SendInputInjector::new().inject(&[]).is_ok());
    }
}
