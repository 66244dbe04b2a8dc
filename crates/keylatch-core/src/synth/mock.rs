//! Recording injector and fixed keyboard layout for tests.
//!
//! # Why a mock injector?
//!
//! The real injector calls `SendInput`, which presses keys on whatever
//! machine runs the tests and cannot be observed from Rust.  The
//! `MockInputInjector` records every submitted batch in a `Mutex<Vec<...>>`
//! instead, so assertions can check exactly which records were injected, in
//! which order, and how they were grouped into batches.
//!
//! `FixedLayout` answers layout questions from a small built-in US table, so
//! text-injection tests do not depend on the keyboard layout of the test
//! machine.

use std::sync::Mutex;

use crate::synth::{CharKey, InputInjector, KeyInput, KeyLayout, ModifierState, SynthError};

/// An injector that records each submitted batch.
#[derive(Default)]
pub struct MockInputInjector {
    /// Every batch passed to `inject`, in submission order.
    pub submitted: Mutex<Vec<Vec<KeyInput>>>,
    /// When `true`, `inject` records nothing and returns an injection error.
    pub should_fail: bool,
}

impl MockInputInjector {
    pub fn new() -> Self {
        Self::default()
    }

    /// An injector whose every call fails.
    pub fn failing() -> Self {
        Self {
            should_fail: true,
            ..Self::default()
        }
    }

    /// A copy of every recorded batch.
    pub fn batches(&self) -> Vec<Vec<KeyInput>> {
        self.submitted.lock().map(|b| b.clone()).unwrap_or_default()
    }

    /// Every recorded record, flattened across batches.
    pub fn records(&self) -> Vec<KeyInput> {
        self.batches().into_iter().flatten().collect()
    }

    pub fn clear(&self) {
        if let Ok(mut submitted) = self.submitted.lock() {
            submitted.clear();
        }
    }
}

impl InputInjector for MockInputInjector {
    fn inject(&self, inputs: &[KeyInput]) -> Result<(), SynthError> {
        if self.should_fail {
            return Err(SynthError::Injection {
                requested: inputs.len(),
                accepted: 0,
                os_error: 0x5,
            });
        }
        if let Ok(mut submitted) = self.submitted.lock() {
            submitted.push(inputs.to_vec());
        }
        Ok(())
    }
}

/// A US QWERTY layout with one AltGr character (`€` on AltGr+E).
#[derive(Debug, Default, Clone, Copy)]
pub struct FixedLayout;

/// (virtual key, set-1 scancode) for the keys the fixed layout knows.
const SCANCODES: &[(u16, u16)] = &[
    (0x08, 0x0e), (0x09, 0x0f), (0x0d, 0x1c), (0x10, 0x2a), (0x11, 0x1d),
    (0x12, 0x38), (0x1b, 0x01), (0x20, 0x39),
    (0x25, 0x4b), (0x26, 0x48), (0x27, 0x4d), (0x28, 0x50),
    (0x30, 0x0b), (0x31, 0x02), (0x32, 0x03), (0x33, 0x04), (0x34, 0x05),
    (0x35, 0x06), (0x36, 0x07), (0x37, 0x08), (0x38, 0x09), (0x39, 0x0a),
    (0x41, 0x1e), (0x42, 0x30), (0x43, 0x2e), (0x44, 0x20), (0x45, 0x12),
    (0x46, 0x21), (0x47, 0x22), (0x48, 0x23), (0x49, 0x17), (0x4a, 0x24),
    (0x4b, 0x25), (0x4c, 0x26), (0x4d, 0x32), (0x4e, 0x31), (0x4f, 0x18),
    (0x50, 0x19), (0x51, 0x10), (0x52, 0x13), (0x53, 0x1f), (0x54, 0x14),
    (0x55, 0x16), (0x56, 0x2f), (0x57, 0x11), (0x58, 0x2d), (0x59, 0x15),
    (0x5a, 0x2c),
    (0xa0, 0x2a), (0xa1, 0x36), (0xa2, 0x1d), (0xa3, 0x1d), (0xa4, 0x38), (0xa5, 0x38),
    (0xba, 0x27), (0xbb, 0x0d), (0xbc, 0x33), (0xbd, 0x0c), (0xbe, 0x34), (0xbf, 0x35),
];

impl FixedLayout {
    pub fn us() -> Self {
        Self
    }
}

impl KeyLayout for FixedLayout {
    fn scan_char(&self, unit: u16) -> Option<CharKey> {
        let ch = char::from_u32(u32::from(unit))?;
        let (virtual_key, bits) = match ch {
            'a'..='z' => (ch as u16 - u16::from(b'a') + 0x41, 0),
            'A'..='Z' => (ch as u16 - u16::from(b'A') + 0x41, 0x1),
            '0'..='9' => (ch as u16, 0),
            ' ' => (0x20, 0),
            '\t' => (0x09, 0),
            '\r' => (0x0d, 0),
            '!' => (0x31, 0x1),
            '@' => (0x32, 0x1),
            '#' => (0x33, 0x1),
            ';' => (0xba, 0),
            ':' => (0xba, 0x1),
            '=' => (0xbb, 0),
            '+' => (0xbb, 0x1),
            ',' => (0xbc, 0),
            '-' => (0xbd, 0),
            '_' => (0xbd, 0x1),
            '.' => (0xbe, 0),
            '/' => (0xbf, 0),
            '?' => (0xbf, 0x1),
            '€' => (0x45, 0x6),
            _ => return None,
        };
        Some(CharKey {
            virtual_key,
            modifiers: ModifierState::from_scan_bits(bits),
        })
    }

    fn virtual_key_to_scancode(&self, virtual_key: u16) -> u16 {
        SCANCODES
            .iter()
            .find(|(vk, _)| *vk == virtual_key)
            .map_or(0, |&(_, sc)| sc)
    }

    fn scancode_to_virtual_key(&self, extended_scancode: u16) -> u16 {
        match extended_scancode {
            0x1d => 0xa2,
            0xe01d => 0xa3,
            0x38 => 0xa4,
            0xe038 => 0xa5,
            0x2a => 0xa0,
            0x36 => 0xa1,
            0xe04b => 0x25,
            0xe048 => 0x26,
            0xe04d => 0x27,
            0xe050 => 0x28,
            sc if sc <= 0xff => SCANCODES
                .iter()
                .find(|(vk, code)| *code == sc && !(0xa0..=0xa5).contains(vk))
                .map_or(0, |&(vk, _)| vk),
            _ => 0,
        }
    }
}
