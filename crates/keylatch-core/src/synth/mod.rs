//! Key synthesis: turning logical key and text requests into hardware-shaped
//! input records.
//!
//! The [`Synthesizer`] never calls the OS directly.  It builds [`KeyInput`]
//! records and hands them to an [`InputInjector`], and it asks a
//! [`KeyLayout`] how characters and codes map onto the active keyboard
//! layout.  The host supplies `SendInput`/`VkKeyScanW` implementations of
//! both traits; tests use the recording doubles in [`mock`].
//!
//! # The three operations
//!
//! - [`Synthesizer::send_key`]: one record, injected immediately.
//! - [`Synthesizer::send_key_sequence`]: a make/break pair per virtual key,
//!   submitted in batches of [`INPUT_BATCH_CAPACITY`].
//! - [`Synthesizer::send_text`]: every character becomes its virtual key
//!   bracketed by whatever shift/control/alt/hankaku state it needs.  All
//!   modifiers are released before the call returns.

pub mod batch;
pub mod mock;
pub mod text;

use std::fmt;
use std::sync::Arc;

use thiserror::Error;
use tracing::warn;

use crate::domain::event::{CodeSpace, KeyAction};

pub use batch::{InputBatch, INPUT_BATCH_CAPACITY};
pub use text::{ModifierState, Utf8Chunker, BOUNDARY_RETRIES, UTF16_BUFFER_UNITS};

pub const VK_SHIFT: u16 = 0x10;
pub const VK_CONTROL: u16 = 0x11;
pub const VK_MENU: u16 = 0x12;
pub const VK_OEM_AUTO: u16 = 0xF3;

/// The scancode prefix that marks an extended key.
pub const EXTENDED_PREFIX_E0: u8 = 0xE0;

/// Why a piece of text could not be decoded.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DecodeFailure {
    /// The bytes are not valid UTF-8.
    InvalidSequence,
    /// The decoded chunk never fit the output buffer within the retry budget.
    InsufficientBuffer,
}

impl fmt::Display for DecodeFailure {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            DecodeFailure::InvalidSequence => f.write_str("invalid UTF-8 sequence"),
            DecodeFailure::InsufficientBuffer => f.write_str("insufficient output buffer"),
        }
    }
}

/// Errors produced while synthesizing input.
#[derive(Debug, Error)]
pub enum SynthError {
    /// The OS accepted fewer records than were submitted.
    #[error("input injection accepted {accepted} of {requested} records (os error {os_error:#x})")]
    Injection {
        requested: usize,
        accepted: usize,
        os_error: u32,
    },

    /// Part of a text string could not be decoded and was skipped.
    #[error("text decode failed at byte {offset}: {reason}")]
    Decode { offset: usize, reason: DecodeFailure },

    /// No key on the active layout produces this UTF-16 unit.
    #[error("no key produces U+{0:04X} on the active layout")]
    Unmappable(u16),
}

/// One keyboard input record, the platform-neutral form of `KEYBDINPUT`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct KeyInput {
    pub virtual_key: u16,
    pub scancode: u16,
    pub action: KeyAction,
    /// Set `KEYEVENTF_EXTENDEDKEY`.
    pub extended: bool,
    /// Inject by scancode (`KEYEVENTF_SCANCODE`) rather than virtual key.
    pub use_scancode: bool,
}

impl KeyInput {
    /// A plain virtual-key record.
    pub fn virtual_key(virtual_key: u16, scancode: u16, action: KeyAction) -> Self {
        Self {
            virtual_key,
            scancode,
            action,
            extended: false,
            use_scancode: false,
        }
    }
}

/// The virtual key and modifiers that type a character on the active layout.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct CharKey {
    pub virtual_key: u16,
    pub modifiers: ModifierState,
}

impl CharKey {
    /// Decodes a `VkKeyScanW` result: low byte is the virtual key, high byte
    /// the modifier bits.  Both bytes `0xFF` means no key produces the
    /// character.
    pub fn from_vk_key_scan(result: i16) -> Option<Self> {
        let [low, high] = result.to_le_bytes();
        if low == 0xFF && high == 0xFF {
            return None;
        }
        Some(Self {
            virtual_key: u16::from(low),
            modifiers: ModifierState::from_scan_bits(high),
        })
    }
}

/// Submits input records to the OS.
pub trait InputInjector: Send + Sync {
    /// Injects `inputs` in order as a single batch.
    ///
    /// # Errors
    ///
    /// Returns [`SynthError::Injection`] if the OS rejects any record.
    fn inject(&self, inputs: &[KeyInput]) -> Result<(), SynthError>;
}

/// Answers layout questions about the active keyboard layout.
pub trait KeyLayout: Send + Sync {
    /// Resolves a UTF-16 unit to a key and modifier state, or `None` if no
    /// key produces it.
    fn scan_char(&self, unit: u16) -> Option<CharKey>;

    /// Maps a virtual key to its scancode, `0` if it has none.
    fn virtual_key_to_scancode(&self, virtual_key: u16) -> u16;

    /// Maps a prefixed scancode (`prefix << 8 | code`) to a virtual key that
    /// distinguishes left and right, `0` if it has none.
    fn scancode_to_virtual_key(&self, extended_scancode: u16) -> u16;
}

/// Builds and injects synthetic key input.
#[derive(Clone)]
pub struct Synthesizer {
    injector: Arc<dyn InputInjector>,
    layout: Arc<dyn KeyLayout>,
}

impl Synthesizer {
    pub fn new(injector: Arc<dyn InputInjector>, layout: Arc<dyn KeyLayout>) -> Self {
        Self { injector, layout }
    }

    pub fn layout(&self) -> &dyn KeyLayout {
        self.layout.as_ref()
    }

    fn vk_record(&self, virtual_key: u16, action: KeyAction) -> KeyInput {
        KeyInput::virtual_key(virtual_key, self.layout.virtual_key_to_scancode(virtual_key), action)
    }

    /// Builds the record for a single key transition.
    ///
    /// A scancode request resolves its virtual key from the prefixed scancode
    /// and injects by scancode; a virtual-key request resolves its scancode.
    /// The extended flag is set when `extended_prefix` is `0xE0`.
    pub fn key_record(
        &self,
        space: CodeSpace,
        action: KeyAction,
        code: u16,
        extended_prefix: Option<u8>,
    ) -> KeyInput {
        let prefix = extended_prefix.unwrap_or(0);
        let extended = prefix == EXTENDED_PREFIX_E0;
        match space {
            CodeSpace::VirtualKey => KeyInput {
                extended,
                ..self.vk_record(code, action)
            },
            CodeSpace::Scancode => KeyInput {
                virtual_key: self
                    .layout
                    .scancode_to_virtual_key((u16::from(prefix) << 8) | (code & 0xFF)),
                scancode: code,
                action,
                extended,
                use_scancode: true,
            },
        }
    }

    /// Injects one key transition immediately.
    ///
    /// # Errors
    ///
    /// Returns [`SynthError::Injection`] if the OS rejects the record.
    pub fn send_key(
        &self,
        space: CodeSpace,
        action: KeyAction,
        code: u16,
        extended_prefix: Option<u8>,
    ) -> Result<(), SynthError> {
        let record = self.key_record(space, action, code, extended_prefix);
        self.injector.inject(std::slice::from_ref(&record))
    }

    /// Types each virtual key in `codes` as a make immediately followed by a
    /// break.
    ///
    /// Every pair is attempted even if an earlier batch fails.
    ///
    /// # Errors
    ///
    /// Returns the first injection failure.
    pub fn send_key_sequence(&self, codes: &[u16]) -> Result<(), SynthError> {
        let mut batch = InputBatch::new();
        let mut first_error = None;

        for &vk in codes {
            batch.push(self.vk_record(vk, KeyAction::Make));
            batch.push(self.vk_record(vk, KeyAction::Break));
            if let Err(e) = batch.flush(self.injector.as_ref(), false) {
                warn!("key sequence batch failed: {e}");
                first_error.get_or_insert(e);
            }
        }
        if let Err(e) = batch.flush(self.injector.as_ref(), true) {
            warn!("key sequence batch failed: {e}");
            first_error.get_or_insert(e);
        }

        first_error.map_or(Ok(()), Err)
    }

    /// Types every string in `strings`, character by character.
    ///
    /// Characters that cannot be decoded or have no key on the active layout
    /// are skipped; typing continues with the next character.  All four
    /// modifiers are released and the batch is flushed before returning,
    /// whatever happened along the way.
    ///
    /// # Errors
    ///
    /// Returns the first failure encountered.  The whole input has still been
    /// processed.
    pub fn send_text<S: AsRef<[u8]>>(&self, strings: &[S]) -> Result<(), SynthError> {
        let mut session = TextSession::new(self);
        let mut units = Vec::with_capacity(UTF16_BUFFER_UNITS);

        for string in strings {
            let mut chunker = Utf8Chunker::new(string.as_ref());
            while let Some(chunk) = chunker.next_into(&mut units) {
                match chunk {
                    Ok(_) => {
                        for &unit in &units {
                            session.type_unit(unit);
                        }
                    }
                    Err(e) => session.fail(e),
                }
            }
        }

        session.finish()
    }
}

/// Per-call state of [`Synthesizer::send_text`].
struct TextSession<'a> {
    synth: &'a Synthesizer,
    batch: InputBatch,
    modifiers: ModifierState,
    first_error: Option<SynthError>,
}

impl<'a> TextSession<'a> {
    fn new(synth: &'a Synthesizer) -> Self {
        Self {
            synth,
            batch: InputBatch::new(),
            modifiers: ModifierState::RELEASED,
            first_error: None,
        }
    }

    fn fail(&mut self, error: SynthError) {
        warn!("send_text: {error}");
        self.first_error.get_or_insert(error);
    }

    fn emit(&mut self, virtual_key: u16, action: KeyAction) {
        let record = self.synth.vk_record(virtual_key, action);
        self.batch.push(record);
        if let Err(e) = self.batch.flush(self.synth.injector.as_ref(), false) {
            self.fail(e);
        }
    }

    fn reconcile(&mut self, target: ModifierState) {
        let mut modifiers = self.modifiers;
        let mut pending = Vec::with_capacity(4);
        modifiers.reconcile(target, |vk, action| pending.push((vk, action)));
        self.modifiers = modifiers;
        for (vk, action) in pending {
            self.emit(vk, action);
        }
    }

    fn type_unit(&mut self, unit: u16) {
        let Some(key) = self.synth.layout.scan_char(unit) else {
            self.fail(SynthError::Unmappable(unit));
            return;
        };
        self.reconcile(key.modifiers);
        self.emit(key.virtual_key, KeyAction::Make);
        self.emit(key.virtual_key, KeyAction::Break);
    }

    fn finish(mut self) -> Result<(), SynthError> {
        self.reconcile(ModifierState::RELEASED);
        if let Err(e) = self.batch.flush(self.synth.injector.as_ref(), true) {
            self.fail(e);
        }
        self.first_error.map_or(Ok(()), Err)
    }
}

#[cfg(test)]
mod tests {
    use super::mock::{FixedLayout, MockInputInjector};
    use super::*;

    fn synthesizer() -> (Arc<MockInputInjector>, Synthesizer) {
        let injector = Arc::new(MockInputInjector::new());
        let synth = Synthesizer::new(injector.clone(), Arc::new(FixedLayout::us()));
        (injector, synth)
    }

    fn transitions(injector: &MockInputInjector) -> Vec<(u16, KeyAction)> {
        injector
            .records()
            .into_iter()
            .map(|r| (r.virtual_key, r.action))
            .collect()
    }

    #[test]
    fn test_char_key_from_vk_key_scan() {
        let shifted_a = CharKey::from_vk_key_scan(0x0141).expect("mapped");
        assert_eq!(shifted_a.virtual_key, 0x41);
        assert!(shifted_a.modifiers.shift);
        assert!(!shifted_a.modifiers.control);

        assert_eq!(CharKey::from_vk_key_scan(-1), None);
    }

    #[test]
    fn test_send_virtual_key_resolves_scancode() {
        // Arrange
        let (injector, synth) = synthesizer();

        // Act
        synth
            .send_key(CodeSpace::VirtualKey, KeyAction::Make, 0x41, None)
            .expect("inject");

        // Assert
        let batches = injector.batches();
        assert_eq!(batches.len(), 1);
        assert_eq!(
            batches[0],
            vec![KeyInput {
                virtual_key: 0x41,
                scancode: 0x1e,
                action: KeyAction::Make,
                extended: false,
                use_scancode: false,
            }]
        );
    }

    #[test]
    fn test_send_extended_scancode_sets_flags() {
        let (injector, synth) = synthesizer();

        synth
            .send_key(CodeSpace::Scancode, KeyAction::Break, 0x1d, Some(0xE0))
            .expect("inject");

        let record = injector.records()[0];
        assert_eq!(record.virtual_key, 0xA3, "E0 1D is right control");
        assert_eq!(record.scancode, 0x1d);
        assert_eq!(record.action, KeyAction::Break);
        assert!(record.extended);
        assert!(record.use_scancode);
    }

    #[test]
    fn test_non_e0_prefix_is_not_extended() {
        let (_, synth) = synthesizer();
        let record = synth.key_record(CodeSpace::VirtualKey, KeyAction::Make, 0x41, Some(0xE1));
        assert!(!record.extended);
    }

    #[test]
    fn test_send_key_reports_injection_failure() {
        let synth = Synthesizer::new(
            Arc::new(MockInputInjector::failing()),
            Arc::new(FixedLayout::us()),
        );

        let result = synth.send_key(CodeSpace::VirtualKey, KeyAction::Make, 0x41, None);

        assert!(matches!(result, Err(SynthError::Injection { .. })));
    }

    #[test]
    fn test_key_sequence_batches_are_even_and_bounded() {
        // Arrange: 40 keys = 80 records = 32 + 32 + 16.
        let (injector, synth) = synthesizer();
        let codes: Vec<u16> = (0..40).map(|i| 0x41 + (i % 26)).collect();

        // Act
        synth.send_key_sequence(&codes).expect("inject");

        // Assert
        let sizes: Vec<usize> = injector.batches().iter().map(Vec::len).collect();
        assert_eq!(sizes, vec![32, 32, 16]);

        let records = injector.records();
        for (pair, &vk) in records.chunks(2).zip(&codes) {
            assert_eq!(pair[0].virtual_key, vk);
            assert_eq!(pair[0].action, KeyAction::Make);
            assert_eq!(pair[1].virtual_key, vk);
            assert_eq!(pair[1].action, KeyAction::Break);
        }
    }

    #[test]
    fn test_key_sequence_empty_sends_nothing() {
        let (injector, synth) = synthesizer();
        synth.send_key_sequence(&[]).expect("no-op");
        assert!(injector.batches().is_empty());
    }

    #[test]
    fn test_send_text_shifted_letter_brackets_shift() {
        let (injector, synth) = synthesizer();

        synth.send_text(&["A"]).expect("typed");

        assert_eq!(
            transitions(&injector),
            vec![
                (VK_SHIFT, KeyAction::Make),
                (0x41, KeyAction::Make),
                (0x41, KeyAction::Break),
                (VK_SHIFT, KeyAction::Break),
            ]
        );
    }

    #[test]
    fn test_send_text_keeps_shift_across_consecutive_capitals() {
        let (injector, synth) = synthesizer();

        synth.send_text(&["ABc"]).expect("typed");

        assert_eq!(
            transitions(&injector),
            vec![
                (VK_SHIFT, KeyAction::Make),
                (0x41, KeyAction::Make),
                (0x41, KeyAction::Break),
                (0x42, KeyAction::Make),
                (0x42, KeyAction::Break),
                (VK_SHIFT, KeyAction::Break),
                (0x43, KeyAction::Make),
                (0x43, KeyAction::Break),
            ]
        );
    }

    #[test]
    fn test_send_text_releases_modifiers_after_unmappable_char() {
        // Arrange: 'A' needs shift; U+2603 has no key on the fixed layout.
        let (injector, synth) = synthesizer();

        // Act
        let result = synth.send_text(&["A\u{2603}"]);

        // Assert
        assert!(matches!(result, Err(SynthError::Unmappable(0x2603))));
        let seen = transitions(&injector);
        assert_eq!(seen.last(), Some(&(VK_SHIFT, KeyAction::Break)));
        assert_eq!(
            seen.iter().filter(|(vk, _)| *vk == VK_SHIFT).count(),
            2,
            "shift made once and broken once"
        );
    }

    #[test]
    fn test_send_text_continues_after_invalid_bytes() {
        let (injector, synth) = synthesizer();
        let input: [&[u8]; 2] = [b"a\xFFb", b"c"];

        let result = synth.send_text(&input);

        assert!(matches!(result, Err(SynthError::Decode { offset: 1, .. })));
        let typed: Vec<u16> = transitions(&injector)
            .into_iter()
            .filter(|(_, a)| *a == KeyAction::Make)
            .map(|(vk, _)| vk)
            .collect();
        assert_eq!(typed, vec![0x41, 0x42, 0x43]);
    }

    #[test]
    fn test_send_text_altgr_character_uses_control_and_alt() {
        let (injector, synth) = synthesizer();

        synth.send_text(&["€"]).expect("typed");

        assert_eq!(
            transitions(&injector),
            vec![
                (VK_CONTROL, KeyAction::Make),
                (VK_MENU, KeyAction::Make),
                (0x45, KeyAction::Make),
                (0x45, KeyAction::Break),
                (VK_CONTROL, KeyAction::Break),
                (VK_MENU, KeyAction::Break),
            ]
        );
    }

    #[test]
    fn test_send_text_flushes_full_batches_and_final_partial() {
        let (injector, synth) = synthesizer();
        let text = "a".repeat(20);

        synth.send_text(&[text]).expect("typed");

        let sizes: Vec<usize> = injector.batches().iter().map(Vec::len).collect();
        assert_eq!(sizes, vec![32, 8]);
    }

    #[test]
    fn test_send_text_with_no_input_sends_nothing() {
        let (injector, synth) = synthesizer();
        let empty: [&str; 0] = [];

        synth.send_text(&empty).expect("no-op");

        assert!(injector.batches().is_empty());
    }
}
