//! Raw keyboard decoding and depressed-key state.
//!
//! [`RawInputDecoder::process`] is called once per `WM_INPUT` keyboard
//! record on the host's message thread.  It:
//!
//! 1. Rejects keyboard buffer overrun records (scancode `0xFF`).  These carry
//!    no real key, so state is left untouched and nothing is dispatched.
//! 2. Normalises the record into a [`KeyEvent`].
//! 3. Sets (make) or clears (break) the virtual-key and scancode bits in the
//!    depressed-key maps.
//! 4. Fires the virtual-key latch, then the scancode latch.  Both may fire for
//!    the same physical event; a fault in one does not stop the other.

use tracing::{debug, warn};

use crate::domain::event::{CodeSpace, KeyAction, KeyEvent, RawKeyboard};
use crate::domain::registry::CallbackRegistry;
use crate::keymap::KeyMap;

/// Tracks which keys are currently held down.
#[derive(Debug, Default)]
pub struct RawInputDecoder {
    made_virtual_keys: KeyMap,
    made_scancodes: KeyMap,
}

impl RawInputDecoder {
    pub fn new() -> Self {
        Self::default()
    }

    /// Updates depressed-key state from `raw` and returns the decoded event.
    ///
    /// Returns `None` for a buffer overrun record.
    pub fn decode(&mut self, raw: &RawKeyboard) -> Option<KeyEvent> {
        if raw.is_overrun() {
            warn!(vk = raw.vkey, flags = raw.flags, "keyboard buffer overrun detected");
            return None;
        }

        let event = KeyEvent::from_raw(raw);
        match event.action {
            KeyAction::Make => {
                debug!(%event, "key made");
                self.made_scancodes.set(event.scancode);
                self.made_virtual_keys.set(event.virtual_key);
            }
            KeyAction::Break => {
                self.made_scancodes.clear(event.scancode);
                self.made_virtual_keys.clear(event.virtual_key);
            }
        }
        Some(event)
    }

    /// Decodes `raw` and fires any latches registered for its codes.
    pub fn process<C>(
        &mut self,
        raw: &RawKeyboard,
        latches: &mut CallbackRegistry<C>,
        context: &mut C,
    ) -> Option<KeyEvent> {
        let event = self.decode(raw)?;
        for space in [CodeSpace::VirtualKey, CodeSpace::Scancode] {
            latches.dispatch(space, event.action, event.code(space), &event, context);
        }
        Some(event)
    }

    /// Returns `true` while virtual key `code` is held down.
    pub fn is_virtual_key_made(&self, code: impl Into<u32>) -> bool {
        self.made_virtual_keys.is_set(code)
    }

    /// Returns `true` while scancode `code` is held down.
    pub fn is_scancode_made(&self, code: impl Into<u32>) -> bool {
        self.made_scancodes.is_set(code)
    }

    pub fn made_virtual_keys(&self) -> &KeyMap {
        &self.made_virtual_keys
    }

    pub fn made_scancodes(&self) -> &KeyMap {
        &self.made_scancodes
    }

    /// Forgets every held key, e.g. after the host regains input focus.
    pub fn reset(&mut self) {
        self.made_virtual_keys.clear_all();
        self.made_scancodes.clear_all();
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::registry::HandlerError;

    fn raw(vk: u16, sc: u16, flags: u16) -> RawKeyboard {
        RawKeyboard {
            make_code: sc,
            flags,
            vkey: vk,
            message: 0,
            extra_information: 0,
        }
    }

    #[test]
    fn test_make_then_break_tracks_state() {
        // Arrange
        let mut decoder = RawInputDecoder::new();

        // Act / Assert
        decoder.decode(&raw(0x41, 0x1e, 0));
        assert!(decoder.is_virtual_key_made(0x41u16));
        assert!(decoder.is_scancode_made(0x1eu16));

        decoder.decode(&raw(0x41, 0x1e, RawKeyboard::KEY_BREAK));
        assert!(!decoder.is_virtual_key_made(0x41u16));
        assert!(!decoder.is_scancode_made(0x1eu16));
    }

    #[test]
    fn test_overrun_is_ignored_without_touching_state() {
        let mut decoder = RawInputDecoder::new();
        decoder.decode(&raw(0x41, 0x1e, 0));
        let before_vk = *decoder.made_virtual_keys();
        let before_sc = *decoder.made_scancodes();

        let event = decoder.decode(&raw(0xFF, RawKeyboard::OVERRUN_MAKE_CODE, 0));

        assert!(event.is_none());
        assert_eq!(*decoder.made_virtual_keys(), before_vk);
        assert_eq!(*decoder.made_scancodes(), before_sc);
        assert!(!decoder.is_scancode_made(0xFFu16));
    }

    #[test]
    fn test_both_latches_fire_once_each() {
        // Arrange
        let mut decoder = RawInputDecoder::new();
        let mut latches: CallbackRegistry<Vec<&'static str>> = CallbackRegistry::new();
        latches.register(CodeSpace::VirtualKey, KeyAction::Make, 0x11u16, |_, log| {
            log.push("vk");
            Ok(())
        });
        latches.register(CodeSpace::Scancode, KeyAction::Make, 0x1du16, |_, log| {
            log.push("sc");
            Ok(())
        });
        let mut log = Vec::new();

        // Act
        decoder.process(&raw(0x11, 0x1d, RawKeyboard::KEY_E0), &mut latches, &mut log);

        // Assert
        assert_eq!(log, vec!["vk", "sc"]);
    }

    #[test]
    fn test_break_latches_use_break_tables() {
        let mut decoder = RawInputDecoder::new();
        let mut latches: CallbackRegistry<u32> = CallbackRegistry::new();
        latches.register(CodeSpace::VirtualKey, KeyAction::Make, 0x41u16, |_, n| {
            *n += 1;
            Ok(())
        });
        latches.register(CodeSpace::VirtualKey, KeyAction::Break, 0x41u16, |_, n| {
            *n += 100;
            Ok(())
        });
        let mut total = 0;

        decoder.process(&raw(0x41, 0x1e, RawKeyboard::KEY_BREAK), &mut latches, &mut total);

        assert_eq!(total, 100);
    }

    #[test]
    fn test_failing_vk_latch_does_not_block_scancode_latch() {
        let mut decoder = RawInputDecoder::new();
        let mut latches: CallbackRegistry<u32> = CallbackRegistry::new();
        latches.register(CodeSpace::VirtualKey, KeyAction::Make, 0x41u16, |_, _| {
            Err(HandlerError::failed("bad script"))
        });
        latches.register(CodeSpace::Scancode, KeyAction::Make, 0x1eu16, |_, n| {
            *n += 1;
            Ok(())
        });
        let mut count = 0;

        let event = decoder.process(&raw(0x41, 0x1e, 0), &mut latches, &mut count);

        assert!(event.is_some());
        assert_eq!(count, 1);
        assert!(decoder.is_virtual_key_made(0x41u16));
    }

    #[test]
    fn test_reset_forgets_held_keys() {
        let mut decoder = RawInputDecoder::new();
        decoder.decode(&raw(0x10, 0x2a, 0));
        decoder.decode(&raw(0x41, 0x1e, 0));

        decoder.reset();

        assert!(decoder.made_virtual_keys().is_empty());
        assert!(decoder.made_scancodes().is_empty());
    }
}
