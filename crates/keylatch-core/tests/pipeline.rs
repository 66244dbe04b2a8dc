//! Integration tests for the raw input → latch → synthesis pipeline.
//!
//! These tests drive `RawInputDecoder` + `CallbackRegistry<Synthesizer>` with
//! the recording injector, the same wiring the host uses on its message
//! thread.

use std::sync::Arc;

use keylatch_core::synth::mock::{FixedLayout, MockInputInjector};
use keylatch_core::synth::VK_SHIFT;
use keylatch_core::{
    CallbackRegistry, CodeSpace, HandlerError, KeyAction, RawInputDecoder, RawKeyboard,
    Synthesizer,
};

// ── Helpers ───────────────────────────────────────────────────────────────────

fn make(vk: u16, sc: u16) -> RawKeyboard {
    RawKeyboard {
        make_code: sc,
        flags: 0,
        vkey: vk,
        message: 0x100,
        extra_information: 0,
    }
}

fn release(vk: u16, sc: u16) -> RawKeyboard {
    RawKeyboard {
        flags: RawKeyboard::KEY_BREAK,
        message: 0x101,
        ..make(vk, sc)
    }
}

fn wiring() -> (Arc<MockInputInjector>, Synthesizer, CallbackRegistry<Synthesizer>) {
    let injector = Arc::new(MockInputInjector::new());
    let synth = Synthesizer::new(injector.clone(), Arc::new(FixedLayout::us()));
    (injector, synth, CallbackRegistry::new())
}

// ── Tests ─────────────────────────────────────────────────────────────────────

#[test]
fn test_latch_handler_types_text_on_make() {
    // Arrange
    let (injector, mut synth, mut latches) = wiring();
    let mut decoder = RawInputDecoder::new();
    latches.register(CodeSpace::VirtualKey, KeyAction::Make, 0x70u16, |_, synth: &mut Synthesizer| {
        synth.send_text(&["Hi"])?;
        Ok(())
    });

    // Act
    decoder.process(&make(0x70, 0x3b), &mut latches, &mut synth);

    // Assert
    let typed: Vec<(u16, KeyAction)> = injector
        .records()
        .iter()
        .map(|r| (r.virtual_key, r.action))
        .collect();
    assert_eq!(
        typed,
        vec![
            (VK_SHIFT, KeyAction::Make),
            (0x48, KeyAction::Make),
            (0x48, KeyAction::Break),
            (VK_SHIFT, KeyAction::Break),
            (0x49, KeyAction::Make),
            (0x49, KeyAction::Break),
        ]
    );
    assert!(decoder.is_virtual_key_made(0x70u16));
}

#[test]
fn test_vk_and_scancode_latches_fire_once_each() {
    let (injector, mut synth, mut latches) = wiring();
    let mut decoder = RawInputDecoder::new();
    latches.register(CodeSpace::VirtualKey, KeyAction::Make, 0x41u16, |_, synth: &mut Synthesizer| {
        synth.send_key_sequence(&[0x31])?;
        Ok(())
    });
    latches.register(CodeSpace::Scancode, KeyAction::Make, 0x1eu16, |_, synth: &mut Synthesizer| {
        synth.send_key_sequence(&[0x32])?;
        Ok(())
    });

    decoder.process(&make(0x41, 0x1e), &mut latches, &mut synth);

    let makes: Vec<u16> = injector
        .records()
        .iter()
        .filter(|r| r.action == KeyAction::Make)
        .map(|r| r.virtual_key)
        .collect();
    assert_eq!(makes.len(), 2);
    assert!(makes.contains(&0x31));
    assert!(makes.contains(&0x32));
}

#[test]
fn test_failing_handler_does_not_block_later_events() {
    let (injector, mut synth, mut latches) = wiring();
    let mut decoder = RawInputDecoder::new();
    latches.register(CodeSpace::VirtualKey, KeyAction::Make, 0x41u16, |_, _: &mut Synthesizer| {
        Err(HandlerError::failed("script error"))
    });
    latches.register(CodeSpace::VirtualKey, KeyAction::Break, 0x41u16, |_, synth: &mut Synthesizer| {
        synth.send_key_sequence(&[0x42])?;
        Ok(())
    });

    decoder.process(&make(0x41, 0x1e), &mut latches, &mut synth);
    decoder.process(&release(0x41, 0x1e), &mut latches, &mut synth);

    assert_eq!(injector.records().len(), 2);
    assert!(!decoder.is_virtual_key_made(0x41u16));
}

#[test]
fn test_injection_failure_inside_handler_is_contained() {
    let injector = Arc::new(MockInputInjector::failing());
    let mut synth = Synthesizer::new(injector, Arc::new(FixedLayout::us()));
    let mut latches: CallbackRegistry<Synthesizer> = CallbackRegistry::new();
    let mut decoder = RawInputDecoder::new();
    latches.register(CodeSpace::VirtualKey, KeyAction::Make, 0x41u16, |_, synth: &mut Synthesizer| {
        synth.send_key(CodeSpace::VirtualKey, KeyAction::Make, 0x42, None)?;
        Ok(())
    });

    let event = decoder.process(&make(0x41, 0x1e), &mut latches, &mut synth);

    assert!(event.is_some());
    assert!(decoder.is_scancode_made(0x1eu16));
}

#[test]
fn test_made_maps_track_held_keys_across_events() {
    let (_, mut synth, mut latches) = wiring();
    let mut decoder = RawInputDecoder::new();

    decoder.process(&make(0x10, 0x2a), &mut latches, &mut synth);
    decoder.process(&make(0x41, 0x1e), &mut latches, &mut synth);
    decoder.process(&release(0x10, 0x2a), &mut latches, &mut synth);

    assert_eq!(decoder.made_virtual_keys().iter().collect::<Vec<_>>(), vec![0x41]);
    assert_eq!(decoder.made_scancodes().iter().collect::<Vec<_>>(), vec![0x1e]);
}
