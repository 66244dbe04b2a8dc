//! `KeyboardService`: the surface user logic programs against.
//!
//! The service owns every piece of host-side keyboard state and wires the
//! core components together:
//!
//! ```text
//!  WM_INPUT ──► process_raw_keyboard ──► RawInputDecoder ──► latches
//!  hook callback ──► on_intercepted ──────────────────────► interceptions
//!                                                              │
//!                                   handlers (&KeyEvent, &mut Synthesizer)
//! ```
//!
//! Registering an interception does two things: it marks the code in the
//! shared filter map the hook reads, and it records the handler the hook
//! callback will dispatch to.  Both are undone together.
//!
//! The service lives on the input loop thread and is never shared; handlers
//! are not `Send`.

use keylatch_core::keymap::{InterceptionMaps, KeyMap};
use keylatch_core::{
    CallbackRegistry, CodeSpace, Dispatch, HandlerError, KeyAction, KeyEvent, RawInputDecoder,
    RawKeyboard, SynthError, Synthesizer,
};
use tracing::{debug, info};

use crate::infrastructure::input_capture::{HookError, InterceptionHook};

/// The host-side keyboard pipeline.
pub struct KeyboardService {
    maps: &'static InterceptionMaps,
    hook: Box<dyn InterceptionHook>,
    decoder: RawInputDecoder,
    latches: CallbackRegistry<Synthesizer>,
    interceptions: CallbackRegistry<Synthesizer>,
    synth: Synthesizer,
}

impl KeyboardService {
    /// Creates a service that marks interceptions in `maps` and installs the
    /// filter through `hook`.
    pub fn new(
        maps: &'static InterceptionMaps,
        hook: Box<dyn InterceptionHook>,
        synth: Synthesizer,
    ) -> Self {
        Self {
            maps,
            hook,
            decoder: RawInputDecoder::new(),
            latches: CallbackRegistry::new(),
            interceptions: CallbackRegistry::new(),
            synth,
        }
    }

    // ── Latches ───────────────────────────────────────────────────────────────

    /// Registers an observe-only handler, replacing any existing one.
    pub fn listen<F>(&mut self, space: CodeSpace, action: KeyAction, code: u16, handler: F)
    where
        F: FnMut(&KeyEvent, &mut Synthesizer) -> Result<(), HandlerError> + 'static,
    {
        self.latches.register(space, action, code, handler);
    }

    /// Removes a latch.  Returns `true` if one was registered.
    pub fn stop_listening(&mut self, space: CodeSpace, action: KeyAction, code: u16) -> bool {
        self.latches.deregister(space, action, code)
    }

    // ── Interceptions ─────────────────────────────────────────────────────────

    /// Registers a handler for a key the hook should swallow.
    pub fn intercept<F>(&mut self, space: CodeSpace, action: KeyAction, code: u16, handler: F)
    where
        F: FnMut(&KeyEvent, &mut Synthesizer) -> Result<(), HandlerError> + 'static,
    {
        self.interceptions.register(space, action, code, handler);
        self.maps.get(space, action).set(code);
    }

    /// Lets the key through again.  Returns `true` if it was intercepted.
    pub fn stop_intercepting(&mut self, space: CodeSpace, action: KeyAction, code: u16) -> bool {
        self.maps.get(space, action).clear(code);
        self.interceptions.deregister(space, action, code)
    }

    /// Entry point for the filter's callbacks: dispatches a swallowed key.
    pub fn on_intercepted(&mut self, space: CodeSpace, event: &KeyEvent) -> Dispatch {
        let outcome = self.interceptions.dispatch(
            space,
            event.action,
            event.code(space),
            event,
            &mut self.synth,
        );
        if outcome == Dispatch::Unregistered {
            debug!(?space, %event, "intercepted key has no handler");
        }
        outcome
    }

    // ── Raw input ─────────────────────────────────────────────────────────────

    /// Entry point for `WM_INPUT` keyboard records.
    pub fn process_raw_keyboard(&mut self, raw: &RawKeyboard) -> Option<KeyEvent> {
        self.decoder.process(raw, &mut self.latches, &mut self.synth)
    }

    /// Forgets every held key.
    pub fn reset_made_keys(&mut self) {
        self.decoder.reset();
    }

    pub fn is_virtual_key_made(&self, code: u16) -> bool {
        self.decoder.is_virtual_key_made(code)
    }

    pub fn is_scancode_made(&self, code: u16) -> bool {
        self.decoder.is_scancode_made(code)
    }

    pub fn made_virtual_keys(&self) -> &KeyMap {
        self.decoder.made_virtual_keys()
    }

    pub fn made_scancodes(&self) -> &KeyMap {
        self.decoder.made_scancodes()
    }

    /// Codes with a latch for (`space`, `action`).
    pub fn latches(&self, space: CodeSpace, action: KeyAction) -> &KeyMap {
        self.latches.members(space, action)
    }

    /// Codes the filter swallows for (`space`, `action`), as the hook sees
    /// them right now.
    pub fn interceptions(&self, space: CodeSpace, action: KeyAction) -> KeyMap {
        self.maps.get(space, action).snapshot()
    }

    // ── Synthesis ─────────────────────────────────────────────────────────────

    pub fn send_key(
        &self,
        space: CodeSpace,
        action: KeyAction,
        code: u16,
        extended_prefix: Option<u8>,
    ) -> Result<(), SynthError> {
        self.synth.send_key(space, action, code, extended_prefix)
    }

    pub fn send_keys(&self, codes: &[u16]) -> Result<(), SynthError> {
        self.synth.send_key_sequence(codes)
    }

    pub fn send_text<S: AsRef<[u8]>>(&self, strings: &[S]) -> Result<(), SynthError> {
        self.synth.send_text(strings)
    }

    // ── Hook lifecycle ────────────────────────────────────────────────────────

    /// Installs the interception hook.  Calling again replaces the
    /// registration.
    pub fn hook(&mut self) -> Result<(), HookError> {
        self.hook.install(self.maps)?;
        info!("interception hook installed");
        Ok(())
    }

    /// Removes the interception hook.  Interceptions stay registered and take
    /// effect again on the next [`hook`](Self::hook).
    pub fn unhook(&mut self) -> Result<(), HookError> {
        if self.hook.is_installed() {
            self.hook.uninstall()?;
            info!("interception hook removed");
        }
        Ok(())
    }

    pub fn is_hooked(&self) -> bool {
        self.hook.is_installed()
    }
}
