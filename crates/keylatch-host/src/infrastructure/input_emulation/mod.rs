//! Input emulation infrastructure: the OS side of key synthesis.
//!
//! The core's `Synthesizer` builds platform-neutral `KeyInput` records and
//! asks a `KeyLayout` about the active keyboard layout.  On Windows both
//! traits are implemented here on top of `SendInput`, `VkKeyScanW` and
//! `MapVirtualKeyW`.  Tests use the recording doubles in
//! `keylatch_core::synth::mock` instead.

#[cfg(target_os = "windows")]
pub mod windows;
