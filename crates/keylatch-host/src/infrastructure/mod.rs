//! Infrastructure layer for the host.
//!
//! Contains OS-facing adapters: the filter DLL loader and hook, the raw
//! input window and message loop, `SendInput` injection, and the config file.

pub mod input_capture;
pub mod input_emulation;
pub mod storage;
