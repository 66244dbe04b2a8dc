//! # keylatch-core
//!
//! Platform-neutral core of keylatch: the pieces of the keyboard pipeline
//! that decide, remember and synthesize, with every OS call pushed behind a
//! trait.
//!
//! # Architecture overview (for beginners)
//!
//! keylatch watches the keyboard of a Windows desktop and lets user logic
//! observe, suppress, or remap key transitions in real time.  A key press
//! travels through two independent paths:
//!
//! - The **interception filter** (crate `keylatch-filter`) sits on the
//!   system-wide low-level keyboard hook.  It checks four [`SharedKeyMap`]s
//!   and swallows the keystroke if its code is marked.
//! - The **raw input decoder** ([`domain::decoder`]) receives a copy of every
//!   keystroke through the Raw Input API, tracks which keys are held down,
//!   and fires **latches**: callbacks from the [`domain::registry`] that
//!   observe without suppressing.
//!
//! User logic reacts by calling the [`synth::Synthesizer`], which converts key
//! and text requests back into input records for the OS to inject.
//!
//! This crate contains:
//!
//! - **`keymap`** – 256-bit key sets and the virtual-key metadata table.
//! - **`domain`** – key events, the latch registry and the raw input decoder.
//! - **`synth`** – key, key-sequence and text synthesis.

pub mod domain;
pub mod keymap;
pub mod synth;

pub use domain::decoder::RawInputDecoder;
pub use domain::event::{CodeSpace, KeyAction, KeyEvent, RawKeyboard};
pub use domain::registry::{CallbackRegistry, Dispatch, HandlerError, KeyHandler};
pub use keymap::{wrap_index, InterceptionMaps, KeyCode, KeyMap, SharedKeyMap};
pub use synth::{InputInjector, KeyInput, KeyLayout, SynthError, Synthesizer};
