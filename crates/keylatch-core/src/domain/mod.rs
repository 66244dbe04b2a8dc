//! Domain entities for keylatch: key events, the latch registry and the raw
//! keyboard decoder.
//!
//! Nothing in this module talks to the operating system.  Raw keyboard
//! records arrive as plain structs ([`event::RawKeyboard`]) that the host's
//! infrastructure layer fills in from `GetRawInputData`, so every rule here
//! can be unit-tested on any platform.
//!
//! # Make, break, latch, interception (for beginners)
//!
//! A key **make** is a key-down transition and a **break** is a key-up.
//! A **latch** is a callback that observes a transition without changing it.
//! An **interception** is a callback that replaces the transition: the
//! keystroke is swallowed before any other application sees it.  Latches are
//! fired by the [`decoder::RawInputDecoder`]; interceptions are fired by the
//! privileged filter, which lives in the `keylatch-filter` crate.

/// Key events and the raw keyboard record they are decoded from.
pub mod event;

/// Code → handler registry with fault-isolated dispatch.
pub mod registry;

/// Raw keyboard decoding and depressed-key state.
pub mod decoder;
