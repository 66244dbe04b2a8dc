//! # keylatch-filter
//!
//! The interception filter: a tiny library that runs on the system-wide
//! low-level keyboard hook and decides, for every hardware key transition,
//! whether to swallow it or forward it down the hook chain.
//!
//! # How the host and the filter talk (for beginners)
//!
//! The filter is built as a DLL.  The host loads it, calls the exported
//! `Initialize` function exactly once with the addresses of four
//! [`SharedKeyMap`]s and four [`InterceptCallback`]s, then installs the
//! exported `LowLevelKeyboardProc` as a `WH_KEYBOARD_LL` hook.  After that the
//! host only flips bits in the maps; the filter only reads them.
//!
//! Until `Initialize` succeeds the filter forwards everything.  Failing closed
//! here would swallow every keystroke on the desktop.
//!
//! The decision logic in this file is platform-neutral and tested on every
//! platform.  The Windows exports live in [`exports`].

use std::sync::OnceLock;

use keylatch_core::keymap::SharedKeyMap;
use thiserror::Error;

#[cfg(target_os = "windows")]
pub mod exports;

/// Signature of the host callbacks invoked for an intercepted keystroke:
/// `(virtual_key, scancode, extended, extra_info)`.
pub type InterceptCallback =
    extern "C" fn(virtual_key: u16, scancode: u16, extended: bool, extra_info: u32);

/// Errors from [`InterceptionFilter::bind`] and [`Binding::from_raw`].
#[derive(Debug, Error, Clone, Copy, PartialEq, Eq)]
pub enum FilterError {
    /// A required map or callback pointer was null.
    #[error("invalid argument: `{0}` is null")]
    InvalidArgument(&'static str),

    /// The filter already has a binding; it is never replaced.
    #[error("interception filter is already bound")]
    AlreadyBound,
}

/// Whether the hook should swallow or forward a keystroke.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Verdict {
    Forward,
    Swallow,
}

/// The hook message classes the filter distinguishes.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MessageClass {
    /// `WM_KEYDOWN` / `WM_SYSKEYDOWN`
    KeyDown,
    /// `WM_KEYUP` / `WM_SYSKEYUP`
    KeyUp,
    Other,
}

/// The fields of a `KBDLLHOOKSTRUCT` the filter looks at.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Keystroke {
    pub virtual_key: u32,
    pub scancode: u32,
    pub extended: bool,
    pub extra_info: u32,
}

/// The write-once link between the filter and the host.
#[derive(Debug, Clone, Copy)]
pub struct Binding {
    pub scancode_make: &'static SharedKeyMap,
    pub scancode_break: &'static SharedKeyMap,
    pub virtual_key_make: &'static SharedKeyMap,
    pub virtual_key_break: &'static SharedKeyMap,
    pub on_scancode_make: InterceptCallback,
    pub on_scancode_break: InterceptCallback,
    pub on_virtual_key_make: InterceptCallback,
    pub on_virtual_key_break: InterceptCallback,
}

impl Binding {
    /// Builds a binding from the raw `Initialize` arguments.
    ///
    /// # Errors
    ///
    /// [`FilterError::InvalidArgument`] naming the first null argument.
    ///
    /// # Safety
    ///
    /// Every non-null map pointer must point to a `SharedKeyMap` that stays
    /// valid for the rest of the process.
    #[allow(clippy::too_many_arguments)]
    pub unsafe fn from_raw(
        scancode_make: *const SharedKeyMap,
        scancode_break: *const SharedKeyMap,
        virtual_key_make: *const SharedKeyMap,
        virtual_key_break: *const SharedKeyMap,
        on_scancode_make: Option<InterceptCallback>,
        on_scancode_break: Option<InterceptCallback>,
        on_virtual_key_make: Option<InterceptCallback>,
        on_virtual_key_break: Option<InterceptCallback>,
    ) -> Result<Self, FilterError> {
        // SAFETY: caller guarantees non-null pointers live for the process.
        let map = |ptr: *const SharedKeyMap, name| unsafe {
            ptr.as_ref().ok_or(FilterError::InvalidArgument(name))
        };
        let callback = |cb: Option<InterceptCallback>, name| cb.ok_or(FilterError::InvalidArgument(name));

        Ok(Self {
            scancode_make: map(scancode_make, "scancode_make_filter")?,
            scancode_break: map(scancode_break, "scancode_break_filter")?,
            virtual_key_make: map(virtual_key_make, "virtual_key_make_filter")?,
            virtual_key_break: map(virtual_key_break, "virtual_key_break_filter")?,
            on_scancode_make: callback(on_scancode_make, "on_scancode_make")?,
            on_scancode_break: callback(on_scancode_break, "on_scancode_break")?,
            on_virtual_key_make: callback(on_virtual_key_make, "on_virtual_key_make")?,
            on_virtual_key_break: callback(on_virtual_key_break, "on_virtual_key_break")?,
        })
    }
}

/// The hook's decision engine.
///
/// Holds at most one [`Binding`], published through a `OnceLock` so the
/// hook thread observes a fully written binding or none at all.
pub struct InterceptionFilter {
    binding: OnceLock<Binding>,
}

impl InterceptionFilter {
    pub const fn new() -> Self {
        Self {
            binding: OnceLock::new(),
        }
    }

    /// Arms the filter.
    ///
    /// # Errors
    ///
    /// [`FilterError::AlreadyBound`] if a binding was already installed; the
    /// first binding stays in effect.
    pub fn bind(&self, binding: Binding) -> Result<(), FilterError> {
        self.binding.set(binding).map_err(|_| FilterError::AlreadyBound)
    }

    /// Returns `true` once a binding is installed.
    pub fn is_armed(&self) -> bool {
        self.binding.get().is_some()
    }

    /// Decides the fate of one keystroke.
    ///
    /// The virtual-key map is consulted before the scancode map: when both
    /// match, only the virtual-key callback runs.  Never allocates or blocks.
    pub fn filter(&self, class: MessageClass, keystroke: &Keystroke) -> Verdict {
        let Some(b) = self.binding.get() else {
            return Verdict::Forward;
        };

        let (vk_map, sc_map, on_vk, on_sc) = match class {
            MessageClass::KeyDown => (
                b.virtual_key_make,
                b.scancode_make,
                b.on_virtual_key_make,
                b.on_scancode_make,
            ),
            MessageClass::KeyUp => (
                b.virtual_key_break,
                b.scancode_break,
                b.on_virtual_key_break,
                b.on_scancode_break,
            ),
            MessageClass::Other => return Verdict::Forward,
        };

        let callback = if vk_map.is_set(keystroke.virtual_key) {
            on_vk
        } else if sc_map.is_set(keystroke.scancode) {
            on_sc
        } else {
            return Verdict::Forward;
        };

        callback(
            keystroke.virtual_key as u16,
            keystroke.scancode as u16,
            keystroke.extended,
            keystroke.extra_info,
        );
        Verdict::Swallow
    }
}

impl Default for InterceptionFilter {
    fn default() -> Self {
        Self::new()
    }
}
