//! Input capture infrastructure for the host.
//!
//! Two OS facilities feed the keyboard pipeline:
//!
//! - The **interception hook**: the filter DLL's `LowLevelKeyboardProc`
//!   installed as a `WH_KEYBOARD_LL` hook.  It swallows marked keys and calls
//!   back into the host with the swallowed keystroke.
//! - **Raw input**: `WM_INPUT` messages delivered to a message-only window,
//!   decoded by the core's `RawInputDecoder`.  Raw input observes every key,
//!   including ones the hook swallows.
//!
//! Both are serviced by a single Win32 message loop thread.  Hook callbacks
//! must return quickly or Windows silently removes the hook, so the work done
//! per keystroke is bounded by the registered handlers.
//!
//! # Testability
//!
//! The [`InterceptionHook`] trait lets the application layer be tested
//! without loading a DLL or touching the global hook chain.

use keylatch_core::keymap::InterceptionMaps;

pub mod mock;

#[cfg(target_os = "windows")]
pub mod windows;

/// Error type for interception hook operations.
#[derive(Debug, thiserror::Error)]
pub enum HookError {
    #[error("failed to load filter library `{library}`: {reason}")]
    LibraryLoad { library: String, reason: String },

    #[error("filter library does not export `{0}`")]
    MissingExport(&'static str),

    #[error("filter library rejected its arguments (HRESULT {0:#010x})")]
    InvalidArgument(i32),

    #[error("filter library was already initialized by another caller")]
    AlreadyInitialized,

    #[error("failed to install keyboard hook: {0}")]
    Install(String),

    #[error("failed to remove keyboard hook: {0}")]
    Uninstall(String),

    #[error("platform not supported: {0}")]
    UnsupportedPlatform(String),
}

/// Error type for raw input registration and the message loop.
#[derive(Debug, thiserror::Error)]
pub enum RawInputError {
    #[error("failed to create raw input window: {0}")]
    Window(String),

    #[error("failed to register raw keyboard input: {0}")]
    Register(String),

    #[error("failed to unregister raw keyboard input: {0}")]
    Unregister(String),

    #[error("failed to read raw input data: {0}")]
    Read(String),

    #[error("message loop failed: {0}")]
    MessageLoop(String),

    #[error("input loop thread failed: {0}")]
    Thread(String),
}

/// How the raw keyboard device is registered.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RawInputOptions {
    /// Receive input even when the host window is not in the foreground
    /// (`RIDEV_INPUTSINK`).
    pub sink: bool,
    /// Suppress legacy `WM_KEYDOWN`-style messages for the window
    /// (`RIDEV_NOLEGACY`).
    pub no_legacy: bool,
}

impl Default for RawInputOptions {
    fn default() -> Self {
        Self {
            sink: true,
            no_legacy: false,
        }
    }
}

/// Installs and removes the system-wide interception hook.
///
/// The first successful [`install`](Self::install) binds the filter to
/// `maps`.  The binding is permanent: later installs reuse it and only
/// replace the hook registration.
#[cfg_attr(test, mockall::automock)]
pub trait InterceptionHook {
    /// Binds the filter (first call only) and installs the hook, replacing
    /// any existing registration.
    fn install(&mut self, maps: &'static InterceptionMaps) -> Result<(), HookError>;

    /// Removes the hook registration.  A no-op when not installed.
    fn uninstall(&mut self) -> Result<(), HookError>;

    /// Returns `true` while a hook registration is active.
    fn is_installed(&self) -> bool;
}
