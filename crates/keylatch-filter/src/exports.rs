//! C ABI exports of the filter DLL.
//!
//! The host resolves these two symbols by name with `GetProcAddress`:
//!
//! - `Initialize` binds the filter to the host's maps and callbacks.
//! - `LowLevelKeyboardProc` is handed to `SetWindowsHookExW(WH_KEYBOARD_LL)`.
//!
//! # Safety
//!
//! This module uses `unsafe` code exclusively for Windows API FFI calls.
//! All `unsafe` blocks are annotated with `// SAFETY:` comments.

#![cfg(target_os = "windows")]

use keylatch_core::keymap::SharedKeyMap;
use windows::core::HRESULT;
use windows::Win32::Foundation::{E_POINTER, E_UNEXPECTED, LPARAM, LRESULT, S_OK, WPARAM};
use windows::Win32::UI::WindowsAndMessaging::{
    CallNextHookEx, HC_ACTION, KBDLLHOOKSTRUCT, KBDLLHOOKSTRUCT_FLAGS, LLKHF_EXTENDED,
    WM_KEYDOWN, WM_KEYUP, WM_SYSKEYDOWN, WM_SYSKEYUP,
};

use crate::{Binding, FilterError, InterceptCallback, InterceptionFilter, Keystroke, MessageClass, Verdict};

/// The one filter instance of this process.
static FILTER: InterceptionFilter = InterceptionFilter::new();

/// Signature of the exported `Initialize`, for hosts resolving it by name.
pub type InitializeFn = unsafe extern "C" fn(
    *const SharedKeyMap,
    *const SharedKeyMap,
    *const SharedKeyMap,
    *const SharedKeyMap,
    Option<InterceptCallback>,
    Option<InterceptCallback>,
    Option<InterceptCallback>,
    Option<InterceptCallback>,
) -> HRESULT;

/// Binds the filter.
///
/// Returns `S_OK` on success, `E_POINTER` if any argument is null and
/// `E_UNEXPECTED` if the filter was already initialized.
///
/// # Safety
///
/// Each map pointer must reference a `SharedKeyMap` that outlives every
/// subsequent hook invocation in this process.
#[no_mangle]
#[allow(clippy::too_many_arguments)]
pub unsafe extern "C" fn Initialize(
    scancode_make_filter: *const SharedKeyMap,
    scancode_break_filter: *const SharedKeyMap,
    virtual_key_make_filter: *const SharedKeyMap,
    virtual_key_break_filter: *const SharedKeyMap,
    on_scancode_make: Option<InterceptCallback>,
    on_scancode_break: Option<InterceptCallback>,
    on_virtual_key_make: Option<InterceptCallback>,
    on_virtual_key_break: Option<InterceptCallback>,
) -> HRESULT {
    // SAFETY: lifetime of the maps is the caller's contract, forwarded as-is.
    let binding = unsafe {
        Binding::from_raw(
            scancode_make_filter,
            scancode_break_filter,
            virtual_key_make_filter,
            virtual_key_break_filter,
            on_scancode_make,
            on_scancode_break,
            on_virtual_key_make,
            on_virtual_key_break,
        )
    };

    match binding.and_then(|b| FILTER.bind(b)) {
        Ok(()) => S_OK,
        Err(FilterError::InvalidArgument(_)) => E_POINTER,
        Err(FilterError::AlreadyBound) => E_UNEXPECTED,
    }
}

/// The `WH_KEYBOARD_LL` hook procedure.
///
/// # Safety
///
/// Called by Windows on the thread that installed the hook. `l_param` must
/// point to a `KBDLLHOOKSTRUCT` whenever `n_code == HC_ACTION`.
#[no_mangle]
pub unsafe extern "system" fn LowLevelKeyboardProc(
    n_code: i32,
    w_param: WPARAM,
    l_param: LPARAM,
) -> LRESULT {
    if n_code != HC_ACTION as i32 || l_param.0 == 0 {
        // SAFETY: non-action codes must be passed down the chain untouched.
        return unsafe { CallNextHookEx(None, n_code, w_param, l_param) };
    }

    // SAFETY: l_param points to a KBDLLHOOKSTRUCT when n_code == HC_ACTION.
    let kbs = unsafe { &*(l_param.0 as *const KBDLLHOOKSTRUCT) };

    let class = match w_param.0 as u32 {
        WM_KEYDOWN | WM_SYSKEYDOWN => MessageClass::KeyDown,
        WM_KEYUP | WM_SYSKEYUP => MessageClass::KeyUp,
        _ => MessageClass::Other,
    };
    let keystroke = Keystroke {
        virtual_key: kbs.vkCode,
        scancode: kbs.scanCode,
        extended: (kbs.flags & LLKHF_EXTENDED) != KBDLLHOOKSTRUCT_FLAGS(0),
        extra_info: kbs.dwExtraInfo as u32,
    };

    match FILTER.filter(class, &keystroke) {
        Verdict::Swallow => LRESULT(1),
        // SAFETY: forward the event to the next hook in the chain.
        Verdict::Forward => unsafe { CallNextHookEx(None, n_code, w_param, l_param) },
    }
}
