//! Windows input capture: the filter DLL hook and the raw input loop.
//!
//! Everything here runs on one dedicated thread, `keylatch-input-loop`:
//!
//! 1. A message-only window is created and registered for raw keyboard
//!    input (usage page 0x01, usage 0x06).
//! 2. The [`KeyboardService`] is moved into a thread-local slot.  Window
//!    procedure and hook callbacks reach it from there.
//! 3. The filter DLL is loaded, bound to the service's interception maps and
//!    installed as a `WH_KEYBOARD_LL` hook.  Low-level hook callbacks are
//!    delivered on the installing thread, so they arrive here too.
//! 4. `GetMessageW` pumps until `WM_QUIT` is posted to the thread.
//!
//! # Safety
//!
//! This module uses `unsafe` code exclusively for Windows API FFI calls.
//! All `unsafe` blocks are annotated with `// SAFETY:` comments.

#![cfg(target_os = "windows")]

use std::cell::RefCell;
use std::mem::size_of;
use std::panic::{catch_unwind, AssertUnwindSafe};
use std::sync::mpsc;
use std::thread::{self, JoinHandle};

use keylatch_core::keymap::InterceptionMaps;
use keylatch_core::{CodeSpace, KeyAction, KeyEvent, RawKeyboard};
use keylatch_filter::exports::InitializeFn;
use tracing::{debug, error, info, warn};
use windows::core::{s, w, HSTRING};
use windows::Win32::Foundation::{
    FreeLibrary, E_POINTER, E_UNEXPECTED, HINSTANCE, HMODULE, HWND, LPARAM, LRESULT, S_OK, WPARAM,
};
use windows::Win32::System::LibraryLoader::{
    GetProcAddress, LoadLibraryExW, LOAD_LIBRARY_SEARCH_APPLICATION_DIR,
};
use windows::Win32::System::Threading::GetCurrentThreadId;
use windows::Win32::UI::Input::{
    DefRawInputProc, GetRawInputData, RegisterRawInputDevices, HRAWINPUT, RAWINPUT,
    RAWINPUTDEVICE, RAWINPUTDEVICE_FLAGS, RAWINPUTHEADER, RIDEV_INPUTSINK, RIDEV_NOLEGACY,
    RIDEV_REMOVE, RID_INPUT, RIM_TYPEKEYBOARD,
};
use windows::Win32::UI::WindowsAndMessaging::{
    CreateWindowExW, DefWindowProcW, DestroyWindow, DispatchMessageW, GetMessageW,
    PostThreadMessageW, RegisterClassW, SetWindowsHookExW, TranslateMessage, UnhookWindowsHookEx,
    HHOOK, HWND_MESSAGE, MSG, WH_KEYBOARD_LL, WINDOW_EX_STYLE, WM_INPUT, WM_QUIT, WNDCLASSW,
    WS_OVERLAPPED,
};

use super::{HookError, InterceptionHook, RawInputError, RawInputOptions};
use crate::application::keyboard_service::KeyboardService;

const USAGE_PAGE_GENERIC_DESKTOP: u16 = 0x01;
const USAGE_KEYBOARD: u16 = 0x06;

type HookProcFn = unsafe extern "system" fn(i32, WPARAM, LPARAM) -> LRESULT;

thread_local! {
    /// The service owned by the input loop thread.
    static SERVICE: RefCell<Option<KeyboardService>> = const { RefCell::new(None) };
}

/// Runs `f` against the thread's service and returns its result.
///
/// Returns `None` without calling `f` when the service is already borrowed
/// (a hook callback can arrive while a handler is still injecting input) or
/// not installed, and when `f` panics.  Panics never cross the FFI boundary.
fn with_service<R>(f: impl FnOnce(&mut KeyboardService) -> R) -> Option<R> {
    let outcome = catch_unwind(AssertUnwindSafe(|| {
        SERVICE
            .try_with(|cell| {
                let mut slot = cell.try_borrow_mut().ok()?;
                slot.as_mut().map(f)
            })
            .ok()
            .flatten()
    }));
    outcome.unwrap_or_else(|_| {
        error!("keyboard callback panicked");
        None
    })
}

// ── Filter callbacks ──────────────────────────────────────────────────────────

fn deliver(space: CodeSpace, action: KeyAction, vk: u16, sc: u16, extended: bool, extra_info: u32) {
    let event = KeyEvent {
        virtual_key: vk,
        scancode: sc,
        e0: extended,
        e1: false,
        extra_info,
        action,
    };
    // The filter has already swallowed the key, so a skipped delivery loses it.
    if with_service(|service| service.on_intercepted(space, &event)).is_none() {
        warn!(
            ?space,
            vk = format_args!("{vk:#04x}"),
            sc = format_args!("{sc:#04x}"),
            %event,
            "intercepted key dropped: keyboard service busy"
        );
    }
}

extern "C" fn on_scancode_make(vk: u16, sc: u16, extended: bool, extra_info: u32) {
    deliver(CodeSpace::Scancode, KeyAction::Make, vk, sc, extended, extra_info);
}

extern "C" fn on_scancode_break(vk: u16, sc: u16, extended: bool, extra_info: u32) {
    deliver(CodeSpace::Scancode, KeyAction::Break, vk, sc, extended, extra_info);
}

extern "C" fn on_virtual_key_make(vk: u16, sc: u16, extended: bool, extra_info: u32) {
    deliver(CodeSpace::VirtualKey, KeyAction::Make, vk, sc, extended, extra_info);
}

extern "C" fn on_virtual_key_break(vk: u16, sc: u16, extended: bool, extra_info: u32) {
    deliver(CodeSpace::VirtualKey, KeyAction::Break, vk, sc, extended, extra_info);
}

// ── Filter library and hook ───────────────────────────────────────────────────

/// The loaded filter DLL and its two exports.
struct FilterLibrary {
    module: HMODULE,
    initialize: InitializeFn,
    hook_proc: HookProcFn,
}

impl FilterLibrary {
    /// Loads `name` from the application directory only.
    fn load(name: &str) -> Result<Self, HookError> {
        // SAFETY: the path is a valid, null-terminated wide string.
        let module = unsafe {
            LoadLibraryExW(&HSTRING::from(name), None, LOAD_LIBRARY_SEARCH_APPLICATION_DIR)
        }
        .map_err(|e| HookError::LibraryLoad {
            library: name.to_string(),
            reason: e.to_string(),
        })?;

        // SAFETY: module is a valid handle returned by LoadLibraryExW.
        let exports = unsafe {
            (
                GetProcAddress(module, s!("Initialize")),
                GetProcAddress(module, s!("LowLevelKeyboardProc")),
            )
        };
        match exports {
            (Some(initialize), Some(hook_proc)) => Ok(Self {
                module,
                // SAFETY: the filter defines both exports with exactly these
                // signatures.
                initialize: unsafe { std::mem::transmute::<_, InitializeFn>(initialize) },
                hook_proc: unsafe { std::mem::transmute::<_, HookProcFn>(hook_proc) },
            }),
            (initialize, _) => {
                // SAFETY: nothing from the module is in use yet.
                let _ = unsafe { FreeLibrary(module) };
                Err(HookError::MissingExport(if initialize.is_none() {
                    "Initialize"
                } else {
                    "LowLevelKeyboardProc"
                }))
            }
        }
    }

    /// Hands the four maps and four callbacks to the filter.
    fn bind(&self, maps: &'static InterceptionMaps) -> Result<(), HookError> {
        // SAFETY: the maps are 'static and the callbacks are plain functions.
        let hr = unsafe {
            (self.initialize)(
                &maps.scancode_make,
                &maps.scancode_break,
                &maps.virtual_key_make,
                &maps.virtual_key_break,
                Some(on_scancode_make),
                Some(on_scancode_break),
                Some(on_virtual_key_make),
                Some(on_virtual_key_break),
            )
        };
        if hr == S_OK {
            Ok(())
        } else if hr == E_UNEXPECTED {
            Err(HookError::AlreadyInitialized)
        } else {
            if hr != E_POINTER {
                warn!(hresult = hr.0, "unexpected result from filter Initialize");
            }
            Err(HookError::InvalidArgument(hr.0))
        }
    }
}

/// [`InterceptionHook`] backed by the keylatch filter DLL.
///
/// The library stays loaded for the rest of the process once it has been
/// loaded: a hook callback may still be running inside it after unhooking.
pub struct WindowsInterceptionHook {
    library_name: String,
    library: Option<FilterLibrary>,
    bound: bool,
    hook: Option<HHOOK>,
}

impl WindowsInterceptionHook {
    pub fn new(library_name: impl Into<String>) -> Self {
        Self {
            library_name: library_name.into(),
            library: None,
            bound: false,
            hook: None,
        }
    }
}

impl InterceptionHook for WindowsInterceptionHook {
    fn install(&mut self, maps: &'static InterceptionMaps) -> Result<(), HookError> {
        let library = match self.library.take() {
            Some(library) => library,
            None => FilterLibrary::load(&self.library_name)?,
        };
        let library = self.library.insert(library);

        if !self.bound {
            library.bind(maps)?;
            self.bound = true;
            debug!(library = %self.library_name, "filter bound");
        }

        // SAFETY: hook_proc lives in `module`, which is never unloaded.
        let hook = unsafe {
            SetWindowsHookExW(
                WH_KEYBOARD_LL,
                Some(library.hook_proc),
                HINSTANCE(library.module.0),
                0,
            )
        }
        .map_err(|e| HookError::Install(e.to_string()))?;

        if let Some(previous) = self.hook.replace(hook) {
            // SAFETY: previous is a hook handle this instance installed.
            if let Err(e) = unsafe { UnhookWindowsHookEx(previous) } {
                warn!("failed to remove replaced keyboard hook: {e}");
            }
        }
        Ok(())
    }

    fn uninstall(&mut self) -> Result<(), HookError> {
        if let Some(hook) = self.hook.take() {
            // SAFETY: hook is a handle this instance installed.
            unsafe { UnhookWindowsHookEx(hook) }.map_err(|e| HookError::Uninstall(e.to_string()))?;
        }
        Ok(())
    }

    fn is_installed(&self) -> bool {
        self.hook.is_some()
    }
}

impl Drop for WindowsInterceptionHook {
    fn drop(&mut self) {
        if let Err(e) = self.uninstall() {
            warn!("{e}");
        }
    }
}

// ── Raw input ─────────────────────────────────────────────────────────────────

fn registration_flags(options: RawInputOptions) -> RAWINPUTDEVICE_FLAGS {
    let mut flags = RAWINPUTDEVICE_FLAGS(0);
    if options.sink {
        flags |= RIDEV_INPUTSINK;
    }
    if options.no_legacy {
        flags |= RIDEV_NOLEGACY;
    }
    flags
}

fn keyboard_device(flags: RAWINPUTDEVICE_FLAGS, target: HWND) -> RAWINPUTDEVICE {
    RAWINPUTDEVICE {
        usUsagePage: USAGE_PAGE_GENERIC_DESKTOP,
        usUsage: USAGE_KEYBOARD,
        dwFlags: flags,
        hwndTarget: target,
    }
}

/// A message-only window that receives `WM_INPUT`.
struct RawInputWindow {
    hwnd: HWND,
    registered: bool,
}

impl RawInputWindow {
    fn create() -> Result<Self, RawInputError> {
        let class_name = w!("KeylatchRawInput");
        let class = WNDCLASSW {
            lpfnWndProc: Some(window_proc),
            lpszClassName: class_name,
            ..Default::default()
        };
        // SAFETY: class is fully initialised and class_name is 'static.
        if unsafe { RegisterClassW(&class) } == 0 {
            return Err(RawInputError::Window(std::io::Error::last_os_error().to_string()));
        }

        // SAFETY: the class was registered above; HWND_MESSAGE makes the
        // window message-only.
        let hwnd = unsafe {
            CreateWindowExW(
                WINDOW_EX_STYLE::default(),
                class_name,
                w!("keylatch"),
                WS_OVERLAPPED,
                0,
                0,
                0,
                0,
                HWND_MESSAGE,
                None,
                None,
                None,
            )
        }
        .map_err(|e| RawInputError::Window(e.to_string()))?;

        Ok(Self {
            hwnd,
            registered: false,
        })
    }

    fn register(&mut self, options: RawInputOptions) -> Result<(), RawInputError> {
        let device = keyboard_device(registration_flags(options), self.hwnd);
        // SAFETY: device targets a window owned by this thread.
        unsafe { RegisterRawInputDevices(&[device], size_of::<RAWINPUTDEVICE>() as u32) }
            .map_err(|e| RawInputError::Register(e.to_string()))?;
        self.registered = true;
        info!(sink = options.sink, no_legacy = options.no_legacy, "raw keyboard input registered");
        Ok(())
    }

    fn unregister(&mut self) -> Result<(), RawInputError> {
        if !self.registered {
            return Ok(());
        }
        let device = keyboard_device(RIDEV_REMOVE, HWND::default());
        // SAFETY: RIDEV_REMOVE requires a null target window.
        unsafe { RegisterRawInputDevices(&[device], size_of::<RAWINPUTDEVICE>() as u32) }
            .map_err(|e| RawInputError::Unregister(e.to_string()))?;
        self.registered = false;
        Ok(())
    }
}

impl Drop for RawInputWindow {
    fn drop(&mut self) {
        if let Err(e) = self.unregister() {
            warn!("{e}");
        }
        // SAFETY: hwnd was created on this thread.
        let _ = unsafe { DestroyWindow(self.hwnd) };
    }
}

/// Reads the record behind a `WM_INPUT` message.
///
/// Returns `Ok(None)` for non-keyboard input, which is handed to
/// `DefRawInputProc`.
///
/// # Safety
///
/// `handle` must come from the `lParam` of a `WM_INPUT` message currently
/// being processed.
unsafe fn read_raw_keyboard(handle: HRAWINPUT) -> Result<Option<RawKeyboard>, RawInputError> {
    let header_size = size_of::<RAWINPUTHEADER>() as u32;
    let mut size = 0u32;
    // SAFETY: a null buffer queries the required size.
    if unsafe { GetRawInputData(handle, RID_INPUT, None, &mut size, header_size) } == u32::MAX {
        return Err(RawInputError::Read(std::io::Error::last_os_error().to_string()));
    }

    let words = (size as usize).max(size_of::<RAWINPUT>()).div_ceil(size_of::<u64>());
    let mut buffer = vec![0u64; words];
    // SAFETY: buffer holds at least `size` bytes and is 8-byte aligned.
    let copied = unsafe {
        GetRawInputData(
            handle,
            RID_INPUT,
            Some(buffer.as_mut_ptr().cast()),
            &mut size,
            header_size,
        )
    };
    if copied != size {
        return Err(RawInputError::Read(format!("copied {copied} of {size} bytes")));
    }

    // SAFETY: buffer is large enough and aligned for RAWINPUT.
    let input = unsafe { &*(buffer.as_ptr() as *const RAWINPUT) };
    if input.header.dwType != RIM_TYPEKEYBOARD.0 {
        // SAFETY: input points to the record read above.
        unsafe { DefRawInputProc(&[input as *const RAWINPUT], header_size) };
        return Ok(None);
    }

    // SAFETY: dwType says the union holds a keyboard record.
    let keyboard = unsafe { input.data.keyboard };
    Ok(Some(RawKeyboard {
        make_code: keyboard.MakeCode,
        flags: keyboard.Flags,
        vkey: keyboard.VKey,
        message: keyboard.Message,
        extra_information: keyboard.ExtraInformation,
    }))
}

unsafe extern "system" fn window_proc(
    hwnd: HWND,
    msg: u32,
    w_param: WPARAM,
    l_param: LPARAM,
) -> LRESULT {
    if msg == WM_INPUT {
        // SAFETY: l_param of WM_INPUT is the raw input handle.
        match unsafe { read_raw_keyboard(HRAWINPUT(l_param.0 as _)) } {
            Ok(Some(raw)) => {
                if with_service(|service| service.process_raw_keyboard(&raw)).is_none() {
                    debug!(vk = raw.vkey, sc = raw.make_code, "raw key not processed");
                }
            }
            Ok(None) => {}
            Err(e) => warn!("{e}"),
        }
    }
    // SAFETY: WM_INPUT must still reach DefWindowProcW for cleanup.
    unsafe { DefWindowProcW(hwnd, msg, w_param, l_param) }
}

// ── Input loop thread ─────────────────────────────────────────────────────────

/// Asks a running input loop to exit.
#[derive(Debug, Clone, Copy)]
pub struct LoopStopper {
    thread_id: u32,
}

impl LoopStopper {
    /// Posts `WM_QUIT` to the input loop thread.
    pub fn stop(&self) -> Result<(), RawInputError> {
        // SAFETY: posting to a thread id has no memory-safety preconditions.
        unsafe { PostThreadMessageW(self.thread_id, WM_QUIT, WPARAM(0), LPARAM(0)) }
            .map_err(|e| RawInputError::MessageLoop(e.to_string()))
    }
}

/// The dedicated thread running the Win32 message loop.
pub struct InputLoop {
    thread_id: u32,
    handle: JoinHandle<Result<(), RawInputError>>,
}

impl InputLoop {
    /// Starts the loop.  `build` runs on the new thread and creates the
    /// service it will own.
    ///
    /// Returns once the thread has a message queue, so a stop request can
    /// never be lost.
    ///
    /// # Errors
    ///
    /// Any [`RawInputError`] raised before the loop started.
    pub fn spawn<F>(build: F, options: RawInputOptions, install_hook: bool) -> Result<Self, RawInputError>
    where
        F: FnOnce() -> KeyboardService + Send + 'static,
    {
        let (ready_tx, ready_rx) = mpsc::channel();

        let handle = thread::Builder::new()
            .name("keylatch-input-loop".to_string())
            .spawn(move || {
                let mut window = RawInputWindow::create()?;
                window.register(options)?;
                // SAFETY: GetCurrentThreadId has no preconditions.
                let _ = ready_tx.send(unsafe { GetCurrentThreadId() });
                run_message_loop(window, build(), install_hook)
            })
            .map_err(|e| RawInputError::Thread(e.to_string()))?;

        match ready_rx.recv() {
            Ok(thread_id) => Ok(Self { thread_id, handle }),
            Err(_) => Err(match handle.join() {
                Ok(Err(e)) => e,
                Ok(Ok(())) => RawInputError::Thread("input loop exited during startup".to_string()),
                Err(_) => RawInputError::Thread("input loop panicked during startup".to_string()),
            }),
        }
    }

    pub fn stopper(&self) -> LoopStopper {
        LoopStopper {
            thread_id: self.thread_id,
        }
    }

    /// Waits for the loop thread to finish.
    pub fn join(self) -> Result<(), RawInputError> {
        self.handle
            .join()
            .map_err(|_| RawInputError::Thread("input loop panicked".to_string()))?
    }
}

fn run_message_loop(
    window: RawInputWindow,
    service: KeyboardService,
    install_hook: bool,
) -> Result<(), RawInputError> {
    SERVICE.with(|cell| *cell.borrow_mut() = Some(service));

    if install_hook {
        if let Some(Err(e)) = with_service(KeyboardService::hook) {
            error!("interception disabled: {e}");
        }
    }
    info!("input loop running");

    let mut msg = MSG::default();
    let result = loop {
        // SAFETY: standard Win32 GetMessage/DispatchMessage loop.
        match unsafe { GetMessageW(&mut msg, None, 0, 0) }.0 {
            0 => break Ok(()),
            -1 => {
                break Err(RawInputError::MessageLoop(
                    std::io::Error::last_os_error().to_string(),
                ))
            }
            _ => unsafe {
                let _ = TranslateMessage(&msg);
                DispatchMessageW(&msg);
            },
        }
    };

    if let Some(mut service) = SERVICE.with(|cell| cell.borrow_mut().take()) {
        if let Err(e) = service.unhook() {
            warn!("{e}");
        }
    }
    drop(window);
    info!("input loop stopped");
    result
}
