//! Recording interception hook for tests and headless runs.
//!
//! Remembers the maps it was bound to so tests can check what the filter
//! would see, and counts install/uninstall calls.

use std::sync::{Arc, Mutex, MutexGuard, PoisonError};

use keylatch_core::keymap::InterceptionMaps;

use super::{HookError, InterceptionHook};

#[derive(Debug, Default)]
struct HookLog {
    bound: Option<&'static InterceptionMaps>,
    installs: u32,
    uninstalls: u32,
    installed: bool,
}

/// An [`InterceptionHook`] that performs no OS calls.
///
/// Clones share the same log, so a test can keep one handle while the
/// service owns the other.
#[derive(Debug, Clone, Default)]
pub struct RecordingHook {
    log: Arc<Mutex<HookLog>>,
    fail_install: bool,
}

impl RecordingHook {
    pub fn new() -> Self {
        Self::default()
    }

    /// A hook whose every install fails, as when the filter DLL is missing.
    pub fn failing() -> Self {
        Self {
            fail_install: true,
            ..Self::default()
        }
    }

    fn log(&self) -> MutexGuard<'_, HookLog> {
        self.log.lock().unwrap_or_else(PoisonError::into_inner)
    }

    pub fn install_count(&self) -> u32 {
        self.log().installs
    }

    pub fn uninstall_count(&self) -> u32 {
        self.log().uninstalls
    }

    /// The maps bound by the first successful install.
    pub fn bound_maps(&self) -> Option<&'static InterceptionMaps> {
        self.log().bound
    }
}

impl InterceptionHook for RecordingHook {
    fn install(&mut self, maps: &'static InterceptionMaps) -> Result<(), HookError> {
        if self.fail_install {
            return Err(HookError::LibraryLoad {
                library: "keylatch_filter.dll".to_string(),
                reason: "not found".to_string(),
            });
        }
        let mut log = self.log();
        log.bound.get_or_insert(maps);
        log.installs += 1;
        log.installed = true;
        Ok(())
    }

    fn uninstall(&mut self) -> Result<(), HookError> {
        let mut log = self.log();
        if log.installed {
            log.uninstalls += 1;
            log.installed = false;
        }
        Ok(())
    }

    fn is_installed(&self) -> bool {
        self.log().installed
    }
}
