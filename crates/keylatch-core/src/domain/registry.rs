//! Code → handler registry with fault-isolated dispatch.
//!
//! Each (code space × action) pair owns its own 256-slot table, so a
//! registry holds four independent mappings.  A slot holds at most one
//! handler: registering again replaces the previous handler silently.
//!
//! The registry is generic over a context type `C` that every handler
//! receives mutably.  The host uses its key synthesizer as the context so a
//! handler can inject keys in response to the event it observes.

use std::any::Any;
use std::panic::{catch_unwind, AssertUnwindSafe};

use thiserror::Error;
use tracing::{trace, warn};

use crate::domain::event::{CodeSpace, KeyAction, KeyEvent};
use crate::keymap::{wrap_index, KeyMap, KEY_MAP_BITS};
use crate::synth::SynthError;

/// Error returned by a user handler.
#[derive(Debug, Error)]
pub enum HandlerError {
    #[error("handler failed: {0}")]
    Failed(String),

    #[error("handler could not synthesize input: {0}")]
    Synth(#[from] SynthError),

    #[error("handler panicked: {0}")]
    Panicked(String),
}

impl HandlerError {
    pub fn failed(message: impl Into<String>) -> Self {
        Self::Failed(message.into())
    }
}

/// A user-supplied callback for one key transition.
pub type KeyHandler<C> = Box<dyn FnMut(&KeyEvent, &mut C) -> Result<(), HandlerError>>;

/// What happened when a code was dispatched.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Dispatch {
    /// No handler is registered for the code.
    Unregistered,
    /// The handler ran and returned `Ok`.
    Completed,
    /// The handler returned an error or panicked; the fault was logged.
    Faulted,
}

struct HandlerTable<C> {
    members: KeyMap,
    handlers: Vec<Option<KeyHandler<C>>>,
}

impl<C> HandlerTable<C> {
    fn new() -> Self {
        Self {
            members: KeyMap::new(),
            handlers: std::iter::repeat_with(|| None).take(KEY_MAP_BITS).collect(),
        }
    }
}

/// Four single-subscriber handler tables, one per (code space × action).
pub struct CallbackRegistry<C> {
    tables: [HandlerTable<C>; 4],
}

impl<C> CallbackRegistry<C> {
    pub fn new() -> Self {
        Self {
            tables: [
                HandlerTable::new(),
                HandlerTable::new(),
                HandlerTable::new(),
                HandlerTable::new(),
            ],
        }
    }

    fn table(&self, space: CodeSpace, action: KeyAction) -> &HandlerTable<C> {
        &self.tables[Self::slot(space, action)]
    }

    fn table_mut(&mut self, space: CodeSpace, action: KeyAction) -> &mut HandlerTable<C> {
        &mut self.tables[Self::slot(space, action)]
    }

    fn slot(space: CodeSpace, action: KeyAction) -> usize {
        match (space, action) {
            (CodeSpace::VirtualKey, KeyAction::Make) => 0,
            (CodeSpace::VirtualKey, KeyAction::Break) => 1,
            (CodeSpace::Scancode, KeyAction::Make) => 2,
            (CodeSpace::Scancode, KeyAction::Break) => 3,
        }
    }

    /// Installs `handler` for `code`, replacing any existing handler.
    pub fn register<F>(&mut self, space: CodeSpace, action: KeyAction, code: impl Into<u32>, handler: F)
    where
        F: FnMut(&KeyEvent, &mut C) -> Result<(), HandlerError> + 'static,
    {
        let code = code.into();
        let table = self.table_mut(space, action);
        let replaced = table.handlers[wrap_index(code)]
            .replace(Box::new(handler))
            .is_some();
        table.members.set(code);
        trace!(?space, ?action, code, replaced, "handler registered");
    }

    /// Removes the handler for `code`.  Returns `true` if one was present.
    pub fn deregister(&mut self, space: CodeSpace, action: KeyAction, code: impl Into<u32>) -> bool {
        let code = code.into();
        let table = self.table_mut(space, action);
        table.members.clear(code);
        table.handlers[wrap_index(code)].take().is_some()
    }

    /// Returns `true` if a handler is registered for `code`.
    pub fn is_registered(&self, space: CodeSpace, action: KeyAction, code: impl Into<u32>) -> bool {
        self.table(space, action).members.is_set(code)
    }

    /// The set of codes with a registered handler.
    pub fn members(&self, space: CodeSpace, action: KeyAction) -> &KeyMap {
        &self.table(space, action).members
    }

    /// Invokes the handler for `code`, if any, with `event` and `context`.
    ///
    /// Handler errors and panics are caught here, logged, and reported as
    /// [`Dispatch::Faulted`]; they never reach the caller.
    pub fn dispatch(
        &mut self,
        space: CodeSpace,
        action: KeyAction,
        code: impl Into<u32>,
        event: &KeyEvent,
        context: &mut C,
    ) -> Dispatch {
        let code = code.into();
        let Some(handler) = self.table_mut(space, action).handlers[wrap_index(code)].as_mut() else {
            return Dispatch::Unregistered;
        };

        let result = catch_unwind(AssertUnwindSafe(|| handler(event, context)))
            .unwrap_or_else(|payload| Err(HandlerError::Panicked(panic_message(payload.as_ref()))));

        match result {
            Ok(()) => Dispatch::Completed,
            Err(e) => {
                warn!(?space, ?action, code, %event, "key handler fault: {e}");
                Dispatch::Faulted
            }
        }
    }

    /// Removes every handler in every table.
    pub fn clear(&mut self) {
        for table in &mut self.tables {
            *table = HandlerTable::new();
        }
    }
}

impl<C> Default for CallbackRegistry<C> {
    fn default() -> Self {
        Self::new()
    }
}

pub(crate) fn panic_message(payload: &(dyn Any + Send)) -> String {
    if let Some(s) = payload.downcast_ref::<&str>() {
        (*s).to_string()
    } else if let Some(s) = payload.downcast_ref::<String>() {
        s.clone()
    } else {
        "non-string panic payload".to_string()
    }
}
