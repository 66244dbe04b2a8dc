//! Declarative key bindings: user logic expressed as configuration.
//!
//! A binding says "when this key transition happens, do this".  Bindings are
//! read from the `[[bindings]]` array of the config file, validated and
//! compiled here, and installed into the [`KeyboardService`] as either a
//! latch (observe only) or an interception (swallow the key).
//!
//! ```toml
//! [[bindings]]
//! virtual_key = "f1"
//! on = "make"
//! mode = "intercept"
//! action = { type = "send_text", text = "Hello" }
//!
//! [[bindings]]
//! scancode = 0x1d
//! extended = 0xe0          # right control only
//! action = { type = "log" }
//! ```
//!
//! Key codes coming from configuration are range-checked here: anything
//! outside `0..=0xFFFF` is rejected with [`BindingError::CodeOutOfRange`]
//! rather than silently wrapped by the core key maps.

use keylatch_core::keymap::lookup_name;
use keylatch_core::{CodeSpace, HandlerError, KeyAction, KeyEvent, SynthError, Synthesizer};
use serde::{Deserialize, Serialize};
use thiserror::Error;
use tracing::{debug, info, warn};

use crate::application::keyboard_service::KeyboardService;

/// Errors raised while validating bindings.
#[derive(Debug, Error)]
pub enum BindingError {
    #[error("key code {0} is outside 0..=0xFFFF")]
    CodeOutOfRange(i64),

    #[error("unknown virtual key name `{0}`")]
    UnknownKeyName(String),

    #[error("scancodes cannot be named (`{0}`); use a numeric code")]
    NamedScancode(String),

    #[error("binding must name exactly one of `virtual_key` or `scancode`")]
    AmbiguousTrigger,

    #[error("`extended` can only narrow latches; intercepted keys are always swallowed")]
    PrefixOnInterception,

    #[error(transparent)]
    Synth(#[from] SynthError),
}

/// A key given either by virtual-key name or by number.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum KeyRef {
    Code(i64),
    Name(String),
}

impl KeyRef {
    /// Resolves the key to a code in `space`.
    ///
    /// # Errors
    ///
    /// [`BindingError::CodeOutOfRange`] for numbers outside `0..=0xFFFF`,
    /// [`BindingError::UnknownKeyName`] for names not in the virtual-key table
    /// and [`BindingError::NamedScancode`] for any name in scancode space.
    pub fn resolve(&self, space: CodeSpace) -> Result<u16, BindingError> {
        match (self, space) {
            (KeyRef::Code(code), _) => checked_code(*code),
            (KeyRef::Name(name), CodeSpace::VirtualKey) => lookup_name(name)
                .map(u16::from)
                .ok_or_else(|| BindingError::UnknownKeyName(name.clone())),
            (KeyRef::Name(name), CodeSpace::Scancode) => Err(BindingError::NamedScancode(name.clone())),
        }
    }
}

/// Narrows a raw number from user logic to a key code.
pub fn checked_code(code: i64) -> Result<u16, BindingError> {
    u16::try_from(code).map_err(|_| BindingError::CodeOutOfRange(code))
}

/// Whether a binding observes or swallows its key.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum BindingMode {
    #[default]
    Latch,
    Intercept,
}

/// What a binding does when it fires, as written in the config file.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum ActionSpec {
    /// Tap each virtual key in order.
    SendKeys { keys: Vec<KeyRef> },
    /// Type a string.
    SendText { text: String },
    /// Send one key.  Without `on`, the key is tapped (make then break).
    SendKey {
        key: KeyRef,
        #[serde(default = "default_space")]
        space: CodeSpace,
        #[serde(default)]
        on: Option<KeyAction>,
        #[serde(default)]
        extended: Option<u8>,
    },
    /// Log the event at info level.
    Log,
}

/// One `[[bindings]]` entry.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct BindingSpec {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub virtual_key: Option<KeyRef>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub scancode: Option<i64>,
    /// Only fire when the event carries this prefix (`0xE0` or `0xE1`).
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub extended: Option<u8>,
    #[serde(default = "default_on")]
    pub on: KeyAction,
    #[serde(default)]
    pub mode: BindingMode,
    pub action: ActionSpec,
}

fn default_space() -> CodeSpace {
    CodeSpace::VirtualKey
}
fn default_on() -> KeyAction {
    KeyAction::Make
}

/// A validated action.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Action {
    SendKeys(Vec<u16>),
    SendText(String),
    SendKey {
        space: CodeSpace,
        code: u16,
        on: Option<KeyAction>,
        extended: Option<u8>,
    },
    Log,
}

impl Action {
    fn compile(spec: &ActionSpec) -> Result<Self, BindingError> {
        Ok(match spec {
            ActionSpec::SendKeys { keys } => Action::SendKeys(
                keys.iter()
                    .map(|k| k.resolve(CodeSpace::VirtualKey))
                    .collect::<Result<_, _>>()?,
            ),
            ActionSpec::SendText { text } => Action::SendText(text.clone()),
            ActionSpec::SendKey {
                key,
                space,
                on,
                extended,
            } => Action::SendKey {
                space: *space,
                code: key.resolve(*space)?,
                on: *on,
                extended: *extended,
            },
            ActionSpec::Log => Action::Log,
        })
    }

    /// Performs the action.
    pub fn run(&self, event: &KeyEvent, synth: &mut Synthesizer) -> Result<(), SynthError> {
        match self {
            Action::SendKeys(codes) => synth.send_key_sequence(codes),
            Action::SendText(text) => synth.send_text(&[text]),
            Action::SendKey {
                space,
                code,
                on: Some(action),
                extended,
            } => synth.send_key(*space, *action, *code, *extended),
            Action::SendKey {
                space,
                code,
                on: None,
                extended,
            } => {
                synth.send_key(*space, KeyAction::Make, *code, *extended)?;
                synth.send_key(*space, KeyAction::Break, *code, *extended)
            }
            Action::Log => {
                info!(%event, "binding fired");
                Ok(())
            }
        }
    }
}

/// A validated binding, ready to install.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Binding {
    pub space: CodeSpace,
    pub code: u16,
    pub on: KeyAction,
    pub mode: BindingMode,
    pub prefix: Option<u8>,
    pub action: Action,
}

impl Binding {
    /// Validates `spec`.
    ///
    /// # Errors
    ///
    /// Any [`BindingError`] describing the first problem found.
    pub fn compile(spec: &BindingSpec) -> Result<Self, BindingError> {
        let (space, code) = match (&spec.virtual_key, spec.scancode) {
            (Some(key), None) => (CodeSpace::VirtualKey, key.resolve(CodeSpace::VirtualKey)?),
            (None, Some(code)) => (CodeSpace::Scancode, checked_code(code)?),
            _ => return Err(BindingError::AmbiguousTrigger),
        };
        if spec.mode == BindingMode::Intercept && spec.extended.is_some() {
            return Err(BindingError::PrefixOnInterception);
        }

        Ok(Self {
            space,
            code,
            on: spec.on,
            mode: spec.mode,
            prefix: spec.extended,
            action: Action::compile(&spec.action)?,
        })
    }

    /// Returns `true` if `event` carries the prefix this binding requires.
    pub fn matches(&self, event: &KeyEvent) -> bool {
        match self.prefix {
            None => true,
            Some(0xE0) => event.e0,
            Some(0xE1) => event.e1,
            Some(_) => !event.e0 && !event.e1,
        }
    }

    /// Installs the binding into `service`, replacing whatever handler its
    /// trigger had.
    pub fn install(self, service: &mut KeyboardService) {
        install_group(service, vec![self]);
    }

    fn same_trigger(&self, other: &Binding) -> bool {
        self.space == other.space
            && self.code == other.code
            && self.on == other.on
            && self.mode == other.mode
    }
}

/// Installs bindings that share one trigger as a single handler.  Every
/// binding whose prefix matches the event runs, in config order.
fn install_group(service: &mut KeyboardService, group: Vec<Binding>) {
    let Some(first) = group.first() else {
        return;
    };
    let (space, on, code, mode) = (first.space, first.on, first.code, first.mode);
    let handler = move |event: &KeyEvent, synth: &mut Synthesizer| -> Result<(), HandlerError> {
        let mut first_error = None;
        for binding in group.iter().filter(|b| b.matches(event)) {
            if let Err(e) = binding.action.run(event, synth) {
                first_error.get_or_insert(e);
            }
        }
        first_error.map_or(Ok(()), |e| Err(e.into()))
    };
    match mode {
        BindingMode::Latch => service.listen(space, on, code, handler),
        BindingMode::Intercept => service.intercept(space, on, code, handler),
    }
}

/// Compiles and installs every binding in `specs`.
///
/// Invalid bindings are logged and skipped.  Bindings on the same trigger
/// (for example left and right control, told apart by `extended`) share one
/// handler.  Returns the number of bindings installed.
pub fn apply_bindings(service: &mut KeyboardService, specs: &[BindingSpec]) -> usize {
    let mut groups: Vec<Vec<Binding>> = Vec::new();
    let mut installed = 0;
    for (index, spec) in specs.iter().enumerate() {
        match Binding::compile(spec) {
            Ok(binding) => {
                let shared = groups
                    .iter_mut()
                    .find(|g| g.first().is_some_and(|b| b.same_trigger(&binding)));
                match shared {
                    Some(group) => {
                        debug!(index, code = binding.code, "binding shares a trigger");
                        group.push(binding);
                    }
                    None => groups.push(vec![binding]),
                }
                installed += 1;
            }
            Err(e) => warn!(index, "skipping binding: {e}"),
        }
    }
    for group in groups {
        install_group(service, group);
    }
    installed
}
