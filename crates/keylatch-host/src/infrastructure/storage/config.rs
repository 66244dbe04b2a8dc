//! TOML configuration for the host.
//!
//! Read from the platform-appropriate config file unless `--config` names
//! another one:
//! - Windows:  `%APPDATA%\keylatch\config.toml`
//! - Linux:    `$XDG_CONFIG_HOME/keylatch/config.toml` or `~/.config/keylatch/config.toml`
//! - macOS:    `~/Library/Application Support/keylatch/config.toml`
//!
//! ```toml
//! [host]
//! log_level = "debug"
//! install_hook = true
//! filter_library = "keylatch_filter.dll"
//! raw_input_sink = true
//! no_legacy = false
//!
//! [[bindings]]
//! virtual_key = "capital"
//! mode = "intercept"
//! action = { type = "send_key", key = "escape" }
//! ```
//!
//! Every field has a default, so an empty file (or none at all) is a valid
//! configuration.

use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::application::bindings::BindingSpec;
use crate::infrastructure::input_capture::RawInputOptions;

/// Error type for configuration file operations.
#[derive(Debug, Error)]
pub enum ConfigError {
    /// The platform config directory could not be determined.
    #[error("could not determine platform config directory")]
    NoPlatformConfigDir,

    /// A file system I/O error occurred.
    #[error("I/O error accessing config at {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    /// The TOML content could not be parsed.
    #[error("failed to parse config TOML: {0}")]
    Parse(#[from] toml::de::Error),
}

// ── Config schema types ───────────────────────────────────────────────────────

/// Top-level host configuration.
#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq)]
pub struct HostConfig {
    #[serde(default)]
    pub host: HostSection,
    #[serde(default)]
    pub bindings: Vec<BindingSpec>,
}

/// Process-wide settings.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct HostSection {
    /// `tracing` log level used when `RUST_LOG` is unset.
    #[serde(default = "default_log_level")]
    pub log_level: String,
    /// Install the interception hook at startup.
    #[serde(default = "default_true")]
    pub install_hook: bool,
    /// File name of the filter DLL, resolved in the application directory.
    #[serde(default = "default_filter_library")]
    pub filter_library: String,
    /// Register raw input with `RIDEV_INPUTSINK`.
    #[serde(default = "default_true")]
    pub raw_input_sink: bool,
    /// Register raw input with `RIDEV_NOLEGACY`.
    #[serde(default)]
    pub no_legacy: bool,
}

impl HostSection {
    pub fn raw_input_options(&self) -> RawInputOptions {
        RawInputOptions {
            sink: self.raw_input_sink,
            no_legacy: self.no_legacy,
        }
    }
}

// ── Default helpers ───────────────────────────────────────────────────────────

fn default_log_level() -> String {
    "info".to_string()
}
fn default_true() -> bool {
    true
}
fn default_filter_library() -> String {
    "keylatch_filter.dll".to_string()
}

impl Default for HostSection {
    fn default() -> Self {
        Self {
            log_level: default_log_level(),
            install_hook: default_true(),
            filter_library: default_filter_library(),
            raw_input_sink: default_true(),
            no_legacy: false,
        }
    }
}

// ── Loading ───────────────────────────────────────────────────────────────────

/// Resolves the full path to the default config file.
///
/// # Errors
///
/// Returns [`ConfigError::NoPlatformConfigDir`] if the base directory cannot be
/// determined.
pub fn config_file_path() -> Result<PathBuf, ConfigError> {
    platform_config_dir()
        .map(|dir| dir.join("config.toml"))
        .ok_or(ConfigError::NoPlatformConfigDir)
}

/// Loads the configuration from `path`, or from [`config_file_path`] when
/// `path` is `None`.  A missing file yields `HostConfig::default()`.
///
/// # Errors
///
/// Returns [`ConfigError::Io`] for file-system errors other than "not found",
/// and [`ConfigError::Parse`] if the TOML is malformed.
pub fn load_config(path: Option<&Path>) -> Result<HostConfig, ConfigError> {
    let path = match path {
        Some(p) => p.to_path_buf(),
        None => config_file_path()?,
    };
    read_config(&path)
}

fn read_config(path: &Path) -> Result<HostConfig, ConfigError> {
    match std::fs::read_to_string(path) {
        Ok(content) => Ok(toml::from_str(&content)?),
        Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(HostConfig::default()),
        Err(source) => Err(ConfigError::Io {
            path: path.to_path_buf(),
            source,
        }),
    }
}

/// Resolves the platform config directory, including the `keylatch`
/// subdirectory.
fn platform_config_dir() -> Option<PathBuf> {
    #[cfg(target_os = "windows")]
    {
        std::env::var_os("APPDATA").map(|p| PathBuf::from(p).join("keylatch"))
    }

    #[cfg(target_os = "linux")]
    {
        let base = std::env::var_os("XDG_CONFIG_HOME")
            .map(PathBuf::from)
            .or_else(|| std::env::var_os("HOME").map(|h| PathBuf::from(h).join(".config")))?;
        Some(base.join("keylatch"))
    }

    #[cfg(target_os = "macos")]
    {
        std::env::var_os("HOME").map(|h| {
            PathBuf::from(h)
                .join("Library")
                .join("Application Support")
                .join("keylatch")
        })
    }

    #[cfg(not(any(target_os = "windows", target_os = "linux", target_os = "macos")))]
    {
        None
    }
}

// ── Tests ─────────────────────────────────────────────────────────────────────

#[cfg(test)]
mod tests {
    use super::*;
    use crate::application::bindings::{ActionSpec, BindingMode, KeyRef};
    use keylatch_core::KeyAction;

    #[test]
    fn test_host_config_default_values() {
        // Arrange / Act
        let cfg = HostConfig::default();

        // Assert
        assert_eq!(cfg.host.log_level, "info");
        assert!(cfg.host.install_hook);
        assert_eq!(cfg.host.filter_library, "keylatch_filter.dll");
        assert!(cfg.bindings.is_empty());
    }

    #[test]
    fn test_empty_toml_uses_defaults() {
        let cfg: HostConfig = toml::from_str("").expect("deserialize empty");

        assert_eq!(cfg, HostConfig::default());
    }

    #[test]
    fn test_raw_input_options_follow_host_section() {
        let cfg: HostConfig = toml::from_str(
            r#"
[host]
raw_input_sink = false
no_legacy = true
"#,
        )
        .expect("deserialize");

        assert_eq!(
            cfg.host.raw_input_options(),
            RawInputOptions {
                sink: false,
                no_legacy: true,
            }
        );
    }

    #[test]
    fn test_bindings_array_deserializes() {
        // Arrange
        let toml_str = r#"
[host]
log_level = "debug"

[[bindings]]
virtual_key = "capital"
mode = "intercept"
action = { type = "send_key", key = "escape" }

[[bindings]]
scancode = 0x3b
on = "break"
action = { type = "send_text", text = "done" }
"#;

        // Act
        let cfg: HostConfig = toml::from_str(toml_str).expect("deserialize");

        // Assert
        assert_eq!(cfg.host.log_level, "debug");
        assert_eq!(cfg.bindings.len(), 2);
        assert_eq!(cfg.bindings[0].virtual_key, Some(KeyRef::Name("capital".to_string())));
        assert_eq!(cfg.bindings[0].mode, BindingMode::Intercept);
        assert_eq!(cfg.bindings[1].scancode, Some(0x3b));
        assert_eq!(cfg.bindings[1].on, KeyAction::Break);
        assert_eq!(
            cfg.bindings[1].action,
            ActionSpec::SendText {
                text: "done".to_string()
            }
        );
    }

    #[test]
    fn test_invalid_toml_returns_parse_error() {
        let dir = std::env::temp_dir().join(format!("keylatch_cfg_{}", std::process::id()));
        std::fs::create_dir_all(&dir).unwrap();
        let path = dir.join("bad.toml");
        std::fs::write(&path, "[[[ not valid toml").unwrap();

        let result = load_config(Some(&path));

        assert!(matches!(result, Err(ConfigError::Parse(_))));
        std::fs::remove_dir_all(&dir).ok();
    }

    #[test]
    fn test_load_config_returns_default_when_file_absent() {
        let path = PathBuf::from("/nonexistent/path/that/cannot/exist/config.toml");

        let cfg = load_config(Some(&path)).expect("missing file is not an error");

        assert_eq!(cfg, HostConfig::default());
    }

    #[test]
    fn test_load_config_reads_explicit_path() {
        // Arrange
        let dir = std::env::temp_dir().join(format!("keylatch_cfg_ok_{}", std::process::id()));
        std::fs::create_dir_all(&dir).unwrap();
        let path = dir.join("config.toml");
        std::fs::write(&path, "[host]\ninstall_hook = false\n").unwrap();

        // Act
        let cfg = load_config(Some(&path)).expect("load");

        // Assert
        assert!(!cfg.host.install_hook);
        assert_eq!(cfg.host.log_level, "info");
        std::fs::remove_dir_all(&dir).ok();
    }

    #[test]
    fn test_config_file_path_ends_with_config_toml() {
        if let Ok(path) = config_file_path() {
            assert!(path.ends_with("config.toml"));
            assert_eq!(
                path.parent().and_then(Path::file_name),
                Some(std::ffi::OsStr::new("keylatch"))
            );
        }
    }
}
