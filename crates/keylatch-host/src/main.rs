//! keylatch host entry point.
//!
//! Wires together configuration, logging and the input loop thread, then
//! waits for Ctrl-C.
//!
//! # Architecture
//!
//! ```text
//! main()
//!  └─ load_config()           -- TOML file or defaults
//!  └─ InputLoop::spawn()      -- dedicated Win32 thread
//!       ├─ raw input window   (WM_INPUT → RawInputDecoder → latches)
//!       ├─ filter DLL hook    (WH_KEYBOARD_LL → interceptions)
//!       └─ KeyboardService    (bindings from the config file)
//! ```

use std::path::PathBuf;

use anyhow::Context;
use clap::Parser;
use tracing::info;
use tracing_subscriber::EnvFilter;

use keylatch_host::infrastructure::storage::config::{load_config, HostConfig};

/// The interception maps shared with the filter DLL.  Their address is handed
/// across the boundary once, so they live for the whole process.
#[cfg(target_os = "windows")]
static INTERCEPTION_MAPS: keylatch_core::keymap::InterceptionMaps =
    keylatch_core::keymap::InterceptionMaps::new();

/// Keyboard interception, filtering and synthesis for Windows.
#[derive(Debug, Parser)]
#[command(name = "keylatch", version)]
struct Cli {
    /// Config file to read instead of the platform default.
    #[arg(long, env = "KEYLATCH_CONFIG")]
    config: Option<PathBuf>,

    /// Log level used when `RUST_LOG` is unset; overrides the config file.
    #[arg(long, env = "KEYLATCH_LOG_LEVEL")]
    log_level: Option<String>,

    /// Do not install the interception hook; latches still work.
    #[arg(long)]
    no_hook: bool,
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();

    let config = load_config(cli.config.as_deref()).context("failed to load configuration")?;

    // Initialise structured logging.  Level is overridden by `RUST_LOG`.
    let level = cli.log_level.as_deref().unwrap_or(&config.host.log_level);
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(level)))
        .init();

    info!(bindings = config.bindings.len(), "keylatch starting");

    run(config, !cli.no_hook).await?;

    info!("keylatch stopped");
    Ok(())
}

#[cfg(target_os = "windows")]
async fn run(config: HostConfig, hook_enabled: bool) -> anyhow::Result<()> {
    use std::sync::Arc;

    use keylatch_core::Synthesizer;
    use keylatch_host::application::bindings::apply_bindings;
    use keylatch_host::application::keyboard_service::KeyboardService;
    use keylatch_host::infrastructure::input_capture::windows::{InputLoop, WindowsInterceptionHook};
    use keylatch_host::infrastructure::input_emulation::windows::{SendInputInjector, Win32Layout};
    use tracing::error;

    let install_hook = hook_enabled && config.host.install_hook;
    let options = config.host.raw_input_options();

    let input_loop = InputLoop::spawn(
        move || {
            let synth = Synthesizer::new(Arc::new(SendInputInjector::new()), Arc::new(Win32Layout::new()));
            let hook = WindowsInterceptionHook::new(config.host.filter_library.clone());
            let mut service = KeyboardService::new(&INTERCEPTION_MAPS, Box::new(hook), synth);
            let installed = apply_bindings(&mut service, &config.bindings);
            info!(installed, "bindings applied");
            service
        },
        options,
        install_hook,
    )
    .context("failed to start input loop")?;

    info!("keylatch ready.  Press Ctrl-C to exit.");

    let stopper = input_loop.stopper();
    let mut finished = tokio::task::spawn_blocking(move || input_loop.join());

    let joined = tokio::select! {
        joined = &mut finished => joined,
        signal = tokio::signal::ctrl_c() => {
            match signal {
                Ok(()) => info!("shutdown signal received"),
                Err(e) => error!("failed to listen for Ctrl-C: {e}"),
            }
            stopper.stop().context("failed to stop input loop")?;
            finished.await
        }
    };

    joined.context("input loop task failed")??;
    Ok(())
}

#[cfg(not(target_os = "windows"))]
async fn run(_config: HostConfig, _hook_enabled: bool) -> anyhow::Result<()> {
    anyhow::bail!("keylatch requires Windows: keyboard hooks and raw input are Win32 facilities")
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_cli_defaults() {
        let cli = Cli::parse_from(["keylatch"]);

        assert!(cli.config.is_none() || std::env::var_os("KEYLATCH_CONFIG").is_some());
        assert!(!cli.no_hook);
    }

    #[test]
    fn test_cli_parses_all_flags() {
        let cli = Cli::parse_from([
            "keylatch",
            "--config",
            "C:/keylatch.toml",
            "--log-level",
            "debug",
            "--no-hook",
        ]);

        assert_eq!(cli.config, Some(PathBuf::from("C:/keylatch.toml")));
        assert_eq!(cli.log_level.as_deref(), Some("debug"));
        assert!(cli.no_hook);
    }
}
