//! Windows runner for a Flutter desktop app, plus its two native method channels:
//!
//! - `system_info`: processor and OS version, read from the registry and the
//!   legacy version API
//! - `form_handler`: save/load of form records, forwarded to a native form
//!   component loaded at runtime
//!
//! The channel layer (codec, dispatch table, bridges) is portable; only the
//! window host in `runner` is Windows specific.

pub mod config;
pub mod constants;
pub mod error;
pub mod form_bridge;
pub mod handlers;
pub mod method_channel;
pub mod native_module;
pub mod owned_string;
pub mod system_info;

#[cfg(target_os = "windows")]
mod runner;

use std::sync::Once;

use env_logger::{Builder, Env};

pub use config::RunnerConfig;
pub use error::BridgeError;
pub use method_channel::{EncodableValue, MethodCall, MethodDispatcher, MethodResult};

/// Program entry point.
///
/// 1. Load configuration.
/// 2. Initialize logging.
/// 3. Host the Flutter view and serve both channels until the window closes.
pub fn run() -> anyhow::Result<()> {
    // A bad config file is still reported through the logger.
    let config = RunnerConfig::load()
        .inspect_err(|_| init_logging(constants::DEFAULT_LOG_FILTER))?;
    init_logging(&config.log_filter);
    config.log_summary();

    #[cfg(target_os = "windows")]
    {
        runner::run(&config)
    }
    #[cfg(not(target_os = "windows"))]
    {
        Err(anyhow::anyhow!("the Flutter view can only be hosted on Windows"))
    }
}

// Reopening a window from the same process must not re-initialize the logger.
static LOGGER_INIT: Once = Once::new();

/// Initializes `env_logger` once; `RUST_LOG` takes precedence over `default_filter`.
pub fn init_logging(default_filter: &str) {
    LOGGER_INIT.call_once(|| {
        let _ = Builder::from_env(Env::default().default_filter_or(default_filter))
            .format_timestamp_millis()
            .try_init();
    });
}
