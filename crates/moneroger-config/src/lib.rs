//! Shared configuration for the `moneroger` supervisor.
//!
//! Values are layered with [`ortho_config`]: built-in defaults, then an
//! optional configuration file, then `MONEROGER_*` environment variables, and
//! finally command-line flags. The resulting [`Config`] describes both managed
//! services (`monerod` and `monero-wallet-rpc`) along with the timeouts and
//! escalation switches the supervisor honours.

mod defaults;
mod logging;
mod validation;

use std::path::{Path, PathBuf};
use std::time::Duration;

use ortho_config::OrthoConfig;
use serde::{Deserialize, Serialize};

pub use defaults::{
    DEFAULT_DAEMON_PORT, DEFAULT_LOG_FILTER, DEFAULT_SHUTDOWN_TIMEOUT_MS,
    DEFAULT_STARTUP_TIMEOUT_MS, DEFAULT_WALLET_PORT, default_log_filter,
    default_log_filter_string, default_log_format, default_shutdown_timeout,
    default_startup_timeout,
};
pub use logging::{LogFormat, LogFormatParseError};
pub use validation::ConfigError;

/// Configuration for one supervised daemon/wallet pair.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize, Serialize, OrthoConfig)]
#[ortho_config(prefix = "MONEROGER")]
pub struct Config {
    /// Directory holding blockchain data for `monerod`.
    pub data_dir: Option<PathBuf>,
    /// Directory holding wallet files; falls back to `data_dir`.
    pub wallet_dir: Option<PathBuf>,
    /// RPC port bound by `monerod`.
    #[ortho_config(default = DEFAULT_DAEMON_PORT)]
    pub daemon_port: u16,
    /// RPC port bound by `monero-wallet-rpc`.
    #[ortho_config(default = DEFAULT_WALLET_PORT)]
    pub wallet_port: u16,
    /// Run both services against the test network.
    #[ortho_config(default = false)]
    pub testnet: bool,
    /// Explicit RPC username for `monerod`.
    pub daemon_rpc_user: Option<String>,
    /// Explicit RPC password for `monerod`.
    pub daemon_rpc_pass: Option<String>,
    /// Explicit RPC username for `monero-wallet-rpc`.
    pub wallet_rpc_user: Option<String>,
    /// Explicit RPC password for `monero-wallet-rpc`.
    pub wallet_rpc_pass: Option<String>,
    /// Password unlocking the wallet file.
    pub wallet_password: Option<String>,
    /// Explicit path to the `monerod` executable.
    pub monerod_bin: Option<PathBuf>,
    /// Explicit path to the `monero-wallet-rpc` executable.
    pub wallet_rpc_bin: Option<PathBuf>,
    /// Milliseconds a service may take to start accepting connections.
    #[ortho_config(default = DEFAULT_STARTUP_TIMEOUT_MS)]
    pub startup_timeout_ms: u64,
    /// Milliseconds a service may take to exit after an interrupt.
    #[ortho_config(default = DEFAULT_SHUTDOWN_TIMEOUT_MS)]
    pub shutdown_timeout_ms: u64,
    /// Send SIGKILL when a service ignores the interrupt past the timeout.
    #[ortho_config(default = false)]
    pub kill_on_shutdown_timeout: bool,
    /// Stop a freshly spawned service that never became ready.
    #[ortho_config(default = false)]
    pub terminate_on_startup_failure: bool,
    /// Filter expression applied to log output.
    #[ortho_config(default = default_log_filter_string())]
    pub log_filter: String,
    /// Layout used for log output.
    #[ortho_config(default = default_log_format())]
    pub log_format: LogFormat,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            data_dir: None,
            wallet_dir: None,
            daemon_port: DEFAULT_DAEMON_PORT,
            wallet_port: DEFAULT_WALLET_PORT,
            testnet: false,
            daemon_rpc_user: None,
            daemon_rpc_pass: None,
            wallet_rpc_user: None,
            wallet_rpc_pass: None,
            wallet_password: None,
            monerod_bin: None,
            wallet_rpc_bin: None,
            startup_timeout_ms: DEFAULT_STARTUP_TIMEOUT_MS,
            shutdown_timeout_ms: DEFAULT_SHUTDOWN_TIMEOUT_MS,
            kill_on_shutdown_timeout: false,
            terminate_on_startup_failure: false,
            log_filter: default_log_filter_string(),
            log_format: default_log_format(),
        }
    }
}

impl Config {
    /// Builds a configuration rooted at `data_dir` with every other value
    /// left at its default.
    #[must_use]
    pub fn recommended(data_dir: impl Into<PathBuf>) -> Self {
        Self {
            data_dir: Some(data_dir.into()),
            ..Self::default()
        }
    }

    /// Directory holding blockchain data, if configured.
    #[must_use]
    pub fn data_dir(&self) -> Option<&Path> {
        self.data_dir.as_deref()
    }

    /// Directory holding wallet files, falling back to the data directory.
    #[must_use]
    pub fn wallet_dir(&self) -> Option<&Path> {
        self.wallet_dir.as_deref().or_else(|| self.data_dir())
    }

    /// Startup budget applied to each service.
    #[must_use]
    pub const fn startup_timeout(&self) -> Duration {
        Duration::from_millis(self.startup_timeout_ms)
    }

    /// Shutdown budget applied to each service.
    #[must_use]
    pub const fn shutdown_timeout(&self) -> Duration {
        Duration::from_millis(self.shutdown_timeout_ms)
    }

    /// Filter expression applied to log output.
    #[must_use]
    pub fn log_filter(&self) -> &str {
        self.log_filter.as_str()
    }

    /// Layout used for log output.
    #[must_use]
    pub const fn log_format(&self) -> LogFormat {
        self.log_format
    }
}
