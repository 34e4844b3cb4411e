use std::time::Duration;

/// Default RPC port for `monerod`.
pub const DEFAULT_DAEMON_PORT: u16 = 18081;

/// Default RPC port for `monero-wallet-rpc`.
pub const DEFAULT_WALLET_PORT: u16 = 18083;

/// Default budget, in milliseconds, for a service to start accepting
/// connections.
pub const DEFAULT_STARTUP_TIMEOUT_MS: u64 = 30_000;

/// Default budget, in milliseconds, for a service to exit after an interrupt.
pub const DEFAULT_SHUTDOWN_TIMEOUT_MS: u64 = 10_000;

/// Default log filter expression used by the binary.
pub const DEFAULT_LOG_FILTER: &str = "info";

/// Default log filter expression used by the binary.
#[must_use]
pub fn default_log_filter() -> &'static str {
    DEFAULT_LOG_FILTER
}

/// Owned log filter value used where allocation is required (e.g. serde).
#[must_use]
pub fn default_log_filter_string() -> String {
    DEFAULT_LOG_FILTER.to_owned()
}

/// Default logging format for the binary.
#[must_use]
pub fn default_log_format() -> crate::logging::LogFormat {
    crate::logging::LogFormat::Json
}

/// Default startup timeout as a [`Duration`].
#[must_use]
pub const fn default_startup_timeout() -> Duration {
    Duration::from_millis(DEFAULT_STARTUP_TIMEOUT_MS)
}

/// Default shutdown timeout as a [`Duration`].
#[must_use]
pub const fn default_shutdown_timeout() -> Duration {
    Duration::from_millis(DEFAULT_SHUTDOWN_TIMEOUT_MS)
}
