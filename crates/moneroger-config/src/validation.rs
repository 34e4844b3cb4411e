use std::path::PathBuf;

use thiserror::Error;

use crate::Config;

/// Problems detected in a loaded [`Config`] before any service is touched.
#[derive(Debug, Error, PartialEq, Eq)]
pub enum ConfigError {
    /// No data directory was supplied.
    #[error("a data directory is required (set --data-dir)")]
    MissingDataDir,
    /// A port of zero was supplied for a managed service.
    #[error("{name} port must be between 1 and 65535, got {port}")]
    InvalidPort {
        /// Which service the port belongs to.
        name: &'static str,
        /// Offending value.
        port: u16,
    },
    /// Both services were asked to bind the same port.
    #[error("daemon and wallet ports must differ, both are {port}")]
    PortClash {
        /// Port shared by both services.
        port: u16,
    },
    /// A timeout of zero milliseconds was supplied.
    #[error("{name} timeout must be greater than zero")]
    ZeroTimeout {
        /// Which timeout was empty.
        name: &'static str,
    },
    /// An explicit binary path does not point at a file.
    #[error("configured binary {path} does not exist")]
    MissingBinary {
        /// Path supplied in configuration.
        path: PathBuf,
    },
}

impl Config {
    /// Checks the settings that would otherwise surface as confusing
    /// process failures.
    ///
    /// # Errors
    ///
    /// Returns the first [`ConfigError`] encountered.
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.data_dir.as_deref().is_none_or(|dir| dir.as_os_str().is_empty()) {
            return Err(ConfigError::MissingDataDir);
        }
        for (name, port) in [("daemon", self.daemon_port), ("wallet", self.wallet_port)] {
            if port == 0 {
                return Err(ConfigError::InvalidPort { name, port });
            }
        }
        if self.daemon_port == self.wallet_port {
            return Err(ConfigError::PortClash {
                port: self.daemon_port,
            });
        }
        for (name, millis) in [
            ("startup", self.startup_timeout_ms),
            ("shutdown", self.shutdown_timeout_ms),
        ] {
            if millis == 0 {
                return Err(ConfigError::ZeroTimeout { name });
            }
        }
        for path in [&self.monerod_bin, &self.wallet_rpc_bin].into_iter().flatten() {
            if !path.is_file() {
                return Err(ConfigError::MissingBinary { path: path.clone() });
            }
        }
        Ok(())
    }
}
