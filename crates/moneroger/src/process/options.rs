//! Static description of one supervised service.

use std::ffi::OsString;
use std::path::{Path, PathBuf};

use moneroger_config::Config;
use thiserror::Error;

use crate::credentials::Credentials;
use crate::errors::Component;

const DAEMON_PROGRAM: &str = "monerod";
const WALLET_PROGRAM: &str = "monero-wallet-rpc";

/// Immutable per-service settings.
#[derive(Clone, Default, PartialEq, Eq)]
pub struct ServiceOptions {
    /// Data directory (daemon) or wallet directory (wallet).
    pub directory: PathBuf,
    /// RPC port the service binds.
    pub port: u16,
    /// Run against the test network.
    pub testnet: bool,
    /// Explicit RPC username.
    pub rpc_user: Option<String>,
    /// Explicit RPC password.
    pub rpc_pass: Option<String>,
    /// Explicit executable path, bypassing the locator.
    pub binary: Option<PathBuf>,
}

impl std::fmt::Debug for ServiceOptions {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ServiceOptions")
            .field("directory", &self.directory)
            .field("port", &self.port)
            .field("testnet", &self.testnet)
            .field("rpc_user", &self.rpc_user)
            .field("rpc_pass", &self.rpc_pass.as_ref().map(|_| "<redacted>"))
            .field("binary", &self.binary)
            .finish()
    }
}

impl ServiceOptions {
    /// Daemon settings drawn from `config`.
    #[must_use]
    pub fn daemon(config: &Config) -> Self {
        Self {
            directory: config.data_dir().map(Path::to_path_buf).unwrap_or_default(),
            port: config.daemon_port,
            testnet: config.testnet,
            rpc_user: config.daemon_rpc_user.clone(),
            rpc_pass: config.daemon_rpc_pass.clone(),
            binary: config.monerod_bin.clone(),
        }
    }

    /// Wallet settings drawn from `config`.
    #[must_use]
    pub fn wallet(config: &Config) -> Self {
        Self {
            directory: config.wallet_dir().map(Path::to_path_buf).unwrap_or_default(),
            port: config.wallet_port,
            testnet: config.testnet,
            rpc_user: config.wallet_rpc_user.clone(),
            rpc_pass: config.wallet_rpc_pass.clone(),
            binary: config.wallet_rpc_bin.clone(),
        }
    }
}

/// How the wallet reaches its daemon.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DaemonEndpoint {
    /// Daemon RPC port.
    pub port: u16,
    /// Daemon RPC credentials.
    pub credentials: Credentials,
}

impl DaemonEndpoint {
    /// Address passed to `--daemon-address`.
    #[must_use]
    pub fn address(&self) -> String {
        format!("http://localhost:{}", self.port)
    }
}

/// Which service a supervisor manages.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Role {
    /// `monerod`.
    Daemon,
    /// `monero-wallet-rpc`, bound to a daemon.
    Wallet {
        /// Daemon the wallet talks to.
        daemon: DaemonEndpoint,
        /// Password unlocking the wallet file.
        password: Option<String>,
    },
}

impl Role {
    /// Taxonomy component for failures of this service.
    #[must_use]
    pub const fn component(&self) -> Component {
        match self {
            Self::Daemon => Component::Daemon,
            Self::Wallet { .. } => Component::WalletRpc,
        }
    }

    /// Executable name looked up on the search path.
    #[must_use]
    pub const fn program(&self) -> &'static str {
        match self {
            Self::Daemon => DAEMON_PROGRAM,
            Self::Wallet { .. } => WALLET_PROGRAM,
        }
    }
}

/// Settings rejected before launch.
#[derive(Debug, Error, PartialEq, Eq)]
pub enum OptionsError {
    /// Port zero cannot be bound predictably.
    #[error("{program} RPC port must be between 1 and 65535")]
    InvalidPort {
        /// Executable the port belongs to.
        program: &'static str,
    },
    /// The wallet was pointed at daemon port zero.
    #[error("daemon port for {program} must be between 1 and 65535")]
    InvalidDaemonPort {
        /// Executable holding the link.
        program: &'static str,
    },
    /// No working directory was supplied.
    #[error("{program} requires a directory")]
    MissingDirectory {
        /// Executable lacking a directory.
        program: &'static str,
    },
}

/// Checks `options` for values that cannot produce a working service.
pub(crate) fn validate(role: &Role, options: &ServiceOptions) -> Result<(), OptionsError> {
    let program = role.program();
    if options.port == 0 {
        return Err(OptionsError::InvalidPort { program });
    }
    if options.directory.as_os_str().is_empty() {
        return Err(OptionsError::MissingDirectory { program });
    }
    if let Role::Wallet { daemon, .. } = role {
        if daemon.port == 0 {
            return Err(OptionsError::InvalidDaemonPort { program });
        }
    }
    Ok(())
}

/// Command line for the service executable.
pub(crate) fn arguments(
    role: &Role,
    options: &ServiceOptions,
    credentials: &Credentials,
) -> Vec<OsString> {
    let mut args = Vec::new();
    match role {
        Role::Daemon => {
            option(&mut args, "--data-dir", &options.directory);
            option(&mut args, "--rpc-bind-port", options.port.to_string());
            option(&mut args, "--rpc-login", credentials.login());
            args.push("--non-interactive".into());
        }
        Role::Wallet { daemon, password } => {
            option(&mut args, "--wallet-dir", &options.directory);
            option(&mut args, "--rpc-bind-port", options.port.to_string());
            option(&mut args, "--daemon-address", daemon.address());
            option(&mut args, "--daemon-login", daemon.credentials.login());
            option(&mut args, "--rpc-login", credentials.login());
            if let Some(secret) = password {
                option(&mut args, "--password", secret);
            }
        }
    }
    if options.testnet {
        args.push("--testnet".into());
    }
    args
}

fn option(args: &mut Vec<OsString>, flag: &str, value: impl Into<OsString>) {
    args.push(flag.into());
    args.push(value.into());
}
