//! Top-level run sequence for the `moneroger` binary.

use std::fs;
use std::io;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::Duration;

use ortho_config::{OrthoConfig, OrthoError};
use thiserror::Error;
use tracing::info;

use moneroger_config::{Config, ConfigError};

use crate::collaborators::Collaborators;
use crate::context::Context;
use crate::coordinator::Coordinator;
use crate::errors::ServiceError;
use crate::probe::DEFAULT_ATTEMPT_TIMEOUT;
use crate::signal::{ShutdownError, ShutdownSignal, SystemShutdownSignal};
use crate::telemetry::{self, TelemetryError};

const LAUNCH_TARGET: &str = concat!(env!("CARGO_PKG_NAME"), "::launch");

/// Budget for stopping both services once a signal arrives.
pub const SHUTDOWN_BUDGET: Duration = Duration::from_secs(30);

/// Source of the runtime configuration.
pub trait ConfigLoader: Send + Sync {
    /// Loads the configuration.
    ///
    /// # Errors
    ///
    /// Returns the loader's error when no configuration can be assembled.
    fn load(&self) -> Result<Config, Arc<OrthoError>>;
}

/// Loader that delegates to [`Config::load`].
#[derive(Debug, Default, Clone, Copy)]
pub struct SystemConfigLoader;

impl ConfigLoader for SystemConfigLoader {
    fn load(&self) -> Result<Config, Arc<OrthoError>> {
        Config::load()
    }
}

/// Loader returning a fixed configuration.
#[derive(Debug, Clone)]
pub struct StaticConfigLoader {
    config: Config,
}

impl StaticConfigLoader {
    /// Wraps `config`.
    #[must_use]
    pub const fn new(config: Config) -> Self {
        Self { config }
    }
}

impl ConfigLoader for StaticConfigLoader {
    fn load(&self) -> Result<Config, Arc<OrthoError>> {
        Ok(self.config.clone())
    }
}

/// Failures that end a run.
#[derive(Debug, Error)]
pub enum LaunchError {
    /// Configuration failed to load.
    #[error("failed to load configuration: {source}")]
    Load {
        /// Underlying loader error.
        #[source]
        source: Arc<OrthoError>,
    },
    /// Configuration loaded but is unusable.
    #[error(transparent)]
    Config(#[from] ConfigError),
    /// Logging could not be installed.
    #[error(transparent)]
    Telemetry(#[from] TelemetryError),
    /// A data or wallet directory could not be created.
    #[error("failed to prepare directory '{}': {source}", .path.display())]
    Directory {
        /// Directory that could not be created.
        path: PathBuf,
        /// Underlying IO error.
        #[source]
        source: io::Error,
    },
    /// Signal handlers could not be installed.
    #[error(transparent)]
    Signal(#[from] ShutdownError),
    /// A supervised service failed to start or stop.
    #[error(transparent)]
    Service(#[from] ServiceError),
}

/// Runs the supervisor with production collaborators.
///
/// # Errors
///
/// Returns the first [`LaunchError`] encountered.
pub fn run() -> Result<(), LaunchError> {
    let signal = SystemShutdownSignal::install()?;
    run_with(
        &SystemConfigLoader,
        &Collaborators::system(DEFAULT_ATTEMPT_TIMEOUT),
        &signal,
    )
}

/// Runs the supervisor with injected collaborators.
///
/// Loads and validates configuration, starts the daemon and wallet, blocks
/// until `signal` fires, then stops both within [`SHUTDOWN_BUDGET`].
///
/// # Errors
///
/// Returns the first [`LaunchError`] encountered. A startup failure leaves
/// already-running services to the configured startup failure policy.
pub fn run_with(
    loader: &dyn ConfigLoader,
    collaborators: &Collaborators,
    signal: &dyn ShutdownSignal,
) -> Result<(), LaunchError> {
    let config = loader
        .load()
        .map_err(|source| LaunchError::Load { source })?;
    telemetry::initialise(&config)?;
    config.validate()?;
    prepare_directories(&config)?;

    info!(
        target: LAUNCH_TARGET,
        daemon_port = config.daemon_port,
        wallet_port = config.wallet_port,
        testnet = config.testnet,
        "starting services"
    );
    let coordinator = Coordinator::create(&Context::background(), &config, collaborators)?;
    info!(
        target: LAUNCH_TARGET,
        daemon_pid = %coordinator.daemon_pid(),
        wallet_pid = %coordinator.wallet_pid(),
        "services ready"
    );

    signal.wait()?;
    coordinator.shutdown(&Context::with_timeout(SHUTDOWN_BUDGET))?;
    info!(target: LAUNCH_TARGET, "shutdown sequence completed");
    Ok(())
}

fn prepare_directories(config: &Config) -> Result<(), LaunchError> {
    for directory in [config.data_dir(), config.wallet_dir()].into_iter().flatten() {
        create_directory(directory)?;
    }
    Ok(())
}

fn create_directory(path: &Path) -> Result<(), LaunchError> {
    fs::create_dir_all(path).map_err(|source| LaunchError::Directory {
        path: path.to_path_buf(),
        source,
    })
}
