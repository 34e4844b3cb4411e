//! Ordered startup and shutdown of the daemon and wallet pair.

use std::sync::Arc;

use moneroger_config::Config;
use tracing::info;

use crate::collaborators::Collaborators;
use crate::context::Context;
use crate::errors::ServiceError;
use crate::process::{ManagedService, ServiceOptions, Supervisor, SupervisorSettings};

const COORDINATOR_TARGET: &str = concat!(env!("CARGO_PKG_NAME"), "::coordinator");

/// Owns one daemon and the wallet that depends on it.
pub struct Coordinator {
    daemon: Arc<dyn ManagedService>,
    wallet: Arc<dyn ManagedService>,
}

impl Coordinator {
    /// Builds both supervisors from `config`.
    ///
    /// Daemon credentials are resolved first and handed to the wallet so it
    /// can log in to the daemon.
    #[must_use]
    pub fn new(config: &Config, collaborators: &Collaborators) -> Self {
        let settings = SupervisorSettings::from_config(config);
        let daemon = Supervisor::daemon(
            ServiceOptions::daemon(config),
            settings,
            collaborators.clone(),
        );
        let wallet = Supervisor::wallet(
            ServiceOptions::wallet(config),
            daemon.endpoint(),
            config.wallet_password.clone(),
            settings,
            collaborators.clone(),
        );
        Self::from_services(Arc::new(daemon), Arc::new(wallet))
    }

    /// Wraps already-built services.
    #[must_use]
    pub fn from_services(daemon: Arc<dyn ManagedService>, wallet: Arc<dyn ManagedService>) -> Self {
        Self { daemon, wallet }
    }

    /// Builds both supervisors and starts them in order.
    ///
    /// # Errors
    ///
    /// Returns the first startup failure, unchanged.
    pub fn create(
        ctx: &Context,
        config: &Config,
        collaborators: &Collaborators,
    ) -> Result<Self, ServiceError> {
        let coordinator = Self::new(config, collaborators);
        coordinator.start(ctx)?;
        Ok(coordinator)
    }

    /// Starts the daemon, then the wallet.
    ///
    /// The wallet is never attempted when the daemon fails. A wallet failure
    /// leaves the daemon running.
    ///
    /// # Errors
    ///
    /// Returns the failing service's error unchanged.
    pub fn start(&self, ctx: &Context) -> Result<(), ServiceError> {
        self.daemon.start(ctx)?;
        info!(
            target: COORDINATOR_TARGET,
            port = self.daemon.rpc_port(),
            pid = %self.daemon.pid(),
            "daemon ready"
        );
        self.wallet.start(ctx)?;
        info!(
            target: COORDINATOR_TARGET,
            port = self.wallet.rpc_port(),
            pid = %self.wallet.pid(),
            "wallet ready"
        );
        Ok(())
    }

    /// Stops the wallet, then the daemon.
    ///
    /// # Errors
    ///
    /// A wallet failure is returned at once and the daemon is left alone.
    pub fn shutdown(&self, ctx: &Context) -> Result<(), ServiceError> {
        self.wallet.shutdown(ctx)?;
        info!(target: COORDINATOR_TARGET, "wallet stopped");
        self.daemon.shutdown(ctx)?;
        info!(target: COORDINATOR_TARGET, "daemon stopped");
        Ok(())
    }

    /// Daemon handle.
    #[must_use]
    pub fn daemon(&self) -> &dyn ManagedService {
        self.daemon.as_ref()
    }

    /// Wallet handle.
    #[must_use]
    pub fn wallet(&self) -> &dyn ManagedService {
        self.wallet.as_ref()
    }

    /// Daemon process id, `"-1"` when attached or stopped.
    #[must_use]
    pub fn daemon_pid(&self) -> String {
        self.daemon.pid()
    }

    /// Wallet process id, `"-1"` when attached or stopped.
    #[must_use]
    pub fn wallet_pid(&self) -> String {
        self.wallet.pid()
    }
}

impl std::fmt::Debug for Coordinator {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Coordinator")
            .field("daemon_port", &self.daemon.rpc_port())
            .field("wallet_port", &self.wallet.rpc_port())
            .finish()
    }
}
