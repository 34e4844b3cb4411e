//! Lifecycle supervision for one external service.

use std::time::Duration;

use moneroger_config::Config;

use crate::context::Context;
use crate::errors::ServiceError;
use crate::probe::ProbeSettings;

mod options;
mod spawn;
mod state;
mod supervisor;

pub use options::{DaemonEndpoint, OptionsError, Role, ServiceOptions};
pub use spawn::{ManagedProcess, Spawner, SystemProcess, SystemSpawner};
pub use state::ServiceState;
pub use supervisor::Supervisor;

pub(crate) const PROCESS_TARGET: &str = concat!(env!("CARGO_PKG_NAME"), "::process");

/// Default budget for a service to exit after an interrupt.
pub const DEFAULT_SHUTDOWN_TIMEOUT: Duration = Duration::from_secs(10);
/// Default wait for exit after SIGKILL.
pub const DEFAULT_KILL_GRACE: Duration = Duration::from_secs(5);

/// Handle the coordinator drives for each service.
pub trait ManagedService: Send + Sync {
    /// Brings the service up, attaching when its port is already served.
    ///
    /// # Errors
    ///
    /// Returns a classified [`ServiceError`] describing the failed step.
    fn start(&self, ctx: &Context) -> Result<(), ServiceError>;

    /// Brings the service down; succeeds at once when nothing is held.
    ///
    /// # Errors
    ///
    /// Returns a classified [`ServiceError`] describing the failed step.
    fn shutdown(&self, ctx: &Context) -> Result<(), ServiceError>;

    /// RPC port the service binds.
    fn rpc_port(&self) -> u16;

    /// RPC username.
    fn rpc_user(&self) -> &str;

    /// RPC password.
    fn rpc_pass(&self) -> &str;

    /// Process id as text, `"-1"` when no process is held.
    fn pid(&self) -> String;
}

/// What happens to a spawned process that never became ready.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum StartupFailurePolicy {
    /// Keep the process referenced so a later shutdown can reap it.
    #[default]
    LeaveRunning,
    /// Interrupt and reap the process before reporting the failure.
    Terminate,
}

/// What happens when a process outlives its shutdown budget.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum Escalation {
    /// Report the timeout and leave the process running.
    #[default]
    None,
    /// Send SIGKILL and wait up to `grace` for the exit.
    Kill {
        /// Wait after SIGKILL before giving up.
        grace: Duration,
    },
}

/// Timing and policy knobs shared by both supervisors.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SupervisorSettings {
    /// Readiness polling.
    pub probe: ProbeSettings,
    /// Budget for exit after an interrupt.
    pub shutdown_timeout: Duration,
    /// Handling of processes that fail readiness.
    pub startup_failure: StartupFailurePolicy,
    /// Handling of processes that ignore the interrupt.
    pub escalation: Escalation,
}

impl Default for SupervisorSettings {
    fn default() -> Self {
        Self {
            probe: ProbeSettings::default(),
            shutdown_timeout: DEFAULT_SHUTDOWN_TIMEOUT,
            startup_failure: StartupFailurePolicy::default(),
            escalation: Escalation::default(),
        }
    }
}

impl SupervisorSettings {
    /// Settings drawn from the loaded configuration.
    #[must_use]
    pub fn from_config(config: &Config) -> Self {
        let defaults = Self::default();
        Self {
            probe: ProbeSettings {
                startup_timeout: config.startup_timeout(),
                ..defaults.probe
            },
            shutdown_timeout: config.shutdown_timeout(),
            startup_failure: if config.terminate_on_startup_failure {
                StartupFailurePolicy::Terminate
            } else {
                StartupFailurePolicy::LeaveRunning
            },
            escalation: if config.kill_on_shutdown_timeout {
                Escalation::Kill {
                    grace: DEFAULT_KILL_GRACE,
                }
            } else {
                Escalation::None
            },
        }
    }
}
