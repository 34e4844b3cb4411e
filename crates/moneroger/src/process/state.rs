use strum::Display;

/// Lifecycle position of one supervised service.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Display)]
#[strum(serialize_all = "lowercase")]
pub enum ServiceState {
    /// Constructed, never started.
    #[default]
    Unknown,
    /// Spawning or waiting for readiness.
    Starting,
    /// Accepting connections, whether spawned here or attached.
    Running,
    /// Interrupted and waiting for exit.
    Stopping,
    /// Observed to exit.
    Stopped,
    /// The last lifecycle call failed.
    Failed,
}

impl ServiceState {
    /// Reports whether the service is expected to answer on its port.
    #[must_use]
    pub const fn is_running(self) -> bool {
        matches!(self, Self::Running)
    }
}
