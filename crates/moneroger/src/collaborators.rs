//! Outside-world seams consumed by the supervisors.

use std::sync::Arc;
use std::time::Duration;

use crate::credentials::{RandomSecret, SecretSource};
use crate::locate::{Locator, SearchPathLocator};
use crate::probe::{PortProbe, TcpPortProbe};
use crate::process::{Spawner, SystemSpawner};

/// Shared handles to executable lookup, secret generation, port probing and
/// process launching.
#[derive(Clone)]
pub struct Collaborators {
    /// Executable lookup.
    pub locator: Arc<dyn Locator>,
    /// Credential generation.
    pub secrets: Arc<dyn SecretSource>,
    /// Port reachability.
    pub probe: Arc<dyn PortProbe>,
    /// Process launching.
    pub spawner: Arc<dyn Spawner>,
}

impl Collaborators {
    /// Real implementations, with `attempt_timeout` bounding each port probe.
    #[must_use]
    pub fn system(attempt_timeout: Duration) -> Self {
        Self {
            locator: Arc::new(SearchPathLocator::from_environment()),
            secrets: Arc::new(RandomSecret),
            probe: Arc::new(TcpPortProbe::new(attempt_timeout)),
            spawner: Arc::new(SystemSpawner),
        }
    }

    /// Replaces the spawner.
    #[must_use]
    pub fn with_spawner(mut self, spawner: Arc<dyn Spawner>) -> Self {
        self.spawner = spawner;
        self
    }

    /// Replaces the locator.
    #[must_use]
    pub fn with_locator(mut self, locator: Arc<dyn Locator>) -> Self {
        self.locator = locator;
        self
    }

    /// Replaces the secret source.
    #[must_use]
    pub fn with_secrets(mut self, secrets: Arc<dyn SecretSource>) -> Self {
        self.secrets = secrets;
        self
    }

    /// Replaces the port probe.
    #[must_use]
    pub fn with_probe(mut self, probe: Arc<dyn PortProbe>) -> Self {
        self.probe = probe;
        self
    }
}

impl std::fmt::Debug for Collaborators {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Collaborators").finish_non_exhaustive()
    }
}
