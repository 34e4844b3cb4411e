//! Supervision of a `monerod` daemon and its dependent `monero-wallet-rpc`.
//!
//! A [`Supervisor`] owns one external service: it attaches to a port that is
//! already served, otherwise it locates and spawns the executable, waits for
//! its RPC port to accept connections, and later stops it with `SIGINT`
//! within a bounded timeout. The [`Coordinator`] starts the daemon before the
//! wallet, hands the daemon's address and credentials to the wallet, and
//! stops the pair in reverse order.
//!
//! Every failure that leaves the crate is a [`ServiceError`] carrying the
//! [`Component`], the [`Op`] in flight and a [`Kind`]; [`kind_of`] recovers
//! the kind through any number of wrapping layers.
//!
//! External seams (executable lookup, secret generation, port probing and
//! process spawning) are traits bundled in [`Collaborators`], so the
//! lifecycle can run against doubles.

pub mod collaborators;
pub mod context;
pub mod coordinator;
pub mod credentials;
pub mod errors;
pub mod launch;
pub mod locate;
pub mod probe;
pub mod process;
pub mod signal;
pub mod telemetry;

pub use collaborators::Collaborators;
pub use context::{Context, ContextError};
pub use coordinator::Coordinator;
pub use credentials::{Credentials, RandomSecret, SecretSource};
pub use errors::{Component, Kind, Op, ServiceError, classify, kind_of, same_kind};
pub use launch::{LaunchError, run, run_with};
pub use locate::{LocateError, Locator, SearchPathLocator};
pub use probe::{PortProbe, ProbeError, ProbeSettings, TcpPortProbe, wait_for_port};
pub use process::{
    Escalation, ManagedService, ServiceOptions, ServiceState, StartupFailurePolicy, Supervisor,
    SupervisorSettings,
};
pub use telemetry::{TelemetryError, TelemetryHandle};

#[cfg(test)]
pub(crate) mod test_support;

#[cfg(test)]
mod tests;
