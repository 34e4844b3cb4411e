//! Error taxonomy shared by every supervised service.
//!
//! Each failure that leaves a supervisor is a [`ServiceError`] tagged with the
//! [`Component`] that raised it, the [`Op`] in flight, and a coarse [`Kind`]
//! that callers dispatch on. The underlying cause, when there is one, stays
//! reachable through [`std::error::Error::source`].

use std::error::Error as StdError;
use std::fmt;
use std::iter;

use strum::Display;
use thiserror::Error;

use crate::context::ContextError;

/// Boxed cause carried by a [`ServiceError`].
pub type BoxError = Box<dyn StdError + Send + Sync + 'static>;

/// Coarse failure category used for caller-side dispatch.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Display)]
pub enum Kind {
    /// The failure was not produced by this taxonomy.
    #[default]
    #[strum(serialize = "unknown error")]
    Unknown,
    /// Port or connectivity failure.
    #[strum(serialize = "network error")]
    Network,
    /// Spawn, signal, or wait failure.
    #[strum(serialize = "process error")]
    Process,
    /// Invalid port or missing required setting.
    #[strum(serialize = "configuration error")]
    Config,
    /// A startup or shutdown deadline elapsed.
    #[strum(serialize = "timeout error")]
    Timeout,
    /// Filesystem or permission failure.
    #[strum(serialize = "system error")]
    System,
}

/// Lifecycle operation in flight when a failure occurred.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Display)]
pub enum Op {
    /// Bringing a service up.
    Start,
    /// Bringing a service down.
    Shutdown,
    /// Confirming a running service still answers.
    HealthCheck,
    /// Waiting for a service to bind its RPC port.
    PortBinding,
    /// Launching the service executable.
    ProcessSpawn,
    /// Checking the service settings before launch.
    ValidateConfig,
}

/// Supervised service that raised a failure.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Display)]
pub enum Component {
    /// The blockchain daemon.
    #[strum(serialize = "monerod")]
    Daemon,
    /// The wallet RPC service.
    #[strum(serialize = "wallet-rpc")]
    WalletRpc,
}

/// Classified failure crossing a supervisor boundary.
///
/// Renders as `<component>: <operation>: <kind>` followed by `: <cause>` when
/// a cause is attached.
#[derive(Debug, Error)]
#[error("{component}: {op}: {kind}{}", CauseSuffix(.source.as_ref()))]
pub struct ServiceError {
    component: Component,
    op: Op,
    kind: Kind,
    #[source]
    source: Option<BoxError>,
}

struct CauseSuffix<'a>(Option<&'a BoxError>);

impl fmt::Display for CauseSuffix<'_> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self.0 {
            Some(cause) => write!(f, ": {cause}"),
            None => Ok(()),
        }
    }
}

/// One piece of a [`ServiceError`], for assembling errors from parts supplied
/// in any order.
#[derive(Debug)]
pub enum Part {
    /// Service that failed.
    Component(Component),
    /// Operation in flight.
    Op(Op),
    /// Failure category.
    Kind(Kind),
    /// Underlying cause.
    Source(BoxError),
}

impl From<Component> for Part {
    fn from(value: Component) -> Self {
        Self::Component(value)
    }
}

impl From<Op> for Part {
    fn from(value: Op) -> Self {
        Self::Op(value)
    }
}

impl From<Kind> for Part {
    fn from(value: Kind) -> Self {
        Self::Kind(value)
    }
}

impl From<BoxError> for Part {
    fn from(value: BoxError) -> Self {
        Self::Source(value)
    }
}

impl ServiceError {
    /// Creates an error without a cause.
    #[must_use]
    pub const fn new(component: Component, op: Op, kind: Kind) -> Self {
        Self {
            component,
            op,
            kind,
            source: None,
        }
    }

    /// Attaches the underlying cause.
    #[must_use]
    pub fn with_source(mut self, source: impl Into<BoxError>) -> Self {
        self.source = Some(source.into());
        self
    }

    /// Assembles an error from parts given in any order.
    ///
    /// Later parts replace earlier parts of the same sort. The kind defaults
    /// to [`Kind::Unknown`]. Returns `None` when no component or no operation
    /// was supplied.
    pub fn from_parts(parts: impl IntoIterator<Item = Part>) -> Option<Self> {
        let mut component = None;
        let mut op = None;
        let mut kind = Kind::Unknown;
        let mut source = None;
        for part in parts {
            match part {
                Part::Component(value) => component = Some(value),
                Part::Op(value) => op = Some(value),
                Part::Kind(value) => kind = value,
                Part::Source(value) => source = Some(value),
            }
        }
        Some(Self {
            component: component?,
            op: op?,
            kind,
            source,
        })
    }

    /// Service that failed.
    #[must_use]
    pub const fn component(&self) -> Component {
        self.component
    }

    /// Operation in flight.
    #[must_use]
    pub const fn op(&self) -> Op {
        self.op
    }

    /// Failure category.
    #[must_use]
    pub const fn kind(&self) -> Kind {
        self.kind
    }

    /// Reports whether the failure stems from a cancelled [`Context`].
    ///
    /// [`Context`]: crate::context::Context
    #[must_use]
    pub fn is_cancelled(&self) -> bool {
        chain(self).any(|error| {
            matches!(
                error.downcast_ref::<ContextError>(),
                Some(ContextError::Cancelled)
            )
        })
    }
}

fn chain<'a>(
    error: &'a (dyn StdError + 'static),
) -> impl Iterator<Item = &'a (dyn StdError + 'static)> {
    iter::successors(Some(error), |&current| current.source())
}

/// Returns the kind of the first [`ServiceError`] found in the source chain.
#[must_use]
pub fn classify(error: &(dyn StdError + 'static)) -> Option<Kind> {
    chain(error).find_map(|current| current.downcast_ref::<ServiceError>().map(ServiceError::kind))
}

/// Extracts the [`Kind`] of an arbitrarily wrapped error.
///
/// Errors that never passed through the taxonomy report [`Kind::Unknown`].
#[must_use]
pub fn kind_of(error: &(dyn StdError + 'static)) -> Kind {
    classify(error).unwrap_or_default()
}

/// Compares two errors by kind alone.
///
/// Returns `false` when either error is unclassified.
#[must_use]
pub fn same_kind(left: &(dyn StdError + 'static), right: &(dyn StdError + 'static)) -> bool {
    match (classify(left), classify(right)) {
        (Some(left_kind), Some(right_kind)) => left_kind == right_kind,
        _ => false,
    }
}
