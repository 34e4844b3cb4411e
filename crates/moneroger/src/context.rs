//! Deadlines and cooperative cancellation for lifecycle calls.
//!
//! Clones of a [`Context`] share one cancellation flag. A child derived with
//! [`Context::child`] observes its ancestors' cancellation, while cancelling
//! the child leaves its ancestors untouched.

use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};
use std::time::{Duration, Instant};

use thiserror::Error;

use crate::errors::Kind;

/// Reasons a [`Context`] stops admitting work.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Error)]
pub enum ContextError {
    /// [`Context::cancel`] was called.
    #[error("context cancelled")]
    Cancelled,
    /// The deadline passed.
    #[error("context deadline exceeded")]
    DeadlineExceeded,
}

impl ContextError {
    /// Taxonomy kind for work cut short by this reason.
    ///
    /// An expired deadline is a timeout; cancellation classifies as a
    /// network failure of the wait it interrupted.
    #[must_use]
    pub const fn kind(self) -> Kind {
        match self {
            Self::Cancelled => Kind::Network,
            Self::DeadlineExceeded => Kind::Timeout,
        }
    }
}

/// Optional deadline plus a cancellation flag chained to its parent.
#[derive(Debug, Clone, Default)]
pub struct Context {
    deadline: Option<Instant>,
    cancelled: Arc<AtomicBool>,
    parent: Option<Arc<Context>>,
}

impl Context {
    /// Context with no deadline that is never cancelled unless asked.
    #[must_use]
    pub fn background() -> Self {
        Self::default()
    }

    /// Context that expires `timeout` from now.
    #[must_use]
    pub fn with_timeout(timeout: Duration) -> Self {
        Self::background().child(timeout)
    }

    /// Derives a context that is cancelled with this one and whose deadline
    /// is the earlier of the parent's deadline and `timeout` from now.
    #[must_use]
    pub fn child(&self, timeout: Duration) -> Self {
        let candidate = Instant::now().checked_add(timeout);
        let deadline = match (self.deadline, candidate) {
            (Some(parent), Some(own)) => Some(parent.min(own)),
            (parent, own) => parent.or(own),
        };
        Self {
            deadline,
            cancelled: Arc::new(AtomicBool::new(false)),
            parent: Some(Arc::new(self.clone())),
        }
    }

    /// Cancels this context, its clones and every context derived from them.
    pub fn cancel(&self) {
        self.cancelled.store(true, Ordering::SeqCst);
    }

    /// Reports whether this context or an ancestor has been cancelled.
    #[must_use]
    pub fn is_cancelled(&self) -> bool {
        self.cancelled.load(Ordering::SeqCst)
            || self
                .parent
                .as_deref()
                .is_some_and(Self::is_cancelled)
    }

    /// Deadline, if one applies.
    #[must_use]
    pub const fn deadline(&self) -> Option<Instant> {
        self.deadline
    }

    /// Time left before the deadline; `None` without a deadline.
    #[must_use]
    pub fn remaining(&self) -> Option<Duration> {
        self.deadline
            .map(|deadline| deadline.saturating_duration_since(Instant::now()))
    }

    /// Fails once the context is cancelled or past its deadline.
    ///
    /// # Errors
    ///
    /// Returns [`ContextError::Cancelled`] ahead of
    /// [`ContextError::DeadlineExceeded`] when both apply.
    pub fn check(&self) -> Result<(), ContextError> {
        if self.is_cancelled() {
            return Err(ContextError::Cancelled);
        }
        match self.deadline {
            Some(deadline) if Instant::now() >= deadline => Err(ContextError::DeadlineExceeded),
            _ => Ok(()),
        }
    }
}
