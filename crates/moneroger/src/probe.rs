//! TCP readiness probing for supervised services.

use std::net::{TcpStream, ToSocketAddrs};
use std::thread;
use std::time::{Duration, Instant};

use thiserror::Error;
use tracing::{debug, info};

use crate::context::{Context, ContextError};
use crate::errors::Kind;

const PROBE_TARGET: &str = concat!(env!("CARGO_PKG_NAME"), "::probe");
const PROBE_HOST: &str = "localhost";

/// Default budget for a service to start accepting connections.
pub const DEFAULT_STARTUP_TIMEOUT: Duration = Duration::from_secs(30);
/// Default pause between connection attempts.
pub const DEFAULT_POLL_INTERVAL: Duration = Duration::from_secs(1);
/// Default timeout for a single connection attempt.
pub const DEFAULT_ATTEMPT_TIMEOUT: Duration = Duration::from_secs(1);

/// Reports whether something accepts TCP connections on a local port.
pub trait PortProbe: Send + Sync {
    /// Returns `true` when `localhost:<port>` accepts a connection.
    fn port_open(&self, port: u16) -> bool;
}

/// Probe that opens and immediately drops a TCP connection.
#[derive(Debug, Clone, Copy)]
pub struct TcpPortProbe {
    attempt_timeout: Duration,
}

impl TcpPortProbe {
    /// Builds a probe bounding each connection attempt by `attempt_timeout`.
    #[must_use]
    pub const fn new(attempt_timeout: Duration) -> Self {
        Self { attempt_timeout }
    }
}

impl Default for TcpPortProbe {
    fn default() -> Self {
        Self::new(DEFAULT_ATTEMPT_TIMEOUT)
    }
}

impl PortProbe for TcpPortProbe {
    fn port_open(&self, port: u16) -> bool {
        let Ok(addresses) = (PROBE_HOST, port).to_socket_addrs() else {
            return false;
        };
        addresses
            .into_iter()
            .any(|address| TcpStream::connect_timeout(&address, self.attempt_timeout).is_ok())
    }
}

/// Timing knobs for [`wait_for_port`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ProbeSettings {
    /// Total budget before giving up.
    pub startup_timeout: Duration,
    /// Pause between failed attempts.
    pub poll_interval: Duration,
    /// Timeout for each connection attempt.
    pub attempt_timeout: Duration,
}

impl Default for ProbeSettings {
    fn default() -> Self {
        Self {
            startup_timeout: DEFAULT_STARTUP_TIMEOUT,
            poll_interval: DEFAULT_POLL_INTERVAL,
            attempt_timeout: DEFAULT_ATTEMPT_TIMEOUT,
        }
    }
}

/// Reasons [`wait_for_port`] gave up.
#[derive(Debug, Error, PartialEq, Eq)]
pub enum ProbeError {
    /// The caller's context was cancelled or expired.
    #[error("readiness wait aborted: {0}")]
    Context(#[from] ContextError),
    /// The port never accepted a connection within the startup budget.
    #[error("port {port} not ready after {}ms", .timeout.as_millis())]
    TimedOut {
        /// Port that was probed.
        port: u16,
        /// Budget that elapsed.
        timeout: Duration,
    },
}

impl ProbeError {
    /// Taxonomy kind for this failure.
    #[must_use]
    pub const fn kind(&self) -> Kind {
        match self {
            Self::TimedOut { .. } => Kind::Timeout,
            Self::Context(reason) => reason.kind(),
        }
    }
}

/// Blocks until `port` accepts connections.
///
/// The context is checked before every attempt, so a cancelled context
/// returns at once and cancellation latency is bounded by the poll interval.
///
/// # Errors
///
/// Returns [`ProbeError::Context`] when the context stops admitting work and
/// [`ProbeError::TimedOut`] once the startup budget elapses.
pub fn wait_for_port(
    ctx: &Context,
    probe: &dyn PortProbe,
    port: u16,
    settings: &ProbeSettings,
) -> Result<(), ProbeError> {
    let started = Instant::now();
    let timed_out = || ProbeError::TimedOut {
        port,
        timeout: settings.startup_timeout,
    };
    let deadline = started
        .checked_add(settings.startup_timeout)
        .ok_or_else(timed_out)?;
    let mut attempts: u32 = 0;

    loop {
        ctx.check()?;
        attempts = attempts.saturating_add(1);
        if probe.port_open(port) {
            info!(
                target: PROBE_TARGET,
                port,
                attempts,
                elapsed_ms = started.elapsed().as_millis(),
                "port accepting connections"
            );
            return Ok(());
        }

        let now = Instant::now();
        if now >= deadline {
            return Err(timed_out());
        }
        let mut pause = settings.poll_interval.min(deadline - now);
        if let Some(remaining) = ctx.remaining() {
            pause = pause.min(remaining);
        }
        debug!(
            target: PROBE_TARGET,
            port,
            attempts,
            pause_ms = pause.as_millis(),
            "port not ready"
        );
        thread::sleep(pause);
    }
}

#[cfg(test)]
mod tests {
    use std::net::TcpListener;
    use std::sync::Mutex;

    use rstest::rstest;

    use super::*;

    struct ScriptedProbe {
        answers: Mutex<Vec<bool>>,
        calls: Mutex<u32>,
    }

    impl ScriptedProbe {
        fn new(answers: &[bool]) -> Self {
            let mut reversed = answers.to_vec();
            reversed.reverse();
            Self {
                answers: Mutex::new(reversed),
                calls: Mutex::new(0),
            }
        }

        fn calls(&self) -> u32 {
            *self.calls.lock().expect("calls lock")
        }
    }

    impl PortProbe for ScriptedProbe {
        fn port_open(&self, _port: u16) -> bool {
            *self.calls.lock().expect("calls lock") += 1;
            self.answers.lock().expect("answers lock").pop().unwrap_or(false)
        }
    }

    fn quick() -> ProbeSettings {
        ProbeSettings {
            startup_timeout: Duration::from_millis(300),
            poll_interval: Duration::from_millis(20),
            attempt_timeout: Duration::from_millis(100),
        }
    }

    fn free_port() -> u16 {
        let listener = TcpListener::bind("127.0.0.1:0").expect("bind ephemeral port");
        listener.local_addr().expect("local addr").port()
    }

    #[test]
    fn cancelled_context_returns_without_probing() {
        let ctx = Context::background();
        ctx.cancel();
        let probe = ScriptedProbe::new(&[true]);
        let started = Instant::now();

        let result = wait_for_port(&ctx, &probe, 18081, &ProbeSettings::default());

        assert_eq!(result, Err(ProbeError::Context(ContextError::Cancelled)));
        assert_eq!(probe.calls(), 0);
        assert!(started.elapsed() < Duration::from_millis(100));
    }

    #[test]
    fn retries_until_the_port_opens() {
        let probe = ScriptedProbe::new(&[false, false, true]);
        let result = wait_for_port(&Context::background(), &probe, 18081, &quick());
        assert_eq!(result, Ok(()));
        assert_eq!(probe.calls(), 3);
    }

    #[test]
    fn gives_up_after_the_startup_budget() {
        let probe = ScriptedProbe::new(&[]);
        let started = Instant::now();

        let result = wait_for_port(&Context::background(), &probe, 18089, &quick());

        assert_eq!(
            result,
            Err(ProbeError::TimedOut {
                port: 18089,
                timeout: Duration::from_millis(300),
            })
        );
        assert!(started.elapsed() >= Duration::from_millis(300));
    }

    #[test]
    fn context_deadline_stops_the_wait() {
        let ctx = Context::with_timeout(Duration::from_millis(50));
        let probe = ScriptedProbe::new(&[]);
        let settings = ProbeSettings {
            startup_timeout: Duration::from_secs(30),
            ..quick()
        };

        let result = wait_for_port(&ctx, &probe, 18081, &settings);

        assert_eq!(
            result,
            Err(ProbeError::Context(ContextError::DeadlineExceeded))
        );
    }

    #[rstest]
    #[case::timed_out(ProbeError::TimedOut { port: 1, timeout: Duration::ZERO }, Kind::Timeout)]
    #[case::deadline(ProbeError::Context(ContextError::DeadlineExceeded), Kind::Timeout)]
    #[case::cancelled(ProbeError::Context(ContextError::Cancelled), Kind::Network)]
    fn probe_errors_map_to_kinds(#[case] error: ProbeError, #[case] kind: Kind) {
        assert_eq!(error.kind(), kind);
    }

    #[test]
    fn tcp_probe_sees_a_bound_listener() {
        let listener = TcpListener::bind("127.0.0.1:0").expect("bind ephemeral port");
        let port = listener.local_addr().expect("local addr").port();
        assert!(TcpPortProbe::default().port_open(port));
    }

    #[test]
    fn tcp_probe_reports_closed_port() {
        let port = free_port();
        assert!(!TcpPortProbe::new(Duration::from_millis(200)).port_open(port));
    }

    #[test]
    fn port_opening_within_one_interval_is_seen_promptly() {
        let port = free_port();
        let interval = Duration::from_millis(400);
        let settings = ProbeSettings {
            startup_timeout: Duration::from_secs(5),
            poll_interval: interval,
            attempt_timeout: Duration::from_millis(200),
        };
        let binder = thread::spawn(move || {
            thread::sleep(Duration::from_millis(150));
            let listener = TcpListener::bind(("127.0.0.1", port)).expect("bind probed port");
            thread::sleep(Duration::from_secs(2));
            drop(listener);
        });
        let started = Instant::now();

        let result = wait_for_port(
            &Context::background(),
            &TcpPortProbe::new(settings.attempt_timeout),
            port,
            &settings,
        );

        assert_eq!(result, Ok(()));
        assert!(
            started.elapsed() < interval + Duration::from_millis(300),
            "took {:?}",
            started.elapsed()
        );
        binder.join().expect("binder thread");
    }
}
