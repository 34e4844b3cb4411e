use std::io;
use std::path::{Path, PathBuf};
use std::sync::mpsc::{self, Receiver, RecvTimeoutError};
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};
use std::thread;
use std::time::Duration;

use tracing::{debug, info, warn};

use super::options::{self, DaemonEndpoint, Role, ServiceOptions};
use super::{
    Escalation, ManagedProcess, ManagedService, PROCESS_TARGET, ServiceState,
    StartupFailurePolicy, SupervisorSettings,
};
use crate::collaborators::Collaborators;
use crate::context::{Context, ContextError};
use crate::credentials::Credentials;
use crate::errors::{Component, Kind, Op, ServiceError};
use crate::probe::wait_for_port;

/// Longest single blocking wait on the exit channel between context checks.
const WAIT_SLICE: Duration = Duration::from_millis(100);

type ExitReport = io::Result<Option<i32>>;

enum Exit {
    Reported(ExitReport),
    Aborted(ContextError),
}

#[derive(Default)]
struct Inner {
    state: ServiceState,
    process: Option<Arc<dyn ManagedProcess>>,
}

/// Owns the lifecycle of one `monerod` or `monero-wallet-rpc` process.
///
/// `start` and `shutdown` are serialised; accessors never wait behind them.
pub struct Supervisor {
    role: Role,
    options: ServiceOptions,
    credentials: Credentials,
    settings: SupervisorSettings,
    collaborators: Collaborators,
    lifecycle: Mutex<()>,
    inner: Mutex<Inner>,
}

impl Supervisor {
    /// Builds a supervisor, resolving credentials immediately.
    #[must_use]
    pub fn new(
        role: Role,
        options: ServiceOptions,
        settings: SupervisorSettings,
        collaborators: Collaborators,
    ) -> Self {
        let credentials = Credentials::resolve(
            options.rpc_user.as_deref(),
            options.rpc_pass.as_deref(),
            collaborators.secrets.as_ref(),
        );
        Self {
            role,
            options,
            credentials,
            settings,
            collaborators,
            lifecycle: Mutex::new(()),
            inner: Mutex::new(Inner::default()),
        }
    }

    /// Supervisor for `monerod`.
    #[must_use]
    pub fn daemon(
        options: ServiceOptions,
        settings: SupervisorSettings,
        collaborators: Collaborators,
    ) -> Self {
        Self::new(Role::Daemon, options, settings, collaborators)
    }

    /// Supervisor for `monero-wallet-rpc` bound to `daemon`.
    #[must_use]
    pub fn wallet(
        options: ServiceOptions,
        daemon: DaemonEndpoint,
        password: Option<String>,
        settings: SupervisorSettings,
        collaborators: Collaborators,
    ) -> Self {
        Self::new(Role::Wallet { daemon, password }, options, settings, collaborators)
    }

    /// Port and credentials a dependent wallet uses to reach this service.
    #[must_use]
    pub fn endpoint(&self) -> DaemonEndpoint {
        DaemonEndpoint {
            port: self.options.port,
            credentials: self.credentials.clone(),
        }
    }

    /// Service this supervisor manages.
    #[must_use]
    pub const fn role(&self) -> &Role {
        &self.role
    }

    /// Taxonomy component for this service.
    #[must_use]
    pub const fn component(&self) -> Component {
        self.role.component()
    }

    /// Current lifecycle state.
    #[must_use]
    pub fn state(&self) -> ServiceState {
        self.inner().state
    }

    /// Whether the service runs against the test network.
    #[must_use]
    pub const fn testnet(&self) -> bool {
        self.options.testnet
    }

    /// Data or wallet directory handed to the service.
    #[must_use]
    pub fn directory(&self) -> &Path {
        &self.options.directory
    }

    /// Credentials resolved at construction.
    #[must_use]
    pub const fn credentials(&self) -> &Credentials {
        &self.credentials
    }

    /// Brings the service up.
    ///
    /// When the port already accepts connections the service is treated as
    /// externally managed and nothing is spawned. A supervisor that is
    /// already running returns at once.
    ///
    /// # Errors
    ///
    /// Returns a [`ServiceError`] tagged with the failed step: validation
    /// (`ValidateConfig`), launch (`ProcessSpawn`), readiness (`PortBinding`)
    /// or the confirming probe (`HealthCheck`). A retry that cannot stop the
    /// process left by an earlier attempt fails with that `Shutdown` error.
    pub fn start(&self, ctx: &Context) -> Result<(), ServiceError> {
        let _lifecycle = self.lifecycle.lock().unwrap_or_else(PoisonError::into_inner);
        if self.state().is_running() {
            debug!(target: PROCESS_TARGET, component = %self.component(), "already running");
            return Ok(());
        }
        let result = self.start_locked(ctx);
        if let Err(error) = &result {
            self.set_state(ServiceState::Failed);
            warn!(target: PROCESS_TARGET, component = %self.component(), %error, "start failed");
        }
        result
    }

    fn start_locked(&self, ctx: &Context) -> Result<(), ServiceError> {
        options::validate(&self.role, &self.options)
            .map_err(|source| self.error(Op::ValidateConfig, Kind::Config).with_source(source))?;
        ctx.check()
            .map_err(|source| self.error(Op::Start, source.kind()).with_source(source))?;
        self.set_state(ServiceState::Starting);

        let port = self.options.port;
        if self.collaborators.probe.port_open(port) {
            info!(
                target: PROCESS_TARGET,
                component = %self.component(),
                port,
                "port already served, attaching"
            );
            self.set_state(ServiceState::Running);
            return Ok(());
        }

        self.release_held(ctx)?;
        let program = self.program()?;
        let args = options::arguments(&self.role, &self.options, &self.credentials);
        let process = self
            .collaborators
            .spawner
            .spawn(&program, &args)
            .map_err(|source| self.error(Op::ProcessSpawn, Kind::Process).with_source(source))?;
        info!(
            target: PROCESS_TARGET,
            component = %self.component(),
            pid = process.id(),
            program = %program.display(),
            port,
            "process spawned"
        );
        self.inner().process = Some(Arc::clone(&process));

        if let Err(error) = self.await_ready(ctx) {
            self.abandon(&process);
            return Err(error);
        }
        self.set_state(ServiceState::Running);
        info!(
            target: PROCESS_TARGET,
            component = %self.component(),
            pid = process.id(),
            port,
            "service ready"
        );
        Ok(())
    }

    /// Stops a process kept by an earlier failed start before a new spawn
    /// replaces it.
    fn release_held(&self, ctx: &Context) -> Result<(), ServiceError> {
        let held = self.inner().process.clone();
        let Some(process) = held else {
            return Ok(());
        };
        info!(
            target: PROCESS_TARGET,
            component = %self.component(),
            pid = process.id(),
            "stopping process left by an earlier start"
        );
        self.stop(ctx, &process)?;
        self.set_state(ServiceState::Starting);
        Ok(())
    }

    fn program(&self) -> Result<PathBuf, ServiceError> {
        if let Some(binary) = &self.options.binary {
            return Ok(binary.clone());
        }
        self.collaborators
            .locator
            .locate(self.role.program())
            .map_err(|source| self.error(Op::ProcessSpawn, Kind::Process).with_source(source))
    }

    fn await_ready(&self, ctx: &Context) -> Result<(), ServiceError> {
        wait_for_port(
            ctx,
            self.collaborators.probe.as_ref(),
            self.options.port,
            &self.settings.probe,
        )
        .map_err(|source| self.error(Op::PortBinding, source.kind()).with_source(source))?;
        self.check_health()
    }

    fn abandon(&self, process: &Arc<dyn ManagedProcess>) {
        let pid = process.id();
        match self.settings.startup_failure {
            StartupFailurePolicy::LeaveRunning => warn!(
                target: PROCESS_TARGET,
                component = %self.component(),
                pid,
                "leaving unready process running"
            ),
            StartupFailurePolicy::Terminate => {
                match self.stop(&Context::background(), process) {
                    Ok(()) => info!(
                        target: PROCESS_TARGET,
                        component = %self.component(),
                        pid,
                        "terminated unready process"
                    ),
                    Err(error) => warn!(
                        target: PROCESS_TARGET,
                        component = %self.component(),
                        pid,
                        %error,
                        "failed to terminate unready process"
                    ),
                }
            }
        }
    }

    /// Confirms the service port still accepts connections.
    ///
    /// # Errors
    ///
    /// Returns a `Network` error tagged `HealthCheck` when it does not.
    pub fn check_health(&self) -> Result<(), ServiceError> {
        let port = self.options.port;
        if self.collaborators.probe.port_open(port) {
            return Ok(());
        }
        let source = io::Error::new(
            io::ErrorKind::ConnectionRefused,
            format!("port {port} not accepting connections"),
        );
        Err(self.error(Op::HealthCheck, Kind::Network).with_source(source))
    }

    /// Interrupts the held process and waits for it to exit.
    ///
    /// Without a held process this succeeds immediately, however often it is
    /// called.
    ///
    /// # Errors
    ///
    /// Returns a `Process` error when the signal or the wait fails and a
    /// `Timeout` error when the process outlives the shutdown budget and
    /// escalation did not stop it.
    pub fn shutdown(&self, ctx: &Context) -> Result<(), ServiceError> {
        let _lifecycle = self.lifecycle.lock().unwrap_or_else(PoisonError::into_inner);
        let held = self.inner().process.clone();
        let Some(process) = held else {
            debug!(target: PROCESS_TARGET, component = %self.component(), "no process held");
            return Ok(());
        };
        self.stop(ctx, &process)
    }

    fn stop(&self, ctx: &Context, process: &Arc<dyn ManagedProcess>) -> Result<(), ServiceError> {
        let pid = process.id();
        self.set_state(ServiceState::Stopping);
        info!(target: PROCESS_TARGET, component = %self.component(), pid, "interrupting process");
        if let Err(source) = process.interrupt() {
            return Err(self.failed(Op::Shutdown, Kind::Process, source));
        }
        let reports = match spawn_waiter(Arc::clone(process)) {
            Ok(reports) => reports,
            Err(source) => return Err(self.failed(Op::Shutdown, Kind::Process, source)),
        };
        let budget = ctx.child(self.settings.shutdown_timeout);
        match await_exit(&budget, &reports) {
            Exit::Reported(report) => self.record_exit(pid, report),
            Exit::Aborted(reason) => self.escalate(ctx, process, &reports, reason),
        }
    }

    fn escalate(
        &self,
        ctx: &Context,
        process: &Arc<dyn ManagedProcess>,
        reports: &Receiver<ExitReport>,
        reason: ContextError,
    ) -> Result<(), ServiceError> {
        let pid = process.id();
        let Escalation::Kill { grace } = self.settings.escalation else {
            warn!(
                target: PROCESS_TARGET,
                component = %self.component(),
                pid,
                %reason,
                "process still running after shutdown budget"
            );
            return Err(self.failed(Op::Shutdown, Kind::Timeout, reason));
        };
        warn!(
            target: PROCESS_TARGET,
            component = %self.component(),
            pid,
            %reason,
            grace_ms = grace.as_millis(),
            "shutdown budget exhausted, sending SIGKILL"
        );
        if let Err(source) = process.kill() {
            return Err(self.failed(Op::Shutdown, Kind::Process, source));
        }
        match await_exit(&ctx.child(grace), reports) {
            Exit::Reported(report) => self.record_exit(pid, report),
            Exit::Aborted(_) => Err(self.failed(Op::Shutdown, Kind::Timeout, reason)),
        }
    }

    fn record_exit(&self, pid: u32, report: ExitReport) -> Result<(), ServiceError> {
        match report {
            Ok(code) => {
                {
                    let mut inner = self.inner();
                    inner.process = None;
                    inner.state = ServiceState::Stopped;
                }
                info!(
                    target: PROCESS_TARGET,
                    component = %self.component(),
                    pid,
                    exit_code = ?code,
                    "process exited"
                );
                Ok(())
            }
            Err(source) => Err(self.failed(Op::Shutdown, Kind::Process, source)),
        }
    }

    fn inner(&self) -> MutexGuard<'_, Inner> {
        self.inner.lock().unwrap_or_else(PoisonError::into_inner)
    }

    fn set_state(&self, state: ServiceState) {
        self.inner().state = state;
    }

    const fn error(&self, op: Op, kind: Kind) -> ServiceError {
        ServiceError::new(self.component(), op, kind)
    }

    fn failed(
        &self,
        op: Op,
        kind: Kind,
        source: impl std::error::Error + Send + Sync + 'static,
    ) -> ServiceError {
        self.set_state(ServiceState::Failed);
        self.error(op, kind).with_source(source)
    }
}

impl ManagedService for Supervisor {
    fn start(&self, ctx: &Context) -> Result<(), ServiceError> {
        Self::start(self, ctx)
    }

    fn shutdown(&self, ctx: &Context) -> Result<(), ServiceError> {
        Self::shutdown(self, ctx)
    }

    fn rpc_port(&self) -> u16 {
        self.options.port
    }

    fn rpc_user(&self) -> &str {
        self.credentials.user()
    }

    fn rpc_pass(&self) -> &str {
        self.credentials.pass()
    }

    fn pid(&self) -> String {
        self.inner()
            .process
            .as_ref()
            .map_or_else(|| "-1".to_owned(), |process| process.id().to_string())
    }
}

impl std::fmt::Debug for Supervisor {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Supervisor")
            .field("role", &self.role.program())
            .field("options", &self.options)
            .field("state", &self.state())
            .finish_non_exhaustive()
    }
}

fn spawn_waiter(process: Arc<dyn ManagedProcess>) -> io::Result<Receiver<ExitReport>> {
    let (sender, receiver) = mpsc::sync_channel(1);
    let pid = process.id();
    thread::Builder::new()
        .name(format!("exit-waiter-{pid}"))
        .spawn(move || {
            if sender.send(process.wait()).is_err() {
                debug!(target: PROCESS_TARGET, pid, "exit observed after shutdown gave up");
            }
        })?;
    Ok(receiver)
}

fn await_exit(ctx: &Context, reports: &Receiver<ExitReport>) -> Exit {
    loop {
        let slice = ctx
            .remaining()
            .map_or(WAIT_SLICE, |left| left.min(WAIT_SLICE));
        match reports.recv_timeout(slice) {
            Ok(report) => return Exit::Reported(report),
            Err(RecvTimeoutError::Disconnected) => {
                return Exit::Reported(Err(io::Error::other(
                    "exit waiter stopped without reporting",
                )));
            }
            Err(RecvTimeoutError::Timeout) => {
                if let Err(reason) = ctx.check() {
                    return Exit::Aborted(reason);
                }
            }
        }
    }
}
