//! Recording doubles for the supervisor seams.

use std::ffi::OsString;
use std::io;
use std::net::TcpListener;
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicU32, AtomicUsize, Ordering};
use std::sync::{Arc, Condvar, Mutex};
use std::thread;
use std::time::Duration;

use crate::collaborators::Collaborators;
use crate::context::Context;
use crate::credentials::SecretSource;
use crate::errors::{Component, Kind, Op, ServiceError};
use crate::locate::{LocateError, Locator};
use crate::probe::{PortProbe, ProbeSettings, TcpPortProbe};
use crate::process::{Escalation, ManagedProcess, ManagedService, Spawner, SupervisorSettings};

pub(crate) const BIN_DIR: &str = "/opt/monero/bin";
pub(crate) const FIXED_SECRET: &str = "fixed-secret";

/// Binds an ephemeral port, releases it, and returns its number.
pub(crate) fn free_port() -> u16 {
    let listener = TcpListener::bind("127.0.0.1:0").expect("bind ephemeral port");
    listener.local_addr().expect("local addr").port()
}

/// Holds `port` open until dropped.
pub(crate) fn occupy(port: u16) -> TcpListener {
    TcpListener::bind(("127.0.0.1", port)).expect("bind requested port")
}

/// Settings with budgets small enough for unit tests.
pub(crate) fn quick_settings() -> SupervisorSettings {
    SupervisorSettings {
        probe: ProbeSettings {
            startup_timeout: Duration::from_millis(400),
            poll_interval: Duration::from_millis(20),
            attempt_timeout: Duration::from_millis(100),
        },
        shutdown_timeout: Duration::from_millis(300),
        escalation: Escalation::None,
        ..SupervisorSettings::default()
    }
}

/// Real TCP probe plus the given spawner and fixed locator and secrets.
pub(crate) fn collaborators(spawner: Arc<dyn Spawner>) -> Collaborators {
    Collaborators {
        locator: Arc::new(FixedLocator),
        secrets: Arc::new(FixedSecret),
        probe: Arc::new(TcpPortProbe::new(Duration::from_millis(100))),
        spawner,
    }
}

/// Value following `flag` in an argument list.
pub(crate) fn arg_value<'a>(args: &'a [String], flag: &str) -> Option<&'a str> {
    args.iter()
        .position(|arg| arg == flag)
        .and_then(|index| args.get(index + 1))
        .map(String::as_str)
}

/// Resolves every name inside [`BIN_DIR`].
pub(crate) struct FixedLocator;

impl Locator for FixedLocator {
    fn locate(&self, name: &str) -> Result<PathBuf, LocateError> {
        Ok(Path::new(BIN_DIR).join(name))
    }
}

/// Finds nothing.
pub(crate) struct EmptyLocator;

impl Locator for EmptyLocator {
    fn locate(&self, name: &str) -> Result<PathBuf, LocateError> {
        Err(LocateError::NotFound {
            name: name.to_owned(),
            searched: 0,
        })
    }
}

/// Always yields [`FIXED_SECRET`].
pub(crate) struct FixedSecret;

impl SecretSource for FixedSecret {
    fn generate_secret(&self) -> String {
        FIXED_SECRET.to_owned()
    }
}

/// Answers from a script, then `false` once it runs out.
pub(crate) struct ScriptedProbe {
    answers: Mutex<Vec<bool>>,
}

impl ScriptedProbe {
    pub(crate) fn new(answers: &[bool]) -> Self {
        Self {
            answers: Mutex::new(answers.iter().rev().copied().collect()),
        }
    }
}

impl PortProbe for ScriptedProbe {
    fn port_open(&self, _port: u16) -> bool {
        self.answers.lock().expect("answers lock").pop().unwrap_or(false)
    }
}

/// In-memory process that exits when signalled.
pub(crate) struct FakeProcess {
    pid: u32,
    honours_interrupt: bool,
    honours_kill: bool,
    exited: Mutex<bool>,
    exit_signal: Condvar,
    interrupts: AtomicUsize,
    kills: AtomicUsize,
    listener: Mutex<Option<TcpListener>>,
}

impl FakeProcess {
    fn new(pid: u32, honours_interrupt: bool, honours_kill: bool) -> Self {
        Self {
            pid,
            honours_interrupt,
            honours_kill,
            exited: Mutex::new(false),
            exit_signal: Condvar::new(),
            interrupts: AtomicUsize::new(0),
            kills: AtomicUsize::new(0),
            listener: Mutex::new(None),
        }
    }

    fn exit(&self) {
        self.listener.lock().expect("listener lock").take();
        *self.exited.lock().expect("exit lock") = true;
        self.exit_signal.notify_all();
    }

    fn serve(&self, listener: TcpListener) {
        if !self.has_exited() {
            *self.listener.lock().expect("listener lock") = Some(listener);
        }
    }

    pub(crate) fn has_exited(&self) -> bool {
        *self.exited.lock().expect("exit lock")
    }

    pub(crate) fn interrupts(&self) -> usize {
        self.interrupts.load(Ordering::SeqCst)
    }

    pub(crate) fn kills(&self) -> usize {
        self.kills.load(Ordering::SeqCst)
    }
}

impl ManagedProcess for FakeProcess {
    fn id(&self) -> u32 {
        self.pid
    }

    fn interrupt(&self) -> io::Result<()> {
        self.interrupts.fetch_add(1, Ordering::SeqCst);
        if self.honours_interrupt {
            self.exit();
        }
        Ok(())
    }

    fn kill(&self) -> io::Result<()> {
        self.kills.fetch_add(1, Ordering::SeqCst);
        if self.honours_kill {
            self.exit();
        }
        Ok(())
    }

    fn wait(&self) -> io::Result<Option<i32>> {
        let mut exited = self.exited.lock().expect("exit lock");
        while !*exited {
            exited = self.exit_signal.wait(exited).expect("exit lock");
        }
        Ok(Some(0))
    }
}

/// One recorded launch.
pub(crate) struct Spawn {
    pub(crate) program: PathBuf,
    pub(crate) args: Vec<String>,
    pub(crate) process: Arc<FakeProcess>,
}

/// Records launches and optionally binds the requested RPC port.
pub(crate) struct FakeSpawner {
    bind_port: bool,
    bind_delay: Duration,
    honours_interrupt: bool,
    honours_kill: bool,
    fail: bool,
    next_pid: AtomicU32,
    spawns: Mutex<Vec<Spawn>>,
}

impl FakeSpawner {
    /// Processes that bind `--rpc-bind-port` at once.
    pub(crate) fn ready() -> Self {
        Self {
            bind_port: true,
            bind_delay: Duration::ZERO,
            honours_interrupt: true,
            honours_kill: true,
            fail: false,
            next_pid: AtomicU32::new(4100),
            spawns: Mutex::new(Vec::new()),
        }
    }

    /// Processes that never bind their port.
    pub(crate) fn silent() -> Self {
        Self {
            bind_port: false,
            ..Self::ready()
        }
    }

    /// Every launch fails.
    pub(crate) fn failing() -> Self {
        Self {
            fail: true,
            ..Self::ready()
        }
    }

    /// Processes bind their port after `delay`.
    pub(crate) fn binding_after(self, delay: Duration) -> Self {
        Self {
            bind_delay: delay,
            ..self
        }
    }

    /// Processes ignore SIGINT and only exit on SIGKILL.
    pub(crate) fn ignoring_interrupts(self) -> Self {
        Self {
            honours_interrupt: false,
            ..self
        }
    }

    /// Processes survive SIGKILL as well.
    pub(crate) fn unkillable(self) -> Self {
        Self {
            honours_interrupt: false,
            honours_kill: false,
            ..self
        }
    }

    pub(crate) fn count(&self) -> usize {
        self.spawns.lock().expect("spawns lock").len()
    }

    pub(crate) fn programs(&self) -> Vec<PathBuf> {
        self.spawns
            .lock()
            .expect("spawns lock")
            .iter()
            .map(|spawn| spawn.program.clone())
            .collect()
    }

    pub(crate) fn args(&self, index: usize) -> Vec<String> {
        self.spawns
            .lock()
            .expect("spawns lock")
            .get(index)
            .map(|spawn| spawn.args.clone())
            .expect("spawn recorded")
    }

    pub(crate) fn process(&self, index: usize) -> Arc<FakeProcess> {
        self.spawns
            .lock()
            .expect("spawns lock")
            .get(index)
            .map(|spawn| Arc::clone(&spawn.process))
            .expect("spawn recorded")
    }
}

impl Spawner for FakeSpawner {
    fn spawn(&self, program: &Path, args: &[OsString]) -> io::Result<Arc<dyn ManagedProcess>> {
        if self.fail {
            return Err(io::Error::new(io::ErrorKind::NotFound, "no such executable"));
        }
        let args: Vec<String> = args
            .iter()
            .map(|arg| arg.to_string_lossy().into_owned())
            .collect();
        let pid = self.next_pid.fetch_add(1, Ordering::SeqCst);
        let process = Arc::new(FakeProcess::new(pid, self.honours_interrupt, self.honours_kill));

        if self.bind_port {
            let port: u16 = arg_value(&args, "--rpc-bind-port")
                .and_then(|value| value.parse().ok())
                .expect("rpc bind port argument");
            if self.bind_delay.is_zero() {
                process.serve(occupy(port));
            } else {
                let delayed = Arc::clone(&process);
                let delay = self.bind_delay;
                thread::spawn(move || {
                    thread::sleep(delay);
                    delayed.serve(occupy(port));
                });
            }
        }

        self.spawns.lock().expect("spawns lock").push(Spawn {
            program: program.to_path_buf(),
            args,
            process: Arc::clone(&process),
        });
        Ok(process)
    }
}

/// Lifecycle calls in the order services received them.
pub(crate) type CallLog = Arc<Mutex<Vec<(Op, Component)>>>;

/// Scripted [`ManagedService`] recording the calls it receives.
pub(crate) struct FakeService {
    component: Component,
    port: u16,
    start_error: Option<Kind>,
    shutdown_error: Option<Kind>,
    starts: AtomicUsize,
    shutdowns: AtomicUsize,
    calls: CallLog,
}

impl FakeService {
    pub(crate) fn new(component: Component, port: u16) -> Self {
        Self {
            component,
            port,
            start_error: None,
            shutdown_error: None,
            starts: AtomicUsize::new(0),
            shutdowns: AtomicUsize::new(0),
            calls: CallLog::default(),
        }
    }

    /// Records calls into `calls`, which other services may share.
    pub(crate) fn logging_to(self, calls: &CallLog) -> Self {
        Self {
            calls: Arc::clone(calls),
            ..self
        }
    }

    pub(crate) fn failing_start(self, kind: Kind) -> Self {
        Self {
            start_error: Some(kind),
            ..self
        }
    }

    pub(crate) fn failing_shutdown(self, kind: Kind) -> Self {
        Self {
            shutdown_error: Some(kind),
            ..self
        }
    }

    pub(crate) fn starts(&self) -> usize {
        self.starts.load(Ordering::SeqCst)
    }

    pub(crate) fn shutdowns(&self) -> usize {
        self.shutdowns.load(Ordering::SeqCst)
    }

    fn record(&self, op: Op) {
        self.calls
            .lock()
            .expect("call log lock")
            .push((op, self.component));
    }
}

impl ManagedService for FakeService {
    fn start(&self, _ctx: &Context) -> Result<(), ServiceError> {
        self.starts.fetch_add(1, Ordering::SeqCst);
        self.record(Op::Start);
        match self.start_error {
            Some(kind) => Err(ServiceError::new(self.component, Op::Start, kind)),
            None => Ok(()),
        }
    }

    fn shutdown(&self, _ctx: &Context) -> Result<(), ServiceError> {
        self.shutdowns.fetch_add(1, Ordering::SeqCst);
        self.record(Op::Shutdown);
        match self.shutdown_error {
            Some(kind) => Err(ServiceError::new(self.component, Op::Shutdown, kind)),
            None => Ok(()),
        }
    }

    fn rpc_port(&self) -> u16 {
        self.port
    }

    fn rpc_user(&self) -> &str {
        "fake"
    }

    fn rpc_pass(&self) -> &str {
        FIXED_SECRET
    }

    fn pid(&self) -> String {
        "-1".to_owned()
    }
}
