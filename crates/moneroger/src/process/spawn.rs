//! Launching and signalling OS processes.

use std::ffi::OsString;
use std::io;
use std::path::Path;
use std::process::{Child, Command, Stdio};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex, PoisonError};

use nix::sys::signal::{Signal, kill};
use nix::unistd::Pid;

/// A launched process the supervisor can signal and reap.
pub trait ManagedProcess: Send + Sync {
    /// Operating-system process id.
    fn id(&self) -> u32;

    /// Requests a graceful stop (SIGINT).
    ///
    /// # Errors
    ///
    /// Returns the OS error when the signal cannot be delivered.
    fn interrupt(&self) -> io::Result<()>;

    /// Forces the process to stop (SIGKILL).
    ///
    /// # Errors
    ///
    /// Returns the OS error when the signal cannot be delivered.
    fn kill(&self) -> io::Result<()>;

    /// Blocks until the process exits, returning its exit code when it had
    /// one.
    ///
    /// # Errors
    ///
    /// Returns the OS error when the process cannot be waited on.
    fn wait(&self) -> io::Result<Option<i32>>;
}

/// Launches executables.
pub trait Spawner: Send + Sync {
    /// Starts `program` with `args` without waiting for it.
    ///
    /// # Errors
    ///
    /// Returns the OS error when the process cannot be created.
    fn spawn(&self, program: &Path, args: &[OsString]) -> io::Result<Arc<dyn ManagedProcess>>;
}

/// Spawner backed by [`std::process::Command`].
#[derive(Debug, Default, Clone, Copy)]
pub struct SystemSpawner;

impl Spawner for SystemSpawner {
    fn spawn(&self, program: &Path, args: &[OsString]) -> io::Result<Arc<dyn ManagedProcess>> {
        let child = Command::new(program)
            .args(args)
            .stdin(Stdio::null())
            .stdout(Stdio::inherit())
            .stderr(Stdio::inherit())
            .spawn()?;
        Ok(Arc::new(SystemProcess::new(child)))
    }
}

/// Child process launched by [`SystemSpawner`].
#[derive(Debug)]
pub struct SystemProcess {
    pid: u32,
    child: Mutex<Child>,
    reaped: AtomicBool,
}

impl SystemProcess {
    fn new(child: Child) -> Self {
        Self {
            pid: child.id(),
            child: Mutex::new(child),
            reaped: AtomicBool::new(false),
        }
    }

    fn signal(&self, signal: Signal) -> io::Result<()> {
        // A reaped pid may already belong to another process.
        if self.reaped.load(Ordering::SeqCst) {
            return Ok(());
        }
        let raw = i32::try_from(self.pid)
            .map_err(|error| io::Error::new(io::ErrorKind::InvalidInput, error))?;
        kill(Pid::from_raw(raw), signal).map_err(io::Error::from)
    }
}

impl ManagedProcess for SystemProcess {
    fn id(&self) -> u32 {
        self.pid
    }

    fn interrupt(&self) -> io::Result<()> {
        self.signal(Signal::SIGINT)
    }

    fn kill(&self) -> io::Result<()> {
        self.signal(Signal::SIGKILL)
    }

    fn wait(&self) -> io::Result<Option<i32>> {
        let mut child = self.child.lock().unwrap_or_else(PoisonError::into_inner);
        let status = child.wait()?;
        self.reaped.store(true, Ordering::SeqCst);
        Ok(status.code())
    }
}

#[cfg(all(test, unix))]
mod tests {
    use std::path::PathBuf;

    use super::*;

    fn spawn(program: &str, args: &[&str]) -> Arc<dyn ManagedProcess> {
        let owned: Vec<OsString> = args.iter().map(OsString::from).collect();
        SystemSpawner
            .spawn(Path::new(program), &owned)
            .expect("spawn test process")
    }

    #[test]
    fn interrupt_stops_a_sleeping_process() {
        let process = spawn("sleep", &["30"]);
        process.interrupt().expect("deliver SIGINT");
        let code = process.wait().expect("wait for exit");
        assert_eq!(code, None, "signal exits carry no code");
    }

    #[test]
    fn exit_codes_are_reported() {
        let process = spawn("sh", &["-c", "exit 3"]);
        assert_eq!(process.wait().expect("wait for exit"), Some(3));
    }

    #[test]
    fn signalling_after_reap_is_a_no_op() {
        let process = spawn("true", &[]);
        process.wait().expect("wait for exit");
        process.kill().expect("reaped process ignores signals");
    }

    #[test]
    fn missing_program_fails_to_spawn() {
        let missing = PathBuf::from("/nonexistent/monerod");
        let result = SystemSpawner.spawn(&missing, &[]);
        assert!(result.is_err());
    }
}
