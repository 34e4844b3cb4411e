//! Entrypoint for the `moneroger` supervisor.
//!
//! Delegates to [`moneroger::run`] and maps its outcome to an exit code.

use std::io::{self, Write};
use std::process::ExitCode;

fn main() -> ExitCode {
    match moneroger::run() {
        Ok(()) => ExitCode::SUCCESS,
        Err(error) => {
            let mut stderr = io::stderr().lock();
            drop(writeln!(stderr, "moneroger: {error}"));
            ExitCode::FAILURE
        }
    }
}
