//! Executable lookup for the supervised binaries.

use std::env;
use std::path::{Path, PathBuf};

use thiserror::Error;
use tracing::{debug, warn};

const LOCATE_TARGET: &str = concat!(env!("CARGO_PKG_NAME"), "::locate");

/// Resolves an executable name to an absolute path.
pub trait Locator: Send + Sync {
    /// Finds the executable called `name`.
    ///
    /// # Errors
    ///
    /// Returns [`LocateError::NotFound`] when no candidate exists.
    fn locate(&self, name: &str) -> Result<PathBuf, LocateError>;
}

/// Lookup failures.
#[derive(Debug, Error, PartialEq, Eq)]
pub enum LocateError {
    /// No search directory holds an executable with this name.
    #[error("executable '{name}' not found in {searched} search directories")]
    NotFound {
        /// Name that was looked up.
        name: String,
        /// Number of directories consulted.
        searched: usize,
    },
}

/// Searches an ordered list of directories for the first executable match.
#[derive(Debug, Clone, Default)]
pub struct SearchPathLocator {
    directories: Vec<PathBuf>,
}

impl SearchPathLocator {
    /// Searches `directories` in order.
    #[must_use]
    pub const fn new(directories: Vec<PathBuf>) -> Self {
        Self { directories }
    }

    /// Searches the directory of the running executable, then the working
    /// directory, then every entry of `PATH`.
    #[must_use]
    pub fn from_environment() -> Self {
        let mut directories = Vec::new();
        match env::current_exe() {
            Ok(exe) => directories.extend(exe.parent().map(Path::to_path_buf)),
            Err(error) => warn!(target: LOCATE_TARGET, %error, "cannot resolve executable directory"),
        }
        match env::current_dir() {
            Ok(cwd) => directories.push(cwd),
            Err(error) => warn!(target: LOCATE_TARGET, %error, "cannot resolve working directory"),
        }
        if let Some(path) = env::var_os("PATH") {
            directories.extend(env::split_paths(&path).filter(|dir| !dir.as_os_str().is_empty()));
        }
        Self::new(directories)
    }

    /// Directories consulted, in search order.
    #[must_use]
    pub fn directories(&self) -> &[PathBuf] {
        &self.directories
    }
}

impl Locator for SearchPathLocator {
    fn locate(&self, name: &str) -> Result<PathBuf, LocateError> {
        let found = self
            .directories
            .iter()
            .map(|dir| dir.join(name))
            .find(|candidate| is_executable(candidate));
        match found {
            Some(path) => {
                debug!(target: LOCATE_TARGET, name, path = %path.display(), "executable located");
                Ok(path)
            }
            None => Err(LocateError::NotFound {
                name: name.to_owned(),
                searched: self.directories.len(),
            }),
        }
    }
}

#[cfg(unix)]
fn is_executable(path: &Path) -> bool {
    use std::os::unix::fs::PermissionsExt;

    path.metadata()
        .is_ok_and(|meta| meta.is_file() && meta.permissions().mode() & 0o111 != 0)
}

#[cfg(not(unix))]
fn is_executable(path: &Path) -> bool {
    path.is_file()
}
