//! RPC credentials resolved once per supervisor.

use rand::Rng;
use rand::distributions::Alphanumeric;

/// Username used when none is configured.
pub const DEFAULT_RPC_USER: &str = "moneroger";

/// Length of generated passwords.
pub const SECRET_LENGTH: usize = 20;

/// Source of high-entropy credential strings.
pub trait SecretSource: Send + Sync {
    /// Produces a fresh secret.
    fn generate_secret(&self) -> String;
}

/// Draws alphanumeric secrets from the thread-local RNG.
#[derive(Debug, Default, Clone, Copy)]
pub struct RandomSecret;

impl SecretSource for RandomSecret {
    fn generate_secret(&self) -> String {
        rand::thread_rng()
            .sample_iter(&Alphanumeric)
            .take(SECRET_LENGTH)
            .map(char::from)
            .collect()
    }
}

/// Username and password pair for one RPC endpoint.
///
/// Values are fixed at construction; reading them never mutates anything.
#[derive(Clone, PartialEq, Eq)]
pub struct Credentials {
    user: String,
    pass: String,
}

impl Credentials {
    /// Uses explicit values where given, otherwise [`DEFAULT_RPC_USER`] and a
    /// generated password. Empty strings count as unset.
    #[must_use]
    pub fn resolve(user: Option<&str>, pass: Option<&str>, secrets: &dyn SecretSource) -> Self {
        Self {
            user: non_empty(user).map_or_else(|| DEFAULT_RPC_USER.to_owned(), str::to_owned),
            pass: non_empty(pass).map_or_else(|| secrets.generate_secret(), str::to_owned),
        }
    }

    /// RPC username.
    #[must_use]
    pub fn user(&self) -> &str {
        &self.user
    }

    /// RPC password.
    #[must_use]
    pub fn pass(&self) -> &str {
        &self.pass
    }

    /// `user:pass` form accepted by the `--rpc-login` family of flags.
    #[must_use]
    pub fn login(&self) -> String {
        format!("{}:{}", self.user, self.pass)
    }
}

fn non_empty(value: Option<&str>) -> Option<&str> {
    value.filter(|text| !text.is_empty())
}

impl std::fmt::Debug for Credentials {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Credentials")
            .field("user", &self.user)
            .field("pass", &"<redacted>")
            .finish()
    }
}
