//! Reviewer credential resolution for CLI commands.
//!
//! The resolution chain: `--reviewer` flag > `VERDICT_REVIEWER` env, and
//! `--password` flag > `VERDICT_PASSWORD` env. Commands that touch a
//! reviewer's records require both; `init`, `factors` and `completions`
//! work without them.

use std::env;

use verdict_core::error::ErrorCode;

/// Credential values given on the command line, if any.
#[derive(Debug, Clone, Copy, Default)]
pub struct CredentialFlags<'a> {
    pub reviewer: Option<&'a str>,
    pub password: Option<&'a str>,
}

/// A reviewer id and password, not yet checked against the project table.
#[derive(Clone, PartialEq, Eq)]
pub struct Credentials {
    pub reviewer: String,
    pub password: String,
}

impl std::fmt::Debug for Credentials {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Credentials")
            .field("reviewer", &self.reviewer)
            .field("password", &"<redacted>")
            .finish()
    }
}

/// Errors from credential resolution.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CredentialError {
    /// Human-readable description.
    pub message: String,
    /// Machine error code.
    pub code: ErrorCode,
}

impl std::fmt::Display for CredentialError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.message)
    }
}

impl std::error::Error for CredentialError {}

/// Environment reader trait for dependency injection in tests.
trait EnvReader {
    fn get(&self, key: &str) -> Option<String>;
}

struct RealEnv;

impl EnvReader for RealEnv {
    fn get(&self, key: &str) -> Option<String> {
        env::var(key).ok().filter(|v| !v.is_empty())
    }
}

fn pick(flag: Option<&str>, env_key: &str, env: &dyn EnvReader) -> Option<String> {
    flag.filter(|v| !v.is_empty())
        .map(str::to_string)
        .or_else(|| env.get(env_key))
}

fn resolve_credentials_with(
    flags: CredentialFlags<'_>,
    env: &dyn EnvReader,
) -> Result<Credentials, CredentialError> {
    let reviewer = pick(flags.reviewer, "VERDICT_REVIEWER", env).ok_or_else(|| CredentialError {
        message: "reviewer id required. Set --reviewer or VERDICT_REVIEWER.".to_string(),
        code: ErrorCode::AuthenticationFailed,
    })?;
    let password = pick(flags.password, "VERDICT_PASSWORD", env).ok_or_else(|| CredentialError {
        message: format!(
            "password required for reviewer '{reviewer}'. Set --password or VERDICT_PASSWORD."
        ),
        code: ErrorCode::AuthenticationFailed,
    })?;
    Ok(Credentials { reviewer, password })
}

/// Resolve the reviewer id and password from flags, then the environment.
///
/// # Errors
///
/// Returns [`CredentialError`] if either value is missing from both sources.
pub fn resolve_credentials(flags: CredentialFlags<'_>) -> Result<Credentials, CredentialError> {
    resolve_credentials_with(flags, &RealEnv)
}
