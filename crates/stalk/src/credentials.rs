//! Site credentials, taken from the environment.

use stalk_engine::auth::Credentials;
use thiserror::Error;

pub const USERNAME_VAR: &str = "LEETCODE_USERNAME";
pub const PASSWORD_VAR: &str = "LEETCODE_PASSWORD";

#[derive(Debug, Error, PartialEq, Eq)]
pub enum CredentialsError {
    #[error("Missing credential: set {0}")]
    Missing(&'static str),
}

pub fn from_env() -> Result<Credentials, CredentialsError> {
    from_lookup(|name| std::env::var(name).ok())
}

/// Resolve both credentials through `lookup`. Blank values count as missing.
pub fn from_lookup(
    lookup: impl Fn(&str) -> Option<String>,
) -> Result<Credentials, CredentialsError> {
    let get = |name: &'static str| {
        lookup(name)
            .filter(|v| !v.trim().is_empty())
            .ok_or(CredentialsError::Missing(name))
    };
    Ok(Credentials::new(get(USERNAME_VAR)?, get(PASSWORD_VAR)?))
}
