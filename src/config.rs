//! Environment secrets.
//!
//! Two secrets come from the process environment: the Hardcover bearer token
//! for outbound GraphQL requests and the bookblend API key that inbound
//! requests must present. Both are read once at startup and never mutated.

use crate::error::{BookblendError, Result};

/// Environment variable holding the Hardcover API bearer token.
pub const HARDCOVER_TOKEN_VAR: &str = "HARDCOVER_BEARER_TOKEN";

/// Environment variable holding the inbound API key.
pub const API_KEY_VAR: &str = "BOOKBLEND_API_KEY";

/// Secrets loaded from the process environment.
///
/// Loading never fails; callers that need a missing secret get a
/// [`BookblendError::Config`] from the `require_*` accessors.
#[derive(Debug, Clone, Default)]
pub struct Secrets {
    /// Bearer token for the Hardcover GraphQL API
    pub hardcover_token: Option<String>,
    /// Static API key inbound requests are checked against
    pub api_key: Option<String>,
}

impl Secrets {
    /// Read both secrets from the environment, loading `.env` first if one
    /// is present. Empty values count as unset.
    pub fn from_env() -> Self {
        dotenvy::dotenv().ok();
        Self {
            hardcover_token: read_var(HARDCOVER_TOKEN_VAR),
            api_key: read_var(API_KEY_VAR),
        }
    }

    /// Bearer token for Hardcover, or a config error naming the variable.
    pub fn require_hardcover_token(&self) -> Result<&str> {
        self.hardcover_token
            .as_deref()
            .ok_or_else(|| BookblendError::Config(format!("{} is not set", HARDCOVER_TOKEN_VAR)))
    }

    /// Inbound API key, or a config error naming the variable.
    pub fn require_api_key(&self) -> Result<&str> {
        self.api_key
            .as_deref()
            .ok_or_else(|| BookblendError::Config(format!("{} is not set", API_KEY_VAR)))
    }
}

fn read_var(name: &str) -> Option<String> {
    std::env::var(name).ok().filter(|v| !v.trim().is_empty())
}
