//! Credentials for remote sources
//!
//! Configured credentials are resolved once, when the puller is built, and then
//! matched against each source URL by longest prefix. Secrets never show up in
//! `Debug` output.

use base64::Engine as _;
use base64::engine::general_purpose::STANDARD;
use serde::{Deserialize, Serialize};
use std::fmt;
use url::Url;

use crate::error::{PullError, Result};

/// Environment variable consulted for a GitHub token when none is configured
pub const GITHUB_TOKEN_ENV: &str = "GITHUB_TOKEN";

/// Username presented alongside a bearer token to basic-auth-only protocols
const TOKEN_USERNAME: &str = "x-access-token";

/// Credentials as written in the configuration file
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "lowercase")]
pub enum Credentials {
    Basic { username: String, password: String },

    Bearer { token: String },

    /// Username and password read from the named environment variables
    #[serde(rename_all = "camelCase")]
    Env {
        username_var: String,
        password_var: String,
    },
}

impl Credentials {
    pub fn basic(username: impl Into<String>, password: impl Into<String>) -> Self {
        Credentials::Basic {
            username: username.into(),
            password: password.into(),
        }
    }

    pub fn bearer(token: impl Into<String>) -> Self {
        Credentials::Bearer {
            token: token.into(),
        }
    }

    pub fn from_env(username_var: impl Into<String>, password_var: impl Into<String>) -> Self {
        Credentials::Env {
            username_var: username_var.into(),
            password_var: password_var.into(),
        }
    }

    /// Turn the configured form into usable secrets
    pub fn resolve(&self) -> Result<ResolvedCredentials> {
        let resolved = match self {
            Credentials::Basic { username, password } => {
                ResolvedCredentials::basic(username.as_str(), password.as_str())
            }
            Credentials::Bearer { token } => ResolvedCredentials::Bearer {
                token: token.clone(),
            },
            Credentials::Env {
                username_var,
                password_var,
            } => ResolvedCredentials::basic(env_secret(username_var)?, env_secret(password_var)?),
        };
        Ok(resolved)
    }
}

fn env_secret(var: &str) -> Result<String> {
    match std::env::var(var) {
        Ok(value) if !value.is_empty() => Ok(value),
        _ => Err(PullError::AuthFailed {
            message: format!("environment variable {} is not set", var),
        }),
    }
}

/// Secrets ready to hand to a collaborator
#[derive(Clone, PartialEq, Eq)]
pub enum ResolvedCredentials {
    Basic { username: String, password: String },
    Bearer { token: String },
}

impl fmt::Debug for ResolvedCredentials {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ResolvedCredentials::Basic { username, .. } => f
                .debug_struct("Basic")
                .field("username", username)
                .field("password", &"***")
                .finish(),
            ResolvedCredentials::Bearer { .. } => {
                f.debug_struct("Bearer").field("token", &"***").finish()
            }
        }
    }
}

impl ResolvedCredentials {
    fn basic(username: impl Into<String>, password: impl Into<String>) -> Self {
        ResolvedCredentials::Basic {
            username: username.into(),
            password: password.into(),
        }
    }

    /// `Authorization` header value
    pub fn auth_header(&self) -> String {
        match self {
            ResolvedCredentials::Basic { username, password } => {
                format!("Basic {}", STANDARD.encode(format!("{}:{}", username, password)))
            }
            ResolvedCredentials::Bearer { token } => format!("Bearer {}", token),
        }
    }

    /// Username/password pair for protocols without bearer support
    pub fn userpass(&self) -> (&str, &str) {
        match self {
            ResolvedCredentials::Basic { username, password } => (username, password),
            ResolvedCredentials::Bearer { token } => (TOKEN_USERNAME, token),
        }
    }
}

/// Resolved credentials keyed by URL prefix
#[derive(Debug, Clone, Default)]
pub struct ScopedCredentials {
    /// Longest prefix first
    scopes: Vec<(String, ResolvedCredentials)>,
}

impl ScopedCredentials {
    /// Register `credentials` for URLs under `url_prefix`, replacing an equal prefix
    pub fn add(&mut self, url_prefix: &str, credentials: ResolvedCredentials) {
        let prefix = url_prefix.trim_end_matches('/').to_string();
        self.scopes.retain(|(existing, _)| *existing != prefix);
        self.scopes.push((prefix, credentials));
        self.scopes.sort_by(|a, b| b.0.len().cmp(&a.0.len()));
    }

    /// Credentials of the longest prefix covering `url`
    ///
    /// A prefix only covers whole path segments: `https://host/team` matches
    /// `https://host/team/x` but not `https://host/teammate`.
    pub fn for_url(&self, url: &str) -> Option<&ResolvedCredentials> {
        self.scopes
            .iter()
            .find(|(prefix, _)| covers(prefix, url))
            .map(|(_, credentials)| credentials)
    }

    pub fn is_empty(&self) -> bool {
        self.scopes.is_empty()
    }
}

fn covers(prefix: &str, url: &str) -> bool {
    match url.strip_prefix(prefix) {
        Some(rest) => rest.is_empty() || rest.starts_with(['/', '?', '#', ':']),
        None => false,
    }
}

/// Whether two URLs share scheme, host and port
pub fn same_origin(a: &str, b: &str) -> bool {
    match (Url::parse(a), Url::parse(b)) {
        (Ok(a), Ok(b)) => a.origin() == b.origin(),
        _ => false,
    }
}

/// GitHub token from the environment, if set and non-empty
pub fn github_token_from_env() -> Option<String> {
    std::env::var(GITHUB_TOKEN_ENV)
        .ok()
        .filter(|token| !token.is_empty())
}
