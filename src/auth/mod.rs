//! Client authentication.
//!
//! # Data Flow
//! ```text
//! [auth] block in the config file
//!     → RawAuthConfig { mode, config }
//!     → AuthMode (typed, resolved while parsing; bad modes fail the load)
//!     → build_authenticator() → Arc<dyn Authenticator>
//!     → transport engine calls evaluate() once per connection attempt
//! ```
//!
//! # Design Decisions
//! - Exactly one authenticator per server, chosen at startup
//! - Authenticators hold no mutable state, so concurrent calls need no locking
//! - A rejected client is a decision, not an error

pub mod password;

use std::net::SocketAddr;
use std::sync::Arc;

use serde::{Deserialize, Serialize};
use thiserror::Error;

pub use password::{PasswordAuthenticator, PasswordConfig};

/// Message returned to clients that pass authentication.
pub const WELCOME_MESSAGE: &str = "Welcome";

/// Outcome of one authentication attempt.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AuthDecision {
    pub accepted: bool,
    pub message: String,
}

impl AuthDecision {
    pub fn accept(message: impl Into<String>) -> Self {
        Self {
            accepted: true,
            message: message.into(),
        }
    }

    pub fn reject(message: impl Into<String>) -> Self {
        Self {
            accepted: false,
            message: message.into(),
        }
    }
}

/// Decides whether a connecting client may use the server.
pub trait Authenticator: Send + Sync {
    /// Evaluate a credential presented by `peer`, along with the send and
    /// receive rates (bytes/sec) the client declared.
    fn evaluate(
        &self,
        peer: SocketAddr,
        credential: &[u8],
        send_bps: u64,
        recv_bps: u64,
    ) -> AuthDecision;
}

/// Accepts every client.
#[derive(Debug, Clone, Copy, Default)]
pub struct OpenAuthenticator;

impl Authenticator for OpenAuthenticator {
    fn evaluate(
        &self,
        _peer: SocketAddr,
        _credential: &[u8],
        _send_bps: u64,
        _recv_bps: u64,
    ) -> AuthDecision {
        AuthDecision::accept(WELCOME_MESSAGE)
    }
}

/// Errors raised while resolving the `[auth]` block.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum AuthConfigError {
    #[error("unsupported authentication mode: {0:?}")]
    UnsupportedMode(String),

    #[error("invalid password authentication config: {0}")]
    InvalidPassword(String),
}

/// The `[auth]` block as written in the config file.
#[derive(Debug, Clone, Default, Deserialize, Serialize)]
pub struct RawAuthConfig {
    #[serde(default)]
    pub mode: String,

    /// Mode-specific sub-document.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub config: Option<serde_json::Value>,
}

/// Authentication mode with its typed settings.
#[derive(Debug, Clone, Default, PartialEq, Eq, Deserialize, Serialize)]
#[serde(try_from = "RawAuthConfig", into = "RawAuthConfig")]
pub enum AuthMode {
    /// No authentication (`""` or `"none"`).
    #[default]
    Open,
    /// Shared password (`"password"`).
    Password { password: String },
}

impl AuthMode {
    /// Mode name as written in the config file.
    pub fn name(&self) -> &'static str {
        match self {
            AuthMode::Open => "none",
            AuthMode::Password { .. } => "password",
        }
    }
}

impl TryFrom<RawAuthConfig> for AuthMode {
    type Error = AuthConfigError;

    fn try_from(raw: RawAuthConfig) -> Result<Self, Self::Error> {
        match raw.mode.as_str() {
            "" | "none" => Ok(AuthMode::Open),
            "password" => {
                let value = raw
                    .config
                    .ok_or_else(|| AuthConfigError::InvalidPassword("missing config".into()))?;
                let parsed: PasswordConfig = serde_json::from_value(value)
                    .map_err(|e| AuthConfigError::InvalidPassword(e.to_string()))?;
                if parsed.password.is_empty() {
                    return Err(AuthConfigError::InvalidPassword("password is empty".into()));
                }
                Ok(AuthMode::Password {
                    password: parsed.password,
                })
            }
            other => Err(AuthConfigError::UnsupportedMode(other.to_string())),
        }
    }
}

impl From<AuthMode> for RawAuthConfig {
    fn from(mode: AuthMode) -> Self {
        match mode {
            AuthMode::Open => RawAuthConfig {
                mode: "none".into(),
                config: None,
            },
            AuthMode::Password { password } => RawAuthConfig {
                mode: "password".into(),
                config: Some(serde_json::json!({ "password": password })),
            },
        }
    }
}

/// Build the authenticator for a resolved mode.
pub fn build_authenticator(mode: &AuthMode) -> Arc<dyn Authenticator> {
    match mode {
        AuthMode::Open => {
            tracing::warn!("No authentication configured");
            Arc::new(OpenAuthenticator)
        }
        AuthMode::Password { password } => {
            tracing::info!("Password authentication enabled");
            Arc::new(PasswordAuthenticator::new(password.clone()))
        }
    }
}
