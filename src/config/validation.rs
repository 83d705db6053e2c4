//! Configuration validation.
//!
//! # Responsibilities
//! - Semantic validation (serde handles syntactic, including the auth block)
//! - Validate value ranges (bandwidth caps > 0, windows large enough)
//!
//! # Design Decisions
//! - Returns all validation errors, not just first
//! - Validation is pure function: ServerConfig → Result<(), Vec<ValidationError>>
//! - Runs before config is accepted into the system

use std::fmt;

use crate::config::schema::ServerConfig;

/// Smallest receive window accepted when one is set explicitly.
pub const MIN_RECEIVE_WINDOW: u64 = 65_536;

/// A single semantic problem with a configuration.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ValidationError {
    MissingField(&'static str),
    InvalidSpeed { field: &'static str },
    InvalidReceiveWindow { field: &'static str, value: u64 },
}

impl fmt::Display for ValidationError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ValidationError::MissingField(field) => write!(f, "{} must be set", field),
            ValidationError::InvalidSpeed { field } => {
                write!(f, "{} must be greater than zero", field)
            }
            ValidationError::InvalidReceiveWindow { field, value } => write!(
                f,
                "{} = {} is below the minimum of {} bytes",
                field, value, MIN_RECEIVE_WINDOW
            ),
        }
    }
}

/// Check a parsed configuration for semantic errors.
pub fn validate_config(config: &ServerConfig) -> Result<(), Vec<ValidationError>> {
    let mut errors = Vec::new();

    if config.listen.trim().is_empty() {
        errors.push(ValidationError::MissingField("listen"));
    }
    if config.cert.is_empty() {
        errors.push(ValidationError::MissingField("cert"));
    }
    if config.key.is_empty() {
        errors.push(ValidationError::MissingField("key"));
    }
    if config.up_mbps == 0 {
        errors.push(ValidationError::InvalidSpeed { field: "up_mbps" });
    }
    if config.down_mbps == 0 {
        errors.push(ValidationError::InvalidSpeed { field: "down_mbps" });
    }
    for (field, value) in [
        ("recv_window_conn", config.recv_window_conn),
        ("recv_window_client", config.recv_window_client),
    ] {
        // Zero means "use the default".
        if value != 0 && value < MIN_RECEIVE_WINDOW {
            errors.push(ValidationError::InvalidReceiveWindow { field, value });
        }
    }

    if errors.is_empty() {
        Ok(())
    } else {
        Err(errors)
    }
}
