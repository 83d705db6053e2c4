//! Crate-level startup and shutdown errors.
//!
//! Each variant names the configuration value that led to it so the
//! operator can act on the message alone.

use std::fmt;
use std::io;

use thiserror::Error;

use crate::acl::AclError;
use crate::config::ConfigError;
use crate::net::tls::TlsError;

/// Fatal errors returned by startup and by a serving server.
#[derive(Debug, Error)]
pub enum Error {
    #[error("failed to load config {path}: {source}")]
    Config {
        path: String,
        #[source]
        source: ConfigError,
    },

    #[error("failed to load certificate (cert {cert}, key {key}): {source}")]
    Certificate {
        cert: String,
        key: String,
        #[source]
        source: TlsError,
    },

    #[error("failed to initialize ACL {file}: {source}")]
    Acl {
        file: String,
        #[source]
        source: AclError,
    },

    #[error("failed to initialize server on {listen}: {source}")]
    ServerInit {
        listen: String,
        #[source]
        source: io::Error,
    },

    #[error("server on {listen} stopped{}", DisplayCause(.source))]
    Shutdown {
        listen: String,
        #[source]
        source: Option<io::Error>,
    },
}

/// Coarse category of an [`Error`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ErrorKind {
    Config,
    Certificate,
    Acl,
    ServerInit,
    Shutdown,
}

impl Error {
    pub fn kind(&self) -> ErrorKind {
        match self {
            Error::Config { .. } => ErrorKind::Config,
            Error::Certificate { .. } => ErrorKind::Certificate,
            Error::Acl { .. } => ErrorKind::Acl,
            Error::ServerInit { .. } => ErrorKind::ServerInit,
            Error::Shutdown { .. } => ErrorKind::Shutdown,
        }
    }
}

pub type Result<T> = std::result::Result<T, Error>;

struct DisplayCause<'a>(&'a Option<io::Error>);

impl fmt::Display for DisplayCause<'_> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self.0 {
            Some(e) => write!(f, ": {}", e),
            None => Ok(()),
        }
    }
}
