//! Transport engine contract.
//!
//! # Data Flow
//! ```text
//! lifecycle::startup
//!     → ServerParams (TLS, limits, caps, every strategy, reporter)
//!     → TransportEngine::build() → TunnelServer (bound, not yet serving)
//!     → TunnelServer::serve() until close() or a fatal accept error
//! ```
//!
//! # Design Decisions
//! - The composition layer only sees these traits; engines are swappable
//! - Strategies arrive as shared trait objects and are invoked concurrently
//! - `tcp` is the built-in engine: TLS over TCP, one tunnel per connection

pub mod protocol;
pub mod relay;
pub mod tcp;

use std::future::Future;
use std::io;
use std::net::SocketAddr;
use std::sync::Arc;

use thiserror::Error;

use crate::acl::AclEngine;
use crate::auth::Authenticator;
use crate::config::ResolvedLimits;
use crate::congestion::CongestionFactory;
use crate::obfs::Obfuscator;
use crate::observability::EventReporter;

pub use tcp::{TcpEngine, TcpTunnelServer};

/// How a tunnel ended.
#[derive(Debug, Error)]
pub enum StreamError {
    /// Both sides finished cleanly.
    #[error("end of stream")]
    EndOfStream,

    #[error(transparent)]
    Io(#[from] io::Error),
}

impl StreamError {
    /// Whether this is the ordinary end of a tunnel rather than a failure.
    ///
    /// Only a clean close counts. A peer that drops the connection without
    /// a TLS `close_notify` surfaces as `UnexpectedEof` and is a failure.
    pub fn is_end_of_stream(&self) -> bool {
        matches!(self, StreamError::EndOfStream)
    }
}

/// Everything an engine needs to build a server.
#[derive(Clone)]
pub struct ServerParams {
    pub listen: String,
    pub tls: Arc<rustls::ServerConfig>,
    pub limits: ResolvedLimits,
    /// Upload cap, bytes/sec.
    pub up_bps: u64,
    /// Download cap, bytes/sec.
    pub down_bps: u64,
    pub congestion: Arc<dyn CongestionFactory>,
    /// `None` skips ACL evaluation.
    pub acl: Option<Arc<AclEngine>>,
    /// `None` passes bytes through unchanged.
    pub obfuscator: Option<Arc<dyn Obfuscator>>,
    pub authenticator: Arc<dyn Authenticator>,
    pub reporter: Arc<dyn EventReporter>,
}

/// Builds bound servers from parameters.
pub trait TransportEngine {
    type Server: TunnelServer;

    /// Bind a server. Failure here is fatal to startup.
    fn build(
        &self,
        params: ServerParams,
    ) -> impl Future<Output = io::Result<Self::Server>> + Send;
}

/// A bound server.
pub trait TunnelServer: Send + Sync {
    /// Accept and serve connections until closed or a fatal error occurs.
    fn serve(&self) -> impl Future<Output = io::Result<()>> + Send;

    /// Stop accepting connections. Idempotent.
    fn close(&self);

    fn local_addr(&self) -> io::Result<SocketAddr>;
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn classifies_end_of_stream() {
        assert!(StreamError::EndOfStream.is_end_of_stream());

        let reset = StreamError::from(io::Error::from(io::ErrorKind::ConnectionReset));
        assert!(!reset.is_end_of_stream());
    }

    #[test]
    fn truncated_stream_is_not_a_clean_end() {
        let truncated = StreamError::from(io::Error::new(
            io::ErrorKind::UnexpectedEof,
            "peer closed connection without sending TLS close_notify",
        ));
        assert!(!truncated.is_end_of_stream());
    }
}
