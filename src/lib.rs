//! Hysteria-style tunneling proxy server library.

pub mod acl;
pub mod auth;
pub mod config;
pub mod congestion;
pub mod error;
pub mod lifecycle;
pub mod net;
pub mod obfs;
pub mod observability;
pub mod transport;

pub use config::schema::ServerConfig;
pub use error::{Error, ErrorKind};
pub use lifecycle::{run, start, Shutdown};
pub use transport::{TcpEngine, TransportEngine, TunnelServer};
