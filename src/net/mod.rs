//! Network layer subsystem.
//!
//! # Data Flow
//! ```text
//! Incoming TCP connection
//!     → listener.rs (accept loop, socket tuning, per-client stream limits)
//!     → connection.rs (lifecycle tracking)
//!     → optional obfuscation, then TLS handshake with tls.rs material
//!     → Hand off to the transport engine's tunnel handler
//! ```
//!
//! # Design Decisions
//! - Certificates load once at startup; a bad pair stops startup before bind
//! - Only TLS 1.3 is offered, with a single fixed ALPN protocol

pub mod connection;
pub mod listener;
pub mod tls;
