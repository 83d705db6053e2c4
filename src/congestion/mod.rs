//! Per-connection congestion control.
//!
//! # Data Flow
//! ```text
//! startup: BrutalFactory (one per server)
//!     → transport engine, per accepted connection:
//!         reference rate = min(client's declared receive rate, download cap)
//!         factory.build(rate) → Box<dyn CongestionControl>
//!     → controller paces that connection's sends, then is dropped with it
//! ```
//!
//! # Design Decisions
//! - Congestion state is per-connection; controllers are never shared
//! - The factory itself is stateless and safe to call concurrently

pub mod brutal;

use std::time::{Duration, Instant};

pub use brutal::{BrutalFactory, BrutalSender};

/// Governs how fast one connection may send.
pub trait CongestionControl: Send {
    /// Target send rate in bytes per second. 0 means unpaced.
    fn pacing_rate(&self) -> u64;

    /// Record `bytes` sent at `now`; returns how long to wait before the
    /// next send.
    fn on_sent(&mut self, now: Instant, bytes: u64) -> Duration;
}

/// Builds a fresh controller for each connection.
pub trait CongestionFactory: Send + Sync {
    fn build(&self, reference_bps: u64) -> Box<dyn CongestionControl>;
}
