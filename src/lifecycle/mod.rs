//! Lifecycle management subsystem.
//!
//! # Data Flow
//! ```text
//! Startup (startup.rs):
//!     Config → TLS → limits → auth → obfs → ACL → congestion → engine.build
//!
//! Run (startup.rs):
//!     Close guard → serve() → Error::Shutdown
//!
//! Shutdown (shutdown.rs):
//!     close() → accept loop stops
//!
//! Signals (signals.rs):
//!     SIGTERM/SIGINT → main drops the run future → guard closes the server
//! ```
//!
//! # Design Decisions
//! - Ordered startup: strategies first, engine last
//! - Only `main` ends the process; everything here returns errors

pub mod shutdown;
pub mod signals;
pub mod startup;

pub use shutdown::{Shutdown, ShutdownSignal};
pub use signals::shutdown_signal;
pub use startup::{run, start};
