//! Configuration management subsystem.
//!
//! # Data Flow
//! ```text
//! config file (TOML/JSON)
//!     → loader.rs (parse & deserialize, auth block resolved to AuthMode)
//!     → validation.rs (semantic checks)
//!     → ServerConfig (validated, immutable)
//!     → limits.rs (defaults applied to flow-control limits)
//! ```
//!
//! # Design Decisions
//! - Config is immutable once loaded
//! - All fields have defaults to allow minimal configs
//! - Zero in a window or stream-count field means "use the default", never zero

pub mod limits;
pub mod loader;
pub mod schema;
pub mod validation;

pub use limits::{resolve_limits, ResolvedLimits};
pub use loader::{load_config, ConfigError};
pub use schema::{ObservabilityConfig, ServerConfig, MBPS_TO_BPS};
