//! Access control for requested destinations.
//!
//! # Data Flow
//! ```text
//! acl path from config
//!     → empty: no engine, requests skip ACL evaluation entirely
//!     → engine.rs (read & parse rule file)
//!     → default action forced to Direct
//!     → Arc<AclEngine> shared read-only with every connection
//! ```
//!
//! # Design Decisions
//! - Unmatched destinations always connect directly, whatever default the
//!   rule file's loader chose
//! - Load failures are fatal at startup; there is no partial engine

pub mod engine;
pub mod matcher;

use std::path::Path;
use std::sync::Arc;

pub use engine::{AclDecision, AclEngine, AclError, Action};

/// Action applied to destinations no rule matches once an engine is bound.
pub const BOUND_DEFAULT_ACTION: Action = Action::Direct;

/// Load the rule file at `path` and bind it for serving.
///
/// Returns `Ok(None)` when no path is configured.
pub fn load_acl(path: &str) -> Result<Option<Arc<AclEngine>>, AclError> {
    if path.is_empty() {
        return Ok(None);
    }

    let mut engine = AclEngine::load_from_file(Path::new(path))?;
    engine.set_default_action(BOUND_DEFAULT_ACTION);

    tracing::info!(file = %path, rules = engine.rule_count(), "ACL loaded");
    Ok(Some(Arc::new(engine)))
}
