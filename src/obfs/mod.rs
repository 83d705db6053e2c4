//! Traffic obfuscation.
//!
//! # Data Flow
//! ```text
//! obfs secret from config
//!     → empty: no obfuscator, bytes pass through untouched
//!     → XorObfuscator keyed by the secret
//!     → ObfsStream wraps each accepted socket beneath TLS
//! ```
//!
//! # Design Decisions
//! - Transforms are keyed by stream offset, so partial reads and writes
//!   never desynchronise the two ends
//! - One obfuscator instance is shared by every connection

pub mod stream;
pub mod xor;

use std::sync::Arc;

pub use stream::ObfsStream;
pub use xor::XorObfuscator;

/// A reversible, position-keyed byte transform.
pub trait Obfuscator: Send + Sync {
    /// Transform `buf` in place; `offset` is the stream position of `buf[0]`.
    fn obfuscate(&self, offset: u64, buf: &mut [u8]);

    /// Undo [`Obfuscator::obfuscate`] for bytes starting at `offset`.
    fn deobfuscate(&self, offset: u64, buf: &mut [u8]);
}

/// Pick the obfuscator for a configured secret.
pub fn select_obfuscator(secret: &str) -> Option<Arc<dyn Obfuscator>> {
    if secret.is_empty() {
        return None;
    }
    tracing::info!("Traffic obfuscation enabled");
    Some(Arc::new(XorObfuscator::new(secret.as_bytes())))
}
