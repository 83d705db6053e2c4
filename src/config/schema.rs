//! Configuration schema definitions.
//!
//! This module defines the complete configuration structure for the server.
//! All types derive Serde traits for deserialization from config files.

use std::fmt;

use serde::{Deserialize, Serialize};

use crate::auth::AuthMode;

/// Multiplier converting a bandwidth cap in Mbps to bytes per second.
pub const MBPS_TO_BPS: u64 = 125_000;

/// Root configuration for the tunnel server.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct ServerConfig {
    /// Listen address (e.g., "0.0.0.0:443").
    pub listen: String,

    /// Path to certificate file (PEM).
    pub cert: String,

    /// Path to private key file (PEM).
    pub key: String,

    /// Upload cap (client to server) in Mbps.
    pub up_mbps: u64,

    /// Download cap (server to client) in Mbps.
    pub down_mbps: u64,

    /// Per-stream receive flow-control window in bytes. 0 = default.
    pub recv_window_conn: u64,

    /// Per-connection receive flow-control window in bytes. 0 = default.
    pub recv_window_client: u64,

    /// Maximum concurrent streams per client. 0 = default.
    pub max_conn_client: u64,

    /// Authentication block, resolved into a typed mode while parsing.
    pub auth: AuthMode,

    /// Path to an ACL rule file. Empty disables ACL evaluation.
    pub acl: String,

    /// Obfuscation secret. Empty disables obfuscation.
    pub obfs: String,

    /// Observability settings.
    pub observability: ObservabilityConfig,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            listen: "0.0.0.0:443".to_string(),
            cert: String::new(),
            key: String::new(),
            up_mbps: 0,
            down_mbps: 0,
            recv_window_conn: 0,
            recv_window_client: 0,
            max_conn_client: 0,
            auth: AuthMode::Open,
            acl: String::new(),
            obfs: String::new(),
            observability: ObservabilityConfig::default(),
        }
    }
}

impl ServerConfig {
    /// Upload cap in bytes per second.
    pub fn up_bps(&self) -> u64 {
        self.up_mbps.saturating_mul(MBPS_TO_BPS)
    }

    /// Download cap in bytes per second.
    pub fn down_bps(&self) -> u64 {
        self.down_mbps.saturating_mul(MBPS_TO_BPS)
    }

    /// A loggable view of the configuration with secrets left out.
    pub fn summary(&self) -> ConfigSummary<'_> {
        ConfigSummary(self)
    }
}

/// Display adapter over [`ServerConfig`] that never prints secrets.
pub struct ConfigSummary<'a>(&'a ServerConfig);

impl fmt::Display for ConfigSummary<'_> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let c = self.0;
        write!(
            f,
            "listen={} cert={} key={} up_mbps={} down_mbps={} recv_window_conn={} \
             recv_window_client={} max_conn_client={} auth={} acl={} obfs={}",
            c.listen,
            c.cert,
            c.key,
            c.up_mbps,
            c.down_mbps,
            c.recv_window_conn,
            c.recv_window_client,
            c.max_conn_client,
            c.auth.name(),
            if c.acl.is_empty() { "none" } else { c.acl.as_str() },
            if c.obfs.is_empty() { "off" } else { "on" },
        )
    }
}

/// Observability configuration.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct ObservabilityConfig {
    /// Log level (trace, debug, info, warn, error).
    pub log_level: String,

    /// Prometheus exporter bind address. Unset disables the exporter.
    pub metrics_address: Option<String>,
}

impl Default for ObservabilityConfig {
    fn default() -> Self {
        Self {
            log_level: "info".to_string(),
            metrics_address: None,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn bandwidth_caps_convert_to_bytes_per_second() {
        let config = ServerConfig {
            up_mbps: 10,
            down_mbps: 100,
            ..Default::default()
        };
        assert_eq!(config.up_bps(), 1_250_000);
        assert_eq!(config.down_bps(), 12_500_000);
    }

    #[test]
    fn summary_hides_secrets() {
        let config = ServerConfig {
            obfs: "s3cret-obfs".into(),
            auth: AuthMode::Password {
                password: "hunter2".into(),
            },
            ..Default::default()
        };
        let text = config.summary().to_string();
        assert!(!text.contains("hunter2"));
        assert!(!text.contains("s3cret-obfs"));
        assert!(text.contains("auth=password"));
        assert!(text.contains("obfs=on"));
    }
}
