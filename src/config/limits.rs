//! Flow-control and stream limits with defaults applied.

use crate::config::schema::ServerConfig;

/// Default per-stream receive window (32 MiB).
pub const DEFAULT_STREAM_RECEIVE_WINDOW: u64 = 33_554_432;

/// Default per-connection receive window (64 MiB).
pub const DEFAULT_CONNECTION_RECEIVE_WINDOW: u64 = 67_108_864;

/// Default maximum concurrent incoming streams per client.
pub const DEFAULT_MAX_INCOMING_STREAMS: u64 = 1024;

/// Limits handed to the transport engine. Every field is non-zero.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ResolvedLimits {
    pub stream_receive_window: u64,
    pub connection_receive_window: u64,
    pub max_incoming_streams: u64,
}

/// Resolve the configured limits, substituting defaults for zero values.
pub fn resolve_limits(config: &ServerConfig) -> ResolvedLimits {
    ResolvedLimits {
        stream_receive_window: or_default(config.recv_window_conn, DEFAULT_STREAM_RECEIVE_WINDOW),
        connection_receive_window: or_default(
            config.recv_window_client,
            DEFAULT_CONNECTION_RECEIVE_WINDOW,
        ),
        max_incoming_streams: or_default(config.max_conn_client, DEFAULT_MAX_INCOMING_STREAMS),
    }
}

fn or_default(value: u64, default: u64) -> u64 {
    if value == 0 {
        default
    } else {
        value
    }
}
