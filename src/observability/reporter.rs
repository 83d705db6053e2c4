//! Per-connection event reporting.
//!
//! # Responsibilities
//! - Log each tunnel request with its ACL outcome
//! - Log how each tunnel ended, at a severity that matches the cause
//! - Count both in metrics
//!
//! # Design Decisions
//! - Called inline by the transport engine, so every hook is cheap and
//!   never fails
//! - End-of-stream is how almost every tunnel ends; it is logged at debug
//!   without detail

use std::borrow::Cow;
use std::net::SocketAddr;

use crate::acl::Action;
use crate::observability::metrics;
use crate::transport::StreamError;

/// Callbacks the transport engine invokes for tunnel events.
pub trait EventReporter: Send + Sync {
    /// A client asked to reach `destination`; `action` is what the ACL
    /// decided, or `None` if the engine could not classify it.
    fn on_request(
        &self,
        peer: SocketAddr,
        credential: &[u8],
        destination: &str,
        action: Option<Action>,
        argument: &str,
    );

    /// A tunnel to `destination` ended with `error`.
    fn on_error(
        &self,
        peer: SocketAddr,
        credential: &[u8],
        destination: &str,
        error: &StreamError,
    );
}

/// Log severity chosen for a tunnel's end.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Severity {
    Debug,
    Info,
}

/// Human-readable label for an ACL action.
pub fn action_label(action: Option<Action>, argument: &str) -> Cow<'static, str> {
    match action {
        Some(Action::Direct) => Cow::Borrowed("Direct"),
        Some(Action::Proxy) => Cow::Borrowed("Proxy"),
        Some(Action::Block) => Cow::Borrowed("Block"),
        Some(Action::Hijack) => Cow::Owned(format!("Hijack to {}", argument)),
        None => Cow::Borrowed("Unknown"),
    }
}

/// Severity used when a tunnel ends with `error`.
pub fn error_severity(error: &StreamError) -> Severity {
    if error.is_end_of_stream() {
        Severity::Debug
    } else {
        Severity::Info
    }
}

/// Reports events through `tracing` and `metrics`.
#[derive(Debug, Clone, Copy, Default)]
pub struct LogReporter;

impl EventReporter for LogReporter {
    fn on_request(
        &self,
        peer: SocketAddr,
        _credential: &[u8],
        destination: &str,
        action: Option<Action>,
        argument: &str,
    ) {
        metrics::record_request(action);
        tracing::debug!(
            src = %peer,
            dst = %destination,
            action = %action_label(action, argument),
            "TCP request"
        );
    }

    fn on_error(
        &self,
        peer: SocketAddr,
        _credential: &[u8],
        destination: &str,
        error: &StreamError,
    ) {
        let severity = error_severity(error);
        metrics::record_stream_end(severity == Severity::Debug);
        match severity {
            Severity::Debug => tracing::debug!(src = %peer, dst = %destination, "TCP EOF"),
            Severity::Info => tracing::info!(
                src = %peer,
                dst = %destination,
                error = %error,
                "TCP error"
            ),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::{self, Write};
    use std::sync::{Arc, Mutex};

    /// Collects formatted log output in memory.
    #[derive(Clone, Default)]
    struct CapturedLogs(Arc<Mutex<Vec<u8>>>);

    impl Write for CapturedLogs {
        fn write(&mut self, buf: &[u8]) -> io::Result<usize> {
            self.0.lock().unwrap().extend_from_slice(buf);
            Ok(buf.len())
        }

        fn flush(&mut self) -> io::Result<()> {
            Ok(())
        }
    }

    impl CapturedLogs {
        fn lines(&self) -> Vec<String> {
            String::from_utf8_lossy(&self.0.lock().unwrap())
                .lines()
                .map(str::to_owned)
                .collect()
        }
    }

    fn capture(f: impl FnOnce()) -> Vec<String> {
        let logs = CapturedLogs::default();
        let writer = logs.clone();
        let subscriber = tracing_subscriber::fmt()
            .with_max_level(tracing::Level::TRACE)
            .with_ansi(false)
            .with_writer(move || writer.clone())
            .finish();
        tracing::subscriber::with_default(subscriber, f);
        logs.lines()
    }

    fn peer() -> SocketAddr {
        "127.0.0.1:9".parse().unwrap()
    }

    #[test]
    fn labels_every_action() {
        assert_eq!(action_label(Some(Action::Direct), ""), "Direct");
        assert_eq!(action_label(Some(Action::Proxy), "ignored"), "Proxy");
        assert_eq!(action_label(Some(Action::Block), ""), "Block");
        assert_eq!(action_label(Some(Action::Hijack), "1.2.3.4"), "Hijack to 1.2.3.4");
        assert_eq!(action_label(None, "1.2.3.4"), "Unknown");
    }

    #[test]
    fn end_of_stream_is_debug() {
        assert_eq!(error_severity(&StreamError::EndOfStream), Severity::Debug);
    }

    #[test]
    fn other_errors_are_info() {
        let reset = StreamError::Io(io::Error::from(io::ErrorKind::ConnectionReset));
        assert_eq!(error_severity(&reset), Severity::Info);
        let refused = StreamError::Io(io::Error::from(io::ErrorKind::ConnectionRefused));
        assert_eq!(error_severity(&refused), Severity::Info);
        let truncated = StreamError::Io(io::Error::from(io::ErrorKind::UnexpectedEof));
        assert_eq!(error_severity(&truncated), Severity::Info);
    }

    #[test]
    fn eof_is_logged_at_debug_without_detail() {
        let lines = capture(|| {
            LogReporter.on_error(peer(), b"", "example.com:443", &StreamError::EndOfStream);
        });

        let line = lines
            .iter()
            .find(|l| l.contains("TCP EOF"))
            .expect("EOF line logged");
        assert!(line.contains("DEBUG"), "{line}");
        assert!(line.contains("dst=example.com:443"), "{line}");
        assert!(!line.contains("error="), "{line}");
    }

    #[test]
    fn errors_are_logged_at_info_with_detail() {
        let lines = capture(|| {
            let error = StreamError::Io(io::Error::new(io::ErrorKind::Other, "boom"));
            LogReporter.on_error(peer(), b"", "example.com:443", &error);
        });

        let line = lines
            .iter()
            .find(|l| l.contains("TCP error"))
            .expect("error line logged");
        assert!(line.contains("INFO"), "{line}");
        assert!(line.contains("error=boom"), "{line}");
        assert!(!lines.iter().any(|l| l.contains("TCP EOF")));
    }

    #[test]
    fn requests_are_logged_with_action_label() {
        let lines = capture(|| {
            LogReporter.on_request(
                peer(),
                b"cred",
                "example.com:443",
                Some(Action::Hijack),
                "10.0.0.1",
            );
            LogReporter.on_request(peer(), b"", "example.com:443", None, "");
        });

        let requests: Vec<_> = lines.iter().filter(|l| l.contains("TCP request")).collect();
        assert_eq!(requests.len(), 2);
        assert!(requests[0].contains("Hijack to 10.0.0.1"), "{}", requests[0]);
        assert!(requests[1].contains("action=Unknown"), "{}", requests[1]);
        assert!(!requests[0].contains("cred"));
    }
}
