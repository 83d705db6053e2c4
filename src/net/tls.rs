//! TLS configuration and certificate loading.

use std::fs::File;
use std::io::BufReader;
use std::path::Path;
use std::sync::Arc;

use rustls::pki_types::{CertificateDer, PrivateKeyDer};
use thiserror::Error;

/// Application protocol advertised through ALPN.
pub const ALPN_PROTOCOL: &[u8] = b"hysteria";

/// Errors raised while loading the certificate and key.
#[derive(Debug, Error)]
pub enum TlsError {
    #[error("failed to read {path}: {source}")]
    Io {
        path: String,
        #[source]
        source: std::io::Error,
    },

    #[error("no certificate found in {0}")]
    NoCertificate(String),

    #[error("no private key found in {0}")]
    NoPrivateKey(String),

    #[error("invalid certificate/key pair: {0}")]
    Rustls(#[from] rustls::Error),
}

/// Build the server TLS configuration from PEM certificate and key files.
///
/// Only TLS 1.3 is offered.
pub fn load_tls_config(
    cert_path: &Path,
    key_path: &Path,
) -> Result<Arc<rustls::ServerConfig>, TlsError> {
    let certs = load_certs(cert_path)?;
    let key = load_private_key(key_path)?;

    let provider = Arc::new(rustls::crypto::ring::default_provider());
    let mut config = rustls::ServerConfig::builder_with_provider(provider)
        .with_protocol_versions(&[&rustls::version::TLS13])?
        .with_no_client_auth()
        .with_single_cert(certs, key)?;
    config.alpn_protocols = vec![ALPN_PROTOCOL.to_vec()];

    Ok(Arc::new(config))
}

fn open(path: &Path) -> Result<BufReader<File>, TlsError> {
    File::open(path).map(BufReader::new).map_err(|source| TlsError::Io {
        path: path.display().to_string(),
        source,
    })
}

fn load_certs(path: &Path) -> Result<Vec<CertificateDer<'static>>, TlsError> {
    let mut reader = open(path)?;
    let certs = rustls_pemfile::certs(&mut reader)
        .collect::<Result<Vec<_>, _>>()
        .map_err(|source| TlsError::Io {
            path: path.display().to_string(),
            source,
        })?;
    if certs.is_empty() {
        return Err(TlsError::NoCertificate(path.display().to_string()));
    }
    Ok(certs)
}

fn load_private_key(path: &Path) -> Result<PrivateKeyDer<'static>, TlsError> {
    let mut reader = open(path)?;
    rustls_pemfile::private_key(&mut reader)
        .map_err(|source| TlsError::Io {
            path: path.display().to_string(),
            source,
        })?
        .ok_or_else(|| TlsError::NoPrivateKey(path.display().to_string()))
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::path::PathBuf;

    fn fixture(name: &str) -> PathBuf {
        Path::new(env!("CARGO_MANIFEST_DIR"))
            .join("tests/fixtures")
            .join(name)
    }

    #[test]
    fn loads_fixture_pair() {
        let config = load_tls_config(&fixture("cert.pem"), &fixture("key.pem")).unwrap();
        assert_eq!(config.alpn_protocols, vec![b"hysteria".to_vec()]);
    }

    #[test]
    fn missing_files_fail() {
        let err = load_tls_config(&fixture("missing.pem"), &fixture("key.pem")).unwrap_err();
        assert!(matches!(err, TlsError::Io { .. }));

        let err = load_tls_config(&fixture("cert.pem"), &fixture("missing.pem")).unwrap_err();
        assert!(matches!(err, TlsError::Io { .. }));
    }

    #[test]
    fn mismatched_key_fails() {
        // A valid key, but not the one the certificate was issued for.
        let err = load_tls_config(&fixture("cert.pem"), &fixture("other_key.pem")).unwrap_err();
        assert!(matches!(err, TlsError::Rustls(_)), "{err}");
    }

    #[test]
    fn swapped_files_fail() {
        // The key file holds no certificate and vice versa.
        let err = load_tls_config(&fixture("key.pem"), &fixture("cert.pem")).unwrap_err();
        assert!(matches!(err, TlsError::NoCertificate(_)));
    }
}
