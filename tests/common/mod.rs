//! Shared utilities for integration tests.

#![allow(dead_code)]

use std::net::SocketAddr;
use std::path::{Path, PathBuf};
use std::sync::{Arc, Mutex};
use std::time::Duration;

use rustls::pki_types::ServerName;
use tokio::io::{AsyncRead, AsyncReadExt, AsyncWrite, AsyncWriteExt};
use tokio::net::{TcpListener, TcpStream};
use tokio_rustls::client::TlsStream;
use tokio_rustls::TlsConnector;

use hysteria_server::acl::Action;
use hysteria_server::config::ServerConfig;
use hysteria_server::obfs::{ObfsStream, XorObfuscator};
use hysteria_server::observability::EventReporter;
use hysteria_server::transport::protocol::{ClientHello, ServerReply};
use hysteria_server::transport::StreamError;

pub fn fixture(name: &str) -> PathBuf {
    Path::new(env!("CARGO_MANIFEST_DIR"))
        .join("tests/fixtures")
        .join(name)
}

/// A valid configuration on an ephemeral loopback port.
pub fn test_config() -> ServerConfig {
    ServerConfig {
        listen: "127.0.0.1:0".to_string(),
        cert: fixture("cert.pem").display().to_string(),
        key: fixture("key.pem").display().to_string(),
        up_mbps: 100,
        down_mbps: 100,
        ..ServerConfig::default()
    }
}

/// Start a TCP backend that echoes everything it reads.
pub async fn start_echo_backend() -> SocketAddr {
    let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();

    tokio::spawn(async move {
        loop {
            match listener.accept().await {
                Ok((mut socket, _)) => {
                    tokio::spawn(async move {
                        let (mut rd, mut wr) = socket.split();
                        let _ = tokio::io::copy(&mut rd, &mut wr).await;
                        let _ = wr.shutdown().await;
                    });
                }
                Err(_) => break,
            }
        }
    });

    addr
}

/// Start a TCP backend that writes `banner` and closes.
pub async fn start_banner_backend(banner: &'static [u8]) -> SocketAddr {
    let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();

    tokio::spawn(async move {
        while let Ok((mut socket, _)) = listener.accept().await {
            tokio::spawn(async move {
                let _ = socket.write_all(banner).await;
                let _ = socket.shutdown().await;
            });
        }
    });

    addr
}

#[derive(Debug)]
struct DisabledVerifier {
    supported_algs: rustls::crypto::WebPkiSupportedAlgorithms,
}

impl rustls::client::danger::ServerCertVerifier for DisabledVerifier {
    fn verify_server_cert(
        &self,
        _end_entity: &rustls::pki_types::CertificateDer<'_>,
        _intermediates: &[rustls::pki_types::CertificateDer<'_>],
        _server_name: &rustls::pki_types::ServerName<'_>,
        _ocsp_response: &[u8],
        _now: rustls::pki_types::UnixTime,
    ) -> Result<rustls::client::danger::ServerCertVerified, rustls::Error> {
        Ok(rustls::client::danger::ServerCertVerified::assertion())
    }

    fn verify_tls12_signature(
        &self,
        message: &[u8],
        cert: &rustls::pki_types::CertificateDer<'_>,
        dss: &rustls::DigitallySignedStruct,
    ) -> Result<rustls::client::danger::HandshakeSignatureValid, rustls::Error> {
        rustls::crypto::verify_tls12_signature(message, cert, dss, &self.supported_algs)
    }

    fn verify_tls13_signature(
        &self,
        message: &[u8],
        cert: &rustls::pki_types::CertificateDer<'_>,
        dss: &rustls::DigitallySignedStruct,
    ) -> Result<rustls::client::danger::HandshakeSignatureValid, rustls::Error> {
        rustls::crypto::verify_tls13_signature(message, cert, dss, &self.supported_algs)
    }

    fn supported_verify_schemes(&self) -> Vec<rustls::SignatureScheme> {
        self.supported_algs.supported_schemes()
    }
}

/// Client TLS configuration that trusts any certificate.
pub fn client_tls_config() -> Arc<rustls::ClientConfig> {
    let provider = Arc::new(rustls::crypto::ring::default_provider());
    let verifier = Arc::new(DisabledVerifier {
        supported_algs: provider.signature_verification_algorithms,
    });
    let mut config = rustls::ClientConfig::builder_with_provider(provider)
        .with_protocol_versions(&[&rustls::version::TLS13])
        .unwrap()
        .dangerous()
        .with_custom_certificate_verifier(verifier)
        .with_no_client_auth();
    config.alpn_protocols = vec![b"hysteria".to_vec()];
    Arc::new(config)
}

pub trait ClientIo: AsyncRead + AsyncWrite + Unpin + Send {}

impl<T: AsyncRead + AsyncWrite + Unpin + Send> ClientIo for T {}

pub type ClientStream = TlsStream<Box<dyn ClientIo>>;

pub fn hello(credential: &str, address: impl Into<String>) -> ClientHello {
    ClientHello {
        send_bps: 0,
        recv_bps: 0,
        credential: credential.as_bytes().to_vec(),
        address: address.into(),
    }
}

/// Open a tunnel: TCP, optional obfuscation, TLS, hello, reply.
pub async fn open_tunnel(
    server: SocketAddr,
    obfs: Option<&str>,
    hello: &ClientHello,
) -> (ClientStream, ServerReply) {
    let tcp = TcpStream::connect(server).await.unwrap();
    let io: Box<dyn ClientIo> = match obfs {
        Some(secret) => Box::new(ObfsStream::new(
            tcp,
            Arc::new(XorObfuscator::new(secret.as_bytes())),
        )),
        None => Box::new(tcp),
    };

    let connector = TlsConnector::from(client_tls_config());
    let name = ServerName::try_from("localhost").unwrap();
    let mut tls = tokio::time::timeout(Duration::from_secs(5), connector.connect(name, io))
        .await
        .expect("TLS handshake timed out")
        .unwrap();

    hello.write_to(&mut tls).await.unwrap();
    let reply = tokio::time::timeout(Duration::from_secs(5), ServerReply::read_from(&mut tls))
        .await
        .expect("reply timed out")
        .unwrap();
    (tls, reply)
}

/// Write `payload`, half-close, and read everything back.
pub async fn exchange(tls: &mut ClientStream, payload: &[u8]) -> Vec<u8> {
    tls.write_all(payload).await.unwrap();
    tls.shutdown().await.unwrap();

    let mut received = Vec::new();
    tokio::time::timeout(Duration::from_secs(5), tls.read_to_end(&mut received))
        .await
        .expect("relay timed out")
        .unwrap();
    received
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Event {
    Request {
        destination: String,
        action: Option<Action>,
        argument: String,
    },
    End {
        destination: String,
        end_of_stream: bool,
    },
}

/// Reporter that remembers every event.
#[derive(Debug, Default)]
pub struct RecordingReporter {
    events: Mutex<Vec<Event>>,
}

impl RecordingReporter {
    pub fn events(&self) -> Vec<Event> {
        self.events.lock().unwrap().clone()
    }

    /// Poll until `count` events have arrived.
    pub async fn wait_for(&self, count: usize) -> Vec<Event> {
        for _ in 0..100 {
            let events = self.events();
            if events.len() >= count {
                return events;
            }
            tokio::time::sleep(Duration::from_millis(20)).await;
        }
        self.events()
    }
}

impl EventReporter for RecordingReporter {
    fn on_request(
        &self,
        _peer: SocketAddr,
        _credential: &[u8],
        destination: &str,
        action: Option<Action>,
        argument: &str,
    ) {
        self.events.lock().unwrap().push(Event::Request {
            destination: destination.to_string(),
            action,
            argument: argument.to_string(),
        });
    }

    fn on_error(
        &self,
        _peer: SocketAddr,
        _credential: &[u8],
        destination: &str,
        error: &StreamError,
    ) {
        self.events.lock().unwrap().push(Event::End {
            destination: destination.to_string(),
            end_of_stream: error.is_end_of_stream(),
        });
    }
}
