//! Built-in engine: TLS over TCP, one tunnel per connection.
//!
//! # Per-connection flow
//! ```text
//! accept (SO_RCVBUF = connection receive window)
//!     → optional ObfsStream beneath TLS
//!     → TLS 1.3 handshake (ALPN "hysteria")
//!     → ClientHello → authenticator.evaluate()
//!     → per-client stream permit
//!     → ACL resolve → reporter.on_request()
//!     → connect upstream (or hijack target) → ServerReply
//!     → relay, downlink paced by a fresh congestion controller
//!     → reporter.on_error() with how the tunnel ended
//! ```

use std::io;
use std::net::{IpAddr, SocketAddr};
use std::sync::Arc;
use std::time::Duration;

use tokio::io::{AsyncRead, AsyncWrite};
use tokio::net::TcpStream;
use tokio::time::timeout;
use tokio_rustls::TlsAcceptor;
use tracing::Instrument;

use crate::acl::{AclDecision, AclEngine, Action};
use crate::lifecycle::Shutdown;
use crate::net::connection::ConnectionTracker;
use crate::net::listener::{ClientStreamLimiter, Listener, ListenerError};
use crate::obfs::ObfsStream;
use crate::observability::metrics;
use crate::transport::protocol::{split_host_port, ClientHello, ReplyStatus, ServerReply};
use crate::transport::relay::{relay, relay_buffer_size};
use crate::transport::{ServerParams, StreamError, TransportEngine, TunnelServer};

/// Time allowed for the TLS handshake and for the client hello.
pub const HANDSHAKE_TIMEOUT: Duration = Duration::from_secs(10);

/// Time allowed to reach the upstream destination.
pub const CONNECT_TIMEOUT: Duration = Duration::from_secs(10);

trait AsyncStream: AsyncRead + AsyncWrite + Unpin + Send {}

impl<T: AsyncRead + AsyncWrite + Unpin + Send> AsyncStream for T {}

/// Engine that binds [`TcpTunnelServer`]s.
#[derive(Debug, Clone, Copy, Default)]
pub struct TcpEngine;

impl TransportEngine for TcpEngine {
    type Server = TcpTunnelServer;

    async fn build(&self, params: ServerParams) -> io::Result<TcpTunnelServer> {
        TcpTunnelServer::bind(params).await
    }
}

struct Shared {
    params: ServerParams,
    limiter: ClientStreamLimiter,
    relay_buffer: usize,
}

/// A bound TLS/TCP tunnel server.
pub struct TcpTunnelServer {
    listener: Listener,
    acceptor: TlsAcceptor,
    shared: Arc<Shared>,
    tracker: ConnectionTracker,
    shutdown: Shutdown,
}

impl TcpTunnelServer {
    pub async fn bind(params: ServerParams) -> io::Result<Self> {
        let receive_buffer =
            usize::try_from(params.limits.connection_receive_window).unwrap_or(usize::MAX);
        let listener = Listener::bind(&params.listen, receive_buffer).await?;
        let acceptor = TlsAcceptor::from(Arc::clone(&params.tls));
        let limiter = ClientStreamLimiter::new(params.limits.max_incoming_streams);
        let relay_buffer = relay_buffer_size(params.limits.stream_receive_window);

        Ok(Self {
            listener,
            acceptor,
            shared: Arc::new(Shared {
                params,
                limiter,
                relay_buffer,
            }),
            tracker: ConnectionTracker::new(),
            shutdown: Shutdown::new(),
        })
    }
}

impl TunnelServer for TcpTunnelServer {
    async fn serve(&self) -> io::Result<()> {
        let mut closed = self.shutdown.subscribe();
        loop {
            tokio::select! {
                _ = closed.wait() => {
                    tracing::info!("Accept loop stopped");
                    return Ok(());
                }
                accepted = self.listener.accept() => {
                    let (stream, peer) = match accepted {
                        Ok(conn) => conn,
                        Err(ListenerError::Accept(e)) if is_transient(&e) => {
                            tracing::warn!(error = %e, "Transient accept failure");
                            continue;
                        }
                        Err(e) => return Err(e.into()),
                    };

                    let guard = self.tracker.track();
                    let shared = Arc::clone(&self.shared);
                    let acceptor = self.acceptor.clone();
                    let span = tracing::debug_span!("conn", id = %guard.id(), peer = %peer);
                    tokio::spawn(
                        async move {
                            handle_connection(shared, acceptor, stream, peer).await;
                            drop(guard);
                        }
                        .instrument(span),
                    );
                }
            }
        }
    }

    fn close(&self) {
        self.shutdown.trigger();
    }

    fn local_addr(&self) -> io::Result<SocketAddr> {
        self.listener.local_addr()
    }
}

fn is_transient(e: &io::Error) -> bool {
    matches!(
        e.kind(),
        io::ErrorKind::ConnectionAborted
            | io::ErrorKind::ConnectionReset
            | io::ErrorKind::Interrupted
            | io::ErrorKind::WouldBlock
    )
}

async fn handle_connection(
    shared: Arc<Shared>,
    acceptor: TlsAcceptor,
    stream: TcpStream,
    peer: SocketAddr,
) {
    let params = &shared.params;

    let io: Box<dyn AsyncStream> = match &params.obfuscator {
        Some(obfs) => Box::new(ObfsStream::new(stream, Arc::clone(obfs))),
        None => Box::new(stream),
    };

    let mut tls = match timeout(HANDSHAKE_TIMEOUT, acceptor.accept(io)).await {
        Ok(Ok(tls)) => tls,
        Ok(Err(e)) => {
            tracing::debug!(error = %e, "TLS handshake failed");
            return;
        }
        Err(_) => {
            tracing::debug!("TLS handshake timed out");
            return;
        }
    };

    let hello = match timeout(HANDSHAKE_TIMEOUT, ClientHello::read_from(&mut tls)).await {
        Ok(Ok(hello)) => hello,
        Ok(Err(e)) => {
            tracing::debug!(error = %e, "Invalid client hello");
            return;
        }
        Err(_) => {
            tracing::debug!("Client hello timed out");
            return;
        }
    };

    let decision =
        params
            .authenticator
            .evaluate(peer, &hello.credential, hello.send_bps, hello.recv_bps);
    if !decision.accepted {
        metrics::record_auth_failure();
        tracing::info!(src = %peer, reason = %decision.message, "Authentication failed");
        send_reply(&mut tls, ServerReply::new(ReplyStatus::AuthFailed, 0, decision.message)).await;
        return;
    }

    let Some(_permit) = shared.limiter.try_acquire(peer.ip()) else {
        tracing::info!(src = %peer, "Too many streams from client");
        send_reply(
            &mut tls,
            ServerReply::new(ReplyStatus::TooManyStreams, 0, "Too many streams"),
        )
        .await;
        return;
    };

    // The hello was validated on read, so the address always splits.
    let Some((host, port)) = split_host_port(&hello.address) else {
        return;
    };

    let AclDecision { action, argument } = resolve_destination(params.acl.as_deref(), host).await;
    params
        .reporter
        .on_request(peer, &hello.credential, &hello.address, Some(action), &argument);

    let target = match action {
        Action::Block => {
            send_reply(
                &mut tls,
                ServerReply::new(ReplyStatus::Blocked, 0, "Blocked by ACL"),
            )
            .await;
            return;
        }
        Action::Hijack => hijack_target(&argument, port),
        Action::Direct | Action::Proxy => hello.address.clone(),
    };

    let upstream = match timeout(CONNECT_TIMEOUT, TcpStream::connect(target.as_str())).await {
        Ok(Ok(upstream)) => upstream,
        Ok(Err(e)) => {
            send_reply(
                &mut tls,
                ServerReply::new(ReplyStatus::ConnectFailed, 0, e.to_string()),
            )
            .await;
            params
                .reporter
                .on_error(peer, &hello.credential, &hello.address, &StreamError::Io(e));
            return;
        }
        Err(_) => {
            let e = io::Error::new(io::ErrorKind::TimedOut, "upstream connect timed out");
            send_reply(
                &mut tls,
                ServerReply::new(ReplyStatus::ConnectFailed, 0, e.to_string()),
            )
            .await;
            params
                .reporter
                .on_error(peer, &hello.credential, &hello.address, &StreamError::Io(e));
            return;
        }
    };

    let client_send_bps = negotiate_rate(hello.send_bps, params.up_bps);
    let downlink_bps = negotiate_rate(hello.recv_bps, params.down_bps);
    let reply = ServerReply::new(ReplyStatus::Ok, client_send_bps, decision.message);
    if let Err(e) = reply.write_to(&mut tls).await {
        tracing::debug!(error = %e, "Failed to send reply");
        return;
    }

    let controller = params.congestion.build(downlink_bps);
    tracing::debug!(
        dst = %hello.address,
        up_bps = client_send_bps,
        down_bps = controller.pacing_rate(),
        "Tunnel established"
    );
    let ended = match relay(tls, upstream, controller, shared.relay_buffer).await {
        Ok((up, down)) => {
            tracing::trace!(up, down, "Tunnel closed");
            StreamError::EndOfStream
        }
        Err(e) => StreamError::Io(e),
    };
    params
        .reporter
        .on_error(peer, &hello.credential, &hello.address, &ended);
}

async fn send_reply<W>(tls: &mut W, reply: ServerReply)
where
    W: AsyncWrite + Unpin,
{
    if let Err(e) = reply.write_to(tls).await {
        tracing::debug!(error = %e, "Failed to send reply");
    }
}

/// A declared rate of zero means the client does not know; use the cap.
fn negotiate_rate(declared: u64, cap: u64) -> u64 {
    if declared == 0 {
        cap
    } else {
        declared.min(cap)
    }
}

/// With no ACL every destination is reached directly.
async fn resolve_destination(acl: Option<&AclEngine>, host: &str) -> AclDecision {
    let Some(acl) = acl else {
        return AclDecision {
            action: Action::Direct,
            argument: String::new(),
        };
    };

    let ip = match host.parse::<IpAddr>() {
        Ok(ip) => Some(ip),
        Err(_) if acl.has_ip_rules() => match tokio::net::lookup_host((host, 0)).await {
            Ok(mut addrs) => addrs.next().map(|a| a.ip()),
            Err(e) => {
                tracing::debug!(host, error = %e, "Resolution for ACL failed");
                None
            }
        },
        Err(_) => None,
    };
    acl.resolve(host, ip)
}

/// Hijack arguments may omit the port; the requested one is kept.
fn hijack_target(argument: &str, port: u16) -> String {
    if let Ok(addr) = argument.parse::<SocketAddr>() {
        return addr.to_string();
    }
    if let Ok(ip) = argument.parse::<IpAddr>() {
        return SocketAddr::new(ip, port).to_string();
    }
    if split_host_port(argument).is_some() {
        return argument.to_string();
    }
    format!("{}:{}", argument, port)
}
