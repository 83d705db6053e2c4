//! TCP listener and per-client stream limits.
//!
//! # Responsibilities
//! - Bind to the configured listen address
//! - Accept incoming TCP connections
//! - Enforce the per-client concurrent stream limit
//! - Apply the connection receive window and keepalive to accepted sockets

use std::net::{IpAddr, Ipv4Addr, Ipv6Addr, SocketAddr};
use std::sync::Arc;
use std::time::Duration;

use dashmap::DashMap;
use socket2::{Domain, Protocol, SockRef, Socket, TcpKeepalive, Type};
use tokio::net::{TcpListener, TcpStream};

/// Idle time before the first keepalive probe on accepted sockets.
pub const KEEPALIVE_TIME: Duration = Duration::from_secs(15);

const LISTEN_BACKLOG: i32 = 1024;

/// Error type for listener operations.
#[derive(Debug)]
pub enum ListenerError {
    /// Failed to bind to address.
    Bind(std::io::Error),
    /// Failed to accept connection.
    Accept(std::io::Error),
}

impl std::fmt::Display for ListenerError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            ListenerError::Bind(e) => write!(f, "Failed to bind: {}", e),
            ListenerError::Accept(e) => write!(f, "Failed to accept: {}", e),
        }
    }
}

impl std::error::Error for ListenerError {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        match self {
            ListenerError::Bind(e) | ListenerError::Accept(e) => Some(e),
        }
    }
}

impl From<ListenerError> for std::io::Error {
    fn from(err: ListenerError) -> Self {
        match err {
            ListenerError::Bind(e) | ListenerError::Accept(e) => e,
        }
    }
}

/// Port of a bare `:port` listen address, which means every interface.
fn wildcard_port(listen: &str) -> Option<std::io::Result<u16>> {
    let port = listen.strip_prefix(':')?;
    Some(port.parse().map_err(|_| {
        std::io::Error::new(
            std::io::ErrorKind::InvalidInput,
            format!("invalid listen port: {:?}", port),
        )
    }))
}

/// Bind `[::]:port` accepting both IPv4 and IPv6 clients.
fn bind_dual_stack(port: u16) -> std::io::Result<TcpListener> {
    let addr = SocketAddr::from((Ipv6Addr::UNSPECIFIED, port));
    let socket = Socket::new(Domain::IPV6, Type::STREAM, Some(Protocol::TCP))?;
    socket.set_only_v6(false)?;
    socket.set_reuse_address(true)?;
    socket.set_nonblocking(true)?;
    socket.bind(&addr.into())?;
    socket.listen(LISTEN_BACKLOG)?;
    TcpListener::from_std(socket.into())
}

async fn bind_wildcard(port: u16) -> std::io::Result<TcpListener> {
    match bind_dual_stack(port) {
        Ok(listener) => Ok(listener),
        Err(e) => {
            tracing::debug!(port, error = %e, "Dual-stack bind failed, using IPv4 only");
            TcpListener::bind((Ipv4Addr::UNSPECIFIED, port)).await
        }
    }
}

/// A TCP listener that tunes accepted sockets.
pub struct Listener {
    inner: TcpListener,
    /// Receive buffer applied to each accepted socket.
    receive_buffer: usize,
}

impl Listener {
    /// Bind to `listen` (host:port, or `:port` for all interfaces).
    pub async fn bind(listen: &str, receive_buffer: usize) -> Result<Self, ListenerError> {
        let listener = match wildcard_port(listen) {
            Some(port) => bind_wildcard(port.map_err(ListenerError::Bind)?).await,
            None => TcpListener::bind(listen).await,
        }
        .map_err(ListenerError::Bind)?;

        let local_addr = listener.local_addr().map_err(ListenerError::Bind)?;
        tracing::info!(address = %local_addr, "Listener bound");

        Ok(Self {
            inner: listener,
            receive_buffer,
        })
    }

    /// Accept a new connection.
    pub async fn accept(&self) -> Result<(TcpStream, SocketAddr), ListenerError> {
        let (stream, addr) = self.inner.accept().await.map_err(ListenerError::Accept)?;
        // IPv4 clients of a dual-stack socket arrive as ::ffff:a.b.c.d.
        let addr = SocketAddr::new(addr.ip().to_canonical(), addr.port());

        let sock = SockRef::from(&stream);
        if let Err(e) = sock.set_recv_buffer_size(self.receive_buffer) {
            tracing::debug!(peer_addr = %addr, error = %e, "Failed to set receive buffer");
        }
        let keepalive = TcpKeepalive::new().with_time(KEEPALIVE_TIME);
        if let Err(e) = sock.set_tcp_keepalive(&keepalive) {
            tracing::debug!(peer_addr = %addr, error = %e, "Failed to enable keepalive");
        }
        if let Err(e) = stream.set_nodelay(true) {
            tracing::debug!(peer_addr = %addr, error = %e, "Failed to set TCP_NODELAY");
        }

        tracing::debug!(peer_addr = %addr, "Connection accepted");
        Ok((stream, addr))
    }

    /// Get the local address this listener is bound to.
    pub fn local_addr(&self) -> Result<SocketAddr, std::io::Error> {
        self.inner.local_addr()
    }
}

/// Caps how many tunnels one client IP may hold open at once.
#[derive(Debug, Clone)]
pub struct ClientStreamLimiter {
    active: Arc<DashMap<IpAddr, u64>>,
    max_per_client: u64,
}

impl ClientStreamLimiter {
    pub fn new(max_per_client: u64) -> Self {
        Self {
            active: Arc::new(DashMap::new()),
            max_per_client,
        }
    }

    /// Reserve a stream slot for `ip`, or `None` if it is at the limit.
    pub fn try_acquire(&self, ip: IpAddr) -> Option<StreamPermit> {
        let mut count = self.active.entry(ip).or_insert(0);
        if *count >= self.max_per_client {
            return None;
        }
        *count += 1;
        drop(count);
        Some(StreamPermit {
            active: Arc::clone(&self.active),
            ip,
        })
    }

    /// Streams currently held by `ip`.
    #[cfg(test)]
    fn active_for(&self, ip: IpAddr) -> u64 {
        self.active.get(&ip).map(|c| *c).unwrap_or(0)
    }
}

/// A stream slot held by one client.
///
/// When dropped, the slot is released back to the client's quota.
#[derive(Debug)]
pub struct StreamPermit {
    active: Arc<DashMap<IpAddr, u64>>,
    ip: IpAddr,
}

impl Drop for StreamPermit {
    fn drop(&mut self) {
        // Entries are removed at zero so idle clients leave nothing behind.
        self.active.remove_if_mut(&self.ip, |_, count| {
            *count = count.saturating_sub(1);
            *count == 0
        });
    }
}
