//! Tunnel handshake framing.
//!
//! All integers are big-endian. Runs inside the TLS session.
//!
//! ```text
//! client → server
//!   u64 send_bps | u64 recv_bps | u16 len | credential | u16 len | "host:port"
//! server → client
//!   u8 status | u64 client_send_bps | u16 len | message
//! ```

use std::io;

use thiserror::Error;
use tokio::io::{AsyncRead, AsyncReadExt, AsyncWrite, AsyncWriteExt};

#[derive(Debug, Error)]
pub enum ProtocolError {
    #[error(transparent)]
    Io(#[from] io::Error),

    #[error("invalid destination address: {0:?}")]
    InvalidAddress(String),

    #[error("unknown reply status {0}")]
    InvalidStatus(u8),

    #[error("field of {0} bytes does not fit a u16 length prefix")]
    FieldTooLong(usize),
}

/// Split `host:port`, accepting bracketed IPv6 hosts.
pub fn split_host_port(address: &str) -> Option<(&str, u16)> {
    let (host, port) = address.rsplit_once(':')?;
    let port = port.parse().ok()?;
    let host = host
        .strip_prefix('[')
        .and_then(|h| h.strip_suffix(']'))
        .unwrap_or(host);
    if host.is_empty() {
        return None;
    }
    Some((host, port))
}

/// First message of every tunnel.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ClientHello {
    /// Declared upload speed, bytes/sec. Zero means unknown.
    pub send_bps: u64,
    /// Declared download speed, bytes/sec. Zero means unknown.
    pub recv_bps: u64,
    pub credential: Vec<u8>,
    /// Destination as `host:port`.
    pub address: String,
}

impl ClientHello {
    pub async fn read_from<R>(reader: &mut R) -> Result<Self, ProtocolError>
    where
        R: AsyncRead + Unpin + ?Sized,
    {
        let send_bps = reader.read_u64().await?;
        let recv_bps = reader.read_u64().await?;
        let credential = read_field(reader).await?;
        let address = read_field(reader).await?;
        let address = String::from_utf8(address).map_err(|e| {
            ProtocolError::InvalidAddress(String::from_utf8_lossy(e.as_bytes()).into_owned())
        })?;
        if split_host_port(&address).is_none() {
            return Err(ProtocolError::InvalidAddress(address));
        }

        Ok(Self {
            send_bps,
            recv_bps,
            credential,
            address,
        })
    }

    pub async fn write_to<W>(&self, writer: &mut W) -> Result<(), ProtocolError>
    where
        W: AsyncWrite + Unpin + ?Sized,
    {
        let mut buf = Vec::with_capacity(20 + self.credential.len() + self.address.len());
        buf.extend_from_slice(&self.send_bps.to_be_bytes());
        buf.extend_from_slice(&self.recv_bps.to_be_bytes());
        put_field(&mut buf, &self.credential)?;
        put_field(&mut buf, self.address.as_bytes())?;
        writer.write_all(&buf).await?;
        writer.flush().await?;
        Ok(())
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[repr(u8)]
pub enum ReplyStatus {
    Ok = 0,
    AuthFailed = 1,
    Blocked = 2,
    ConnectFailed = 3,
    TooManyStreams = 4,
}

impl TryFrom<u8> for ReplyStatus {
    type Error = ProtocolError;

    fn try_from(value: u8) -> Result<Self, Self::Error> {
        match value {
            0 => Ok(ReplyStatus::Ok),
            1 => Ok(ReplyStatus::AuthFailed),
            2 => Ok(ReplyStatus::Blocked),
            3 => Ok(ReplyStatus::ConnectFailed),
            4 => Ok(ReplyStatus::TooManyStreams),
            other => Err(ProtocolError::InvalidStatus(other)),
        }
    }
}

/// Server answer to a [`ClientHello`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ServerReply {
    pub status: ReplyStatus,
    /// Upload speed the client may use, bytes/sec.
    pub client_send_bps: u64,
    pub message: String,
}

impl ServerReply {
    pub fn new(status: ReplyStatus, client_send_bps: u64, message: impl Into<String>) -> Self {
        Self {
            status,
            client_send_bps,
            message: message.into(),
        }
    }

    pub async fn read_from<R>(reader: &mut R) -> Result<Self, ProtocolError>
    where
        R: AsyncRead + Unpin + ?Sized,
    {
        let status = ReplyStatus::try_from(reader.read_u8().await?)?;
        let client_send_bps = reader.read_u64().await?;
        let message = read_field(reader).await?;
        Ok(Self {
            status,
            client_send_bps,
            message: String::from_utf8_lossy(&message).into_owned(),
        })
    }

    pub async fn write_to<W>(&self, writer: &mut W) -> Result<(), ProtocolError>
    where
        W: AsyncWrite + Unpin + ?Sized,
    {
        let mut buf = Vec::with_capacity(11 + self.message.len());
        buf.push(self.status as u8);
        buf.extend_from_slice(&self.client_send_bps.to_be_bytes());
        put_field(&mut buf, self.message.as_bytes())?;
        writer.write_all(&buf).await?;
        writer.flush().await?;
        Ok(())
    }
}

async fn read_field<R>(reader: &mut R) -> Result<Vec<u8>, ProtocolError>
where
    R: AsyncRead + Unpin + ?Sized,
{
    let len = reader.read_u16().await? as usize;
    let mut field = vec![0u8; len];
    reader.read_exact(&mut field).await?;
    Ok(field)
}

fn put_field(buf: &mut Vec<u8>, field: &[u8]) -> Result<(), ProtocolError> {
    let len = u16::try_from(field.len()).map_err(|_| ProtocolError::FieldTooLong(field.len()))?;
    buf.extend_from_slice(&len.to_be_bytes());
    buf.extend_from_slice(field);
    Ok(())
}
