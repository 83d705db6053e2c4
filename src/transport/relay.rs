//! Bidirectional byte relay between a client tunnel and its upstream.

use std::io;
use std::time::Instant;

use tokio::io::{AsyncRead, AsyncReadExt, AsyncWrite, AsyncWriteExt};
use tokio::net::TcpStream;

use crate::congestion::CongestionControl;

/// Largest relay buffer, regardless of the stream receive window.
pub const MAX_RELAY_BUFFER: usize = 64 * 1024;

/// Relay buffer size for a given stream receive window.
pub fn relay_buffer_size(stream_receive_window: u64) -> usize {
    usize::try_from(stream_receive_window)
        .unwrap_or(MAX_RELAY_BUFFER)
        .clamp(1, MAX_RELAY_BUFFER)
}

/// Copy bytes until `reader` hits EOF, then shut `writer` down.
///
/// After each write the controller decides how long to wait before the next.
pub async fn copy_paced<R, W>(
    reader: &mut R,
    writer: &mut W,
    controller: &mut dyn CongestionControl,
    buffer_size: usize,
) -> io::Result<u64>
where
    R: AsyncRead + Unpin + ?Sized,
    W: AsyncWrite + Unpin + ?Sized,
{
    let mut buf = vec![0u8; buffer_size];
    let mut total = 0u64;
    loop {
        let n = reader.read(&mut buf).await?;
        if n == 0 {
            writer.shutdown().await?;
            return Ok(total);
        }
        writer.write_all(&buf[..n]).await?;
        total += n as u64;

        let delay = controller.on_sent(Instant::now(), n as u64);
        if !delay.is_zero() {
            tokio::time::sleep(delay).await;
        }
    }
}

/// Relay `client` and `upstream` until both directions finish.
///
/// Uplink is unpaced; downlink is paced by `controller`.
pub async fn relay<S>(
    client: S,
    upstream: TcpStream,
    mut controller: Box<dyn CongestionControl>,
    buffer_size: usize,
) -> io::Result<(u64, u64)>
where
    S: AsyncRead + AsyncWrite + Unpin,
{
    let (mut client_read, mut client_write) = tokio::io::split(client);
    let (mut upstream_read, mut upstream_write) = upstream.into_split();

    let uplink = async {
        let sent = tokio::io::copy(&mut client_read, &mut upstream_write).await?;
        upstream_write.shutdown().await?;
        Ok::<_, io::Error>(sent)
    };
    let downlink = copy_paced(
        &mut upstream_read,
        &mut client_write,
        controller.as_mut(),
        buffer_size,
    );

    tokio::try_join!(uplink, downlink)
}
