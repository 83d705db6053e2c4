//! Byte stream adapter applying an [`Obfuscator`] in both directions.

use std::io;
use std::pin::Pin;
use std::sync::Arc;
use std::task::{Context, Poll};

use tokio::io::{AsyncRead, AsyncWrite, ReadBuf};

use crate::obfs::Obfuscator;

/// Wraps a stream so writes are obfuscated and reads are deobfuscated.
///
/// Read and write positions are tracked separately; each direction is an
/// independent keystream starting at offset zero.
pub struct ObfsStream<S> {
    inner: S,
    obfs: Arc<dyn Obfuscator>,
    read_pos: u64,
    write_pos: u64,
    scratch: Vec<u8>,
}

impl<S> ObfsStream<S> {
    pub fn new(inner: S, obfs: Arc<dyn Obfuscator>) -> Self {
        Self {
            inner,
            obfs,
            read_pos: 0,
            write_pos: 0,
            scratch: Vec::new(),
        }
    }
}

impl<S: AsyncRead + Unpin> AsyncRead for ObfsStream<S> {
    fn poll_read(
        self: Pin<&mut Self>,
        cx: &mut Context<'_>,
        buf: &mut ReadBuf<'_>,
    ) -> Poll<io::Result<()>> {
        let this = self.get_mut();
        let before = buf.filled().len();
        match Pin::new(&mut this.inner).poll_read(cx, buf) {
            Poll::Ready(Ok(())) => {
                let fresh = &mut buf.filled_mut()[before..];
                this.obfs.deobfuscate(this.read_pos, fresh);
                this.read_pos += fresh.len() as u64;
                Poll::Ready(Ok(()))
            }
            other => other,
        }
    }
}

impl<S: AsyncWrite + Unpin> AsyncWrite for ObfsStream<S> {
    fn poll_write(
        self: Pin<&mut Self>,
        cx: &mut Context<'_>,
        buf: &[u8],
    ) -> Poll<io::Result<usize>> {
        let this = self.get_mut();
        // Re-derived on every poll from the current position, so a short or
        // pending write never leaves transformed bytes behind.
        this.scratch.clear();
        this.scratch.extend_from_slice(buf);
        this.obfs.obfuscate(this.write_pos, &mut this.scratch);

        match Pin::new(&mut this.inner).poll_write(cx, &this.scratch) {
            Poll::Ready(Ok(n)) => {
                this.write_pos += n as u64;
                Poll::Ready(Ok(n))
            }
            other => other,
        }
    }

    fn poll_flush(self: Pin<&mut Self>, cx: &mut Context<'_>) -> Poll<io::Result<()>> {
        Pin::new(&mut self.get_mut().inner).poll_flush(cx)
    }

    fn poll_shutdown(self: Pin<&mut Self>, cx: &mut Context<'_>) -> Poll<io::Result<()>> {
        Pin::new(&mut self.get_mut().inner).poll_shutdown(cx)
    }
}
