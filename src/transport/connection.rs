//! One persistent connection: vectored request writes, buffered response reads.
//!
//! Request chunks are written with scatter/gather I/O (`write_vectored`) so
//! the head, JSON or multipart parts and file contents go out without being
//! joined into one buffer.

use std::io::IoSlice;
use std::time::Duration;

use bytes::Bytes;
use tokio::io::{AsyncReadExt, AsyncWrite, AsyncWriteExt};

use super::connector::BoxedStream;
use crate::error::{BotwireError, Result};
use crate::protocol::{HttpResponse, ResponseBuffer};

/// Read buffer size per connection.
const READ_CHUNK_SIZE: usize = 16 * 1024;

/// Upper bound on a graceful close.
const CLOSE_TIMEOUT: Duration = Duration::from_secs(2);

/// A pooled connection to the remote host.
pub struct Connection {
    id: u64,
    stream: BoxedStream,
    buffer: ResponseBuffer,
    read_buf: Box<[u8]>,
}

impl Connection {
    /// Wrap an opened stream.
    pub fn new(id: u64, stream: BoxedStream, max_body_size: usize) -> Self {
        Self {
            id,
            stream,
            buffer: ResponseBuffer::with_max_body(max_body_size),
            read_buf: vec![0u8; READ_CHUNK_SIZE].into_boxed_slice(),
        }
    }

    /// Pool-assigned identifier, for logs.
    #[inline]
    pub fn id(&self) -> u64 {
        self.id
    }

    /// Write one pre-framed request and read its response.
    pub async fn send(&mut self, chunks: &[Bytes]) -> Result<HttpResponse> {
        // Stale bytes from an earlier exchange would corrupt this one.
        if !self.buffer.is_idle() {
            self.buffer.clear();
        }
        write_chunks(&mut self.stream, chunks).await?;
        self.read_response().await
    }

    async fn read_response(&mut self) -> Result<HttpResponse> {
        loop {
            let n = self.stream.read(&mut self.read_buf).await?;
            if n == 0 {
                return Err(self.buffer.finish());
            }
            if let Some(response) = self.buffer.push(&self.read_buf[..n])? {
                return Ok(response);
            }
        }
    }

    /// Close the stream, waiting for the graceful shutdown to complete.
    pub async fn close(mut self) {
        match tokio::time::timeout(CLOSE_TIMEOUT, self.stream.shutdown()).await {
            Ok(Ok(())) => tracing::debug!("Closed connection {}", self.id),
            Ok(Err(e)) => tracing::debug!("Error closing connection {}: {}", self.id, e),
            Err(_) => tracing::debug!("Timed out closing connection {}", self.id),
        }
    }
}

/// Write all chunks using scatter/gather I/O, then flush.
pub(crate) async fn write_chunks<W>(writer: &mut W, chunks: &[Bytes]) -> Result<()>
where
    W: AsyncWrite + Unpin + ?Sized,
{
    let total_size: usize = chunks.iter().map(Bytes::len).sum();
    let mut total_written = 0;

    while total_written < total_size {
        let slices = build_remaining_slices(chunks, total_written);
        let written = writer.write_vectored(&slices).await?;
        if written == 0 {
            return Err(BotwireError::Io(std::io::Error::new(
                std::io::ErrorKind::WriteZero,
                "write_vectored returned 0",
            )));
        }
        total_written += written;
    }

    writer.flush().await?;
    Ok(())
}

/// Build IoSlice array for remaining data after a partial write.
fn build_remaining_slices(chunks: &[Bytes], skip_bytes: usize) -> Vec<IoSlice<'_>> {
    let mut slices = Vec::with_capacity(chunks.len());
    let mut skipped = 0;

    for chunk in chunks {
        let start = skipped;
        let end = skipped + chunk.len();

        if skip_bytes < end && !chunk.is_empty() {
            let start_in_chunk = skip_bytes.saturating_sub(start);
            slices.push(IoSlice::new(&chunk[start_in_chunk..]));
        }
        skipped = end;
    }

    slices
}
