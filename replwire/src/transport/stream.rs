//! Buffered connection over an async reader/writer pair.

use std::time::Duration;

use log::{debug, trace};
use regex::bytes::Regex;
use tokio::io::{AsyncRead, AsyncReadExt, AsyncWrite, AsyncWriteExt};
use tokio::time::Instant;

use super::Connection;
use crate::channel::ReadBuffer;
use crate::error::{ProtocolError, Result, TransportError};

const READ_CHUNK_SIZE: usize = 4096;

/// Outcome of a single low-level read.
enum Fill {
    Data,
    TimedOut,
    Eof,
}

/// [`Connection`] implementation over any tokio reader and writer.
///
/// Reads are cancel-safe, so a read that hits its deadline loses nothing:
/// whatever arrives later is picked up by the next call.
pub struct StreamConnection<R, W> {
    reader: R,
    /// Dropped on close, so a pipe's far end sees end-of-file.
    writer: Option<W>,
    buffer: ReadBuffer,
    eof: bool,
    failed: bool,
}

impl<R, W> StreamConnection<R, W>
where
    R: AsyncRead + Unpin + Send,
    W: AsyncWrite + Unpin + Send,
{
    /// Wrap a reader and writer.
    pub fn new(reader: R, writer: W) -> Self {
        Self {
            reader,
            writer: Some(writer),
            buffer: ReadBuffer::new(),
            eof: false,
            failed: false,
        }
    }

    /// Bytes received but not yet returned by a read.
    pub fn buffered(&self) -> &[u8] {
        self.buffer.as_slice()
    }

    /// Read one chunk into the buffer, giving up at `deadline`.
    async fn fill(&mut self, deadline: Option<Instant>) -> Result<Fill> {
        if self.eof {
            return Ok(Fill::Eof);
        }

        let mut chunk = [0u8; READ_CHUNK_SIZE];
        let read = match deadline {
            Some(deadline) => {
                match tokio::time::timeout_at(deadline, self.reader.read(&mut chunk)).await {
                    Ok(read) => read,
                    Err(_) => return Ok(Fill::TimedOut),
                }
            }
            None => self.reader.read(&mut chunk).await,
        };

        match read {
            Ok(0) => {
                debug!("connection reached end of stream");
                self.eof = true;
                Ok(Fill::Eof)
            }
            Ok(n) => {
                trace!("read {} bytes", n);
                self.buffer.extend(&chunk[..n]);
                Ok(Fill::Data)
            }
            Err(e) => {
                self.failed = true;
                Err(TransportError::Io(e).into())
            }
        }
    }

    /// Hand out whatever is buffered, or report the dead stream.
    fn drain_or_disconnected(&mut self) -> Result<Vec<u8>> {
        if self.buffer.is_empty() {
            Err(TransportError::Disconnected.into())
        } else {
            Ok(self.buffer.take_all())
        }
    }
}

impl<R, W> Connection for StreamConnection<R, W>
where
    R: AsyncRead + Unpin + Send,
    W: AsyncWrite + Unpin + Send,
{
    async fn write(&mut self, data: &[u8]) -> Result<()> {
        let Some(writer) = self.writer.as_mut() else {
            return Err(TransportError::Disconnected.into());
        };
        trace!("write {} bytes", data.len());

        let written = async {
            writer.write_all(data).await?;
            writer.flush().await
        }
        .await;

        written.map_err(|e| {
            self.failed = true;
            TransportError::Io(e).into()
        })
    }

    async fn read_until(&mut self, terminator: &[u8], timeout: Option<Duration>) -> Result<Vec<u8>> {
        let deadline = timeout.map(|t| Instant::now() + t);

        loop {
            if let Some(end) = self.buffer.find(terminator) {
                return Ok(self.buffer.take(end));
            }

            match self.fill(deadline).await? {
                Fill::Data => {}
                Fill::TimedOut => {
                    return Err(ProtocolError::MarkerTimeout {
                        marker: String::from_utf8_lossy(terminator).into_owned(),
                        timeout: timeout.unwrap_or_default(),
                    }
                    .into());
                }
                Fill::Eof => {
                    return Err(ProtocolError::UnexpectedEof {
                        marker: String::from_utf8_lossy(terminator).into_owned(),
                        received: self.buffer.len(),
                    }
                    .into());
                }
            }
        }
    }

    async fn soft_read_until(&mut self, closers: &Regex, timeout: Duration) -> Result<Vec<u8>> {
        let deadline = Instant::now() + timeout;

        loop {
            if let Some(end) = self.buffer.find_pattern(closers) {
                return Ok(self.buffer.take(end));
            }

            match self.fill(Some(deadline)).await? {
                Fill::Data => {}
                Fill::TimedOut => return Ok(self.buffer.take_all()),
                Fill::Eof => return self.drain_or_disconnected(),
            }
        }
    }

    async fn soft_read(&mut self, size: usize, timeout: Duration) -> Result<Vec<u8>> {
        let deadline = Instant::now() + timeout;

        loop {
            if self.buffer.len() >= size {
                return Ok(self.buffer.take(size));
            }

            match self.fill(Some(deadline)).await? {
                Fill::Data => {}
                Fill::TimedOut => return Ok(self.buffer.take_all()),
                Fill::Eof => return self.drain_or_disconnected(),
            }
        }
    }

    async fn read_all(&mut self) -> Result<Vec<u8>> {
        // A deadline of "now" still polls the read once, so this picks up
        // everything that is already waiting without blocking.
        while let Fill::Data = self.fill(Some(Instant::now())).await? {}
        Ok(self.buffer.take_all())
    }

    async fn close(&mut self) -> Result<()> {
        let Some(mut writer) = self.writer.take() else {
            return Ok(());
        };
        writer
            .shutdown()
            .await
            .map_err(|e| TransportError::Io(e).into())
    }

    fn is_connected(&self) -> bool {
        self.writer.is_some() && !(self.eof || self.failed)
    }
}
