//! Transport layer: byte connections to an interpreter process.
//!
//! The driver only needs an ordered, reliable byte stream with a handful of
//! read primitives. [`StreamConnection`] implements them over any tokio
//! reader/writer pair; the subprocess and SSH transports are thin wrappers
//! around it that also own the process or session.

pub mod config;
mod ssh;
mod stream;
mod subprocess;

pub use config::{AuthMethod, HostKeyVerification, SshConfig};
pub use ssh::{SshConnection, SshConnector};
pub use stream::StreamConnection;
pub use subprocess::{SubprocessConnection, SubprocessConnector};

use std::future::Future;
use std::time::Duration;

use regex::bytes::Regex;

use crate::error::Result;

/// A byte connection to a running interpreter.
pub trait Connection: Send {
    /// Write all of `data`.
    fn write(&mut self, data: &[u8]) -> impl Future<Output = Result<()>> + Send;

    /// Read up to and including the first occurrence of `terminator`.
    ///
    /// Fails with a protocol error if the terminator does not arrive before
    /// `timeout` (`None` waits forever) or the stream ends first. Bytes read
    /// so far stay buffered in that case.
    fn read_until(
        &mut self,
        terminator: &[u8],
        timeout: Option<Duration>,
    ) -> impl Future<Output = Result<Vec<u8>>> + Send;

    /// Read up to and including the first match of `closers`, or whatever
    /// arrived before `timeout`.
    ///
    /// Returns an empty vector if nothing arrived. Fails with
    /// `TransportError::Disconnected` once the stream has ended and nothing
    /// is left to return.
    fn soft_read_until(
        &mut self,
        closers: &Regex,
        timeout: Duration,
    ) -> impl Future<Output = Result<Vec<u8>>> + Send;

    /// Read at most `size` bytes, waiting no longer than `timeout`.
    ///
    /// Same end-of-stream behavior as [`soft_read_until`](Self::soft_read_until).
    fn soft_read(
        &mut self,
        size: usize,
        timeout: Duration,
    ) -> impl Future<Output = Result<Vec<u8>>> + Send;

    /// Return everything that can be read without waiting.
    fn read_all(&mut self) -> impl Future<Output = Result<Vec<u8>>> + Send;

    /// Close the connection.
    fn close(&mut self) -> impl Future<Output = Result<()>> + Send;

    /// Whether the connection is still usable.
    fn is_connected(&self) -> bool;
}

/// Factory for fresh connections.
///
/// Sessions reconnect through this when the interpreter has to be
/// restarted with different arguments.
pub trait Connector: Send + Sync {
    /// The connection type produced.
    type Connection: Connection;

    /// Start the interpreter with `args` and connect to it.
    fn connect(&self, args: &[String]) -> impl Future<Output = Result<Self::Connection>> + Send;
}
