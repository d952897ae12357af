//! Error types for replwire.

use std::io;
use std::time::Duration;

use thiserror::Error;

use crate::driver::Operation;

/// Main error type for replwire operations.
#[derive(Error, Debug)]
pub enum Error {
    /// Connection-level errors (spawn, SSH, broken pipe)
    #[error("Transport error: {0}")]
    Transport(#[from] TransportError),

    /// The interpreter did not follow the expected framing
    #[error("Protocol error: {0}")]
    Protocol(#[from] ProtocolError),

    /// Session-level errors
    #[error("Session error: {0}")]
    Session(#[from] SessionError),

    /// The operation is not available on this backend
    #[error("{0} is not supported by this backend")]
    Unsupported(Operation),
}

impl Error {
    /// Whether this error came from the transport rather than the interpreter.
    pub fn is_transport(&self) -> bool {
        matches!(self, Error::Transport(_))
    }

    /// Whether this error is a framing violation by the interpreter.
    pub fn is_protocol(&self) -> bool {
        matches!(self, Error::Protocol(_))
    }

    /// Whether this error is the "not supported by this backend" signal.
    pub fn is_unsupported(&self) -> bool {
        matches!(self, Error::Unsupported(_))
    }
}

/// Transport layer errors (process spawn, SSH connection, I/O).
#[derive(Error, Debug)]
pub enum TransportError {
    /// Failed to spawn the interpreter process
    #[error("Failed to spawn '{program}': {source}")]
    SpawnFailed {
        program: String,
        #[source]
        source: io::Error,
    },

    /// The spawned process did not expose a piped stdio handle
    #[error("Interpreter process is missing its {0} pipe")]
    MissingPipe(&'static str),

    /// SSH handshake or protocol error
    #[error("SSH error: {0}")]
    Ssh(#[from] russh::Error),

    /// Authentication failed
    #[error("Authentication failed for user '{user}'")]
    AuthenticationFailed { user: String },

    /// SSH key error
    #[error("SSH key error: {0}")]
    Key(String),

    /// Host key does not match the one recorded in known_hosts
    #[error("Host key for {host}:{port} changed (known_hosts line {line})")]
    HostKeyChanged { host: String, port: u16, line: usize },

    /// Host is not present in known_hosts and strict checking is on
    #[error("Host {host}:{port} is not in known_hosts")]
    HostKeyUnknown { host: String, port: u16 },

    /// known_hosts could not be read or written
    #[error("known_hosts error: {0}")]
    KnownHosts(String),

    /// Connection was closed unexpectedly
    #[error("Connection disconnected")]
    Disconnected,

    /// Operation timed out
    #[error("Operation timed out after {0:?}")]
    Timeout(Duration),

    /// I/O error
    #[error("I/O error: {0}")]
    Io(#[from] io::Error),
}

/// Framing violations: an expected marker never showed up.
#[derive(Error, Debug)]
pub enum ProtocolError {
    /// The marker was not seen before the read deadline
    #[error("Marker {marker:?} not seen within {timeout:?}")]
    MarkerTimeout { marker: String, timeout: Duration },

    /// The stream ended before the marker was seen
    #[error("Stream ended before marker {marker:?} ({received} bytes unread)")]
    UnexpectedEof { marker: String, received: usize },

    /// The interpreter answered something other than what was expected
    #[error("Expected {expected}, got {received:?}")]
    UnexpectedResponse { expected: String, received: String },

    /// Invalid block-closer pattern
    #[error("Invalid marker pattern: {0}")]
    InvalidPattern(#[from] regex::Error),
}

/// Session layer errors (lifecycle, command validation).
#[derive(Error, Debug)]
pub enum SessionError {
    /// Session not connected
    #[error("Session not connected - call open() first")]
    NotConnected,

    /// Session already connected
    #[error("Session already connected")]
    AlreadyConnected,

    /// Command rejected before reaching the interpreter
    #[error("Invalid command: {message}")]
    InvalidCommand { message: String },

    /// Invalid configuration in the session builder
    #[error("Invalid configuration: {message}")]
    InvalidConfig { message: String },
}

/// Result type alias using replwire's Error.
pub type Result<T> = std::result::Result<T, Error>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_error_classification() {
        let err: Error = TransportError::Disconnected.into();
        assert!(err.is_transport());
        assert!(!err.is_protocol());

        let err: Error = ProtocolError::MarkerTimeout {
            marker: "=== ".into(),
            timeout: Duration::from_secs(1),
        }
        .into();
        assert!(err.is_protocol());
        assert!(!err.is_unsupported());

        let err = Error::Unsupported(Operation::ReadFile);
        assert!(err.is_unsupported());
        assert_eq!(err.to_string(), "read file is not supported by this backend");
    }
}
