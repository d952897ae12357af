//! Builder for creating REPL sessions.

use std::path::PathBuf;
use std::time::Duration;

use super::events::EventStream;
use super::session::ReplSession;
use crate::config::ReplConfig;
use crate::error::Result;
use crate::platform::{ReplProfile, micropython};
use crate::transport::{Connector, SshConfig, SshConnector, SubprocessConnector};

/// Builder for constructing REPL sessions.
///
/// # Example
///
/// ```rust,no_run
/// use replwire::driver::SessionBuilder;
///
/// # async fn example() -> Result<(), replwire::Error> {
/// let (mut session, events) = SessionBuilder::subprocess("micropython")
///     .probe_timeout(std::time::Duration::from_millis(200))
///     .build()?;
/// session.open().await?;
/// # Ok(())
/// # }
/// ```
pub struct SessionBuilder<K: Connector> {
    connector: K,
    profile: ReplProfile,
    config: ReplConfig,
}

impl SessionBuilder<SubprocessConnector> {
    /// Run a local interpreter executable.
    pub fn subprocess(executable: impl Into<PathBuf>) -> Self {
        Self::new(SubprocessConnector::new(executable))
    }
}

impl SessionBuilder<SshConnector> {
    /// Run `command` (the interpreter executable) on an SSH host.
    pub fn ssh(config: SshConfig, command: impl Into<String>) -> Self {
        Self::new(SshConnector::new(config, command))
    }
}

impl<K: Connector> SessionBuilder<K> {
    /// Create a builder around any connector, with the MicroPython profile.
    pub fn new(connector: K) -> Self {
        Self {
            connector,
            profile: micropython::profile(),
            config: ReplConfig::default(),
        }
    }

    /// Replace the whole timing configuration.
    pub fn config(mut self, config: ReplConfig) -> Self {
        self.config = config;
        self
    }

    /// Set how long a scan waits for output between side-command checks
    /// (default: 50ms).
    pub fn poll_timeout(mut self, timeout: Duration) -> Self {
        self.config.poll_timeout = timeout;
        self
    }

    /// Set how long to wait for the byte that completes a partial prompt
    /// (default: 100ms).
    pub fn probe_timeout(mut self, timeout: Duration) -> Self {
        self.config.probe_timeout = timeout;
        self
    }

    /// Set the deadline for paste-mode framing markers (default: 10s).
    pub fn protocol_timeout(mut self, timeout: Duration) -> Self {
        self.config.protocol_timeout = timeout;
        self
    }

    /// Use a custom interpreter profile.
    pub fn profile(mut self, profile: ReplProfile) -> Self {
        self.profile = profile;
        self
    }

    /// Build the session.
    ///
    /// This validates the configuration but does not connect. Call `open()`
    /// on the returned session to start the interpreter.
    pub fn build(self) -> Result<(ReplSession<K>, EventStream)> {
        ReplSession::new(self.connector, self.profile, self.config)
    }
}
