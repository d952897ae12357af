//! Local interpreter process with piped stdio.

use std::fmt;
use std::path::PathBuf;
use std::process::Stdio;
use std::time::Duration;

use log::{debug, warn};
use regex::bytes::Regex;
use tokio::process::{Child, ChildStdin, ChildStdout, Command};

use super::{Connection, Connector, StreamConnection};
use crate::error::{Result, TransportError};

/// How long a closed interpreter gets to exit before it is killed.
const EXIT_GRACE: Duration = Duration::from_millis(500);

/// Spawns the interpreter executable as a child process.
#[derive(Debug, Clone)]
pub struct SubprocessConnector {
    executable: PathBuf,
    working_dir: Option<PathBuf>,
    env: Vec<(String, String)>,
}

impl SubprocessConnector {
    /// Create a connector for `executable` (e.g. `micropython`).
    pub fn new(executable: impl Into<PathBuf>) -> Self {
        Self {
            executable: executable.into(),
            working_dir: None,
            env: Vec::new(),
        }
    }

    /// Run the interpreter in this directory.
    pub fn working_dir(mut self, dir: impl Into<PathBuf>) -> Self {
        self.working_dir = Some(dir.into());
        self
    }

    /// Set an environment variable for the interpreter.
    pub fn env(mut self, key: impl Into<String>, value: impl Into<String>) -> Self {
        self.env.push((key.into(), value.into()));
        self
    }

    /// The executable this connector spawns.
    pub fn executable(&self) -> &PathBuf {
        &self.executable
    }
}

impl Connector for SubprocessConnector {
    type Connection = SubprocessConnection;

    async fn connect(&self, args: &[String]) -> Result<SubprocessConnection> {
        SubprocessConnection::spawn(self, args)
    }
}

/// Connection to a local interpreter process.
///
/// The child is killed when the connection is closed or dropped.
pub struct SubprocessConnection {
    child: Child,
    stream: StreamConnection<ChildStdout, ChildStdin>,
}

impl SubprocessConnection {
    fn spawn(connector: &SubprocessConnector, args: &[String]) -> Result<Self> {
        let program = connector.executable.display().to_string();
        debug!("spawning {} {:?}", program, args);

        let mut command = Command::new(&connector.executable);
        command
            .args(args)
            .envs(connector.env.iter().map(|(k, v)| (k.as_str(), v.as_str())))
            .stdin(Stdio::piped())
            .stdout(Stdio::piped())
            .stderr(Stdio::inherit())
            .kill_on_drop(true);
        if let Some(dir) = &connector.working_dir {
            command.current_dir(dir);
        }

        let mut child = command
            .spawn()
            .map_err(|source| TransportError::SpawnFailed { program, source })?;

        let stdin = child
            .stdin
            .take()
            .ok_or(TransportError::MissingPipe("stdin"))?;
        let stdout = child
            .stdout
            .take()
            .ok_or(TransportError::MissingPipe("stdout"))?;

        Ok(Self {
            child,
            stream: StreamConnection::new(stdout, stdin),
        })
    }

    /// OS process id of the interpreter, if it is still running.
    pub fn pid(&self) -> Option<u32> {
        self.child.id()
    }
}

impl fmt::Debug for SubprocessConnection {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("SubprocessConnection")
            .field("pid", &self.child.id())
            .field("connected", &self.stream.is_connected())
            .finish_non_exhaustive()
    }
}

impl Connection for SubprocessConnection {
    async fn write(&mut self, data: &[u8]) -> Result<()> {
        self.stream.write(data).await
    }

    async fn read_until(&mut self, terminator: &[u8], timeout: Option<Duration>) -> Result<Vec<u8>> {
        self.stream.read_until(terminator, timeout).await
    }

    async fn soft_read_until(&mut self, closers: &Regex, timeout: Duration) -> Result<Vec<u8>> {
        self.stream.soft_read_until(closers, timeout).await
    }

    async fn soft_read(&mut self, size: usize, timeout: Duration) -> Result<Vec<u8>> {
        self.stream.soft_read(size, timeout).await
    }

    async fn read_all(&mut self) -> Result<Vec<u8>> {
        self.stream.read_all().await
    }

    async fn close(&mut self) -> Result<()> {
        // Closing stdin lets the interpreter exit on its own; kill it if it
        // has not within the grace period.
        let shutdown = self.stream.close().await;
        match tokio::time::timeout(EXIT_GRACE, self.child.wait()).await {
            Ok(status) => {
                let status = status.map_err(TransportError::Io)?;
                debug!("interpreter exited: {}", status);
            }
            Err(_) => {
                debug!("interpreter still running after {:?}, killing it", EXIT_GRACE);
                if let Err(e) = self.child.start_kill() {
                    warn!("failed to kill interpreter process: {}", e);
                }
                self.child.wait().await.map_err(TransportError::Io)?;
            }
        }
        shutdown
    }

    fn is_connected(&self) -> bool {
        self.stream.is_connected()
    }
}
