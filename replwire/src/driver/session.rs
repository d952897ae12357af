//! Session controller: owns the interpreter connection and runs commands.

use std::path::Path;

use log::{debug, info, warn};

use super::Operation;
use super::events::{BackendEvent, EventSink, EventStream, OutputDecoder, StreamName, event_channel};
use super::forward::OutputForwarder;
use super::response::ExecutionResult;
use super::side::{SideCommandQueue, SideCommandSender};
use super::submit::ScriptSubmitter;
use crate::config::ReplConfig;
use crate::error::{Error, Result, SessionError};
use crate::platform::helpers::{CAPABILITY_PROBE_SCRIPT, HELPER_SCRIPT, system_command_script};
use crate::platform::{OsCapability, ReplProfile};
use crate::transport::{Connection, Connector};

/// Banner the interpreter printed before its first prompt.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct WelcomeText {
    /// As received, with `\r\n` normalized to `\n`.
    pub original: String,

    /// Same, minus the boilerplate usage line.
    pub text: String,
}

impl WelcomeText {
    /// Build from the received banner, removing `boilerplate`.
    pub fn new(original: String, boilerplate: &str) -> Self {
        let text = if boilerplate.is_empty() {
            original.clone()
        } else {
            original.replace(boilerplate, "")
        };
        Self { original, text }
    }
}

/// A session with one interpreter process.
///
/// Every command takes `&mut self`, so only one can be outstanding. While a
/// command runs, other tasks talk to the interpreter through the
/// [`SideCommandSender`] from [`side_commands`](Self::side_commands).
pub struct ReplSession<K: Connector> {
    connector: K,
    forwarder: OutputForwarder,
    connection: Option<K::Connection>,
    side_commands: SideCommandQueue,
    events: EventSink,
    welcome: Option<WelcomeText>,
    capability: Option<OsCapability>,
}

impl<K: Connector> ReplSession<K> {
    /// Create a disconnected session and the stream its events go to.
    pub fn new(connector: K, profile: ReplProfile, config: ReplConfig) -> Result<(Self, EventStream)> {
        config.validate()?;
        let forwarder = OutputForwarder::new(profile, config)?;
        let (events, stream) = event_channel();

        let session = Self {
            connector,
            forwarder,
            connection: None,
            side_commands: SideCommandQueue::new(),
            events,
            welcome: None,
            capability: None,
        };
        Ok((session, stream))
    }

    /// Start the interpreter, read its banner and install the helpers.
    pub async fn open(&mut self) -> Result<()> {
        if self.connection.is_some() {
            return Err(SessionError::AlreadyConnected.into());
        }

        let (conn, banner) = self.start(&[], false).await?;
        self.connection = Some(conn);

        let welcome = WelcomeText::new(banner, &self.profile().welcome_boilerplate);
        debug!("welcome text: {:?}", welcome.text);
        self.welcome = Some(welcome);

        self.prepare_helpers().await?;
        info!("{} session ready", self.profile().name);
        Ok(())
    }

    /// Close the connection. Queued side commands are dropped.
    pub async fn close(&mut self) -> Result<()> {
        self.discard_stale_side_commands();
        self.capability = None;

        if let Some(mut conn) = self.connection.take() {
            debug!("closing {} connection", self.profile().name);
            conn.close().await?;
        }
        Ok(())
    }

    /// Run `script` and wait for it to finish.
    ///
    /// Output is reported as stdout events while the script runs and is
    /// also returned in full. Side commands queued before the call are
    /// dropped; only those sent while the script runs reach it.
    pub async fn execute(&mut self, script: &str) -> Result<ExecutionResult> {
        self.discard_stale_side_commands();
        let conn = self.connection.as_mut().ok_or(SessionError::NotConnected)?;
        let events = &self.events;
        let mut decoder = OutputDecoder::new();

        let result = ScriptSubmitter::new(&self.forwarder)
            .submit(conn, &mut self.side_commands, script, |chunk| {
                events.output(StreamName::Stdout, decoder.decode(chunk));
            })
            .await?;
        events.output(StreamName::Stdout, decoder.finish());
        Ok(result)
    }

    /// Restart the interpreter with `args` (typically a script path).
    ///
    /// Everything the restarted interpreter prints before its prompt is
    /// reported as stdout. That ends with the banner, so a
    /// [`BackendEvent::HideTrailingOutput`] carrying the banner captured by
    /// [`open`](Self::open) follows.
    pub async fn run(&mut self, args: &[String]) -> Result<()> {
        self.close().await?;

        let (conn, _) = self.start(args, true).await?;
        self.connection = Some(conn);

        match &self.welcome {
            Some(welcome) => self.events.emit(BackendEvent::HideTrailingOutput {
                text: welcome.original.clone(),
            }),
            None => debug!("no welcome text captured, nothing to hide"),
        }

        self.prepare_helpers().await
    }

    /// Run a shell command line through the interpreter's `os.system`.
    ///
    /// The line must start with `!`, which is stripped.
    pub async fn execute_system_command(&mut self, cmd_line: &str) -> Result<ExecutionResult> {
        let command = cmd_line
            .strip_prefix('!')
            .ok_or_else(|| SessionError::InvalidCommand {
                message: format!("system command must start with '!': {cmd_line:?}"),
            })?;
        self.execute(&system_command_script(command)).await
    }

    /// Report output that arrived between commands.
    ///
    /// A trailing prompt is not output and is dropped.
    pub async fn forward_unexpected_output(&mut self) -> Result<()> {
        let conn = self.connection.as_mut().ok_or(SessionError::NotConnected)?;
        let data = conn.read_all().await?;
        if data.is_empty() {
            return Ok(());
        }

        let prompt = &self.forwarder.profile().normal_prompt;
        let output = prompt.strip_from(&data).unwrap_or(&data);
        debug!("forwarding {} bytes of unexpected output", output.len());

        let mut decoder = OutputDecoder::new();
        let mut text = decoder.decode(output);
        text.push_str(&decoder.finish());
        self.events.output(StreamName::Stdout, text);
        Ok(())
    }

    /// Write raw bytes to the interpreter.
    pub async fn write(&mut self, data: &[u8]) -> Result<()> {
        let conn = self.connection.as_mut().ok_or(SessionError::NotConnected)?;
        conn.write(data).await
    }

    /// Whether the interpreter connection is up.
    pub fn is_connected(&self) -> bool {
        self.connection.as_ref().is_some_and(|c| c.is_connected())
    }

    /// Names of the interpreter's built-in modules.
    ///
    /// This is a fixed list; the interpreter is not asked.
    pub fn builtin_modules(&self) -> &[&'static str] {
        &self.profile().builtin_modules
    }

    /// Banner captured by [`open`](Self::open).
    pub fn welcome(&self) -> Option<&WelcomeText> {
        self.welcome.as_ref()
    }

    /// How the helpers were installed, once they are.
    pub fn capability(&self) -> Option<OsCapability> {
        self.capability
    }

    /// Handle for queueing side commands from another task.
    pub fn side_commands(&self) -> SideCommandSender {
        self.side_commands.sender()
    }

    /// The interpreter profile.
    pub fn profile(&self) -> &ReplProfile {
        self.forwarder.profile()
    }

    /// The timing configuration.
    pub fn config(&self) -> &ReplConfig {
        self.forwarder.config()
    }

    /// The connector used to (re)start the interpreter.
    pub fn connector(&self) -> &K {
        &self.connector
    }

    /// Whether `operation` is available, without trying it.
    pub fn supports(&self, operation: Operation) -> bool {
        operation.is_supported()
    }

    /// Filesystem usage. Not supported.
    pub async fn get_fs_info(&mut self, _path: &str) -> Result<()> {
        Self::unsupported(Operation::GetFsInfo)
    }

    /// Write a file on the interpreter side. Not supported.
    pub async fn write_file(&mut self, _path: &str, _content: &[u8]) -> Result<()> {
        Self::unsupported(Operation::WriteFile)
    }

    /// Delete files or directories. Not supported.
    pub async fn delete(&mut self, _paths: &[String]) -> Result<()> {
        Self::unsupported(Operation::Delete)
    }

    /// Read a file on the interpreter side. Not supported.
    pub async fn read_file(&mut self, _path: &str) -> Result<Vec<u8>> {
        Self::unsupported(Operation::ReadFile)
    }

    /// Create a directory. Not supported.
    pub async fn mkdir(&mut self, _path: &str) -> Result<()> {
        Self::unsupported(Operation::Mkdir)
    }

    /// Copy a local file to the interpreter side. Not supported.
    pub async fn upload_file(&mut self, _source: &Path, _target: &str) -> Result<()> {
        Self::unsupported(Operation::UploadFile)
    }

    /// Copy a file from the interpreter side. Not supported.
    pub async fn download_file(&mut self, _source: &str, _target: &Path) -> Result<()> {
        Self::unsupported(Operation::DownloadFile)
    }

    /// Reset the interpreter state in place. Not supported.
    pub async fn soft_reboot(&mut self) -> Result<()> {
        Self::unsupported(Operation::SoftReboot)
    }

    fn unsupported<T>(operation: Operation) -> Result<T> {
        debug!("rejecting unsupported operation: {}", operation);
        Err(Error::Unsupported(operation))
    }

    /// Connect with `args` and read up to the first prompt.
    ///
    /// Returns the connection and everything printed before the prompt;
    /// with `report` set that text also goes out as stdout events.
    async fn start(&mut self, args: &[String], report: bool) -> Result<(K::Connection, String)> {
        let launch_args = self.profile().launch_args(args);
        debug!("starting {} with {:?}", self.profile().name, launch_args);
        self.discard_stale_side_commands();
        let mut conn = match self.connector.connect(&launch_args).await {
            Ok(conn) => conn,
            Err(e) => {
                warn!("failed to start {}: {}", self.profile().name, e);
                self.events.output(StreamName::Stderr, format!("\n{e}\n"));
                return Err(e);
            }
        };

        let events = &self.events;
        let mut decoder = OutputDecoder::new();
        let mut text = String::new();
        let mut collect = |chunk: String| {
            if report {
                events.output(StreamName::Stdout, chunk.clone());
            }
            text.push_str(&chunk);
        };

        let forwarded = self
            .forwarder
            .forward_until_prompt(&mut conn, &mut self.side_commands, |chunk| {
                collect(decoder.decode(chunk))
            })
            .await;
        if let Err(e) = forwarded {
            warn!("interpreter did not reach its prompt: {}", e);
            if let Err(close_err) = conn.close().await {
                debug!("close after failed start: {}", close_err);
            }
            return Err(e);
        }
        collect(decoder.finish());

        Ok((conn, text))
    }

    /// Define the helper namespace and bind its OS functions.
    async fn prepare_helpers(&mut self) -> Result<()> {
        self.execute_silently(HELPER_SCRIPT).await?;

        let probe = self.execute_silently(CAPABILITY_PROBE_SCRIPT).await?;
        let capability = OsCapability::from_probe_output(&probe.text())?;
        debug!("os capability: {:?}", capability);

        let installed = self.execute_silently(capability.install_script()).await?;
        if installed.has_traceback() {
            warn!("helper installation failed: {}", installed.text().trim_end());
        }

        self.capability = Some(capability);
        Ok(())
    }

    /// Run an internal script without reporting its output.
    async fn execute_silently(&mut self, script: &str) -> Result<ExecutionResult> {
        self.discard_stale_side_commands();
        let conn = self.connection.as_mut().ok_or(SessionError::NotConnected)?;
        ScriptSubmitter::new(&self.forwarder)
            .submit(conn, &mut self.side_commands, script, |_| {})
            .await
    }

    /// Drop side commands queued while no command was running.
    fn discard_stale_side_commands(&mut self) {
        let discarded = self.side_commands.discard();
        if discarded > 0 {
            debug!("discarded {} stale side commands", discarded);
        }
    }
}

impl<K: Connector> Drop for ReplSession<K> {
    fn drop(&mut self) {
        if self.connection.is_some() {
            warn!(
                "{} session dropped while connected; call close() first",
                self.profile().name
            );
        }
    }
}
