//! Paste-mode script submission.
//!
//! The REPL evaluates input line by line, so multi-line code is sent in
//! paste mode, where lines are echoed back verbatim and nothing runs until
//! end-of-transmission:
//!
//! 1. write the paste-mode control byte
//! 2. wait for the `=== ` line prefix
//! 3. write the script followed by the sentinel
//! 4. wait for the sentinel's echo
//! 5. write end-of-transmission, wait for the line feed that follows it
//! 6. forward output until the normal prompt
//!
//! Any framing marker that fails to show up aborts the submission with a
//! protocol error. Nothing is retried: a half-finished paste leaves the
//! stream in an unknown state, and only reconnecting recovers from that.

use std::fmt;
use std::time::Instant;

use log::{debug, warn};

use super::forward::OutputForwarder;
use super::response::ExecutionResult;
use super::side::SideCommands;
use crate::error::Result;
use crate::transport::Connection;

/// Framing steps that wait for a marker.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SubmitStage {
    /// Waiting for the paste-mode line prefix.
    EnterPasteMode,
    /// Waiting for the script sentinel to be echoed.
    EchoScript,
    /// Waiting for the line feed after end-of-transmission.
    StartExecution,
    /// Forwarding output until the prompt.
    Execute,
}

impl fmt::Display for SubmitStage {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            SubmitStage::EnterPasteMode => "paste mode prefix",
            SubmitStage::EchoScript => "script echo",
            SubmitStage::StartExecution => "execution start",
            SubmitStage::Execute => "prompt after execution",
        };
        f.write_str(name)
    }
}

/// Submits scripts through paste mode and collects their output.
#[derive(Debug, Clone)]
pub struct ScriptSubmitter<'a> {
    forwarder: &'a OutputForwarder,
}

impl<'a> ScriptSubmitter<'a> {
    /// Create a submitter that reads results through `forwarder`.
    pub fn new(forwarder: &'a OutputForwarder) -> Self {
        Self { forwarder }
    }

    /// Submit `script` and wait for it to finish.
    ///
    /// Output chunks are passed to `on_output` as they arrive and are also
    /// collected into the returned result. Execution can block for as long
    /// as the script runs; queued side commands are serviced meanwhile.
    pub async fn submit<C, S, F>(
        &self,
        conn: &mut C,
        side_commands: &mut S,
        script: &str,
        mut on_output: F,
    ) -> Result<ExecutionResult>
    where
        C: Connection,
        S: SideCommands,
        F: FnMut(&[u8]) + Send,
    {
        let profile = self.forwarder.profile();
        let timeout = Some(self.forwarder.config().protocol_timeout);
        let start = Instant::now();

        debug!("submitting {} byte script", script.len());

        conn.write(&[profile.paste_mode_command]).await?;
        Self::stage(
            SubmitStage::EnterPasteMode,
            conn.read_until(&profile.paste_line_prefix, timeout).await,
        )?;

        let mut payload = Vec::with_capacity(script.len() + profile.script_sentinel.len());
        payload.extend_from_slice(script.as_bytes());
        payload.extend_from_slice(&profile.script_sentinel);
        conn.write(&payload).await?;
        Self::stage(
            SubmitStage::EchoScript,
            conn.read_until(&profile.script_sentinel, timeout).await,
        )?;

        conn.write(&[profile.end_of_transmission]).await?;
        Self::stage(
            SubmitStage::StartExecution,
            conn.read_until(b"\n", timeout).await,
        )?;

        let mut output = Vec::new();
        let forwarded = self
            .forwarder
            .forward_until_prompt(conn, side_commands, |chunk| {
                output.extend_from_slice(chunk);
                on_output(chunk);
            })
            .await;
        Self::stage(SubmitStage::Execute, forwarded)?;

        let result = ExecutionResult::new(
            output,
            profile.normal_prompt.as_bytes(),
            start.elapsed(),
        );
        debug!(
            "script finished in {:?} with {} bytes of output",
            result.elapsed,
            result.output.len()
        );
        Ok(result)
    }

    /// Log which framing step failed before passing the error on.
    fn stage<T>(stage: SubmitStage, result: Result<T>) -> Result<T> {
        if let Err(e) = &result {
            warn!("paste-mode submission failed at {}: {}", stage, e);
        }
        result
    }
}

#[cfg(test)]
mod tests {
    use std::time::Duration;

    use tokio_test::{assert_err, assert_ok};

    use super::*;
    use crate::config::ReplConfig;
    use crate::driver::side::NoSideCommands;
    use crate::driver::testing::{FakeRepl, fake_connection};
    use crate::error::{Error, ProtocolError};
    use crate::platform::micropython;

    fn forwarder() -> OutputForwarder {
        OutputForwarder::new(micropython::profile(), ReplConfig::default()).unwrap()
    }

    #[tokio::test(start_paused = true)]
    async fn test_print_round_trip() {
        let (mut conn, repl) = fake_connection(FakeRepl::new().skip_banner());
        let forwarder = forwarder();

        let mut streamed = Vec::new();
        let result = assert_ok!(
            ScriptSubmitter::new(&forwarder)
                .submit(&mut conn, &mut NoSideCommands, "print(1+1)", |c| {
                    streamed.extend_from_slice(c)
                })
                .await
        );

        assert_eq!(result.output, b"2\n");
        assert_eq!(streamed, b"2\n");
        assert_eq!(result.prompt, b">>> ");
        assert_eq!(repl.executed(), vec!["print(1+1)#~eos~".to_string()]);
    }

    #[tokio::test(start_paused = true)]
    async fn test_empty_script_completes_all_steps() {
        let (mut conn, repl) = fake_connection(FakeRepl::new().skip_banner());
        let forwarder = forwarder();

        let result = assert_ok!(
            ScriptSubmitter::new(&forwarder)
                .submit(&mut conn, &mut NoSideCommands, "", |_| {})
                .await
        );

        assert!(result.is_empty());
        assert_eq!(repl.executed(), vec!["#~eos~".to_string()]);
    }

    #[tokio::test(start_paused = true)]
    async fn test_multiline_script_echo_is_not_output() {
        let (mut conn, _repl) = fake_connection(
            FakeRepl::new()
                .skip_banner()
                .respond("for i in range(3):\n    print(i)\n", "0\n1\n2\n"),
        );
        let forwarder = forwarder();

        let result = assert_ok!(
            ScriptSubmitter::new(&forwarder)
                .submit(
                    &mut conn,
                    &mut NoSideCommands,
                    "for i in range(3):\n    print(i)\n",
                    |_| {}
                )
                .await
        );

        assert_eq!(result.text(), "0\n1\n2\n");
    }

    #[tokio::test(start_paused = true)]
    async fn test_missing_paste_prefix_is_protocol_error() {
        let (mut conn, _repl) = fake_connection(FakeRepl::new().skip_banner().without_paste_mode());
        let config = ReplConfig {
            protocol_timeout: Duration::from_secs(2),
            ..Default::default()
        };
        let forwarder = OutputForwarder::new(micropython::profile(), config).unwrap();

        let err = assert_err!(
            ScriptSubmitter::new(&forwarder)
                .submit(&mut conn, &mut NoSideCommands, "print(1)", |_| {})
                .await
        );
        assert!(matches!(
            err,
            Error::Protocol(ProtocolError::MarkerTimeout { .. })
        ));
    }

    #[tokio::test(start_paused = true)]
    async fn test_interpreter_exit_mid_paste_is_protocol_error() {
        let (mut conn, _repl) = fake_connection(FakeRepl::new().skip_banner().exit_on_paste());
        let forwarder = forwarder();

        let err = assert_err!(
            ScriptSubmitter::new(&forwarder)
                .submit(&mut conn, &mut NoSideCommands, "print(1)", |_| {})
                .await
        );
        assert!(matches!(
            err,
            Error::Protocol(ProtocolError::UnexpectedEof { .. })
        ));
    }
}
