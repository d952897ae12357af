//! Output forwarding loop: drives a [`PromptScanner`] with real reads.

use log::trace;
use regex::bytes::Regex;

use super::side::SideCommands;
use crate::channel::{LF, PromptScanner, ScanStep, block_closers};
use crate::config::ReplConfig;
use crate::error::Result;
use crate::platform::ReplProfile;
use crate::transport::Connection;

/// Forwards interpreter output until the normal prompt appears.
///
/// Holds the compiled block-closer pattern so repeated scans do not
/// rebuild it.
#[derive(Debug, Clone)]
pub struct OutputForwarder {
    profile: ReplProfile,
    config: ReplConfig,
    closers: Regex,
}

impl OutputForwarder {
    /// Create a forwarder for `profile`'s prompt.
    pub fn new(profile: ReplProfile, config: ReplConfig) -> Result<Self> {
        let closers = block_closers(&[&LF, &profile.normal_prompt])?;
        Ok(Self {
            profile,
            config,
            closers,
        })
    }

    /// The profile this forwarder scans for.
    pub fn profile(&self) -> &ReplProfile {
        &self.profile
    }

    /// The timing configuration.
    pub fn config(&self) -> &ReplConfig {
        &self.config
    }

    /// Read until the prompt, passing every output chunk to `consumer`.
    ///
    /// Chunks arrive in receive order and end at a line feed, at the prompt,
    /// or wherever a read stopped on plain output. The prompt itself is
    /// consumed and never passed on. Side commands are serviced at the top
    /// of each iteration, never while a partial prompt is being resolved.
    pub async fn forward_until_prompt<C, S, F>(
        &self,
        conn: &mut C,
        side_commands: &mut S,
        mut consumer: F,
    ) -> Result<()>
    where
        C: Connection,
        S: SideCommands,
        F: FnMut(&[u8]) + Send,
    {
        let mut scanner = PromptScanner::new(self.profile.normal_prompt.clone());

        loop {
            side_commands.service(conn, &self.profile).await?;

            let mut data = conn
                .soft_read_until(&self.closers, self.config.poll_timeout)
                .await?;

            loop {
                match scanner.advance(&data) {
                    ScanStep::Idle => break,
                    ScanStep::Output(chunk) => {
                        trace!("output chunk: {} bytes", chunk.len());
                        consumer(&chunk);
                        break;
                    }
                    ScanStep::Probe => {
                        data = conn.soft_read(1, self.config.probe_timeout).await?;
                    }
                    ScanStep::PromptReached(trailing) => {
                        trace!("prompt reached, {} trailing bytes", trailing.len());
                        if !trailing.is_empty() {
                            consumer(&trailing);
                        }
                        return Ok(());
                    }
                }
            }
        }
    }
}
