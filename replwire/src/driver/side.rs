//! Out-of-band requests serviced while a command is running.
//!
//! A front end cannot write to the interpreter while the session is busy
//! reading a command's output, so it queues a [`SideCommand`] instead. The
//! scan loop drains the queue once per iteration, between reads, which
//! keeps output attribution consistent.

use std::future::Future;

use log::debug;
use tokio::sync::mpsc;

use crate::error::Result;
use crate::platform::ReplProfile;
use crate::transport::Connection;

/// A request to act on the interpreter mid-command.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SideCommand {
    /// Send a keyboard interrupt.
    Interrupt,
    /// Send text to the running program's stdin.
    Input(String),
    /// Send end-of-file (Ctrl-D).
    Eof,
}

impl SideCommand {
    /// Bytes this command writes to the interpreter.
    pub fn to_bytes(&self, profile: &ReplProfile) -> Vec<u8> {
        match self {
            SideCommand::Interrupt => vec![profile.interrupt],
            SideCommand::Input(text) => text.as_bytes().to_vec(),
            SideCommand::Eof => vec![profile.end_of_transmission],
        }
    }
}

/// Services queued side commands between scan iterations.
pub trait SideCommands: Send {
    /// Apply every pending side command to `conn`, each exactly once.
    fn service<C: Connection>(
        &mut self,
        conn: &mut C,
        profile: &ReplProfile,
    ) -> impl Future<Output = Result<()>> + Send;
}

/// No side commands; used where nothing can be queued.
#[derive(Debug, Default, Clone, Copy)]
pub struct NoSideCommands;

impl SideCommands for NoSideCommands {
    async fn service<C: Connection>(&mut self, _conn: &mut C, _profile: &ReplProfile) -> Result<()> {
        Ok(())
    }
}

/// Cloneable handle for queueing side commands from another task.
#[derive(Debug, Clone)]
pub struct SideCommandSender {
    sender: mpsc::UnboundedSender<SideCommand>,
}

impl SideCommandSender {
    /// Queue a command. Returns `false` if the session is gone.
    pub fn send(&self, command: SideCommand) -> bool {
        self.sender.send(command).is_ok()
    }

    /// Queue a keyboard interrupt.
    pub fn interrupt(&self) -> bool {
        self.send(SideCommand::Interrupt)
    }
}

/// Queue of side commands owned by a session.
#[derive(Debug)]
pub struct SideCommandQueue {
    sender: mpsc::UnboundedSender<SideCommand>,
    receiver: mpsc::UnboundedReceiver<SideCommand>,
}

impl SideCommandQueue {
    pub fn new() -> Self {
        let (sender, receiver) = mpsc::unbounded_channel();
        Self { sender, receiver }
    }

    /// A handle that feeds this queue.
    pub fn sender(&self) -> SideCommandSender {
        SideCommandSender {
            sender: self.sender.clone(),
        }
    }

    /// Drop everything queued without applying it.
    pub fn discard(&mut self) -> usize {
        std::iter::from_fn(|| self.receiver.try_recv().ok()).count()
    }
}

impl Default for SideCommandQueue {
    fn default() -> Self {
        Self::new()
    }
}

impl SideCommands for SideCommandQueue {
    async fn service<C: Connection>(&mut self, conn: &mut C, profile: &ReplProfile) -> Result<()> {
        while let Ok(command) = self.receiver.try_recv() {
            debug!("servicing side command {:?}", command);
            conn.write(&command.to_bytes(profile)).await?;
        }
        Ok(())
    }
}
