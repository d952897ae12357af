//! High-level driver for REPL interaction.
//!
//! The driver layer submits scripts through paste mode, forwards their
//! output as events, and manages the interpreter's lifetime.

mod builder;
mod events;
mod forward;
pub(crate) mod response;
mod session;
mod side;
mod submit;
#[cfg(test)]
pub(crate) mod testing;

pub use builder::SessionBuilder;
pub use events::{BackendEvent, EventStream, OutputDecoder, StreamName, decode_text};
pub use forward::OutputForwarder;
pub use response::ExecutionResult;
pub use session::{ReplSession, WelcomeText};
pub use side::{NoSideCommands, SideCommand, SideCommandQueue, SideCommandSender, SideCommands};
pub use submit::{ScriptSubmitter, SubmitStage};

use std::fmt;

/// Commands a session can be asked to perform.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Operation {
    Execute,
    Run,
    ExecuteSystemCommand,
    GetFsInfo,
    WriteFile,
    Delete,
    ReadFile,
    Mkdir,
    UploadFile,
    DownloadFile,
    SoftReboot,
}

impl Operation {
    /// Every operation, supported or not.
    pub const ALL: [Operation; 11] = [
        Operation::Execute,
        Operation::Run,
        Operation::ExecuteSystemCommand,
        Operation::GetFsInfo,
        Operation::WriteFile,
        Operation::Delete,
        Operation::ReadFile,
        Operation::Mkdir,
        Operation::UploadFile,
        Operation::DownloadFile,
        Operation::SoftReboot,
    ];

    /// Whether a paste-mode session can perform this operation.
    ///
    /// File transfer and reboots need a raw-mode protocol, which sessions
    /// do not speak.
    pub fn is_supported(self) -> bool {
        matches!(
            self,
            Operation::Execute | Operation::Run | Operation::ExecuteSystemCommand
        )
    }
}

impl fmt::Display for Operation {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Operation::Execute => "execute",
            Operation::Run => "run",
            Operation::ExecuteSystemCommand => "system command",
            Operation::GetFsInfo => "filesystem info",
            Operation::WriteFile => "write file",
            Operation::Delete => "delete",
            Operation::ReadFile => "read file",
            Operation::Mkdir => "mkdir",
            Operation::UploadFile => "upload file",
            Operation::DownloadFile => "download file",
            Operation::SoftReboot => "soft reboot",
        };
        f.write_str(name)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_only_execution_operations_supported() {
        let supported: Vec<_> = Operation::ALL
            .into_iter()
            .filter(|op| op.is_supported())
            .collect();
        assert_eq!(
            supported,
            vec![
                Operation::Execute,
                Operation::Run,
                Operation::ExecuteSystemCommand
            ]
        );
    }

    #[test]
    fn test_operation_display() {
        assert_eq!(Operation::UploadFile.to_string(), "upload file");
        assert_eq!(Operation::SoftReboot.to_string(), "soft reboot");
    }
}
