//! # replwire
//!
//! Async driver for MicroPython-style REPLs.
//!
//! replwire starts an interpreter (a local process or a command over SSH),
//! submits code through the REPL's paste mode, and turns the raw byte stream
//! back into program output, telling it apart from echoed input and prompts.
//!
//! ## Features
//!
//! - Paste-mode submission with explicit framing checks
//! - Incremental output scanning that copes with prompts split across reads
//! - Interrupts and stdin input while a script is running
//! - Subprocess and SSH (russh) transports
//!
//! ## Quick Start
//!
//! ```rust,no_run
//! use replwire::SessionBuilder;
//!
//! #[tokio::main]
//! async fn main() -> Result<(), replwire::Error> {
//!     let (mut session, mut events) = SessionBuilder::subprocess("micropython").build()?;
//!
//!     session.open().await?;
//!
//!     let result = session.execute("print(1+1)").await?;
//!     println!("{}", result.text());
//!
//!     for event in events.drain() {
//!         println!("{:?}", event);
//!     }
//!
//!     session.close().await?;
//!     Ok(())
//! }
//! ```

pub mod channel;
pub mod config;
pub mod driver;
pub mod error;
pub mod platform;
pub mod transport;

// Re-export main types for convenience
pub use config::ReplConfig;
pub use driver::{
    BackendEvent, EventStream, ExecutionResult, Operation, ReplSession, SessionBuilder,
    SideCommand, SideCommandSender, StreamName,
};
pub use error::Error;
pub use platform::{OsCapability, ReplProfile};
pub use transport::{AuthMethod, SshConfig};
