//! Interpreter profiles.
//!
//! A profile holds the framing constants, startup arguments and helper
//! scripts for one kind of REPL. Only MicroPython is built in.

pub mod helpers;
pub mod micropython;
mod profile;

pub use helpers::OsCapability;
pub use profile::ReplProfile;
