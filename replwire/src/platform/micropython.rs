//! MicroPython unix port profile.
//!
//! Paste mode is entered with Ctrl-E, which the REPL acknowledges with
//! `paste mode; Ctrl-C to cancel, Ctrl-D to finish` followed by a `=== `
//! line prefix. Ctrl-D ends the paste and runs it.

use super::ReplProfile;
use crate::channel::NORMAL_PROMPT;

/// Ctrl-E: enter paste mode.
pub const PASTE_MODE_CMD: u8 = 0x05;

/// Prefix echoed for each line in paste mode.
pub const PASTE_MODE_LINE_PREFIX: &[u8] = b"=== ";

/// Ctrl-D: finish paste mode and execute.
pub const EOT: u8 = 0x04;

/// Ctrl-C: keyboard interrupt.
pub const INTERRUPT: u8 = 0x03;

/// Marks the end of a pasted script. A comment, so it is inert when it
/// lands on the script's last line.
pub const SCRIPT_SENTINEL: &[u8] = b"#~eos~";

/// Line the REPL prints under its version banner.
pub const WELCOME_BOILERPLATE: &str = "Use Ctrl-D to exit, Ctrl-E for paste mode\n";

/// Modules the unix port is known to ship.
///
/// `binascii` is left out on purpose: its presence does not reliably tell
/// whether the reader/writer helpers are usable.
pub const FALLBACK_BUILTIN_MODULES: &[&str] = &[
    "cmath",
    "gc",
    "math",
    "sys",
    "array",
    "collections",
    "errno",
    "hashlib",
    "heapq",
    "io",
    "json",
    "os",
    "re",
    "select",
    "socket",
    "ssl",
    "struct",
    "time",
    "zlib",
    "_thread",
    "btree",
    "micropython",
    "cryptolib",
    "ctypes",
];

/// Create the MicroPython profile.
pub fn profile() -> ReplProfile {
    ReplProfile::new("micropython", NORMAL_PROMPT)
        .with_paste_mode(PASTE_MODE_CMD, PASTE_MODE_LINE_PREFIX)
        .with_control_bytes(EOT, INTERRUPT)
        .with_script_sentinel(SCRIPT_SENTINEL)
        .with_welcome_boilerplate(WELCOME_BOILERPLATE)
        .with_interactive_arg("-i")
        .with_builtin_modules(FALLBACK_BUILTIN_MODULES)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_micropython_profile() {
        let profile = profile();
        assert_eq!(profile.name, "micropython");
        assert_eq!(profile.normal_prompt.as_bytes(), b">>> ");
        assert_eq!(profile.paste_mode_command, 0x05);
        assert_eq!(profile.end_of_transmission, 0x04);
        assert_eq!(profile.interactive_args, vec!["-i"]);
    }

    #[test]
    fn test_sentinel_is_a_comment() {
        assert!(SCRIPT_SENTINEL.starts_with(b"#"));
        assert!(!SCRIPT_SENTINEL.contains(&b'\n'));
    }

    #[test]
    fn test_builtin_modules() {
        let profile = profile();
        assert!(profile.builtin_modules.contains(&"micropython"));
        assert!(!profile.builtin_modules.contains(&"binascii"));
    }
}
