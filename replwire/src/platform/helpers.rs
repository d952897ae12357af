//! Helper definitions installed into the interpreter after startup.
//!
//! Later commands call into a single helper namespace so they do not
//! depend on what the user has imported or shadowed.

use std::fmt::Write;

use crate::error::{ProtocolError, Result};

/// Name of the helper namespace inside the interpreter.
pub const HELPER_NAME: &str = "__repl_helper";

/// Defines the helper namespace.
pub const HELPER_SCRIPT: &str = "\
class __repl_helper:
    import os
    import sys
";

/// Prints `native` if `os` has the directory functions, else `fallback`.
pub const CAPABILITY_PROBE_SCRIPT: &str = "\
print('native' if all(hasattr(__repl_helper.os, name) for name in ('getcwd', 'chdir', 'rmdir')) else 'fallback')
";

/// Binds the directory functions straight to `os`.
pub const NATIVE_OS_SCRIPT: &str = "\
__repl_helper.getcwd = __repl_helper.os.getcwd
__repl_helper.chdir = __repl_helper.os.chdir
__repl_helper.rmdir = __repl_helper.os.rmdir
";

/// Implements the directory functions on top of libc through `ffi`.
pub const FALLBACK_OS_SCRIPT: &str = "\
def __repl_install_libc():
    import ffi
    import sys
    libc = ffi.open('libc.so.6' if sys.platform == 'linux' else 'libc.dylib')
    _getcwd = libc.func('s', 'getcwd', 'si')
    _chdir = libc.func('i', 'chdir', 's')
    _rmdir = libc.func('i', 'rmdir', 's')
    def check_error(ret):
        if ret == -1:
            raise OSError(__repl_helper.os.errno())
    def getcwd():
        buf = bytearray(512)
        return _getcwd(buf, 512)
    def chdir(path):
        check_error(_chdir(path))
    def rmdir(path):
        check_error(_rmdir(path))
    __repl_helper.getcwd = getcwd
    __repl_helper.chdir = chdir
    __repl_helper.rmdir = rmdir
__repl_install_libc()
del __repl_install_libc
";

/// Whether the interpreter's `os` module is complete enough to use directly.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum OsCapability {
    /// `os` provides `getcwd`, `chdir` and `rmdir`.
    Native,
    /// Those functions are missing and come from libc instead.
    Fallback,
}

impl OsCapability {
    /// Parse the output of [`CAPABILITY_PROBE_SCRIPT`].
    pub fn from_probe_output(output: &str) -> Result<Self> {
        match output.trim() {
            "native" => Ok(Self::Native),
            "fallback" => Ok(Self::Fallback),
            other => Err(ProtocolError::UnexpectedResponse {
                expected: "'native' or 'fallback'".to_string(),
                received: other.to_string(),
            }
            .into()),
        }
    }

    /// Script that binds the helper functions for this capability.
    pub fn install_script(self) -> &'static str {
        match self {
            Self::Native => NATIVE_OS_SCRIPT,
            Self::Fallback => FALLBACK_OS_SCRIPT,
        }
    }
}

/// Statement that runs a shell command line through the helper.
///
/// `or None` keeps the REPL from echoing the exit status.
pub fn system_command_script(cmd_line: &str) -> String {
    format!("{HELPER_NAME}.os.system({}) or None", py_repr(cmd_line))
}

/// Render `s` as a Python string literal, the way `repr()` would.
pub fn py_repr(s: &str) -> String {
    let quote = if s.contains('\'') && !s.contains('"') {
        '"'
    } else {
        '\''
    };

    let mut out = String::with_capacity(s.len() + 2);
    out.push(quote);
    for c in s.chars() {
        match c {
            '\\' => out.push_str("\\\\"),
            '\n' => out.push_str("\\n"),
            '\r' => out.push_str("\\r"),
            '\t' => out.push_str("\\t"),
            c if c == quote => {
                out.push('\\');
                out.push(c);
            }
            c if (c as u32) < 0x20 || c as u32 == 0x7f => {
                let _ = write!(out, "\\x{:02x}", c as u32);
            }
            c => out.push(c),
        }
    }
    out.push(quote);
    out
}
