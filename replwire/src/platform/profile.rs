//! Interpreter profile: framing constants and startup conventions.

use crate::channel::PromptMarker;

/// Everything the driver needs to know about a particular REPL.
///
/// Profiles are plain data; [`micropython::profile`](super::micropython::profile)
/// builds the one for MicroPython's unix port.
#[derive(Debug, Clone)]
pub struct ReplProfile {
    /// Profile name (e.g. "micropython").
    pub name: String,

    /// Prompt printed when the interpreter is idle.
    pub normal_prompt: PromptMarker,

    /// Control byte that switches into paste mode.
    pub paste_mode_command: u8,

    /// Prefix echoed at the start of every paste-mode line.
    pub paste_line_prefix: Vec<u8>,

    /// Control byte that ends paste mode and runs the pasted code.
    pub end_of_transmission: u8,

    /// Control byte that interrupts running code.
    pub interrupt: u8,

    /// Appended to every script so the end of its echo is unambiguous.
    pub script_sentinel: Vec<u8>,

    /// Banner line removed from the cleaned welcome text.
    pub welcome_boilerplate: String,

    /// Arguments that force the interpreter into interactive mode.
    pub interactive_args: Vec<String>,

    /// Built-in module names reported without asking the interpreter.
    pub builtin_modules: Vec<&'static str>,
}

impl ReplProfile {
    /// Create a profile with the given prompt and no framing constants.
    pub fn new(name: impl Into<String>, normal_prompt: PromptMarker) -> Self {
        Self {
            name: name.into(),
            normal_prompt,
            paste_mode_command: 0,
            paste_line_prefix: Vec::new(),
            end_of_transmission: 0,
            interrupt: 0,
            script_sentinel: Vec::new(),
            welcome_boilerplate: String::new(),
            interactive_args: Vec::new(),
            builtin_modules: Vec::new(),
        }
    }

    /// Set the paste-mode control byte and echoed line prefix.
    pub fn with_paste_mode(mut self, command: u8, line_prefix: impl Into<Vec<u8>>) -> Self {
        self.paste_mode_command = command;
        self.paste_line_prefix = line_prefix.into();
        self
    }

    /// Set the end-of-transmission and interrupt control bytes.
    pub fn with_control_bytes(mut self, end_of_transmission: u8, interrupt: u8) -> Self {
        self.end_of_transmission = end_of_transmission;
        self.interrupt = interrupt;
        self
    }

    /// Set the script sentinel.
    pub fn with_script_sentinel(mut self, sentinel: impl Into<Vec<u8>>) -> Self {
        self.script_sentinel = sentinel.into();
        self
    }

    /// Set the banner line to strip from the welcome text.
    pub fn with_welcome_boilerplate(mut self, line: impl Into<String>) -> Self {
        self.welcome_boilerplate = line.into();
        self
    }

    /// Add an argument passed on every interpreter start.
    pub fn with_interactive_arg(mut self, arg: impl Into<String>) -> Self {
        self.interactive_args.push(arg.into());
        self
    }

    /// Set the reported built-in modules.
    pub fn with_builtin_modules(mut self, modules: &[&'static str]) -> Self {
        self.builtin_modules = modules.to_vec();
        self
    }

    /// Full argument list for starting the interpreter with user `args`.
    pub fn launch_args(&self, args: &[String]) -> Vec<String> {
        self.interactive_args
            .iter()
            .chain(args.iter())
            .cloned()
            .collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::channel::NORMAL_PROMPT;

    #[test]
    fn test_launch_args_prefix_interactive_flag() {
        let profile = ReplProfile::new("test", NORMAL_PROMPT).with_interactive_arg("-i");
        assert_eq!(profile.launch_args(&[]), vec!["-i"]);
        assert_eq!(
            profile.launch_args(&["main.py".to_string(), "--fast".to_string()]),
            vec!["-i", "main.py", "--fast"]
        );
    }
}
