//! Result type for script execution.

use std::time::Duration;

use super::events::decode_text;

/// Output of one submitted script.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ExecutionResult {
    /// Everything the script printed, without framing or the final prompt.
    pub output: Vec<u8>,

    /// The prompt marker that ended the output.
    pub prompt: Vec<u8>,

    /// Time from submission until the prompt came back.
    pub elapsed: Duration,
}

impl ExecutionResult {
    /// Create a new result.
    pub fn new(output: Vec<u8>, prompt: impl Into<Vec<u8>>, elapsed: Duration) -> Self {
        Self {
            output,
            prompt: prompt.into(),
            elapsed,
        }
    }

    /// Output as text, with `\r\n` normalized to `\n`.
    pub fn text(&self) -> String {
        decode_text(&self.output)
    }

    /// Check if the script printed nothing.
    pub fn is_empty(&self) -> bool {
        self.output.is_empty()
    }

    /// Check if the output contains a traceback.
    pub fn has_traceback(&self) -> bool {
        self.text().contains("Traceback (most recent call last):")
    }
}

impl std::fmt::Display for ExecutionResult {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.text())
    }
}
