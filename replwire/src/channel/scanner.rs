//! Prompt scanner state machine.
//!
//! Separates program output from the interpreter prompt in a byte stream
//! that has no framing. The machine never reads anything itself: the caller
//! feeds it whatever a read returned (possibly nothing) and performs the
//! read the machine asks for next. This keeps the timeout logic testable
//! without timers.
//!
//! ```text
//!                 data                 LF
//! AwaitingData ─────────▶ classify ─────────▶ HaveLineEnd ──▶ emit, AwaitingData
//!      ▲                     │ prompt
//!      │                     ├──────────────▶ HaveFullMarker ──▶ PromptReached, Done
//!      │                     │ prefix of prompt
//!      │                     ├──────────────▶ HaveOverlap ──▶ ProbingOverlap
//!      │                     │ plain                               │  byte: classify
//!      └──── emit ◀──────────┘                                     │  silence: emit
//!      └───────────────────────────────────────────────────────────┘
//! ```

use log::trace;

use super::patterns::{PromptMarker, TailMatch, classify_tail};

/// States of the prompt scanner.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ScanState {
    /// Waiting for the next short poll read.
    AwaitingData,
    /// The pending buffer ends with a line feed.
    HaveLineEnd,
    /// The pending buffer ends with the complete prompt.
    HaveFullMarker,
    /// The pending buffer ends with a partial prompt.
    HaveOverlap,
    /// Waiting for the single-byte probe that resolves an overlap.
    ProbingOverlap,
    /// The prompt was reached; the scan is over.
    Done,
}

/// What the caller should do after a transition.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ScanStep {
    /// Nothing to emit; perform the next poll read.
    Idle,
    /// Emit this output chunk, then perform the next poll read.
    Output(Vec<u8>),
    /// Read exactly one byte with the probe timeout and feed it back.
    Probe,
    /// The prompt was reached; emit the trailing output and stop.
    PromptReached(Vec<u8>),
}

/// Incremental separator of output and prompt bytes.
///
/// A scanner is good for one scan: create a fresh one per command.
#[derive(Debug)]
pub struct PromptScanner {
    prompt: PromptMarker,
    pending: Vec<u8>,
    state: ScanState,
}

impl PromptScanner {
    /// Create a scanner looking for `prompt`.
    pub fn new(prompt: PromptMarker) -> Self {
        Self {
            prompt,
            pending: Vec::new(),
            state: ScanState::AwaitingData,
        }
    }

    /// Current state.
    pub fn state(&self) -> ScanState {
        self.state
    }

    /// Bytes received but not yet attributed.
    pub fn pending(&self) -> &[u8] {
        &self.pending
    }

    /// Whether the prompt has been reached.
    pub fn is_done(&self) -> bool {
        self.state == ScanState::Done
    }

    /// Feed the result of the read requested by the previous step.
    ///
    /// An empty `data` means the read timed out without delivering
    /// anything. After a poll read that is a no-op; after a probe it proves
    /// the pending bytes were not a prompt.
    pub fn advance(&mut self, data: &[u8]) -> ScanStep {
        let mut input = Some(data);

        loop {
            match self.state {
                ScanState::AwaitingData => match input.take() {
                    Some(bytes) if !bytes.is_empty() => {
                        self.pending.extend_from_slice(bytes);
                        if let Some(step) = self.classify() {
                            return step;
                        }
                    }
                    _ => return ScanStep::Idle,
                },
                ScanState::HaveLineEnd => {
                    self.state = ScanState::AwaitingData;
                    return ScanStep::Output(std::mem::take(&mut self.pending));
                }
                ScanState::HaveFullMarker => {
                    let keep = self.pending.len() - self.prompt.len();
                    self.pending.truncate(keep);
                    self.state = ScanState::Done;
                    return ScanStep::PromptReached(std::mem::take(&mut self.pending));
                }
                ScanState::HaveOverlap => {
                    self.state = ScanState::ProbingOverlap;
                    return ScanStep::Probe;
                }
                ScanState::ProbingOverlap => match input.take() {
                    Some(bytes) if !bytes.is_empty() => {
                        self.pending.extend_from_slice(bytes);
                        if let Some(step) = self.classify() {
                            return step;
                        }
                    }
                    Some(_) => {
                        trace!(
                            "probe timed out, releasing {} bytes as output",
                            self.pending.len()
                        );
                        self.state = ScanState::AwaitingData;
                        return ScanStep::Output(std::mem::take(&mut self.pending));
                    }
                    None => return ScanStep::Probe,
                },
                ScanState::Done => return ScanStep::Idle,
            }
        }
    }

    /// Move to the state matching the pending buffer's tail.
    ///
    /// Plain output is released immediately and yields a step; the other
    /// outcomes continue through the state loop.
    fn classify(&mut self) -> Option<ScanStep> {
        self.state = match classify_tail(&self.pending, &self.prompt) {
            TailMatch::LineEnd => ScanState::HaveLineEnd,
            TailMatch::FullMarker => ScanState::HaveFullMarker,
            TailMatch::Overlap => ScanState::HaveOverlap,
            TailMatch::Plain => {
                self.state = ScanState::AwaitingData;
                return Some(ScanStep::Output(std::mem::take(&mut self.pending)));
            }
        };
        None
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::channel::NORMAL_PROMPT;

    fn scanner() -> PromptScanner {
        PromptScanner::new(NORMAL_PROMPT)
    }

    #[test]
    fn test_empty_poll_is_idle() {
        let mut s = scanner();
        assert_eq!(s.advance(b""), ScanStep::Idle);
        assert_eq!(s.state(), ScanState::AwaitingData);
    }

    #[test]
    fn test_line_is_emitted_with_lf() {
        let mut s = scanner();
        assert_eq!(s.advance(b"hello\n"), ScanStep::Output(b"hello\n".to_vec()));
        assert_eq!(s.state(), ScanState::AwaitingData);
        assert!(s.pending().is_empty());
    }

    #[test]
    fn test_full_prompt_terminates() {
        let mut s = scanner();
        assert_eq!(s.advance(b"2\n"), ScanStep::Output(b"2\n".to_vec()));
        assert_eq!(s.advance(b">>> "), ScanStep::PromptReached(Vec::new()));
        assert!(s.is_done());
        assert_eq!(s.advance(b"ignored"), ScanStep::Idle);
    }

    #[test]
    fn test_trailing_output_before_prompt() {
        let mut s = scanner();
        assert_eq!(
            s.advance(b"no newline>>> "),
            ScanStep::PromptReached(b"no newline".to_vec())
        );
    }

    #[test]
    fn test_plain_output_is_not_withheld() {
        let mut s = scanner();
        assert_eq!(s.advance(b"partial"), ScanStep::Output(b"partial".to_vec()));
    }

    #[test]
    fn test_prompt_split_byte_by_byte() {
        let mut s = scanner();
        assert_eq!(s.advance(b"out>"), ScanStep::Probe);
        assert_eq!(s.state(), ScanState::ProbingOverlap);
        assert_eq!(s.advance(b">"), ScanStep::Probe);
        assert_eq!(s.advance(b">"), ScanStep::Probe);
        assert_eq!(s.advance(b" "), ScanStep::PromptReached(b"out".to_vec()));
    }

    #[test]
    fn test_probe_silence_releases_output() {
        let mut s = scanner();
        assert_eq!(s.advance(b"a >>"), ScanStep::Probe);
        assert_eq!(s.advance(b""), ScanStep::Output(b"a >>".to_vec()));
        assert_eq!(s.state(), ScanState::AwaitingData);

        // Scanning continues normally afterwards
        assert_eq!(s.advance(b">>> "), ScanStep::PromptReached(Vec::new()));
    }

    #[test]
    fn test_probe_resolving_to_plain() {
        let mut s = scanner();
        assert_eq!(s.advance(b"x>"), ScanStep::Probe);
        assert_eq!(s.advance(b"y"), ScanStep::Output(b"x>y".to_vec()));
    }

    #[test]
    fn test_probe_resolving_to_line_end() {
        let mut s = scanner();
        assert_eq!(s.advance(b"1 >"), ScanStep::Probe);
        assert_eq!(s.advance(b"\n"), ScanStep::Output(b"1 >\n".to_vec()));
    }

    #[test]
    fn test_probe_shifting_overlap() {
        let mut s = scanner();
        // ">>>" then ">" -> ">>>>" still ends with ">>>", a prefix of the prompt
        assert_eq!(s.advance(b">>>"), ScanStep::Probe);
        assert_eq!(s.advance(b">"), ScanStep::Probe);
        assert_eq!(s.advance(b" "), ScanStep::PromptReached(b">".to_vec()));
    }
}
