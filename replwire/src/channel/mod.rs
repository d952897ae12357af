//! Channel layer: byte buffering, prompt matching and output scanning.
//!
//! Nothing in here performs I/O. The transport fills a [`ReadBuffer`], the
//! driver feeds read results to a [`PromptScanner`].

mod buffer;
mod patterns;
mod scanner;

pub use buffer::ReadBuffer;
pub use patterns::{
    LF, NORMAL_PROMPT, PromptMarker, TailMatch, block_closers, classify_tail, ends_overlap,
    ends_with_marker,
};
pub use scanner::{PromptScanner, ScanState, ScanStep};
