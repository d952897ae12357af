//! Byte-level prompt marker matching.
//!
//! Prompts are fixed byte sequences, so everything here is exact comparison
//! on raw bytes. No encoding is assumed.

use std::borrow::Cow;
use std::fmt;

use regex::bytes::Regex;

use crate::error::{ProtocolError, Result};

/// An immutable prompt marker such as `>>> ` or a bare line feed.
#[derive(Clone, PartialEq, Eq, Hash)]
pub struct PromptMarker(Cow<'static, [u8]>);

/// The interpreter's idle prompt.
pub const NORMAL_PROMPT: PromptMarker = PromptMarker::from_static(b">>> ");

/// A line feed, used as a chunk boundary.
pub const LF: PromptMarker = PromptMarker::from_static(b"\n");

impl PromptMarker {
    /// Create a marker from a static byte string.
    pub const fn from_static(bytes: &'static [u8]) -> Self {
        Self(Cow::Borrowed(bytes))
    }

    /// Create a marker from owned bytes.
    pub fn new(bytes: impl Into<Vec<u8>>) -> Self {
        Self(Cow::Owned(bytes.into()))
    }

    /// The marker bytes.
    pub fn as_bytes(&self) -> &[u8] {
        &self.0
    }

    /// Marker length in bytes.
    pub fn len(&self) -> usize {
        self.0.len()
    }

    /// Whether the marker is empty.
    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    /// Check if `data` ends with the complete marker.
    pub fn is_suffix_of(&self, data: &[u8]) -> bool {
        ends_with_marker(data, self.as_bytes())
    }

    /// Check if the tail of `data` is a partial prefix of the marker.
    pub fn overlaps_tail_of(&self, data: &[u8]) -> bool {
        ends_overlap(data, self.as_bytes())
    }

    /// Strip the marker from the end of `data`, if present.
    pub fn strip_from<'a>(&self, data: &'a [u8]) -> Option<&'a [u8]> {
        data.strip_suffix(self.as_bytes())
    }
}

impl fmt::Debug for PromptMarker {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "PromptMarker({:?})", String::from_utf8_lossy(&self.0))
    }
}

impl fmt::Display for PromptMarker {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{:?}", String::from_utf8_lossy(&self.0))
    }
}

/// How the tail of a pending buffer relates to the line feed and prompt.
///
/// Variants are listed in the priority in which they are checked.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TailMatch {
    /// The buffer ends with a line feed.
    LineEnd,
    /// The buffer ends with the full prompt marker.
    FullMarker,
    /// The buffer ends with a strict prefix of the prompt marker.
    Overlap,
    /// None of the above; the buffer is plain output.
    Plain,
}

/// Exact suffix match of the whole marker.
pub fn ends_with_marker(data: &[u8], marker: &[u8]) -> bool {
    !marker.is_empty() && data.ends_with(marker)
}

/// Check whether the last k bytes of `data` equal the first k bytes of
/// `marker` for some k in `1..=marker.len()`.
///
/// A buffer that already ends with the complete marker is an exact match,
/// not an overlap, so this returns `false` for it.
pub fn ends_overlap(data: &[u8], marker: &[u8]) -> bool {
    if marker.is_empty() || ends_with_marker(data, marker) {
        return false;
    }

    let longest = marker.len().min(data.len());
    (1..=longest).any(|k| data[data.len() - k..] == marker[..k])
}

/// Classify the pending buffer against the line feed and the prompt.
pub fn classify_tail(data: &[u8], prompt: &PromptMarker) -> TailMatch {
    if LF.is_suffix_of(data) {
        TailMatch::LineEnd
    } else if prompt.is_suffix_of(data) {
        TailMatch::FullMarker
    } else if prompt.overlaps_tail_of(data) {
        TailMatch::Overlap
    } else {
        TailMatch::Plain
    }
}

/// Build the alternation regex that closes an incremental output block.
///
/// A soft read using this pattern returns as soon as any of the markers
/// (typically a line feed or the prompt) has arrived.
pub fn block_closers(markers: &[&PromptMarker]) -> Result<Regex> {
    let alternation = markers
        .iter()
        .map(|m| regex::escape(&String::from_utf8_lossy(m.as_bytes())))
        .collect::<Vec<_>>()
        .join("|");

    Regex::new(&alternation).map_err(|e| ProtocolError::InvalidPattern(e).into())
}
