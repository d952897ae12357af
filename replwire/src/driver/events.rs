//! Events reported to the front end while commands run.

use std::pin::Pin;
use std::task::{Context, Poll};

use futures_core::Stream;
use log::warn;
use serde::Serialize;
use tokio::sync::mpsc;

/// Output stream an event belongs to.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum StreamName {
    Stdout,
    Stderr,
}

/// Something the front end should show (or hide).
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "event_type")]
pub enum BackendEvent {
    /// Program output, in the order it was produced.
    ProgramOutput {
        stream_name: StreamName,
        data: String,
    },

    /// The interpreter was restarted and printed its banner again; the
    /// front end may hide this text from the tail of the output.
    HideTrailingOutput { text: String },
}

/// Receiving end of a session's events.
///
/// Implements [`Stream`]; [`try_next`](Self::try_next) drains without
/// waiting.
#[derive(Debug)]
pub struct EventStream {
    receiver: mpsc::UnboundedReceiver<BackendEvent>,
}

impl EventStream {
    /// Take the next event if one is already queued.
    pub fn try_next(&mut self) -> Option<BackendEvent> {
        self.receiver.try_recv().ok()
    }

    /// Drain every queued event.
    pub fn drain(&mut self) -> Vec<BackendEvent> {
        std::iter::from_fn(|| self.try_next()).collect()
    }
}

impl Stream for EventStream {
    type Item = BackendEvent;

    fn poll_next(mut self: Pin<&mut Self>, cx: &mut Context<'_>) -> Poll<Option<Self::Item>> {
        self.receiver.poll_recv(cx)
    }
}

/// Sending side used by the session.
#[derive(Debug, Clone)]
pub(crate) struct EventSink {
    sender: mpsc::UnboundedSender<BackendEvent>,
}

impl EventSink {
    pub(crate) fn emit(&self, event: BackendEvent) {
        if self.sender.send(event).is_err() {
            warn!("event stream dropped, discarding event");
        }
    }

    pub(crate) fn output(&self, stream_name: StreamName, data: String) {
        if !data.is_empty() {
            self.emit(BackendEvent::ProgramOutput { stream_name, data });
        }
    }
}

/// Create a connected sink and stream.
pub(crate) fn event_channel() -> (EventSink, EventStream) {
    let (sender, receiver) = mpsc::unbounded_channel();
    (EventSink { sender }, EventStream { receiver })
}

/// Incremental bytes-to-text conversion for output chunks.
///
/// A chunk boundary can fall inside a multi-byte UTF-8 sequence; the
/// incomplete tail is held back until the rest arrives. `\r\n` becomes `\n`.
#[derive(Debug, Default)]
pub struct OutputDecoder {
    partial: Vec<u8>,
    pending_cr: bool,
}

impl OutputDecoder {
    pub fn new() -> Self {
        Self::default()
    }

    /// Decode the next chunk.
    pub fn decode(&mut self, chunk: &[u8]) -> String {
        self.partial.extend_from_slice(chunk);

        let mut text = String::new();
        let mut consumed = 0;
        loop {
            let rest = &self.partial[consumed..];
            match std::str::from_utf8(rest) {
                Ok(valid) => {
                    text.push_str(valid);
                    consumed = self.partial.len();
                    break;
                }
                Err(e) => {
                    let (valid, _) = rest.split_at(e.valid_up_to());
                    text.push_str(&String::from_utf8_lossy(valid));
                    match e.error_len() {
                        // The input ends mid-sequence; hold the tail back
                        None => {
                            consumed += e.valid_up_to();
                            break;
                        }
                        Some(invalid) => {
                            text.push(char::REPLACEMENT_CHARACTER);
                            consumed += e.valid_up_to() + invalid;
                        }
                    }
                }
            }
        }

        self.partial.drain(..consumed);
        self.normalize(&text)
    }

    /// Flush whatever is held back, lossily.
    pub fn finish(&mut self) -> String {
        let bytes = std::mem::take(&mut self.partial);
        let mut text = self.normalize(&String::from_utf8_lossy(&bytes));
        if std::mem::take(&mut self.pending_cr) {
            text.push('\r');
        }
        text
    }

    fn normalize(&mut self, text: &str) -> String {
        let mut out = String::with_capacity(text.len() + 1);
        if std::mem::take(&mut self.pending_cr) && !text.starts_with('\n') {
            out.push('\r');
        }
        out.push_str(text);

        // A trailing CR may be the first half of a CRLF split across chunks
        if out.ends_with('\r') {
            out.pop();
            self.pending_cr = true;
        }
        out.replace("\r\n", "\n")
    }
}

/// Decode a complete byte string the same way chunks are decoded.
pub fn decode_text(bytes: &[u8]) -> String {
    let mut decoder = OutputDecoder::new();
    let mut text = decoder.decode(bytes);
    text.push_str(&decoder.finish());
    text
}
