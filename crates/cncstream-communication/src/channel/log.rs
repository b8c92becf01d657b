//! Log channel
//!
//! Pushes log output to an HTTP client that keeps its response open.
//! Inbound bytes are read and thrown away.

use super::framing::{SCRATCH_SIZE, STREAM_RESPONSE};
use crate::communication::ByteStream;
use cncstream_core::AckStatus;
use std::fmt;

/// States shared by the outbound-only channels
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StreamState {
    /// Sending the response header
    WritingHeader,
    /// Streaming output
    Logging,
    /// Connection closed
    Finished,
}

impl fmt::Display for StreamState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            Self::WritingHeader => "WRITING_HEADER",
            Self::Logging => "LOGGING",
            Self::Finished => "FINISHED",
        })
    }
}

/// Discard inbound bytes; returns true once the peer is gone and nothing
/// is left to read
pub(crate) fn drain_inbound<S: ByteStream>(stream: &mut S) -> bool {
    let mut sink = [0u8; SCRATCH_SIZE];
    let mut drained = false;
    while stream.available() > 0 {
        if stream.read_bytes(&mut sink) == 0 {
            break;
        }
        drained = true;
    }
    !drained && !stream.connected()
}

/// Write the stream response header, logging truncation
pub(crate) fn write_stream_header<S: ByteStream>(stream: &mut S, name: &str) {
    let written = stream.write(STREAM_RESPONSE.as_bytes());
    if written != STREAM_RESPONSE.len() {
        tracing::warn!(
            "{}: response header truncated ({} of {} bytes)",
            name,
            written,
            STREAM_RESPONSE.len()
        );
    }
    stream.flush();
}

/// HTTP log streaming channel
#[derive(Debug)]
pub struct LogChannel<S: ByteStream> {
    name: String,
    stream: S,
    state: StreamState,
}

impl<S: ByteStream> LogChannel<S> {
    /// Create a channel for an accepted connection
    pub fn new(name: impl Into<String>, stream: S) -> Self {
        Self {
            name: name.into(),
            stream,
            state: StreamState::WritingHeader,
        }
    }

    /// Channel name
    pub fn name(&self) -> &str {
        &self.name
    }

    /// Current state
    pub fn state(&self) -> StreamState {
        self.state
    }

    /// Whether the connection has been closed
    pub fn is_done(&self) -> bool {
        self.state == StreamState::Finished
    }

    /// Log channels never abort
    pub fn is_aborted(&self) -> bool {
        false
    }

    /// Never gated
    pub fn need_ack(&self) -> bool {
        false
    }

    fn set_state(&mut self, state: StreamState) {
        if self.state != state {
            tracing::debug!("{}: {} -> {}", self.name, self.state, state);
            self.state = state;
        }
    }

    /// Close the connection
    pub fn done(&mut self) {
        if self.state != StreamState::Finished {
            self.stream.shutdown();
            self.set_state(StreamState::Finished);
        }
    }

    /// Close the connection
    pub fn abort(&mut self) {
        self.done();
    }

    /// Drain input, send the header, notice disconnects
    pub fn handle(&mut self) {
        if self.state == StreamState::Finished {
            return;
        }
        if drain_inbound(&mut self.stream) {
            tracing::debug!("{}: peer disconnected", self.name);
            self.done();
            return;
        }
        if self.state == StreamState::WritingHeader {
            write_stream_header(&mut self.stream, &self.name);
            self.set_state(StreamState::Logging);
        }
    }

    /// Forward log output; dropped (but reported consumed) before streaming starts
    pub fn write(&mut self, data: &[u8]) -> usize {
        if self.state != StreamState::Logging {
            return data.len();
        }
        let written = self.stream.write(data);
        if written != data.len() {
            tracing::warn!(
                "{}: log output truncated ({} of {} bytes)",
                self.name,
                written,
                data.len()
            );
        }
        written
    }

    /// Push buffered output
    pub fn flush(&mut self) {
        if self.state == StreamState::Logging {
            self.stream.flush();
        }
    }

    /// Outbound only
    pub fn read(&mut self) -> Option<u8> {
        None
    }

    /// Outbound only
    pub fn peek(&mut self) -> Option<u8> {
        None
    }

    /// Outbound only
    pub fn available(&mut self) -> usize {
        0
    }

    /// Never yields a line
    pub fn poll_line(&mut self) -> Option<String> {
        None
    }

    /// Nothing is ever handed out, so an ack is unexpected
    pub fn ack(&mut self, status: AckStatus) {
        tracing::debug!("{}: unexpected ack {:?}", self.name, status);
    }
}
