//! Batch channel
//!
//! Streams G-code through repeated HTTP POST requests on one keep-alive
//! connection. Body bytes are handed out one at a time; once a line has been
//! given to the interpreter no further byte is surfaced until it is acked.

use super::ack_gate::AckGate;
use super::framing::{HeaderBlock, Scratch, BATCH_RESPONSE};
use super::line::{LineAssembler, LineEvent};
use crate::communication::ByteStream;
use cncstream_core::{AckStatus, ControllerError};
use std::fmt;

/// Batch channel states
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BatchState {
    /// Scanning the header block of a new request
    ReadingRequestHeader,
    /// Answering a CORS preflight
    WritingRequestHeader,
    /// Scanning the header block that follows a preflight
    ReadingPostHeader,
    /// Answering a request that carries a body
    WritingPostHeader,
    /// Handing out body bytes
    ReadingData,
    /// Waiting for the last ack before closing
    Finishing,
    /// Connection closed
    Finished,
}

impl fmt::Display for BatchState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Self::ReadingRequestHeader => "READING_REQUEST_HEADER",
            Self::WritingRequestHeader => "WRITING_REQUEST_HEADER",
            Self::ReadingPostHeader => "READING_POST_HEADER",
            Self::WritingPostHeader => "WRITING_POST_HEADER",
            Self::ReadingData => "READING_DATA",
            Self::Finishing => "FINISHING",
            Self::Finished => "FINISHED",
        };
        f.write_str(name)
    }
}

/// Outcome of one step of the read machinery
enum Step {
    Byte(u8),
    Progress,
    Idle,
}

/// HTTP batch streaming channel
#[derive(Debug)]
pub struct BatchChannel<S: ByteStream> {
    name: String,
    stream: S,
    state: BatchState,
    scratch: Scratch,
    header: HeaderBlock,
    content_size: u64,
    content_read: u64,
    aborted: bool,
    failure: Option<ControllerError>,
    gate: AckGate,
    assembler: LineAssembler,
}

impl<S: ByteStream> BatchChannel<S> {
    /// Create a channel for an accepted connection
    pub fn new(name: impl Into<String>, stream: S) -> Self {
        Self {
            name: name.into(),
            stream,
            state: BatchState::ReadingRequestHeader,
            scratch: Scratch::new(),
            header: HeaderBlock::new(),
            content_size: 0,
            content_read: 0,
            aborted: false,
            failure: None,
            gate: AckGate::new(),
            assembler: LineAssembler::new(),
        }
    }

    /// Channel name
    pub fn name(&self) -> &str {
        &self.name
    }

    /// Current state
    pub fn state(&self) -> BatchState {
        self.state
    }

    /// Declared body length of the current request
    pub fn content_size(&self) -> u64 {
        self.content_size
    }

    /// Body bytes handed out for the current request
    pub fn content_read(&self) -> u64 {
        self.content_read
    }

    /// Whether an ack is outstanding
    pub fn need_ack(&self) -> bool {
        self.gate.is_pending()
    }

    /// Whether the connection has been closed
    pub fn is_done(&self) -> bool {
        self.state == BatchState::Finished
    }

    /// Whether the stream ended abnormally
    pub fn is_aborted(&self) -> bool {
        self.aborted
    }

    /// First line failure that aborted the stream
    pub fn failure(&self) -> Option<&ControllerError> {
        self.failure.as_ref()
    }

    fn fail(&mut self, error: ControllerError) {
        tracing::warn!("{}: {}", self.name, error);
        if self.failure.is_none() {
            self.failure = Some(error);
        }
        self.abort();
    }

    fn set_state(&mut self, state: BatchState) {
        if self.state != state {
            tracing::debug!("{}: {} -> {}", self.name, self.state, state);
            self.state = state;
        }
    }

    /// Stop streaming and close once no ack is outstanding
    pub fn done(&mut self) {
        if self.state != BatchState::Finished {
            self.set_state(BatchState::Finishing);
        }
    }

    /// Mark the stream failed and close it
    pub fn abort(&mut self) {
        if !self.aborted {
            tracing::warn!("{}: aborting stream", self.name);
        }
        self.aborted = true;
        self.done();
    }

    /// Advance the outbound side of the state machine
    pub fn handle(&mut self) {
        match self.state {
            BatchState::WritingRequestHeader => {
                self.send_response("preflight");
                self.set_state(BatchState::ReadingPostHeader);
            }
            BatchState::WritingPostHeader => {
                self.send_response("post");
                self.set_state(BatchState::ReadingData);
            }
            BatchState::Finishing => {
                if self.gate.is_pending() {
                    return;
                }
                self.stream.shutdown();
                tracing::debug!("{}: connection closed", self.name);
                self.set_state(BatchState::Finished);
            }
            BatchState::ReadingRequestHeader
            | BatchState::ReadingPostHeader
            | BatchState::ReadingData
            | BatchState::Finished => {}
        }
    }

    fn send_response(&mut self, kind: &str) {
        let written = self.stream.write(BATCH_RESPONSE.as_bytes());
        if written != BATCH_RESPONSE.len() {
            tracing::warn!(
                "{}: {} response truncated ({} of {} bytes)",
                self.name,
                kind,
                written,
                BATCH_RESPONSE.len()
            );
        }
        self.stream.flush();
    }

    /// Read the next body byte
    pub fn read(&mut self) -> Option<u8> {
        match self.step() {
            Step::Byte(byte) => Some(byte),
            Step::Progress | Step::Idle => None,
        }
    }

    fn step(&mut self) -> Step {
        if self.gate.is_pending() {
            return Step::Idle;
        }
        match self.state {
            BatchState::ReadingRequestHeader | BatchState::ReadingPostHeader => self.scan_header(),
            BatchState::ReadingData => {
                if self.content_read >= self.content_size {
                    self.rearm();
                    return Step::Progress;
                }
                match self.peek() {
                    Some(byte) => {
                        self.scratch.advance();
                        self.content_read += 1;
                        Step::Byte(byte)
                    }
                    None => Step::Idle,
                }
            }
            BatchState::WritingRequestHeader
            | BatchState::WritingPostHeader
            | BatchState::Finishing
            | BatchState::Finished => Step::Idle,
        }
    }

    fn scan_header(&mut self) -> Step {
        if self.stream.available() == 0 && !self.stream.connected() {
            tracing::debug!("{}: peer closed between requests", self.name);
            self.done();
            return Step::Progress;
        }
        let Some((byte, overflowed)) = self.scratch.append_from(&mut self.stream) else {
            return Step::Idle;
        };
        if overflowed {
            tracing::debug!("{}: header line too long, dropping its head", self.name);
            self.header.truncate_line();
        }
        if byte != b'\n' {
            return Step::Progress;
        }

        let complete = self.header.feed_line(self.scratch.line());
        self.scratch.reset();
        if complete {
            if self.header.is_preflight() {
                self.set_state(BatchState::WritingRequestHeader);
            } else {
                self.content_size = self.header.content_length();
                self.content_read = 0;
                tracing::debug!("{}: request body of {} bytes", self.name, self.content_size);
                self.set_state(BatchState::WritingPostHeader);
            }
            self.header.reset();
        }
        Step::Progress
    }

    fn rearm(&mut self) {
        self.scratch.reset();
        self.header.reset();
        self.content_size = 0;
        self.content_read = 0;
        self.set_state(BatchState::ReadingRequestHeader);
    }

    /// Look at the next body byte without consuming it
    pub fn peek(&mut self) -> Option<u8> {
        if self.state != BatchState::ReadingData || self.gate.is_pending() {
            return None;
        }
        if self.scratch.is_exhausted() {
            let remaining = self.content_size - self.content_read;
            let limit = usize::try_from(remaining).unwrap_or(usize::MAX);
            if self.scratch.refill(&mut self.stream, limit) == 0 {
                if !self.stream.connected() {
                    tracing::warn!(
                        "{}: peer disconnected with {} body bytes outstanding",
                        self.name,
                        remaining
                    );
                    self.abort();
                }
                return None;
            }
        }
        self.scratch.peek()
    }

    /// Body bytes readable right now
    pub fn available(&mut self) -> usize {
        if self.state != BatchState::ReadingData || self.gate.is_pending() {
            return 0;
        }
        let remaining = self.content_size - self.content_read;
        let buffered = self.scratch.unread() as u64;
        let pending = self.stream.available() as u64;
        usize::try_from(remaining.min(buffered + pending)).unwrap_or(usize::MAX)
    }

    /// Flush the connection
    pub fn flush(&mut self) {
        if self.state == BatchState::ReadingData {
            self.stream.flush();
        }
    }

    /// Interpreter output is not sent back; the response is canned
    pub fn write(&mut self, _data: &[u8]) -> usize {
        0
    }

    /// Assemble the next line from the body, closing the ack gate on success
    pub fn poll_line(&mut self) -> Option<String> {
        loop {
            match self.step() {
                Step::Byte(byte) => match self.assembler.push(byte) {
                    LineEvent::Line(line) => {
                        self.gate.close();
                        return Some(line);
                    }
                    LineEvent::Overflow(length) => {
                        self.fail(ControllerError::LineOverflow { length });
                        return None;
                    }
                    LineEvent::Pending => {}
                },
                Step::Progress => {}
                Step::Idle => return None,
            }
        }
    }

    /// Drain readable body bytes without line assembly or gating
    pub(crate) fn drain_bytes(&mut self, mut sink: impl FnMut(u8)) {
        loop {
            match self.step() {
                Step::Byte(byte) => sink(byte),
                Step::Progress => {}
                Step::Idle => return,
            }
        }
    }

    /// Report the interpreter's verdict on the last line handed out
    pub fn ack(&mut self, status: AckStatus) {
        if let Err(e) = status {
            self.fail(e);
        }
        if !self.gate.open() {
            tracing::debug!("{}: ack without an outstanding line", self.name);
        }
    }
}
