//! Upload channel
//!
//! Receives one HTTP request and stores its body as a file. The target of
//! the request line names the destination, relative to the storage root.

use super::framing::{HeaderBlock, Scratch, UPLOAD_RESPONSE};
use crate::communication::ByteStream;
use crate::storage::{LocalStorage, Storage};
use cncstream_core::{AckStatus, StorageError};
use std::fmt;
use std::io::Write;
use std::path::{Path, PathBuf};

/// Upload channel states
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum UploadState {
    /// Scanning the request header block
    ReadingPostHeader,
    /// Resolving the destination and checking free space
    OpeningFile,
    /// Copying body bytes into the file
    ReadingData,
    /// Flushing and closing the file
    ClosingFile,
    /// Sending the response
    WritingPostHeader,
    /// Releasing the connection
    Finishing,
    /// Connection closed
    Finished,
}

impl fmt::Display for UploadState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Self::ReadingPostHeader => "READING_POST_HEADER",
            Self::OpeningFile => "OPENING_FILE",
            Self::ReadingData => "READING_DATA",
            Self::ClosingFile => "CLOSING_FILE",
            Self::WritingPostHeader => "WRITING_POST_HEADER",
            Self::Finishing => "FINISHING",
            Self::Finished => "FINISHED",
        };
        f.write_str(name)
    }
}

/// HTTP upload channel
pub struct UploadChannel<S: ByteStream, F: Storage = LocalStorage> {
    name: String,
    stream: S,
    storage: F,
    state: UploadState,
    scratch: Scratch,
    header: HeaderBlock,
    path: Option<String>,
    destination: Option<PathBuf>,
    file: Option<F::Writer>,
    content_size: u64,
    content_read: u64,
    aborted: bool,
}

impl<S: ByteStream + fmt::Debug, F: Storage + fmt::Debug> fmt::Debug for UploadChannel<S, F> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("UploadChannel")
            .field("name", &self.name)
            .field("stream", &self.stream)
            .field("storage", &self.storage)
            .field("state", &self.state)
            .field("destination", &self.destination)
            .field("content_size", &self.content_size)
            .field("content_read", &self.content_read)
            .field("aborted", &self.aborted)
            .finish()
    }
}

impl<S: ByteStream, F: Storage> UploadChannel<S, F> {
    /// Create a channel for an accepted connection
    pub fn new(name: impl Into<String>, stream: S, storage: F) -> Self {
        Self {
            name: name.into(),
            stream,
            storage,
            state: UploadState::ReadingPostHeader,
            scratch: Scratch::new(),
            header: HeaderBlock::new(),
            path: None,
            destination: None,
            file: None,
            content_size: 0,
            content_read: 0,
            aborted: false,
        }
    }

    /// Channel name
    pub fn name(&self) -> &str {
        &self.name
    }

    /// Current state
    pub fn state(&self) -> UploadState {
        self.state
    }

    /// Path requested by the client
    pub fn requested_path(&self) -> Option<&str> {
        self.path.as_deref()
    }

    /// Resolved destination once the file has been opened
    pub fn destination(&self) -> Option<&Path> {
        self.destination.as_deref()
    }

    /// Declared body length
    pub fn content_size(&self) -> u64 {
        self.content_size
    }

    /// Body bytes stored so far
    pub fn content_read(&self) -> u64 {
        self.content_read
    }

    /// Uploads are never gated
    pub fn need_ack(&self) -> bool {
        false
    }

    /// Whether the connection has been closed
    pub fn is_done(&self) -> bool {
        self.state == UploadState::Finished
    }

    /// Whether the upload failed
    pub fn is_aborted(&self) -> bool {
        self.aborted
    }

    fn set_state(&mut self, state: UploadState) {
        if self.state != state {
            tracing::debug!("{}: {} -> {}", self.name, self.state, state);
            self.state = state;
        }
    }

    /// Stop and release the connection
    pub fn done(&mut self) {
        if self.state != UploadState::Finished {
            self.set_state(UploadState::Finishing);
        }
    }

    /// Mark the upload failed; a partial file is left in place
    pub fn abort(&mut self) {
        if !self.aborted {
            tracing::warn!("{}: aborting upload", self.name);
        }
        self.aborted = true;
        self.done();
    }

    /// Run the state machine until it needs more input
    pub fn handle(&mut self) {
        loop {
            let before = self.state;
            self.step();
            if self.state == before || self.state == UploadState::Finished {
                return;
            }
        }
    }

    fn step(&mut self) {
        match self.state {
            UploadState::ReadingPostHeader => self.read_header(),
            UploadState::OpeningFile => self.open_file(),
            UploadState::ReadingData => self.read_data(),
            UploadState::ClosingFile => self.close_file(),
            UploadState::WritingPostHeader => {
                let written = self.stream.write(UPLOAD_RESPONSE.as_bytes());
                if written != UPLOAD_RESPONSE.len() {
                    tracing::warn!(
                        "{}: response truncated ({} of {} bytes)",
                        self.name,
                        written,
                        UPLOAD_RESPONSE.len()
                    );
                }
                self.stream.flush();
                self.set_state(UploadState::Finishing);
            }
            UploadState::Finishing => {
                self.file = None;
                self.stream.shutdown();
                tracing::debug!("{}: connection closed", self.name);
                self.set_state(UploadState::Finished);
            }
            UploadState::Finished => {}
        }
    }

    fn read_header(&mut self) {
        loop {
            if self.stream.available() == 0 {
                if !self.stream.connected() {
                    tracing::debug!("{}: peer closed before sending a body", self.name);
                    self.done();
                }
                return;
            }
            let Some((byte, overflowed)) = self.scratch.append_from(&mut self.stream) else {
                return;
            };
            if overflowed {
                self.header.truncate_line();
            }
            if byte != b'\n' {
                continue;
            }
            let complete = self.header.feed_line(self.scratch.line());
            self.scratch.reset();
            if complete {
                self.path = self
                    .header
                    .request()
                    .and_then(|request| request.upload_path())
                    .map(str::to_string);
                self.content_size = self.header.content_length();
                self.set_state(UploadState::OpeningFile);
                return;
            }
        }
    }

    fn open_file(&mut self) {
        let Some(path) = self.path.clone() else {
            tracing::warn!("{}: request line names no file", self.name);
            self.abort();
            return;
        };
        match self.prepare_destination(&path) {
            Ok((destination, file)) => {
                tracing::info!(
                    "{}: receiving {} ({} bytes)",
                    self.name,
                    destination.display(),
                    self.content_size
                );
                self.destination = Some(destination);
                self.file = Some(file);
                self.content_read = 0;
                self.set_state(UploadState::ReadingData);
            }
            Err(e) => {
                tracing::warn!("{}: cannot store '{}': {}", self.name, path, e);
                self.abort();
            }
        }
    }

    fn prepare_destination(&self, path: &str) -> Result<(PathBuf, F::Writer), StorageError> {
        let destination = self.storage.resolve(path)?;
        let available = self.storage.available_space()?;
        if self.content_size > available {
            // Replacing a file frees its space. A file whose size cannot be
            // read earns no credit, so the check can only get stricter.
            let existing = self.storage.existing_size(&destination).unwrap_or(0);
            let available = available.saturating_add(existing);
            if self.content_size > available {
                return Err(StorageError::InsufficientSpace {
                    needed: self.content_size,
                    available,
                });
            }
        }
        let file = self.storage.create(&destination)?;
        Ok((destination, file))
    }

    fn read_data(&mut self) {
        loop {
            let remaining = self.content_size - self.content_read;
            if remaining == 0 {
                tracing::debug!("{}: upload body complete", self.name);
                self.set_state(UploadState::ClosingFile);
                return;
            }
            let limit = usize::try_from(remaining).unwrap_or(usize::MAX);
            let count = self.scratch.refill(&mut self.stream, limit);
            if count == 0 {
                if !self.stream.connected() {
                    tracing::warn!(
                        "{}: peer disconnected with {} bytes outstanding",
                        self.name,
                        remaining
                    );
                    self.abort();
                }
                return;
            }

            let result = match self.file.as_mut() {
                Some(file) => write_chunk(file, self.scratch.pending()),
                None => Err(StorageError::Io(std::io::Error::other("file not open"))),
            };
            if let Err(e) = result {
                tracing::warn!("{}: {}", self.name, e);
                self.abort();
                return;
            }
            self.scratch.reset();
            self.content_read += count as u64;
        }
    }

    fn close_file(&mut self) {
        if let Some(mut file) = self.file.take() {
            if let Err(e) = file.flush() {
                tracing::warn!("{}: closing file failed: {}", self.name, e);
                self.abort();
                return;
            }
        }
        tracing::info!("{}: stored {} bytes", self.name, self.content_read);
        self.set_state(UploadState::WritingPostHeader);
    }

    /// Uploads surface no bytes to the interpreter
    pub fn read(&mut self) -> Option<u8> {
        None
    }

    /// Uploads surface no bytes to the interpreter
    pub fn peek(&mut self) -> Option<u8> {
        None
    }

    /// Uploads surface no bytes to the interpreter
    pub fn available(&mut self) -> usize {
        0
    }

    /// Nothing to flush towards the interpreter
    pub fn flush(&mut self) {}

    /// Output is discarded
    pub fn write(&mut self, _data: &[u8]) -> usize {
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

fn write_chunk<W: Write>(file: &mut W, chunk: &[u8]) -> Result<(), StorageError> {
    let written = file.write(chunk)?;
    if written != chunk.len() {
        return Err(StorageError::ShortWrite {
            written,
            requested: chunk.len(),
        });
    }
    Ok(())
}
