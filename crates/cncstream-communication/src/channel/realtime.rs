//! Realtime channel
//!
//! Uses batch framing but never hands out lines: every body byte that is a
//! realtime control code goes straight to the machine, everything else is
//! dropped.

use super::batch::{BatchChannel, BatchState};
use crate::communication::ByteStream;
use cncstream_core::{AckStatus, MachineControl, RealtimeCommand};

/// HTTP channel for out-of-band control codes
#[derive(Debug)]
pub struct RealtimeChannel<S: ByteStream> {
    inner: BatchChannel<S>,
    dispatched: u64,
}

impl<S: ByteStream> RealtimeChannel<S> {
    /// Create a channel for an accepted connection
    pub fn new(name: impl Into<String>, stream: S) -> Self {
        Self {
            inner: BatchChannel::new(name, stream),
            dispatched: 0,
        }
    }

    /// Channel name
    pub fn name(&self) -> &str {
        self.inner.name()
    }

    /// Current framing state
    pub fn state(&self) -> BatchState {
        self.inner.state()
    }

    /// Realtime codes passed to the machine so far
    pub fn dispatched(&self) -> u64 {
        self.dispatched
    }

    /// Never gated
    pub fn need_ack(&self) -> bool {
        false
    }

    /// Whether the connection has been closed
    pub fn is_done(&self) -> bool {
        self.inner.is_done()
    }

    /// Whether the stream ended abnormally
    pub fn is_aborted(&self) -> bool {
        self.inner.is_aborted()
    }

    /// Mark the stream failed and close it
    pub fn abort(&mut self) {
        self.inner.abort();
    }

    /// Advance the outbound side of the state machine
    pub fn handle(&mut self) {
        self.inner.handle();
    }

    /// Read the next raw body byte
    pub fn read(&mut self) -> Option<u8> {
        self.inner.read()
    }

    /// Look at the next raw body byte
    pub fn peek(&mut self) -> Option<u8> {
        self.inner.peek()
    }

    /// Body bytes readable right now
    pub fn available(&mut self) -> usize {
        self.inner.available()
    }

    /// Flush the connection
    pub fn flush(&mut self) {
        self.inner.flush();
    }

    /// Output is discarded
    pub fn write(&mut self, data: &[u8]) -> usize {
        self.inner.write(data)
    }

    /// Dispatch every readable realtime code; never yields a line
    pub fn poll_line(&mut self, machine: &mut dyn MachineControl) -> Option<String> {
        let name = self.inner.name().to_string();
        let mut dispatched = 0;
        self.inner.drain_bytes(|byte| match RealtimeCommand::from_byte(byte) {
            Some(command) => {
                tracing::debug!("{}: realtime {:?}", name, command);
                machine.realtime_command(command);
                dispatched += 1;
            }
            None => tracing::trace!("{}: dropping byte 0x{:02x}", name, byte),
        });
        self.dispatched += dispatched;
        None
    }

    /// Nothing is ever handed out, so an ack is unexpected
    pub fn ack(&mut self, status: AckStatus) {
        tracing::debug!("{}: unexpected ack {:?}", self.inner.name(), status);
    }
}
