//! Streaming channels
//!
//! A channel turns one accepted connection into a source of command lines
//! (batch), realtime codes (realtime), a stored file (upload) or a sink for
//! outbound text (log, status). All channels are ticked from the same
//! cooperative loop and never block.

pub mod ack_gate;
pub mod batch;
pub mod framing;
pub mod line;
pub mod log;
pub mod realtime;
pub mod status;
pub mod upload;

pub use ack_gate::AckGate;
pub use batch::{BatchChannel, BatchState};
pub use line::{LineAssembler, LineEvent, MAX_LINE_LENGTH};
pub use log::{LogChannel, StreamState};
pub use realtime::RealtimeChannel;
pub use status::{format_status_report, StatusChannel};
pub use upload::{UploadChannel, UploadState};

use crate::communication::ByteStream;
use crate::storage::{LocalStorage, Storage};
use cncstream_core::{AckStatus, MachineControl};

/// Capability shared by every channel
pub trait LineChannel {
    /// Channel name, used in logs
    fn name(&self) -> &str;

    /// Next inbound byte, `None` when nothing can be read right now
    fn read(&mut self) -> Option<u8>;

    /// Next inbound byte without consuming it
    fn peek(&mut self) -> Option<u8>;

    /// Inbound bytes readable right now
    fn available(&mut self) -> usize;

    /// Push buffered output
    fn flush(&mut self);

    /// Send interpreter output; returns the bytes consumed
    fn write(&mut self, data: &[u8]) -> usize;

    /// Assemble the next command line, if one is complete
    fn poll_line(&mut self, machine: &mut dyn MachineControl) -> Option<String>;

    /// Report the outcome of the last line handed out
    fn ack(&mut self, status: AckStatus);

    /// Whether a handed-out line still awaits its ack
    fn need_ack(&self) -> bool;

    /// Advance the channel's state machine
    fn handle(&mut self, machine: &mut dyn MachineControl);

    /// Whether the connection has been released
    fn is_done(&self) -> bool;

    /// Whether the stream ended abnormally
    fn is_aborted(&self) -> bool;

    /// Mark the stream failed and release it
    fn abort(&mut self);
}

/// A channel of any protocol
#[derive(Debug)]
pub enum Channel<S: ByteStream, F: Storage = LocalStorage> {
    /// G-code over repeated POST requests
    Batch(BatchChannel<S>),
    /// Realtime control codes
    Realtime(RealtimeChannel<S>),
    /// File upload
    Upload(UploadChannel<S, F>),
    /// Log output
    Log(LogChannel<S>),
    /// Status snapshots
    Status(StatusChannel<S>),
}

macro_rules! each_channel {
    ($self:expr, $channel:ident => $body:expr) => {
        match $self {
            Channel::Batch($channel) => $body,
            Channel::Realtime($channel) => $body,
            Channel::Upload($channel) => $body,
            Channel::Log($channel) => $body,
            Channel::Status($channel) => $body,
        }
    };
}

impl<S: ByteStream, F: Storage> Channel<S, F> {
    /// Protocol name of the variant
    pub fn kind(&self) -> &'static str {
        match self {
            Channel::Batch(_) => "batch",
            Channel::Realtime(_) => "realtime",
            Channel::Upload(_) => "upload",
            Channel::Log(_) => "log",
            Channel::Status(_) => "status",
        }
    }

    /// Whether the channel forwards log output
    pub fn is_log(&self) -> bool {
        matches!(self, Channel::Log(_))
    }
}

impl<S: ByteStream, F: Storage> LineChannel for Channel<S, F> {
    fn name(&self) -> &str {
        each_channel!(self, c => c.name())
    }

    fn read(&mut self) -> Option<u8> {
        each_channel!(self, c => c.read())
    }

    fn peek(&mut self) -> Option<u8> {
        each_channel!(self, c => c.peek())
    }

    fn available(&mut self) -> usize {
        each_channel!(self, c => c.available())
    }

    fn flush(&mut self) {
        each_channel!(self, c => c.flush())
    }

    fn write(&mut self, data: &[u8]) -> usize {
        each_channel!(self, c => c.write(data))
    }

    fn poll_line(&mut self, machine: &mut dyn MachineControl) -> Option<String> {
        match self {
            Channel::Batch(c) => c.poll_line(),
            Channel::Realtime(c) => c.poll_line(machine),
            Channel::Upload(c) => c.poll_line(),
            Channel::Log(c) => c.poll_line(),
            Channel::Status(c) => c.poll_line(),
        }
    }

    fn ack(&mut self, status: AckStatus) {
        each_channel!(self, c => c.ack(status))
    }

    fn need_ack(&self) -> bool {
        each_channel!(self, c => c.need_ack())
    }

    fn handle(&mut self, machine: &mut dyn MachineControl) {
        match self {
            Channel::Batch(c) => c.handle(),
            Channel::Realtime(c) => c.handle(),
            Channel::Upload(c) => c.handle(),
            Channel::Log(c) => c.handle(),
            Channel::Status(c) => c.handle(machine),
        }
    }

    fn is_done(&self) -> bool {
        each_channel!(self, c => c.is_done())
    }

    fn is_aborted(&self) -> bool {
        each_channel!(self, c => c.is_aborted())
    }

    fn abort(&mut self) {
        each_channel!(self, c => c.abort())
    }
}
