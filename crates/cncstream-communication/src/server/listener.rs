//! Per-protocol listener
//!
//! Owns a listening socket and at most one live channel. While a channel is
//! active, further connections wait in the transport's backlog.

use crate::channel::{
    BatchChannel, Channel, LineChannel, LogChannel, RealtimeChannel, StatusChannel, UploadChannel,
};
use crate::communication::{ByteStream, ConnectionAcceptor};
use crate::storage::{LocalStorage, Storage};
use cncstream_core::{AckStatus, MachineControl};
use std::fmt;

/// The protocol a listener serves
#[derive(Debug, Clone)]
pub enum Protocol<F: Storage + Clone = LocalStorage> {
    /// G-code over repeated POST requests
    Batch,
    /// Realtime control codes
    Realtime,
    /// File upload into `storage`
    Upload {
        /// Where uploads are stored
        storage: F,
    },
    /// Log output
    Log,
    /// Status snapshots every `report_period_ms`
    Status {
        /// Interval between snapshots in milliseconds
        report_period_ms: u32,
    },
}

impl<F: Storage + Clone> Protocol<F> {
    fn open<S: ByteStream>(&self, name: &str, stream: S) -> Channel<S, F> {
        match self {
            Protocol::Batch => Channel::Batch(BatchChannel::new(name, stream)),
            Protocol::Realtime => Channel::Realtime(RealtimeChannel::new(name, stream)),
            Protocol::Upload { storage } => {
                Channel::Upload(UploadChannel::new(name, stream, storage.clone()))
            }
            Protocol::Log => Channel::Log(LogChannel::new(name, stream)),
            Protocol::Status { report_period_ms } => {
                Channel::Status(StatusChannel::new(name, stream, *report_period_ms))
            }
        }
    }
}

/// Listener lifecycle
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ListenerState {
    /// Not yet listening
    Unstarted,
    /// Listening, no connection
    Idle,
    /// Serving one connection
    Active,
    /// Closed for good
    Stopped,
}

impl fmt::Display for ListenerState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            Self::Unstarted => "UNSTARTED",
            Self::Idle => "IDLE",
            Self::Active => "ACTIVE",
            Self::Stopped => "STOPPED",
        })
    }
}

/// Connection-lifecycle manager for one protocol
pub struct Listener<A: ConnectionAcceptor, F: Storage + Clone = LocalStorage> {
    name: String,
    protocol: Protocol<F>,
    port: u16,
    state: ListenerState,
    acceptor: A,
    channel: Option<Channel<A::Stream, F>>,
    serial: u64,
    aborts: u64,
}

impl<A: ConnectionAcceptor, F: Storage + Clone> fmt::Debug for Listener<A, F> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Listener")
            .field("name", &self.name)
            .field("port", &self.port)
            .field("state", &self.state)
            .field("serial", &self.serial)
            .field("aborts", &self.aborts)
            .finish()
    }
}

impl<A: ConnectionAcceptor, F: Storage + Clone> Listener<A, F> {
    /// Create an unstarted listener
    pub fn new(name: impl Into<String>, protocol: Protocol<F>, port: u16, acceptor: A) -> Self {
        Self {
            name: name.into(),
            protocol,
            port,
            state: ListenerState::Unstarted,
            acceptor,
            channel: None,
            serial: 0,
            aborts: 0,
        }
    }

    /// Listener name
    pub fn name(&self) -> &str {
        &self.name
    }

    /// Configured port
    pub fn port(&self) -> u16 {
        self.port
    }

    /// Served protocol
    pub fn protocol(&self) -> &Protocol<F> {
        &self.protocol
    }

    /// Lifecycle state
    pub fn state(&self) -> ListenerState {
        self.state
    }

    /// Serial of the current (or last) connection, starting at 1
    pub fn serial(&self) -> u64 {
        self.serial
    }

    /// Connections that ended in an abort
    pub fn aborts(&self) -> u64 {
        self.aborts
    }

    /// The live channel, if any
    pub fn channel(&self) -> Option<&Channel<A::Stream, F>> {
        self.channel.as_ref()
    }

    /// The live channel, if any
    pub fn channel_mut(&mut self) -> Option<&mut Channel<A::Stream, F>> {
        self.channel.as_mut()
    }

    fn set_state(&mut self, state: ListenerState) {
        if self.state != state {
            tracing::debug!("{} listener: {} -> {}", self.name, self.state, state);
            self.state = state;
        }
    }

    /// Start listening; false if already started, unconfigured or the bind fails
    pub fn begin(&mut self) -> bool {
        if self.state != ListenerState::Unstarted || self.port == 0 {
            return false;
        }
        match self.acceptor.listen(self.port) {
            Ok(()) => {
                tracing::info!("{} listening on port {}", self.name, self.port);
                self.set_state(ListenerState::Idle);
                true
            }
            Err(e) => {
                tracing::error!("{} failed to start: {}", self.name, e);
                false
            }
        }
    }

    /// Accept a connection or tick the live channel
    pub fn handle(&mut self, machine: &mut dyn MachineControl) {
        match self.state {
            ListenerState::Unstarted | ListenerState::Stopped => {}
            ListenerState::Idle => {
                if let Some(stream) = self.acceptor.accept() {
                    self.serial += 1;
                    let name = format!("{}#{}", self.name, self.serial);
                    tracing::info!("{}: connection accepted", name);
                    self.channel = Some(self.protocol.open(&name, stream));
                    self.set_state(ListenerState::Active);
                }
            }
            ListenerState::Active => {
                let Some(channel) = self.channel.as_mut() else {
                    self.set_state(ListenerState::Idle);
                    return;
                };
                channel.handle(machine);
                if !channel.is_done() {
                    return;
                }
                let aborted = channel.is_aborted();
                tracing::info!("{}: connection finished", channel.name());
                self.channel = None;
                if aborted {
                    self.aborts += 1;
                    tracing::warn!("{} stream aborted, requesting feed hold", self.name);
                    machine.feed_hold();
                }
                self.set_state(ListenerState::Idle);
            }
        }
    }

    /// Next command line from the live channel
    pub fn poll_line(&mut self, machine: &mut dyn MachineControl) -> Option<String> {
        if self.state != ListenerState::Active {
            return None;
        }
        self.channel.as_mut()?.poll_line(machine)
    }

    /// Route an ack to connection `serial`; false if that connection is gone
    pub fn ack(&mut self, serial: u64, status: AckStatus) -> bool {
        match self.channel.as_mut() {
            Some(channel) if serial == self.serial => {
                channel.ack(status);
                true
            }
            _ => {
                tracing::debug!("{}: dropping ack for closed connection {}", self.name, serial);
                false
            }
        }
    }

    /// Forward output to a live log channel
    pub fn write_log(&mut self, data: &[u8]) {
        if let Some(channel) = self.channel.as_mut().filter(|c| c.is_log()) {
            channel.write(data);
            channel.flush();
        }
    }

    /// Close the socket and abandon any connection
    pub fn stop(&mut self) {
        if self.state == ListenerState::Stopped {
            return;
        }
        if let Some(channel) = self.channel.take() {
            tracing::debug!("{}: abandoning connection", channel.name());
        }
        self.acceptor.close();
        tracing::info!("{} stopped", self.name);
        self.set_state(ListenerState::Stopped);
    }
}
