//! Listener dispatcher
//!
//! Owns every configured listener, ticks them, and hands out command lines
//! from their channels round-robin.

use super::listener::{Listener, ListenerState, Protocol};
use crate::communication::ConnectionAcceptor;
use crate::log_sink::LogSink;
use crate::storage::LocalStorage;
use cncstream_core::{AckStatus, MachineControl};
use cncstream_settings::NetworkSettings;
use std::fmt;

/// Identifies the connection a line came from
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct ChannelId {
    /// Index of the listener in the dispatcher
    pub listener: usize,
    /// Connection serial within that listener
    pub connection: u64,
}

impl fmt::Display for ChannelId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}#{}", self.listener, self.connection)
    }
}

/// Collection of listeners driven from one cooperative loop
#[derive(Debug)]
pub struct Dispatcher<A: ConnectionAcceptor> {
    listeners: Vec<Listener<A>>,
    cursor: usize,
    log_sink: Option<LogSink>,
}

impl<A: ConnectionAcceptor> Default for Dispatcher<A> {
    fn default() -> Self {
        Self::new()
    }
}

impl<A: ConnectionAcceptor> Dispatcher<A> {
    /// Create a dispatcher without listeners
    pub fn new() -> Self {
        Self {
            listeners: Vec::new(),
            cursor: 0,
            log_sink: None,
        }
    }

    /// Build one listener per enabled server section.
    ///
    /// `make_acceptor` receives the section name and port.
    pub fn from_settings(
        settings: &NetworkSettings,
        mut make_acceptor: impl FnMut(&str, u16) -> A,
    ) -> Self {
        let mut dispatcher = Self::new();
        let mut add = |name: &str, protocol: Protocol, port: u16| {
            if port == 0 {
                tracing::debug!("{} disabled", name);
                return;
            }
            let acceptor = make_acceptor(name, port);
            dispatcher.add_listener(Listener::new(name, protocol, port, acceptor));
        };

        if let Some(server) = &settings.http_batch_server {
            add("http_batch_server", Protocol::Batch, server.port);
        }
        if let Some(server) = &settings.http_log_server {
            add("http_log_server", Protocol::Log, server.port);
        }
        if let Some(server) = &settings.http_realtime_server {
            add("http_realtime_server", Protocol::Realtime, server.port);
        }
        if let Some(server) = &settings.http_status_server {
            add(
                "http_status_server",
                Protocol::Status {
                    report_period_ms: server.report_period_ms,
                },
                server.port,
            );
        }
        for (name, upload) in [
            ("http_sd_upload_server", &settings.http_sd_upload_server),
            ("http_localfs_upload_server", &settings.http_localfs_upload_server),
        ] {
            if let Some(upload) = upload {
                let storage = LocalStorage::new(&upload.root).with_quota(upload.quota_bytes);
                add(name, Protocol::Upload { storage }, upload.port);
            }
        }

        dispatcher
    }

    /// Forward buffered log output to log channels every tick
    pub fn with_log_sink(mut self, sink: LogSink) -> Self {
        self.log_sink = Some(sink);
        self
    }

    /// Append a listener
    pub fn add_listener(&mut self, listener: Listener<A>) {
        self.listeners.push(listener);
    }

    /// All listeners, in dispatch order
    pub fn listeners(&self) -> &[Listener<A>] {
        &self.listeners
    }

    /// Find a listener by name
    pub fn listener(&self, name: &str) -> Option<&Listener<A>> {
        self.listeners.iter().find(|l| l.name() == name)
    }

    /// Start every listener; returns how many are listening
    pub fn init(&mut self) -> usize {
        let started = self
            .listeners
            .iter_mut()
            .map(|listener| listener.begin())
            .filter(|ok| *ok)
            .count();
        tracing::info!(
            "{} of {} network servers started",
            started,
            self.listeners.len()
        );
        started
    }

    /// Tick every listener, then forward pending log output
    pub fn handle(&mut self, machine: &mut dyn MachineControl) {
        for listener in &mut self.listeners {
            listener.handle(machine);
        }
        if let Some(sink) = &self.log_sink {
            if !sink.is_empty() {
                let output = sink.drain();
                self.write_log(&output);
            }
        }
    }

    /// Next command line from any channel, polled round-robin
    pub fn poll_line(&mut self, machine: &mut dyn MachineControl) -> Option<(ChannelId, String)> {
        let count = self.listeners.len();
        for offset in 0..count {
            let index = (self.cursor + offset) % count;
            let listener = &mut self.listeners[index];
            if let Some(line) = listener.poll_line(machine) {
                self.cursor = (index + 1) % count;
                let id = ChannelId {
                    listener: index,
                    connection: listener.serial(),
                };
                return Some((id, line));
            }
        }
        None
    }

    /// Deliver the interpreter's verdict for a line; stale ids are ignored
    pub fn ack(&mut self, id: ChannelId, status: AckStatus) -> bool {
        match self.listeners.get_mut(id.listener) {
            Some(listener) => listener.ack(id.connection, status),
            None => {
                tracing::debug!("ack for unknown channel {}", id);
                false
            }
        }
    }

    /// Send output to every connected log channel
    pub fn write_log(&mut self, data: &[u8]) {
        if data.is_empty() {
            return;
        }
        for listener in &mut self.listeners {
            listener.write_log(data);
        }
    }

    /// Number of listeners currently serving a connection
    pub fn active_connections(&self) -> usize {
        self.listeners
            .iter()
            .filter(|l| l.state() == ListenerState::Active)
            .count()
    }

    /// Stop every listener
    pub fn stop(&mut self) {
        for listener in &mut self.listeners {
            listener.stop();
        }
    }
}
