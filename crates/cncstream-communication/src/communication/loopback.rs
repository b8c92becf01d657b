//! In-memory loopback transport
//!
//! A `LoopbackAcceptor` queues connections opened through its
//! `LoopbackConnector`. Each connection is a pair: the `LoopbackStream` the
//! server side reads from, and the `LoopbackPeer` the remote side drives.
//! Used by the simulator and by tests to feed bytes in arbitrary chunks.

use super::{ByteStream, ConnectionAcceptor};
use cncstream_core::{ConnectionError, Result};
use parking_lot::Mutex;
use std::collections::VecDeque;
use std::sync::Arc;

#[derive(Debug)]
struct Pipe {
    inbound: VecDeque<u8>,
    outbound: VecDeque<u8>,
    peer_open: bool,
    server_open: bool,
    shutdowns: usize,
    write_limit: Option<usize>,
}

impl Pipe {
    fn new() -> Self {
        Self {
            inbound: VecDeque::new(),
            outbound: VecDeque::new(),
            peer_open: true,
            server_open: true,
            shutdowns: 0,
            write_limit: None,
        }
    }
}

/// Server side of a loopback connection
#[derive(Debug)]
pub struct LoopbackStream {
    pipe: Arc<Mutex<Pipe>>,
}

impl ByteStream for LoopbackStream {
    fn available(&mut self) -> usize {
        self.pipe.lock().inbound.len()
    }

    fn read_byte(&mut self) -> Option<u8> {
        self.pipe.lock().inbound.pop_front()
    }

    fn read_bytes(&mut self, buf: &mut [u8]) -> usize {
        let mut pipe = self.pipe.lock();
        let count = buf.len().min(pipe.inbound.len());
        for (slot, byte) in buf.iter_mut().zip(pipe.inbound.drain(..count)) {
            *slot = byte;
        }
        count
    }

    fn write(&mut self, data: &[u8]) -> usize {
        let mut pipe = self.pipe.lock();
        if !pipe.server_open || !pipe.peer_open {
            return 0;
        }
        let count = pipe.write_limit.map_or(data.len(), |limit| limit.min(data.len()));
        pipe.outbound.extend(&data[..count]);
        count
    }

    fn flush(&mut self) {}

    fn connected(&mut self) -> bool {
        let pipe = self.pipe.lock();
        pipe.peer_open && pipe.server_open
    }

    fn shutdown(&mut self) {
        let mut pipe = self.pipe.lock();
        pipe.server_open = false;
        pipe.shutdowns += 1;
    }
}

/// Remote side of a loopback connection
#[derive(Debug, Clone)]
pub struct LoopbackPeer {
    pipe: Arc<Mutex<Pipe>>,
}

impl LoopbackPeer {
    /// Queue bytes for the server to read
    pub fn send(&self, data: impl AsRef<[u8]>) {
        let mut pipe = self.pipe.lock();
        if pipe.peer_open {
            pipe.inbound.extend(data.as_ref());
        }
    }

    /// Take everything the server has written so far
    pub fn received(&self) -> Vec<u8> {
        self.pipe.lock().outbound.drain(..).collect()
    }

    /// Take everything the server has written so far as text
    pub fn received_string(&self) -> String {
        String::from_utf8_lossy(&self.received()).into_owned()
    }

    /// Bytes sent but not yet read by the server
    pub fn unread(&self) -> usize {
        self.pipe.lock().inbound.len()
    }

    /// Disconnect from the server
    pub fn close(&self) {
        self.pipe.lock().peer_open = false;
    }

    /// Whether the server has shut the connection down
    pub fn is_shut_down(&self) -> bool {
        !self.pipe.lock().server_open
    }

    /// Number of times the server called `shutdown`
    pub fn shutdown_count(&self) -> usize {
        self.pipe.lock().shutdowns
    }

    /// Cap the bytes accepted by each server write
    pub fn set_write_limit(&self, limit: Option<usize>) {
        self.pipe.lock().write_limit = limit;
    }
}

/// Create a connected stream/peer pair outside any acceptor
pub fn pair() -> (LoopbackStream, LoopbackPeer) {
    let pipe = Arc::new(Mutex::new(Pipe::new()));
    (
        LoopbackStream { pipe: pipe.clone() },
        LoopbackPeer { pipe },
    )
}

#[derive(Debug, Default)]
struct Backlog {
    port: Option<u16>,
    pending: VecDeque<LoopbackStream>,
    refuse_bind: bool,
}

/// Listening endpoint for loopback connections
#[derive(Debug, Default)]
pub struct LoopbackAcceptor {
    backlog: Arc<Mutex<Backlog>>,
}

impl LoopbackAcceptor {
    /// Create an acceptor that is not yet listening
    pub fn new() -> Self {
        Self::default()
    }

    /// Create an acceptor whose `listen` always fails
    pub fn refusing() -> Self {
        let acceptor = Self::default();
        acceptor.backlog.lock().refuse_bind = true;
        acceptor
    }

    /// Handle used by the remote side to open connections
    pub fn connector(&self) -> LoopbackConnector {
        LoopbackConnector {
            backlog: self.backlog.clone(),
        }
    }
}

impl ConnectionAcceptor for LoopbackAcceptor {
    type Stream = LoopbackStream;

    fn listen(&mut self, port: u16) -> Result<()> {
        let mut backlog = self.backlog.lock();
        if backlog.refuse_bind {
            return Err(ConnectionError::BindFailed {
                port,
                reason: "address in use".to_string(),
            }
            .into());
        }
        backlog.port = Some(port);
        Ok(())
    }

    fn accept(&mut self) -> Option<LoopbackStream> {
        let mut backlog = self.backlog.lock();
        backlog.port?;
        backlog.pending.pop_front()
    }

    fn close(&mut self) {
        let mut backlog = self.backlog.lock();
        backlog.port = None;
        backlog.pending.clear();
    }
}

/// Opens connections to a `LoopbackAcceptor`
#[derive(Debug, Clone)]
pub struct LoopbackConnector {
    backlog: Arc<Mutex<Backlog>>,
}

impl LoopbackConnector {
    /// Connect, returning `None` when the acceptor is not listening
    pub fn connect(&self) -> Option<LoopbackPeer> {
        let mut backlog = self.backlog.lock();
        backlog.port?;
        let (stream, peer) = pair();
        backlog.pending.push_back(stream);
        Some(peer)
    }

    /// Port the acceptor listens on
    pub fn port(&self) -> Option<u16> {
        self.backlog.lock().port
    }

    /// Connections waiting to be accepted
    pub fn pending(&self) -> usize {
        self.backlog.lock().pending.len()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_pair_transfers_bytes() {
        let (mut stream, peer) = pair();
        peer.send("ab");
        assert_eq!(stream.available(), 2);
        assert_eq!(stream.read_byte(), Some(b'a'));
        assert_eq!(stream.write(b"ok"), 2);
        assert_eq!(peer.received(), b"ok");
        assert_eq!(peer.unread(), 1);
    }

    #[test]
    fn test_close_and_shutdown() {
        let (mut stream, peer) = pair();
        peer.close();
        assert!(!stream.connected());
        assert_eq!(stream.write(b"x"), 0);
        stream.shutdown();
        assert!(peer.is_shut_down());
        assert_eq!(peer.shutdown_count(), 1);
    }

    #[test]
    fn test_connector_requires_listen() {
        let mut acceptor = LoopbackAcceptor::new();
        let connector = acceptor.connector();
        assert!(connector.connect().is_none());
        acceptor.listen(80).unwrap();
        assert!(connector.connect().is_some());
        assert_eq!(connector.pending(), 1);
        assert!(acceptor.accept().is_some());
        assert!(acceptor.accept().is_none());
    }

    #[test]
    fn test_refusing_acceptor() {
        let mut acceptor = LoopbackAcceptor::refusing();
        assert!(acceptor.listen(80).is_err());
    }
}
