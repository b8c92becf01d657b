//! TCP transport implementation
//!
//! Wraps `std::net` sockets in non-blocking mode. Inbound bytes are pulled
//! into a bounded receive buffer so `available()` can report a count.

use super::{ByteStream, ConnectionAcceptor};
use cncstream_core::{ConnectionError, Result};
use std::collections::VecDeque;
use std::io::{self, Read, Write};
use std::net::{Shutdown, SocketAddr, TcpListener, TcpStream};

/// Upper bound on bytes held in the receive buffer
const RX_BUFFER_LIMIT: usize = 4096;

/// Socket read chunk size
const READ_CHUNK: usize = 512;

/// A non-blocking accepted TCP connection
#[derive(Debug)]
pub struct TcpByteStream {
    stream: TcpStream,
    peer: Option<SocketAddr>,
    rx: VecDeque<u8>,
    connected: bool,
    closed: bool,
}

impl TcpByteStream {
    /// Wrap a connected stream, switching it to non-blocking mode
    pub fn new(stream: TcpStream) -> io::Result<Self> {
        stream.set_nonblocking(true)?;
        stream.set_nodelay(true)?;
        let peer = stream.peer_addr().ok();
        Ok(Self {
            stream,
            peer,
            rx: VecDeque::new(),
            connected: true,
            closed: false,
        })
    }

    /// Address of the remote peer
    pub fn peer_addr(&self) -> Option<SocketAddr> {
        self.peer
    }

    /// Move whatever the socket has into the receive buffer
    fn pump(&mut self) {
        if !self.connected {
            return;
        }
        let mut chunk = [0u8; READ_CHUNK];
        while self.rx.len() < RX_BUFFER_LIMIT {
            let room = (RX_BUFFER_LIMIT - self.rx.len()).min(READ_CHUNK);
            match self.stream.read(&mut chunk[..room]) {
                Ok(0) => {
                    tracing::debug!("TCP peer {:?} closed the connection", self.peer);
                    self.connected = false;
                    break;
                }
                Ok(n) => self.rx.extend(&chunk[..n]),
                Err(e) if e.kind() == io::ErrorKind::WouldBlock => break,
                Err(e) if e.kind() == io::ErrorKind::Interrupted => continue,
                Err(e) => {
                    tracing::warn!("TCP read from {:?} failed: {}", self.peer, e);
                    self.connected = false;
                    break;
                }
            }
        }
    }
}

impl ByteStream for TcpByteStream {
    fn available(&mut self) -> usize {
        self.pump();
        self.rx.len()
    }

    fn read_byte(&mut self) -> Option<u8> {
        if self.rx.is_empty() {
            self.pump();
        }
        self.rx.pop_front()
    }

    fn read_bytes(&mut self, buf: &mut [u8]) -> usize {
        if self.rx.len() < buf.len() {
            self.pump();
        }
        let count = buf.len().min(self.rx.len());
        for (slot, byte) in buf.iter_mut().zip(self.rx.drain(..count)) {
            *slot = byte;
        }
        count
    }

    fn write(&mut self, data: &[u8]) -> usize {
        if self.closed {
            return 0;
        }
        let mut written = 0;
        while written < data.len() {
            match self.stream.write(&data[written..]) {
                Ok(0) => break,
                Ok(n) => written += n,
                Err(e) if e.kind() == io::ErrorKind::WouldBlock => break,
                Err(e) if e.kind() == io::ErrorKind::Interrupted => continue,
                Err(e) => {
                    tracing::warn!("TCP write to {:?} failed: {}", self.peer, e);
                    self.connected = false;
                    break;
                }
            }
        }
        written
    }

    fn flush(&mut self) {
        if let Err(e) = self.stream.flush() {
            tracing::debug!("TCP flush to {:?} failed: {}", self.peer, e);
        }
    }

    fn connected(&mut self) -> bool {
        self.pump();
        self.connected
    }

    fn shutdown(&mut self) {
        if self.closed {
            return;
        }
        self.closed = true;
        self.connected = false;
        if let Err(e) = self.stream.shutdown(Shutdown::Both) {
            tracing::debug!("TCP shutdown of {:?} failed: {}", self.peer, e);
        }
    }
}

/// Non-blocking TCP listening socket
#[derive(Debug, Default)]
pub struct TcpAcceptor {
    listener: Option<TcpListener>,
    bind_address: Option<String>,
}

impl TcpAcceptor {
    /// Create an acceptor that listens on all interfaces
    pub fn new() -> Self {
        Self::default()
    }

    /// Create an acceptor bound to a specific interface address
    pub fn with_bind_address(address: impl Into<String>) -> Self {
        Self {
            listener: None,
            bind_address: Some(address.into()),
        }
    }

    /// The bound local address while listening
    pub fn local_addr(&self) -> Option<SocketAddr> {
        self.listener.as_ref().and_then(|l| l.local_addr().ok())
    }
}

impl ConnectionAcceptor for TcpAcceptor {
    type Stream = TcpByteStream;

    fn listen(&mut self, port: u16) -> Result<()> {
        let host = self.bind_address.as_deref().unwrap_or("0.0.0.0");
        let listener = TcpListener::bind((host, port)).map_err(|e| ConnectionError::BindFailed {
            port,
            reason: e.to_string(),
        })?;
        listener
            .set_nonblocking(true)
            .map_err(|e| ConnectionError::BindFailed {
                port,
                reason: e.to_string(),
            })?;
        tracing::info!("Listening on {}:{}", host, port);
        self.listener = Some(listener);
        Ok(())
    }

    fn accept(&mut self) -> Option<TcpByteStream> {
        let listener = self.listener.as_ref()?;
        match listener.accept() {
            Ok((stream, addr)) => match TcpByteStream::new(stream) {
                Ok(stream) => {
                    tracing::debug!("Accepted connection from {}", addr);
                    Some(stream)
                }
                Err(e) => {
                    tracing::warn!("Failed to configure connection from {}: {}", addr, e);
                    None
                }
            },
            Err(e) if e.kind() == io::ErrorKind::WouldBlock => None,
            Err(e) => {
                tracing::warn!("Accept failed: {}", e);
                None
            }
        }
    }

    fn close(&mut self) {
        if self.listener.take().is_some() {
            tracing::debug!("Listening socket closed");
        }
    }
}
