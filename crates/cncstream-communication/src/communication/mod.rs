//! Transport layer
//!
//! Non-blocking byte streams and connection acceptors supplied by the
//! platform. Every call returns immediately: missing data is reported as
//! `None` or `0`, never waited for.
//!
//! Implementations:
//! - TCP sockets over `std::net` in non-blocking mode
//! - In-memory loopback pipes for simulation and tests

pub mod loopback;
pub mod tcp;

/// A connected, non-blocking byte stream
pub trait ByteStream {
    /// Number of bytes that can be read without waiting
    fn available(&mut self) -> usize;

    /// Read one byte, `None` when nothing is buffered
    fn read_byte(&mut self) -> Option<u8>;

    /// Read up to `buf.len()` buffered bytes, returning the count read
    fn read_bytes(&mut self, buf: &mut [u8]) -> usize;

    /// Write as much of `data` as the transport accepts right now
    fn write(&mut self, data: &[u8]) -> usize;

    /// Push buffered outbound bytes to the transport
    fn flush(&mut self);

    /// Whether the peer is still connected
    fn connected(&mut self) -> bool;

    /// Close both directions of the connection
    fn shutdown(&mut self);
}

/// A listening endpoint that hands out accepted connections
pub trait ConnectionAcceptor {
    /// The stream type of accepted connections
    type Stream: ByteStream;

    /// Bind and start listening on `port`
    fn listen(&mut self, port: u16) -> cncstream_core::Result<()>;

    /// Take one pending connection, if any
    fn accept(&mut self) -> Option<Self::Stream>;

    /// Stop listening; pending connections are dropped
    fn close(&mut self);
}
