//! # cncstream Communication
//!
//! Network streaming for cncstream: non-blocking HTTP channels that feed
//! G-code lines, realtime codes and uploads into the machine, the
//! listeners that own their connections, and the dispatcher that ticks
//! everything from one cooperative loop.
//! Supports TCP sockets and in-memory loopback transports.

pub mod channel;
pub mod communication;
pub mod log_sink;
pub mod server;
pub mod storage;

pub use channel::{
    BatchChannel, BatchState, Channel, LineChannel, LogChannel, RealtimeChannel, StatusChannel,
    StreamState, UploadChannel, UploadState,
};
pub use communication::{
    loopback::{LoopbackAcceptor, LoopbackConnector, LoopbackPeer, LoopbackStream},
    tcp::{TcpAcceptor, TcpByteStream},
    ByteStream, ConnectionAcceptor,
};
pub use log_sink::LogSink;
pub use server::{ChannelId, Dispatcher, Listener, ListenerState, Protocol};
pub use storage::{LocalStorage, Storage};
