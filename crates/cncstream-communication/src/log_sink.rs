//! Log forwarding buffer
//!
//! `LogSink` collects formatted log output between ticks so the dispatcher
//! can push it to connected log channels. It is a `tracing_subscriber`
//! writer, so a fmt layer can write into it directly.

use parking_lot::Mutex;
use std::collections::VecDeque;
use std::io;
use std::sync::Arc;
use tracing_subscriber::fmt::MakeWriter;

/// Bounded, shareable byte buffer for log output
///
/// When full, the oldest bytes are dropped.
#[derive(Debug, Clone)]
pub struct LogSink {
    buffer: Arc<Mutex<VecDeque<u8>>>,
    capacity: usize,
}

impl LogSink {
    /// Create a sink holding at most `capacity` bytes
    pub fn new(capacity: usize) -> Self {
        Self {
            buffer: Arc::new(Mutex::new(VecDeque::with_capacity(capacity.min(64 * 1024)))),
            capacity: capacity.max(1),
        }
    }

    /// Append bytes, evicting the oldest ones beyond capacity
    pub fn push(&self, data: &[u8]) {
        let mut buffer = self.buffer.lock();
        let data = if data.len() > self.capacity {
            &data[data.len() - self.capacity..]
        } else {
            data
        };
        let overflow = (buffer.len() + data.len()).saturating_sub(self.capacity);
        buffer.drain(..overflow);
        buffer.extend(data);
    }

    /// Take all buffered bytes
    pub fn drain(&self) -> Vec<u8> {
        self.buffer.lock().drain(..).collect()
    }

    /// Number of buffered bytes
    pub fn len(&self) -> usize {
        self.buffer.lock().len()
    }

    /// Check if nothing is buffered
    pub fn is_empty(&self) -> bool {
        self.buffer.lock().is_empty()
    }
}

impl io::Write for LogSink {
    fn write(&mut self, buf: &[u8]) -> io::Result<usize> {
        self.push(buf);
        Ok(buf.len())
    }

    fn flush(&mut self) -> io::Result<()> {
        Ok(())
    }
}

impl<'a> MakeWriter<'a> for LogSink {
    type Writer = LogSink;

    fn make_writer(&'a self) -> Self::Writer {
        self.clone()
    }
}
