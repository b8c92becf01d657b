//! Single-slot rendezvous between a channel and the interpreter

/// Flow-control gate for handed-out lines
///
/// Closed when a line is handed to the interpreter, opened by its ack.
/// While closed, the owning channel surfaces no new body bytes.
#[derive(Debug, Default, Clone, Copy, PartialEq, Eq)]
pub struct AckGate {
    pending: bool,
}

impl AckGate {
    /// Create an open gate
    pub fn new() -> Self {
        Self::default()
    }

    /// Whether an ack is outstanding
    pub fn is_pending(&self) -> bool {
        self.pending
    }

    /// Mark a line as handed out; returns false if one already was
    pub fn close(&mut self) -> bool {
        !std::mem::replace(&mut self.pending, true)
    }

    /// Record the ack; returns false if none was outstanding
    pub fn open(&mut self) -> bool {
        std::mem::replace(&mut self.pending, false)
    }
}
