#![allow(dead_code)]

use cncstream_communication::{BatchChannel, ByteStream};
use cncstream_core::{MachineControl, MachineStatusSnapshot, RealtimeCommand};

// Mock machine recording what the streaming layer asks of it
#[derive(Debug, Default)]
pub struct MockMachine {
    pub feed_holds: usize,
    pub realtime: Vec<RealtimeCommand>,
    pub snapshot: MachineStatusSnapshot,
}

impl MockMachine {
    pub fn new() -> Self {
        Self::default()
    }
}

impl MachineControl for MockMachine {
    fn feed_hold(&mut self) {
        self.feed_holds += 1;
    }

    fn realtime_command(&mut self, command: RealtimeCommand) {
        self.realtime.push(command);
    }

    fn status_snapshot(&self) -> MachineStatusSnapshot {
        self.snapshot.clone()
    }
}

pub fn post(body: &str) -> String {
    format!(
        "POST / HTTP/1.1\r\nHost: cnc\r\nContent-Length: {}\r\n\r\n{}",
        body.len(),
        body
    )
}

/// Tick the channel until it hands out a line
pub fn next_line<S: ByteStream>(channel: &mut BatchChannel<S>, ticks: usize) -> Option<String> {
    for _ in 0..ticks {
        channel.handle();
        if let Some(line) = channel.poll_line() {
            return Some(line);
        }
    }
    None
}

/// Tick the channel until it reports done
pub fn run_to_done<S: ByteStream>(channel: &mut BatchChannel<S>, ticks: usize) -> bool {
    for _ in 0..ticks {
        channel.handle();
        channel.poll_line();
        if channel.is_done() {
            return true;
        }
    }
    false
}
