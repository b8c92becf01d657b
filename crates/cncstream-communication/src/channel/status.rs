//! Status channel
//!
//! Periodically sends a JSON snapshot of the machine to an HTTP client.
//! A snapshot identical to the previous one is not sent again.

use super::log::{drain_inbound, write_stream_header, StreamState};
use crate::communication::ByteStream;
use cncstream_core::{
    AckStatus, CNCPoint, CoolantState, MachineControl, MachineStatusSnapshot, Units,
};
use serde::Serialize;
use std::time::{Duration, Instant};

/// One status snapshot as sent on the wire
#[derive(Debug, Serialize)]
struct StatusReport<'a> {
    state: String,
    machine_position: Vec<f64>,
    work_position: Vec<f64>,
    line: u32,
    rate: i64,
    speed: Option<f64>,
    coolant: &'a CoolantState,
    wco: Vec<f64>,
    fro: [u8; 3],
    ram: Option<u64>,
}

fn round3(value: f64) -> f64 {
    let rounded = (value * 1000.0).round() / 1000.0;
    if rounded == 0.0 {
        0.0
    } else {
        rounded
    }
}

/// Linear axes are converted to `units`; rotary axes stay in degrees
fn axis_values(point: &CNCPoint, axis_count: u8, units: Units) -> Vec<f64> {
    point
        .axes()
        .iter()
        .take(usize::from(axis_count))
        .enumerate()
        .map(|(i, v)| {
            if i < 3 {
                round3(Units::convert(*v, Units::MM, units))
            } else {
                round3(*v)
            }
        })
        .collect()
}

/// Render a snapshot as one JSON line
pub fn format_status_report(snapshot: &MachineStatusSnapshot) -> serde_json::Result<String> {
    let axes = snapshot.axis_count;
    let units = snapshot.units;
    let report = StatusReport {
        state: snapshot.state.to_string(),
        machine_position: axis_values(&snapshot.machine_position, axes, units),
        work_position: axis_values(&snapshot.work_position(), axes, units),
        line: snapshot.line_number,
        rate: Units::convert(snapshot.feed_rate, Units::MM, units) as i64,
        speed: snapshot.signed_spindle_speed().map(round3),
        coolant: &snapshot.coolant,
        wco: axis_values(&snapshot.work_offset, axes, units),
        fro: snapshot.overrides.as_percentages(),
        ram: snapshot.free_memory,
    };
    let mut line = serde_json::to_string(&report)?;
    line.push('\n');
    Ok(line)
}

/// HTTP status streaming channel
#[derive(Debug)]
pub struct StatusChannel<S: ByteStream> {
    name: String,
    stream: S,
    state: StreamState,
    report_period: Duration,
    next_report: Instant,
    last_report: Option<String>,
    reports_sent: u64,
}

impl<S: ByteStream> StatusChannel<S> {
    /// Create a channel for an accepted connection
    pub fn new(name: impl Into<String>, stream: S, report_period_ms: u32) -> Self {
        let report_period = Duration::from_millis(u64::from(report_period_ms));
        Self {
            name: name.into(),
            stream,
            state: StreamState::WritingHeader,
            report_period,
            next_report: Instant::now() + report_period,
            last_report: None,
            reports_sent: 0,
        }
    }

    /// Channel name
    pub fn name(&self) -> &str {
        &self.name
    }

    /// Current state
    pub fn state(&self) -> StreamState {
        self.state
    }

    /// Snapshots transmitted so far
    pub fn reports_sent(&self) -> u64 {
        self.reports_sent
    }

    /// Whether the connection has been closed
    pub fn is_done(&self) -> bool {
        self.state == StreamState::Finished
    }

    /// Status channels never abort
    pub fn is_aborted(&self) -> bool {
        false
    }

    /// Never gated
    pub fn need_ack(&self) -> bool {
        false
    }

    fn set_state(&mut self, state: StreamState) {
        if self.state != state {
            tracing::debug!("{}: {} -> {}", self.name, self.state, state);
            self.state = state;
        }
    }

    /// Close the connection
    pub fn done(&mut self) {
        if self.state != StreamState::Finished {
            self.stream.shutdown();
            self.set_state(StreamState::Finished);
        }
    }

    /// Close the connection
    pub fn abort(&mut self) {
        self.done();
    }

    /// Drain input, send the header, then a snapshot each period
    pub fn handle(&mut self, machine: &dyn MachineControl) {
        if self.state == StreamState::Finished {
            return;
        }
        if drain_inbound(&mut self.stream) {
            tracing::debug!("{}: peer disconnected", self.name);
            self.done();
            return;
        }
        match self.state {
            StreamState::WritingHeader => {
                write_stream_header(&mut self.stream, &self.name);
                self.set_state(StreamState::Logging);
            }
            StreamState::Logging => {
                let now = Instant::now();
                if now >= self.next_report {
                    self.next_report = now + self.report_period;
                    self.report(&machine.status_snapshot());
                }
            }
            StreamState::Finished => {}
        }
    }

    fn report(&mut self, snapshot: &MachineStatusSnapshot) {
        let report = match format_status_report(snapshot) {
            Ok(report) => report,
            Err(e) => {
                tracing::warn!("{}: cannot encode status: {}", self.name, e);
                return;
            }
        };
        if self.last_report.as_deref() == Some(report.as_str()) {
            return;
        }
        let written = self.stream.write(report.as_bytes());
        if written != report.len() {
            tracing::warn!(
                "{}: status report truncated ({} of {} bytes)",
                self.name,
                written,
                report.len()
            );
        }
        self.stream.flush();
        self.reports_sent += 1;
        self.last_report = Some(report);
    }

    /// Forward output while streaming; dropped (but reported consumed) otherwise
    pub fn write(&mut self, data: &[u8]) -> usize {
        if self.state != StreamState::Logging {
            return data.len();
        }
        self.stream.write(data)
    }

    /// Push buffered output
    pub fn flush(&mut self) {
        if self.state == StreamState::Logging {
            self.stream.flush();
        }
    }

    /// Outbound only
    pub fn read(&mut self) -> Option<u8> {
        None
    }

    /// Outbound only
    pub fn peek(&mut self) -> Option<u8> {
        None
    }

    /// Outbound only
    pub fn available(&mut self) -> usize {
        0
    }

    /// Never yields a line
    pub fn poll_line(&mut self) -> Option<String> {
        None
    }

    /// Nothing is ever handed out, so an ack is unexpected
    pub fn ack(&mut self, status: AckStatus) {
        tracing::debug!("{}: unexpected ack {:?}", self.name, status);
    }
}
