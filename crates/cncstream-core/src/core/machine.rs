//! Machine control interface
//!
//! The streaming subsystem's only coupling into machine motion state.

use super::realtime::RealtimeCommand;
use crate::data::MachineStatusSnapshot;

/// Collaborator that owns machine motion state.
///
/// Implemented by the command interpreter side. Channels and listeners call
/// it from the cooperative tick, so implementations must return promptly.
pub trait MachineControl {
    /// Enter an emergency feed hold. Called when a stream aborts.
    fn feed_hold(&mut self);

    /// Act on a realtime control code received out of band
    fn realtime_command(&mut self, command: RealtimeCommand);

    /// Current machine status for status reports
    fn status_snapshot(&self) -> MachineStatusSnapshot;
}
