//! Override state
//!
//! Feed, rapid and spindle override percentages, and the arithmetic the
//! realtime override codes apply to them.

use super::realtime::RealtimeCommand;
use serde::{Deserialize, Serialize};

/// Lowest feed or spindle override percentage
pub const MIN_OVERRIDE: u8 = 10;
/// Highest feed or spindle override percentage
pub const MAX_OVERRIDE: u8 = 200;
/// Step applied by the coarse override codes
pub const COARSE_STEP: u8 = 10;
/// Step applied by the fine override codes
pub const FINE_STEP: u8 = 1;

/// Rapid override levels
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum RapidOverrideLevel {
    /// Extra slow rapid (5%)
    ExtraLow,
    /// Slow rapid (25%)
    Low,
    /// Medium rapid (50%)
    Medium,
    /// Full rapid (100%)
    Full,
}

impl RapidOverrideLevel {
    /// Percentage reported for this level
    pub fn percent(&self) -> u8 {
        match self {
            Self::ExtraLow => 5,
            Self::Low => 25,
            Self::Medium => 50,
            Self::Full => 100,
        }
    }
}

/// Override state
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct OverrideState {
    /// Feed rate override percentage (10-200%)
    pub feed: u8,
    /// Rapid override level
    pub rapid: RapidOverrideLevel,
    /// Spindle override percentage (10-200%)
    pub spindle: u8,
}

impl Default for OverrideState {
    fn default() -> Self {
        Self {
            feed: 100,
            rapid: RapidOverrideLevel::Full,
            spindle: 100,
        }
    }
}

impl OverrideState {
    /// Apply an override code. Returns `true` if the state changed.
    pub fn apply(&mut self, command: RealtimeCommand) -> bool {
        let before = *self;
        match command {
            RealtimeCommand::FeedOvrReset => self.feed = 100,
            RealtimeCommand::FeedOvrCoarsePlus => self.feed = step_up(self.feed, COARSE_STEP),
            RealtimeCommand::FeedOvrCoarseMinus => self.feed = step_down(self.feed, COARSE_STEP),
            RealtimeCommand::FeedOvrFinePlus => self.feed = step_up(self.feed, FINE_STEP),
            RealtimeCommand::FeedOvrFineMinus => self.feed = step_down(self.feed, FINE_STEP),
            RealtimeCommand::RapidOvrReset => self.rapid = RapidOverrideLevel::Full,
            RealtimeCommand::RapidOvrMedium => self.rapid = RapidOverrideLevel::Medium,
            RealtimeCommand::RapidOvrLow => self.rapid = RapidOverrideLevel::Low,
            RealtimeCommand::RapidOvrExtraLow => self.rapid = RapidOverrideLevel::ExtraLow,
            RealtimeCommand::SpindleOvrReset => self.spindle = 100,
            RealtimeCommand::SpindleOvrCoarsePlus => {
                self.spindle = step_up(self.spindle, COARSE_STEP)
            }
            RealtimeCommand::SpindleOvrCoarseMinus => {
                self.spindle = step_down(self.spindle, COARSE_STEP)
            }
            RealtimeCommand::SpindleOvrFinePlus => self.spindle = step_up(self.spindle, FINE_STEP),
            RealtimeCommand::SpindleOvrFineMinus => {
                self.spindle = step_down(self.spindle, FINE_STEP)
            }
            _ => {}
        }
        before != *self
    }

    /// Overrides as reported in status snapshots: feed, rapid, spindle
    pub fn as_percentages(&self) -> [u8; 3] {
        [self.feed, self.rapid.percent(), self.spindle]
    }
}

fn step_up(value: u8, step: u8) -> u8 {
    value.saturating_add(step).clamp(MIN_OVERRIDE, MAX_OVERRIDE)
}

fn step_down(value: u8, step: u8) -> u8 {
    value.saturating_sub(step).clamp(MIN_OVERRIDE, MAX_OVERRIDE)
}
