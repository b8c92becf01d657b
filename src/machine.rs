//! Simulated machine
//!
//! A minimal G-code interpreter standing in for real motion hardware. Moves
//! complete instantly; the state it keeps is what status clients see.

use crate::service::LineInterpreter;
use cncstream_core::{
    AckStatus, CNCPoint, ControllerError, ControllerState, CoolantState, MachineControl,
    MachineStatusSnapshot, OverrideState, RealtimeCommand, SpindleState, Units,
};

const AXIS_LETTERS: [char; 6] = ['X', 'Y', 'Z', 'A', 'B', 'C'];

/// Grbl "bad number format"
const BAD_NUMBER_FORMAT: u8 = 2;
/// Grbl "unsupported command"
const UNSUPPORTED_COMMAND: u8 = 20;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum DistanceMode {
    Absolute,
    Incremental,
}

/// Simulated motion controller
#[derive(Debug, Clone)]
pub struct SimulatedMachine {
    state: ControllerState,
    position: CNCPoint,
    work_offset: CNCPoint,
    axis_count: u8,
    units: Units,
    distance: DistanceMode,
    feed_rate: f64,
    spindle: SpindleState,
    spindle_speed: f64,
    coolant: CoolantState,
    overrides: OverrideState,
    line_number: u32,
    lines_executed: u64,
    feed_holds: u64,
}

impl Default for SimulatedMachine {
    fn default() -> Self {
        Self::new()
    }
}

impl SimulatedMachine {
    /// Create an idle three-axis machine at the origin
    pub fn new() -> Self {
        Self {
            state: ControllerState::Idle,
            position: CNCPoint::new(),
            work_offset: CNCPoint::new(),
            axis_count: 3,
            units: Units::MM,
            distance: DistanceMode::Absolute,
            feed_rate: 0.0,
            spindle: SpindleState::Disabled,
            spindle_speed: 0.0,
            coolant: CoolantState::default(),
            overrides: OverrideState::default(),
            line_number: 0,
            lines_executed: 0,
            feed_holds: 0,
        }
    }

    /// Set the number of reported axes (1-6)
    pub fn with_axis_count(mut self, count: u8) -> Self {
        self.axis_count = count.clamp(1, 6);
        self
    }

    /// Controller state
    pub fn state(&self) -> ControllerState {
        self.state
    }

    /// Machine position in millimetres
    pub fn position(&self) -> CNCPoint {
        self.position
    }

    /// Active overrides
    pub fn overrides(&self) -> OverrideState {
        self.overrides
    }

    /// Lines accepted so far
    pub fn lines_executed(&self) -> u64 {
        self.lines_executed
    }

    /// Emergency holds requested by aborted streams
    pub fn feed_holds(&self) -> u64 {
        self.feed_holds
    }

    fn reset(&mut self) {
        self.state = ControllerState::Idle;
        self.spindle = SpindleState::Disabled;
        self.spindle_speed = 0.0;
        self.coolant = CoolantState::default();
        self.overrides = OverrideState::default();
        self.feed_rate = 0.0;
    }

    fn move_to(&mut self, words: &[(char, f64)]) {
        for (letter, value) in words {
            let Some(index) = AXIS_LETTERS.iter().position(|a| a == letter) else {
                continue;
            };
            if index >= usize::from(self.axis_count) {
                continue;
            }
            // Rotary axes are in degrees regardless of G20/G21
            let value = if index < 3 {
                Units::convert(*value, self.units, Units::MM)
            } else {
                *value
            };
            if let Some(axis) = self.position.axis_mut(index) {
                match self.distance {
                    DistanceMode::Absolute => *axis = value + self.work_offset.axes()[index],
                    DistanceMode::Incremental => *axis += value,
                }
            }
        }
    }

    fn apply_word(&mut self, letter: char, value: f64) -> AckStatus {
        match (letter, value as u32) {
            ('G', 0) | ('G', 1) | ('G', 4) => Ok(()),
            ('G', 20) => {
                self.units = Units::INCH;
                Ok(())
            }
            ('G', 21) => {
                self.units = Units::MM;
                Ok(())
            }
            ('G', 90) => {
                self.distance = DistanceMode::Absolute;
                Ok(())
            }
            ('G', 91) => {
                self.distance = DistanceMode::Incremental;
                Ok(())
            }
            ('M', 0) | ('M', 1) => {
                self.state = ControllerState::Hold;
                Ok(())
            }
            ('M', 2) | ('M', 30) => {
                self.spindle = SpindleState::Disabled;
                self.coolant = CoolantState::default();
                self.state = ControllerState::Idle;
                Ok(())
            }
            ('M', 3) => {
                self.spindle = SpindleState::Cw;
                Ok(())
            }
            ('M', 4) => {
                self.spindle = SpindleState::Ccw;
                Ok(())
            }
            ('M', 5) => {
                self.spindle = SpindleState::Disabled;
                Ok(())
            }
            ('M', 7) => {
                self.coolant.mist = true;
                Ok(())
            }
            ('M', 8) => {
                self.coolant.flood = true;
                Ok(())
            }
            ('M', 9) => {
                self.coolant = CoolantState::default();
                Ok(())
            }
            ('F', _) => {
                self.feed_rate = Units::convert(value, self.units, Units::MM);
                Ok(())
            }
            ('S', _) => {
                self.spindle_speed = value;
                Ok(())
            }
            ('N', _) => {
                self.line_number = value as u32;
                Ok(())
            }
            (letter, _) if AXIS_LETTERS.contains(&letter) => Ok(()),
            (letter, _) => Err(ControllerError::CommandRejected {
                reason: format!("unsupported word {}{}", letter, value),
            }),
        }
    }
}

/// Split a block into letter/value words, dropping comments
fn parse_words(line: &str) -> Result<Vec<(char, f64)>, ControllerError> {
    let mut code = String::with_capacity(line.len());
    let mut in_paren = false;
    for c in line.chars() {
        match c {
            ';' if !in_paren => break,
            '(' => in_paren = true,
            ')' => in_paren = false,
            c if !in_paren && !c.is_whitespace() => code.push(c.to_ascii_uppercase()),
            _ => {}
        }
    }

    let mut words = Vec::new();
    let mut chars = code.char_indices().peekable();
    while let Some((start, letter)) = chars.next() {
        if !letter.is_ascii_alphabetic() {
            return Err(ControllerError::Code {
                code: UNSUPPORTED_COMMAND,
            });
        }
        let mut end = start + letter.len_utf8();
        while let Some(&(i, c)) = chars.peek() {
            if c.is_ascii_alphabetic() {
                break;
            }
            end = i + c.len_utf8();
            chars.next();
        }
        let number = &code[start + letter.len_utf8()..end];
        let value: f64 = number.parse().map_err(|_| ControllerError::Code {
            code: BAD_NUMBER_FORMAT,
        })?;
        words.push((letter, value));
    }
    Ok(words)
}

impl LineInterpreter for SimulatedMachine {
    fn execute(&mut self, line: &str) -> AckStatus {
        let trimmed = line.trim();
        if trimmed.starts_with('$') {
            tracing::debug!("ignoring setting {}", trimmed);
            self.lines_executed += 1;
            return Ok(());
        }

        let words = parse_words(trimmed)?;
        for (letter, value) in &words {
            self.apply_word(*letter, *value)?;
        }
        self.move_to(&words);
        self.lines_executed += 1;
        Ok(())
    }
}

impl MachineControl for SimulatedMachine {
    fn feed_hold(&mut self) {
        self.feed_holds += 1;
        tracing::warn!("stream aborted, entering feed hold");
        self.state = ControllerState::Hold;
    }

    fn realtime_command(&mut self, command: RealtimeCommand) {
        if self.overrides.apply(command) {
            tracing::debug!("override {:?} -> {:?}", command, self.overrides);
            return;
        }
        match command {
            RealtimeCommand::Reset => self.reset(),
            RealtimeCommand::FeedHold => {
                if matches!(
                    self.state,
                    ControllerState::Idle | ControllerState::Run | ControllerState::Jog
                ) {
                    self.state = ControllerState::Hold;
                }
            }
            RealtimeCommand::CycleStart => {
                if self.state == ControllerState::Hold {
                    self.state = ControllerState::Idle;
                }
            }
            RealtimeCommand::SafetyDoor => self.state = ControllerState::Door,
            RealtimeCommand::JogCancel => {
                if self.state == ControllerState::Jog {
                    self.state = ControllerState::Idle;
                }
            }
            RealtimeCommand::SpindleOvrStop => {
                if self.state == ControllerState::Hold {
                    self.spindle = SpindleState::Disabled;
                }
            }
            RealtimeCommand::CoolantFloodOvrToggle => self.coolant.flood = !self.coolant.flood,
            RealtimeCommand::CoolantMistOvrToggle => self.coolant.mist = !self.coolant.mist,
            RealtimeCommand::StatusReport | RealtimeCommand::DebugReport => {
                tracing::debug!("{:?}", self.status_snapshot());
            }
            _ => {}
        }
    }

    fn status_snapshot(&self) -> MachineStatusSnapshot {
        let speed = match self.spindle {
            SpindleState::Disabled => 0.0,
            _ => self.spindle_speed,
        };
        let mut snapshot = MachineStatusSnapshot::new()
            .with_state(self.state)
            .with_axis_count(self.axis_count)
            .with_machine_position(self.position)
            .with_work_offset(self.work_offset)
            .with_feed_rate(self.feed_rate)
            .with_spindle(self.spindle, speed)
            .with_units(self.units);
        // free memory is left unknown; there is no controller heap to measure
        snapshot.line_number = self.line_number;
        snapshot.coolant = self.coolant;
        snapshot.overrides = self.overrides;
        snapshot
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_linear_moves() {
        let mut machine = SimulatedMachine::new();
        machine.execute("G1 X10 Y-2.5 F600").unwrap();
        assert_eq!(machine.position(), CNCPoint::xyz(10.0, -2.5, 0.0));
        machine.execute("G91").unwrap();
        machine.execute("g0 x1 (relative) z2 ; comment").unwrap();
        assert_eq!(machine.position(), CNCPoint::xyz(11.0, -2.5, 2.0));
        assert_eq!(machine.status_snapshot().feed_rate, 600.0);
        assert_eq!(machine.lines_executed(), 3);
    }

    #[test]
    fn test_inch_moves_are_stored_in_mm() {
        let mut machine = SimulatedMachine::new();
        machine.execute("G20 G0 X1").unwrap();
        assert!((machine.position().x - 25.4).abs() < 1e-9);
        assert_eq!(machine.status_snapshot().units, Units::INCH);
        machine.execute("G21").unwrap();
        assert_eq!(machine.status_snapshot().units, Units::MM);
    }

    #[test]
    fn test_spindle_and_coolant() {
        let mut machine = SimulatedMachine::new();
        machine.execute("M4 S12000").unwrap();
        machine.execute("M8").unwrap();
        let snapshot = machine.status_snapshot();
        assert_eq!(snapshot.signed_spindle_speed(), Some(-12000.0));
        assert!(snapshot.coolant.flood);
        machine.execute("M5 M9").unwrap();
        let snapshot = machine.status_snapshot();
        assert_eq!(snapshot.spindle, SpindleState::Disabled);
        assert!(!snapshot.coolant.flood);
    }

    #[test]
    fn test_rejections() {
        let mut machine = SimulatedMachine::new();
        assert!(matches!(
            machine.execute("G0 Xabc"),
            Err(ControllerError::Code { code: 2 })
        ));
        assert!(matches!(
            machine.execute("T1"),
            Err(ControllerError::CommandRejected { .. })
        ));
        assert!(machine.execute("$H").is_ok());
        assert!(machine.execute("").is_ok());
    }

    #[test]
    fn test_realtime_hold_and_resume() {
        let mut machine = SimulatedMachine::new();
        machine.realtime_command(RealtimeCommand::FeedHold);
        assert_eq!(machine.state(), ControllerState::Hold);
        machine.realtime_command(RealtimeCommand::CycleStart);
        assert_eq!(machine.state(), ControllerState::Idle);

        machine.realtime_command(RealtimeCommand::FeedOvrCoarsePlus);
        assert_eq!(machine.overrides().feed, 110);
        machine.realtime_command(RealtimeCommand::Reset);
        assert_eq!(machine.overrides().feed, 100);
    }

    #[test]
    fn test_feed_hold_from_aborted_stream() {
        let mut machine = SimulatedMachine::new();
        machine.feed_hold();
        assert_eq!(machine.state(), ControllerState::Hold);
        assert_eq!(machine.feed_holds(), 1);
    }
}
