//! Data models for machine status
//!
//! This module provides:
//! - Axis coordinates with up to 6 axes (X, Y, Z, A, B, C)
//! - Controller state, spindle and coolant state
//! - The machine status snapshot published to status channels

use crate::core::overrides::OverrideState;
use serde::{Deserialize, Serialize};
use std::fmt;

/// Machine coordinate units (millimeters or inches)
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
pub enum Units {
    /// Millimeters (metric)
    #[default]
    MM,
    /// Inches (imperial)
    INCH,
}

impl Units {
    /// Convert a value from one unit to another
    pub fn convert(value: f64, from: Units, to: Units) -> f64 {
        match (from, to) {
            (Units::MM, Units::INCH) => value / 25.4,
            (Units::INCH, Units::MM) => value * 25.4,
            _ => value,
        }
    }
}

impl fmt::Display for Units {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Units::MM => write!(f, "mm"),
            Units::INCH => write!(f, "in"),
        }
    }
}

/// Base CNC point structure representing a 6-axis coordinate
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct CNCPoint {
    /// X-axis position
    pub x: f64,
    /// Y-axis position
    pub y: f64,
    /// Z-axis position
    pub z: f64,
    /// A-axis (4th axis) position
    pub a: f64,
    /// B-axis (5th axis) position
    pub b: f64,
    /// C-axis (6th axis) position
    pub c: f64,
}

impl CNCPoint {
    /// Create a new point with all axes at zero
    pub fn new() -> Self {
        Self::with_axes(0.0, 0.0, 0.0, 0.0, 0.0, 0.0)
    }

    /// Create a point with specified 6-axis coordinates
    pub fn with_axes(x: f64, y: f64, z: f64, a: f64, b: f64, c: f64) -> Self {
        debug_assert!(
            [x, y, z, a, b, c].iter().all(|v| v.is_finite()),
            "CNCPoint axes must be finite: x={x}, y={y}, z={z}, a={a}, b={b}, c={c}"
        );
        Self { x, y, z, a, b, c }
    }

    /// Create a point from X, Y, Z with the rotary axes at zero
    pub fn xyz(x: f64, y: f64, z: f64) -> Self {
        Self::with_axes(x, y, z, 0.0, 0.0, 0.0)
    }

    /// All six axes in X, Y, Z, A, B, C order
    pub fn axes(&self) -> [f64; 6] {
        [self.x, self.y, self.z, self.a, self.b, self.c]
    }

    /// Mutable access to one axis by index (0 = X .. 5 = C)
    pub fn axis_mut(&mut self, index: usize) -> Option<&mut f64> {
        match index {
            0 => Some(&mut self.x),
            1 => Some(&mut self.y),
            2 => Some(&mut self.z),
            3 => Some(&mut self.a),
            4 => Some(&mut self.b),
            5 => Some(&mut self.c),
            _ => None,
        }
    }

    /// Component-wise difference `self - other`
    pub fn minus(&self, other: &CNCPoint) -> CNCPoint {
        let a = self.axes();
        let b = other.axes();
        CNCPoint::with_axes(
            a[0] - b[0],
            a[1] - b[1],
            a[2] - b[2],
            a[3] - b[3],
            a[4] - b[4],
            a[5] - b[5],
        )
    }
}

impl Default for CNCPoint {
    fn default() -> Self {
        Self::new()
    }
}

impl fmt::Display for CNCPoint {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "X:{:.3} Y:{:.3} Z:{:.3} A:{:.3} B:{:.3} C:{:.3}",
            self.x, self.y, self.z, self.a, self.b, self.c
        )
    }
}

/// Machine/Controller state machine states
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
pub enum ControllerState {
    /// Idle and ready for commands
    #[default]
    Idle,
    /// Executing a G-code program
    Run,
    /// Motion paused, awaiting cycle start
    Hold,
    /// Manual jog/movement mode
    Jog,
    /// Machine alarm state (requires manual intervention)
    Alarm,
    /// Check mode (dry-run without machine movement)
    Check,
    /// Safety door interlock triggered
    Door,
    /// Homing cycle in progress
    Home,
    /// Low-power sleep state
    Sleep,
}

impl ControllerState {
    /// Check if this state indicates active motion
    pub fn is_moving(&self) -> bool {
        matches!(
            self,
            ControllerState::Run | ControllerState::Jog | ControllerState::Home
        )
    }
}

impl fmt::Display for ControllerState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Idle => write!(f, "Idle"),
            Self::Run => write!(f, "Run"),
            Self::Hold => write!(f, "Hold"),
            Self::Jog => write!(f, "Jog"),
            Self::Alarm => write!(f, "Alarm"),
            Self::Check => write!(f, "Check"),
            Self::Door => write!(f, "Door"),
            Self::Home => write!(f, "Home"),
            Self::Sleep => write!(f, "Sleep"),
        }
    }
}

/// Spindle direction state
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
pub enum SpindleState {
    /// Spindle stopped
    #[default]
    Disabled,
    /// Clockwise (M3)
    Cw,
    /// Counter-clockwise (M4)
    Ccw,
    /// State cannot be determined
    Unknown,
}

/// Coolant outputs
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
pub struct CoolantState {
    /// Flood coolant (M8)
    pub flood: bool,
    /// Mist coolant (M7)
    pub mist: bool,
}

/// Complete machine state snapshot
///
/// Everything a status channel reports about the machine. Supports builder
/// pattern for flexible construction.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MachineStatusSnapshot {
    /// Current controller state
    pub state: ControllerState,
    /// Current position in machine coordinates (millimetres, degrees for A-C)
    pub machine_position: CNCPoint,
    /// Active work coordinate offset
    pub work_offset: CNCPoint,
    /// Number of configured axes (1-6)
    pub axis_count: u8,
    /// Line number of the block being executed (0 when none)
    pub line_number: u32,
    /// Realtime feed rate (millimetres per minute)
    pub feed_rate: f64,
    /// Spindle direction
    pub spindle: SpindleState,
    /// Spindle speed (RPM)
    pub spindle_speed: f64,
    /// Coolant outputs
    pub coolant: CoolantState,
    /// Feed, rapid and spindle overrides
    pub overrides: OverrideState,
    /// Free memory headroom in bytes, `None` where the platform cannot tell
    pub free_memory: Option<u64>,
    /// Units linear positions and feed rate are reported in
    pub units: Units,
}

impl MachineStatusSnapshot {
    /// Create a new machine status snapshot with default values
    pub fn new() -> Self {
        Self {
            state: ControllerState::Idle,
            machine_position: CNCPoint::new(),
            work_offset: CNCPoint::new(),
            axis_count: 3,
            line_number: 0,
            feed_rate: 0.0,
            spindle: SpindleState::Disabled,
            spindle_speed: 0.0,
            coolant: CoolantState::default(),
            overrides: OverrideState::default(),
            free_memory: None,
            units: Units::MM,
        }
    }

    /// Builder method to set controller state
    pub fn with_state(mut self, state: ControllerState) -> Self {
        self.state = state;
        self
    }

    /// Builder method to set machine position
    pub fn with_machine_position(mut self, position: CNCPoint) -> Self {
        self.machine_position = position;
        self
    }

    /// Builder method to set the work coordinate offset
    pub fn with_work_offset(mut self, offset: CNCPoint) -> Self {
        self.work_offset = offset;
        self
    }

    /// Builder method to set the number of reported axes
    pub fn with_axis_count(mut self, count: u8) -> Self {
        self.axis_count = count.clamp(1, 6);
        self
    }

    /// Builder method to set feed rate
    pub fn with_feed_rate(mut self, rate: f64) -> Self {
        self.feed_rate = rate;
        self
    }

    /// Builder method to set spindle state and speed
    pub fn with_spindle(mut self, spindle: SpindleState, speed: f64) -> Self {
        self.spindle = spindle;
        self.spindle_speed = speed;
        self
    }

    /// Builder method to set free memory
    pub fn with_free_memory(mut self, bytes: u64) -> Self {
        self.free_memory = Some(bytes);
        self
    }

    /// Builder method to set the reporting units
    pub fn with_units(mut self, units: Units) -> Self {
        self.units = units;
        self
    }

    /// Position in work coordinates (machine position minus work offset)
    pub fn work_position(&self) -> CNCPoint {
        self.machine_position.minus(&self.work_offset)
    }

    /// Signed spindle speed: negative for CCW, `None` when unknown
    pub fn signed_spindle_speed(&self) -> Option<f64> {
        match self.spindle {
            SpindleState::Disabled => Some(0.0),
            SpindleState::Cw => Some(self.spindle_speed),
            SpindleState::Ccw => Some(-self.spindle_speed),
            SpindleState::Unknown => None,
        }
    }
}

impl Default for MachineStatusSnapshot {
    fn default() -> Self {
        Self::new()
    }
}
