//! Realtime control codes
//!
//! Single-byte commands that bypass the line queue and act on the machine
//! immediately (hold, resume, reset, overrides).

/// Real-time commands understood by the controller
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
#[repr(u8)]
pub enum RealtimeCommand {
    /// Soft reset
    Reset = 0x18,
    /// Request status report
    StatusReport = b'?',
    /// Cycle start/resume
    CycleStart = b'~',
    /// Feed hold (pause)
    FeedHold = b'!',
    /// Safety door opened
    SafetyDoor = 0x84,
    /// Cancel the active jog
    JogCancel = 0x85,
    /// Emit a debug report
    DebugReport = 0x86,
    /// Feed override back to 100%
    FeedOvrReset = 0x90,
    /// Feed override +10%
    FeedOvrCoarsePlus = 0x91,
    /// Feed override -10%
    FeedOvrCoarseMinus = 0x92,
    /// Feed override +1%
    FeedOvrFinePlus = 0x93,
    /// Feed override -1%
    FeedOvrFineMinus = 0x94,
    /// Rapid override back to 100%
    RapidOvrReset = 0x95,
    /// Rapid override 50%
    RapidOvrMedium = 0x96,
    /// Rapid override 25%
    RapidOvrLow = 0x97,
    /// Rapid override 5%
    RapidOvrExtraLow = 0x98,
    /// Spindle override back to 100%
    SpindleOvrReset = 0x99,
    /// Spindle override +10%
    SpindleOvrCoarsePlus = 0x9A,
    /// Spindle override -10%
    SpindleOvrCoarseMinus = 0x9B,
    /// Spindle override +1%
    SpindleOvrFinePlus = 0x9C,
    /// Spindle override -1%
    SpindleOvrFineMinus = 0x9D,
    /// Stop the spindle while in hold
    SpindleOvrStop = 0x9E,
    /// Toggle flood coolant
    CoolantFloodOvrToggle = 0xA0,
    /// Toggle mist coolant
    CoolantMistOvrToggle = 0xA1,
}

impl RealtimeCommand {
    /// Classify a byte, returning `None` for ordinary line data
    pub fn from_byte(byte: u8) -> Option<Self> {
        use RealtimeCommand::*;
        let command = match byte {
            0x18 => Reset,
            b'?' => StatusReport,
            b'~' => CycleStart,
            b'!' => FeedHold,
            0x84 => SafetyDoor,
            0x85 => JogCancel,
            0x86 => DebugReport,
            0x90 => FeedOvrReset,
            0x91 => FeedOvrCoarsePlus,
            0x92 => FeedOvrCoarseMinus,
            0x93 => FeedOvrFinePlus,
            0x94 => FeedOvrFineMinus,
            0x95 => RapidOvrReset,
            0x96 => RapidOvrMedium,
            0x97 => RapidOvrLow,
            0x98 => RapidOvrExtraLow,
            0x99 => SpindleOvrReset,
            0x9A => SpindleOvrCoarsePlus,
            0x9B => SpindleOvrCoarseMinus,
            0x9C => SpindleOvrFinePlus,
            0x9D => SpindleOvrFineMinus,
            0x9E => SpindleOvrStop,
            0xA0 => CoolantFloodOvrToggle,
            0xA1 => CoolantMistOvrToggle,
            _ => return None,
        };
        Some(command)
    }

    /// Get the byte representation
    pub fn as_byte(&self) -> u8 {
        *self as u8
    }

    /// Check whether the byte is a realtime control code
    pub fn is_realtime(byte: u8) -> bool {
        Self::from_byte(byte).is_some()
    }

    /// Check whether this code adjusts a feed, rapid or spindle override
    pub fn is_override(&self) -> bool {
        (0x90..=0x9D).contains(&self.as_byte())
    }
}
