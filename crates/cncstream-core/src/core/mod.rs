//! Machine-control collaborator, realtime codes and overrides

pub mod machine;
pub mod overrides;
pub mod realtime;

pub use machine::MachineControl;
pub use overrides::{OverrideState, RapidOverrideLevel};
pub use realtime::RealtimeCommand;
