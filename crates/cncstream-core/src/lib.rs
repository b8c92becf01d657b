//! # cncstream Core
//!
//! Core types, traits, and utilities for cncstream.
//! Provides the machine-control collaborator interface, realtime control
//! codes, status data models and the error types shared by all crates.

pub mod core;
pub mod data;
pub mod error;

pub use self::core::{MachineControl, OverrideState, RapidOverrideLevel, RealtimeCommand};

pub use data::{CNCPoint, ControllerState, CoolantState, MachineStatusSnapshot, SpindleState, Units};

pub use error::{AckStatus, ConnectionError, ControllerError, Error, Result, StorageError};
