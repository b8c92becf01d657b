//! # cncstream
//!
//! Network streaming-command service for CNC motion controllers.
//!
//! ## Architecture
//!
//! cncstream is organized as a workspace with multiple crates:
//!
//! 1. **cncstream-core** - Machine-control interface, realtime codes, status data, errors
//! 2. **cncstream-settings** - Configuration loading and validation
//! 3. **cncstream-communication** - Transports, HTTP channels, listeners, dispatcher
//! 4. **cncstream** - Service binary with a simulated machine
//!
//! ## Features
//!
//! - **Batch streaming**: G-code over repeated HTTP POST requests with ack flow control
//! - **Realtime control**: feed hold, cycle start, reset and overrides out of band
//! - **Uploads**: request bodies stored as files with free-space checks
//! - **Log and status streams**: log output and JSON status snapshots pushed to clients

pub mod machine;
pub mod service;

pub use cncstream_communication as communication;
pub use cncstream_settings as settings;

pub use machine::SimulatedMachine;
pub use service::{run, tick, LineInterpreter};

pub use cncstream_communication::{Dispatcher, LogSink, TcpAcceptor};
pub use cncstream_core::{
    AckStatus, ControllerError, Error, MachineControl, MachineStatusSnapshot, RealtimeCommand,
    Result,
};
pub use cncstream_settings::Config;

/// Library version
pub const VERSION: &str = env!("CARGO_PKG_VERSION");

/// Build date (set at compile time)
pub const BUILD_DATE: &str = env!("BUILD_DATE");

/// Targets whose events are never copied into the log sink. Failed writes
/// towards a log client are reported there, so forwarding them would loop.
const SINK_EXCLUDED_TARGETS: [&str; 2] = [
    "cncstream_communication::channel::log",
    "cncstream_communication::communication::tcp",
];

fn forwarded_to_sink(target: &str) -> bool {
    !SINK_EXCLUDED_TARGETS
        .iter()
        .any(|excluded| target.starts_with(excluded))
}

/// Initialize logging
///
/// Sets up structured logging with:
/// - Console output with pretty formatting
/// - RUST_LOG environment variable support, `default_level` otherwise
/// - A compact copy of every event in `sink`, forwarded to log clients
pub fn init_logging(default_level: &str, sink: Option<LogSink>) -> anyhow::Result<()> {
    use tracing_subscriber::filter::filter_fn;
    use tracing_subscriber::fmt;
    use tracing_subscriber::prelude::*;
    use tracing_subscriber::EnvFilter;

    let env_filter = EnvFilter::try_from_default_env()
        .or_else(|_| EnvFilter::try_new(default_level))
        .unwrap_or_else(|_| EnvFilter::new("info"));

    let fmt_layer = fmt::layer()
        .with_writer(std::io::stdout)
        .with_target(true)
        .with_level(true)
        .with_line_number(true)
        .pretty();

    let sink_layer = sink.map(|sink| {
        fmt::layer()
            .with_writer(sink)
            .with_ansi(false)
            .with_target(false)
            .compact()
            .with_filter(filter_fn(|meta| forwarded_to_sink(meta.target())))
    });

    tracing_subscriber::registry()
        .with(env_filter)
        .with(fmt_layer)
        .with(sink_layer)
        .try_init()?;

    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_transport_and_log_channel_events_stay_out_of_sink() {
        assert!(!forwarded_to_sink("cncstream_communication::channel::log"));
        assert!(!forwarded_to_sink("cncstream_communication::communication::tcp"));
        assert!(forwarded_to_sink("cncstream_communication::server::listener"));
        assert!(forwarded_to_sink("cncstream_communication::channel::batch"));
        assert!(forwarded_to_sink("cncstream::machine"));
    }
}
