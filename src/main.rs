use anyhow::Context;
use clap::Parser;
use cncstream::{init_logging, Config, Dispatcher, LogSink, SimulatedMachine, TcpAcceptor};
use std::path::PathBuf;
use std::time::Duration;

/// Serve G-code, realtime, upload, log and status streams over HTTP
#[derive(Debug, Parser)]
#[command(name = "cncstream", version, about)]
struct Args {
    /// Configuration file (.toml or .json); defaults to the platform config directory
    #[arg(short, long)]
    config: Option<PathBuf>,

    /// Override the tick interval in milliseconds
    #[arg(long)]
    tick_ms: Option<u64>,

    /// Print the effective configuration as TOML and exit
    #[arg(long)]
    print_config: bool,
}

#[tokio::main(flavor = "current_thread")]
async fn main() -> anyhow::Result<()> {
    let args = Args::parse();

    let path = match args.config {
        Some(path) => path,
        None => Config::default_path()?,
    };
    let mut config = Config::load_or_default(&path)
        .with_context(|| format!("loading {}", path.display()))?;
    if let Some(tick_ms) = args.tick_ms {
        config.runtime.tick_interval_ms = tick_ms;
    }
    config.validate()?;

    if args.print_config {
        println!("{}", toml::to_string_pretty(&config)?);
        return Ok(());
    }

    let sink = LogSink::new(config.runtime.log_buffer_bytes);
    init_logging(&config.runtime.log_level, Some(sink.clone()))?;

    tracing::info!(
        "cncstream {} (built {})",
        cncstream::VERSION,
        cncstream::BUILD_DATE
    );
    tracing::info!("configuration: {}", path.display());

    let dispatcher = Dispatcher::from_settings(&config.network, |_, _| TcpAcceptor::new())
        .with_log_sink(sink);
    let mut machine = SimulatedMachine::new();

    cncstream::run(
        dispatcher,
        &mut machine,
        Duration::from_millis(config.runtime.tick_interval_ms),
    )
    .await
}
