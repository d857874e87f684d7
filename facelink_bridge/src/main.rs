use clap::Parser;
use facelink_bridge::{
    BridgeResult, BridgeRunner, HeartbeatSupervisor, ModuleAdapter, RecordPublisher,
};
use log::{error, info, LevelFilter};
use std::path::PathBuf;
use std::time::Instant;

#[derive(Parser)]
#[command(name = "facelink-bridge")]
#[command(about = "Hosts a tracking module and republishes its frames over shared memory")]
#[command(version)]
struct Cli {
    /// Path to the tracking module library
    module: PathBuf,

    /// Log verbosity: trace, debug, info, warn or error (case-insensitive)
    #[arg(short = 'l', long = "log-level", default_value = "info", value_parser = parse_level)]
    log_level: LevelFilter,
}

fn parse_level(token: &str) -> Result<LevelFilter, String> {
    match token.to_ascii_lowercase().as_str() {
        "trace" => Ok(LevelFilter::Trace),
        "debug" => Ok(LevelFilter::Debug),
        "info" => Ok(LevelFilter::Info),
        "warn" => Ok(LevelFilter::Warn),
        "error" => Ok(LevelFilter::Error),
        other => Err(format!(
            "unknown verbosity '{}' (expected trace|debug|info|warn|error)",
            other
        )),
    }
}

fn run(cli: &Cli) -> BridgeResult<()> {
    let mut supervisor = HeartbeatSupervisor::default();

    let mut adapter = ModuleAdapter::load(&cli.module)?;
    let capabilities = adapter.initialize()?;
    supervisor.bound();

    let publisher = RecordPublisher::open()?;
    supervisor.running(Instant::now());

    info!(
        "bridge running (eye: {}, expression: {})",
        capabilities.eye, capabilities.expression
    );

    BridgeRunner::new(adapter, publisher, supervisor).run();
    Ok(())
}

fn main() {
    let cli = Cli::parse();

    env_logger::Builder::new()
        .filter_level(cli.log_level)
        .format_timestamp_millis()
        .init();

    if let Err(e) = run(&cli) {
        error!("{}", e);
        std::process::exit(e.exit_code());
    }
}
