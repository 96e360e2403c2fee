//! rvc-console: live RV-C CAN bus monitor and light controller.
//!
//! Loads the message spec and device mapping, opens one reader thread per
//! configured CAN interface, then hands control to the terminal UI until
//! the user quits.

use std::path::PathBuf;
use std::sync::Arc;

use anyhow::{Context, Result};
use clap::Parser;

mod clipboard;
mod command;
mod engine;
mod error;
mod logging;
mod reader;
mod tui;

use engine::Engine;
use error::ConsoleError;
use logging::ConsoleLogSink;
use rvc_decoder::{MappingTables, SpecRegistry};

/// Live RV-C CAN bus monitor and light controller
#[derive(Parser, Debug)]
#[command(name = "rvc-console")]
#[command(about = "Monitor and control an RV-C CAN network from a terminal UI", long_about = None)]
#[command(version)]
struct Args {
    /// CAN interfaces to open
    #[arg(long, value_name = "IFACE", num_args = 1.., default_values = ["can0", "can1"])]
    interfaces: Vec<String>,

    /// Path to the RV-C message spec (JSON)
    #[arg(long, value_name = "FILE", default_value = "/etc/nixos/files/rvc.json")]
    definitions: PathBuf,

    /// Path to the device mapping document (YAML)
    #[arg(long, value_name = "FILE", default_value = "/etc/nixos/files/device_mapping.yaml")]
    mapping: PathBuf,

    /// Verbosity level (repeatable: -v, -vv, -vvv)
    #[arg(short, long, action = clap::ArgAction::Count)]
    verbose: u8,

    /// Suppress all output except errors
    #[arg(short, long)]
    quiet: bool,
}

fn main() -> Result<()> {
    let args = Args::parse();
    init_logging(args.verbose, args.quiet);

    log::info!("rvc-console v{}", env!("CARGO_PKG_VERSION"));
    log::info!("using rvc-decoder v{}", rvc_decoder::VERSION);

    let registry = SpecRegistry::load(&args.definitions)
        .map_err(|source| ConsoleError::SpecLoad { path: args.definitions.clone(), source })
        .context("cannot start without a message spec")?;
    log::info!("loaded {} message definitions", registry.len());

    let mapping = MappingTables::load(&args.mapping);

    let engine = Arc::new(Engine::new(registry, mapping));

    let mut readers = Vec::new();
    for interface in &args.interfaces {
        let engine = engine.clone();
        let interface = interface.clone();
        readers.push(std::thread::spawn(move || reader::run(engine, interface)));
    }

    let log_sink = Arc::new(ConsoleLogSink::default());
    install_console_sink(log_sink.clone());

    let result = tui::run(engine.clone(), log_sink, args.interfaces.clone()).map_err(ConsoleError::from);

    engine.stop.store(true, std::sync::atomic::Ordering::Relaxed);
    for handle in readers {
        let _ = handle.join();
    }

    result.context("terminal UI exited with an error")
}

/// Swap the process-wide logger for the bounded in-memory sink the TUI
/// reads from. There is exactly one global logger per process, so this
/// permanently retires the `env_logger` stderr sink installed by
/// `init_logging` — nothing else may write to stdout/stderr afterward
/// without corrupting the screen.
fn install_console_sink(sink: Arc<ConsoleLogSink>) {
    log::set_max_level(log::LevelFilter::Trace);
    if log::set_boxed_logger(Box::new(ArcLogger(sink))).is_err() {
        log::warn!("console log sink was not installed; a logger was already set");
    }
}

struct ArcLogger(Arc<ConsoleLogSink>);

impl log::Log for ArcLogger {
    fn enabled(&self, metadata: &log::Metadata) -> bool {
        self.0.enabled(metadata)
    }

    fn log(&self, record: &log::Record) {
        self.0.log(record)
    }

    fn flush(&self) {
        self.0.flush()
    }
}

/// Pre-TUI logging: plain `env_logger` on stderr, matching the teacher's
/// `can-log-cli::init_logging`.
fn init_logging(verbose: u8, quiet: bool) {
    use env_logger::Builder;
    use log::LevelFilter;
    use std::io::Write;

    let level = if quiet {
        LevelFilter::Error
    } else {
        match verbose {
            0 => LevelFilter::Info,
            1 => LevelFilter::Debug,
            _ => LevelFilter::Trace,
        }
    };

    Builder::new()
        .filter_level(level)
        .format(|buf, record| {
            writeln!(buf, "[{} {}] {}", record.level(), record.target(), record.args())
        })
        .init();
}
