//! kgraph-memory — service entry point.
//!
//! Startup sequence:
//!   1. Load .env (if present)
//!   2. Init logger at "info"
//!   3. Parse command-line flags
//!   4. Load config
//!   5. Swap in the configured (or flag-raised) log filter
//!   6. Open the memory data root
//!   7. Serve JSON-lines requests on stdin/stdout until EOF or Ctrl-C

use std::path::PathBuf;
use std::sync::Arc;

use tokio::io::BufReader;
use tokio_util::sync::CancellationToken;
use tracing::{info, warn};

use kgraph_memory::{
    adapters::stdio,
    config,
    error::AppError,
    logger::{self, FilterSource},
    memory::GraphMemory,
};

#[tokio::main]
async fn main() {
    if let Err(e) = run().await {
        eprintln!("error: {e}");
        std::process::exit(1);
    }
}

async fn run() -> Result<(), AppError> {
    // .env is optional.
    let _ = dotenvy::dotenv();

    // Bootstrap at "info" before config is available; RUST_LOG still wins.
    let log = logger::init("info", FilterSource::Environment)?;

    let args = parse_cli_args();
    let config_path = args
        .config_path
        .unwrap_or_else(|| PathBuf::from(config::DEFAULT_CONFIG_PATH));
    let config = config::load(&config_path)?;

    match args.log_level {
        Some(level) => log.set_filter(level, FilterSource::Explicit)?,
        None => log.set_filter(&config.log_level, FilterSource::Environment)?,
    }

    info!(
        service = %config.service_name,
        config = %config_path.display(),
        data_dir = %config.memory.data_dir.display(),
        "config loaded"
    );

    let memory = Arc::new(GraphMemory::new(config.memory)?);

    let shutdown = CancellationToken::new();
    {
        let shutdown = shutdown.clone();
        tokio::spawn(async move {
            match tokio::signal::ctrl_c().await {
                Ok(()) => info!("interrupt received"),
                Err(e) => warn!("cannot listen for ctrl-c: {e}"),
            }
            shutdown.cancel();
        });
    }

    stdio::serve(
        memory,
        BufReader::new(tokio::io::stdin()),
        tokio::io::stdout(),
        shutdown,
    )
    .await?;

    Ok(())
}

struct CliArgs {
    log_level: Option<&'static str>,
    config_path: Option<PathBuf>,
}

fn parse_cli_args() -> CliArgs {
    let mut verbosity = 0u8;
    let mut config_path = None;

    let mut iter = std::env::args().skip(1);
    while let Some(arg) = iter.next() {
        match arg.as_str() {
            "-h" | "--help" => {
                println!("Usage: kgraph-memory [OPTIONS]");
                println!();
                println!("Reads one JSON request per line on stdin, writes one response per line on stdout.");
                println!();
                println!("Options:");
                println!("  -h, --help                 Print help");
                println!("  -f, --config <PATH>        Path to configuration file (default: {})", config::DEFAULT_CONFIG_PATH);
                println!("  -v, -vv, -vvv, -vvvv       Increase logging verbosity");
                std::process::exit(0);
            }
            "-f" | "--config" => {
                if let Some(path) = iter.next() {
                    config_path = Some(PathBuf::from(path));
                } else {
                    eprintln!("error: -f/--config requires a path argument");
                    std::process::exit(1);
                }
            }
            "--verbose" => verbosity = verbosity.saturating_add(1),
            a if a.starts_with('-') && a.len() > 1 && a.chars().skip(1).all(|c| c == 'v') => {
                verbosity = verbosity.saturating_add((a.len() - 1) as u8);
            }
            other => eprintln!("warning: ignoring unknown argument '{other}'"),
        }
    }

    //   -v      → warn
    //   -vv     → info
    //   -vvv    → debug
    //   -vvvv+  → trace
    let log_level = match verbosity {
        0 => None,
        1 => Some("warn"),
        2 => Some("info"),
        3 => Some("debug"),
        _ => Some("trace"),
    };

    CliArgs { log_level, config_path }
}
