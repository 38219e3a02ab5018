use clap::Parser;
use humantime_serde::re::humantime;
use std::path::PathBuf;
use std::time::Duration;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};

use procmux::app::{handle_fatal_error, initialize_app, AppConfig};
use procmux::{Error, Multiplexer};

/// Run several commands concurrently with labelled, colored output
#[derive(Parser)]
#[command(name = "procmux")]
#[command(version)]
#[command(about = "Run commands side by side with aligned, colored labels", long_about = None)]
struct Cli {
    /// Enable verbose output (-v for debug, -vv for trace, -vvv for all)
    #[arg(short, long, action = clap::ArgAction::Count)]
    verbose: u8,

    /// Path to configuration file
    #[arg(short = 'c', long)]
    config: Option<PathBuf>,

    /// Show partial lines after this much silence (e.g. "500ms", "2s")
    #[arg(long, value_parser = humantime::parse_duration)]
    flush_timeout: Option<Duration>,

    /// Label for the command in the same position (repeatable)
    #[arg(short = 'n', long = "name")]
    names: Vec<String>,

    /// Command lines to run, each as a single argument
    #[arg(required = true)]
    commands: Vec<String>,
}

#[tokio::main]
async fn main() {
    let cli = Cli::parse();
    let verbose = cli.verbose;

    match run(cli).await {
        Ok(code) => std::process::exit(code),
        Err(e) => handle_fatal_error(e, verbose),
    }
}

async fn run(cli: Cli) -> anyhow::Result<i32> {
    let app = AppConfig::new(cli.verbose)
        .with_config_path(cli.config.clone())
        .with_flush_timeout(cli.flush_timeout);
    let mux_config = initialize_app(&app)?;

    if cli.names.len() > cli.commands.len() {
        return Err(Error::Arguments(format!(
            "{} names given for {} commands",
            cli.names.len(),
            cli.commands.len()
        ))
        .into());
    }

    let mux = Multiplexer::start(mux_config);
    let cancel = CancellationToken::new();

    let interrupt = {
        let cancel = cancel.clone();
        tokio::spawn(async move {
            if tokio::signal::ctrl_c().await.is_ok() {
                info!("Interrupted, stopping all commands");
                cancel.cancel();
            }
        })
    };

    let runs = cli.commands.iter().enumerate().map(|(i, line)| {
        let alias = cli.names.get(i).map(String::as_str).unwrap_or("");
        mux.run_command_line(&cancel, alias, line)
    });
    let results = futures::future::join_all(runs).await;
    interrupt.abort();

    let report = mux.shutdown().await;
    if report.write_failures() > 0 {
        warn!("{} output writes failed", report.write_failures());
    }

    let mut failures = 0;
    for (line, result) in cli.commands.iter().zip(results) {
        match result {
            Ok(()) => debug!("'{}' succeeded", line),
            Err(e) => {
                failures += 1;
                eprintln!("procmux: {e}");
            }
        }
    }

    Ok(if failures == 0 { 0 } else { 1 })
}
