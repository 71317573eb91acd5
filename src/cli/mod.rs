pub mod run;
pub mod status;

use std::path::PathBuf;

use anyhow::Result;
use clap::{Parser, Subcommand};
use run::{process_run_command, RunCommand};
use status::{process_status_command, StatusCommand};
use tracing::level_filters::LevelFilter;

use crate::{
    config::TrackerConfig,
    utils::{
        dir::create_application_default_path,
        logging::{enable_logging, CLI_PREFIX, RUN_PREFIX},
    },
};

#[derive(Parser, Debug)]
#[command(name = "sessionclock", version, long_about = None)]
#[command(about = "Tracks active session time and keeps daily totals across crashes", long_about = None)]
struct Args {
    #[command(subcommand)]
    commands: Commands,
    #[arg(
        long,
        global = true,
        help = "Application directory for checkpoints, config and logs. By default $XDG_STATE_HOME/sessionclock or $HOME/.local/state/sessionclock"
    )]
    dir: Option<PathBuf>,
    #[arg(long, global = true, help = "Enable trace logging and echo logs to the console")]
    log: bool,
    #[arg(long = "log-filter", global = true, help = "Log level, overrides RUST_LOG")]
    log_filter: Option<LevelFilter>,
}

#[derive(Subcommand, Debug)]
enum Commands {
    #[command(about = "Track a session until interrupted, then commit it")]
    Run {
        #[command(flatten)]
        command: RunCommand,
    },
    #[command(about = "Show accumulated time and the daily ledger")]
    Status {
        #[command(flatten)]
        command: StatusCommand,
    },
}

pub async fn run_cli() -> Result<()> {
    let args = Args::parse();

    let app_dir = match args.dir {
        Some(dir) => {
            std::fs::create_dir_all(&dir)?;
            dir
        }
        None => create_application_default_path()?,
    };

    let prefix = match args.commands {
        Commands::Run { .. } => RUN_PREFIX,
        Commands::Status { .. } => CLI_PREFIX,
    };
    let logging_level = args
        .log_filter
        .or(args.log.then_some(LevelFilter::TRACE));
    enable_logging(prefix, &app_dir, logging_level, args.log)?;

    let config = TrackerConfig::load(&app_dir)?;

    match args.commands {
        Commands::Run { command } => process_run_command(command, config, &app_dir).await,
        Commands::Status { command } => process_status_command(command, config, &app_dir).await,
    }
}
