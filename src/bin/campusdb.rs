use campusdb::cli::{self, Command, OutputMode};
use campusdb::config::{Overrides, load_config};
use clap::{Parser, Subcommand};
use std::path::PathBuf;
use std::process::ExitCode;

#[derive(Parser, Debug)]
#[command(name = "campusdb", version, about = "Campus site document store and REST API", long_about = None)]
struct Cli {
    /// Path to a config file (TOML)
    #[arg(long, help = "Path to a config file (TOML). Defaults to ./campusdb.toml when present.")]
    config: Option<PathBuf>,
    /// Override DB path (takes precedence over config)
    #[arg(long, help = "Override the store path. Takes precedence over config/env.")]
    db: Option<PathBuf>,
    /// Machine-readable output
    #[arg(long, global = true)]
    json: bool,
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand, Debug)]
enum Commands {
    #[command(about = "Serve the REST API")]
    Serve {
        #[arg(long, help = "Listen address, e.g. 0.0.0.0:8080")]
        bind: Option<String>,
    },
    #[command(about = "List the tables the API serves")]
    Tables,
    #[command(about = "List collections in the store with record counts")]
    Collections,
    #[command(name = "check-config", about = "Validate and print the effective configuration")]
    CheckConfig,
}

#[tokio::main]
async fn main() -> ExitCode {
    let args = Cli::parse();
    let (command, bind) = match args.command {
        Commands::Serve { bind } => (Command::Serve, bind),
        Commands::Tables => (Command::Tables, None),
        Commands::Collections => (Command::Collections, None),
        Commands::CheckConfig => (Command::CheckConfig, None),
    };
    let overrides = Overrides { config: args.config, db: args.db, bind };
    let cfg = match load_config(&overrides) {
        Ok(cfg) => cfg,
        Err(e) => {
            eprintln!("campusdb: {e}");
            return ExitCode::FAILURE;
        }
    };
    if command == Command::Serve
        && let Err(e) = cli::init_logging(&cfg.logging)
    {
        eprintln!("campusdb: logging disabled: {e}");
    }
    let mode = if args.json { OutputMode::Json } else { OutputMode::Human };
    match cli::run(cfg, command, mode).await {
        Ok(()) => ExitCode::SUCCESS,
        Err(e) => {
            log::error!("{e}");
            eprintln!("campusdb: {e}");
            ExitCode::FAILURE
        }
    }
}
