use std::path::PathBuf;
use std::process::ExitCode;

use clap::Parser;
use tracing_subscriber::EnvFilter;

use biblion::commands::{self, Commands, Requester};
use biblion::output::{ErrorResponse, print_json};
use biblion::{CatalogStore, Config, Error, Role};

/// biblion - library circulation ledger with semantic catalog discovery
#[derive(Parser)]
#[command(version, about, long_about = None)]
struct Cli {
    /// Member ID of the requester
    #[arg(short = 'm', long, global = true, default_value = "0")]
    member: i64,

    /// Role of the requester
    #[arg(short = 'r', long, global = true, value_enum, default_value = "member")]
    role: Role,

    /// Override the database path
    #[arg(long, global = true)]
    db: Option<PathBuf>,

    /// Path to a config file (defaults to the standard location)
    #[arg(short = 'c', long, global = true)]
    config: Option<PathBuf>,

    /// Output results as JSON
    #[arg(long, global = true)]
    json: bool,

    #[command(subcommand)]
    command: Commands,
}

fn main() -> ExitCode {
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("warn")),
        )
        .with_writer(std::io::stderr)
        .init();

    let cli = Cli::parse();

    match run(&cli) {
        Ok(code) => code,
        Err(e) => {
            if cli.json {
                print_json(&ErrorResponse {
                    error: e.to_string(),
                    code: e.code(),
                });
            } else {
                eprintln!("Error: {}", e);
            }
            ExitCode::from(exit_code_for(&e))
        }
    }
}

fn run(cli: &Cli) -> Result<ExitCode, Error> {
    let mut config = match &cli.config {
        Some(path) => Config::load_from(path)?,
        None => Config::load()?,
    };
    if let Some(db) = &cli.db {
        config.database_path = db.clone();
    }
    config.ensure_directories()?;

    let mut store = CatalogStore::open(config)?;
    let requester = Requester {
        member_id: cli.member,
        role: cli.role,
    };
    commands::execute(&cli.command, &mut store, &requester, cli.json)
}

fn exit_code_for(error: &Error) -> u8 {
    match error {
        Error::TitleNotFound(_) | Error::InventoryNotFound(_) | Error::NoActiveLoan { .. } => 2,
        Error::Exhausted(_) | Error::InventoryConflict { .. } => 3,
        Error::Forbidden(_) => 4,
        Error::ServiceUnavailable(_) => 5,
        _ => 1,
    }
}
