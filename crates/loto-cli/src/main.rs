use std::sync::Arc;

use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use loto_config::DbConfig;
use loto_core::{CloseOutcome, DrawnNumbers, LotoService, OpenOutcome};
use loto_db::PgStore;

#[derive(Parser)]
#[command(name = "loto")]
#[command(about = "Loto round administration CLI", long_about = None)]
struct Cli {
    #[command(subcommand)]
    cmd: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Database commands
    Db {
        #[command(subcommand)]
        cmd: DbCmd,
    },

    /// Round lifecycle commands (same rules as the HTTP API)
    Round {
        #[command(subcommand)]
        cmd: RoundCmd,
    },
}

#[derive(Subcommand)]
enum DbCmd {
    Status,

    /// Apply embedded SQL migrations.
    Migrate,
}

#[derive(Subcommand)]
enum RoundCmd {
    /// Open a round (no-op if one is already open)
    Open,

    /// Close the open round (no-op if none is open)
    Close,

    /// Store drawn numbers on the latest round, which must be closed
    Results {
        /// Comma-separated drawn numbers, e.g. 1,2,3,4,5,6
        #[arg(long, value_delimiter = ',', required = true, allow_hyphen_values = true)]
        numbers: Vec<i64>,
    },

    /// Print the ticket-status summary as JSON
    Status,
}

#[tokio::main]
async fn main() -> Result<()> {
    // Silent if the file does not exist.
    let _ = dotenvy::from_filename(".env.local");

    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env().unwrap_or_else(|_| "warn".into()),
        )
        .with_writer(std::io::stderr)
        .init();

    let cli = Cli::parse();

    match cli.cmd {
        Commands::Db { cmd } => {
            let (pool, _cfg) = loto_db::connect_from_env().await?;
            match cmd {
                DbCmd::Status => {
                    let s = loto_db::status(&pool).await?;
                    println!("db_ok={} has_rounds_table={}", s.ok, s.has_rounds_table);
                }
                DbCmd::Migrate => {
                    loto_db::migrate(&pool).await?;
                    println!("migrations_applied=true");
                }
            }
        }

        Commands::Round { cmd } => {
            // Reject a bad draw before touching the database.
            if let RoundCmd::Results { numbers } = &cmd {
                DrawnNumbers::from_list(numbers).context("invalid drawn numbers")?;
            }

            let service = service_from_env().await?;
            match cmd {
                RoundCmd::Open => match service.open_round().await? {
                    OpenOutcome::Opened(id) => println!("round_opened={id}"),
                    OpenOutcome::AlreadyOpen(id) => println!("round_already_open={id}"),
                },
                RoundCmd::Close => match service.close_round().await? {
                    CloseOutcome::Closed(id) => println!("round_closed={id}"),
                    CloseOutcome::NothingOpen => println!("no_open_round=true"),
                },
                RoundCmd::Results { numbers } => {
                    let id = service.store_results(&numbers).await?;
                    println!("results_stored={id}");
                }
                RoundCmd::Status => {
                    let st = service.ticket_status().await?;
                    println!("{}", serde_json::to_string_pretty(&st)?);
                }
            }
        }
    }

    Ok(())
}

async fn service_from_env() -> Result<LotoService> {
    let cfg = DbConfig::from_env()?;
    let pool = loto_db::connect(&cfg).await?;
    if cfg.auto_migrate {
        loto_db::migrate(&pool).await?;
    }
    let store = Arc::new(PgStore::from_config(pool, &cfg));
    // Lookup URLs are never printed here.
    Ok(LotoService::new(store, ""))
}
