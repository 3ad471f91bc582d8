use clap::{Parser, Subcommand};
use sea_orm_migration::MigratorTrait;
use tracing::info;

use erp_api::{config, db, migrator::Migrator};

/// Applies or rolls back the database schema.
#[derive(Debug, Parser)]
#[command(name = "migration", version, about = "ERP API schema migrations")]
struct Cli {
    /// Overrides the configured database URL
    #[arg(long)]
    database_url: Option<String>,

    #[command(subcommand)]
    command: Option<MigrationCommand>,
}

#[derive(Debug, Subcommand)]
enum MigrationCommand {
    /// Apply pending migrations (default)
    Up {
        /// Apply at most this many
        #[arg(short, long)]
        steps: Option<u32>,
    },
    /// Roll back applied migrations
    Down {
        /// Roll back this many (default 1)
        #[arg(short, long, default_value_t = 1)]
        steps: u32,
    },
    /// Show applied and pending migrations
    Status,
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    tracing_subscriber::fmt()
        .with_max_level(tracing::Level::INFO)
        .init();

    let cli = Cli::parse();
    let database_url = match cli.database_url.or_else(|| std::env::var("DATABASE_URL").ok()) {
        Some(url) => url,
        None => config::load_config()?.database_url,
    };

    info!("Connecting to database");
    let pool = db::establish_connection(&database_url).await?;

    match cli.command.unwrap_or(MigrationCommand::Up { steps: None }) {
        MigrationCommand::Up { steps } => {
            Migrator::up(&pool, steps).await?;
            info!("Migrations applied");
        }
        MigrationCommand::Down { steps } => {
            Migrator::down(&pool, Some(steps)).await?;
            info!(steps, "Migrations rolled back");
        }
        MigrationCommand::Status => {
            Migrator::status(&pool).await?;
        }
    }

    Ok(())
}
