use std::env;

use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use diesel::PgConnection;
use diesel::r2d2::{ConnectionManager, Pool};
use diesel_migrations::{EmbeddedMigrations, MigrationHarness, embed_migrations};
use tracing::info;
use tracing_subscriber::EnvFilter;

use myacars::config::Config;
use myacars::web;

// Embed migrations into the binary so deploys are a single artifact
const MIGRATIONS: EmbeddedMigrations = embed_migrations!("migrations");

#[derive(Parser)]
#[command(name = "myacars", about = "smartCARS-compatible flight tracking gateway", version)]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Run the protocol gateway
    Serve {
        /// Interface to bind
        #[arg(long, default_value = "0.0.0.0")]
        interface: String,
        /// Port to listen on
        #[arg(long, default_value_t = 5000)]
        port: u16,
    },
}

#[tokio::main]
async fn main() -> Result<()> {
    dotenvy::dotenv().ok();

    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")),
        )
        .init();

    let cli = Cli::parse();

    match cli.command {
        Commands::Serve { interface, port } => serve(interface, port).await,
    }
}

async fn serve(interface: String, port: u16) -> Result<()> {
    let database_url = env::var("DATABASE_URL").context("DATABASE_URL must be set")?;

    let manager = ConnectionManager::<PgConnection>::new(&database_url);
    let pool = Pool::builder()
        .max_size(10)
        .build(manager)
        .context("Failed to create database connection pool")?;
    info!("Database connection pool created");

    run_migrations(pool.clone()).await?;

    let config = Config::from_env();
    web::start_web_server(interface, port, pool, config).await
}

async fn run_migrations(pool: web::PgPool) -> Result<()> {
    tokio::task::spawn_blocking(move || {
        let mut conn = pool.get()?;

        let applied = conn
            .run_pending_migrations(MIGRATIONS)
            .map_err(|e| anyhow::anyhow!("failed to run migrations: {e}"))?;
        for migration in applied {
            info!("Applied migration {}", migration);
        }

        Ok::<(), anyhow::Error>(())
    })
    .await??;

    Ok(())
}
