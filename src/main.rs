use std::path::PathBuf;

use anyhow::Context;
use clap::{Parser, Subcommand};
use sqlx::postgres::PgPoolOptions;
use tracing_subscriber::{fmt, EnvFilter};
use uuid::Uuid;

mod analysis;
mod config;
mod dashboard;
mod db;
mod error;
mod models;
mod monitoring;
mod report;
mod routes;
mod server;
mod storage;
mod validate;

use models::SessionKind;

#[derive(Parser)]
#[command(name = "brainhealth-admin")]
#[command(about = "Admin backend for a senior cognitive/physical training program", long_about = None)]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Create or upgrade the database schema
    InitDb,
    /// Load realistic seed data
    Seed,
    /// Run the HTTP API
    Serve {
        #[arg(long)]
        port: Option<u16>,
    },
    /// Print the seniors currently needing attention
    Monitor {
        #[arg(long, default_value_t = 20)]
        limit: usize,
    },
    /// Import session results from a CSV file
    Import {
        #[arg(long)]
        csv: PathBuf,
    },
    /// Run the analysis pipeline for one session and write the text report
    Report {
        #[arg(long)]
        session_id: Uuid,
        #[arg(long)]
        kind: String,
        #[arg(long, default_value = "report.txt")]
        out: PathBuf,
    },
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    fmt().with_env_filter(EnvFilter::from_default_env()).init();

    let cli = Cli::parse();
    let database_url = std::env::var("DATABASE_URL")
        .context("DATABASE_URL must be set to a production Postgres instance")?;

    let pool = PgPoolOptions::new()
        .max_connections(5)
        .connect(&database_url)
        .await
        .context("failed to connect to Postgres")?;

    match cli.command {
        Commands::InitDb => {
            db::init_db(&pool).await?;
            println!("Schema ready.");
        }
        Commands::Seed => {
            db::seed(&pool).await?;
            println!("Seed data inserted.");
        }
        Commands::Serve { port } => {
            let mut config = config::Config::from_env()?;
            if let Some(port) = port {
                config.port = port;
            }
            server::serve(pool, config).await?;
        }
        Commands::Monitor { limit } => {
            let now = chrono::Utc::now();
            let window = monitoring::week_window(now);
            let roster = db::fetch_active_roster(&pool).await?;
            let week_events = db::fetch_results_between(&pool, window.start, window.end).await?;
            let last_sessions = db::fetch_last_sessions(&pool).await?;
            let snapshot = monitoring::assemble(now, &roster, &week_events, &last_sessions);

            if snapshot.entries.is_empty() {
                println!("No seniors need attention this week.");
            } else {
                println!("Seniors needing attention:");
                for entry in snapshot.entries.iter().take(limit) {
                    println!(
                        "- {} [{}] {}/{} sessions this week, {} missed, last session {} days ago",
                        entry.senior_name,
                        entry.priority.as_str(),
                        entry.completed_this_week,
                        entry.expected_this_week,
                        entry.missed_sessions,
                        entry.days_since_last
                    );
                }
            }
            println!(
                "Active seniors: {}, flagged: {}, missed sessions: {}, avg completion {}%",
                snapshot.stats.total_active_seniors,
                snapshot.stats.seniors_with_missed_sessions,
                snapshot.stats.total_missed_sessions,
                snapshot.stats.avg_completion_rate
            );
        }
        Commands::Import { csv } => {
            let inserted = db::import_csv(&pool, &csv).await?;
            println!("Inserted {inserted} session results from {}.", csv.display());
        }
        Commands::Report { session_id, kind, out } => {
            let kind: SessionKind = kind.parse()?;
            let session = db::fetch_session(&pool, kind, session_id)
                .await?
                .context("session not found")?;

            let config = config::Config::from_env()?;
            let client = reqwest::Client::new();
            let analysis = analysis::analyze_session(
                &client,
                config.gemini_api_key.as_deref(),
                kind,
                &session.video_key,
                &session.raw,
            )
            .await;

            let rendered = report::render_report(
                &analysis,
                &session.senior_name,
                &session.created_at.format("%Y-%m-%d").to_string(),
                chrono::Utc::now(),
            );
            std::fs::write(&out, rendered)?;
            println!("Report written to {}.", out.display());
        }
    }

    Ok(())
}
