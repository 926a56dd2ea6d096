use anyhow::Context;
use clap::{Parser, Subcommand};
use std::sync::Arc;
use tracing_subscriber::EnvFilter;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

use stockscope_core::analyzer::Analyzer;
use stockscope_core::storage::PgSnapshotProvider;
use stockscope_core::verdict::{VerdictEngine, VerdictInput};

#[derive(Debug, Parser)]
#[command(name = "stockscope_worker")]
struct Args {
    #[command(subcommand)]
    command: Command,
}

#[derive(Debug, Subcommand)]
enum Command {
    /// Rating distribution over the stored universe, plus how often the approximate
    /// risk/upside rating agrees with the full verdict.
    Stats,

    /// Evaluate one verdict from raw metrics and print it as JSON.
    Evaluate {
        #[arg(long, allow_hyphen_values = true)]
        risk: f64,
        #[arg(long, default_value_t = 0.0, allow_hyphen_values = true)]
        upside: f64,
        #[arg(long, allow_hyphen_values = true)]
        downside: Option<f64>,
        #[arg(long)]
        consensus: Option<String>,
        #[arg(long)]
        overall_score: Option<f64>,
        #[arg(long, allow_hyphen_values = true)]
        pe_ratio: Option<f64>,
    },
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    dotenvy::dotenv().ok();

    let settings = stockscope_core::config::Settings::from_env()?;
    let _sentry_guard = init_sentry(&settings);

    tracing_subscriber::registry()
        .with(EnvFilter::from_default_env())
        .with(tracing_subscriber::fmt::layer())
        .with(sentry_tracing::layer())
        .init();

    let args = Args::parse();
    let engine = VerdictEngine::default();

    match args.command {
        Command::Evaluate {
            risk,
            upside,
            downside,
            consensus,
            overall_score,
            pe_ratio,
        } => {
            let input = VerdictInput {
                risk,
                upside,
                downside,
                consensus,
                overall_score,
                pe_ratio,
            };
            let result = engine.evaluate(&input);
            println!("{}", serde_json::to_string_pretty(&result)?);
        }
        Command::Stats => {
            if let Err(err) = run_stats(&settings, engine).await {
                sentry_anyhow::capture_anyhow(&err);
                tracing::error!(error = %format!("{err:#}"), "stats run failed");
                return Err(err);
            }
        }
    }

    Ok(())
}

async fn run_stats(
    settings: &stockscope_core::config::Settings,
    engine: VerdictEngine,
) -> anyhow::Result<()> {
    let db_url = settings.require_database_url()?;

    let pool = sqlx::postgres::PgPoolOptions::new()
        .max_connections(5)
        .connect(db_url)
        .await
        .context("connect DATABASE_URL failed")?;

    stockscope_core::storage::migrate(&pool).await?;

    let weights_version = engine.weights().version;
    let analyzer = Analyzer::new(
        Arc::new(PgSnapshotProvider::new(pool)),
        engine,
        std::time::Duration::ZERO,
    );

    let distribution = analyzer.rating_distribution().await?;
    let drift = analyzer.approximation_drift().await?;

    tracing::info!(
        weights_version,
        total = distribution.total,
        unavailable = distribution.unavailable,
        compared = drift.compared,
        agreed = drift.agreed,
        "rating distribution computed"
    );

    println!(
        "{}",
        serde_json::to_string_pretty(&serde_json::json!({
            "weightsVersion": weights_version,
            "distribution": distribution,
            "approximationDrift": drift,
        }))?
    );
    Ok(())
}

fn init_sentry(settings: &stockscope_core::config::Settings) -> Option<sentry::ClientInitGuard> {
    let dsn = settings.sentry_dsn.as_deref()?;
    Some(sentry::init((
        dsn,
        sentry::ClientOptions {
            release: sentry::release_name!(),
            ..Default::default()
        },
    )))
}
