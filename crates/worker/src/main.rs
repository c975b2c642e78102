use anyhow::Context;
use clap::Parser;
use std::sync::Arc;
use stockcast_core::error::ForecastError;
use stockcast_core::llm::gemini::GeminiClient;
use stockcast_core::pipeline::{normalize_ticker, ForecastPipeline};
use stockcast_core::scrape::screener::ScreenerClient;
use stockcast_core::scrape::SectionSource;
use stockcast_core::storage::predictions::PgPredictionStore;
use tracing_subscriber::EnvFilter;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

#[derive(Debug, Parser)]
#[command(name = "stockcast_worker")]
struct Args {
    /// Tickers to generate forecasts for (e.g. TCS INFY).
    #[arg(required = true)]
    codes: Vec<String>,

    /// Only fetch and extract the page sections; no model call, no database.
    #[arg(long)]
    dry_run: bool,
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    dotenvy::dotenv().ok();

    let settings = stockcast_core::config::Settings::from_env()?;
    let _sentry_guard = init_sentry(&settings);

    tracing_subscriber::registry()
        .with(EnvFilter::from_default_env())
        .with(tracing_subscriber::fmt::layer())
        .with(sentry_tracing::layer())
        .init();

    let args = Args::parse();
    let source = ScreenerClient::from_settings(&settings)?;

    if args.dry_run {
        for code in &args.codes {
            let code = normalize_ticker(code)?;
            match source.extract(&code).await {
                Ok(sections) => {
                    for (label, text) in sections.labeled() {
                        tracing::info!(%code, section = label, len = text.len(), "section");
                    }
                }
                Err(err) => tracing::error!(%code, kind = err.kind(), error = %err, "extract failed"),
            }
        }
        return Ok(());
    }

    let db_url = settings.require_database_url()?;
    let pool = sqlx::postgres::PgPoolOptions::new()
        .max_connections(5)
        .connect(db_url)
        .await
        .context("connect DATABASE_URL failed")?;

    stockcast_core::storage::migrate(&pool).await?;

    let model = GeminiClient::from_settings(&settings)?;
    let pipeline = ForecastPipeline::new(
        Arc::new(source),
        Arc::new(model),
        Arc::new(PgPredictionStore::new(pool)),
        settings.freshness_window(),
    );

    let mut failures = 0usize;
    for code in &args.codes {
        match pipeline.generate(code).await {
            Ok(record) => {
                tracing::info!(
                    code = %record.stock_code(),
                    record_id = %record.id,
                    created_at = %record.created_at,
                    signal = %record.forecast.signal,
                    "forecast ready"
                );
            }
            Err(err) => {
                failures += 1;
                if let ForecastError::GenerationFailure(diag) = &err {
                    tracing::error!(
                        %code,
                        stage = diag.stage,
                        raw_output = diag.raw_output.as_deref().unwrap_or(""),
                        "generation diagnostics"
                    );
                }
                let err = anyhow::Error::new(err).context(format!("generate failed for {code}"));
                sentry_anyhow::capture_anyhow(&err);
                tracing::error!(%code, error = %format!("{err:#}"), "forecast failed");
            }
        }
    }

    anyhow::ensure!(
        failures == 0,
        "{failures} of {} tickers failed",
        args.codes.len()
    );
    Ok(())
}

fn init_sentry(settings: &stockcast_core::config::Settings) -> Option<sentry::ClientInitGuard> {
    let dsn = settings.sentry_dsn.as_deref()?;
    Some(sentry::init((
        dsn,
        sentry::ClientOptions {
            release: sentry::release_name!(),
            ..Default::default()
        },
    )))
}
