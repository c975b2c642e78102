pub mod predictions;

use crate::domain::forecast::{Forecast, PredictionRecord};
use anyhow::Context;
use chrono::{DateTime, Utc};

pub async fn migrate(pool: &sqlx::PgPool) -> anyhow::Result<()> {
    sqlx::migrate!("./migrations")
        .run(pool)
        .await
        .context("sqlx migrations failed")?;
    Ok(())
}

/// The two durable-store operations the generation pipeline depends on.
/// Records are immutable: there is no update or delete.
#[async_trait::async_trait]
pub trait PredictionStore: Send + Sync {
    /// Most recent record for `stock_code` created at or after `since`.
    async fn find_fresh(
        &self,
        stock_code: &str,
        since: DateTime<Utc>,
    ) -> anyhow::Result<Option<PredictionRecord>>;

    /// Always inserts a new record; duplicates are not collapsed.
    async fn insert(
        &self,
        forecast: &Forecast,
        created_at: DateTime<Utc>,
    ) -> anyhow::Result<PredictionRecord>;
}
