use crate::domain::forecast::{Forecast, PredictionRecord};
use crate::storage::PredictionStore;
use anyhow::Context;
use chrono::{DateTime, Utc};
use uuid::Uuid;

const COLUMNS: &str = "id, stock_code, stock_name, current_price, price_change, price_change_percentage, \
     predicted_price_in_30_days, predicted_price_in_90_days, predicted_price_in_180_days, \
     signal, accuracy, result, created_at";

#[derive(Debug, sqlx::FromRow)]
struct PredictionRow {
    id: Uuid,
    stock_code: String,
    stock_name: String,
    current_price: f64,
    price_change: f64,
    price_change_percentage: f64,
    predicted_price_in_30_days: f64,
    predicted_price_in_90_days: f64,
    predicted_price_in_180_days: f64,
    signal: String,
    accuracy: i32,
    result: String,
    created_at: DateTime<Utc>,
}

impl From<PredictionRow> for PredictionRecord {
    fn from(row: PredictionRow) -> Self {
        PredictionRecord {
            id: row.id,
            forecast: Forecast {
                stock_code: row.stock_code,
                stock_name: row.stock_name,
                current_price: row.current_price,
                price_change: row.price_change,
                price_change_percentage: row.price_change_percentage,
                predicted_price_in_30_days: row.predicted_price_in_30_days,
                predicted_price_in_90_days: row.predicted_price_in_90_days,
                predicted_price_in_180_days: row.predicted_price_in_180_days,
                signal: row.signal,
                accuracy: row.accuracy,
                result: row.result,
            },
            created_at: row.created_at,
        }
    }
}

#[derive(Debug, Clone)]
pub struct PgPredictionStore {
    pool: sqlx::PgPool,
}

impl PgPredictionStore {
    pub fn new(pool: sqlx::PgPool) -> Self {
        Self { pool }
    }

    pub fn pool(&self) -> &sqlx::PgPool {
        &self.pool
    }

    /// Most recent record for the code regardless of age (report view).
    pub async fn latest_for_code(&self, stock_code: &str) -> anyhow::Result<Option<PredictionRecord>> {
        let row = sqlx::query_as::<_, PredictionRow>(&format!(
            "SELECT {COLUMNS} FROM predictions \
             WHERE stock_code = $1 \
             ORDER BY created_at DESC \
             LIMIT 1"
        ))
        .bind(stock_code)
        .fetch_optional(&self.pool)
        .await
        .with_context(|| format!("select latest prediction failed (stock_code={stock_code})"))?;

        Ok(row.map(PredictionRecord::from))
    }

    /// Newest records first (listing view).
    pub async fn list_recent(&self, limit: i64) -> anyhow::Result<Vec<PredictionRecord>> {
        anyhow::ensure!(limit >= 1, "limit must be >= 1 (got {limit})");

        let rows = sqlx::query_as::<_, PredictionRow>(&format!(
            "SELECT {COLUMNS} FROM predictions \
             ORDER BY created_at DESC \
             LIMIT $1"
        ))
        .bind(limit)
        .fetch_all(&self.pool)
        .await
        .context("select recent predictions failed")?;

        Ok(rows.into_iter().map(PredictionRecord::from).collect())
    }
}

#[async_trait::async_trait]
impl PredictionStore for PgPredictionStore {
    async fn find_fresh(
        &self,
        stock_code: &str,
        since: DateTime<Utc>,
    ) -> anyhow::Result<Option<PredictionRecord>> {
        let row = sqlx::query_as::<_, PredictionRow>(&format!(
            "SELECT {COLUMNS} FROM predictions \
             WHERE stock_code = $1 AND created_at >= $2 \
             ORDER BY created_at DESC \
             LIMIT 1"
        ))
        .bind(stock_code)
        .bind(since)
        .fetch_optional(&self.pool)
        .await
        .with_context(|| format!("select fresh prediction failed (stock_code={stock_code})"))?;

        Ok(row.map(PredictionRecord::from))
    }

    async fn insert(
        &self,
        forecast: &Forecast,
        created_at: DateTime<Utc>,
    ) -> anyhow::Result<PredictionRecord> {
        let row = sqlx::query_as::<_, PredictionRow>(&format!(
            "INSERT INTO predictions (stock_code, stock_name, current_price, price_change, \
             price_change_percentage, predicted_price_in_30_days, predicted_price_in_90_days, \
             predicted_price_in_180_days, signal, accuracy, result, created_at) \
             VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9, $10, $11, $12) \
             RETURNING {COLUMNS}"
        ))
        .bind(&forecast.stock_code)
        .bind(&forecast.stock_name)
        .bind(forecast.current_price)
        .bind(forecast.price_change)
        .bind(forecast.price_change_percentage)
        .bind(forecast.predicted_price_in_30_days)
        .bind(forecast.predicted_price_in_90_days)
        .bind(forecast.predicted_price_in_180_days)
        .bind(&forecast.signal)
        .bind(forecast.accuracy)
        .bind(&forecast.result)
        .bind(created_at)
        .fetch_one(&self.pool)
        .await
        .context("insert predictions failed")?;

        Ok(row.into())
    }
}
