use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

pub const SIGNALS: [&str; 5] = ["STRONG BUY", "BUY", "HOLD", "SELL", "STRONG SELL"];

/// A fully typed, validated forecast that has not been persisted yet.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Forecast {
    pub stock_code: String,
    pub stock_name: String,
    pub current_price: f64,
    pub price_change: f64,
    pub price_change_percentage: f64,
    pub predicted_price_in_30_days: f64,
    pub predicted_price_in_90_days: f64,
    pub predicted_price_in_180_days: f64,
    pub signal: String,
    pub accuracy: i32,
    pub result: String,
}

/// A persisted forecast. Immutable once created; staleness is handled by
/// inserting a newer record.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PredictionRecord {
    pub id: uuid::Uuid,
    #[serde(flatten)]
    pub forecast: Forecast,
    pub created_at: DateTime<Utc>,
}

impl PredictionRecord {
    pub fn stock_code(&self) -> &str {
        &self.forecast.stock_code
    }
}
