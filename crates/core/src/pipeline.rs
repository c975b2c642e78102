use crate::domain::forecast::PredictionRecord;
use crate::error::ForecastError;
use crate::llm::{json, ForecastModel};
use crate::scrape::SectionSource;
use crate::storage::PredictionStore;
use crate::time::freshness;
use chrono::{DateTime, Duration, Utc};
use std::sync::Arc;

const MAX_TICKER_LEN: usize = 32;

/// Trims and upper-cases a ticker, rejecting values that cannot be a single
/// URL path segment. Dot-only codes such as `..` would be collapsed by URL
/// normalisation, so at least one ASCII letter or digit is required.
pub fn normalize_ticker(code: &str) -> Result<String, ForecastError> {
    let code = code.trim().to_uppercase();
    let valid = code.chars().count() <= MAX_TICKER_LEN
        && code.chars().any(|c| c.is_ascii_alphanumeric())
        && !code.chars().any(|c| c.is_whitespace() || c == '/' || c.is_control());
    if !valid {
        return Err(ForecastError::InvalidTicker(code));
    }
    Ok(code)
}

/// request -> fresh lookup -> (hit) return
///                         -> (miss) extract -> analyze -> validate -> insert -> return
///
/// Every step is awaited in sequence. Lookup and insert are not atomic, so two
/// concurrent misses for one ticker both generate and both insert.
#[derive(Clone)]
pub struct ForecastPipeline {
    source: Arc<dyn SectionSource>,
    model: Arc<dyn ForecastModel>,
    store: Arc<dyn PredictionStore>,
    window: Duration,
}

impl ForecastPipeline {
    pub fn new(
        source: Arc<dyn SectionSource>,
        model: Arc<dyn ForecastModel>,
        store: Arc<dyn PredictionStore>,
        window: Duration,
    ) -> Self {
        Self {
            source,
            model,
            store,
            window,
        }
    }

    pub fn window(&self) -> Duration {
        self.window
    }

    pub async fn generate(&self, code: &str) -> Result<PredictionRecord, ForecastError> {
        self.generate_at(code, Utc::now()).await
    }

    pub async fn generate_at(
        &self,
        code: &str,
        now: DateTime<Utc>,
    ) -> Result<PredictionRecord, ForecastError> {
        let code = normalize_ticker(code)?;

        let since = freshness::cutoff(now, self.window);
        if let Some(record) = self
            .store
            .find_fresh(&code, since)
            .await
            .map_err(ForecastError::storage)?
        {
            tracing::info!(%code, record_id = %record.id, created_at = %record.created_at, "fresh prediction cache hit");
            return Ok(record);
        }
        tracing::info!(%code, source = self.source.source_name(), "no fresh prediction; generating");

        let sections = self.source.extract(&code).await?;
        tracing::debug!(%code, sections_len = sections.total_len(), "sections extracted");

        let raw = self.model.analyze(&sections).await?;

        let mut forecast = json::parse_forecast(&raw).map_err(|rejection| {
            let err = ForecastError::from(rejection);
            tracing::warn!(%code, kind = err.kind(), error = %err, raw_len = raw.len(), "model output rejected");
            err
        })?;

        if !forecast.stock_code.eq_ignore_ascii_case(&code) {
            tracing::warn!(
                %code,
                model_code = %forecast.stock_code,
                "model returned a different stock code; storing under the requested code"
            );
        }
        forecast.stock_code = code;

        let record = self
            .store
            .insert(&forecast, now)
            .await
            .map_err(ForecastError::storage)?;

        tracing::info!(
            code = %record.stock_code(),
            record_id = %record.id,
            provider = self.model.provider().as_str(),
            signal = %record.forecast.signal,
            "prediction persisted"
        );
        Ok(record)
    }
}
