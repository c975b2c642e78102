pub mod screener;
pub mod sections;

use crate::error::ForecastError;
use sections::RawSections;

/// Retrieves the disclosure sections for one ticker.
///
/// Implementations fail with [`ForecastError::NotFound`] when the source says
/// the ticker does not exist and with [`ForecastError::FetchFailure`] for any
/// transport or document problem.
#[async_trait::async_trait]
pub trait SectionSource: Send + Sync {
    fn source_name(&self) -> &'static str;

    async fn extract(&self, code: &str) -> Result<RawSections, ForecastError>;
}
