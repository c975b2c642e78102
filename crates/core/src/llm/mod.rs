pub mod error;
pub mod gemini;
pub mod json;
pub mod prompt;
pub mod sse;

use crate::error::ForecastError;
use crate::scrape::sections::RawSections;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Provider {
    Gemini,
}

impl Provider {
    pub fn as_str(self) -> &'static str {
        match self {
            Provider::Gemini => "gemini",
        }
    }
}

/// Schema-constrained forecast generation.
///
/// Returns the complete JSON text of the model's answer, assembled from every
/// streamed fragment in arrival order.
#[async_trait::async_trait]
pub trait ForecastModel: Send + Sync {
    fn provider(&self) -> Provider;

    async fn analyze(&self, sections: &RawSections) -> Result<String, ForecastError>;
}
