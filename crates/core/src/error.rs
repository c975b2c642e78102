use crate::domain::contract::Rejection;
use crate::llm::error::LlmDiagnosticsError;
use thiserror::Error;

pub const NUMERIC_FIELDS_HINT: &str =
    "Ensure percent/number fields are returned as numbers (not strings like '80%' or '3,225').";

/// Failure of one `generate` invocation. None of these are retried.
#[derive(Error, Debug)]
pub enum ForecastError {
    #[error("invalid ticker {0:?}")]
    InvalidTicker(String),

    #[error("Page Not Found: no company page for {0}")]
    NotFound(String),

    #[error("failed to fetch company page: {0}")]
    FetchFailure(String),

    #[error("Failed to generate analysis: {0}")]
    GenerationFailure(#[from] LlmDiagnosticsError),

    #[error("Failed to parse response: {0}")]
    MalformedResponse(String),

    #[error("AI response had invalid numeric values ({}). {}", .0.join(", "), NUMERIC_FIELDS_HINT)]
    InvalidNumericFields(Vec<&'static str>),

    #[error("storage error: {0}")]
    Storage(String),
}

impl From<Rejection> for ForecastError {
    fn from(rejection: Rejection) -> Self {
        match rejection {
            Rejection::Malformed(detail) => ForecastError::MalformedResponse(detail),
            Rejection::InvalidNumericFields { fields } => ForecastError::InvalidNumericFields(fields),
        }
    }
}

impl ForecastError {
    pub fn storage(err: anyhow::Error) -> Self {
        ForecastError::Storage(format!("{err:#}"))
    }

    /// Short machine-readable tag, used as a structured log field.
    pub fn kind(&self) -> &'static str {
        match self {
            ForecastError::InvalidTicker(_) => "invalid_ticker",
            ForecastError::NotFound(_) => "not_found",
            ForecastError::FetchFailure(_) => "fetch_failure",
            ForecastError::GenerationFailure(_) => "generation_failure",
            ForecastError::MalformedResponse(_) => "malformed_response",
            ForecastError::InvalidNumericFields(_) => "invalid_numeric_fields",
            ForecastError::Storage(_) => "storage",
        }
    }
}
