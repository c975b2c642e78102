pub mod companies;
pub mod domain;
pub mod error;
pub mod llm;
pub mod pipeline;
pub mod scrape;
pub mod storage;
pub mod time;

pub mod config {
    use anyhow::Context;

    const DEFAULT_COMPANIES_PATH: &str = "data/companies.json";

    #[derive(Debug, Clone)]
    pub struct Settings {
        pub database_url: Option<String>,
        pub gemini_api_key: Option<String>,
        pub sentry_dsn: Option<String>,
        pub screener_base_url: Option<String>,
        pub companies_path: String,
        pub freshness_window_hours: i64,
    }

    impl Settings {
        pub fn from_env() -> anyhow::Result<Self> {
            let freshness_window_hours = match std::env::var("FRESHNESS_WINDOW_HOURS") {
                Ok(s) => {
                    let hours = s
                        .trim()
                        .parse::<i64>()
                        .with_context(|| format!("FRESHNESS_WINDOW_HOURS is not an integer: {s}"))?;
                    anyhow::ensure!(hours >= 1, "FRESHNESS_WINDOW_HOURS must be >= 1 (got {hours})");
                    hours
                }
                Err(_) => crate::time::freshness::DEFAULT_WINDOW_HOURS,
            };

            Ok(Self {
                database_url: std::env::var("DATABASE_URL").ok(),
                gemini_api_key: std::env::var("GEMINI_API_KEY").ok(),
                sentry_dsn: std::env::var("SENTRY_DSN").ok(),
                screener_base_url: std::env::var("SCREENER_BASE_URL").ok(),
                companies_path: std::env::var("COMPANIES_PATH")
                    .ok()
                    .filter(|s| !s.trim().is_empty())
                    .unwrap_or_else(|| DEFAULT_COMPANIES_PATH.to_string()),
                freshness_window_hours,
            })
        }

        pub fn require_database_url(&self) -> anyhow::Result<&str> {
            self.database_url
                .as_deref()
                .context("DATABASE_URL is required")
        }

        pub fn require_gemini_api_key(&self) -> anyhow::Result<&str> {
            self.gemini_api_key
                .as_deref()
                .context("GEMINI_API_KEY is required")
        }

        pub fn freshness_window(&self) -> chrono::Duration {
            chrono::Duration::hours(self.freshness_window_hours)
        }
    }
}
