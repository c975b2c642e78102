use crate::config::Settings;
use crate::error::ForecastError;
use crate::scrape::sections::{extract_sections, PageContent, RawSections};
use crate::scrape::SectionSource;
use anyhow::Context;
use reqwest::Url;
use std::time::Duration;

const DEFAULT_BASE_URL: &str = "https://www.screener.in";
const DEFAULT_TIMEOUT_SECS: u64 = 30;
const USER_AGENT: &str = concat!("stockcast/", env!("CARGO_PKG_VERSION"));

#[derive(Debug, Clone)]
pub struct ScreenerClient {
    http: reqwest::Client,
    base_url: Url,
}

impl ScreenerClient {
    pub fn from_settings(settings: &Settings) -> anyhow::Result<Self> {
        let base_url = settings
            .screener_base_url
            .clone()
            .unwrap_or_else(|| DEFAULT_BASE_URL.to_string());

        let timeout_secs = std::env::var("SCREENER_TIMEOUT_SECS")
            .ok()
            .and_then(|s| s.parse::<u64>().ok())
            .unwrap_or(DEFAULT_TIMEOUT_SECS);

        Self::new(&base_url, Duration::from_secs(timeout_secs))
    }

    pub fn new(base_url: &str, timeout: Duration) -> anyhow::Result<Self> {
        let base_url = Url::parse(base_url)
            .with_context(|| format!("invalid screener base url: {base_url}"))?;
        anyhow::ensure!(
            !base_url.cannot_be_a_base(),
            "screener base url cannot be a base: {base_url}"
        );

        let http = reqwest::Client::builder()
            .timeout(timeout)
            .user_agent(USER_AGENT)
            .build()
            .context("failed to build screener http client")?;

        Ok(Self { http, base_url })
    }

    /// `{base}/company/{code}/consolidated/`, with `code` encoded as one segment.
    pub fn company_url(&self, code: &str) -> Url {
        let mut url = self.base_url.clone();
        if let Ok(mut segments) = url.path_segments_mut() {
            segments
                .pop_if_empty()
                .extend(["company", code, "consolidated", ""]);
        }
        url
    }

    async fn fetch_page(&self, code: &str) -> anyhow::Result<(reqwest::StatusCode, String)> {
        let url = self.company_url(code);
        let res = self
            .http
            .get(url.clone())
            .send()
            .await
            .with_context(|| format!("screener request failed: {url}"))?;

        let status = res.status();
        let body = res
            .text()
            .await
            .context("failed to read screener response body")?;
        Ok((status, body))
    }
}

#[async_trait::async_trait]
impl SectionSource for ScreenerClient {
    fn source_name(&self) -> &'static str {
        "screener"
    }

    async fn extract(&self, code: &str) -> Result<RawSections, ForecastError> {
        let t0 = std::time::Instant::now();
        let (status, body) = self
            .fetch_page(code)
            .await
            .map_err(|e| ForecastError::FetchFailure(format!("{e:#}")))?;

        // The not-found page is served with a 404, so check the marker first.
        let sections = match extract_sections(&body) {
            PageContent::NotFound => return Err(ForecastError::NotFound(code.to_string())),
            PageContent::Sections(sections) => sections,
        };

        if !status.is_success() {
            return Err(ForecastError::FetchFailure(format!(
                "screener HTTP {status} for {code}"
            )));
        }
        if sections.is_empty() {
            return Err(ForecastError::FetchFailure(format!(
                "no known sections in screener page for {code}"
            )));
        }

        tracing::debug!(
            %code,
            elapsed_ms = t0.elapsed().as_millis(),
            company_info_len = sections.company_info.len(),
            day_change_len = sections.day_change.len(),
            analysis_len = sections.analysis.len(),
            quarters_len = sections.quarters.len(),
            profit_loss_len = sections.profit_loss.len(),
            balance_sheet_len = sections.balance_sheet.len(),
            cash_flow_len = sections.cash_flow.len(),
            "screener sections extracted"
        );

        Ok(sections)
    }
}
