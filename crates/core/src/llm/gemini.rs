use crate::config::Settings;
use crate::error::ForecastError;
use crate::llm::error::LlmDiagnosticsError;
use crate::llm::prompt;
use crate::llm::sse::SseDecoder;
use crate::llm::{ForecastModel, Provider};
use crate::scrape::sections::RawSections;
use anyhow::Context;
use futures_util::StreamExt;
use reqwest::header::{HeaderMap, HeaderValue};
use serde::{Deserialize, Serialize};
use std::time::Duration;

const DEFAULT_BASE_URL: &str = "https://generativelanguage.googleapis.com";
const DEFAULT_MODEL: &str = "gemini-flash-lite-latest";
const DEFAULT_TIMEOUT_SECS: u64 = 120;

#[derive(Debug, Clone)]
pub struct GeminiClient {
    http: reqwest::Client,
    api_key: String,
    base_url: String,
    model: String,
}

impl GeminiClient {
    pub fn from_settings(settings: &Settings) -> anyhow::Result<Self> {
        let api_key = settings.require_gemini_api_key()?.to_string();
        let base_url =
            std::env::var("GEMINI_BASE_URL").unwrap_or_else(|_| DEFAULT_BASE_URL.to_string());
        let model = std::env::var("GEMINI_MODEL").unwrap_or_else(|_| DEFAULT_MODEL.to_string());
        let timeout_secs = std::env::var("GEMINI_TIMEOUT_SECS")
            .ok()
            .and_then(|s| s.parse::<u64>().ok())
            .unwrap_or(DEFAULT_TIMEOUT_SECS);

        Self::new(api_key, base_url, model, Duration::from_secs(timeout_secs))
    }

    pub fn new(
        api_key: String,
        base_url: String,
        model: String,
        timeout: Duration,
    ) -> anyhow::Result<Self> {
        let http = reqwest::Client::builder()
            .timeout(timeout)
            .build()
            .context("failed to build reqwest client")?;

        Ok(Self {
            http,
            api_key,
            base_url,
            model,
        })
    }

    fn stream_url(&self) -> String {
        format!(
            "{}/v1beta/models/{}:streamGenerateContent",
            self.base_url.trim_end_matches('/'),
            self.model
        )
    }

    fn request(sections: &RawSections) -> GenerateContentRequest {
        GenerateContentRequest {
            system_instruction: Content {
                role: None,
                parts: vec![RequestPart {
                    text: prompt::system_instruction(),
                }],
            },
            contents: vec![Content {
                role: Some("user"),
                parts: vec![RequestPart {
                    text: prompt::user_message(sections),
                }],
            }],
            generation_config: GenerationConfig {
                response_mime_type: "application/json",
                response_schema: prompt::response_schema(),
                thinking_config: ThinkingConfig { thinking_budget: 0 },
            },
        }
    }

    fn diag(stage: &'static str, detail: impl Into<String>) -> LlmDiagnosticsError {
        LlmDiagnosticsError::new(Provider::Gemini, stage, detail)
    }

    async fn stream_generate(&self, req: &GenerateContentRequest) -> Result<String, LlmDiagnosticsError> {
        let mut headers = HeaderMap::new();
        let key = HeaderValue::from_str(&self.api_key)
            .map_err(|e| Self::diag("config", format!("invalid api key header: {e}")))?;
        headers.insert("x-goog-api-key", key);

        let res = self
            .http
            .post(self.stream_url())
            .query(&[("alt", "sse")])
            .headers(headers)
            .json(req)
            .send()
            .await
            .map_err(|e| Self::diag("http", format!("Gemini request failed: {e}")))?;

        let status = res.status();
        if !status.is_success() {
            let text = res.text().await.unwrap_or_default();
            return Err(Self::diag("http", format!("status={status}")).with_raw_output(text));
        }

        let mut assembler = StreamAssembler::default();
        let mut decoder = SseDecoder::new();
        let mut stream = res.bytes_stream();
        while let Some(chunk) = stream.next().await {
            let chunk = chunk.map_err(|e| {
                Self::diag("stream", format!("stream interrupted: {e}"))
                    .with_raw_output(assembler.text.clone())
            })?;
            for event in decoder.push(&chunk) {
                assembler.accept(&event)?;
            }
        }
        if let Some(event) = decoder.finish() {
            assembler.accept(&event)?;
        }

        assembler.finish()
    }
}

#[async_trait::async_trait]
impl ForecastModel for GeminiClient {
    fn provider(&self) -> Provider {
        Provider::Gemini
    }

    async fn analyze(&self, sections: &RawSections) -> Result<String, ForecastError> {
        let t0 = std::time::Instant::now();
        let req = Self::request(sections);
        let text = self.stream_generate(&req).await?;
        tracing::debug!(
            model = %self.model,
            elapsed_ms = t0.elapsed().as_millis(),
            response_len = text.len(),
            "Gemini stream finished"
        );
        Ok(text)
    }
}

/// Concatenates the text of every streamed response chunk, strictly in the
/// order the chunks arrived.
#[derive(Debug, Default)]
struct StreamAssembler {
    text: String,
    chunks: usize,
    finish_reason: Option<String>,
}

impl StreamAssembler {
    fn accept(&mut self, event: &str) -> Result<(), LlmDiagnosticsError> {
        let chunk = serde_json::from_str::<StreamChunk>(event).map_err(|e| {
            GeminiClient::diag("decode", format!("invalid stream chunk: {e}"))
                .with_raw_output(event.to_string())
        })?;
        self.chunks += 1;

        if let Some(err) = chunk.error {
            return Err(GeminiClient::diag("stream", format!("provider error: {err}"))
                .with_raw_output(self.text.clone()));
        }
        if let Some(reason) = chunk.prompt_feedback.and_then(|f| f.block_reason) {
            return Err(GeminiClient::diag("blocked", format!("prompt blocked: {reason}")));
        }

        for candidate in chunk.candidates.into_iter().take(1) {
            if let Some(content) = candidate.content {
                for part in content.parts {
                    if part.thought {
                        continue;
                    }
                    if let Some(text) = part.text {
                        self.text.push_str(&text);
                    }
                }
            }
            if candidate.finish_reason.is_some() {
                self.finish_reason = candidate.finish_reason;
            }
        }
        Ok(())
    }

    fn finish(self) -> Result<String, LlmDiagnosticsError> {
        match self.finish_reason.as_deref() {
            Some("STOP") => {}
            None => {
                return Err(GeminiClient::diag(
                    "truncated",
                    format!("stream closed after {} chunks without a finish reason", self.chunks),
                )
                .with_raw_output(self.text));
            }
            Some(reason) => {
                return Err(GeminiClient::diag("finish", format!("finish_reason={reason}"))
                    .with_raw_output(self.text));
            }
        }
        if self.text.trim().is_empty() {
            return Err(GeminiClient::diag(
                "empty",
                format!("no text in {} stream chunks", self.chunks),
            ));
        }
        tracing::trace!(chunks = self.chunks, "assembled Gemini stream");
        Ok(self.text)
    }
}

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
struct GenerateContentRequest {
    system_instruction: Content,
    contents: Vec<Content>,
    generation_config: GenerationConfig,
}

#[derive(Debug, Clone, Serialize)]
struct Content {
    #[serde(skip_serializing_if = "Option::is_none")]
    role: Option<&'static str>,
    parts: Vec<RequestPart>,
}

#[derive(Debug, Clone, Serialize)]
struct RequestPart {
    text: String,
}

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
struct GenerationConfig {
    response_mime_type: &'static str,
    response_schema: serde_json::Value,
    thinking_config: ThinkingConfig,
}

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
struct ThinkingConfig {
    thinking_budget: u32,
}

#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
struct StreamChunk {
    #[serde(default)]
    candidates: Vec<Candidate>,

    #[serde(default)]
    prompt_feedback: Option<PromptFeedback>,

    #[serde(default)]
    error: Option<serde_json::Value>,
}

#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
struct Candidate {
    #[serde(default)]
    content: Option<CandidateContent>,

    #[serde(default)]
    finish_reason: Option<String>,
}

#[derive(Debug, Clone, Deserialize)]
struct CandidateContent {
    #[serde(default)]
    parts: Vec<ResponsePart>,
}

#[derive(Debug, Clone, Deserialize)]
struct ResponsePart {
    #[serde(default)]
    text: Option<String>,

    #[serde(default)]
    thought: bool,
}

#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
struct PromptFeedback {
    #[serde(default)]
    block_reason: Option<String>,
}
