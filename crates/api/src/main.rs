use axum::{
    extract::{rejection::JsonRejection, Path, Query, State},
    http::StatusCode,
    response::{IntoResponse, Response},
    routing::{get, post},
    Json, Router,
};
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use tower_http::trace::TraceLayer;
use tracing_subscriber::EnvFilter;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

use stockcast_core::companies::{Company, CompanyDirectory, DEFAULT_SEARCH_LIMIT};
use stockcast_core::domain::forecast::PredictionRecord;
use stockcast_core::error::ForecastError;
use stockcast_core::llm::gemini::GeminiClient;
use stockcast_core::pipeline::{normalize_ticker, ForecastPipeline};
use stockcast_core::scrape::screener::ScreenerClient;
use stockcast_core::storage::predictions::PgPredictionStore;

const RECENT_PREDICTIONS_LIMIT: i64 = 50;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    dotenvy::dotenv().ok();

    let settings = stockcast_core::config::Settings::from_env()?;
    let _sentry_guard = init_sentry(&settings);

    tracing_subscriber::registry()
        .with(EnvFilter::from_default_env())
        .with(tracing_subscriber::fmt::layer())
        .with(sentry_tracing::layer())
        .init();

    let store: Option<PgPredictionStore> = match settings.require_database_url() {
        Ok(db_url) => match sqlx::postgres::PgPoolOptions::new()
            .max_connections(5)
            .connect(db_url)
            .await
        {
            Ok(pool) => match stockcast_core::storage::migrate(&pool).await {
                Ok(()) => Some(PgPredictionStore::new(pool)),
                Err(e) => {
                    sentry_anyhow::capture_anyhow(&e);
                    tracing::error!(error = %e, "db migrations failed; starting API in degraded mode");
                    None
                }
            },
            Err(e) => {
                let err = anyhow::Error::new(e);
                sentry_anyhow::capture_anyhow(&err);
                tracing::error!(error = %err, "db connect failed; starting API in degraded mode");
                None
            }
        },
        Err(e) => {
            sentry_anyhow::capture_anyhow(&e);
            tracing::error!(error = %e, "DATABASE_URL missing; starting API in degraded mode");
            None
        }
    };

    let pipeline = match (&store, GeminiClient::from_settings(&settings)) {
        (Some(store), Ok(model)) => {
            let source = ScreenerClient::from_settings(&settings)?;
            Some(ForecastPipeline::new(
                Arc::new(source),
                Arc::new(model),
                Arc::new(store.clone()),
                settings.freshness_window(),
            ))
        }
        (_, Err(e)) => {
            tracing::error!(error = %e, "model client unavailable; generation disabled");
            None
        }
        (None, Ok(_)) => None,
    };

    let companies = Arc::new(CompanyDirectory::new(&settings.companies_path));
    let state = AppState {
        store,
        pipeline,
        companies,
    };

    let app = router(state).layer(TraceLayer::new_for_http());

    let port: u16 = std::env::var("PORT")
        .ok()
        .and_then(|v| v.parse().ok())
        .unwrap_or(3000);
    let addr = std::net::SocketAddr::from(([0, 0, 0, 0], port));

    tracing::info!(%addr, "api listening");

    let listener = tokio::net::TcpListener::bind(addr).await?;
    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal())
        .await?;

    Ok(())
}

fn router(state: AppState) -> Router {
    Router::new()
        .route("/healthz", get(healthz))
        .route("/api/v1/generate", post(generate))
        .route("/api/v1/predictions", get(list_predictions))
        .route("/api/v1/predictions/:code", get(get_prediction))
        .route("/api/v1/companies", get(search_companies))
        .route("/api/v1/companies/reload", post(reload_companies))
        .with_state(state)
}

async fn healthz() -> &'static str {
    "ok"
}

#[derive(Clone)]
struct AppState {
    store: Option<PgPredictionStore>,
    pipeline: Option<ForecastPipeline>,
    companies: Arc<CompanyDirectory>,
}

#[derive(Debug, Serialize)]
struct ApiEnvelope<T> {
    success: bool,
    data: Option<T>,
    error: Option<String>,
}

#[derive(Debug)]
struct ApiError(StatusCode, String);

impl ApiError {
    fn envelope(&self) -> ApiEnvelope<()> {
        ApiEnvelope {
            success: false,
            data: None,
            error: Some(self.1.clone()),
        }
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        (self.0, Json(self.envelope())).into_response()
    }
}

type ApiResult<T> = Result<Json<ApiEnvelope<T>>, ApiError>;

fn ok<T>(data: T) -> ApiResult<T> {
    Ok(Json(ApiEnvelope {
        success: true,
        data: Some(data),
        error: None,
    }))
}

fn fail(status: StatusCode, error: impl Into<String>) -> ApiError {
    ApiError(status, error.into())
}

fn internal(err: anyhow::Error) -> ApiError {
    sentry_anyhow::capture_anyhow(&err);
    tracing::error!(error = %err, "request failed");
    fail(StatusCode::INTERNAL_SERVER_ERROR, format!("{err:#}"))
}

fn status_for(err: &ForecastError) -> StatusCode {
    match err {
        ForecastError::InvalidTicker(_) => StatusCode::BAD_REQUEST,
        ForecastError::NotFound(_) => StatusCode::NOT_FOUND,
        ForecastError::FetchFailure(_) | ForecastError::GenerationFailure(_) => {
            StatusCode::BAD_GATEWAY
        }
        ForecastError::MalformedResponse(_)
        | ForecastError::InvalidNumericFields(_)
        | ForecastError::Storage(_) => StatusCode::INTERNAL_SERVER_ERROR,
    }
}

#[derive(Debug, Deserialize)]
struct GenerateRequest {
    code: String,
}

async fn generate(
    State(state): State<AppState>,
    body: Result<Json<GenerateRequest>, JsonRejection>,
) -> ApiResult<PredictionRecord> {
    let Json(req) = body.map_err(|rejection| fail(rejection.status(), rejection.body_text()))?;
    let Some(pipeline) = &state.pipeline else {
        return Err(fail(StatusCode::SERVICE_UNAVAILABLE, "generation is unavailable"));
    };

    match pipeline.generate(&req.code).await {
        Ok(record) => ok(record),
        Err(err) => {
            let status = status_for(&err);
            if status.is_server_error() {
                if let ForecastError::GenerationFailure(diag) = &err {
                    tracing::error!(
                        code = %req.code,
                        stage = diag.stage,
                        raw_output = diag.raw_output.as_deref().unwrap_or(""),
                        "generation failed"
                    );
                }
                sentry_anyhow::capture_anyhow(&anyhow::anyhow!("{err}"));
            }
            tracing::warn!(code = %req.code, kind = err.kind(), error = %err, "generate failed");
            Err(fail(status, err.to_string()))
        }
    }
}

async fn list_predictions(State(state): State<AppState>) -> ApiResult<Vec<PredictionRecord>> {
    let Some(store) = &state.store else {
        return Err(fail(StatusCode::SERVICE_UNAVAILABLE, "database unavailable"));
    };

    let records = store
        .list_recent(RECENT_PREDICTIONS_LIMIT)
        .await
        .map_err(internal)?;
    ok(records)
}

async fn get_prediction(
    State(state): State<AppState>,
    Path(code): Path<String>,
) -> ApiResult<PredictionRecord> {
    let Some(store) = &state.store else {
        return Err(fail(StatusCode::SERVICE_UNAVAILABLE, "database unavailable"));
    };

    let code = normalize_ticker(&code).map_err(|e| fail(StatusCode::BAD_REQUEST, e.to_string()))?;
    let record = store
        .latest_for_code(&code)
        .await
        .map_err(internal)?
        .ok_or_else(|| fail(StatusCode::NOT_FOUND, format!("no prediction for {code}")))?;
    ok(record)
}

#[derive(Debug, Deserialize)]
struct SearchQuery {
    #[serde(default)]
    q: String,
}

async fn search_companies(
    State(state): State<AppState>,
    Query(query): Query<SearchQuery>,
) -> ApiResult<Vec<Company>> {
    let companies = state
        .companies
        .search(&query.q, DEFAULT_SEARCH_LIMIT)
        .await
        .map_err(internal)?;
    ok(companies)
}

#[derive(Debug, Serialize)]
struct ReloadSummary {
    count: usize,
}

async fn reload_companies(State(state): State<AppState>) -> ApiResult<ReloadSummary> {
    let companies = state.companies.reload().await.map_err(internal)?;
    ok(ReloadSummary {
        count: companies.len(),
    })
}

async fn shutdown_signal() {
    let _ = tokio::signal::ctrl_c().await;
}

fn init_sentry(settings: &stockcast_core::config::Settings) -> Option<sentry::ClientInitGuard> {
    let dsn = settings.sentry_dsn.as_deref()?;
    Some(sentry::init((
        dsn,
        sentry::ClientOptions {
            release: sentry::release_name!(),
            ..Default::default()
        },
    )))
}

#[cfg(test)]
mod tests {
    use super::*;
    use axum::body::Body;
    use axum::extract::FromRequest;
    use axum::http::{header, Request};
    use stockcast_core::domain::contract::Rejection;
    use stockcast_core::llm::error::LlmDiagnosticsError;
    use stockcast_core::llm::Provider;

    #[test]
    fn maps_errors_to_client_facing_statuses() {
        assert_eq!(
            status_for(&ForecastError::InvalidTicker(String::new())),
            StatusCode::BAD_REQUEST
        );
        assert_eq!(
            status_for(&ForecastError::NotFound("NOPE".into())),
            StatusCode::NOT_FOUND
        );
        assert_eq!(
            status_for(&ForecastError::FetchFailure("timeout".into())),
            StatusCode::BAD_GATEWAY
        );
        assert_eq!(
            status_for(&LlmDiagnosticsError::new(Provider::Gemini, "http", "status=500").into()),
            StatusCode::BAD_GATEWAY
        );
        assert_eq!(
            status_for(&Rejection::InvalidNumericFields { fields: vec!["accuracy"] }.into()),
            StatusCode::INTERNAL_SERVER_ERROR
        );
    }

    #[test]
    fn envelope_shape() {
        let err = fail(StatusCode::NOT_FOUND, "Page Not Found");
        assert_eq!(err.0, StatusCode::NOT_FOUND);
        let v = serde_json::to_value(err.envelope()).unwrap();
        assert_eq!(
            v,
            serde_json::json!({"success": false, "data": null, "error": "Page Not Found"})
        );
    }

    #[tokio::test]
    async fn degraded_state_reports_unavailable() {
        let state = AppState {
            store: None,
            pipeline: None,
            companies: Arc::new(CompanyDirectory::new("does-not-exist.json")),
        };
        let err = generate(
            State(state.clone()),
            Ok(Json(GenerateRequest {
                code: "TCS".into(),
            })),
        )
        .await
        .unwrap_err();
        assert_eq!(err.0, StatusCode::SERVICE_UNAVAILABLE);

        let err = list_predictions(State(state)).await.unwrap_err();
        assert_eq!(err.0, StatusCode::SERVICE_UNAVAILABLE);
    }

    async fn json_rejection(content_type: Option<&str>, body: &'static str) -> JsonRejection {
        let mut req = Request::builder().method("POST").uri("/api/v1/generate");
        if let Some(ct) = content_type {
            req = req.header(header::CONTENT_TYPE, ct);
        }
        let req = req.body(Body::from(body)).unwrap();
        match Json::<GenerateRequest>::from_request(req, &()).await {
            Err(rejection) => rejection,
            Ok(_) => panic!("expected body {body:?} to be rejected"),
        }
    }

    #[tokio::test]
    async fn bad_generate_body_uses_envelope() {
        let state = AppState {
            store: None,
            pipeline: None,
            companies: Arc::new(CompanyDirectory::new("does-not-exist.json")),
        };

        let rejection = json_rejection(Some("application/json"), "{not json").await;
        let expected = rejection.status();
        let err = generate(State(state.clone()), Err(rejection)).await.unwrap_err();
        assert_eq!(err.0, expected);
        assert!(err.0.is_client_error());
        let v = serde_json::to_value(err.envelope()).unwrap();
        assert_eq!(v["success"], false);
        assert!(v["data"].is_null());
        assert!(!v["error"].as_str().unwrap().is_empty());

        let rejection = json_rejection(None, "{\"code\":\"TCS\"}").await;
        let err = generate(State(state.clone()), Err(rejection)).await.unwrap_err();
        assert_eq!(err.0, StatusCode::UNSUPPORTED_MEDIA_TYPE);

        let rejection = json_rejection(Some("application/json"), "{}").await;
        let err = generate(State(state), Err(rejection)).await.unwrap_err();
        assert_eq!(err.0, StatusCode::UNPROCESSABLE_ENTITY);
    }
}
