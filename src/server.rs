//! HTTP surface for the browser front-end.

use crate::client::ChatRequest;
use crate::config::Config;
use crate::error::ApiError;
use crate::evaluation::Evaluator;
use crate::models::{
    EvaluationRequest, LlmOutputRequest, LlmOutputResponse, QualitativeEvaluation,
    QualitativeRequest,
};
use crate::runner::Runner;
use crate::stream::{RunEvent, event_stream};
use anyhow::{Context, Result};
use axum::extract::State;
use axum::http::HeaderMap;
use axum::http::header::AUTHORIZATION;
use axum::response::sse::{Event, Sse};
use axum::routing::{get, post};
use axum::{Json, Router};
use serde::{Deserialize, Serialize};
use std::convert::Infallible;
use std::sync::Arc;
use tokio::net::TcpListener;
use tokio::sync::mpsc;
use tokio_stream::Stream;
use tracing::{error, info};

/// Shared handler state
pub struct AppState {
    pub config: Config,
    pub evaluator: Arc<Evaluator>,
    pub runner: Arc<Runner>,
}

impl AppState {
    pub fn new(config: Config, evaluator: Arc<Evaluator>) -> Self {
        let runner = Arc::new(Runner::new(
            Arc::clone(&evaluator),
            &config.provider,
            &config.quantitative,
        ));
        Self {
            config,
            evaluator,
            runner,
        }
    }
}

pub fn create_router(state: Arc<AppState>) -> Router {
    Router::new()
        .route("/api/health", get(health))
        .route("/api/llm-output", post(llm_output))
        .route("/api/qualitative-evaluation", post(qualitative_evaluation))
        .route("/api/quantitative-evaluation", post(quantitative_evaluation))
        .with_state(state)
}

/// Bind `addr` and serve until the process exits
pub async fn serve(state: Arc<AppState>, addr: &str) -> Result<()> {
    let listener = TcpListener::bind(addr)
        .await
        .with_context(|| format!("Failed to bind to {}", addr))?;

    info!("prompt-judge listening on {}", addr);

    axum::serve(listener, create_router(state))
        .await
        .context("Server error")
}

/// Caller credential from `Authorization: Bearer` or `x-api-key`
fn api_key(headers: &HeaderMap) -> Result<String, ApiError> {
    let from_authorization = headers
        .get(AUTHORIZATION)
        .and_then(|value| value.to_str().ok())
        .map(|value| value.strip_prefix("Bearer ").unwrap_or(value).trim().to_string())
        .filter(|key| !key.is_empty());

    from_authorization
        .or_else(|| {
            headers
                .get("x-api-key")
                .and_then(|value| value.to_str().ok())
                .map(str::to_string)
                .filter(|key| !key.is_empty())
        })
        .ok_or(ApiError::CredentialMissing)
}

#[derive(Debug, Serialize, Deserialize)]
pub struct HealthResponse {
    pub status: String,
    pub version: String,
}

async fn health() -> Json<HealthResponse> {
    Json(HealthResponse {
        status: "ok".to_string(),
        version: env!("CARGO_PKG_VERSION").to_string(),
    })
}

async fn llm_output(
    State(state): State<Arc<AppState>>,
    headers: HeaderMap,
    Json(request): Json<LlmOutputRequest>,
) -> Result<Json<LlmOutputResponse>, ApiError> {
    let api_key = api_key(&headers)?;

    let chat = ChatRequest {
        model: request
            .model
            .unwrap_or_else(|| state.config.provider.default_model.clone()),
        system_prompt: request.system_prompt,
        user_prompt: request.user_prompt,
        temperature: state.config.provider.temperature,
        json_response: false,
    };

    match state.evaluator.generate_output(&chat, &api_key).await {
        Ok(output) => Ok(Json(LlmOutputResponse { output })),
        Err(err) => {
            error!("Error getting LLM output: {}", err);
            Err(ApiError::Upstream("Failed to get LLM output"))
        }
    }
}

async fn qualitative_evaluation(
    State(state): State<Arc<AppState>>,
    headers: HeaderMap,
    Json(request): Json<QualitativeRequest>,
) -> Result<Json<QualitativeEvaluation>, ApiError> {
    let api_key = api_key(&headers)?;

    match state.evaluator.judge_prompts(&request, &api_key).await {
        Ok(evaluation) => Ok(Json(evaluation)),
        Err(err) => {
            error!("Error getting qualitative evaluation: {}", err);
            Err(ApiError::Upstream("Failed to get qualitative evaluation"))
        }
    }
}

async fn quantitative_evaluation(
    State(state): State<Arc<AppState>>,
    headers: HeaderMap,
    Json(request): Json<EvaluationRequest>,
) -> Result<Sse<impl Stream<Item = Result<Event, Infallible>>>, ApiError> {
    let api_key = api_key(&headers)?;

    let max_iterations = state.config.server.max_iterations;
    if request.iterations == 0 || request.iterations > max_iterations {
        return Err(ApiError::BadRequest(format!(
            "iterations must be between 1 and {}",
            max_iterations
        )));
    }

    let (tx, rx) = mpsc::unbounded_channel::<RunEvent>();
    let runner = Arc::clone(&state.runner);
    tokio::spawn(async move {
        runner.run(&request, &api_key, &tx).await;
    });

    Ok(Sse::new(event_stream(rx)))
}
