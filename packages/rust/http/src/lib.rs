//! HTTP surface for the AgencyPulse pipelines.
//!
//! Routes:
//! - `POST /ai/generate-offer` `{clientRequest, companyName?, clientId?}` → `OfferDraft`
//! - `POST /ai/smart-pulse` → `{report}`
//! - `GET /health` → `{status: "ok"}`
//!
//! Failures always answer `{error}` with a user-safe message: 400 for a
//! rejected request body, 500 for anything that fails inside the pipeline.
//! Model output never reaches an error body.

use std::net::SocketAddr;
use std::sync::Arc;

use axum::extract::rejection::JsonRejection;
use axum::extract::State;
use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use axum::routing::{get, post};
use axum::{Json, Router};
use serde::Serialize;
use tower_http::trace::TraceLayer;
use tracing::{error, info, warn};

use agencypulse_core::{OfferDraft, OfferRequest, Pipeline, SilentProgress};
use agencypulse_shared::{AgencyPulseError, ErrorKind};

/// Shared handler state.
#[derive(Clone)]
pub struct AppState {
    pipeline: Arc<Pipeline>,
}

impl AppState {
    pub fn new(pipeline: Pipeline) -> Self {
        Self {
            pipeline: Arc::new(pipeline),
        }
    }
}

/// Build the router with all routes and request tracing.
pub fn build_router(state: AppState) -> Router {
    Router::new()
        .route("/ai/generate-offer", post(generate_offer))
        .route("/ai/smart-pulse", post(smart_pulse))
        .route("/health", get(health))
        .layer(TraceLayer::new_for_http())
        .with_state(state)
}

/// Bind `addr` and serve until Ctrl-C.
pub async fn serve(state: AppState, addr: SocketAddr) -> std::io::Result<()> {
    let listener = tokio::net::TcpListener::bind(addr).await?;
    info!(%addr, "listening");
    axum::serve(listener, build_router(state))
        .with_graceful_shutdown(async {
            let _ = tokio::signal::ctrl_c().await;
            info!("shutting down");
        })
        .await
}

// ---------------------------------------------------------------------------
// Errors
// ---------------------------------------------------------------------------

#[derive(Debug, Serialize)]
struct ErrorBody {
    error: String,
}

/// Pipeline error mapped to an HTTP response.
#[derive(Debug)]
pub struct ApiError(AgencyPulseError);

impl From<AgencyPulseError> for ApiError {
    fn from(e: AgencyPulseError) -> Self {
        Self(e)
    }
}

impl From<JsonRejection> for ApiError {
    fn from(rejection: JsonRejection) -> Self {
        Self(AgencyPulseError::validation(format!(
            "invalid request body: {}",
            rejection.body_text()
        )))
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        // Only a rejected request body is the caller's fault.
        let status = match self.0.kind() {
            ErrorKind::Validation => StatusCode::BAD_REQUEST,
            _ => StatusCode::INTERNAL_SERVER_ERROR,
        };
        if status.is_server_error() {
            error!(error = %self.0, kind = ?self.0.kind(), "request failed");
        } else {
            warn!(error = %self.0, "request rejected");
        }
        (
            status,
            Json(ErrorBody {
                error: self.0.user_message(),
            }),
        )
            .into_response()
    }
}

// ---------------------------------------------------------------------------
// Handlers
// ---------------------------------------------------------------------------

#[derive(Debug, Serialize)]
struct ReportBody {
    report: String,
}

async fn generate_offer(
    State(state): State<AppState>,
    payload: Result<Json<OfferRequest>, JsonRejection>,
) -> Result<Json<OfferDraft>, ApiError> {
    let Json(request) = payload?;
    let draft = state
        .pipeline
        .generate_offer(&request, &SilentProgress)
        .await?;
    Ok(Json(draft))
}

async fn smart_pulse(
    State(state): State<AppState>,
) -> Result<Json<ReportBody>, ApiError> {
    let report = state.pipeline.smart_pulse(&SilentProgress).await?;
    Ok(Json(ReportBody {
        report: report.to_report_text(),
    }))
}

async fn health() -> Json<serde_json::Value> {
    Json(serde_json::json!({ "status": "ok" }))
}
