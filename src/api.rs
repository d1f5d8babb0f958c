//! HTTP surface: upload boundary around the analysis pipeline.
//!
//! A decode failure maps to 400 with an explanatory message; every other
//! analyzer failure has already been absorbed into sub-scores by the time
//! a response is built, so any decodable upload returns a full report.

use std::sync::Arc;

use axum::{
    extract::{DefaultBodyLimit, Multipart, State},
    http::StatusCode,
    response::Json,
    routing::{get, post},
    Router,
};
use serde::Serialize;
use tower_http::cors::CorsLayer;
use tracing::{info, warn};

use crate::error::Error;
use crate::hash_utils::content_digest;
use crate::pipeline::Pipeline;
use crate::types::CertificateAnalysis;

pub struct AppState {
    pub pipeline: Pipeline,
}

#[derive(Serialize)]
pub struct HashResponse {
    pub sha256: String,
    pub text_length: usize,
}

#[derive(Serialize)]
struct HealthResponse {
    status: &'static str,
}

pub fn app(state: Arc<AppState>) -> Router {
    let upload_limit = state.pipeline.config().server.max_upload_bytes;
    Router::new()
        .route("/api/analyze-certificate", post(analyze_certificate))
        .route("/api/generate-hash", post(generate_hash))
        .route("/health", get(health))
        .layer(DefaultBodyLimit::max(upload_limit))
        .layer(CorsLayer::permissive())
        .with_state(state)
}

async fn health() -> Json<HealthResponse> {
    Json(HealthResponse { status: "healthy" })
}

async fn analyze_certificate(
    State(state): State<Arc<AppState>>,
    multipart: Multipart,
) -> Result<Json<CertificateAnalysis>, (StatusCode, String)> {
    let bytes = read_upload(multipart).await?;
    info!(bytes = bytes.len(), "certificate upload received");

    match state.pipeline.analyze(&bytes).await {
        Ok(report) => Ok(Json(report)),
        Err(Error::Decode(e)) => {
            warn!(error = %e, "upload rejected");
            Err((StatusCode::BAD_REQUEST, format!("Unusable document: {}", e)))
        }
        Err(e) => Err((StatusCode::INTERNAL_SERVER_ERROR, e.to_string())),
    }
}

async fn generate_hash(
    State(state): State<Arc<AppState>>,
    multipart: Multipart,
) -> Result<Json<HashResponse>, (StatusCode, String)> {
    let bytes = read_upload(multipart).await?;

    match state.pipeline.recognize_text(&bytes).await {
        Ok(text) => Ok(Json(HashResponse {
            sha256: content_digest(&text),
            text_length: text.len(),
        })),
        Err(Error::Decode(e)) => {
            Err((StatusCode::BAD_REQUEST, format!("Unusable document: {}", e)))
        }
        Err(e) => Err((StatusCode::INTERNAL_SERVER_ERROR, e.to_string())),
    }
}

/// Pulls the "file" part out of a multipart upload.
async fn read_upload(mut multipart: Multipart) -> Result<Vec<u8>, (StatusCode, String)> {
    while let Some(field) = multipart
        .next_field()
        .await
        .map_err(|e| (StatusCode::BAD_REQUEST, format!("Malformed upload: {}", e)))?
    {
        if field.name() == Some("file") {
            let data = field
                .bytes()
                .await
                .map_err(|e| (StatusCode::BAD_REQUEST, format!("Malformed upload: {}", e)))?;
            if data.is_empty() {
                return Err((StatusCode::BAD_REQUEST, "Empty upload".to_string()));
            }
            return Ok(data.to_vec());
        }
    }
    Err((
        StatusCode::BAD_REQUEST,
        "Missing multipart field 'file'".to_string(),
    ))
}
