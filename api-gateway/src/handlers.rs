// ==============================================================================
// handlers.rs - API Request Handlers
// ==============================================================================
// Description: HTTP request handlers for pharmacogenomics API endpoints
// Author: Matt Barham
// Created: 2026-02-02
// Modified: 2026-02-11
// Version: 2.1.0
// ==============================================================================

use axum::{
    body::Bytes,
    extract::{multipart::MultipartError, Multipart, State},
    http::StatusCode,
    response::{IntoResponse, Response},
    Json,
};
use chrono::Utc;
use pgx_processor::{AnalysisError, AnalysisRequest, AnalysisResult};
use tracing::{error, info, warn};

use crate::{models::*, state::AppState, validator::FileValidator};

/// Root endpoint - API information
pub async fn root() -> Json<ApiInfoResponse> {
    Json(ApiInfoResponse {
        service: "Pharmacogenomics API Gateway",
        version: env!("CARGO_PKG_VERSION"),
        endpoints: vec![
            "/api/health - Health check (GET)",
            "/api/analyze - Analyze a VCF against drugs (POST, multipart: vcf_file, drugs, patient_id, patient_history)",
        ],
    })
}

/// Health check endpoint
pub async fn health_check(State(state): State<AppState>) -> Json<HealthResponse> {
    let pipeline = state.pipeline();
    let reference = pipeline.reference();

    Json(HealthResponse {
        status: "ok",
        version: env!("CARGO_PKG_VERSION"),
        gemini_configured: pipeline.explainer_is_remote(),
        supported_drugs: reference.supported_drugs(),
        supported_genes: reference.supported_genes(),
        reference_version: reference.version().to_string(),
        timestamp: Utc::now(),
    })
}

/// Analysis endpoint (multipart upload)
pub async fn analyze(
    State(state): State<AppState>,
    mut multipart: Multipart,
) -> Result<Json<Vec<AnalysisResult>>, AppError> {
    info!("Received analysis request");

    let mut vcf_upload: Option<(String, Bytes)> = None;
    let mut drugs: Option<String> = None;
    let mut patient_id: Option<String> = None;
    let mut patient_history: Option<String> = None;

    // Collect all fields first; validation needs the patient id for auditing
    while let Some(field) = multipart
        .next_field()
        .await
        .map_err(|e| multipart_error("Failed to read multipart field", e))?
    {
        let name = field.name().unwrap_or("").to_string();

        match name.as_str() {
            "vcf_file" => {
                let filename = field.file_name().unwrap_or("upload.vcf").to_string();
                let data = field
                    .bytes()
                    .await
                    .map_err(|e| multipart_error("Failed to read VCF file", e))?;
                vcf_upload = Some((filename, data));
            }
            "drugs" | "patient_id" | "patient_history" => {
                let value = field.text().await.map_err(|e| {
                    multipart_error(&format!("Failed to read field '{}'", name), e)
                })?;
                match name.as_str() {
                    "drugs" => drugs = Some(value),
                    "patient_id" => patient_id = Some(value),
                    _ => patient_history = Some(value),
                }
            }
            other => {
                warn!("Ignoring unknown multipart field: {}", other);
            }
        }
    }

    let (filename, data) = vcf_upload
        .ok_or_else(|| AppError::BadRequest("Missing required file field 'vcf_file'".to_string()))?;

    // SECURITY: Validate upload before parsing
    let validated = FileValidator::new()
        .validate_upload(&filename, &data, patient_id.as_deref())
        .map_err(|e| AppError::BadRequest(format!("Invalid VCF file: {}", e)))?;

    info!(
        "VCF file validated: {} as {} ({} bytes)",
        validated.original_name, validated.safe_name, validated.size
    );

    let request = AnalysisRequest {
        vcf_bytes: data.to_vec(),
        drugs: drugs.unwrap_or_default(),
        patient_id,
        patient_history,
    };

    // Run on its own task so a panic in the pipeline surfaces as a 500
    let results = tokio::spawn(async move { state.pipeline().analyze(request).await })
        .await
        .map_err(|e| AppError::Internal(anyhow::Error::new(e).context("Analysis task failed")))??;
    info!("Analysis returned {} result(s)", results.len());

    Ok(Json(results))
}

/// Map a multipart read failure, keeping the body-limit case distinct
fn multipart_error(context: &str, err: MultipartError) -> AppError {
    let detail = format!("{}: {}", context, err);
    if err.status() == StatusCode::PAYLOAD_TOO_LARGE {
        AppError::PayloadTooLarge(detail)
    } else {
        AppError::BadRequest(detail)
    }
}

/// Application error type
#[derive(Debug)]
pub enum AppError {
    BadRequest(String),
    PayloadTooLarge(String),
    Internal(anyhow::Error),
}

impl From<AnalysisError> for AppError {
    fn from(err: AnalysisError) -> Self {
        AppError::BadRequest(err.to_string())
    }
}

impl IntoResponse for AppError {
    fn into_response(self) -> Response {
        let (status, detail) = match self {
            AppError::BadRequest(msg) => {
                warn!("Rejected request: {}", msg);
                (StatusCode::BAD_REQUEST, msg)
            }
            AppError::PayloadTooLarge(msg) => {
                warn!("Rejected oversized request: {}", msg);
                (StatusCode::PAYLOAD_TOO_LARGE, msg)
            }
            AppError::Internal(e) => {
                error!("Internal error: {:#}", e);
                (
                    StatusCode::INTERNAL_SERVER_ERROR,
                    "Internal server error".to_string(),
                )
            }
        };

        let body = Json(ErrorResponse::new(detail));
        (status, body).into_response()
    }
}
