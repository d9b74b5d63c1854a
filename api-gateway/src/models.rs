// ==============================================================================
// models.rs - API Data Models
// ==============================================================================
// Description: Response models for the pharmacogenomics API
// Author: Matt Barham
// Created: 2026-02-02
// Modified: 2026-02-06
// Version: 2.0.0
// ==============================================================================
// Analysis results are serialized straight from pgx_processor::AnalysisResult.
// ==============================================================================

use chrono::{DateTime, Utc};
use serde::Serialize;

/// API information response
#[derive(Debug, Serialize)]
pub struct ApiInfoResponse {
    pub service: &'static str,
    pub version: &'static str,
    pub endpoints: Vec<&'static str>,
}

/// Health check response
#[derive(Debug, Serialize)]
pub struct HealthResponse {
    pub status: &'static str,
    pub version: &'static str,
    pub gemini_configured: bool,
    pub supported_drugs: Vec<String>,
    pub supported_genes: Vec<String>,
    pub reference_version: String,
    pub timestamp: DateTime<Utc>,
}

/// Error response
#[derive(Debug, Serialize)]
pub struct ErrorResponse {
    pub detail: String,
}

impl ErrorResponse {
    pub fn new(detail: impl Into<String>) -> Self {
        Self {
            detail: detail.into(),
        }
    }
}
