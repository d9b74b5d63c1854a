// ==============================================================================
// main.rs - Pharmacogenomics API Gateway Entry Point
// ==============================================================================
// Description: Axum web server for pharmacogenomic risk analysis
// Author: Matt Barham
// Created: 2026-02-02
// Modified: 2026-02-11
// Version: 2.1.0
// ==============================================================================

use anyhow::{Context, Result};
use axum::{
    extract::DefaultBodyLimit,
    http::{header, Method},
    routing::{get, post},
    Router,
};
use std::net::SocketAddr;
use tower::ServiceBuilder;
use tower_http::{
    cors::{AllowOrigin, CorsLayer},
    trace::TraceLayer,
};
use tracing::info;

mod handlers;
mod models;
mod state;
mod validator;

use state::AppState;

const DEFAULT_PORT: u16 = 8000;

/// Request body limit (covers the 5 MB VCF plus multipart framing and history)
const MAX_BODY_BYTES: usize = 8 * 1024 * 1024;

#[tokio::main]
async fn main() -> Result<()> {
    // Load environment variables
    dotenvy::dotenv().ok();

    // Initialize tracing
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env().unwrap_or_else(|_| {
                "pgx_api_gateway=info,pgx_processor=info,tower_http=info".into()
            }),
        )
        .with_target(false)
        .compact()
        .init();

    info!("Starting Pharmacogenomics API Gateway v{}", env!("CARGO_PKG_VERSION"));

    let server_port = match std::env::var("PGX_PORT") {
        Ok(port) => port
            .trim()
            .parse::<u16>()
            .with_context(|| format!("Invalid PGX_PORT value: {}", port))?,
        Err(_) => DEFAULT_PORT,
    };

    // Initialize application state
    let state = AppState::new().context("Failed to initialize application state")?;

    // Build router with all endpoints
    let app = build_router(state);

    // Bind server
    let addr = SocketAddr::from(([0, 0, 0, 0], server_port));
    info!("API Gateway listening on {}", addr);

    let listener = tokio::net::TcpListener::bind(addr)
        .await
        .context("Failed to bind to address")?;

    // Run server
    axum::serve(listener, app)
        .await
        .context("Server error")?;

    Ok(())
}

fn build_router(state: AppState) -> Router {
    // API routes
    let api_routes = Router::new()
        .route("/analyze", post(handlers::analyze))
        .route("/health", get(handlers::health_check));

    // Origins are configured via CORS_ALLOWED_ORIGINS env var (comma-separated)
    // Example: CORS_ALLOWED_ORIGINS=https://pgx.example.com,https://test.example.com
    let cors_origins = std::env::var("CORS_ALLOWED_ORIGINS")
        .unwrap_or_else(|_| "http://localhost:3000".to_string());
    let allowed_origins: Vec<_> = cors_origins
        .split(',')
        .filter_map(|s| s.trim().parse().ok())
        .collect();

    let cors = CorsLayer::new()
        .allow_origin(AllowOrigin::list(allowed_origins))
        .allow_credentials(false)
        .allow_methods([Method::GET, Method::POST, Method::OPTIONS])
        .allow_headers([header::CONTENT_TYPE, header::ACCEPT])
        .expose_headers([header::CONTENT_TYPE]);

    Router::new()
        .route("/", get(handlers::root))
        .nest("/api", api_routes)
        .layer(
            ServiceBuilder::new()
                // Request tracing
                .layer(TraceLayer::new_for_http())
                .layer(cors)
                .layer(DefaultBodyLimit::max(MAX_BODY_BYTES)),
        )
        .with_state(state)
}

#[cfg(test)]
mod tests {
    use super::*;
    use axum::body::{to_bytes, Body};
    use axum::http::{Request, StatusCode};
    use tower::ServiceExt;

    const SAMPLE_VCF: &str = include_str!("../../app/data/sample_patient.vcf");
    const BOUNDARY: &str = "pgx-test-boundary";

    /// Build a multipart body from (name, optional filename, content) parts
    fn multipart_body(parts: &[(&str, Option<&str>, &str)]) -> Body {
        let mut body = String::new();
        for (name, filename, content) in parts {
            body.push_str(&format!("--{}\r\n", BOUNDARY));
            match filename {
                Some(file) => body.push_str(&format!(
                    "Content-Disposition: form-data; name=\"{}\"; filename=\"{}\"\r\nContent-Type: text/plain\r\n\r\n",
                    name, file
                )),
                None => body.push_str(&format!(
                    "Content-Disposition: form-data; name=\"{}\"\r\n\r\n",
                    name
                )),
            }
            body.push_str(content);
            body.push_str("\r\n");
        }
        body.push_str(&format!("--{}--\r\n", BOUNDARY));
        Body::from(body)
    }

    fn analyze_request(parts: &[(&str, Option<&str>, &str)]) -> Request<Body> {
        Request::builder()
            .method("POST")
            .uri("/api/analyze")
            .header(
                header::CONTENT_TYPE,
                format!("multipart/form-data; boundary={}", BOUNDARY),
            )
            .body(multipart_body(parts))
            .unwrap()
    }

    async fn json_body(response: axum::response::Response) -> serde_json::Value {
        let bytes = to_bytes(response.into_body(), usize::MAX).await.unwrap();
        serde_json::from_slice(&bytes).unwrap()
    }

    #[tokio::test]
    async fn test_health_reports_supported_drugs() {
        let app = build_router(AppState::mock());
        let response = app
            .oneshot(Request::builder().uri("/api/health").body(Body::empty()).unwrap())
            .await
            .unwrap();

        assert_eq!(response.status(), StatusCode::OK);
        let json = json_body(response).await;
        assert_eq!(json["status"], "ok");
        assert_eq!(json["gemini_configured"], false);
        assert!(json["supported_drugs"]
            .as_array()
            .unwrap()
            .iter()
            .any(|d| d == "CODEINE"));
    }

    #[tokio::test]
    async fn test_root_lists_endpoints() {
        let app = build_router(AppState::mock());
        let response = app
            .oneshot(Request::builder().uri("/").body(Body::empty()).unwrap())
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::OK);
    }

    #[tokio::test]
    async fn test_analyze_returns_one_result_per_drug() {
        let app = build_router(AppState::mock());
        let response = app
            .oneshot(analyze_request(&[
                ("vcf_file", Some("patient.vcf"), SAMPLE_VCF),
                ("drugs", None, "Codeine, Warfarin, codeine"),
                ("patient_id", None, "PATIENT_001"),
            ]))
            .await
            .unwrap();

        assert_eq!(response.status(), StatusCode::OK);
        let json = json_body(response).await;
        let results = json.as_array().unwrap();
        assert_eq!(results.len(), 2);
        assert_eq!(results[0]["drug_name"], "CODEINE");
        assert_eq!(results[0]["patient_id"], "PATIENT_001");
        assert_eq!(results[0]["metabolizer_status"], "PM");
        assert_eq!(results[0]["risk_assessment"]["label"], "Ineffective");
        assert_eq!(results[1]["drug_name"], "WARFARIN");
        assert_eq!(results[1]["llm_explanation"]["source"], "template");
        assert_eq!(results[0]["activity_score"], 0.0);
        assert_eq!(results[0]["quality_metrics"]["variants_parsed"], 8);
        assert_eq!(
            results[0]["quality_metrics"]["input_sha256"]
                .as_str()
                .unwrap()
                .len(),
            64
        );
    }

    #[tokio::test]
    async fn test_oversized_upload_is_payload_too_large() {
        let app = build_router(AppState::mock());
        let oversized = "x".repeat(MAX_BODY_BYTES + 1024 * 1024);
        let response = app
            .oneshot(analyze_request(&[
                ("vcf_file", Some("patient.vcf"), &oversized),
                ("drugs", None, "CODEINE"),
            ]))
            .await
            .unwrap();

        assert_eq!(response.status(), StatusCode::PAYLOAD_TOO_LARGE);
    }

    #[tokio::test]
    async fn test_unsupported_drug_is_bad_request() {
        let app = build_router(AppState::mock());
        let response = app
            .oneshot(analyze_request(&[
                ("vcf_file", Some("patient.vcf"), SAMPLE_VCF),
                ("drugs", None, "Ibuprofen"),
            ]))
            .await
            .unwrap();

        assert_eq!(response.status(), StatusCode::BAD_REQUEST);
        let json = json_body(response).await;
        assert!(json["detail"].as_str().unwrap().contains("IBUPROFEN"));
    }

    #[tokio::test]
    async fn test_missing_file_is_bad_request() {
        let app = build_router(AppState::mock());
        let response = app
            .oneshot(analyze_request(&[("drugs", None, "CODEINE")]))
            .await
            .unwrap();

        assert_eq!(response.status(), StatusCode::BAD_REQUEST);
        let json = json_body(response).await;
        assert!(json["detail"].as_str().unwrap().contains("vcf_file"));
    }

    #[tokio::test]
    async fn test_disallowed_extension_is_bad_request() {
        let app = build_router(AppState::mock());
        let response = app
            .oneshot(analyze_request(&[
                ("vcf_file", Some("patient.exe"), SAMPLE_VCF),
                ("drugs", None, "CODEINE"),
            ]))
            .await
            .unwrap();

        assert_eq!(response.status(), StatusCode::BAD_REQUEST);
    }

    #[tokio::test]
    async fn test_malformed_history_is_bad_request() {
        let app = build_router(AppState::mock());
        let response = app
            .oneshot(analyze_request(&[
                ("vcf_file", Some("patient.vcf"), SAMPLE_VCF),
                ("drugs", None, "CODEINE"),
                ("patient_history", None, "{\"kidney\": "),
            ]))
            .await
            .unwrap();

        assert_eq!(response.status(), StatusCode::BAD_REQUEST);
        let json = json_body(response).await;
        assert!(json["detail"].as_str().unwrap().contains("patient_history"));
    }
}
