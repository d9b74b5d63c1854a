// ==============================================================================
// state.rs - Application State Management
// ==============================================================================
// Description: Shared application state for the pharmacogenomics API gateway
// Author: Matt Barham
// Created: 2026-02-02
// Modified: 2026-02-08
// Version: 2.0.0
// ==============================================================================

use anyhow::{Context, Result};
use pgx_processor::{build_explainer, AnalysisPipeline, ExplanationSettings, ReferenceData};
use std::path::PathBuf;
use std::sync::Arc;
use tracing::info;

/// Shared application state
#[derive(Clone)]
pub struct AppState {
    inner: Arc<AppStateInner>,
}

struct AppStateInner {
    /// Analysis pipeline (reference data + explainer), read-only after startup
    pub pipeline: AnalysisPipeline,
}

impl AppState {
    /// Create new application state from environment
    pub fn new() -> Result<Self> {
        // Optional override of the embedded knowledge base
        let reference = match std::env::var("PGX_REFERENCE_PATH") {
            Ok(path) if !path.trim().is_empty() => {
                let path = PathBuf::from(path.trim());
                ReferenceData::load(&path).with_context(|| {
                    format!("Failed to load reference data from {}", path.display())
                })?
            }
            _ => ReferenceData::builtin().context("Failed to load built-in reference data")?,
        };
        info!(
            "Reference data {} loaded ({} drugs, {} genes)",
            reference.version(),
            reference.supported_drugs().len(),
            reference.supported_genes().len()
        );

        let explainer = build_explainer(&ExplanationSettings::from_env());

        Ok(Self::with_pipeline(AnalysisPipeline::new(
            Arc::new(reference),
            explainer,
        )))
    }

    pub fn with_pipeline(pipeline: AnalysisPipeline) -> Self {
        Self {
            inner: Arc::new(AppStateInner { pipeline }),
        }
    }

    /// Get analysis pipeline
    pub fn pipeline(&self) -> &AnalysisPipeline {
        &self.inner.pipeline
    }

    /// Create state backed by the built-in tables and template explanations
    #[cfg(test)]
    pub fn mock() -> Self {
        use pgx_processor::explanation::TemplateExplainer;

        let reference = ReferenceData::builtin().expect("built-in reference data");
        Self::with_pipeline(AnalysisPipeline::new(
            Arc::new(reference),
            Arc::new(TemplateExplainer),
        ))
    }
}
