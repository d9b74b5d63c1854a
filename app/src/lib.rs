// ==============================================================================
// lib.rs - Pharmacogenomics Processor Library
// ==============================================================================
// Description: Library interface for the pharmacogenomic analysis pipeline
// Author: Matt Barham
// Created: 2026-02-02
// Modified: 2026-02-09
// Version: 2.0.0
// ==============================================================================

pub mod audit;
pub mod error;
pub mod evidence;
pub mod explanation;
pub mod interactions;
pub mod models;
pub mod parsers;
pub mod phenotype;
pub mod processor;
pub mod recommendation;
pub mod reference;
pub mod risk;

pub use error::AnalysisError;
pub use explanation::{build_explainer, Explainer, ExplanationSettings};
pub use models::AnalysisResult;
pub use processor::{AnalysisPipeline, AnalysisRequest, MAX_DRUGS_PER_REQUEST};
pub use reference::ReferenceData;
