// ==============================================================================
// main.rs - Pharmacogenomics Processor CLI
// ==============================================================================
// Description: Offline entry point running the analysis pipeline on a local VCF
// Author: Matt Barham
// Created: 2026-02-02
// Modified: 2026-02-09
// Version: 2.0.0
// ==============================================================================

use anyhow::{Context, Result};
use clap::Parser;
use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;
use tracing::{error, info};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

use pgx_processor::explanation::{
    DEFAULT_GEMINI_BASE_URL, DEFAULT_GEMINI_MODEL, DEFAULT_TIMEOUT_SECS,
};
use pgx_processor::{
    build_explainer, AnalysisPipeline, AnalysisRequest, ExplanationSettings, ReferenceData,
};

#[derive(Parser, Debug)]
#[command(author, version, about = "Pharmacogenomic risk analysis for a local VCF", long_about = None)]
struct Args {
    /// Variant file (plain or gzip-compressed VCF)
    #[arg(short, long)]
    vcf: PathBuf,

    /// Comma-separated drug names (e.g. "CODEINE,WARFARIN")
    #[arg(short, long)]
    drugs: String,

    /// Patient history JSON file
    #[arg(long)]
    patient_history: Option<PathBuf>,

    /// Patient identifier echoed into every result
    #[arg(long)]
    patient_id: Option<String>,

    /// Reference knowledge base (defaults to the built-in tables)
    #[arg(short, long, env = "PGX_REFERENCE_PATH")]
    reference: Option<PathBuf>,

    /// Pretty-print the JSON output
    #[arg(long)]
    pretty: bool,

    /// Gemini API key (template explanations when absent)
    #[arg(long, env = "GEMINI_API_KEY", hide_env_values = true)]
    gemini_api_key: Option<String>,

    #[arg(long, env = "GEMINI_MODEL", default_value = DEFAULT_GEMINI_MODEL)]
    gemini_model: String,

    #[arg(long, env = "GEMINI_BASE_URL", default_value = DEFAULT_GEMINI_BASE_URL)]
    gemini_base_url: String,

    /// Explanation request timeout in seconds
    #[arg(long, env = "EXPLANATION_TIMEOUT_SECS", default_value_t = DEFAULT_TIMEOUT_SECS)]
    explanation_timeout_secs: u64,
}

#[tokio::main]
async fn main() -> Result<()> {
    // Logs go to stderr so stdout stays pure JSON
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "pgx_processor=info".into()),
        )
        .with(tracing_subscriber::fmt::layer().with_writer(std::io::stderr))
        .init();

    let args = Args::parse();
    info!("pgx-analyze starting...");

    let reference = match &args.reference {
        Some(path) => ReferenceData::load(path)
            .with_context(|| format!("Failed to load reference data from {}", path.display()))?,
        None => ReferenceData::builtin().context("Failed to load built-in reference data")?,
    };
    info!("Reference data version {}", reference.version());

    let vcf_bytes = tokio::fs::read(&args.vcf)
        .await
        .with_context(|| format!("Failed to read VCF file {}", args.vcf.display()))?;

    let patient_history = match &args.patient_history {
        Some(path) => Some(
            tokio::fs::read_to_string(path)
                .await
                .with_context(|| format!("Failed to read patient history {}", path.display()))?,
        ),
        None => None,
    };

    let settings = ExplanationSettings {
        api_key: args.gemini_api_key.clone(),
        model: args.gemini_model.clone(),
        base_url: args.gemini_base_url.clone(),
        timeout: Duration::from_secs(args.explanation_timeout_secs),
    };
    let pipeline = AnalysisPipeline::new(Arc::new(reference), build_explainer(&settings));

    let request = AnalysisRequest {
        vcf_bytes,
        drugs: args.drugs.clone(),
        patient_id: args.patient_id.clone(),
        patient_history,
    };

    let results = match pipeline.analyze(request).await {
        Ok(results) => results,
        Err(e) => {
            error!("Analysis failed: {}", e);
            return Err(e.into());
        }
    };

    let output = if args.pretty {
        serde_json::to_string_pretty(&results)?
    } else {
        serde_json::to_string(&results)?
    };
    println!("{}", output);

    info!("Analysis completed for {} drug(s)", results.len());
    Ok(())
}
