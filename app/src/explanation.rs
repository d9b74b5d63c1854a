// ==============================================================================
// explanation.rs - Natural-Language Explanations
// ==============================================================================
// Description: Gemini-backed explainer with a deterministic template fallback
// Author: Matt Barham
// Created: 2026-02-05
// Modified: 2026-02-11
// Version: 1.1.0
// ==============================================================================
// API: POST {base_url}/v1beta/models/{model}:generateContent
// Failures (timeout, HTTP error, malformed JSON) never reach the caller: the
// template explanation is returned instead and the failure is logged.
// ==============================================================================

use async_trait::async_trait;
use serde::Deserialize;
use std::sync::Arc;
use std::time::Duration;
use thiserror::Error;
use tracing::{debug, info, warn};

use crate::models::{
    AppliedModifier, DetectedVariant, DrugInteraction, EvidenceScore, Explanation,
    ExplanationSource, HistoryFlag, Phenotype, RiskLabel, Severity,
};

pub const DEFAULT_GEMINI_MODEL: &str = "gemini-2.0-flash";
pub const DEFAULT_GEMINI_BASE_URL: &str = "https://generativelanguage.googleapis.com";
pub const DEFAULT_TIMEOUT_SECS: u64 = 15;

/// One initial attempt plus one retry
const MAX_ATTEMPTS: usize = 2;

#[derive(Error, Debug)]
pub enum ExplanationError {
    #[error("HTTP request failed: {0}")]
    Http(#[from] reqwest::Error),

    #[error("Explanation service returned {status}: {body}")]
    Status { status: u16, body: String },

    #[error("Explanation service returned no text")]
    EmptyResponse,

    #[error("Explanation is not valid JSON: {0}")]
    Parse(#[from] serde_json::Error),

    #[error("Explanation is missing field '{0}'")]
    MissingField(&'static str),
}

// ==============================================================================
// INPUT
// ==============================================================================

/// Everything an explainer may mention about one drug verdict
#[derive(Debug, Clone)]
pub struct ExplanationContext {
    pub drug: String,
    pub gene: String,
    pub diplotype: String,
    pub phenotype: Phenotype,
    pub activity_score: Option<f64>,
    pub label: RiskLabel,
    pub severity: Severity,
    pub variants: Vec<DetectedVariant>,
    pub modifiers: Vec<AppliedModifier>,
    pub interactions: Vec<DrugInteraction>,
    pub history_flags: Vec<HistoryFlag>,
    pub has_history: bool,
    /// `PatientHistory::summary_lines` of the supplied history
    pub patient_summary: Vec<String>,
    pub evidence: EvidenceScore,
    pub guideline_pmid: Option<String>,
}

impl ExplanationContext {
    fn variant_summary(&self) -> String {
        if self.variants.is_empty() {
            return "none reported".to_string();
        }
        self.variants
            .iter()
            .map(|v| format!("{} (GT={}, {})", v.rsid, v.genotype, v.zygosity.as_str()))
            .collect::<Vec<_>>()
            .join("; ")
    }
}

// ==============================================================================
// EXPLAINER TRAIT
// ==============================================================================

#[async_trait]
pub trait Explainer: Send + Sync {
    /// Produce an explanation; implementations never fail
    async fn explain(&self, context: &ExplanationContext) -> Explanation;

    /// Whether a remote explanation service is in use
    fn is_remote(&self) -> bool;
}

/// Deterministic four-section explanation
#[derive(Debug, Clone, Default)]
pub struct TemplateExplainer;

impl TemplateExplainer {
    pub fn render(&self, ctx: &ExplanationContext) -> Explanation {
        let history_note = if ctx.has_history {
            " Patient history was incorporated into this assessment."
        } else {
            " No patient history was provided; the assessment is genomic-only."
        };
        let interaction_note = if ctx.interactions.is_empty() {
            String::new()
        } else {
            let names: Vec<&str> = ctx.interactions.iter().map(|i| i.interacting_drug.as_str()).collect();
            format!(" Drug interaction(s) detected with {}.", names.join(", "))
        };
        let modifier_note = if ctx.modifiers.is_empty() {
            ""
        } else {
            " Patient-history modifiers adjusted the base genomic risk."
        };
        let guideline_note = ctx
            .guideline_pmid
            .as_deref()
            .map(|pmid| format!(" Supported by CPIC guideline (PMID:{}).", pmid))
            .unwrap_or_default();

        let summary = format!(
            "Patient carries {} {} ({}). Risk for {}: {} (severity: {}). Detected variants: {}.{}",
            ctx.gene,
            ctx.diplotype,
            ctx.phenotype.description(),
            ctx.drug,
            ctx.label,
            ctx.severity,
            ctx.variant_summary(),
            history_note
        );
        let mechanism = format!(
            "{} encodes an enzyme or transporter involved in the disposition of {}. The {} diplotype corresponds to {} activity, altering drug exposure.{}{}",
            ctx.gene,
            ctx.drug,
            ctx.diplotype,
            ctx.phenotype.description(),
            interaction_note,
            modifier_note
        );
        let justification = format!(
            "CPIC guidelines indicate that a {} of {} is at {} risk when taking {}. Severity is rated {}.{} Evidence level: {}. Overall evidence score: {}/100.",
            ctx.phenotype.description(),
            ctx.gene,
            ctx.label.as_str().to_lowercase(),
            ctx.drug,
            ctx.severity,
            guideline_note,
            ctx.evidence.level.as_str(),
            ctx.evidence.score
        );
        let mut recommendation = format!(
            "Consult a clinical pharmacist. Consider pharmacogenomic-guided dosing or alternative therapy for {}. Refer to CPIC guidelines for {}.",
            ctx.drug, ctx.gene
        );
        if !ctx.interactions.is_empty() {
            recommendation.push_str(" Review flagged drug interactions before prescribing.");
        }
        if !ctx.history_flags.is_empty() {
            recommendation.push_str(" Address patient-history warnings first.");
        }

        Explanation {
            summary,
            mechanism,
            justification,
            recommendation,
            source: ExplanationSource::Template,
        }
    }
}

#[async_trait]
impl Explainer for TemplateExplainer {
    async fn explain(&self, context: &ExplanationContext) -> Explanation {
        self.render(context)
    }

    fn is_remote(&self) -> bool {
        false
    }
}

// ==============================================================================
// GEMINI
// ==============================================================================

#[derive(Debug, Clone)]
pub struct GeminiConfig {
    pub api_key: String,
    pub model: String,
    pub base_url: String,
    pub timeout: Duration,
}

pub struct GeminiExplainer {
    client: reqwest::Client,
    config: GeminiConfig,
    fallback: TemplateExplainer,
}

/// The four keys requested from the model
#[derive(Debug, Default, Deserialize)]
#[serde(default)]
struct ExplanationPayload {
    summary: String,
    mechanism: String,
    justification: String,
    recommendation: String,
}

impl GeminiExplainer {
    pub fn new(config: GeminiConfig) -> Result<Self, ExplanationError> {
        let client = reqwest::Client::builder().timeout(config.timeout).build()?;
        Ok(Self {
            client,
            config,
            fallback: TemplateExplainer,
        })
    }

    fn endpoint(&self) -> String {
        format!(
            "{}/v1beta/models/{}:generateContent",
            self.config.base_url.trim_end_matches('/'),
            self.config.model
        )
    }

    async fn request(&self, prompt: &str) -> Result<Explanation, ExplanationError> {
        let body = serde_json::json!({
            "contents": [{ "parts": [{ "text": prompt }] }],
            "generationConfig": {
                "temperature": 0.2,
                "responseMimeType": "application/json"
            }
        });

        let response = self
            .client
            .post(self.endpoint())
            .header("x-goog-api-key", &self.config.api_key)
            .json(&body)
            .send()
            .await?;

        if !response.status().is_success() {
            let status = response.status().as_u16();
            let body = response
                .text()
                .await
                .unwrap_or_else(|_| "Unknown error".to_string());
            return Err(ExplanationError::Status { status, body });
        }

        let json: serde_json::Value = response.json().await?;
        let text = json
            .pointer("/candidates/0/content/parts/0/text")
            .and_then(|t| t.as_str())
            .ok_or(ExplanationError::EmptyResponse)?;

        parse_explanation(text)
    }
}

#[async_trait]
impl Explainer for GeminiExplainer {
    async fn explain(&self, context: &ExplanationContext) -> Explanation {
        let prompt = build_prompt(context);

        for attempt in 1..=MAX_ATTEMPTS {
            match self.request(&prompt).await {
                Ok(explanation) => {
                    debug!("Gemini explanation for {} (attempt {})", context.drug, attempt);
                    return explanation;
                }
                Err(e) => {
                    warn!(
                        "Gemini explanation for {} failed (attempt {}/{}): {}",
                        context.drug, attempt, MAX_ATTEMPTS, e
                    );
                }
            }
        }

        warn!("Using template explanation for {}", context.drug);
        self.fallback.render(context)
    }

    fn is_remote(&self) -> bool {
        true
    }
}

/// Strip markdown fences and parse the four-key JSON object
fn parse_explanation(text: &str) -> Result<Explanation, ExplanationError> {
    let mut body = text.trim();
    if let Some(rest) = body.strip_prefix("```") {
        body = rest.strip_prefix("json").unwrap_or(rest);
    }
    if let Some(rest) = body.strip_suffix("```") {
        body = rest;
    }
    let body = body.trim();
    if body.is_empty() {
        return Err(ExplanationError::EmptyResponse);
    }

    let payload: ExplanationPayload = serde_json::from_str(body)?;
    let fields = [
        ("summary", &payload.summary),
        ("mechanism", &payload.mechanism),
        ("justification", &payload.justification),
        ("recommendation", &payload.recommendation),
    ];
    if let Some((name, _)) = fields.iter().find(|(_, value)| value.trim().is_empty()) {
        return Err(ExplanationError::MissingField(*name));
    }

    Ok(Explanation {
        summary: payload.summary,
        mechanism: payload.mechanism,
        justification: payload.justification,
        recommendation: payload.recommendation,
        source: ExplanationSource::Gemini,
    })
}

fn build_prompt(ctx: &ExplanationContext) -> String {
    let modifiers = if ctx.modifiers.is_empty() {
        "No clinical modifiers applied.".to_string()
    } else {
        ctx.modifiers
            .iter()
            .map(|m| format!("  - {}", m.description))
            .collect::<Vec<_>>()
            .join("\n")
    };
    let interactions = if ctx.interactions.is_empty() {
        "None detected.".to_string()
    } else {
        ctx.interactions
            .iter()
            .map(|i| {
                format!(
                    "  - {} ({}): {} {}",
                    i.interacting_drug,
                    i.severity.as_str(),
                    i.mechanism,
                    i.recommendation
                )
            })
            .collect::<Vec<_>>()
            .join("\n")
    };
    let flags = if ctx.history_flags.is_empty() {
        if ctx.has_history {
            "  No history warnings.".to_string()
        } else {
            "  No patient history provided.".to_string()
        }
    } else {
        ctx.history_flags
            .iter()
            .map(|f| format!("  - [{}] {}", f.severity, f.message))
            .collect::<Vec<_>>()
            .join("\n")
    };
    let history = ctx
        .patient_summary
        .iter()
        .map(|line| format!("  {}\n", line))
        .collect::<String>();
    let activity = ctx
        .activity_score
        .map(|score| format!("{:.2}", score))
        .unwrap_or_else(|| "N/A".to_string());

    format!(
        "You are a clinical pharmacogenomics advisor providing evidence-based personalised drug recommendations.\n\n\
         PATIENT GENOMIC CONTEXT\n  Gene: {gene}\n  Diplotype: {diplotype}\n  Phenotype: {phenotype}\n  Activity score: {activity}\n  Detected variants: {variants}\n\n\
         DRUG PRESCRIBED\n  {drug}\n\n\
         RULE-ENGINE ASSESSMENT\n  Risk label: {label}\n  Severity: {severity}\n\n\
         PATIENT HISTORY\n{history}{flags}\n\n\
         DRUG INTERACTIONS\n{interactions}\n\n\
         CLINICAL MODIFIERS\n{modifiers}\n\n\
         EVIDENCE\n  Level: {level}\n  CPIC guideline PMID: {pmid}\n  Evidence score: {score}/100\n\n\
         Respond with EXACTLY this JSON object and nothing else (no markdown fences, no extra keys):\n\
         {{\"summary\": \"...\", \"mechanism\": \"...\", \"justification\": \"...\", \"recommendation\": \"...\"}}\n",
        gene = ctx.gene,
        diplotype = ctx.diplotype,
        phenotype = ctx.phenotype.description(),
        activity = activity,
        variants = ctx.variant_summary(),
        drug = ctx.drug,
        label = ctx.label,
        severity = ctx.severity,
        history = history,
        flags = flags,
        interactions = interactions,
        modifiers = modifiers,
        level = ctx.evidence.level.as_str(),
        pmid = ctx.guideline_pmid.as_deref().unwrap_or("N/A"),
        score = ctx.evidence.score,
    )
}

// ==============================================================================
// SELECTION
// ==============================================================================

/// Explainer settings (GEMINI_* / EXPLANATION_TIMEOUT_SECS)
#[derive(Debug, Clone)]
pub struct ExplanationSettings {
    pub api_key: Option<String>,
    pub model: String,
    pub base_url: String,
    pub timeout: Duration,
}

impl Default for ExplanationSettings {
    fn default() -> Self {
        Self {
            api_key: None,
            model: DEFAULT_GEMINI_MODEL.to_string(),
            base_url: DEFAULT_GEMINI_BASE_URL.to_string(),
            timeout: Duration::from_secs(DEFAULT_TIMEOUT_SECS),
        }
    }
}

impl ExplanationSettings {
    /// Read settings from the process environment
    pub fn from_env() -> Self {
        let defaults = Self::default();
        Self {
            api_key: std::env::var("GEMINI_API_KEY").ok(),
            model: std::env::var("GEMINI_MODEL").unwrap_or(defaults.model),
            base_url: std::env::var("GEMINI_BASE_URL").unwrap_or(defaults.base_url),
            timeout: std::env::var("EXPLANATION_TIMEOUT_SECS")
                .ok()
                .and_then(|s| s.parse::<u64>().ok())
                .map(Duration::from_secs)
                .unwrap_or(defaults.timeout),
        }
    }

    /// Non-blank API key, if any
    pub fn api_key(&self) -> Option<&str> {
        self.api_key
            .as_deref()
            .map(str::trim)
            .filter(|k| !k.is_empty())
    }
}

/// Choose the explainer once at startup
pub fn build_explainer(settings: &ExplanationSettings) -> Arc<dyn Explainer> {
    let Some(api_key) = settings.api_key() else {
        info!("GEMINI_API_KEY not configured; using template explanations");
        return Arc::new(TemplateExplainer);
    };

    let config = GeminiConfig {
        api_key: api_key.to_string(),
        model: settings.model.clone(),
        base_url: settings.base_url.clone(),
        timeout: settings.timeout,
    };
    match GeminiExplainer::new(config) {
        Ok(explainer) => {
            info!("Gemini explainer initialised ({})", settings.model);
            Arc::new(explainer)
        }
        Err(e) => {
            warn!("Failed to initialise Gemini client, using template explanations: {}", e);
            Arc::new(TemplateExplainer)
        }
    }
}
