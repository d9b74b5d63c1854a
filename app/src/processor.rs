// ==============================================================================
// processor.rs - Pharmacogenomic Analysis Pipeline
// ==============================================================================
// Description: Validates a request, runs every stage per drug, assembles results
// Author: Matt Barham
// Created: 2026-02-02
// Modified: 2026-02-11
// Version: 2.1.0
// ==============================================================================
// Stages (per drug, after a single VCF parse):
//   phenotype -> risk -> interactions/flags -> evidence -> recommendation
// Explanations for all drugs are then requested concurrently.
// ==============================================================================

use futures::future::join_all;
use std::collections::HashSet;
use std::sync::Arc;
use tracing::{debug, info};

use crate::audit::{self, AuditEventType};
use crate::error::AnalysisError;
use crate::evidence::score_evidence;
use crate::explanation::{ExplanationContext, Explainer};
use crate::interactions::InteractionChecker;
use crate::models::{
    AnalysisResult, ClinicalRecommendation, DetectedVariant, EvidenceScore, HistoryFlag,
    PatientHistory, QualityMetrics, RiskAssessment, Variant,
};
use crate::parsers::VcfParser;
use crate::phenotype::PhenotypeResolver;
use crate::recommendation::build_recommendation;
use crate::reference::ReferenceData;
use crate::risk::RiskClassifier;

/// Maximum distinct drugs per request
pub const MAX_DRUGS_PER_REQUEST: usize = 6;

/// One analysis request as received from the gateway or CLI
#[derive(Debug, Clone, Default)]
pub struct AnalysisRequest {
    /// Raw upload bytes (plain or gzip VCF)
    pub vcf_bytes: Vec<u8>,
    /// Comma-separated drug names
    pub drugs: String,
    pub patient_id: Option<String>,
    /// Patient history as a JSON document
    pub patient_history: Option<String>,
}

/// Everything computed for a drug before its explanation arrives
struct DrugVerdict {
    drug: String,
    gene: String,
    diplotype: String,
    gene_variant_count: usize,
    risk: RiskAssessment,
    detected_variants: Vec<DetectedVariant>,
    history_flags: Vec<HistoryFlag>,
    evidence: EvidenceScore,
    recommendation: ClinicalRecommendation,
    context: ExplanationContext,
}

pub struct AnalysisPipeline {
    reference: Arc<ReferenceData>,
    explainer: Arc<dyn Explainer>,
    parser: VcfParser,
}

impl AnalysisPipeline {
    pub fn new(reference: Arc<ReferenceData>, explainer: Arc<dyn Explainer>) -> Self {
        Self {
            reference,
            explainer,
            parser: VcfParser::new(),
        }
    }

    /// Replace the VCF parser (e.g. a different size limit)
    pub fn with_parser(mut self, parser: VcfParser) -> Self {
        self.parser = parser;
        self
    }

    pub fn reference(&self) -> &ReferenceData {
        &self.reference
    }

    /// Whether explanations come from a remote service
    pub fn explainer_is_remote(&self) -> bool {
        self.explainer.is_remote()
    }

    /// Run a full analysis
    ///
    /// # Returns
    /// * `Ok(Vec<AnalysisResult>)` - One result per distinct drug, in request order
    /// * `Err(AnalysisError)` - Request rejected (nothing partial is returned)
    pub async fn analyze(&self, request: AnalysisRequest) -> Result<Vec<AnalysisResult>, AnalysisError> {
        let patient_id = request
            .patient_id
            .as_deref()
            .map(str::trim)
            .filter(|p| !p.is_empty())
            .map(str::to_string);

        match self.run(&request, patient_id.as_deref()).await {
            Ok(results) => {
                audit::log_event(
                    AuditEventType::AnalysisCompleted,
                    patient_id.as_deref(),
                    None,
                    serde_json::json!({
                        "drugs": results.iter().map(|r| r.drug_name.as_str()).collect::<Vec<_>>(),
                        "labels": results.iter().map(|r| r.risk_assessment.label.as_str()).collect::<Vec<_>>(),
                    }),
                );
                Ok(results)
            }
            Err(e) => {
                audit::log_event(
                    AuditEventType::AnalysisRejected,
                    patient_id.as_deref(),
                    None,
                    serde_json::json!({ "reason": e.to_string() }),
                );
                Err(e)
            }
        }
    }

    async fn run(
        &self,
        request: &AnalysisRequest,
        patient_id: Option<&str>,
    ) -> Result<Vec<AnalysisResult>, AnalysisError> {
        // 1. Validate request before touching the file
        let drugs = parse_drug_list(&request.drugs)?;
        self.check_supported(&drugs)?;
        let history = parse_patient_history(request.patient_history.as_deref())?;

        audit::log_event(
            AuditEventType::AnalysisAccepted,
            patient_id,
            None,
            serde_json::json!({
                "drugs": &drugs,
                "file_size": request.vcf_bytes.len(),
                "has_history": history.is_some(),
            }),
        );

        // 2. Parse variant file once
        let parsed = self.parser.parse_bytes(&request.vcf_bytes)?;
        info!(
            "Analyzing {} drug(s) against {} variants (sha256 {})",
            drugs.len(),
            parsed.variants.len(),
            parsed.sha256
        );

        // 3. Per-drug stages
        let mut verdicts = Vec::with_capacity(drugs.len());
        for drug in &drugs {
            verdicts.push(self.evaluate(drug, &drugs, &parsed.variants, history.as_ref())?);
        }

        // 4. Explanations fan out concurrently, order preserved
        let explanations = join_all(
            verdicts
                .iter()
                .map(|v| self.explainer.explain(&v.context)),
        )
        .await;

        // 5. Assemble
        let results = verdicts
            .into_iter()
            .zip(explanations)
            .map(|(verdict, explanation)| AnalysisResult {
                drug_name: verdict.drug,
                patient_id: patient_id.map(str::to_string),
                primary_gene: verdict.gene,
                diplotype: verdict.diplotype,
                metabolizer_status: verdict.context.phenotype,
                activity_score: verdict.context.activity_score,
                risk_assessment: verdict.risk,
                detected_variants: verdict.detected_variants,
                drug_interactions: verdict.context.interactions,
                history_flags: verdict.history_flags,
                evidence_score: verdict.evidence,
                clinical_recommendations: verdict.recommendation,
                llm_explanation: explanation,
                quality_metrics: QualityMetrics {
                    variants_parsed: parsed.variants.len(),
                    skipped_rows: parsed.skipped_rows,
                    gene_variant_count: verdict.gene_variant_count,
                    history_provided: history.is_some(),
                    input_sha256: parsed.sha256.clone(),
                },
            })
            .collect();

        Ok(results)
    }

    /// Fail fast listing every unsupported drug
    fn check_supported(&self, drugs: &[String]) -> Result<(), AnalysisError> {
        let unsupported: Vec<String> = drugs
            .iter()
            .filter(|d| self.reference.drug(d).is_none())
            .cloned()
            .collect();

        if unsupported.is_empty() {
            Ok(())
        } else {
            Err(AnalysisError::UnsupportedDrug {
                drugs: unsupported,
                supported: self.reference.supported_drugs(),
            })
        }
    }

    fn evaluate(
        &self,
        drug: &str,
        batch: &[String],
        variants: &[Variant],
        history: Option<&PatientHistory>,
    ) -> Result<DrugVerdict, AnalysisError> {
        let info = self
            .reference
            .drug(drug)
            .ok_or_else(|| AnalysisError::UnsupportedDrug {
                drugs: vec![drug.to_string()],
                supported: self.reference.supported_drugs(),
            })?;
        let gene = info.primary_gene.as_str();

        let call = PhenotypeResolver::new(&self.reference).resolve(gene, variants);
        let outcome = RiskClassifier::new(&self.reference).classify(drug, &call, history)?;

        let checker = InteractionChecker::new(&self.reference);
        let interactions = checker.check(drug, batch, history);
        let history_flags = checker.history_flags(drug, history);

        let evidence = score_evidence(
            outcome.evidence_level,
            info.guideline_pmid.as_deref(),
            call.pathogenic_count,
            history.is_some(),
        );
        let recommendation = build_recommendation(
            drug,
            gene,
            call.phenotype,
            outcome.assessment.label,
            &interactions,
            &history_flags,
            &info.alternatives,
        );
        let detected_variants: Vec<DetectedVariant> = variants
            .iter()
            .filter(|v| v.is_in_gene(gene))
            .map(DetectedVariant::from)
            .collect();

        debug!(
            "{}: {} {} ({}) -> {} / {}%",
            drug,
            gene,
            call.diplotype,
            call.phenotype,
            outcome.assessment.label,
            outcome.assessment.percentage
        );

        let context = ExplanationContext {
            drug: drug.to_string(),
            gene: gene.to_string(),
            diplotype: call.diplotype.clone(),
            phenotype: call.phenotype,
            activity_score: call.activity_score,
            label: outcome.assessment.label,
            severity: outcome.assessment.severity,
            variants: detected_variants.clone(),
            modifiers: outcome.assessment.modifiers.clone(),
            interactions,
            history_flags: history_flags.clone(),
            has_history: history.is_some(),
            patient_summary: history.map(PatientHistory::summary_lines).unwrap_or_default(),
            evidence: evidence.clone(),
            guideline_pmid: info.guideline_pmid.clone(),
        };

        Ok(DrugVerdict {
            drug: drug.to_string(),
            gene: gene.to_string(),
            diplotype: call.diplotype,
            gene_variant_count: call.variant_count,
            risk: outcome.assessment,
            detected_variants,
            history_flags,
            evidence,
            recommendation,
            context,
        })
    }
}

/// Split, trim, upper-case and de-duplicate a comma-separated drug list
pub fn parse_drug_list(raw: &str) -> Result<Vec<String>, AnalysisError> {
    let mut seen = HashSet::new();
    let drugs: Vec<String> = raw
        .split(',')
        .map(|d| d.trim().to_uppercase())
        .filter(|d| !d.is_empty())
        .filter(|d| seen.insert(d.clone()))
        .collect();

    if drugs.is_empty() {
        return Err(AnalysisError::Validation(
            "At least one drug name is required".to_string(),
        ));
    }
    if drugs.len() > MAX_DRUGS_PER_REQUEST {
        return Err(AnalysisError::Validation(format!(
            "Too many drugs: {} distinct names given (max {})",
            drugs.len(),
            MAX_DRUGS_PER_REQUEST
        )));
    }

    Ok(drugs)
}

/// Parse optional patient history JSON (blank means absent)
pub fn parse_patient_history(raw: Option<&str>) -> Result<Option<PatientHistory>, AnalysisError> {
    match raw.map(str::trim).filter(|s| !s.is_empty()) {
        None => Ok(None),
        Some(json) => serde_json::from_str(json)
            .map(Some)
            .map_err(|e| AnalysisError::Validation(format!("Invalid patient_history JSON: {}", e))),
    }
}
