// ==============================================================================
// models.rs - Pharmacogenomic Data Models
// ==============================================================================
// Description: Variant, phenotype, risk and per-drug result data structures
// Author: Matt Barham
// Created: 2026-02-02
// Modified: 2026-02-11
// Version: 1.0.0
// ==============================================================================

use serde::{Deserialize, Serialize};
use std::fmt;

// ==============================================================================
// VARIANTS
// ==============================================================================

/// Zygosity derived from the sample genotype string
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Zygosity {
    /// Two identical allele tokens (e.g. "1/1", "0|0")
    Homozygous,
    /// Two distinct allele tokens (e.g. "0/1")
    Heterozygous,
    /// A single allele token (haploid / X-linked, e.g. "1")
    Hemizygous,
    /// Missing, fully no-call, or polyploid genotype
    Unknown,
}

impl Zygosity {
    /// Derive zygosity from a VCF GT value
    ///
    /// Alleles are separated by "/" (unphased) or "|" (phased); no-call
    /// tokens (".") are dropped before counting.
    pub fn from_genotype(genotype: &str) -> Self {
        let alleles: Vec<&str> = genotype
            .split(['/', '|'])
            .map(str::trim)
            .filter(|a| !a.is_empty() && *a != ".")
            .collect();

        match alleles.as_slice() {
            [_] => Zygosity::Hemizygous,
            [a, b] if a == b => Zygosity::Homozygous,
            [_, _] => Zygosity::Heterozygous,
            _ => Zygosity::Unknown,
        }
    }

    /// Number of allele copies a call with this zygosity contributes to a diplotype
    pub fn copies(&self) -> u8 {
        match self {
            Zygosity::Homozygous => 2,
            Zygosity::Heterozygous | Zygosity::Hemizygous | Zygosity::Unknown => 1,
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            Zygosity::Homozygous => "homozygous",
            Zygosity::Heterozygous => "heterozygous",
            Zygosity::Hemizygous => "hemizygous",
            Zygosity::Unknown => "unknown",
        }
    }
}

/// One data row of the variant file
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Variant {
    /// dbSNP identifier (e.g., "rs3892097") or generated "chr{CHROM}:{POS}:{REF}:{ALT}"
    pub rsid: String,

    /// Chromosome as written in the file (e.g., "22" or "chr22")
    pub chromosome: String,

    /// 1-based position
    pub position: u64,

    /// Reference allele (e.g., "C")
    pub reference_allele: String,

    /// Alternate allele (e.g., "T")
    pub alternate_allele: String,

    /// Raw GT value (e.g., "0/1"), empty if the sample has no GT
    pub genotype: String,

    pub zygosity: Zygosity,

    /// Upper-cased HGNC symbol from the GENE= tag
    pub gene: Option<String>,

    /// Normalized star allele from the STAR= tag (e.g., "*4")
    pub star_allele: Option<String>,
}

impl Variant {
    /// Whether the sample carries at least one non-reference allele
    pub fn carries_alternate(&self) -> bool {
        self.genotype
            .split(['/', '|'])
            .map(str::trim)
            .any(|a| !a.is_empty() && a != "." && a != "0")
    }

    /// Whether this variant is annotated with the given gene (case-insensitive)
    pub fn is_in_gene(&self, gene: &str) -> bool {
        self.gene
            .as_deref()
            .map(|g| g.eq_ignore_ascii_case(gene))
            .unwrap_or(false)
    }
}

// ==============================================================================
// PHENOTYPE / RISK VOCABULARY
// ==============================================================================

/// Metabolizer phenotype
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum Phenotype {
    /// Poor metabolizer
    PM,
    /// Intermediate metabolizer
    IM,
    /// Normal metabolizer
    NM,
    /// Ultra-rapid metabolizer
    UM,
    Unknown,
}

impl Phenotype {
    pub fn as_str(&self) -> &'static str {
        match self {
            Phenotype::PM => "PM",
            Phenotype::IM => "IM",
            Phenotype::NM => "NM",
            Phenotype::UM => "UM",
            Phenotype::Unknown => "Unknown",
        }
    }

    /// Long-form name used in reasoning and explanation text
    pub fn description(&self) -> &'static str {
        match self {
            Phenotype::PM => "poor metabolizer",
            Phenotype::IM => "intermediate metabolizer",
            Phenotype::NM => "normal metabolizer",
            Phenotype::UM => "ultra-rapid metabolizer",
            Phenotype::Unknown => "unknown metabolizer status",
        }
    }
}

impl fmt::Display for Phenotype {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Risk outcome for a drug
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum RiskLabel {
    Safe,
    #[serde(rename = "Adjust Dosage")]
    AdjustDosage,
    Moderate,
    Ineffective,
    Toxic,
    Contraindicated,
}

impl RiskLabel {
    pub fn as_str(&self) -> &'static str {
        match self {
            RiskLabel::Safe => "Safe",
            RiskLabel::AdjustDosage => "Adjust Dosage",
            RiskLabel::Moderate => "Moderate",
            RiskLabel::Ineffective => "Ineffective",
            RiskLabel::Toxic => "Toxic",
            RiskLabel::Contraindicated => "Contraindicated",
        }
    }
}

impl fmt::Display for RiskLabel {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Clinical severity tier (ordered from least to most severe)
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Severity {
    None,
    Mild,
    Moderate,
    High,
    Critical,
}

impl Severity {
    const LADDER: [Severity; 5] = [
        Severity::None,
        Severity::Mild,
        Severity::Moderate,
        Severity::High,
        Severity::Critical,
    ];

    /// Move up the severity ladder, saturating at `Critical`
    pub fn escalate(self, steps: usize) -> Severity {
        let idx = Self::LADDER.iter().position(|s| *s == self).unwrap_or(0);
        Self::LADDER[(idx + steps).min(Self::LADDER.len() - 1)]
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            Severity::None => "none",
            Severity::Mild => "mild",
            Severity::Moderate => "moderate",
            Severity::High => "high",
            Severity::Critical => "critical",
        }
    }
}

impl fmt::Display for Severity {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Guideline evidence tier backing a drug-gene rule
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum EvidenceLevel {
    A,
    B,
    C,
}

impl EvidenceLevel {
    /// Numeric anchor used as the starting point of the evidence score
    pub fn anchor(&self) -> u8 {
        match self {
            EvidenceLevel::A => 90,
            EvidenceLevel::B => 75,
            EvidenceLevel::C => 60,
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            EvidenceLevel::A => "A",
            EvidenceLevel::B => "B",
            EvidenceLevel::C => "C",
        }
    }
}

/// Drug-drug interaction severity
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum InteractionSeverity {
    Minor,
    Moderate,
    Major,
    Contraindicated,
}

impl InteractionSeverity {
    pub fn as_str(&self) -> &'static str {
        match self {
            InteractionSeverity::Minor => "minor",
            InteractionSeverity::Moderate => "moderate",
            InteractionSeverity::Major => "major",
            InteractionSeverity::Contraindicated => "contraindicated",
        }
    }
}

// ==============================================================================
// PATIENT HISTORY (per request, never persisted)
// ==============================================================================

/// Caller-supplied clinical context used only as risk modifiers
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct PatientHistory {
    // Demographics
    pub age: Option<u32>,
    pub gender: Option<String>,
    pub weight_kg: Option<f64>,
    pub ethnicity: Option<String>,
    pub blood_group: Option<String>,

    // Organ function, e.g. "Severe Impairment", "dialysis", "Child-Pugh B"
    pub kidney_function: Option<String>,
    pub liver_function: Option<String>,

    // Lifestyle
    pub smoking_status: Option<String>,
    pub alcohol_use: Option<String>,

    // Medical history
    pub conditions: Vec<String>,
    pub current_medications: Vec<String>,
    pub allergies: Vec<String>,
    pub prior_adverse_reactions: Vec<String>,
}

impl PatientHistory {
    /// Whether any documented allergy names the drug
    pub fn is_allergic_to(&self, drug: &str) -> bool {
        self.allergies
            .iter()
            .any(|a| a.trim().eq_ignore_ascii_case(drug))
    }

    /// Prior adverse reaction entries that mention the drug
    pub fn reactions_to(&self, drug: &str) -> Vec<&str> {
        let drug_upper = drug.to_uppercase();
        self.prior_adverse_reactions
            .iter()
            .filter(|r| r.to_uppercase().contains(&drug_upper))
            .map(|r| r.as_str())
            .collect()
    }

    /// One "Label: value" line per supplied field, for explanation prompts
    pub fn summary_lines(&self) -> Vec<String> {
        let mut lines = Vec::new();
        if let Some(age) = self.age {
            lines.push(format!("Age: {}", age));
        }

        let mut text = |label: &str, value: &Option<String>| {
            if let Some(value) = value.as_deref().map(str::trim).filter(|v| !v.is_empty()) {
                lines.push(format!("{}: {}", label, value));
            }
        };
        text("Gender", &self.gender);
        text("Ethnicity", &self.ethnicity);
        text("Blood group", &self.blood_group);
        text("Kidney function", &self.kidney_function);
        text("Liver function", &self.liver_function);
        text("Smoking status", &self.smoking_status);
        text("Alcohol use", &self.alcohol_use);

        if let Some(weight) = self.weight_kg {
            lines.push(format!("Weight: {} kg", weight));
        }

        let lists = [
            ("Conditions", &self.conditions),
            ("Current medications", &self.current_medications),
            ("Drug allergies", &self.allergies),
            ("Prior adverse reactions", &self.prior_adverse_reactions),
        ];
        for (label, values) in lists {
            if !values.is_empty() {
                lines.push(format!("{}: {}", label, values.join(", ")));
            }
        }
        lines
    }

    /// Current medications, trimmed and upper-cased, blanks removed
    pub fn normalized_medications(&self) -> Vec<String> {
        self.current_medications
            .iter()
            .map(|m| m.trim().to_uppercase())
            .filter(|m| !m.is_empty())
            .collect()
    }
}

// ==============================================================================
// PER-DRUG RESULT
// ==============================================================================

/// Kind of patient-history modifier applied by the risk classifier
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ModifierKind {
    OrganImpairment,
    AdvancedAge,
    PriorReaction,
    HighRiskCombination,
    /// Hepatic impairment with a PM/IM phenotype of the metabolizing gene
    HepaticMetabolism,
    /// Dose flag only; percentage and severity are unchanged
    LowBodyWeight,
    /// Monitoring flag for an IM call whose activity score is near PM
    BorderlineActivity,
    AllergyContraindication,
    UnknownPhenotype,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AppliedModifier {
    pub kind: ModifierKind,
    pub description: String,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RiskAssessment {
    pub label: RiskLabel,
    /// Risk percentage, always within 0..=100
    pub percentage: u8,
    pub severity: Severity,
    pub reasoning: String,
    /// Label before patient-history modifiers were applied
    pub base_label: RiskLabel,
    /// Severity before patient-history modifiers were applied
    pub base_severity: Severity,
    pub modifiers: Vec<AppliedModifier>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DetectedVariant {
    pub rsid: String,
    pub chromosome: String,
    pub position: u64,
    pub genotype: String,
    pub zygosity: Zygosity,
    pub star_alleles: Option<String>,
}

impl From<&Variant> for DetectedVariant {
    fn from(v: &Variant) -> Self {
        Self {
            rsid: v.rsid.clone(),
            chromosome: v.chromosome.clone(),
            position: v.position,
            genotype: v.genotype.clone(),
            zygosity: v.zygosity,
            star_alleles: v.star_allele.clone(),
        }
    }
}

/// Where the interacting drug came from
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum InteractionSource {
    /// Another drug in the same analysis request
    CoPrescribed,
    /// Patient history current-medication list
    CurrentMedication,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DrugInteraction {
    pub interacting_drug: String,
    pub severity: InteractionSeverity,
    pub mechanism: String,
    pub recommendation: String,
    pub source: InteractionSource,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum HistoryFlagKind {
    Allergy,
    PriorReaction,
    ConditionRisk,
    AgeRisk,
    OrganRisk,
    LifestyleRisk,
}

/// Warning raised from patient history (does not change the risk verdict)
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct HistoryFlag {
    pub kind: HistoryFlagKind,
    pub severity: Severity,
    pub message: String,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct EvidenceScore {
    /// Evidence score, always within 0..=100
    pub score: u8,
    pub level: EvidenceLevel,
    pub factors: Vec<String>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ClinicalRecommendation {
    pub dosing: String,
    pub monitoring: String,
    pub contraindication: Option<String>,
    pub alternative_drugs: Vec<String>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ExplanationSource {
    Gemini,
    Template,
}

/// Four-section natural-language explanation
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Explanation {
    pub summary: String,
    pub mechanism: String,
    pub justification: String,
    pub recommendation: String,
    pub source: ExplanationSource,
}

/// Pipeline bookkeeping attached to every result
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct QualityMetrics {
    /// Variant records extracted from the upload
    pub variants_parsed: usize,
    /// Data rows skipped as malformed
    pub skipped_rows: usize,
    /// Variants annotated with this result's primary gene
    pub gene_variant_count: usize,
    pub history_provided: bool,
    /// Hex SHA-256 of the raw upload
    pub input_sha256: String,
}

/// Complete verdict for one requested drug
///
/// Contains no timestamps or generated ids so that identical inputs produce
/// identical output when the template explainer is in use.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AnalysisResult {
    pub drug_name: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub patient_id: Option<String>,
    pub primary_gene: String,
    pub diplotype: String,
    pub metabolizer_status: Phenotype,
    /// CPIC-style activity score (absent when an allele has no assigned value)
    pub activity_score: Option<f64>,
    pub risk_assessment: RiskAssessment,
    pub detected_variants: Vec<DetectedVariant>,
    pub drug_interactions: Vec<DrugInteraction>,
    pub history_flags: Vec<HistoryFlag>,
    pub evidence_score: EvidenceScore,
    pub clinical_recommendations: ClinicalRecommendation,
    pub llm_explanation: Explanation,
    pub quality_metrics: QualityMetrics,
}
