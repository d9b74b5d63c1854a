// ==============================================================================
// reference.rs - Pharmacogenomic Reference Data
// ==============================================================================
// Description: Gene/drug registries, phenotype mapping, risk and interaction rules
// Author: Matt Barham
// Created: 2026-02-02
// Modified: 2026-02-11
// Version: 1.1.0
// ==============================================================================
// Data source:
//   data/pgx_reference.json (embedded at compile time)
//   Optional override file (PGX_REFERENCE_PATH / --reference)
// Guidelines:
//   CPIC codeine/CYP2D6 (PMID 32602691), clopidogrel/CYP2C19 (PMID 34003977),
//   warfarin/CYP2C9 (PMID 27997040), simvastatin/SLCO1B1 (PMID 24918167),
//   thiopurines/TPMT (PMID 21270794), fluoropyrimidines/DPYD (PMID 29152729)
// ==============================================================================

use serde::Deserialize;
use std::collections::{BTreeMap, HashMap, HashSet};
use std::path::Path;
use thiserror::Error;
use tracing::{debug, info};

use crate::models::{EvidenceLevel, InteractionSeverity, Phenotype, RiskLabel, Severity};
use crate::phenotype::canonical_diplotype;

/// Reference tables shipped with the binary
const BUILTIN_REFERENCE: &str = include_str!("../data/pgx_reference.json");

#[derive(Error, Debug)]
pub enum ReferenceError {
    #[error("Failed to read reference file {path}: {source}")]
    Io {
        path: String,
        #[source]
        source: std::io::Error,
    },

    #[error("Invalid reference JSON: {0}")]
    Json(#[from] serde_json::Error),

    #[error("Reference data defines no drugs")]
    EmptyRegistry,

    #[error("Drug {drug} references unknown gene {gene}")]
    UnknownGene { drug: String, gene: String },

    #[error("Risk rule references unknown drug {0}")]
    UnknownDrug(String),

    #[error("Risk rule for {drug} uses gene {gene}, expected {expected}")]
    RuleGeneMismatch {
        drug: String,
        gene: String,
        expected: String,
    },

    #[error("Duplicate risk rule for {drug} / {phenotype}")]
    DuplicateRule { drug: String, phenotype: Phenotype },
}

// ==============================================================================
// TABLE ROWS
// ==============================================================================

#[derive(Debug, Clone, Deserialize)]
pub struct GeneInfo {
    pub symbol: String,
    pub chromosome: String,
    /// Wild-type star allele (fills an empty diplotype slot)
    pub reference_allele: String,
    pub pathogenic_rsids: Vec<String>,
    #[serde(default)]
    pub activity: Option<ActivityModel>,
}

/// Upper bound (inclusive) of an activity-score band; `None` is the open top band
#[derive(Debug, Clone, Deserialize)]
pub struct ActivityBand {
    pub max: Option<f64>,
    pub phenotype: Phenotype,
}

/// CPIC activity-score model for one gene
#[derive(Debug, Clone, Deserialize)]
pub struct ActivityModel {
    /// Star allele -> activity value
    pub values: BTreeMap<String, f64>,
    /// Checked in order, first band containing the score wins
    pub bands: Vec<ActivityBand>,
}

impl ActivityModel {
    /// Sum of both allele values; `None` when either allele is unassigned
    pub fn score(&self, first: &str, second: &str) -> Option<f64> {
        Some(self.values.get(first)? + self.values.get(second)?)
    }

    pub fn phenotype_for(&self, score: f64) -> Option<Phenotype> {
        self.bands
            .iter()
            .find(|band| band.max.map(|max| score <= max).unwrap_or(true))
            .map(|band| band.phenotype)
    }
}

#[derive(Debug, Clone, Deserialize)]
pub struct DrugInfo {
    pub name: String,
    pub primary_gene: String,
    #[serde(default)]
    pub guideline_pmid: Option<String>,
    #[serde(default)]
    pub alternatives: Vec<String>,
}

/// Base verdict for one (drug, gene, phenotype)
#[derive(Debug, Clone, Deserialize)]
pub struct RiskRule {
    pub drug: String,
    pub gene: String,
    pub phenotype: Phenotype,
    pub label: RiskLabel,
    pub severity: Severity,
    pub percentage: u8,
    pub evidence_level: EvidenceLevel,
    /// Template with {drug} {gene} {phenotype} {phenotype_name} {diplotype}
    pub reasoning: String,
}

#[derive(Debug, Clone, Deserialize)]
pub struct InteractionRule {
    pub drugs: [String; 2],
    pub severity: InteractionSeverity,
    pub mechanism: String,
    pub recommendation: String,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ImpairmentTier {
    Moderate,
    Severe,
}

impl ImpairmentTier {
    pub fn as_str(&self) -> &'static str {
        match self {
            ImpairmentTier::Moderate => "moderate",
            ImpairmentTier::Severe => "severe",
        }
    }
}

#[derive(Debug, Clone, Deserialize)]
pub struct ImpairmentKeyword {
    pub keyword: String,
    pub tier: ImpairmentTier,
}

#[derive(Debug, Clone, Deserialize)]
pub struct OrganImpairmentTable {
    /// Checked in order, first substring match wins
    pub keywords: Vec<ImpairmentKeyword>,
    pub moderate_step: u8,
    pub severe_step: u8,
    /// Organ ("kidney" / "liver") -> drugs it clears
    #[serde(default)]
    pub sensitive_drugs: BTreeMap<String, Vec<String>>,
}

impl OrganImpairmentTable {
    /// Classify a free-text organ function description
    pub fn tier_for(&self, description: &str) -> Option<ImpairmentTier> {
        let lowered = description.to_lowercase();
        self.keywords
            .iter()
            .find(|k| lowered.contains(&k.keyword.to_lowercase()))
            .map(|k| k.tier)
    }

    pub fn step(&self, tier: ImpairmentTier) -> u8 {
        match tier {
            ImpairmentTier::Moderate => self.moderate_step,
            ImpairmentTier::Severe => self.severe_step,
        }
    }

    pub fn is_sensitive(&self, organ: &str, drug: &str) -> bool {
        self.sensitive_drugs
            .get(organ)
            .map(|drugs| drugs.iter().any(|d| d.eq_ignore_ascii_case(drug)))
            .unwrap_or(false)
    }
}

#[derive(Debug, Clone, Deserialize)]
pub struct AgeModifier {
    pub min_age: u32,
    pub step: u8,
}

#[derive(Debug, Clone, Deserialize)]
pub struct ModifierTables {
    pub organ_impairment: OrganImpairmentTable,
    pub advanced_age: AgeModifier,
    pub prior_reaction_step: u8,
    /// Drug -> co-medications that escalate severity
    #[serde(default)]
    pub high_risk_combinations: BTreeMap<String, Vec<String>>,
    /// Phenotypes whose severity escalates under hepatic impairment
    #[serde(default)]
    pub hepatic_phenotypes: Vec<Phenotype>,
    /// Body weight (kg) below which a PM result carries a dose flag
    #[serde(default)]
    pub low_body_weight_kg: Option<f64>,
    /// IM calls with 0 < activity score <= this value are flagged as near-PM
    #[serde(default)]
    pub borderline_activity_score: Option<f64>,
    pub allergy_floor: u8,
}

#[derive(Debug, Clone, Deserialize)]
pub struct ConditionWarning {
    pub drug: String,
    pub keyword: String,
    pub severity: Severity,
    pub message: String,
}

/// Age-bracket warning; `min_age` is inclusive, `below_age` exclusive
#[derive(Debug, Clone, Deserialize)]
pub struct AgeWarning {
    pub drug: String,
    #[serde(default)]
    pub min_age: Option<u32>,
    #[serde(default)]
    pub below_age: Option<u32>,
    pub severity: Severity,
    pub message: String,
}

impl AgeWarning {
    pub fn applies_to(&self, age: u32) -> bool {
        let above = self.min_age.map(|min| age >= min).unwrap_or(true);
        let below = self.below_age.map(|max| age < max).unwrap_or(true);
        (self.min_age.is_some() || self.below_age.is_some()) && above && below
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Organ {
    Kidney,
    Liver,
}

/// Organ-function warning; an empty keyword list matches any non-normal value
#[derive(Debug, Clone, Deserialize)]
pub struct OrganWarning {
    pub drug: String,
    pub organ: Organ,
    #[serde(default)]
    pub keywords: Vec<String>,
    pub severity: Severity,
    /// May contain `{function}` (the patient's description)
    pub message: String,
}

impl OrganWarning {
    pub fn applies_to(&self, function: &str) -> bool {
        let lowered = function.trim().to_lowercase();
        if lowered.is_empty() || lowered == "normal" {
            return false;
        }
        self.keywords.is_empty()
            || self
                .keywords
                .iter()
                .any(|k| lowered.contains(&k.to_lowercase()))
    }

    pub fn render(&self, function: &str) -> String {
        self.message.replace("{function}", function.trim())
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum LifestyleFactor {
    Smoking,
    Alcohol,
}

/// Warning raised when a lifestyle field equals `status` (case-insensitive)
#[derive(Debug, Clone, Deserialize)]
pub struct LifestyleWarning {
    pub drug: String,
    pub factor: LifestyleFactor,
    pub status: String,
    pub severity: Severity,
    pub message: String,
}

impl LifestyleWarning {
    pub fn applies_to(&self, value: &str) -> bool {
        value.trim().eq_ignore_ascii_case(self.status.trim())
    }
}

/// On-disk layout of the reference JSON
#[derive(Debug, Deserialize)]
struct ReferenceFile {
    version: String,
    genes: Vec<GeneInfo>,
    drugs: Vec<DrugInfo>,
    phenotypes: BTreeMap<String, BTreeMap<String, Phenotype>>,
    risk_rules: Vec<RiskRule>,
    #[serde(default)]
    interactions: Vec<InteractionRule>,
    modifiers: ModifierTables,
    #[serde(default)]
    condition_warnings: Vec<ConditionWarning>,
    #[serde(default)]
    age_warnings: Vec<AgeWarning>,
    #[serde(default)]
    organ_warnings: Vec<OrganWarning>,
    #[serde(default)]
    lifestyle_warnings: Vec<LifestyleWarning>,
}

// ==============================================================================
// INDEXED REFERENCE DATA
// ==============================================================================

/// Immutable lookup tables, built once and shared behind an `Arc`
#[derive(Debug)]
pub struct ReferenceData {
    version: String,
    genes: Vec<GeneInfo>,
    drugs: Vec<DrugInfo>,
    pathogenic: HashMap<String, HashSet<String>>,
    phenotypes: HashMap<(String, String), Phenotype>,
    risk_rules: HashMap<(String, Phenotype), RiskRule>,
    interactions: HashMap<(String, String), InteractionRule>,
    modifiers: ModifierTables,
    condition_warnings: Vec<ConditionWarning>,
    age_warnings: Vec<AgeWarning>,
    organ_warnings: Vec<OrganWarning>,
    lifestyle_warnings: Vec<LifestyleWarning>,
}

impl ReferenceData {
    /// Reference tables embedded in the binary
    pub fn builtin() -> Result<Self, ReferenceError> {
        Self::from_json(BUILTIN_REFERENCE)
    }

    /// Load an override file from disk
    pub fn load(path: &Path) -> Result<Self, ReferenceError> {
        info!("Loading reference data from {:?}", path);
        let contents = std::fs::read_to_string(path).map_err(|source| ReferenceError::Io {
            path: path.display().to_string(),
            source,
        })?;
        Self::from_json(&contents)
    }

    /// Parse and index reference JSON
    pub fn from_json(json: &str) -> Result<Self, ReferenceError> {
        let file: ReferenceFile = serde_json::from_str(json)?;
        Self::index(file)
    }

    fn index(file: ReferenceFile) -> Result<Self, ReferenceError> {
        if file.drugs.is_empty() {
            return Err(ReferenceError::EmptyRegistry);
        }

        let mut genes = file.genes;
        for gene in &mut genes {
            gene.symbol = gene.symbol.trim().to_uppercase();
        }
        let gene_symbols: HashSet<&str> = genes.iter().map(|g| g.symbol.as_str()).collect();

        let mut drugs = file.drugs;
        for drug in &mut drugs {
            drug.name = drug.name.trim().to_uppercase();
            drug.primary_gene = drug.primary_gene.trim().to_uppercase();
            if !gene_symbols.contains(drug.primary_gene.as_str()) {
                return Err(ReferenceError::UnknownGene {
                    drug: drug.name.clone(),
                    gene: drug.primary_gene.clone(),
                });
            }
        }

        let pathogenic = genes
            .iter()
            .map(|g| {
                (
                    g.symbol.clone(),
                    g.pathogenic_rsids.iter().map(|r| r.trim().to_lowercase()).collect(),
                )
            })
            .collect();

        let mut phenotypes = HashMap::new();
        for (gene, table) in file.phenotypes {
            let gene = gene.trim().to_uppercase();
            for (diplotype, phenotype) in table {
                phenotypes.insert((gene.clone(), canonical_diplotype(&diplotype)), phenotype);
            }
        }

        let mut risk_rules = HashMap::new();
        for mut rule in file.risk_rules {
            rule.drug = rule.drug.trim().to_uppercase();
            rule.gene = rule.gene.trim().to_uppercase();
            rule.percentage = rule.percentage.min(100);

            let drug = drugs
                .iter()
                .find(|d| d.name == rule.drug)
                .ok_or_else(|| ReferenceError::UnknownDrug(rule.drug.clone()))?;
            if drug.primary_gene != rule.gene {
                return Err(ReferenceError::RuleGeneMismatch {
                    drug: rule.drug.clone(),
                    gene: rule.gene.clone(),
                    expected: drug.primary_gene.clone(),
                });
            }

            let key = (rule.drug.clone(), rule.phenotype);
            if risk_rules.contains_key(&key) {
                return Err(ReferenceError::DuplicateRule {
                    drug: rule.drug,
                    phenotype: rule.phenotype,
                });
            }
            risk_rules.insert(key, rule);
        }

        let interactions = file
            .interactions
            .into_iter()
            .map(|rule| (pair_key(&rule.drugs[0], &rule.drugs[1]), rule))
            .collect();

        let data = Self {
            version: file.version,
            genes,
            drugs,
            pathogenic,
            phenotypes,
            risk_rules,
            interactions,
            modifiers: file.modifiers,
            condition_warnings: file.condition_warnings,
            age_warnings: file.age_warnings,
            organ_warnings: file.organ_warnings,
            lifestyle_warnings: file.lifestyle_warnings,
        };

        debug!(
            "Reference data {} indexed: {} drugs, {} genes, {} diplotypes, {} rules, {} interactions",
            data.version,
            data.drugs.len(),
            data.genes.len(),
            data.phenotypes.len(),
            data.risk_rules.len(),
            data.interactions.len()
        );

        Ok(data)
    }

    pub fn version(&self) -> &str {
        &self.version
    }

    /// Supported drug names in registry order
    pub fn supported_drugs(&self) -> Vec<String> {
        self.drugs.iter().map(|d| d.name.clone()).collect()
    }

    /// Supported gene symbols in registry order
    pub fn supported_genes(&self) -> Vec<String> {
        self.genes.iter().map(|g| g.symbol.clone()).collect()
    }

    /// Registry entry for an upper-cased drug name
    pub fn drug(&self, name: &str) -> Option<&DrugInfo> {
        self.drugs.iter().find(|d| d.name == name)
    }

    pub fn gene(&self, symbol: &str) -> Option<&GeneInfo> {
        self.genes.iter().find(|g| g.symbol == symbol)
    }

    /// Wild-type allele for a gene ("*1" when the gene is unknown)
    pub fn reference_allele(&self, gene: &str) -> &str {
        self.gene(gene)
            .map(|g| g.reference_allele.as_str())
            .unwrap_or("*1")
    }

    /// Activity score for a diplotype's two alleles, when the gene has a model
    pub fn activity_score(&self, gene: &str, first: &str, second: &str) -> Option<f64> {
        self.gene(gene)?.activity.as_ref()?.score(first, second)
    }

    /// Phenotype band for an activity score
    pub fn phenotype_for_activity(&self, gene: &str, score: f64) -> Option<Phenotype> {
        self.gene(gene)?.activity.as_ref()?.phenotype_for(score)
    }

    pub fn is_pathogenic_rsid(&self, gene: &str, rsid: &str) -> bool {
        self.pathogenic
            .get(gene)
            .map(|set| set.contains(&rsid.to_lowercase()))
            .unwrap_or(false)
    }

    /// Phenotype for a diplotype; absent entries are `Unknown`
    pub fn phenotype_for(&self, gene: &str, diplotype: &str) -> Phenotype {
        self.phenotypes
            .get(&(gene.to_string(), canonical_diplotype(diplotype)))
            .copied()
            .unwrap_or(Phenotype::Unknown)
    }

    pub fn risk_rule(&self, drug: &str, phenotype: Phenotype) -> Option<&RiskRule> {
        self.risk_rules.get(&(drug.to_string(), phenotype))
    }

    /// Interaction rule for an unordered pair of drug names
    pub fn interaction(&self, a: &str, b: &str) -> Option<&InteractionRule> {
        self.interactions.get(&pair_key(a, b))
    }

    pub fn modifiers(&self) -> &ModifierTables {
        &self.modifiers
    }

    /// High-risk co-medications listed for a drug
    pub fn high_risk_combinations(&self, drug: &str) -> &[String] {
        self.modifiers
            .high_risk_combinations
            .get(drug)
            .map(Vec::as_slice)
            .unwrap_or(&[])
    }

    pub fn condition_warnings_for<'a>(
        &'a self,
        drug: &'a str,
    ) -> impl Iterator<Item = &'a ConditionWarning> + 'a {
        self.condition_warnings
            .iter()
            .filter(move |w| w.drug.eq_ignore_ascii_case(drug))
    }

    pub fn age_warnings_for<'a>(&'a self, drug: &'a str) -> impl Iterator<Item = &'a AgeWarning> + 'a {
        self.age_warnings
            .iter()
            .filter(move |w| w.drug.eq_ignore_ascii_case(drug))
    }

    pub fn organ_warnings_for<'a>(&'a self, drug: &'a str) -> impl Iterator<Item = &'a OrganWarning> + 'a {
        self.organ_warnings
            .iter()
            .filter(move |w| w.drug.eq_ignore_ascii_case(drug))
    }

    pub fn lifestyle_warnings_for<'a>(
        &'a self,
        drug: &'a str,
    ) -> impl Iterator<Item = &'a LifestyleWarning> + 'a {
        self.lifestyle_warnings
            .iter()
            .filter(move |w| w.drug.eq_ignore_ascii_case(drug))
    }
}

/// Symmetric key: both names upper-cased, lexically ordered
fn pair_key(a: &str, b: &str) -> (String, String) {
    let a = a.trim().to_uppercase();
    let b = b.trim().to_uppercase();
    if a <= b {
        (a, b)
    } else {
        (b, a)
    }
}

#[cfg(test)]
pub(crate) mod tests {
    use super::*;

    /// Small reference set used by unit tests across the crate
    pub(crate) const MINIMAL_REFERENCE: &str = r#"{
        "version": "test-1",
        "genes": [
            {"symbol": "CYP2D6", "chromosome": "22", "reference_allele": "*1",
             "pathogenic_rsids": ["rs3892097"]}
        ],
        "drugs": [
            {"name": "codeine", "primary_gene": "cyp2d6", "guideline_pmid": "32602691",
             "alternatives": ["Tramadol"]}
        ],
        "phenotypes": {"CYP2D6": {"*1/*1": "NM", "*4/*1": "IM", "*4/*4": "PM", "*1/*1xN": "UM"}},
        "risk_rules": [
            {"drug": "CODEINE", "gene": "CYP2D6", "phenotype": "NM", "label": "Safe",
             "severity": "none", "percentage": 10, "evidence_level": "A",
             "reasoning": "{gene} {diplotype}: {phenotype_name}."},
            {"drug": "CODEINE", "gene": "CYP2D6", "phenotype": "PM", "label": "Ineffective",
             "severity": "high", "percentage": 80, "evidence_level": "A",
             "reasoning": "{drug}: {phenotype_name} ({phenotype})."}
        ],
        "interactions": [
            {"drugs": ["CODEINE", "FLUOXETINE"], "severity": "major",
             "mechanism": "CYP2D6 inhibition", "recommendation": "Avoid"}
        ],
        "modifiers": {
            "organ_impairment": {
                "keywords": [{"keyword": "dialysis", "tier": "severe"},
                             {"keyword": "severe", "tier": "severe"},
                             {"keyword": "moderate", "tier": "moderate"}],
                "moderate_step": 10, "severe_step": 20,
                "sensitive_drugs": {"liver": ["CODEINE"]}
            },
            "advanced_age": {"min_age": 75, "step": 5},
            "prior_reaction_step": 15,
            "high_risk_combinations": {"CODEINE": ["FLUOXETINE"]},
            "allergy_floor": 95
        }
    }"#;

    #[test]
    fn test_builtin_reference_loads() {
        let data = ReferenceData::builtin().unwrap();
        assert_eq!(
            data.supported_drugs(),
            vec!["CODEINE", "WARFARIN", "CLOPIDOGREL", "SIMVASTATIN", "AZATHIOPRINE", "FLUOROURACIL"]
        );
        assert_eq!(data.supported_genes().len(), 6);
        assert_eq!(data.drug("CODEINE").unwrap().primary_gene, "CYP2D6");
        assert_eq!(data.drug("FLUOROURACIL").unwrap().primary_gene, "DPYD");
        assert!(data.drug("IBUPROFEN").is_none());
    }

    #[test]
    fn test_builtin_has_rule_for_every_mapped_phenotype() {
        let data = ReferenceData::builtin().unwrap();
        for ((gene, _), phenotype) in &data.phenotypes {
            for drug in data.drugs.iter().filter(|d| &d.primary_gene == gene) {
                assert!(
                    data.risk_rule(&drug.name, *phenotype).is_some(),
                    "missing rule for {} {}",
                    drug.name,
                    phenotype
                );
            }
        }
    }

    #[test]
    fn test_phenotype_lookup_is_order_insensitive() {
        let data = ReferenceData::from_json(MINIMAL_REFERENCE).unwrap();
        assert_eq!(data.phenotype_for("CYP2D6", "*1/*4"), Phenotype::IM);
        assert_eq!(data.phenotype_for("CYP2D6", "*4/*1"), Phenotype::IM);
        assert_eq!(data.phenotype_for("CYP2D6", "*1/*1xN"), Phenotype::UM);
        assert_eq!(data.phenotype_for("CYP2D6", "*3/*9"), Phenotype::Unknown);
        assert_eq!(data.phenotype_for("TPMT", "*1/*1"), Phenotype::Unknown);
    }

    #[test]
    fn test_interaction_lookup_is_symmetric() {
        let data = ReferenceData::from_json(MINIMAL_REFERENCE).unwrap();
        assert!(data.interaction("CODEINE", "FLUOXETINE").is_some());
        assert!(data.interaction("fluoxetine", "codeine").is_some());
        assert!(data.interaction("CODEINE", "ASPIRIN").is_none());
    }

    #[test]
    fn test_registry_names_are_normalized() {
        let data = ReferenceData::from_json(MINIMAL_REFERENCE).unwrap();
        assert_eq!(data.supported_drugs(), vec!["CODEINE"]);
        assert!(data.is_pathogenic_rsid("CYP2D6", "RS3892097"));
        assert!(!data.is_pathogenic_rsid("CYP2D6", "rs1065852"));
        assert_eq!(data.high_risk_combinations("CODEINE"), ["FLUOXETINE".to_string()]);
        assert!(data.high_risk_combinations("WARFARIN").is_empty());
    }

    #[test]
    fn test_rule_gene_mismatch_rejected() {
        let json = MINIMAL_REFERENCE.replace(
            r#""drug": "CODEINE", "gene": "CYP2D6", "phenotype": "NM""#,
            r#""drug": "CODEINE", "gene": "CYP2C19", "phenotype": "NM""#,
        );
        let err = ReferenceData::from_json(&json).unwrap_err();
        assert!(matches!(err, ReferenceError::RuleGeneMismatch { .. }));
    }

    #[test]
    fn test_unknown_gene_rejected() {
        let json = MINIMAL_REFERENCE.replace(r#""primary_gene": "cyp2d6""#, r#""primary_gene": "TPMT""#);
        let err = ReferenceData::from_json(&json).unwrap_err();
        assert!(matches!(err, ReferenceError::UnknownGene { .. }));
    }

    #[test]
    fn test_organ_tier_keywords() {
        let data = ReferenceData::builtin().unwrap();
        let organ = &data.modifiers().organ_impairment;
        assert_eq!(organ.tier_for("Severe Impairment"), Some(ImpairmentTier::Severe));
        assert_eq!(organ.tier_for("on dialysis"), Some(ImpairmentTier::Severe));
        assert_eq!(organ.tier_for("Child-Pugh B"), Some(ImpairmentTier::Moderate));
        assert_eq!(organ.tier_for("Child-Pugh C"), Some(ImpairmentTier::Severe));
        assert_eq!(organ.tier_for("Normal"), None);
        assert!(organ.is_sensitive("kidney", "fluorouracil"));
        assert!(!organ.is_sensitive("kidney", "CODEINE"));
    }

    #[test]
    fn test_age_warning_brackets() {
        let data = ReferenceData::builtin().unwrap();
        let codeine: Vec<&AgeWarning> = data.age_warnings_for("CODEINE").collect();
        assert_eq!(codeine.len(), 2);
        assert_eq!(codeine.iter().filter(|w| w.applies_to(80)).count(), 1);
        assert_eq!(codeine.iter().filter(|w| w.applies_to(12)).count(), 1);
        assert_eq!(codeine.iter().filter(|w| w.applies_to(40)).count(), 0);
    }

    #[test]
    fn test_activity_bands() {
        let data = ReferenceData::builtin().unwrap();
        assert_eq!(data.activity_score("CYP2D6", "*4", "*10"), Some(0.25));
        assert_eq!(data.activity_score("CYP2D6", "*1", "*1xN"), Some(3.0));
        assert_eq!(data.activity_score("CYP2C9", "*2", "*8"), None);
        assert_eq!(data.phenotype_for_activity("CYP2D6", 0.0), Some(Phenotype::PM));
        assert_eq!(data.phenotype_for_activity("CYP2D6", 0.25), Some(Phenotype::IM));
        assert_eq!(data.phenotype_for_activity("CYP2D6", 2.25), Some(Phenotype::NM));
        assert_eq!(data.phenotype_for_activity("CYP2D6", 3.0), Some(Phenotype::UM));

        // No model in the minimal set
        let minimal = ReferenceData::from_json(MINIMAL_REFERENCE).unwrap();
        assert_eq!(minimal.activity_score("CYP2D6", "*1", "*1"), None);
    }

    #[test]
    fn test_activity_bands_agree_with_diplotype_table() {
        let data = ReferenceData::builtin().unwrap();
        for ((gene, diplotype), phenotype) in &data.phenotypes {
            let Some((first, second)) = diplotype.split_once('/') else { continue };
            let Some(score) = data.activity_score(gene, first, second) else { continue };
            assert_eq!(
                data.phenotype_for_activity(gene, score),
                Some(*phenotype),
                "{} {} (activity {})",
                gene,
                diplotype,
                score
            );
        }
    }

    #[test]
    fn test_organ_and_lifestyle_warning_matching() {
        let data = ReferenceData::builtin().unwrap();

        let codeine_kidney: Vec<&OrganWarning> = data
            .organ_warnings_for("CODEINE")
            .filter(|w| w.organ == Organ::Kidney)
            .collect();
        assert_eq!(codeine_kidney.len(), 1);
        assert!(codeine_kidney[0].applies_to("Moderate impairment"));
        assert!(!codeine_kidney[0].applies_to("mild"));

        let warfarin_liver = data
            .organ_warnings_for("WARFARIN")
            .find(|w| w.organ == Organ::Liver)
            .unwrap();
        assert!(warfarin_liver.applies_to("mild"));
        assert!(!warfarin_liver.applies_to(" Normal "));
        assert!(warfarin_liver.render("Child-Pugh A").contains("(Child-Pugh A)"));

        let codeine_alcohol = data
            .lifestyle_warnings_for("codeine")
            .find(|w| w.factor == LifestyleFactor::Alcohol)
            .unwrap();
        assert!(codeine_alcohol.applies_to("Heavy"));
        assert!(!codeine_alcohol.applies_to("moderate"));
        assert_eq!(codeine_alcohol.severity, Severity::Critical);
    }

    #[test]
    fn test_load_from_file() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("reference.json");
        std::fs::write(&path, MINIMAL_REFERENCE).unwrap();

        let data = ReferenceData::load(&path).unwrap();
        assert_eq!(data.version(), "test-1");

        let missing = ReferenceData::load(&dir.path().join("missing.json")).unwrap_err();
        assert!(matches!(missing, ReferenceError::Io { .. }));
    }
}
