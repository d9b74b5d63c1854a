// ==============================================================================
// risk.rs - Drug Risk Classification
// ==============================================================================
// Description: Rule lookup plus patient-history modifiers for one drug
// Author: Matt Barham
// Created: 2026-02-03
// Modified: 2026-02-11
// Version: 1.2.0
// ==============================================================================
// Modifier order (each step sees the output of the previous one):
//   1. Organ impairment (kidney, liver)      +10 / +20, severe + clearing organ escalates;
//      impaired liver with a PM/IM call escalates (at most once per organ)
//   2. Advanced age                          +5
//   3. Prior adverse reaction to the drug    +15
//   4. High-risk co-medication               severity +1 tier
//   5. Low body weight with PM               dose flag only
//   6. IM with a near-PM activity score      monitoring flag only
//   7. Allergy                               Contraindicated / critical / >= 95%
// ==============================================================================

use tracing::debug;

use crate::error::AnalysisError;
use crate::models::{
    AppliedModifier, EvidenceLevel, ModifierKind, PatientHistory, Phenotype, RiskAssessment,
    RiskLabel, Severity,
};
use crate::phenotype::PhenotypeCall;
use crate::reference::{ImpairmentTier, ReferenceData};

/// Classifier output: the assessment plus the evidence tier of the rule used
#[derive(Debug, Clone, PartialEq)]
pub struct RiskOutcome {
    pub assessment: RiskAssessment,
    pub evidence_level: EvidenceLevel,
}

pub struct RiskClassifier<'a> {
    reference: &'a ReferenceData,
}

impl<'a> RiskClassifier<'a> {
    pub fn new(reference: &'a ReferenceData) -> Self {
        Self { reference }
    }

    /// Classify risk for an upper-cased drug name
    pub fn classify(
        &self,
        drug: &str,
        call: &PhenotypeCall,
        history: Option<&PatientHistory>,
    ) -> Result<RiskOutcome, AnalysisError> {
        if self.reference.drug(drug).is_none() {
            return Err(AnalysisError::UnsupportedDrug {
                drugs: vec![drug.to_string()],
                supported: self.reference.supported_drugs(),
            });
        }

        let mut modifiers = Vec::new();

        // Unknown phenotype falls back to the normal-metabolizer rule
        let rule_phenotype = match call.phenotype {
            Phenotype::Unknown => {
                modifiers.push(AppliedModifier {
                    kind: ModifierKind::UnknownPhenotype,
                    description: format!(
                        "Diplotype {} is not in the {} phenotype table; the normal metabolizer rule was applied.",
                        call.diplotype, call.gene
                    ),
                });
                Phenotype::NM
            }
            other => other,
        };

        let (base_label, base_severity, base_percentage, evidence_level, base_reasoning) =
            match self.reference.risk_rule(drug, rule_phenotype) {
                Some(rule) => (
                    rule.label,
                    rule.severity,
                    rule.percentage,
                    rule.evidence_level,
                    render_reasoning(&rule.reasoning, drug, call, rule_phenotype),
                ),
                None => {
                    debug!("No risk rule for {} / {}, using default", drug, rule_phenotype);
                    (
                        RiskLabel::Safe,
                        Severity::Mild,
                        10,
                        EvidenceLevel::C,
                        format!(
                            "No specific rule matched {} for {} {} ({}); standard precautions apply.",
                            drug, call.gene, call.diplotype, rule_phenotype
                        ),
                    )
                }
            };

        let mut label = base_label;
        let mut severity = base_severity;
        let mut percentage = i32::from(base_percentage);

        let tables = self.reference.modifiers();

        if let Some(history) = history {
            let organ_table = &tables.organ_impairment;

            // 1. Organ impairment
            let organs = [
                ("kidney", history.kidney_function.as_deref()),
                ("liver", history.liver_function.as_deref()),
            ];
            for (organ, function) in organs {
                let Some(function) = function else { continue };
                let Some(tier) = organ_table.tier_for(function) else { continue };

                let step = organ_table.step(tier);
                percentage += i32::from(step);

                let mut description = format!(
                    "{} {} impairment ({}) adds {} percentage points.",
                    capitalize(tier.as_str()),
                    organ,
                    function,
                    step
                );
                let clearing_organ =
                    tier == ImpairmentTier::Severe && organ_table.is_sensitive(organ, drug);
                if clearing_organ {
                    severity = severity.escalate(1);
                    description.push_str(&format!(
                        " {} clearance depends on the {}, so severity is raised to {}.",
                        drug, organ, severity
                    ));
                }
                modifiers.push(AppliedModifier {
                    kind: ModifierKind::OrganImpairment,
                    description,
                });

                if organ == "liver"
                    && !clearing_organ
                    && tables.hepatic_phenotypes.contains(&call.phenotype)
                {
                    severity = severity.escalate(1);
                    modifiers.push(AppliedModifier {
                        kind: ModifierKind::HepaticMetabolism,
                        description: format!(
                            "Hepatic impairment ({}) with a {} {} phenotype increases drug exposure; severity is raised to {}.",
                            function, call.gene, call.phenotype, severity
                        ),
                    });
                }
            }

            // 2. Advanced age
            if let Some(age) = history.age.filter(|age| *age >= tables.advanced_age.min_age) {
                percentage += i32::from(tables.advanced_age.step);
                modifiers.push(AppliedModifier {
                    kind: ModifierKind::AdvancedAge,
                    description: format!(
                        "Age {} (>= {}) adds {} percentage points.",
                        age, tables.advanced_age.min_age, tables.advanced_age.step
                    ),
                });
            }

            // 3. Prior adverse reaction
            let reactions = history.reactions_to(drug);
            if !reactions.is_empty() {
                percentage += i32::from(tables.prior_reaction_step);
                modifiers.push(AppliedModifier {
                    kind: ModifierKind::PriorReaction,
                    description: format!(
                        "Prior adverse reaction to {} ({}) adds {} percentage points.",
                        drug,
                        reactions.join("; "),
                        tables.prior_reaction_step
                    ),
                });
            }

            percentage = percentage.clamp(0, 100);

            // 4. High-risk co-medication (escalates once)
            let combos = self.reference.high_risk_combinations(drug);
            let mut matched: Vec<String> = Vec::new();
            for med in history.normalized_medications() {
                if combos.contains(&med) && !matched.contains(&med) {
                    matched.push(med);
                }
            }
            if !matched.is_empty() {
                severity = severity.escalate(1);
                modifiers.push(AppliedModifier {
                    kind: ModifierKind::HighRiskCombination,
                    description: format!(
                        "High-risk co-medication ({}) raises severity to {}.",
                        matched.join(", "),
                        severity
                    ),
                });
            }

            // 5. Low body weight (flag only)
            if let (Some(weight), Some(limit)) = (history.weight_kg, tables.low_body_weight_kg) {
                if weight < limit && call.phenotype == Phenotype::PM {
                    modifiers.push(AppliedModifier {
                        kind: ModifierKind::LowBodyWeight,
                        description: format!(
                            "Low body weight ({} kg, below {} kg) with a PM phenotype: consider a further dose reduction.",
                            weight, limit
                        ),
                    });
                }
            }

        }

        // 6. Borderline activity score (genomic, flag only)
        if let (Some(score), Some(limit)) = (call.activity_score, tables.borderline_activity_score) {
            if call.phenotype == Phenotype::IM && score > 0.0 && score <= limit {
                modifiers.push(AppliedModifier {
                    kind: ModifierKind::BorderlineActivity,
                    description: format!(
                        "Activity score {:.2} is borderline between IM and PM; consider PM-level precautions.",
                        score
                    ),
                });
            }
        }

        // 7. Allergy override
        if history.is_some_and(|h| h.is_allergic_to(drug)) {
            label = RiskLabel::Contraindicated;
            severity = Severity::Critical;
            percentage = percentage.max(i32::from(tables.allergy_floor));
            modifiers.push(AppliedModifier {
                kind: ModifierKind::AllergyContraindication,
                description: format!(
                    "Documented allergy to {}: contraindicated regardless of genotype.",
                    drug
                ),
            });
        }

        let percentage = percentage.clamp(0, 100) as u8;

        let mut reasoning = base_reasoning;
        for modifier in &modifiers {
            reasoning.push(' ');
            reasoning.push_str(&modifier.description);
        }

        debug!(
            "{} risk: {} -> {} ({}%, {}), {} modifiers",
            drug,
            base_label,
            label,
            percentage,
            severity,
            modifiers.len()
        );

        Ok(RiskOutcome {
            assessment: RiskAssessment {
                label,
                percentage,
                severity,
                reasoning,
                base_label,
                base_severity,
                modifiers,
            },
            evidence_level,
        })
    }
}

/// Substitute rule template placeholders
fn render_reasoning(template: &str, drug: &str, call: &PhenotypeCall, phenotype: Phenotype) -> String {
    template
        .replace("{drug}", drug)
        .replace("{gene}", &call.gene)
        .replace("{phenotype_name}", phenotype.description())
        .replace("{phenotype}", phenotype.as_str())
        .replace("{diplotype}", &call.diplotype)
}

fn capitalize(word: &str) -> String {
    let mut chars = word.chars();
    match chars.next() {
        Some(first) => first.to_uppercase().chain(chars).collect(),
        None => String::new(),
    }
}
