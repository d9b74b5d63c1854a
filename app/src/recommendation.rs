// ==============================================================================
// recommendation.rs - Clinical Recommendation Builder
// ==============================================================================
// Description: Dosing, monitoring and alternatives derived from the final verdict
// Author: Matt Barham
// Created: 2026-02-05
// Modified: 2026-02-11
// Version: 1.0.0
// ==============================================================================

use crate::models::{
    ClinicalRecommendation, DrugInteraction, HistoryFlag, HistoryFlagKind, InteractionSeverity,
    Phenotype, RiskLabel,
};

const MAJOR_INTERACTION_CAUTION: &str =
    " Major drug interaction detected: additional dose caution required.";

/// Build the recommendation block for one drug
///
/// Precedence: allergy, then contraindication (label or interaction), then
/// the risk label.
pub fn build_recommendation(
    drug: &str,
    gene: &str,
    phenotype: Phenotype,
    label: RiskLabel,
    interactions: &[DrugInteraction],
    flags: &[HistoryFlag],
    alternatives: &[String],
) -> ClinicalRecommendation {
    let has_allergy = flags.iter().any(|f| f.kind == HistoryFlagKind::Allergy);
    if has_allergy {
        return ClinicalRecommendation {
            dosing: format!("STOP: Patient has a documented allergy to {}. Do not prescribe.", drug),
            monitoring: "Immediate allergy review; document in patient record.".to_string(),
            contraindication: Some(format!("Documented allergy to {}.", drug)),
            alternative_drugs: alternatives.to_vec(),
        };
    }

    let contraindicated_with: Vec<&str> = interactions
        .iter()
        .filter(|i| i.severity == InteractionSeverity::Contraindicated)
        .map(|i| i.interacting_drug.as_str())
        .collect();

    if label == RiskLabel::Contraindicated || !contraindicated_with.is_empty() {
        let reason = if contraindicated_with.is_empty() {
            format!("{} is contraindicated for this {} genotype.", drug, gene)
        } else {
            format!(
                "{} is contraindicated with {}.",
                drug,
                contraindicated_with.join(", ")
            )
        };
        return ClinicalRecommendation {
            dosing: format!("CONTRAINDICATED: {} must not be used.", drug),
            monitoring: "Urgent pharmacist consult; select alternative therapy.".to_string(),
            contraindication: Some(reason),
            alternative_drugs: alternatives.to_vec(),
        };
    }

    let has_major = interactions
        .iter()
        .any(|i| i.severity == InteractionSeverity::Major);
    let has_warnings = !flags.is_empty() || !interactions.is_empty();

    match label {
        RiskLabel::Safe => {
            let mut dosing = "Continue standard dosing.".to_string();
            if has_major {
                dosing.push_str(MAJOR_INTERACTION_CAUTION);
            }
            if has_warnings {
                dosing.push_str(" Review patient history flags and interactions.");
            }
            ClinicalRecommendation {
                dosing,
                monitoring: if has_warnings {
                    "Enhanced monitoring due to patient history flags.".to_string()
                } else {
                    "Routine follow-up.".to_string()
                },
                contraindication: None,
                alternative_drugs: Vec::new(),
            }
        }
        RiskLabel::AdjustDosage | RiskLabel::Moderate => {
            let mut dosing = format!(
                "Reduce dose of {} per CPIC guidelines for {} {} phenotype.",
                drug, gene, phenotype
            );
            if has_major {
                dosing.push_str(MAJOR_INTERACTION_CAUTION);
            }
            ClinicalRecommendation {
                dosing,
                monitoring: "Increased therapeutic drug monitoring recommended.".to_string(),
                contraindication: None,
                alternative_drugs: alternatives.to_vec(),
            }
        }
        RiskLabel::Toxic | RiskLabel::Ineffective | RiskLabel::Contraindicated => {
            ClinicalRecommendation {
                dosing: format!("AVOID {}. Select alternative therapy.", drug),
                monitoring: "Urgent pharmacist / geneticist consult.".to_string(),
                contraindication: None,
                alternative_drugs: alternatives.to_vec(),
            }
        }
    }
}
