// ==============================================================================
// interactions.rs - Drug-Drug Interactions and Patient-History Flags
// ==============================================================================
// Description: Pairs the analyzed drug with batch peers and current medications
// Author: Matt Barham
// Created: 2026-02-04
// Modified: 2026-02-11
// Version: 1.1.0
// ==============================================================================

use std::collections::HashSet;
use tracing::{debug, warn};

use crate::models::{
    DrugInteraction, HistoryFlag, HistoryFlagKind, InteractionSource, PatientHistory, Severity,
};
use crate::reference::{LifestyleFactor, Organ, ReferenceData};

pub struct InteractionChecker<'a> {
    reference: &'a ReferenceData,
}

impl<'a> InteractionChecker<'a> {
    pub fn new(reference: &'a ReferenceData) -> Self {
        Self { reference }
    }

    /// Interactions between `drug` and every other drug in play
    ///
    /// Batch peers are checked first (request order), then current
    /// medications (listed order). Self-pairs and repeated names are skipped.
    pub fn check(
        &self,
        drug: &str,
        batch: &[String],
        history: Option<&PatientHistory>,
    ) -> Vec<DrugInteraction> {
        let drug = drug.trim().to_uppercase();
        let mut seen: HashSet<String> = HashSet::new();
        seen.insert(drug.clone());

        let peers = batch
            .iter()
            .map(|d| (d.trim().to_uppercase(), InteractionSource::CoPrescribed));
        let medications = history
            .map(|h| h.normalized_medications())
            .unwrap_or_default()
            .into_iter()
            .map(|m| (m, InteractionSource::CurrentMedication));

        let mut interactions = Vec::new();
        for (other, source) in peers.chain(medications) {
            if other.is_empty() || !seen.insert(other.clone()) {
                continue;
            }

            if let Some(rule) = self.reference.interaction(&drug, &other) {
                warn!("DDI detected: {} x {} ({})", drug, other, rule.severity.as_str());
                interactions.push(DrugInteraction {
                    interacting_drug: other,
                    severity: rule.severity,
                    mechanism: rule.mechanism.clone(),
                    recommendation: rule.recommendation.clone(),
                    source,
                });
            }
        }

        interactions
    }

    /// Warnings raised from patient history for `drug`
    pub fn history_flags(&self, drug: &str, history: Option<&PatientHistory>) -> Vec<HistoryFlag> {
        let Some(history) = history else {
            return Vec::new();
        };
        let mut flags = Vec::new();

        if history.is_allergic_to(drug) {
            warn!("Allergy match for {}", drug);
            flags.push(HistoryFlag {
                kind: HistoryFlagKind::Allergy,
                severity: Severity::Critical,
                message: format!("ALLERGY ALERT: Patient has a documented allergy to {}.", drug),
            });
        }

        for reaction in history.reactions_to(drug) {
            flags.push(HistoryFlag {
                kind: HistoryFlagKind::PriorReaction,
                severity: Severity::High,
                message: format!("Prior adverse reaction reported involving {}: '{}'.", drug, reaction),
            });
        }

        let conditions: Vec<String> = history.conditions.iter().map(|c| c.to_lowercase()).collect();
        for warning in self.reference.condition_warnings_for(drug) {
            let keyword = warning.keyword.to_lowercase();
            if conditions.iter().any(|c| c.contains(&keyword)) {
                flags.push(HistoryFlag {
                    kind: HistoryFlagKind::ConditionRisk,
                    severity: warning.severity,
                    message: warning.message.clone(),
                });
            }
        }

        if let Some(age) = history.age {
            for warning in self.reference.age_warnings_for(drug).filter(|w| w.applies_to(age)) {
                flags.push(HistoryFlag {
                    kind: HistoryFlagKind::AgeRisk,
                    severity: warning.severity,
                    message: warning.message.clone(),
                });
            }
        }

        for warning in self.reference.organ_warnings_for(drug) {
            let function = match warning.organ {
                Organ::Kidney => history.kidney_function.as_deref(),
                Organ::Liver => history.liver_function.as_deref(),
            };
            if let Some(function) = function.filter(|f| warning.applies_to(f)) {
                flags.push(HistoryFlag {
                    kind: HistoryFlagKind::OrganRisk,
                    severity: warning.severity,
                    message: warning.render(function),
                });
            }
        }

        for warning in self.reference.lifestyle_warnings_for(drug) {
            let value = match warning.factor {
                LifestyleFactor::Smoking => history.smoking_status.as_deref(),
                LifestyleFactor::Alcohol => history.alcohol_use.as_deref(),
            };
            if value.is_some_and(|v| warning.applies_to(v)) {
                flags.push(HistoryFlag {
                    kind: HistoryFlagKind::LifestyleRisk,
                    severity: warning.severity,
                    message: warning.message.clone(),
                });
            }
        }

        debug!("{}: {} history flags", drug, flags.len());
        flags
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::InteractionSeverity;

    fn batch(drugs: &[&str]) -> Vec<String> {
        drugs.iter().map(|d| d.to_string()).collect()
    }

    #[test]
    fn test_batch_peers_then_current_medications() {
        let reference = ReferenceData::builtin().unwrap();
        let checker = InteractionChecker::new(&reference);
        let history = PatientHistory {
            current_medications: vec!["Ibuprofen".to_string(), "aspirin".to_string()],
            ..Default::default()
        };

        let found = checker.check(
            "WARFARIN",
            &batch(&["WARFARIN", "CLOPIDOGREL", "FLUOROURACIL"]),
            Some(&history),
        );

        let names: Vec<&str> = found.iter().map(|i| i.interacting_drug.as_str()).collect();
        assert_eq!(names, vec!["CLOPIDOGREL", "FLUOROURACIL", "IBUPROFEN", "ASPIRIN"]);
        assert_eq!(found[0].source, InteractionSource::CoPrescribed);
        assert_eq!(found[2].source, InteractionSource::CurrentMedication);
        assert_eq!(found[2].severity, InteractionSeverity::Major);
    }

    #[test]
    fn test_duplicate_partner_reported_once() {
        let reference = ReferenceData::builtin().unwrap();
        let checker = InteractionChecker::new(&reference);
        let history = PatientHistory {
            current_medications: vec!["clopidogrel".to_string()],
            ..Default::default()
        };

        let found = checker.check("WARFARIN", &batch(&["WARFARIN", "CLOPIDOGREL"]), Some(&history));
        assert_eq!(found.len(), 1);
        assert_eq!(found[0].source, InteractionSource::CoPrescribed);
    }

    #[test]
    fn test_no_interactions() {
        let reference = ReferenceData::builtin().unwrap();
        let checker = InteractionChecker::new(&reference);
        assert!(checker.check("CODEINE", &batch(&["CODEINE", "SIMVASTATIN"]), None).is_empty());
    }

    #[test]
    fn test_history_flags() {
        let reference = ReferenceData::builtin().unwrap();
        let checker = InteractionChecker::new(&reference);
        let history = PatientHistory {
            age: Some(80),
            allergies: vec!["warfarin".to_string()],
            prior_adverse_reactions: vec!["Warfarin: major GI bleed 2019".to_string()],
            conditions: vec!["Chronic Liver Disease".to_string()],
            ..Default::default()
        };

        let flags = checker.history_flags("WARFARIN", Some(&history));
        let kinds: Vec<HistoryFlagKind> = flags.iter().map(|f| f.kind).collect();
        assert_eq!(
            kinds,
            vec![
                HistoryFlagKind::Allergy,
                HistoryFlagKind::PriorReaction,
                HistoryFlagKind::ConditionRisk,
                HistoryFlagKind::AgeRisk,
            ]
        );
        assert_eq!(flags[0].severity, Severity::Critical);
        assert_eq!(flags[2].severity, Severity::Critical);
    }

    #[test]
    fn test_organ_function_flags() {
        let reference = ReferenceData::builtin().unwrap();
        let checker = InteractionChecker::new(&reference);
        let history = PatientHistory {
            kidney_function: Some("Moderate impairment".to_string()),
            liver_function: Some("Child-Pugh A".to_string()),
            ..Default::default()
        };

        let flags = checker.history_flags("CODEINE", Some(&history));
        assert_eq!(flags.len(), 2);
        assert!(flags.iter().all(|f| f.kind == HistoryFlagKind::OrganRisk));
        assert!(flags[0].message.contains("codeine metabolites"));
        assert!(flags[1].message.contains("(Child-Pugh A)"));

        // Moderate kidney impairment is below the fluorouracil threshold
        assert!(checker.history_flags("FLUOROURACIL", Some(&history)).is_empty());

        let normal = PatientHistory {
            liver_function: Some("normal".to_string()),
            ..Default::default()
        };
        assert!(checker.history_flags("WARFARIN", Some(&normal)).is_empty());
    }

    #[test]
    fn test_lifestyle_flags() {
        let reference = ReferenceData::builtin().unwrap();
        let checker = InteractionChecker::new(&reference);
        let history = PatientHistory {
            alcohol_use: Some("Heavy".to_string()),
            smoking_status: Some("current".to_string()),
            ..Default::default()
        };

        let codeine = checker.history_flags("CODEINE", Some(&history));
        assert_eq!(codeine.len(), 1);
        assert_eq!(codeine[0].kind, HistoryFlagKind::LifestyleRisk);
        assert_eq!(codeine[0].severity, Severity::Critical);

        let warfarin = checker.history_flags("WARFARIN", Some(&history));
        let severities: Vec<Severity> = warfarin.iter().map(|f| f.severity).collect();
        assert_eq!(severities, vec![Severity::Moderate, Severity::High]);

        let former = PatientHistory {
            smoking_status: Some("former".to_string()),
            alcohol_use: Some("moderate".to_string()),
            ..Default::default()
        };
        assert!(checker.history_flags("WARFARIN", Some(&former)).is_empty());
    }

    #[test]
    fn test_no_history_no_flags() {
        let reference = ReferenceData::builtin().unwrap();
        let checker = InteractionChecker::new(&reference);
        assert!(checker.history_flags("CODEINE", None).is_empty());
        assert!(checker
            .history_flags("CODEINE", Some(&PatientHistory::default()))
            .is_empty());
    }
}
