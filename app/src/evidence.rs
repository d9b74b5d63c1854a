// ==============================================================================
// evidence.rs - Evidence Score
// ==============================================================================
// Description: Confidence score for a drug verdict with contributing factors
// Author: Matt Barham
// Created: 2026-02-04
// Modified: 2026-02-04
// Version: 1.0.0
// ==============================================================================
// score = anchor(level) + min(5 * pathogenic, 15) + (5 if history supplied)
//   anchor: A = 90, B = 75, C = 60
// ==============================================================================

use crate::models::{EvidenceLevel, EvidenceScore};

const PER_PATHOGENIC_VARIANT: u32 = 5;
const MAX_VARIANT_BONUS: u32 = 15;
const HISTORY_BONUS: u32 = 5;

/// Compute the evidence score (always within 0..=100)
pub fn score_evidence(
    level: EvidenceLevel,
    guideline_pmid: Option<&str>,
    pathogenic_count: usize,
    has_history: bool,
) -> EvidenceScore {
    let mut factors = Vec::with_capacity(3);

    let anchor = u32::from(level.anchor());
    factors.push(match guideline_pmid {
        Some(pmid) => format!("Guideline evidence level {} (PMID:{}): {}", level.as_str(), pmid, anchor),
        None => format!("Guideline evidence level {}: {}", level.as_str(), anchor),
    });

    let pathogenic = u32::try_from(pathogenic_count).unwrap_or(u32::MAX);
    let variant_bonus = pathogenic.saturating_mul(PER_PATHOGENIC_VARIANT).min(MAX_VARIANT_BONUS);
    factors.push(if pathogenic > 0 {
        format!("{} pathogenic variant(s) detected: +{}", pathogenic, variant_bonus)
    } else {
        "No pathogenic variants detected: +0".to_string()
    });

    let history_bonus = if has_history { HISTORY_BONUS } else { 0 };
    factors.push(if has_history {
        format!("Patient history supplied: +{}", history_bonus)
    } else {
        "No patient history supplied: +0".to_string()
    });

    let score = (anchor + variant_bonus + history_bonus).min(100) as u8;

    EvidenceScore {
        score,
        level,
        factors,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_level_anchor_only() {
        let score = score_evidence(EvidenceLevel::B, None, 0, false);
        assert_eq!(score.score, 75);
        assert_eq!(score.factors.len(), 3);
        assert!(score.factors[1].starts_with("No pathogenic"));
    }

    #[test]
    fn test_variant_bonus_is_capped() {
        assert_eq!(score_evidence(EvidenceLevel::C, None, 2, false).score, 70);
        assert_eq!(score_evidence(EvidenceLevel::C, None, 3, false).score, 75);
        assert_eq!(score_evidence(EvidenceLevel::C, None, 40, false).score, 75);
    }

    #[test]
    fn test_score_clamped_to_100() {
        let score = score_evidence(EvidenceLevel::A, Some("32602691"), 4, true);
        assert_eq!(score.score, 100);
        assert!(score.factors[0].contains("PMID:32602691"));
        assert!(score.factors[2].starts_with("Patient history supplied"));
    }
}
