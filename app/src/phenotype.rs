// ==============================================================================
// phenotype.rs - Diplotype and Metabolizer Phenotype Resolution
// ==============================================================================
// Description: Collapses a gene's star-allele calls into a diplotype and phenotype
// Author: Matt Barham
// Created: 2026-02-03
// Modified: 2026-02-11
// Version: 1.1.0
// ==============================================================================
// Phenotype comes from the diplotype table. A diplotype the table does not list
// falls back to the gene's CPIC activity-score bands when both alleles have an
// assigned activity value.
// ==============================================================================

use std::cmp::Ordering;
use std::collections::HashMap;
use tracing::{debug, info};

use crate::models::{Phenotype, Variant};
use crate::reference::ReferenceData;

/// Resolved genotype for one gene
#[derive(Debug, Clone, PartialEq)]
pub struct PhenotypeCall {
    pub gene: String,
    /// Canonical two-allele form, e.g. "*1/*4"
    pub diplotype: String,
    pub phenotype: Phenotype,
    /// Sum of the two alleles' activity values
    pub activity_score: Option<f64>,
    /// Variants annotated with the gene
    pub variant_count: usize,
    /// Variants that carry the alternate allele and are known to be damaging
    pub pathogenic_count: usize,
}

pub struct PhenotypeResolver<'a> {
    reference: &'a ReferenceData,
}

impl<'a> PhenotypeResolver<'a> {
    pub fn new(reference: &'a ReferenceData) -> Self {
        Self { reference }
    }

    /// Resolve diplotype and phenotype for `gene` from the full variant set
    pub fn resolve(&self, gene: &str, variants: &[Variant]) -> PhenotypeCall {
        let reference_allele = self.reference.reference_allele(gene);
        let gene_variants: Vec<&Variant> = variants.iter().filter(|v| v.is_in_gene(gene)).collect();

        let pathogenic_count = gene_variants
            .iter()
            .filter(|v| v.carries_alternate())
            .filter(|v| {
                self.reference.is_pathogenic_rsid(gene, &v.rsid)
                    || v.star_allele
                        .as_deref()
                        .map(|s| s != reference_allele)
                        .unwrap_or(false)
            })
            .count();

        // Star label -> copies (a label seen twice keeps its highest copy count)
        let mut copies: HashMap<&str, u8> = HashMap::new();
        for variant in gene_variants.iter().filter(|v| v.carries_alternate()) {
            if let Some(star) = variant.star_allele.as_deref() {
                let entry = copies.entry(star).or_insert(0);
                *entry = (*entry).max(variant.zygosity.copies());
            }
        }

        if copies.is_empty() {
            let diplotype = format!("{}/{}", reference_allele, reference_allele);
            debug!("{}: no qualifying star alleles, defaulting to {} (NM)", gene, diplotype);
            return PhenotypeCall {
                gene: gene.to_string(),
                activity_score: self
                    .reference
                    .activity_score(gene, reference_allele, reference_allele),
                diplotype,
                phenotype: Phenotype::NM,
                variant_count: gene_variants.len(),
                pathogenic_count,
            };
        }

        let mut calls: Vec<(&str, u8)> = copies.into_iter().collect();
        calls.sort_by(|a, b| b.1.cmp(&a.1).then_with(|| star_order(a.0, b.0)));

        let (first, first_copies) = calls[0];
        let second = if first_copies >= 2 {
            first
        } else {
            calls.get(1).map(|c| c.0).unwrap_or(reference_allele)
        };

        let diplotype = canonical_diplotype(&format!("{}/{}", first, second));
        let activity_score = self.reference.activity_score(gene, first, second);
        let mut phenotype = self.reference.phenotype_for(gene, &diplotype);

        if phenotype == Phenotype::Unknown {
            if let Some(refined) =
                activity_score.and_then(|score| self.reference.phenotype_for_activity(gene, score))
            {
                info!(
                    "{} {} not in phenotype table; activity score {:.2} -> {}",
                    gene,
                    diplotype,
                    activity_score.unwrap_or_default(),
                    refined
                );
                phenotype = refined;
            }
        }

        if calls.len() > 2 {
            debug!(
                "{}: {} star alleles called, keeping the top two for {}",
                gene,
                calls.len(),
                diplotype
            );
        }
        debug!("{} resolved: {} -> {}", gene, diplotype, phenotype);

        PhenotypeCall {
            gene: gene.to_string(),
            diplotype,
            phenotype,
            activity_score,
            variant_count: gene_variants.len(),
            pathogenic_count,
        }
    }
}

/// Sort key for star labels: numeric part first, then suffix
fn star_key(label: &str) -> (bool, u64, &str) {
    let body = label.trim_start_matches('*');
    let digits_end = body
        .find(|c: char| !c.is_ascii_digit())
        .unwrap_or(body.len());

    match body[..digits_end].parse::<u64>() {
        Ok(n) => (false, n, &body[digits_end..]),
        Err(_) => (true, 0, body),
    }
}

/// Natural ordering of star labels ("*2" < "*10" < "*17" < "*17xN")
pub fn star_order(a: &str, b: &str) -> Ordering {
    star_key(a).cmp(&star_key(b)).then_with(|| a.cmp(b))
}

/// Sort the alleles of a diplotype naturally ("*4/*1" -> "*1/*4")
pub fn canonical_diplotype(raw: &str) -> String {
    let mut alleles: Vec<&str> = raw
        .split('/')
        .map(str::trim)
        .filter(|a| !a.is_empty())
        .collect();
    alleles.sort_by(|a, b| star_order(a, b));
    alleles.join("/")
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::Zygosity;

    fn call(gene: &str, rsid: &str, star: &str, genotype: &str) -> Variant {
        Variant {
            rsid: rsid.to_string(),
            chromosome: "22".to_string(),
            position: 1,
            reference_allele: "C".to_string(),
            alternate_allele: "T".to_string(),
            genotype: genotype.to_string(),
            zygosity: Zygosity::from_genotype(genotype),
            gene: Some(gene.to_string()),
            star_allele: Some(star.to_string()),
        }
    }

    fn resolve(gene: &str, variants: &[Variant]) -> PhenotypeCall {
        let reference = ReferenceData::builtin().unwrap();
        PhenotypeResolver::new(&reference).resolve(gene, variants)
    }

    #[test]
    fn test_star_order_is_natural() {
        assert_eq!(star_order("*2", "*10"), Ordering::Less);
        assert_eq!(star_order("*17", "*10"), Ordering::Greater);
        assert_eq!(star_order("*1", "*1xN"), Ordering::Less);
        assert_eq!(star_order("*3A", "*3C"), Ordering::Less);
        assert_eq!(star_order("*13", "*D949V"), Ordering::Less);
        assert_eq!(canonical_diplotype("*17/*2"), "*2/*17");
        assert_eq!(canonical_diplotype(" *4 / *1 "), "*1/*4");
    }

    #[test]
    fn test_no_variants_defaults_to_reference() {
        let result = resolve("CYP2D6", &[]);
        assert_eq!(result.diplotype, "*1/*1");
        assert_eq!(result.phenotype, Phenotype::NM);
        assert_eq!(result.variant_count, 0);
        assert_eq!(result.pathogenic_count, 0);
    }

    #[test]
    fn test_heterozygous_fills_second_slot_with_reference() {
        let result = resolve("CYP2D6", &[call("CYP2D6", "rs3892097", "*4", "0/1")]);
        assert_eq!(result.diplotype, "*1/*4");
        assert_eq!(result.phenotype, Phenotype::IM);
        assert_eq!(result.pathogenic_count, 1);
    }

    #[test]
    fn test_homozygous_null_is_poor_metabolizer() {
        let result = resolve("CYP2D6", &[call("CYP2D6", "rs3892097", "*4", "1/1")]);
        assert_eq!(result.diplotype, "*4/*4");
        assert_eq!(result.phenotype, Phenotype::PM);
    }

    #[test]
    fn test_two_heterozygous_calls_form_compound_diplotype() {
        let result = resolve(
            "CYP2C19",
            &[
                call("CYP2C19", "rs12248560", "*17", "0/1"),
                call("CYP2C19", "rs4244285", "*2", "0/1"),
            ],
        );
        assert_eq!(result.diplotype, "*2/*17");
        assert_eq!(result.phenotype, Phenotype::IM);
        assert_eq!(result.pathogenic_count, 2);
    }

    #[test]
    fn test_higher_copy_call_ranks_first() {
        // *2 homozygous outranks *3 heterozygous and fills both slots
        let result = resolve(
            "CYP2C19",
            &[
                call("CYP2C19", "rs4986893", "*3", "0/1"),
                call("CYP2C19", "rs4244285", "*2", "1/1"),
            ],
        );
        assert_eq!(result.diplotype, "*2/*2");
        assert_eq!(result.phenotype, Phenotype::PM);
    }

    #[test]
    fn test_duplication_allele_is_ultra_rapid() {
        let result = resolve("CYP2D6", &[call("CYP2D6", "rs1080985", "*1xN", "0/1")]);
        assert_eq!(result.diplotype, "*1/*1xN");
        assert_eq!(result.phenotype, Phenotype::UM);
    }

    #[test]
    fn test_reference_calls_and_other_genes_ignored() {
        let result = resolve(
            "CYP2D6",
            &[
                call("CYP2D6", "rs3892097", "*4", "0/0"),
                call("CYP2C19", "rs4244285", "*2", "1/1"),
            ],
        );
        assert_eq!(result.diplotype, "*1/*1");
        assert_eq!(result.phenotype, Phenotype::NM);
        assert_eq!(result.variant_count, 1);
        assert_eq!(result.pathogenic_count, 0);
    }

    #[test]
    fn test_unmapped_diplotype_is_unknown() {
        let result = resolve(
            "CYP2C9",
            &[
                call("CYP2C9", "rs9999", "*8", "0/1"),
                call("CYP2C9", "rs1799853", "*2", "0/1"),
            ],
        );
        assert_eq!(result.diplotype, "*2/*8");
        assert_eq!(result.phenotype, Phenotype::Unknown);
    }

    #[test]
    fn test_activity_score_reported() {
        let result = resolve(
            "CYP2D6",
            &[
                call("CYP2D6", "rs3892097", "*4", "0/1"),
                call("CYP2D6", "rs1065852", "*10", "0/1"),
            ],
        );
        assert_eq!(result.diplotype, "*4/*10");
        assert_eq!(result.phenotype, Phenotype::IM);
        assert_eq!(result.activity_score, Some(0.25));

        assert_eq!(resolve("CYP2D6", &[]).activity_score, Some(2.0));
    }

    #[test]
    fn test_unlisted_diplotype_resolved_from_activity_score() {
        // *4/*9 is absent from the table: 0.0 + 0.5 falls in the IM band
        let result = resolve(
            "CYP2D6",
            &[
                call("CYP2D6", "rs3892097", "*4", "0/1"),
                call("CYP2D6", "rs5030656", "*9", "0/1"),
            ],
        );
        assert_eq!(result.diplotype, "*4/*9");
        assert_eq!(result.activity_score, Some(0.5));
        assert_eq!(result.phenotype, Phenotype::IM);
    }

    #[test]
    fn test_unassigned_allele_has_no_activity_score() {
        let result = resolve(
            "CYP2C9",
            &[
                call("CYP2C9", "rs9999", "*8", "0/1"),
                call("CYP2C9", "rs1799853", "*2", "0/1"),
            ],
        );
        assert_eq!(result.activity_score, None);
        assert_eq!(result.phenotype, Phenotype::Unknown);
    }

    #[test]
    fn test_resolution_is_order_independent() {
        let a = call("CYP2C19", "rs12248560", "*17", "0/1");
        let b = call("CYP2C19", "rs4244285", "*2", "0/1");
        let forward = resolve("CYP2C19", &[a.clone(), b.clone()]);
        let backward = resolve("CYP2C19", &[b, a]);
        assert_eq!(forward, backward);
    }
}
