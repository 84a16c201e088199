//! Generic subset-based over-representation capability
//!
//! Tests a directional gene subset against a background universe with the
//! hypergeometric distribution's survival function. Used as-is for custom
//! signature collections and as the reference implementation any
//! subset-capable database back-end must match in shape.

use statrs::distribution::{DiscreteCDF, Hypergeometric};
use tracing::debug;

use crate::dispatch::SubsetParams;
use crate::identifier::GeneKey;
use crate::ranking::DirectionalSubset;
use crate::stats::correction::{adjust, CorrectionMethod};
use crate::stats::{SubsetResult, SubsetTerm, TermIndex};
use crate::universe::GeneUniverse;
use crate::{GenrichError, GenrichResult};

use std::collections::HashSet;

/// Calculates the hypergeometric over-representation of every term in
/// `index` within `subset`, against `universe`
///
/// Duplicate genes within a term count once. Terms outside the configured
/// size window are skipped, as are terms with zero hits. Surviving rows are p-adjusted, filtered by the p- and
/// q-value cutoffs and sorted by ascending p-value. Zero surviving rows is
/// a valid result, not an error.
pub fn overrepresentation(
    index: &TermIndex,
    subset: &DirectionalSubset,
    universe: &GeneUniverse,
    database: &str,
    params: &SubsetParams,
) -> GenrichResult<SubsetResult> {
    // only subset members inside the universe can count as draws
    let drawn: HashSet<GeneKey> = subset
        .keys()
        .iter()
        .copied()
        .filter(|key| universe.contains(*key))
        .collect();
    let population = universe.len() as u64;

    let mut rows: Vec<SubsetTerm> = Vec::new();
    let mut pvalues: Vec<f64> = Vec::new();
    for (term, genes) in index.iter() {
        // duplicate (term, gene) rows must not inflate the counts
        let mut seen: HashSet<GeneKey> = HashSet::new();
        let in_universe: Vec<GeneKey> = genes
            .iter()
            .copied()
            .filter(|key| universe.contains(*key) && seen.insert(*key))
            .collect();
        let successes = in_universe.len();
        if successes < params.min_term_size || successes > params.max_term_size {
            debug!("skipping {}: {} genes outside term-size window", term, successes);
            continue;
        }
        let hits: Vec<GeneKey> = in_universe
            .iter()
            .copied()
            .filter(|key| drawn.contains(key))
            .collect();
        if hits.is_empty() {
            debug!("skipping {}: no hits", term);
            continue;
        }

        let hyper = Hypergeometric::new(population, successes as u64, drawn.len() as u64)
            .map_err(|e| GenrichError::Backend(e.to_string()))?;
        // subtracting 1, because we want to test including the observed
        // hits, e.g. "7 or more", but sf by default calculates "more than 7"
        let pvalue = hyper.sf(hits.len() as u64 - 1);

        pvalues.push(pvalue);
        rows.push(SubsetTerm {
            term: term.to_string(),
            pvalue,
            padj: 1.0,
            qvalue: 1.0,
            gene_ratio: (hits.len(), drawn.len()),
            background_ratio: (successes, population as usize),
            hits,
        });
    }

    let padj = adjust(&pvalues, params.correction);
    // q-values stay FDR-based regardless of the configured method
    let qvalues = adjust(&pvalues, CorrectionMethod::BenjaminiHochberg);
    for ((row, padj), qvalue) in rows.iter_mut().zip(padj).zip(qvalues) {
        row.padj = padj;
        row.qvalue = qvalue;
    }

    let mut rows: Vec<SubsetTerm> = rows
        .into_iter()
        .filter(|row| row.pvalue <= params.pvalue_cutoff && row.qvalue <= params.qvalue_cutoff)
        .collect();
    rows.sort_by(|a, b| a.pvalue.total_cmp(&b.pvalue));

    Ok(SubsetResult::new(
        database,
        subset.direction(),
        params.universe,
        rows,
    ))
}

#[cfg(test)]
mod test {
    use super::*;
    use crate::ranking::RankedGeneList;
    use crate::identifier::IdentifierRecord;
    use crate::universe::UniverseChoice;

    fn keys(values: std::ops::Range<u32>) -> Vec<GeneKey> {
        values.map(GeneKey::from).collect()
    }

    fn subset_params() -> SubsetParams {
        SubsetParams {
            min_term_size: 1,
            max_term_size: 500,
            pvalue_cutoff: 0.05,
            qvalue_cutoff: 0.2,
            correction: CorrectionMethod::BenjaminiHochberg,
            universe: UniverseChoice::Internal,
        }
    }

    fn up_subset(key_range: std::ops::Range<u32>) -> DirectionalSubset {
        let records: Vec<IdentifierRecord> = key_range
            .clone()
            .map(|k| {
                let mut record = IdentifierRecord::new(&format!("G{k}"));
                record.set_key(GeneKey::from(k));
                record
            })
            .collect();
        let scores = vec![2.0; records.len()];
        let list = RankedGeneList::build(&records, &scores, false);
        let (up, _) = list.partition(1.0).unwrap();
        up
    }

    #[test]
    fn enriched_term_scores_low_pvalue() {
        let universe = GeneUniverse::internal(keys(0..1000));
        let subset = up_subset(0..20);
        let mut index = TermIndex::new();
        // all 20 subset genes belong to the term
        index.insert("responsive", keys(0..25));
        index.insert("unrelated", keys(500..540));

        let result =
            overrepresentation(&index, &subset, &universe, "signatures", &subset_params()).unwrap();
        assert_eq!(result.len(), 1);
        let row = &result.terms()[0];
        assert_eq!(row.term, "responsive");
        assert!(row.pvalue < 1e-6);
        assert_eq!(row.gene_ratio, (20, 20));
        assert_eq!(row.background_ratio, (25, 1000));
    }

    #[test]
    fn duplicate_term_genes_count_once() {
        let universe = GeneUniverse::internal(keys(0..50));
        let subset = up_subset(0..10);
        let mut index = TermIndex::new();
        // the same gene listed three times, as aggregated signature
        // tables can produce
        index.insert("dup", vec![GeneKey::from(0); 3]);

        let mut params = subset_params();
        params.pvalue_cutoff = 1.0;
        params.qvalue_cutoff = 1.0;
        let result = overrepresentation(&index, &subset, &universe, "sig", &params).unwrap();
        assert_eq!(result.len(), 1);
        let row = &result.terms()[0];
        assert_eq!(row.background_ratio.0, 1);
        assert_eq!(row.gene_ratio.0, 1);
        assert_eq!(row.hits, vec![GeneKey::from(0)]);
    }

    #[test]
    fn hits_belong_to_the_subset() {
        let universe = GeneUniverse::internal(keys(0..100));
        let subset = up_subset(0..10);
        let mut index = TermIndex::new();
        index.insert("mixed", keys(5..40));

        let result =
            overrepresentation(&index, &subset, &universe, "signatures", &subset_params()).unwrap();
        for row in result.terms() {
            for hit in &row.hits {
                assert!(subset.contains(*hit));
                assert!(universe.contains(*hit));
            }
        }
    }

    #[test]
    fn term_size_window_filters() {
        let universe = GeneUniverse::internal(keys(0..100));
        let subset = up_subset(0..10);
        let mut index = TermIndex::new();
        index.insert("tiny", keys(0..2));
        index.insert("huge", keys(0..90));

        let mut params = subset_params();
        params.min_term_size = 5;
        params.max_term_size = 50;
        params.pvalue_cutoff = 1.0;
        params.qvalue_cutoff = 1.0;
        let result = overrepresentation(&index, &subset, &universe, "sig", &params).unwrap();
        assert!(result.is_empty());
    }

    #[test]
    fn strict_cutoffs_yield_empty_result() {
        let universe = GeneUniverse::internal(keys(0..100));
        let subset = up_subset(0..10);
        let mut index = TermIndex::new();
        index.insert("weak", keys(5..95));

        let mut params = subset_params();
        params.pvalue_cutoff = 1e-30;
        let result = overrepresentation(&index, &subset, &universe, "sig", &params).unwrap();
        assert!(result.is_empty());
        assert_eq!(result.direction(), crate::ranking::Direction::Up);
    }
}
