//! Multiple testing correction
//!
//! Dispatching many terms per database means many simultaneous hypothesis
//! tests; p-values are adjusted per result before cutoff filtering.

use serde::{Deserialize, Serialize};

/// Multiple testing correction method
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum CorrectionMethod {
    /// Controls the family-wise error rate
    Bonferroni,
    /// Controls the false discovery rate
    BenjaminiHochberg,
}

impl Default for CorrectionMethod {
    fn default() -> Self {
        CorrectionMethod::BenjaminiHochberg
    }
}

/// Adjusts `pvalues` with `method`, preserving input order
pub fn adjust(pvalues: &[f64], method: CorrectionMethod) -> Vec<f64> {
    match method {
        CorrectionMethod::Bonferroni => bonferroni(pvalues),
        CorrectionMethod::BenjaminiHochberg => benjamini_hochberg(pvalues),
    }
}

/// `p_adj = min(p * n, 1.0)`
pub fn bonferroni(pvalues: &[f64]) -> Vec<f64> {
    let n = pvalues.len() as f64;
    pvalues.iter().map(|&p| (p * n).min(1.0)).collect()
}

/// Benjamini-Hochberg: sort, adjust as `p * n / rank`, enforce
/// monotonicity from the largest p-value down, clamp to `[0, 1]`
pub fn benjamini_hochberg(pvalues: &[f64]) -> Vec<f64> {
    let n = pvalues.len();
    if n == 0 {
        return Vec::new();
    }

    let mut indices: Vec<usize> = (0..n).collect();
    indices.sort_by(|&a, &b| pvalues[a].total_cmp(&pvalues[b]));

    let n_f = n as f64;
    let mut adjusted = vec![0.0; n];
    let mut prev = f64::INFINITY;
    for i in (0..n).rev() {
        let rank = (i + 1) as f64;
        let adj = (pvalues[indices[i]] * n_f / rank).min(1.0).min(prev);
        adjusted[indices[i]] = adj;
        prev = adj;
    }
    adjusted
}

#[cfg(test)]
mod test {
    use super::*;

    #[test]
    fn bonferroni_clamps_to_one() {
        let adjusted = bonferroni(&[0.01, 0.5, 0.9]);
        assert!((adjusted[0] - 0.03).abs() < 1e-12);
        assert!((adjusted[1] - 1.0).abs() < 1e-12);
        assert!((adjusted[2] - 1.0).abs() < 1e-12);
    }

    #[test]
    fn benjamini_hochberg_is_monotone() {
        let pvalues = [0.01, 0.04, 0.03, 0.005];
        let adjusted = benjamini_hochberg(&pvalues);
        assert_eq!(adjusted.len(), 4);
        // same rank order as the raw p-values
        assert!(adjusted[3] <= adjusted[0]);
        assert!(adjusted[0] <= adjusted[2]);
        assert!(adjusted[2] <= adjusted[1]);
        assert!(adjusted.iter().all(|&p| (0.0..=1.0).contains(&p)));
    }

    #[test]
    fn empty_input() {
        assert!(adjust(&[], CorrectionMethod::BenjaminiHochberg).is_empty());
        assert!(adjust(&[], CorrectionMethod::Bonferroni).is_empty());
    }

    #[test]
    fn single_pvalue_unchanged() {
        let adjusted = adjust(&[0.02], CorrectionMethod::BenjaminiHochberg);
        assert!((adjusted[0] - 0.02).abs() < 1e-12);
    }
}
