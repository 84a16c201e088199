//! The recognized configuration surface of a run
//!
//! Loading (CLI, file) is the caller's concern; this module defines the
//! options, their defaults and their validation. Invalid values are
//! rejected before any database call.

use serde::{Deserialize, Serialize};

use crate::dispatch::{RankedParams, SubsetParams};
use crate::stats::correction::CorrectionMethod;
use crate::universe::UniverseChoice;
use crate::{GenrichError, GenrichResult};

#[derive(Clone, Debug, Serialize, Deserialize)]
#[serde(default)]
pub struct Config {
    /// Effect-size boundary of the subset partition, must be > 0
    pub effect_threshold: f64,
    /// Seed for permutation-based back-ends
    pub seed: u64,
    /// Visual polarity swap of the ranked list, independent of the
    /// up/down subset convention
    pub invert_ranking: bool,
    /// Test subsets against the internal universe instead of each
    /// database's reference universe
    pub use_internal_universe: bool,
    pub pvalue_cutoff: f64,
    pub qvalue_cutoff: f64,
    pub correction: CorrectionMethod,
    /// Term-size window for rank-based analysis
    pub ranked_min_term_size: usize,
    pub ranked_max_term_size: usize,
    /// Term-size window for subset-based analysis
    pub subset_min_term_size: usize,
    pub subset_max_term_size: usize,
    /// Terms shown per chart
    pub top_terms: usize,
    /// Terms per running-score plot page
    pub running_score_batch: usize,
    /// Dispatch user-supplied signature collections as synthetic databases
    pub enable_signatures: bool,
    /// Mapped-fraction floor below which resolution loss is warned about
    pub min_mapped_fraction: f64,
    /// Universe-overlap floor below which the run aborts
    pub min_universe_overlap: f64,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            effect_threshold: 1.0,
            seed: 42,
            invert_ranking: false,
            use_internal_universe: false,
            pvalue_cutoff: 0.05,
            qvalue_cutoff: 0.2,
            correction: CorrectionMethod::default(),
            ranked_min_term_size: 10,
            ranked_max_term_size: 500,
            subset_min_term_size: 10,
            subset_max_term_size: 500,
            top_terms: 20,
            running_score_batch: 10,
            enable_signatures: false,
            min_mapped_fraction: 0.5,
            min_universe_overlap: 0.01,
        }
    }
}

impl Config {
    /// Rejects unusable option values before any database call
    pub fn validate(&self) -> GenrichResult<()> {
        if !(self.effect_threshold > 0.0) {
            return Err(GenrichError::InvalidThreshold(self.effect_threshold));
        }
        for (name, value) in [
            ("pvalue_cutoff", self.pvalue_cutoff),
            ("qvalue_cutoff", self.qvalue_cutoff),
        ] {
            if !(value > 0.0 && value <= 1.0) {
                return Err(GenrichError::InvalidConfig(format!(
                    "{name} must be in (0, 1], got {value}"
                )));
            }
        }
        for (name, value) in [
            ("min_mapped_fraction", self.min_mapped_fraction),
            ("min_universe_overlap", self.min_universe_overlap),
        ] {
            if !(0.0..=1.0).contains(&value) {
                return Err(GenrichError::InvalidConfig(format!(
                    "{name} must be in [0, 1], got {value}"
                )));
            }
        }
        if self.ranked_min_term_size > self.ranked_max_term_size {
            return Err(GenrichError::InvalidConfig(
                "ranked term-size window is empty".to_string(),
            ));
        }
        if self.subset_min_term_size > self.subset_max_term_size {
            return Err(GenrichError::InvalidConfig(
                "subset term-size window is empty".to_string(),
            ));
        }
        if self.running_score_batch == 0 {
            return Err(GenrichError::InvalidConfig(
                "running_score_batch must be at least 1".to_string(),
            ));
        }
        Ok(())
    }

    /// The uniform rank-based parameter contract
    pub fn ranked_params(&self) -> RankedParams {
        RankedParams {
            min_term_size: self.ranked_min_term_size,
            max_term_size: self.ranked_max_term_size,
            pvalue_cutoff: self.pvalue_cutoff,
            correction: self.correction,
            seed: self.seed,
        }
    }

    /// The uniform subset-based parameter contract
    pub fn subset_params(&self) -> SubsetParams {
        SubsetParams {
            min_term_size: self.subset_min_term_size,
            max_term_size: self.subset_max_term_size,
            pvalue_cutoff: self.pvalue_cutoff,
            qvalue_cutoff: self.qvalue_cutoff,
            correction: self.correction,
            universe: if self.use_internal_universe {
                UniverseChoice::Internal
            } else {
                UniverseChoice::Reference
            },
        }
    }
}

#[cfg(test)]
mod test {
    use super::*;

    #[test]
    fn defaults_validate() {
        assert!(Config::default().validate().is_ok());
    }

    #[test]
    fn non_positive_threshold_is_rejected() {
        let mut config = Config::default();
        config.effect_threshold = 0.0;
        assert!(matches!(
            config.validate(),
            Err(GenrichError::InvalidThreshold(_))
        ));
    }

    #[test]
    fn empty_term_size_window_is_rejected() {
        let mut config = Config::default();
        config.subset_min_term_size = 100;
        config.subset_max_term_size = 10;
        assert!(config.validate().is_err());
    }

    #[test]
    fn out_of_range_cutoffs_are_rejected() {
        for (pvalue, qvalue) in [(0.0, 0.2), (1.5, 0.2), (0.05, 0.0)] {
            let mut config = Config::default();
            config.pvalue_cutoff = pvalue;
            config.qvalue_cutoff = qvalue;
            assert!(config.validate().is_err());
        }
    }

    #[test]
    fn universe_flag_picks_the_choice() {
        let mut config = Config::default();
        assert_eq!(config.subset_params().universe, UniverseChoice::Reference);
        config.use_internal_universe = true;
        assert_eq!(config.subset_params().universe, UniverseChoice::Internal);
    }
}
