//! Ranked gene list and directional subset construction
//!
//! The ranked list feeds rank-based back-ends; the two directional subsets
//! feed subset-based back-ends. Both derive from the same resolved records
//! and effect sizes and are immutable once built.

use std::collections::HashSet;
use std::fmt::Display;
use std::fs::File;
use std::io::{BufWriter, Write};
use std::path::Path;
use std::str::FromStr;

use tracing::debug;

use crate::identifier::xref::Resolver;
use crate::identifier::{GeneKey, IdentifierRecord};
use crate::{GenrichError, GenrichResult};

/// Direction of a threshold-based gene subset
#[derive(Clone, Copy, Debug, Hash, PartialEq, Eq)]
pub enum Direction {
    /// Effect size at or above the positive threshold
    Up,
    /// Effect size at or below the negative threshold
    Down,
}

impl Direction {
    pub fn as_str(&self) -> &'static str {
        match self {
            Direction::Up => "up",
            Direction::Down => "down",
        }
    }
}

impl Display for Direction {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for Direction {
    type Err = GenrichError;
    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "up" => Ok(Direction::Up),
            "down" => Ok(Direction::Down),
            other => Err(GenrichError::InvalidResultName(other.to_string())),
        }
    }
}

/// The full gene list ordered by descending effect size
///
/// Keys are unique and entries with unresolved keys are excluded, not
/// zero-filled. Ties keep their input order.
#[derive(Clone, Debug, Default)]
pub struct RankedGeneList {
    entries: Vec<(GeneKey, f64)>,
}

impl RankedGeneList {
    /// Builds the ranked list from resolved records and their effect sizes
    ///
    /// `records` and `scores` are parallel sequences from the input table.
    /// `invert` negates every score, a visual polarity swap that is
    /// independent of the up/down subset convention. Duplicate keys keep
    /// their first occurrence.
    pub fn build(records: &[IdentifierRecord], scores: &[f64], invert: bool) -> Self {
        let mut seen: HashSet<GeneKey> = HashSet::new();
        let mut entries: Vec<(GeneKey, f64)> = Vec::new();
        for (record, score) in records.iter().zip(scores.iter()) {
            let Some(key) = record.key() else {
                continue;
            };
            if !seen.insert(key) {
                debug!("dropping duplicate key {} ({})", key, record.raw_name());
                continue;
            }
            let score = if invert { -score } else { *score };
            entries.push((key, score));
        }
        // stable sort keeps input order on ties
        entries.sort_by(|a, b| b.1.total_cmp(&a.1));
        Self { entries }
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = (GeneKey, f64)> + '_ {
        self.entries.iter().copied()
    }

    pub fn keys(&self) -> impl Iterator<Item = GeneKey> + '_ {
        self.entries.iter().map(|(key, _)| *key)
    }

    pub fn score_of(&self, key: GeneKey) -> Option<f64> {
        self.entries
            .iter()
            .find(|(k, _)| *k == key)
            .map(|(_, score)| *score)
    }

    /// Partitions the list into its two directional subsets
    ///
    /// A single symmetric threshold splits the list: up = score >= `t`,
    /// down = score <= `-t`. With `t <= 0` (or NaN) the subsets would not
    /// be disjoint, so such thresholds are rejected before any database
    /// call.
    pub fn partition(&self, threshold: f64) -> GenrichResult<(DirectionalSubset, DirectionalSubset)> {
        if !(threshold > 0.0) {
            return Err(GenrichError::InvalidThreshold(threshold));
        }
        let up = self
            .entries
            .iter()
            .filter(|(_, score)| *score >= threshold)
            .map(|(key, _)| *key)
            .collect();
        let down = self
            .entries
            .iter()
            .filter(|(_, score)| *score <= -threshold)
            .map(|(key, _)| *key)
            .collect();
        Ok((
            DirectionalSubset { direction: Direction::Up, keys: up },
            DirectionalSubset { direction: Direction::Down, keys: down },
        ))
    }
}

/// The keys whose effect size crosses the threshold in one direction
///
/// Disjoint from its opposite-direction sibling by construction.
#[derive(Clone, Debug)]
pub struct DirectionalSubset {
    direction: Direction,
    keys: Vec<GeneKey>,
}

impl DirectionalSubset {
    pub fn direction(&self) -> Direction {
        self.direction
    }

    pub fn keys(&self) -> &[GeneKey] {
        &self.keys
    }

    pub fn len(&self) -> usize {
        self.keys.len()
    }

    pub fn is_empty(&self) -> bool {
        self.keys.is_empty()
    }

    pub fn contains(&self, key: GeneKey) -> bool {
        self.keys.contains(&key)
    }

    /// Persists the subset as a human-readable name list
    ///
    /// Written before enrichment runs so the inputs can be audited
    /// independently of any result.
    pub fn write_names<P: AsRef<Path>>(&self, path: P, resolver: &Resolver) -> GenrichResult<()> {
        let file = File::create(path)?;
        let mut out = BufWriter::new(file);
        for key in &self.keys {
            writeln!(out, "{}", resolver.label_of(*key))?;
        }
        Ok(())
    }
}
