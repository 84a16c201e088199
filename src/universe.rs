//! Background gene universes and coverage auditing
//!
//! Subset-based significance testing needs a background population. The
//! internal universe holds every gene observed in the experiment with a
//! resolvable key; reference universes are database-defined. The
//! [`CoverageAudit`] reports how well the two agree; a near-empty overlap
//! makes every p-value computed against the universe meaningless and fails
//! the run before dispatch.

use std::collections::HashSet;
use std::fmt::Display;
use std::fs::{create_dir_all, File};
use std::io::{BufWriter, Write};
use std::path::Path;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

use crate::identifier::xref::Resolver;
use crate::identifier::GeneKey;
use crate::{GenrichError, GenrichResult};

/// Which background population a subset-based analysis tests against
#[derive(Clone, Copy, Debug, Hash, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum UniverseChoice {
    /// All genes observed in the experiment with a resolvable key
    Internal,
    /// The full universe known to the database
    Reference,
}

impl UniverseChoice {
    pub fn as_str(&self) -> &'static str {
        match self {
            UniverseChoice::Internal => "internal",
            UniverseChoice::Reference => "reference",
        }
    }
}

impl Display for UniverseChoice {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for UniverseChoice {
    type Err = GenrichError;
    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "internal" => Ok(UniverseChoice::Internal),
            "reference" => Ok(UniverseChoice::Reference),
            other => Err(GenrichError::InvalidResultName(other.to_string())),
        }
    }
}

/// A set of database keys used as the background population
#[derive(Clone, Debug)]
pub struct GeneUniverse {
    label: String,
    choice: UniverseChoice,
    keys: HashSet<GeneKey>,
}

impl GeneUniverse {
    /// The universe of all resolvable keys observed in the experiment
    pub fn internal<I: IntoIterator<Item = GeneKey>>(keys: I) -> Self {
        Self {
            label: "internal".to_string(),
            choice: UniverseChoice::Internal,
            keys: keys.into_iter().collect(),
        }
    }

    /// An external, database-defined universe
    pub fn reference<I: IntoIterator<Item = GeneKey>>(label: &str, keys: I) -> Self {
        Self {
            label: label.to_string(),
            choice: UniverseChoice::Reference,
            keys: keys.into_iter().collect(),
        }
    }

    pub fn label(&self) -> &str {
        &self.label
    }

    pub fn choice(&self) -> UniverseChoice {
        self.choice
    }

    pub fn contains(&self, key: GeneKey) -> bool {
        self.keys.contains(&key)
    }

    pub fn len(&self) -> usize {
        self.keys.len()
    }

    pub fn is_empty(&self) -> bool {
        self.keys.is_empty()
    }

    pub fn keys(&self) -> impl Iterator<Item = GeneKey> + '_ {
        self.keys.iter().copied()
    }
}

/// Overlap between the internal universe and one reference universe
///
/// Diagnostic, not gating: analysis proceeds regardless of overlap size,
/// except below the configured floor (see [`CoverageAudit::ensure_usable`]).
#[derive(Debug, Clone)]
pub struct CoverageAudit {
    overlap: Vec<GeneKey>,
    complement: Vec<GeneKey>,
    internal_size: usize,
}

impl CoverageAudit {
    /// Computes the overlap and complement of `internal` against `reference`
    ///
    /// The complement holds internal keys the reference does not know.
    /// Both lists are sorted for deterministic reports.
    pub fn new(internal: &GeneUniverse, reference: &GeneUniverse) -> Self {
        let mut overlap = Vec::new();
        let mut complement = Vec::new();
        for key in internal.keys() {
            if reference.contains(key) {
                overlap.push(key);
            } else {
                complement.push(key);
            }
        }
        overlap.sort_unstable();
        complement.sort_unstable();
        Self {
            overlap,
            complement,
            internal_size: internal.len(),
        }
    }

    pub fn overlap(&self) -> &[GeneKey] {
        &self.overlap
    }

    pub fn complement(&self) -> &[GeneKey] {
        &self.complement
    }

    /// Fraction of the internal universe the reference covers, in `[0, 1]`
    pub fn overlap_fraction(&self) -> f64 {
        if self.internal_size == 0 {
            return 0.0;
        }
        self.overlap.len() as f64 / self.internal_size as f64
    }

    /// Fails the run when the universes barely overlap
    ///
    /// Every subset-based p-value computed against a near-disjoint
    /// background is meaningless, so this is a configuration error, not a
    /// warning.
    pub fn ensure_usable(&self, floor: f64) -> GenrichResult<()> {
        if self.overlap_fraction() < floor {
            return Err(GenrichError::DegenerateUniverse {
                overlap: self.overlap.len(),
                internal: self.internal_size,
            });
        }
        Ok(())
    }

    /// Persists the overlap and complement as human-readable name lists
    ///
    /// Writes `overlap.txt` and `complement.txt` into `dir`, one label per
    /// line, creating the directory if needed.
    pub fn write_report<P: AsRef<Path>>(&self, dir: P, resolver: &Resolver) -> GenrichResult<()> {
        let dir = dir.as_ref();
        create_dir_all(dir)?;
        write_name_list(&dir.join("overlap.txt"), &self.overlap, resolver)?;
        write_name_list(&dir.join("complement.txt"), &self.complement, resolver)?;
        Ok(())
    }
}

fn write_name_list(path: &Path, keys: &[GeneKey], resolver: &Resolver) -> GenrichResult<()> {
    let file = File::create(path)?;
    let mut out = BufWriter::new(file);
    for key in keys {
        writeln!(out, "{}", resolver.label_of(*key))?;
    }
    Ok(())
}
