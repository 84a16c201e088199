//! `genrich` orchestrates gene-set enrichment analysis over a
//! differential-expression result set.
//!
//! The crate resolves heterogeneous gene identifiers across naming systems,
//! defines comparison universes, dispatches the same ranked/subset gene data
//! to many independent enrichment back-ends and routes each back-end's result
//! to a type-appropriate output location.
//!
//! The pipeline runs in six stages:
//!
//! 1. [`identifier::canonicalize`] repairs identifiers corrupted by
//!    spreadsheet auto-formatting
//! 2. [`identifier::xref::Resolver`] maps identifiers between namespaces and
//!    reports unmapped residue
//! 3. [`universe::CoverageAudit`] builds the background universe and audits
//!    its coverage against a reference database
//! 4. [`ranking::RankedGeneList`] derives the ranked gene list and the two
//!    directional subsets
//! 5. [`dispatch::Dispatcher`] fans the data out to every configured
//!    database back-end
//! 6. [`routing::Router`] classifies each result and routes it to its
//!    output directory and visualization set
//!
//! Stages 1-4 are strictly sequential; stages 5 and 6 run their independent
//! tasks on a bounded worker pool.
//!
//! # Examples
//!
//! ```
//! use genrich::identifier::canonicalize;
//!
//! assert_eq!(canonicalize("Mar/02"), "MAR2");
//! assert_eq!(canonicalize("BRCA1"), "BRCA1");
//! ```

use std::num::ParseIntError;
use thiserror::Error;

pub mod config;
pub mod dispatch;
pub mod identifier;
pub mod parser;
pub mod pipeline;
pub mod ranking;
pub mod routing;
pub mod stats;
pub mod universe;

pub use config::Config;
pub use dispatch::{
    AnalysisMode, CompositeKey, DatabaseDescriptor, DispatchOutcome, Dispatcher, ResultBundle,
};
pub use identifier::{canonicalize, Accession, GeneKey, IdentifierRecord};
pub use pipeline::RunSummary;
pub use ranking::{Direction, DirectionalSubset, RankedGeneList};
pub use routing::{Chart, Renderer, Router};
pub use stats::EnrichmentResult;
pub use universe::{CoverageAudit, GeneUniverse, UniverseChoice};

/// Error variants produced by the enrichment pipeline
#[derive(Error, Debug)]
pub enum GenrichError {
    /// The effect-size threshold would not partition the ranked list into
    /// disjoint subsets
    #[error("effect-size threshold must be > 0, got {0}")]
    InvalidThreshold(f64),

    /// The overlap between the internal and the reference universe is too
    /// small for subset-based p-values to mean anything
    #[error("degenerate universe: only {overlap} of {internal} internal genes overlap the reference universe")]
    DegenerateUniverse { overlap: usize, internal: usize },

    /// Two dispatched tasks produced the same composite result name
    #[error("duplicate result name: {0}")]
    DuplicateResultName(String),

    /// A composite result name could not be parsed back into its parts
    #[error("unable to parse result name: {0}")]
    InvalidResultName(String),

    /// A recognized configuration option carries an unusable value
    #[error("invalid configuration: {0}")]
    InvalidConfig(String),

    /// An enrichment back-end reported an error
    #[error("enrichment back-end failed: {0}")]
    Backend(String),

    /// An input table is missing a required column
    #[error("column '{0}' not found in input table")]
    MissingColumn(String),

    /// Unable to parse an integer identifier
    #[error("unable to parse integer")]
    ParseIntError,

    #[error(transparent)]
    Csv(#[from] csv::Error),

    #[error(transparent)]
    Io(#[from] std::io::Error),
}

impl From<ParseIntError> for GenrichError {
    fn from(_: ParseIntError) -> Self {
        GenrichError::ParseIntError
    }
}

/// Crate-wide `Result` alias
pub type GenrichResult<T> = Result<T, GenrichError>;
