//! Enrichment result model and the built-in back-end capabilities
//!
//! Each database back-end is an opaque statistical engine; this module
//! defines the shape of what it returns. Results are a tagged union of
//! rank-based and subset-based variants so the router can switch on the
//! tag instead of inspecting term strings.
//!
//! The crate ships two generic capabilities so custom signature
//! collections work without a specialized back-end: [`hypergeom`] for
//! subset-based over-representation and [`preranked`] for rank-based
//! running-score analysis.

use std::fmt::Display;

use crate::identifier::GeneKey;
use crate::ranking::Direction;
use crate::universe::UniverseChoice;

pub mod correction;
pub mod hypergeom;
pub mod preranked;

/// Branch of a hierarchical ontology
///
/// Results sourced from a hierarchical ontology get an extra output
/// sub-folder keyed by their branch.
#[derive(Clone, Copy, Debug, Hash, PartialEq, Eq)]
pub enum OntologyBranch {
    BiologicalProcess,
    MolecularFunction,
    CellularComponent,
}

impl OntologyBranch {
    pub fn as_str(&self) -> &'static str {
        match self {
            OntologyBranch::BiologicalProcess => "BP",
            OntologyBranch::MolecularFunction => "MF",
            OntologyBranch::CellularComponent => "CC",
        }
    }
}

impl Display for OntologyBranch {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// A named collection of term → gene-key sets
///
/// This is the generic gene-set definition the built-in capabilities test
/// against; custom signature tables load into one of these.
#[derive(Clone, Debug, Default)]
pub struct TermIndex {
    terms: Vec<(String, Vec<GeneKey>)>,
}

impl TermIndex {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn insert(&mut self, term: &str, keys: Vec<GeneKey>) {
        self.terms.push((term.to_string(), keys));
    }

    pub fn len(&self) -> usize {
        self.terms.len()
    }

    pub fn is_empty(&self) -> bool {
        self.terms.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = (&str, &[GeneKey])> {
        self.terms
            .iter()
            .map(|(term, keys)| (term.as_str(), keys.as_slice()))
    }
}

impl FromIterator<(String, Vec<GeneKey>)> for TermIndex {
    fn from_iter<I: IntoIterator<Item = (String, Vec<GeneKey>)>>(iter: I) -> Self {
        Self {
            terms: iter.into_iter().collect(),
        }
    }
}

/// One term row of a rank-based result
#[derive(Clone, Debug)]
pub struct RankedTerm {
    pub term: String,
    /// Enrichment score, the peak of the running sum
    pub score: f64,
    /// Enrichment score normalized against the permutation null
    pub normalized: f64,
    pub pvalue: f64,
    pub padj: f64,
    /// Gene keys driving the enrichment score
    pub leading_edge: Vec<GeneKey>,
}

/// One term row of a subset-based result
#[derive(Clone, Debug)]
pub struct SubsetTerm {
    pub term: String,
    pub pvalue: f64,
    pub padj: f64,
    pub qvalue: f64,
    /// Hits over subset size
    pub gene_ratio: (usize, usize),
    /// Term size over universe size
    pub background_ratio: (usize, usize),
    /// Subset members belonging to the term
    pub hits: Vec<GeneKey>,
}

/// A rank-based result for one database
#[derive(Clone, Debug)]
pub struct RankedResult {
    database: String,
    branch: Option<OntologyBranch>,
    terms: Vec<RankedTerm>,
}

impl RankedResult {
    pub fn new(database: &str, terms: Vec<RankedTerm>) -> Self {
        Self {
            database: database.to_string(),
            branch: None,
            terms,
        }
    }

    pub fn database(&self) -> &str {
        &self.database
    }

    pub fn branch(&self) -> Option<OntologyBranch> {
        self.branch
    }

    pub fn terms(&self) -> &[RankedTerm] {
        &self.terms
    }

    pub fn len(&self) -> usize {
        self.terms.len()
    }

    pub fn is_empty(&self) -> bool {
        self.terms.is_empty()
    }

    pub(crate) fn set_branch(&mut self, branch: OntologyBranch) {
        self.branch = Some(branch);
    }
}

/// A subset-based result for one (database, universe, direction) task
#[derive(Clone, Debug)]
pub struct SubsetResult {
    database: String,
    branch: Option<OntologyBranch>,
    direction: Direction,
    universe: UniverseChoice,
    terms: Vec<SubsetTerm>,
}

impl SubsetResult {
    pub fn new(
        database: &str,
        direction: Direction,
        universe: UniverseChoice,
        terms: Vec<SubsetTerm>,
    ) -> Self {
        Self {
            database: database.to_string(),
            branch: None,
            direction,
            universe,
            terms,
        }
    }

    pub fn database(&self) -> &str {
        &self.database
    }

    pub fn branch(&self) -> Option<OntologyBranch> {
        self.branch
    }

    pub fn direction(&self) -> Direction {
        self.direction
    }

    pub fn universe(&self) -> UniverseChoice {
        self.universe
    }

    pub fn terms(&self) -> &[SubsetTerm] {
        &self.terms
    }

    pub fn len(&self) -> usize {
        self.terms.len()
    }

    pub fn is_empty(&self) -> bool {
        self.terms.is_empty()
    }

    pub(crate) fn set_branch(&mut self, branch: OntologyBranch) {
        self.branch = Some(branch);
    }
}

/// The tagged union every back-end returns
#[derive(Clone, Debug)]
pub enum EnrichmentResult {
    Ranked(RankedResult),
    Subset(SubsetResult),
}

impl EnrichmentResult {
    /// The label of the originating database
    pub fn database(&self) -> &str {
        match self {
            EnrichmentResult::Ranked(r) => r.database(),
            EnrichmentResult::Subset(s) => s.database(),
        }
    }

    pub fn branch(&self) -> Option<OntologyBranch> {
        match self {
            EnrichmentResult::Ranked(r) => r.branch(),
            EnrichmentResult::Subset(s) => s.branch(),
        }
    }

    pub fn is_rank_based(&self) -> bool {
        matches!(self, EnrichmentResult::Ranked(_))
    }

    pub fn term_count(&self) -> usize {
        match self {
            EnrichmentResult::Ranked(r) => r.len(),
            EnrichmentResult::Subset(s) => s.len(),
        }
    }

    /// A valid call with zero significant terms, a common outcome of
    /// over-strict cutoffs
    pub fn is_empty(&self) -> bool {
        self.term_count() == 0
    }

    /// Term names in result order
    pub fn term_names(&self) -> Vec<&str> {
        match self {
            EnrichmentResult::Ranked(r) => r.terms().iter().map(|t| t.term.as_str()).collect(),
            EnrichmentResult::Subset(s) => s.terms().iter().map(|t| t.term.as_str()).collect(),
        }
    }

    /// The gene keys attached to each term: leading edge for rank-based
    /// results, hits for subset-based ones
    pub fn term_genes(&self) -> Vec<(&str, &[GeneKey])> {
        match self {
            EnrichmentResult::Ranked(r) => r
                .terms()
                .iter()
                .map(|t| (t.term.as_str(), t.leading_edge.as_slice()))
                .collect(),
            EnrichmentResult::Subset(s) => s
                .terms()
                .iter()
                .map(|t| (t.term.as_str(), t.hits.as_slice()))
                .collect(),
        }
    }

    pub(crate) fn set_branch(&mut self, branch: OntologyBranch) {
        match self {
            EnrichmentResult::Ranked(r) => r.set_branch(branch),
            EnrichmentResult::Subset(s) => s.set_branch(branch),
        }
    }
}

#[cfg(test)]
mod test {
    use super::*;
    use crate::universe::UniverseChoice;

    #[test]
    fn tagged_union_accessors() {
        let ranked = EnrichmentResult::Ranked(RankedResult::new("pathways", Vec::new()));
        assert!(ranked.is_rank_based());
        assert!(ranked.is_empty());
        assert_eq!(ranked.database(), "pathways");
        assert!(ranked.branch().is_none());

        let subset = EnrichmentResult::Subset(SubsetResult::new(
            "ontology",
            Direction::Up,
            UniverseChoice::Internal,
            vec![SubsetTerm {
                term: "GO:0006915".to_string(),
                pvalue: 0.001,
                padj: 0.01,
                qvalue: 0.01,
                gene_ratio: (3, 10),
                background_ratio: (30, 1000),
                hits: vec![GeneKey::from(1)],
            }],
        ));
        assert!(!subset.is_rank_based());
        assert_eq!(subset.term_count(), 1);
        assert_eq!(subset.term_names(), vec!["GO:0006915"]);
        assert_eq!(subset.term_genes()[0].1, &[GeneKey::from(1)]);
    }
}
