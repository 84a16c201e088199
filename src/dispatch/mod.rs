//! Fan-out of ranked and subset analyses across database back-ends
//!
//! Every configured database receives the same ranked list and the same
//! directional subsets under a uniform parameter contract. Each
//! (database, universe, direction) invocation is independent and runs on
//! rayon's bounded pool; one back-end failing, returning garbage or
//! panicking is recorded against its composite name and never cancels a
//! sibling task.

use std::fmt;
use std::panic::{catch_unwind, AssertUnwindSafe};
use std::str::FromStr;
use std::sync::Arc;

use rayon::prelude::*;
use tracing::{debug, warn};

use crate::ranking::{Direction, DirectionalSubset, RankedGeneList};
use crate::stats::correction::CorrectionMethod;
use crate::stats::{EnrichmentResult, OntologyBranch, RankedResult, SubsetResult};
use crate::universe::{GeneUniverse, UniverseChoice};
use crate::{GenrichError, GenrichResult};

/// Uniform parameter contract for rank-based capabilities
#[derive(Clone, Copy, Debug)]
pub struct RankedParams {
    pub min_term_size: usize,
    pub max_term_size: usize,
    pub pvalue_cutoff: f64,
    pub correction: CorrectionMethod,
    /// Seed for permutation-based back-ends; identical inputs must
    /// reproduce identical results
    pub seed: u64,
}

/// Uniform parameter contract for subset-based capabilities
#[derive(Clone, Copy, Debug)]
pub struct SubsetParams {
    pub min_term_size: usize,
    pub max_term_size: usize,
    pub pvalue_cutoff: f64,
    pub qvalue_cutoff: f64,
    pub correction: CorrectionMethod,
    /// The background population this analysis tests against
    pub universe: UniverseChoice,
}

/// A database's rank-based analysis entry point
pub type RankedCapability =
    Arc<dyn Fn(&RankedGeneList, &RankedParams) -> GenrichResult<RankedResult> + Send + Sync>;

/// A database's subset-based analysis entry point
pub type SubsetCapability = Arc<
    dyn Fn(&DirectionalSubset, &GeneUniverse, &SubsetParams) -> GenrichResult<SubsetResult>
        + Send
        + Sync,
>;

/// One configured enrichment database and its capabilities
///
/// A database need not support both analysis modes. Custom signature
/// collections register as synthetic databases that only carry the generic
/// capabilities.
#[derive(Clone)]
pub struct DatabaseDescriptor {
    label: String,
    ranked: Option<RankedCapability>,
    subset: Option<SubsetCapability>,
    is_custom_signature: bool,
    branch: Option<OntologyBranch>,
}

impl DatabaseDescriptor {
    /// Creates a descriptor with no capabilities
    ///
    /// Path separators in the label would make composite names ambiguous,
    /// so they are replaced.
    pub fn new(label: &str) -> Self {
        Self {
            label: label.replace('/', "-"),
            ranked: None,
            subset: None,
            is_custom_signature: false,
            branch: None,
        }
    }

    pub fn with_ranked(mut self, capability: RankedCapability) -> Self {
        self.ranked = Some(capability);
        self
    }

    pub fn with_subset(mut self, capability: SubsetCapability) -> Self {
        self.subset = Some(capability);
        self
    }

    pub fn custom_signature(mut self) -> Self {
        self.is_custom_signature = true;
        self
    }

    pub fn with_branch(mut self, branch: OntologyBranch) -> Self {
        self.branch = Some(branch);
        self
    }

    pub fn label(&self) -> &str {
        &self.label
    }

    pub fn is_custom_signature(&self) -> bool {
        self.is_custom_signature
    }

    pub fn branch(&self) -> Option<OntologyBranch> {
        self.branch
    }

    pub fn supports_ranked(&self) -> bool {
        self.ranked.is_some()
    }

    pub fn supports_subset(&self) -> bool {
        self.subset.is_some()
    }
}

impl fmt::Debug for DatabaseDescriptor {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("DatabaseDescriptor")
            .field("label", &self.label)
            .field("ranked", &self.ranked.is_some())
            .field("subset", &self.subset.is_some())
            .field("is_custom_signature", &self.is_custom_signature)
            .field("branch", &self.branch)
            .finish()
    }
}

/// Analysis mode of one dispatched task
#[derive(Clone, Copy, Debug, Hash, PartialEq, Eq)]
pub enum AnalysisMode {
    /// Rank-based analysis over the full ordered list
    Ranked,
    /// Subset-based analysis of one directional subset
    Subset,
}

impl AnalysisMode {
    pub fn as_str(&self) -> &'static str {
        match self {
            AnalysisMode::Ranked => "gsea",
            AnalysisMode::Subset => "ora",
        }
    }
}

impl fmt::Display for AnalysisMode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for AnalysisMode {
    type Err = GenrichError;
    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "gsea" => Ok(AnalysisMode::Ranked),
            "ora" => Ok(AnalysisMode::Subset),
            other => Err(GenrichError::InvalidResultName(other.to_string())),
        }
    }
}

/// The unique name of one dispatched task and its result
///
/// Encodes analysis mode, database label and, for subset mode, universe
/// choice and direction. The router derives output placement from this
/// key alone, so it must round-trip through its string form without
/// ambiguity; keys are only built through [`CompositeKey::ranked`] and
/// [`CompositeKey::subset`], which keeps the mode and the optional
/// segments consistent.
#[derive(Clone, Debug, Hash, PartialEq, Eq)]
pub struct CompositeKey {
    mode: AnalysisMode,
    database: String,
    universe: Option<UniverseChoice>,
    direction: Option<Direction>,
}

impl CompositeKey {
    pub fn ranked(database: &str) -> Self {
        Self {
            mode: AnalysisMode::Ranked,
            database: database.to_string(),
            universe: None,
            direction: None,
        }
    }

    pub fn subset(database: &str, universe: UniverseChoice, direction: Direction) -> Self {
        Self {
            mode: AnalysisMode::Subset,
            database: database.to_string(),
            universe: Some(universe),
            direction: Some(direction),
        }
    }

    pub fn mode(&self) -> AnalysisMode {
        self.mode
    }

    pub fn database(&self) -> &str {
        &self.database
    }

    pub fn universe(&self) -> Option<UniverseChoice> {
        self.universe
    }

    pub fn direction(&self) -> Option<Direction> {
        self.direction
    }
}

impl fmt::Display for CompositeKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match (self.universe, self.direction) {
            (Some(universe), Some(direction)) => {
                write!(f, "{}/{}/{}/{}", self.mode, self.database, universe, direction)
            }
            _ => write!(f, "{}/{}", self.mode, self.database),
        }
    }
}

impl FromStr for CompositeKey {
    type Err = GenrichError;
    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let parts: Vec<&str> = s.split('/').collect();
        match parts.as_slice() {
            [mode, database] if *mode == AnalysisMode::Ranked.as_str() => {
                Ok(CompositeKey::ranked(database))
            }
            [mode, database, universe, direction] if *mode == AnalysisMode::Subset.as_str() => {
                Ok(CompositeKey::subset(
                    database,
                    universe.parse()?,
                    direction.parse()?,
                ))
            }
            _ => Err(GenrichError::InvalidResultName(s.to_string())),
        }
    }
}

/// Outcome of one dispatched task
#[derive(Debug, Clone)]
pub enum DispatchOutcome {
    Success(EnrichmentResult),
    /// The back-end returned an error or panicked; siblings are unaffected
    Failed(String),
}

impl DispatchOutcome {
    pub fn result(&self) -> Option<&EnrichmentResult> {
        match self {
            DispatchOutcome::Success(result) => Some(result),
            DispatchOutcome::Failed(_) => None,
        }
    }

    pub fn is_failed(&self) -> bool {
        matches!(self, DispatchOutcome::Failed(_))
    }
}

/// Mapping from composite name to dispatch outcome
///
/// Preserves insertion order, which is the iteration order of dispatch;
/// order is not significant for correctness.
#[derive(Debug, Default)]
pub struct ResultBundle {
    entries: Vec<(CompositeKey, DispatchOutcome)>,
}

impl ResultBundle {
    pub fn new() -> Self {
        Self::default()
    }

    /// Inserts one outcome, rejecting duplicate composite names
    pub fn insert(&mut self, key: CompositeKey, outcome: DispatchOutcome) -> GenrichResult<()> {
        if self.entries.iter().any(|(existing, _)| *existing == key) {
            return Err(GenrichError::DuplicateResultName(key.to_string()));
        }
        self.entries.push((key, outcome));
        Ok(())
    }

    pub fn get(&self, key: &CompositeKey) -> Option<&DispatchOutcome> {
        self.entries
            .iter()
            .find(|(existing, _)| existing == key)
            .map(|(_, outcome)| outcome)
    }

    pub fn iter(&self) -> impl Iterator<Item = (&CompositeKey, &DispatchOutcome)> {
        self.entries.iter().map(|(key, outcome)| (key, outcome))
    }

    /// Successful results only, failures excluded
    pub fn results(&self) -> impl Iterator<Item = (&CompositeKey, &EnrichmentResult)> {
        self.entries
            .iter()
            .filter_map(|(key, outcome)| outcome.result().map(|result| (key, result)))
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn success_count(&self) -> usize {
        self.entries.iter().filter(|(_, o)| !o.is_failed()).count()
    }

    pub fn failure_count(&self) -> usize {
        self.entries.iter().filter(|(_, o)| o.is_failed()).count()
    }
}

/// Invokes every configured database with the uniform parameter contract
pub struct Dispatcher {
    databases: Vec<DatabaseDescriptor>,
    ranked_params: RankedParams,
    subset_params: SubsetParams,
}

enum Task<'a> {
    Ranked {
        descriptor: &'a DatabaseDescriptor,
        capability: &'a RankedCapability,
    },
    Subset {
        descriptor: &'a DatabaseDescriptor,
        capability: &'a SubsetCapability,
        subset: &'a DirectionalSubset,
    },
}

impl Dispatcher {
    pub fn new(ranked_params: RankedParams, subset_params: SubsetParams) -> Self {
        Self {
            databases: Vec::new(),
            ranked_params,
            subset_params,
        }
    }

    pub fn register(&mut self, descriptor: DatabaseDescriptor) {
        self.databases.push(descriptor);
    }

    pub fn databases(&self) -> &[DatabaseDescriptor] {
        &self.databases
    }

    /// Runs every supported (mode, database, direction) task and collects
    /// the outcomes under their composite names
    ///
    /// Tasks run concurrently on rayon's pool. A failing or panicking
    /// back-end records a [`DispatchOutcome::Failed`] for its key; an
    /// empty result is a success. Returns an error only when two tasks
    /// would share a composite name, i.e. duplicate database labels.
    pub fn run(
        &self,
        ranked: &RankedGeneList,
        subsets: &[DirectionalSubset],
        universe: &GeneUniverse,
    ) -> GenrichResult<ResultBundle> {
        let mut tasks: Vec<(CompositeKey, Task)> = Vec::new();
        for descriptor in &self.databases {
            if let Some(capability) = &descriptor.ranked {
                tasks.push((
                    CompositeKey::ranked(descriptor.label()),
                    Task::Ranked { descriptor, capability },
                ));
            }
            if let Some(capability) = &descriptor.subset {
                for subset in subsets {
                    tasks.push((
                        CompositeKey::subset(
                            descriptor.label(),
                            self.subset_params.universe,
                            subset.direction(),
                        ),
                        Task::Subset { descriptor, capability, subset },
                    ));
                }
            }
        }
        debug!("dispatching {} tasks across {} databases", tasks.len(), self.databases.len());

        let ranked_params = self.ranked_params;
        let subset_params = self.subset_params;
        let outcomes: Vec<(CompositeKey, DispatchOutcome)> = tasks
            .into_par_iter()
            .map(|(key, task)| {
                let outcome = match task {
                    Task::Ranked { descriptor, capability } => {
                        let invoked =
                            catch_unwind(AssertUnwindSafe(|| capability(ranked, &ranked_params)));
                        finish_outcome(
                            &key,
                            descriptor,
                            invoked.map(|r| r.map(EnrichmentResult::Ranked)),
                        )
                    }
                    Task::Subset { descriptor, capability, subset } => {
                        let invoked = catch_unwind(AssertUnwindSafe(|| {
                            capability(subset, universe, &subset_params)
                        }));
                        finish_outcome(
                            &key,
                            descriptor,
                            invoked.map(|r| r.map(EnrichmentResult::Subset)),
                        )
                    }
                };
                (key, outcome)
            })
            .collect();

        let mut bundle = ResultBundle::new();
        for (key, outcome) in outcomes {
            bundle.insert(key, outcome)?;
        }
        Ok(bundle)
    }
}

fn finish_outcome(
    key: &CompositeKey,
    descriptor: &DatabaseDescriptor,
    invoked: std::thread::Result<GenrichResult<EnrichmentResult>>,
) -> DispatchOutcome {
    match invoked {
        Ok(Ok(mut result)) => {
            if let Some(branch) = descriptor.branch() {
                result.set_branch(branch);
            }
            DispatchOutcome::Success(result)
        }
        Ok(Err(err)) => {
            warn!("{} failed: {}", key, err);
            DispatchOutcome::Failed(err.to_string())
        }
        Err(_) => {
            warn!("{} panicked", key);
            DispatchOutcome::Failed("back-end panicked".to_string())
        }
    }
}

#[cfg(test)]
mod test {
    use super::*;
    use crate::identifier::{GeneKey, IdentifierRecord};
    use crate::stats::OntologyBranch;

    fn example_inputs() -> (RankedGeneList, Vec<DirectionalSubset>, GeneUniverse) {
        let records: Vec<IdentifierRecord> = (1..=4)
            .map(|k| {
                let mut record = IdentifierRecord::new(&format!("G{k}"));
                record.set_key(GeneKey::from(k));
                record
            })
            .collect();
        let list = RankedGeneList::build(&records, &[3.0, 1.0, -1.0, -4.0], false);
        let (up, down) = list.partition(2.0).unwrap();
        let universe = GeneUniverse::internal((1..=4).map(GeneKey::from));
        (list, vec![up, down], universe)
    }

    fn ranked_params() -> RankedParams {
        RankedParams {
            min_term_size: 1,
            max_term_size: 500,
            pvalue_cutoff: 0.05,
            correction: CorrectionMethod::BenjaminiHochberg,
            seed: 42,
        }
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

    fn ok_ranked(label: &str) -> RankedCapability {
        let label = label.to_string();
        Arc::new(move |_, _| Ok(RankedResult::new(&label, Vec::new())))
    }

    fn ok_subset(label: &str) -> SubsetCapability {
        let label = label.to_string();
        Arc::new(move |subset, _, params: &SubsetParams| {
            Ok(SubsetResult::new(
                &label,
                subset.direction(),
                params.universe,
                Vec::new(),
            ))
        })
    }

    #[test]
    fn composite_key_round_trip() {
        let keys = [
            CompositeKey::ranked("pathways"),
            CompositeKey::subset("ontology", UniverseChoice::Internal, Direction::Up),
            CompositeKey::subset("disease", UniverseChoice::Reference, Direction::Down),
        ];
        for key in keys {
            let parsed: CompositeKey = key.to_string().parse().unwrap();
            assert_eq!(parsed, key);
        }
        assert!("ora/db".parse::<CompositeKey>().is_err());
        assert!("gsea/db/internal/up".parse::<CompositeKey>().is_err());
        assert!("mystery/db".parse::<CompositeKey>().is_err());
        assert!("ora/db/internal/sideways".parse::<CompositeKey>().is_err());
    }

    #[test]
    fn constructors_keep_mode_and_segments_consistent() {
        let ranked = CompositeKey::ranked("pathways");
        assert_eq!(ranked.mode(), AnalysisMode::Ranked);
        assert!(ranked.universe().is_none());
        assert!(ranked.direction().is_none());
        assert_eq!(ranked.to_string(), "gsea/pathways");

        let subset = CompositeKey::subset("ontology", UniverseChoice::Internal, Direction::Up);
        assert_eq!(subset.mode(), AnalysisMode::Subset);
        assert_eq!(subset.universe(), Some(UniverseChoice::Internal));
        assert_eq!(subset.direction(), Some(Direction::Up));
        assert_eq!(subset.to_string(), "ora/ontology/internal/up");
    }

    #[test]
    fn composite_keys_are_unique_per_run() {
        let (ranked, subsets, universe) = example_inputs();
        let mut dispatcher = Dispatcher::new(ranked_params(), subset_params());
        dispatcher.register(
            DatabaseDescriptor::new("db")
                .with_ranked(ok_ranked("db"))
                .with_subset(ok_subset("db")),
        );
        let bundle = dispatcher.run(&ranked, &subsets, &universe).unwrap();
        assert_eq!(bundle.len(), 3);
        let names: std::collections::HashSet<String> =
            bundle.iter().map(|(key, _)| key.to_string()).collect();
        assert_eq!(names.len(), bundle.len());
    }

    #[test]
    fn duplicate_labels_are_rejected() {
        let (ranked, subsets, universe) = example_inputs();
        let mut dispatcher = Dispatcher::new(ranked_params(), subset_params());
        dispatcher.register(DatabaseDescriptor::new("db").with_ranked(ok_ranked("db")));
        dispatcher.register(DatabaseDescriptor::new("db").with_ranked(ok_ranked("db")));
        assert!(matches!(
            dispatcher.run(&ranked, &subsets, &universe),
            Err(GenrichError::DuplicateResultName(_))
        ));
    }

    #[test]
    fn failing_database_does_not_abort_siblings() {
        let (ranked, subsets, universe) = example_inputs();
        let mut dispatcher = Dispatcher::new(ranked_params(), subset_params());
        for label in ["ontology", "pathways", "disease", "tissue"] {
            dispatcher.register(DatabaseDescriptor::new(label).with_ranked(ok_ranked(label)));
        }
        dispatcher.register(DatabaseDescriptor::new("flaky").with_ranked(Arc::new(|_, _| {
            Err(GenrichError::Backend("remote unavailable".to_string()))
        })));

        let bundle = dispatcher.run(&ranked, &subsets, &universe).unwrap();
        assert_eq!(bundle.len(), 5);
        assert_eq!(bundle.success_count(), 4);
        assert_eq!(bundle.failure_count(), 1);
        let flaky = bundle.get(&CompositeKey::ranked("flaky")).unwrap();
        assert!(flaky.is_failed());
    }

    #[test]
    fn panicking_database_is_isolated() {
        let (ranked, subsets, universe) = example_inputs();
        let mut dispatcher = Dispatcher::new(ranked_params(), subset_params());
        dispatcher.register(DatabaseDescriptor::new("solid").with_ranked(ok_ranked("solid")));
        dispatcher.register(
            DatabaseDescriptor::new("crashy").with_ranked(Arc::new(|_, _| panic!("boom"))),
        );
        let bundle = dispatcher.run(&ranked, &subsets, &universe).unwrap();
        assert_eq!(bundle.success_count(), 1);
        assert_eq!(bundle.failure_count(), 1);
        assert!(bundle.get(&CompositeKey::ranked("crashy")).unwrap().is_failed());
    }

    #[test]
    fn subset_tasks_run_once_per_direction() {
        let (ranked, subsets, universe) = example_inputs();
        let mut dispatcher = Dispatcher::new(ranked_params(), subset_params());
        dispatcher.register(DatabaseDescriptor::new("ontology").with_subset(ok_subset("ontology")));
        let bundle = dispatcher.run(&ranked, &subsets, &universe).unwrap();
        assert_eq!(bundle.len(), 2);
        for direction in [Direction::Up, Direction::Down] {
            let key = CompositeKey::subset("ontology", UniverseChoice::Internal, direction);
            let outcome = bundle.get(&key).unwrap();
            // an empty result is a success, not a failure
            assert!(outcome.result().unwrap().is_empty());
        }
    }

    #[test]
    fn descriptor_branch_is_attached_to_results() {
        let (ranked, subsets, universe) = example_inputs();
        let mut dispatcher = Dispatcher::new(ranked_params(), subset_params());
        dispatcher.register(
            DatabaseDescriptor::new("ontology")
                .with_ranked(ok_ranked("ontology"))
                .with_branch(OntologyBranch::BiologicalProcess),
        );
        let bundle = dispatcher.run(&ranked, &subsets, &universe).unwrap();
        let outcome = bundle.get(&CompositeKey::ranked("ontology")).unwrap();
        assert_eq!(
            outcome.result().unwrap().branch(),
            Some(OntologyBranch::BiologicalProcess)
        );
    }

    #[test]
    fn labels_cannot_break_composite_names() {
        let descriptor = DatabaseDescriptor::new("msigdb/hallmark");
        assert_eq!(descriptor.label(), "msigdb-hallmark");
        let key = CompositeKey::ranked(descriptor.label());
        let parsed: CompositeKey = key.to_string().parse().unwrap();
        assert_eq!(parsed, key);
    }
}
