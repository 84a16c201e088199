//! Result classification and output routing
//!
//! Each successful result is classified from its tag and composite name,
//! assigned a deterministic output directory and rendered through an
//! injected [`Renderer`]. Rendering itself is an external capability; the
//! router only decides where each chart goes and which charts apply.
//!
//! Output path segments, in order: analysis-mode root, database label,
//! ontology branch (hierarchical sources only), universe choice and
//! direction (subset mode only).

use std::collections::HashMap;
use std::fs;
use std::path::{Path, PathBuf};

use rayon::prelude::*;
use tracing::{debug, warn};

use crate::dispatch::{CompositeKey, ResultBundle};
use crate::identifier::xref::Resolver;
use crate::identifier::GeneKey;
use crate::stats::EnrichmentResult;
use crate::GenrichResult;

/// One visualization of an enrichment result
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Chart {
    /// Ranked-term bar chart
    TermBar,
    /// Gene-count network linking terms to their genes
    ConceptNetwork,
    /// Term-overlap set chart
    OverlapUpset,
    /// Term-similarity network
    SimilarityNetwork,
    /// Hierarchical term-grouping chart
    TermTree,
    /// One page of running-score plots, a fixed-size batch of terms
    RunningScore { page: usize },
    /// Ridge/distribution plot of the ranked scores per term
    RidgeDistribution,
    /// Gene/effect-size heat chart
    GeneHeat,
    /// DAG-relationship chart for ontology-sourced results
    OntologyDag,
}

impl Chart {
    /// The fixed output filename of this chart
    pub fn filename(&self) -> String {
        match self {
            Chart::TermBar => "barplot.svg".to_string(),
            Chart::ConceptNetwork => "cnetplot.svg".to_string(),
            Chart::OverlapUpset => "upsetplot.svg".to_string(),
            Chart::SimilarityNetwork => "emapplot.svg".to_string(),
            Chart::TermTree => "treeplot.svg".to_string(),
            Chart::RunningScore { page } => format!("gseaplot_page{}.svg", page + 1),
            Chart::RidgeDistribution => "ridgeplot.svg".to_string(),
            Chart::GeneHeat => "heatplot.svg".to_string(),
            Chart::OntologyDag => "goplot.svg".to_string(),
        }
    }

    /// The smallest term count this chart is meaningful for
    fn min_terms(&self) -> usize {
        match self {
            Chart::OverlapUpset | Chart::SimilarityNetwork | Chart::TermTree => 2,
            _ => 1,
        }
    }
}

/// The output directory and the applicable charts for one result
#[derive(Debug)]
pub struct RoutePlan {
    pub dir: PathBuf,
    pub charts: Vec<Chart>,
}

/// Computes the route for one named result
///
/// Classification uses the result's tag and the composite name, never the
/// content of any term string. Charts whose term-count requirement the
/// result does not meet are dropped; a zero-row result keeps an empty
/// chart list, including zero running-score pages.
pub fn plan(
    key: &CompositeKey,
    result: &EnrichmentResult,
    root: &Path,
    batch_size: usize,
) -> RoutePlan {
    let mut dir = root.join(key.mode().as_str()).join(key.database());
    if let Some(branch) = result.branch() {
        dir.push(branch.as_str());
    }
    if let Some(universe) = key.universe() {
        dir.push(universe.as_str());
    }
    if let Some(direction) = key.direction() {
        dir.push(direction.as_str());
    }

    let n = result.term_count();
    let mut charts = vec![
        Chart::TermBar,
        Chart::ConceptNetwork,
        Chart::OverlapUpset,
        Chart::SimilarityNetwork,
        Chart::TermTree,
    ];
    match result {
        EnrichmentResult::Ranked(_) => {
            charts.push(Chart::RidgeDistribution);
            let pages = n.div_ceil(batch_size.max(1));
            for page in 0..pages {
                charts.push(Chart::RunningScore { page });
            }
        }
        EnrichmentResult::Subset(_) => {
            charts.push(Chart::GeneHeat);
            if result.branch().is_some() {
                charts.push(Chart::OntologyDag);
            }
        }
    }
    charts.retain(|chart| n >= chart.min_terms());

    RoutePlan { dir, charts }
}

/// Read-only views computed once per result just before rendering
///
/// Not persisted as part of the result itself.
#[derive(Debug)]
pub struct DerivedViews {
    labels: HashMap<GeneKey, String>,
    terms: Vec<String>,
    /// Row-major pairwise Jaccard similarity over the terms' gene sets
    similarity: Vec<f64>,
}

impl DerivedViews {
    /// Computes gene labels and the term-similarity matrix for the top
    /// `top_terms` terms of `result`
    pub fn compute(result: &EnrichmentResult, resolver: &Resolver, top_terms: usize) -> Self {
        let term_genes = result.term_genes();
        let term_genes = &term_genes[..term_genes.len().min(top_terms)];

        let mut labels = HashMap::new();
        for (_, genes) in term_genes {
            for key in *genes {
                labels
                    .entry(*key)
                    .or_insert_with(|| resolver.label_of(*key));
            }
        }

        let n = term_genes.len();
        let mut similarity = vec![0.0; n * n];
        for i in 0..n {
            similarity[i * n + i] = 1.0;
            for j in (i + 1)..n {
                let value = jaccard(term_genes[i].1, term_genes[j].1);
                similarity[i * n + j] = value;
                similarity[j * n + i] = value;
            }
        }

        Self {
            labels,
            terms: term_genes.iter().map(|(term, _)| term.to_string()).collect(),
            similarity,
        }
    }

    pub fn label(&self, key: GeneKey) -> Option<&str> {
        self.labels.get(&key).map(String::as_str)
    }

    pub fn terms(&self) -> &[String] {
        &self.terms
    }

    pub fn term_count(&self) -> usize {
        self.terms.len()
    }

    /// Similarity between terms `i` and `j`, in `[0, 1]`
    ///
    /// # Panics
    ///
    /// Panics if `i` or `j` is not below [`DerivedViews::term_count`].
    pub fn similarity(&self, i: usize, j: usize) -> f64 {
        self.similarity[i * self.terms.len() + j]
    }
}

fn jaccard(a: &[GeneKey], b: &[GeneKey]) -> f64 {
    if a.is_empty() && b.is_empty() {
        return 0.0;
    }
    let a: std::collections::HashSet<GeneKey> = a.iter().copied().collect();
    let b: std::collections::HashSet<GeneKey> = b.iter().copied().collect();
    let intersection = a.intersection(&b).count();
    let union = a.len() + b.len() - intersection;
    intersection as f64 / union as f64
}

/// External rendering capability injected into the router
///
/// Implementations own chart layout entirely; the router guarantees the
/// parent directory exists and that `chart` is applicable to `result`.
pub trait Renderer: Send + Sync {
    fn render(
        &self,
        chart: &Chart,
        result: &EnrichmentResult,
        views: &DerivedViews,
        path: &Path,
    ) -> GenrichResult<()>;
}

/// Routes every successful result of a bundle to its output directory
pub struct Router<'a, R: Renderer> {
    root: PathBuf,
    batch_size: usize,
    top_terms: usize,
    renderer: &'a R,
    resolver: &'a Resolver,
}

impl<'a, R: Renderer> Router<'a, R> {
    pub fn new(
        root: impl Into<PathBuf>,
        batch_size: usize,
        top_terms: usize,
        renderer: &'a R,
        resolver: &'a Resolver,
    ) -> Self {
        Self {
            root: root.into(),
            batch_size,
            top_terms,
            renderer,
            resolver,
        }
    }

    /// Routes all successful results, failures excluded
    ///
    /// Results render concurrently; their output paths are disjoint by
    /// construction, so no locking is needed beyond idempotent directory
    /// creation.
    pub fn route_all(&self, bundle: &ResultBundle) -> GenrichResult<Vec<RoutePlan>> {
        let jobs: Vec<(&CompositeKey, &EnrichmentResult)> = bundle.results().collect();
        jobs.into_par_iter()
            .map(|(key, result)| self.route_one(key, result))
            .collect()
    }

    fn route_one(&self, key: &CompositeKey, result: &EnrichmentResult) -> GenrichResult<RoutePlan> {
        let plan = plan(key, result, &self.root, self.batch_size);
        fs::create_dir_all(&plan.dir)?;
        if plan.charts.is_empty() {
            debug!("{}: no applicable charts ({} terms)", key, result.term_count());
            return Ok(plan);
        }

        let views = DerivedViews::compute(result, self.resolver, self.top_terms);
        for chart in &plan.charts {
            let path = plan.dir.join(chart.filename());
            if let Err(err) = self.renderer.render(chart, result, &views, &path) {
                // a broken chart is not worth losing the sibling charts
                warn!("{}: rendering {} failed: {}", key, chart.filename(), err);
            }
        }
        Ok(plan)
    }
}
