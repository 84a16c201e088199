//! End-to-end orchestration of one enrichment run
//!
//! Wires the six stages together in order: canonicalize and resolve the
//! identifiers, audit the universes, build the ranked list and subsets,
//! dispatch every database and route the results. The audit artifacts
//! (unmapped report, universe overlap, subset name lists) are written
//! before dispatch so a run that later fails or returns empty results
//! still leaves its inputs inspectable.
//!
//! All writes go through the explicit `output_root` parameter; nothing
//! mutates the process working directory.

use std::fs;
use std::path::Path;
use std::sync::Arc;

use tracing::debug;

use crate::config::Config;
use crate::dispatch::{DatabaseDescriptor, Dispatcher};
use crate::identifier::xref::{KeyLookup, MappingTable, Resolver, UnmappedReport};
use crate::parser::diffexpr::DiffExprTable;
use crate::parser::signatures::SignatureCollection;
use crate::ranking::RankedGeneList;
use crate::routing::{Renderer, Router};
use crate::stats::{hypergeom, preranked};
use crate::universe::{CoverageAudit, GeneUniverse, UniverseChoice};
use crate::GenrichResult;

/// What one run produced, beyond its on-disk artifacts
#[derive(Debug)]
pub struct RunSummary {
    pub mapped_fraction: f64,
    /// Composite names dispatched, successes and failures combined
    pub dispatched: usize,
    pub failures: usize,
    /// Results routed to an output directory
    pub routed: usize,
}

/// Runs the full pipeline
///
/// `reference` is the database-defined universe the coverage audit checks
/// the experiment against; it also serves as the background population
/// unless [`Config::use_internal_universe`] is set. Signature collections
/// join the configured databases as synthetic descriptors when
/// [`Config::enable_signatures`] is set.
#[allow(clippy::too_many_arguments)]
pub fn run<L: KeyLookup, R: Renderer>(
    config: &Config,
    table: &DiffExprTable,
    mapping: MappingTable,
    lookup: &L,
    reference: &GeneUniverse,
    databases: Vec<DatabaseDescriptor>,
    signatures: &[SignatureCollection],
    renderer: &R,
    output_root: &Path,
) -> GenrichResult<RunSummary> {
    config.validate()?;
    fs::create_dir_all(output_root)?;

    // stages 1+2: canonicalize and resolve
    let mut resolver = Resolver::new(mapping);
    let records = resolver.resolve(&table.names, lookup);
    let report = UnmappedReport::from_records(&records);
    report.write_tsv(output_root.join("unmapped_identifiers.tsv"))?;
    report.warn_if_below(config.min_mapped_fraction);

    // stage 3: universes
    let internal = GeneUniverse::internal(records.iter().filter_map(|r| r.key()));
    let audit = CoverageAudit::new(&internal, reference);
    audit.write_report(output_root.join("universe"), &resolver)?;
    audit.ensure_usable(config.min_universe_overlap)?;

    // stage 4: ranked list and subsets, persisted before any dispatch
    let ranked = RankedGeneList::build(&records, &table.scores, config.invert_ranking);
    let (up, down) = ranked.partition(config.effect_threshold)?;
    up.write_names(output_root.join("subset_up.txt"), &resolver)?;
    down.write_names(output_root.join("subset_down.txt"), &resolver)?;
    debug!(
        "ranked {} genes, {} up / {} down at threshold {}",
        ranked.len(),
        up.len(),
        down.len(),
        config.effect_threshold
    );

    // stage 5: dispatch
    let mut dispatcher = Dispatcher::new(config.ranked_params(), config.subset_params());
    for descriptor in databases {
        dispatcher.register(descriptor);
    }
    if config.enable_signatures {
        for collection in signatures {
            dispatcher.register(signature_descriptor(collection, &resolver));
        }
    }
    let universe = match config.subset_params().universe {
        UniverseChoice::Internal => &internal,
        UniverseChoice::Reference => reference,
    };
    let bundle = dispatcher.run(&ranked, &[up, down], universe)?;

    // stage 6: route and render
    let router = Router::new(
        output_root,
        config.running_score_batch,
        config.top_terms,
        renderer,
        &resolver,
    );
    let plans = router.route_all(&bundle)?;

    Ok(RunSummary {
        mapped_fraction: report.mapped_fraction(),
        dispatched: bundle.len(),
        failures: bundle.failure_count(),
        routed: plans.len(),
    })
}

/// Wraps a signature collection into a synthetic database descriptor
///
/// The collection only carries the generic rank-based and subset-based
/// capabilities, no specialized variants.
pub fn signature_descriptor(
    collection: &SignatureCollection,
    resolver: &Resolver,
) -> DatabaseDescriptor {
    let descriptor = DatabaseDescriptor::new(collection.name()).custom_signature();
    let label = descriptor.label().to_string();
    let index = Arc::new(collection.to_index(resolver));

    let ranked_index = Arc::clone(&index);
    let ranked_label = label.clone();
    let subset_index = index;
    let subset_label = label;
    descriptor
        .with_ranked(Arc::new(move |ranked, params| {
            preranked::enrich(&ranked_index, ranked, &ranked_label, params)
        }))
        .with_subset(Arc::new(move |subset, universe, params| {
            hypergeom::overrepresentation(&subset_index, subset, universe, &subset_label, params)
        }))
}
