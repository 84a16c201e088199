//! Cross-reference resolution between identifier namespaces
//!
//! Resolution runs symbol → accession → numeric database key. Missing
//! matches are not errors: unresolved records keep an absent accession/key
//! and are excluded from ranked and subset inputs later. Every run emits an
//! [`UnmappedReport`] because a low mapped fraction signals data-quality
//! problems (wrong organism reference, systematic ID-format mismatch) that
//! would otherwise silently degrade every downstream analysis.

use std::collections::HashMap;
use std::fs::File;
use std::io::{BufWriter, Write};
use std::path::Path;

use tracing::{debug, warn};

use crate::identifier::{Accession, GeneKey, IdentifierRecord};
use crate::GenrichResult;

/// An ordered set of `(from, to)` identifier pairs for one namespace pair
///
/// Many-to-one and one-to-many relations are legal. Lookups default to
/// pass-through for unmapped identifiers rather than failing.
#[derive(Default, Debug, Clone)]
pub struct MappingTable {
    pairs: Vec<(String, String)>,
    forward: HashMap<String, usize>,
    reverse: HashMap<String, usize>,
}

impl MappingTable {
    pub fn new() -> Self {
        Self::default()
    }

    /// Appends one mapping pair
    ///
    /// When a `from` or `to` identifier appears more than once, lookups
    /// return the first inserted pairing.
    pub fn insert(&mut self, from: &str, to: &str) {
        let idx = self.pairs.len();
        self.pairs.push((from.to_string(), to.to_string()));
        self.forward.entry(from.to_string()).or_insert(idx);
        self.reverse.entry(to.to_string()).or_insert(idx);
    }

    /// The mapped identifier, if one exists
    pub fn forward_lookup(&self, from: &str) -> Option<&str> {
        self.forward.get(from).map(|idx| self.pairs[*idx].1.as_str())
    }

    /// The source identifier a mapped one came from, if known
    pub fn reverse_lookup(&self, to: &str) -> Option<&str> {
        self.reverse.get(to).map(|idx| self.pairs[*idx].0.as_str())
    }

    /// Translates an identifier, passing unmapped ones through unchanged
    pub fn translate<'a>(&'a self, id: &'a str) -> &'a str {
        self.forward_lookup(id).unwrap_or(id)
    }

    pub fn len(&self) -> usize {
        self.pairs.len()
    }

    pub fn is_empty(&self) -> bool {
        self.pairs.is_empty()
    }

    pub fn pairs(&self) -> impl Iterator<Item = (&str, &str)> {
        self.pairs.iter().map(|(from, to)| (from.as_str(), to.as_str()))
    }
}

/// External capability that maps an accession to its numeric database key
pub trait KeyLookup {
    fn key_of(&self, accession: &Accession) -> Option<GeneKey>;
}

/// A map-backed [`KeyLookup`], filled from an accession/key table
#[derive(Default, Debug, Clone)]
pub struct TableKeyLookup {
    keys: HashMap<Accession, GeneKey>,
}

impl TableKeyLookup {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn insert(&mut self, accession: Accession, key: GeneKey) {
        self.keys.entry(accession).or_insert(key);
    }

    pub fn len(&self) -> usize {
        self.keys.len()
    }

    pub fn is_empty(&self) -> bool {
        self.keys.is_empty()
    }
}

impl FromIterator<(Accession, GeneKey)> for TableKeyLookup {
    fn from_iter<I: IntoIterator<Item = (Accession, GeneKey)>>(iter: I) -> Self {
        let mut lookup = Self::new();
        for (accession, key) in iter {
            lookup.insert(accession, key);
        }
        lookup
    }
}

impl KeyLookup for TableKeyLookup {
    fn key_of(&self, accession: &Accession) -> Option<GeneKey> {
        self.keys.get(accession).copied()
    }
}

/// Resolves canonical names to accessions and database keys and keeps the
/// inverse maps needed to render human-readable labels afterwards
#[derive(Default, Debug)]
pub struct Resolver {
    symbol_to_accession: MappingTable,
    symbol_of_key: HashMap<GeneKey, String>,
    accession_of_key: HashMap<GeneKey, Accession>,
    key_of_symbol: HashMap<String, GeneKey>,
}

impl Resolver {
    /// Creates a resolver over one symbol → accession translation table
    pub fn new(symbol_to_accession: MappingTable) -> Self {
        Self {
            symbol_to_accession,
            symbol_of_key: HashMap::new(),
            accession_of_key: HashMap::new(),
            key_of_symbol: HashMap::new(),
        }
    }

    /// Resolves a sequence of raw names into [`IdentifierRecord`]s
    ///
    /// Output has the same length and order as the input. Records that
    /// cannot be resolved keep `None` for accession and key.
    pub fn resolve<L: KeyLookup>(&mut self, raw_names: &[String], lookup: &L) -> Vec<IdentifierRecord> {
        let mut records = Vec::with_capacity(raw_names.len());
        for raw in raw_names {
            let mut record = IdentifierRecord::new(raw);
            if let Some(accession) = self.symbol_to_accession.forward_lookup(record.canonical_name())
            {
                let accession = Accession::from(accession);
                if let Some(key) = lookup.key_of(&accession) {
                    record.set_key(key);
                    self.symbol_of_key
                        .entry(key)
                        .or_insert_with(|| record.canonical_name().to_string());
                    self.accession_of_key.entry(key).or_insert_with(|| accession.clone());
                    self.key_of_symbol
                        .entry(record.canonical_name().to_string())
                        .or_insert(key);
                } else {
                    debug!("no database key for accession {}", accession);
                }
                record.set_accession(accession);
            } else {
                debug!("no accession for symbol {}", record.canonical_name());
            }
            records.push(record);
        }
        records
    }

    /// Inverse lookup: the gene symbol a key was resolved from
    pub fn symbol_of(&self, key: GeneKey) -> Option<&str> {
        self.symbol_of_key.get(&key).map(String::as_str)
    }

    /// Inverse lookup: the accession a key was resolved from
    pub fn accession_of(&self, key: GeneKey) -> Option<&Accession> {
        self.accession_of_key.get(&key)
    }

    /// The key a symbol resolved to, if it did
    pub fn key_of_symbol(&self, symbol: &str) -> Option<GeneKey> {
        self.key_of_symbol.get(symbol).copied()
    }

    /// A display label for a key: its symbol, or the key itself as fallback
    pub fn label_of(&self, key: GeneKey) -> String {
        match self.symbol_of(key) {
            Some(symbol) => symbol.to_string(),
            None => key.to_string(),
        }
    }
}

/// One identifier that did not survive cross-reference resolution
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct UnmappedEntry {
    /// The canonical name that found no key
    pub name: String,
    /// 1-based position in the original input ordering
    pub rank: usize,
}

/// Audit of identifiers lost during cross-reference resolution
#[derive(Debug, Clone)]
pub struct UnmappedReport {
    entries: Vec<UnmappedEntry>,
    total: usize,
    mapped: usize,
}

impl UnmappedReport {
    /// Collects the unmapped residue of one resolution pass
    ///
    /// Records with a blank raw name count as missing values and are
    /// excluded from both numerator and denominator.
    pub fn from_records(records: &[IdentifierRecord]) -> Self {
        let mut entries = Vec::new();
        let mut total = 0;
        let mut mapped = 0;
        for (idx, record) in records.iter().enumerate() {
            if record.raw_name().trim().is_empty() {
                continue;
            }
            total += 1;
            if record.is_resolved() {
                mapped += 1;
            } else {
                entries.push(UnmappedEntry {
                    name: record.canonical_name().to_string(),
                    rank: idx + 1,
                });
            }
        }
        Self { entries, total, mapped }
    }

    pub fn entries(&self) -> &[UnmappedEntry] {
        &self.entries
    }

    pub fn total(&self) -> usize {
        self.total
    }

    pub fn mapped(&self) -> usize {
        self.mapped
    }

    /// `|resolved| / |inputs excluding missing values|`, in `[0, 1]`
    ///
    /// An empty input maps nothing and loses nothing; it reports `1.0`.
    pub fn mapped_fraction(&self) -> f64 {
        if self.total == 0 {
            return 1.0;
        }
        self.mapped as f64 / self.total as f64
    }

    /// Warns when the mapped fraction undershoots `floor`
    ///
    /// Resolution loss is data-quality signal, not a failure; the run
    /// proceeds either way.
    pub fn warn_if_below(&self, floor: f64) {
        let fraction = self.mapped_fraction();
        if fraction < floor {
            warn!(
                "only {:.1}% of {} identifiers resolved to a database key (floor {:.1}%)",
                fraction * 100.0,
                self.total,
                floor * 100.0
            );
        }
    }

    /// Persists the report as a TSV of `(name, rank)` rows
    pub fn write_tsv<P: AsRef<Path>>(&self, path: P) -> GenrichResult<()> {
        let file = File::create(path)?;
        let mut out = BufWriter::new(file);
        writeln!(out, "# mapped {}/{} ({:.3})", self.mapped, self.total, self.mapped_fraction())?;
        writeln!(out, "name\trank")?;
        for entry in &self.entries {
            writeln!(out, "{}\t{}", entry.name, entry.rank)?;
        }
        Ok(())
    }
}
