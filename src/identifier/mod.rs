//! Gene identifier types and canonicalization
//!
//! Upstream spreadsheets silently reformat some gene symbols into calendar
//! dates (`SEPT2` becomes `Sep/02`, `MARCH7` becomes `Mar/07`). The
//! [`canonicalize`] function reverses that corruption; the types in this
//! module track an identifier through its namespaces: raw name, canonical
//! symbol, stable accession and numeric database key.

use std::convert::TryFrom;
use std::fmt::Display;

use crate::GenrichError;

pub mod xref;

/// A unique numeric database key for a gene
///
/// This value can - in theory - represent any numerical unique value.
/// In practice it is the numeric key of the enrichment databases'
/// reference namespace, e.g. the NCBI Gene ID.
#[derive(Clone, Copy, Default, Debug, Hash, PartialEq, PartialOrd, Eq, Ord)]
pub struct GeneKey {
    inner: u32,
}

impl GeneKey {
    /// Convert `self` to `u32`
    pub fn as_u32(&self) -> u32 {
        self.inner
    }
}

impl TryFrom<&str> for GeneKey {
    type Error = GenrichError;
    fn try_from(value: &str) -> Result<Self, Self::Error> {
        Ok(GeneKey {
            inner: value.parse::<u32>()?,
        })
    }
}

impl From<u32> for GeneKey {
    fn from(inner: u32) -> Self {
        GeneKey { inner }
    }
}

impl Display for GeneKey {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.inner)
    }
}

/// A stable accession, e.g. an Ensembl gene ID
#[derive(Clone, Debug, Hash, PartialEq, Eq, PartialOrd, Ord)]
pub struct Accession {
    inner: String,
}

impl Accession {
    pub fn as_str(&self) -> &str {
        &self.inner
    }
}

impl From<&str> for Accession {
    fn from(value: &str) -> Self {
        Accession {
            inner: value.to_string(),
        }
    }
}

impl From<String> for Accession {
    fn from(inner: String) -> Self {
        Accession { inner }
    }
}

impl Display for Accession {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.inner)
    }
}

/// One gene identifier tracked across namespaces
///
/// The accession and key are absent until cross-reference resolution
/// succeeds; unresolved records are excluded from ranked/subset inputs,
/// never defaulted to a placeholder.
#[derive(Clone, Debug)]
pub struct IdentifierRecord {
    raw_name: String,
    canonical_name: String,
    accession: Option<Accession>,
    key: Option<GeneKey>,
}

impl IdentifierRecord {
    /// Creates a record from a raw name, repairing date corruption
    pub fn new(raw_name: &str) -> Self {
        Self {
            raw_name: raw_name.to_string(),
            canonical_name: canonicalize(raw_name),
            accession: None,
            key: None,
        }
    }

    /// The name exactly as it appeared in the input table
    pub fn raw_name(&self) -> &str {
        &self.raw_name
    }

    /// The repaired gene symbol
    ///
    /// Never a date-like token. Distinct raw names may share a canonical
    /// name; such collisions are kept as distinct records.
    pub fn canonical_name(&self) -> &str {
        &self.canonical_name
    }

    pub fn accession(&self) -> Option<&Accession> {
        self.accession.as_ref()
    }

    pub fn key(&self) -> Option<GeneKey> {
        self.key
    }

    /// `true` once cross-reference resolution produced a database key
    pub fn is_resolved(&self) -> bool {
        self.key.is_some()
    }

    pub(crate) fn set_accession(&mut self, accession: Accession) {
        self.accession = Some(accession);
    }

    pub(crate) fn set_key(&mut self, key: GeneKey) {
        self.key = Some(key);
    }
}

/// Repairs a spreadsheet-date-corrupted gene symbol
///
/// A token of the form `<3-letter capitalized prefix>/<2-digit number>` is
/// treated as a corrupted date and reconstructed as
/// `uppercase(prefix) + integer(number)`. Anything else passes through
/// unchanged.
///
/// This is lossy recovery, not validation: several original symbols can
/// repair to the same string and no disambiguation is attempted.
///
/// # Examples
///
/// ```
/// use genrich::identifier::canonicalize;
///
/// assert_eq!(canonicalize("Mar/02"), "MAR2");
/// assert_eq!(canonicalize("Sep/11"), "SEP11");
/// assert_eq!(canonicalize("SEPT2"), "SEPT2");
/// ```
pub fn canonicalize(raw: &str) -> String {
    match repair_date_token(raw) {
        Some(repaired) => repaired,
        None => raw.to_string(),
    }
}

fn repair_date_token(raw: &str) -> Option<String> {
    let (prefix, digits) = raw.split_once('/')?;
    if prefix.len() != 3 || !prefix.chars().all(|c| c.is_ascii_alphabetic()) {
        return None;
    }
    if !prefix.starts_with(|c: char| c.is_ascii_uppercase()) {
        return None;
    }
    if digits.len() != 2 || !digits.chars().all(|c| c.is_ascii_digit()) {
        return None;
    }
    let number: u32 = digits.parse().ok()?;
    Some(format!("{}{}", prefix.to_ascii_uppercase(), number))
}

#[cfg(test)]
mod test {
    use super::*;

    #[test]
    fn repairs_date_tokens() {
        let names = ["SEPT2", "Mar/02", "BRCA1"];
        let repaired: Vec<String> = names.iter().map(|n| canonicalize(n)).collect();
        assert_eq!(repaired, vec!["SEPT2", "MAR2", "BRCA1"]);
    }

    #[test]
    fn strips_leading_zero() {
        assert_eq!(canonicalize("Sep/09"), "SEP9");
        assert_eq!(canonicalize("Dec/01"), "DEC1");
        assert_eq!(canonicalize("Sep/11"), "SEP11");
    }

    #[test]
    fn idempotent() {
        for name in ["Mar/02", "SEPT2", "BRCA1", "Sep/09", "Apr/03"] {
            let once = canonicalize(name);
            assert_eq!(canonicalize(&once), once);
        }
    }

    #[test]
    fn non_matching_tokens_pass_through() {
        for name in ["TP53", "Mar/2", "Mar/123", "March/02", "mar/02", "M3r/02", "Mar/ab", ""] {
            assert_eq!(canonicalize(name), name);
        }
    }

    #[test]
    fn collisions_are_allowed() {
        // both an already-correct symbol and a corrupted one repair to MAR2
        assert_eq!(canonicalize("MAR2"), canonicalize("Mar/02"));
        let records: Vec<IdentifierRecord> =
            ["MAR2", "Mar/02"].iter().map(|n| IdentifierRecord::new(n)).collect();
        assert_eq!(records.len(), 2);
        assert_eq!(records[0].canonical_name(), records[1].canonical_name());
        assert_ne!(records[0].raw_name(), records[1].raw_name());
    }

    #[test]
    fn record_starts_unresolved() {
        let record = IdentifierRecord::new("Mar/02");
        assert_eq!(record.canonical_name(), "MAR2");
        assert!(record.accession().is_none());
        assert!(!record.is_resolved());
    }

    #[test]
    fn gene_key_from_str() {
        let key = GeneKey::try_from("7157").unwrap();
        assert_eq!(key.as_u32(), 7157);
        assert!(GeneKey::try_from("TP53").is_err());
    }
}
