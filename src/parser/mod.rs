//! Parsers for the tabular inputs
//!
//! Three input kinds feed a run: the differential-expression table, the
//! feature/identifier translation table and optional custom signature
//! tables. Delimiters are a configuration detail; every reader takes one
//! explicitly.

/// Reads the differential-expression table
pub mod diffexpr {
    use std::io::Read;
    use std::path::Path;

    use tracing::debug;

    use crate::{GenrichError, GenrichResult};

    /// Rows keyed by gene name with one effect-size column
    ///
    /// `names` and `scores` are parallel; rows with an unparseable effect
    /// size are dropped at read time.
    #[derive(Debug, Clone, Default)]
    pub struct DiffExprTable {
        pub names: Vec<String>,
        pub scores: Vec<f64>,
    }

    impl DiffExprTable {
        pub fn len(&self) -> usize {
            self.names.len()
        }

        pub fn is_empty(&self) -> bool {
            self.names.is_empty()
        }
    }

    /// Reads the table from a file
    pub fn read<P: AsRef<Path>>(
        path: P,
        delimiter: u8,
        gene_column: &str,
        effect_column: &str,
    ) -> GenrichResult<DiffExprTable> {
        let file = std::fs::File::open(path)?;
        parse(file, delimiter, gene_column, effect_column)
    }

    /// Reads the table from any reader
    pub fn parse<R: Read>(
        reader: R,
        delimiter: u8,
        gene_column: &str,
        effect_column: &str,
    ) -> GenrichResult<DiffExprTable> {
        let mut reader = csv::ReaderBuilder::new()
            .delimiter(delimiter)
            .flexible(true)
            .from_reader(reader);
        let headers = reader.headers()?.clone();
        let gene_idx = column_index(&headers, gene_column)?;
        let effect_idx = column_index(&headers, effect_column)?;

        let mut table = DiffExprTable::default();
        for record in reader.records() {
            let record = record?;
            let name = record.get(gene_idx).unwrap_or("").trim();
            let effect = record.get(effect_idx).unwrap_or("").trim();
            match effect.parse::<f64>() {
                Ok(score) => {
                    table.names.push(name.to_string());
                    table.scores.push(score);
                }
                Err(_) => {
                    debug!("skipping row '{}': unparseable effect size '{}'", name, effect);
                }
            }
        }
        Ok(table)
    }

    pub(super) fn column_index(headers: &csv::StringRecord, name: &str) -> GenrichResult<usize> {
        headers
            .iter()
            .position(|h| h == name)
            .ok_or_else(|| GenrichError::MissingColumn(name.to_string()))
    }

    #[cfg(test)]
    mod test {
        use super::*;

        #[test]
        fn reads_named_columns() {
            let data = "gene\tp_val\tavg_log2FC\nTP53\t0.01\t1.5\nBRCA1\t0.2\t-0.7\n";
            let table = parse(data.as_bytes(), b'\t', "gene", "avg_log2FC").unwrap();
            assert_eq!(table.names, vec!["TP53", "BRCA1"]);
            assert_eq!(table.scores, vec![1.5, -0.7]);
        }

        #[test]
        fn missing_column_is_an_error() {
            let data = "gene\tscore\nTP53\t1.0\n";
            assert!(matches!(
                parse(data.as_bytes(), b'\t', "gene", "avg_log2FC"),
                Err(GenrichError::MissingColumn(_))
            ));
        }

        #[test]
        fn unparseable_effect_sizes_are_dropped() {
            let data = "gene,avg_log2FC\nTP53,1.5\nBRCA1,NA\nEGFR,0.3\n";
            let table = parse(data.as_bytes(), b',', "gene", "avg_log2FC").unwrap();
            assert_eq!(table.names, vec!["TP53", "EGFR"]);
        }

        #[test]
        fn blank_names_are_kept_for_the_unmapped_audit() {
            let data = "gene\tavg_log2FC\n\t1.0\nTP53\t0.5\n";
            let table = parse(data.as_bytes(), b'\t', "gene", "avg_log2FC").unwrap();
            assert_eq!(table.len(), 2);
            assert_eq!(table.names[0], "");
        }
    }
}

/// Reads the feature/identifier translation table
pub mod features {
    use std::io::Read;
    use std::path::Path;

    use tracing::debug;

    use crate::identifier::xref::MappingTable;
    use crate::GenrichResult;

    /// Reads `(accession, symbol, feature_type)` rows into a
    /// symbol → accession [`MappingTable`]
    ///
    /// The table has no header row. With `feature_filter` set, rows whose
    /// third column differs are skipped.
    pub fn read<P: AsRef<Path>>(
        path: P,
        delimiter: u8,
        feature_filter: Option<&str>,
    ) -> GenrichResult<MappingTable> {
        let file = std::fs::File::open(path)?;
        parse(file, delimiter, feature_filter)
    }

    /// Reads the table from any reader
    pub fn parse<R: Read>(
        reader: R,
        delimiter: u8,
        feature_filter: Option<&str>,
    ) -> GenrichResult<MappingTable> {
        let mut reader = csv::ReaderBuilder::new()
            .delimiter(delimiter)
            .has_headers(false)
            .flexible(true)
            .from_reader(reader);

        let mut table = MappingTable::new();
        for record in reader.records() {
            let record = record?;
            let (Some(accession), Some(symbol)) = (record.get(0), record.get(1)) else {
                debug!("skipping short feature row");
                continue;
            };
            if let Some(wanted) = feature_filter {
                if record.get(2) != Some(wanted) {
                    continue;
                }
            }
            table.insert(symbol.trim(), accession.trim());
        }
        Ok(table)
    }

    #[cfg(test)]
    mod test {
        use super::*;

        #[test]
        fn maps_symbol_to_accession() {
            let data = "ENSG00000141510\tTP53\tGene Expression\n\
                        ENSG00000012048\tBRCA1\tGene Expression\n";
            let table = parse(data.as_bytes(), b'\t', None).unwrap();
            assert_eq!(table.forward_lookup("TP53"), Some("ENSG00000141510"));
            assert_eq!(table.len(), 2);
        }

        #[test]
        fn feature_filter_drops_other_modalities() {
            let data = "ENSG00000141510\tTP53\tGene Expression\n\
                        ATAC1\tPEAK1\tPeaks\n";
            let table = parse(data.as_bytes(), b'\t', Some("Gene Expression")).unwrap();
            assert_eq!(table.len(), 1);
            assert!(table.forward_lookup("PEAK1").is_none());
        }
    }
}

/// Reads custom signature collections
pub mod signatures {
    use std::collections::HashMap;
    use std::io::Read;
    use std::path::Path;

    use tracing::debug;

    use crate::identifier::xref::Resolver;
    use crate::stats::TermIndex;
    use crate::GenrichResult;

    /// A user-supplied term → gene table, acting as a synthetic database
    #[derive(Debug, Clone)]
    pub struct SignatureCollection {
        name: String,
        terms: Vec<(String, Vec<String>)>,
    }

    impl SignatureCollection {
        pub fn name(&self) -> &str {
            &self.name
        }

        pub fn len(&self) -> usize {
            self.terms.len()
        }

        pub fn is_empty(&self) -> bool {
            self.terms.is_empty()
        }

        pub fn iter(&self) -> impl Iterator<Item = (&str, &[String])> {
            self.terms
                .iter()
                .map(|(term, genes)| (term.as_str(), genes.as_slice()))
        }

        /// Translates the gene symbols into database keys
        ///
        /// Symbols the resolver never saw are dropped; a term keeps its
        /// row even when every symbol drops out, the term-size window
        /// filters it later.
        pub fn to_index(&self, resolver: &Resolver) -> TermIndex {
            let mut index = TermIndex::new();
            for (term, genes) in &self.terms {
                let keys = genes
                    .iter()
                    .filter_map(|symbol| resolver.key_of_symbol(symbol))
                    .collect();
                index.insert(term, keys);
            }
            index
        }
    }

    /// Reads `(term, gene)` rows into a [`SignatureCollection`]
    ///
    /// The table has no header row; rows aggregate by term in first-seen
    /// order.
    pub fn read<P: AsRef<Path>>(
        path: P,
        delimiter: u8,
        name: &str,
    ) -> GenrichResult<SignatureCollection> {
        let file = std::fs::File::open(path)?;
        parse(file, delimiter, name)
    }

    /// Reads the table from any reader
    pub fn parse<R: Read>(reader: R, delimiter: u8, name: &str) -> GenrichResult<SignatureCollection> {
        let mut reader = csv::ReaderBuilder::new()
            .delimiter(delimiter)
            .has_headers(false)
            .flexible(true)
            .from_reader(reader);

        let mut terms: Vec<(String, Vec<String>)> = Vec::new();
        let mut index_of: HashMap<String, usize> = HashMap::new();
        for record in reader.records() {
            let record = record?;
            let (Some(term), Some(gene)) = (record.get(0), record.get(1)) else {
                debug!("skipping short signature row");
                continue;
            };
            let term = term.trim();
            let gene = gene.trim().to_string();
            match index_of.get(term) {
                Some(&idx) => terms[idx].1.push(gene),
                None => {
                    index_of.insert(term.to_string(), terms.len());
                    terms.push((term.to_string(), vec![gene]));
                }
            }
        }
        Ok(SignatureCollection {
            name: name.to_string(),
            terms,
        })
    }

}
