use std::fs::File;
use std::io::{BufRead, BufReader};
use std::path::{Path, PathBuf};
use clap::ValueEnum;
use compact_str::CompactString;
use csv::{ReaderBuilder, StringRecord};
use flate2::read::MultiGzDecoder;
use serde::{Deserialize, Serialize};
use strum_macros::{Display, EnumIter};
use crate::error::{EnrichmentError, Result};

pub type TermID = CompactString;

pub const SEQUENCE_ID_COLUMN: &str = "qseqid";
pub const NO_TERMS: &str = "-";
pub const TERM_SEPARATOR: char = '|';

const BUFFER_SIZE: usize = 128 * 1024;

#[derive(
    Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord,
    ValueEnum, EnumIter, Display, Serialize, Deserialize,
)]
#[strum(serialize_all = "snake_case")]
#[serde(rename_all = "kebab-case")]
pub enum TermCategory {
    GoTerms,
    MetacycPathways,
    KeggKos,
    KeggPathways,
}

impl TermCategory {
    /// Annotation columns whose term lists are unioned for this category.
    pub fn columns(&self) -> &'static [&'static str] {
        match self {
            TermCategory::GoTerms => &["interpro_goterms", "panther_goterms", "eggnog_goterms"],
            TermCategory::MetacycPathways => &["metacyc_pathways"],
            TermCategory::KeggKos => &["kegg_kos"],
            TermCategory::KeggPathways => &["kegg_pathways"],
        }
    }

    pub fn term_column(&self) -> &'static str {
        match self {
            TermCategory::GoTerms => "go_term",
            TermCategory::MetacycPathways => "metacyc_pathway",
            TermCategory::KeggKos => "kegg_ko",
            TermCategory::KeggPathways => "kegg_pathway",
        }
    }

    pub fn has_metadata(&self) -> bool {
        matches!(self, TermCategory::GoTerms)
    }
}

/// One row of an annotation table: the row identifier (a sequence or a
/// cluster) and the raw values of the requested term columns, in the order
/// the columns were requested.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AnnotationRecord {
    pub id: String,
    pub fields: Vec<String>,
}

impl AnnotationRecord {
    pub fn terms(&self) -> impl Iterator<Item = &str> {
        self.fields.iter().flat_map(|field| split_terms(field))
    }
}

/// Splits a `|`-delimited term list. Empty values and the `-` placeholder
/// yield nothing.
pub fn split_terms(value: &str) -> impl Iterator<Item = &str> {
    let value = value.trim();
    let value = if value == NO_TERMS { "" } else { value };
    value
        .split(TERM_SEPARATOR)
        .map(str::trim)
        .filter(|term| !term.is_empty() && *term != NO_TERMS)
}

pub fn is_gzipped(path: impl AsRef<Path>) -> bool {
    path.as_ref()
        .extension()
        .map(|ext| ext == "gz")
        .unwrap_or(false)
}

pub fn open_text_file(path: impl AsRef<Path>) -> Result<Box<dyn BufRead>> {
    let path = path.as_ref();
    let file = File::open(path).map_err(|source| EnrichmentError::Io {
        path: path.to_path_buf(),
        source,
    })?;

    let reader: Box<dyn BufRead> = if is_gzipped(path) {
        Box::new(BufReader::with_capacity(BUFFER_SIZE, MultiGzDecoder::new(file)))
    } else {
        Box::new(BufReader::with_capacity(BUFFER_SIZE, file))
    };
    Ok(reader)
}

/// Picks `\t` or `;` from the first buffered line, defaulting to `;`.
fn sniff_delimiter(reader: &mut dyn BufRead, path: &Path) -> Result<u8> {
    let buffer = reader.fill_buf().map_err(|source| EnrichmentError::Io {
        path: path.to_path_buf(),
        source,
    })?;
    let first_line = buffer
        .split(|&byte| byte == b'\n')
        .next()
        .unwrap_or(&[]);

    let tabs = first_line.iter().filter(|&&byte| byte == b'\t').count();
    let semicolons = first_line.iter().filter(|&&byte| byte == b';').count();

    Ok(if tabs > semicolons { b'\t' } else { b';' })
}

pub struct AnnotationReader {
    path: PathBuf,
    reader: csv::Reader<Box<dyn BufRead>>,
    id_index: usize,
    term_indices: Vec<usize>,
    n_columns: usize,
    record: StringRecord,
    record_number: u64,
}

impl AnnotationReader {
    pub fn open(
        path: impl AsRef<Path>,
        id_column: &str,
        term_columns: &[&str],
    ) -> Result<Self> {
        let path = path.as_ref().to_path_buf();
        let mut input = open_text_file(&path)?;
        let delimiter = sniff_delimiter(input.as_mut(), &path)?;

        let mut reader = ReaderBuilder::new()
            .delimiter(delimiter)
            .has_headers(true)
            .flexible(true)
            .from_reader(input);

        let headers = reader
            .headers()
            .map_err(|source| EnrichmentError::Csv {
                path: path.clone(),
                source,
            })?
            .clone();

        let column_index = |column: &str| {
            headers
                .iter()
                .position(|header| header.trim() == column)
                .ok_or_else(|| EnrichmentError::MissingColumn {
                    path: path.clone(),
                    column: column.to_string(),
                })
        };

        let id_index = column_index(id_column)?;
        let term_indices = term_columns
            .iter()
            .map(|column| column_index(column))
            .collect::<Result<Vec<usize>>>()?;

        Ok(Self {
            n_columns: headers.len(),
            path,
            reader,
            id_index,
            term_indices,
            record: StringRecord::new(),
            record_number: 0,
        })
    }

    fn next_record(&mut self) -> Result<Option<AnnotationRecord>> {
        let found = self
            .reader
            .read_record(&mut self.record)
            .map_err(|source| EnrichmentError::Csv {
                path: self.path.clone(),
                source,
            })?;

        if !found {
            return Ok(None);
        }
        self.record_number += 1;

        if self.record.len() != self.n_columns {
            return Err(EnrichmentError::MalformedRecord {
                path: self.path.clone(),
                record: self.record_number,
                field: self.record.len().min(self.n_columns),
                expected: self.n_columns,
            });
        }

        let fields = self
            .term_indices
            .iter()
            .map(|&index| self.record[index].to_string())
            .collect();

        Ok(Some(AnnotationRecord {
            id: self.record[self.id_index].trim().to_string(),
            fields,
        }))
    }
}

impl Iterator for AnnotationReader {
    type Item = Result<AnnotationRecord>;

    fn next(&mut self) -> Option<Self::Item> {
        self.next_record().transpose()
    }
}

pub fn read_annotation_file(
    path: impl AsRef<Path>,
    id_column: &str,
    category: TermCategory,
) -> Result<AnnotationReader> {
    AnnotationReader::open(path, id_column, category.columns())
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;
    use flate2::write::GzEncoder;
    use flate2::Compression;
    use tempfile::TempDir;

    fn write_file(dir: &Path, name: &str, content: &str) -> PathBuf {
        let path = dir.join(name);
        let mut file = File::create(&path).unwrap();
        file.write_all(content.as_bytes()).unwrap();
        path
    }

    #[test]
    fn split_terms_skips_placeholders() {
        assert_eq!(split_terms("-").count(), 0);
        assert_eq!(split_terms("").count(), 0);
        assert_eq!(split_terms("  ").count(), 0);
        let terms: Vec<&str> = split_terms("GO:0001| GO:0002||-").collect();
        assert_eq!(terms, vec!["GO:0001", "GO:0002"]);
    }

    #[test]
    fn reads_semicolon_and_tab_tables() {
        let dir = TempDir::new().unwrap();
        let semicolon = write_file(
            dir.path(),
            "a.csv",
            "qseqid;kegg_kos;other\nS1;K00001|K00002;x\nS2;-;y\n",
        );
        let tab = write_file(
            dir.path(),
            "b.tsv",
            "qseqid\tkegg_kos\tother\nS1\tK00001|K00002\tx\nS2\t-\ty\n",
        );

        for path in [semicolon, tab] {
            let records: Vec<AnnotationRecord> =
                read_annotation_file(&path, SEQUENCE_ID_COLUMN, TermCategory::KeggKos)
                    .unwrap()
                    .collect::<Result<_>>()
                    .unwrap();
            assert_eq!(records.len(), 2);
            assert_eq!(records[0].id, "S1");
            assert_eq!(records[0].terms().collect::<Vec<_>>(), vec!["K00001", "K00002"]);
            assert_eq!(records[1].terms().count(), 0);
        }
    }

    #[test]
    fn reads_gzipped_tables() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("annotations.csv.gz");
        let mut encoder = GzEncoder::new(File::create(&path).unwrap(), Compression::default());
        encoder
            .write_all(b"qseqid;kegg_pathways\nS1;map00010\n")
            .unwrap();
        encoder.finish().unwrap();

        let records: Vec<AnnotationRecord> =
            read_annotation_file(&path, SEQUENCE_ID_COLUMN, TermCategory::KeggPathways)
                .unwrap()
                .collect::<Result<_>>()
                .unwrap();
        assert_eq!(records[0].fields, vec!["map00010".to_string()]);
    }

    #[test]
    fn missing_column_is_reported() {
        let dir = TempDir::new().unwrap();
        let path = write_file(dir.path(), "a.csv", "qseqid;kegg_kos\nS1;K1\n");
        let err = read_annotation_file(&path, SEQUENCE_ID_COLUMN, TermCategory::GoTerms)
            .err()
            .unwrap();
        match err {
            EnrichmentError::MissingColumn { column, .. } => assert_eq!(column, "interpro_goterms"),
            other => panic!("unexpected error: {other}"),
        }
    }

    #[test]
    fn short_record_reports_position() {
        let dir = TempDir::new().unwrap();
        let path = write_file(
            dir.path(),
            "a.csv",
            "qseqid;kegg_kos;other\nS1;K1;x\nS2;K2\n",
        );
        let results: Vec<Result<AnnotationRecord>> =
            read_annotation_file(&path, SEQUENCE_ID_COLUMN, TermCategory::KeggKos)
                .unwrap()
                .collect();
        assert!(results[0].is_ok());
        match results[1].as_ref().err().unwrap() {
            EnrichmentError::MalformedRecord { path: err_path, record, field, expected } => {
                assert_eq!(err_path, &path);
                assert_eq!(*record, 2);
                assert_eq!(*field, 2);
                assert_eq!(*expected, 3);
            }
            other => panic!("unexpected error: {other}"),
        }
    }

    #[test]
    fn missing_file_names_the_path() {
        let err = read_annotation_file("/nonexistent/annotations.csv", SEQUENCE_ID_COLUMN, TermCategory::KeggKos)
            .err()
            .unwrap();
        assert!(err.to_string().contains("/nonexistent/annotations.csv"));
    }
}
