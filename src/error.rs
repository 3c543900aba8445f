use std::path::PathBuf;
use thiserror::Error;

/// Every way an enrichment run can fail. None of these are retried: the run
/// stops and no report is left behind.
#[derive(Error, Debug)]
pub enum EnrichmentError {
    #[error("Failed to read '{}': {source}", .path.display())]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("Column '{column}' not found in header of '{}'", .path.display())]
    MissingColumn { path: PathBuf, column: String },

    #[error("Malformed record {record} in '{}': expected {expected} fields, found a mismatch at field {field}", .path.display())]
    MalformedRecord {
        path: PathBuf,
        record: u64,
        field: usize,
        expected: usize,
    },

    #[error("Failed to parse '{}': {source}", .path.display())]
    Csv {
        path: PathBuf,
        #[source]
        source: csv::Error,
    },

    #[error("No cluster table found for species '{species}' in '{}'", .dir.display())]
    UnknownSpecies { species: String, dir: PathBuf },

    #[error("Invalid ontology file '{}' at line {line}: {reason}", .path.display())]
    Ontology {
        path: PathBuf,
        line: usize,
        reason: String,
    },

    #[error("Failed to write report '{}': {source}", .path.display())]
    Output {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("Invalid configuration '{}': {reason}", .path.display())]
    Config { path: PathBuf, reason: String },
}

pub type Result<T> = std::result::Result<T, EnrichmentError>;
