use std::cmp::Ordering;
use std::fmt::Write as FmtWrite;
use std::fs::{self, File};
use std::io::{self, BufWriter, Write};
use std::path::{Path, PathBuf};
use flate2::write::GzEncoder;
use flate2::Compression;
use log::info;
use rustc_hash::FxHashMap;
use serde::{Deserialize, Serialize};
use crate::analysis::enrichment_analysis::{EnrichmentResult, EnrichmentTable, Stat, NOT_APPLICABLE};
use crate::error::{EnrichmentError, Result};
use crate::parsers::annotation_parser::{is_gzipped, TermCategory, TermID};
use crate::parsers::reference_store::TermMetadata;

pub const DEFAULT_MIN_SEQNUM_ANNOTATIONS: usize = 1;
pub const DEFAULT_MIN_SEQNUM_SPECIES: usize = 1;
pub const REPORT_DELIMITER: char = ';';

const BUFFER_SIZE: usize = 8192 * 32;

const COUNT_COLUMNS: [&str; 7] = [
    "annotation_seqs_count",
    "annotation_total",
    "species_seqs_count",
    "species_total",
    "enrichment",
    "pvalue",
    "fdr",
];

/// Minimum study and reference counts a term needs to be reported.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct ReportFilter {
    pub min_seqnum_annotations: usize,
    pub min_seqnum_species: usize,
}

impl Default for ReportFilter {
    fn default() -> Self {
        Self {
            min_seqnum_annotations: DEFAULT_MIN_SEQNUM_ANNOTATIONS,
            min_seqnum_species: DEFAULT_MIN_SEQNUM_SPECIES,
        }
    }
}

impl ReportFilter {
    pub fn passes(&self, result: &EnrichmentResult) -> bool {
        result.annotation_seqs_count >= self.min_seqnum_annotations
            && result.species_seqs_count >= self.min_seqnum_species
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ReportHeader {
    pub term_column: &'static str,
    pub with_metadata: bool,
}

impl ReportHeader {
    pub fn for_category(category: TermCategory) -> Self {
        Self {
            term_column: category.term_column(),
            with_metadata: category.has_metadata(),
        }
    }

    pub fn columns(&self) -> Vec<&'static str> {
        let mut columns = vec![self.term_column];
        if self.with_metadata {
            columns.extend(["description", "namespace"]);
        }
        columns.extend(COUNT_COLUMNS);
        columns
    }
}

fn compare_fdr(a: &Stat, b: &Stat) -> Ordering {
    match (a, b) {
        (Stat::Value(a), Stat::Value(b)) => a.total_cmp(b),
        (Stat::Value(_), Stat::NotApplicable) => Ordering::Less,
        (Stat::NotApplicable, Stat::Value(_)) => Ordering::Greater,
        (Stat::NotApplicable, Stat::NotApplicable) => Ordering::Equal,
    }
}

/// Results ordered by ascending FDR. Terms without an FDR follow, in table
/// order.
pub fn rank_results(table: &EnrichmentTable) -> Vec<&EnrichmentResult> {
    let mut ranked: Vec<&EnrichmentResult> = table.iter().collect();
    ranked.sort_by(|a, b| compare_fdr(&a.fdr, &b.fdr));
    ranked
}

#[inline]
fn push_text(line_buffer: &mut String, text: &str) {
    line_buffer.push('"');
    for ch in text.chars() {
        if ch == '"' {
            line_buffer.push('"');
        }
        line_buffer.push(ch);
    }
    line_buffer.push('"');
}

#[inline]
fn push_stat(line_buffer: &mut String, stat: &Stat) -> std::fmt::Result {
    match stat {
        Stat::Value(value) => write!(line_buffer, "{:?}", value),
        Stat::NotApplicable => {
            push_text(line_buffer, NOT_APPLICABLE);
            Ok(())
        }
    }
}

fn format_row(
    line_buffer: &mut String,
    result: &EnrichmentResult,
    header: &ReportHeader,
    metadata: &FxHashMap<TermID, TermMetadata>,
) -> std::fmt::Result {
    line_buffer.clear();
    push_text(line_buffer, &result.term);

    if header.with_metadata {
        let (name, namespace) = metadata
            .get(&result.term)
            .map(|term| (term.name.as_str(), term.namespace.as_str()))
            .unwrap_or(("", ""));
        line_buffer.push(REPORT_DELIMITER);
        push_text(line_buffer, name);
        line_buffer.push(REPORT_DELIMITER);
        push_text(line_buffer, namespace);
    }

    write!(
        line_buffer,
        "{d}{}{d}{}{d}{}{d}{}{d}",
        result.annotation_seqs_count,
        result.annotation_total,
        result.species_seqs_count,
        result.species_total,
        d = REPORT_DELIMITER
    )?;
    push_stat(line_buffer, &result.enrichment)?;
    line_buffer.push(REPORT_DELIMITER);
    push_stat(line_buffer, &result.p_value)?;
    line_buffer.push(REPORT_DELIMITER);
    push_stat(line_buffer, &result.fdr)?;
    line_buffer.push('\n');
    Ok(())
}

enum ReportSink {
    Plain(BufWriter<File>),
    Gzip(GzEncoder<BufWriter<File>>),
}

impl ReportSink {
    fn create(path: &Path, compress: bool) -> io::Result<Self> {
        let writer = BufWriter::with_capacity(BUFFER_SIZE, File::create(path)?);
        Ok(if compress {
            ReportSink::Gzip(GzEncoder::new(writer, Compression::default()))
        } else {
            ReportSink::Plain(writer)
        })
    }

    fn finish(self) -> io::Result<()> {
        match self {
            ReportSink::Plain(mut writer) => writer.flush(),
            ReportSink::Gzip(encoder) => encoder.finish()?.flush(),
        }
    }
}

impl Write for ReportSink {
    fn write(&mut self, buf: &[u8]) -> io::Result<usize> {
        match self {
            ReportSink::Plain(writer) => writer.write(buf),
            ReportSink::Gzip(encoder) => encoder.write(buf),
        }
    }

    fn flush(&mut self) -> io::Result<()> {
        match self {
            ReportSink::Plain(writer) => writer.flush(),
            ReportSink::Gzip(encoder) => encoder.flush(),
        }
    }
}

fn partial_path(output_path: &Path) -> PathBuf {
    let file_name = output_path
        .file_name()
        .map(|name| name.to_string_lossy().into_owned())
        .unwrap_or_default();
    output_path.with_file_name(format!(".{}.partial", file_name))
}

fn write_rows(
    path: &Path,
    compress: bool,
    rows: &[&EnrichmentResult],
    header: &ReportHeader,
    metadata: &FxHashMap<TermID, TermMetadata>,
) -> io::Result<()> {
    let mut writer = ReportSink::create(path, compress)?;
    let mut line_buffer = String::with_capacity(256);

    for (index, column) in header.columns().iter().enumerate() {
        if index > 0 {
            line_buffer.push(REPORT_DELIMITER);
        }
        push_text(&mut line_buffer, column);
    }
    line_buffer.push('\n');
    writer.write_all(line_buffer.as_bytes())?;

    for result in rows {
        format_row(&mut line_buffer, result, header, metadata)
            .map_err(|e| io::Error::new(io::ErrorKind::Other, e))?;
        writer.write_all(line_buffer.as_bytes())?;
    }

    writer.finish()
}

/// Writes the filtered, FDR-ranked report to `output_path` and returns the
/// number of rows written. The report is gzip-compressed when the path ends
/// in `.gz`. Nothing is left at `output_path` if writing fails.
pub fn write_report(
    table: &EnrichmentTable,
    filter: &ReportFilter,
    output_path: impl AsRef<Path>,
    header: &ReportHeader,
    metadata: &FxHashMap<TermID, TermMetadata>,
) -> Result<usize> {
    let output_path = output_path.as_ref();
    let rows: Vec<&EnrichmentResult> = rank_results(table)
        .into_iter()
        .filter(|result| filter.passes(result))
        .collect();

    let partial = partial_path(output_path);
    let written = write_rows(&partial, is_gzipped(output_path), &rows, header, metadata)
        .and_then(|_| fs::rename(&partial, output_path));

    if let Err(source) = written {
        let _ = fs::remove_file(&partial);
        return Err(EnrichmentError::Output {
            path: output_path.to_path_buf(),
            source,
        });
    }

    info!(
        "Wrote {} of {} terms to: {}",
        rows.len(),
        table.len(),
        output_path.display()
    );
    Ok(rows.len())
}
