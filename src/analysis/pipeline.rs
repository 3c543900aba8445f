use std::path::PathBuf;
use log::{info, warn};
use rustc_hash::FxHashMap;
use crate::analysis::aggregation::{aggregate, Population};
use crate::analysis::enrichment_analysis::calculate_enrichment;
use crate::analysis::multiple_testing_correction::adjust_p_values;
use crate::analysis::reference_population::build_reference;
use crate::analysis::write_results::{write_report, ReportHeader};
use crate::config::EnrichmentConfig;
use crate::error::Result;
use crate::parsers::annotation_parser::{read_annotation_file, TermCategory};
use crate::parsers::reference_store::ReferenceStore;

/// Summary of one written report.
#[derive(Debug, Clone, PartialEq)]
pub struct CategoryReport {
    pub category: TermCategory,
    pub output_path: PathBuf,
    pub study_total: usize,
    pub reference_total: usize,
    pub terms_tested: usize,
    pub rows_written: usize,
}

pub fn aggregate_study(config: &EnrichmentConfig, category: TermCategory) -> Result<Population> {
    info!(
        "Reading {} annotations from: {}",
        category,
        config.annotation_file.display()
    );
    let records = read_annotation_file(&config.annotation_file, &config.id_column, category)?;
    let population = aggregate(records, config.grouping)?;
    info!(
        "Study population: {} sequences with {}, {} distinct terms",
        population.total(),
        category,
        population.len()
    );
    Ok(population)
}

/// Runs the whole enrichment analysis for one term category and writes its
/// report.
pub fn run_category(
    config: &EnrichmentConfig,
    store: &dyn ReferenceStore,
    category: TermCategory,
) -> Result<CategoryReport> {
    let study = aggregate_study(config, category)?;
    let reference = build_reference(store, &config.species_selector(), category)?;

    let mut table = calculate_enrichment(&study, &reference);
    adjust_p_values(&mut table, config.correction_method);

    let metadata = if category.has_metadata() {
        let metadata = store.get_term_metadata(&table.term_ids())?;
        if metadata.is_empty() && !table.is_empty() {
            warn!("No term descriptions available for {}", category);
        }
        metadata
    } else {
        FxHashMap::default()
    };

    let output_path = config.report_path(category);
    let rows_written = write_report(
        &table,
        &config.report_filter(),
        &output_path,
        &ReportHeader::for_category(category),
        &metadata,
    )?;

    Ok(CategoryReport {
        category,
        output_path,
        study_total: study.total(),
        reference_total: reference.total(),
        terms_tested: table.len(),
        rows_written,
    })
}

/// Runs every configured category in turn, stopping at the first failure.
pub fn run_all(config: &EnrichmentConfig, store: &dyn ReferenceStore) -> Result<Vec<CategoryReport>> {
    config
        .categories
        .iter()
        .map(|&category| run_category(config, store, category))
        .collect()
}
