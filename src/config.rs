use std::fs;
use std::path::{Path, PathBuf};
use serde::{Deserialize, Serialize};
use strum::IntoEnumIterator;
use crate::analysis::aggregation::Grouping;
use crate::analysis::multiple_testing_correction::AdjustmentMethod;
use crate::analysis::write_results::{
    ReportFilter, DEFAULT_MIN_SEQNUM_ANNOTATIONS, DEFAULT_MIN_SEQNUM_SPECIES,
};
use crate::error::{EnrichmentError, Result};
use crate::parsers::annotation_parser::{TermCategory, SEQUENCE_ID_COLUMN};
use crate::parsers::reference_store::{SpeciesSelector, ALL_SPECIES};

pub const DEFAULT_OUTPUT_PREFIX: &str = "enrichment";

/// Settings of one enrichment run. Every field has a default so a JSON
/// configuration file only needs the values it changes.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct EnrichmentConfig {
    pub annotation_file: PathBuf,
    pub output_dir: PathBuf,
    pub output_prefix: String,
    pub compress: bool,
    pub categories: Vec<TermCategory>,
    pub species: String,
    pub id_column: String,
    pub grouping: Grouping,
    pub correction_method: AdjustmentMethod,
    pub min_seqnum_annotations: usize,
    pub min_seqnum_species: usize,
}

impl Default for EnrichmentConfig {
    fn default() -> Self {
        Self {
            annotation_file: PathBuf::new(),
            output_dir: PathBuf::from("."),
            output_prefix: DEFAULT_OUTPUT_PREFIX.to_string(),
            compress: false,
            categories: TermCategory::iter().collect(),
            species: ALL_SPECIES.to_string(),
            id_column: SEQUENCE_ID_COLUMN.to_string(),
            grouping: Grouping::default(),
            correction_method: AdjustmentMethod::default(),
            min_seqnum_annotations: DEFAULT_MIN_SEQNUM_ANNOTATIONS,
            min_seqnum_species: DEFAULT_MIN_SEQNUM_SPECIES,
        }
    }
}

impl EnrichmentConfig {
    pub fn from_json_file(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref();
        let content = fs::read_to_string(path).map_err(|source| EnrichmentError::Io {
            path: path.to_path_buf(),
            source,
        })?;
        serde_json::from_str(&content).map_err(|e| EnrichmentError::Config {
            path: path.to_path_buf(),
            reason: e.to_string(),
        })
    }

    pub fn species_selector(&self) -> SpeciesSelector {
        match self.species.parse() {
            Ok(selector) => selector,
            Err(never) => match never {},
        }
    }

    pub fn report_filter(&self) -> ReportFilter {
        ReportFilter {
            min_seqnum_annotations: self.min_seqnum_annotations,
            min_seqnum_species: self.min_seqnum_species,
        }
    }

    /// `<output_dir>/<prefix>_<category>_enrichment.csv[.gz]`
    pub fn report_path(&self, category: TermCategory) -> PathBuf {
        let extension = if self.compress { "csv.gz" } else { "csv" };
        self.output_dir.join(format!(
            "{}_{}_enrichment.{}",
            self.output_prefix, category, extension
        ))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    #[test]
    fn defaults_are_explicit() {
        let config = EnrichmentConfig::default();
        assert_eq!(config.report_filter(), ReportFilter::default());
        assert_eq!(config.correction_method, AdjustmentMethod::BenjaminiHochberg);
        assert_eq!(config.species_selector(), SpeciesSelector::AllSpecies);
        assert_eq!(config.categories.len(), 4);
    }

    #[test]
    fn json_file_overrides_selected_fields() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("config.json");
        fs::write(
            &path,
            r#"{"species": "Quercus robur", "correction_method": "benjamini-yekutieli",
                "min_seqnum_species": 3, "categories": ["kegg-kos"], "compress": true}"#,
        )
        .unwrap();

        let config = EnrichmentConfig::from_json_file(&path).unwrap();
        assert_eq!(config.species_selector(), SpeciesSelector::Species("Quercus robur".to_string()));
        assert_eq!(config.correction_method, AdjustmentMethod::BenjaminiYekutieli);
        assert_eq!(config.min_seqnum_species, 3);
        assert_eq!(config.min_seqnum_annotations, DEFAULT_MIN_SEQNUM_ANNOTATIONS);
        assert_eq!(config.categories, vec![TermCategory::KeggKos]);
        assert_eq!(
            config.report_path(TermCategory::KeggKos),
            PathBuf::from("./enrichment_kegg_kos_enrichment.csv.gz")
        );
    }

    #[test]
    fn unknown_keys_are_rejected() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("config.json");
        fs::write(&path, r#"{"min_seqnum": 2}"#).unwrap();
        assert!(matches!(
            EnrichmentConfig::from_json_file(&path),
            Err(EnrichmentError::Config { .. })
        ));
    }
}
