use std::collections::BTreeMap;
use std::fmt;
use std::fs::read_dir;
use std::iter;
use std::path::{Path, PathBuf};
use std::str::FromStr;
use log::{debug, info, warn};
use rustc_hash::FxHashMap;
use crate::error::{EnrichmentError, Result};
use crate::parsers::annotation_parser::*;
use crate::parsers::obo_parser::{format_namespace, obsolete_terms, parse_obo_file, OboMap};

pub const ALL_SPECIES: &str = "all species";
pub const CLUSTER_ID_COLUMN: &str = "cluster_id";

const TABLE_EXTENSIONS: [&str; 3] = ["tsv", "csv", "txt"];

/// One cluster of the reference population with the raw term columns of the
/// requested category.
pub type ClusterTerms = AnnotationRecord;

pub type ClusterIter<'a> = Box<dyn Iterator<Item = Result<ClusterTerms>> + 'a>;

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SpeciesSelector {
    Species(String),
    AllSpecies,
}

impl FromStr for SpeciesSelector {
    type Err = std::convert::Infallible;

    fn from_str(s: &str) -> std::result::Result<Self, Self::Err> {
        let trimmed = s.trim();
        match trimmed.to_lowercase().as_str() {
            "all" | "all species" | "all_species" => Ok(SpeciesSelector::AllSpecies),
            _ => Ok(SpeciesSelector::Species(trimmed.to_string())),
        }
    }
}

impl fmt::Display for SpeciesSelector {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            SpeciesSelector::Species(name) => write!(f, "{}", name),
            SpeciesSelector::AllSpecies => write!(f, "{}", ALL_SPECIES),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct TermMetadata {
    pub name: String,
    pub namespace: String,
}

/// Read-only access to the reference population and to term descriptions.
pub trait ReferenceStore {
    /// Clusters of one species, or of every species for
    /// [`SpeciesSelector::AllSpecies`], each carrying the term columns of
    /// `category`.
    fn get_terms_per_cluster(
        &self,
        selector: &SpeciesSelector,
        category: TermCategory,
    ) -> Result<ClusterIter<'_>>;

    /// Descriptions for the requested terms. Unknown terms are left out.
    fn get_term_metadata(&self, term_ids: &[TermID]) -> Result<FxHashMap<TermID, TermMetadata>>;
}

/// A directory of per-species cluster tables (`<species>.tsv`, `.csv` or
/// `.txt`, optionally gzipped), plus an optional GO ontology for metadata.
pub struct DirectoryStore {
    dir: PathBuf,
    id_column: String,
    ontology: Option<OboMap>,
}

impl DirectoryStore {
    pub fn new(dir: impl AsRef<Path>) -> Self {
        Self {
            dir: dir.as_ref().to_path_buf(),
            id_column: CLUSTER_ID_COLUMN.to_string(),
            ontology: None,
        }
    }

    pub fn with_id_column(mut self, id_column: &str) -> Self {
        self.id_column = id_column.to_string();
        self
    }

    pub fn with_ontology(mut self, obo_file: impl AsRef<Path>) -> Result<Self> {
        let obo_file = obo_file.as_ref();
        info!("Reading ontology information from: {}", obo_file.display());
        let ontology = parse_obo_file(obo_file)?;
        info!("Successfully parsed OBO file with {} GO terms", ontology.len());
        self.ontology = Some(ontology);
        Ok(self)
    }

    /// Every cluster table in the directory as `(species, path)`, sorted by
    /// species name. A species with several tables contributes only the one
    /// [`DirectoryStore::table_for`] would pick.
    pub fn species_tables(&self) -> Result<Vec<(String, PathBuf)>> {
        let io_error = |source| EnrichmentError::Io {
            path: self.dir.clone(),
            source,
        };

        let mut tables: BTreeMap<String, (usize, PathBuf)> = BTreeMap::new();
        for entry in read_dir(&self.dir).map_err(io_error)? {
            let path = entry.map_err(io_error)?.path();
            if !path.is_file() {
                continue;
            }
            let Some((species, precedence)) = table_name(&path) else {
                continue;
            };
            match tables.get(&species) {
                Some((kept, _)) if *kept <= precedence => (),
                _ => {
                    tables.insert(species, (precedence, path));
                }
            }
        }

        Ok(tables
            .into_iter()
            .map(|(species, (_, path))| (species, path))
            .collect())
    }

    fn table_for(&self, species: &str) -> Result<PathBuf> {
        let file_stem = species.trim().replace(' ', "_");
        TABLE_EXTENSIONS
            .iter()
            .flat_map(|ext| {
                [
                    self.dir.join(format!("{}.{}", file_stem, ext)),
                    self.dir.join(format!("{}.{}.gz", file_stem, ext)),
                ]
            })
            .find(|path| path.is_file())
            .ok_or_else(|| EnrichmentError::UnknownSpecies {
                species: species.to_string(),
                dir: self.dir.clone(),
            })
    }
}

/// Species name of a cluster table and its precedence among tables of the
/// same species: extension order first, plain before gzipped.
fn table_name(path: &Path) -> Option<(String, usize)> {
    let file_name = path.file_name()?.to_str()?;
    let (file_name, gzipped) = match file_name.strip_suffix(".gz") {
        Some(stripped) => (stripped, true),
        None => (file_name, false),
    };
    let (stem, ext) = file_name.rsplit_once('.')?;
    let rank = TABLE_EXTENSIONS.iter().position(|known| *known == ext)?;
    Some((stem.to_string(), rank * 2 + usize::from(gzipped)))
}

impl ReferenceStore for DirectoryStore {
    fn get_terms_per_cluster(
        &self,
        selector: &SpeciesSelector,
        category: TermCategory,
    ) -> Result<ClusterIter<'_>> {
        match selector {
            SpeciesSelector::Species(species) => {
                let path = self.table_for(species)?;
                debug!("Reading {} clusters from {}", species, path.display());
                let reader = AnnotationReader::open(&path, &self.id_column, category.columns())?;
                Ok(Box::new(reader))
            }
            SpeciesSelector::AllSpecies => {
                let tables = self.species_tables()?;
                debug!("Reading clusters of {} species from {}", tables.len(), self.dir.display());
                let id_column = self.id_column.clone();

                // Cluster ids are only unique within a species table.
                let clusters = tables.into_iter().flat_map(move |(species, path)| {
                    let records: ClusterIter<'static> =
                        match AnnotationReader::open(&path, &id_column, category.columns()) {
                            Ok(reader) => Box::new(reader.map(move |record| {
                                record.map(|mut cluster| {
                                    cluster.id = format!("{}:{}", species, cluster.id);
                                    cluster
                                })
                            })),
                            Err(e) => Box::new(iter::once(Err(e))),
                        };
                    records
                });
                Ok(Box::new(clusters))
            }
        }
    }

    fn get_term_metadata(&self, term_ids: &[TermID]) -> Result<FxHashMap<TermID, TermMetadata>> {
        let Some(ontology) = &self.ontology else {
            return Ok(FxHashMap::default());
        };

        let obsolete = obsolete_terms(ontology, term_ids);
        if !obsolete.is_empty() {
            warn!(
                "{} reported GO terms are obsolete in the ontology, e.g. {}",
                obsolete.len(),
                obsolete[0]
            );
        }

        Ok(term_ids
            .iter()
            .filter_map(|term_id| {
                ontology.get(term_id).map(|term| {
                    (
                        term_id.clone(),
                        TermMetadata {
                            name: term.name.clone(),
                            namespace: format_namespace(term.namespace).to_string(),
                        },
                    )
                })
            })
            .collect())
    }
}

/// Reference population held in memory, keyed by species.
#[derive(Debug, Default, Clone)]
pub struct InMemoryStore {
    clusters: Vec<(String, TermCategory, ClusterTerms)>,
    metadata: FxHashMap<TermID, TermMetadata>,
}

impl InMemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Registers the `|`-delimited `terms` of one cluster for `category`.
    pub fn add_cluster(
        &mut self,
        species: &str,
        cluster_id: &str,
        category: TermCategory,
        terms: &str,
    ) -> &mut Self {
        self.clusters.push((
            species.to_string(),
            category,
            ClusterTerms {
                id: cluster_id.to_string(),
                fields: vec![terms.to_string()],
            },
        ));
        self
    }

    pub fn add_metadata(&mut self, term_id: &str, name: &str, namespace: &str) -> &mut Self {
        self.metadata.insert(
            TermID::new(term_id),
            TermMetadata {
                name: name.to_string(),
                namespace: namespace.to_string(),
            },
        );
        self
    }
}

impl ReferenceStore for InMemoryStore {
    fn get_terms_per_cluster(
        &self,
        selector: &SpeciesSelector,
        category: TermCategory,
    ) -> Result<ClusterIter<'_>> {
        let selector = selector.clone();
        let clusters = self
            .clusters
            .iter()
            .filter(move |(species, cluster_category, _)| {
                *cluster_category == category
                    && match &selector {
                        SpeciesSelector::AllSpecies => true,
                        SpeciesSelector::Species(name) => name == species,
                    }
            })
            .map(|(species, _, cluster)| {
                Ok(ClusterTerms {
                    id: format!("{}:{}", species, cluster.id),
                    fields: cluster.fields.clone(),
                })
            });
        Ok(Box::new(clusters))
    }

    fn get_term_metadata(&self, term_ids: &[TermID]) -> Result<FxHashMap<TermID, TermMetadata>> {
        Ok(term_ids
            .iter()
            .filter_map(|term_id| {
                self.metadata
                    .get(term_id)
                    .map(|metadata| (term_id.clone(), metadata.clone()))
            })
            .collect())
    }
}
