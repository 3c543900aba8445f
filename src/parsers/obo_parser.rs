use std::io::BufRead;
use std::path::Path;
use compact_str::CompactString;
use lazy_static::lazy_static;
use regex::Regex;
use rustc_hash::FxHashMap;
use ucfirst::ucfirst;
use crate::error::{EnrichmentError, Result};
use crate::parsers::annotation_parser::{open_text_file, TermID};

pub type OboMap = FxHashMap<TermID, OboTerm>;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum NameSpace {
    BiologicalProcess,
    MolecularFunction,
    CellularComponent,
}

impl NameSpace {
    pub fn as_str(&self) -> &'static str {
        match self {
            NameSpace::BiologicalProcess => "biological_process",
            NameSpace::MolecularFunction => "molecular_function",
            NameSpace::CellularComponent => "cellular_component",
        }
    }
}

#[derive(Debug, Clone)]
pub struct OboTerm {
    pub name: String,
    pub namespace: NameSpace,
    pub is_obsolete: bool,
    pub alt_ids: Vec<TermID>,
}

impl OboTerm {
    fn new() -> Self {
        OboTerm {
            name: String::with_capacity(90),
            namespace: NameSpace::BiologicalProcess,
            is_obsolete: false,
            alt_ids: Vec::new(),
        }
    }
}

lazy_static! {
    static ref GO_ID_REGEX: Regex = Regex::new(r"^GO:\d{7}$").unwrap();
}

#[inline]
pub fn format_namespace(namespace: NameSpace) -> &'static str {
    match namespace {
        NameSpace::BiologicalProcess => "Biological Process",
        NameSpace::MolecularFunction => "Molecular Function",
        NameSpace::CellularComponent => "Cellular Component",
    }
}

/// The requested terms that the ontology marks as obsolete, in request order.
pub fn obsolete_terms<'a>(ontology: &OboMap, term_ids: &'a [TermID]) -> Vec<&'a TermID> {
    term_ids
        .iter()
        .filter(|term_id| {
            ontology
                .get(*term_id)
                .map(|term| term.is_obsolete)
                .unwrap_or(false)
        })
        .collect()
}

fn parse_namespace(value: &str) -> Option<NameSpace> {
    match value {
        "biological_process" => Some(NameSpace::BiologicalProcess),
        "molecular_function" => Some(NameSpace::MolecularFunction),
        "cellular_component" => Some(NameSpace::CellularComponent),
        _ => None,
    }
}

fn parse_go_id(value: &str) -> Option<TermID> {
    let value = value.split('!').next().unwrap_or("").trim();
    GO_ID_REGEX
        .is_match(value)
        .then(|| CompactString::new(value))
}

struct PendingTerm {
    id: Option<TermID>,
    term: OboTerm,
    line: usize,
}

/// Parses every `[Term]` stanza of a GO OBO file. Obsolete terms are kept so
/// that older annotations still resolve to a name; `alt_id` entries are
/// registered as aliases of their primary term.
pub fn parse_obo_file(obo_file_path: impl AsRef<Path>) -> Result<OboMap> {
    let path = obo_file_path.as_ref();
    let reader = open_text_file(path)?;
    parse_obo(reader, path)
}

pub fn parse_obo<R: BufRead>(reader: R, path: &Path) -> Result<OboMap> {
    let mut obo_terms: OboMap = FxHashMap::default();
    let mut pending: Option<PendingTerm> = None;

    let ontology_error = |line: usize, reason: String| EnrichmentError::Ontology {
        path: path.to_path_buf(),
        line,
        reason,
    };

    for (index, line) in reader.lines().enumerate() {
        let line_number = index + 1;
        let line = line.map_err(|source| EnrichmentError::Io {
            path: path.to_path_buf(),
            source,
        })?;
        let line = line.trim_end();

        if line.starts_with('[') {
            if let Some(done) = pending.take() {
                finish_term(done, &mut obo_terms, path)?;
            }
            if line == "[Term]" {
                pending = Some(PendingTerm {
                    id: None,
                    term: OboTerm::new(),
                    line: line_number,
                });
            }
            continue;
        }

        let Some(current) = pending.as_mut() else {
            continue;
        };
        let Some((tag, value)) = line.split_once(": ") else {
            continue;
        };

        match tag {
            "id" => {
                let id = parse_go_id(value)
                    .ok_or_else(|| ontology_error(line_number, format!("invalid GO id '{}'", value)))?;
                current.id = Some(id);
            }
            "name" => current.term.name = ucfirst(value.trim()),
            "namespace" => {
                current.term.namespace = parse_namespace(value.trim())
                    .ok_or_else(|| ontology_error(line_number, format!("invalid namespace '{}'", value)))?;
            }
            "alt_id" => {
                let alt_id = parse_go_id(value)
                    .ok_or_else(|| ontology_error(line_number, format!("invalid alt_id '{}'", value)))?;
                current.term.alt_ids.push(alt_id);
            }
            "is_obsolete" => current.term.is_obsolete = value.trim() == "true",
            _ => (),
        }
    }

    if let Some(done) = pending.take() {
        finish_term(done, &mut obo_terms, path)?;
    }

    Ok(obo_terms)
}

fn finish_term(pending: PendingTerm, obo_terms: &mut OboMap, path: &Path) -> Result<()> {
    let id = pending.id.ok_or_else(|| EnrichmentError::Ontology {
        path: path.to_path_buf(),
        line: pending.line,
        reason: "[Term] stanza without an id".to_string(),
    })?;

    for alt_id in &pending.term.alt_ids {
        obo_terms
            .entry(alt_id.clone())
            .or_insert_with(|| pending.term.clone());
    }
    obo_terms.insert(id, pending.term);
    Ok(())
}
