use clap::ValueEnum;
use log::debug;
use rustc_hash::{FxHashMap, FxHashSet};
use serde::{Deserialize, Serialize};
use crate::error::Result;
use crate::parsers::annotation_parser::{AnnotationRecord, TermID};

const PROGRESS_INTERVAL: u64 = 100_000;

/// How rows of an annotation table are assembled into per-sequence groups.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, ValueEnum, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum Grouping {
    /// Runs of adjacent rows sharing an identifier form a group. The input is
    /// expected to be sorted or grouped by identifier; a second, non-adjacent
    /// run of the same identifier counts as a separate group.
    #[default]
    Contiguous,
    /// All rows sharing an identifier form a group, wherever they appear.
    ByIdentifier,
}

/// Term counts of a population: for every term, the number of distinct
/// sequences (or clusters) annotated with it, and the number of members that
/// carry at least one term. Terms are kept in first-seen order.
#[derive(Debug, Default, Clone, PartialEq)]
pub struct Population {
    term_counts: FxHashMap<TermID, usize>,
    term_order: Vec<TermID>,
    total: usize,
}

impl Population {
    pub fn count(&self, term: &str) -> usize {
        self.term_counts.get(term).copied().unwrap_or(0)
    }

    pub fn total(&self) -> usize {
        self.total
    }

    pub fn len(&self) -> usize {
        self.term_order.len()
    }

    pub fn is_empty(&self) -> bool {
        self.term_order.is_empty()
    }

    pub fn terms(&self) -> impl Iterator<Item = (&TermID, usize)> {
        self.term_order
            .iter()
            .map(move |term| (term, self.term_counts[term]))
    }

    /// Adds one member whose terms are `terms`. Duplicates are counted once;
    /// a member without terms leaves the population untouched.
    pub fn add_member<I, T>(&mut self, terms: I) -> bool
    where
        I: IntoIterator<Item = T>,
        T: AsRef<str>,
    {
        let mut seen: FxHashSet<TermID> = FxHashSet::default();
        for term in terms {
            let term = term.as_ref();
            if seen.contains(term) {
                continue;
            }
            let term = TermID::new(term);
            seen.insert(term.clone());

            match self.term_counts.get_mut(&term) {
                Some(count) => *count += 1,
                None => {
                    self.term_counts.insert(term.clone(), 1);
                    self.term_order.push(term);
                }
            }
        }

        if seen.is_empty() {
            return false;
        }
        self.total += 1;
        true
    }
}

/// Folds annotation records into a [`Population`], one member per sequence
/// group. The first record error aborts the aggregation.
pub fn aggregate<I>(records: I, grouping: Grouping) -> Result<Population>
where
    I: IntoIterator<Item = Result<AnnotationRecord>>,
{
    match grouping {
        Grouping::Contiguous => aggregate_contiguous(records),
        Grouping::ByIdentifier => aggregate_by_identifier(records),
    }
}

fn aggregate_contiguous<I>(records: I) -> Result<Population>
where
    I: IntoIterator<Item = Result<AnnotationRecord>>,
{
    let mut population = Population::default();
    let mut current_id: Option<String> = None;
    let mut current_terms: Vec<String> = Vec::new();
    let mut n_records: u64 = 0;

    for record in records {
        let record = record?;
        n_records += 1;
        if n_records % PROGRESS_INTERVAL == 0 {
            debug!("Aggregated {} records", n_records);
        }

        if current_id.as_deref() != Some(record.id.as_str()) {
            population.add_member(current_terms.drain(..));
            current_id = Some(record.id.clone());
        }
        current_terms.extend(record.terms().map(str::to_string));
    }
    population.add_member(current_terms.drain(..));

    debug!(
        "Aggregated {} records into {} members with {} distinct terms",
        n_records,
        population.total(),
        population.len()
    );
    Ok(population)
}

fn aggregate_by_identifier<I>(records: I) -> Result<Population>
where
    I: IntoIterator<Item = Result<AnnotationRecord>>,
{
    let mut group_index: FxHashMap<String, usize> = FxHashMap::default();
    let mut groups: Vec<Vec<String>> = Vec::new();
    let mut n_records: u64 = 0;

    for record in records {
        let record = record?;
        n_records += 1;
        if n_records % PROGRESS_INTERVAL == 0 {
            debug!("Aggregated {} records", n_records);
        }

        let index = *group_index.entry(record.id.clone()).or_insert_with(|| {
            groups.push(Vec::new());
            groups.len() - 1
        });
        groups[index].extend(record.terms().map(str::to_string));
    }

    let mut population = Population::default();
    for terms in groups {
        population.add_member(terms);
    }

    debug!(
        "Aggregated {} records into {} members with {} distinct terms",
        n_records,
        population.total(),
        population.len()
    );
    Ok(population)
}
