use std::fmt;
use fishers_exact::fishers_exact;
use log::debug;
use crate::analysis::aggregation::Population;
use crate::parsers::annotation_parser::TermID;

pub const NOT_APPLICABLE: &str = "N/A";

/// `[study_with_term, study_total, reference_with_term, reference_total]`,
/// read row-wise as the 2x2 table `[[a, b], [c, d]]`.
pub type ContingencyTable = [usize; 4];

/// A statistic that may be undefined for a term.
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum Stat {
    Value(f64),
    NotApplicable,
}

impl Stat {
    /// Non-finite values become [`Stat::NotApplicable`].
    pub fn from_f64(value: f64) -> Self {
        if value.is_finite() {
            Stat::Value(value)
        } else {
            Stat::NotApplicable
        }
    }

    pub fn value(&self) -> Option<f64> {
        match self {
            Stat::Value(value) => Some(*value),
            Stat::NotApplicable => None,
        }
    }

    pub fn is_applicable(&self) -> bool {
        matches!(self, Stat::Value(_))
    }
}

impl fmt::Display for Stat {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Stat::Value(value) => write!(f, "{:?}", value),
            Stat::NotApplicable => f.write_str(NOT_APPLICABLE),
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct EnrichmentResult {
    pub term: TermID,
    pub annotation_seqs_count: usize,
    pub annotation_total: usize,
    pub species_seqs_count: usize,
    pub species_total: usize,
    pub enrichment: Stat,
    pub p_value: Stat,
    pub fdr: Stat,
}

/// Results for every study term, in the study's first-seen term order.
#[derive(Debug, Default, Clone, PartialEq)]
pub struct EnrichmentTable {
    pub results: Vec<EnrichmentResult>,
}

impl EnrichmentTable {
    pub fn len(&self) -> usize {
        self.results.len()
    }

    pub fn is_empty(&self) -> bool {
        self.results.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = &EnrichmentResult> {
        self.results.iter()
    }

    pub fn get(&self, term: &str) -> Option<&EnrichmentResult> {
        self.results.iter().find(|result| result.term == term)
    }

    pub fn term_ids(&self) -> Vec<TermID> {
        self.results.iter().map(|result| result.term.clone()).collect()
    }
}

/// The population totals sit in the second column, not `total - count`.
pub fn create_contingency_table(
    study_with_term: usize,
    total_study: usize,
    reference_with_term: usize,
    total_reference: usize,
) -> ContingencyTable {
    [study_with_term, total_study, reference_with_term, total_reference]
}

/// `(a / b) / (c / d)`; undefined when any denominator is zero.
pub fn calculate_enrichment_ratio(counts: &ContingencyTable) -> Stat {
    let [a, b, c, d] = *counts;
    if b == 0 || c == 0 || d == 0 {
        return Stat::NotApplicable;
    }
    Stat::from_f64((a as f64 / b as f64) / (c as f64 / d as f64))
}

/// One-sided ("greater") Fisher exact test for over-representation.
pub fn fishers_test(counts: &ContingencyTable) -> Stat {
    let mut counts_u32 = [0u32; 4];
    for (slot, &count) in counts_u32.iter_mut().zip(counts.iter()) {
        match u32::try_from(count) {
            Ok(count) => *slot = count,
            Err(_) => return Stat::NotApplicable,
        }
    }

    match fishers_exact(&counts_u32) {
        Ok(result) => match Stat::from_f64(result.greater_pvalue) {
            Stat::Value(p_value) => Stat::Value(p_value.clamp(0.0, 1.0)),
            Stat::NotApplicable => Stat::NotApplicable,
        },
        Err(_) => Stat::NotApplicable,
    }
}

pub fn analyze_single_term(
    term: TermID,
    study_with_term: usize,
    total_study: usize,
    reference_with_term: usize,
    total_reference: usize,
) -> EnrichmentResult {
    let contingency_table = create_contingency_table(
        study_with_term,
        total_study,
        reference_with_term,
        total_reference,
    );

    let enrichment = calculate_enrichment_ratio(&contingency_table);
    let p_value = if enrichment.is_applicable() {
        fishers_test(&contingency_table)
    } else {
        Stat::NotApplicable
    };

    EnrichmentResult {
        term,
        annotation_seqs_count: study_with_term,
        annotation_total: total_study,
        species_seqs_count: reference_with_term,
        species_total: total_reference,
        enrichment,
        p_value,
        fdr: Stat::NotApplicable,
    }
}

/// Tests every term observed in the study population against the reference.
/// Terms seen only in the reference are never evaluated.
pub fn calculate_enrichment(study: &Population, reference: &Population) -> EnrichmentTable {
    let results: Vec<EnrichmentResult> = study
        .terms()
        .map(|(term, study_with_term)| {
            analyze_single_term(
                term.clone(),
                study_with_term,
                study.total(),
                reference.count(term),
                reference.total(),
            )
        })
        .collect();

    debug!(
        "Tested {} terms, {} without reference occurrences",
        results.len(),
        results.iter().filter(|result| !result.enrichment.is_applicable()).count()
    );
    EnrichmentTable { results }
}
