use adjustp::{adjust, Procedure};
use clap::ValueEnum;
use log::info;
use serde::{Deserialize, Serialize};
use crate::analysis::enrichment_analysis::{EnrichmentTable, Stat};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, ValueEnum, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum AdjustmentMethod {
    None,
    Bonferroni,
    #[default]
    BenjaminiHochberg,
    BenjaminiYekutieli,
}

impl AdjustmentMethod {
    fn to_procedure(&self) -> Option<Procedure> {
        match self {
            AdjustmentMethod::None => None,
            AdjustmentMethod::Bonferroni => Some(Procedure::Bonferroni),
            AdjustmentMethod::BenjaminiHochberg => Some(Procedure::BenjaminiHochberg),
            AdjustmentMethod::BenjaminiYekutieli => Some(Procedure::BenjaminiYekutieli),
        }
    }
}

/// Adjusts an ascending vector of p-values.
pub fn adjust_sorted_p_values(p_values: &[f64], method: AdjustmentMethod) -> Vec<f64> {
    if p_values.is_empty() {
        return Vec::new();
    }
    match method.to_procedure() {
        Some(procedure) => adjust(p_values, procedure)
            .into_iter()
            .map(|q_value| q_value.min(1.0))
            .collect(),
        None => p_values.to_vec(),
    }
}

/// Fills the FDR of every term with a p-value. All p-values of the table are
/// corrected jointly; terms without a p-value keep an undefined FDR.
///
/// P-values are ranked with a stable sort, so equal p-values keep the
/// table's term order.
pub fn adjust_p_values(table: &mut EnrichmentTable, method: AdjustmentMethod) {
    let mut ranked: Vec<(usize, f64)> = table
        .results
        .iter()
        .enumerate()
        .filter_map(|(index, result)| result.p_value.value().map(|p_value| (index, p_value)))
        .collect();
    ranked.sort_by(|a, b| a.1.total_cmp(&b.1));

    info!(
        "Adjusting {} p-values using method: {:?}",
        ranked.len(),
        method
    );

    let sorted_p_values: Vec<f64> = ranked.iter().map(|&(_, p_value)| p_value).collect();
    let adjusted = adjust_sorted_p_values(&sorted_p_values, method);

    for (&(index, _), q_value) in ranked.iter().zip(adjusted) {
        table.results[index].fdr = Stat::from_f64(q_value);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::analysis::enrichment_analysis::EnrichmentResult;
    use crate::parsers::annotation_parser::TermID;

    fn table(p_values: &[Stat]) -> EnrichmentTable {
        EnrichmentTable {
            results: p_values
                .iter()
                .enumerate()
                .map(|(index, &p_value)| EnrichmentResult {
                    term: TermID::new(format!("T{}", index)),
                    annotation_seqs_count: 1,
                    annotation_total: 10,
                    species_seqs_count: 1,
                    species_total: 100,
                    enrichment: Stat::Value(10.0),
                    p_value,
                    fdr: Stat::NotApplicable,
                })
                .collect(),
        }
    }

    fn fdr(table: &EnrichmentTable, index: usize) -> f64 {
        table.results[index].fdr.value().unwrap()
    }

    #[test]
    fn benjamini_hochberg_matches_reference_values() {
        let mut results = table(&[
            Stat::Value(0.04),
            Stat::Value(0.01),
            Stat::Value(0.03),
            Stat::Value(0.02),
        ]);
        adjust_p_values(&mut results, AdjustmentMethod::BenjaminiHochberg);

        for index in 0..4 {
            assert!((fdr(&results, index) - 0.04).abs() < 1e-12);
        }
    }

    #[test]
    fn q_values_are_monotone_in_p_values() {
        let p_values = [0.2, 0.001, 0.5, 0.01, 0.03, 0.04, 0.9, 0.002];
        for method in [
            AdjustmentMethod::BenjaminiHochberg,
            AdjustmentMethod::BenjaminiYekutieli,
            AdjustmentMethod::Bonferroni,
        ] {
            let mut results = table(&p_values.map(Stat::Value));
            adjust_p_values(&mut results, method);

            for i in 0..p_values.len() {
                assert!(fdr(&results, i) >= p_values[i]);
                assert!(fdr(&results, i) <= 1.0);
                for j in 0..p_values.len() {
                    if p_values[i] <= p_values[j] {
                        assert!(fdr(&results, i) <= fdr(&results, j));
                    }
                }
            }
        }
    }

    #[test]
    fn yekutieli_is_more_conservative() {
        let p_values = [0.001, 0.01, 0.02, 0.5];
        let mut bh = table(&p_values.map(Stat::Value));
        let mut by = table(&p_values.map(Stat::Value));
        adjust_p_values(&mut bh, AdjustmentMethod::BenjaminiHochberg);
        adjust_p_values(&mut by, AdjustmentMethod::BenjaminiYekutieli);

        for index in 0..p_values.len() {
            assert!(fdr(&by, index) >= fdr(&bh, index));
        }
    }

    #[test]
    fn undefined_p_values_are_skipped() {
        let mut results = table(&[Stat::Value(0.01), Stat::NotApplicable, Stat::Value(0.02)]);
        adjust_p_values(&mut results, AdjustmentMethod::Bonferroni);

        assert!((fdr(&results, 0) - 0.02).abs() < 1e-12);
        assert_eq!(results.results[1].fdr, Stat::NotApplicable);
        assert!((fdr(&results, 2) - 0.04).abs() < 1e-12);
    }

    #[test]
    fn no_adjustment_keeps_p_values() {
        let mut results = table(&[Stat::Value(0.3), Stat::Value(0.01)]);
        adjust_p_values(&mut results, AdjustmentMethod::None);
        assert_eq!(results.results[0].fdr, Stat::Value(0.3));
        assert_eq!(results.results[1].fdr, Stat::Value(0.01));
    }

    #[test]
    fn empty_table_is_a_no_op() {
        let mut results = table(&[Stat::NotApplicable]);
        adjust_p_values(&mut results, AdjustmentMethod::BenjaminiYekutieli);
        assert_eq!(results.results[0].fdr, Stat::NotApplicable);
    }
}
