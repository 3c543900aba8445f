use log::info;
use crate::analysis::aggregation::{aggregate, Grouping, Population};
use crate::error::Result;
use crate::parsers::annotation_parser::TermCategory;
use crate::parsers::reference_store::{ReferenceStore, SpeciesSelector};

/// Builds the reference population of `category` for the selected species.
/// Every cluster record returned by the store is one member.
pub fn build_reference(
    store: &dyn ReferenceStore,
    selector: &SpeciesSelector,
    category: TermCategory,
) -> Result<Population> {
    let clusters = store.get_terms_per_cluster(selector, category)?;
    let population = aggregate(clusters, Grouping::Contiguous)?;

    info!(
        "Reference population for {} ({}): {} clusters with terms, {} distinct terms",
        selector,
        category,
        population.total(),
        population.len()
    );
    Ok(population)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::parsers::reference_store::InMemoryStore;

    fn store() -> InMemoryStore {
        let mut store = InMemoryStore::new();
        store
            .add_cluster("Quercus robur", "c1", TermCategory::KeggKos, "K1|K2|K1")
            .add_cluster("Quercus robur", "c2", TermCategory::KeggKos, "K1")
            .add_cluster("Quercus robur", "c3", TermCategory::KeggKos, "-")
            .add_cluster("Quercus robur", "c1", TermCategory::KeggPathways, "map00010")
            .add_cluster("Quercus suber", "c1", TermCategory::KeggKos, "K3");
        store
    }

    #[test]
    fn builds_population_for_one_species() {
        let store = store();
        let selector = SpeciesSelector::Species("Quercus robur".to_string());
        let population = build_reference(&store, &selector, TermCategory::KeggKos).unwrap();

        assert_eq!(population.total(), 2);
        assert_eq!(population.count("K1"), 2);
        assert_eq!(population.count("K2"), 1);
        assert_eq!(population.count("K3"), 0);
        assert_eq!(population.count("map00010"), 0);
    }

    #[test]
    fn all_species_spans_every_cluster() {
        let store = store();
        let population =
            build_reference(&store, &SpeciesSelector::AllSpecies, TermCategory::KeggKos).unwrap();

        assert_eq!(population.total(), 3);
        assert_eq!(population.count("K3"), 1);
    }
}
