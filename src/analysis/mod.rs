pub mod aggregation;
pub mod reference_population;
pub mod enrichment_analysis;
pub mod multiple_testing_correction;
pub mod write_results;
pub mod pipeline;
