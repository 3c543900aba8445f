pub mod annotation_parser;
pub mod obo_parser;
pub mod reference_store;
