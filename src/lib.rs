pub mod error;
pub mod config;
pub mod parsers;
pub mod analysis;
