//! Gap analysis: what the extracted rules imply for the baseline
//! configuration, and whether each difference is data or logic.

mod gap_analyzer;
pub mod mapping;

pub use gap_analyzer::{analyze, classify, element_path};
pub use mapping::{ImpliedValue, RuleMapping, map_specification};
