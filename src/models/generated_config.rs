//! Generated configuration models.

use serde::{Deserialize, Serialize};

use super::baseline::BaselineConfig;
use super::field_path::FieldPath;
use super::session::GenerationStrategy;

/// A rule-implied value the generator did not write.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SkippedField {
    /// The field.
    pub field_path: FieldPath,
    /// Why it was left at the baseline value.
    pub reason: String,
}

/// The updated configuration produced by one generator.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct GeneratedConfig {
    /// Strategy that produced it.
    pub strategy: GenerationStrategy,
    /// The configuration, in the baseline schema.
    pub config: BaselineConfig,
    /// Fields changed from the baseline.
    pub applied: Vec<FieldPath>,
    /// Fields where model output was replaced by the mapping-table value.
    #[serde(default)]
    pub fallback: Vec<FieldPath>,
    /// Rule-implied fields left untouched.
    #[serde(default)]
    pub skipped: Vec<SkippedField>,
}
