//! Gap report models.

use serde::{Deserialize, Serialize};
use serde_json::Value;

use super::field_path::FieldPath;
use super::rule_spec::RuleCategory;

/// How a gap can be closed.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum GapClassification {
    /// The configuration has a slot; changing data closes the gap.
    ConfigOnly,
    /// The engine logic has no parameterisation point for the value.
    CodeRequired,
}

impl GapClassification {
    /// The serialized name.
    pub fn as_str(&self) -> &'static str {
        match self {
            GapClassification::ConfigOnly => "config_only",
            GapClassification::CodeRequired => "code_required",
        }
    }
}

/// One difference between rule-implied and baseline values.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct GapEntry {
    /// The configuration field.
    pub field_path: FieldPath,
    /// The baseline value; `null` for additions.
    pub baseline_value: Value,
    /// The value implied by the rule specification.
    pub proposed_value: Value,
    /// How the gap can be closed.
    pub classification: GapClassification,
    /// Why it was classified this way.
    pub rationale: String,
    /// The category that implied the value.
    pub category: RuleCategory,
    /// Clauses backing the implied value.
    pub clause_ids: Vec<String>,
}

/// A rule field with no counterpart in the configuration mapping.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct UnmappedField {
    /// The category of the rule.
    pub category: RuleCategory,
    /// The entry the field came from.
    pub entry_id: String,
    /// The rule field name.
    pub field: String,
    /// The extracted value.
    pub value: Value,
}

/// Counts per classification.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct GapSummary {
    /// Config-only entries.
    pub config_only: usize,
    /// Code-required entries.
    pub code_required: usize,
    /// Unmapped rule fields.
    pub unmapped: usize,
}

/// The gap report of a session.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct GapReport {
    /// Entries ordered by baseline field order, additions last.
    pub entries: Vec<GapEntry>,
    /// Rule fields the mapping does not cover.
    pub unmapped: Vec<UnmappedField>,
    /// Counts.
    pub summary: GapSummary,
}

impl GapReport {
    /// Builds a report and its summary.
    pub fn new(entries: Vec<GapEntry>, unmapped: Vec<UnmappedField>) -> Self {
        let config_only = entries
            .iter()
            .filter(|e| e.classification == GapClassification::ConfigOnly)
            .count();
        let summary = GapSummary {
            config_only,
            code_required: entries.len() - config_only,
            unmapped: unmapped.len(),
        };
        Self {
            entries,
            unmapped,
            summary,
        }
    }

    /// Returns the entry for `path`, if any.
    pub fn entry_for(&self, path: &FieldPath) -> Option<&GapEntry> {
        self.entries.iter().find(|e| &e.field_path == path)
    }

    /// Entries of one classification.
    pub fn with_classification(
        &self,
        classification: GapClassification,
    ) -> impl Iterator<Item = &GapEntry> {
        self.entries
            .iter()
            .filter(move |e| e.classification == classification)
    }
}
