//! Patch plan models.

use serde::{Deserialize, Serialize};

use super::field_path::FieldPath;

/// One suggested code change.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PatchItem {
    /// The gap this item addresses.
    pub field_path: FieldPath,
    /// Where in the engine the change belongs.
    pub location_hint: String,
    /// What has to change.
    pub change: String,
    /// What could go wrong.
    pub risk_note: String,
    /// Clauses backing the change.
    pub clause_ids: Vec<String>,
    /// Closest baseline entries and engine source blocks, most similar
    /// first.
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub references: Vec<String>,
}

/// Ordered list of suggested code changes. Never applied automatically.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct PatchPlan {
    /// Award the plan was produced for.
    pub award_id: String,
    /// Items in gap report order.
    pub items: Vec<PatchItem>,
}

impl PatchPlan {
    /// Returns true when no code change is needed.
    pub fn is_empty(&self) -> bool {
        self.items.is_empty()
    }
}
