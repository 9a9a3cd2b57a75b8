//! The parametric field policy.
//!
//! Which configuration fields the payroll engine reads as data (parametric)
//! and which are hardcoded in its logic is maintained outside the code in
//! `parametric_fields.yaml`. The gap analyzer consults this policy to decide
//! between config-only and code-required.

use std::collections::BTreeMap;

use serde::Deserialize;

use crate::models::FieldPath;

/// Per-list policy.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct ListPolicy {
    /// Whether the engine picks up new elements of this list without code.
    #[serde(default)]
    pub allow_new_entries: bool,
}

/// The maintained list of parametric field patterns.
///
/// # Example
///
/// ```
/// use award_interpreter::config::ParametricPolicy;
///
/// let policy: ParametricPolicy = serde_yaml::from_str(r#"
/// parametric:
///   - ordinary_hours.standard
///   - pay_components[*].factor
/// lists:
///   pay_components:
///     allow_new_entries: true
/// "#).unwrap();
///
/// assert!(policy.is_parametric(&"pay_components[OT1].factor".parse().unwrap()));
/// assert!(!policy.is_parametric(&"award_variation.ph_rule".parse().unwrap()));
/// assert!(policy.allows_new_entries("pay_components"));
/// assert!(!policy.allows_new_entries("shifts"));
/// ```
#[derive(Debug, Clone, Default, Deserialize)]
pub struct ParametricPolicy {
    /// Field patterns the engine treats as data.
    #[serde(default)]
    pub parametric: Vec<FieldPath>,
    /// Per-list policy keyed by list name.
    #[serde(default)]
    pub lists: BTreeMap<String, ListPolicy>,
}

impl ParametricPolicy {
    /// Returns true if any pattern matches `path`.
    pub fn is_parametric(&self, path: &FieldPath) -> bool {
        self.parametric.iter().any(|pattern| pattern.matches(path))
    }

    /// Returns true if new elements of `list` need no code change.
    pub fn allows_new_entries(&self, list: &str) -> bool {
        self.lists.get(list).is_some_and(|p| p.allow_new_entries)
    }
}
