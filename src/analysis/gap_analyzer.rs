//! Gap analysis between a rule specification and the baseline.

use std::collections::HashMap;

use serde_json::Value;
use tracing::{debug, info, instrument};

use crate::config::ParametricPolicy;
use crate::error::PipelineResult;
use crate::models::field_path::{self, Segment};
use crate::models::{
    BaselineConfig, FieldPath, GapClassification, GapEntry, GapReport, RuleSpecification,
    values_equal,
};

use super::mapping::{ImpliedValue, map_specification};

/// The list element a path addresses, e.g. `pay_components[OT1]`.
pub fn element_path(path: &FieldPath) -> Option<FieldPath> {
    let position = path
        .segments()
        .iter()
        .position(|s| matches!(s, Segment::Named(_)))?;
    Some(FieldPath::new(path.segments()[..=position].to_vec()))
}

/// Classifies one differing field against the schema and the policy.
pub fn classify(
    path: &FieldPath,
    baseline_document: &Value,
    policy: &ParametricPolicy,
) -> (GapClassification, String) {
    if !BaselineConfig::has_slot(path) {
        return (
            GapClassification::CodeRequired,
            format!("the configuration schema has no field for {}", path),
        );
    }
    if !policy.is_parametric(path) {
        return (
            GapClassification::CodeRequired,
            format!("{} is not parametric: the engine hardcodes this value", path),
        );
    }
    let new_element = element_path(path)
        .filter(|element| field_path::get(baseline_document, element).is_none());
    if let Some(element) = new_element {
        let list = path.root().unwrap_or_default();
        if !policy.allows_new_entries(list) {
            return (
                GapClassification::CodeRequired,
                format!("{} is a new {} entry and the engine only knows existing ones", element, list),
            );
        }
        return (
            GapClassification::ConfigOnly,
            format!("new {} entry {} with a parametric value", list, element),
        );
    }
    (
        GapClassification::ConfigOnly,
        format!("{} is a parametric slot; data substitution only", path),
    )
}

fn entry(
    implied: &ImpliedValue,
    baseline_value: Value,
    baseline_document: &Value,
    policy: &ParametricPolicy,
) -> GapEntry {
    let (classification, rationale) = classify(&implied.path, baseline_document, policy);
    GapEntry {
        field_path: implied.path.clone(),
        baseline_value,
        proposed_value: implied.value.clone(),
        classification,
        rationale,
        category: implied.category,
        clause_ids: implied.clause_ids.clone(),
    }
}

/// Diffs the specification against the baseline.
///
/// Entries follow the baseline's field order; fields the baseline does not
/// have are appended after them in path order with a `null` baseline value.
/// Values that compare equal (numerically for numbers) produce no entry.
#[instrument(skip_all, fields(award_id = %spec.award_id))]
pub fn analyze(
    spec: &RuleSpecification,
    baseline: &BaselineConfig,
    policy: &ParametricPolicy,
) -> PipelineResult<GapReport> {
    let document = baseline.to_document()?;
    let mapping = map_specification(spec);
    let mut pending: HashMap<&FieldPath, &ImpliedValue> =
        mapping.implied.iter().map(|i| (&i.path, i)).collect();

    let mut entries = Vec::new();
    for (path, baseline_value) in field_path::flatten(&document) {
        let Some(implied) = pending.remove(&path) else {
            continue;
        };
        if values_equal(&baseline_value, &implied.value) {
            continue;
        }
        entries.push(entry(implied, baseline_value, &document, policy));
    }

    let mut additions: Vec<&ImpliedValue> = pending.into_values().collect();
    additions.sort_by_key(|i| i.path.to_string());
    for implied in additions {
        if implied.value.is_null() {
            continue;
        }
        debug!(field_path = %implied.path, "Field not present in baseline");
        entries.push(entry(implied, Value::Null, &document, policy));
    }

    let report = GapReport::new(entries, mapping.unmapped);
    info!(
        config_only = report.summary.config_only,
        code_required = report.summary.code_required,
        unmapped = report.summary.unmapped,
        "Gap analysis finished"
    );
    Ok(report)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::{
        OrdinaryHoursRule, OvertimeRule, OvertimeTrigger, PenaltyDay, PenaltyRateRule, RuleEntry,
    };
    use proptest::prelude::*;
    use rust_decimal::Decimal;
    use serde_json::json;

    fn baseline() -> BaselineConfig {
        serde_yaml::from_str(include_str!("../../config/baseline.yaml")).unwrap()
    }

    fn policy() -> ParametricPolicy {
        serde_yaml::from_str(include_str!("../../config/parametric_fields.yaml")).unwrap()
    }

    fn entry<R>(id: &str, rule: R) -> RuleEntry<R> {
        RuleEntry {
            id: id.to_string(),
            rule,
            confidence: 0.9,
            clause_ids: vec!["13.1".to_string()],
            ambiguity: None,
        }
    }

    fn hours(weekly: Decimal) -> OrdinaryHoursRule {
        OrdinaryHoursRule {
            weekly_hours: weekly,
            daily_threshold: None,
            span_start: None,
            span_end: None,
        }
    }

    fn overtime(name: &str, trigger: OvertimeTrigger, factor: Decimal) -> OvertimeRule {
        OvertimeRule {
            name: name.to_string(),
            trigger,
            factor,
            threshold: None,
            daily_max: None,
            weekly_max: None,
            applies_to: vec![],
        }
    }

    #[test]
    fn test_standard_hours_change_is_config_only() {
        let mut spec = RuleSpecification::new("MA000002", "Clerks", "MA000002");
        spec.ordinary_hours
            .entries
            .push(entry("ordinary_hours-1", hours(Decimal::from(36))));
        let report = analyze(&spec, &baseline(), &policy()).unwrap();
        assert_eq!(report.entries.len(), 1);
        let gap = &report.entries[0];
        assert_eq!(gap.field_path.to_string(), "ordinary_hours.standard");
        assert_eq!(gap.baseline_value, json!("38"));
        assert_eq!(gap.proposed_value, json!("36"));
        assert_eq!(gap.classification, GapClassification::ConfigOnly);
    }

    #[test]
    fn test_equal_values_produce_no_entry() {
        let mut spec = RuleSpecification::new("MA000002", "Clerks", "MA000002");
        spec.ordinary_hours
            .entries
            .push(entry("ordinary_hours-1", hours(Decimal::new(380, 1))));
        let report = analyze(&spec, &baseline(), &policy()).unwrap();
        assert!(report.entries.is_empty());
    }

    #[test]
    fn test_no_rules_means_no_change() {
        let spec = RuleSpecification::new("MA000002", "Clerks", "MA000002");
        let report = analyze(&spec, &baseline(), &policy()).unwrap();
        assert!(report.entries.is_empty());
        assert_eq!(report.summary.code_required, 0);
    }

    #[test]
    fn test_hardcoded_and_missing_slots_are_code_required() {
        let mut spec = RuleSpecification::new("MA000002", "Clerks", "MA000002");
        spec.overtime.entries.push(entry(
            "overtime-1",
            overtime("OT1", OvertimeTrigger::WeeklyExcess, Decimal::new(15, 1)),
        ));
        spec.penalty_rates.entries.push(entry(
            "penalty_rates-1",
            PenaltyRateRule {
                name: "SAT1".to_string(),
                day: PenaltyDay::Saturday,
                factor: Decimal::new(125, 2),
                start: Some("07:00".to_string()),
                end: Some("12:30".to_string()),
                minimum_engagement: Some(Decimal::from(3)),
            },
        ));
        let report = analyze(&spec, &baseline(), &policy()).unwrap();
        let trigger = report
            .entry_for(&"pay_components[OT1].trigger".parse().unwrap())
            .unwrap();
        assert_eq!(trigger.classification, GapClassification::CodeRequired);
        assert!(trigger.rationale.contains("not parametric"));

        let engagement = report
            .entry_for(&"pay_components[SAT1].minimum_engagement".parse().unwrap())
            .unwrap();
        assert_eq!(engagement.classification, GapClassification::CodeRequired);
        assert_eq!(engagement.baseline_value, Value::Null);
        assert!(engagement.rationale.contains("no field"));
    }

    #[test]
    fn test_new_component_is_config_only_when_list_is_open() {
        let mut spec = RuleSpecification::new("MA000002", "Clerks", "MA000002");
        spec.overtime.entries.push(entry(
            "overtime-1",
            overtime("OT3", OvertimeTrigger::DailyExcess, Decimal::from(3)),
        ));
        let report = analyze(&spec, &baseline(), &policy()).unwrap();
        let factor = report
            .entry_for(&"pay_components[OT3].factor".parse().unwrap())
            .unwrap();
        assert_eq!(factor.classification, GapClassification::ConfigOnly);
        assert_eq!(factor.baseline_value, Value::Null);

        let mut closed = policy();
        closed.lists.clear();
        let report = analyze(&spec, &baseline(), &closed).unwrap();
        assert!(
            report
                .entries
                .iter()
                .all(|e| e.classification == GapClassification::CodeRequired)
        );
    }

    #[test]
    fn test_entries_follow_baseline_order_then_additions() {
        let mut spec = RuleSpecification::new("MA000002", "Clerks", "MA000002");
        spec.overtime.entries.push(entry(
            "overtime-1",
            overtime("OT9", OvertimeTrigger::DailyExcess, Decimal::from(3)),
        ));
        spec.ordinary_hours
            .entries
            .push(entry("ordinary_hours-1", hours(Decimal::from(36))));
        let report = analyze(&spec, &baseline(), &policy()).unwrap();
        let order: Vec<String> = report
            .entries
            .iter()
            .map(|e| e.field_path.to_string())
            .collect();
        assert_eq!(
            order,
            vec![
                "ordinary_hours.standard",
                "pay_components[OT9].factor",
                "pay_components[OT9].trigger",
            ]
        );
    }

    #[test]
    fn test_element_path() {
        let path: FieldPath = "pay_components[OT1].factor".parse().unwrap();
        assert_eq!(element_path(&path).unwrap().to_string(), "pay_components[OT1]");
        assert!(element_path(&"ordinary_hours.standard".parse().unwrap()).is_none());
    }

    proptest! {
        #[test]
        fn prop_every_differing_field_has_exactly_one_classified_entry(
            weekly in 30i64..45,
            factors in prop::collection::vec((0usize..4, 10i64..30), 0..5),
        ) {
            let names = ["OT1", "OT2", "OT3", "SAT1"];
            let mut spec = RuleSpecification::new("MA000002", "Clerks", "MA000002");
            spec.ordinary_hours.entries.push(entry("ordinary_hours-1", hours(Decimal::from(weekly))));
            for (i, (name, tenths)) in factors.iter().enumerate() {
                spec.overtime.entries.push(entry(
                    &format!("overtime-{}", i + 1),
                    overtime(names[*name], OvertimeTrigger::DailyExcess, Decimal::new(*tenths, 1)),
                ));
            }
            let baseline = baseline();
            let document = baseline.to_document().unwrap();
            let report = analyze(&spec, &baseline, &policy()).unwrap();

            for implied in map_specification(&spec).implied {
                let current = field_path::get(&document, &implied.path).cloned().unwrap_or(Value::Null);
                let matching = report.entries.iter().filter(|e| e.field_path == implied.path).count();
                if values_equal(&current, &implied.value) {
                    prop_assert_eq!(matching, 0);
                } else {
                    prop_assert_eq!(matching, 1);
                }
            }
            prop_assert_eq!(
                report.summary.config_only + report.summary.code_required,
                report.entries.len()
            );
        }
    }
}
