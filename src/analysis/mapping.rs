//! The rule-to-configuration mapping table.
//!
//! Every rule field either maps to one configuration field path or is
//! reported as unmapped. The gap analyzer and the deterministic generator
//! read the same table, so both agree on what a specification implies.

use std::collections::HashSet;

use rust_decimal::Decimal;
use serde_json::Value;
use tracing::warn;

use crate::models::{
    AllowanceRule, BreakRule, CategoryRule, CategoryRules, FieldPath, OrdinaryHoursRule,
    OvertimeRule, PenaltyRateRule, PublicHolidayRule, RuleCategory, RuleEntry, RuleSpecification,
    UnmappedField,
};

/// Day type used for public holiday pay components.
pub const PUBLIC_HOLIDAY_DAY: &str = "Public Holiday";

/// A configuration value implied by one rule entry.
#[derive(Debug, Clone, PartialEq)]
pub struct ImpliedValue {
    /// Target field.
    pub path: FieldPath,
    /// The value in configuration form.
    pub value: Value,
    /// Category of the source entry.
    pub category: RuleCategory,
    /// Source entry id.
    pub entry_id: String,
    /// Source clauses.
    pub clause_ids: Vec<String>,
}

/// The mapping of a whole specification.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct RuleMapping {
    /// One value per path, in category then entry order.
    pub implied: Vec<ImpliedValue>,
    /// Rule fields with no configuration counterpart.
    pub unmapped: Vec<UnmappedField>,
}

/// Configuration form of a decimal: the normalised string.
pub fn decimal_value(value: Decimal) -> Value {
    Value::String(value.normalize().to_string())
}

fn text(value: &str) -> Value {
    Value::String(value.to_string())
}

struct Collector<'a, R> {
    entry: &'a RuleEntry<R>,
    out: &'a mut RuleMapping,
    seen: &'a mut HashSet<FieldPath>,
}

impl<R: CategoryRule> Collector<'_, R> {
    fn put(&mut self, path: FieldPath, value: Value) {
        if !self.seen.insert(path.clone()) {
            warn!(
                field_path = %path,
                entry_id = %self.entry.id,
                "Field already implied by an earlier entry, keeping the first"
            );
            return;
        }
        self.out.implied.push(ImpliedValue {
            path,
            value,
            category: R::CATEGORY,
            entry_id: self.entry.id.clone(),
            clause_ids: self.entry.clause_ids.clone(),
        });
    }

    fn put_decimal(&mut self, path: FieldPath, value: Option<Decimal>) {
        if let Some(v) = value {
            self.put(path, decimal_value(v));
        }
    }

    fn unmapped(&mut self, field: &str, value: Value) {
        self.out.unmapped.push(UnmappedField {
            category: R::CATEGORY,
            entry_id: self.entry.id.clone(),
            field: field.to_string(),
            value,
        });
    }
}

fn each_usable<R: CategoryRule>(
    rules: &CategoryRules<R>,
    out: &mut RuleMapping,
    seen: &mut HashSet<FieldPath>,
    mut map: impl FnMut(&R, &mut Collector<'_, R>),
) {
    for entry in rules.usable() {
        let mut collector = Collector {
            entry,
            out: &mut *out,
            seen: &mut *seen,
        };
        map(&entry.rule, &mut collector);
    }
}

fn map_ordinary_hours(rule: &OrdinaryHoursRule, c: &mut Collector<'_, OrdinaryHoursRule>) {
    c.put(
        FieldPath::key("ordinary_hours", "standard"),
        decimal_value(rule.weekly_hours),
    );
    c.put_decimal(
        FieldPath::key("ordinary_hours", "daily_threshold"),
        rule.daily_threshold,
    );
    if let Some(start) = &rule.span_start {
        c.put(FieldPath::key("award_variation", "span_of_hours_start"), text(start));
    }
    if let Some(end) = &rule.span_end {
        c.put(FieldPath::key("award_variation", "span_of_hours_end"), text(end));
    }
}

fn map_overtime(rule: &OvertimeRule, c: &mut Collector<'_, OvertimeRule>) {
    let field = |key: &str| FieldPath::named("pay_components", &rule.name, key);
    c.put(field("factor"), decimal_value(rule.factor));
    c.put(field("trigger"), text(rule.trigger.as_str()));
    c.put_decimal(field("threshold"), rule.threshold);
    c.put_decimal(field("daily_max"), rule.daily_max);
    c.put_decimal(field("weekly_max"), rule.weekly_max);
    if !rule.applies_to.is_empty() {
        c.unmapped(
            "applies_to",
            Value::Array(rule.applies_to.iter().map(|d| text(d)).collect()),
        );
    }
}

fn map_penalty(rule: &PenaltyRateRule, c: &mut Collector<'_, PenaltyRateRule>) {
    let field = |key: &str| FieldPath::named("pay_components", &rule.name, key);
    c.put(field("day_of_week"), text(rule.day.as_str()));
    c.put(field("factor"), decimal_value(rule.factor));
    if let Some(start) = &rule.start {
        c.put(field("start_hour"), text(start));
    }
    if let Some(end) = &rule.end {
        c.put(field("end_hour"), text(end));
    }
    c.put_decimal(field("minimum_engagement"), rule.minimum_engagement);
}

fn map_allowance(rule: &AllowanceRule, c: &mut Collector<'_, AllowanceRule>) {
    let field = |key: &str| FieldPath::named("allowances", &rule.name, key);
    c.put(field("allowance_type"), text(rule.allowance_type.as_str()));
    c.put_decimal(field("amount"), rule.amount);
    c.put_decimal(field("threshold"), rule.threshold);
    c.put_decimal(field("weekly_max"), rule.weekly_max);
    if !rule.applies_to_days.is_empty() {
        c.unmapped(
            "applies_to_days",
            Value::Array(rule.applies_to_days.iter().map(|d| text(d)).collect()),
        );
    }
}

fn map_breaks(rule: &BreakRule, c: &mut Collector<'_, BreakRule>) {
    let field = |key: &str| FieldPath::key("award_variation", key);
    c.put_decimal(field("auto_break_after_hours"), rule.auto_break_after_hours);
    c.put_decimal(field("auto_break_length"), rule.auto_break_length);
    c.put_decimal(field("max_missed_break"), rule.max_missed_break);
    c.put_decimal(field("min_break_between_shifts"), rule.min_break_between_shifts);
    c.put_decimal(field("meal_penalty_factor"), rule.meal_penalty_factor);
}

fn map_public_holiday(rule: &PublicHolidayRule, c: &mut Collector<'_, PublicHolidayRule>) {
    let field = |key: &str| FieldPath::named("pay_components", &rule.name, key);
    c.put(field("day_of_week"), text(PUBLIC_HOLIDAY_DAY));
    c.put(field("factor"), decimal_value(rule.factor));
    if let Some(ph_rule) = rule.ph_rule {
        c.put(FieldPath::key("award_variation", "ph_rule"), text(ph_rule.as_str()));
    }
}

/// Maps the usable entries of a specification to configuration values.
///
/// Flagged entries that are still pending are ignored. When two entries
/// imply the same field the first one wins.
pub fn map_specification(spec: &RuleSpecification) -> RuleMapping {
    let mut out = RuleMapping::default();
    let mut seen = HashSet::new();
    each_usable(&spec.ordinary_hours, &mut out, &mut seen, map_ordinary_hours);
    each_usable(&spec.overtime, &mut out, &mut seen, map_overtime);
    each_usable(&spec.penalty_rates, &mut out, &mut seen, map_penalty);
    each_usable(&spec.allowances, &mut out, &mut seen, map_allowance);
    each_usable(&spec.break_rules, &mut out, &mut seen, map_breaks);
    each_usable(&spec.public_holidays, &mut out, &mut seen, map_public_holiday);
    out
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::{AllowanceKind, OvertimeTrigger, PenaltyDay, PhRule};
    use serde_json::json;

    fn entry<R>(id: &str, rule: R) -> RuleEntry<R> {
        RuleEntry {
            id: id.to_string(),
            rule,
            confidence: 0.9,
            clause_ids: vec!["1.1".to_string()],
            ambiguity: None,
        }
    }

    fn paths(mapping: &RuleMapping) -> Vec<String> {
        mapping.implied.iter().map(|i| i.path.to_string()).collect()
    }

    #[test]
    fn test_ordinary_hours_mapping() {
        let mut spec = RuleSpecification::new("MA1", "A", "MA1");
        spec.ordinary_hours.entries.push(entry(
            "ordinary_hours-1",
            OrdinaryHoursRule {
                weekly_hours: Decimal::new(360, 1),
                daily_threshold: None,
                span_start: Some("07:00".to_string()),
                span_end: None,
            },
        ));
        let mapping = map_specification(&spec);
        assert_eq!(
            paths(&mapping),
            vec!["ordinary_hours.standard", "award_variation.span_of_hours_start"]
        );
        assert_eq!(mapping.implied[0].value, json!("36"));
        assert_eq!(mapping.implied[0].category, RuleCategory::OrdinaryHours);
    }

    #[test]
    fn test_named_components_and_unmapped_fields() {
        let mut spec = RuleSpecification::new("MA1", "A", "MA1");
        spec.overtime.entries.push(entry(
            "overtime-1",
            OvertimeRule {
                name: "OT1".to_string(),
                trigger: OvertimeTrigger::DailyExcess,
                factor: Decimal::new(15, 1),
                threshold: None,
                daily_max: Some(Decimal::from(3)),
                weekly_max: None,
                applies_to: vec!["weekday".to_string()],
            },
        ));
        spec.penalty_rates.entries.push(entry(
            "penalty_rates-1",
            PenaltyRateRule {
                name: "SAT1".to_string(),
                day: PenaltyDay::Saturday,
                factor: Decimal::new(125, 2),
                start: None,
                end: None,
                minimum_engagement: Some(Decimal::from(3)),
            },
        ));
        spec.allowances.entries.push(entry(
            "allowances-1",
            AllowanceRule {
                name: "MEAL".to_string(),
                allowance_type: AllowanceKind::Daily,
                amount: Some(Decimal::new(1662, 2)),
                threshold: None,
                weekly_max: None,
                applies_to_days: vec![],
            },
        ));
        let mapping = map_specification(&spec);
        assert_eq!(
            paths(&mapping),
            vec![
                "pay_components[OT1].factor",
                "pay_components[OT1].trigger",
                "pay_components[OT1].daily_max",
                "pay_components[SAT1].day_of_week",
                "pay_components[SAT1].factor",
                "pay_components[SAT1].minimum_engagement",
                "allowances[MEAL].allowance_type",
                "allowances[MEAL].amount",
            ]
        );
        assert_eq!(mapping.unmapped.len(), 1);
        assert_eq!(mapping.unmapped[0].field, "applies_to");
    }

    #[test]
    fn test_public_holiday_mapping() {
        let mut spec = RuleSpecification::new("MA1", "A", "MA1");
        spec.public_holidays.entries.push(entry(
            "public_holidays-1",
            PublicHolidayRule {
                name: "PHOL1".to_string(),
                factor: Decimal::new(25, 1),
                ph_rule: Some(PhRule::AcrossMidnight),
            },
        ));
        let mapping = map_specification(&spec);
        assert_eq!(mapping.implied[0].value, json!("Public Holiday"));
        assert_eq!(mapping.implied[2].path.to_string(), "award_variation.ph_rule");
        assert_eq!(mapping.implied[2].value, json!("AcrossMidnight"));
    }

    #[test]
    fn test_pending_entries_and_duplicates_are_ignored() {
        let mut spec = RuleSpecification::new("MA1", "A", "MA1");
        let rule = |hours: i64| OrdinaryHoursRule {
            weekly_hours: Decimal::from(hours),
            daily_threshold: None,
            span_start: None,
            span_end: None,
        };
        let mut flagged = entry("ordinary_hours-1", rule(35));
        flagged.ambiguity = Some(crate::models::AmbiguityFlag {
            reasons: vec![crate::models::AmbiguityReason::LowConfidence],
            explanation: "low".to_string(),
            interpretations: vec![],
            resolved_by: None,
        });
        spec.ordinary_hours.entries = vec![
            flagged,
            entry("ordinary_hours-2", rule(36)),
            entry("ordinary_hours-3", rule(37)),
        ];
        let mapping = map_specification(&spec);
        assert_eq!(mapping.implied.len(), 1);
        assert_eq!(mapping.implied[0].value, json!("36"));
        assert_eq!(mapping.implied[0].entry_id, "ordinary_hours-2");
    }
}
