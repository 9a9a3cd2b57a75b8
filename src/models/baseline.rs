//! Baseline configuration schema.
//!
//! The baseline is the pre-existing payroll engine configuration. Its shape is
//! fixed: award variation settings, ordinary hours, shift definitions, pay
//! components and allowances. The pipeline reads it and never mutates it;
//! generated configurations use exactly the same schema.

use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::error::{PipelineError, PipelineResult};

use super::field_path::{self, FieldPath};

fn default_true() -> bool {
    true
}

/// Award-wide settings of the payroll engine.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct AwardVariation {
    /// The award variation name.
    pub name: String,
    /// Public holiday boundary rule ("ActualDate" or "AcrossMidnight").
    pub ph_rule: String,
    /// How shifts crossing midnight are attributed.
    pub overnight_rule: String,
    /// Start of the ordinary span of hours (HH:MM).
    pub span_of_hours_start: Option<String>,
    /// End of the ordinary span of hours (HH:MM).
    pub span_of_hours_end: Option<String>,
    /// Whether weekends fall inside the span of hours.
    #[serde(default = "default_true")]
    pub include_weekends_in_span: bool,
    /// Maximum hours worked before a missed break penalty applies.
    pub max_missed_break: Option<Decimal>,
    /// Hours worked after which an unpaid break is deducted.
    pub auto_break_after_hours: Option<Decimal>,
    /// Length of the automatic break in hours.
    pub auto_break_length: Option<Decimal>,
    /// Minimum hours between shifts.
    pub min_break_between_shifts: Option<Decimal>,
    /// Minimum engagement in hours.
    pub minimum_engagement: Option<Decimal>,
    /// Rate model ("Factored" or "Flat").
    pub rate_model: String,
}

/// Ordinary hours settings.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct OrdinaryHoursSettings {
    /// Standard ordinary hours per week.
    pub standard: Decimal,
    /// Daily hours after which overtime applies.
    pub daily_threshold: Option<Decimal>,
}

/// A named shift window.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct ShiftDefinition {
    /// Shift name (e.g. "Day").
    pub name: String,
    /// Day type the shift applies to ("Weekday", "Saturday", ...).
    pub day_of_week: String,
    /// Start time (HH:MM).
    pub start: String,
    /// End time (HH:MM).
    pub end: String,
}

/// A pay component the engine evaluates (ordinary, overtime, penalty, holiday).
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct PayComponent {
    /// Component name (e.g. "DAY1", "OT1", "SAT1", "PHOL1").
    pub name: String,
    /// Day type the component applies to.
    pub day_of_week: Option<String>,
    /// Rate multiplier.
    pub factor: Option<Decimal>,
    /// Hours after which the component starts applying.
    pub threshold: Option<Decimal>,
    /// Maximum hours per day at this component.
    pub daily_max: Option<Decimal>,
    /// Maximum hours per week at this component.
    pub weekly_max: Option<Decimal>,
    /// Trigger kind for overtime components.
    pub trigger: Option<String>,
    /// Start of the time window (HH:MM).
    pub start_hour: Option<String>,
    /// End of the time window (HH:MM).
    pub end_hour: Option<String>,
    /// Whether the component is taxable.
    #[serde(default = "default_true")]
    pub is_taxable: bool,
    /// Whether the component attracts superannuation.
    #[serde(default = "default_true")]
    pub is_superable: bool,
}

/// An allowance the engine pays.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct AllowanceDefinition {
    /// Allowance name (e.g. "MEAL").
    pub name: String,
    /// Allowance type ("CLAIMABLE", "THRESHOLD", "HOURLY", "DAILY", "WEEKLY").
    pub allowance_type: String,
    /// Amount per unit.
    pub amount: Option<Decimal>,
    /// Hours threshold that triggers the allowance.
    pub threshold: Option<Decimal>,
    /// Maximum units per week.
    pub weekly_max: Option<Decimal>,
    /// Whether the allowance is taxable.
    #[serde(default = "default_true")]
    pub is_taxable: bool,
}

/// The baseline configuration document.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct BaselineConfig {
    /// Award-wide settings.
    pub award_variation: AwardVariation,
    /// Ordinary hours settings.
    pub ordinary_hours: OrdinaryHoursSettings,
    /// Shift definitions.
    #[serde(default)]
    pub shifts: Vec<ShiftDefinition>,
    /// Pay components.
    #[serde(default)]
    pub pay_components: Vec<PayComponent>,
    /// Allowances.
    #[serde(default)]
    pub allowances: Vec<AllowanceDefinition>,
}

impl BaselineConfig {
    /// Converts the configuration into a JSON document.
    pub fn to_document(&self) -> PipelineResult<Value> {
        serde_json::to_value(self)
            .map_err(|e| PipelineError::schema("configuration", e.to_string()))
    }

    /// Validates a JSON document against the schema.
    pub fn from_document(document: Value) -> PipelineResult<Self> {
        serde_json::from_value(document)
            .map_err(|e| PipelineError::schema("configuration", e.to_string()))
    }

    /// A document with one default element in each list, used to enumerate
    /// schema slots and to seed new list elements.
    pub fn schema_template() -> Value {
        let template = BaselineConfig {
            award_variation: AwardVariation {
                name: String::new(),
                ph_rule: String::new(),
                overnight_rule: String::new(),
                span_of_hours_start: None,
                span_of_hours_end: None,
                include_weekends_in_span: true,
                max_missed_break: None,
                auto_break_after_hours: None,
                auto_break_length: None,
                min_break_between_shifts: None,
                minimum_engagement: None,
                rate_model: String::new(),
            },
            ordinary_hours: OrdinaryHoursSettings {
                standard: Decimal::ZERO,
                daily_threshold: None,
            },
            shifts: vec![ShiftDefinition {
                name: "*".to_string(),
                day_of_week: String::new(),
                start: String::new(),
                end: String::new(),
            }],
            pay_components: vec![PayComponent {
                name: "*".to_string(),
                day_of_week: None,
                factor: None,
                threshold: None,
                daily_max: None,
                weekly_max: None,
                trigger: None,
                start_hour: None,
                end_hour: None,
                is_taxable: true,
                is_superable: true,
            }],
            allowances: vec![AllowanceDefinition {
                name: "*".to_string(),
                allowance_type: "CLAIMABLE".to_string(),
                amount: None,
                threshold: None,
                weekly_max: None,
                is_taxable: true,
            }],
        };
        serde_json::to_value(template).unwrap_or(Value::Null)
    }

    /// Returns the template element for a list, used when a path adds a new
    /// named element.
    pub fn element_template(list: &str) -> Option<Value> {
        Self::schema_template()
            .get(list)
            .and_then(Value::as_array)
            .and_then(|items| items.first().cloned())
    }

    /// Returns true if the schema has a slot for `path`.
    ///
    /// # Example
    ///
    /// ```
    /// use award_interpreter::models::{BaselineConfig, FieldPath};
    ///
    /// let factor: FieldPath = "pay_components[OT3].factor".parse().unwrap();
    /// let unknown: FieldPath = "award_variation.meal_penalty_factor".parse().unwrap();
    /// assert!(BaselineConfig::has_slot(&factor));
    /// assert!(!BaselineConfig::has_slot(&unknown));
    /// ```
    pub fn has_slot(path: &FieldPath) -> bool {
        let wanted = path.slot_pattern();
        field_path::flatten(&Self::schema_template())
            .iter()
            .any(|(slot, _)| *slot == wanted)
    }
}

/// Process-wide read-only baseline configuration.
pub type SharedBaseline = std::sync::Arc<BaselineConfig>;

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    pub(crate) fn sample_yaml() -> &'static str {
        r#"
award_variation:
  name: Clerks Private Sector
  ph_rule: ActualDate
  overnight_rule: AcrossMidnight
  span_of_hours_start: "07:00"
  span_of_hours_end: "19:00"
  max_missed_break: 5
  auto_break_after_hours: 5
  auto_break_length: 0.5
  min_break_between_shifts: 10
  rate_model: Factored
ordinary_hours:
  standard: 38
  daily_threshold: 10
shifts:
  - name: Day
    day_of_week: Weekday
    start: "07:00"
    end: "19:00"
pay_components:
  - name: DAY1
    factor: 1.0
  - name: OT1
    factor: 1.5
    daily_max: 2
allowances:
  - name: MEAL
    allowance_type: THRESHOLD
    amount: 16.62
    threshold: 10
"#
    }

    #[test]
    fn test_deserialize_baseline_yaml() {
        let baseline: BaselineConfig = serde_yaml::from_str(sample_yaml()).unwrap();
        assert_eq!(baseline.ordinary_hours.standard, Decimal::from(38));
        assert_eq!(baseline.pay_components.len(), 2);
        assert!(baseline.pay_components[1].is_superable);
        assert_eq!(baseline.allowances[0].allowance_type, "THRESHOLD");
    }

    #[test]
    fn test_unknown_fields_rejected() {
        let mut doc = serde_yaml::from_str::<BaselineConfig>(sample_yaml())
            .unwrap()
            .to_document()
            .unwrap();
        doc["award_variation"]["shift_loading"] = json!(true);
        assert!(BaselineConfig::from_document(doc).is_err());
    }

    #[test]
    fn test_document_round_trip() {
        let baseline: BaselineConfig = serde_yaml::from_str(sample_yaml()).unwrap();
        let doc = baseline.to_document().unwrap();
        assert_eq!(BaselineConfig::from_document(doc).unwrap(), baseline);
    }

    #[test]
    fn test_slots() {
        assert!(BaselineConfig::has_slot(&"ordinary_hours.standard".parse().unwrap()));
        assert!(BaselineConfig::has_slot(
            &"allowances[LAUNDRY].amount".parse().unwrap()
        ));
        assert!(!BaselineConfig::has_slot(
            &"pay_components[SAT1].minimum_engagement".parse().unwrap()
        ));
    }

    #[test]
    fn test_element_template_is_valid_element() {
        let template = BaselineConfig::element_template("pay_components").unwrap();
        let component: PayComponent = serde_json::from_value(template).unwrap();
        assert!(component.factor.is_none());
        assert!(BaselineConfig::element_template("ordinary_hours").is_none());
    }
}
