//! Rule specification models.
//!
//! A [`RuleSpecification`] is the canonical extracted representation of an
//! award's pay rules, partitioned into six fixed categories. Every entry
//! carries the clause ids it was extracted from, a confidence score and an
//! optional ambiguity flag that must be resolved before the specification
//! is used downstream.

use std::fmt;

use chrono::{DateTime, NaiveTime, Utc};
use rust_decimal::Decimal;
use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use serde_json::{Value, json};

use crate::error::{PipelineError, PipelineResult};

/// The fixed rule categories.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum RuleCategory {
    /// Weekly and daily ordinary hours and the span of hours.
    OrdinaryHours,
    /// Overtime rates and thresholds.
    Overtime,
    /// Weekend and time-of-day penalty rates.
    PenaltyRates,
    /// Allowances.
    Allowances,
    /// Break and meal rules.
    BreakRules,
    /// Public holiday rates and boundary rules.
    PublicHolidays,
}

impl RuleCategory {
    /// All categories in extraction order.
    pub const ALL: [RuleCategory; 6] = [
        RuleCategory::OrdinaryHours,
        RuleCategory::Overtime,
        RuleCategory::PenaltyRates,
        RuleCategory::Allowances,
        RuleCategory::BreakRules,
        RuleCategory::PublicHolidays,
    ];

    /// The snake_case name used in ids, artifacts and logs.
    pub fn as_str(&self) -> &'static str {
        match self {
            RuleCategory::OrdinaryHours => "ordinary_hours",
            RuleCategory::Overtime => "overtime",
            RuleCategory::PenaltyRates => "penalty_rates",
            RuleCategory::Allowances => "allowances",
            RuleCategory::BreakRules => "break_rules",
            RuleCategory::PublicHolidays => "public_holidays",
        }
    }
}

impl fmt::Display for RuleCategory {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// A typed rule belonging to one category.
///
/// The associated schema is sent to the model with every extraction request
/// and the typed deserialisation plus [`CategoryRule::validate`] form the
/// validation boundary for model output.
pub trait CategoryRule:
    Serialize + DeserializeOwned + Clone + PartialEq + fmt::Debug + Send + Sync + 'static
{
    /// The category this rule type belongs to.
    const CATEGORY: RuleCategory;

    /// Identifies the configuration element the rule targets. Two entries
    /// with the same key must agree on every value.
    fn key(&self) -> String;

    /// Domain checks beyond the structural schema.
    fn validate(&self) -> Result<(), String>;

    /// JSON schema of a single rule object.
    fn json_schema() -> Value;
}

fn check_time(field: &str, value: &Option<String>) -> Result<(), String> {
    match value {
        Some(v) if NaiveTime::parse_from_str(v, "%H:%M").is_err() => {
            Err(format!("{} must be HH:MM, got '{}'", field, v))
        }
        _ => Ok(()),
    }
}

fn check_positive(field: &str, value: Option<Decimal>) -> Result<(), String> {
    match value {
        Some(v) if v <= Decimal::ZERO => Err(format!("{} must be positive, got {}", field, v)),
        _ => Ok(()),
    }
}

fn check_name(name: &str) -> Result<(), String> {
    if name.trim().is_empty() {
        Err("name must not be empty".to_string())
    } else {
        Ok(())
    }
}

/// Ordinary hours of work.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct OrdinaryHoursRule {
    /// Ordinary hours per week.
    pub weekly_hours: Decimal,
    /// Daily hours after which overtime applies.
    #[serde(default)]
    pub daily_threshold: Option<Decimal>,
    /// Start of the ordinary span (HH:MM).
    #[serde(default)]
    pub span_start: Option<String>,
    /// End of the ordinary span (HH:MM).
    #[serde(default)]
    pub span_end: Option<String>,
}

impl CategoryRule for OrdinaryHoursRule {
    const CATEGORY: RuleCategory = RuleCategory::OrdinaryHours;

    fn key(&self) -> String {
        "ordinary_hours".to_string()
    }

    fn validate(&self) -> Result<(), String> {
        check_positive("weekly_hours", Some(self.weekly_hours))?;
        check_positive("daily_threshold", self.daily_threshold)?;
        check_time("span_start", &self.span_start)?;
        check_time("span_end", &self.span_end)
    }

    fn json_schema() -> Value {
        json!({
            "type": "object",
            "properties": {
                "weekly_hours": {"type": "number"},
                "daily_threshold": {"type": ["number", "null"]},
                "span_start": {"type": ["string", "null"], "pattern": "^\\d{2}:\\d{2}$"},
                "span_end": {"type": ["string", "null"], "pattern": "^\\d{2}:\\d{2}$"}
            },
            "required": ["weekly_hours"],
            "additionalProperties": false
        })
    }
}

/// What starts an overtime band.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum OvertimeTrigger {
    /// Hours beyond the daily threshold.
    DailyExcess,
    /// Hours beyond the weekly ordinary hours.
    WeeklyExcess,
    /// Hours beyond the first overtime band.
    AfterOt1,
    /// Hours worked outside the span of hours.
    OutsideSpan,
}

impl OvertimeTrigger {
    /// The configuration value for this trigger.
    pub fn as_str(&self) -> &'static str {
        match self {
            OvertimeTrigger::DailyExcess => "daily_excess",
            OvertimeTrigger::WeeklyExcess => "weekly_excess",
            OvertimeTrigger::AfterOt1 => "after_ot1",
            OvertimeTrigger::OutsideSpan => "outside_span",
        }
    }
}

/// An overtime band.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct OvertimeRule {
    /// Band name (e.g. "OT1").
    pub name: String,
    /// What starts the band.
    pub trigger: OvertimeTrigger,
    /// Rate multiplier.
    pub factor: Decimal,
    /// Hours threshold.
    #[serde(default)]
    pub threshold: Option<Decimal>,
    /// Maximum hours per day in this band.
    #[serde(default)]
    pub daily_max: Option<Decimal>,
    /// Maximum hours per week in this band.
    #[serde(default)]
    pub weekly_max: Option<Decimal>,
    /// Day types the band applies to.
    #[serde(default)]
    pub applies_to: Vec<String>,
}

impl CategoryRule for OvertimeRule {
    const CATEGORY: RuleCategory = RuleCategory::Overtime;

    fn key(&self) -> String {
        self.name.clone()
    }

    fn validate(&self) -> Result<(), String> {
        check_name(&self.name)?;
        check_positive("factor", Some(self.factor))?;
        check_positive("threshold", self.threshold)?;
        check_positive("daily_max", self.daily_max)?;
        check_positive("weekly_max", self.weekly_max)
    }

    fn json_schema() -> Value {
        json!({
            "type": "object",
            "properties": {
                "name": {"type": "string"},
                "trigger": {"enum": ["daily_excess", "weekly_excess", "after_ot1", "outside_span"]},
                "factor": {"type": "number"},
                "threshold": {"type": ["number", "null"]},
                "daily_max": {"type": ["number", "null"]},
                "weekly_max": {"type": ["number", "null"]},
                "applies_to": {"type": "array", "items": {"type": "string"}}
            },
            "required": ["name", "trigger", "factor"],
            "additionalProperties": false
        })
    }
}

/// Day a penalty rate applies to.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum PenaltyDay {
    /// Monday to Friday (evening or night penalties).
    Weekday,
    /// Saturday.
    Saturday,
    /// Sunday.
    Sunday,
}

impl PenaltyDay {
    /// The configuration value for this day.
    pub fn as_str(&self) -> &'static str {
        match self {
            PenaltyDay::Weekday => "Weekday",
            PenaltyDay::Saturday => "Saturday",
            PenaltyDay::Sunday => "Sunday",
        }
    }
}

/// A penalty rate.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct PenaltyRateRule {
    /// Component name (e.g. "SAT1").
    pub name: String,
    /// Day the penalty applies to.
    pub day: PenaltyDay,
    /// Rate multiplier.
    pub factor: Decimal,
    /// Window start (HH:MM).
    #[serde(default)]
    pub start: Option<String>,
    /// Window end (HH:MM).
    #[serde(default)]
    pub end: Option<String>,
    /// Minimum paid hours for an engagement on this day.
    #[serde(default)]
    pub minimum_engagement: Option<Decimal>,
}

impl CategoryRule for PenaltyRateRule {
    const CATEGORY: RuleCategory = RuleCategory::PenaltyRates;

    fn key(&self) -> String {
        self.name.clone()
    }

    fn validate(&self) -> Result<(), String> {
        check_name(&self.name)?;
        check_positive("factor", Some(self.factor))?;
        check_time("start", &self.start)?;
        check_time("end", &self.end)?;
        check_positive("minimum_engagement", self.minimum_engagement)
    }

    fn json_schema() -> Value {
        json!({
            "type": "object",
            "properties": {
                "name": {"type": "string"},
                "day": {"enum": ["Weekday", "Saturday", "Sunday"]},
                "factor": {"type": "number"},
                "start": {"type": ["string", "null"], "pattern": "^\\d{2}:\\d{2}$"},
                "end": {"type": ["string", "null"], "pattern": "^\\d{2}:\\d{2}$"},
                "minimum_engagement": {"type": ["number", "null"]}
            },
            "required": ["name", "day", "factor"],
            "additionalProperties": false
        })
    }
}

/// How an allowance is paid.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum AllowanceKind {
    /// Paid on claim.
    Claimable,
    /// Paid once hours pass a threshold.
    Threshold,
    /// Paid per hour.
    Hourly,
    /// Paid per day.
    Daily,
    /// Paid per week.
    Weekly,
}

impl AllowanceKind {
    /// The configuration value for this kind.
    pub fn as_str(&self) -> &'static str {
        match self {
            AllowanceKind::Claimable => "CLAIMABLE",
            AllowanceKind::Threshold => "THRESHOLD",
            AllowanceKind::Hourly => "HOURLY",
            AllowanceKind::Daily => "DAILY",
            AllowanceKind::Weekly => "WEEKLY",
        }
    }
}

/// An allowance.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct AllowanceRule {
    /// Allowance name (e.g. "MEAL").
    pub name: String,
    /// How the allowance is paid.
    pub allowance_type: AllowanceKind,
    /// Amount per unit.
    #[serde(default)]
    pub amount: Option<Decimal>,
    /// Hours threshold for threshold allowances.
    #[serde(default)]
    pub threshold: Option<Decimal>,
    /// Maximum units per week.
    #[serde(default)]
    pub weekly_max: Option<Decimal>,
    /// Days the allowance applies to.
    #[serde(default)]
    pub applies_to_days: Vec<String>,
}

impl CategoryRule for AllowanceRule {
    const CATEGORY: RuleCategory = RuleCategory::Allowances;

    fn key(&self) -> String {
        self.name.clone()
    }

    fn validate(&self) -> Result<(), String> {
        check_name(&self.name)?;
        check_positive("amount", self.amount)?;
        check_positive("threshold", self.threshold)?;
        check_positive("weekly_max", self.weekly_max)?;
        if self.allowance_type == AllowanceKind::Threshold && self.threshold.is_none() {
            return Err("THRESHOLD allowances need a threshold".to_string());
        }
        Ok(())
    }

    fn json_schema() -> Value {
        json!({
            "type": "object",
            "properties": {
                "name": {"type": "string"},
                "allowance_type": {"enum": ["CLAIMABLE", "THRESHOLD", "HOURLY", "DAILY", "WEEKLY"]},
                "amount": {"type": ["number", "null"]},
                "threshold": {"type": ["number", "null"]},
                "weekly_max": {"type": ["number", "null"]},
                "applies_to_days": {"type": "array", "items": {"type": "string"}}
            },
            "required": ["name", "allowance_type"],
            "additionalProperties": false
        })
    }
}

/// Break and meal rules.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct BreakRule {
    /// Hours worked after which an unpaid break is taken.
    #[serde(default)]
    pub auto_break_after_hours: Option<Decimal>,
    /// Length of that break in hours.
    #[serde(default)]
    pub auto_break_length: Option<Decimal>,
    /// Maximum hours worked without a break before a penalty applies.
    #[serde(default)]
    pub max_missed_break: Option<Decimal>,
    /// Minimum hours off between shifts.
    #[serde(default)]
    pub min_break_between_shifts: Option<Decimal>,
    /// Rate multiplier paid while a meal break is missed.
    #[serde(default)]
    pub meal_penalty_factor: Option<Decimal>,
}

impl CategoryRule for BreakRule {
    const CATEGORY: RuleCategory = RuleCategory::BreakRules;

    fn key(&self) -> String {
        "break_rules".to_string()
    }

    fn validate(&self) -> Result<(), String> {
        check_positive("auto_break_after_hours", self.auto_break_after_hours)?;
        check_positive("auto_break_length", self.auto_break_length)?;
        check_positive("max_missed_break", self.max_missed_break)?;
        check_positive("min_break_between_shifts", self.min_break_between_shifts)?;
        check_positive("meal_penalty_factor", self.meal_penalty_factor)
    }

    fn json_schema() -> Value {
        json!({
            "type": "object",
            "properties": {
                "auto_break_after_hours": {"type": ["number", "null"]},
                "auto_break_length": {"type": ["number", "null"]},
                "max_missed_break": {"type": ["number", "null"]},
                "min_break_between_shifts": {"type": ["number", "null"]},
                "meal_penalty_factor": {"type": ["number", "null"]}
            },
            "additionalProperties": false
        })
    }
}

/// Where the public holiday boundary falls for shifts crossing midnight.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum PhRule {
    /// Only hours on the holiday's calendar date attract the rate.
    ActualDate,
    /// The whole shift attracts the rate when it starts on the holiday.
    AcrossMidnight,
}

impl PhRule {
    /// The configuration value for this rule.
    pub fn as_str(&self) -> &'static str {
        match self {
            PhRule::ActualDate => "ActualDate",
            PhRule::AcrossMidnight => "AcrossMidnight",
        }
    }
}

/// A public holiday rate.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct PublicHolidayRule {
    /// Component name (e.g. "PHOL1").
    pub name: String,
    /// Rate multiplier.
    pub factor: Decimal,
    /// Boundary rule, when the award states one.
    #[serde(default)]
    pub ph_rule: Option<PhRule>,
}

impl CategoryRule for PublicHolidayRule {
    const CATEGORY: RuleCategory = RuleCategory::PublicHolidays;

    fn key(&self) -> String {
        self.name.clone()
    }

    fn validate(&self) -> Result<(), String> {
        check_name(&self.name)?;
        check_positive("factor", Some(self.factor))
    }

    fn json_schema() -> Value {
        json!({
            "type": "object",
            "properties": {
                "name": {"type": "string"},
                "factor": {"type": "number"},
                "ph_rule": {"enum": ["ActualDate", "AcrossMidnight", null]}
            },
            "required": ["name", "factor"],
            "additionalProperties": false
        })
    }
}

/// Why an entry was flagged.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum AmbiguityReason {
    /// Confidence below the configured threshold.
    LowConfidence,
    /// The model reported more than one plausible reading.
    MultipleInterpretations,
    /// Another entry with the same key disagrees.
    Contradiction,
}

/// An ambiguity flag attached to an entry.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AmbiguityFlag {
    /// Why the entry was flagged.
    pub reasons: Vec<AmbiguityReason>,
    /// Free-text explanation.
    pub explanation: String,
    /// Alternative readings reported by the model.
    #[serde(default)]
    pub interpretations: Vec<String>,
    /// The decision that resolved the flag, once resolved.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub resolved_by: Option<String>,
}

impl AmbiguityFlag {
    /// Returns true until a decision has been recorded.
    pub fn is_pending(&self) -> bool {
        self.resolved_by.is_none()
    }
}

/// One extracted rule with its provenance.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RuleEntry<R> {
    /// Entry id (`overtime-2`).
    pub id: String,
    /// The typed rule.
    pub rule: R,
    /// Extraction confidence in `[0, 1]`.
    pub confidence: f64,
    /// Source clause ids; never empty.
    pub clause_ids: Vec<String>,
    /// Set when the entry needs human judgment.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub ambiguity: Option<AmbiguityFlag>,
}

impl<R> RuleEntry<R> {
    /// Returns true if the entry carries an unresolved flag.
    pub fn is_pending(&self) -> bool {
        self.ambiguity.as_ref().is_some_and(AmbiguityFlag::is_pending)
    }
}

/// A category the extractor could not produce valid output for.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct UnresolvedCategory {
    /// Ambiguity id (`allowances-unresolved`).
    pub id: String,
    /// Why extraction failed.
    pub explanation: String,
    /// The decision that resolved the category, once resolved.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub resolved_by: Option<String>,
}

/// Entries of one category.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(bound(deserialize = "R: DeserializeOwned"))]
pub struct CategoryRules<R> {
    /// Extracted entries.
    #[serde(default = "Vec::new")]
    pub entries: Vec<RuleEntry<R>>,
    /// Set when extraction of the whole category failed.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub unresolved: Option<UnresolvedCategory>,
}

impl<R> Default for CategoryRules<R> {
    fn default() -> Self {
        Self {
            entries: Vec::new(),
            unresolved: None,
        }
    }
}

impl<R: CategoryRule> CategoryRules<R> {
    /// Marks the category as unresolved.
    pub fn unresolved(explanation: impl Into<String>) -> Self {
        Self {
            entries: Vec::new(),
            unresolved: Some(UnresolvedCategory {
                id: format!("{}-unresolved", R::CATEGORY),
                explanation: explanation.into(),
                resolved_by: None,
            }),
        }
    }

    /// Entries that are safe to use: unflagged or resolved.
    pub fn usable(&self) -> impl Iterator<Item = &RuleEntry<R>> {
        self.entries.iter().filter(|e| !e.is_pending())
    }

    fn collect_pending(&self, out: &mut Vec<PendingAmbiguity>) {
        if let Some(unresolved) = &self.unresolved {
            if unresolved.resolved_by.is_none() {
                out.push(PendingAmbiguity {
                    id: unresolved.id.clone(),
                    category: R::CATEGORY,
                    reasons: Vec::new(),
                    explanation: unresolved.explanation.clone(),
                    interpretations: Vec::new(),
                    confidence: None,
                    clause_ids: Vec::new(),
                    rule: None,
                });
            }
        }
        for entry in &self.entries {
            if let Some(flag) = entry.ambiguity.as_ref().filter(|f| f.is_pending()) {
                out.push(PendingAmbiguity {
                    id: entry.id.clone(),
                    category: R::CATEGORY,
                    reasons: flag.reasons.clone(),
                    explanation: flag.explanation.clone(),
                    interpretations: flag.interpretations.clone(),
                    confidence: Some(entry.confidence),
                    clause_ids: entry.clause_ids.clone(),
                    rule: serde_json::to_value(&entry.rule).ok(),
                });
            }
        }
    }

    fn override_entries(
        &self,
        target: &str,
        rules: &[Value],
        clause_ids: &[String],
        clause_exists: &dyn Fn(&str) -> bool,
    ) -> PipelineResult<Vec<RuleEntry<R>>> {
        let context = format!("override of {}", target);
        let known: Vec<String> = clause_ids
            .iter()
            .filter(|id| clause_exists(id))
            .cloned()
            .collect();
        if known.is_empty() {
            return Err(PipelineError::schema(
                context,
                "at least one existing clause id is required",
            ));
        }
        rules
            .iter()
            .enumerate()
            .map(|(i, value)| {
                let rule: R = serde_json::from_value(value.clone())
                    .map_err(|e| PipelineError::schema(context.as_str(), e.to_string()))?;
                rule.validate()
                    .map_err(|e| PipelineError::schema(context.as_str(), e))?;
                Ok(RuleEntry {
                    id: format!("{}-override-{}", target, i + 1),
                    rule,
                    confidence: 1.0,
                    clause_ids: known.clone(),
                    ambiguity: Some(AmbiguityFlag {
                        reasons: Vec::new(),
                        explanation: format!("supplied by resolution of {}", target),
                        interpretations: Vec::new(),
                        resolved_by: Some("override".to_string()),
                    }),
                })
            })
            .collect()
    }

    /// Applies one resolution if it targets this category. Returns false when
    /// the ambiguity id belongs elsewhere.
    fn apply(
        &mut self,
        resolution: &Resolution,
        clause_exists: &dyn Fn(&str) -> bool,
    ) -> PipelineResult<bool> {
        let target = resolution.ambiguity_id.as_str();

        if let Some(unresolved) = self.unresolved.as_mut().filter(|u| u.id == target) {
            match &resolution.decision {
                Decision::Accept => {
                    return Err(PipelineError::schema(
                        format!("resolution of {}", target),
                        "an unresolved category has nothing to accept; use reject or override",
                    ));
                }
                Decision::Reject => {
                    unresolved.resolved_by = Some("reject".to_string());
                }
                Decision::Override { rules, clause_ids } => {
                    let replacements =
                        self.override_entries(target, rules, clause_ids, clause_exists)?;
                    self.entries.extend(replacements);
                    if let Some(unresolved) = self.unresolved.as_mut() {
                        unresolved.resolved_by = Some("override".to_string());
                    }
                }
            }
            return Ok(true);
        }

        let Some(position) = self.entries.iter().position(|e| e.id == target) else {
            return Ok(false);
        };
        match &resolution.decision {
            Decision::Accept => {
                if let Some(flag) = self.entries[position].ambiguity.as_mut() {
                    flag.resolved_by = Some("accept".to_string());
                }
            }
            Decision::Reject => {
                self.entries.remove(position);
            }
            Decision::Override { rules, clause_ids } => {
                let replacements = self.override_entries(target, rules, clause_ids, clause_exists)?;
                self.entries.splice(position..=position, replacements);
            }
        }
        Ok(true)
    }
}

/// A flagged entry or unresolved category awaiting a decision.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PendingAmbiguity {
    /// The id a resolution must reference.
    pub id: String,
    /// The category it belongs to.
    pub category: RuleCategory,
    /// Why it was flagged; empty for unresolved categories.
    pub reasons: Vec<AmbiguityReason>,
    /// Free-text explanation.
    pub explanation: String,
    /// Alternative readings.
    pub interpretations: Vec<String>,
    /// Entry confidence, when the ambiguity is an entry.
    pub confidence: Option<f64>,
    /// Source clauses of the entry.
    pub clause_ids: Vec<String>,
    /// The extracted rule, when the ambiguity is an entry.
    pub rule: Option<Value>,
}

/// A caller decision on one ambiguity.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "decision", rename_all = "snake_case")]
pub enum Decision {
    /// Keep the entry as extracted.
    Accept,
    /// Drop the entry, or leave an unresolved category empty.
    Reject,
    /// Replace with caller-supplied rules.
    Override {
        /// Replacement rules, validated against the category schema.
        rules: Vec<Value>,
        /// Clauses the replacement is based on.
        clause_ids: Vec<String>,
    },
}

/// A resolution for one ambiguity.
///
/// # Example
///
/// ```
/// use award_interpreter::models::{Decision, Resolution};
///
/// let resolution: Resolution = serde_json::from_str(
///     r#"{"ambiguity_id": "overtime-2", "decision": "reject"}"#,
/// ).unwrap();
/// assert_eq!(resolution.decision, Decision::Reject);
/// ```
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Resolution {
    /// The ambiguity being resolved.
    pub ambiguity_id: String,
    /// The decision.
    #[serde(flatten)]
    pub decision: Decision,
}

/// The extracted rule specification of one award.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RuleSpecification {
    /// Award id (e.g. "MA000002").
    pub award_id: String,
    /// Award name.
    pub award_name: String,
    /// The document reference the rules were extracted from.
    pub source_reference: String,
    /// Extraction time.
    pub extracted_at: DateTime<Utc>,
    /// Ordinary hours.
    #[serde(default)]
    pub ordinary_hours: CategoryRules<OrdinaryHoursRule>,
    /// Overtime bands.
    #[serde(default)]
    pub overtime: CategoryRules<OvertimeRule>,
    /// Penalty rates.
    #[serde(default)]
    pub penalty_rates: CategoryRules<PenaltyRateRule>,
    /// Allowances.
    #[serde(default)]
    pub allowances: CategoryRules<AllowanceRule>,
    /// Break rules.
    #[serde(default)]
    pub break_rules: CategoryRules<BreakRule>,
    /// Public holiday rules.
    #[serde(default)]
    pub public_holidays: CategoryRules<PublicHolidayRule>,
}

impl RuleSpecification {
    /// Creates an empty specification.
    pub fn new(
        award_id: impl Into<String>,
        award_name: impl Into<String>,
        source_reference: impl Into<String>,
    ) -> Self {
        Self {
            award_id: award_id.into(),
            award_name: award_name.into(),
            source_reference: source_reference.into(),
            extracted_at: Utc::now(),
            ordinary_hours: CategoryRules::default(),
            overtime: CategoryRules::default(),
            penalty_rates: CategoryRules::default(),
            allowances: CategoryRules::default(),
            break_rules: CategoryRules::default(),
            public_holidays: CategoryRules::default(),
        }
    }

    /// Ambiguities that still need a decision, in category order.
    pub fn pending_ambiguities(&self) -> Vec<PendingAmbiguity> {
        let mut out = Vec::new();
        self.ordinary_hours.collect_pending(&mut out);
        self.overtime.collect_pending(&mut out);
        self.penalty_rates.collect_pending(&mut out);
        self.allowances.collect_pending(&mut out);
        self.break_rules.collect_pending(&mut out);
        self.public_holidays.collect_pending(&mut out);
        out
    }

    /// Returns a new specification with the resolutions applied.
    ///
    /// Every resolution must reference a known ambiguity id. Overrides are
    /// validated like model output and must cite at least one clause for
    /// which `clause_exists` returns true.
    pub fn apply_resolutions(
        &self,
        resolutions: &[Resolution],
        clause_exists: &dyn Fn(&str) -> bool,
    ) -> PipelineResult<RuleSpecification> {
        let mut spec = self.clone();
        for resolution in resolutions {
            let applied = spec.ordinary_hours.apply(resolution, clause_exists)?
                || spec.overtime.apply(resolution, clause_exists)?
                || spec.penalty_rates.apply(resolution, clause_exists)?
                || spec.allowances.apply(resolution, clause_exists)?
                || spec.break_rules.apply(resolution, clause_exists)?
                || spec.public_holidays.apply(resolution, clause_exists)?;
            if !applied {
                return Err(PipelineError::schema(
                    "resolutions",
                    format!("unknown ambiguity id '{}'", resolution.ambiguity_id),
                ));
            }
        }
        Ok(spec)
    }

    /// Every clause id cited by any entry.
    pub fn cited_clause_ids(&self) -> Vec<&str> {
        fn cited<'a, R>(rules: &'a CategoryRules<R>, out: &mut Vec<&'a str>) {
            for entry in &rules.entries {
                out.extend(entry.clause_ids.iter().map(String::as_str));
            }
        }
        let mut out = Vec::new();
        cited(&self.ordinary_hours, &mut out);
        cited(&self.overtime, &mut out);
        cited(&self.penalty_rates, &mut out);
        cited(&self.allowances, &mut out);
        cited(&self.break_rules, &mut out);
        cited(&self.public_holidays, &mut out);
        out
    }

    /// Total number of entries across categories.
    pub fn entry_count(&self) -> usize {
        self.ordinary_hours.entries.len()
            + self.overtime.entries.len()
            + self.penalty_rates.entries.len()
            + self.allowances.entries.len()
            + self.break_rules.entries.len()
            + self.public_holidays.entries.len()
    }
}
