//! Mapping-table configuration generator.

use async_trait::async_trait;
use tracing::{info, instrument, warn};

use crate::analysis::map_specification;
use crate::error::PipelineResult;
use crate::models::field_path;
use crate::models::{
    BaselineConfig, GapReport, GeneratedConfig, GenerationStrategy, RuleSpecification,
    SkippedField, values_equal,
};

use super::{ConfigGenerator, verify_round_trip};

/// Writes every rule-implied value that has a configuration field.
///
/// Fails closed: values without a field are left at the baseline value and
/// logged, never guessed.
#[derive(Debug, Clone, Copy, Default)]
pub struct DeterministicGenerator;

impl DeterministicGenerator {
    /// Builds the configuration. Pure.
    pub fn build(
        spec: &RuleSpecification,
        baseline: &BaselineConfig,
    ) -> PipelineResult<GeneratedConfig> {
        let mut document = baseline.to_document()?;
        let mapping = map_specification(spec);
        let mut applied = Vec::new();
        let mut skipped = Vec::new();

        for implied in &mapping.implied {
            if !BaselineConfig::has_slot(&implied.path) {
                info!(
                    field_path = %implied.path,
                    entry_id = %implied.entry_id,
                    "No configuration field, keeping baseline"
                );
                skipped.push(SkippedField {
                    field_path: implied.path.clone(),
                    reason: "the configuration schema has no field for this value".to_string(),
                });
                continue;
            }
            if field_path::get(&document, &implied.path)
                .is_some_and(|current| values_equal(current, &implied.value))
            {
                continue;
            }
            let template = implied
                .path
                .root()
                .and_then(BaselineConfig::element_template);
            match field_path::set(
                &mut document,
                &implied.path,
                implied.value.clone(),
                template.as_ref(),
            ) {
                Ok(()) => applied.push(implied.path.clone()),
                Err(reason) => {
                    warn!(field_path = %implied.path, %reason, "Could not write field, keeping baseline");
                    skipped.push(SkippedField {
                        field_path: implied.path.clone(),
                        reason,
                    });
                }
            }
        }

        for field in &mapping.unmapped {
            info!(
                entry_id = %field.entry_id,
                field = %field.field,
                "Rule field has no mapping, keeping baseline"
            );
        }

        Ok(GeneratedConfig {
            strategy: GenerationStrategy::Deterministic,
            config: BaselineConfig::from_document(document)?,
            applied,
            fallback: Vec::new(),
            skipped,
        })
    }
}

#[async_trait]
impl ConfigGenerator for DeterministicGenerator {
    fn strategy(&self) -> GenerationStrategy {
        GenerationStrategy::Deterministic
    }

    #[instrument(skip_all, fields(strategy = "deterministic"))]
    async fn generate(
        &self,
        spec: &RuleSpecification,
        baseline: &BaselineConfig,
        gaps: &GapReport,
    ) -> PipelineResult<GeneratedConfig> {
        let generated = Self::build(spec, baseline)?;
        verify_round_trip(baseline, &generated.config, gaps)?;
        info!(
            applied = generated.applied.len(),
            skipped = generated.skipped.len(),
            "Configuration generated"
        );
        Ok(generated)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::analysis::analyze;
    use crate::config::ParametricPolicy;
    use crate::models::{
        AllowanceKind, AllowanceRule, BreakRule, OrdinaryHoursRule, RuleEntry,
    };
    use rust_decimal::Decimal;

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

    #[tokio::test]
    async fn test_applies_config_only_change() {
        let mut spec = RuleSpecification::new("MA000002", "Clerks", "MA000002");
        spec.ordinary_hours.entries.push(entry(
            "ordinary_hours-1",
            OrdinaryHoursRule {
                weekly_hours: Decimal::from(36),
                daily_threshold: None,
                span_start: None,
                span_end: None,
            },
        ));
        let baseline = baseline();
        let gaps = analyze(&spec, &baseline, &policy()).unwrap();
        let generated = DeterministicGenerator
            .generate(&spec, &baseline, &gaps)
            .await
            .unwrap();
        assert_eq!(generated.config.ordinary_hours.standard, Decimal::from(36));
        assert_eq!(generated.applied.len(), 1);

        let mut expected = baseline.clone();
        expected.ordinary_hours.standard = Decimal::from(36);
        assert_eq!(generated.config, expected);
    }

    #[tokio::test]
    async fn test_new_allowance_is_added_from_template() {
        let mut spec = RuleSpecification::new("MA000002", "Clerks", "MA000002");
        spec.allowances.entries.push(entry(
            "allowances-1",
            AllowanceRule {
                name: "LAUNDRY".to_string(),
                allowance_type: AllowanceKind::Weekly,
                amount: Some(Decimal::new(625, 2)),
                threshold: None,
                weekly_max: None,
                applies_to_days: vec![],
            },
        ));
        let baseline = baseline();
        let gaps = analyze(&spec, &baseline, &policy()).unwrap();
        let generated = DeterministicGenerator
            .generate(&spec, &baseline, &gaps)
            .await
            .unwrap();
        let laundry = generated
            .config
            .allowances
            .iter()
            .find(|a| a.name == "LAUNDRY")
            .unwrap();
        assert_eq!(laundry.allowance_type, "WEEKLY");
        assert_eq!(laundry.amount, Some(Decimal::new(625, 2)));
        assert_eq!(generated.config.allowances.len(), 3);
    }

    #[tokio::test]
    async fn test_values_without_a_field_are_skipped() {
        let mut spec = RuleSpecification::new("MA000002", "Clerks", "MA000002");
        spec.break_rules.entries.push(entry(
            "break_rules-1",
            BreakRule {
                auto_break_after_hours: None,
                auto_break_length: None,
                max_missed_break: None,
                min_break_between_shifts: None,
                meal_penalty_factor: Some(Decimal::new(15, 1)),
            },
        ));
        let baseline = baseline();
        let gaps = analyze(&spec, &baseline, &policy()).unwrap();
        let generated = DeterministicGenerator
            .generate(&spec, &baseline, &gaps)
            .await
            .unwrap();
        assert_eq!(generated.config, baseline);
        assert_eq!(
            generated.skipped[0].field_path.to_string(),
            "award_variation.meal_penalty_factor"
        );
    }
}
