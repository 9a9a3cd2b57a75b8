//! Configuration and patch plan generation.
//!
//! Two interchangeable generators share the [`ConfigGenerator`] contract.
//! A session selects one by its [`GenerationStrategy`]; nothing else in the
//! pipeline branches on the strategy.

mod deterministic;
mod generative;
pub mod patch_plan;

use std::sync::Arc;

use async_trait::async_trait;

use crate::error::{PipelineError, PipelineResult};
use crate::llm::LlmClient;
use crate::models::field_path;
use crate::models::{
    BaselineConfig, GapReport, GeneratedConfig, GenerationStrategy, RuleSpecification,
};

pub use deterministic::DeterministicGenerator;
pub use generative::GenerativeGenerator;
pub use patch_plan::{attach_references, build_patch_plan, render_markdown};

/// Produces an updated configuration in the baseline schema.
#[async_trait]
pub trait ConfigGenerator: Send + Sync {
    /// The strategy recorded on the session.
    fn strategy(&self) -> GenerationStrategy;

    /// Generates the configuration.
    ///
    /// The result is schema-valid and leaves every baseline field without a
    /// gap entry unchanged.
    async fn generate(
        &self,
        spec: &RuleSpecification,
        baseline: &BaselineConfig,
        gaps: &GapReport,
    ) -> PipelineResult<GeneratedConfig>;
}

/// Returns the generator for `strategy`.
pub fn generator_for(
    strategy: GenerationStrategy,
    llm: Arc<dyn LlmClient>,
) -> Box<dyn ConfigGenerator> {
    match strategy {
        GenerationStrategy::Deterministic => Box::new(DeterministicGenerator),
        GenerationStrategy::Generative => Box::new(GenerativeGenerator::new(llm)),
    }
}

/// Checks that every baseline field without a gap entry survived unchanged
/// and that baseline list elements kept their order.
///
/// # Errors
///
/// Returns `SchemaValidation` naming the first field that changed or
/// disappeared, or the first list whose baseline elements were reordered.
pub fn verify_round_trip(
    baseline: &BaselineConfig,
    generated: &BaselineConfig,
    gaps: &GapReport,
) -> PipelineResult<()> {
    let before = baseline.to_document()?;
    let after = generated.to_document()?;
    for list in ["shifts", "pay_components", "allowances"] {
        let expected = field_path::element_names(&before, list);
        let kept: Vec<String> = field_path::element_names(&after, list)
            .into_iter()
            .filter(|name| expected.contains(name))
            .collect();
        if kept.len() == expected.len() && kept != expected {
            return Err(PipelineError::schema(
                "generated configuration",
                format!("{} reordered from {:?} to {:?}", list, expected, kept),
            ));
        }
    }
    for (path, value) in field_path::flatten(&before) {
        if gaps.entry_for(&path).is_some() {
            continue;
        }
        match field_path::get(&after, &path) {
            Some(current) if *current == value => {}
            Some(current) => {
                return Err(PipelineError::schema(
                    "generated configuration",
                    format!("{} changed from {} to {} without a gap", path, value, current),
                ));
            }
            None => {
                return Err(PipelineError::schema(
                    "generated configuration",
                    format!("{} is missing", path),
                ));
            }
        }
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::{GapClassification, GapEntry, RuleCategory};
    use rust_decimal::Decimal;
    use serde_json::json;

    fn baseline() -> BaselineConfig {
        serde_yaml::from_str(include_str!("../../config/baseline.yaml")).unwrap()
    }

    fn standard_hours_gap() -> GapReport {
        GapReport::new(
            vec![GapEntry {
                field_path: "ordinary_hours.standard".parse().unwrap(),
                baseline_value: json!("38"),
                proposed_value: json!("36"),
                classification: GapClassification::ConfigOnly,
                rationale: "parametric".to_string(),
                category: RuleCategory::OrdinaryHours,
                clause_ids: vec!["13.1".to_string()],
            }],
            vec![],
        )
    }

    #[test]
    fn test_round_trip_accepts_changes_covered_by_gaps() {
        let baseline = baseline();
        let mut generated = baseline.clone();
        generated.ordinary_hours.standard = Decimal::from(36);
        assert!(verify_round_trip(&baseline, &generated, &standard_hours_gap()).is_ok());
    }

    #[test]
    fn test_round_trip_rejects_silent_changes() {
        let baseline = baseline();
        let mut generated = baseline.clone();
        generated.ordinary_hours.daily_threshold = Some(Decimal::from(8));
        let err = verify_round_trip(&baseline, &generated, &standard_hours_gap()).unwrap_err();
        assert_eq!(err.reason_code(), "schema_invalid");
        assert!(err.to_string().contains("ordinary_hours.daily_threshold"));
    }

    #[test]
    fn test_round_trip_rejects_dropped_entries() {
        let baseline = baseline();
        let mut generated = baseline.clone();
        generated.allowances.retain(|a| a.name != "FIRSTAID");
        let err = verify_round_trip(&baseline, &generated, &GapReport::new(vec![], vec![]))
            .unwrap_err();
        assert!(err.to_string().contains("allowances[FIRSTAID]"));
    }

    #[test]
    fn test_round_trip_rejects_reordered_entries() {
        let baseline = baseline();
        let mut generated = baseline.clone();
        generated.pay_components.swap(1, 2);
        let err = verify_round_trip(&baseline, &generated, &GapReport::new(vec![], vec![]))
            .unwrap_err();
        assert_eq!(err.reason_code(), "schema_invalid");
        assert!(err.to_string().contains("pay_components reordered"));
    }

    #[test]
    fn test_generator_for_selects_strategy() {
        struct Unused;
        #[async_trait]
        impl LlmClient for Unused {
            async fn complete(
                &self,
                _request: &crate::llm::CompletionRequest,
            ) -> PipelineResult<crate::llm::Completion> {
                unreachable!()
            }
            fn model(&self) -> &str {
                "unused"
            }
        }
        let llm: Arc<dyn LlmClient> = Arc::new(Unused);
        assert_eq!(
            generator_for(GenerationStrategy::Deterministic, llm.clone()).strategy(),
            GenerationStrategy::Deterministic
        );
        assert_eq!(
            generator_for(GenerationStrategy::Generative, llm).strategy(),
            GenerationStrategy::Generative
        );
    }
}
