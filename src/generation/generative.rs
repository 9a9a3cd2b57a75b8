//! Model-guided configuration generator.
//!
//! The model receives the rule specification, the baseline as a worked
//! example of the schema and the list of required changes, and returns a
//! complete configuration. Its output is validated against the schema and
//! then reconciled field by field with the mapping-table result: wherever
//! the two disagree the mapping-table value wins and the field is recorded
//! as a fallback. The model only decides fields the rules leave open, which
//! are the unimplied fields of newly added list entries.

use std::collections::HashSet;
use std::sync::Arc;

use async_trait::async_trait;
use serde_json::{Value, json};
use tracing::{info, instrument, warn};

use crate::analysis::element_path;
use crate::error::{PipelineError, PipelineResult};
use crate::extraction::prompts::{schema_text, with_correction};
use crate::llm::{CompletionRequest, LlmClient, OutputSchema};
use crate::models::field_path;
use crate::models::{
    BaselineConfig, FieldPath, GapReport, GeneratedConfig, GenerationStrategy, RuleSpecification,
    Segment, values_equal,
};

use super::deterministic::DeterministicGenerator;
use super::{ConfigGenerator, verify_round_trip};

const LISTS: [&str; 3] = ["shifts", "pay_components", "allowances"];

const SYSTEM_PROMPT: &str = "You maintain the configuration of an award payroll engine. Given \
extracted award rules and the current configuration, you return the updated configuration as \
JSON in exactly the same schema. You never invent fields, never drop fields and never change a \
value the rules do not require.";

/// Generates configuration through the model, with per-field fallback.
pub struct GenerativeGenerator {
    llm: Arc<dyn LlmClient>,
}

impl GenerativeGenerator {
    /// Creates a generator using `llm`.
    pub fn new(llm: Arc<dyn LlmClient>) -> Self {
        Self { llm }
    }
}

fn generation_request(
    spec: &RuleSpecification,
    baseline_document: &Value,
    gaps: &GapReport,
) -> PipelineResult<CompletionRequest> {
    let spec_json = serde_json::to_string_pretty(spec)
        .map_err(|e| PipelineError::schema("rule specification", e.to_string()))?;
    let changes = if gaps.entries.is_empty() {
        "(none)".to_string()
    } else {
        gaps.entries
            .iter()
            .map(|g| {
                format!(
                    "- {}: {} -> {} ({})",
                    g.field_path,
                    g.baseline_value,
                    g.proposed_value,
                    g.classification.as_str()
                )
            })
            .collect::<Vec<_>>()
            .join("\n")
    };
    let prompt = format!(
        "Award rule specification:\n{}\n\nCurrent configuration (a worked example of the \
         schema):\n{}\n\nRequired changes (field path: current -> proposed):\n{}\n\nSchema \
         constraints:\n- Return the complete configuration with the top-level keys \
         award_variation, ordinary_hours, shifts, pay_components and allowances.\n- List \
         elements are identified by their name; add an element only when a change above names \
         it.\n- Use only the fields shown in this element template:\n{}\n- Times are HH:MM \
         strings; numbers may be written as numbers or numeric strings.\n- Leave every field \
         not listed in the required changes exactly as it is.",
        spec_json,
        schema_text(baseline_document),
        changes,
        schema_text(&BaselineConfig::schema_template()),
    );
    Ok(CompletionRequest {
        system: SYSTEM_PROMPT.to_string(),
        prompt,
        schema: OutputSchema {
            name: "configuration".to_string(),
            schema: json!({
                "type": "object",
                "properties": {
                    "award_variation": {"type": "object"},
                    "ordinary_hours": {"type": "object"},
                    "shifts": {"type": "array", "items": {"type": "object"}},
                    "pay_components": {"type": "array", "items": {"type": "object"}},
                    "allowances": {"type": "array", "items": {"type": "object"}}
                },
                "required": ["award_variation", "ordinary_hours", "shifts", "pay_components", "allowances"],
                "additionalProperties": false
            }),
        },
    })
}

/// Orders the elements of `list` like `order`; names missing from `order`
/// go last in their current order. Returns true if anything moved.
fn reorder_list(document: &mut Value, list: &str, order: &[String]) -> bool {
    let Some(items) = document.get_mut(list).and_then(Value::as_array_mut) else {
        return false;
    };
    let rank = |item: &Value| {
        item.get("name")
            .and_then(Value::as_str)
            .and_then(|name| order.iter().position(|o| o == name))
            .unwrap_or(order.len())
    };
    let before: Vec<usize> = items.iter().map(rank).collect();
    items.sort_by_key(rank);
    !before.is_sorted()
}

/// Pins the candidate to the mapping-table result wherever they disagree.
fn reconcile(
    candidate: &BaselineConfig,
    baseline: &BaselineConfig,
    expected: &GeneratedConfig,
    gaps: &GapReport,
) -> PipelineResult<GeneratedConfig> {
    let baseline_document = baseline.to_document()?;
    let expected_document = expected.config.to_document()?;
    let mut document = candidate.to_document()?;
    let mut fallback = Vec::new();

    for list in LISTS {
        let allowed: HashSet<String> = field_path::element_names(&expected_document, list)
            .into_iter()
            .collect();
        if let Some(items) = document.get_mut(list).and_then(Value::as_array_mut) {
            let before = items.len();
            items.retain(|item| {
                item.get("name")
                    .and_then(Value::as_str)
                    .is_some_and(|name| allowed.contains(name))
            });
            if items.len() != before {
                warn!(list, dropped = before - items.len(), "Dropped list entries the rules do not imply");
            }
        }
    }

    for (path, value) in field_path::flatten(&expected_document) {
        let open_field = gaps.entry_for(&path).is_none()
            && element_path(&path)
                .is_some_and(|element| field_path::get(&baseline_document, &element).is_none());
        if open_field {
            continue;
        }
        let current = field_path::get(&document, &path);
        if current == Some(&value) {
            continue;
        }
        let disagrees = current.is_none_or(|c| !values_equal(c, &value));
        let template = path.root().and_then(BaselineConfig::element_template);
        field_path::set(&mut document, &path, value, template.as_ref())
            .map_err(|e| PipelineError::schema("generated configuration", e))?;
        if disagrees {
            fallback.push(path);
        }
    }

    // Baseline elements keep their baseline order, additions follow in
    // mapping order.
    for list in LISTS {
        let order = field_path::element_names(&expected_document, list);
        if reorder_list(&mut document, list, &order) {
            warn!(list, "Restored list order of model output");
            fallback.push(FieldPath::new(vec![Segment::Key(list.to_string())]));
        }
    }

    Ok(GeneratedConfig {
        strategy: GenerationStrategy::Generative,
        config: BaselineConfig::from_document(document)?,
        applied: expected.applied.clone(),
        fallback,
        skipped: expected.skipped.clone(),
    })
}

#[async_trait]
impl ConfigGenerator for GenerativeGenerator {
    fn strategy(&self) -> GenerationStrategy {
        GenerationStrategy::Generative
    }

    #[instrument(skip_all, fields(strategy = "generative", model = %self.llm.model()))]
    async fn generate(
        &self,
        spec: &RuleSpecification,
        baseline: &BaselineConfig,
        gaps: &GapReport,
    ) -> PipelineResult<GeneratedConfig> {
        let expected = DeterministicGenerator::build(spec, baseline)?;
        let initial = generation_request(spec, &baseline.to_document()?, gaps)?;
        let mut request = initial.clone();

        for attempt in 1..=2u32 {
            let problem = match self.llm.complete(&request).await {
                Ok(completion) => match BaselineConfig::from_document(completion.value) {
                    Ok(candidate) => {
                        let generated = reconcile(&candidate, baseline, &expected, gaps)?;
                        verify_round_trip(baseline, &generated.config, gaps)?;
                        info!(
                            applied = generated.applied.len(),
                            fallback = generated.fallback.len(),
                            "Configuration generated"
                        );
                        return Ok(generated);
                    }
                    Err(err) => err.to_string(),
                },
                Err(PipelineError::SchemaValidation { message, .. }) => message,
                Err(other) => return Err(other),
            };
            warn!(attempt, error = %problem, "Generated configuration rejected");
            request = with_correction(&initial, &problem);
        }

        warn!("Model output invalid twice, using the mapping-table configuration");
        let mut generated = expected;
        generated.strategy = GenerationStrategy::Generative;
        generated.fallback = generated.applied.clone();
        verify_round_trip(baseline, &generated.config, gaps)?;
        Ok(generated)
    }
}
