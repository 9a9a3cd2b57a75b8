//! Prompt text and response schemas for rule extraction.

use serde_json::{Value, json};

use crate::llm::{CompletionRequest, OutputSchema};
use crate::models::{CategoryRule, RuleCategory};
use crate::retrieval::ScoredChunk;

pub(crate) const SYSTEM_PROMPT: &str = "You are an expert in Australian industrial relations and \
modern awards. You extract wage calculation rules from award clauses.

Rules:
- Extract only what the clauses state explicitly. Never infer values that are not written.
- Cite the clause numbers each entry is based on in clause_ids, exactly as they appear in the \
brackets before each clause (for example \"25.1\").
- Give a confidence between 0 and 1 for every entry.
- When the wording supports more than one reading, list each reading in interpretations and \
explain the doubt in ambiguity_note.
- Return an empty entries list when the clauses say nothing about the category.
- Respond with JSON that matches the supplied schema and nothing else.";

/// Retrieval phrase used to find chunks for a category.
pub fn query_for(category: RuleCategory) -> &'static str {
    match category {
        RuleCategory::OrdinaryHours => "ordinary hours span of hours weekly hours daily hours",
        RuleCategory::Overtime => {
            "overtime time and a half double time additional hours excess hours"
        }
        RuleCategory::PenaltyRates => "saturday sunday weekend penalty rates",
        RuleCategory::Allowances => "allowance reimbursement payment meal tool equipment",
        RuleCategory::BreakRules => "break meal rest pause penalty unpaid",
        RuleCategory::PublicHolidays => "public holiday rates penalties",
    }
}

fn instructions(category: RuleCategory) -> &'static str {
    match category {
        RuleCategory::OrdinaryHours => {
            "Extract the ordinary hours of work: weekly ordinary hours, the daily hours after \
             which overtime applies, and the span of ordinary hours on weekdays (HH:MM). \
             Produce at most one entry."
        }
        RuleCategory::Overtime => {
            "Extract every overtime band. Name bands OT1, OT2, ... in the order they apply. \
             trigger is daily_excess, weekly_excess, after_ot1 (the band following OT1) or \
             outside_span. factor is the rate multiplier (time and a half is 1.5, double time \
             is 2.0). daily_max and weekly_max are the hours paid in the band before the next \
             band starts."
        }
        RuleCategory::PenaltyRates => {
            "Extract weekend and time-of-day penalty rates. Name them SAT1, SUN1, EVE1, ... \
             day is Weekday, Saturday or Sunday; factor is the multiplier (125% is 1.25); \
             start and end bound the window in HH:MM when the penalty applies to part of the \
             day only; minimum_engagement is the minimum paid hours when stated."
        }
        RuleCategory::Allowances => {
            "Extract allowances. Use short upper-case names such as MEAL, FIRSTAID, TOOL. \
             allowance_type is CLAIMABLE, THRESHOLD (paid once hours pass threshold), HOURLY, \
             DAILY or WEEKLY. amount is the dollar amount per unit."
        }
        RuleCategory::BreakRules => {
            "Extract break rules: hours after which an unpaid meal break is taken and its \
             length in hours, the maximum hours worked without a break before a penalty \
             applies, the minimum hours off between shifts, and the multiplier paid while a \
             meal break is missed. Produce at most one entry."
        }
        RuleCategory::PublicHolidays => {
            "Extract public holiday rates. Name them PHOL1, PHOL2, ... factor is the multiplier \
             (250% is 2.5). ph_rule is ActualDate when only hours on the holiday itself attract \
             the rate, AcrossMidnight when a shift starting on the holiday is paid at the \
             holiday rate throughout, or null when the award does not say."
        }
    }
}

/// The response envelope schema for a rule type.
pub fn envelope_schema<R: CategoryRule>() -> OutputSchema {
    OutputSchema {
        name: R::CATEGORY.as_str().to_string(),
        schema: json!({
            "type": "object",
            "properties": {
                "entries": {
                    "type": "array",
                    "items": {
                        "type": "object",
                        "properties": {
                            "rule": R::json_schema(),
                            "confidence": {"type": "number", "minimum": 0, "maximum": 1},
                            "clause_ids": {"type": "array", "items": {"type": "string"}, "minItems": 1},
                            "interpretations": {"type": "array", "items": {"type": "string"}},
                            "ambiguity_note": {"type": ["string", "null"]}
                        },
                        "required": ["rule", "confidence", "clause_ids"],
                        "additionalProperties": false
                    }
                }
            },
            "required": ["entries"],
            "additionalProperties": false
        }),
    }
}

/// Builds the extraction request for one category.
pub fn extraction_request<R: CategoryRule>(
    award_name: &str,
    chunks: &[ScoredChunk],
) -> CompletionRequest {
    let clauses = if chunks.is_empty() {
        "(no relevant clauses found)".to_string()
    } else {
        chunks
            .iter()
            .map(|c| c.chunk.render())
            .collect::<Vec<_>>()
            .join("\n\n")
    };
    CompletionRequest {
        system: SYSTEM_PROMPT.to_string(),
        prompt: format!(
            "{}\n\nAward: {}\n\nRelevant clauses:\n---\n{}\n---\n\nReturn the {} entries as JSON.",
            instructions(R::CATEGORY),
            award_name,
            clauses,
            R::CATEGORY
        ),
        schema: envelope_schema::<R>(),
    }
}

/// Appends the corrective instruction used on the single retry.
pub fn with_correction(request: &CompletionRequest, problem: &str) -> CompletionRequest {
    let mut corrected = request.clone();
    corrected.prompt = format!(
        "{}\n\nYour previous response was rejected: {}\nReturn JSON that matches the schema \
         exactly. Use only the listed field names, HH:MM times, positive numbers, and clause \
         ids that appear in the brackets above.",
        request.prompt, problem
    );
    corrected
}

/// The schema as pretty JSON, for prompts that embed it.
pub fn schema_text(schema: &Value) -> String {
    serde_json::to_string_pretty(schema).unwrap_or_else(|_| schema.to_string())
}
