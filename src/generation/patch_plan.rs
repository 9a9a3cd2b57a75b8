//! Patch plan generation.
//!
//! A patch plan lists the engine code changes the configuration alone
//! cannot express: one item per code-required gap, in gap report order.
//! Building the plan is pure and makes no model call. Reference locations
//! come from similarity search over the baseline and engine sources.

use std::fmt::Write;

use serde_json::Value;

use crate::analysis::element_path;
use crate::error::PipelineResult;
use crate::models::{
    BaselineConfig, FieldPath, GapClassification, GapEntry, GapReport, PatchItem, PatchPlan,
};
use crate::retrieval::{Embedder, VectorIndex, reference_label};

fn location_hint(path: &FieldPath) -> String {
    let element = path.element_name();
    match (path.root(), element) {
        (Some("ordinary_hours"), _) => "Ordinary hours calculation".to_string(),
        (Some("pay_components"), Some(name)) => format!("Pay component evaluation ({})", name),
        (Some("allowances"), Some(name)) => format!("Allowance processing ({})", name),
        (Some("award_variation"), _) => "Award variation settings".to_string(),
        (Some("shifts"), Some(name)) => format!("Shift classification ({})", name),
        _ => "Configuration schema".to_string(),
    }
}

fn describe(value: &Value) -> String {
    match value {
        Value::Null => "unset".to_string(),
        Value::String(s) => s.clone(),
        other => other.to_string(),
    }
}

fn change_text(gap: &GapEntry) -> String {
    let path = &gap.field_path;
    let proposed = describe(&gap.proposed_value);
    if !BaselineConfig::has_slot(path) {
        let field = path.leaf_key().unwrap_or("value");
        return format!(
            "Add a `{}` field to the configuration schema and read it in the engine, then \
             apply {} for {}.",
            field, proposed, path
        );
    }
    let new_element = gap.baseline_value.is_null()
        && element_path(path).is_some_and(|element| element.to_string() != path.to_string());
    if new_element {
        let list = path.root().unwrap_or("list");
        let name = path.element_name().unwrap_or("?");
        return format!(
            "Teach the engine to recognise the new {} entry `{}`; it currently evaluates only \
             the entries it was built with. Required value: {} = {}.",
            list, name, path, proposed
        );
    }
    format!(
        "Replace the hardcoded handling of {} ({}) with a read of the configured value, \
         then set it to {}.",
        path,
        describe(&gap.baseline_value),
        proposed
    )
}

fn risk_note(path: &FieldPath) -> &'static str {
    match path.root() {
        Some("ordinary_hours") => {
            "Changes the point at which hours become overtime; re-run overtime regression cases."
        }
        Some("pay_components") => {
            "Alters the rate applied to affected hours; compare pay results for shifts that \
             touch this component before and after."
        }
        Some("allowances") => {
            "Allowance totals and tax treatment change for eligible employees; verify payslip \
             output."
        }
        Some("award_variation") => {
            "Award-wide setting; every employee on this award is affected."
        }
        Some("shifts") => "Shift boundaries drive penalty selection; check shifts that cross the boundary.",
        _ => "Review the engine code reading this field.",
    }
}

/// Builds the patch plan from the code-required gaps.
pub fn build_patch_plan(award_id: &str, gaps: &GapReport) -> PatchPlan {
    let items = gaps
        .with_classification(GapClassification::CodeRequired)
        .map(|gap| PatchItem {
            field_path: gap.field_path.clone(),
            location_hint: location_hint(&gap.field_path),
            change: change_text(gap),
            risk_note: risk_note(&gap.field_path).to_string(),
            clause_ids: gap.clause_ids.clone(),
            references: Vec::new(),
        })
        .collect();
    PatchPlan {
        award_id: award_id.to_string(),
        items,
    }
}

/// Text used to look up references for a gap.
fn reference_query(gap: &GapEntry) -> String {
    format!(
        "{} {} {} {}",
        gap.field_path,
        gap.category,
        gap.rationale,
        describe(&gap.proposed_value)
    )
}

/// Fills each item's references with the `k` closest reference chunks
/// stored under `key`.
///
/// # Errors
///
/// Returns `SessionNotFound` if nothing is indexed under `key`, or the
/// embedder's error.
pub async fn attach_references(
    plan: &mut PatchPlan,
    gaps: &GapReport,
    index: &VectorIndex,
    key: &str,
    k: usize,
    embedder: &dyn Embedder,
) -> PipelineResult<()> {
    for item in &mut plan.items {
        let Some(gap) = gaps.entry_for(&item.field_path) else {
            continue;
        };
        let hits = index.query(key, &reference_query(gap), k, embedder).await?;
        item.references = hits
            .iter()
            .filter(|hit| hit.score > 0.0)
            .map(|hit| reference_label(&hit.chunk))
            .collect();
    }
    Ok(())
}

/// Renders the plan as markdown.
pub fn render_markdown(plan: &PatchPlan) -> String {
    let mut out = format!("# Patch plan for {}\n\n", plan.award_id);
    if plan.is_empty() {
        out.push_str(
            "No code changes required. Every gap can be closed through configuration.\n",
        );
        return out;
    }
    let _ = writeln!(
        out,
        "{} code change(s) required. These are suggestions for review and are never \
         applied automatically.\n",
        plan.items.len()
    );
    for (n, item) in plan.items.iter().enumerate() {
        let _ = writeln!(out, "## {}. `{}`\n", n + 1, item.field_path);
        let _ = writeln!(out, "- **Location:** {}", item.location_hint);
        let _ = writeln!(out, "- **Change:** {}", item.change);
        let _ = writeln!(out, "- **Risk:** {}", item.risk_note);
        if !item.references.is_empty() {
            let _ = writeln!(out, "- **References:** {}", item.references.join("; "));
        }
        let _ = writeln!(out, "- **Clauses:** {}\n", item.clause_ids.join(", "));
    }
    out
}
