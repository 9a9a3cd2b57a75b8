//! Per-category rule extraction.

use std::collections::HashMap;
use std::sync::Arc;

use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use tracing::{info, instrument, warn};

use crate::error::{PipelineError, PipelineResult};
use crate::llm::LlmClient;
use crate::models::{
    AllowanceRule, AmbiguityFlag, AmbiguityReason, BreakRule, CategoryRule, CategoryRules,
    OrdinaryHoursRule, OvertimeRule, ParsedDocument, PenaltyRateRule, PublicHolidayRule,
    RuleCategory, RuleEntry, RuleSpecification,
};
use crate::retrieval::{Embedder, VectorIndex};

use super::prompts;

#[derive(Debug, Deserialize)]
#[serde(deny_unknown_fields, bound(deserialize = "R: DeserializeOwned"))]
struct RawEntry<R> {
    rule: R,
    confidence: f64,
    clause_ids: Vec<String>,
    #[serde(default)]
    interpretations: Vec<String>,
    #[serde(default)]
    ambiguity_note: Option<String>,
}

#[derive(Debug, Deserialize)]
#[serde(deny_unknown_fields, bound(deserialize = "R: DeserializeOwned"))]
struct Envelope<R> {
    entries: Vec<RawEntry<R>>,
}

/// Chunks retrieved for one category.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CategoryRetrieval {
    /// The category.
    pub category: RuleCategory,
    /// The retrieval phrase.
    pub query: String,
    /// Retrieved chunk ids, most similar first.
    pub chunk_ids: Vec<String>,
    /// Model calls made for the category (1, or 2 after a corrective retry).
    pub attempts: u32,
}

/// The extraction stage output.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ExtractionRecord {
    /// The extracted specification, before any resolution.
    pub specification: RuleSpecification,
    /// What was retrieved per category.
    pub retrievals: Vec<CategoryRetrieval>,
}

/// Inputs shared by every category of one extraction run.
#[derive(Debug, Clone, Copy)]
pub struct ExtractionRequest<'a> {
    /// Session whose index is queried.
    pub session_id: &'a str,
    /// Award id.
    pub award_id: &'a str,
    /// The document reference as given.
    pub source_reference: &'a str,
    /// The parsed document, for award name and provenance checks.
    pub document: &'a ParsedDocument,
    /// Chunks retrieved per category.
    pub retrieval_k: usize,
    /// Entries below this confidence are flagged.
    pub confidence_threshold: f64,
}

/// Extracts a [`RuleSpecification`] from an indexed document.
pub struct RuleExtractor {
    llm: Arc<dyn LlmClient>,
    embedder: Arc<dyn Embedder>,
    index: Arc<VectorIndex>,
}

impl RuleExtractor {
    /// Creates an extractor.
    pub fn new(llm: Arc<dyn LlmClient>, embedder: Arc<dyn Embedder>, index: Arc<VectorIndex>) -> Self {
        Self {
            llm,
            embedder,
            index,
        }
    }

    /// Runs all six categories concurrently.
    ///
    /// A category whose output fails validation twice becomes an unresolved
    /// ambiguity. Provider, budget and retrieval failures abort the run.
    #[instrument(skip_all, fields(session_id = %request.session_id, award_id = %request.award_id))]
    pub async fn extract(&self, request: ExtractionRequest<'_>) -> PipelineResult<ExtractionRecord> {
        let (ordinary_hours, overtime, penalty_rates, allowances, break_rules, public_holidays) = tokio::join!(
            self.extract_category::<OrdinaryHoursRule>(request),
            self.extract_category::<OvertimeRule>(request),
            self.extract_category::<PenaltyRateRule>(request),
            self.extract_category::<AllowanceRule>(request),
            self.extract_category::<BreakRule>(request),
            self.extract_category::<PublicHolidayRule>(request),
        );

        let mut specification = RuleSpecification::new(
            request.award_id,
            request.document.award_name.clone(),
            request.source_reference,
        );
        let mut retrievals = Vec::with_capacity(RuleCategory::ALL.len());

        let (rules, retrieval) = ordinary_hours?;
        specification.ordinary_hours = rules;
        retrievals.push(retrieval);
        let (rules, retrieval) = overtime?;
        specification.overtime = rules;
        retrievals.push(retrieval);
        let (rules, retrieval) = penalty_rates?;
        specification.penalty_rates = rules;
        retrievals.push(retrieval);
        let (rules, retrieval) = allowances?;
        specification.allowances = rules;
        retrievals.push(retrieval);
        let (rules, retrieval) = break_rules?;
        specification.break_rules = rules;
        retrievals.push(retrieval);
        let (rules, retrieval) = public_holidays?;
        specification.public_holidays = rules;
        retrievals.push(retrieval);

        info!(
            entries = specification.entry_count(),
            pending = specification.pending_ambiguities().len(),
            "Extraction finished"
        );
        Ok(ExtractionRecord {
            specification,
            retrievals,
        })
    }

    async fn extract_category<R: CategoryRule>(
        &self,
        request: ExtractionRequest<'_>,
    ) -> PipelineResult<(CategoryRules<R>, CategoryRetrieval)> {
        let category = R::CATEGORY;
        let query = prompts::query_for(category);
        let chunks = self
            .index
            .query(request.session_id, query, request.retrieval_k, self.embedder.as_ref())
            .await?;
        let mut retrieval = CategoryRetrieval {
            category,
            query: query.to_string(),
            chunk_ids: chunks.iter().map(|c| c.chunk.id.clone()).collect(),
            attempts: 0,
        };

        let initial = prompts::extraction_request::<R>(&request.document.award_name, &chunks);
        let mut completion_request = initial.clone();
        let mut problem = String::new();
        for attempt in 1..=2u32 {
            retrieval.attempts = attempt;
            let outcome = match self.llm.complete(&completion_request).await {
                Ok(completion) => parse_entries::<R>(completion.value, request.document),
                Err(PipelineError::SchemaValidation { message, .. }) => Err(message),
                Err(other) => return Err(other),
            };
            match outcome {
                Ok(raw) => {
                    let rules = build_entries(raw, request.confidence_threshold);
                    info!(
                        category = %category,
                        entries = rules.entries.len(),
                        flagged = rules.entries.iter().filter(|e| e.is_pending()).count(),
                        "Category extracted"
                    );
                    return Ok((rules, retrieval));
                }
                Err(message) => {
                    warn!(category = %category, attempt, error = %message, "Extraction output rejected");
                    completion_request = prompts::with_correction(&initial, &message);
                    problem = message;
                }
            }
        }

        Ok((
            CategoryRules::unresolved(format!(
                "no valid {} output after a corrective retry: {}",
                category, problem
            )),
            retrieval,
        ))
    }
}

fn normalize_clause_id(id: &str) -> String {
    let trimmed = id.trim();
    trimmed
        .strip_prefix("Clause ")
        .or_else(|| trimmed.strip_prefix("clause "))
        .unwrap_or(trimmed)
        .trim_end_matches('.')
        .to_string()
}

/// Validates model output for one category: structure, domain checks and
/// provenance. Unknown clause ids are dropped; an entry left with none is
/// invalid.
fn parse_entries<R: CategoryRule>(
    value: Value,
    document: &ParsedDocument,
) -> Result<Vec<RawEntry<R>>, String> {
    let envelope: Envelope<R> = serde_json::from_value(value).map_err(|e| e.to_string())?;
    let mut entries = Vec::with_capacity(envelope.entries.len());
    for (i, mut entry) in envelope.entries.into_iter().enumerate() {
        if !(0.0..=1.0).contains(&entry.confidence) {
            return Err(format!(
                "entry {}: confidence {} outside [0, 1]",
                i + 1,
                entry.confidence
            ));
        }
        entry
            .rule
            .validate()
            .map_err(|e| format!("entry {}: {}", i + 1, e))?;
        let cited = std::mem::take(&mut entry.clause_ids);
        for id in cited.iter().map(|id| normalize_clause_id(id)) {
            if document.has_clause(&id) && !entry.clause_ids.contains(&id) {
                entry.clause_ids.push(id);
            }
        }
        if entry.clause_ids.is_empty() {
            return Err(format!(
                "entry {}: none of the cited clauses {:?} exist in the document",
                i + 1,
                cited
            ));
        }
        entries.push(entry);
    }
    Ok(entries)
}

/// Assigns ids, merges exact duplicates and applies the ambiguity policy.
fn build_entries<R: CategoryRule>(raw: Vec<RawEntry<R>>, threshold: f64) -> CategoryRules<R> {
    let mut kept: Vec<RawEntry<R>> = Vec::with_capacity(raw.len());
    for entry in raw {
        if let Some(same) = kept.iter_mut().find(|k| k.rule == entry.rule) {
            for id in entry.clause_ids {
                if !same.clause_ids.contains(&id) {
                    same.clause_ids.push(id);
                }
            }
            same.confidence = same.confidence.min(entry.confidence);
            same.interpretations.extend(entry.interpretations);
            same.ambiguity_note = same.ambiguity_note.take().or(entry.ambiguity_note);
            continue;
        }
        kept.push(entry);
    }

    let mut by_key: HashMap<String, usize> = HashMap::new();
    for entry in &kept {
        *by_key.entry(entry.rule.key()).or_default() += 1;
    }

    let entries = kept
        .into_iter()
        .enumerate()
        .map(|(i, entry)| {
            let mut reasons = Vec::new();
            let mut notes = Vec::new();
            if entry.confidence < threshold {
                reasons.push(AmbiguityReason::LowConfidence);
                notes.push(format!(
                    "confidence {:.2} is below the threshold {:.2}",
                    entry.confidence, threshold
                ));
            }
            let note = entry.ambiguity_note.filter(|n| !n.trim().is_empty());
            if entry.interpretations.len() > 1 || note.is_some() {
                reasons.push(AmbiguityReason::MultipleInterpretations);
                notes.push(note.unwrap_or_else(|| {
                    format!("{} plausible interpretations", entry.interpretations.len())
                }));
            }
            let key = entry.rule.key();
            if by_key.get(&key).copied().unwrap_or_default() > 1 {
                reasons.push(AmbiguityReason::Contradiction);
                notes.push(format!("another entry for '{}' disagrees", key));
            }

            RuleEntry {
                id: format!("{}-{}", R::CATEGORY, i + 1),
                rule: entry.rule,
                confidence: entry.confidence,
                clause_ids: entry.clause_ids,
                ambiguity: (!reasons.is_empty()).then(|| AmbiguityFlag {
                    reasons,
                    explanation: notes.join("; "),
                    interpretations: entry.interpretations,
                    resolved_by: None,
                }),
            }
        })
        .collect();

    CategoryRules {
        entries,
        unresolved: None,
    }
}
