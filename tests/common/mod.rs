//! Shared fixtures for the integration suite: scripted collaborators and
//! an orchestrator over a temporary session workspace.

#![allow(dead_code)]

use std::collections::HashMap;
use std::path::Path;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};

use async_trait::async_trait;
use rust_decimal::Decimal;
use serde_json::{Value, json};

use award_interpreter::config::ConfigLoader;
use award_interpreter::error::{PipelineError, PipelineResult};
use award_interpreter::ingestion::{DocumentReference, Fetcher};
use award_interpreter::llm::{Completion, CompletionRequest, LlmClient, Usage};
use award_interpreter::models::{BaselineConfig, ProcessOptions, RawDocument};
use award_interpreter::pipeline::{Collaborators, Orchestrator, PipelineContext, SessionStore};
use award_interpreter::retrieval::HashingEmbedder;

pub const AWARD_HTML: &str = include_str!("../fixtures/clerks_award.html");

/// Serves fixed markup for every reference.
pub struct StaticFetcher {
    pub content: String,
    pub calls: AtomicUsize,
}

impl StaticFetcher {
    pub fn new(content: &str) -> Self {
        Self {
            content: content.to_string(),
            calls: AtomicUsize::new(0),
        }
    }
}

#[async_trait]
impl Fetcher for StaticFetcher {
    async fn fetch(&self, reference: &DocumentReference) -> PipelineResult<RawDocument> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        Ok(RawDocument {
            award_id: reference.award_id(),
            source_url: reference.to_string(),
            content: self.content.clone(),
        })
    }
}

/// Answers by schema name from per-schema queues.
///
/// Category schemas default to an empty entry list once their queue is
/// drained. Every call costs `cost_per_call`.
pub struct ScriptedLlm {
    responses: Mutex<HashMap<String, Vec<PipelineResult<Value>>>>,
    cost_per_call: Decimal,
    calls: AtomicUsize,
    schemas: Mutex<Vec<String>>,
}

impl ScriptedLlm {
    pub fn new() -> Self {
        Self {
            responses: Mutex::new(HashMap::new()),
            cost_per_call: Decimal::ZERO,
            calls: AtomicUsize::new(0),
            schemas: Mutex::new(Vec::new()),
        }
    }

    pub fn with_cost(mut self, cost_per_call: Decimal) -> Self {
        self.cost_per_call = cost_per_call;
        self
    }

    pub fn respond(self, schema: &str, value: Value) -> Self {
        self.responses
            .lock()
            .unwrap()
            .entry(schema.to_string())
            .or_default()
            .push(Ok(value));
        self
    }

    pub fn fail(self, schema: &str, error: PipelineError) -> Self {
        self.responses
            .lock()
            .unwrap()
            .entry(schema.to_string())
            .or_default()
            .push(Err(error));
        self
    }

    pub fn calls(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }

    pub fn calls_for(&self, schema: &str) -> usize {
        self.schemas
            .lock()
            .unwrap()
            .iter()
            .filter(|s| s.as_str() == schema)
            .count()
    }
}

#[async_trait]
impl LlmClient for ScriptedLlm {
    async fn complete(&self, request: &CompletionRequest) -> PipelineResult<Completion> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        self.schemas
            .lock()
            .unwrap()
            .push(request.schema.name.clone());
        let next = {
            let mut responses = self.responses.lock().unwrap();
            let queue = responses.entry(request.schema.name.clone()).or_default();
            if queue.is_empty() {
                Ok(json!({"entries": []}))
            } else {
                queue.remove(0)
            }
        };
        let value = next?;
        Ok(Completion {
            value,
            usage: Usage::default(),
            cost: self.cost_per_call,
        })
    }

    fn model(&self) -> &str {
        "scripted"
    }
}

/// A model that fails every call with a provider error.
pub struct BrokenLlm;

#[async_trait]
impl LlmClient for BrokenLlm {
    async fn complete(&self, _request: &CompletionRequest) -> PipelineResult<Completion> {
        Err(PipelineError::provider("scripted", "HTTP 503 after retries"))
    }

    fn model(&self) -> &str {
        "broken"
    }
}

pub fn baseline() -> BaselineConfig {
    ConfigLoader::load_baseline(Path::new("./config/baseline.yaml")).unwrap()
}

/// The baseline with `ordinary_hours.standard` set to 36, as a document.
pub fn baseline_document_with_36_hours() -> Value {
    let mut document = baseline().to_document().unwrap();
    document["ordinary_hours"]["standard"] = json!("36");
    document
}

/// A single ordinary-hours entry stating 36 weekly hours.
pub fn ordinary_hours_36(confidence: f64) -> Value {
    json!({
        "entries": [{
            "rule": {"weekly_hours": 36},
            "confidence": confidence,
            "clause_ids": ["13.1"],
            "interpretations": [],
            "ambiguity_note": null
        }]
    })
}

pub fn orchestrator(
    dir: &Path,
    fetcher: Arc<dyn Fetcher>,
    llm: Arc<dyn LlmClient>,
) -> Orchestrator {
    let policy = ConfigLoader::load_policy(Path::new("./config/parametric_fields.yaml")).unwrap();
    Orchestrator::new(
        PipelineContext {
            baseline: Arc::new(baseline()),
            policy: Arc::new(policy),
            fetch_base_url: "https://awards.fairwork.gov.au".to_string(),
            chunk_max_chars: 1000,
            defaults: ProcessOptions::default(),
            engine_sources: Arc::new(Vec::new()),
        },
        Collaborators {
            fetcher,
            llm,
            embedder: Arc::new(HashingEmbedder::new(128)),
        },
        SessionStore::new(dir),
    )
}

pub fn options(generative: bool) -> ProcessOptions {
    ProcessOptions {
        use_generative_config: generative,
        ..ProcessOptions::default()
    }
}
