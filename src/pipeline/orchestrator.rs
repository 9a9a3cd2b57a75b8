//! The session state machine.
//!
//! A session runs its stages in a fixed order. Each stage's output is
//! written to the session workspace before the next stage starts, and
//! `session.json` is rewritten on every transition. The run halts at
//! `awaiting_ambiguity_resolution` when extraction flags anything; it
//! continues only through [`Orchestrator::resume`].
//!
//! Any error that escapes a stage fails the session. Artifacts written up
//! to that point are kept.

use std::collections::HashSet;
use std::sync::{Arc, Mutex};

use tracing::{info, instrument, warn};

use crate::analysis::analyze;
use crate::config::{ConfigLoader, ParametricPolicy, api_key_from_env};
use crate::error::{PipelineError, PipelineResult};
use crate::extraction::{ExtractionRecord, ExtractionRequest, RuleExtractor};
use crate::generation::{attach_references, build_patch_plan, generator_for, render_markdown};
use crate::ingestion::{AwardParser, Chunker, DocumentReference, Fetcher, HttpFetcher, SourceFetcher};
use crate::llm::{Budget, LlmClient, MeteredLlm, OpenAiClient};
use crate::models::{
    GapReport, ParsedDocument, PatchPlan, PendingAmbiguity, ProcessOptions, Resolution,
    RuleSpecification, Session, SessionState, SharedBaseline,
};
use crate::retrieval::{
    MeteredEmbedder, ReferenceSource, SharedEmbedder, VectorIndex, embedder_from_settings,
    reference_chunks, reference_key,
};
use crate::retry::RetryPolicy;

use super::session_store::{Artifact, SessionStore};

/// External services the pipeline calls.
#[derive(Clone)]
pub struct Collaborators {
    /// Document fetcher.
    pub fetcher: Arc<dyn Fetcher>,
    /// Structured-output language model.
    pub llm: Arc<dyn LlmClient>,
    /// Chunk and query embedder.
    pub embedder: SharedEmbedder,
}

/// Process-wide reference data and stage settings.
#[derive(Debug, Clone)]
pub struct PipelineContext {
    /// The baseline configuration, read-only.
    pub baseline: SharedBaseline,
    /// The parametric field policy.
    pub policy: Arc<ParametricPolicy>,
    /// Base URL bare award codes resolve against.
    pub fetch_base_url: String,
    /// Maximum chunk text length.
    pub chunk_max_chars: usize,
    /// Options applied when a caller gives none.
    pub defaults: ProcessOptions,
    /// Engine source text searched alongside the baseline when locating
    /// code changes.
    pub engine_sources: Arc<Vec<ReferenceSource>>,
}

/// Reference locations attached to each patch plan item.
const REFERENCE_HITS: usize = 2;

/// Drives sessions through the pipeline.
pub struct Orchestrator {
    context: PipelineContext,
    collaborators: Collaborators,
    store: SessionStore,
    index: Arc<VectorIndex>,
    parser: AwardParser,
    chunker: Chunker,
    aborted: Mutex<HashSet<String>>,
    running: Mutex<HashSet<String>>,
}

/// Marks a session as running until dropped.
struct RunGuard<'a> {
    running: &'a Mutex<HashSet<String>>,
    session_id: String,
}

impl Drop for RunGuard<'_> {
    fn drop(&mut self) {
        let mut running = self.running.lock().unwrap_or_else(|e| e.into_inner());
        running.remove(&self.session_id);
    }
}

impl Orchestrator {
    /// Creates an orchestrator.
    pub fn new(context: PipelineContext, collaborators: Collaborators, store: SessionStore) -> Self {
        let chunker = Chunker::new(context.chunk_max_chars);
        Self {
            context,
            collaborators,
            store,
            index: Arc::new(VectorIndex::new()),
            parser: AwardParser,
            chunker,
            aborted: Mutex::new(HashSet::new()),
            running: Mutex::new(HashSet::new()),
        }
    }

    /// Builds the orchestrator with the HTTP fetcher, the OpenAI-compatible
    /// model client and the configured embedder.
    ///
    /// # Errors
    ///
    /// Fails with `Provider` when an API key environment variable is unset.
    pub fn from_config(config: &ConfigLoader) -> PipelineResult<Self> {
        let settings = config.settings();
        let retry = RetryPolicy::from(&settings.retry);
        let fetcher = SourceFetcher::new(HttpFetcher::new(&settings.fetch, retry.clone())?);
        let api_key = api_key_from_env(&settings.llm.api_key_env).ok_or_else(|| {
            PipelineError::provider(
                "openai",
                format!("environment variable {} is not set", settings.llm.api_key_env),
            )
        })?;
        let llm = OpenAiClient::new(&settings.llm, api_key, retry.clone())?;
        let embedder = embedder_from_settings(&settings.embedding, retry)?;

        let context = PipelineContext {
            baseline: config.baseline(),
            policy: config.policy(),
            fetch_base_url: settings.fetch.base_url.clone(),
            chunk_max_chars: settings.chunking.max_chars,
            defaults: settings.defaults.clone(),
            engine_sources: Arc::new(config.engine_sources().to_vec()),
        };
        let collaborators = Collaborators {
            fetcher: Arc::new(fetcher),
            llm: Arc::new(llm),
            embedder,
        };
        Ok(Self::new(
            context,
            collaborators,
            SessionStore::new(settings.paths.sessions_dir.clone()),
        ))
    }

    /// The default options.
    pub fn defaults(&self) -> &ProcessOptions {
        &self.context.defaults
    }

    /// The session workspace.
    pub fn store(&self) -> &SessionStore {
        &self.store
    }

    /// Creates and persists a session without running it.
    ///
    /// The reference is validated here so malformed input fails before a
    /// session exists.
    pub async fn create_session(
        &self,
        reference: &str,
        options: ProcessOptions,
    ) -> PipelineResult<Session> {
        DocumentReference::parse(reference, &self.context.fetch_base_url)?;
        let session = Session::new(reference.trim(), options);
        self.store.create(&session).await?;
        info!(
            session_id = %session.id,
            reference = %session.document_reference,
            strategy = ?session.strategy,
            "Session created"
        );
        Ok(session)
    }

    /// Creates a session and runs it until it completes, fails or waits for
    /// ambiguity resolution.
    pub async fn process(&self, reference: &str, options: ProcessOptions) -> PipelineResult<Session> {
        let session = self.create_session(reference, options).await?;
        self.run(&session.id).await
    }

    /// Runs a created session.
    ///
    /// Pipeline failures are recorded on the returned session; only storage
    /// and state errors are returned as `Err`.
    #[instrument(skip(self))]
    pub async fn run(&self, session_id: &str) -> PipelineResult<Session> {
        let mut session = self.store.load(session_id).await?;
        if session.state != SessionState::Created {
            return Err(PipelineError::InvalidTransition {
                session_id: session.id.clone(),
                from: session.state.to_string(),
                to: SessionState::Fetching.to_string(),
            });
        }
        let _guard = self.claim(&session.id)?;
        let budget = Arc::new(Budget::new(session.options.cost_budget, session.cost.clone()));

        let outcome = self.run_to_gate(&mut session, &budget).await;
        self.index.drop_session(&session.id).await;
        let outcome = match outcome {
            Ok(Some(spec)) => self.run_from_gate(&mut session, &spec, &budget).await,
            Ok(None) => Ok(()),
            Err(err) => Err(err),
        };
        self.settle(&mut session, &budget, outcome).await?;
        Ok(session)
    }

    /// Applies resolutions to a session waiting at the ambiguity gate and
    /// runs the remaining stages.
    ///
    /// # Errors
    ///
    /// - `InvalidTransition` if the session is not waiting for resolution
    /// - `SchemaValidation` if a resolution names an unknown ambiguity or
    ///   carries an invalid override
    /// - `UnresolvedAmbiguities` if anything is still pending afterwards;
    ///   the session keeps waiting
    #[instrument(skip(self, resolutions), fields(resolutions = resolutions.len()))]
    pub async fn resume(
        &self,
        session_id: &str,
        resolutions: Vec<Resolution>,
    ) -> PipelineResult<Session> {
        let mut session = self.store.load(session_id).await?;
        if session.state != SessionState::AwaitingAmbiguityResolution {
            return Err(PipelineError::InvalidTransition {
                session_id: session.id.clone(),
                from: session.state.to_string(),
                to: SessionState::AnalyzingGaps.to_string(),
            });
        }
        let _guard = self.claim(&session.id)?;

        let record: ExtractionRecord = self.store.read_json(&session.id, Artifact::Extraction).await?;
        let document: ParsedDocument = self.store.read_json(&session.id, Artifact::Clauses).await?;
        let spec = record
            .specification
            .apply_resolutions(&resolutions, &|id| document.has_clause(id))?;
        let remaining = spec.pending_ambiguities();
        if !remaining.is_empty() {
            let ids: Vec<&str> = remaining.iter().map(|p| p.id.as_str()).collect();
            warn!(session_id = %session.id, remaining = remaining.len(), "Resolutions incomplete");
            return Err(PipelineError::UnresolvedAmbiguities {
                count: remaining.len(),
                ids: ids.join(", "),
            });
        }

        let budget = Arc::new(Budget::new(session.options.cost_budget, session.cost.clone()));
        let outcome = async {
            self.store
                .write_json(&session.id, Artifact::Resolutions, &resolutions)
                .await?;
            session.record_artifact(Artifact::Resolutions.file_name());
            self.store
                .write_json(&session.id, Artifact::RuleSpecification, &spec)
                .await?;
            session.record_artifact(Artifact::RuleSpecification.file_name());
            info!(session_id = %session.id, "Ambiguities resolved, resuming");
            self.run_from_gate(&mut session, &spec, &budget).await
        }
        .await;
        self.settle(&mut session, &budget, outcome).await?;
        Ok(session)
    }

    /// Requests that a session stop.
    ///
    /// A session that is running stops at its next stage boundary. Any other
    /// unfinished session fails immediately; this covers sessions waiting at
    /// the ambiguity gate and sessions left mid-stage by a process that
    /// exited.
    pub async fn abort(&self, session_id: &str) -> PipelineResult<Session> {
        let idle = self.claim(session_id).ok();
        let mut session = self.store.load(session_id).await?;
        if session.state.is_terminal() {
            return Err(PipelineError::InvalidTransition {
                session_id: session.id.clone(),
                from: session.state.to_string(),
                to: SessionState::Failed.to_string(),
            });
        }
        match idle {
            Some(_guard) => {
                let stage = session.state;
                session.fail(&PipelineError::Aborted {
                    session_id: session.id.clone(),
                })?;
                self.store.save(&session).await?;
                info!(session_id = %session.id, stage = %stage, "Idle session aborted");
            }
            None => {
                self.aborted
                    .lock()
                    .unwrap_or_else(|e| e.into_inner())
                    .insert(session.id.clone());
                info!(session_id = %session.id, state = %session.state, "Abort requested");
            }
        }
        Ok(session)
    }

    /// Loads a session.
    pub async fn session(&self, session_id: &str) -> PipelineResult<Session> {
        self.store.load(session_id).await
    }

    /// Ambiguities awaiting a decision; empty unless the session is waiting
    /// at the gate.
    pub async fn ambiguities(&self, session_id: &str) -> PipelineResult<Vec<PendingAmbiguity>> {
        let session = self.store.load(session_id).await?;
        if session.state != SessionState::AwaitingAmbiguityResolution {
            return Ok(Vec::new());
        }
        let record: ExtractionRecord = self.store.read_json(session_id, Artifact::Extraction).await?;
        Ok(record.specification.pending_ambiguities())
    }

    /// Reads an artifact of a session; `None` if it has not been written.
    pub async fn artifact(
        &self,
        session_id: &str,
        artifact: Artifact,
    ) -> PipelineResult<Option<Vec<u8>>> {
        self.store.load(session_id).await?;
        self.store.read_artifact(session_id, artifact).await
    }

    fn claim(&self, session_id: &str) -> PipelineResult<RunGuard<'_>> {
        let mut running = self.running.lock().unwrap_or_else(|e| e.into_inner());
        if !running.insert(session_id.to_string()) {
            return Err(PipelineError::InvalidTransition {
                session_id: session_id.to_string(),
                from: "running".to_string(),
                to: "running".to_string(),
            });
        }
        Ok(RunGuard {
            running: &self.running,
            session_id: session_id.to_string(),
        })
    }

    fn take_abort(&self, session_id: &str) -> bool {
        self.aborted
            .lock()
            .unwrap_or_else(|e| e.into_inner())
            .remove(session_id)
    }

    /// Checks the abort flag, then moves to `next` and persists the session.
    async fn enter(
        &self,
        session: &mut Session,
        budget: &Budget,
        next: SessionState,
    ) -> PipelineResult<()> {
        if self.take_abort(&session.id) {
            return Err(PipelineError::Aborted {
                session_id: session.id.clone(),
            });
        }
        session.cost = budget.ledger();
        session.transition(next)?;
        self.store.save(session).await?;
        info!(session_id = %session.id, stage = %next, spent = %session.cost.total, "Stage started");
        Ok(())
    }

    async fn persist_json<T: serde::Serialize>(
        &self,
        session: &mut Session,
        artifact: Artifact,
        value: &T,
    ) -> PipelineResult<()> {
        self.store.write_json(&session.id, artifact, value).await?;
        session.record_artifact(artifact.file_name());
        Ok(())
    }

    /// Runs fetching through extraction. Returns the rule specification
    /// when nothing needs resolution, `None` when the session now waits.
    async fn run_to_gate(
        &self,
        session: &mut Session,
        budget: &Arc<Budget>,
    ) -> PipelineResult<Option<RuleSpecification>> {
        self.enter(session, budget, SessionState::Fetching).await?;
        let reference =
            DocumentReference::parse(&session.document_reference, &self.context.fetch_base_url)?;
        let raw = self.collaborators.fetcher.fetch(&reference).await?;
        session.award_id = Some(raw.award_id.clone());
        self.store
            .write_artifact(&session.id, Artifact::RawDocument, raw.content.as_bytes())
            .await?;
        session.record_artifact(Artifact::RawDocument.file_name());

        self.enter(session, budget, SessionState::Parsing).await?;
        let document = self.parser.parse(&raw.content)?;
        info!(session_id = %session.id, clauses = document.clauses.len(), award = %document.award_name, "Document parsed");
        self.persist_json(session, Artifact::Clauses, &document).await?;

        self.enter(session, budget, SessionState::Chunking).await?;
        let chunks = self.chunker.chunk(&document.clauses);
        self.persist_json(session, Artifact::Chunks, &chunks).await?;

        self.enter(session, budget, SessionState::Indexing).await?;
        let embedder = MeteredEmbedder::new(
            Arc::clone(&self.collaborators.embedder),
            Arc::clone(budget),
            SessionState::Indexing,
        );
        self.index.index(&session.id, &chunks, &embedder).await?;

        self.enter(session, budget, SessionState::Extracting).await?;
        let extractor = RuleExtractor::new(
            Arc::new(MeteredLlm::new(
                Arc::clone(&self.collaborators.llm),
                Arc::clone(budget),
                SessionState::Extracting,
            )),
            Arc::new(MeteredEmbedder::new(
                Arc::clone(&self.collaborators.embedder),
                Arc::clone(budget),
                SessionState::Extracting,
            )),
            Arc::clone(&self.index),
        );
        let award_id = raw.award_id.clone();
        let record = extractor
            .extract(ExtractionRequest {
                session_id: &session.id,
                award_id: &award_id,
                source_reference: &session.document_reference,
                document: &document,
                retrieval_k: session.options.retrieval_k,
                confidence_threshold: session.options.confidence_threshold,
            })
            .await?;
        self.persist_json(session, Artifact::Extraction, &record).await?;

        let pending = record.specification.pending_ambiguities();
        if !pending.is_empty() {
            self.enter(session, budget, SessionState::AwaitingAmbiguityResolution)
                .await?;
            info!(
                session_id = %session.id,
                pending = pending.len(),
                "Waiting for ambiguity resolution"
            );
            return Ok(None);
        }
        self.persist_json(session, Artifact::RuleSpecification, &record.specification)
            .await?;
        Ok(Some(record.specification))
    }

    /// Runs gap analysis through completion.
    async fn run_from_gate(
        &self,
        session: &mut Session,
        spec: &RuleSpecification,
        budget: &Arc<Budget>,
    ) -> PipelineResult<()> {
        let baseline = &self.context.baseline;

        self.enter(session, budget, SessionState::AnalyzingGaps).await?;
        let gaps = analyze(spec, baseline, &self.context.policy)?;
        info!(
            session_id = %session.id,
            config_only = gaps.summary.config_only,
            code_required = gaps.summary.code_required,
            unmapped = gaps.summary.unmapped,
            "Gap report ready"
        );
        self.persist_json(session, Artifact::GapReport, &gaps).await?;

        self.enter(session, budget, SessionState::GeneratingConfig).await?;
        let llm = Arc::new(MeteredLlm::new(
            Arc::clone(&self.collaborators.llm),
            Arc::clone(budget),
            SessionState::GeneratingConfig,
        ));
        let generator = generator_for(session.strategy, llm);
        let generated = generator.generate(spec, baseline, &gaps).await?;
        self.persist_json(session, Artifact::GeneratedConfig, &generated)
            .await?;

        self.enter(session, budget, SessionState::GeneratingPatchPlan).await?;
        let mut plan = build_patch_plan(&spec.award_id, &gaps);
        if !plan.is_empty() {
            let key = reference_key(&session.id);
            let located = self.locate(&key, &mut plan, &gaps, budget).await;
            self.index.drop_session(&key).await;
            located?;
        }
        self.store
            .write_artifact(&session.id, Artifact::PatchPlan, render_markdown(&plan).as_bytes())
            .await?;
        session.record_artifact(Artifact::PatchPlan.file_name());

        self.enter(session, budget, SessionState::Completed).await?;
        info!(session_id = %session.id, spent = %session.cost.total, "Session completed");
        Ok(())
    }

    /// Indexes the baseline and engine sources under `key` and attaches the
    /// closest entries to each plan item.
    async fn locate(
        &self,
        key: &str,
        plan: &mut PatchPlan,
        gaps: &GapReport,
        budget: &Arc<Budget>,
    ) -> PipelineResult<()> {
        let chunks = reference_chunks(
            &self.context.baseline,
            &self.context.engine_sources,
            self.context.chunk_max_chars,
        )?;
        let embedder = MeteredEmbedder::new(
            Arc::clone(&self.collaborators.embedder),
            Arc::clone(budget),
            SessionState::GeneratingPatchPlan,
        );
        self.index.index(key, &chunks, &embedder).await?;
        attach_references(plan, gaps, &self.index, key, REFERENCE_HITS, &embedder).await?;
        info!(
            items = plan.items.len(),
            references = chunks.len(),
            "Patch plan locations attached"
        );
        Ok(())
    }

    /// Records the outcome of a run on the session and persists it.
    async fn settle(
        &self,
        session: &mut Session,
        budget: &Budget,
        outcome: PipelineResult<()>,
    ) -> PipelineResult<()> {
        session.cost = budget.ledger();
        self.take_abort(&session.id);
        if let Err(err) = outcome {
            warn!(
                session_id = %session.id,
                stage = %session.state,
                reason = err.reason_code(),
                error = %err,
                "Session failed"
            );
            session.fail(&err)?;
        }
        self.store.save(session).await
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::RawDocument;
    use async_trait::async_trait;
    use std::sync::atomic::{AtomicUsize, Ordering};

    struct NotFound {
        calls: AtomicUsize,
    }

    #[async_trait]
    impl Fetcher for NotFound {
        async fn fetch(&self, reference: &DocumentReference) -> PipelineResult<RawDocument> {
            self.calls.fetch_add(1, Ordering::SeqCst);
            Err(PipelineError::Fetch {
                reference: reference.to_string(),
                message: "HTTP 404".to_string(),
            })
        }
    }

    struct NoModel;

    #[async_trait]
    impl LlmClient for NoModel {
        async fn complete(
            &self,
            _request: &crate::llm::CompletionRequest,
        ) -> PipelineResult<crate::llm::Completion> {
            Err(PipelineError::provider("test", "no model"))
        }

        fn model(&self) -> &str {
            "none"
        }
    }

    fn orchestrator(dir: &std::path::Path) -> Orchestrator {
        let baseline = serde_yaml::from_str(include_str!("../../config/baseline.yaml")).unwrap();
        let policy = serde_yaml::from_str(include_str!("../../config/parametric_fields.yaml")).unwrap();
        Orchestrator::new(
            PipelineContext {
                baseline: Arc::new(baseline),
                policy: Arc::new(policy),
                fetch_base_url: "https://awards.fairwork.gov.au".to_string(),
                chunk_max_chars: 1000,
                defaults: ProcessOptions::default(),
                engine_sources: Arc::new(Vec::new()),
            },
            Collaborators {
                fetcher: Arc::new(NotFound {
                    calls: AtomicUsize::new(0),
                }),
                llm: Arc::new(NoModel),
                embedder: Arc::new(crate::retrieval::HashingEmbedder::new(64)),
            },
            SessionStore::new(dir),
        )
    }

    #[tokio::test]
    async fn test_fetch_failure_fails_session() {
        let dir = tempfile::tempdir().unwrap();
        let orchestrator = orchestrator(dir.path());
        let session = orchestrator
            .process("MA000002", ProcessOptions::default())
            .await
            .unwrap();
        assert_eq!(session.state, SessionState::Failed);
        let failure = session.failure.unwrap();
        assert_eq!(failure.reason_code, "fetch_failed");
        assert_eq!(failure.stage, SessionState::Fetching);
        assert!(session.artifacts.is_empty());

        let stored = orchestrator.session(&session.id).await.unwrap();
        assert_eq!(stored.state, SessionState::Failed);
    }

    #[tokio::test]
    async fn test_invalid_reference_is_rejected_before_session_exists() {
        let dir = tempfile::tempdir().unwrap();
        let orchestrator = orchestrator(dir.path());
        let err = orchestrator
            .process("ftp://example.com/award", ProcessOptions::default())
            .await
            .unwrap_err();
        assert_eq!(err.reason_code(), "fetch_failed");
        assert!(orchestrator.store().list().await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn test_abort_before_run_fails_session() {
        let dir = tempfile::tempdir().unwrap();
        let orchestrator = orchestrator(dir.path());
        let session = orchestrator
            .create_session("MA000002", ProcessOptions::default())
            .await
            .unwrap();
        let aborted = orchestrator.abort(&session.id).await.unwrap();
        assert_eq!(aborted.state, SessionState::Failed);
        let failure = aborted.failure.unwrap();
        assert_eq!(failure.reason_code, "aborted");
        assert_eq!(failure.stage, SessionState::Created);

        let err = orchestrator.run(&session.id).await.unwrap_err();
        assert_eq!(err.reason_code(), "invalid_transition");
    }

    #[tokio::test]
    async fn test_abort_running_session_sets_flag() {
        let dir = tempfile::tempdir().unwrap();
        let orchestrator = orchestrator(dir.path());
        let session = orchestrator
            .create_session("MA000002", ProcessOptions::default())
            .await
            .unwrap();
        let guard = orchestrator.claim(&session.id).unwrap();
        let requested = orchestrator.abort(&session.id).await.unwrap();
        assert_eq!(requested.state, SessionState::Created);
        drop(guard);
        assert!(orchestrator.take_abort(&session.id));
    }

    #[tokio::test]
    async fn test_abort_interrupted_session() {
        let dir = tempfile::tempdir().unwrap();
        let orchestrator = orchestrator(dir.path());
        let mut session = orchestrator
            .create_session("MA000002", ProcessOptions::default())
            .await
            .unwrap();
        // A run that died during extraction leaves the session mid-stage.
        for next in [
            SessionState::Fetching,
            SessionState::Parsing,
            SessionState::Chunking,
            SessionState::Indexing,
            SessionState::Extracting,
        ] {
            session.transition(next).unwrap();
        }
        orchestrator.store().save(&session).await.unwrap();

        let aborted = orchestrator.abort(&session.id).await.unwrap();
        assert_eq!(aborted.state, SessionState::Failed);
        let failure = aborted.failure.unwrap();
        assert_eq!(failure.reason_code, "aborted");
        assert_eq!(failure.stage, SessionState::Extracting);

        let stored = orchestrator.session(&session.id).await.unwrap();
        assert_eq!(stored.state, SessionState::Failed);
        assert!(!orchestrator.take_abort(&session.id));
        assert!(orchestrator.abort(&session.id).await.is_err());
    }

    #[tokio::test]
    async fn test_resume_requires_waiting_session() {
        let dir = tempfile::tempdir().unwrap();
        let orchestrator = orchestrator(dir.path());
        let session = orchestrator
            .create_session("MA000002", ProcessOptions::default())
            .await
            .unwrap();
        let err = orchestrator.resume(&session.id, vec![]).await.unwrap_err();
        assert_eq!(err.reason_code(), "invalid_transition");
    }

    #[tokio::test]
    async fn test_finished_sessions_cannot_rerun() {
        let dir = tempfile::tempdir().unwrap();
        let orchestrator = orchestrator(dir.path());
        let session = orchestrator
            .process("MA000002", ProcessOptions::default())
            .await
            .unwrap();
        let err = orchestrator.run(&session.id).await.unwrap_err();
        assert_eq!(err.reason_code(), "invalid_transition");
        assert!(orchestrator.abort(&session.id).await.is_err());
    }
}
