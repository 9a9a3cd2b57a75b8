//! Session models: state machine, options, stage log and cost ledger.

use std::collections::BTreeMap;
use std::fmt;

use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::error::{PipelineError, PipelineResult};

/// Pipeline states of a session.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SessionState {
    /// Created, nothing run yet.
    Created,
    /// Retrieving the document.
    Fetching,
    /// Splitting the document into clauses.
    Parsing,
    /// Cutting clauses into chunks.
    Chunking,
    /// Embedding chunks.
    Indexing,
    /// Extracting rules per category.
    Extracting,
    /// Suspended until every flagged ambiguity is resolved.
    AwaitingAmbiguityResolution,
    /// Diffing rules against the baseline.
    AnalyzingGaps,
    /// Producing the updated configuration.
    GeneratingConfig,
    /// Producing the patch plan.
    GeneratingPatchPlan,
    /// All artifacts written.
    Completed,
    /// Stopped on an unrecoverable error.
    Failed,
}

impl SessionState {
    /// The serialized name.
    pub fn as_str(&self) -> &'static str {
        match self {
            SessionState::Created => "created",
            SessionState::Fetching => "fetching",
            SessionState::Parsing => "parsing",
            SessionState::Chunking => "chunking",
            SessionState::Indexing => "indexing",
            SessionState::Extracting => "extracting",
            SessionState::AwaitingAmbiguityResolution => "awaiting_ambiguity_resolution",
            SessionState::AnalyzingGaps => "analyzing_gaps",
            SessionState::GeneratingConfig => "generating_config",
            SessionState::GeneratingPatchPlan => "generating_patch_plan",
            SessionState::Completed => "completed",
            SessionState::Failed => "failed",
        }
    }

    /// Returns true for states no transition leaves.
    pub fn is_terminal(&self) -> bool {
        matches!(self, SessionState::Completed | SessionState::Failed)
    }

    /// Returns true if the state machine allows moving to `next`.
    pub fn can_transition_to(&self, next: SessionState) -> bool {
        use SessionState::*;
        match (self, next) {
            (Completed | Failed, _) => false,
            (_, Failed) => true,
            (Created, Fetching)
            | (Fetching, Parsing)
            | (Parsing, Chunking)
            | (Chunking, Indexing)
            | (Indexing, Extracting)
            | (Extracting, AwaitingAmbiguityResolution)
            | (Extracting, AnalyzingGaps)
            | (AwaitingAmbiguityResolution, AnalyzingGaps)
            | (AnalyzingGaps, GeneratingConfig)
            | (GeneratingConfig, GeneratingPatchPlan)
            | (GeneratingPatchPlan, Completed) => true,
            _ => false,
        }
    }
}

impl fmt::Display for SessionState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Which configuration generator a session uses.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum GenerationStrategy {
    /// Mapping table.
    Deterministic,
    /// Model-guided with deterministic fallback.
    Generative,
}

/// Per-session options.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ProcessOptions {
    /// Use the generative configuration strategy.
    pub use_generative_config: bool,
    /// Chunks retrieved per category.
    pub retrieval_k: usize,
    /// Entries below this confidence are flagged.
    pub confidence_threshold: f64,
    /// Session cost ceiling in USD.
    pub cost_budget: Decimal,
}

impl ProcessOptions {
    /// The strategy these options select.
    pub fn strategy(&self) -> GenerationStrategy {
        if self.use_generative_config {
            GenerationStrategy::Generative
        } else {
            GenerationStrategy::Deterministic
        }
    }
}

impl Default for ProcessOptions {
    fn default() -> Self {
        Self {
            use_generative_config: false,
            retrieval_k: 5,
            confidence_threshold: 0.7,
            cost_budget: Decimal::new(200, 2),
        }
    }
}

/// Accumulated session cost.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct CostLedger {
    /// Total spent in USD.
    pub total: Decimal,
    /// Spend per stage.
    pub by_stage: BTreeMap<String, Decimal>,
}

impl CostLedger {
    /// Adds `amount` to the total and to `stage`.
    pub fn add(&mut self, stage: SessionState, amount: Decimal) {
        self.total += amount;
        *self
            .by_stage
            .entry(stage.as_str().to_string())
            .or_insert(Decimal::ZERO) += amount;
    }
}

/// One entry of the stage log.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct StageRecord {
    /// The stage.
    pub stage: SessionState,
    /// When the stage started.
    pub started_at: DateTime<Utc>,
    /// When the stage ended.
    pub finished_at: Option<DateTime<Utc>>,
}

/// Why a session failed.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FailureInfo {
    /// Stable reason code (e.g. `budget_exceeded`).
    pub reason_code: String,
    /// Error message.
    pub message: String,
    /// The stage that was running.
    pub stage: SessionState,
}

/// One pipeline run for one award.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Session {
    /// `sess-YYYYmmdd-HHMMSS-xxxxxx`.
    pub id: String,
    /// The document reference as given.
    pub document_reference: String,
    /// Award id once the document is fetched.
    pub award_id: Option<String>,
    /// Current state.
    pub state: SessionState,
    /// Options fixed at creation.
    pub options: ProcessOptions,
    /// Selected generator.
    pub strategy: GenerationStrategy,
    /// Creation time.
    pub created_at: DateTime<Utc>,
    /// Last transition time.
    pub updated_at: DateTime<Utc>,
    /// Stage log in order.
    pub stages: Vec<StageRecord>,
    /// Cost so far.
    pub cost: CostLedger,
    /// Set on failure.
    pub failure: Option<FailureInfo>,
    /// Names of artifacts written so far.
    pub artifacts: Vec<String>,
}

impl Session {
    /// Creates a session in the `created` state.
    pub fn new(document_reference: impl Into<String>, options: ProcessOptions) -> Self {
        let now = Utc::now();
        Self {
            id: new_session_id(now),
            document_reference: document_reference.into(),
            award_id: None,
            state: SessionState::Created,
            strategy: options.strategy(),
            options,
            created_at: now,
            updated_at: now,
            stages: Vec::new(),
            cost: CostLedger::default(),
            failure: None,
            artifacts: Vec::new(),
        }
    }

    /// Moves to `next`, closing the open stage record.
    pub fn transition(&mut self, next: SessionState) -> PipelineResult<()> {
        if !self.state.can_transition_to(next) {
            return Err(PipelineError::InvalidTransition {
                session_id: self.id.clone(),
                from: self.state.to_string(),
                to: next.to_string(),
            });
        }
        let now = Utc::now();
        if let Some(open) = self.stages.last_mut().filter(|s| s.finished_at.is_none()) {
            open.finished_at = Some(now);
        }
        if !next.is_terminal() {
            self.stages.push(StageRecord {
                stage: next,
                started_at: now,
                finished_at: None,
            });
        }
        self.state = next;
        self.updated_at = now;
        Ok(())
    }

    /// Moves to `failed`, recording the reason and the running stage.
    pub fn fail(&mut self, error: &PipelineError) -> PipelineResult<()> {
        let stage = self.state;
        self.transition(SessionState::Failed)?;
        self.failure = Some(FailureInfo {
            reason_code: error.reason_code().to_string(),
            message: error.to_string(),
            stage,
        });
        Ok(())
    }

    /// Records an artifact name once.
    pub fn record_artifact(&mut self, name: &str) {
        if !self.artifacts.iter().any(|a| a == name) {
            self.artifacts.push(name.to_string());
        }
    }
}

fn new_session_id(now: DateTime<Utc>) -> String {
    let suffix = Uuid::new_v4().simple().to_string();
    format!("sess-{}-{}", now.format("%Y%m%d-%H%M%S"), &suffix[..6])
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_session_id_format() {
        let session = Session::new("MA000002", ProcessOptions::default());
        let parts: Vec<&str> = session.id.split('-').collect();
        assert_eq!(parts.len(), 4);
        assert_eq!(parts[0], "sess");
        assert_eq!(parts[1].len(), 8);
        assert_eq!(parts[2].len(), 6);
        assert_eq!(parts[3].len(), 6);
    }

    #[test]
    fn test_happy_path_transitions() {
        let mut session = Session::new("MA000002", ProcessOptions::default());
        for next in [
            SessionState::Fetching,
            SessionState::Parsing,
            SessionState::Chunking,
            SessionState::Indexing,
            SessionState::Extracting,
            SessionState::AnalyzingGaps,
            SessionState::GeneratingConfig,
            SessionState::GeneratingPatchPlan,
            SessionState::Completed,
        ] {
            session.transition(next).unwrap();
        }
        assert_eq!(session.state, SessionState::Completed);
        assert_eq!(session.stages.len(), 8);
        assert!(session.stages.iter().all(|s| s.finished_at.is_some()));
    }

    #[test]
    fn test_skipping_a_stage_is_rejected() {
        let mut session = Session::new("MA000002", ProcessOptions::default());
        let err = session.transition(SessionState::Extracting).unwrap_err();
        assert_eq!(err.reason_code(), "invalid_transition");
        assert_eq!(session.state, SessionState::Created);
    }

    #[test]
    fn test_terminal_states_are_final() {
        let mut session = Session::new("MA000002", ProcessOptions::default());
        session.transition(SessionState::Fetching).unwrap();
        session
            .fail(&PipelineError::Fetch {
                reference: "MA000002".to_string(),
                message: "HTTP 404".to_string(),
            })
            .unwrap();
        assert_eq!(session.state, SessionState::Failed);
        let failure = session.failure.as_ref().unwrap();
        assert_eq!(failure.reason_code, "fetch_failed");
        assert_eq!(failure.stage, SessionState::Fetching);
        assert!(session.transition(SessionState::Parsing).is_err());
    }

    #[test]
    fn test_awaiting_resolution_can_resume_or_fail() {
        assert!(
            SessionState::AwaitingAmbiguityResolution
                .can_transition_to(SessionState::AnalyzingGaps)
        );
        assert!(SessionState::AwaitingAmbiguityResolution.can_transition_to(SessionState::Failed));
        assert!(
            !SessionState::AwaitingAmbiguityResolution
                .can_transition_to(SessionState::GeneratingConfig)
        );
    }

    #[test]
    fn test_cost_ledger_accumulates_per_stage() {
        let mut ledger = CostLedger::default();
        ledger.add(SessionState::Indexing, Decimal::new(2, 2));
        ledger.add(SessionState::Extracting, Decimal::new(30, 2));
        ledger.add(SessionState::Extracting, Decimal::new(15, 2));
        assert_eq!(ledger.total, Decimal::new(47, 2));
        assert_eq!(ledger.by_stage["extracting"], Decimal::new(45, 2));
    }

    #[test]
    fn test_strategy_from_options() {
        let options = ProcessOptions {
            use_generative_config: true,
            ..ProcessOptions::default()
        };
        assert_eq!(
            Session::new("x", options).strategy,
            GenerationStrategy::Generative
        );
    }
}
