//! Session cost budget.

use std::sync::{Arc, Mutex};

use async_trait::async_trait;
use rust_decimal::Decimal;
use tracing::{debug, warn};

use crate::error::{PipelineError, PipelineResult};
use crate::models::{CostLedger, SessionState};

use super::{Completion, CompletionRequest, LlmClient};

/// Cumulative cost of a session checked against a ceiling.
///
/// Charges are additive. Once the total exceeds the ceiling every further
/// check fails with `BudgetExceeded`, so no further paid call is issued.
#[derive(Debug)]
pub struct Budget {
    ceiling: Decimal,
    ledger: Mutex<CostLedger>,
}

impl Budget {
    /// Creates a budget, seeded with what the session has already spent.
    pub fn new(ceiling: Decimal, spent: CostLedger) -> Self {
        Self {
            ceiling,
            ledger: Mutex::new(spent),
        }
    }

    fn with_ledger<T>(&self, f: impl FnOnce(&mut CostLedger) -> T) -> T {
        let mut guard = self.ledger.lock().unwrap_or_else(|e| e.into_inner());
        f(&mut guard)
    }

    /// The configured ceiling.
    pub fn ceiling(&self) -> Decimal {
        self.ceiling
    }

    /// Total spent so far.
    pub fn spent(&self) -> Decimal {
        self.with_ledger(|l| l.total)
    }

    /// A snapshot of the ledger.
    pub fn ledger(&self) -> CostLedger {
        self.with_ledger(|l| l.clone())
    }

    /// Fails if the ceiling has been exceeded.
    pub fn ensure_available(&self) -> PipelineResult<()> {
        let spent = self.spent();
        if spent > self.ceiling {
            return Err(PipelineError::BudgetExceeded {
                spent,
                ceiling: self.ceiling,
            });
        }
        Ok(())
    }

    /// Records a cost against `stage`, then checks the ceiling.
    pub fn charge(&self, stage: SessionState, amount: Decimal) -> PipelineResult<()> {
        let total = self.with_ledger(|l| {
            l.add(stage, amount);
            l.total
        });
        debug!(stage = %stage, cost = %amount, total = %total, "Charged session budget");
        if total > self.ceiling {
            warn!(spent = %total, ceiling = %self.ceiling, "Session budget exceeded");
        }
        self.ensure_available()
    }
}

/// An [`LlmClient`] that checks the budget before each call and charges it
/// after.
pub struct MeteredLlm {
    inner: Arc<dyn LlmClient>,
    budget: Arc<Budget>,
    stage: SessionState,
}

impl MeteredLlm {
    /// Wraps `inner`, charging costs to `stage`.
    pub fn new(inner: Arc<dyn LlmClient>, budget: Arc<Budget>, stage: SessionState) -> Self {
        Self {
            inner,
            budget,
            stage,
        }
    }
}

#[async_trait]
impl LlmClient for MeteredLlm {
    async fn complete(&self, request: &CompletionRequest) -> PipelineResult<Completion> {
        self.budget.ensure_available()?;
        let completion = self.inner.complete(request).await?;
        self.budget.charge(self.stage, completion.cost)?;
        Ok(completion)
    }

    fn model(&self) -> &str {
        self.inner.model()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::llm::{OutputSchema, Usage};
    use serde_json::json;
    use std::sync::atomic::{AtomicUsize, Ordering};

    struct FixedCost {
        cost: Decimal,
        calls: AtomicUsize,
    }

    #[async_trait]
    impl LlmClient for FixedCost {
        async fn complete(&self, _request: &CompletionRequest) -> PipelineResult<Completion> {
            self.calls.fetch_add(1, Ordering::SeqCst);
            Ok(Completion {
                value: json!({}),
                usage: Usage::default(),
                cost: self.cost,
            })
        }

        fn model(&self) -> &str {
            "fixed"
        }
    }

    fn request() -> CompletionRequest {
        CompletionRequest {
            system: String::new(),
            prompt: String::new(),
            schema: OutputSchema {
                name: "x".to_string(),
                schema: json!({}),
            },
        }
    }

    #[tokio::test]
    async fn test_budget_stops_calls_once_exceeded() {
        let inner = Arc::new(FixedCost {
            cost: Decimal::new(30, 2),
            calls: AtomicUsize::new(0),
        });
        let budget = Arc::new(Budget::new(Decimal::new(50, 2), CostLedger::default()));
        let metered = MeteredLlm::new(inner.clone(), budget.clone(), SessionState::Extracting);

        assert!(metered.complete(&request()).await.is_ok());
        let err = metered.complete(&request()).await.unwrap_err();
        assert_eq!(err.reason_code(), "budget_exceeded");
        let err = metered.complete(&request()).await.unwrap_err();
        assert_eq!(err.reason_code(), "budget_exceeded");

        // the third call never reached the provider
        assert_eq!(inner.calls.load(Ordering::SeqCst), 2);
        assert_eq!(budget.spent(), Decimal::new(60, 2));
        assert_eq!(budget.ledger().by_stage["extracting"], Decimal::new(60, 2));
    }

    #[test]
    fn test_spending_exactly_the_ceiling_is_allowed() {
        let budget = Budget::new(Decimal::new(50, 2), CostLedger::default());
        assert!(budget.charge(SessionState::Indexing, Decimal::new(50, 2)).is_ok());
        assert!(budget.charge(SessionState::Indexing, Decimal::new(1, 2)).is_err());
    }

    #[test]
    fn test_seeded_ledger_counts() {
        let mut spent = CostLedger::default();
        spent.add(SessionState::Extracting, Decimal::new(70, 2));
        let budget = Budget::new(Decimal::new(50, 2), spent);
        assert!(budget.ensure_available().is_err());
    }
}
