//! Error types for the award interpretation pipeline.
//!
//! This module provides strongly-typed errors using the `thiserror` crate
//! for every failure a pipeline stage can surface. Stage-local recoverable
//! conditions are retried in place; anything that escapes a stage boundary
//! is terminal for the session and recorded through [`PipelineError::reason_code`].

use rust_decimal::Decimal;
use thiserror::Error;

/// The main error type for the award interpretation pipeline.
///
/// # Example
///
/// ```
/// use award_interpreter::error::PipelineError;
///
/// let error = PipelineError::ConfigNotFound {
///     path: "/missing/settings.yaml".to_string(),
/// };
/// assert_eq!(error.to_string(), "Configuration file not found: /missing/settings.yaml");
/// ```
#[derive(Debug, Error)]
pub enum PipelineError {
    /// The award document could not be retrieved.
    #[error("Failed to fetch '{reference}': {message}")]
    Fetch {
        /// The document reference that was requested.
        reference: String,
        /// A description of the network or lookup failure.
        message: String,
    },

    /// The award document has a structure the parser cannot use.
    #[error("Failed to parse document: {message}")]
    Parse {
        /// A description of the structural problem.
        message: String,
    },

    /// A model response did not conform to the requested schema.
    #[error("Schema validation failed for {context}: {message}")]
    SchemaValidation {
        /// What was being validated (a rule category, the generated config).
        context: String,
        /// A description of the mismatch.
        message: String,
    },

    /// The LLM or embedding provider failed.
    #[error("Provider error from {provider}: {message}")]
    Provider {
        /// The provider or endpoint that failed.
        provider: String,
        /// A description of the failure.
        message: String,
    },

    /// Cumulative session cost went over the configured ceiling.
    #[error("Cost budget exceeded: spent ${spent} of ${ceiling}")]
    BudgetExceeded {
        /// Total spent so far.
        spent: Decimal,
        /// The configured ceiling.
        ceiling: Decimal,
    },

    /// Configuration file was not found at the specified path.
    #[error("Configuration file not found: {path}")]
    ConfigNotFound {
        /// The path that was not found.
        path: String,
    },

    /// Configuration file could not be parsed.
    #[error("Failed to parse configuration file '{path}': {message}")]
    ConfigParse {
        /// The path to the file that failed to parse.
        path: String,
        /// A description of the parse error.
        message: String,
    },

    /// Reading or writing the session workspace failed.
    #[error("Storage error at '{path}': {message}")]
    Storage {
        /// The file or directory involved.
        path: String,
        /// A description of the failure.
        message: String,
    },

    /// No session with the given id exists in the workspace.
    #[error("Session not found: {session_id}")]
    SessionNotFound {
        /// The requested session id.
        session_id: String,
    },

    /// A state transition that the session state machine does not allow.
    #[error("Invalid transition for session '{session_id}': {from} -> {to}")]
    InvalidTransition {
        /// The session id.
        session_id: String,
        /// The current state.
        from: String,
        /// The requested state.
        to: String,
    },

    /// Resume was requested while flagged ambiguities remain unresolved.
    #[error("{count} ambiguities still require resolution: {ids}")]
    UnresolvedAmbiguities {
        /// How many remain.
        count: usize,
        /// Comma separated ids of the remaining ambiguities.
        ids: String,
    },

    /// The session was aborted by the caller between stages.
    #[error("Session '{session_id}' was aborted")]
    Aborted {
        /// The aborted session id.
        session_id: String,
    },
}

/// A type alias for Results that return PipelineError.
pub type PipelineResult<T> = Result<T, PipelineError>;

impl PipelineError {
    /// Returns true when retrying the same call may succeed.
    ///
    /// Only network and provider failures are transient; everything else is
    /// either a data problem or a policy decision.
    pub fn is_retryable(&self) -> bool {
        matches!(self, Self::Fetch { .. } | Self::Provider { .. })
    }

    /// Stable reason code recorded on a failed session.
    pub fn reason_code(&self) -> &'static str {
        match self {
            Self::Fetch { .. } => "fetch_failed",
            Self::Parse { .. } => "parse_failed",
            Self::SchemaValidation { .. } => "schema_invalid",
            Self::Provider { .. } => "provider_failed",
            Self::BudgetExceeded { .. } => "budget_exceeded",
            Self::ConfigNotFound { .. } | Self::ConfigParse { .. } => "config_error",
            Self::Storage { .. } => "storage_error",
            Self::SessionNotFound { .. } => "session_not_found",
            Self::InvalidTransition { .. } => "invalid_transition",
            Self::UnresolvedAmbiguities { .. } => "unresolved_ambiguities",
            Self::Aborted { .. } => "aborted",
        }
    }

    /// Creates a schema validation error.
    pub fn schema(context: impl Into<String>, message: impl Into<String>) -> Self {
        Self::SchemaValidation {
            context: context.into(),
            message: message.into(),
        }
    }

    /// Creates a provider error.
    pub fn provider(provider: impl Into<String>, message: impl Into<String>) -> Self {
        Self::Provider {
            provider: provider.into(),
            message: message.into(),
        }
    }

    /// Creates a storage error for the given path.
    pub fn storage(path: impl std::fmt::Display, message: impl Into<String>) -> Self {
        Self::Storage {
            path: path.to_string(),
            message: message.into(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::str::FromStr;

    #[test]
    fn test_config_not_found_displays_path() {
        let error = PipelineError::ConfigNotFound {
            path: "/missing/file.yaml".to_string(),
        };
        assert_eq!(
            error.to_string(),
            "Configuration file not found: /missing/file.yaml"
        );
    }

    #[test]
    fn test_fetch_error_displays_reference_and_message() {
        let error = PipelineError::Fetch {
            reference: "https://awards.fairwork.gov.au/MA000028.html".to_string(),
            message: "HTTP 503".to_string(),
        };
        assert_eq!(
            error.to_string(),
            "Failed to fetch 'https://awards.fairwork.gov.au/MA000028.html': HTTP 503"
        );
    }

    #[test]
    fn test_budget_exceeded_displays_amounts() {
        let error = PipelineError::BudgetExceeded {
            spent: Decimal::from_str("0.52").unwrap(),
            ceiling: Decimal::from_str("0.50").unwrap(),
        };
        assert_eq!(
            error.to_string(),
            "Cost budget exceeded: spent $0.52 of $0.50"
        );
    }

    #[test]
    fn test_schema_validation_displays_context() {
        let error = PipelineError::schema("overtime", "missing field `factor`");
        assert_eq!(
            error.to_string(),
            "Schema validation failed for overtime: missing field `factor`"
        );
    }

    #[test]
    fn test_only_fetch_and_provider_are_retryable() {
        assert!(
            PipelineError::Fetch {
                reference: "x".to_string(),
                message: "timeout".to_string()
            }
            .is_retryable()
        );
        assert!(PipelineError::provider("openai", "502").is_retryable());
        assert!(!PipelineError::schema("allowances", "bad").is_retryable());
        assert!(
            !PipelineError::Parse {
                message: "empty".to_string()
            }
            .is_retryable()
        );
        assert!(
            !PipelineError::BudgetExceeded {
                spent: Decimal::ONE,
                ceiling: Decimal::ZERO
            }
            .is_retryable()
        );
    }

    #[test]
    fn test_reason_codes() {
        assert_eq!(
            PipelineError::BudgetExceeded {
                spent: Decimal::ONE,
                ceiling: Decimal::ZERO
            }
            .reason_code(),
            "budget_exceeded"
        );
        assert_eq!(
            PipelineError::Parse {
                message: "x".to_string()
            }
            .reason_code(),
            "parse_failed"
        );
        assert_eq!(
            PipelineError::Aborted {
                session_id: "s".to_string()
            }
            .reason_code(),
            "aborted"
        );
    }

    #[test]
    fn test_errors_implement_std_error() {
        fn assert_error<T: std::error::Error>() {}
        assert_error::<PipelineError>();
    }

    #[test]
    fn test_error_propagation_with_question_mark() {
        fn returns_parse_error() -> PipelineResult<()> {
            Err(PipelineError::Parse {
                message: "no clauses".to_string(),
            })
        }

        fn propagates_error() -> PipelineResult<()> {
            returns_parse_error()?;
            Ok(())
        }

        assert!(propagates_error().is_err());
    }
}
