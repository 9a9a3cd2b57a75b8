//! Request types for the pipeline API.

use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

use crate::models::{ProcessOptions, Resolution};

/// Request body for `POST /sessions`.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CreateSessionRequest {
    /// Award URL, local path or bare award code (e.g. "MA000002").
    pub reference: String,
    /// Overrides of the default options.
    #[serde(default)]
    pub options: OptionsRequest,
}

/// Partial [`ProcessOptions`]; unset fields take the server defaults.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct OptionsRequest {
    /// Use the generative configuration strategy.
    #[serde(default)]
    pub use_generative_config: Option<bool>,
    /// Chunks retrieved per category.
    #[serde(default)]
    pub retrieval_k: Option<usize>,
    /// Entries below this confidence are flagged.
    #[serde(default)]
    pub confidence_threshold: Option<f64>,
    /// Session cost ceiling in USD.
    #[serde(default)]
    pub cost_budget: Option<Decimal>,
}

impl OptionsRequest {
    /// Merges the overrides into `defaults` and validates the result.
    pub fn resolve(&self, defaults: &ProcessOptions) -> Result<ProcessOptions, String> {
        let options = ProcessOptions {
            use_generative_config: self
                .use_generative_config
                .unwrap_or(defaults.use_generative_config),
            retrieval_k: self.retrieval_k.unwrap_or(defaults.retrieval_k),
            confidence_threshold: self
                .confidence_threshold
                .unwrap_or(defaults.confidence_threshold),
            cost_budget: self.cost_budget.unwrap_or(defaults.cost_budget),
        };
        if options.retrieval_k == 0 {
            return Err("retrieval_k must be positive".to_string());
        }
        if !(0.0..=1.0).contains(&options.confidence_threshold) {
            return Err("confidence_threshold must be within [0, 1]".to_string());
        }
        if options.cost_budget < Decimal::ZERO {
            return Err("cost_budget must not be negative".to_string());
        }
        Ok(options)
    }
}

/// Request body for `POST /sessions/:id/resolutions`.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ResolutionsRequest {
    /// One decision per flagged ambiguity.
    pub resolutions: Vec<Resolution>,
}
