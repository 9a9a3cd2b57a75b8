//! Configuration loading and management for the interpretation pipeline.
//!
//! This module loads the pipeline settings, the baseline payroll
//! configuration and the parametric field policy from YAML files.
//!
//! # Example
//!
//! ```no_run
//! use award_interpreter::config::ConfigLoader;
//!
//! let config = ConfigLoader::load("./config/settings.yaml").unwrap();
//! println!("Sessions stored under {}", config.settings().paths.sessions_dir.display());
//! ```

mod loader;
mod policy;
mod types;

pub use loader::ConfigLoader;
pub use policy::{ListPolicy, ParametricPolicy};
pub use types::{
    ChunkingSettings, EmbeddingProvider, EmbeddingSettings, FetchSettings, LlmSettings,
    PathSettings, RetrySettings, ServerSettings, Settings, api_key_from_env,
};
