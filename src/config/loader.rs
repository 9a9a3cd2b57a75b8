//! Configuration loading functionality.
//!
//! This module provides the [`ConfigLoader`] type for loading the settings,
//! the baseline configuration and the parametric field policy from YAML.

use std::fs;
use std::path::{Path, PathBuf};
use std::sync::Arc;

use tracing::info;

use crate::error::{PipelineError, PipelineResult};
use crate::models::{BaselineConfig, SharedBaseline};
use crate::retrieval::ReferenceSource;

use super::policy::ParametricPolicy;
use super::types::Settings;

/// Loads and provides access to process-wide configuration.
///
/// The baseline and policy are loaded once and shared read-only for the
/// lifetime of the process.
///
/// # Directory Structure
///
/// ```text
/// config/
/// ├── settings.yaml           # Endpoints, retry, chunking, defaults
/// ├── baseline.yaml           # The existing payroll engine configuration
/// └── parametric_fields.yaml  # Which fields are data vs hardcoded
/// ```
///
/// # Example
///
/// ```no_run
/// use award_interpreter::config::ConfigLoader;
///
/// let loader = ConfigLoader::load("./config/settings.yaml")?;
/// println!("Baseline award: {}", loader.baseline().award_variation.name);
/// # Ok::<(), award_interpreter::error::PipelineError>(())
/// ```
#[derive(Debug, Clone)]
pub struct ConfigLoader {
    settings: Settings,
    baseline: SharedBaseline,
    policy: Arc<ParametricPolicy>,
    engine_sources: Vec<ReferenceSource>,
}

impl ConfigLoader {
    /// Loads the settings file and the files it points to.
    ///
    /// # Returns
    ///
    /// Returns a `ConfigLoader` on success, or an error if:
    /// - Any file is missing (`ConfigNotFound`)
    /// - Any file contains invalid YAML or fails validation (`ConfigParse`)
    pub fn load<P: AsRef<Path>>(settings_path: P) -> PipelineResult<Self> {
        let settings_path = settings_path.as_ref();
        let mut settings = Self::load_yaml::<Settings>(settings_path)?;
        settings
            .validate()
            .map_err(|message| PipelineError::ConfigParse {
                path: settings_path.display().to_string(),
                message,
            })?;

        let base_dir = settings_path.parent().unwrap_or_else(|| Path::new("."));
        settings.paths.sessions_dir = resolve(base_dir, &settings.paths.sessions_dir);
        settings.paths.baseline = resolve(base_dir, &settings.paths.baseline);
        settings.paths.parametric_fields = resolve(base_dir, &settings.paths.parametric_fields);
        for source in &mut settings.paths.engine_sources {
            *source = resolve(base_dir, source);
        }

        let baseline = Self::load_baseline(&settings.paths.baseline)?;
        let policy = Self::load_policy(&settings.paths.parametric_fields)?;
        let engine_sources = settings
            .paths
            .engine_sources
            .iter()
            .map(|path| ReferenceSource::load(path))
            .collect::<PipelineResult<Vec<_>>>()?;

        info!(
            baseline = %settings.paths.baseline.display(),
            pay_components = baseline.pay_components.len(),
            parametric_patterns = policy.parametric.len(),
            engine_sources = engine_sources.len(),
            "Configuration loaded"
        );

        Ok(Self {
            settings,
            baseline: Arc::new(baseline),
            policy: Arc::new(policy),
            engine_sources,
        })
    }

    /// Loads a baseline configuration file.
    pub fn load_baseline(path: &Path) -> PipelineResult<BaselineConfig> {
        Self::load_yaml(path)
    }

    /// Loads a parametric field policy file.
    pub fn load_policy(path: &Path) -> PipelineResult<ParametricPolicy> {
        Self::load_yaml(path)
    }

    /// Loads and parses a YAML file.
    pub fn load_yaml<T: serde::de::DeserializeOwned>(path: &Path) -> PipelineResult<T> {
        let path_str = path.display().to_string();

        let content = fs::read_to_string(path).map_err(|_| PipelineError::ConfigNotFound {
            path: path_str.clone(),
        })?;

        serde_yaml::from_str(&content).map_err(|e| PipelineError::ConfigParse {
            path: path_str,
            message: e.to_string(),
        })
    }

    /// Returns the settings.
    pub fn settings(&self) -> &Settings {
        &self.settings
    }

    /// Returns the shared baseline.
    pub fn baseline(&self) -> SharedBaseline {
        Arc::clone(&self.baseline)
    }

    /// Returns the shared policy.
    pub fn policy(&self) -> Arc<ParametricPolicy> {
        Arc::clone(&self.policy)
    }

    /// Returns the engine source files named in the settings.
    pub fn engine_sources(&self) -> &[ReferenceSource] {
        &self.engine_sources
    }
}

fn resolve(base: &Path, path: &Path) -> PathBuf {
    if path.is_absolute() {
        path.to_path_buf()
    } else {
        base.join(path)
    }
}
