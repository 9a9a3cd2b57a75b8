//! Filesystem session workspace.
//!
//! Each session owns one directory:
//!
//! ```text
//! <sessions_dir>/<session_id>/
//! ├── session.json              # rewritten on every transition
//! ├── raw_document.html
//! ├── clauses.json
//! ├── chunks.json
//! ├── extraction.json
//! ├── resolutions.json          # only after ambiguity resolution
//! ├── rule_specification.json
//! ├── gap_report.json
//! ├── generated_config.json
//! └── patch_plan.md
//! ```
//!
//! Artifacts are write-once. `session.json` is replaced atomically through a
//! temporary file.

use std::io::ErrorKind;
use std::path::{Path, PathBuf};

use serde::Serialize;
use serde::de::DeserializeOwned;
use tokio::fs;
use tokio::io::AsyncWriteExt;
use tracing::debug;

use crate::error::{PipelineError, PipelineResult};
use crate::models::Session;

const SESSION_FILE: &str = "session.json";

/// A stage output stored in the session workspace.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Artifact {
    /// The fetched markup.
    RawDocument,
    /// The parsed document.
    Clauses,
    /// Retrieval chunks.
    Chunks,
    /// Extraction output before resolution.
    Extraction,
    /// Caller decisions on ambiguities.
    Resolutions,
    /// The final rule specification.
    RuleSpecification,
    /// The gap report.
    GapReport,
    /// The generated configuration.
    GeneratedConfig,
    /// The patch plan in markdown.
    PatchPlan,
}

impl Artifact {
    /// Every artifact in pipeline order.
    pub const ALL: [Artifact; 9] = [
        Artifact::RawDocument,
        Artifact::Clauses,
        Artifact::Chunks,
        Artifact::Extraction,
        Artifact::Resolutions,
        Artifact::RuleSpecification,
        Artifact::GapReport,
        Artifact::GeneratedConfig,
        Artifact::PatchPlan,
    ];

    /// File name inside the session directory.
    pub fn file_name(&self) -> &'static str {
        match self {
            Artifact::RawDocument => "raw_document.html",
            Artifact::Clauses => "clauses.json",
            Artifact::Chunks => "chunks.json",
            Artifact::Extraction => "extraction.json",
            Artifact::Resolutions => "resolutions.json",
            Artifact::RuleSpecification => "rule_specification.json",
            Artifact::GapReport => "gap_report.json",
            Artifact::GeneratedConfig => "generated_config.json",
            Artifact::PatchPlan => "patch_plan.md",
        }
    }

    /// Looks an artifact up by file name, with or without extension.
    pub fn from_name(name: &str) -> Option<Self> {
        Self::ALL.into_iter().find(|a| {
            let file = a.file_name();
            file == name || file.split('.').next() == Some(name)
        })
    }

    /// MIME type served for the artifact.
    pub fn content_type(&self) -> &'static str {
        match self {
            Artifact::RawDocument => "text/html; charset=utf-8",
            Artifact::PatchPlan => "text/markdown; charset=utf-8",
            _ => "application/json",
        }
    }
}

fn valid_session_id(id: &str) -> bool {
    !id.is_empty()
        && id
            .chars()
            .all(|c| c.is_ascii_alphanumeric() || c == '-' || c == '_')
}

/// Session workspaces under one root directory.
#[derive(Debug, Clone)]
pub struct SessionStore {
    root: PathBuf,
}

impl SessionStore {
    /// Creates a store rooted at `root`. The directory is created lazily.
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self { root: root.into() }
    }

    /// The root directory.
    pub fn root(&self) -> &Path {
        &self.root
    }

    fn session_dir(&self, session_id: &str) -> PipelineResult<PathBuf> {
        if !valid_session_id(session_id) {
            return Err(PipelineError::SessionNotFound {
                session_id: session_id.to_string(),
            });
        }
        Ok(self.root.join(session_id))
    }

    /// Creates the workspace of a new session and writes `session.json`.
    pub async fn create(&self, session: &Session) -> PipelineResult<()> {
        let dir = self.session_dir(&session.id)?;
        fs::create_dir_all(&dir)
            .await
            .map_err(|e| PipelineError::storage(dir.display(), e.to_string()))?;
        self.save(session).await
    }

    /// Replaces `session.json`.
    pub async fn save(&self, session: &Session) -> PipelineResult<()> {
        let dir = self.session_dir(&session.id)?;
        let path = dir.join(SESSION_FILE);
        let tmp = dir.join(format!("{}.tmp", SESSION_FILE));
        let bytes = serde_json::to_vec_pretty(session)
            .map_err(|e| PipelineError::storage(path.display(), e.to_string()))?;
        fs::write(&tmp, bytes)
            .await
            .map_err(|e| PipelineError::storage(tmp.display(), e.to_string()))?;
        fs::rename(&tmp, &path)
            .await
            .map_err(|e| PipelineError::storage(path.display(), e.to_string()))?;
        debug!(session_id = %session.id, state = %session.state, "Session saved");
        Ok(())
    }

    /// Loads `session.json`.
    pub async fn load(&self, session_id: &str) -> PipelineResult<Session> {
        let path = self.session_dir(session_id)?.join(SESSION_FILE);
        let bytes = match fs::read(&path).await {
            Ok(bytes) => bytes,
            Err(e) if e.kind() == ErrorKind::NotFound => {
                return Err(PipelineError::SessionNotFound {
                    session_id: session_id.to_string(),
                });
            }
            Err(e) => return Err(PipelineError::storage(path.display(), e.to_string())),
        };
        serde_json::from_slice(&bytes)
            .map_err(|e| PipelineError::storage(path.display(), e.to_string()))
    }

    /// Ids of every stored session, sorted.
    pub async fn list(&self) -> PipelineResult<Vec<String>> {
        let mut entries = match fs::read_dir(&self.root).await {
            Ok(entries) => entries,
            Err(e) if e.kind() == ErrorKind::NotFound => return Ok(Vec::new()),
            Err(e) => return Err(PipelineError::storage(self.root.display(), e.to_string())),
        };
        let mut ids = Vec::new();
        while let Some(entry) = entries
            .next_entry()
            .await
            .map_err(|e| PipelineError::storage(self.root.display(), e.to_string()))?
        {
            let name = entry.file_name().to_string_lossy().into_owned();
            if fs::try_exists(entry.path().join(SESSION_FILE))
                .await
                .unwrap_or(false)
            {
                ids.push(name);
            }
        }
        ids.sort();
        Ok(ids)
    }

    /// Writes an artifact. Fails if it already exists.
    pub async fn write_artifact(
        &self,
        session_id: &str,
        artifact: Artifact,
        bytes: &[u8],
    ) -> PipelineResult<()> {
        let path = self.session_dir(session_id)?.join(artifact.file_name());
        let mut file = fs::OpenOptions::new()
            .write(true)
            .create_new(true)
            .open(&path)
            .await
            .map_err(|e| match e.kind() {
                ErrorKind::AlreadyExists => {
                    PipelineError::storage(path.display(), "artifact already written")
                }
                _ => PipelineError::storage(path.display(), e.to_string()),
            })?;
        file.write_all(bytes)
            .await
            .map_err(|e| PipelineError::storage(path.display(), e.to_string()))?;
        file.flush()
            .await
            .map_err(|e| PipelineError::storage(path.display(), e.to_string()))?;
        debug!(session_id, artifact = artifact.file_name(), bytes = bytes.len(), "Artifact written");
        Ok(())
    }

    /// Serializes and writes a JSON artifact.
    pub async fn write_json<T: Serialize>(
        &self,
        session_id: &str,
        artifact: Artifact,
        value: &T,
    ) -> PipelineResult<()> {
        let bytes = serde_json::to_vec_pretty(value)
            .map_err(|e| PipelineError::storage(artifact.file_name(), e.to_string()))?;
        self.write_artifact(session_id, artifact, &bytes).await
    }

    /// Reads an artifact; `None` if it has not been written.
    pub async fn read_artifact(
        &self,
        session_id: &str,
        artifact: Artifact,
    ) -> PipelineResult<Option<Vec<u8>>> {
        let path = self.session_dir(session_id)?.join(artifact.file_name());
        match fs::read(&path).await {
            Ok(bytes) => Ok(Some(bytes)),
            Err(e) if e.kind() == ErrorKind::NotFound => Ok(None),
            Err(e) => Err(PipelineError::storage(path.display(), e.to_string())),
        }
    }

    /// Reads and deserializes a JSON artifact that must exist.
    pub async fn read_json<T: DeserializeOwned>(
        &self,
        session_id: &str,
        artifact: Artifact,
    ) -> PipelineResult<T> {
        let bytes = self
            .read_artifact(session_id, artifact)
            .await?
            .ok_or_else(|| PipelineError::storage(artifact.file_name(), "artifact missing"))?;
        serde_json::from_slice(&bytes)
            .map_err(|e| PipelineError::storage(artifact.file_name(), e.to_string()))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::{ProcessOptions, SessionState};
    use serde_json::json;

    #[tokio::test]
    async fn test_session_round_trip() {
        let dir = tempfile::tempdir().unwrap();
        let store = SessionStore::new(dir.path());
        let mut session = Session::new("MA000002", ProcessOptions::default());
        store.create(&session).await.unwrap();
        session.transition(SessionState::Fetching).unwrap();
        store.save(&session).await.unwrap();

        let loaded = store.load(&session.id).await.unwrap();
        assert_eq!(loaded, session);
        assert_eq!(store.list().await.unwrap(), vec![session.id.clone()]);
    }

    #[tokio::test]
    async fn test_missing_session() {
        let dir = tempfile::tempdir().unwrap();
        let store = SessionStore::new(dir.path());
        let err = store.load("sess-20260101-000000-abcdef").await.unwrap_err();
        assert_eq!(err.reason_code(), "session_not_found");
        let err = store.load("../etc").await.unwrap_err();
        assert_eq!(err.reason_code(), "session_not_found");
        assert!(store.list().await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn test_artifacts_are_write_once() {
        let dir = tempfile::tempdir().unwrap();
        let store = SessionStore::new(dir.path());
        let session = Session::new("MA000002", ProcessOptions::default());
        store.create(&session).await.unwrap();

        store
            .write_json(&session.id, Artifact::GapReport, &json!({"entries": []}))
            .await
            .unwrap();
        let err = store
            .write_json(&session.id, Artifact::GapReport, &json!({"entries": [1]}))
            .await
            .unwrap_err();
        assert_eq!(err.reason_code(), "storage_error");

        let value: serde_json::Value = store
            .read_json(&session.id, Artifact::GapReport)
            .await
            .unwrap();
        assert_eq!(value, json!({"entries": []}));
        assert!(
            store
                .read_artifact(&session.id, Artifact::PatchPlan)
                .await
                .unwrap()
                .is_none()
        );
    }

    #[test]
    fn test_artifact_names() {
        assert_eq!(Artifact::from_name("patch_plan.md"), Some(Artifact::PatchPlan));
        assert_eq!(Artifact::from_name("gap_report"), Some(Artifact::GapReport));
        assert_eq!(Artifact::from_name("session.json"), None);
        assert_eq!(Artifact::GeneratedConfig.content_type(), "application/json");
    }
}
