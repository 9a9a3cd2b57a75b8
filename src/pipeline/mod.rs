//! Session orchestration and the session workspace.

mod orchestrator;
mod session_store;

pub use orchestrator::{Collaborators, Orchestrator, PipelineContext};
pub use session_store::{Artifact, SessionStore};
