//! Award interpretation pipeline.
//!
//! Turns a published award document into a structured rule specification,
//! diffs it against the payroll engine's baseline configuration, and
//! produces an updated configuration plus a plan for the code changes the
//! configuration cannot express.
//!
//! Stages run per session under [`pipeline::Orchestrator`]:
//! fetch, parse, chunk, index, extract, (resolve ambiguities), analyze gaps,
//! generate configuration and generate the patch plan.

#![warn(missing_docs)]

pub mod analysis;
pub mod api;
pub mod config;
pub mod error;
pub mod extraction;
pub mod generation;
pub mod ingestion;
pub mod llm;
pub mod models;
pub mod pipeline;
pub mod retrieval;
pub mod retry;
