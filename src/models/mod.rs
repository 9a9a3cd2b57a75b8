//! Core data models for the award interpretation pipeline.
//!
//! This module contains the documents, rule specifications, configuration
//! schema, reports and session records that flow between stages.

mod baseline;
mod document;
pub mod field_path;
mod gap;
mod generated_config;
mod patch_plan;
mod rule_spec;
mod session;

pub use baseline::{
    AllowanceDefinition, AwardVariation, BaselineConfig, OrdinaryHoursSettings, PayComponent,
    SharedBaseline, ShiftDefinition,
};
pub use document::{Chunk, Clause, ParsedDocument, RawDocument};
pub use field_path::{FieldPath, Segment, values_equal};
pub use gap::{GapClassification, GapEntry, GapReport, GapSummary, UnmappedField};
pub use generated_config::{GeneratedConfig, SkippedField};
pub use patch_plan::{PatchItem, PatchPlan};
pub use rule_spec::{
    AllowanceKind, AllowanceRule, AmbiguityFlag, AmbiguityReason, BreakRule, CategoryRule,
    CategoryRules, Decision, OrdinaryHoursRule, OvertimeRule, OvertimeTrigger, PendingAmbiguity,
    PenaltyDay, PenaltyRateRule, PhRule, PublicHolidayRule, Resolution, RuleCategory, RuleEntry,
    RuleSpecification, UnresolvedCategory,
};
pub use session::{
    CostLedger, FailureInfo, GenerationStrategy, ProcessOptions, Session, SessionState,
    StageRecord,
};
