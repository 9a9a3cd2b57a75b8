//! LLM-backed rule extraction.
//!
//! For each rule category the extractor retrieves the most relevant chunks,
//! asks the model for entries matching the category schema and treats the
//! typed deserialisation plus domain checks as a strict validation boundary.
//! Output that fails twice is never guessed at: the category is marked as an
//! unresolved ambiguity instead.

mod extractor;
pub mod prompts;

pub use extractor::{CategoryRetrieval, ExtractionRecord, ExtractionRequest, RuleExtractor};
