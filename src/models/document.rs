//! Document models: raw content, parsed clauses and retrieval chunks.
//!
//! Clauses are produced by the parser and never mutated afterwards. Chunks
//! are derived from clauses by the chunker and carry enough hierarchy
//! context to be read without the original document.

use serde::{Deserialize, Serialize};

/// Raw document content as returned by a fetcher.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RawDocument {
    /// The award identifier derived from the reference (e.g. "MA000028").
    pub award_id: String,
    /// The resolved location the content was read from.
    pub source_url: String,
    /// The raw markup.
    pub content: String,
}

/// A numbered section of an award document.
///
/// # Example
///
/// ```
/// use award_interpreter::models::Clause;
///
/// let clause = Clause {
///     id: "22.1".to_string(),
///     hierarchy: vec!["22 Ordinary hours of work".to_string()],
///     heading: "Ordinary hours".to_string(),
///     body: "The ordinary hours of work are 38 per week.".to_string(),
/// };
/// assert_eq!(clause.top_level_section(), Some("22 Ordinary hours of work"));
/// ```
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Clause {
    /// The clause number or fallback identifier (e.g. "22.1", "para_3").
    pub id: String,
    /// Ancestor headings from the top-level section down, excluding this clause.
    pub hierarchy: Vec<String>,
    /// The clause heading.
    pub heading: String,
    /// The clause body text.
    pub body: String,
}

impl Clause {
    /// Returns the top-level section this clause belongs to.
    pub fn top_level_section(&self) -> Option<&str> {
        self.hierarchy.first().map(String::as_str)
    }
}

/// A parsed award document.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ParsedDocument {
    /// The award name as shown in the document.
    pub award_name: String,
    /// Clauses in document order.
    pub clauses: Vec<Clause>,
}

impl ParsedDocument {
    /// Returns true if a clause with the given id exists.
    pub fn has_clause(&self, id: &str) -> bool {
        self.clauses.iter().any(|c| c.id == id)
    }
}

/// A retrieval-sized unit of text.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Chunk {
    /// Stable identifier (`chunk-0001`).
    pub id: String,
    /// Position in the chunk sequence; used to break retrieval ties.
    pub ordinal: usize,
    /// Ids of the clauses this chunk was cut from.
    pub clause_ids: Vec<String>,
    /// Hierarchy context: ancestor headings followed by the clause heading.
    pub context: Vec<String>,
    /// The text window.
    pub text: String,
}

impl Chunk {
    /// Text sent to the embedder and shown to the model.
    ///
    /// The context line is prepended so retrieved chunks remain
    /// interpretable on their own.
    pub fn render(&self) -> String {
        format!(
            "[{}] {}\n{}",
            self.clause_ids.join(", "),
            self.context.join(" > "),
            self.text
        )
    }
}
