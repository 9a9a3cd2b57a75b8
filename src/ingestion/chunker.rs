//! Clause chunking.
//!
//! Splits clauses into retrieval-sized chunks. A chunk never exceeds the
//! configured character cap and never spans clauses with different
//! ancestry, so two top-level sections are never merged. Long clauses are
//! split at sentence boundaries where possible; adjacent short clauses under
//! the same parent are merged up to the cap.

use tracing::debug;

use crate::models::{Chunk, Clause};

/// Splits clauses into chunks. Pure and deterministic.
///
/// # Example
///
/// ```
/// use award_interpreter::ingestion::Chunker;
/// use award_interpreter::models::Clause;
///
/// let clauses = vec![Clause {
///     id: "13.1".to_string(),
///     hierarchy: vec!["13 Ordinary hours of work".to_string()],
///     heading: "Clause 13.1".to_string(),
///     body: "The ordinary hours of work are 38 per week.".to_string(),
/// }];
/// let chunks = Chunker::new(200).chunk(&clauses);
/// assert_eq!(chunks.len(), 1);
/// assert_eq!(chunks[0].id, "chunk-0001");
/// assert_eq!(chunks[0].clause_ids, vec!["13.1"]);
/// ```
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Chunker {
    max_chars: usize,
}

struct Piece<'a> {
    clause: &'a Clause,
    text: String,
    /// True if the clause fit in one piece.
    whole: bool,
}

impl Chunker {
    /// Creates a chunker with the given character cap (at least 1).
    pub fn new(max_chars: usize) -> Self {
        Self {
            max_chars: max_chars.max(1),
        }
    }

    /// The character cap.
    pub fn max_chars(&self) -> usize {
        self.max_chars
    }

    /// Chunks clauses in order.
    pub fn chunk(&self, clauses: &[Clause]) -> Vec<Chunk> {
        let mut chunks: Vec<Chunk> = Vec::new();
        // Whether the last chunk may still absorb another whole clause.
        let mut open_for_merge = false;

        for piece in clauses.iter().flat_map(|c| self.pieces(c)) {
            if piece.whole && open_for_merge {
                if let Some(last) = chunks.last_mut() {
                    let merged_len = char_len(&last.text) + 1 + char_len(&piece.text);
                    if merged_len <= self.max_chars && same_parent(last, piece.clause) {
                        last.text.push('\n');
                        last.text.push_str(&piece.text);
                        last.clause_ids.push(piece.clause.id.clone());
                        if let Some(heading) = last.context.last_mut() {
                            heading.push_str(" / ");
                            heading.push_str(&piece.clause.heading);
                        }
                        continue;
                    }
                }
            }

            let mut context = piece.clause.hierarchy.clone();
            context.push(piece.clause.heading.clone());
            chunks.push(Chunk {
                id: String::new(),
                ordinal: 0,
                clause_ids: vec![piece.clause.id.clone()],
                context,
                text: piece.text,
            });
            open_for_merge = piece.whole;
        }

        for (ordinal, chunk) in chunks.iter_mut().enumerate() {
            chunk.ordinal = ordinal;
            chunk.id = format!("chunk-{:04}", ordinal + 1);
        }
        debug!(
            clauses = clauses.len(),
            chunks = chunks.len(),
            max_chars = self.max_chars,
            "Chunked clauses"
        );
        chunks
    }

    fn pieces<'a>(&self, clause: &'a Clause) -> Vec<Piece<'a>> {
        let body = clause.body.trim();
        if body.is_empty() {
            return Vec::new();
        }
        if char_len(body) <= self.max_chars {
            return vec![Piece {
                clause,
                text: body.to_string(),
                whole: true,
            }];
        }
        self.split(body)
            .into_iter()
            .map(|text| Piece {
                clause,
                text,
                whole: false,
            })
            .collect()
    }

    /// Greedy packing of sentences, then words, then characters.
    fn split(&self, text: &str) -> Vec<String> {
        let mut windows = Vec::new();
        let mut current = String::new();
        for sentence in sentences(text) {
            if char_len(&sentence) > self.max_chars {
                for word in sentence.split_whitespace() {
                    for part in hard_split(word, self.max_chars) {
                        push_packed(&mut windows, &mut current, &part, self.max_chars);
                    }
                }
            } else {
                push_packed(&mut windows, &mut current, &sentence, self.max_chars);
            }
        }
        if !current.is_empty() {
            windows.push(current);
        }
        windows
    }
}

fn char_len(text: &str) -> usize {
    text.chars().count()
}

fn same_parent(chunk: &Chunk, clause: &Clause) -> bool {
    let parent_len = chunk.context.len().saturating_sub(1);
    chunk.context[..parent_len] == clause.hierarchy[..]
}

fn push_packed(windows: &mut Vec<String>, current: &mut String, part: &str, max: usize) {
    let needed = if current.is_empty() {
        char_len(part)
    } else {
        char_len(current) + 1 + char_len(part)
    };
    if needed > max && !current.is_empty() {
        windows.push(std::mem::take(current));
    }
    if !current.is_empty() {
        current.push(' ');
    }
    current.push_str(part);
}

/// Sentences end at a word finishing with `.`, `;` or `:`.
fn sentences(text: &str) -> Vec<String> {
    let mut out = Vec::new();
    let mut current: Vec<&str> = Vec::new();
    for word in text.split_whitespace() {
        current.push(word);
        if word.ends_with(['.', ';', ':']) {
            out.push(current.join(" "));
            current.clear();
        }
    }
    if !current.is_empty() {
        out.push(current.join(" "));
    }
    out
}

fn hard_split(word: &str, max: usize) -> Vec<String> {
    let chars: Vec<char> = word.chars().collect();
    chars.chunks(max).map(|c| c.iter().collect()).collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use proptest::prelude::*;

    fn clause(id: &str, parent: &str, body: &str) -> Clause {
        Clause {
            id: id.to_string(),
            hierarchy: vec![parent.to_string()],
            heading: format!("Clause {}", id),
            body: body.to_string(),
        }
    }

    #[test]
    fn test_short_siblings_are_merged() {
        let clauses = vec![
            clause("13.1", "13 Hours", "38 hours per week."),
            clause("13.2", "13 Hours", "Between 7am and 7pm."),
        ];
        let chunks = Chunker::new(200).chunk(&clauses);
        assert_eq!(chunks.len(), 1);
        assert_eq!(chunks[0].clause_ids, vec!["13.1", "13.2"]);
        assert_eq!(chunks[0].text, "38 hours per week.\nBetween 7am and 7pm.");
        assert_eq!(chunks[0].context, vec!["13 Hours", "Clause 13.1 / Clause 13.2"]);
    }

    #[test]
    fn test_sections_are_never_merged() {
        let clauses = vec![
            clause("13.1", "13 Hours", "38 hours per week."),
            clause("25.1", "25 Overtime", "Time and a half."),
        ];
        let chunks = Chunker::new(200).chunk(&clauses);
        assert_eq!(chunks.len(), 2);
        assert_eq!(chunks[1].ordinal, 1);
        assert_eq!(chunks[1].id, "chunk-0002");
    }

    #[test]
    fn test_long_clause_is_split_at_sentences() {
        let body = "First sentence here. Second sentence here. Third sentence here.";
        let chunks = Chunker::new(45).chunk(&[clause("25.1", "25 Overtime", body)]);
        assert_eq!(chunks.len(), 2);
        assert_eq!(chunks[0].text, "First sentence here. Second sentence here.");
        assert_eq!(chunks[1].text, "Third sentence here.");
        assert!(chunks.iter().all(|c| c.clause_ids == vec!["25.1"]));
    }

    #[test]
    fn test_split_pieces_are_not_merged_with_neighbours() {
        let clauses = vec![
            clause("25.1", "25 Overtime", "Alpha beta gamma. Delta epsilon zeta."),
            clause("25.2", "25 Overtime", "Eta."),
        ];
        let chunks = Chunker::new(20).chunk(&clauses);
        assert_eq!(chunks.last().unwrap().clause_ids, vec!["25.2"]);
    }

    #[test]
    fn test_oversized_word_is_hard_split() {
        let word = "x".repeat(25);
        let chunks = Chunker::new(10).chunk(&[clause("1", "1", &word)]);
        assert_eq!(chunks.len(), 3);
        assert!(chunks.iter().all(|c| c.text.chars().count() <= 10));
    }

    #[test]
    fn test_empty_bodies_are_skipped() {
        let chunks = Chunker::new(100).chunk(&[clause("1", "1", "   ")]);
        assert!(chunks.is_empty());
    }

    fn arb_clauses() -> impl Strategy<Value = Vec<Clause>> {
        prop::collection::vec(
            (0usize..4, 1usize..20, "[a-z]{1,15}( [a-z]{1,15}\\.?){0,40}"),
            0..12,
        )
        .prop_map(|items| {
            items
                .into_iter()
                .map(|(section, n, body)| {
                    clause(&format!("{}.{}", section, n), &format!("{} Section", section), &body)
                })
                .collect()
        })
    }

    proptest! {
        #[test]
        fn prop_chunking_is_idempotent(clauses in arb_clauses(), max in 20usize..300) {
            let chunker = Chunker::new(max);
            prop_assert_eq!(chunker.chunk(&clauses), chunker.chunk(&clauses));
        }

        #[test]
        fn prop_chunks_respect_length_cap(clauses in arb_clauses(), max in 20usize..300) {
            for chunk in Chunker::new(max).chunk(&clauses) {
                prop_assert!(chunk.text.chars().count() <= max);
            }
        }

        #[test]
        fn prop_chunks_stay_within_one_section(clauses in arb_clauses(), max in 20usize..300) {
            for chunk in Chunker::new(max).chunk(&clauses) {
                let sections: std::collections::HashSet<&str> = chunk
                    .clause_ids
                    .iter()
                    .map(|id| id.split('.').next().unwrap_or_default())
                    .collect();
                prop_assert_eq!(sections.len(), 1);
            }
        }

        #[test]
        fn prop_every_clause_with_text_is_covered(clauses in arb_clauses(), max in 20usize..300) {
            let chunks = Chunker::new(max).chunk(&clauses);
            for clause in clauses.iter().filter(|c| !c.body.trim().is_empty()) {
                prop_assert!(chunks.iter().any(|ch| ch.clause_ids.contains(&clause.id)));
            }
        }
    }
}
