//! Reference text for locating code changes.
//!
//! The baseline configuration is cut into one chunk per section or list
//! element, and any engine source files named in the settings are cut at
//! top-level definitions. Both are indexed under a key of their own so the
//! patch plan can point each code-required gap at the closest entries.

use std::fs;
use std::path::Path;

use serde::Serialize;
use serde_json::Value;

use crate::error::{PipelineError, PipelineResult};
use crate::models::{BaselineConfig, Chunk};

const BASELINE_LABEL: &str = "Baseline configuration";

/// Lines starting with one of these at column zero open a new block.
const DEFINITION_PREFIXES: &[&str] = &[
    "fn ",
    "pub fn ",
    "pub(crate) fn ",
    "async fn ",
    "pub async fn ",
    "impl ",
    "impl<",
    "def ",
    "async def ",
    "class ",
    "function ",
    "export function ",
];

/// A named body of engine source text.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ReferenceSource {
    /// File name shown in location hints.
    pub name: String,
    /// The source text.
    pub text: String,
}

impl ReferenceSource {
    /// Reads a source file.
    ///
    /// # Errors
    ///
    /// Returns `ConfigNotFound` if the file cannot be read.
    pub fn load(path: &Path) -> PipelineResult<Self> {
        let text = fs::read_to_string(path).map_err(|_| PipelineError::ConfigNotFound {
            path: path.display().to_string(),
        })?;
        let name = path
            .file_name()
            .map(|n| n.to_string_lossy().into_owned())
            .unwrap_or_else(|| path.display().to_string());
        Ok(Self { name, text })
    }
}

/// Index key holding a session's reference chunks.
pub fn reference_key(session_id: &str) -> String {
    format!("{}::reference", session_id)
}

/// Human-readable location of a reference chunk.
pub fn reference_label(chunk: &Chunk) -> String {
    chunk.context.join(" > ")
}

fn baseline_chunks(baseline: &BaselineConfig) -> PipelineResult<Vec<(Vec<String>, String)>> {
    let document = baseline.to_document()?;
    let Value::Object(sections) = document else {
        return Ok(Vec::new());
    };
    let mut out = Vec::new();
    for (key, value) in sections {
        match value {
            Value::Array(items) => {
                for item in items {
                    let Some(name) = item.get("name").and_then(Value::as_str) else {
                        continue;
                    };
                    out.push((
                        vec![BASELINE_LABEL.to_string(), format!("{}[{}]", key, name)],
                        item.to_string(),
                    ));
                }
            }
            other => out.push((vec![BASELINE_LABEL.to_string(), key], other.to_string())),
        }
    }
    Ok(out)
}

fn opens_definition(line: &str) -> bool {
    DEFINITION_PREFIXES.iter().any(|p| line.starts_with(p))
}

/// Splits `text` at line boundaries into pieces of at most `max_chars`.
/// A single longer line becomes its own piece.
fn split_block(text: &str, max_chars: usize) -> Vec<String> {
    let mut pieces = Vec::new();
    let mut current = String::new();
    for line in text.lines() {
        if !current.is_empty() && current.len() + line.len() + 1 > max_chars {
            pieces.push(std::mem::take(&mut current));
        }
        if !current.is_empty() {
            current.push('\n');
        }
        current.push_str(line);
    }
    if !current.trim().is_empty() {
        pieces.push(current);
    }
    pieces
}

fn source_chunks(source: &ReferenceSource, max_chars: usize) -> Vec<(Vec<String>, String)> {
    let mut blocks: Vec<Vec<&str>> = vec![Vec::new()];
    for line in source.text.lines() {
        if opens_definition(line) && blocks.last().is_some_and(|b| !b.is_empty()) {
            blocks.push(Vec::new());
        }
        if let Some(block) = blocks.last_mut() {
            block.push(line);
        }
    }

    let mut out = Vec::new();
    for block in blocks {
        let Some(first) = block.iter().find(|l| !l.trim().is_empty()) else {
            continue;
        };
        let heading = if opens_definition(first) {
            first.trim_end_matches(['{', ':', ' ']).to_string()
        } else {
            "module header".to_string()
        };
        for piece in split_block(&block.join("\n"), max_chars) {
            out.push((vec![source.name.clone(), heading.clone()], piece));
        }
    }
    out
}

/// Cuts the baseline and the engine sources into reference chunks.
///
/// Baseline chunks come first in document order, followed by each source
/// in the order given.
pub fn reference_chunks(
    baseline: &BaselineConfig,
    sources: &[ReferenceSource],
    max_chars: usize,
) -> PipelineResult<Vec<Chunk>> {
    let mut pieces = baseline_chunks(baseline)?;
    for source in sources {
        pieces.extend(source_chunks(source, max_chars));
    }
    Ok(pieces
        .into_iter()
        .enumerate()
        .map(|(ordinal, (context, text))| Chunk {
            id: format!("ref-{:04}", ordinal + 1),
            ordinal,
            clause_ids: Vec::new(),
            context,
            text,
        })
        .collect())
}

#[cfg(test)]
mod tests {
    use super::*;

    fn baseline() -> BaselineConfig {
        serde_yaml::from_str(include_str!("../../config/baseline.yaml")).unwrap()
    }

    const ENGINE: &str = "use std::collections::HashMap;\n\
                          \n\
                          pub fn ordinary_hours(week: &Week) -> Decimal {\n    \
                              week.hours.min(dec!(38))\n\
                          }\n\
                          \n\
                          fn overtime_rate(hours: Decimal) -> Decimal {\n    \
                              if hours > dec!(2) { dec!(2.0) } else { dec!(1.5) }\n\
                          }\n";

    #[test]
    fn test_baseline_elements_become_chunks() {
        let chunks = reference_chunks(&baseline(), &[], 1000).unwrap();
        let labels: Vec<String> = chunks.iter().map(reference_label).collect();
        assert!(labels.contains(&"Baseline configuration > ordinary_hours".to_string()));
        assert!(labels.contains(&"Baseline configuration > pay_components[OT1]".to_string()));
        assert!(labels.contains(&"Baseline configuration > allowances[MEAL]".to_string()));
        let ot1 = chunks
            .iter()
            .find(|c| reference_label(c).ends_with("pay_components[OT1]"))
            .unwrap();
        assert!(ot1.text.contains("\"factor\""));
    }

    #[test]
    fn test_sources_split_at_definitions() {
        let source = ReferenceSource {
            name: "engine.rs".to_string(),
            text: ENGINE.to_string(),
        };
        let baseline_count = reference_chunks(&baseline(), &[], 1000).unwrap().len();
        let chunks = reference_chunks(&baseline(), &[source], 1000).unwrap();
        let labels: Vec<String> = chunks[baseline_count..].iter().map(reference_label).collect();
        assert_eq!(
            labels,
            vec![
                "engine.rs > module header",
                "engine.rs > pub fn ordinary_hours(week: &Week) -> Decimal",
                "engine.rs > fn overtime_rate(hours: Decimal) -> Decimal",
            ]
        );
        let ordinals: Vec<usize> = chunks.iter().map(|c| c.ordinal).collect();
        assert_eq!(ordinals, (0..chunks.len()).collect::<Vec<_>>());
    }

    #[test]
    fn test_long_blocks_are_split() {
        let body: String = (0..40).map(|n| format!("    let x{} = {};\n", n, n)).collect();
        let source = ReferenceSource {
            name: "long.rs".to_string(),
            text: format!("fn long() {{\n{}}}\n", body),
        };
        let pieces = source_chunks(&source, 200);
        assert!(pieces.len() > 1);
        assert!(pieces.iter().all(|(_, text)| text.len() <= 200));
        assert!(pieces.iter().all(|(context, _)| context[1] == "fn long()"));
    }

    #[test]
    fn test_missing_source_file() {
        let err = ReferenceSource::load(Path::new("/nonexistent/engine.rs")).unwrap_err();
        assert_eq!(err.reason_code(), "config_error");
    }
}
