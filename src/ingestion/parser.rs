//! Award document parsing.
//!
//! Converts raw markup into an ordered clause sequence. Numbered headings
//! and paragraphs (`22.1 Heading`) start clauses; the hierarchy of a clause
//! is derived from its number, so `22.1.3` sits under `22` and `22.1`.
//! Documents without any numbering fall back to one clause per substantial
//! paragraph.

use std::collections::HashMap;
use std::sync::LazyLock;

use regex::Regex;
use scraper::{ElementRef, Html, Selector};
use tracing::{debug, instrument};

use crate::error::{PipelineError, PipelineResult};
use crate::models::{Clause, ParsedDocument};

const CONTENT_SELECTORS: [&str; 8] = [
    "#content",
    "#main-content",
    ".award-content",
    ".main-content",
    "[role=main]",
    "main",
    "article",
    "body",
];

const BLOCK_TAGS: [&str; 7] = ["h1", "h2", "h3", "h4", "h5", "p", "li"];

const TITLE_SUFFIX: &str = " | Fair Work Commission";

const MIN_FALLBACK_PARAGRAPH: usize = 50;

static CLAUSE_NUMBER: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"^(\d+(?:\.\d+)*)\.?\s+(.*)$").expect("clause number pattern")
});

fn selector(css: &str) -> Option<Selector> {
    Selector::parse(css).ok()
}

fn normalize(text: &str) -> String {
    text.split_whitespace().collect::<Vec<_>>().join(" ")
}

fn element_text(el: &ElementRef<'_>) -> String {
    normalize(&el.text().collect::<String>())
}

fn is_heading(tag: &str) -> bool {
    tag.len() == 2 && tag.starts_with('h')
}

/// Returns true if the element contains another block element, in which
/// case its text is taken from the inner blocks instead.
fn has_nested_block(el: &ElementRef<'_>) -> bool {
    el.descendants().skip(1).any(|node| {
        node.value()
            .as_element()
            .is_some_and(|e| BLOCK_TAGS.contains(&e.name()))
    })
}

/// Parses award HTML into clauses.
#[derive(Debug, Default, Clone, Copy)]
pub struct AwardParser;

struct OpenClause {
    id: String,
    heading: String,
    body: Vec<String>,
    section: Option<String>,
}

impl AwardParser {
    /// Parses a document.
    ///
    /// # Errors
    ///
    /// Returns `PipelineError::Parse` when the document has no text or no
    /// usable clauses.
    #[instrument(skip_all, fields(bytes = html.len()))]
    pub fn parse(&self, html: &str) -> PipelineResult<ParsedDocument> {
        let document = Html::parse_document(html);
        let award_name = award_name(&document);

        let root = CONTENT_SELECTORS
            .iter()
            .filter_map(|css| selector(css))
            .find_map(|sel| document.select(&sel).next())
            .ok_or_else(|| PipelineError::Parse {
                message: "document has no body".to_string(),
            })?;

        if element_text(&root).is_empty() {
            return Err(PipelineError::Parse {
                message: "document is empty".to_string(),
            });
        }

        let blocks = blocks(&root);
        let mut clauses = numbered_clauses(&blocks);
        if clauses.is_empty() {
            clauses = fallback_clauses(&blocks);
        }
        if clauses.is_empty() {
            return Err(PipelineError::Parse {
                message: "no clauses found in document".to_string(),
            });
        }

        debug!(award_name = %award_name, clauses = clauses.len(), "Parsed document");
        Ok(ParsedDocument {
            award_name,
            clauses,
        })
    }
}

fn award_name(document: &Html) -> String {
    let first_text = |css: &str| {
        selector(css)
            .and_then(|sel| document.select(&sel).next())
            .map(|el| element_text(&el))
            .filter(|t| !t.is_empty())
    };
    first_text("h1")
        .or_else(|| first_text("title").map(|t| t.trim_end_matches(TITLE_SUFFIX).to_string()))
        .unwrap_or_else(|| "Unknown Award".to_string())
}

/// Leaf block elements in document order as `(tag, text)`.
fn blocks(root: &ElementRef<'_>) -> Vec<(String, String)> {
    let Some(sel) = selector(&BLOCK_TAGS.join(", ")) else {
        return Vec::new();
    };
    root.select(&sel)
        .filter(|el| !has_nested_block(el))
        .map(|el| (el.value().name().to_string(), element_text(&el)))
        .filter(|(_, text)| !text.is_empty())
        .collect()
}

fn numbered_clauses(blocks: &[(String, String)]) -> Vec<Clause> {
    let mut titles: HashMap<String, String> = HashMap::new();
    let mut open: Vec<OpenClause> = Vec::new();
    let mut current_section: Option<String> = None;

    for (tag, text) in blocks {
        match CLAUSE_NUMBER.captures(text) {
            Some(caps) => {
                let id = caps[1].to_string();
                let rest = caps[2].trim().to_string();
                if is_heading(tag) {
                    titles.insert(id.clone(), text.clone());
                    open.push(OpenClause {
                        id,
                        heading: rest,
                        body: Vec::new(),
                        section: current_section.clone(),
                    });
                } else {
                    open.push(OpenClause {
                        heading: format!("Clause {}", id),
                        id,
                        body: vec![rest],
                        section: current_section.clone(),
                    });
                }
            }
            None if is_heading(tag) => {
                current_section = Some(text.clone());
                // An unnumbered heading ends the running clause body.
                open.push(OpenClause {
                    id: String::new(),
                    heading: String::new(),
                    body: Vec::new(),
                    section: None,
                });
            }
            None => {
                if let Some(last) = open.last_mut().filter(|c| !c.id.is_empty()) {
                    last.body.push(text.clone());
                }
            }
        }
    }

    open.into_iter()
        .filter(|c| !c.id.is_empty() && !c.body.is_empty())
        .map(|c| Clause {
            hierarchy: hierarchy(&c.id, c.section.as_deref(), &titles),
            id: c.id,
            heading: c.heading,
            body: c.body.join("\n"),
        })
        .collect()
}

/// Ancestor titles from the top-level section down, excluding the clause.
fn hierarchy(id: &str, section: Option<&str>, titles: &HashMap<String, String>) -> Vec<String> {
    let parts: Vec<&str> = id.split('.').collect();
    let mut path = Vec::new();
    for depth in 1..parts.len() {
        let ancestor = parts[..depth].join(".");
        let title = match titles.get(&ancestor) {
            Some(title) => title.clone(),
            None if depth == 1 => section.map(str::to_string).unwrap_or(ancestor),
            None => ancestor,
        };
        path.push(title);
    }
    if path.is_empty() {
        if let Some(section) = section {
            path.push(section.to_string());
        }
    }
    path
}

fn fallback_clauses(blocks: &[(String, String)]) -> Vec<Clause> {
    blocks
        .iter()
        .filter(|(tag, _)| tag == "p")
        .enumerate()
        .filter(|(_, (_, text))| text.chars().count() > MIN_FALLBACK_PARAGRAPH)
        .map(|(idx, (_, text))| Clause {
            id: format!("para_{}", idx + 1),
            hierarchy: Vec::new(),
            heading: format!("Paragraph {}", idx + 1),
            body: text.clone(),
        })
        .collect()
}
