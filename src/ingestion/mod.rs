//! Document ingestion: fetching, parsing and chunking.

mod chunker;
mod fetcher;
mod parser;

pub use chunker::Chunker;
pub use fetcher::{DocumentReference, FileFetcher, Fetcher, HttpFetcher, SourceFetcher};
pub use parser::AwardParser;
