//! Document references and fetchers.

use std::path::{Path, PathBuf};
use std::time::Duration;

use async_trait::async_trait;
use tracing::{debug, info, instrument};
use url::Url;

use crate::config::FetchSettings;
use crate::error::{PipelineError, PipelineResult};
use crate::models::RawDocument;
use crate::retry::{RetryPolicy, with_backoff};

/// Where an award document lives.
///
/// # Example
///
/// ```
/// use award_interpreter::ingestion::DocumentReference;
///
/// let reference = DocumentReference::parse("MA000002", "https://awards.fairwork.gov.au").unwrap();
/// assert_eq!(reference.award_id(), "MA000002");
/// assert_eq!(reference.to_string(), "https://awards.fairwork.gov.au/MA000002.html");
/// ```
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum DocumentReference {
    /// An http(s) URL.
    Url(Url),
    /// A local file.
    File(PathBuf),
}

fn is_award_code(input: &str) -> bool {
    input.len() == 8
        && input.is_ascii()
        && input[..2].chars().all(|c| c.is_ascii_alphabetic())
        && input[2..].chars().all(|c| c.is_ascii_digit())
}

impl DocumentReference {
    /// Parses a URL, `file://` URL, local path or bare award code.
    ///
    /// Bare codes resolve to `<base_url>/<CODE>.html`.
    pub fn parse(input: &str, base_url: &str) -> PipelineResult<Self> {
        let input = input.trim();
        let invalid = |message: &str| PipelineError::Fetch {
            reference: input.to_string(),
            message: message.to_string(),
        };

        if input.is_empty() {
            return Err(invalid("empty document reference"));
        }

        if is_award_code(input) {
            let url = format!(
                "{}/{}.html",
                base_url.trim_end_matches('/'),
                input.to_ascii_uppercase()
            );
            return Url::parse(&url)
                .map(Self::Url)
                .map_err(|e| invalid(&e.to_string()));
        }

        if let Ok(url) = Url::parse(input) {
            return match url.scheme() {
                "http" | "https" => Ok(Self::Url(url)),
                "file" => url
                    .to_file_path()
                    .map(Self::File)
                    .map_err(|_| invalid("file URL does not name a local path")),
                other => Err(invalid(&format!("unsupported scheme '{}'", other))),
            };
        }

        Ok(Self::File(PathBuf::from(input)))
    }

    /// The award id: the last path segment without its extension.
    pub fn award_id(&self) -> String {
        let segment = match self {
            Self::Url(url) => url
                .path_segments()
                .and_then(|mut segments| segments.next_back())
                .filter(|s| !s.is_empty())
                .map(str::to_string)
                .unwrap_or_else(|| url.host_str().unwrap_or("award").to_string()),
            Self::File(path) => path
                .file_name()
                .map(|n| n.to_string_lossy().into_owned())
                .unwrap_or_else(|| "award".to_string()),
        };
        match Path::new(&segment).file_stem() {
            Some(stem) => stem.to_string_lossy().into_owned(),
            None => segment,
        }
    }
}

impl std::fmt::Display for DocumentReference {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Url(url) => write!(f, "{}", url),
            Self::File(path) => write!(f, "{}", path.display()),
        }
    }
}

/// Retrieves raw document content.
#[async_trait]
pub trait Fetcher: Send + Sync {
    /// Fetches the document, or fails with `PipelineError::Fetch`.
    async fn fetch(&self, reference: &DocumentReference) -> PipelineResult<RawDocument>;
}

/// Fetches documents over HTTP with bounded retries.
pub struct HttpFetcher {
    client: reqwest::Client,
    retry: RetryPolicy,
}

impl HttpFetcher {
    /// Creates a fetcher from settings.
    pub fn new(settings: &FetchSettings, retry: RetryPolicy) -> PipelineResult<Self> {
        let client = reqwest::Client::builder()
            .user_agent(settings.user_agent.clone())
            .timeout(Duration::from_secs(settings.timeout_secs))
            .build()
            .map_err(|e| PipelineError::Fetch {
                reference: settings.base_url.clone(),
                message: format!("failed to build HTTP client: {}", e),
            })?;
        Ok(Self { client, retry })
    }

    async fn get_once(&self, url: &Url) -> PipelineResult<String> {
        let fetch_error = |message: String| PipelineError::Fetch {
            reference: url.to_string(),
            message,
        };
        let response = self
            .client
            .get(url.clone())
            .send()
            .await
            .map_err(|e| fetch_error(e.to_string()))?;
        let status = response.status();
        if !status.is_success() {
            return Err(fetch_error(format!("HTTP {}", status)));
        }
        response.text().await.map_err(|e| fetch_error(e.to_string()))
    }
}

#[async_trait]
impl Fetcher for HttpFetcher {
    #[instrument(skip_all, fields(reference = %reference))]
    async fn fetch(&self, reference: &DocumentReference) -> PipelineResult<RawDocument> {
        let DocumentReference::Url(url) = reference else {
            return Err(PipelineError::Fetch {
                reference: reference.to_string(),
                message: "HTTP fetcher only handles URLs".to_string(),
            });
        };
        let content = with_backoff(&self.retry, "fetch", move || self.get_once(url)).await?;
        info!(bytes = content.len(), "Fetched document");
        Ok(RawDocument {
            award_id: reference.award_id(),
            source_url: url.to_string(),
            content,
        })
    }
}

/// Reads documents from the local filesystem.
#[derive(Debug, Default, Clone, Copy)]
pub struct FileFetcher;

#[async_trait]
impl Fetcher for FileFetcher {
    async fn fetch(&self, reference: &DocumentReference) -> PipelineResult<RawDocument> {
        let DocumentReference::File(path) = reference else {
            return Err(PipelineError::Fetch {
                reference: reference.to_string(),
                message: "file fetcher only handles local paths".to_string(),
            });
        };
        let content =
            tokio::fs::read_to_string(path)
                .await
                .map_err(|e| PipelineError::Fetch {
                    reference: reference.to_string(),
                    message: e.to_string(),
                })?;
        debug!(path = %path.display(), bytes = content.len(), "Read document from disk");
        Ok(RawDocument {
            award_id: reference.award_id(),
            source_url: reference.to_string(),
            content,
        })
    }
}

/// Dispatches to the HTTP or file fetcher by reference kind.
pub struct SourceFetcher {
    http: HttpFetcher,
    file: FileFetcher,
}

impl SourceFetcher {
    /// Creates a dispatching fetcher.
    pub fn new(http: HttpFetcher) -> Self {
        Self {
            http,
            file: FileFetcher,
        }
    }
}

#[async_trait]
impl Fetcher for SourceFetcher {
    async fn fetch(&self, reference: &DocumentReference) -> PipelineResult<RawDocument> {
        match reference {
            DocumentReference::Url(_) => self.http.fetch(reference).await,
            DocumentReference::File(_) => self.file.fetch(reference).await,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use wiremock::matchers::{method, path};
    use wiremock::{Mock, MockServer, ResponseTemplate};

    const BASE: &str = "https://awards.fairwork.gov.au";

    fn settings(base_url: &str) -> FetchSettings {
        FetchSettings {
            base_url: base_url.to_string(),
            user_agent: "award-interpreter-test".to_string(),
            timeout_secs: 5,
        }
    }

    #[test]
    fn test_parse_bare_code() {
        let reference = DocumentReference::parse("ma000002", BASE).unwrap();
        assert_eq!(
            reference,
            DocumentReference::Url(Url::parse("https://awards.fairwork.gov.au/MA000002.html").unwrap())
        );
    }

    #[test]
    fn test_parse_url_and_paths() {
        let url = DocumentReference::parse("https://example.com/awards/MA000004.html", BASE).unwrap();
        assert_eq!(url.award_id(), "MA000004");

        let file = DocumentReference::parse("file:///tmp/MA000010.html", BASE).unwrap();
        assert_eq!(file, DocumentReference::File(PathBuf::from("/tmp/MA000010.html")));
        assert_eq!(file.award_id(), "MA000010");

        let local = DocumentReference::parse("fixtures/clerks.html", BASE).unwrap();
        assert_eq!(local.award_id(), "clerks");
    }

    #[test]
    fn test_parse_rejects_empty_and_unknown_scheme() {
        assert!(DocumentReference::parse("  ", BASE).is_err());
        assert!(DocumentReference::parse("ftp://example.com/a.html", BASE).is_err());
    }

    #[tokio::test]
    async fn test_http_fetch_success() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/MA000002.html"))
            .respond_with(ResponseTemplate::new(200).set_body_string("<h1>Clerks</h1>"))
            .mount(&server)
            .await;

        let fetcher = HttpFetcher::new(&settings(&server.uri()), RetryPolicy::immediate(2)).unwrap();
        let reference = DocumentReference::parse("MA000002", &server.uri()).unwrap();
        let doc = fetcher.fetch(&reference).await.unwrap();
        assert_eq!(doc.award_id, "MA000002");
        assert_eq!(doc.content, "<h1>Clerks</h1>");
    }

    #[tokio::test]
    async fn test_http_fetch_retries_then_fails() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .respond_with(ResponseTemplate::new(503))
            .expect(3)
            .mount(&server)
            .await;

        let fetcher = HttpFetcher::new(&settings(&server.uri()), RetryPolicy::immediate(3)).unwrap();
        let reference = DocumentReference::parse("MA000002", &server.uri()).unwrap();
        let err = fetcher.fetch(&reference).await.unwrap_err();
        assert_eq!(err.reason_code(), "fetch_failed");
        assert!(err.to_string().contains("503"));
    }

    #[tokio::test]
    async fn test_file_fetch() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("MA000002.html");
        std::fs::write(&path, "<p>content</p>").unwrap();
        let doc = FileFetcher
            .fetch(&DocumentReference::File(path))
            .await
            .unwrap();
        assert_eq!(doc.award_id, "MA000002");
        assert_eq!(doc.content, "<p>content</p>");
    }

    #[tokio::test]
    async fn test_missing_file_is_fetch_error() {
        let err = FileFetcher
            .fetch(&DocumentReference::File(PathBuf::from("/nonexistent/a.html")))
            .await
            .unwrap_err();
        assert!(matches!(err, PipelineError::Fetch { .. }));
    }
}
