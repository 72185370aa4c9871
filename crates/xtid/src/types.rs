//! Core data types shared by every stage of the dump pipeline.

use std::path::PathBuf;

use scraper::Html;
use url::Url;

/// A fetched landing page, parsed once and read-only afterwards.
#[derive(Debug)]
pub struct Document {
    url: Url,
    source: String,
    html: Html,
}

impl Document {
    /// Parse `source` as an HTML document fetched from `url`.
    pub fn parse(url: &str, source: impl Into<String>) -> TidResult<Self> {
        let url = parse_url(url)?;
        let source = source.into();
        let html = Html::parse_document(&source);
        Ok(Self { url, source, html })
    }

    /// URL the document was served from (after redirects).
    pub fn url(&self) -> &Url {
        &self.url
    }

    /// Raw HTML text as received.
    pub fn source(&self) -> &str {
        &self.source
    }

    /// Parsed DOM.
    pub fn html(&self) -> &Html {
        &self.html
    }
}

/// Parse an absolute URL, mapping failures into [`TidError::InvalidUrl`].
pub fn parse_url(raw: &str) -> TidResult<Url> {
    Url::parse(raw).map_err(|e| TidError::InvalidUrl {
        url: raw.to_string(),
        reason: e.to_string(),
    })
}

/// Errors that abort a dump run.
#[derive(thiserror::Error, Debug)]
pub enum TidError {
    #[error("HTTP request to {url} failed: {source}")]
    Http {
        url: String,
        #[source]
        source: reqwest::Error,
    },

    #[error("HTTP status {status} from {url}")]
    HttpStatus { url: String, status: u16 },

    #[error("Could not find ondemand.s.*.js URL in {page}{hint}")]
    AssetNotFound { page: String, hint: &'static str },

    #[error("Generator construction failed: {0}")]
    GeneratorConstruction(String),

    #[error("Transaction ID generation failed: {0}")]
    TransactionId(String),

    #[error("Failed to write {}: {source}", path.display())]
    FileWrite {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("Invalid URL {url}: {reason}")]
    InvalidUrl { url: String, reason: String },

    #[error("Configuration error: {0}")]
    Config(String),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),
}

/// Convenience result type.
pub type TidResult<T> = Result<T, TidError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_document_keeps_source_and_url() {
        let doc = Document::parse("https://x.com/home", "<html><body>hi</body></html>").unwrap();
        assert_eq!(doc.url().as_str(), "https://x.com/home");
        assert!(doc.source().contains("hi"));
    }

    #[test]
    fn test_document_rejects_relative_url() {
        let err = Document::parse("not a url", "<html></html>").unwrap_err();
        assert!(matches!(err, TidError::InvalidUrl { .. }));
    }

    #[test]
    fn test_http_status_message() {
        let err = TidError::HttpStatus {
            url: "https://x.com".into(),
            status: 503,
        };
        assert_eq!(err.to_string(), "HTTP status 503 from https://x.com");
    }
}
