//! HTTP implementations of [`PageFetcher`] and [`ByteSource`].
//!
//! Both share one [`reqwest::Client`] so connections are pooled between page
//! requests and image downloads.

use std::time::Duration;

use async_trait::async_trait;
use log::debug;
use serde::Deserialize;

use super::{ByteSource, PageFetcher, RawRecord};
use crate::error::{FeedError, Result};

/// Envelope returned by the news endpoint.
#[derive(Debug, Deserialize)]
struct NewsResponse {
    news: Vec<RawRecord>,
}

/// Decode one page body into raw records.
///
/// Pure (no I/O) so tests can exercise the wire format without a server.
pub fn decode_page(body: &[u8]) -> Result<Vec<RawRecord>> {
    let response: NewsResponse = serde_json::from_slice(body)?;
    Ok(response.news)
}

/// Build the shared client used by both sources.
fn build_client(timeout: Duration) -> Result<reqwest::Client> {
    reqwest::Client::builder()
        .timeout(timeout)
        .build()
        .map_err(FeedError::from)
}

/// A news feed served as `GET {base_url}/{page}/{page_size}`.
#[derive(Debug, Clone)]
pub struct HttpNewsSource {
    base_url: String,
    client: reqwest::Client,
}

impl HttpNewsSource {
    /// Create a source for `base_url` (without a trailing page segment).
    pub fn new(base_url: impl Into<String>, timeout: Duration) -> Result<Self> {
        Ok(Self {
            base_url: base_url.into(),
            client: build_client(timeout)?,
        })
    }

    /// A byte source that reuses this source's connection pool.
    pub fn byte_source(&self) -> HttpByteSource {
        HttpByteSource {
            client: self.client.clone(),
        }
    }

    pub fn page_url(&self, page: u32, page_size: u32) -> String {
        format!("{}/{page}/{page_size}", self.base_url.trim_end_matches('/'))
    }
}

#[async_trait]
impl PageFetcher for HttpNewsSource {
    fn name(&self) -> &str {
        &self.base_url
    }

    async fn fetch_page(&self, page: u32, page_size: u32) -> Result<Vec<RawRecord>> {
        let url = self.page_url(page, page_size);
        debug!("GET {url}");
        let body = self
            .client
            .get(&url)
            .send()
            .await?
            .error_for_status()?
            .bytes()
            .await?;
        decode_page(&body)
    }
}

/// Fetches image bytes over HTTP.
#[derive(Debug, Clone)]
pub struct HttpByteSource {
    client: reqwest::Client,
}

#[async_trait]
impl ByteSource for HttpByteSource {
    async fn fetch_bytes(&self, locator: &str) -> Result<Vec<u8>> {
        debug!("GET {locator}");
        let bytes = self
            .client
            .get(locator)
            .send()
            .await?
            .error_for_status()?
            .bytes()
            .await
            // A broken body stream is a transport failure, not a bad image.
            .map_err(|e| FeedError::Transport(e.to_string()))?;
        Ok(bytes.to_vec())
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn decode_page_reads_envelope() {
        let body = br#"{
            "news": [
                {
                    "id": 8021,
                    "title": "New warehouse opens",
                    "description": "Faster delivery in the north-west",
                    "publishedDate": "2025-05-20T00:00:00",
                    "url": "avto-novosti/new-warehouse",
                    "fullUrl": "https://example.com/news/8021",
                    "titleImageUrl": "https://example.com/img/8021.jpg",
                    "categoryType": "Company news"
                },
                { "id": 8020, "title": null }
            ],
            "totalCount": 2
        }"#;

        let records = decode_page(body).unwrap();

        assert_eq!(records.len(), 2);
        assert_eq!(records[0].id, 8021);
        assert_eq!(records[0].title.as_deref(), Some("New warehouse opens"));
        assert_eq!(records[0].category_type.as_deref(), Some("Company news"));
        assert_eq!(records[1].id, 8020);
        assert!(records[1].title.is_none());
        assert!(records[1].full_url.is_none());
    }

    #[test]
    fn decode_page_accepts_empty_page() {
        let records = decode_page(br#"{"news": []}"#).unwrap();
        assert!(records.is_empty());
    }

    #[test]
    fn decode_page_rejects_malformed_body() {
        assert!(matches!(
            decode_page(b"<html>502 Bad Gateway</html>"),
            Err(FeedError::Decode(_))
        ));
        assert!(matches!(decode_page(br#"{"items": []}"#), Err(FeedError::Decode(_))));
    }

    #[test]
    fn page_url_appends_page_and_size() {
        let src = HttpNewsSource::new("https://example.com/api/news/", Duration::from_secs(5)).unwrap();
        assert_eq!(src.page_url(3, 15), "https://example.com/api/news/3/15");
        assert_eq!(src.name(), "https://example.com/api/news/");
    }
}
