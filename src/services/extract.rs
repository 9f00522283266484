//! Document text extraction seam.
//!
//! Extraction itself (PDF parsing, OCR) is an external capability; the
//! pipeline consumes it through [`DocumentExtractor`]. A plain-text
//! implementation ships with the crate for simple payloads and tests.

use async_trait::async_trait;
use serde::{Deserialize, Serialize};

use crate::error::ExtractionError;
use crate::models::Page;

/// Best-effort document-level metadata reported by the extractor.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct ExtractedMetadata {
    pub title: Option<String>,
    pub author: Option<String>,
    pub page_count: u32,
}

/// Extraction output: ordered pages plus document metadata.
#[derive(Debug, Clone)]
pub struct Extraction {
    pub pages: Vec<Page>,
    pub metadata: ExtractedMetadata,
}

/// Turns raw uploaded bytes into ordered pages of text.
#[async_trait]
pub trait DocumentExtractor: Send + Sync {
    async fn extract(&self, bytes: &[u8]) -> Result<Extraction, ExtractionError>;
}

/// Extractor for plain UTF-8 text with form-feed page separators.
#[derive(Debug, Clone, Copy, Default)]
pub struct PlainTextExtractor;

impl PlainTextExtractor {
    pub fn new() -> Self {
        Self
    }
}

#[async_trait]
impl DocumentExtractor for PlainTextExtractor {
    async fn extract(&self, bytes: &[u8]) -> Result<Extraction, ExtractionError> {
        let text = std::str::from_utf8(bytes)
            .map_err(|e| ExtractionError::Corrupt(format!("invalid UTF-8: {}", e)))?;

        if text.is_empty() {
            return Ok(Extraction {
                pages: Vec::new(),
                metadata: ExtractedMetadata::default(),
            });
        }

        let pages: Vec<Page> = text
            .split('\u{c}')
            .enumerate()
            .map(|(i, page_text)| Page::new(i as u32 + 1, page_text))
            .collect();

        let metadata = ExtractedMetadata {
            title: None,
            author: None,
            page_count: pages.len() as u32,
        };

        Ok(Extraction { pages, metadata })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn splits_pages_on_form_feed() {
        let extraction = PlainTextExtractor::new()
            .extract(b"first page\x0csecond page")
            .await
            .unwrap();

        assert_eq!(extraction.pages.len(), 2);
        assert_eq!(extraction.pages[0].page_number, 1);
        assert_eq!(extraction.pages[0].text, "first page");
        assert_eq!(extraction.pages[1].page_number, 2);
        assert_eq!(extraction.pages[1].text, "second page");
        assert_eq!(extraction.metadata.page_count, 2);
    }

    #[tokio::test]
    async fn single_page_without_separator() {
        let extraction = PlainTextExtractor::new()
            .extract(b"just one page")
            .await
            .unwrap();
        assert_eq!(extraction.pages.len(), 1);
        assert_eq!(extraction.metadata.page_count, 1);
    }

    #[tokio::test]
    async fn empty_input_yields_zero_pages() {
        let extraction = PlainTextExtractor::new().extract(b"").await.unwrap();
        assert!(extraction.pages.is_empty());
        assert_eq!(extraction.metadata.page_count, 0);
    }

    #[tokio::test]
    async fn invalid_utf8_is_a_corrupt_document() {
        let result = PlainTextExtractor::new().extract(&[0xff, 0xfe, 0x00]).await;
        assert!(matches!(result, Err(ExtractionError::Corrupt(_))));
    }
}
