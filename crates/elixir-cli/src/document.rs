// crates/elixir-cli/src/document.rs
// ============================================================================
// Module: Local File Document Adapter
// Description: `DocumentFetcher`/`DocumentParser` pair backed by the local
//              filesystem, selected when `USE_LOCAL_STORAGE` is set (spec.md
//              §6).
// Purpose: Give the CLI something concrete to run `ingest` against. A
//          signed-URL/object-storage adapter and a real PDF-to-text parser
//          are out of scope (spec.md §1 Non-goals: "a single `fetch_pdf(uri)
//          -> bytes` interface suffices") — this adapter treats `file_uri` as
//          a path relative to `root` and treats the document as UTF-8 text,
//          page breaks marked by a form feed (`\x0C`), matching the plain
//          text export most protocol authoring tools offer alongside a PDF.
// Dependencies: async-trait, elixir-core
// ============================================================================

//! ## Overview
//! Mirrors `decision-gate-mcp::runpack::FileArtifactReader`'s root-relative
//! path resolution: every `file_uri` is joined under a validated root and
//! rejected if it escapes it, rather than trusted as an absolute path.

// ============================================================================
// SECTION: Imports
// ============================================================================

use std::fs;
use std::path::Component;
use std::path::Path;
use std::path::PathBuf;

use async_trait::async_trait;
use elixir_core::DocumentError;
use elixir_core::DocumentFetcher;
use elixir_core::DocumentParser;
use elixir_core::ParsedDocument;
use elixir_core::ParsedPage;

/// Page separator used by the local plain-text stand-in parser.
const PAGE_BREAK: char = '\u{000C}';

// ============================================================================
// SECTION: Path Resolution
// ============================================================================

/// Resolves `file_uri` to a path under `root`, rejecting escapes.
fn resolve_under(root: &Path, file_uri: &str) -> Result<PathBuf, DocumentError> {
    let candidate = PathBuf::from(file_uri);
    if candidate.is_absolute() {
        return Err(DocumentError::FetchFailed { uri: file_uri.to_string(), message: "absolute paths are not allowed".to_string() });
    }
    for component in candidate.components() {
        if matches!(component, Component::ParentDir | Component::Prefix(_) | Component::RootDir) {
            return Err(DocumentError::FetchFailed { uri: file_uri.to_string(), message: "path escapes storage root".to_string() });
        }
    }
    Ok(root.join(candidate))
}

// ============================================================================
// SECTION: LocalFileDocumentFetcher
// ============================================================================

/// Fetches protocol document bytes from a directory on local disk.
pub struct LocalFileDocumentFetcher {
    root: PathBuf,
}

impl LocalFileDocumentFetcher {
    /// Builds a fetcher rooted at `root`.
    #[must_use]
    pub fn new(root: PathBuf) -> Self {
        Self { root }
    }
}

#[async_trait]
impl DocumentFetcher for LocalFileDocumentFetcher {
    async fn fetch(&self, file_uri: &str) -> Result<Vec<u8>, DocumentError> {
        let path = resolve_under(&self.root, file_uri)?;
        fs::read(&path).map_err(|error| DocumentError::FetchFailed { uri: file_uri.to_string(), message: error.to_string() })
    }
}

// ============================================================================
// SECTION: PlainTextDocumentParser
// ============================================================================

/// Splits UTF-8 document bytes into pages on form-feed boundaries.
///
/// Every character is treated as extractable; a production parser would
/// distinguish OCR-garbled runs, but the stand-in has no OCR layer to be
/// uncertain about.
#[derive(Debug, Clone, Copy, Default)]
pub struct PlainTextDocumentParser;

impl DocumentParser for PlainTextDocumentParser {
    fn parse(&self, bytes: &[u8]) -> Result<ParsedDocument, DocumentError> {
        let text = std::str::from_utf8(bytes).map_err(|error| DocumentError::ParseFailed(error.to_string()))?;

        let pages = text
            .split(PAGE_BREAK)
            .enumerate()
            .map(|(index, page_text)| {
                let char_count = u32::try_from(page_text.chars().count()).unwrap_or(u32::MAX);
                ParsedPage {
                    page_number: u32::try_from(index + 1).unwrap_or(u32::MAX),
                    blocks: vec![page_text.trim().to_string()],
                    extractable_chars: char_count,
                    total_chars: char_count,
                }
            })
            .collect();

        Ok(ParsedDocument { pages })
    }
}

// ============================================================================
// SECTION: Tests
// ============================================================================

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn fetch_reads_bytes_relative_to_root() {
        let dir = tempfile::tempdir().unwrap_or_else(|error| panic!("tempdir: {error}"));
        fs::write(dir.path().join("protocol.txt"), b"hello").unwrap_or_else(|error| panic!("write: {error}"));
        let fetcher = LocalFileDocumentFetcher::new(dir.path().to_path_buf());

        let bytes = fetcher.fetch("protocol.txt").await.unwrap_or_else(|error| panic!("fetch: {error}"));
        assert_eq!(bytes, b"hello");
    }

    #[tokio::test]
    async fn fetch_rejects_a_path_escaping_the_root() {
        let dir = tempfile::tempdir().unwrap_or_else(|error| panic!("tempdir: {error}"));
        let fetcher = LocalFileDocumentFetcher::new(dir.path().to_path_buf());

        let result = fetcher.fetch("../etc/passwd").await;
        assert!(result.is_err());
    }

    #[test]
    fn parse_splits_on_form_feed_into_one_based_pages() {
        let parser = PlainTextDocumentParser;
        let document = parser.parse(b"page one\x0cpage two").unwrap_or_else(|error| panic!("parse: {error}"));

        assert_eq!(document.pages.len(), 2);
        assert_eq!(document.pages[0].page_number, 1);
        assert_eq!(document.pages[1].page_number, 2);
        assert_eq!(document.pages[1].text(), "page two");
    }

    #[test]
    fn parse_rejects_non_utf8_bytes() {
        let parser = PlainTextDocumentParser;
        let result = parser.parse(&[0xFF, 0xFE, 0xFD]);
        assert!(result.is_err());
    }
}
