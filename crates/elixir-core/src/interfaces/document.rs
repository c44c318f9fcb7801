// crates/elixir-core/src/interfaces/document.rs
// ============================================================================
// Module: DocumentFetcher / DocumentParser
// Description: Storage adapter and PDF-to-text trait boundaries the
//              `ingest` node depends on.
// Purpose: Let `elixir-pipeline::nodes::ingest` compute a quality score over
//          parsed page text without depending on a specific storage backend
//          or PDF library (spec.md §1 Out-of-scope: "a single `fetch_pdf(uri)
//          -> bytes` interface suffices").
// Dependencies: async-trait, thiserror
// ============================================================================

//! ## Overview
//! [`DocumentFetcher`] is the single storage-adapter seam named in spec.md
//! §1's Non-goals; a signed-URL or local-disk implementation is out of
//! scope. [`DocumentParser`] turns the fetched bytes into a page-keyed block
//! structure, the input [`crate::domain::protocol::ProtocolMetadata`]'s
//! quality score (§4.6.1) is computed from.

// ============================================================================
// SECTION: Imports
// ============================================================================

use async_trait::async_trait;
use serde::Deserialize;
use serde::Serialize;
use thiserror::Error;

// ============================================================================
// SECTION: Error
// ============================================================================

/// Failure fetching or parsing a protocol document.
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum DocumentError {
    /// The storage adapter could not retrieve the document bytes.
    #[error("failed to fetch document at {uri}: {message}")]
    FetchFailed {
        /// The storage URI that was requested.
        uri: String,
        /// Description of the fetch failure.
        message: String,
    },
    /// The fetched bytes could not be parsed as a document.
    #[error("failed to parse document: {0}")]
    ParseFailed(String),
}

// ============================================================================
// SECTION: Parsed Document
// ============================================================================

/// One page's extracted text and the raw/extractable character counts used
/// by the quality score formula (spec.md §4.6.1).
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ParsedPage {
    /// One-based page number.
    pub page_number: u32,
    /// Extracted text blocks, in reading order.
    pub blocks: Vec<String>,
    /// Count of characters the parser could confidently extract (as opposed
    /// to OCR-garbled or undecodable runs).
    pub extractable_chars: u32,
    /// Total character count on the page, extractable or not.
    pub total_chars: u32,
}

impl ParsedPage {
    /// Concatenates this page's blocks into one string.
    #[must_use]
    pub fn text(&self) -> String {
        self.blocks.join("\n")
    }
}

/// A document's full parsed page structure.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ParsedDocument {
    /// Pages in order, one-based `page_number`.
    pub pages: Vec<ParsedPage>,
}

// ============================================================================
// SECTION: DocumentFetcher / DocumentParser
// ============================================================================

/// Retrieves the raw bytes of an uploaded protocol document.
#[async_trait]
pub trait DocumentFetcher: Send + Sync {
    /// Fetches the document at `file_uri`.
    ///
    /// # Errors
    /// Returns [`DocumentError::FetchFailed`] if the storage adapter cannot
    /// retrieve the bytes.
    async fn fetch(&self, file_uri: &str) -> Result<Vec<u8>, DocumentError>;
}

/// Parses raw document bytes into a page-keyed block structure.
pub trait DocumentParser: Send + Sync {
    /// Parses `bytes` into a [`ParsedDocument`].
    ///
    /// # Errors
    /// Returns [`DocumentError::ParseFailed`] if the bytes cannot be parsed.
    fn parse(&self, bytes: &[u8]) -> Result<ParsedDocument, DocumentError>;
}
