//! Client side of the Cogitatio document service
//!
//! The service stores resume-style documents split into chunks and exposes
//! lookup by id, listing by type, and vector search.

mod client;
mod types;

pub use client::HttpDocumentClient;
pub use types::*;

use async_trait::async_trait;
use std::sync::Arc;
use thiserror::Error;

#[derive(Error, Debug)]
pub enum CorpusError {
    #[error("Document service unreachable: {0}")]
    Network(String),
    #[error("Not found: {0}")]
    NotFound(String),
    #[error("Document service returned HTTP {status}: {body}")]
    Status { status: u16, body: String },
    #[error("Unexpected response from document service: {0}")]
    Decode(String),
}

pub type CorpusResult<T> = Result<T, CorpusError>;

/// Read-only queries against the document service
#[async_trait]
pub trait DocumentService: Send + Sync {
    async fn health(&self) -> CorpusResult<Health>;

    async fn stats(&self) -> CorpusResult<Stats>;

    /// All chunks of one document
    async fn document(&self, doc_id: &str) -> CorpusResult<Vec<DocumentChunk>>;

    async fn documents_by_type(
        &self,
        doc_type: DocumentType,
        filter: TypeFilter,
    ) -> CorpusResult<Vec<DocumentChunk>>;

    async fn search(&self, request: &SearchRequest) -> CorpusResult<Vec<SearchHit>>;
}

#[async_trait]
impl<T: DocumentService + ?Sized> DocumentService for Arc<T> {
    async fn health(&self) -> CorpusResult<Health> {
        (**self).health().await
    }

    async fn stats(&self) -> CorpusResult<Stats> {
        (**self).stats().await
    }

    async fn document(&self, doc_id: &str) -> CorpusResult<Vec<DocumentChunk>> {
        (**self).document(doc_id).await
    }

    async fn documents_by_type(
        &self,
        doc_type: DocumentType,
        filter: TypeFilter,
    ) -> CorpusResult<Vec<DocumentChunk>> {
        (**self).documents_by_type(doc_type, filter).await
    }

    async fn search(&self, request: &SearchRequest) -> CorpusResult<Vec<SearchHit>> {
        (**self).search(request).await
    }
}
