//! reqwest implementation of [`DocumentService`]

use super::{
    CorpusError, CorpusResult, DocumentChunk, DocumentService, DocumentType, Health, SearchHit,
    SearchRequest, Stats, TypeFilter,
};
use async_trait::async_trait;
use reqwest::{Client, RequestBuilder, StatusCode};
use serde::de::DeserializeOwned;
use std::time::Duration;

pub struct HttpDocumentClient {
    client: Client,
    base_url: String,
}

impl HttpDocumentClient {
    pub fn new(base_url: &str) -> CorpusResult<Self> {
        let client = Client::builder()
            .timeout(Duration::from_secs(30))
            .build()
            .map_err(|e| CorpusError::Network(format!("Failed to create HTTP client: {e}")))?;

        Ok(Self {
            client,
            base_url: base_url.trim_end_matches('/').to_string(),
        })
    }

    fn url(&self, path: &str) -> String {
        format!("{}{path}", self.base_url)
    }

    async fn fetch<T: DeserializeOwned>(
        &self,
        request: RequestBuilder,
        what: &str,
    ) -> CorpusResult<T> {
        let response = request.send().await.map_err(|e| {
            if e.is_timeout() {
                CorpusError::Network(format!("Request timeout: {e}"))
            } else {
                CorpusError::Network(e.to_string())
            }
        })?;

        let status = response.status();
        if status == StatusCode::NOT_FOUND {
            return Err(CorpusError::NotFound(what.to_string()));
        }

        let body = response
            .text()
            .await
            .map_err(|e| CorpusError::Network(format!("Failed to read response: {e}")))?;

        if !status.is_success() {
            return Err(CorpusError::Status {
                status: status.as_u16(),
                body,
            });
        }

        serde_json::from_str(&body).map_err(|e| CorpusError::Decode(e.to_string()))
    }
}

#[async_trait]
impl DocumentService for HttpDocumentClient {
    async fn health(&self) -> CorpusResult<Health> {
        self.fetch(self.client.get(self.url("/health")), "health")
            .await
    }

    async fn stats(&self) -> CorpusResult<Stats> {
        self.fetch(self.client.get(self.url("/stats")), "stats")
            .await
    }

    async fn document(&self, doc_id: &str) -> CorpusResult<Vec<DocumentChunk>> {
        let mut url = reqwest::Url::parse(&self.url("/documents/"))
            .map_err(|e| CorpusError::Network(format!("Invalid document service URL: {e}")))?;
        url.path_segments_mut()
            .map_err(|()| {
                CorpusError::Network("Document service URL cannot be a base".to_string())
            })?
            .pop_if_empty()
            .push(doc_id);

        let chunks: Vec<DocumentChunk> = self
            .fetch(self.client.get(url), &format!("document '{doc_id}'"))
            .await?;
        if chunks.is_empty() {
            return Err(CorpusError::NotFound(format!("document '{doc_id}'")));
        }
        Ok(chunks)
    }

    async fn documents_by_type(
        &self,
        doc_type: DocumentType,
        filter: TypeFilter,
    ) -> CorpusResult<Vec<DocumentChunk>> {
        let request = self
            .client
            .get(self.url(&format!("/documents/type/{}", doc_type.as_str())))
            .query(&filter.query_pairs());
        self.fetch(request, &format!("documents of type '{doc_type}'"))
            .await
    }

    async fn search(&self, request: &SearchRequest) -> CorpusResult<Vec<SearchHit>> {
        tracing::debug!(query = %request.query, k = request.k, "Searching documents");
        let builder = self.client.post(self.url("/search")).json(request);
        self.fetch(builder, "search").await
    }
}
