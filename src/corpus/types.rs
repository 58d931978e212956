//! Wire types for the document service

use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::collections::BTreeMap;
use std::fmt;

/// Top-level document category
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum DocumentType {
    Experience,
    Education,
    Project,
    Other,
}

impl DocumentType {
    pub const ALL: [DocumentType; 4] = [
        DocumentType::Experience,
        DocumentType::Education,
        DocumentType::Project,
        DocumentType::Other,
    ];

    pub fn as_str(self) -> &'static str {
        match self {
            DocumentType::Experience => "experience",
            DocumentType::Education => "education",
            DocumentType::Project => "project",
            DocumentType::Other => "other",
        }
    }

    pub fn parse(s: &str) -> Option<Self> {
        Self::ALL.into_iter().find(|t| t.as_str() == s)
    }
}

impl fmt::Display for DocumentType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Project document subtype
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ProjectSubType {
    Product,
    Process,
    Infrastructure,
    SelfReferential,
}

impl ProjectSubType {
    pub const ALL: [ProjectSubType; 4] = [
        ProjectSubType::Product,
        ProjectSubType::Process,
        ProjectSubType::Infrastructure,
        ProjectSubType::SelfReferential,
    ];

    pub fn as_str(self) -> &'static str {
        match self {
            ProjectSubType::Product => "product",
            ProjectSubType::Process => "process",
            ProjectSubType::Infrastructure => "infrastructure",
            ProjectSubType::SelfReferential => "self_referential",
        }
    }

    pub fn parse(s: &str) -> Option<Self> {
        Self::ALL.into_iter().find(|t| t.as_str() == s)
    }
}

/// Subtype of documents filed under `other`
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum OtherSubType {
    CoverLetter,
    PublicationSpeaking,
    Recommendation,
    ThoughtLeadership,
}

impl OtherSubType {
    pub const ALL: [OtherSubType; 4] = [
        OtherSubType::CoverLetter,
        OtherSubType::PublicationSpeaking,
        OtherSubType::Recommendation,
        OtherSubType::ThoughtLeadership,
    ];

    pub fn as_str(self) -> &'static str {
        match self {
            OtherSubType::CoverLetter => "cover-letter",
            OtherSubType::PublicationSpeaking => "publication-speaking",
            OtherSubType::Recommendation => "recommendation",
            OtherSubType::ThoughtLeadership => "thought-leadership",
        }
    }

    pub fn parse(s: &str) -> Option<Self> {
        Self::ALL.into_iter().find(|t| t.as_str() == s)
    }
}

/// How the search query is embedded before lookup
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum EmbeddingType {
    #[default]
    None,
    Query,
    Document,
}

/// Optional subtype filter for type listings
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct TypeFilter {
    pub project_subtype: Option<ProjectSubType>,
    pub other_subtype: Option<OtherSubType>,
}

impl TypeFilter {
    pub fn project(subtype: ProjectSubType) -> Self {
        Self {
            project_subtype: Some(subtype),
            other_subtype: None,
        }
    }

    pub fn other(subtype: OtherSubType) -> Self {
        Self {
            project_subtype: None,
            other_subtype: Some(subtype),
        }
    }

    /// Query string pairs, omitting unset filters
    pub fn query_pairs(&self) -> Vec<(&'static str, &'static str)> {
        let mut pairs = Vec::new();
        if let Some(p) = self.project_subtype {
            pairs.push(("project_subtype", p.as_str()));
        }
        if let Some(o) = self.other_subtype {
            pairs.push(("other_subtype", o.as_str()));
        }
        pairs
    }
}

/// `POST /search` body
#[derive(Debug, Clone, Serialize)]
pub struct SearchRequest {
    pub query: String,
    pub embedding_type: EmbeddingType,
    pub k: u8,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub filter_types: Option<Vec<DocumentType>>,
}

/// One stored chunk of a document
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DocumentChunk {
    pub doc_id: String,
    pub chunk_id: String,
    pub total_chunks: u32,
    pub content: String,
    #[serde(default)]
    pub metadata: Value,
}

impl DocumentChunk {
    /// Chunk ids are `{doc_id}_{index}`
    pub fn index(&self) -> Option<u32> {
        self.chunk_id
            .rsplit_once('_')
            .and_then(|(_, idx)| idx.parse().ok())
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SearchHit {
    pub doc_id: String,
    pub chunk_id: String,
    pub score: f64,
    pub content: String,
    #[serde(default)]
    pub metadata: Value,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Stats {
    pub total_vectors: u64,
    pub total_documents: u64,
    pub vectors_in_metadata: u64,
    pub dimension: u64,
    pub index_size_mb: f64,
}

#[derive(Debug, Clone, Deserialize)]
pub struct Health {
    pub status: String,
}

impl Health {
    pub fn is_healthy(&self) -> bool {
        self.status == "healthy"
    }
}

/// A document reassembled from its chunks
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Document {
    pub doc_id: String,
    pub content: String,
    pub metadata: Value,
}

impl Document {
    /// Group chunks by document and join each document's chunks in chunk
    /// order. Documents come out in order of first appearance.
    pub fn assemble(chunks: Vec<DocumentChunk>) -> Vec<Document> {
        let mut order: Vec<String> = Vec::new();
        let mut grouped: BTreeMap<String, Vec<DocumentChunk>> = BTreeMap::new();

        for chunk in chunks {
            if !grouped.contains_key(&chunk.doc_id) {
                order.push(chunk.doc_id.clone());
            }
            grouped.entry(chunk.doc_id.clone()).or_default().push(chunk);
        }

        order
            .into_iter()
            .filter_map(|doc_id| {
                let mut parts = grouped.remove(&doc_id)?;
                parts.sort_by(|a, b| {
                    a.index()
                        .cmp(&b.index())
                        .then_with(|| a.chunk_id.cmp(&b.chunk_id))
                });
                let metadata = parts
                    .first()
                    .map(|c| c.metadata.clone())
                    .unwrap_or_default();
                let content = parts
                    .into_iter()
                    .map(|c| c.content)
                    .collect::<Vec<_>>()
                    .join("\n\n");
                Some(Document {
                    doc_id,
                    content,
                    metadata,
                })
            })
            .collect()
    }

    /// String metadata field, empty when absent
    pub fn meta_str(&self, key: &str) -> &str {
        self.metadata
            .get(key)
            .and_then(Value::as_str)
            .unwrap_or_default()
    }

    /// Display title, falling back to the id
    pub fn title(&self) -> &str {
        match self.meta_str("title") {
            "" => &self.doc_id,
            title => title,
        }
    }
}
