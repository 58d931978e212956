//! Command execution against the document service

use super::experience::{skill_counts, total_years};
use super::parse::HELP_TEXT;
use super::projects::{self, summary_line};
use super::{Command, CommandError, CommandOutcome, ExperienceQuery, Privilege, ProjectQuery};
use crate::corpus::{
    CorpusError, Document, DocumentService, DocumentType, SearchRequest, TypeFilter,
};
use serde_json::json;
use std::fmt::Write as _;

const SEARCH_SNIPPET_CHARS: usize = 280;

pub const OPERATIONAL: &str = "All systems operational.";

/// Runs [`Command`]s. Handler errors never escape: they come back as
/// recoverable failure outcomes.
pub struct Dispatcher<D> {
    corpus: D,
    search_results: u8,
}

impl<D: DocumentService> Dispatcher<D> {
    pub fn new(corpus: D, search_results: u8) -> Self {
        Self {
            corpus,
            search_results: search_results.clamp(1, 20),
        }
    }

    pub async fn execute(&self, command: &Command, privilege: Privilege) -> CommandOutcome {
        let name = command.tool_name();

        if !command.permitted_for(privilege) {
            tracing::warn!(command = name, ?privilege, "Command denied");
            return CommandOutcome::access_denied(name);
        }

        match self.run(command).await {
            Ok(outcome) => {
                tracing::debug!(
                    command = name,
                    success = outcome.success,
                    "Command finished"
                );
                outcome
            }
            Err(e) => {
                tracing::warn!(command = name, error = %e, "Command failed");
                CommandOutcome::recoverable(format!("The {name} lookup failed."), &e)
            }
        }
    }

    async fn run(&self, command: &Command) -> Result<CommandOutcome, CommandError> {
        match command {
            Command::DocById { doc_id } => self.doc_by_id(doc_id).await,
            Command::Docs { doc_type } => {
                let docs = self.list(*doc_type, TypeFilter::default()).await?;
                Ok(listing(&format!("{doc_type} documents"), &docs, |d| {
                    d.title().to_string()
                }))
            }
            Command::Project { query } => self.projects(*query).await,
            Command::Experience { query } => self.experience(*query).await,
            Command::Other { subtype } => {
                let docs = self
                    .list(DocumentType::Other, TypeFilter::other(*subtype))
                    .await?;
                Ok(listing(&format!("{} documents", subtype.as_str()), &docs, |d| {
                    d.title().to_string()
                }))
            }
            Command::Search {
                query,
                embedding_type,
            } => {
                let request = SearchRequest {
                    query: query.clone(),
                    embedding_type: *embedding_type,
                    k: self.search_results,
                    filter_types: None,
                };
                let hits = self.corpus.search(&request).await?;
                if hits.is_empty() {
                    return Ok(CommandOutcome::success(
                        format!("No results for \"{query}\"."),
                        Some(json!({ "results": [] })),
                    ));
                }
                let mut message = format!("Top {} results for \"{query}\":", hits.len());
                for (i, hit) in hits.iter().enumerate() {
                    let snippet: String = hit.content.chars().take(SEARCH_SNIPPET_CHARS).collect();
                    let _ = write!(
                        message,
                        "\n{}. {} (score {:.2})\n{}",
                        i + 1,
                        hit.doc_id,
                        hit.score,
                        snippet.trim()
                    );
                }
                Ok(CommandOutcome::success(
                    message,
                    Some(json!({ "results": hits })),
                ))
            }
            Command::Status => self.status().await,
            Command::Help => Ok(CommandOutcome::success(HELP_TEXT, None)),
        }
    }

    async fn list(
        &self,
        doc_type: DocumentType,
        filter: TypeFilter,
    ) -> Result<Vec<Document>, CommandError> {
        let chunks = self.corpus.documents_by_type(doc_type, filter).await?;
        Ok(Document::assemble(chunks))
    }

    async fn doc_by_id(&self, doc_id: &str) -> Result<CommandOutcome, CommandError> {
        let chunks = self.corpus.document(doc_id).await?;
        let doc = Document::assemble(chunks)
            .into_iter()
            .next()
            .ok_or_else(|| CorpusError::NotFound(format!("document '{doc_id}'")))?;

        Ok(CommandOutcome::success(
            format!("# {}\n\n{}", doc.title(), doc.content),
            Some(json!({ "document": doc })),
        ))
    }

    async fn projects(&self, query: ProjectQuery) -> Result<CommandOutcome, CommandError> {
        let (filter, label) = match query {
            ProjectQuery::Type(subtype) => (
                TypeFilter::project(subtype),
                format!("{} projects", subtype.as_str()),
            ),
            ProjectQuery::Active => (TypeFilter::default(), "active projects".to_string()),
            ProjectQuery::List => (TypeFilter::default(), "projects".to_string()),
        };

        let mut docs = self.list(DocumentType::Project, filter).await?;
        if query == ProjectQuery::Active {
            docs = projects::active(docs);
        }
        Ok(listing(&label, &docs, summary_line))
    }

    async fn experience(&self, query: ExperienceQuery) -> Result<CommandOutcome, CommandError> {
        let docs = self
            .list(DocumentType::Experience, TypeFilter::default())
            .await?;

        match query {
            ExperienceQuery::List => Ok(listing("roles", &docs, |d| {
                let company = d.meta_str("company");
                let start = d.meta_str("date_start");
                let end = match d.meta_str("date_end") {
                    "" => "present",
                    end => end,
                };
                if company.is_empty() {
                    format!("{} ({start} to {end})", d.title())
                } else {
                    format!("{} at {company} ({start} to {end})", d.title())
                }
            })),
            ExperienceQuery::Years => {
                let summary = total_years(&docs, chrono::Utc::now().date_naive());
                Ok(CommandOutcome::success(
                    format!(
                        "About {:.1} years of experience across {} roles.",
                        summary.years, summary.roles
                    ),
                    Some(json!({
                        "years": summary.years,
                        "months": summary.months,
                        "roles": summary.roles,
                        "unparsed": summary.unparsed,
                    })),
                ))
            }
            ExperienceQuery::Skills => {
                let ranked = skill_counts(&docs);
                if ranked.is_empty() {
                    return Ok(CommandOutcome::success("No skills recorded.", None));
                }
                let message = ranked
                    .iter()
                    .map(|(skill, count)| format!("{skill} ({count})"))
                    .collect::<Vec<_>>()
                    .join(", ");
                let skills: Vec<_> = ranked
                    .iter()
                    .map(|(skill, count)| json!({ "skill": skill, "count": count }))
                    .collect();
                Ok(CommandOutcome::success(
                    format!("Skills by frequency: {message}"),
                    Some(json!({ "skills": skills })),
                ))
            }
        }
    }

    async fn status(&self) -> Result<CommandOutcome, CommandError> {
        let health = self.corpus.health().await?;
        if !health.is_healthy() {
            let err = CorpusError::Decode(format!("status '{}'", health.status));
            return Ok(CommandOutcome::recoverable(
                "The document service is not healthy.",
                &err,
            ));
        }

        let stats = match self.corpus.stats().await {
            Ok(stats) => Some(stats),
            Err(e) => {
                tracing::debug!(error = %e, "Stats unavailable");
                None
            }
        };

        let mut data = json!({ "status": health.status });
        if let Some(stats) = stats {
            data["stats"] = json!(stats);
        }
        Ok(CommandOutcome::success(OPERATIONAL, Some(data)))
    }
}

/// Bullet list of documents with a count header
fn listing(label: &str, docs: &[Document], line: impl Fn(&Document) -> String) -> CommandOutcome {
    if docs.is_empty() {
        return CommandOutcome::success(
            format!("No {label} found."),
            Some(json!({ "documents": [] })),
        );
    }

    let mut message = format!("Found {} {label}:", docs.len());
    for doc in docs {
        let _ = write!(message, "\n- {} [{}]", line(doc), doc.doc_id);
    }

    let documents: Vec<_> = docs
        .iter()
        .map(|d| json!({ "doc_id": d.doc_id, "title": d.title(), "metadata": d.metadata }))
        .collect();
    CommandOutcome::success(message, Some(json!({ "documents": documents })))
}
