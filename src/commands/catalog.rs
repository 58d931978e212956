//! Tool catalog offered to the model, and the mapping back from tool
//! invocations to [`Command`]s

use super::{Command, CommandError, ExperienceQuery, ProjectQuery};
use crate::corpus::{DocumentType, EmbeddingType, OtherSubType, ProjectSubType};
use crate::llm::ToolDefinition;
use serde::de::DeserializeOwned;
use serde::Deserialize;
use serde_json::{json, Value};

const DOC_ID: &str = "doc_id_command";
const DOCS: &str = "docs_command";
const PROJECT: &str = "project_command";
const EXPERIENCE: &str = "experience_command";
const OTHER: &str = "other_command";
const SEARCH: &str = "search_vector_database";
const STATUS: &str = "status_command";

const MAX_QUERY_CHARS: usize = 1000;

/// Every tool name the model may invoke
pub fn tool_names() -> [&'static str; 7] {
    [DOC_ID, DOCS, PROJECT, EXPERIENCE, OTHER, SEARCH, STATUS]
}

#[derive(Deserialize)]
struct DocIdArgs {
    doc_id: String,
}

#[derive(Deserialize)]
struct DocsArgs {
    doc_type: DocumentType,
}

#[derive(Deserialize)]
#[serde(rename_all = "snake_case")]
enum ProjectSubcommand {
    List,
    Type,
    Active,
}

#[derive(Deserialize)]
struct ProjectArgs {
    subcommand: ProjectSubcommand,
    #[serde(default)]
    subtype: Option<ProjectSubType>,
}

#[derive(Deserialize)]
struct ExperienceArgs {
    subcommand: ExperienceQuery,
}

#[derive(Deserialize)]
struct OtherArgs {
    subtype: OtherSubType,
}

#[derive(Deserialize)]
struct SearchArgs {
    query: String,
    #[serde(default)]
    embedding_type: EmbeddingType,
}

fn args<T: DeserializeOwned>(tool: &str, input: &Value) -> Result<T, CommandError> {
    // Tools without parameters are sometimes invoked with a null input
    let input = if input.is_null() { json!({}) } else { input.clone() };
    serde_json::from_value(input).map_err(|e| invalid(tool, e.to_string()))
}

fn invalid(tool: &str, reason: impl Into<String>) -> CommandError {
    CommandError::InvalidArguments {
        tool: tool.to_string(),
        reason: reason.into(),
    }
}

impl Command {
    /// Translate a model tool invocation. Total: every name/input pair maps to
    /// a command or a typed error.
    pub fn from_tool(name: &str, input: &Value) -> Result<Command, CommandError> {
        match name {
            DOC_ID => {
                let DocIdArgs { doc_id } = args(name, input)?;
                let doc_id = doc_id.trim();
                if doc_id.is_empty() {
                    return Err(invalid(name, "doc_id must not be empty"));
                }
                Ok(Command::DocById {
                    doc_id: doc_id.to_string(),
                })
            }
            DOCS => {
                let DocsArgs { doc_type } = args(name, input)?;
                Ok(Command::Docs { doc_type })
            }
            PROJECT => {
                let ProjectArgs {
                    subcommand,
                    subtype,
                } = args(name, input)?;
                let query = match (subcommand, subtype) {
                    (ProjectSubcommand::List, _) => ProjectQuery::List,
                    (ProjectSubcommand::Active, _) => ProjectQuery::Active,
                    (ProjectSubcommand::Type, Some(subtype)) => ProjectQuery::Type(subtype),
                    (ProjectSubcommand::Type, None) => {
                        return Err(invalid(name, "subtype is required for the type subcommand"))
                    }
                };
                Ok(Command::Project { query })
            }
            EXPERIENCE => {
                let ExperienceArgs { subcommand } = args(name, input)?;
                Ok(Command::Experience { query: subcommand })
            }
            OTHER => {
                let OtherArgs { subtype } = args(name, input)?;
                Ok(Command::Other { subtype })
            }
            SEARCH => {
                let SearchArgs {
                    query,
                    embedding_type,
                } = args(name, input)?;
                let query = query.trim();
                if query.is_empty() {
                    return Err(invalid(name, "query must not be empty"));
                }
                if query.chars().count() > MAX_QUERY_CHARS {
                    return Err(invalid(
                        name,
                        format!("query must be at most {MAX_QUERY_CHARS} characters"),
                    ));
                }
                Ok(Command::Search {
                    query: query.to_string(),
                    embedding_type,
                })
            }
            STATUS => Ok(Command::Status),
            other => Err(CommandError::UnknownTool(other.to_string())),
        }
    }

    /// Catalog name, also used in logs and access-denied messages
    pub fn tool_name(&self) -> &'static str {
        match self {
            Command::DocById { .. } => DOC_ID,
            Command::Docs { .. } => DOCS,
            Command::Project { .. } => PROJECT,
            Command::Experience { .. } => EXPERIENCE,
            Command::Other { .. } => OTHER,
            Command::Search { .. } => SEARCH,
            Command::Status => STATUS,
            Command::Help => "help",
        }
    }
}

/// Tool definitions sent with every completion request
pub fn definitions() -> Vec<ToolDefinition> {
    let doc_types: Vec<&str> = DocumentType::ALL.iter().map(|t| t.as_str()).collect();
    let project_subtypes: Vec<&str> = ProjectSubType::ALL.iter().map(|t| t.as_str()).collect();
    let other_subtypes: Vec<&str> = OtherSubType::ALL.iter().map(|t| t.as_str()).collect();

    vec![
        ToolDefinition {
            name: DOC_ID.to_string(),
            description: "Fetch the full text of one document by its id.".to_string(),
            input_schema: json!({
                "type": "object",
                "required": ["doc_id"],
                "properties": {
                    "doc_id": {"type": "string", "description": "Document id"}
                }
            }),
        },
        ToolDefinition {
            name: DOCS.to_string(),
            description: "List all documents of one type.".to_string(),
            input_schema: json!({
                "type": "object",
                "required": ["doc_type"],
                "properties": {
                    "doc_type": {"type": "string", "enum": doc_types}
                }
            }),
        },
        ToolDefinition {
            name: PROJECT.to_string(),
            description: "Query projects: list all, list active ones, or list one subtype."
                .to_string(),
            input_schema: json!({
                "type": "object",
                "required": ["subcommand"],
                "properties": {
                    "subcommand": {"type": "string", "enum": ["list", "type", "active"]},
                    "subtype": {
                        "type": "string",
                        "enum": project_subtypes,
                        "description": "Required when subcommand is type"
                    }
                }
            }),
        },
        ToolDefinition {
            name: EXPERIENCE.to_string(),
            description: "Query work experience: list roles, total years, or aggregated skills."
                .to_string(),
            input_schema: json!({
                "type": "object",
                "required": ["subcommand"],
                "properties": {
                    "subcommand": {"type": "string", "enum": ["list", "years", "skills"]}
                }
            }),
        },
        ToolDefinition {
            name: OTHER.to_string(),
            description: "List supplementary documents of one subtype.".to_string(),
            input_schema: json!({
                "type": "object",
                "required": ["subtype"],
                "properties": {
                    "subtype": {"type": "string", "enum": other_subtypes}
                }
            }),
        },
        ToolDefinition {
            name: SEARCH.to_string(),
            description: "Semantic search across all documents. Returns the closest chunks."
                .to_string(),
            input_schema: json!({
                "type": "object",
                "required": ["query"],
                "properties": {
                    "query": {"type": "string", "maxLength": MAX_QUERY_CHARS},
                    "embedding_type": {
                        "type": "string",
                        "enum": ["none", "query", "document"],
                        "default": "none"
                    }
                }
            }),
        },
        ToolDefinition {
            name: STATUS.to_string(),
            description: "Check that the document service is healthy.".to_string(),
            input_schema: json!({"type": "object", "properties": {}}),
        },
    ]
}
