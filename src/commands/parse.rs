//! Slash command syntax

use super::{Command, CommandError, ExperienceQuery, ProjectQuery};
use crate::corpus::{DocumentType, EmbeddingType, OtherSubType, ProjectSubType};

pub const HELP_TEXT: &str = "Available commands:
/status                      check the document service
/doc <id>                    show one document
/docs <type>                 list documents (experience, education, project, other)
/project list|active         list projects
/project type <subtype>      list projects (product, process, infrastructure, self_referential)
/experience list|years|skills
/other <subtype>             cover-letter, publication-speaking, recommendation, thought-leadership
/help                        this message
Anything else is answered conversationally.";

const DOC_USAGE: &str = "/doc <id>";
const DOCS_USAGE: &str = "/docs experience|education|project|other";
const PROJECT_USAGE: &str =
    "/project list | /project active | /project type product|process|infrastructure|self_referential";
const EXPERIENCE_USAGE: &str = "/experience list|years|skills";
const OTHER_USAGE: &str =
    "/other cover-letter|publication-speaking|recommendation|thought-leadership";
const SEARCH_USAGE: &str = "/search <query>";

/// Input starting with `/` is a direct command
pub fn is_direct(input: &str) -> bool {
    input.trim_start().starts_with('/')
}

/// Parse a direct command line
pub fn parse_direct(input: &str) -> Result<Command, CommandError> {
    let line = input.trim();
    let line = line.strip_prefix('/').unwrap_or(line);
    let (name, rest) = line
        .split_once(char::is_whitespace)
        .map_or((line, ""), |(n, r)| (n, r.trim()));
    let args: Vec<&str> = rest.split_whitespace().collect();
    let name = name.to_ascii_lowercase();

    match (name.as_str(), args.as_slice()) {
        ("status", []) => Ok(Command::Status),
        ("help", _) => Ok(Command::Help),
        ("doc", [doc_id]) => Ok(Command::DocById {
            doc_id: (*doc_id).to_string(),
        }),
        ("doc", _) => Err(CommandError::Usage(DOC_USAGE)),
        ("docs", [doc_type]) => DocumentType::parse(doc_type)
            .map(|doc_type| Command::Docs { doc_type })
            .ok_or(CommandError::Usage(DOCS_USAGE)),
        ("docs", _) => Err(CommandError::Usage(DOCS_USAGE)),
        ("project", ["list"]) => Ok(Command::Project {
            query: ProjectQuery::List,
        }),
        ("project", ["active"]) => Ok(Command::Project {
            query: ProjectQuery::Active,
        }),
        ("project", ["type", subtype]) => ProjectSubType::parse(subtype)
            .map(|s| Command::Project {
                query: ProjectQuery::Type(s),
            })
            .ok_or(CommandError::Usage(PROJECT_USAGE)),
        ("project", _) => Err(CommandError::Usage(PROJECT_USAGE)),
        ("experience", [sub]) => {
            let query = match *sub {
                "list" => ExperienceQuery::List,
                "years" => ExperienceQuery::Years,
                "skills" => ExperienceQuery::Skills,
                _ => return Err(CommandError::Usage(EXPERIENCE_USAGE)),
            };
            Ok(Command::Experience { query })
        }
        ("experience", _) => Err(CommandError::Usage(EXPERIENCE_USAGE)),
        ("other", [subtype]) => OtherSubType::parse(subtype)
            .map(|subtype| Command::Other { subtype })
            .ok_or(CommandError::Usage(OTHER_USAGE)),
        ("other", _) => Err(CommandError::Usage(OTHER_USAGE)),
        ("search", []) => Err(CommandError::Usage(SEARCH_USAGE)),
        ("search", _) => Ok(Command::Search {
            query: rest.to_string(),
            embedding_type: EmbeddingType::None,
        }),
        ("status", _) => Err(CommandError::Usage("/status")),
        _ => Err(CommandError::UnknownCommand(name)),
    }
}
