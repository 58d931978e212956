//! Startup configuration from environment variables

use crate::state_machine::DEFAULT_MAX_TURNS;
use std::path::PathBuf;
use std::str::FromStr;
use thiserror::Error;

const DEFAULT_PORT: u16 = 3000;
const DEFAULT_API_URL: &str = "http://localhost:8000";
const DEFAULT_SESSION_TTL_SECS: u64 = 3600;
const DEFAULT_SEARCH_RESULTS: u8 = 3;
const DEFAULT_MAX_TOKENS: u32 = 2048;
pub const DEFAULT_MODEL: &str = "claude-4-sonnet";

#[derive(Debug, Error, PartialEq, Eq)]
pub enum ConfigError {
    #[error("{var} has invalid value '{value}'")]
    Invalid { var: &'static str, value: String },
}

#[derive(Debug, Clone)]
pub struct AppConfig {
    pub db_path: PathBuf,
    pub port: u16,
    /// Base URL of the document service
    pub api_url: String,
    pub max_turns: u32,
    /// Completion budget per model turn
    pub max_tokens: u32,
    pub session_ttl: chrono::Duration,
    pub search_results: u8,
    pub system_prompt_path: Option<PathBuf>,
    pub anthropic_api_key: Option<String>,
    pub gateway: Option<String>,
    pub model: String,
}

impl AppConfig {
    pub fn from_env() -> Result<Self, ConfigError> {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    /// Build from any key lookup. Empty values count as unset.
    pub fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> Result<Self, ConfigError> {
        let get = |key: &str| lookup(key).filter(|v| !v.trim().is_empty());

        let db_path = get("COGITATIO_DB_PATH").map_or_else(
            || {
                let home = get("HOME").unwrap_or_else(|| "/tmp".to_string());
                PathBuf::from(home).join(".cogitatio").join("cogitatio.db")
            },
            PathBuf::from,
        );

        let ttl_secs: u64 = parse(&get, "COGITATIO_SESSION_TTL_SECS", DEFAULT_SESSION_TTL_SECS)?;
        let session_ttl = i64::try_from(ttl_secs)
            .ok()
            .and_then(chrono::Duration::try_seconds)
            .ok_or(ConfigError::Invalid {
                var: "COGITATIO_SESSION_TTL_SECS",
                value: ttl_secs.to_string(),
            })?;

        let max_turns: u32 = parse(&get, "COGITATIO_MAX_TURNS", DEFAULT_MAX_TURNS)?;
        if max_turns == 0 {
            return Err(ConfigError::Invalid {
                var: "COGITATIO_MAX_TURNS",
                value: "0".to_string(),
            });
        }

        Ok(Self {
            db_path,
            port: parse(&get, "COGITATIO_PORT", DEFAULT_PORT)?,
            api_url: get("COGITATIO_API_URL")
                .unwrap_or_else(|| DEFAULT_API_URL.to_string())
                .trim_end_matches('/')
                .to_string(),
            max_turns,
            max_tokens: parse(&get, "COGITATIO_MAX_TOKENS", DEFAULT_MAX_TOKENS)?,
            session_ttl,
            search_results: parse(&get, "COGITATIO_SEARCH_RESULTS", DEFAULT_SEARCH_RESULTS)?
                .clamp(1, 20),
            system_prompt_path: get("COGITATIO_SYSTEM_PROMPT_PATH").map(PathBuf::from),
            anthropic_api_key: get("ANTHROPIC_API_KEY"),
            gateway: get("LLM_GATEWAY"),
            model: get("DEFAULT_MODEL").unwrap_or_else(|| DEFAULT_MODEL.to_string()),
        })
    }
}

fn parse<T: FromStr>(
    get: &impl Fn(&str) -> Option<String>,
    var: &'static str,
    default: T,
) -> Result<T, ConfigError> {
    match get(var) {
        None => Ok(default),
        Some(value) => value
            .trim()
            .parse()
            .map_err(|_| ConfigError::Invalid { var, value }),
    }
}
