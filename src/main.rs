//! Cogitatio - conversational front end for a personal document service
//!
//! Routes each user input either straight to a read-only command or through
//! a bounded model/tool loop, streaming progress back over SSE.

mod api;
mod commands;
mod config;
mod corpus;
mod db;
mod llm;
mod reply;
mod runtime;
mod state_machine;
mod system_prompt;

use api::{create_router, AppState, SESSION_HEADER};
use commands::Dispatcher;
use config::AppConfig;
use corpus::HttpDocumentClient;
use db::Database;
use llm::CatalogModelClient;
use runtime::{
    CommandExecutor, DatabaseStorage, ModelClient, Orchestrator, RuntimeManager, SharedRuntime,
};
use std::net::SocketAddr;
use std::sync::Arc;
use std::time::Duration;
use tower_http::{
    compression::CompressionLayer,
    cors::{Any, CorsLayer},
    trace::TraceLayer,
};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

/// How often expired sessions are swept
const CLEANUP_INTERVAL: Duration = Duration::from_secs(60);

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    // Initialize logging
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "cogitatio=info,tower_http=debug".into()),
        )
        .with(
            tracing_subscriber::fmt::layer()
                .json()
                .with_current_span(false)
                .with_span_list(false),
        )
        .init();

    let config = AppConfig::from_env()?;

    // Ensure database directory exists
    if let Some(parent) = config.db_path.parent() {
        std::fs::create_dir_all(parent)?;
    }

    tracing::info!(path = %config.db_path.display(), "Opening database");
    let db = Database::open(&config.db_path)?;

    let service = llm::build_service(
        config.anthropic_api_key.as_deref(),
        config.gateway.as_deref(),
        &config.model,
    )?;
    let prompt = system_prompt::load_system_prompt(config.system_prompt_path.as_deref())?;
    let model_client =
        CatalogModelClient::new(service, prompt).with_max_tokens(config.max_tokens);
    let model_id = model_client.model_id().to_string();
    tracing::info!(
        model = %model_id,
        gateway = config.gateway.is_some(),
        "Model client initialized"
    );

    let corpus = HttpDocumentClient::new(&config.api_url)?;
    tracing::info!(url = %config.api_url, "Document service configured");

    let model: Arc<dyn ModelClient> = Arc::new(model_client);
    let commands: Arc<dyn CommandExecutor> =
        Arc::new(Dispatcher::new(corpus, config.search_results));
    let orchestrator = Orchestrator::new(
        DatabaseStorage::new(db.clone()),
        model,
        commands,
        config.max_turns,
    );
    let runtime = RuntimeManager::new(orchestrator);

    spawn_session_cleanup(db.clone(), runtime.clone());

    let state = AppState {
        db,
        runtime,
        session_ttl: config.session_ttl,
        model_id,
    };

    let cors = CorsLayer::new()
        .allow_origin(Any)
        .allow_methods(Any)
        .allow_headers(Any)
        .expose_headers([axum::http::HeaderName::from_static(SESSION_HEADER)]);

    let compression = CompressionLayer::new()
        .gzip(true)
        .br(true)
        .deflate(true)
        .zstd(true);

    let app = create_router(state)
        .layer(cors)
        .layer(compression)
        .layer(TraceLayer::new_for_http());

    let addr = SocketAddr::from(([0, 0, 0, 0], config.port));
    tracing::info!(
        %addr,
        max_turns = config.max_turns,
        "Cogitatio server listening"
    );

    let listener = tokio::net::TcpListener::bind(addr).await?;
    axum::serve(listener, app).await?;

    Ok(())
}

/// Periodically drop expired sessions and idle session locks
fn spawn_session_cleanup(db: Database, runtime: SharedRuntime) {
    tokio::spawn(async move {
        let mut interval = tokio::time::interval(CLEANUP_INTERVAL);
        loop {
            interval.tick().await;
            match db.cleanup_expired(chrono::Utc::now()) {
                Ok(expired) => {
                    for id in &expired {
                        runtime.locks().remove(id);
                    }
                    let pruned = runtime.locks().prune_idle();
                    if !expired.is_empty() || pruned > 0 {
                        tracing::info!(
                            sessions = expired.len(),
                            locks = pruned,
                            tracked = runtime.locks().session_count(),
                            "Cleaned up expired sessions"
                        );
                    }
                }
                Err(e) => tracing::warn!(error = %e, "Session cleanup failed"),
            }
        }
    });
}
