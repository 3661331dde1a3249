//! Clinical Intake server
//!
//! Serves the intake conversation over HTTP, backed by Gemini, a folder of
//! interview transcripts and YAML chat files.

use std::sync::Arc;

use tokio::sync::watch;
use tower_http::trace::TraceLayer;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

use clinical_intake::adapters::ai::{GeminiConfig, GeminiConnector};
use clinical_intake::adapters::bank::FileQuestionBank;
use clinical_intake::adapters::http::{chat_router, ChatAppState};
use clinical_intake::adapters::storage::FileChatStore;
use clinical_intake::application::IntakeOrchestrator;
use clinical_intake::config::AppConfig;

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    let config = AppConfig::load()?;
    init_tracing(&config);
    config.validate()?;

    let api_key = config
        .model
        .api_key
        .clone()
        .ok_or("model API key is not configured")?;
    let connector = GeminiConnector::new(
        GeminiConfig::from_secret(api_key)
            .with_model(&config.model.model)
            .with_base_url(&config.model.base_url)
            .with_timeout(config.model.timeout()),
    )?;
    let bank = FileQuestionBank::new(&config.bank.transcripts_dir, &config.bank.rubric_path)
        .with_interviewer_role(&config.bank.interviewer_role);
    let store = FileChatStore::new(&config.storage.chats_dir);

    tracing::info!(
        model = %config.model.model,
        transcripts = %config.bank.transcripts_dir.display(),
        chats = %config.storage.chats_dir.display(),
        "adapters initialized"
    );

    let orchestrator = Arc::new(IntakeOrchestrator::new(
        Arc::new(connector),
        Arc::new(bank),
        Arc::new(store),
        config.orchestrator(),
    ));

    let (shutdown_tx, shutdown_rx) = watch::channel(false);
    let sweeper = orchestrator.spawn_sweeper(
        config.sessions.sweep_interval(),
        config.sessions.idle_timeout(),
        shutdown_rx,
    );

    let app = chat_router(ChatAppState::new(orchestrator)).layer(TraceLayer::new_for_http());

    let addr = config.server.socket_addr()?;
    tracing::info!("Clinical intake server listening on {}", addr);

    let listener = tokio::net::TcpListener::bind(addr).await?;
    axum::serve(listener, app)
        .with_graceful_shutdown(async {
            if let Err(err) = tokio::signal::ctrl_c().await {
                tracing::error!(error = %err, "failed to listen for shutdown signal");
            }
        })
        .await?;

    shutdown_tx.send(true).ok();
    sweeper.await.ok();
    tracing::info!("server stopped");

    Ok(())
}

fn init_tracing(config: &AppConfig) {
    let filter = tracing_subscriber::EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| config.server.log_level.clone().into());
    let registry = tracing_subscriber::registry().with(filter);

    if config.is_production() {
        registry
            .with(
                tracing_subscriber::fmt::layer()
                    .json()
                    .with_current_span(false)
                    .with_span_list(false),
            )
            .init();
    } else {
        registry.with(tracing_subscriber::fmt::layer()).init();
    }
}
