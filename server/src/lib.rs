//! HTTP surface: upload a deck, edit it by chatting, download the result.

mod error;
mod handlers;

pub use error::ApiError;
pub use handlers::{ChatRequest, ChatResponse, PPTX_MIME};

use anyhow::{Context, Result};
use axum::extract::DefaultBodyLimit;
use axum::routing::{get, post};
use axum::Router;
use slide_common::SlideConfig;
use slide_core::{ActionContext, DeckStore, ModelClient, OpenAiAdapter, StubClient};
use std::sync::Arc;
use std::time::Duration;
use tower_http::trace::TraceLayer;

/// Everything the handlers share. The store is a single slot for the whole
/// process, so every client edits the same deck.
#[derive(Clone)]
pub struct AppState {
    pub store: Arc<DeckStore>,
    pub model: Arc<dyn ModelClient>,
    pub ctx: Arc<ActionContext>,
}

impl AppState {
    pub fn new(store: DeckStore, model: Arc<dyn ModelClient>, ctx: ActionContext) -> Self {
        Self { store: Arc::new(store), model, ctx: Arc::new(ctx) }
    }

    pub fn from_config(config: &SlideConfig) -> Result<Self> {
        Ok(Self::new(
            DeckStore::new(config.output_dir()),
            model_client(config)?,
            ActionContext::new(&config.icon_path),
        ))
    }
}

/// The OpenAI client when an API key is configured, otherwise a stub that
/// answers every instruction without touching the deck.
pub fn model_client(config: &SlideConfig) -> Result<Arc<dyn ModelClient>> {
    let Some(api_key) = config.api_key.clone() else {
        tracing::warn!("OPENAI_API_KEY is not set; chat replies come from a stub model");
        return Ok(Arc::new(StubClient::default()));
    };
    let mut client = OpenAiAdapter::new_with_model(api_key, config.model.clone()).with_base_url(&config.base_url);
    if let Some(secs) = config.request_timeout_secs {
        client = client.with_timeout(Duration::from_secs(secs))?;
    }
    Ok(Arc::new(client))
}

pub fn router(state: AppState, max_upload_bytes: usize) -> Router {
    Router::new()
        .route("/upload", post(handlers::upload))
        .route("/chat", post(handlers::chat))
        .route("/download", get(handlers::download))
        .route("/health", get(handlers::health))
        .with_state(state)
        .layer(DefaultBodyLimit::max(max_upload_bytes))
        .layer(TraceLayer::new_for_http())
}

/// Bind `config.bind` and serve until the process is stopped.
pub async fn serve(config: SlideConfig) -> Result<()> {
    let state = AppState::from_config(&config)?;
    let app = router(state, config.max_upload_bytes);

    let listener = tokio::net::TcpListener::bind(config.bind)
        .await
        .with_context(|| format!("failed to bind {}", config.bind))?;
    tracing::info!(addr = %config.bind, model = %config.model, "slide server listening");

    axum::serve(listener, app).await?;
    Ok(())
}
