use std::sync::Arc;

use axum::body::Bytes;
use axum::{
    Json, Router,
    extract::State,
    http::{HeaderMap, StatusCode},
    response::IntoResponse,
    routing::{get, post},
};
use serde_json::json;
use tower::ServiceBuilder;
use tower_http::trace::TraceLayer;
use tracing::{debug, info, warn};

use super::auth;
use crate::channel::{TelegramClient, TelegramUpdate};
use crate::config::ConfideConfig;
use crate::dedup::UpdateGuard;
use crate::history::HistoryRotator;
use crate::inference::InferenceProvider;
use crate::inference::openai::OpenAiProvider;
use crate::pipeline::MessageProcessor;
use crate::store::DocumentStore;
use crate::store::memory::MemoryStore;

pub struct AppState {
    pub guard: UpdateGuard,
    pub processor: Arc<MessageProcessor>,
    pub webhook_secret: Option<String>,
}

/// Wire up every component and serve the webhook gateway.
pub async fn run(config: ConfideConfig) -> anyhow::Result<()> {
    let bot_token = config
        .telegram
        .bot_token
        .clone()
        .ok_or_else(|| anyhow::anyhow!("telegram.bot_token is not configured"))?;

    let retry = config.retry.policy();
    let store: Arc<dyn DocumentStore> = Arc::new(MemoryStore::new());
    let provider: Arc<dyn InferenceProvider> =
        Arc::new(OpenAiProvider::new(&config.provider, retry.clone())?);
    let channel = Arc::new(TelegramClient::new(&bot_token, retry));

    let rotator = HistoryRotator::new(Arc::clone(&store), Arc::clone(&provider), &config.memory);
    let processor = Arc::new(MessageProcessor::new(
        Arc::clone(&store),
        provider,
        channel,
        rotator,
    ));

    let state = Arc::new(AppState {
        guard: UpdateGuard::new(store),
        processor,
        webhook_secret: config.telegram.webhook_secret.clone(),
    });

    let app = Router::new()
        .route("/health", get(health))
        .route("/webhook", post(webhook_handler))
        .layer(ServiceBuilder::new().layer(TraceLayer::new_for_http()))
        .with_state(state);

    let addr = format!("{}:{}", config.gateway.bind, config.gateway.port);
    let listener = tokio::net::TcpListener::bind(&addr).await?;

    info!("confide gateway listening on {addr}");
    if config.telegram.webhook_secret.is_none() {
        warn!("no webhook secret configured, deliveries are not authenticated");
    }

    axum::serve(listener, app).await?;
    Ok(())
}

async fn health() -> &'static str {
    "ok"
}

/// Webhook endpoint. Telegram is acknowledged immediately regardless of
/// downstream outcome; actual processing runs on a spawned worker task.
async fn webhook_handler(
    State(state): State<Arc<AppState>>,
    headers: HeaderMap,
    body: Bytes,
) -> impl IntoResponse {
    let header = headers
        .get("x-telegram-bot-api-secret-token")
        .and_then(|v| v.to_str().ok());
    if !auth::verify_secret(header, &state.webhook_secret) {
        warn!("webhook delivery with missing or wrong secret token");
        return (StatusCode::UNAUTHORIZED, Json(json!({"status": "unauthorized"})));
    }

    let update: TelegramUpdate = match serde_json::from_slice(&body) {
        Ok(update) => update,
        Err(e) => {
            warn!("malformed webhook payload: {e}");
            return (StatusCode::BAD_REQUEST, Json(json!({"status": "bad request"})));
        }
    };

    handle_update(&state, update).await;
    (StatusCode::OK, Json(json!({"status": "ok"})))
}

/// Gate one update through the idempotency guard and, if it is new,
/// dispatch its processing in the background. Marking happens before the
/// dispatch so a concurrent duplicate delivery cannot slip past the
/// check. Returns whether the update was dispatched.
pub async fn handle_update(state: &AppState, update: TelegramUpdate) -> bool {
    let update_id = update.update_id;

    if state.guard.has_processed(update_id).await {
        debug!(update_id, "duplicate update, skipping");
        return false;
    }
    state.guard.mark_processed(update_id).await;

    let processor = Arc::clone(&state.processor);
    tokio::spawn(async move {
        processor.process(update).await;
    });
    true
}
