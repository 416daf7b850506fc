use crate::error::ApiError;
use crate::AppState;
use axum::body::Bytes;
use axum::extract::multipart::{Multipart, MultipartRejection};
use axum::extract::State;
use axum::http::header;
use axum::response::{IntoResponse, Response};
use axum::Json;
use serde::{Deserialize, Serialize};
use slide_core::resolver::resolve_and_apply;
use slide_core::Deck;

pub const PPTX_MIME: &str = "application/vnd.openxmlformats-officedocument.presentationml.presentation";

#[derive(Debug, Serialize)]
pub struct MessageBody {
    pub message: String,
}

#[derive(Debug, Default, Deserialize)]
pub struct ChatRequest {
    #[serde(default)]
    pub message: String,
}

#[derive(Debug, Serialize)]
pub struct ChatResponse {
    pub response: String,
}

/// `POST /upload`: load the `file` field as the current deck.
pub async fn upload(
    State(state): State<AppState>,
    multipart: Result<Multipart, MultipartRejection>,
) -> Result<Json<MessageBody>, ApiError> {
    let mut multipart = multipart.map_err(|e| {
        tracing::warn!("upload is not a multipart form: {e}");
        ApiError::bad_request("No file uploaded.")
    })?;

    let mut upload = None;
    while let Some(field) = multipart
        .next_field()
        .await
        .map_err(|e| ApiError::bad_request(e.body_text()))?
    {
        if field.name() == Some("file") {
            let filename = field.file_name().map(str::to_string);
            let bytes = field.bytes().await.map_err(|e| ApiError::bad_request(e.body_text()))?;
            upload = Some((filename, bytes));
            break;
        }
    }
    let Some((filename, bytes)) = upload else {
        return Err(ApiError::bad_request("No file uploaded."));
    };

    let deck = tokio::task::spawn_blocking(move || Deck::from_bytes(&bytes))
        .await
        .map_err(std::io::Error::other)?
        .map_err(|e| {
            tracing::warn!(?filename, "rejected upload: {e}");
            ApiError::bad_request("Uploaded file is not a valid presentation.")
        })?;

    let slides = deck.slide_count();
    let mut store = state.store.lock().await;
    store.load(deck).await?;
    tracing::info!(?filename, slides, "presentation loaded");

    Ok(Json(MessageBody { message: "Presentation loaded.".to_string() }))
}

/// `POST /chat`: resolve one instruction, apply it and save the deck.
pub async fn chat(State(state): State<AppState>, body: Bytes) -> Result<Json<ChatResponse>, ApiError> {
    let mut store = state.store.lock().await;
    let Some(deck) = store.deck_mut() else {
        return Err(ApiError::bad_request("No presentation loaded."));
    };

    let request: ChatRequest = if body.is_empty() {
        ChatRequest::default()
    } else {
        serde_json::from_slice(&body)
            .map_err(|e| ApiError::bad_request(format!("Invalid chat request: {e}")))?
    };
    tracing::info!(message = %request.message, "received instruction");

    let response = resolve_and_apply(state.model.as_ref(), deck, &request.message, &state.ctx).await?;
    store.save().await?;

    Ok(Json(ChatResponse { response }))
}

/// `GET /download`: the most recently saved copy of the deck.
pub async fn download(State(state): State<AppState>) -> Result<Response, ApiError> {
    let path = {
        let store = state.store.lock().await;
        store.file_path().map(|p| p.to_path_buf())
    };
    let Some(path) = path else {
        return Err(ApiError::not_found("No file available."));
    };

    let bytes = tokio::fs::read(&path).await?;
    let filename = path
        .file_name()
        .map(|n| n.to_string_lossy().into_owned())
        .unwrap_or_else(|| "presentation.pptx".to_string());
    tracing::debug!(path = %path.display(), bytes = bytes.len(), "serving download");

    Ok((
        [
            (header::CONTENT_TYPE, PPTX_MIME.to_string()),
            (header::CONTENT_DISPOSITION, format!("attachment; filename=\"{filename}\"")),
        ],
        bytes,
    )
        .into_response())
}

#[derive(Debug, Serialize)]
pub struct Health {
    pub status: &'static str,
}

pub async fn health() -> Json<Health> {
    Json(Health { status: "ok" })
}
