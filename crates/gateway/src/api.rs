//! Chat REST API.
//!
//! Endpoints:
//!
//! - `POST   /chats`                          — Create a chat
//! - `GET    /chats/{uid}`                    — List a user's chats, newest first
//! - `GET    /chats/{uid}/{chatId}`           — Get one chat
//! - `DELETE /chats/{uid}/{chatId}`           — Delete a chat
//! - `POST   /chats/{uid}/{chatId}/message`   — Send a message (multipart, optional PDF)
//! - `PATCH  /chats/{uid}/{chatId}/rename`    — Rename a chat
//! - `GET    /chats/{uid}/{chatId}/summary`   — Summarize a chat
//! - `POST   /chats/{chatId}/pdf`             — Store a statement without a message
//! - `POST   /chats/insights`                 — Insights on a chat's latest statement

use axum::{
    Router,
    extract::{Multipart, Path, State, multipart::MultipartError},
    http::StatusCode,
    response::{IntoResponse, Json, Response},
    routing::{get, patch, post},
};
use serde::{Deserialize, Serialize};
use tracing::{debug, error, info};

use fintrack_core::error::ChatError;
use fintrack_core::extractor::Attachment;
use fintrack_core::message::{Chat, ChatId, Message};
use fintrack_pipeline::SendMessage;

use crate::SharedState;

/// Build the chat router.
pub fn chat_router(state: SharedState) -> Router {
    Router::new()
        .route("/chats", post(create_chat_handler))
        .route("/chats/insights", post(insight_handler))
        .route("/chats/{uid}", get(list_chats_handler))
        // The first segment is the chat id here; it shares the `{uid}` name
        // because sibling routes must agree on parameter names.
        .route("/chats/{uid}/pdf", post(upload_pdf_handler))
        .route(
            "/chats/{uid}/{chat_id}",
            get(get_chat_handler).delete(delete_chat_handler),
        )
        .route("/chats/{uid}/{chat_id}/message", post(send_message_handler))
        .route("/chats/{uid}/{chat_id}/rename", patch(rename_chat_handler))
        .route("/chats/{uid}/{chat_id}/summary", get(summary_handler))
        .with_state(state)
}

// ── Errors ────────────────────────────────────────────────────────────────

#[derive(Debug, Serialize)]
struct ErrorResponse {
    error: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    details: Option<String>,
}

/// A failed request: status code plus `{error, details}` body.
#[derive(Debug)]
pub struct ApiError {
    status: StatusCode,
    error: String,
    details: Option<String>,
}

impl ApiError {
    fn bad_request(message: impl Into<String>) -> Self {
        Self {
            status: StatusCode::BAD_REQUEST,
            error: message.into(),
            details: None,
        }
    }

    pub fn status(&self) -> StatusCode {
        self.status
    }
}

impl From<ChatError> for ApiError {
    fn from(err: ChatError) -> Self {
        let (status, error) = match &err {
            ChatError::BadRequest(_) => (StatusCode::BAD_REQUEST, "Bad request"),
            ChatError::NotFound(_) => (StatusCode::NOT_FOUND, "Not found"),
            ChatError::Conflict(_) => (StatusCode::CONFLICT, "Chat was modified concurrently"),
            ChatError::Extraction(_) => (
                StatusCode::UNPROCESSABLE_ENTITY,
                "Failed to extract text from PDF",
            ),
            ChatError::Cipher(_) => (
                StatusCode::INTERNAL_SERVER_ERROR,
                "Failed to decrypt stored statement",
            ),
            ChatError::Gateway(_) => (StatusCode::BAD_GATEWAY, "Model request failed"),
            ChatError::Storage(_) => (StatusCode::INTERNAL_SERVER_ERROR, "Storage failure"),
            ChatError::Configuration { .. } => {
                (StatusCode::INTERNAL_SERVER_ERROR, "Server misconfigured")
            }
        };

        if status.is_server_error() {
            error!(error = %err, status = status.as_u16(), "Request failed");
        } else {
            debug!(error = %err, status = status.as_u16(), "Request rejected");
        }

        Self {
            status,
            error: error.into(),
            details: Some(err.to_string()),
        }
    }
}

impl From<MultipartError> for ApiError {
    fn from(err: MultipartError) -> Self {
        Self {
            status: err.status(),
            error: "Invalid multipart body".into(),
            details: Some(err.body_text()),
        }
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        (
            self.status,
            Json(ErrorResponse {
                error: self.error,
                details: self.details,
            }),
        )
            .into_response()
    }
}

type ApiResult<T> = Result<T, ApiError>;

// ── DTOs ──────────────────────────────────────────────────────────────────

#[derive(Deserialize)]
struct CreateChatRequest {
    uid: Option<String>,
    title: Option<String>,
}

#[derive(Serialize)]
#[serde(rename_all = "camelCase")]
struct CreateChatResponse {
    success: bool,
    chat_id: ChatId,
}

#[derive(Serialize)]
struct MessagesResponse {
    success: bool,
    messages: Vec<Message>,
}

#[derive(Serialize)]
struct NoticeResponse {
    message: &'static str,
}

#[derive(Deserialize)]
#[serde(rename_all = "camelCase")]
struct InsightRequest {
    chat_id: Option<String>,
}

#[derive(Serialize)]
struct InsightResponse {
    insight: String,
}

#[derive(Serialize)]
struct AckResponse {
    success: bool,
    message: &'static str,
}

#[derive(Deserialize)]
struct RenameRequest {
    title: Option<String>,
}

#[derive(Serialize)]
struct SummaryResponse {
    success: bool,
    summary: String,
}

// ── Multipart ─────────────────────────────────────────────────────────────

/// Text fields and the optional `file` part of a multipart form.
#[derive(Default)]
struct FormData {
    fields: std::collections::HashMap<String, String>,
    file: Option<Attachment>,
}

impl FormData {
    fn take(&mut self, name: &str) -> Option<String> {
        self.fields.remove(name)
    }
}

async fn read_form(mut multipart: Multipart) -> ApiResult<FormData> {
    let mut form = FormData::default();

    while let Some(field) = multipart.next_field().await? {
        let Some(name) = field.name().map(str::to_string) else {
            continue;
        };

        if name == "file" {
            let file_name = field.file_name().unwrap_or_default().to_string();
            let content_type = field.content_type().map(str::to_string);
            let bytes = field.bytes().await?;

            // Browsers send an empty part when no file was chosen.
            if bytes.is_empty() && file_name.is_empty() {
                continue;
            }
            form.file = Some(Attachment::new(file_name, content_type, bytes.to_vec()));
        } else {
            let value = field.text().await?;
            form.fields.insert(name, value);
        }
    }

    Ok(form)
}

// ── Handlers ──────────────────────────────────────────────────────────────

async fn create_chat_handler(
    State(state): State<SharedState>,
    Json(payload): Json<CreateChatRequest>,
) -> ApiResult<(StatusCode, Json<CreateChatResponse>)> {
    let uid = payload.uid.unwrap_or_default();
    let chat_id = state
        .service
        .create_chat(&uid, payload.title.as_deref())
        .await?;

    Ok((
        StatusCode::CREATED,
        Json(CreateChatResponse {
            success: true,
            chat_id,
        }),
    ))
}

async fn list_chats_handler(
    State(state): State<SharedState>,
    Path(uid): Path<String>,
) -> ApiResult<Json<Vec<Chat>>> {
    Ok(Json(state.service.list_chats(&uid).await?))
}

async fn get_chat_handler(
    State(state): State<SharedState>,
    Path((uid, chat_id)): Path<(String, String)>,
) -> ApiResult<Json<Chat>> {
    Ok(Json(
        state
            .service
            .get_chat(&uid, &ChatId::from(chat_id.as_str()))
            .await?,
    ))
}

async fn send_message_handler(
    State(state): State<SharedState>,
    Path((uid, chat_id)): Path<(String, String)>,
    multipart: Multipart,
) -> ApiResult<Json<MessagesResponse>> {
    let mut form = read_form(multipart).await?;

    // Message times are assigned server-side.
    if let Some(client_ts) = form.take("timestamp") {
        debug!(client_timestamp = %client_ts, "Ignoring client timestamp");
    }

    let request = SendMessage {
        role: form.take("role"),
        content: form.take("content"),
        attachment: form.file.take(),
    };

    info!(
        chat_id = %chat_id,
        uid = %uid,
        with_file = request.attachment.is_some(),
        "Message received"
    );

    let messages = state
        .service
        .send_message(&uid, &ChatId::from(chat_id.as_str()), request)
        .await?;

    Ok(Json(MessagesResponse {
        success: true,
        messages,
    }))
}

async fn upload_pdf_handler(
    State(state): State<SharedState>,
    Path(path_chat_id): Path<String>,
    multipart: Multipart,
) -> ApiResult<Json<NoticeResponse>> {
    let mut form = read_form(multipart).await?;

    let uid = form.take("uid").unwrap_or_default();
    if let Some(body_chat_id) = form.take("chatId") {
        if !body_chat_id.is_empty() && body_chat_id != path_chat_id {
            return Err(ApiError::bad_request("chatId in body does not match path"));
        }
    }
    let file = form
        .file
        .take()
        .ok_or_else(|| ApiError::bad_request("Missing file"))?;

    state
        .service
        .upload_document(&uid, &ChatId::from(path_chat_id.as_str()), file)
        .await?;

    Ok(Json(NoticeResponse {
        message: "PDF processed and stored securely",
    }))
}

async fn insight_handler(
    State(state): State<SharedState>,
    Json(payload): Json<InsightRequest>,
) -> ApiResult<Json<InsightResponse>> {
    let chat_id = payload.chat_id.unwrap_or_default();
    let insight = state
        .service
        .generate_insight(&ChatId::from(chat_id.as_str()))
        .await?;
    Ok(Json(InsightResponse { insight }))
}

async fn delete_chat_handler(
    State(state): State<SharedState>,
    Path((uid, chat_id)): Path<(String, String)>,
) -> ApiResult<Json<AckResponse>> {
    state
        .service
        .delete_chat(&uid, &ChatId::from(chat_id.as_str()))
        .await?;
    Ok(Json(AckResponse {
        success: true,
        message: "Chat deleted",
    }))
}

async fn rename_chat_handler(
    State(state): State<SharedState>,
    Path((uid, chat_id)): Path<(String, String)>,
    Json(payload): Json<RenameRequest>,
) -> ApiResult<Json<AckResponse>> {
    state
        .service
        .rename_chat(&uid, &ChatId::from(chat_id.as_str()), payload.title.as_deref())
        .await?;
    Ok(Json(AckResponse {
        success: true,
        message: "Chat renamed successfully",
    }))
}

async fn summary_handler(
    State(state): State<SharedState>,
    Path((uid, chat_id)): Path<(String, String)>,
) -> ApiResult<Json<SummaryResponse>> {
    let summary = state
        .service
        .summarize_chat(&uid, &ChatId::from(chat_id.as_str()))
        .await?;
    Ok(Json(SummaryResponse {
        success: true,
        summary,
    }))
}
