use crate::audio::AudioStorage;
use crate::config::Config;
use crate::conversation::{ConversationError, ConversationService};
use crate::db::{Conversation, Database, Message, SenderRole};
use crate::gemini::GeminiClient;
use crate::security::{self, API_KEY_HEADER};
use crate::summary::SummaryService;
use crate::translation::TranslationService;
use anyhow::Context;
use axum::{
    extract::{DefaultBodyLimit, Multipart, Path, Query, Request, State},
    http::{header, StatusCode},
    middleware::{self, Next},
    response::{IntoResponse, Response},
    routing::{get, post},
    Json, Router,
};
use serde::{Deserialize, Serialize};
use std::net::SocketAddr;
use std::sync::Arc;
use thiserror::Error;
use tower_http::cors::CorsLayer;
use tower_http::trace::TraceLayer;
use tracing::{error, info, warn};
use uuid::Uuid;

const MAX_AUDIO_UPLOAD_BYTES: usize = 25 * 1024 * 1024;

#[derive(Clone)]
pub struct AppState {
    pub service: ConversationService,
    pub audio: AudioStorage,
    pub api_key: Option<Arc<str>>,
}

impl AppState {
    /// Wire up storage, provider client and services from config
    pub async fn from_config(config: &Config) -> anyhow::Result<Self> {
        if config.has_credential() {
            info!("Gemini credential configured, remote translation enabled");
        } else {
            info!("No GEMINI_API_KEY configured, running in offline continuity mode");
        }

        let provider = GeminiClient::new(config).context("Failed to build HTTP client")?;
        let db = Database::new(&config.database_url).await?;
        let audio = AudioStorage::new(&config.uploads_dir)?;

        Ok(Self {
            service: ConversationService::new(
                db,
                TranslationService::new(provider.clone()),
                SummaryService::new(provider),
            ),
            audio,
            api_key: config.api_key.as_deref().map(Arc::from),
        })
    }
}

#[derive(Debug, Error)]
pub enum ApiError {
    #[error("{0}")]
    NotFound(String),

    #[error("{0}")]
    BadRequest(String),

    #[error("Missing or invalid API key")]
    Unauthorized,

    #[error(transparent)]
    Internal(#[from] anyhow::Error),
}

impl From<ConversationError> for ApiError {
    fn from(err: ConversationError) -> Self {
        match err {
            ConversationError::NotFound(id) => {
                ApiError::NotFound(format!("Conversation not found: {}", id))
            }
            ConversationError::Storage(e) => ApiError::Internal(e),
        }
    }
}

#[derive(Serialize)]
struct ErrorBody {
    error: String,
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let status = match &self {
            ApiError::NotFound(_) => StatusCode::NOT_FOUND,
            ApiError::BadRequest(_) => StatusCode::BAD_REQUEST,
            ApiError::Unauthorized => StatusCode::UNAUTHORIZED,
            ApiError::Internal(e) => {
                error!("Request failed: {:#}", e);
                StatusCode::INTERNAL_SERVER_ERROR
            }
        };

        let message = match &self {
            ApiError::Internal(_) => "Internal server error".to_string(),
            other => other.to_string(),
        };

        (status, Json(ErrorBody { error: message })).into_response()
    }
}

type ApiResult<T> = Result<T, ApiError>;

#[derive(Debug, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
struct CreateConversationRequest {
    doctor_language: Option<String>,
    patient_language: Option<String>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct TextMessageRequest {
    conversation_id: Uuid,
    sender_role: SenderRole,
    text: String,
}

#[derive(Debug, Deserialize)]
struct SearchParams {
    query: String,
}

#[derive(Debug, Serialize)]
struct SummaryResponse {
    summary: String,
}

pub fn router(state: AppState) -> Router {
    let api = Router::new()
        .route("/conversations", post(create_conversation))
        .route("/conversations/:id", get(get_conversation))
        .route("/conversations/:id/messages", get(get_messages))
        .route("/messages/text", post(send_text))
        .route(
            "/messages/audio",
            post(send_audio).layer(DefaultBodyLimit::max(MAX_AUDIO_UPLOAD_BYTES)),
        )
        .route("/search", get(search))
        .route("/summary/:conversation_id", post(get_summary))
        .route_layer(middleware::from_fn_with_state(state.clone(), require_api_key));

    // Recordings are fetched by <audio> elements, which cannot send headers
    Router::new()
        .route("/health", get(health))
        .route("/api/audio/:filename", get(get_audio))
        .nest("/api", api)
        .layer(TraceLayer::new_for_http())
        .layer(CorsLayer::permissive())
        .with_state(state)
}

/// Bind to the configured port and serve until Ctrl+C
pub async fn serve(config: &Config, state: AppState) -> anyhow::Result<()> {
    let addr = SocketAddr::from(([0, 0, 0, 0], config.port));
    let listener = tokio::net::TcpListener::bind(addr)
        .await
        .context(format!("Failed to bind to {}", addr))?;

    info!("Listening on {}", addr);

    axum::serve(listener, router(state))
        .with_graceful_shutdown(shutdown_signal())
        .await
        .context("HTTP server error")?;

    info!("Server stopped");
    Ok(())
}

async fn shutdown_signal() {
    if let Err(e) = tokio::signal::ctrl_c().await {
        warn!("Failed to listen for shutdown signal: {}", e);
    }
}

async fn require_api_key(
    State(state): State<AppState>,
    request: Request,
    next: Next,
) -> ApiResult<Response> {
    let authorized = security::is_authorized(
        state.api_key.as_deref(),
        request
            .headers()
            .get(API_KEY_HEADER)
            .and_then(|v| v.to_str().ok()),
    );

    if !authorized {
        warn!("Rejected request to {} with missing or invalid API key", request.uri().path());
        return Err(ApiError::Unauthorized);
    }

    Ok(next.run(request).await)
}

async fn health() -> &'static str {
    "OK"
}

async fn create_conversation(
    State(state): State<AppState>,
    Json(request): Json<CreateConversationRequest>,
) -> ApiResult<Json<Conversation>> {
    let conversation = state
        .service
        .create_conversation(
            request.doctor_language.as_deref().unwrap_or("English"),
            request.patient_language.as_deref().unwrap_or("Spanish"),
        )
        .await?;
    Ok(Json(conversation))
}

async fn get_conversation(
    State(state): State<AppState>,
    Path(id): Path<Uuid>,
) -> ApiResult<Json<Conversation>> {
    Ok(Json(state.service.get_conversation(id).await?))
}

async fn get_messages(
    State(state): State<AppState>,
    Path(id): Path<Uuid>,
) -> ApiResult<Json<Vec<Message>>> {
    Ok(Json(state.service.get_messages(id).await?))
}

async fn send_text(
    State(state): State<AppState>,
    Json(request): Json<TextMessageRequest>,
) -> ApiResult<Json<Message>> {
    if request.text.trim().is_empty() {
        return Err(ApiError::BadRequest("Message text must not be empty".to_string()));
    }

    let message = state
        .service
        .add_text_message(request.conversation_id, request.sender_role, &request.text)
        .await?;
    Ok(Json(message))
}

async fn send_audio(
    State(state): State<AppState>,
    mut multipart: Multipart,
) -> ApiResult<Json<Message>> {
    let mut conversation_id: Option<Uuid> = None;
    let mut sender_role: Option<SenderRole> = None;
    let mut file: Option<(String, Vec<u8>)> = None;

    while let Some(field) = multipart
        .next_field()
        .await
        .map_err(|e| ApiError::BadRequest(format!("Invalid multipart body: {}", e)))?
    {
        let name = field.name().unwrap_or_default().to_string();
        match name.as_str() {
            "conversationId" => {
                let value = field.text().await.map_err(|e| ApiError::BadRequest(e.to_string()))?;
                conversation_id = Some(
                    Uuid::parse_str(value.trim())
                        .map_err(|_| ApiError::BadRequest("Invalid conversationId".to_string()))?,
                );
            }
            "senderRole" => {
                let value = field.text().await.map_err(|e| ApiError::BadRequest(e.to_string()))?;
                sender_role = Some(
                    value
                        .parse()
                        .map_err(|e: anyhow::Error| ApiError::BadRequest(e.to_string()))?,
                );
            }
            "file" => {
                let name = field.file_name().unwrap_or("recording.webm").to_string();
                let data = field.bytes().await.map_err(|e| ApiError::BadRequest(e.to_string()))?;
                file = Some((name, data.to_vec()));
            }
            _ => {}
        }
    }

    let conversation_id =
        conversation_id.ok_or_else(|| ApiError::BadRequest("Missing conversationId".to_string()))?;
    let sender_role =
        sender_role.ok_or_else(|| ApiError::BadRequest("Missing senderRole".to_string()))?;
    let (name, data) = file.ok_or_else(|| ApiError::BadRequest("Missing file".to_string()))?;

    // Don't keep recordings for conversations that don't exist
    state.service.get_conversation(conversation_id).await?;

    let audio_url = state.audio.save(&name, &data).await?;
    match state
        .service
        .add_audio_message(conversation_id, sender_role, &audio_url)
        .await
    {
        Ok(message) => Ok(Json(message)),
        Err(e) => {
            // No message row points at the recording, so drop it
            if let Err(cleanup) = state.audio.remove(&audio_url).await {
                warn!("Failed to remove orphaned recording {}: {:#}", audio_url, cleanup);
            }
            Err(e.into())
        }
    }
}

async fn get_audio(
    State(state): State<AppState>,
    Path(filename): Path<String>,
) -> ApiResult<impl IntoResponse> {
    let data = state.audio.load(&filename).await.map_err(|e| {
        warn!("Audio lookup failed: {:#}", e);
        ApiError::NotFound(format!("Audio not found: {}", filename))
    })?;

    Ok(([(header::CONTENT_TYPE, "audio/webm")], data))
}

async fn search(
    State(state): State<AppState>,
    Query(params): Query<SearchParams>,
) -> ApiResult<Json<Vec<Message>>> {
    Ok(Json(state.service.search_messages(&params.query).await?))
}

async fn get_summary(
    State(state): State<AppState>,
    Path(conversation_id): Path<Uuid>,
) -> ApiResult<Json<SummaryResponse>> {
    let summary = state.service.get_summary(conversation_id).await?;
    Ok(Json(SummaryResponse { summary }))
}
