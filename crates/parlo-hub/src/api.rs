//! REST API server — expose the conversation orchestrator as an HTTP service.
//!
//! Endpoints:
//! - GET  /v1/health — liveness check
//! - GET  /v1/scenarios — registered scenario ids
//! - POST /v1/converse/text — one text conversation turn
//! - POST /v1/converse/audio — one spoken conversation turn (multipart)
//! - POST /v1/session/clear — explicit session reset

use std::net::SocketAddr;
use std::sync::Arc;

use axum::{
    extract::{DefaultBodyLimit, Multipart, State},
    http::StatusCode,
    response::Json,
    routing::{get, post},
    Router,
};
use base64::Engine;
use serde::{Deserialize, Serialize};
use tracing::info;
use uuid::Uuid;

use parlo_core::error::ParloError;
use parlo_core::gateway::TranscriptionGateway;
use parlo_core::orchestrator::{ConverseReply, Orchestrator};

/// Uploaded audio cap, matching the original deployment.
const MAX_UPLOAD_BYTES: usize = 10 * 1024 * 1024;

/// Shared API state.
pub struct ApiState {
    pub orchestrator: Arc<Orchestrator>,
    /// None disables the audio input route.
    pub transcriber: Option<Arc<dyn TranscriptionGateway>>,
}

type SharedState = Arc<ApiState>;

// ─── Request/Response types ────────────────────────────────

#[derive(Deserialize)]
pub struct ConverseTextRequest {
    pub scenario: String,
    /// Omitted on the first turn; the server mints one.
    pub session: Option<String>,
    pub text: String,
}

#[derive(Deserialize)]
pub struct ClearSessionRequest {
    pub session: String,
}

#[derive(Serialize)]
pub struct ConverseResponse {
    pub session: String,
    pub text: String,
    pub translation: Option<String>,
    /// Base64-encoded MP3, when synthesis succeeded.
    pub audio: Option<String>,
    /// What the transcriber heard (audio route only).
    #[serde(skip_serializing_if = "Option::is_none")]
    pub transcript: Option<String>,
    pub degraded: bool,
    pub timestamp: String,
}

#[derive(Serialize)]
pub struct ScenariosResponse {
    pub scenarios: Vec<String>,
}

#[derive(Serialize)]
pub struct ClearSessionResponse {
    pub session: String,
    pub cleared: bool,
}

#[derive(Serialize)]
pub struct ErrorResponse {
    pub error: String,
}

type ApiError = (StatusCode, Json<ErrorResponse>);

/// Map the error taxonomy onto HTTP status codes: caller errors are 4xx,
/// upstream failures 5xx (503 when the provider is plainly down, so the
/// client knows a retry is reasonable).
fn error_status(error: &ParloError) -> StatusCode {
    match error {
        ParloError::Conversation(cause) => error_status(cause),
        ParloError::InvalidRequest(_) => StatusCode::BAD_REQUEST,
        ParloError::UnknownScenario(_) => StatusCode::NOT_FOUND,
        ParloError::UpstreamUnavailable(_) => StatusCode::SERVICE_UNAVAILABLE,
        ParloError::InvalidUpstreamResponse(_)
        | ParloError::TranslationFailed(_)
        | ParloError::SynthesisFailed(_)
        | ParloError::TranscriptionFailed(_) => StatusCode::BAD_GATEWAY,
        _ => StatusCode::INTERNAL_SERVER_ERROR,
    }
}

fn error_response(error: ParloError) -> ApiError {
    (
        error_status(&error),
        Json(ErrorResponse {
            error: error.to_string(),
        }),
    )
}

fn bad_request(message: &str) -> ApiError {
    error_response(ParloError::InvalidRequest(message.to_string()))
}

fn converse_response(
    session: String,
    reply: ConverseReply,
    transcript: Option<String>,
) -> ConverseResponse {
    ConverseResponse {
        session,
        text: reply.text,
        translation: reply.translation,
        audio: reply
            .audio
            .map(|bytes| base64::engine::general_purpose::STANDARD.encode(bytes)),
        transcript,
        degraded: reply.degraded,
        timestamp: chrono::Utc::now().to_rfc3339(),
    }
}

// ─── Handlers ──────────────────────────────────────────────

async fn health() -> Json<serde_json::Value> {
    Json(serde_json::json!({
        "status": "ok",
        "timestamp": chrono::Utc::now().to_rfc3339(),
    }))
}

async fn scenarios(State(state): State<SharedState>) -> Json<ScenariosResponse> {
    let mut scenarios = state.orchestrator.scenario_ids();
    scenarios.sort();
    Json(ScenariosResponse { scenarios })
}

async fn converse_text(
    State(state): State<SharedState>,
    Json(req): Json<ConverseTextRequest>,
) -> Result<Json<ConverseResponse>, ApiError> {
    let session = req
        .session
        .unwrap_or_else(|| Uuid::new_v4().to_string());

    let reply = state
        .orchestrator
        .converse(&session, &req.scenario, &req.text)
        .await
        .map_err(error_response)?;

    Ok(Json(converse_response(session, reply, None)))
}

async fn converse_audio(
    State(state): State<SharedState>,
    mut multipart: Multipart,
) -> Result<Json<ConverseResponse>, ApiError> {
    let Some(transcriber) = state.transcriber.clone() else {
        return Err((
            StatusCode::SERVICE_UNAVAILABLE,
            Json(ErrorResponse {
                error: "Audio input is not configured".to_string(),
            }),
        ));
    };

    let mut audio: Option<Vec<u8>> = None;
    let mut format = "webm".to_string();
    let mut scenario: Option<String> = None;
    let mut session: Option<String> = None;

    while let Some(field) = multipart
        .next_field()
        .await
        .map_err(|e| bad_request(&format!("malformed multipart body: {e}")))?
    {
        let name = field.name().unwrap_or_default().to_string();
        match name.as_str() {
            "audio" => {
                let file_name = field.file_name().unwrap_or_default().to_string();
                if let Some(ext) = file_name.rsplit('.').next().filter(|ext| *ext != file_name) {
                    format = ext.to_lowercase();
                }
                let bytes = field
                    .bytes()
                    .await
                    .map_err(|e| bad_request(&format!("failed to read audio field: {e}")))?;
                audio = Some(bytes.to_vec());
            }
            "scenario" => {
                scenario = Some(field.text().await.map_err(|e| {
                    bad_request(&format!("failed to read scenario field: {e}"))
                })?);
            }
            "session" => {
                session = Some(field.text().await.map_err(|e| {
                    bad_request(&format!("failed to read session field: {e}"))
                })?);
            }
            _ => {}
        }
    }

    let audio = audio
        .filter(|bytes| !bytes.is_empty())
        .ok_or_else(|| bad_request("no audio file uploaded"))?;
    let scenario = scenario.ok_or_else(|| bad_request("scenario is required"))?;
    let session = session.unwrap_or_else(|| Uuid::new_v4().to_string());

    let transcript = transcriber
        .transcribe(&audio, &format)
        .await
        .map_err(error_response)?;

    let reply = state
        .orchestrator
        .converse(&session, &scenario, &transcript)
        .await
        .map_err(error_response)?;

    Ok(Json(converse_response(session, reply, Some(transcript))))
}

async fn clear_session(
    State(state): State<SharedState>,
    Json(req): Json<ClearSessionRequest>,
) -> Json<ClearSessionResponse> {
    state.orchestrator.clear_session(&req.session);
    Json(ClearSessionResponse {
        session: req.session,
        cleared: true,
    })
}

// ─── Server builder ────────────────────────────────────────

/// Build the API router.
pub fn build_router(state: SharedState) -> Router {
    Router::new()
        .route("/v1/health", get(health))
        .route("/v1/scenarios", get(scenarios))
        .route("/v1/converse/text", post(converse_text))
        .route("/v1/converse/audio", post(converse_audio))
        .route("/v1/session/clear", post(clear_session))
        .layer(DefaultBodyLimit::max(MAX_UPLOAD_BYTES))
        .with_state(state)
}

/// Start the API server.
pub async fn start_server(state: ApiState, host: &str, port: u16) -> anyhow::Result<()> {
    let app = build_router(Arc::new(state));

    let addr: SocketAddr = format!("{}:{}", host, port).parse()?;
    info!("Parlo API listening on http://{}", addr);

    let listener = tokio::net::TcpListener::bind(addr).await?;
    axum::serve(listener, app).await?;

    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_caller_errors_map_to_4xx() {
        assert_eq!(
            error_status(&ParloError::InvalidRequest("x".into())),
            StatusCode::BAD_REQUEST
        );
        assert_eq!(
            error_status(&ParloError::UnknownScenario("x".into())),
            StatusCode::NOT_FOUND
        );
    }

    #[test]
    fn test_upstream_errors_map_to_5xx() {
        assert_eq!(
            error_status(&ParloError::UpstreamUnavailable("x".into())),
            StatusCode::SERVICE_UNAVAILABLE
        );
        assert_eq!(
            error_status(&ParloError::SynthesisFailed("x".into())),
            StatusCode::BAD_GATEWAY
        );
    }

    #[test]
    fn test_conversation_wrapper_maps_by_cause() {
        let err = ParloError::conversation(ParloError::UpstreamUnavailable("x".into()));
        assert_eq!(error_status(&err), StatusCode::SERVICE_UNAVAILABLE);
    }
}
