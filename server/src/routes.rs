use std::path::PathBuf;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use std::time::Instant;

use axum::{
    extract::{Multipart, Path, State},
    http::{header, StatusCode},
    response::{Html, IntoResponse, Response},
    routing::{get, post},
    Json, Router,
};
use serde::Serialize;
use tokio::sync::Semaphore;

use voice_core::{Language, SpeechRequest, SynthesisPipeline, OUTPUT_AUDIO_FILE, RAW_AUDIO_FILE};

use crate::error::ApiError;
use crate::validation::validate_speech_request;

/// Uploaded reference clip, overwritten per request like the other artifacts.
pub const REFERENCE_AUDIO_FILE: &str = "reference.wav";

#[derive(Clone)]
pub struct AppState {
    pub pipeline: Arc<SynthesisPipeline>,
    /// Single permit: submissions are processed one at a time.
    pub gate: Arc<Semaphore>,
    pub request_count: Arc<AtomicU64>,
    pub started_at: Instant,
}

impl AppState {
    pub fn new(pipeline: Arc<SynthesisPipeline>) -> Self {
        Self {
            pipeline,
            gate: Arc::new(Semaphore::new(1)),
            request_count: Arc::new(AtomicU64::new(0)),
            started_at: Instant::now(),
        }
    }
}

pub fn build_router(state: AppState) -> Router {
    Router::new()
        .route("/", get(index))
        .route("/health", get(health_check))
        .route("/languages", get(list_languages))
        .route("/speakers/{lang}", get(list_speakers))
        .route("/speech", post(speech))
        .route("/audio/{name}", get(serve_audio))
        .route("/metrics", get(metrics_endpoint))
        .with_state(state)
}

async fn index() -> Html<&'static str> {
    Html(include_str!("../assets/index.html"))
}

async fn health_check() -> &'static str {
    "ok"
}

async fn list_languages(State(state): State<AppState>) -> Json<Vec<&'static str>> {
    Json(
        state
            .pipeline
            .cache()
            .languages()
            .into_iter()
            .map(|l| l.as_str())
            .collect(),
    )
}

#[derive(Serialize)]
pub struct SpeakerInfo {
    pub name: String,
    pub id: i64,
}

#[derive(Serialize)]
pub struct SpeakerChoices {
    pub speakers: Vec<SpeakerInfo>,
    /// First cached speaker, preselected by the UI.
    pub default: i64,
}

async fn list_speakers(
    State(state): State<AppState>,
    Path(lang): Path<String>,
) -> Result<Json<SpeakerChoices>, ApiError> {
    let language: Language = lang
        .parse()
        .map_err(|e: anyhow::Error| ApiError::InvalidInput(e.to_string()))?;

    let entry = state.pipeline.cache().entry(language);
    let speakers: Vec<SpeakerInfo> = entry
        .speakers()
        .iter()
        .map(|s| SpeakerInfo {
            name: s.name.clone(),
            id: s.id,
        })
        .collect();
    let default = entry.speakers()[0].id;

    Ok(Json(SpeakerChoices { speakers, default }))
}

#[derive(Serialize)]
pub struct SpeechResponse {
    pub message: String,
    pub audio_url: String,
    pub reference_url: Option<String>,
}

/// Raw fields of one form submission, collected before any validation.
#[derive(Default)]
struct SpeechForm {
    text: String,
    language: Option<String>,
    speaker_id: Option<String>,
    agree: bool,
    reference: Option<Vec<u8>>,
}

async fn read_form(multipart: &mut Multipart) -> Result<SpeechForm, ApiError> {
    let mut form = SpeechForm::default();
    while let Some(field) = multipart
        .next_field()
        .await
        .map_err(|e| ApiError::InvalidInput(format!("malformed form: {e}")))?
    {
        let name = field.name().unwrap_or_default().to_string();
        match name.as_str() {
            "text" => {
                form.text = field
                    .text()
                    .await
                    .map_err(|e| ApiError::InvalidInput(format!("malformed text field: {e}")))?;
            }
            "language" => {
                form.language = Some(
                    field
                        .text()
                        .await
                        .map_err(|e| ApiError::InvalidInput(format!("malformed language: {e}")))?,
                );
            }
            "speaker_id" => {
                form.speaker_id = Some(
                    field
                        .text()
                        .await
                        .map_err(|e| ApiError::InvalidInput(format!("malformed speaker: {e}")))?,
                );
            }
            "agree" => {
                let value = field
                    .text()
                    .await
                    .map_err(|e| ApiError::InvalidInput(format!("malformed consent: {e}")))?;
                form.agree = matches!(value.trim(), "true" | "on" | "1");
            }
            "reference" => {
                let bytes = field
                    .bytes()
                    .await
                    .map_err(|e| ApiError::InvalidInput(format!("malformed upload: {e}")))?;
                if !bytes.is_empty() {
                    form.reference = Some(bytes.to_vec());
                }
            }
            _ => {}
        }
    }
    Ok(form)
}

async fn speech(
    State(state): State<AppState>,
    mut multipart: Multipart,
) -> Result<Json<SpeechResponse>, ApiError> {
    state.request_count.fetch_add(1, Ordering::Relaxed);

    let form = read_form(&mut multipart).await?;

    // Consent and prompt bounds gate everything; no artifact is touched and
    // no model is called for a rejected request.
    validate_speech_request(&form.text, form.agree)?;

    let language: Language = form
        .language
        .as_deref()
        .ok_or_else(|| ApiError::InvalidInput("missing language".to_string()))?
        .parse()
        .map_err(|e: anyhow::Error| ApiError::InvalidInput(e.to_string()))?;

    let entry = state.pipeline.cache().entry(language);
    let speaker_id = match form.speaker_id.as_deref() {
        Some(raw) => raw
            .trim()
            .parse::<i64>()
            .map_err(|_| ApiError::InvalidInput(format!("invalid speaker id: {raw}")))?,
        None => entry.speakers()[0].id,
    };
    if !entry.has_speaker(speaker_id) {
        return Err(ApiError::InvalidInput(format!(
            "unknown speaker {speaker_id} for language {language}"
        )));
    }

    // Requests run strictly one at a time against the fixed artifact paths.
    // The reference clip is one of those artifacts, so it is written only
    // once the permit is held; writing earlier would let a concurrent
    // request swap the clip out from under a running pipeline.
    let _permit = state
        .gate
        .clone()
        .acquire_owned()
        .await
        .map_err(|_| ApiError::Internal("server is shutting down".to_string()))?;

    let reference_audio: Option<PathBuf> = match form.reference {
        Some(bytes) => {
            let path = state.pipeline.output_dir().join(REFERENCE_AUDIO_FILE);
            tokio::fs::write(&path, &bytes)
                .await
                .map_err(|e| ApiError::Internal(format!("failed to store reference clip: {e}")))?;
            Some(path)
        }
        None => None,
    };

    let request = SpeechRequest {
        text: form.text,
        language,
        speaker_id,
        reference_audio,
    };

    let pipeline = state.pipeline.clone();
    let outcome = tokio::task::spawn_blocking(move || pipeline.run(&request))
        .await
        .map_err(|e| ApiError::Internal(format!("task join error: {e}")))??;

    Ok(Json(SpeechResponse {
        message: outcome.message,
        audio_url: format!("/audio/{OUTPUT_AUDIO_FILE}"),
        reference_url: outcome
            .reference
            .map(|_| format!("/audio/{REFERENCE_AUDIO_FILE}")),
    }))
}

/// Serve one of the fixed artifacts. Any other name is a 404; this endpoint
/// never touches arbitrary paths.
async fn serve_audio(
    State(state): State<AppState>,
    Path(name): Path<String>,
) -> Result<Response, ApiError> {
    let allowed = [RAW_AUDIO_FILE, OUTPUT_AUDIO_FILE, REFERENCE_AUDIO_FILE];
    if !allowed.contains(&name.as_str()) {
        return Ok(StatusCode::NOT_FOUND.into_response());
    }

    let path = state.pipeline.output_dir().join(&name);
    match tokio::fs::read(&path).await {
        Ok(bytes) => Ok(([(header::CONTENT_TYPE, "audio/wav")], bytes).into_response()),
        Err(_) => Ok(StatusCode::NOT_FOUND.into_response()),
    }
}

#[derive(Serialize)]
pub struct MetricsResponse {
    pub cpu_usage_percent: f32,
    pub memory_used_mb: u64,
    pub memory_total_mb: u64,
    pub request_count: u64,
    pub uptime_seconds: u64,
}

async fn metrics_endpoint(State(state): State<AppState>) -> Json<MetricsResponse> {
    let mut system = sysinfo::System::new();
    system.refresh_cpu();
    system.refresh_memory();

    Json(MetricsResponse {
        cpu_usage_percent: system.global_cpu_info().cpu_usage(),
        memory_used_mb: system.used_memory() / 1024 / 1024,
        memory_total_mb: system.total_memory() / 1024 / 1024,
        request_count: state.request_count.load(Ordering::Relaxed),
        uptime_seconds: state.started_at.elapsed().as_secs(),
    })
}
