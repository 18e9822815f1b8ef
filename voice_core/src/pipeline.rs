//! Request pipeline: clone (optional) -> synthesize -> convert or copy.
//!
//! Artifacts live at two fixed paths under the output directory and are
//! overwritten on every request; callers serialize requests.

use std::fs;
use std::path::{Path, PathBuf};
use std::sync::Arc;

use thiserror::Error;
use tracing::{debug, info};

use crate::cache::ModelCache;
use crate::embedding::ToneColorEmbedding;
use crate::engine::ToneColorConverter;
use crate::language::Language;

/// Intermediate raw synthesis.
pub const RAW_AUDIO_FILE: &str = "tmp.wav";
/// Final, possibly converted, result.
pub const OUTPUT_AUDIO_FILE: &str = "output.wav";

const SPEED: f32 = 1.0;

#[derive(Debug, Error)]
pub enum PipelineError {
    /// Reference clip could not be turned into a target embedding. Reported
    /// verbatim to the user; no audio has been written.
    #[error("get target tone color error: {0}")]
    Extraction(String),

    /// Synthesis or conversion failed after validation passed.
    #[error(transparent)]
    Engine(#[from] anyhow::Error),
}

/// One UI submission. Consent and prompt length are checked at the HTTP
/// boundary before a request is constructed.
#[derive(Debug, Clone)]
pub struct SpeechRequest {
    pub text: String,
    pub language: Language,
    pub speaker_id: i64,
    pub reference_audio: Option<PathBuf>,
}

#[derive(Debug, Clone)]
pub struct SpeechOutcome {
    pub message: String,
    /// The final artifact (`output.wav`).
    pub audio: PathBuf,
    /// Echo of the reference clip, for side-by-side playback.
    pub reference: Option<PathBuf>,
}

pub struct SynthesisPipeline {
    cache: ModelCache,
    converter: Arc<dyn ToneColorConverter>,
    output_dir: PathBuf,
    watermark: String,
}

impl SynthesisPipeline {
    pub fn new(
        cache: ModelCache,
        converter: Arc<dyn ToneColorConverter>,
        output_dir: impl Into<PathBuf>,
        watermark: impl Into<String>,
    ) -> Self {
        Self {
            cache,
            converter,
            output_dir: output_dir.into(),
            watermark: watermark.into(),
        }
    }

    pub fn cache(&self) -> &ModelCache {
        &self.cache
    }

    pub fn output_dir(&self) -> &Path {
        &self.output_dir
    }

    /// Derive a target tone-color embedding from a reference clip.
    fn clone_target(
        &self,
        clip: &Path,
    ) -> Result<(ToneColorEmbedding, String), PipelineError> {
        self.converter
            .extract_embedding(clip)
            .map_err(|e| PipelineError::Extraction(format!("{e:#}")))
    }

    /// Run one validated request to completion.
    pub fn run(&self, request: &SpeechRequest) -> Result<SpeechOutcome, PipelineError> {
        // Extraction comes first so a bad reference clip aborts before any
        // artifact is touched.
        let target = match &request.reference_audio {
            Some(clip) => {
                let (se, name) = self.clone_target(clip)?;
                debug!(clip = %clip.display(), name = %name, "extracted target tone color");
                Some(se)
            }
            None => None,
        };

        let entry = self.cache.entry(request.language);
        let raw_path = self.output_dir.join(RAW_AUDIO_FILE);
        entry
            .engine()
            .synthesize(&request.text, request.speaker_id, SPEED, &raw_path)?;

        let output_path = self.output_dir.join(OUTPUT_AUDIO_FILE);
        match target {
            Some(target_se) if !target_se.is_empty() => {
                self.converter.convert(
                    &raw_path,
                    entry.source_embedding(),
                    &target_se,
                    &output_path,
                    &self.watermark,
                )?;
                info!(language = %request.language, speaker = request.speaker_id, "converted tone color");
            }
            _ => {
                // No reference voice: the conversion step is a pass-through.
                fs::copy(&raw_path, &output_path)
                    .map_err(|e| PipelineError::Engine(e.into()))?;
                info!(language = %request.language, speaker = request.speaker_id, "synthesized without conversion");
            }
        }

        Ok(SpeechOutcome {
            message: "Get response successfully".to_string(),
            audio: output_path,
            reference: request.reference_audio.clone(),
        })
    }
}
