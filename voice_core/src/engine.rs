//! Contracts for the external pretrained model systems.
//!
//! The acoustic models themselves are opaque: the demo only depends on these
//! traits, so the server can be wired to Piper-backed engines in production
//! and to lightweight fakes in tests.

use std::path::Path;
use std::sync::Arc;

use crate::embedding::ToneColorEmbedding;
use crate::language::{Language, Speaker};

/// A text-to-speech engine bound to a single language.
pub trait SpeechEngine: Send + Sync {
    /// Valid speakers for this engine, in a stable order. Never empty.
    fn speakers(&self) -> &[Speaker];

    /// Synthesize `text` with the given speaker at a speed multiplier and
    /// write the waveform to `out`.
    fn synthesize(&self, text: &str, speaker_id: i64, speed: f32, out: &Path)
        -> anyhow::Result<()>;
}

/// Constructs one engine per language during cache warm-up.
pub trait EngineLoader: Send + Sync {
    fn load(&self, language: Language) -> anyhow::Result<Arc<dyn SpeechEngine>>;
}

/// Re-renders speaker timbre and embeds a provenance watermark.
pub trait ToneColorConverter: Send + Sync {
    /// Derive a tone-color embedding from a reference clip, without voice
    /// activity trimming. Also returns a name derived from the clip path.
    fn extract_embedding(&self, audio: &Path) -> anyhow::Result<(ToneColorEmbedding, String)>;

    /// Re-render `source` from the source voice into the target voice,
    /// writing the result (with `message` watermarked in) to `output`.
    fn convert(
        &self,
        source: &Path,
        source_se: &ToneColorEmbedding,
        target_se: &ToneColorEmbedding,
        output: &Path,
        message: &str,
    ) -> anyhow::Result<()>;
}
