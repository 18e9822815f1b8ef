//! Core library for the voice-cloning TTS demo.
//!
//! Owns the domain model (languages, speakers, tone-color embeddings), the
//! warm-start model cache, the engine contracts, and the request pipeline.
//! The HTTP surface lives in the `server` crate.

pub mod cache;
pub mod converter;
pub mod embedding;
pub mod engine;
pub mod language;
pub mod pipeline;
pub mod piper;
pub mod testing;
pub mod wav;

pub use cache::{CacheEntry, ModelCache};
pub use converter::{ConverterConfig, MelToneConverter};
pub use embedding::ToneColorEmbedding;
pub use engine::{EngineLoader, SpeechEngine, ToneColorConverter};
pub use language::{Language, Speaker};
pub use pipeline::{
    PipelineError, SpeechOutcome, SpeechRequest, SynthesisPipeline, OUTPUT_AUDIO_FILE,
    RAW_AUDIO_FILE,
};
pub use piper::{PiperEngine, PiperLoader};
