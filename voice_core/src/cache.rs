//! Warm-start model cache.
//!
//! Built once before the server starts accepting requests and read-only
//! afterwards. Any missing engine or embedding file aborts startup; there is
//! no lazy fill and no eviction.

use std::collections::HashMap;
use std::path::Path;
use std::sync::Arc;

use anyhow::Context;
use tracing::info;

use crate::embedding::ToneColorEmbedding;
use crate::engine::{EngineLoader, SpeechEngine};
use crate::language::{Language, Speaker};

/// Per-language slice of the cache: the loaded engine, its speakers, and the
/// source tone-color embeddings the converter needs as a baseline.
pub struct CacheEntry {
    engine: Arc<dyn SpeechEngine>,
    speakers: Vec<Speaker>,
    embeddings: HashMap<i64, ToneColorEmbedding>,
    // First speaker's embedding, used as the conversion source.
    default_embedding: ToneColorEmbedding,
}

impl CacheEntry {
    pub fn engine(&self) -> &Arc<dyn SpeechEngine> {
        &self.engine
    }

    pub fn speakers(&self) -> &[Speaker] {
        &self.speakers
    }

    pub fn source_embedding(&self) -> &ToneColorEmbedding {
        &self.default_embedding
    }

    pub fn embedding_for(&self, speaker_id: i64) -> Option<&ToneColorEmbedding> {
        self.embeddings.get(&speaker_id)
    }

    pub fn has_speaker(&self, speaker_id: i64) -> bool {
        self.speakers.iter().any(|s| s.id == speaker_id)
    }
}

pub struct ModelCache {
    entries: HashMap<Language, CacheEntry>,
}

// Manual impl: CacheEntry holds `Arc<dyn SpeechEngine>`, which is not Debug.
impl std::fmt::Debug for ModelCache {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ModelCache")
            .field("languages", &self.entries.keys().collect::<Vec<_>>())
            .finish_non_exhaustive()
    }
}

impl ModelCache {
    /// Load every supported language up front. For each language this loads
    /// one engine, enumerates its speakers, and loads `<key>.se` from
    /// `embeddings_dir` for every speaker.
    pub fn warm_up(loader: &dyn EngineLoader, embeddings_dir: &Path) -> anyhow::Result<Self> {
        let mut entries = HashMap::new();

        for language in Language::ALL {
            let engine = loader
                .load(language)
                .with_context(|| format!("failed to load speech engine for {language}"))?;

            let speakers = engine.speakers().to_vec();
            if speakers.is_empty() {
                anyhow::bail!("speech engine for {language} exposes no speakers");
            }

            let mut embeddings = HashMap::with_capacity(speakers.len());
            for speaker in &speakers {
                let path = embeddings_dir.join(format!("{}.se", speaker.key));
                let se = ToneColorEmbedding::load(&path).with_context(|| {
                    format!(
                        "missing source tone color embedding for speaker {} ({language})",
                        speaker.name
                    )
                })?;
                embeddings.insert(speaker.id, se);
            }

            let default_embedding = embeddings[&speakers[0].id].clone();
            info!(%language, speakers = speakers.len(), "loaded speech engine");

            entries.insert(
                language,
                CacheEntry {
                    engine,
                    speakers,
                    embeddings,
                    default_embedding,
                },
            );
        }

        Ok(Self { entries })
    }

    pub fn entry(&self, language: Language) -> &CacheEntry {
        // warm_up populates every Language::ALL member or fails, so the
        // closed enum guarantees this lookup.
        &self.entries[&language]
    }

    pub fn languages(&self) -> Vec<Language> {
        Language::ALL.to_vec()
    }
}
