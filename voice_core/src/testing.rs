//! Fake engines and converters for tests.
//!
//! The real models are heavyweight external checkpoints, so unit and
//! integration tests wire the pipeline to these deterministic stand-ins.

use std::collections::HashMap;
use std::path::Path;
use std::sync::Arc;

use crate::embedding::ToneColorEmbedding;
use crate::engine::{EngineLoader, SpeechEngine, ToneColorConverter};
use crate::language::{Language, Speaker};
use crate::wav;

pub const FAKE_SAMPLE_RATE: u32 = 22050;

/// Deterministic engine: the waveform depends only on text and speaker id.
pub struct FakeEngine {
    speakers: Vec<Speaker>,
}

impl FakeEngine {
    pub fn new(speakers: Vec<Speaker>) -> Self {
        Self { speakers }
    }
}

impl SpeechEngine for FakeEngine {
    fn speakers(&self) -> &[Speaker] {
        &self.speakers
    }

    fn synthesize(&self, text: &str, speaker_id: i64, speed: f32, out: &Path) -> anyhow::Result<()> {
        let n = 400 + text.chars().count() * 4;
        let phase = speaker_id as f32 * 0.37;
        let samples: Vec<f32> = (0..n)
            .map(|i| ((i as f32 * 0.05 * speed) + phase).sin() * 0.4)
            .collect();
        wav::write_wav(out, &samples, FAKE_SAMPLE_RATE)
    }
}

/// Loader with two speakers per language; can be told to fail one language.
pub struct FakeLoader {
    speakers: HashMap<Language, Vec<Speaker>>,
    fail_for: Option<Language>,
}

impl Default for FakeLoader {
    fn default() -> Self {
        let mut speakers = HashMap::new();
        for (i, language) in Language::ALL.iter().enumerate() {
            let base = (i as i64) * 10;
            speakers.insert(
                *language,
                vec![
                    Speaker::new(format!("{language}_Default"), base),
                    Speaker::new(format!("{language}_Alt"), base + 1),
                ],
            );
        }
        Self {
            speakers,
            fail_for: None,
        }
    }
}

impl FakeLoader {
    pub fn failing(language: Language) -> Self {
        Self {
            fail_for: Some(language),
            ..Self::default()
        }
    }

    pub fn speakers(&self, language: Language) -> &[Speaker] {
        &self.speakers[&language]
    }
}

impl EngineLoader for FakeLoader {
    fn load(&self, language: Language) -> anyhow::Result<Arc<dyn SpeechEngine>> {
        if self.fail_for == Some(language) {
            anyhow::bail!("no model weights for {language}");
        }
        Ok(Arc::new(FakeEngine::new(self.speakers[&language].clone())))
    }
}

/// Converter whose output is the source waveform at reduced gain, which is
/// enough to observe "converted differs from raw".
#[derive(Default)]
pub struct FakeConverter {
    fail_extraction: bool,
}

impl FakeConverter {
    pub fn failing_extraction() -> Self {
        Self {
            fail_extraction: true,
        }
    }
}

impl ToneColorConverter for FakeConverter {
    fn extract_embedding(&self, audio: &Path) -> anyhow::Result<(ToneColorEmbedding, String)> {
        if self.fail_extraction {
            anyhow::bail!("reference clip could not be analyzed");
        }
        let (samples, _) = wav::read_wav_mono(audio)?;
        let mean = samples.iter().map(|s| s.abs()).sum::<f32>() / samples.len().max(1) as f32;
        let name = audio
            .file_stem()
            .map(|s| s.to_string_lossy().to_lowercase())
            .unwrap_or_else(|| "reference".into());
        Ok((ToneColorEmbedding::new(vec![mean; 8]), name))
    }

    fn convert(
        &self,
        source: &Path,
        _source_se: &ToneColorEmbedding,
        target_se: &ToneColorEmbedding,
        output: &Path,
        _message: &str,
    ) -> anyhow::Result<()> {
        anyhow::ensure!(!target_se.is_empty(), "empty target embedding");
        let (samples, rate) = wav::read_wav_mono(source)?;
        let shifted: Vec<f32> = samples.iter().map(|s| s * 0.8).collect();
        wav::write_wav(output, &shifted, rate)
    }
}

/// Write one embedding file per (language, speaker) under `dir`.
pub fn write_embeddings_for(loader: &FakeLoader, dir: &Path) {
    for language in Language::ALL {
        for speaker in loader.speakers(language) {
            let se = ToneColorEmbedding::new(vec![speaker.id as f32, 1.0, -0.5, 0.25]);
            se.save(dir.join(format!("{}.se", speaker.key))).unwrap();
        }
    }
}
