//! Piper-backed speech engine.
//!
//! One engine per language, resolved through a `map.json` file that maps
//! language keys to Piper voice config paths:
//!
//! ```json
//! { "ZH": "models/zh/model.onnx.json", "EN": "models/en/model.onnx.json" }
//! ```

use std::collections::HashMap;
use std::fs;
use std::path::{Path, PathBuf};
use std::sync::{Arc, RwLock};

use anyhow::Context;
use piper_rs::synth::{PiperSpeechStreamParallel, PiperSpeechSynthesizer};

use crate::engine::{EngineLoader, SpeechEngine};
use crate::language::{Language, Speaker};
use crate::wav;

pub struct PiperEngine {
    synth: RwLock<PiperSpeechSynthesizer>,
    sample_rate: u32,
    speakers: Vec<Speaker>,
}

impl PiperEngine {
    pub fn from_config_path<P: AsRef<Path>>(cfg_path: P) -> anyhow::Result<Self> {
        let cfg_path = cfg_path.as_ref();
        let (sample_rate, speakers) = read_voice_config(cfg_path)?;

        let model = piper_rs::from_config_path(cfg_path)
            .map_err(|e| anyhow::anyhow!("piper load error for {}: {e}", cfg_path.display()))?;
        let synth = PiperSpeechSynthesizer::new(model)
            .map_err(|e| anyhow::anyhow!("piper synthesizer error: {e}"))?;

        Ok(Self {
            synth: RwLock::new(synth),
            sample_rate,
            speakers,
        })
    }
}

impl SpeechEngine for PiperEngine {
    fn speakers(&self) -> &[Speaker] {
        &self.speakers
    }

    fn synthesize(
        &self,
        text: &str,
        _speaker_id: i64,
        _speed: f32,
        out: &Path,
    ) -> anyhow::Result<()> {
        let synth = self
            .synth
            .read()
            .map_err(|_| anyhow::anyhow!("synthesizer lock poisoned"))?;

        // This piper-rs version exposes no public speaker or speed selection;
        // synthesis runs at the model default speaker and speed 1.0.
        let iter: PiperSpeechStreamParallel = synth
            .synthesize_parallel(text.to_string(), None)
            .map_err(|e| anyhow::anyhow!("piper synth error: {e}"))?;

        let mut samples: Vec<f32> = Vec::new();
        for part in iter {
            samples.extend(
                part.map_err(|e| anyhow::anyhow!("chunk error: {e}"))?
                    .into_vec(),
            );
        }
        wav::write_wav(out, &samples, self.sample_rate)
    }
}

/// Parse sample rate and speaker map out of a Piper voice config.
fn read_voice_config(cfg_path: &Path) -> anyhow::Result<(u32, Vec<Speaker>)> {
    let text = fs::read_to_string(cfg_path)
        .with_context(|| format!("failed to read voice config {}", cfg_path.display()))?;
    let json: serde_json::Value = serde_json::from_str(&text)
        .with_context(|| format!("voice config {} is not valid JSON", cfg_path.display()))?;

    let sample_rate = json
        .get("audio")
        .and_then(|a| a.get("sample_rate"))
        .and_then(|sr| sr.as_u64())
        .ok_or_else(|| anyhow::anyhow!("missing 'audio.sample_rate' in {}", cfg_path.display()))?
        as u32;

    let mut speakers: Vec<Speaker> = json
        .get("speaker_id_map")
        .and_then(|m| m.as_object())
        .map(|m| {
            m.iter()
                .filter_map(|(name, id)| id.as_i64().map(|id| Speaker::new(name.clone(), id)))
                .collect()
        })
        .unwrap_or_default();
    speakers.sort_by_key(|s| s.id);

    Ok((sample_rate, speakers))
}

/// Resolves each language to a Piper config via `map.json`. Every supported
/// language must be mapped; a hole is a startup error, not a fallback.
pub struct PiperLoader {
    map: HashMap<Language, PathBuf>,
}

impl PiperLoader {
    pub fn from_mapfile<P: AsRef<Path>>(path: P) -> anyhow::Result<Self> {
        let path = path.as_ref();
        let text = fs::read_to_string(path)
            .with_context(|| format!("failed to load {}", path.display()))?;
        let raw: HashMap<String, PathBuf> =
            serde_json::from_str(&text).with_context(|| "map.json is not valid JSON")?;

        let mut map = HashMap::new();
        for (key, cfg) in raw {
            let language: Language = key
                .parse()
                .with_context(|| format!("map.json contains unsupported key '{key}'"))?;
            map.insert(language, cfg);
        }
        Ok(Self { map })
    }
}

impl EngineLoader for PiperLoader {
    fn load(&self, language: Language) -> anyhow::Result<Arc<dyn SpeechEngine>> {
        let cfg_path = self
            .map
            .get(&language)
            .ok_or_else(|| anyhow::anyhow!("map.json has no voice config for {language}"))?;

        let mut engine = PiperEngine::from_config_path(cfg_path)?;
        if engine.speakers.is_empty() {
            // Single-speaker voices carry no speaker_id_map; expose one
            // default speaker keyed by the language.
            engine.speakers = vec![Speaker::new(language.as_str(), 0)];
        }
        Ok(Arc::new(engine))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn voice_config_parses_rate_and_speakers() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("model.onnx.json");
        std::fs::write(
            &path,
            r#"{"audio":{"sample_rate":22050},"speaker_id_map":{"EN_Default":0,"EN_Alt":3}}"#,
        )
        .unwrap();

        let (rate, speakers) = read_voice_config(&path).unwrap();
        assert_eq!(rate, 22050);
        assert_eq!(speakers.len(), 2);
        assert_eq!(speakers[0].id, 0);
        assert_eq!(speakers[0].key, "en-default");
        assert_eq!(speakers[1].id, 3);
    }

    #[test]
    fn voice_config_without_speaker_map_is_empty() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("model.onnx.json");
        std::fs::write(&path, r#"{"audio":{"sample_rate":16000}}"#).unwrap();

        let (rate, speakers) = read_voice_config(&path).unwrap();
        assert_eq!(rate, 16000);
        assert!(speakers.is_empty());
    }

    #[test]
    fn mapfile_rejects_unknown_language() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("map.json");
        std::fs::write(&path, r#"{"DE": "models/de.onnx.json"}"#).unwrap();
        assert!(PiperLoader::from_mapfile(&path).is_err());
    }

    #[test]
    fn loader_errors_on_missing_language() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("map.json");
        std::fs::write(&path, r#"{}"#).unwrap();
        let loader = PiperLoader::from_mapfile(&path).unwrap();
        assert!(loader.load(Language::En).is_err());
    }
}
