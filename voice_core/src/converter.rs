//! Tone-color conversion.
//!
//! `MelToneConverter` is the demo-grade converter behind the
//! [`ToneColorConverter`](crate::engine::ToneColorConverter) trait: the
//! tone-color embedding is the clip's mean mel-band energy profile, and
//! conversion applies a two-band spectral correction toward the target
//! profile before stamping the provenance watermark into the sample LSBs.

use std::fs;
use std::path::Path;

use anyhow::Context;
use mel_spec::prelude::*;
use ndarray::Array1;
use num_complex::Complex;
use serde::Deserialize;

use crate::embedding::ToneColorEmbedding;
use crate::engine::ToneColorConverter;
use crate::wav;

#[derive(Debug, Clone, Deserialize)]
pub struct ConverterConfig {
    #[serde(default = "default_frame_size")]
    pub frame_size: usize,
    #[serde(default = "default_hop_size")]
    pub hop_size: usize,
    #[serde(default = "default_n_mels")]
    pub n_mels: usize,
    /// Split point between the low and high correction bands.
    #[serde(default = "default_crossover_hz")]
    pub crossover_hz: f32,
    /// Per-band correction is clamped to +/- this many dB.
    #[serde(default = "default_max_band_gain_db")]
    pub max_band_gain_db: f32,
}

fn default_frame_size() -> usize {
    1024
}
fn default_hop_size() -> usize {
    256
}
fn default_n_mels() -> usize {
    80
}
fn default_crossover_hz() -> f32 {
    1000.0
}
fn default_max_band_gain_db() -> f32 {
    12.0
}

impl Default for ConverterConfig {
    fn default() -> Self {
        Self {
            frame_size: default_frame_size(),
            hop_size: default_hop_size(),
            n_mels: default_n_mels(),
            crossover_hz: default_crossover_hz(),
            max_band_gain_db: default_max_band_gain_db(),
        }
    }
}

impl ConverterConfig {
    pub fn load<P: AsRef<Path>>(path: P) -> anyhow::Result<Self> {
        let path = path.as_ref();
        let text = fs::read_to_string(path)
            .with_context(|| format!("failed to read converter config {}", path.display()))?;
        serde_json::from_str(&text)
            .with_context(|| format!("converter config {} is not valid JSON", path.display()))
    }
}

pub struct MelToneConverter {
    config: ConverterConfig,
}

impl MelToneConverter {
    pub fn new(config: ConverterConfig) -> Self {
        Self { config }
    }

    /// Construct once at startup from the converter config file.
    pub fn from_config_file<P: AsRef<Path>>(path: P) -> anyhow::Result<Self> {
        Ok(Self::new(ConverterConfig::load(path)?))
    }

    fn mel_frames(&self, samples: &[f32], sample_rate: u32) -> Vec<Vec<f64>> {
        let mut stft = Spectrogram::new(self.config.frame_size, self.config.hop_size);
        let mut mel =
            MelSpectrogram::new(self.config.frame_size, sample_rate as f64, self.config.n_mels);

        let mut frames = Vec::new();
        let mut offset = 0usize;
        while offset + self.config.hop_size <= samples.len() {
            let slice = &samples[offset..offset + self.config.hop_size];
            if let Some(fft_frame) = stft.add(slice) {
                let arr: Array1<Complex<f64>> =
                    Array1::from_iter(fft_frame.into_iter().map(|c: Complex<f64>| c));
                let (flat, _off) = mel.add(&arr).into_raw_vec_and_offset();
                frames.push(flat);
            }
            offset += self.config.hop_size;
        }
        frames
    }
}

impl ToneColorConverter for MelToneConverter {
    fn extract_embedding(&self, audio: &Path) -> anyhow::Result<(ToneColorEmbedding, String)> {
        let (samples, sample_rate) = wav::read_wav_mono(audio)?;
        let frames = self.mel_frames(&samples, sample_rate);
        if frames.is_empty() {
            anyhow::bail!(
                "reference clip {} is too short to analyze",
                audio.display()
            );
        }

        let mut profile = vec![0f32; self.config.n_mels];
        for frame in &frames {
            for (band, value) in frame.iter().enumerate().take(self.config.n_mels) {
                profile[band] += *value as f32;
            }
        }
        let count = frames.len() as f32;
        for value in &mut profile {
            *value /= count;
        }

        Ok((ToneColorEmbedding::new(profile), derived_clip_name(audio)))
    }

    fn convert(
        &self,
        source: &Path,
        source_se: &ToneColorEmbedding,
        target_se: &ToneColorEmbedding,
        output: &Path,
        message: &str,
    ) -> anyhow::Result<()> {
        let (samples, sample_rate) = wav::read_wav_mono(source)?;

        let (low_gain, high_gain) =
            band_gains(source_se, target_se, self.config.max_band_gain_db);

        // One-pole crossover: correct the low and high halves of the
        // spectrum independently toward the target profile.
        let alpha =
            1.0 - (-std::f32::consts::TAU * self.config.crossover_hz / sample_rate as f32).exp();
        let mut low_state = 0.0f32;
        let mut shaped: Vec<f32> = Vec::with_capacity(samples.len());
        for &x in &samples {
            low_state += alpha * (x - low_state);
            shaped.push(low_gain * low_state + high_gain * (x - low_state));
        }

        let peak = shaped.iter().fold(0.0f32, |m, s| m.max(s.abs()));
        if peak > 0.99 {
            let scale = 0.99 / peak;
            for s in &mut shaped {
                *s *= scale;
            }
        }

        embed_watermark(&mut shaped, message);
        wav::write_wav(output, &shaped, sample_rate)
    }
}

fn derived_clip_name(path: &Path) -> String {
    let stem = path
        .file_stem()
        .map(|s| s.to_string_lossy().to_lowercase())
        .unwrap_or_else(|| "reference".into());
    stem.chars()
        .map(|c| if c.is_ascii_alphanumeric() { c } else { '-' })
        .collect()
}

/// Mean log-energy shift between profiles, per band half, converted to a
/// clamped amplitude gain.
fn band_gains(source: &ToneColorEmbedding, target: &ToneColorEmbedding, max_db: f32) -> (f32, f32) {
    let n = source.len().min(target.len());
    if n == 0 {
        return (1.0, 1.0);
    }
    let src = &source.as_slice()[..n];
    let tgt = &target.as_slice()[..n];
    let mid = (n / 2).max(1);

    let half_gain = |s: &[f32], t: &[f32]| -> f32 {
        let shift = (mean(t) - mean(s)) / 2.0; // energy -> amplitude
        let gain_db = (shift.exp().max(1e-6)).log10() * 20.0;
        10f32.powf(gain_db.clamp(-max_db, max_db) / 20.0)
    };

    (
        half_gain(&src[..mid], &tgt[..mid]),
        half_gain(&src[mid..], &tgt[mid..]),
    )
}

fn mean(values: &[f32]) -> f32 {
    if values.is_empty() {
        return 0.0;
    }
    values.iter().sum::<f32>() / values.len() as f32
}

/// Stamp `message` into the least-significant bits of the quantized
/// samples, prefixed with a 16-bit byte-length field.
fn embed_watermark(samples: &mut [f32], message: &str) {
    for (i, bit) in watermark_bits(message).into_iter().enumerate() {
        let Some(sample) = samples.get_mut(i) else {
            break;
        };
        let mut q = (sample.clamp(-1.0, 1.0) * i16::MAX as f32) as i16;
        q = (q & !1) | bit as i16;
        // Bias toward the band center so the later f32 -> i16 truncation in
        // the WAV writer lands back on exactly q.
        let biased = q as f32 + if q >= 0 { 0.25 } else { -0.25 };
        *sample = biased / i16::MAX as f32;
    }
}

fn watermark_bits(message: &str) -> Vec<u8> {
    let bytes = message.as_bytes();
    let len = bytes.len().min(u16::MAX as usize) as u16;
    let mut bits = Vec::with_capacity(16 + len as usize * 8);
    for i in 0..16 {
        bits.push(((len >> i) & 1) as u8);
    }
    for byte in &bytes[..len as usize] {
        for i in 0..8 {
            bits.push((byte >> i) & 1);
        }
    }
    bits
}

/// Recover a watermark stamped by [`embed_watermark`] from samples decoded
/// with [`wav::read_wav_mono`]. Returns `None` when the samples carry no
/// plausible message.
pub fn read_watermark(samples: &[f32]) -> Option<String> {
    let bit_at = |i: usize| -> Option<u8> {
        let s = samples.get(i)?;
        // read_wav_mono scales 16-bit PCM by 1/32768.
        let q = (s.clamp(-1.0, 1.0) * 32768.0).round() as i32;
        Some((q & 1) as u8)
    };

    let mut len = 0u16;
    for i in 0..16 {
        len |= (bit_at(i)? as u16) << i;
    }
    if len == 0 || samples.len() < 16 + len as usize * 8 {
        return None;
    }

    let mut bytes = Vec::with_capacity(len as usize);
    for b in 0..len as usize {
        let mut byte = 0u8;
        for i in 0..8 {
            byte |= bit_at(16 + b * 8 + i)? << i;
        }
        bytes.push(byte);
    }
    String::from_utf8(bytes).ok()
}

#[cfg(test)]
mod tests {
    use super::*;

    fn sine_clip(dir: &Path, name: &str, seconds: f32, freq: f32) -> std::path::PathBuf {
        let rate = 22050u32;
        let n = (seconds * rate as f32) as usize;
        let samples: Vec<f32> = (0..n)
            .map(|i| (i as f32 * freq * std::f32::consts::TAU / rate as f32).sin() * 0.5)
            .collect();
        let path = dir.join(name);
        wav::write_wav(&path, &samples, rate).unwrap();
        path
    }

    #[test]
    fn extraction_yields_nonempty_profile_and_name() {
        let dir = tempfile::tempdir().unwrap();
        let clip = sine_clip(dir.path(), "My Clip.wav", 0.5, 440.0);

        let converter = MelToneConverter::new(ConverterConfig::default());
        let (se, name) = converter.extract_embedding(&clip).unwrap();
        assert_eq!(se.len(), 80);
        assert!(!se.is_empty());
        assert_eq!(name, "my-clip");
    }

    #[test]
    fn extraction_rejects_too_short_clip() {
        let dir = tempfile::tempdir().unwrap();
        let clip = sine_clip(dir.path(), "blip.wav", 0.001, 440.0);

        let converter = MelToneConverter::new(ConverterConfig::default());
        assert!(converter.extract_embedding(&clip).is_err());
    }

    #[test]
    fn conversion_changes_audio_and_carries_watermark() {
        let dir = tempfile::tempdir().unwrap();
        let src = sine_clip(dir.path(), "raw.wav", 0.3, 220.0);
        let out = dir.path().join("converted.wav");

        let converter = MelToneConverter::new(ConverterConfig::default());
        let source_se = ToneColorEmbedding::new(vec![0.0; 80]);
        let target_se = ToneColorEmbedding::new(vec![1.0; 80]);
        converter
            .convert(&src, &source_se, &target_se, &out, "@MyShell")
            .unwrap();

        let raw = std::fs::read(&src).unwrap();
        let converted = std::fs::read(&out).unwrap();
        assert_ne!(raw, converted);

        let (samples, _) = wav::read_wav_mono(&out).unwrap();
        assert_eq!(read_watermark(&samples).as_deref(), Some("@MyShell"));
    }

    #[test]
    fn config_defaults_survive_partial_json() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("config.json");
        std::fs::write(&path, r#"{"n_mels": 40}"#).unwrap();

        let config = ConverterConfig::load(&path).unwrap();
        assert_eq!(config.n_mels, 40);
        assert_eq!(config.frame_size, 1024);
    }
}
