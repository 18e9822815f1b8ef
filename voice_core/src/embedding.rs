use std::fs;
use std::path::Path;

use anyhow::Context;

/// A speaker's tone-color embedding.
///
/// Stored on disk as raw little-endian f32 values (`<speaker-key>.se`).
/// An empty embedding means "no target voice" and bypasses conversion.
#[derive(Debug, Clone, PartialEq, Default)]
pub struct ToneColorEmbedding(Vec<f32>);

impl ToneColorEmbedding {
    pub fn new(values: Vec<f32>) -> Self {
        Self(values)
    }

    /// Load from a raw f32-LE file. The file must be non-empty and a whole
    /// number of f32s; anything else is treated as a corrupt embedding.
    pub fn load<P: AsRef<Path>>(path: P) -> anyhow::Result<Self> {
        let path = path.as_ref();
        let bytes = fs::read(path)
            .with_context(|| format!("failed to read tone color embedding {}", path.display()))?;
        if bytes.is_empty() || bytes.len() % 4 != 0 {
            anyhow::bail!(
                "embedding file {} is empty or truncated ({} bytes)",
                path.display(),
                bytes.len()
            );
        }
        let values = bytes
            .chunks_exact(4)
            .map(|c| f32::from_le_bytes([c[0], c[1], c[2], c[3]]))
            .collect();
        Ok(Self(values))
    }

    pub fn save<P: AsRef<Path>>(&self, path: P) -> anyhow::Result<()> {
        let path = path.as_ref();
        let mut bytes = Vec::with_capacity(self.0.len() * 4);
        for v in &self.0 {
            bytes.extend_from_slice(&v.to_le_bytes());
        }
        fs::write(path, bytes)
            .with_context(|| format!("failed to write embedding {}", path.display()))
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    pub fn len(&self) -> usize {
        self.0.len()
    }

    pub fn as_slice(&self) -> &[f32] {
        &self.0
    }
}
