// Configuration for the demo server, read once from the environment.

use std::path::PathBuf;
use std::time::Duration;

#[derive(Debug, Clone)]
pub struct ServerConfig {
    pub port: u16,
    /// When true the demo binds on all interfaces (the public-share toggle);
    /// otherwise it stays on loopback.
    pub share: bool,
    /// map.json resolving each language to a voice config.
    pub models_map: PathBuf,
    /// Tone-color converter config file.
    pub converter_config: PathBuf,
    /// Directory of per-speaker source embeddings (`<key>.se`).
    pub embeddings_dir: PathBuf,
    /// Directory for the fixed output artifacts, created at startup.
    pub output_dir: PathBuf,
    /// Provenance message stamped into converted audio.
    pub watermark_message: String,
    pub request_timeout_secs: u64,
    pub rate_limit_per_minute: u32,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            port: 8085,
            share: false,
            models_map: PathBuf::from("models/map.json"),
            converter_config: PathBuf::from("checkpoints/converter/config.json"),
            embeddings_dir: PathBuf::from("checkpoints/base_speakers/ses"),
            output_dir: PathBuf::from("outputs"),
            watermark_message: "@MyShell".to_string(),
            request_timeout_secs: 300,
            rate_limit_per_minute: 60,
        }
    }
}

impl ServerConfig {
    pub fn from_env() -> Self {
        let defaults = Self::default();

        let env_path = |key: &str, fallback: PathBuf| {
            std::env::var(key).map(PathBuf::from).unwrap_or(fallback)
        };

        Self {
            port: std::env::var("PORT")
                .ok()
                .and_then(|v| v.parse().ok())
                .unwrap_or(defaults.port),
            share: std::env::var("SHARE")
                .map(|v| matches!(v.trim(), "1" | "true" | "yes"))
                .unwrap_or(defaults.share),
            models_map: env_path("MODELS_MAP", defaults.models_map),
            converter_config: env_path("CONVERTER_CONFIG", defaults.converter_config),
            embeddings_dir: env_path("EMBEDDINGS_DIR", defaults.embeddings_dir),
            output_dir: env_path("OUTPUT_DIR", defaults.output_dir),
            watermark_message: std::env::var("WATERMARK_MESSAGE")
                .unwrap_or(defaults.watermark_message),
            request_timeout_secs: std::env::var("REQUEST_TIMEOUT_SECS")
                .ok()
                .and_then(|v| v.parse().ok())
                .unwrap_or(defaults.request_timeout_secs),
            rate_limit_per_minute: std::env::var("RATE_LIMIT_PER_MINUTE")
                .ok()
                .and_then(|v| v.parse().ok())
                .unwrap_or(defaults.rate_limit_per_minute),
        }
    }

    pub fn bind_host(&self) -> &'static str {
        if self.share {
            "0.0.0.0"
        } else {
            "127.0.0.1"
        }
    }

    pub fn request_timeout(&self) -> Duration {
        Duration::from_secs(self.request_timeout_secs)
    }
}
