//! HTTP surface for the voice-cloning TTS demo.

pub mod config;
pub mod error;
pub mod routes;
pub mod validation;

pub use config::ServerConfig;
pub use error::ApiError;
pub use routes::{build_router, AppState, REFERENCE_AUDIO_FILE};
