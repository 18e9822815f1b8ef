//! Shared fixtures for the HTTP integration tests.
//!
//! The real model checkpoints are not available in CI, so the app is wired
//! to the deterministic fakes from `voice_core::testing`.

use std::path::Path;
use std::sync::Arc;

use axum::Router;
use tempfile::TempDir;

use server::{build_router, AppState};
use voice_core::testing::{write_embeddings_for, FakeConverter, FakeLoader};
use voice_core::{ModelCache, SynthesisPipeline, ToneColorConverter};

pub const BOUNDARY: &str = "------------demo-test-boundary";

pub struct TestApp {
    pub router: Router,
    pub output_dir: std::path::PathBuf,
    // Keeps the embeddings and artifacts alive for the test's duration.
    pub _dir: TempDir,
}

pub fn create_test_app() -> TestApp {
    create_test_app_with(Arc::new(FakeConverter::default()))
}

pub fn create_test_app_with(converter: Arc<dyn ToneColorConverter>) -> TestApp {
    let dir = tempfile::tempdir().unwrap();
    let embeddings = dir.path().join("ses");
    std::fs::create_dir_all(&embeddings).unwrap();

    let loader = FakeLoader::default();
    write_embeddings_for(&loader, &embeddings);
    let cache = ModelCache::warm_up(&loader, &embeddings).unwrap();

    let output_dir = dir.path().join("outputs");
    std::fs::create_dir_all(&output_dir).unwrap();

    let pipeline = Arc::new(SynthesisPipeline::new(
        cache,
        converter,
        output_dir.clone(),
        "@MyShell",
    ));

    TestApp {
        router: build_router(AppState::new(pipeline)),
        output_dir,
        _dir: dir,
    }
}

/// Build a multipart/form-data body by hand; the demo form is small enough
/// that a client crate would be overkill.
pub fn multipart_body(fields: &[(&str, &str)], file: Option<(&str, &[u8])>) -> Vec<u8> {
    let mut body = Vec::new();
    for (name, value) in fields {
        body.extend_from_slice(format!("--{BOUNDARY}\r\n").as_bytes());
        body.extend_from_slice(
            format!("Content-Disposition: form-data; name=\"{name}\"\r\n\r\n").as_bytes(),
        );
        body.extend_from_slice(value.as_bytes());
        body.extend_from_slice(b"\r\n");
    }
    if let Some((filename, bytes)) = file {
        body.extend_from_slice(format!("--{BOUNDARY}\r\n").as_bytes());
        body.extend_from_slice(
            format!(
                "Content-Disposition: form-data; name=\"reference\"; filename=\"{filename}\"\r\n"
            )
            .as_bytes(),
        );
        body.extend_from_slice(b"Content-Type: audio/wav\r\n\r\n");
        body.extend_from_slice(bytes);
        body.extend_from_slice(b"\r\n");
    }
    body.extend_from_slice(format!("--{BOUNDARY}--\r\n").as_bytes());
    body
}

pub fn multipart_content_type() -> String {
    format!("multipart/form-data; boundary={BOUNDARY}")
}

/// A short WAV clip, returned as raw file bytes for upload.
pub fn wav_clip_bytes(dir: &Path) -> Vec<u8> {
    wav_clip_bytes_of_len(dir, "upload.wav", 4000)
}

/// Same, with a chosen length so two uploads are distinguishable by bytes.
pub fn wav_clip_bytes_of_len(dir: &Path, name: &str, samples: usize) -> Vec<u8> {
    let path = dir.join(name);
    let samples: Vec<f32> = (0..samples).map(|i| (i as f32 * 0.04).sin() * 0.3).collect();
    voice_core::wav::write_wav(&path, &samples, 22050).unwrap();
    std::fs::read(path).unwrap()
}
