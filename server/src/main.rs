use std::net::SocketAddr;
use std::sync::Arc;

use tower::ServiceBuilder;
use tower_http::{cors::CorsLayer, timeout::TimeoutLayer, trace::TraceLayer};
use tower_governor::{
    governor::GovernorConfigBuilder, key_extractor::GlobalKeyExtractor, GovernorLayer,
};
use tracing::info;

use server::{build_router, AppState, ServerConfig};
use voice_core::{MelToneConverter, ModelCache, PiperLoader, SynthesisPipeline};

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("info")),
        )
        .init();

    let _ = dotenv::dotenv();

    let config = ServerConfig::from_env();
    info!(
        port = config.port,
        share = config.share,
        "starting voice cloning demo server"
    );

    std::fs::create_dir_all(&config.output_dir)?;

    // Everything model-related loads before the server accepts a request;
    // a missing engine or embedding aborts startup.
    let converter = Arc::new(MelToneConverter::from_config_file(&config.converter_config)?);
    let loader = PiperLoader::from_mapfile(&config.models_map)?;
    info!("warming up per-language engines and source embeddings...");
    let cache = ModelCache::warm_up(&loader, &config.embeddings_dir)?;

    let pipeline = Arc::new(SynthesisPipeline::new(
        cache,
        converter,
        config.output_dir.clone(),
        config.watermark_message.clone(),
    ));
    let state = AppState::new(pipeline);

    let governor_conf = Arc::new(
        GovernorConfigBuilder::default()
            .per_second((config.rate_limit_per_minute.max(60) / 60) as u64)
            .burst_size(config.rate_limit_per_minute)
            .key_extractor(GlobalKeyExtractor)
            .finish()
            .ok_or_else(|| anyhow::anyhow!("invalid rate limit configuration"))?,
    );

    let middleware = ServiceBuilder::new()
        .layer(TraceLayer::new_for_http())
        .layer(GovernorLayer::new(governor_conf))
        .layer(TimeoutLayer::new(config.request_timeout()))
        .layer(CorsLayer::permissive())
        .into_inner();

    let app = build_router(state)
        .layer(axum::middleware::from_fn(request_id::add_request_id))
        .layer(middleware);

    let addr: SocketAddr = format!("{}:{}", config.bind_host(), config.port).parse()?;
    let listener = tokio::net::TcpListener::bind(addr)
        .await
        .map_err(|e| anyhow::anyhow!("failed to bind {addr}: {e}"))?;

    info!("demo listening on http://{addr}");
    axum::serve(listener, app).await?;
    Ok(())
}

mod request_id {
    use axum::{extract::Request, middleware::Next, response::Response};

    /// Tag request and response with a correlation id for the trace layer.
    pub async fn add_request_id(mut request: Request, next: Next) -> Response {
        let request_id = uuid::Uuid::new_v4().to_string();
        if let Ok(value) = axum::http::HeaderValue::from_str(&request_id) {
            request.headers_mut().insert("x-request-id", value.clone());
            let mut response = next.run(request).await;
            response.headers_mut().insert("x-request-id", value);
            return response;
        }
        next.run(request).await
    }
}
