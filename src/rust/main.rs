use std::sync::Arc;

use anyhow::Context;
use clap::Parser;
use emotion_api::{init_logger, server, Config, EmotionService, ModelLocation, OnnxModelLoader};
use log::info;

fn clear_cached_model(location: &ModelLocation) -> anyhow::Result<()> {
    if let ModelLocation::Hub { manager, source } = location {
        info!("Fresh download requested - removing any existing model files...");
        manager
            .remove_download(source)
            .with_context(|| format!("failed to remove cached files for {}", source.repo_id))?;
    }
    Ok(())
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    init_logger();
    let config = Config::parse();

    info!("=== Starting Emotion Analysis API ===");

    let location = config
        .model_location()
        .context("failed to prepare the model cache directory")?;
    if config.fresh {
        clear_cached_model(&location)?;
    }

    let loader = OnnxModelLoader::new(location)
        .with_runtime_config(config.runtime_config())
        .with_max_sequence_length(config.max_sequence_length);
    let service = EmotionService::new(Arc::new(loader), config.model_name());

    if config.warmup {
        let warm = service.clone();
        tokio::spawn(async move {
            let report = warm.warmup().await;
            info!("Startup warmup: {} ({:?})", report.message, report.status);
        });
    }

    let prefix = config.route_prefix();
    let app = server::router(service, &prefix);

    let addr = config.socket_addr();
    let listener = tokio::net::TcpListener::bind(addr)
        .await
        .with_context(|| format!("failed to bind {}", addr))?;
    info!("Routes mounted under '{}'", if prefix.is_empty() { "/" } else { prefix.as_str() });

    server::serve(listener, app).await?;
    info!("=== Server stopped ===");
    Ok(())
}
