use std::env;
use std::sync::Arc;

use actix_web::{App, HttpServer, web};
use backend::analysis::Analyzer;
use backend::classifier::default_backend;
use backend::classifier::fallback::RandomFallback;
use backend::config::{LoadPolicy, ServiceConfig};
use backend::cors::build_cors;
use backend::loader::{ArtifactLocator, ModelLoader};
use backend::routes::configure_routes;
use backend::storage::upload_store::UploadStore;

#[actix_web::main]
async fn main() -> std::io::Result<()> {
    dotenv::dotenv().ok();
    env_logger::init_from_env(env_logger::Env::new().default_filter_or("info"));

    if let Ok(current_dir) = env::current_dir() {
        log::info!("Current working directory: {}", current_dir.display());
    } else {
        log::error!("Failed to get the current working directory.");
    }

    let config = ServiceConfig::load().map_err(|e| {
        log::error!("Invalid configuration: {}", e);
        std::io::Error::new(std::io::ErrorKind::InvalidInput, e.to_string())
    })?;

    let store = UploadStore::new(config.upload_dir(), config.uploads.max_bytes).map_err(|e| {
        log::error!(
            "Error creating upload directory {}: {}",
            config.upload_dir().display(),
            e
        );
        e
    })?;
    log::info!("Upload directory: {}", store.dir().display());

    let backend = default_backend(&config.model);
    let locator = ArtifactLocator::from_config(&config.model);
    log::info!(
        "Classifier backend: {}; artifact candidates: {:?}",
        backend.name(),
        locator.candidates()
    );
    let loader = Arc::new(ModelLoader::new(
        locator,
        backend,
        config.model.retry_on_failure,
    ));

    match config.model.load_policy {
        LoadPolicy::Eager => {
            if let Err(e) = loader.spawn_background_load() {
                log::error!("Failed to start background model loader: {}", e);
            }
        }
        LoadPolicy::Lazy => log::info!("Model will be loaded on first upload"),
    }

    let analyzer = web::Data::new(Analyzer::new(
        loader,
        Arc::new(RandomFallback),
        config.model.video_samples,
    ));
    let store = web::Data::new(store);
    let cors_config = config.cors.clone();

    let bind_address = config.bind_address();
    log::info!("Starting server on {}", bind_address);

    let mut server = HttpServer::new(move || {
        App::new()
            .wrap(build_cors(&cors_config))
            .app_data(store.clone())
            .app_data(analyzer.clone())
            .configure(configure_routes)
    });
    if let Some(workers) = config.server.workers {
        server = server.workers(workers);
    }
    server.bind(&bind_address)?.run().await
}
