use actix_web::{App, HttpServer};
use backend::config::ServiceConfig;
use backend::cors::build_cors;
use backend::demo::configure_demo_routes;

#[actix_web::main]
async fn main() -> std::io::Result<()> {
    dotenv::dotenv().ok();
    env_logger::init_from_env(env_logger::Env::new().default_filter_or("info"));

    let config = ServiceConfig::load()
        .map_err(|e| std::io::Error::new(std::io::ErrorKind::InvalidInput, e.to_string()))?;
    let cors_config = config.cors.clone();

    let bind_address = config.bind_address();
    log::info!("Starting demo server on {}", bind_address);

    HttpServer::new(move || {
        App::new()
            .wrap(build_cors(&cors_config))
            .configure(configure_demo_routes)
    })
    .bind(&bind_address)?
    .run()
    .await
}
