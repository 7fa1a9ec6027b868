use actix_cors::Cors;
use actix_web::http::header;

use crate::config::CorsConfig;

/// Requests from unlisted origins are served without allow headers rather
/// than rejected, and preflights fall through to the route handlers.
pub fn build_cors(config: &CorsConfig) -> Cors {
    let mut cors = Cors::default()
        .allowed_methods(vec!["GET", "POST", "OPTIONS"])
        .allowed_headers(vec![header::CONTENT_TYPE, header::ACCEPT])
        .max_age(config.max_age)
        .block_on_origin_mismatch(false)
        .disable_preflight();
    for origin in &config.allowed_origins {
        cors = cors.allowed_origin(origin);
    }
    cors
}
