//! Routes for the demo server: uploads are read and measured but never saved
//! or classified.

use actix_multipart::Multipart;
use actix_web::http::Method;
use actix_web::{HttpResponse, web};
use serde_json::json;
use shared::{DemoUploadResponse, ErrorResponse, TestResponse};

use crate::config::DEFAULT_MAX_UPLOAD_BYTES;
use crate::error::UploadError;
use crate::routes::{read_file_part, upload_preflight};

const DEMO_PERCENTAGE: f64 = 75.5;

pub fn configure_demo_routes(cfg: &mut web::ServiceConfig) {
    cfg.service(web::resource("/").route(web::get().to(hello)))
        .service(web::resource("/test").route(web::get().to(test_endpoint)))
        .service(
            web::resource("/upload")
                .route(web::post().to(demo_upload))
                .route(web::method(Method::OPTIONS).to(upload_preflight)),
        );
}

async fn hello() -> HttpResponse {
    HttpResponse::Ok().json(json!({ "message": "Hello from the demo server!" }))
}

async fn test_endpoint() -> HttpResponse {
    HttpResponse::Ok().json(TestResponse {
        message: "Test endpoint working!".to_string(),
        timestamp: None,
    })
}

async fn demo_upload(mut payload: Multipart) -> Result<HttpResponse, UploadError> {
    let part = match read_file_part(&mut payload, DEFAULT_MAX_UPLOAD_BYTES).await? {
        Some(part) => part,
        None => {
            return Ok(HttpResponse::BadRequest().json(ErrorResponse {
                error: "No file".into(),
            }));
        }
    };
    if part.file_name.is_empty() {
        return Ok(HttpResponse::BadRequest().json(ErrorResponse {
            error: "No file selected".into(),
        }));
    }

    log::info!("Demo upload {} ({} bytes)", part.file_name, part.data.len());
    Ok(HttpResponse::Ok().json(DemoUploadResponse {
        message: "File received successfully!".into(),
        filename: part.file_name,
        size: part.data.len(),
        demo_mode: true,
        percentage: DEMO_PERCENTAGE,
        analysis_result: format!("{:.1}% sure this is human (demo mode)", DEMO_PERCENTAGE),
    }))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::routes::tests::upload_request;
    use actix_web::http::StatusCode;
    use actix_web::{App, test};

    #[actix_web::test]
    async fn demo_upload_returns_canned_result() {
        let app = test::init_service(App::new().configure(configure_demo_routes)).await;

        let req = upload_request("file", Some("anything.bin"), b"12345").to_request();
        let body: DemoUploadResponse = test::call_and_read_body_json(&app, req).await;
        assert_eq!(body.filename, "anything.bin");
        assert_eq!(body.size, 5);
        assert!(body.demo_mode);
        assert_eq!(body.percentage, 75.5);
        assert_eq!(body.analysis_result, "75.5% sure this is human (demo mode)");
    }

    #[actix_web::test]
    async fn demo_upload_requires_file() {
        let app = test::init_service(App::new().configure(configure_demo_routes)).await;

        let req = upload_request("other", Some("a.png"), b"x").to_request();
        let resp = test::call_service(&app, req).await;
        assert_eq!(resp.status(), StatusCode::BAD_REQUEST);
        let body: ErrorResponse = test::read_body_json(resp).await;
        assert_eq!(body.error, "No file");

        let req = upload_request("file", Some(""), b"x").to_request();
        let resp = test::call_service(&app, req).await;
        assert_eq!(resp.status(), StatusCode::BAD_REQUEST);
    }

    #[actix_web::test]
    async fn demo_root_and_test_respond() {
        let app = test::init_service(App::new().configure(configure_demo_routes)).await;

        let req = test::TestRequest::get().uri("/").to_request();
        let body: serde_json::Value = test::call_and_read_body_json(&app, req).await;
        assert_eq!(body["message"], "Hello from the demo server!");

        let req = test::TestRequest::get().uri("/test").to_request();
        let body: serde_json::Value = test::call_and_read_body_json(&app, req).await;
        assert_eq!(body["message"], "Test endpoint working!");
        assert!(body.get("timestamp").is_none());

        let req = test::TestRequest::default()
            .method(Method::OPTIONS)
            .uri("/upload")
            .to_request();
        let resp = test::call_service(&app, req).await;
        assert_eq!(resp.status(), StatusCode::OK);
    }
}
