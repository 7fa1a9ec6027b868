use std::time::Instant;

use actix_multipart::Multipart;
use actix_web::http::{Method, header};
use actix_web::{HttpResponse, web};
use futures::TryStreamExt;
use log::{info, warn};
use shared::{HealthResponse, MediaKind, StatusResponse, TestResponse, UploadResponse};

use crate::analysis::Analyzer;
use crate::error::UploadError;
use crate::storage::upload_store::{UploadStore, sanitize_filename};

pub fn configure_routes(cfg: &mut web::ServiceConfig) {
    cfg.service(
        web::resource("/upload")
            .route(web::post().to(upload_file))
            .route(web::method(Method::OPTIONS).to(upload_preflight)),
    )
    .service(web::resource("/test").route(web::get().to(test_endpoint)))
    .service(web::resource("/health").route(web::get().to(health_check)));
}

/// The `file` part of a multipart upload.
pub(crate) struct FilePart {
    pub file_name: String,
    pub data: Vec<u8>,
}

/// Reads the first `file` field that carries a filename; other fields are
/// drained and ignored.
pub(crate) async fn read_file_part(
    payload: &mut Multipart,
    max_bytes: usize,
) -> Result<Option<FilePart>, UploadError> {
    let mut found = None;
    while let Some(mut field) = payload.try_next().await? {
        let file_name = field
            .content_disposition()
            .and_then(|cd| cd.get_filename())
            .map(str::to_string);
        let wanted = found.is_none() && field.name() == Some("file") && file_name.is_some();

        let mut data = Vec::new();
        while let Some(chunk) = field.try_next().await? {
            if !wanted {
                continue;
            }
            if data.len() + chunk.len() > max_bytes {
                return Err(UploadError::FileTooLarge);
            }
            data.extend_from_slice(&chunk);
        }

        if wanted {
            found = Some(FilePart {
                file_name: file_name.unwrap_or_default(),
                data,
            });
        }
    }
    Ok(found)
}

async fn upload_file(
    store: web::Data<UploadStore>,
    analyzer: web::Data<Analyzer>,
    mut payload: Multipart,
) -> Result<HttpResponse, UploadError> {
    let started = Instant::now();
    info!("Upload request received");

    let part = read_file_part(&mut payload, store.max_bytes())
        .await?
        .ok_or(UploadError::NoFile)?;
    if part.file_name.is_empty() {
        return Err(UploadError::NoFileSelected);
    }
    let kind = MediaKind::from_filename(&part.file_name).ok_or_else(|| {
        warn!("File type not allowed: {}", part.file_name);
        UploadError::FileTypeNotAllowed
    })?;
    if MediaKind::from_filename(&sanitize_filename(&part.file_name)) != Some(kind) {
        return Err(UploadError::InvalidFilename);
    }
    info!(
        "Received {} {} ({} bytes)",
        kind,
        part.file_name,
        part.data.len()
    );

    let store = store.into_inner();
    let stored = web::block(move || store.persist(&part.file_name, &part.data)).await??;

    let analysis = analyzer.analyze(kind, stored.path()).await;
    let filename = stored.file_name();
    let filepath = stored.path().display().to_string();
    stored.remove();

    let message = if analysis.model_used {
        "File uploaded successfully"
    } else {
        "File uploaded successfully (demo mode)"
    };
    let response = UploadResponse {
        message: message.to_string(),
        filename,
        filepath,
        percentage: analysis.percentage,
        analysis_result: analysis.verdict().to_string(),
        model_used: analysis.model_used,
        demo_mode: !analysis.model_used,
        request_duration: started.elapsed().as_secs_f64(),
    };
    info!(
        "Upload analysed in {:.3}s: {}",
        response.request_duration, response.analysis_result
    );
    Ok(HttpResponse::Ok().json(response))
}

/// Answers every `OPTIONS /upload`, including preflights the CORS layer did
/// not grant; the allow-origin header is only added for configured origins.
pub(crate) async fn upload_preflight() -> HttpResponse {
    HttpResponse::Ok()
        .insert_header((header::ACCESS_CONTROL_ALLOW_HEADERS, "Content-Type"))
        .insert_header((header::ACCESS_CONTROL_ALLOW_METHODS, "POST, OPTIONS"))
        .json(StatusResponse {
            status: "ok".to_string(),
        })
}

async fn test_endpoint() -> HttpResponse {
    HttpResponse::Ok().json(TestResponse {
        message: "Backend is working!".to_string(),
        timestamp: Some(chrono::Utc::now().to_rfc3339()),
    })
}

async fn health_check(analyzer: web::Data<Analyzer>) -> HttpResponse {
    let loader = analyzer.loader();
    HttpResponse::Ok().json(HealthResponse {
        status: "healthy".to_string(),
        model_available: loader.is_available(),
        model_state: loader.state(),
    })
}

#[cfg(test)]
pub(crate) mod tests {
    use super::*;
    use crate::classifier::fallback::{FallbackScorer, FixedFallback, RandomFallback};
    use crate::classifier::Classifier;
    use crate::loader::tests::{ConstantClassifier, StubBackend, locator_with_artifact};
    use crate::loader::{ArtifactLocator, ModelLoader};
    use actix_web::http::StatusCode;
    use actix_web::http::header::CONTENT_TYPE;
    use actix_web::{App, test};
    use shared::{ErrorResponse, ModelStatus, Verdict};
    use std::path::Path;
    use std::sync::Arc;

    const BOUNDARY: &str = "----realcheck-test-boundary";

    pub fn multipart_body(field: &str, file_name: Option<&str>, data: &[u8]) -> (String, Vec<u8>) {
        let disposition = match file_name {
            Some(name) => format!("form-data; name=\"{}\"; filename=\"{}\"", field, name),
            None => format!("form-data; name=\"{}\"", field),
        };
        let mut body = Vec::new();
        body.extend_from_slice(
            format!(
                "--{}\r\nContent-Disposition: {}\r\nContent-Type: application/octet-stream\r\n\r\n",
                BOUNDARY, disposition
            )
            .as_bytes(),
        );
        body.extend_from_slice(data);
        body.extend_from_slice(format!("\r\n--{}--\r\n", BOUNDARY).as_bytes());
        (format!("multipart/form-data; boundary={}", BOUNDARY), body)
    }

    pub fn upload_request(field: &str, file_name: Option<&str>, data: &[u8]) -> test::TestRequest {
        let (content_type, body) = multipart_body(field, file_name, data);
        test::TestRequest::post()
            .uri("/upload")
            .insert_header((CONTENT_TYPE, content_type))
            .set_payload(body)
    }

    struct Harness {
        upload_dir: tempfile::TempDir,
        _model_dir: tempfile::TempDir,
        store: web::Data<UploadStore>,
        analyzer: web::Data<Analyzer>,
    }

    impl Harness {
        fn new(classifier: Option<Arc<dyn Classifier>>, fallback: Arc<dyn FallbackScorer>) -> Self {
            let upload_dir = tempfile::tempdir().unwrap();
            let model_dir = tempfile::tempdir().unwrap();
            let (locator, backend) = match classifier {
                Some(classifier) => (
                    locator_with_artifact(model_dir.path()),
                    StubBackend::returning(classifier),
                ),
                None => (
                    ArtifactLocator::new(
                        None,
                        model_dir.path().to_path_buf(),
                        "image_classifier.pt".to_string(),
                    ),
                    StubBackend::failing(),
                ),
            };
            let loader = Arc::new(ModelLoader::new(locator, Arc::new(backend), false));
            let store = UploadStore::new(upload_dir.path(), 1024).unwrap();
            Self {
                store: web::Data::new(store),
                analyzer: web::Data::new(Analyzer::new(loader, fallback, 3)),
                upload_dir,
                _model_dir: model_dir,
            }
        }

        fn app(
            &self,
        ) -> App<
            impl actix_web::dev::ServiceFactory<
                actix_web::dev::ServiceRequest,
                Config = (),
                Response = actix_web::dev::ServiceResponse,
                Error = actix_web::Error,
                InitError = (),
            > + use<>,
        > {
            App::new()
                .app_data(self.store.clone())
                .app_data(self.analyzer.clone())
                .configure(configure_routes)
        }

        fn stored_files(&self) -> usize {
            std::fs::read_dir(self.upload_dir.path()).unwrap().count()
        }
    }

    #[actix_web::test]
    async fn upload_with_model_reports_verdict_and_cleans_up() {
        let harness = Harness::new(
            Some(Arc::new(ConstantClassifier(30.0))),
            Arc::new(FixedFallback(99.0)),
        );
        let app = test::init_service(harness.app()).await;

        let req = upload_request("file", Some("cat.png"), b"\x89PNG fake").to_request();
        let resp = test::call_service(&app, req).await;
        assert_eq!(resp.status(), StatusCode::OK);

        let body: UploadResponse = test::read_body_json(resp).await;
        assert_eq!(body.percentage, 30.0);
        assert_eq!(body.analysis_result, "70.0% sure this is AI");
        assert!(body.model_used);
        assert!(!body.demo_mode);
        assert_eq!(body.message, "File uploaded successfully");
        assert_eq!(body.filename, "cat.png");
        assert!(body.filepath.ends_with("cat.png"));
        assert!(body.request_duration >= 0.0);
        assert_eq!(harness.stored_files(), 0);
        assert!(!Path::new(&body.filepath).exists());
    }

    #[actix_web::test]
    async fn video_upload_goes_through_model() {
        let harness = Harness::new(
            Some(Arc::new(ConstantClassifier(82.3))),
            Arc::new(FixedFallback(1.0)),
        );
        let app = test::init_service(harness.app()).await;

        let req = upload_request("file", Some("Holiday Clip.MOV"), b"moov").to_request();
        let body: UploadResponse = test::call_and_read_body_json(&app, req).await;
        assert_eq!(body.analysis_result, "82.3% sure this is human");
        assert_eq!(body.filename, "Holiday_Clip.MOV");
        assert_eq!(harness.stored_files(), 0);
    }

    #[actix_web::test]
    async fn unavailable_model_uses_fallback() {
        let harness = Harness::new(None, Arc::new(FixedFallback(82.3)));
        let app = test::init_service(harness.app()).await;

        let req = upload_request("file", Some("photo.jpg"), b"jpeg").to_request();
        let body: UploadResponse = test::call_and_read_body_json(&app, req).await;
        assert_eq!(body.percentage, 82.3);
        assert_eq!(body.analysis_result, "82.3% sure this is human");
        assert!(!body.model_used);
        assert!(body.demo_mode);
        assert_eq!(body.message, "File uploaded successfully (demo mode)");
        assert_eq!(harness.stored_files(), 0);
    }

    #[actix_web::test]
    async fn random_fallback_stays_consistent_with_verdict() {
        let harness = Harness::new(None, Arc::new(RandomFallback));
        let app = test::init_service(harness.app()).await;

        for _ in 0..20 {
            let req = upload_request("file", Some("frame.gif"), b"GIF89a").to_request();
            let body: UploadResponse = test::call_and_read_body_json(&app, req).await;
            assert!((0.0..=100.0).contains(&body.percentage));
            assert_eq!(
                body.analysis_result,
                Verdict::from_percentage(body.percentage).to_string()
            );
        }
        assert_eq!(harness.stored_files(), 0);
    }

    #[actix_web::test]
    async fn disallowed_extensions_are_rejected() {
        let harness = Harness::new(None, Arc::new(FixedFallback(50.0)));
        let app = test::init_service(harness.app()).await;

        for name in ["notes.txt", "run.exe", "noextension", "image.png.sh", "clip.mkv"] {
            let req = upload_request("file", Some(name), b"data").to_request();
            let resp = test::call_service(&app, req).await;
            assert_eq!(resp.status(), StatusCode::BAD_REQUEST, "{} was accepted", name);
            let body: ErrorResponse = test::read_body_json(resp).await;
            assert_eq!(body.error, "File type not allowed");
        }
        assert_eq!(harness.stored_files(), 0);
    }

    #[actix_web::test]
    async fn missing_file_part_is_rejected() {
        let harness = Harness::new(None, Arc::new(FixedFallback(50.0)));
        let app = test::init_service(harness.app()).await;

        let req = upload_request("document", Some("cat.png"), b"data").to_request();
        let resp = test::call_service(&app, req).await;
        assert_eq!(resp.status(), StatusCode::BAD_REQUEST);
        let body: ErrorResponse = test::read_body_json(resp).await;
        assert_eq!(body.error, "No file provided");

        let req = upload_request("file", None, b"data").to_request();
        let resp = test::call_service(&app, req).await;
        assert_eq!(resp.status(), StatusCode::BAD_REQUEST);
    }

    #[actix_web::test]
    async fn empty_filename_is_rejected() {
        let harness = Harness::new(None, Arc::new(FixedFallback(50.0)));
        let app = test::init_service(harness.app()).await;

        let req = upload_request("file", Some(""), b"data").to_request();
        let resp = test::call_service(&app, req).await;
        assert_eq!(resp.status(), StatusCode::BAD_REQUEST);
        let body: ErrorResponse = test::read_body_json(resp).await;
        assert_eq!(body.error, "No file selected");
    }

    #[actix_web::test]
    async fn name_that_sanitises_away_is_rejected() {
        let harness = Harness::new(None, Arc::new(FixedFallback(50.0)));
        let app = test::init_service(harness.app()).await;

        let req = upload_request("file", Some(".png"), b"data").to_request();
        let resp = test::call_service(&app, req).await;
        assert_eq!(resp.status(), StatusCode::BAD_REQUEST);
        let body: ErrorResponse = test::read_body_json(resp).await;
        assert_eq!(body.error, "Invalid filename");
        assert_eq!(harness.stored_files(), 0);
    }

    #[actix_web::test]
    async fn oversized_upload_is_rejected() {
        let harness = Harness::new(None, Arc::new(FixedFallback(50.0)));
        let app = test::init_service(harness.app()).await;

        let req = upload_request("file", Some("huge.png"), &vec![0u8; 2048]).to_request();
        let resp = test::call_service(&app, req).await;
        assert_eq!(resp.status(), StatusCode::PAYLOAD_TOO_LARGE);
        assert_eq!(harness.stored_files(), 0);
    }

    #[actix_web::test]
    async fn preflight_always_succeeds() {
        let harness = Harness::new(None, Arc::new(FixedFallback(50.0)));
        let app = test::init_service(harness.app()).await;
        std::fs::remove_dir_all(harness.upload_dir.path()).unwrap();

        let req = test::TestRequest::default()
            .method(Method::OPTIONS)
            .uri("/upload")
            .to_request();
        let resp = test::call_service(&app, req).await;
        assert_eq!(resp.status(), StatusCode::OK);
        let body: StatusResponse = test::read_body_json(resp).await;
        assert_eq!(body.status, "ok");
    }

    #[actix_web::test]
    async fn health_tracks_model_state() {
        let harness = Harness::new(
            Some(Arc::new(ConstantClassifier(70.0))),
            Arc::new(FixedFallback(50.0)),
        );
        let app = test::init_service(harness.app()).await;

        let req = test::TestRequest::get().uri("/health").to_request();
        let body: HealthResponse = test::call_and_read_body_json(&app, req).await;
        assert_eq!(body.status, "healthy");
        assert!(!body.model_available);
        assert_eq!(body.model_state, ModelStatus::NotLoaded);

        assert!(harness.analyzer.loader().ensure_loaded());

        let req = test::TestRequest::get().uri("/health").to_request();
        let body: HealthResponse = test::call_and_read_body_json(&app, req).await;
        assert!(body.model_available);
        assert_eq!(body.model_state, ModelStatus::Loaded);
    }

    #[actix_web::test]
    async fn health_reports_failed_load() {
        let harness = Harness::new(None, Arc::new(FixedFallback(50.0)));
        let app = test::init_service(harness.app()).await;
        assert!(!harness.analyzer.loader().ensure_loaded());

        let req = test::TestRequest::get().uri("/health").to_request();
        let body: HealthResponse = test::call_and_read_body_json(&app, req).await;
        assert!(!body.model_available);
        assert_eq!(body.model_state, ModelStatus::Unavailable);
    }

    #[actix_web::test]
    async fn test_endpoint_reports_timestamp() {
        let harness = Harness::new(None, Arc::new(FixedFallback(50.0)));
        let app = test::init_service(harness.app()).await;

        let req = test::TestRequest::get().uri("/test").to_request();
        let body: TestResponse = test::call_and_read_body_json(&app, req).await;
        assert_eq!(body.message, "Backend is working!");
        let timestamp = body.timestamp.unwrap();
        assert!(chrono::DateTime::parse_from_rfc3339(&timestamp).is_ok());
    }
}
