use actix_web::http::StatusCode;
use actix_web::{HttpResponse, ResponseError};
use shared::ErrorResponse;

use crate::storage::upload_store::StoreError;

#[derive(Debug, thiserror::Error)]
pub enum UploadError {
    #[error("No file provided")]
    NoFile,
    #[error("No file selected")]
    NoFileSelected,
    #[error("File type not allowed")]
    FileTypeNotAllowed,
    #[error("Invalid filename")]
    InvalidFilename,
    #[error("File too large")]
    FileTooLarge,
    #[error("Invalid multipart payload: {0}")]
    Multipart(String),
    #[error("Failed to save file: {0}")]
    Save(String),
    #[error("File was not saved successfully")]
    NotVerified,
    #[error("{0}")]
    Internal(String),
}

impl From<StoreError> for UploadError {
    fn from(err: StoreError) -> Self {
        match err {
            StoreError::Save(e) => UploadError::Save(e.to_string()),
            StoreError::NotVerified => UploadError::NotVerified,
            StoreError::FileTooLarge => UploadError::FileTooLarge,
            StoreError::InvalidFilename => UploadError::InvalidFilename,
        }
    }
}

impl From<actix_multipart::MultipartError> for UploadError {
    fn from(err: actix_multipart::MultipartError) -> Self {
        UploadError::Multipart(err.to_string())
    }
}

impl From<actix_web::error::BlockingError> for UploadError {
    fn from(err: actix_web::error::BlockingError) -> Self {
        UploadError::Internal(err.to_string())
    }
}

impl ResponseError for UploadError {
    fn status_code(&self) -> StatusCode {
        match self {
            UploadError::NoFile
            | UploadError::NoFileSelected
            | UploadError::FileTypeNotAllowed
            | UploadError::InvalidFilename
            | UploadError::Multipart(_) => StatusCode::BAD_REQUEST,
            UploadError::FileTooLarge => StatusCode::PAYLOAD_TOO_LARGE,
            UploadError::Save(_) | UploadError::NotVerified | UploadError::Internal(_) => {
                StatusCode::INTERNAL_SERVER_ERROR
            }
        }
    }

    fn error_response(&self) -> HttpResponse {
        HttpResponse::build(self.status_code()).json(ErrorResponse {
            error: self.to_string(),
        })
    }
}
