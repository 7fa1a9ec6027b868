//! Classifier seam: the model is reached only through these traits, so the
//! service runs the same way with the TorchScript backend, without it, or with
//! a stub in tests.

pub mod fallback;
pub mod frames;
#[cfg(feature = "torch")]
pub mod torch;

use std::path::{Path, PathBuf};
use std::sync::Arc;

use crate::config::ModelConfig;

#[allow(dead_code)]
#[derive(Debug, thiserror::Error)]
pub enum ClassifierError {
    #[error("Classifier backend unavailable: {0}")]
    BackendUnavailable(String),
    #[error("Failed to load model from {path}: {reason}")]
    LoadFailed { path: PathBuf, reason: String },
    #[error("Preprocessing error: {0}")]
    Preprocessing(String),
    #[error("Model error: {0}")]
    Model(String),
    #[error("Frame extraction failed: {0}")]
    FrameExtraction(String),
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

/// Both entry points return "percent confidence human" in [0, 100].
pub trait Classifier: Send + Sync {
    fn classify_image(&self, path: &Path) -> Result<f64, ClassifierError>;

    fn classify_video(&self, path: &Path, samples: usize) -> Result<f64, ClassifierError>;
}

/// Turns a located artifact into a usable classifier.
pub trait ClassifierBackend: Send + Sync {
    fn name(&self) -> &'static str;

    fn load(&self, artifact: &Path) -> Result<Arc<dyn Classifier>, ClassifierError>;
}

/// Backend used when the crate is built without model support; every load
/// fails so the service stays in fallback mode.
pub struct UnsupportedBackend;

impl ClassifierBackend for UnsupportedBackend {
    fn name(&self) -> &'static str {
        "unsupported"
    }

    fn load(&self, _artifact: &Path) -> Result<Arc<dyn Classifier>, ClassifierError> {
        Err(ClassifierError::BackendUnavailable(
            "built without the `torch` feature".to_string(),
        ))
    }
}

#[cfg(feature = "torch")]
pub fn default_backend(config: &ModelConfig) -> Arc<dyn ClassifierBackend> {
    Arc::new(torch::TorchBackend::new(
        config.image_size,
        config.human_class_index,
    ))
}

#[cfg(not(feature = "torch"))]
pub fn default_backend(_config: &ModelConfig) -> Arc<dyn ClassifierBackend> {
    Arc::new(UnsupportedBackend)
}
