use std::panic::{self, AssertUnwindSafe};
use std::path::PathBuf;
use std::sync::atomic::{AtomicU8, Ordering};
use std::sync::{Arc, RwLock};
use std::thread::JoinHandle;

use shared::ModelStatus;

use crate::classifier::{Classifier, ClassifierBackend, ClassifierError};
use crate::config::ModelConfig;

const NOT_LOADED: u8 = 0;
const LOADING: u8 = 1;
const LOADED: u8 = 2;
const UNAVAILABLE: u8 = 3;

#[derive(Debug, thiserror::Error)]
pub enum LoadError {
    #[error("Model artifact not found; looked in: {}", format_paths(.0))]
    ArtifactNotFound(Vec<PathBuf>),
    #[error("Classifier error: {0}")]
    Classifier(#[from] ClassifierError),
    #[error("Classifier backend panicked while loading: {0}")]
    Panicked(String),
}

fn format_paths(paths: &[PathBuf]) -> String {
    paths
        .iter()
        .map(|p| p.display().to_string())
        .collect::<Vec<_>>()
        .join(", ")
}

/// Where the classifier artifact may live: the platform secret-files
/// directory first, then the local model directory.
#[derive(Debug, Clone)]
pub struct ArtifactLocator {
    secret_files_dir: Option<PathBuf>,
    local_dir: PathBuf,
    file_name: String,
}

impl ArtifactLocator {
    pub fn new(secret_files_dir: Option<PathBuf>, local_dir: PathBuf, file_name: String) -> Self {
        Self {
            secret_files_dir,
            local_dir,
            file_name,
        }
    }

    pub fn from_config(config: &ModelConfig) -> Self {
        Self::new(
            config.secret_files_dir.clone(),
            config.local_dir.clone(),
            config.file_name.clone(),
        )
    }

    pub fn candidates(&self) -> Vec<PathBuf> {
        self.secret_files_dir
            .iter()
            .chain(std::iter::once(&self.local_dir))
            .map(|dir| dir.join(&self.file_name))
            .collect()
    }

    pub fn locate(&self) -> Result<PathBuf, LoadError> {
        let candidates = self.candidates();
        for candidate in &candidates {
            if candidate.is_file() {
                log::info!("Found model file: {}", candidate.display());
                return Ok(candidate.clone());
            }
            log::info!("Model file not found at {}", candidate.display());
        }
        Err(LoadError::ArtifactNotFound(candidates))
    }
}

/// One-shot classifier loading behind an atomic state cell.
///
/// The first caller to move the state out of `NotLoaded` (or out of
/// `Unavailable` when retries are enabled) performs the load; every other
/// caller returns immediately with the availability observed at that moment.
pub struct ModelLoader {
    state: AtomicU8,
    classifier: RwLock<Option<Arc<dyn Classifier>>>,
    locator: ArtifactLocator,
    backend: Arc<dyn ClassifierBackend>,
    retry_on_failure: bool,
}

impl ModelLoader {
    pub fn new(
        locator: ArtifactLocator,
        backend: Arc<dyn ClassifierBackend>,
        retry_on_failure: bool,
    ) -> Self {
        Self {
            state: AtomicU8::new(NOT_LOADED),
            classifier: RwLock::new(None),
            locator,
            backend,
            retry_on_failure,
        }
    }

    pub fn state(&self) -> ModelStatus {
        match self.state.load(Ordering::Acquire) {
            NOT_LOADED => ModelStatus::NotLoaded,
            LOADING => ModelStatus::Loading,
            LOADED => ModelStatus::Loaded,
            _ => ModelStatus::Unavailable,
        }
    }

    pub fn is_available(&self) -> bool {
        self.state.load(Ordering::Acquire) == LOADED
    }

    pub fn classifier(&self) -> Option<Arc<dyn Classifier>> {
        if !self.is_available() {
            return None;
        }
        match self.classifier.read() {
            Ok(guard) => guard.clone(),
            Err(poisoned) => poisoned.into_inner().clone(),
        }
    }

    /// Returns whether the classifier is available, attempting a load if no
    /// attempt has claimed the state yet. Blocks for the duration of the load
    /// when this call wins the claim.
    pub fn ensure_loaded(&self) -> bool {
        let current = self.state.load(Ordering::Acquire);
        let claimable = match current {
            LOADED => return true,
            LOADING => return false,
            NOT_LOADED => true,
            _ => self.retry_on_failure,
        };
        if !claimable {
            return false;
        }

        if self
            .state
            .compare_exchange(current, LOADING, Ordering::AcqRel, Ordering::Acquire)
            .is_err()
        {
            return self.is_available();
        }

        let outcome = panic::catch_unwind(AssertUnwindSafe(|| self.load()))
            .unwrap_or_else(|payload| Err(LoadError::Panicked(panic_message(payload.as_ref()))));

        match outcome {
            Ok(classifier) => {
                match self.classifier.write() {
                    Ok(mut guard) => *guard = Some(classifier),
                    Err(poisoned) => *poisoned.into_inner() = Some(classifier),
                }
                self.state.store(LOADED, Ordering::Release);
                log::info!("Model successfully loaded ({} backend)", self.backend.name());
                true
            }
            Err(e) => {
                self.state.store(UNAVAILABLE, Ordering::Release);
                if self.retry_on_failure {
                    log::warn!("Model unavailable, will retry on next request: {}", e);
                } else {
                    log::warn!("Model unavailable, serving fallback scores: {}", e);
                }
                false
            }
        }
    }

    fn load(&self) -> Result<Arc<dyn Classifier>, LoadError> {
        let artifact = self.locator.locate()?;
        let classifier = self.backend.load(&artifact)?;
        Ok(classifier)
    }

    /// Starts a load attempt on a background thread.
    pub fn spawn_background_load(self: &Arc<Self>) -> std::io::Result<JoinHandle<bool>> {
        let loader = Arc::clone(self);
        std::thread::Builder::new()
            .name("model-loader".to_string())
            .spawn(move || {
                log::info!("Loading model in background...");
                loader.ensure_loaded()
            })
    }
}

fn panic_message(payload: &(dyn std::any::Any + Send)) -> String {
    if let Some(message) = payload.downcast_ref::<&str>() {
        message.to_string()
    } else if let Some(message) = payload.downcast_ref::<String>() {
        message.clone()
    } else {
        "unknown panic".to_string()
    }
}
