use std::path::Path;
use std::sync::Arc;

use actix_web::web;
use shared::{MediaKind, Verdict};

use crate::classifier::ClassifierError;
use crate::classifier::fallback::{FallbackScorer, round_to_tenth};
use crate::loader::ModelLoader;

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Analysis {
    pub percentage: f64,
    pub model_used: bool,
}

impl Analysis {
    pub fn verdict(&self) -> Verdict {
        Verdict::from_percentage(self.percentage)
    }
}

enum Outcome {
    Unavailable,
    Scored(Result<f64, ClassifierError>),
}

/// Scores stored uploads with the classifier when it is available and with
/// the fallback scorer otherwise.
pub struct Analyzer {
    loader: Arc<ModelLoader>,
    fallback: Arc<dyn FallbackScorer>,
    video_samples: usize,
}

impl Analyzer {
    pub fn new(
        loader: Arc<ModelLoader>,
        fallback: Arc<dyn FallbackScorer>,
        video_samples: usize,
    ) -> Self {
        Self {
            loader,
            fallback,
            video_samples,
        }
    }

    pub fn loader(&self) -> &Arc<ModelLoader> {
        &self.loader
    }

    pub async fn analyze(&self, kind: MediaKind, path: &Path) -> Analysis {
        let loader = self.loader.clone();
        let samples = self.video_samples;
        let path = path.to_path_buf();

        let outcome = web::block(move || {
            if !loader.ensure_loaded() {
                return Outcome::Unavailable;
            }
            let Some(classifier) = loader.classifier() else {
                return Outcome::Unavailable;
            };
            log::info!("Running {} classifier on {}", kind, path.display());
            Outcome::Scored(match kind {
                MediaKind::Image => classifier.classify_image(&path),
                MediaKind::Video => classifier.classify_video(&path, samples),
            })
        })
        .await;

        match outcome {
            Ok(Outcome::Scored(Ok(score))) if score.is_finite() && (0.0..=100.0).contains(&score) => {
                Analysis {
                    percentage: round_to_tenth(score),
                    model_used: true,
                }
            }
            Ok(Outcome::Scored(Ok(score))) => {
                log::warn!("Classifier returned unusable score {}, using fallback", score);
                self.fallback()
            }
            Ok(Outcome::Scored(Err(e))) => {
                log::warn!("Classifier failed, using fallback: {}", e);
                self.fallback()
            }
            Ok(Outcome::Unavailable) => {
                log::info!("Model not available ({}), using fallback", self.loader.state());
                self.fallback()
            }
            Err(e) => {
                log::error!("Classification task aborted, using fallback: {}", e);
                self.fallback()
            }
        }
    }

    fn fallback(&self) -> Analysis {
        let score = self.fallback.score().clamp(0.0, 100.0);
        log::debug!("{} fallback scored {}", self.fallback.name(), score);
        Analysis {
            percentage: score,
            model_used: false,
        }
    }
}
