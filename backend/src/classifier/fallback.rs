use rand::Rng;

/// Produces a score when the classifier is unavailable or fails.
pub trait FallbackScorer: Send + Sync {
    fn name(&self) -> &'static str;

    fn score(&self) -> f64;
}

/// Uniform score in [0, 100), rounded to one decimal.
#[derive(Debug, Default, Clone, Copy)]
pub struct RandomFallback;

impl FallbackScorer for RandomFallback {
    fn name(&self) -> &'static str {
        "random"
    }

    fn score(&self) -> f64 {
        let raw: f64 = rand::rng().random_range(0.0..100.0);
        round_to_tenth(raw)
    }
}

/// Always returns the same score.
#[derive(Debug, Clone, Copy)]
pub struct FixedFallback(pub f64);

impl FallbackScorer for FixedFallback {
    fn name(&self) -> &'static str {
        "fixed"
    }

    fn score(&self) -> f64 {
        self.0
    }
}

pub fn round_to_tenth(value: f64) -> f64 {
    (value * 10.0).round() / 10.0
}
