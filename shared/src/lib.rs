use serde::{Deserialize, Serialize};
use std::fmt;
use strum_macros::{AsRefStr, Display, EnumString};

pub const IMAGE_EXTENSIONS: [&str; 4] = ["png", "jpg", "jpeg", "gif"];
pub const VIDEO_EXTENSIONS: [&str; 4] = ["mp4", "avi", "mov", "wmv"];

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Display, AsRefStr)]
#[serde(rename_all = "lowercase")]
#[strum(serialize_all = "lowercase")]
pub enum MediaKind {
    Image,
    Video,
}

impl MediaKind {
    /// Classifies a file name by the text after its last `.`, case-insensitively.
    pub fn from_filename(file_name: &str) -> Option<Self> {
        let (_, extension) = file_name.rsplit_once('.')?;
        Self::from_extension(extension)
    }

    pub fn from_extension(extension: &str) -> Option<Self> {
        let extension = extension.to_ascii_lowercase();
        if IMAGE_EXTENSIONS.contains(&extension.as_str()) {
            Some(MediaKind::Image)
        } else if VIDEO_EXTENSIONS.contains(&extension.as_str()) {
            Some(MediaKind::Video)
        } else {
            None
        }
    }
}

#[derive(
    Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Display, EnumString, AsRefStr,
)]
#[serde(rename_all = "snake_case")]
#[strum(serialize_all = "snake_case")]
pub enum ModelStatus {
    NotLoaded,
    Loading,
    Loaded,
    Unavailable,
}

/// Human-readable reading of a "percent confidence human" score.
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum Verdict {
    Ai { confidence: f64 },
    Human { confidence: f64 },
}

impl Verdict {
    pub fn from_percentage(percentage: f64) -> Self {
        if percentage < 50.0 {
            Verdict::Ai {
                confidence: 100.0 - percentage,
            }
        } else {
            Verdict::Human {
                confidence: percentage,
            }
        }
    }
}

impl fmt::Display for Verdict {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Verdict::Ai { confidence } => write!(f, "{:.1}% sure this is AI", confidence),
            Verdict::Human { confidence } => write!(f, "{:.1}% sure this is human", confidence),
        }
    }
}

#[derive(Serialize, Deserialize, Clone, Debug)]
pub struct UploadResponse {
    pub message: String,
    pub filename: String,
    pub filepath: String,
    pub percentage: f64,
    pub analysis_result: String,
    pub model_used: bool,
    pub demo_mode: bool,
    pub request_duration: f64,
}

#[derive(Serialize, Deserialize, Clone, Debug)]
pub struct DemoUploadResponse {
    pub message: String,
    pub filename: String,
    pub size: usize,
    pub demo_mode: bool,
    pub percentage: f64,
    pub analysis_result: String,
}

#[derive(Serialize, Deserialize, Clone, Debug)]
pub struct HealthResponse {
    pub status: String,
    pub model_available: bool,
    pub model_state: ModelStatus,
}

#[derive(Serialize, Deserialize, Clone, Debug)]
pub struct TestResponse {
    pub message: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub timestamp: Option<String>,
}

#[derive(Serialize, Deserialize, Clone, Debug)]
pub struct StatusResponse {
    pub status: String,
}

#[derive(Serialize, Deserialize, Clone, Debug)]
pub struct ErrorResponse {
    pub error: String,
}
