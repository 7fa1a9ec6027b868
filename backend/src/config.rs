use serde::{Deserialize, Serialize};
use std::path::PathBuf;

pub const DEFAULT_PORT: u16 = 5000;
pub const DEFAULT_MAX_UPLOAD_BYTES: usize = 50 * 1024 * 1024;
pub const DEFAULT_VIDEO_SAMPLES: usize = 3;
pub const HOSTED_UPLOAD_DIR: &str = "/tmp/uploads";
pub const LOCAL_UPLOAD_DIR: &str = "uploads";

#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("Failed to read config file {path}: {source}")]
    Io {
        path: String,
        source: std::io::Error,
    },
    #[error("Failed to parse config file: {0}")]
    Yaml(#[from] serde_yaml::Error),
    #[error("Invalid value for {key}: {value}")]
    InvalidValue { key: &'static str, value: String },
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(rename_all = "lowercase")]
pub enum LoadPolicy {
    /// Load on a background thread as soon as the server starts.
    #[default]
    Eager,
    /// Load on the first request that needs the classifier.
    Lazy,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct ServiceConfig {
    pub server: ServerConfig,
    pub uploads: UploadConfig,
    pub model: ModelConfig,
    pub cors: CorsConfig,
    /// Set when the process runs on the hosting platform; selects the
    /// temporary upload directory.
    #[serde(skip)]
    pub hosted: bool,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ServerConfig {
    pub host: String,
    pub port: u16,
    pub workers: Option<usize>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct UploadConfig {
    pub dir: Option<PathBuf>,
    pub max_bytes: usize,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ModelConfig {
    pub secret_files_dir: Option<PathBuf>,
    pub local_dir: PathBuf,
    pub file_name: String,
    pub load_policy: LoadPolicy,
    pub retry_on_failure: bool,
    pub video_samples: usize,
    pub image_size: u32,
    pub human_class_index: usize,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct CorsConfig {
    pub allowed_origins: Vec<String>,
    pub max_age: usize,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            host: "0.0.0.0".to_string(),
            port: DEFAULT_PORT,
            workers: None,
        }
    }
}

impl Default for UploadConfig {
    fn default() -> Self {
        Self {
            dir: None,
            max_bytes: DEFAULT_MAX_UPLOAD_BYTES,
        }
    }
}

impl Default for ModelConfig {
    fn default() -> Self {
        Self {
            secret_files_dir: None,
            local_dir: PathBuf::from("models"),
            file_name: "image_classifier.pt".to_string(),
            load_policy: LoadPolicy::default(),
            retry_on_failure: false,
            video_samples: DEFAULT_VIDEO_SAMPLES,
            image_size: 224,
            human_class_index: 1,
        }
    }
}

impl Default for CorsConfig {
    fn default() -> Self {
        Self {
            allowed_origins: vec![
                "https://chatisthisreal-zeta.vercel.app".to_string(),
                "http://localhost:5173".to_string(),
                "http://localhost:3000".to_string(),
            ],
            max_age: 3600,
        }
    }
}

impl ServiceConfig {
    /// Defaults, then the YAML file named by `APP_CONFIG`, then environment
    /// overrides.
    pub fn load() -> Result<Self, ConfigError> {
        let mut config = match std::env::var("APP_CONFIG") {
            Ok(path) => Self::from_yaml_file(&path)?,
            Err(_) => Self::default(),
        };
        config.apply_env(|key| std::env::var(key).ok())?;
        config.validate()?;
        Ok(config)
    }

    pub fn from_yaml_file(path: &str) -> Result<Self, ConfigError> {
        let config_str = std::fs::read_to_string(path).map_err(|source| ConfigError::Io {
            path: path.to_string(),
            source,
        })?;
        Self::from_yaml_str(&config_str)
    }

    pub fn from_yaml_str(config_str: &str) -> Result<Self, ConfigError> {
        let config: ServiceConfig = serde_yaml::from_str(config_str)?;
        Ok(config)
    }

    pub fn apply_env<F>(&mut self, lookup: F) -> Result<(), ConfigError>
    where
        F: Fn(&str) -> Option<String>,
    {
        if let Some(host) = lookup("HOST") {
            self.server.host = host;
        }
        if let Some(port) = lookup("PORT") {
            self.server.port = parse_value("PORT", &port)?;
        }
        if let Some(workers) = lookup("WORKERS") {
            self.server.workers = Some(parse_value("WORKERS", &workers)?);
        }

        self.hosted = lookup("RENDER").is_some();
        if let Some(dir) = lookup("UPLOAD_DIR") {
            self.uploads.dir = Some(PathBuf::from(dir));
        }
        if let Some(max_bytes) = lookup("MAX_UPLOAD_BYTES") {
            self.uploads.max_bytes = parse_value("MAX_UPLOAD_BYTES", &max_bytes)?;
        }

        if let Some(dir) = lookup("RENDER_SECRET_FILES_DIR").filter(|d| !d.is_empty()) {
            self.model.secret_files_dir = Some(PathBuf::from(dir));
        }
        if let Some(dir) = lookup("MODEL_DIR") {
            self.model.local_dir = PathBuf::from(dir);
        }
        if let Some(file_name) = lookup("MODEL_FILE_NAME") {
            self.model.file_name = file_name;
        }
        if let Some(policy) = lookup("MODEL_LOAD_POLICY") {
            self.model.load_policy = match policy.trim().to_ascii_lowercase().as_str() {
                "eager" => LoadPolicy::Eager,
                "lazy" => LoadPolicy::Lazy,
                _ => {
                    return Err(ConfigError::InvalidValue {
                        key: "MODEL_LOAD_POLICY",
                        value: policy,
                    });
                }
            };
        }
        if let Some(retry) = lookup("MODEL_RETRY_ON_FAILURE") {
            self.model.retry_on_failure = parse_bool("MODEL_RETRY_ON_FAILURE", &retry)?;
        }
        if let Some(samples) = lookup("VIDEO_SAMPLE_COUNT") {
            self.model.video_samples = parse_value("VIDEO_SAMPLE_COUNT", &samples)?;
        }

        if let Some(origins) = lookup("CORS_ALLOWED_ORIGINS") {
            self.cors.allowed_origins = origins
                .split(',')
                .map(str::trim)
                .filter(|o| !o.is_empty())
                .map(str::to_string)
                .collect();
        }
        Ok(())
    }

    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.model.video_samples == 0 {
            return Err(ConfigError::InvalidValue {
                key: "model.video_samples",
                value: "0".to_string(),
            });
        }
        if self.model.file_name.trim().is_empty() {
            return Err(ConfigError::InvalidValue {
                key: "model.file_name",
                value: self.model.file_name.clone(),
            });
        }
        if self.model.human_class_index > 1 {
            return Err(ConfigError::InvalidValue {
                key: "model.human_class_index",
                value: self.model.human_class_index.to_string(),
            });
        }
        Ok(())
    }

    pub fn upload_dir(&self) -> PathBuf {
        match &self.uploads.dir {
            Some(dir) => dir.clone(),
            None if self.hosted => PathBuf::from(HOSTED_UPLOAD_DIR),
            None => PathBuf::from(LOCAL_UPLOAD_DIR),
        }
    }

    pub fn bind_address(&self) -> String {
        format!("{}:{}", self.server.host, self.server.port)
    }
}

fn parse_value<T: std::str::FromStr>(key: &'static str, value: &str) -> Result<T, ConfigError> {
    value.trim().parse().map_err(|_| ConfigError::InvalidValue {
        key,
        value: value.to_string(),
    })
}

fn parse_bool(key: &'static str, value: &str) -> Result<bool, ConfigError> {
    match value.trim().to_ascii_lowercase().as_str() {
        "1" | "true" | "yes" | "on" => Ok(true),
        "0" | "false" | "no" | "off" => Ok(false),
        _ => Err(ConfigError::InvalidValue {
            key,
            value: value.to_string(),
        }),
    }
}
