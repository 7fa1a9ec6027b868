use std::fs::{self, OpenOptions};
use std::io::{ErrorKind, Write};
use std::path::{Path, PathBuf};

use unicode_normalization::UnicodeNormalization;

#[derive(Debug, thiserror::Error)]
pub enum StoreError {
    #[error("Failed to save file: {0}")]
    Save(#[source] std::io::Error),
    #[error("File was not saved successfully")]
    NotVerified,
    #[error("File too large")]
    FileTooLarge,
    #[error("Invalid filename")]
    InvalidFilename,
}

/// Working directory for uploads awaiting classification.
#[derive(Clone, Debug)]
pub struct UploadStore {
    dir: PathBuf,
    max_bytes: usize,
}

impl UploadStore {
    pub fn new(dir: impl Into<PathBuf>, max_bytes: usize) -> std::io::Result<Self> {
        let dir = dir.into();
        fs::create_dir_all(&dir)?;
        let readonly = fs::metadata(&dir)?.permissions().readonly();
        log::info!(
            "Upload directory ready: {} (writable: {})",
            fs::canonicalize(&dir).unwrap_or_else(|_| dir.clone()).display(),
            !readonly
        );
        Ok(Self { dir, max_bytes })
    }

    pub fn dir(&self) -> &Path {
        &self.dir
    }

    pub fn max_bytes(&self) -> usize {
        self.max_bytes
    }

    pub fn validate_size(&self, size: usize) -> Result<(), StoreError> {
        if size > self.max_bytes {
            return Err(StoreError::FileTooLarge);
        }
        Ok(())
    }

    /// Writes `data` under the sanitised `file_name`, suffixing `_1`, `_2`, …
    /// when the name is taken, and checks the result on disk.
    pub fn persist(&self, file_name: &str, data: &[u8]) -> Result<StoredUpload, StoreError> {
        self.validate_size(data.len())?;
        let sanitized = sanitize_filename(file_name);
        if sanitized.is_empty() {
            return Err(StoreError::InvalidFilename);
        }
        let (stem, extension) = split_extension(&sanitized);

        let mut counter = 0usize;
        let (path, mut file) = loop {
            let candidate = if counter == 0 {
                sanitized.clone()
            } else {
                format!("{}_{}{}", stem, counter, extension)
            };
            let path = self.dir.join(&candidate);
            match OpenOptions::new().write(true).create_new(true).open(&path) {
                Ok(file) => break (path, file),
                Err(e) if e.kind() == ErrorKind::AlreadyExists => {
                    if counter == 0 {
                        log::warn!("File already exists: {}", path.display());
                    }
                    counter += 1;
                }
                Err(e) => return Err(StoreError::Save(e)),
            }
        };

        let mut stored = StoredUpload::new(path);
        if let Err(e) = file.write_all(data).and_then(|_| file.sync_all()) {
            log::error!("Error saving file {}: {}", stored.path.display(), e);
            return Err(StoreError::Save(e));
        }
        drop(file);

        match fs::metadata(&stored.path) {
            Ok(meta) if meta.len() == data.len() as u64 => {
                stored.size = meta.len();
                log::info!(
                    "Saved {} ({} bytes)",
                    stored.path.display(),
                    stored.size
                );
                Ok(stored)
            }
            Ok(meta) => {
                log::error!(
                    "Size mismatch for {}: expected {} bytes, found {}",
                    stored.path.display(),
                    data.len(),
                    meta.len()
                );
                Err(StoreError::NotVerified)
            }
            Err(e) => {
                log::error!("File was not actually saved to {}: {}", stored.path.display(), e);
                Err(StoreError::NotVerified)
            }
        }
    }
}

/// A file written by [`UploadStore::persist`]. Removed by [`StoredUpload::remove`]
/// or, failing that, when dropped.
#[derive(Debug)]
pub struct StoredUpload {
    path: PathBuf,
    size: u64,
    removed: bool,
}

impl StoredUpload {
    fn new(path: PathBuf) -> Self {
        Self {
            path,
            size: 0,
            removed: false,
        }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    pub fn file_name(&self) -> String {
        self.path
            .file_name()
            .map(|n| n.to_string_lossy().into_owned())
            .unwrap_or_default()
    }

    pub fn size(&self) -> u64 {
        self.size
    }

    pub fn remove(mut self) {
        self.delete();
    }

    fn delete(&mut self) {
        if self.removed {
            return;
        }
        self.removed = true;
        match fs::remove_file(&self.path) {
            Ok(()) => log::info!("Deleted {}", self.path.display()),
            Err(e) if e.kind() == ErrorKind::NotFound => {
                log::warn!("File not found for deletion: {}", self.path.display())
            }
            Err(e) => log::error!("Failed to delete file {}: {}", self.path.display(), e),
        }
    }
}

impl Drop for StoredUpload {
    fn drop(&mut self) {
        self.delete();
    }
}

/// Reduces a client-supplied name to a safe flat file name: NFKD-decomposed
/// and stripped to ASCII, `/` treated as whitespace, whitespace runs joined
/// with `_`, only `[A-Za-z0-9_.-]` kept, no leading or trailing `.`/`_`.
pub fn sanitize_filename(file_name: &str) -> String {
    let ascii: String = file_name
        .nfkd()
        .filter(char::is_ascii)
        .map(|c| if c == '/' { ' ' } else { c })
        .collect();
    let joined = ascii.split_whitespace().collect::<Vec<_>>().join("_");
    let kept: String = joined
        .chars()
        .filter(|c| c.is_ascii_alphanumeric() || matches!(c, '_' | '.' | '-'))
        .collect();
    kept.trim_matches(|c| c == '.' || c == '_').to_string()
}

/// Splits at the last `.` that is not the first character; the extension
/// keeps its dot.
fn split_extension(file_name: &str) -> (&str, &str) {
    match file_name.rfind('.') {
        Some(idx) if idx > 0 => file_name.split_at(idx),
        _ => (file_name, ""),
    }
}
