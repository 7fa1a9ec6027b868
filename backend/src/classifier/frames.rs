//! Still-frame sampling for video classification.
//!
//! Frames are pulled with `ffprobe`/`ffmpeg` into a scratch directory that is
//! removed when the returned [`SampledFrames`] is dropped.

use std::path::{Path, PathBuf};
use std::process::{Command, Stdio};

use uuid::Uuid;

use super::ClassifierError;

#[derive(Debug, Clone)]
pub struct FrameSampler {
    scratch_root: PathBuf,
    ffmpeg_threads: usize,
}

impl Default for FrameSampler {
    fn default() -> Self {
        Self::new(std::env::temp_dir())
    }
}

impl FrameSampler {
    pub fn new(scratch_root: impl Into<PathBuf>) -> Self {
        Self {
            scratch_root: scratch_root.into(),
            ffmpeg_threads: 1,
        }
    }

    /// Extracts `samples` frames spread evenly over the video.
    pub fn extract(&self, video: &Path, samples: usize) -> Result<SampledFrames, ClassifierError> {
        if samples == 0 {
            return Err(ClassifierError::FrameExtraction(
                "sample count must be at least 1".to_string(),
            ));
        }

        let duration = self.read_duration(video)?;
        let dir = self.scratch_root.join(format!("frames-{}", Uuid::new_v4()));
        std::fs::create_dir_all(&dir)?;
        let mut frames = SampledFrames {
            dir,
            paths: Vec::with_capacity(samples),
        };

        let threads = self.ffmpeg_threads.to_string();
        for (index, timestamp) in sample_timestamps(duration, samples).into_iter().enumerate() {
            let frame_path = frames.dir.join(format!("frame_{:04}.jpg", index));
            let output = Command::new("ffmpeg")
                .args(["-hide_banner", "-loglevel", "error", "-nostdin"])
                .args(["-threads", &threads])
                .args(["-ss", &format!("{:.3}", timestamp)])
                .arg("-i")
                .arg(video)
                .args(["-frames:v", "1", "-an", "-sn", "-q:v", "2", "-y"])
                .arg(&frame_path)
                .stdout(Stdio::null())
                .stderr(Stdio::piped())
                .output()?;

            if !output.status.success() {
                let stderr = String::from_utf8_lossy(&output.stderr);
                log::warn!(
                    "ffmpeg could not extract frame {} at {:.3}s: {}",
                    index,
                    timestamp,
                    stderr.trim()
                );
                continue;
            }
            if frame_path.exists() {
                frames.paths.push(frame_path);
            }
        }

        if frames.paths.is_empty() {
            return Err(ClassifierError::FrameExtraction(format!(
                "no frames could be extracted from {}",
                video.display()
            )));
        }
        Ok(frames)
    }

    fn read_duration(&self, video: &Path) -> Result<f64, ClassifierError> {
        let output = Command::new("ffprobe")
            .args(["-v", "error"])
            .args(["-show_entries", "format=duration"])
            .args(["-of", "default=noprint_wrappers=1:nokey=1"])
            .arg(video)
            .stdout(Stdio::piped())
            .stderr(Stdio::null())
            .output()?;

        parse_duration(&String::from_utf8_lossy(&output.stdout)).ok_or_else(|| {
            ClassifierError::FrameExtraction(format!(
                "could not read duration of {}",
                video.display()
            ))
        })
    }
}

pub struct SampledFrames {
    dir: PathBuf,
    paths: Vec<PathBuf>,
}

impl SampledFrames {
    pub fn paths(&self) -> &[PathBuf] {
        &self.paths
    }
}

impl Drop for SampledFrames {
    fn drop(&mut self) {
        if let Err(e) = std::fs::remove_dir_all(&self.dir) {
            log::warn!("Failed to remove frame directory {}: {}", self.dir.display(), e);
        }
    }
}

/// Midpoints of `samples` equal slices of the video.
pub fn sample_timestamps(duration_secs: f64, samples: usize) -> Vec<f64> {
    (0..samples)
        .map(|i| duration_secs * (i as f64 + 0.5) / samples as f64)
        .collect()
}

fn parse_duration(stdout: &str) -> Option<f64> {
    stdout
        .trim()
        .parse::<f64>()
        .ok()
        .filter(|d| d.is_finite() && *d > 0.0)
}
