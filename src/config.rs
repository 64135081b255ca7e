// src/config.rs - TOML-backed settings with sensible defaults
use std::fs;
use std::path::{Path, PathBuf};

use anyhow::Result;
use directories::UserDirs;
use serde::{Deserialize, Serialize};
use tracing::debug;

use crate::tracking::TrackerConfig;

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct Config {
    pub video: VideoConfig,
    pub model: ModelConfig,
    pub tracker: TrackerConfig,
    pub output: OutputConfig,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum SourceKind {
    #[default]
    Camera,
    Images,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct VideoConfig {
    pub source: SourceKind,
    pub camera_id: u32,
    pub width: u32,
    pub height: u32,
    pub fps: u32,
    /// Frame directory when `source = "images"`.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub image_dir: Option<PathBuf>,
    /// Stop after this many frames; unset means run until the source ends.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub max_frames: Option<u64>,
}

impl Default for VideoConfig {
    fn default() -> Self {
        Self {
            source: SourceKind::Camera,
            camera_id: 0,
            width: 640,
            height: 480,
            fps: 30,
            image_dir: None,
            max_frames: None,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ModelConfig {
    pub path: PathBuf,
    /// Side length of the model's square input tensor.
    pub input_size: u32,
    pub min_detection_confidence: f64,
}

impl Default for ModelConfig {
    fn default() -> Self {
        Self {
            path: PathBuf::from("models/pose_landmark_full.onnx"),
            input_size: 256,
            min_detection_confidence: 0.5,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct OutputConfig {
    pub directory: PathBuf,
    pub auto_save: bool,
    pub save_overlay_frames: bool,
}

impl Default for OutputConfig {
    fn default() -> Self {
        Self {
            directory: UserDirs::new()
                .and_then(|dirs| dirs.document_dir().map(|p| p.join("StanceTracker")))
                .unwrap_or_else(|| PathBuf::from("./output")),
            auto_save: true,
            save_overlay_frames: false,
        }
    }
}

impl Config {
    pub fn load(path: impl AsRef<Path>) -> Result<Self> {
        let content = fs::read_to_string(path)?;
        Ok(toml::from_str(&content)?)
    }

    pub fn load_or_default(path: impl AsRef<Path>) -> Self {
        match Self::load(&path) {
            Ok(config) => config,
            Err(_) => {
                debug!(
                    "no config at {}, using defaults",
                    path.as_ref().display()
                );
                Self::default()
            }
        }
    }

}
