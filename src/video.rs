// src/video.rs - Frame acquisition from a camera or an image-sequence directory
use std::path::{Path, PathBuf};

use anyhow::{Context, Result};
use image::DynamicImage;
use nokhwa::pixel_format::RgbFormat;
use nokhwa::utils::{
    CameraFormat, CameraIndex, FrameFormat, RequestedFormat, RequestedFormatType, Resolution,
};
use nokhwa::Camera;
use thiserror::Error;
use tracing::{debug, warn};

#[derive(Debug, Error)]
pub enum VideoError {
    #[error("failed to open camera {index}: {reason}")]
    CameraOpen { index: u32, reason: String },
    #[error("failed to capture frame: {0}")]
    Capture(String),
    #[error("no image files found in {}", .0.display())]
    EmptyImageDir(PathBuf),
}

pub enum VideoSource {
    Camera(Camera),
    ImageDir(ImageSequence),
}

impl VideoSource {
    pub fn new_camera(index: u32, width: u32, height: u32, fps: u32) -> Result<Self> {
        let format = CameraFormat::new(Resolution::new(width, height), FrameFormat::MJPEG, fps);
        let requested = RequestedFormat::new::<RgbFormat>(RequestedFormatType::Exact(format));

        let camera = Camera::new(CameraIndex::Index(index), requested).map_err(|e| {
            VideoError::CameraOpen {
                index,
                reason: e.to_string(),
            }
        })?;
        debug!(index, width, height, fps, "camera opened");

        Ok(VideoSource::Camera(camera))
    }

    pub fn new_image_dir(dir: impl AsRef<Path>) -> Result<Self> {
        Ok(VideoSource::ImageDir(ImageSequence::new(dir)?))
    }

    /// Next frame, or `None` when the source is exhausted. The camera
    /// never exhausts; an image sequence ends after its last file.
    pub fn read_frame(&mut self) -> Result<Option<DynamicImage>> {
        match self {
            VideoSource::Camera(camera) => {
                if !camera.is_stream_open() {
                    camera
                        .open_stream()
                        .map_err(|e| VideoError::Capture(e.to_string()))?;
                }

                let frame = camera
                    .frame()
                    .map_err(|e| VideoError::Capture(e.to_string()))?;
                let decoded = frame
                    .decode_image::<RgbFormat>()
                    .map_err(|e| VideoError::Capture(e.to_string()))?;

                // Mirror view, like facing a real mirror.
                let flipped = image::imageops::flip_horizontal(&decoded);
                Ok(Some(DynamicImage::ImageRgb8(flipped)))
            }
            VideoSource::ImageDir(sequence) => sequence.next_frame(),
        }
    }
}

impl Drop for VideoSource {
    fn drop(&mut self) {
        if let VideoSource::Camera(camera) = self {
            let _ = camera.stop_stream();
        }
    }
}

/// Sorted image files replayed as frames, for offline runs.
pub struct ImageSequence {
    files: Vec<PathBuf>,
    next: usize,
}

impl ImageSequence {
    pub fn new(dir: impl AsRef<Path>) -> Result<Self> {
        let dir = dir.as_ref();
        let mut files: Vec<PathBuf> = std::fs::read_dir(dir)
            .with_context(|| format!("failed to read image directory {}", dir.display()))?
            .filter_map(|entry| entry.ok().map(|e| e.path()))
            .filter(|path| is_image_file(path))
            .collect();
        files.sort();

        if files.is_empty() {
            return Err(VideoError::EmptyImageDir(dir.to_path_buf()).into());
        }
        debug!(count = files.len(), dir = %dir.display(), "image sequence loaded");

        Ok(Self { files, next: 0 })
    }

    fn next_frame(&mut self) -> Result<Option<DynamicImage>> {
        while let Some(path) = self.files.get(self.next) {
            self.next += 1;
            match image::open(path) {
                Ok(frame) => return Ok(Some(frame)),
                Err(e) => {
                    warn!("skipping unreadable frame {}: {e}", path.display());
                }
            }
        }
        Ok(None)
    }
}

fn is_image_file(path: &Path) -> bool {
    path.extension()
        .and_then(|ext| ext.to_str())
        .map(|ext| {
            let ext = ext.to_ascii_lowercase();
            ext == "png" || ext == "jpg" || ext == "jpeg"
        })
        .unwrap_or(false)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_is_image_file() {
        assert!(is_image_file(Path::new("frames/frame_0001.png")));
        assert!(is_image_file(Path::new("frames/FRAME_0002.JPG")));
        assert!(is_image_file(Path::new("a.jpeg")));
        assert!(!is_image_file(Path::new("notes.txt")));
        assert!(!is_image_file(Path::new("frames/no_extension")));
    }

    #[test]
    fn test_missing_image_dir_errors() {
        assert!(ImageSequence::new("/nonexistent/frames").is_err());
    }
}
