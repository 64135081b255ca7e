// src/main.rs
mod config;
mod data;
mod geometry;
mod landmarks;
mod overlay;
mod pose_backend;
mod tracking;
mod video;

use std::time::Instant;

use anyhow::{Context, Result};
use tracing::{debug, info, warn};

use crate::config::{Config, SourceKind};
use crate::data::MetricsExporter;
use crate::tracking::StanceTracker;
use crate::video::VideoSource;

fn main() -> Result<()> {
    // Initialize logging
    tracing_subscriber::fmt::init();

    let config_path = std::env::args()
        .nth(1)
        .unwrap_or_else(|| "config.toml".to_string());
    let config = Config::load_or_default(&config_path);

    let mut source = open_source(&config)?;
    let backend = pose_backend::open_backend(&config.model);
    let mut tracker = StanceTracker::new(backend, config.tracker.clone());
    let mut exporter = MetricsExporter::new(&config.output.directory, None);

    let overlay_dir = exporter.session_dir().join("overlay");
    if config.output.save_overlay_frames {
        std::fs::create_dir_all(&overlay_dir)?;
    }

    let started = Instant::now();
    let mut frame_index: u64 = 0;

    loop {
        if let Some(max) = config.video.max_frames {
            if frame_index >= max {
                break;
            }
        }

        let frame = match source.read_frame()? {
            Some(frame) => frame,
            None => break,
        };

        let (update, perf) = tracker.process_frame_with_metrics(&frame)?;
        let timestamp = started.elapsed().as_secs_f64();

        if let Some(metrics) = &update.metrics {
            info!(
                "frame {}: left_knee={:.1} right_knee={:.1} stance={:.3} hands_up={} balanced={}",
                frame_index,
                metrics.left_knee_angle,
                metrics.right_knee_angle,
                metrics.stance_width,
                metrics.hands_up,
                metrics.balanced,
            );
        }
        exporter.add_frame(frame_index as u32, timestamp, update.metrics.as_ref());

        if config.output.save_overlay_frames {
            if let Some(detection) = &update.detection {
                let mut rgba = frame.to_rgba8();
                overlay::draw_skeleton(
                    &mut rgba,
                    &detection.landmarks,
                    config.tracker.visibility_threshold,
                );
                rgba.save(overlay_dir.join(format!("frame_{:05}.png", frame_index)))?;
            }
        }

        if frame_index % 30 == 0 {
            debug!(
                avg_fps = perf.avg_fps,
                avg_processing_time = perf.avg_processing_time,
                detection_confidence = perf.detection_confidence,
                "performance"
            );
        }

        frame_index += 1;
    }

    info!("session finished after {} frames", frame_index);

    if config.output.auto_save {
        let csv_path = exporter.export_csv()?;
        info!("metrics written to {}", csv_path.display());
        let report_path = exporter.generate_report()?;
        info!("report written to {}", report_path.display());
        let summary_path = exporter.write_summary_json()?;
        info!("summary written to {}", summary_path.display());
    }

    Ok(())
}

fn open_source(config: &Config) -> Result<VideoSource> {
    match config.video.source {
        SourceKind::Camera => {
            list_cameras();
            VideoSource::new_camera(
                config.video.camera_id,
                config.video.width,
                config.video.height,
                config.video.fps,
            )
        }
        SourceKind::Images => {
            let dir = config
                .video
                .image_dir
                .as_ref()
                .context("video.image_dir must be set when video.source = \"images\"")?;
            VideoSource::new_image_dir(dir)
        }
    }
}

fn list_cameras() {
    match nokhwa::query(nokhwa::utils::ApiBackend::Auto) {
        Ok(cameras) => {
            info!("found {} camera(s)", cameras.len());
            for (i, camera) in cameras.iter().enumerate() {
                debug!("  [{}] {}", i, camera.human_name());
            }
        }
        Err(e) => {
            warn!("failed to query cameras: {e}");
        }
    }
}
