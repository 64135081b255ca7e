// src/tracking.rs - Per-frame stance metric evaluation
use std::collections::VecDeque;
use std::time::Instant;

use anyhow::Result;
use image::DynamicImage;
use serde::{Deserialize, Serialize};
use tracing::{debug, warn};

use crate::geometry::{angle_at_vertex, distance};
use crate::landmarks::{LandmarkSet, PoseLandmark};
use crate::pose_backend::{Detection, PoseEstimator};

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct TrackerConfig {
    /// Max horizontal offset between hip center and foot center, in
    /// normalized units, for a frame to count as balanced.
    pub balance_threshold: f64,
    /// Moving-window size for metric smoothing; 0 disables smoothing.
    pub smoothing_window: usize,
    /// Landmarks below this visibility are not drawn on the overlay.
    pub visibility_threshold: f64,
}

impl Default for TrackerConfig {
    fn default() -> Self {
        Self {
            balance_threshold: 0.05,
            smoothing_window: 0,
            visibility_threshold: 0.5,
        }
    }
}

/// Posture signals derived from one frame. Recomputed every frame,
/// never carried across frames.
#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct FrameMetrics {
    /// Angle at the knee between thigh and shank, in degrees.
    pub left_knee_angle: f64,
    pub right_knee_angle: f64,
    /// Distance between the ankles, in normalized units.
    pub stance_width: f64,
    /// Both wrists above the nose.
    pub hands_up: bool,
    /// Hip center horizontally over the foot center.
    pub balanced: bool,
}

/// Derive the per-frame metrics from one landmark set.
///
/// A set too short to contain every landmark we read is treated the same
/// as no detection: the frame is skipped.
pub fn evaluate_frame(landmarks: &LandmarkSet, config: &TrackerConfig) -> Option<FrameMetrics> {
    if landmarks.len() <= PoseLandmark::RightAnkle as usize {
        debug!(
            count = landmarks.len(),
            "landmark set too short, treating frame as undetected"
        );
        return None;
    }

    let nose = landmarks.point(PoseLandmark::Nose)?;
    let left_wrist = landmarks.point(PoseLandmark::LeftWrist)?;
    let right_wrist = landmarks.point(PoseLandmark::RightWrist)?;
    let left_hip = landmarks.point(PoseLandmark::LeftHip)?;
    let right_hip = landmarks.point(PoseLandmark::RightHip)?;
    let left_knee = landmarks.point(PoseLandmark::LeftKnee)?;
    let right_knee = landmarks.point(PoseLandmark::RightKnee)?;
    let left_ankle = landmarks.point(PoseLandmark::LeftAnkle)?;
    let right_ankle = landmarks.point(PoseLandmark::RightAnkle)?;

    let left_knee_angle = angle_at_vertex(left_hip, left_knee, left_ankle);
    let right_knee_angle = angle_at_vertex(right_hip, right_knee, right_ankle);
    let stance_width = distance(left_ankle, right_ankle);

    // Normalized image coordinates grow downward, so above means smaller y.
    let hands_up = left_wrist.y < nose.y && right_wrist.y < nose.y;

    let center_x = (left_hip.x + right_hip.x) / 2.0;
    let foot_center_x = (left_ankle.x + right_ankle.x) / 2.0;
    let balanced = (center_x - foot_center_x).abs() < config.balance_threshold;

    Some(FrameMetrics {
        left_knee_angle,
        right_knee_angle,
        stance_width,
        hands_up,
        balanced,
    })
}

/// Bounded moving-window smoother over recent frame metrics.
///
/// Numeric fields are averaged over the window, flags resolved by majority.
/// Undetected frames do not feed the window.
pub struct MetricsSmoother {
    window: VecDeque<FrameMetrics>,
    capacity: usize,
}

impl MetricsSmoother {
    pub fn new(capacity: usize) -> Self {
        Self {
            window: VecDeque::with_capacity(capacity.max(1)),
            capacity: capacity.max(1),
        }
    }

    pub fn apply(&mut self, metrics: FrameMetrics) -> FrameMetrics {
        self.window.push_front(metrics);
        if self.window.len() > self.capacity {
            self.window.pop_back();
        }

        let len = self.window.len() as f64;
        let hands_up_votes = self.window.iter().filter(|m| m.hands_up).count();
        let balanced_votes = self.window.iter().filter(|m| m.balanced).count();

        FrameMetrics {
            left_knee_angle: self.window.iter().map(|m| m.left_knee_angle).sum::<f64>() / len,
            right_knee_angle: self.window.iter().map(|m| m.right_knee_angle).sum::<f64>() / len,
            stance_width: self.window.iter().map(|m| m.stance_width).sum::<f64>() / len,
            hands_up: hands_up_votes * 2 > self.window.len(),
            balanced: balanced_votes * 2 > self.window.len(),
        }
    }

    pub fn reset(&mut self) {
        self.window.clear();
    }
}

const PERF_WINDOW: usize = 30;

#[derive(Clone)]
pub struct PerformanceMetrics {
    pub avg_fps: f32,
    pub avg_processing_time: f32,
    pub detection_confidence: f32,
    frame_times: VecDeque<f32>,
    confidences: VecDeque<f32>,
}

impl PerformanceMetrics {
    pub fn new() -> Self {
        Self {
            avg_fps: 0.0,
            avg_processing_time: 0.0,
            detection_confidence: 0.0,
            frame_times: VecDeque::with_capacity(PERF_WINDOW),
            confidences: VecDeque::with_capacity(PERF_WINDOW),
        }
    }

    fn record(&mut self, elapsed: f32, confidence: f32) {
        self.frame_times.push_front(elapsed);
        if self.frame_times.len() > PERF_WINDOW {
            self.frame_times.pop_back();
        }
        self.confidences.push_front(confidence);
        if self.confidences.len() > PERF_WINDOW {
            self.confidences.pop_back();
        }

        self.avg_processing_time =
            self.frame_times.iter().sum::<f32>() / self.frame_times.len() as f32;
        self.avg_fps = if self.avg_processing_time > f32::EPSILON {
            1.0 / self.avg_processing_time
        } else {
            0.0
        };
        self.detection_confidence =
            self.confidences.iter().sum::<f32>() / self.confidences.len() as f32;
    }
}

impl Default for PerformanceMetrics {
    fn default() -> Self {
        Self::new()
    }
}

/// What one processed frame produced: the raw detection for the overlay,
/// and the derived metrics when a complete body was found.
pub struct FrameUpdate {
    pub detection: Option<Detection>,
    pub metrics: Option<FrameMetrics>,
}

/// Drives the pose backend and the evaluator, one frame at a time.
pub struct StanceTracker {
    backend: Box<dyn PoseEstimator>,
    config: TrackerConfig,
    smoother: Option<MetricsSmoother>,
    metrics: PerformanceMetrics,
}

impl StanceTracker {
    pub fn new(backend: Box<dyn PoseEstimator>, config: TrackerConfig) -> Self {
        let smoother = if config.smoothing_window > 0 {
            Some(MetricsSmoother::new(config.smoothing_window))
        } else {
            None
        };

        Self {
            backend,
            config,
            smoother,
            metrics: PerformanceMetrics::new(),
        }
    }

    pub fn process_frame(&mut self, frame: &DynamicImage) -> Result<FrameUpdate> {
        // A backend failure loses the frame, not the session.
        let detection = match self.backend.estimate(frame) {
            Ok(detection) => detection,
            Err(e) => {
                warn!("pose backend error: {e:#}");
                None
            }
        };

        let metrics = detection
            .as_ref()
            .and_then(|d| evaluate_frame(&d.landmarks, &self.config))
            .map(|m| match &mut self.smoother {
                Some(smoother) => smoother.apply(m),
                None => m,
            });

        Ok(FrameUpdate { detection, metrics })
    }

    pub fn process_frame_with_metrics(
        &mut self,
        frame: &DynamicImage,
    ) -> Result<(FrameUpdate, PerformanceMetrics)> {
        let start = Instant::now();
        let update = self.process_frame(frame)?;
        let elapsed = start.elapsed().as_secs_f32();

        let confidence = update
            .detection
            .as_ref()
            .map(|d| d.confidence as f32)
            .unwrap_or(0.0);
        self.metrics.record(elapsed, confidence);

        Ok((update, self.metrics.clone()))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::landmarks::Landmark;
    use crate::pose_backend::SyntheticPoseEstimator;

    fn full_set() -> Vec<Landmark> {
        vec![Landmark::new(0.5, 0.5, 0.9); PoseLandmark::COUNT]
    }

    fn place(landmarks: &mut [Landmark], index: PoseLandmark, x: f64, y: f64) {
        landmarks[index as usize] = Landmark::new(x, y, 0.9);
    }

    fn standing_fixture() -> LandmarkSet {
        let mut lm = full_set();
        place(&mut lm, PoseLandmark::Nose, 0.5, 0.5);
        place(&mut lm, PoseLandmark::LeftWrist, 0.35, 0.1);
        place(&mut lm, PoseLandmark::RightWrist, 0.65, 0.1);
        place(&mut lm, PoseLandmark::LeftHip, 0.4, 0.6);
        place(&mut lm, PoseLandmark::RightHip, 0.6, 0.6);
        place(&mut lm, PoseLandmark::LeftKnee, 0.41, 0.75);
        place(&mut lm, PoseLandmark::RightKnee, 0.59, 0.75);
        place(&mut lm, PoseLandmark::LeftAnkle, 0.42, 0.9);
        place(&mut lm, PoseLandmark::RightAnkle, 0.58, 0.9);
        LandmarkSet::new(lm)
    }

    #[test]
    fn test_stance_width() {
        let mut lm = full_set();
        place(&mut lm, PoseLandmark::LeftAnkle, 0.4, 0.9);
        place(&mut lm, PoseLandmark::RightAnkle, 0.6, 0.9);
        let metrics = evaluate_frame(&LandmarkSet::new(lm), &TrackerConfig::default()).unwrap();
        assert!((metrics.stance_width - 0.2).abs() < 1e-9);
    }

    #[test]
    fn test_straight_leg_reads_180() {
        let mut lm = full_set();
        place(&mut lm, PoseLandmark::LeftHip, 0.45, 0.6);
        place(&mut lm, PoseLandmark::LeftKnee, 0.45, 0.75);
        place(&mut lm, PoseLandmark::LeftAnkle, 0.45, 0.9);
        let metrics = evaluate_frame(&LandmarkSet::new(lm), &TrackerConfig::default()).unwrap();
        assert!((metrics.left_knee_angle - 180.0).abs() < 1e-9);
    }

    #[test]
    fn test_hands_up_both_wrists_above_nose() {
        let metrics =
            evaluate_frame(&standing_fixture(), &TrackerConfig::default()).unwrap();
        assert!(metrics.hands_up);

        let mut lm = full_set();
        place(&mut lm, PoseLandmark::Nose, 0.5, 0.5);
        place(&mut lm, PoseLandmark::LeftWrist, 0.35, 0.1);
        place(&mut lm, PoseLandmark::RightWrist, 0.65, 0.6);
        let metrics = evaluate_frame(&LandmarkSet::new(lm), &TrackerConfig::default()).unwrap();
        assert!(!metrics.hands_up);
    }

    #[test]
    fn test_balance_threshold() {
        // Hip center 0.5 over foot center 0.5.
        let mut lm = full_set();
        place(&mut lm, PoseLandmark::LeftHip, 0.4, 0.6);
        place(&mut lm, PoseLandmark::RightHip, 0.6, 0.6);
        place(&mut lm, PoseLandmark::LeftAnkle, 0.42, 0.9);
        place(&mut lm, PoseLandmark::RightAnkle, 0.58, 0.9);
        let metrics = evaluate_frame(&LandmarkSet::new(lm), &TrackerConfig::default()).unwrap();
        assert!(metrics.balanced);

        // Feet shifted so the foot center sits 0.08 off the hip center.
        let mut lm = full_set();
        place(&mut lm, PoseLandmark::LeftHip, 0.4, 0.6);
        place(&mut lm, PoseLandmark::RightHip, 0.6, 0.6);
        place(&mut lm, PoseLandmark::LeftAnkle, 0.5, 0.9);
        place(&mut lm, PoseLandmark::RightAnkle, 0.66, 0.9);
        let metrics = evaluate_frame(&LandmarkSet::new(lm), &TrackerConfig::default()).unwrap();
        assert!(!metrics.balanced);
    }

    #[test]
    fn test_short_set_skipped() {
        let lm = vec![Landmark::new(0.5, 0.5, 0.9); 20];
        assert!(evaluate_frame(&LandmarkSet::new(lm), &TrackerConfig::default()).is_none());
    }

    #[test]
    fn test_smoother_single_frame_passthrough() {
        let mut smoother = MetricsSmoother::new(1);
        let metrics = evaluate_frame(&standing_fixture(), &TrackerConfig::default()).unwrap();
        assert_eq!(smoother.apply(metrics), metrics);
    }

    #[test]
    fn test_smoother_averages_numeric_fields() {
        let mut smoother = MetricsSmoother::new(3);
        let base = evaluate_frame(&standing_fixture(), &TrackerConfig::default()).unwrap();

        smoother.apply(FrameMetrics {
            stance_width: 0.1,
            ..base
        });
        smoother.apply(FrameMetrics {
            stance_width: 0.2,
            ..base
        });
        let smoothed = smoother.apply(FrameMetrics {
            stance_width: 0.3,
            ..base
        });
        assert!((smoothed.stance_width - 0.2).abs() < 1e-9);
    }

    #[test]
    fn test_smoother_majority_flags() {
        let mut smoother = MetricsSmoother::new(3);
        let base = evaluate_frame(&standing_fixture(), &TrackerConfig::default()).unwrap();

        smoother.apply(FrameMetrics {
            hands_up: true,
            ..base
        });
        smoother.apply(FrameMetrics {
            hands_up: false,
            ..base
        });
        let smoothed = smoother.apply(FrameMetrics {
            hands_up: true,
            ..base
        });
        assert!(smoothed.hands_up);
    }

    #[test]
    fn test_smoother_reset() {
        let mut smoother = MetricsSmoother::new(3);
        let base = evaluate_frame(&standing_fixture(), &TrackerConfig::default()).unwrap();
        smoother.apply(FrameMetrics {
            stance_width: 0.9,
            ..base
        });
        smoother.reset();
        let smoothed = smoother.apply(FrameMetrics {
            stance_width: 0.1,
            ..base
        });
        assert!((smoothed.stance_width - 0.1).abs() < 1e-9);
    }

    struct NoDetection;

    impl PoseEstimator for NoDetection {
        fn estimate(&mut self, _frame: &DynamicImage) -> Result<Option<Detection>> {
            Ok(None)
        }
    }

    #[test]
    fn test_no_detection_emits_no_metrics() {
        let mut tracker = StanceTracker::new(Box::new(NoDetection), TrackerConfig::default());
        let frame = DynamicImage::new_rgb8(64, 64);

        for _ in 0..5 {
            let update = tracker.process_frame(&frame).unwrap();
            assert!(update.detection.is_none());
            assert!(update.metrics.is_none());
        }
    }

    #[test]
    fn test_tracker_with_synthetic_backend() {
        let mut tracker = StanceTracker::new(
            Box::new(SyntheticPoseEstimator::new()),
            TrackerConfig::default(),
        );
        let frame = DynamicImage::new_rgb8(64, 64);

        let (update, perf) = tracker.process_frame_with_metrics(&frame).unwrap();
        assert!(update.detection.is_some());
        assert!(update.metrics.is_some());
        assert!(perf.detection_confidence > 0.0);

        let metrics = update.metrics.unwrap();
        assert!((0.0..=180.0).contains(&metrics.left_knee_angle));
        assert!((0.0..=180.0).contains(&metrics.right_knee_angle));
        assert!(metrics.stance_width > 0.0);
    }
}
