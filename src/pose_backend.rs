// src/pose_backend.rs - External pose-estimation backends behind one trait
use anyhow::{Context, Result};
use image::DynamicImage;
use ndarray::Array4;
use ort::session::builder::GraphOptimizationLevel;
use ort::session::Session;
use ort::value::Tensor;
use tracing::{info, warn};

use crate::config::ModelConfig;
use crate::landmarks::{Landmark, LandmarkSet, PoseLandmark};

/// One frame's worth of model output.
#[derive(Debug, Clone)]
pub struct Detection {
    pub landmarks: LandmarkSet,
    pub confidence: f64,
}

/// The external model as a capability: given an image, an optional landmark set.
pub trait PoseEstimator {
    /// `Ok(None)` means no body was found in the frame.
    fn estimate(&mut self, frame: &DynamicImage) -> Result<Option<Detection>>;
}

/// BlazePose-style landmark model running under onnxruntime.
pub struct OnnxPoseEstimator {
    session: Session,
    input_name: String,
    output_name: String,
    input_size: u32,
    min_confidence: f64,
}

// Values per landmark in the model output: x, y, z, visibility, presence.
const OUTPUT_STRIDE: usize = 5;

impl OnnxPoseEstimator {
    pub fn new(config: &ModelConfig) -> Result<Self> {
        let session = Session::builder()?
            .with_optimization_level(GraphOptimizationLevel::Level3)?
            .commit_from_file(&config.path)
            .with_context(|| format!("failed to load pose model from {}", config.path.display()))?;

        let input_name = session
            .inputs
            .first()
            .context("pose model has no inputs")?
            .name
            .clone();
        let output_name = session
            .outputs
            .first()
            .context("pose model has no outputs")?
            .name
            .clone();

        Ok(Self {
            session,
            input_name,
            output_name,
            input_size: config.input_size,
            min_confidence: config.min_detection_confidence,
        })
    }

    /// Square RGB f32 tensor in [0, 1], NHWC, as BlazePose expects.
    fn preprocess(&self, frame: &DynamicImage) -> Array4<f32> {
        let resized = image::imageops::resize(
            &frame.to_rgb8(),
            self.input_size,
            self.input_size,
            image::imageops::FilterType::Triangle,
        );

        let size = self.input_size as usize;
        let mut input = Array4::<f32>::zeros((1, size, size, 3));
        for (x, y, pixel) in resized.enumerate_pixels() {
            for c in 0..3 {
                input[[0, y as usize, x as usize, c]] = pixel[c] as f32 / 255.0;
            }
        }

        input
    }

    fn decode(&self, values: &[f32]) -> Result<Detection> {
        if values.len() < PoseLandmark::COUNT * OUTPUT_STRIDE {
            anyhow::bail!("unexpected model output size: {} values", values.len());
        }

        let scale = self.input_size as f64;
        let mut landmarks = Vec::with_capacity(PoseLandmark::COUNT);
        let mut visibility_sum = 0.0;

        for i in 0..PoseLandmark::COUNT {
            let base = i * OUTPUT_STRIDE;
            // Coordinates come out in input-tensor pixels; visibility as a logit.
            let x = values[base] as f64 / scale;
            let y = values[base + 1] as f64 / scale;
            let visibility = sigmoid(values[base + 3] as f64);

            visibility_sum += visibility;
            landmarks.push(Landmark::new(x, y, visibility));
        }

        let confidence = visibility_sum / PoseLandmark::COUNT as f64;
        Ok(Detection {
            landmarks: LandmarkSet::new(landmarks),
            confidence,
        })
    }
}

impl PoseEstimator for OnnxPoseEstimator {
    fn estimate(&mut self, frame: &DynamicImage) -> Result<Option<Detection>> {
        let input_tensor = Tensor::from_array(self.preprocess(frame))?;
        let outputs = self
            .session
            .run(ort::inputs![self.input_name.as_str() => input_tensor])
            .context("pose model inference failed")?;

        let output: ndarray::ArrayViewD<f32> = outputs[self.output_name.as_str()]
            .try_extract_array()
            .context("failed to extract landmark tensor")?;
        let values = output
            .as_slice()
            .context("landmark tensor is not contiguous")?;

        let detection = self.decode(values)?;
        if detection.confidence < self.min_confidence {
            return Ok(None);
        }

        Ok(Some(detection))
    }
}

fn sigmoid(x: f64) -> f64 {
    1.0 / (1.0 + (-x).exp())
}

/// Deterministic standing figure used when no model is available and in tests.
///
/// The figure sways at the hips and periodically raises both wrists above
/// the nose, so every derived metric gets exercised without a camera or model.
pub struct SyntheticPoseEstimator {
    phase: f64,
}

impl SyntheticPoseEstimator {
    pub fn new() -> Self {
        Self { phase: 0.0 }
    }

    fn figure(&self, t: f64) -> LandmarkSet {
        let sway = 0.03 * t.sin();
        let hands_raised = (t * 0.25).sin() > 0.0;

        fn set(landmarks: &mut [Landmark], index: PoseLandmark, x: f64, y: f64) {
            landmarks[index as usize] = Landmark::new(x, y, 0.95);
        }

        let mut landmarks = vec![Landmark::new(0.5, 0.5, 0.9); PoseLandmark::COUNT];
        let lm = landmarks.as_mut_slice();

        set(lm, PoseLandmark::Nose, 0.5 + sway, 0.20);
        set(lm, PoseLandmark::LeftEyeInner, 0.49 + sway, 0.18);
        set(lm, PoseLandmark::LeftEye, 0.48 + sway, 0.18);
        set(lm, PoseLandmark::LeftEyeOuter, 0.47 + sway, 0.18);
        set(lm, PoseLandmark::RightEyeInner, 0.51 + sway, 0.18);
        set(lm, PoseLandmark::RightEye, 0.52 + sway, 0.18);
        set(lm, PoseLandmark::RightEyeOuter, 0.53 + sway, 0.18);
        set(lm, PoseLandmark::LeftEar, 0.46 + sway, 0.19);
        set(lm, PoseLandmark::RightEar, 0.54 + sway, 0.19);
        set(lm, PoseLandmark::MouthLeft, 0.48 + sway, 0.22);
        set(lm, PoseLandmark::MouthRight, 0.52 + sway, 0.22);

        set(lm, PoseLandmark::LeftShoulder, 0.42 + sway, 0.35);
        set(lm, PoseLandmark::RightShoulder, 0.58 + sway, 0.35);

        if hands_raised {
            set(lm, PoseLandmark::LeftElbow, 0.40 + sway, 0.22);
            set(lm, PoseLandmark::RightElbow, 0.60 + sway, 0.22);
            set(lm, PoseLandmark::LeftWrist, 0.41 + sway, 0.10);
            set(lm, PoseLandmark::RightWrist, 0.59 + sway, 0.10);
        } else {
            set(lm, PoseLandmark::LeftElbow, 0.39 + sway, 0.47);
            set(lm, PoseLandmark::RightElbow, 0.61 + sway, 0.47);
            set(lm, PoseLandmark::LeftWrist, 0.37 + sway, 0.58);
            set(lm, PoseLandmark::RightWrist, 0.63 + sway, 0.58);
        }

        // Hand points trail just above their wrist.
        let left_wrist = lm[PoseLandmark::LeftWrist as usize];
        let right_wrist = lm[PoseLandmark::RightWrist as usize];
        set(lm, PoseLandmark::LeftPinky, left_wrist.x - 0.02, left_wrist.y - 0.03);
        set(lm, PoseLandmark::LeftIndex, left_wrist.x - 0.01, left_wrist.y - 0.03);
        set(lm, PoseLandmark::LeftThumb, left_wrist.x + 0.01, left_wrist.y - 0.03);
        set(lm, PoseLandmark::RightPinky, right_wrist.x + 0.02, right_wrist.y - 0.03);
        set(lm, PoseLandmark::RightIndex, right_wrist.x + 0.01, right_wrist.y - 0.03);
        set(lm, PoseLandmark::RightThumb, right_wrist.x - 0.01, right_wrist.y - 0.03);

        set(lm, PoseLandmark::LeftHip, 0.45 + sway, 0.60);
        set(lm, PoseLandmark::RightHip, 0.55 + sway, 0.60);
        set(lm, PoseLandmark::LeftKnee, 0.44, 0.75);
        set(lm, PoseLandmark::RightKnee, 0.56, 0.75);
        set(lm, PoseLandmark::LeftAnkle, 0.43, 0.90);
        set(lm, PoseLandmark::RightAnkle, 0.57, 0.90);
        set(lm, PoseLandmark::LeftHeel, 0.42, 0.93);
        set(lm, PoseLandmark::RightHeel, 0.58, 0.93);
        set(lm, PoseLandmark::LeftFootIndex, 0.45, 0.95);
        set(lm, PoseLandmark::RightFootIndex, 0.55, 0.95);

        LandmarkSet::new(landmarks)
    }
}

impl Default for SyntheticPoseEstimator {
    fn default() -> Self {
        Self::new()
    }
}

impl PoseEstimator for SyntheticPoseEstimator {
    fn estimate(&mut self, _frame: &DynamicImage) -> Result<Option<Detection>> {
        let landmarks = self.figure(self.phase);
        self.phase += 0.033;

        Ok(Some(Detection {
            landmarks,
            confidence: 0.95,
        }))
    }
}

/// Open the configured ONNX model, or fall back to the synthetic figure
/// when the model cannot be loaded.
pub fn open_backend(config: &ModelConfig) -> Box<dyn PoseEstimator> {
    match OnnxPoseEstimator::new(config) {
        Ok(backend) => {
            info!("pose model loaded from {}", config.path.display());
            Box::new(backend)
        }
        Err(e) => {
            warn!("pose model unavailable ({e:#}), using synthetic figure");
            Box::new(SyntheticPoseEstimator::new())
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_synthetic_figure_is_complete() {
        let mut backend = SyntheticPoseEstimator::new();
        let frame = DynamicImage::new_rgb8(64, 64);

        for _ in 0..10 {
            let detection = backend.estimate(&frame).unwrap().unwrap();
            assert_eq!(detection.landmarks.len(), PoseLandmark::COUNT);
            for landmark in detection.landmarks.iter() {
                assert!(landmark.x.is_finite());
                assert!(landmark.y.is_finite());
            }
        }
    }

    #[test]
    fn test_synthetic_figure_raises_hands_eventually() {
        let mut backend = SyntheticPoseEstimator::new();
        let frame = DynamicImage::new_rgb8(64, 64);

        let mut seen_up = false;
        let mut seen_down = false;
        for _ in 0..400 {
            let detection = backend.estimate(&frame).unwrap().unwrap();
            let nose = detection.landmarks.get(PoseLandmark::Nose).unwrap().y;
            let left = detection.landmarks.get(PoseLandmark::LeftWrist).unwrap().y;
            let right = detection.landmarks.get(PoseLandmark::RightWrist).unwrap().y;
            if left < nose && right < nose {
                seen_up = true;
            } else {
                seen_down = true;
            }
        }
        assert!(seen_up && seen_down);
    }

    #[test]
    fn test_sigmoid_squashes_to_unit_interval() {
        assert!((sigmoid(0.0) - 0.5).abs() < 1e-12);
        assert!(sigmoid(10.0) > 0.99);
        assert!(sigmoid(-10.0) < 0.01);
    }
}
