// src/data.rs - Per-session metric accumulation and export
use std::fs::File;
use std::path::{Path, PathBuf};

use anyhow::Result;
use chrono::Local;
use csv::Writer;
use serde::Serialize;

use crate::tracking::FrameMetrics;

#[derive(Debug, Serialize)]
struct MetricsRecord {
    frame: u32,
    timestamp: f64,
    detected: bool,
    left_knee_angle: Option<f64>,
    right_knee_angle: Option<f64>,
    stance_width: Option<f64>,
    hands_up: Option<bool>,
    balanced: Option<bool>,
}

#[derive(Debug, Serialize)]
pub struct SessionSummary {
    pub session: String,
    pub total_frames: usize,
    pub detected_frames: usize,
    pub detection_rate: f64,
    pub hands_up_frames: usize,
    pub balanced_frames: usize,
    pub mean_left_knee_angle: Option<f64>,
    pub mean_right_knee_angle: Option<f64>,
    pub mean_stance_width: Option<f64>,
}

pub struct MetricsExporter {
    output_dir: PathBuf,
    session_name: String,
    records: Vec<MetricsRecord>,
}

impl MetricsExporter {
    pub fn new(output_dir: impl AsRef<Path>, session_name: Option<String>) -> Self {
        let session_name = session_name
            .unwrap_or_else(|| format!("session_{}", Local::now().format("%Y%m%d_%H%M%S")));

        Self {
            output_dir: output_dir.as_ref().to_path_buf(),
            session_name,
            records: Vec::new(),
        }
    }

    pub fn session_dir(&self) -> PathBuf {
        self.output_dir.join(&self.session_name)
    }

    /// Record one frame. Undetected frames keep their row so the CSV
    /// timeline stays gap-free.
    pub fn add_frame(&mut self, frame: u32, timestamp: f64, metrics: Option<&FrameMetrics>) {
        self.records.push(MetricsRecord {
            frame,
            timestamp,
            detected: metrics.is_some(),
            left_knee_angle: metrics.map(|m| m.left_knee_angle),
            right_knee_angle: metrics.map(|m| m.right_knee_angle),
            stance_width: metrics.map(|m| m.stance_width),
            hands_up: metrics.map(|m| m.hands_up),
            balanced: metrics.map(|m| m.balanced),
        });
    }

    pub fn export_csv(&self) -> Result<PathBuf> {
        let csv_path = self.session_dir().join("metrics.csv");
        if let Some(parent) = csv_path.parent() {
            std::fs::create_dir_all(parent)?;
        }

        let file = File::create(&csv_path)?;
        let mut writer = Writer::from_writer(file);
        for record in &self.records {
            writer.serialize(record)?;
        }
        writer.flush()?;

        Ok(csv_path)
    }

    pub fn summary(&self) -> SessionSummary {
        let total_frames = self.records.len();
        let detected: Vec<&MetricsRecord> =
            self.records.iter().filter(|r| r.detected).collect();
        let detected_frames = detected.len();

        let mean = |values: Vec<f64>| {
            if values.is_empty() {
                None
            } else {
                Some(values.iter().sum::<f64>() / values.len() as f64)
            }
        };

        SessionSummary {
            session: self.session_name.clone(),
            total_frames,
            detected_frames,
            detection_rate: if total_frames == 0 {
                0.0
            } else {
                detected_frames as f64 / total_frames as f64
            },
            hands_up_frames: detected.iter().filter(|r| r.hands_up == Some(true)).count(),
            balanced_frames: detected.iter().filter(|r| r.balanced == Some(true)).count(),
            mean_left_knee_angle: mean(detected.iter().filter_map(|r| r.left_knee_angle).collect()),
            mean_right_knee_angle: mean(
                detected.iter().filter_map(|r| r.right_knee_angle).collect(),
            ),
            mean_stance_width: mean(detected.iter().filter_map(|r| r.stance_width).collect()),
        }
    }

    pub fn write_summary_json(&self) -> Result<PathBuf> {
        let json_path = self.session_dir().join("summary.json");
        if let Some(parent) = json_path.parent() {
            std::fs::create_dir_all(parent)?;
        }

        let json = serde_json::to_string_pretty(&self.summary())?;
        std::fs::write(&json_path, json)?;

        Ok(json_path)
    }

    pub fn generate_report(&self) -> Result<PathBuf> {
        let report_path = self.session_dir().join("report.html");
        if let Some(parent) = report_path.parent() {
            std::fs::create_dir_all(parent)?;
        }

        std::fs::write(&report_path, self.create_html_report())?;

        Ok(report_path)
    }

    fn create_html_report(&self) -> String {
        let summary = self.summary();
        let knee_angles = match (summary.mean_left_knee_angle, summary.mean_right_knee_angle) {
            (Some(left), Some(right)) => format!("{:.1}&deg; / {:.1}&deg;", left, right),
            _ => "n/a".to_string(),
        };
        let balanced_share = if summary.detected_frames == 0 {
            0.0
        } else {
            summary.balanced_frames as f64 / summary.detected_frames as f64 * 100.0
        };

        format!(
            r#"<!DOCTYPE html>
<html>
<head>
    <title>Stance Tracking Report - {}</title>
    <style>
        body {{ font-family: 'Segoe UI', Tahoma, Geneva, Verdana, sans-serif; margin: 40px; background: #f5f5f5; }}
        h1 {{ color: #333; }}
        .stats {{ background: white; padding: 20px; border-radius: 8px; box-shadow: 0 2px 4px rgba(0,0,0,0.1); }}
        .stat-item {{ margin: 10px 0; }}
        .stat-label {{ font-weight: bold; color: #666; }}
        .stat-value {{ color: #4682EA; font-size: 1.2em; }}
    </style>
</head>
<body>
    <h1>Stance Tracking Session Report</h1>
    <div class="stats">
        <h2>Session: {}</h2>
        <div class="stat-item">
            <span class="stat-label">Total Frames:</span>
            <span class="stat-value">{}</span>
        </div>
        <div class="stat-item">
            <span class="stat-label">Detection Rate:</span>
            <span class="stat-value">{:.1}%</span>
        </div>
        <div class="stat-item">
            <span class="stat-label">Hands Raised:</span>
            <span class="stat-value">{} frames</span>
        </div>
        <div class="stat-item">
            <span class="stat-label">Balanced:</span>
            <span class="stat-value">{:.1}% of detected frames</span>
        </div>
        <div class="stat-item">
            <span class="stat-label">Mean Knee Angles (L/R):</span>
            <span class="stat-value">{}</span>
        </div>
    </div>
</body>
</html>
"#,
            summary.session,
            summary.session,
            summary.total_frames,
            summary.detection_rate * 100.0,
            summary.hands_up_frames,
            balanced_share,
            knee_angles,
        )
    }
}
