// src/overlay.rs - Skeleton overlay drawn onto captured frames
use image::{Rgba, RgbaImage};

use crate::landmarks::{LandmarkSet, PoseLandmark};

/// Connector pairs drawn between landmarks (start, end).
pub const SKELETON_CONNECTIONS: [(PoseLandmark, PoseLandmark); 16] = [
    // Arms
    (PoseLandmark::LeftShoulder, PoseLandmark::LeftElbow),
    (PoseLandmark::LeftElbow, PoseLandmark::LeftWrist),
    (PoseLandmark::RightShoulder, PoseLandmark::RightElbow),
    (PoseLandmark::RightElbow, PoseLandmark::RightWrist),
    // Torso
    (PoseLandmark::LeftShoulder, PoseLandmark::RightShoulder),
    (PoseLandmark::LeftShoulder, PoseLandmark::LeftHip),
    (PoseLandmark::RightShoulder, PoseLandmark::RightHip),
    (PoseLandmark::LeftHip, PoseLandmark::RightHip),
    // Legs
    (PoseLandmark::LeftHip, PoseLandmark::LeftKnee),
    (PoseLandmark::LeftKnee, PoseLandmark::LeftAnkle),
    (PoseLandmark::RightHip, PoseLandmark::RightKnee),
    (PoseLandmark::RightKnee, PoseLandmark::RightAnkle),
    // Feet
    (PoseLandmark::LeftAnkle, PoseLandmark::LeftHeel),
    (PoseLandmark::LeftHeel, PoseLandmark::LeftFootIndex),
    (PoseLandmark::RightAnkle, PoseLandmark::RightHeel),
    (PoseLandmark::RightHeel, PoseLandmark::RightFootIndex),
];

pub const CONNECTOR_COLOR: Rgba<u8> = Rgba([0, 255, 0, 255]);
pub const LANDMARK_COLOR: Rgba<u8> = Rgba([255, 0, 0, 255]);

const LANDMARK_RADIUS: i32 = 3;

/// Paint connectors, then landmark dots, onto the frame. Landmarks below
/// the visibility threshold are skipped; anything off-frame is clipped.
pub fn draw_skeleton(frame: &mut RgbaImage, landmarks: &LandmarkSet, visibility_threshold: f64) {
    let (width, height) = (frame.width(), frame.height());

    for (start, end) in SKELETON_CONNECTIONS.iter() {
        let (Some(a), Some(b)) = (landmarks.get(*start), landmarks.get(*end)) else {
            continue;
        };
        if !a.is_visible(visibility_threshold) || !b.is_visible(visibility_threshold) {
            continue;
        }

        draw_line(
            frame,
            a.to_pixel(width, height),
            b.to_pixel(width, height),
            CONNECTOR_COLOR,
        );
    }

    for landmark in landmarks.iter() {
        if !landmark.is_visible(visibility_threshold) {
            continue;
        }
        let (x, y) = landmark.to_pixel(width, height);
        draw_dot(frame, x, y, LANDMARK_RADIUS, LANDMARK_COLOR);
    }
}

fn put_pixel(frame: &mut RgbaImage, x: i32, y: i32, color: Rgba<u8>) {
    if x >= 0 && y >= 0 && (x as u32) < frame.width() && (y as u32) < frame.height() {
        frame.put_pixel(x as u32, y as u32, color);
    }
}

// Bresenham, doubled to a 2px stroke.
fn draw_line(frame: &mut RgbaImage, (x0, y0): (i32, i32), (x1, y1): (i32, i32), color: Rgba<u8>) {
    let dx = (x1 - x0).abs();
    let dy = -(y1 - y0).abs();
    let sx = if x0 < x1 { 1 } else { -1 };
    let sy = if y0 < y1 { 1 } else { -1 };
    let mut err = dx + dy;
    let (mut x, mut y) = (x0, y0);

    loop {
        put_pixel(frame, x, y, color);
        put_pixel(frame, x + 1, y, color);
        put_pixel(frame, x, y + 1, color);

        if x == x1 && y == y1 {
            break;
        }
        let e2 = 2 * err;
        if e2 >= dy {
            err += dy;
            x += sx;
        }
        if e2 <= dx {
            err += dx;
            y += sy;
        }
    }
}

fn draw_dot(frame: &mut RgbaImage, cx: i32, cy: i32, radius: i32, color: Rgba<u8>) {
    for dy in -radius..=radius {
        for dx in -radius..=radius {
            if dx * dx + dy * dy <= radius * radius {
                put_pixel(frame, cx + dx, cy + dy, color);
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::landmarks::Landmark;

    fn figure_at(x: f64, y: f64) -> LandmarkSet {
        LandmarkSet::new(vec![Landmark::new(x, y, 1.0); PoseLandmark::COUNT])
    }

    #[test]
    fn test_draw_marks_pixels() {
        let mut frame = RgbaImage::new(64, 64);
        draw_skeleton(&mut frame, &figure_at(0.5, 0.5), 0.5);
        assert_eq!(*frame.get_pixel(32, 32), LANDMARK_COLOR);
    }

    #[test]
    fn test_draw_clips_at_edges() {
        let mut frame = RgbaImage::new(64, 64);
        // Landmarks at and beyond the frame edge must not panic.
        draw_skeleton(&mut frame, &figure_at(1.0, 1.0), 0.5);
        draw_skeleton(&mut frame, &figure_at(-0.2, 1.4), 0.5);
    }

    #[test]
    fn test_low_visibility_not_drawn() {
        let mut frame = RgbaImage::new(64, 64);
        let set = LandmarkSet::new(vec![Landmark::new(0.5, 0.5, 0.1); PoseLandmark::COUNT]);
        draw_skeleton(&mut frame, &set, 0.5);
        assert_eq!(*frame.get_pixel(32, 32), Rgba([0, 0, 0, 0]));
    }

    #[test]
    fn test_partial_set_draws_without_panic() {
        let mut frame = RgbaImage::new(64, 64);
        let set = LandmarkSet::new(vec![Landmark::new(0.5, 0.5, 1.0); 12]);
        draw_skeleton(&mut frame, &set, 0.5);
    }
}
