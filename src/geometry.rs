// src/geometry.rs - Planar measurements over normalized landmark coordinates
use nalgebra::Point2;

/// Angle in degrees at vertex `b`, between the rays b->a and b->c.
///
/// Uses the difference of the two atan2 headings, folded into [0, 180].
/// Total over all finite inputs; collinear or coincident points produce
/// 0 or 180 rather than an error.
pub fn angle_at_vertex(a: Point2<f64>, b: Point2<f64>, c: Point2<f64>) -> f64 {
    let radians = (c.y - b.y).atan2(c.x - b.x) - (a.y - b.y).atan2(a.x - b.x);

    let mut angle = radians.to_degrees().abs();
    if angle > 180.0 {
        angle = 360.0 - angle;
    }

    angle
}

/// Euclidean distance between two points, in the same normalized units.
pub fn distance(a: Point2<f64>, b: Point2<f64>) -> f64 {
    (b - a).norm()
}
