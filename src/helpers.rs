//! Utility functions for ledgewalker

use bevy::prelude::*;

/// +1.0 when facing right, -1.0 when facing left
pub fn facing_sign(facing_right: bool) -> f32 {
    if facing_right { 1.0 } else { -1.0 }
}

/// Sum of segment lengths along a polyline
pub fn polyline_length(points: &[Vec2]) -> f32 {
    points.windows(2).map(|w| w[0].distance(w[1])).sum()
}

/// Sum of absolute vertical change per segment along a polyline
pub fn polyline_height_delta(points: &[Vec2]) -> f32 {
    points.windows(2).map(|w| (w[1].y - w[0].y).abs()).sum()
}

/// Parameter of `point` projected onto segment a->b (0 at a, 1 at b).
/// Degenerate segments return 0.
pub fn segment_progress(a: Vec2, b: Vec2, point: Vec2) -> f32 {
    let ab = b - a;
    let len_sq = ab.length_squared();
    if len_sq <= f32::EPSILON {
        return 0.0;
    }
    (point - a).dot(ab) / len_sq
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_polyline_metrics() {
        let pts = [Vec2::ZERO, Vec2::new(3.0, 4.0), Vec2::new(3.0, 0.0)];
        assert!((polyline_length(&pts) - 9.0).abs() < 1e-5);
        assert!((polyline_height_delta(&pts) - 8.0).abs() < 1e-5);
    }

    #[test]
    fn test_segment_progress() {
        let a = Vec2::ZERO;
        let b = Vec2::new(2.0, 0.0);
        assert!((segment_progress(a, b, Vec2::new(1.0, 5.0)) - 0.5).abs() < 1e-6);
        assert!(segment_progress(a, b, Vec2::new(-1.0, 0.0)) < 0.0);
        assert_eq!(segment_progress(a, a, Vec2::ONE), 0.0);
    }
}
