//! Angle and intersection helpers.
//!
//! Heading convention: degrees, 0 = north (+y), 90 = east (+x), clockwise.

use nalgebra::Vector2;

/// 2D position or displacement.
pub type Vec2 = Vector2<f64>;

/// Normalizes an absolute heading into `[0, 360)`.
pub fn normalize_absolute(degrees: f64) -> f64 {
    let d = degrees.rem_euclid(360.0);
    if d >= 360.0 {
        0.0
    } else {
        d
    }
}

/// Normalizes a relative angle into `(-180, 180]`.
pub fn normalize_relative(degrees: f64) -> f64 {
    let d = normalize_absolute(degrees);
    if d > 180.0 {
        d - 360.0
    } else {
        d
    }
}

/// Unit vector for a heading.
pub fn heading_vector(heading: f64) -> Vec2 {
    let rad = heading.to_radians();
    Vec2::new(rad.sin(), rad.cos())
}

/// Absolute heading from `from` to `to`.
pub fn bearing(from: &Vec2, to: &Vec2) -> f64 {
    let d = to - from;
    normalize_absolute(d.x.atan2(d.y).to_degrees())
}

/// Rotates `current` toward `target` by at most `max_step` degrees.
///
/// Returns the new heading and the signed rotation applied.
pub fn rotate_toward(current: f64, target: f64, max_step: f64) -> (f64, f64) {
    let wanted = normalize_relative(target - current);
    let step = wanted.clamp(-max_step, max_step);
    (normalize_absolute(current + step), step)
}

/// First contact of segment `a → b` with a circle, as a fraction of the
/// segment in `[0, 1]`.
///
/// Tests the whole swept path, so a segment that passes through the circle
/// hits even when neither endpoint lies inside it.
pub fn segment_circle_hit(a: &Vec2, b: &Vec2, center: &Vec2, radius: f64) -> Option<f64> {
    let d = b - a;
    let f = a - center;
    let c = f.dot(&f) - radius * radius;

    // Starting inside counts as an immediate hit
    if c <= 0.0 {
        return Some(0.0);
    }

    let len_sq = d.dot(&d);
    if len_sq == 0.0 {
        return None;
    }

    let half_b = f.dot(&d);
    let disc = half_b * half_b - len_sq * c;
    if disc < 0.0 {
        return None;
    }

    let t = (-half_b - disc.sqrt()) / len_sq;
    if (0.0..=1.0).contains(&t) {
        Some(t)
    } else {
        None
    }
}

/// Whether segments `a1 → a2` and `b1 → b2` intersect (touching counts).
pub fn segments_intersect(a1: &Vec2, a2: &Vec2, b1: &Vec2, b2: &Vec2) -> bool {
    fn cross(o: &Vec2, a: &Vec2, b: &Vec2) -> f64 {
        (a.x - o.x) * (b.y - o.y) - (a.y - o.y) * (b.x - o.x)
    }

    fn on_segment(p: &Vec2, q: &Vec2, r: &Vec2) -> bool {
        q.x <= p.x.max(r.x) && q.x >= p.x.min(r.x) && q.y <= p.y.max(r.y) && q.y >= p.y.min(r.y)
    }

    let d1 = cross(b1, b2, a1);
    let d2 = cross(b1, b2, a2);
    let d3 = cross(a1, a2, b1);
    let d4 = cross(a1, a2, b2);

    if ((d1 > 0.0 && d2 < 0.0) || (d1 < 0.0 && d2 > 0.0))
        && ((d3 > 0.0 && d4 < 0.0) || (d3 < 0.0 && d4 > 0.0))
    {
        return true;
    }

    (d1 == 0.0 && on_segment(b1, a1, b2))
        || (d2 == 0.0 && on_segment(b1, a2, b2))
        || (d3 == 0.0 && on_segment(a1, b1, a2))
        || (d4 == 0.0 && on_segment(a1, b2, a2))
}

/// Whether `angle` lies within the sweep that starts at `start` and rotates
/// by `sweep` degrees (either sign), widened by `margin` on both sides.
pub fn angle_in_sweep(start: f64, sweep: f64, angle: f64, margin: f64) -> bool {
    let (from, width) = if sweep >= 0.0 {
        (start, sweep)
    } else {
        (start + sweep, -sweep)
    };
    if width + 2.0 * margin >= 360.0 {
        return true;
    }
    let offset = normalize_absolute(angle - (from - margin));
    offset <= width + 2.0 * margin
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_relative_eq;

    #[test]
    fn test_normalization() {
        assert_relative_eq!(normalize_absolute(370.0), 10.0);
        assert_relative_eq!(normalize_absolute(-90.0), 270.0);
        assert_relative_eq!(normalize_relative(270.0), -90.0);
        assert_relative_eq!(normalize_relative(180.0), 180.0);
        assert_relative_eq!(normalize_relative(-180.0), 180.0);
    }

    #[test]
    fn test_heading_and_bearing() {
        let east = heading_vector(90.0);
        assert_relative_eq!(east.x, 1.0, epsilon = 1e-12);
        assert_relative_eq!(east.y, 0.0, epsilon = 1e-12);

        let origin = Vec2::new(100.0, 100.0);
        assert_relative_eq!(bearing(&origin, &Vec2::new(100.0, 200.0)), 0.0);
        assert_relative_eq!(bearing(&origin, &Vec2::new(200.0, 100.0)), 90.0);
        assert_relative_eq!(bearing(&origin, &Vec2::new(0.0, 100.0)), 270.0);
    }

    #[test]
    fn test_rotate_toward_takes_short_way() {
        let (heading, step) = rotate_toward(350.0, 20.0, 20.0);
        assert_relative_eq!(step, 20.0);
        assert_relative_eq!(heading, 10.0);

        let (heading, step) = rotate_toward(10.0, 5.0, 20.0);
        assert_relative_eq!(step, -5.0);
        assert_relative_eq!(heading, 5.0);
    }

    #[test]
    fn test_swept_hit_without_endpoint_containment() {
        // Bullet jumps from one side of the robot to the other in one turn
        let a = Vec2::new(0.0, 0.0);
        let b = Vec2::new(100.0, 0.0);
        let center = Vec2::new(50.0, 5.0);

        assert!((a - center).norm() > 18.0);
        assert!((b - center).norm() > 18.0);

        let t = segment_circle_hit(&a, &b, &center, 18.0).expect("swept hit");
        assert!(t > 0.0 && t < 0.5);
    }

    #[test]
    fn test_swept_miss() {
        let a = Vec2::new(0.0, 0.0);
        let b = Vec2::new(100.0, 0.0);
        assert!(segment_circle_hit(&a, &b, &Vec2::new(50.0, 30.0), 18.0).is_none());
        // Circle beyond the end of the segment
        assert!(segment_circle_hit(&a, &b, &Vec2::new(130.0, 0.0), 18.0).is_none());
    }

    #[test]
    fn test_segments_intersect() {
        let a1 = Vec2::new(0.0, 0.0);
        let a2 = Vec2::new(10.0, 10.0);
        assert!(segments_intersect(&a1, &a2, &Vec2::new(0.0, 10.0), &Vec2::new(10.0, 0.0)));
        assert!(!segments_intersect(&a1, &a2, &Vec2::new(20.0, 0.0), &Vec2::new(30.0, 5.0)));
    }

    #[test]
    fn test_angle_in_sweep() {
        assert!(angle_in_sweep(0.0, 45.0, 30.0, 0.0));
        assert!(!angle_in_sweep(0.0, 45.0, 60.0, 0.0));
        // Negative sweep wraps through north
        assert!(angle_in_sweep(10.0, -45.0, 350.0, 0.0));
        // Zero sweep still catches a target the margin covers
        assert!(angle_in_sweep(90.0, 0.0, 92.0, 3.0));
        assert!(!angle_in_sweep(90.0, 0.0, 95.0, 3.0));
    }
}
