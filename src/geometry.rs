//! Planar geometry helpers shared by localization and behaviors.
//!
//! Angles are degrees, counter-clockwise positive with the positive x-axis
//! at 0 and the positive y-axis at 90, normalized to (-180, 180].

use rand::Rng;

/// Normalize an angle in degrees to the half-open range (-180, 180].
pub fn normalize_angle(mut deg: f64) -> f64 {
    while deg > 180.0 {
        deg -= 360.0;
    }
    while deg <= -180.0 {
        deg += 360.0;
    }
    deg
}

/// Euclidean distance between two points.
pub fn euclidean_distance(a: (f64, f64), b: (f64, f64)) -> f64 {
    (b.0 - a.0).hypot(b.1 - a.1)
}

/// Angle in degrees from the first point to the second.
pub fn angle_between_points(from: (f64, f64), to: (f64, f64)) -> f64 {
    normalize_angle((to.1 - from.1).atan2(to.0 - from.0).to_degrees())
}

/// Circular mean of a set of angles in degrees.
///
/// Averaging through the unit circle avoids the discontinuity at +-180
/// (the arithmetic mean of 179 and -179 is 0, not the correct 180).
pub fn circular_mean(angles: &[f64]) -> Option<f64> {
    if angles.is_empty() {
        return None;
    }
    let (sin_sum, cos_sum) = angles.iter().fold((0.0, 0.0), |(s, c), a| {
        let r = a.to_radians();
        (s + r.sin(), c + r.cos())
    });
    Some(normalize_angle(sin_sum.atan2(cos_sum).to_degrees()))
}

/// One draw from N(mean, std_dev^2) via the Box-Muller transform.
pub(crate) fn sample_gaussian<R: Rng>(rng: &mut R, mean: f64, std_dev: f64) -> f64 {
    let u1: f64 = rng.gen_range(f64::EPSILON..1.0);
    let u2: f64 = rng.gen_range(0.0..1.0);
    mean + std_dev * (-2.0 * u1.ln()).sqrt() * (2.0 * std::f64::consts::PI * u2).cos()
}
