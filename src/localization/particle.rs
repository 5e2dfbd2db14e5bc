//! Monte Carlo self-localization over noisy landmark ranges.
//!
//! A fixed-size set of pose hypotheses is advanced open-loop on every
//! issued motion command and reweighted/resampled on every perception
//! with a usable landmark. The posterior mean is the pose estimate the
//! world model prefers over plain triangulation.

use rand::rngs::SmallRng;
use rand::{Rng, SeedableRng};

use super::Pose;
use crate::geometry::{circular_mean, normalize_angle, sample_gaussian};
use crate::objects::{FIELD_BOUND_X, FIELD_BOUND_Y};

/// Default hypothesis count; overridable through the config.
pub const DEFAULT_PARTICLE_COUNT: usize = 1000;

// motion model: power-to-displacement factor and fixed noise deviations
const DASH_SPEED_FACTOR: f64 = 0.01;
const DASH_NOISE_STD: f64 = 0.4;
const HEADING_DRIFT_STD: f64 = 1.5;
const TURN_NOISE_STD: f64 = 1.0;

// observation model: deviation of a reported landmark distance
const DISTANCE_NOISE_STD: f64 = 2.5;

#[derive(Debug, Clone, Copy)]
struct Particle {
    x: f64,
    y: f64,
    heading: f64,
}

impl Particle {
    fn in_bounds(&self) -> bool {
        self.x.abs() < FIELD_BOUND_X && self.y.abs() < FIELD_BOUND_Y
    }
}

#[derive(Debug, Clone)]
pub struct ParticleFilter {
    particles: Vec<Particle>,
    rng: SmallRng,
    estimate: Pose,
}

impl ParticleFilter {
    /// All hypotheses collapsed onto a known starting pose.
    pub fn localized(pose: Pose, count: usize) -> Self {
        let particles = vec![
            Particle {
                x: pose.x,
                y: pose.y,
                heading: pose.heading,
            };
            count.max(1)
        ];
        Self {
            particles,
            rng: SmallRng::from_entropy(),
            estimate: pose,
        }
    }

    /// Hypotheses spread uniformly over the field bounds, for an unknown
    /// starting pose.
    pub fn uniform(count: usize) -> Self {
        Self::uniform_with_rng(count, SmallRng::from_entropy())
    }

    /// Deterministic variant of [`ParticleFilter::uniform`].
    pub fn uniform_seeded(count: usize, seed: u64) -> Self {
        Self::uniform_with_rng(count, SmallRng::seed_from_u64(seed))
    }

    fn uniform_with_rng(count: usize, mut rng: SmallRng) -> Self {
        let particles: Vec<Particle> = (0..count.max(1))
            .map(|_| Particle {
                x: rng.gen_range(-FIELD_BOUND_X..FIELD_BOUND_X),
                y: rng.gen_range(-FIELD_BOUND_Y..FIELD_BOUND_Y),
                heading: rng.gen_range(-180.0..180.0),
            })
            .collect();
        let mut filter = Self {
            particles,
            rng,
            estimate: Pose::new(0.0, 0.0, 0.0),
        };
        filter.update_estimate();
        filter
    }

    pub fn count(&self) -> usize {
        self.particles.len()
    }

    /// Posterior mean pose after the most recent update.
    pub fn estimate(&self) -> Pose {
        self.estimate
    }

    /// Open-loop prediction for a dash: every particle advances along its
    /// own heading by a noisy displacement, with a small heading drift.
    pub fn predict_dash(&mut self, power: f64, max_power: f64) {
        let power = power.clamp(-max_power, max_power);
        for p in &mut self.particles {
            let displacement =
                power * DASH_SPEED_FACTOR + sample_gaussian(&mut self.rng, 0.0, DASH_NOISE_STD);
            let heading_rad = p.heading.to_radians();
            p.x += displacement * heading_rad.cos();
            p.y += displacement * heading_rad.sin();
            p.heading = normalize_angle(
                p.heading + sample_gaussian(&mut self.rng, 0.0, HEADING_DRIFT_STD),
            );
        }
        self.update_estimate();
    }

    /// Deterministic rotation plus turn noise on every heading; turning
    /// carries no positional uncertainty.
    pub fn predict_turn(&mut self, angle: f64) {
        for p in &mut self.particles {
            p.heading = normalize_angle(
                p.heading + angle + sample_gaussian(&mut self.rng, 0.0, TURN_NOISE_STD),
            );
        }
        self.update_estimate();
    }

    /// A teleport (the `move` command) collapses every hypothesis onto the
    /// commanded point; heading is unchanged by the server.
    pub fn collapse_to(&mut self, x: f64, y: f64) {
        for p in &mut self.particles {
            p.x = x;
            p.y = y;
        }
        self.update_estimate();
    }

    /// Weight every particle by the Gaussian likelihood of the observed
    /// distance to a known landmark, then resample.
    ///
    /// Particles outside the field bounds weigh zero unconditionally. An
    /// all-zero weight vector falls back to uniform weights so resampling
    /// never divides by zero.
    pub fn observe(&mut self, observed_distance: f64, landmark: (f64, f64)) {
        let weights: Vec<f64> = self
            .particles
            .iter()
            .map(|p| {
                if !p.in_bounds() {
                    return 0.0;
                }
                let implied = (landmark.0 - p.x).hypot(landmark.1 - p.y);
                gaussian_pdf(observed_distance, implied, DISTANCE_NOISE_STD)
            })
            .collect();

        let total: f64 = weights.iter().sum();
        let n = self.particles.len();
        let normalized: Vec<f64> = if total > 0.0 {
            weights.iter().map(|w| w / total).collect()
        } else {
            vec![1.0 / n as f64; n]
        };

        let indices = self.systematic_resample(&normalized);
        self.particles = indices.iter().map(|&i| self.particles[i]).collect();
        self.update_estimate();
    }

    /// Low-variance (systematic) resampling: one uniform draw, then
    /// stratified picks through the cumulative weight function.
    fn systematic_resample(&mut self, weights: &[f64]) -> Vec<usize> {
        let n = weights.len();
        let step = 1.0 / n as f64;
        let start = self.rng.gen_range(0.0..step);

        let mut indices = Vec::with_capacity(n);
        let mut cumulative = weights[0];
        let mut j = 0;
        for i in 0..n {
            let u = start + i as f64 * step;
            while u > cumulative && j < n - 1 {
                j += 1;
                cumulative += weights[j];
            }
            indices.push(j);
        }
        indices
    }

    fn update_estimate(&mut self) {
        let n = self.particles.len() as f64;
        let x = self.particles.iter().map(|p| p.x).sum::<f64>() / n;
        let y = self.particles.iter().map(|p| p.y).sum::<f64>() / n;
        let headings: Vec<f64> = self.particles.iter().map(|p| p.heading).collect();
        let heading = circular_mean(&headings).unwrap_or(0.0);
        self.estimate = Pose::new(x, y, heading);
    }
}

fn gaussian_pdf(x: f64, mean: f64, std_dev: f64) -> f64 {
    let z = (x - mean) / std_dev;
    (-0.5 * z * z).exp() / (std_dev * (2.0 * std::f64::consts::PI).sqrt())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::geometry::euclidean_distance;

    const TRUE_POSE: (f64, f64) = (10.0, -5.0);
    const LANDMARKS: [(f64, f64); 4] = [(52.5, 0.0), (0.0, 34.0), (-52.5, 0.0), (0.0, -34.0)];

    #[test]
    fn test_localized_filter_collapses_to_start() {
        let pf = ParticleFilter::localized(Pose::new(3.0, 4.0, 90.0), 50);
        assert_eq!(pf.count(), 50);
        let est = pf.estimate();
        assert!((est.x - 3.0).abs() < 1e-9);
        assert!((est.y - 4.0).abs() < 1e-9);
        assert!((est.heading - 90.0).abs() < 1e-9);
    }

    #[test]
    fn test_uniform_filter_within_bounds() {
        let pf = ParticleFilter::uniform_seeded(500, 1);
        assert_eq!(pf.count(), 500);
        for p in &pf.particles {
            assert!(p.in_bounds());
        }
    }

    #[test]
    fn test_convergence_from_uniform_prior() {
        let mut pf = ParticleFilter::uniform_seeded(1000, 42);
        let mut errors = Vec::new();
        for step in 0..50 {
            let landmark = LANDMARKS[step % LANDMARKS.len()];
            let true_distance = euclidean_distance(TRUE_POSE, landmark);
            pf.observe(true_distance, landmark);
            let est = pf.estimate();
            errors.push(euclidean_distance((est.x, est.y), TRUE_POSE));
        }

        let window = |range: std::ops::Range<usize>| -> f64 {
            errors[range.clone()].iter().sum::<f64>() / range.len() as f64
        };
        let windows: Vec<f64> = (0..5).map(|i| window(i * 10..(i + 1) * 10)).collect();

        // trend, not strict monotonicity: each 10-step window stays at or
        // below its predecessor (small slack for resampling jitter), and
        // the final window is decisively better than the first
        for pair in windows.windows(2) {
            assert!(
                pair[1] <= pair[0] * 1.10 + 0.5,
                "window average regressed: {windows:?}"
            );
        }
        assert!(
            windows[4] < windows[0] * 0.5,
            "filter failed to converge: {windows:?}"
        );
        assert!(windows[4] < 3.0, "final error too large: {windows:?}");
    }

    #[test]
    fn test_all_zero_weights_fall_back_to_uniform() {
        // every hypothesis far outside the field bounds weighs zero
        let mut pf = ParticleFilter::localized(Pose::new(200.0, 200.0, 0.0), 100);
        pf.observe(10.0, (0.0, 0.0));
        assert_eq!(pf.count(), 100);
        let est = pf.estimate();
        assert!(est.x.is_finite() && est.y.is_finite() && est.heading.is_finite());
    }

    #[test]
    fn test_dash_advances_along_heading() {
        let mut pf = ParticleFilter::localized(Pose::new(0.0, 0.0, 0.0), 2000);
        for _ in 0..10 {
            pf.predict_dash(100.0, 100.0);
        }
        let est = pf.estimate();
        // ten full-power dashes displace by about 10 * 100 * 0.01 = 10
        assert!(est.x > 5.0, "expected forward displacement, got {est:?}");
        assert!(est.y.abs() < 3.0, "expected little lateral drift, got {est:?}");
    }

    #[test]
    fn test_dash_power_clamped() {
        let mut a = ParticleFilter::localized(Pose::new(0.0, 0.0, 0.0), 500);
        let mut b = ParticleFilter::localized(Pose::new(0.0, 0.0, 0.0), 500);
        a.predict_dash(100.0, 100.0);
        b.predict_dash(100_000.0, 100.0);
        // clamping makes the overdriven dash statistically identical
        assert!((a.estimate().x - b.estimate().x).abs() < 0.2);
    }

    #[test]
    fn test_turn_rotates_every_particle() {
        let mut pf = ParticleFilter::localized(Pose::new(1.0, 2.0, 0.0), 1000);
        pf.predict_turn(90.0);
        let est = pf.estimate();
        assert!((est.heading - 90.0).abs() < 1.0, "heading {est:?}");
        // turning never moves hypotheses
        assert!((est.x - 1.0).abs() < 1e-9);
        assert!((est.y - 2.0).abs() < 1e-9);
    }

    #[test]
    fn test_collapse_to_teleports() {
        let mut pf = ParticleFilter::uniform_seeded(100, 9);
        pf.collapse_to(-30.0, 10.0);
        let est = pf.estimate();
        assert!((est.x + 30.0).abs() < 1e-9);
        assert!((est.y - 10.0).abs() < 1e-9);
    }
}
