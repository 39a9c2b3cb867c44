//! The bounded Gaussian random walk of a river's angle.

use rand::Rng;
use sedimar_core::HingePoint;

/// Gaussian deviates by the polar Box-Muller method, keeping the spare
/// deviate of each generated pair.
#[derive(Debug, Default)]
pub struct GaussianDeviate {
    spare: Option<f64>,
}

impl GaussianDeviate {
    pub fn new() -> Self {
        Self { spare: None }
    }

    /// One N(0, 1) sample.
    pub fn next<R: Rng>(&mut self, rng: &mut R) -> f64 {
        if let Some(g) = self.spare.take() {
            return g;
        }
        loop {
            let v1: f64 = 2.0 * rng.gen::<f64>() - 1.0;
            let v2: f64 = 2.0 * rng.gen::<f64>() - 1.0;
            let rsq = v1 * v1 + v2 * v2;
            if rsq >= 1.0 || rsq == 0.0 {
                continue;
            }
            let fac = (-2.0 * rsq.ln() / rsq).sqrt();
            self.spare = Some(v1 * fac);
            return v2 * fac;
        }
    }
}

/// Draw the next angle of a leaf: a Gaussian step from the current
/// angle, mirrored back inside [min_angle, max_angle] and redrawn until
/// it lands in range.
pub fn avulse_angle<R: Rng>(
    hinge: &HingePoint,
    gauss: &mut GaussianDeviate,
    rng: &mut R,
) -> f64 {
    let (min_angle, max_angle) = (hinge.min_angle, hinge.max_angle);
    loop {
        let mut angle = hinge.angle + gauss.next(rng) * hinge.std_dev;
        if angle < min_angle {
            angle = min_angle + (min_angle - angle);
        }
        if angle > max_angle {
            angle = max_angle - (angle - max_angle);
        }
        if (min_angle..=max_angle).contains(&angle) {
            return angle;
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rand::SeedableRng;
    use rand_chacha::ChaCha8Rng;

    #[test]
    fn test_gaussian_moments() {
        let mut rng = ChaCha8Rng::seed_from_u64(7);
        let mut gauss = GaussianDeviate::new();
        let n = 50_000;
        let samples: Vec<f64> = (0..n).map(|_| gauss.next(&mut rng)).collect();
        let mean = samples.iter().sum::<f64>() / n as f64;
        let var = samples.iter().map(|s| (s - mean) * (s - mean)).sum::<f64>() / n as f64;
        assert!(mean.abs() < 0.02, "mean {}", mean);
        assert!((var - 1.0).abs() < 0.05, "variance {}", var);
    }

    #[test]
    fn test_reflection_keeps_angle_in_range() {
        let mut rng = ChaCha8Rng::seed_from_u64(1945);
        let mut gauss = GaussianDeviate::new();
        let mut hinge = HingePoint::new(0, 0);
        hinge.min_angle = -0.3;
        hinge.max_angle = 0.3;
        hinge.std_dev = 0.5; // large steps force reflections
        for _ in 0..10_000 {
            hinge.angle = avulse_angle(&hinge, &mut gauss, &mut rng);
            assert!(hinge.angle >= hinge.min_angle && hinge.angle <= hinge.max_angle);
        }
    }
}
