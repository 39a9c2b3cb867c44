//! Kelvin functions of order zero.
//!
//! The plate-bending Green's function needs kei0(x) = Im K0(x e^{i pi/4}).
//! For x <= 8 the defining power series is summed directly; beyond that
//! the asymptotic expansion of K0 is evaluated along the rotated ray with
//! a small complex helper. kei0(0) = -pi/4 exactly.

use std::f64::consts::PI;

/// Euler-Mascheroni constant
const EULER_GAMMA: f64 = 0.577_215_664_901_532_9;

const SERIES_CUTOVER: f64 = 8.0;

/// Minimal complex arithmetic for the asymptotic branch
#[derive(Debug, Clone, Copy)]
struct Complex {
    re: f64,
    im: f64,
}

impl Complex {
    fn new(re: f64, im: f64) -> Self {
        Self { re, im }
    }

    fn from_polar(r: f64, theta: f64) -> Self {
        Self::new(r * theta.cos(), r * theta.sin())
    }

    fn mul(self, other: Complex) -> Complex {
        Complex::new(
            self.re * other.re - self.im * other.im,
            self.re * other.im + self.im * other.re,
        )
    }

    fn scale(self, s: f64) -> Complex {
        Complex::new(self.re * s, self.im * s)
    }

    fn recip(self) -> Complex {
        let d = self.re * self.re + self.im * self.im;
        Complex::new(self.re / d, -self.im / d)
    }

    fn exp(self) -> Complex {
        Complex::from_polar(self.re.exp(), self.im)
    }

    fn sqrt(self) -> Complex {
        let r = (self.re * self.re + self.im * self.im).sqrt().sqrt();
        let theta = self.im.atan2(self.re) / 2.0;
        Complex::from_polar(r, theta)
    }
}

/// ber0(x): Re J0(x e^{3 i pi/4}), by its power series
pub fn ber0(x: f64) -> f64 {
    let q = x / 2.0;
    let q4 = q.powi(4);
    let mut sum = 1.0;
    let mut term = 1.0;
    let mut k = 0u32;
    loop {
        k += 1;
        let m = 2 * k;
        term *= -q4 / ((m - 1) as f64 * m as f64).powi(2);
        sum += term;
        if term.abs() < 1e-17 * sum.abs().max(1.0) || k > 40 {
            break;
        }
    }
    sum
}

/// bei0(x): Im J0(x e^{3 i pi/4}), by its power series
pub fn bei0(x: f64) -> f64 {
    let q = x / 2.0;
    let q4 = q.powi(4);
    let mut term = q * q;
    let mut sum = term;
    let mut k = 0u32;
    loop {
        k += 1;
        let m = 2 * k;
        term *= -q4 / (m as f64 * (m + 1) as f64).powi(2);
        sum += term;
        if term.abs() < 1e-17 * sum.abs().max(1.0) || k > 40 {
            break;
        }
    }
    sum
}

/// kei0 by the defining series (x <= 8):
/// kei x = -ln(x/2) bei x - (pi/4) ber x
///         + sum_k (-1)^k psi(2k+2) (x/2)^{4k+2} / [(2k+1)!]^2
fn kei0_series(x: f64) -> f64 {
    if x == 0.0 {
        return -PI / 4.0;
    }
    let q = x / 2.0;
    let q4 = q.powi(4);

    // psi(2) = 1 - gamma
    let mut psi = 1.0 - EULER_GAMMA;
    let mut term = q * q; // (x/2)^2 / (1!)^2
    let mut sum = psi * term;
    let mut k = 0u32;
    loop {
        k += 1;
        let m = 2 * k;
        term *= -q4 / (m as f64 * (m + 1) as f64).powi(2);
        psi += 1.0 / m as f64 + 1.0 / (m + 1) as f64;
        let delta = psi * term;
        sum += delta;
        if delta.abs() < 1e-17 * sum.abs().max(1.0) || k > 40 {
            break;
        }
    }

    -q.ln() * bei0(x) - PI / 4.0 * ber0(x) + sum
}

/// kei0 from the asymptotic expansion of K0 along z = x e^{i pi/4}:
/// K0(z) ~ sqrt(pi / 2z) e^{-z} (1 - 1/(8z) + 9/(128 z^2) - 75/(1024 z^3))
fn kei0_asymptotic(x: f64) -> f64 {
    let z = Complex::from_polar(x, PI / 4.0);
    let inv_z = z.recip();

    let mut poly = Complex::new(1.0, 0.0);
    let c1 = inv_z.scale(-1.0 / 8.0);
    let c2 = inv_z.mul(inv_z).scale(9.0 / 128.0);
    let c3 = inv_z.mul(inv_z).mul(inv_z).scale(-75.0 / 1024.0);
    poly = Complex::new(poly.re + c1.re + c2.re + c3.re, poly.im + c1.im + c2.im + c3.im);

    let amplitude = inv_z.scale(PI / 2.0).sqrt();
    let k0 = amplitude.mul(z.scale(-1.0).exp()).mul(poly);
    k0.im
}

/// The Kelvin function kei of order zero.
///
/// Negative arguments are rejected by clamping to zero, matching the
/// radial use (the argument is always a distance over alpha).
pub fn kei0(x: f64) -> f64 {
    if x <= 0.0 {
        -PI / 4.0
    } else if x <= SERIES_CUTOVER {
        kei0_series(x)
    } else {
        kei0_asymptotic(x)
    }
}

/// ker0, the companion real part; exposed for completeness and testing.
pub fn ker0(x: f64) -> f64 {
    if x <= 0.0 {
        return f64::INFINITY;
    }
    if x <= SERIES_CUTOVER {
        let q = x / 2.0;
        let q4 = q.powi(4);
        // psi(1) = -gamma
        let mut psi = -EULER_GAMMA;
        let mut term = 1.0;
        let mut sum = psi;
        let mut k = 0u32;
        loop {
            k += 1;
            let m = 2 * k;
            term *= -q4 / ((m - 1) as f64 * m as f64).powi(2);
            psi += 1.0 / (m - 1) as f64 + 1.0 / m as f64;
            let delta = psi * term;
            sum += delta;
            if delta.abs() < 1e-17 * sum.abs().max(1.0) || k > 40 {
                break;
            }
        }
        -q.ln() * ber0(x) + PI / 4.0 * bei0(x) + sum
    } else {
        let z = Complex::from_polar(x, PI / 4.0);
        let inv_z = z.recip();
        let c1 = inv_z.scale(-1.0 / 8.0);
        let c2 = inv_z.mul(inv_z).scale(9.0 / 128.0);
        let c3 = inv_z.mul(inv_z).mul(inv_z).scale(-75.0 / 1024.0);
        let poly = Complex::new(1.0 + c1.re + c2.re + c3.re, c1.im + c2.im + c3.im);
        let amplitude = inv_z.scale(PI / 2.0).sqrt();
        amplitude.mul(z.scale(-1.0).exp()).mul(poly).re
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    // Reference values from Abramowitz & Stegun, Table 9.12
    #[test]
    fn test_kei0_at_zero() {
        assert!((kei0(0.0) + PI / 4.0).abs() < 1e-15);
        assert!((kei0(-1.0) + PI / 4.0).abs() < 1e-15);
    }

    #[test]
    fn test_ber_bei_small_arguments() {
        assert!((ber0(1.0) - 0.98438).abs() < 1e-4);
        assert!((bei0(1.0) - 0.24957).abs() < 1e-4);
        assert!((ber0(2.0) - 0.75173).abs() < 1e-4);
        assert!((bei0(2.0) - 0.97229).abs() < 1e-4);
    }

    #[test]
    fn test_kei0_table_values() {
        assert!((kei0(1.0) + 0.49499).abs() < 2e-4);
        assert!((kei0(2.0) + 0.20240).abs() < 2e-4);
    }

    #[test]
    fn test_ker0_table_values() {
        assert!((ker0(1.0) - 0.28671).abs() < 2e-4);
        assert!((ker0(2.0) + 0.04166).abs() < 2e-4);
    }

    #[test]
    fn test_decay_at_large_arguments() {
        // kei decays like e^{-x/sqrt(2)}; far field is effectively zero
        assert!(kei0(10.0).abs() < 1e-3);
        assert!(kei0(20.0).abs() < 1e-6);
    }

    #[test]
    fn test_series_asymptotic_agree_at_cutover() {
        let a = kei0_series(SERIES_CUTOVER);
        let b = kei0_asymptotic(SERIES_CUTOVER);
        assert!((a - b).abs() < 5e-6, "series {} vs asymptotic {}", a, b);
    }
}
