//! Janbu's simplified method of slices.
//!
//! The factor of safety F satisfies the implicit equation
//!
//! ```text
//! F = f * sum_k( c1_k / (1 + c2_k / F) ) / sum_k( W'_k sin a_k + H_k cos a_k )
//! ```
//!
//! solved with a safeguarded Newton iteration that falls back to
//! bisection whenever the Newton step leaves the bracket or stalls.

use sedimar_core::G;
use serde::{Deserialize, Serialize};

/// Root-finder bracket and tolerance
const FOS_LO: f64 = 0.005;
const FOS_HI: f64 = 200.0;
const FOS_TOL: f64 = 0.01;
const MAX_ITERATIONS: usize = 1000;

/// Janbu shape factor; unity for these arc geometries
const SHAPE_FACTOR: f64 = 1.0;

/// One vertical slice of a candidate failure mass
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct FailSlice {
    /// Earthquake accelerations (fraction of g)
    pub a_vertical: f64,
    pub a_horizontal: f64,

    /// Thickness of sediment between sea floor and failure plane (m)
    pub depth: f64,

    /// Cohesion at the failure plane (Pa)
    pub c: f64,

    /// Excess pore pressure at the failure plane (Pa)
    pub u: f64,

    /// Friction angle at the failure plane (rad)
    pub phi: f64,

    /// Slice width (m)
    pub b: f64,

    /// Submerged weight of the slice per meter of profile width (N/m)
    pub w: f64,

    /// Basal slope of the failure plane (rad)
    pub alpha: f64,
}

/// Evaluate the implicit equation and its derivative at trial factor
/// of safety `x`: returns (g(x), g'(x)) where the root of g is F.
pub fn factor_of_safety_equation(x: f64, slices: &[FailSlice]) -> (f64, f64) {
    let mut numerator = 0.0;
    let mut denominator = 0.0;
    let mut c1 = Vec::with_capacity(slices.len());
    let mut c2 = Vec::with_capacity(slices.len());

    for s in slices {
        // Vertical shaking relieves weight; horizontal shaking drives.
        let effective_weight = s.w - s.a_vertical / G * s.w;
        let horizontal_weight = s.a_horizontal / G * s.w;

        denominator += effective_weight * s.alpha.sin() + horizontal_weight * s.alpha.cos();

        let c1_k = s.b
            * (s.c
                + (effective_weight / s.b - s.u - horizontal_weight * s.alpha.sin())
                    * s.phi.tan())
            / s.alpha.cos();
        let c2_k = s.alpha.tan() * s.phi.tan();
        numerator += c1_k / (1.0 + c2_k / x);
        c1.push(c1_k);
        c2.push(c2_k);
    }

    let fn_val = SHAPE_FACTOR * numerator / denominator - x;

    let mut slope = 0.0;
    for (c1_k, c2_k) in c1.iter().zip(&c2) {
        slope += c1_k * c2_k / (x + c2_k / x).powi(2);
    }
    let dfn_val = SHAPE_FACTOR * slope / denominator - 1.0;

    (fn_val, dfn_val)
}

/// Solve the implicit equation on [0.005, 200]. Returns None when the
/// root is not bracketed or the iteration cap is hit.
pub fn janbu_fos(slices: &[FailSlice]) -> Option<f64> {
    if slices.is_empty() {
        return None;
    }
    rtsafe(|x| factor_of_safety_equation(x, slices), FOS_LO, FOS_HI, FOS_TOL)
}

/// Safeguarded Newton-bisection root finder.
fn rtsafe<F>(mut funcd: F, x1: f64, x2: f64, xacc: f64) -> Option<f64>
where
    F: FnMut(f64) -> (f64, f64),
{
    let (fl, _) = funcd(x1);
    let (fh, _) = funcd(x2);

    if (fl > 0.0 && fh > 0.0) || (fl < 0.0 && fh < 0.0) {
        return None;
    }
    if fl == 0.0 {
        return Some(x1);
    }
    if fh == 0.0 {
        return Some(x2);
    }

    let (mut xl, mut xh) = if fl < 0.0 { (x1, x2) } else { (x2, x1) };

    let mut rts = 0.5 * (x1 + x2);
    let mut dxold = (x2 - x1).abs();
    let mut dx = dxold;
    let (mut f, mut df) = funcd(rts);

    for _ in 0..MAX_ITERATIONS {
        let newton_leaves_bracket =
            ((rts - xh) * df - f) * ((rts - xl) * df - f) >= 0.0;
        if newton_leaves_bracket || (2.0 * f).abs() > (dxold * df).abs() {
            dxold = dx;
            dx = 0.5 * (xh - xl);
            rts = xl + dx;
            if xl == rts {
                return Some(rts);
            }
        } else {
            dxold = dx;
            dx = f / df;
            let temp = rts;
            rts -= dx;
            if temp == rts {
                return Some(rts);
            }
        }
        if dx.abs() < xacc {
            return Some(rts);
        }
        let (f_new, df_new) = funcd(rts);
        f = f_new;
        df = df_new;
        if f < 0.0 {
            xl = rts;
        } else {
            xh = rts;
        }
    }

    None
}
