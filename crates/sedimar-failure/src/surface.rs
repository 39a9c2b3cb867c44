//! Circular-arc failure-surface geometry on a 1-D profile.

use crate::{MAX_FAILURE_LENGTH, MIN_FAILURE_LENGTH, NO_FAIL_SURFACE};
use sedimar_core::Cube;

/// Minimum relief between the two ends of an arc (m)
const MIN_RISE: f64 = 1e-3;

/// Whether a candidate failure plane stays inside the sediment.
///
/// The ends may touch the surface; every interior column must have the
/// plane strictly below its top and at or above its basement. Arcs that
/// rise rightward are rejected: the flows spawned from a failure only
/// run down-profile.
pub fn plane_is_valid(profile: &Cube, start: usize, len: usize, plane: &[f64]) -> bool {
    if start + len >= profile.n_y() {
        return false;
    }
    if profile.top_height(0, start) < profile.top_height(0, start + len - 1) {
        return false;
    }
    for (k, &h) in plane.iter().enumerate().take(len.saturating_sub(1)).skip(1) {
        if h >= profile.top_height(0, start + k) {
            return false;
        }
        if h < profile.base_height(0, start + k) {
            return false;
        }
    }
    true
}

/// Elevations of the circular arc through the tops of columns `start`
/// and `start + len - 1`, with radius set by the end-to-end rise and
/// run. Returns None for flat, rising, or out-of-sediment arcs.
pub fn circle_surface(profile: &Cube, start: usize, len: usize) -> Option<Vec<f64>> {
    if start + len >= profile.n_y() || len < 2 {
        return None;
    }
    let width = profile.y_res();

    let rise =
        (profile.top_height(0, start) - profile.top_height(0, start + len - 1)).abs();
    let run = (len - 1) as f64 * width;
    if rise < MIN_RISE {
        return None;
    }

    let r = (rise * rise + run * run) / (2.0 * rise);
    let y0 = profile.top_height(0, start + len - 1) + r;
    let x0 = run;

    let mut circle = Vec::with_capacity(len);
    for k in 0..len {
        let x = k as f64 * width;
        circle.push(y0 - (r * r - (x - x0) * (x - x0)).sqrt());
    }

    plane_is_valid(profile, start, len, &circle).then_some(circle)
}

/// For every column, the elevation of the deepest candidate arc passing
/// through it; [`NO_FAIL_SURFACE`] where no arc reaches.
pub fn failure_line(profile: &Cube) -> Vec<f64> {
    let n = profile.n_y();
    let mut line = vec![NO_FAIL_SURFACE; n];

    for start in 0..n {
        for len in MIN_FAILURE_LENGTH..MAX_FAILURE_LENGTH {
            if let Some(circle) = circle_surface(profile, start, len) {
                for (k, &h) in circle.iter().enumerate() {
                    if start + k < n && h < line[start + k] {
                        line[start + k] = h;
                    }
                }
            }
        }
    }

    line
}

#[cfg(test)]
mod tests {
    use super::*;
    use sedimar_core::{Cell, Facies};

    /// A thick wedge: deep sediment shallowing seaward with a steep nose
    fn wedge() -> Cube {
        let mut cube = Cube::new_profile("wedge", 40, 10.0, 0.5);
        for j in 0..40 {
            let col = cube.col_1d_mut(j).unwrap();
            col.set_base_height(-50.0);
            let t = 45.0 - 1.2 * j as f64;
            if t > 0.0 {
                col.add_cell(Cell::with_fractions(
                    t,
                    vec![0.25, 0.25, 0.25, 0.25],
                    0.0,
                    Facies::RIVER,
                ));
            }
        }
        cube.set_sea_level(0.0);
        cube
    }

    #[test]
    fn test_circle_hits_both_ends() {
        let cube = wedge();
        let (start, len) = (2, 12);
        let circle = circle_surface(&cube, start, len).unwrap();
        assert!((circle[0] - cube.top_height(0, start)).abs() < 1e-9);
        assert!((circle[len - 1] - cube.top_height(0, start + len - 1)).abs() < 1e-9);
        // arc dips below the chord in between
        for k in 1..len - 1 {
            assert!(circle[k] < cube.top_height(0, start + k));
        }
    }

    #[test]
    fn test_flat_profile_has_no_arc() {
        let mut cube = Cube::new_profile("flat", 30, 10.0, 0.5);
        for j in 0..30 {
            let col = cube.col_1d_mut(j).unwrap();
            col.set_base_height(-10.0);
            col.add_cell(Cell::with_fractions(
                5.0,
                vec![1.0, 0.0, 0.0, 0.0],
                0.0,
                Facies::RIVER,
            ));
        }
        cube.set_sea_level(0.0);
        assert!(circle_surface(&cube, 2, 10).is_none());
    }

    #[test]
    fn test_rising_arc_rejected() {
        let mut cube = wedge();
        // tilt the basement until the surface rises seaward
        for j in 0..40 {
            let col = cube.col_1d_mut(j).unwrap();
            col.set_base_height(-50.0 + 2.4 * j as f64);
        }
        assert!(cube.top_height(0, 2) < cube.top_height(0, 13));
        assert!(circle_surface(&cube, 2, 12).is_none());
    }

    #[test]
    fn test_failure_line_below_surface() {
        let cube = wedge();
        let line = failure_line(&cube);
        let mut touched = 0;
        for j in 0..cube.n_y() {
            if line[j] < NO_FAIL_SURFACE {
                touched += 1;
                assert!(line[j] <= cube.top_height(0, j) + 1e-9);
                assert!(line[j] >= cube.base_height(0, j) - 1e-9);
            }
        }
        assert!(touched > 10, "failure line should cover the wedge");
    }
}
