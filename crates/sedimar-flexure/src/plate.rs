//! Plate-bending deflection under point and gridded loads.
//!
//! Deflection is positive downward (subsidence). The 2-D point-load
//! response is -P/(2 pi rho_m g alpha^2) kei0(r/alpha); in 1-D it is the
//! damped-oscillator line-load solution. Grid loads superpose point
//! responses; on a uniformly spaced grid the kei0 values repeat along
//! rows and are tabulated once per row offset, and output rows are
//! evaluated in parallel.

use crate::kelvin::kei0;
use crate::{FlexureError, Result};
use rayon::prelude::*;
use sedimar_core::{Grid, G, RHO_MANTLE};
use serde::{Deserialize, Serialize};
use tracing::debug;

/// Poisson's ratio of the lithosphere
pub const POISSON: f64 = 0.25;

/// Loads smaller than this are not worth convolving (Pa)
const MIN_LOAD: f64 = 1e-10;

/// The flexure parameter alpha (m): the characteristic wavelength of the
/// plate's response to a point load.
///
/// `n_dim` is 1 for a line-load profile and 2 for a plate.
pub fn flexure_parameter(eet: f64, youngs_modulus: f64, n_dim: usize) -> f64 {
    let rigidity = youngs_modulus * eet.powi(3) / 12.0 / (1.0 - POISSON * POISSON);
    match n_dim {
        1 => (4.0 * rigidity / (RHO_MANTLE * G)).powf(0.25),
        _ => (rigidity / (RHO_MANTLE * G)).powf(0.25),
    }
}

/// Plate properties for one run of the subsidence engine
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Isostasy {
    /// Effective elastic thickness (m)
    pub eet: f64,

    /// Young's modulus (Pa)
    pub youngs_modulus: f64,

    /// Relaxation time (yr). Read from configuration for compatibility;
    /// the closed-form elastic kernel does not use it.
    pub relaxation_time: f64,
}

impl Isostasy {
    pub fn new(eet: f64, youngs_modulus: f64) -> Result<Self> {
        if eet <= 0.0 {
            return Err(FlexureError::InvalidParameter(format!(
                "effective elastic thickness must be positive, got {eet}"
            )));
        }
        if youngs_modulus <= 0.0 {
            return Err(FlexureError::InvalidParameter(format!(
                "Youngs modulus must be positive, got {youngs_modulus}"
            )));
        }
        Ok(Self {
            eet,
            youngs_modulus,
            relaxation_time: 0.0,
        })
    }

    pub fn alpha(&self, n_dim: usize) -> f64 {
        flexure_parameter(self.eet, self.youngs_modulus, n_dim)
    }

    /// Deflection along a 1-D profile from a line load at `y_load`:
    /// w(r) = q alpha / (2 rho_m g) e^{-r/alpha} (cos r/alpha + sin r/alpha)
    pub fn point_load_1d(&self, deflection: &mut [f64], y: &[f64], load: f64, y_load: f64) {
        if load.abs() <= MIN_LOAD {
            return;
        }
        let alpha = self.alpha(1);
        let c = load * alpha / (2.0 * RHO_MANTLE * G);
        let inv_alpha = 1.0 / alpha;
        for (w, &yj) in deflection.iter_mut().zip(y) {
            let r = (yj - y_load).abs() * inv_alpha;
            *w += c * (-r).exp() * (r.cos() + r.sin());
        }
    }

    /// Deflection of a 2-D plate from a point load at (x0, y0):
    /// w(r) = -P / (2 pi rho_m g alpha^2) kei0(r/alpha)
    pub fn point_load_2d(
        &self,
        deflection: &mut Grid<f64>,
        x: &[f64],
        y: &[f64],
        load: f64,
        x_load: f64,
        y_load: f64,
    ) {
        if load.abs() <= MIN_LOAD {
            return;
        }
        let alpha = self.alpha(2);
        let c = load / (2.0 * std::f64::consts::PI * RHO_MANTLE * G * alpha * alpha);
        let inv_alpha = 1.0 / alpha;
        for i in 0..deflection.n_x() {
            let dx2 = (x[i] - x_load) * (x[i] - x_load);
            for j in 0..deflection.n_y() {
                let dy2 = (y[j] - y_load) * (y[j] - y_load);
                let r = (dx2 + dy2).sqrt() * inv_alpha;
                deflection[(i, j)] += -c * kei0(r);
            }
        }
    }

    /// Half-plane load abutting the right edge of a 1-D profile:
    /// w(r) = q / (2 rho_m g) e^{-r/alpha} cos(r/alpha)
    pub fn half_plane_load(&self, deflection: &mut [f64], y: &[f64], load: f64) -> Result<()> {
        if y.len() < 2 {
            return Err(FlexureError::NotOneDimensional);
        }
        if load.abs() <= MIN_LOAD {
            return Ok(());
        }
        let alpha = self.alpha(1);
        let inv_alpha = 1.0 / alpha;
        let n = y.len();
        // the plane starts half a cell past the last node
        let y_edge = 1.5 * y[n - 1] - 0.5 * y[n - 2];
        let c = load / (2.0 * RHO_MANTLE * G);
        for (w, &yj) in deflection.iter_mut().zip(y) {
            let r = (y_edge - yj) * inv_alpha;
            *w += c * (-r).exp() * r.cos();
        }
        Ok(())
    }

    /// Deflection of the whole grid under a gridded load field (Pa),
    /// accumulating into `deflection` (m of subsidence).
    ///
    /// Rows of the output are independent, so the convolution runs one
    /// rayon task per output row against a shared kei0 table indexed by
    /// row offset.
    pub fn grid_load(
        &self,
        deflection: &mut Grid<f64>,
        load: &Grid<f64>,
        dx: f64,
        dy: f64,
    ) -> Result<()> {
        if deflection.n_x() != load.n_x() || deflection.n_y() != load.n_y() {
            return Err(FlexureError::ShapeMismatch(
                load.n_x(),
                load.n_y(),
                deflection.n_x(),
                deflection.n_y(),
            ));
        }

        let n_x = load.n_x();
        let n_y = load.n_y();

        if n_x == 1 {
            let y: Vec<f64> = (0..n_y).map(|j| j as f64 * dy).collect();
            let row = deflection.row_mut(0);
            for j in 0..n_y {
                let q = load[(0, j)];
                if q.abs() > MIN_LOAD {
                    self.point_load_1d(row, &y, q * dy, y[j]);
                }
            }
            return Ok(());
        }

        let alpha = self.alpha(2);
        let inv_alpha = 1.0 / alpha;
        let inv_c = 1.0 / (2.0 * std::f64::consts::PI * RHO_MANTLE * G * alpha * alpha);

        // kei0 over every (row offset, column offset) pair
        let kei_table: Vec<Vec<f64>> = (0..n_x)
            .map(|d_row| {
                let dx2 = (d_row as f64 * dx) * (d_row as f64 * dx);
                (0..n_y)
                    .map(|k| {
                        let dy2 = (k as f64 * dy) * (k as f64 * dy);
                        kei0((dx2 + dy2).sqrt() * inv_alpha)
                    })
                    .collect()
            })
            .collect();

        debug!(n_x, n_y, alpha, "flexure grid convolution");

        let cell_area = dx * dy;
        deflection
            .as_mut_slice()
            .par_chunks_mut(n_y)
            .enumerate()
            .for_each(|(i_out, w_row)| {
                for i_load in 0..n_x {
                    let d_row = i_out.abs_diff(i_load);
                    let kei_row = &kei_table[d_row];
                    let load_row = load.row(i_load);
                    for (k, &q) in load_row.iter().enumerate() {
                        if q.abs() <= MIN_LOAD {
                            continue;
                        }
                        let c = q * cell_area * inv_c;
                        for (j, w) in w_row.iter_mut().enumerate() {
                            *w += -c * kei_row[j.abs_diff(k)];
                        }
                    }
                }
            });

        Ok(())
    }
}
