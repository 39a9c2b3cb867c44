//! The per-column working set of the failure scan.
//!
//! Each cube column gets a fail-column: per-cell strength parameters
//! sampled once, a cached factor of safety for every arc length
//! starting there, and a dirty flag. Between time steps only columns
//! whose surface moved by more than a decimeter are resampled, and only
//! arcs touching a dirty column are rescored.

use crate::janbu::{janbu_fos, FailSlice};
use crate::surface::{circle_surface, failure_line};
use crate::{
    fos_is_valid, FailureError, Result, FOS_IGNORE, FOS_NOT_VALID, MAX_FAILURE_LENGTH,
    MIN_FAILURE_LENGTH, NO_FAIL_SURFACE,
};
use parking_lot::Mutex;
use rayon::prelude::*;
use sedimar_core::{Cube, Sediment, G, SECONDS_PER_YEAR};
use serde::{Deserialize, Serialize};
use std::f64::consts::PI;
use tracing::debug;

/// Surface change that marks a fail-column dirty (m)
const MIN_DELTA_H: f64 = 0.1;

/// Decomposition angle of the earthquake acceleration
const QUAKE_ANGLE: f64 = PI / 8.0;

/// Number of contiguous scan blocks
const N_BLOCKS: usize = 4;

/// How excess pore pressure at the failure plane is estimated
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum PorePressureMode {
    /// Per-cell pore pressure minus hydrostatic, read off the column
    #[default]
    Local,
    /// Sangrey's deposition-rate polynomial u = W'/m(t)
    Global,
}

/// Physics constants of the failure engine
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct FailureConstants {
    /// Coefficient of consolidation (m^2/s)
    pub consolidation: f64,

    /// Cohesion floor used by the global mode (Pa)
    pub cohesion: f64,

    /// Friction angle used by the global mode (rad)
    pub friction_angle: f64,

    /// Gravity (m/s^2)
    pub gravity: f64,

    /// Density of sea water (kg/m^3)
    pub density_sea_water: f64,

    /// Clay fraction above which a failure runs as a debris flow
    pub clay_fraction: f64,

    pub pore_pressure_mode: PorePressureMode,
}

impl FailureConstants {
    pub fn new(
        consolidation: f64,
        cohesion: f64,
        friction_angle_deg: f64,
        clay_fraction_percent: f64,
    ) -> Result<Self> {
        if consolidation < 0.0 {
            return Err(FailureError::InvalidParameter(format!(
                "coefficient of consolidation must be non-negative, got {consolidation}"
            )));
        }
        if cohesion < 0.0 {
            return Err(FailureError::InvalidParameter(format!(
                "cohesion of sediments must be non-negative, got {cohesion}"
            )));
        }
        if friction_angle_deg < 0.0 {
            return Err(FailureError::InvalidParameter(format!(
                "apparent coulomb friction angle must be non-negative, got {friction_angle_deg}"
            )));
        }
        if !(0.0..=100.0).contains(&clay_fraction_percent) {
            return Err(FailureError::InvalidParameter(format!(
                "fraction of clay for debris flow must be within [0, 100], got {clay_fraction_percent}"
            )));
        }
        Ok(Self {
            consolidation,
            cohesion,
            friction_angle: friction_angle_deg.to_radians(),
            gravity: G,
            density_sea_water: sedimar_core::RHO_SEA_WATER,
            clay_fraction: clay_fraction_percent / 100.0,
            pore_pressure_mode: PorePressureMode::Local,
        })
    }
}

/// Sangrey's slope constant relating excess pore pressure to effective
/// weight: m(t) with t the non-dimensional deposition-time factor.
pub fn sangrey_m(column: &sedimar_core::Column, depth: f64, consolidation: f64) -> f64 {
    if column.thickness() <= 0.0 || column.is_empty() {
        return 1.0;
    }
    let top = column.len() - 1;
    let bottom = column
        .index_at(column.top_height() - depth)
        .unwrap_or(0);

    let age_top = column.nth_cell(top).map_or(0.0, |c| c.age());
    let age_bottom = column.nth_cell(bottom).map_or(0.0, |c| c.age());
    let delta_t = (age_top - age_bottom) * SECONDS_PER_YEAR;
    if delta_t <= 0.0 || consolidation <= 0.0 {
        return 1.0;
    }

    let rate = depth / delta_t;
    let t = rate * rate * delta_t / consolidation;
    if t > 16.0 {
        1.0
    } else {
        6.4 * (1.0 - t / 16.0).powi(17) + 1.0
    }
}

/// Strength parameters for one cube column, sampled down to the local
/// failure line, plus the cached factor of safety per arc length.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct FailColumn {
    /// Elevation of each cell bottom, clamped to the failure line (m)
    pub height: Vec<f64>,

    /// Submerged weight per unit area down to each cell (Pa)
    pub w: Vec<f64>,

    /// Excess pore pressure at each cell (Pa)
    pub u: Vec<f64>,

    /// Cohesion at each cell (Pa)
    pub c: Vec<f64>,

    /// Friction angle at each cell (rad)
    pub phi: Vec<f64>,

    /// Cached factor of safety per arc length starting here
    pub fos: Vec<f64>,

    /// Elevation of the deepest candidate arc through this column (m)
    pub failure_line: f64,

    /// Surface elevation of the column when it was last sampled (m)
    pub sampled_top: f64,

    pub need_update: bool,
}

impl FailColumn {
    fn empty() -> Self {
        Self {
            height: Vec::new(),
            w: Vec::new(),
            u: Vec::new(),
            c: Vec::new(),
            phi: Vec::new(),
            fos: vec![FOS_NOT_VALID; MAX_FAILURE_LENGTH],
            failure_line: NO_FAIL_SURFACE,
            sampled_top: f64::NEG_INFINITY,
            need_update: true,
        }
    }

    pub fn len(&self) -> usize {
        self.height.len()
    }

    pub fn is_empty(&self) -> bool {
        self.height.is_empty()
    }

    /// Resample this fail-column from a cube column, keeping its
    /// allocations. `line` is the local failure-line elevation.
    pub fn reinit(
        &mut self,
        column: &sedimar_core::Column,
        line: f64,
        sediment: &Sediment,
        consts: &FailureConstants,
    ) {
        self.height.clear();
        self.w.clear();
        self.u.clear();
        self.c.clear();
        self.phi.clear();
        self.fos.fill(FOS_NOT_VALID);
        self.failure_line = line;
        self.sampled_top = column.top_height();
        self.need_update = true;

        if line >= NO_FAIL_SURFACE || column.is_empty() {
            return;
        }

        let n_bins = column.cells_above(line);
        if n_bins == 0 {
            return;
        }
        let i_bot = column.len() - n_bins;
        let hydrostatic = column.water_pressure();
        let top_height = column.top_height();

        for k in 0..n_bins {
            let idx = i_bot + k;
            let mut height = column.cell_bottom(idx);
            // a cell cut by the failure plane is sampled at the plane
            if height < line {
                height = line;
            }
            let depth = top_height - height;

            let w = (column.top_density(depth, sediment) - consts.density_sea_water)
                * consts.gravity
                * depth;

            let (c, phi, u) = match consts.pore_pressure_mode {
                PorePressureMode::Local => {
                    let cell = column.nth_cell(idx);
                    let c = cell.map_or(consts.cohesion, |cell| cell.cohesion(sediment));
                    let phi = cell
                        .map_or(consts.friction_angle, |cell| {
                            cell.friction_angle(sediment).to_radians()
                        });
                    let u = cell.map_or(0.0, |cell| cell.excess_pressure(hydrostatic));
                    (c, phi, u)
                }
                PorePressureMode::Global => {
                    let m = sangrey_m(column, depth, consts.consolidation);
                    (consts.cohesion, consts.friction_angle, w / m)
                }
            };

            self.height.push(height);
            self.w.push(w);
            self.u.push(u);
            self.c.push(c);
            self.phi.push(phi);
        }
    }
}

/// Scan state over a 1-D profile
#[derive(Debug)]
pub struct FailProfile {
    columns: Vec<FailColumn>,
    pub consts: FailureConstants,
    pub fs_min_val: f64,
    pub fs_min_start: isize,
    pub fs_min_len: isize,
    /// Columns resampled in the last update
    pub dirty_count: usize,
}

impl FailProfile {
    /// Build the working set for `cube`, sampling every column.
    pub fn new(cube: &Cube, sediment: &Sediment, consts: FailureConstants) -> Result<Self> {
        if !cube.is_1d() {
            return Err(FailureError::NotOneDimensional);
        }
        let mut profile = Self {
            columns: (0..cube.n_y()).map(|_| FailColumn::empty()).collect(),
            consts,
            fs_min_val: NO_FAIL_SURFACE,
            fs_min_start: -1,
            fs_min_len: -1,
            dirty_count: 0,
        };
        profile.resample_all(cube, sediment);
        Ok(profile)
    }

    pub fn len(&self) -> usize {
        self.columns.len()
    }

    pub fn is_empty(&self) -> bool {
        self.columns.is_empty()
    }

    pub fn column(&self, i: usize) -> &FailColumn {
        &self.columns[i]
    }

    fn resample_all(&mut self, cube: &Cube, sediment: &Sediment) {
        let line = failure_line(cube);
        let consts = self.consts.clone();
        self.columns
            .par_iter_mut()
            .enumerate()
            .for_each(|(i, fail_col)| {
                if let Ok(col) = cube.col(0, i) {
                    fail_col.reinit(col, line[i], sediment, &consts);
                }
            });
        self.dirty_count = self.columns.len();
    }

    /// Resample columns whose surface moved, invalidate every arc that
    /// touches one, and recover the cached minimum from the rest.
    pub fn update(&mut self, cube: &Cube, sediment: &Sediment) -> Result<()> {
        if !cube.is_1d() {
            return Err(FailureError::NotOneDimensional);
        }
        let line = failure_line(cube);
        let consts = self.consts.clone();

        let dirty = Mutex::new(0usize);
        self.columns
            .par_iter_mut()
            .enumerate()
            .for_each(|(i, fail_col)| {
                let Ok(col) = cube.col(0, i) else { return };
                let sed_h = col.top_height();
                // columns untouched since the last examine keep their
                // cached scores; their need_update flag is cleared by
                // examine, never here
                if (fail_col.sampled_top - sed_h).abs() > MIN_DELTA_H {
                    fail_col.reinit(col, line[i], sediment, &consts);
                    *dirty.lock() += 1;
                }
            });
        self.dirty_count = dirty.into_inner();

        // invalidate cached scores overlapping a dirty column
        let n = self.columns.len();
        for start in 0..n {
            for len in 0..MAX_FAILURE_LENGTH {
                if start + len < n && self.columns[start + len].need_update {
                    if self.columns[start].fos[len] > FOS_IGNORE {
                        self.columns[start].fos[len] = FOS_NOT_VALID;
                    }
                }
            }
        }

        self.recover_cached_minimum();
        debug!(
            dirty = self.dirty_count,
            total = n,
            "failure profile updated"
        );
        Ok(())
    }

    fn recover_cached_minimum(&mut self) {
        self.fs_min_val = NO_FAIL_SURFACE;
        self.fs_min_start = -1;
        self.fs_min_len = -1;
        for (start, col) in self.columns.iter().enumerate() {
            for (len, &fs) in col.fos.iter().enumerate() {
                if fos_is_valid(fs) && fs < self.fs_min_val {
                    self.fs_min_val = fs;
                    self.fs_min_start = start as isize;
                    self.fs_min_len = len as isize;
                }
            }
        }
    }

    /// Mark one surface as already failed for the rest of this step.
    pub fn set_ignore(&mut self, start: usize, len: usize) {
        if start < self.columns.len() && len < MAX_FAILURE_LENGTH {
            self.columns[start].fos[len] = FOS_IGNORE;
        }
    }

    pub fn is_ignored(&self, start: usize, len: usize) -> bool {
        self.columns[start].fos[len] <= FOS_IGNORE
    }

    /// Janbu slice parameters for the arc (start, len) over `heights`.
    pub fn janbu_parameters(
        &self,
        cube: &Cube,
        start: usize,
        heights: &[f64],
    ) -> Option<Vec<FailSlice>> {
        let len = heights.len();
        let quake = cube.quake();
        let width = cube.y_res();

        let mut depth = Vec::with_capacity(len);
        for (k, &h) in heights.iter().enumerate() {
            let col = &self.columns[start + k];
            if col.is_empty() {
                return None;
            }
            if h > cube.top_height(0, start + k) {
                return None;
            }
            depth.push(h.max(cube.base_height(0, start + k)));
        }

        let mut slices = Vec::with_capacity(len);
        for k in 0..len {
            let col = &self.columns[start + k];
            let n_bins = col.len();

            let mut ind = 0;
            while ind < n_bins && col.height[ind] < depth[k] {
                ind += 1;
            }
            if ind >= n_bins {
                ind = n_bins - 1;
            }

            let alpha = if k == len - 1 {
                ((depth[k] - depth[k - 1]) / width).atan().abs()
            } else {
                ((depth[k + 1] - depth[k]) / width).atan().abs()
            };

            let w = col.w[ind] * width;
            let mut u = col.u[ind];
            if u > 0.9 * w / width {
                u = 0.9 * w / width;
            }

            slices.push(FailSlice {
                a_vertical: quake * QUAKE_ANGLE.cos(),
                a_horizontal: quake * QUAKE_ANGLE.sin(),
                depth: cube.top_height(0, start + k) - depth[k],
                c: col.c[ind],
                u,
                phi: col.phi[ind],
                b: width,
                w,
                alpha,
            });
        }

        Some(slices)
    }

    /// Factor of safety of one surface, from the cache when every
    /// column under it is clean.
    pub fn surface_fos(&self, cube: &Cube, start: usize, len: usize) -> f64 {
        let clean = (0..len).all(|k| {
            start + k < self.columns.len() && !self.columns[start + k].need_update
        });
        if clean {
            return self.columns[start].fos[len];
        }

        match circle_surface(cube, start, len) {
            Some(heights) => match self.janbu_parameters(cube, start, &heights) {
                Some(slices) => janbu_fos(&slices).unwrap_or(FOS_NOT_VALID),
                None => FOS_NOT_VALID,
            },
            None => FOS_NOT_VALID,
        }
    }

    /// Score every surface seaward of the river mouth and track the
    /// global minimum. Columns are cut into contiguous blocks scanned
    /// in parallel; each block keeps a local minimum and folds it into
    /// the shared one under a single lock.
    pub fn examine(&mut self, cube: &Cube) -> Result<()> {
        if !cube.is_1d() {
            return Err(FailureError::NotOneDimensional);
        }
        let n = self.columns.len();
        let river_mouth = cube.river_mouth_1d().saturating_sub(3);
        if river_mouth >= n {
            return Ok(());
        }

        let global_min = Mutex::new((NO_FAIL_SURFACE, -1isize, -1isize));

        let scan_len = n - river_mouth;
        let block_size = scan_len.div_ceil(N_BLOCKS);

        // Scores are computed against the frozen profile, then written
        // back serially; blocks only ever write their own start columns.
        let profile = &*self;
        let block_results: Vec<Vec<(usize, usize, f64)>> = (0..N_BLOCKS)
            .into_par_iter()
            .map(|b| {
                let lo = river_mouth + b * block_size;
                let hi = (lo + block_size).min(n);
                let mut scores = Vec::new();
                let mut local_min = (NO_FAIL_SURFACE, -1isize, -1isize);

                for start in lo..hi {
                    for len in MIN_FAILURE_LENGTH..MAX_FAILURE_LENGTH {
                        if start + len >= n {
                            break;
                        }
                        if profile.is_ignored(start, len) {
                            continue;
                        }
                        let fs = profile.surface_fos(cube, start, len);
                        scores.push((start, len, fs));
                        if fos_is_valid(fs) && fs < local_min.0 {
                            local_min = (fs, start as isize, len as isize);
                        }
                    }
                }

                if fos_is_valid(local_min.0) {
                    let mut global = global_min.lock();
                    if local_min.0 < global.0 {
                        *global = local_min;
                    }
                }
                scores
            })
            .collect();

        for scores in block_results {
            for (start, len, fs) in scores {
                self.columns[start].fos[len] = fs;
            }
        }

        let (fs, start, len) = global_min.into_inner();
        if fos_is_valid(fs) && fs < self.fs_min_val {
            self.fs_min_val = fs;
            self.fs_min_start = start;
            self.fs_min_len = len;
        }

        for col in &mut self.columns {
            col.need_update = false;
        }

        Ok(())
    }

    /// Forget every cached score and minimum.
    pub fn reset(&mut self) {
        self.fs_min_val = NO_FAIL_SURFACE;
        self.fs_min_start = -1;
        self.fs_min_len = -1;
        for col in &mut self.columns {
            col.fos.fill(FOS_NOT_VALID);
            col.need_update = true;
        }
    }
}
