//! The per-step avulsion engine.
//!
//! One model update is a run of day-sized sub-steps. Each sub-step may
//! split the weakest leaf (until the mouth target is met), avulses
//! every leaf, retraces hinge-to-mouth paths over the bathymetry, and
//! partitions water and bed load among the mouths.

use crate::walk::{avulse_angle, GaussianDeviate};
use crate::{AvulsionError, Result};
use rand::SeedableRng;
use rand_chacha::ChaCha8Rng;
use sedimar_core::{Cube, Grid, HingePoint, Hydro, River};
use serde::{Deserialize, Serialize};
use tracing::debug;

/// Default RNG seed of the model
pub const DEFAULT_SEED: u64 = 1945;

/// Initial configuration, readable from JSON
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AvulsionConfig {
    /// Grid shape (n_x, n_y)
    pub shape: (usize, usize),

    /// Grid spacing (dx, dy) (m)
    pub spacing: (f64, f64),

    /// Hinge cell of the trunk river
    pub hinge: (usize, usize),

    /// Angle bounds (degrees)
    pub angle_limit: (f64, f64),

    /// Standard deviation of one avulsion step (degrees)
    pub variance: f64,

    /// Bed-load partitioning exponent
    pub bed_load_exponent: f64,

    /// Water-discharge partitioning exponent
    pub water_discharge_exponent: f64,

    /// Target number of river mouths
    pub number_of_river_mouths: usize,

    /// RNG seed; zero selects the default
    #[serde(default)]
    pub seed: u64,
}

impl Default for AvulsionConfig {
    fn default() -> Self {
        Self {
            shape: (30, 40),
            spacing: (1.0, 1.0),
            hinge: (0, 20),
            angle_limit: (60.0, 120.0),
            variance: 10.0,
            bed_load_exponent: 1.0,
            water_discharge_exponent: 1.0,
            number_of_river_mouths: 9,
            seed: DEFAULT_SEED,
        }
    }
}

impl AvulsionConfig {
    pub fn from_json(text: &str) -> Result<Self> {
        serde_json::from_str(text).map_err(|e| AvulsionError::Config(e.to_string()))
    }

    fn validate(&self) -> Result<()> {
        if self.shape.0 == 0 || self.shape.1 == 0 {
            return Err(AvulsionError::InvalidParameter(format!(
                "grid shape must be positive, got {:?}",
                self.shape
            )));
        }
        if self.hinge.0 >= self.shape.0 || self.hinge.1 >= self.shape.1 {
            return Err(AvulsionError::InvalidParameter(format!(
                "hinge {:?} outside grid {:?}",
                self.hinge, self.shape
            )));
        }
        if self.number_of_river_mouths == 0 {
            return Err(AvulsionError::InvalidParameter(
                "number of river mouths must be at least one".into(),
            ));
        }
        if self.variance < 0.0 {
            return Err(AvulsionError::InvalidParameter(format!(
                "random walk variance must be non-negative, got {}",
                self.variance
            )));
        }
        Ok(())
    }
}

/// Per-mouth output of the last update
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct MouthState {
    pub x: Vec<f64>,
    pub y: Vec<f64>,
    pub water_discharge: Vec<f64>,
    pub bed_load: Vec<f64>,
    pub angle: Vec<f64>,
}

/// The avulsion model state
#[derive(Debug)]
pub struct AvulsionEngine {
    cube: Cube,
    pub variance: f64,
    pub bed_load_exponent: f64,
    pub water_discharge_exponent: f64,
    pub total_river_mouths: usize,

    /// Trunk inputs, settable through the driver
    pub init_discharge: f64,
    pub sed_flux: f64,

    mouths: MouthState,

    /// Bed-load flux painted along every traced channel (kg/s per cell)
    bed_load_grid: Grid<f64>,

    /// Angle of the trunk at each sub-step of the last update
    angles: Vec<f64>,
    pub last_angle: f64,

    now: f64,
    time_step: f64,

    rng: ChaCha8Rng,
    gauss: GaussianDeviate,
}

impl AvulsionEngine {
    pub fn new(config: AvulsionConfig) -> Result<Self> {
        config.validate()?;
        let (n_x, n_y) = config.shape;
        let (dx, dy) = config.spacing;

        let mut cube = Cube::new("avulsion", n_x, n_y, dx, dy, 1.0);

        let mut hinge = HingePoint::new(config.hinge.0, config.hinge.1);
        let min = config.angle_limit.0.to_radians();
        let max = config.angle_limit.1.to_radians();
        hinge.std_dev = config.variance.to_radians();
        let mut river = River::new("AvulsionRiver1", Hydro::new(0), hinge);
        {
            let mut leaves = river.leaves_mut();
            leaves[0].set_angle_limit(min, max);
            leaves[0].set_angle(0.5 * (min + max));
            leaves[0].hinge.std_dev = config.variance.to_radians();
            // splitting picks the weakest leaf by discharge; seed the
            // trunk with unit geometry so halving stays meaningful
            leaves[0].hydro.width = 1.0;
            leaves[0].hydro.depth = 1.0;
            leaves[0].hydro.velocity = 1.0;
            leaves[0].hydro.bed_load = 1.0;
        }
        cube.add_trunk(river, 1);

        let seed = if config.seed == 0 {
            DEFAULT_SEED
        } else {
            config.seed
        };

        Ok(Self {
            bed_load_grid: Grid::new(n_x, n_y),
            cube,
            variance: config.variance.to_radians(),
            bed_load_exponent: config.bed_load_exponent,
            water_discharge_exponent: config.water_discharge_exponent,
            total_river_mouths: config.number_of_river_mouths,
            init_discharge: 1.0,
            sed_flux: 1.0,
            mouths: MouthState::default(),
            angles: Vec::new(),
            last_angle: 0.0,
            now: 0.0,
            time_step: 1.0,
            rng: ChaCha8Rng::seed_from_u64(seed),
            gauss: GaussianDeviate::new(),
        })
    }

    pub fn cube(&self) -> &Cube {
        &self.cube
    }

    pub fn cube_mut(&mut self) -> &mut Cube {
        &mut self.cube
    }

    pub fn now(&self) -> f64 {
        self.now
    }

    pub fn time_step(&self) -> f64 {
        self.time_step
    }

    pub fn mouths(&self) -> &MouthState {
        &self.mouths
    }

    /// Trunk angle at each sub-step of the last update (rad)
    pub fn angles(&self) -> &[f64] {
        &self.angles
    }

    pub fn bed_load_grid(&self) -> &Grid<f64> {
        &self.bed_load_grid
    }

    pub fn n_leaves(&self) -> usize {
        self.cube.river(0).map_or(0, River::n_leaves)
    }

    /// Update the per-leaf walk deviation when the variance changes.
    pub fn set_variance(&mut self, variance: f64) {
        self.variance = variance;
        if let Some(river) = self.cube.river_mut(0) {
            for leaf in river.leaves_mut() {
                leaf.hinge.std_dev = variance;
            }
        }
    }

    /// Replace the model bathymetry (elevation, m).
    pub fn set_elevation(&mut self, elevation: &Grid<f64>) -> Result<()> {
        self.cube.set_bathymetry(elevation)?;
        Ok(())
    }

    /// Advance to `until` (days). Sub-steps are day-sized; the tree is
    /// preserved across sub-steps, only angles and mouths move.
    pub fn run_until(&mut self, until: f64) -> Result<()> {
        let len = ((until - self.now) / self.time_step) as usize;
        if len == 0 {
            return Ok(());
        }
        let dt_frac = 1.0 / len as f64;

        self.bed_load_grid.fill(0.0);
        self.angles.clear();
        self.mouths = MouthState::default();

        for _ in 0..len {
            self.sub_step(dt_frac)?;
        }

        self.now = until;
        Ok(())
    }

    fn sub_step(&mut self, dt_frac: f64) -> Result<()> {
        // grow the tree toward the mouth target, one fork per sub-step
        {
            let total = self.total_river_mouths;
            let river = self
                .cube
                .river_mut(0)
                .ok_or_else(|| AvulsionError::InvalidParameter("no trunk river".into()))?;
            if river.n_leaves() < total {
                river.split_weakest_leaf();
            }
        }

        // avulse every leaf, then retrace its mouth
        {
            let Self {
                cube, rng, gauss, ..
            } = self;
            // angles first, against the borrowed tree
            if let Some(river) = cube.river_mut(0) {
                for leaf in river.leaves_mut() {
                    let angle = avulse_angle(&leaf.hinge, gauss, rng);
                    leaf.set_angle(angle);
                }
            }
            // then mouths, against the frozen bathymetry
            let mouths: Vec<(usize, usize)> = match cube.river(0) {
                Some(river) => river
                    .leaves()
                    .iter()
                    .map(|leaf| {
                        let mut probe = (*leaf).clone();
                        cube.find_river_mouth(&mut probe);
                        probe.mouth
                    })
                    .collect(),
                None => Vec::new(),
            };
            if let Some(river) = cube.river_mut(0) {
                for (leaf, mouth) in river.leaves_mut().into_iter().zip(mouths) {
                    leaf.mouth = mouth;
                }
            }
        }

        self.partition(dt_frac)?;

        if let Some(river) = self.cube.river(0) {
            if let Some(first) = river.leaves().first() {
                self.last_angle = first.angle();
                self.angles.push(first.angle());
            }
        }

        Ok(())
    }

    /// Split water and bed load among the current leaves and paint the
    /// traced channels onto the bed-load grid.
    fn partition(&mut self, dt_frac: f64) -> Result<()> {
        let (dx, dy) = (self.cube.x_res(), self.cube.y_res());
        let river = self
            .cube
            .river(0)
            .ok_or_else(|| AvulsionError::InvalidParameter("no trunk river".into()))?;
        let leaves = river.leaves();
        let n = leaves.len();

        // inverse channel length stands in for slope
        let slope: Vec<f64> = leaves
            .iter()
            .map(|leaf| 1.0 / leaf.channel_length(dx, dy))
            .collect();

        let q = split_discharge(&slope, self.water_discharge_exponent, self.init_discharge);
        let qb = split_bed_load(&slope, &q, self.bed_load_exponent, self.sed_flux);

        if self.mouths.x.len() != n {
            self.mouths = MouthState {
                x: vec![0.0; n],
                y: vec![0.0; n],
                water_discharge: vec![0.0; n],
                bed_load: vec![0.0; n],
                angle: vec![0.0; n],
            };
        }

        let mut paths = Vec::with_capacity(n);
        for (k, leaf) in leaves.iter().enumerate() {
            self.mouths.x[k] = leaf.mouth.0 as f64 * dx;
            self.mouths.y[k] = leaf.mouth.1 as f64 * dy;
            self.mouths.water_discharge[k] = q[k];
            self.mouths.bed_load[k] += qb[k] * dt_frac;
            self.mouths.angle[k] = leaf.angle();
            paths.push(self.cube.find_line_path(
                (leaf.hinge.i, leaf.hinge.j),
                leaf.hinge.angle,
            ));
        }

        for (k, path) in paths.iter().enumerate() {
            for &(i, j) in path {
                self.bed_load_grid[(i, j)] += qb[k] * dt_frac;
            }
        }

        debug!(leaves = n, "partitioned discharge");
        Ok(())
    }
}

/// Water to each branch: q_l = Q s_l^n / sum_k s_k^n.
pub fn split_discharge(slope: &[f64], n: f64, q_total: f64) -> Vec<f64> {
    let normalize: f64 = slope.iter().map(|s| s.powf(n)).sum();
    if normalize <= 0.0 {
        return vec![0.0; slope.len()];
    }
    slope
        .iter()
        .map(|s| s.powf(n) * q_total / normalize)
        .collect()
}

/// Bed load to each branch: qb_l proportional to (q_l s_l)^m, rescaled
/// onto the trunk total. All zero when the proportions vanish.
pub fn split_bed_load(slope: &[f64], q: &[f64], m: f64, qb_total: f64) -> Vec<f64> {
    let mut qb: Vec<f64> = slope
        .iter()
        .zip(q)
        .map(|(s, qk)| (qk * s).powf(m))
        .collect();
    let total: f64 = qb.iter().sum();
    if total > 0.0 {
        let scale = qb_total / total;
        for v in &mut qb {
            *v *= scale;
        }
    }
    qb
}
