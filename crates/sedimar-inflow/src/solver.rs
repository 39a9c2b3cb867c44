//! The one-pass marching scheme.
//!
//! Forward Euler on x with the previous node as the base state. At each
//! node the flow entrains seawater by its Richardson number, loses
//! momentum to drag and internal friction, erodes the bed when the
//! basal shear beats the substrate strength, and drops each grain class
//! at a rate set by its removal constant and the critical velocity of
//! the coarsest grain in the flow.

use crate::{InflowError, Result};
use sedimar_core::{Sediment, G, SECONDS_PER_DAY};
use serde::{Deserialize, Serialize};
use tracing::{debug, warn};

/// Velocity below which the flow is treated as drifting (m/s)
const DRIFT_VELOCITY: f64 = 0.01;

/// Maximum magnitude of the bed slope fed to the solver (rad)
const MAX_SLOPE: f64 = 0.2;

/// Model constants for one run
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct InflowConstants {
    /// Entrainment constants of the Richardson-number law
    pub ea: f64,
    pub eb: f64,

    /// Shear-strength intercept and rate of the erosion law (Pa)
    pub sua: f64,
    pub sub: f64,

    /// Drag coefficient
    pub cd: f64,

    /// Internal friction angle (degrees)
    pub internal_friction_angle: f64,

    /// Kinematic viscosity of the carrier water (m^2/s)
    pub mu: f64,

    /// Density of sea water (kg/m^3)
    pub rho_sea_water: f64,

    /// Density of river water (kg/m^3)
    pub rho_river_water: f64,
}

impl Default for InflowConstants {
    fn default() -> Self {
        Self {
            ea: 0.00153,
            eb: 0.00204,
            sua: 30.0,
            sub: 0.2,
            cd: 0.004,
            internal_friction_angle: 32.0,
            mu: 1.3e-6,
            rho_sea_water: 1028.0,
            rho_river_water: 1000.0,
        }
    }
}

/// The 1-D profile the flow runs down. Nodes are equally spaced.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct BathymetryLine {
    /// Along-flow position of each node (m)
    pub x: Vec<f64>,

    /// Sea-floor slope at each node (rad); negative dips downward
    pub slope: Vec<f64>,

    /// Flow width at each node (m)
    pub width: Vec<f64>,

    /// Node spacing (m)
    pub dx: f64,

    /// Distance from the mouth with deposition suppressed (m). Carried
    /// for interface compatibility; the marching loop does not apply it.
    pub x_dep: f64,
}

impl BathymetryLine {
    pub fn len(&self) -> usize {
        self.x.len()
    }

    pub fn is_empty(&self) -> bool {
        self.x.is_empty()
    }
}

/// The flood packet released at the river mouth
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct FloodPacket {
    /// Duration of this release (s)
    pub duration: f64,

    /// Mouth width (m), depth (m) and velocity (m/s)
    pub width: f64,
    pub depth: f64,
    pub velocity: f64,

    /// Volume discharge (m^3/s)
    pub discharge: f64,

    /// Fraction of each grain class in the flow (sums to 1)
    pub fraction: Vec<f64>,

    /// Density of the river water alone (kg/m^3)
    pub rho_river_water: f64,

    /// Density of the sediment-laden flow (kg/m^3)
    pub rho_flow: f64,
}

/// Per-class solver inputs derived from the grain-class table
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct InflowSediment {
    /// Equivalent (flocculated) grain diameter (m)
    pub diameter: Vec<f64>,

    /// Removal rate (1/s)
    pub lambda: Vec<f64>,

    /// Saturated bulk density of the deposit (kg/m^3)
    pub rho_sed: Vec<f64>,

    /// Grain density (kg/m^3)
    pub rho_grain: Vec<f64>,
}

impl InflowSediment {
    /// Grains settling through sea water flocculate and fall as if they
    /// were coarser; the equivalent diameter is a*d^b.
    pub fn equivalent_diameter(real_diameter: f64) -> f64 {
        let (a, b) = (39.8e-3, 0.6);
        a * real_diameter.powf(b)
    }

    /// Build solver inputs from the grain-class registry.
    pub fn from_registry(sediment: &Sediment) -> Self {
        Self {
            diameter: sediment
                .iter()
                .map(|c| Self::equivalent_diameter(c.diameter))
                .collect(),
            lambda: sediment
                .iter()
                .map(|c| c.lambda / SECONDS_PER_DAY)
                .collect(),
            rho_sed: sediment.iter().map(|c| c.bulk_density).collect(),
            rho_grain: sediment.iter().map(|c| c.grain_density).collect(),
        }
    }

    pub fn n_grains(&self) -> usize {
        self.diameter.len()
    }
}

/// A bed query from the solver: how much of the top `erode_depth`
/// meters at `x` is available, and what is it made of. The callee
/// writes the realised depth back into `erode_depth` and the grain
/// distribution into `fraction`.
#[derive(Debug, Clone)]
pub struct PheQuery {
    pub x: f64,
    pub dx: f64,
    pub erode_depth: f64,
    pub fraction: Vec<f64>,
}

/// Deposit/erosion rates and the mass ledger of one flow
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct InflowResult {
    /// Deposited thickness per class per node (m), already at the
    /// deposit's porosity
    pub deposit: Vec<Vec<f64>>,

    /// Eroded thickness per class per node (m of bottom sediment)
    pub erosion: Vec<Vec<f64>>,

    /// Sediment mass entering the flow over its duration (kg/m of width)
    pub mass_in: f64,

    /// Mass deposited (kg/m)
    pub mass_deposited: f64,

    /// Mass eroded from the bed (kg/m)
    pub mass_eroded: f64,

    /// Velocity at the last node reached (m/s)
    pub final_velocity: f64,

    /// Nodes the flow actually covered
    pub nodes_run: usize,
}

/// March a flood packet down the profile.
///
/// `get_phe` is consulted once per node for the composition of the bed;
/// it receives the requested erosion depth and must write back what is
/// actually available.
pub fn inflow<F>(
    day: f64,
    bathy: &BathymetryLine,
    flood: &FloodPacket,
    sediment: &InflowSediment,
    consts: &InflowConstants,
    mut get_phe: F,
) -> Result<InflowResult>
where
    F: FnMut(&mut PheQuery),
{
    let n_nodes = bathy.len();
    if n_nodes < 2 {
        return Err(InflowError::ProfileTooShort(n_nodes));
    }
    let n_grains = sediment.n_grains();
    if flood.fraction.len() != n_grains {
        return Err(InflowError::InvalidParameter(format!(
            "flood carries {} grain fractions, registry has {} classes",
            flood.fraction.len(),
            n_grains
        )));
    }

    let dx = bathy.dx;
    let tan_phi = consts.internal_friction_angle.to_radians().tan();
    let denominator_exponent = std::f64::consts::E - 1.0;

    // Initial conditions at the mouth.
    let mut gz_f = flood.fraction.clone();
    let mut u0 = flood.velocity;
    let mut q0 = flood.discharge;
    let mut rho0 = flood.rho_river_water;
    let mut rho_f0 = flood.rho_flow;
    let mut rho_s0 = weighted_avg(&gz_f, &sediment.rho_grain);
    let mut conc0 = (rho_f0 - rho0) / (rho_s0 - rho0);
    let mut j0 = q0 * conc0;

    let mut j_grain0: Vec<f64> = gz_f.iter().map(|f| f * conc0 * q0).collect();
    let mut j_grain = vec![0.0; n_grains];
    let mut f_dep = vec![0.0; n_grains];
    let mut f_ero = vec![0.0; n_grains];

    let mass_in: f64 = j_grain0
        .iter()
        .zip(&sediment.rho_grain)
        .map(|(j, rho)| j * rho)
        .sum::<f64>()
        * day;

    let mut result = InflowResult {
        deposit: vec![vec![0.0; n_nodes]; n_grains],
        erosion: vec![vec![0.0; n_nodes]; n_grains],
        mass_in,
        mass_deposited: 0.0,
        mass_eroded: 0.0,
        final_velocity: u0,
        nodes_run: 0,
    };

    let mut query = PheQuery {
        x: 0.0,
        dx,
        erode_depth: 0.0,
        fraction: vec![0.0; n_grains],
    };

    let mut depth = 0.0;
    let mut max_depth = 0.0;

    for i in 0..n_nodes {
        let width = bathy.width[i];
        let beta = (-bathy.slope[i]).clamp(-MAX_SLOPE, MAX_SLOPE);
        let sine_beta = beta.sin();
        let cos_beta = beta.cos();

        // Richardson number of the flow.
        let g0 = G * (rho_s0 - rho0) / rho0;
        let ri = g0 * cos_beta * j0 / (u0 * u0 * u0 * width);

        // Entrainment coefficient.
        let e = if sine_beta > 0.01 {
            consts.ea / (consts.eb + ri)
        } else if sine_beta > 0.0 {
            0.072 * sine_beta
        } else {
            0.0
        };

        // Gravity forcing, damped once the flow has passed its deepest
        // point so it does not reaccelerate on the far side.
        let mut a1 = g0 * j0 * sine_beta / u0 / q0;
        depth += sine_beta;
        if depth > max_depth {
            max_depth = depth;
        } else if depth < max_depth {
            a1 *= 0.05;
        }

        // Drag against the bed and the ambient water.
        let a2 = -(e + consts.cd) * u0 * u0 * width / q0;

        // Internal friction.
        let gamma = tan_phi * ((j0 / q0).exp() - 1.0) / denominator_exponent;
        let a3 = -0.1 * g0 * j0 * cos_beta * gamma / u0 / q0;

        let mut u = u0 + (a1 + a2 + a3) * dx;
        if u <= 0.0 {
            warn!(node = i, u, "turbidity flow velocity dropped below zero");
            return Err(InflowError::NegativeVelocity(u, i));
        }
        if u < DRIFT_VELOCITY {
            u = DRIFT_VELOCITY;
        }

        // New volume discharge and fluid density after entraining
        // seawater.
        let q = q0 + e * u * width * dx;
        let rho = rho0 + e * u * width * (consts.rho_sea_water - rho0) / q0 * dx;

        // Depth of erosion over a day of flow (m/day).
        let shear = consts.cd * rho_f0 * u0 * u0;
        let mut erosion = ((shear - consts.sub) / consts.sua).max(0.0);

        query.x = bathy.x[i];
        query.erode_depth = erosion;
        get_phe(&mut query);
        erosion = query.erode_depth;

        // Critical velocity for deposition, from the settling velocity
        // of the coarsest grain at the flow's effective viscosity.
        let max_grain_dia = sediment.diameter.iter().cloned().fold(0.0, f64::max);
        let mu_effective = consts.mu * (1.0 + 2.5 * conc0);
        let max_ws = g0 / 18.0 * max_grain_dia * max_grain_dia / mu_effective;
        let u_critical = max_ws / consts.cd.sqrt();

        for n in 0..n_grains {
            // Rate of erosion (m^2/s).
            f_ero[n] = erosion * query.fraction[n] / SECONDS_PER_DAY * width;

            // Deposition rate (m^2/s). The removal rates are calibrated
            // against plume data, hence the division by ten.
            f_dep[n] = if u >= u_critical {
                0.0
            } else {
                -sediment.lambda[n] * j_grain0[n] / u * (1.0 - (u / u_critical).powi(2)) / 10.0
            };

            j_grain[n] = j_grain0[n] + (f_dep[n] + f_ero[n]) * dx;

            // Deposit thickness at the deposit porosity; eroded thickness
            // is already in meters of bottom sediment.
            result.deposit[n][i] =
                -f_dep[n] * sediment.rho_grain[n] / sediment.rho_sed[n] * day / width;
            result.erosion[n][i] = f_ero[n] * day / width;

            result.mass_deposited += -f_dep[n] * sediment.rho_grain[n] * dx * day;
            result.mass_eroded += f_ero[n] * sediment.rho_grain[n] * dx * day;
        }

        // New grain-size make-up of the flow.
        let j: f64 = j_grain.iter().sum();
        if j <= 0.0 {
            debug!(node = i, "flow exhausted its suspended load");
            result.final_velocity = u;
            result.nodes_run = i + 1;
            return Ok(result);
        }
        for n in 0..n_grains {
            gz_f[n] = j_grain[n] / j;
        }

        let rho_s = weighted_avg(&gz_f, &sediment.rho_grain);
        let conc: f64 = j_grain.iter().map(|jn| jn / q).sum();
        let rho_f = conc * (rho_s - rho) + rho;

        rho0 = rho;
        rho_s0 = rho_s;
        rho_f0 = rho_f;
        u0 = u;
        q0 = q;
        j0 = j;
        conc0 = conc;
        j_grain0.copy_from_slice(&j_grain);

        result.final_velocity = u;
        result.nodes_run = i + 1;
    }

    debug!(
        mass_in = result.mass_in,
        mass_deposited = result.mass_deposited,
        mass_eroded = result.mass_eroded,
        "turbidity flow finished"
    );

    Ok(result)
}

fn weighted_avg(weights: &[f64], values: &[f64]) -> f64 {
    weights.iter().zip(values).map(|(w, v)| w * v).sum()
}
