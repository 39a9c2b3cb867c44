//! Triggering: fail the weakest surface and hand the mass onward.
//!
//! The scan loop keeps firing while the minimum factor of safety sits
//! under the failure threshold. Each triggered surface is carved out of
//! the profile, classified as a debris flow or a turbidity current by
//! its clay content, and returned to the caller for reinjection; the
//! surface itself is then ignored for the rest of the step.

use crate::profile::FailProfile;
use crate::surface::circle_surface;
use crate::{Result, MIN_FACTOR_OF_SAFETY};
use sedimar_core::{Cell, Cube, Sediment, G};
use serde::{Deserialize, Serialize};
use tracing::{debug, info};

/// Cap on failures triggered in one scan
const MAX_FAILURES_PER_STEP: usize = 100;

/// Where a failed mass is routed
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum FlowKind {
    DebrisFlow,
    TurbidityCurrent,
}

/// Murty's landslide-tsunami scaling for a failed mass
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TsunamiParameters {
    /// Wave amplitude (m)
    pub amplitude: f64,

    /// Wavelength (m)
    pub wavelength: f64,

    /// Sea-floor slope under the failure (rad)
    pub slope: f64,

    /// Relief between the failure's ends (m)
    pub relief: f64,

    /// Thickest part of the failed mass (m)
    pub max_thickness: f64,

    /// Characteristic runout length (m)
    pub characteristic_length: f64,

    /// Characteristic time (s)
    pub characteristic_time: f64,
}

/// Compute Murty's tsunami scaling from a failure cube.
pub fn tsunami_parameters(fail: &Cube) -> TsunamiParameters {
    let n = fail.n_y();
    let rise = (fail.water_depth(0, 0) - fail.water_depth(0, n - 1)).abs();
    let b = n as f64 * fail.y_res();
    let theta = (rise / b).atan();
    let w = 0.25 * b;
    let mut d = fail.water_depth(0, n / 2);
    if d < 0.0 {
        debug!("failure depth is less than zero");
        d = 0.0;
    }

    let max_thickness = (0..n)
        .map(|j| fail.thickness(0, j))
        .fold(0.0, f64::max);

    let sin_theta = theta.abs().sin();
    let wavelength = 3.87 * (b * d / sin_theta).sqrt();
    let amplitude = 0.224
        * max_thickness
        * (w / (w + wavelength))
        * (sin_theta.powf(1.29) - 0.746 * sin_theta.powf(2.29) + 0.170 * sin_theta.powf(3.29))
        * (b / d).powf(1.25);

    TsunamiParameters {
        amplitude,
        wavelength,
        slope: theta,
        relief: rise,
        max_thickness,
        characteristic_length: 4.48 * b,
        characteristic_time: 3.87 * (b / (G * sin_theta)).sqrt(),
    }
}

/// Classify a failed mass by its clay content: muddier masses hold
/// together and run as debris flows, the rest disperse into turbidity
/// currents.
pub fn decider(fail: &Cube, sediment: &Sediment, clay_threshold: f64) -> FlowKind {
    let mut bundle: Option<Cell> = None;
    for col in fail.columns() {
        let sample = col.top_sample(col.thickness());
        match bundle.as_mut() {
            Some(b) => b.add(&sample),
            None => bundle = Some(sample),
        }
    }

    let clay = bundle.map_or(0.0, |b| b.clay_fraction(sediment));
    if clay >= clay_threshold {
        FlowKind::DebrisFlow
    } else {
        FlowKind::TurbidityCurrent
    }
}

/// One triggered failure, ready for reinjection as a flow
#[derive(Debug, Clone)]
pub struct TriggeredFailure {
    /// The failed mass, carved off the profile
    pub mass: Cube,

    pub kind: FlowKind,
    pub start: usize,
    pub len: usize,
    pub factor_of_safety: f64,
    pub tsunami: TsunamiParameters,
}

/// Scan the profile and fire every surface under the threshold, worst
/// first, until the profile is stable or the per-step cap is reached.
///
/// The removed masses are returned in firing order; reinjecting each
/// into its flow process is the caller's job.
pub fn run_failures(
    cube: &mut Cube,
    profile: &mut FailProfile,
    sediment: &Sediment,
) -> Result<Vec<TriggeredFailure>> {
    let mut triggered = Vec::new();

    loop {
        profile.update(cube, sediment)?;
        profile.examine(cube)?;

        let fs_min = profile.fs_min_val;
        let start = profile.fs_min_start;
        let len = profile.fs_min_len;

        info!(
            age = cube.age(),
            factor_of_safety = fs_min,
            start,
            len,
            "failure scan"
        );

        if !(fs_min > 0.0 && fs_min < MIN_FACTOR_OF_SAFETY) {
            break;
        }
        let (start, len) = (start as usize, len as usize);

        match carve_failure(cube, start, len) {
            Some(mass) => {
                let tsunami = tsunami_parameters(&mass);
                info!(
                    amplitude = tsunami.amplitude,
                    wavelength = tsunami.wavelength,
                    relief = tsunami.relief,
                    "tsunami parameters"
                );

                let kind = decider(&mass, sediment, profile.consts.clay_fraction);
                cube.remove(&mass)?;

                triggered.push(TriggeredFailure {
                    mass,
                    kind,
                    start,
                    len,
                    factor_of_safety: fs_min,
                    tsunami,
                });
            }
            None => {
                debug!(start, len, "failure surface vanished before firing");
            }
        }

        profile.set_ignore(start, len);

        if triggered.len() >= MAX_FAILURES_PER_STEP {
            break;
        }
    }

    Ok(triggered)
}

/// Carve the sediment above the arc (start, len) into a failure cube.
/// Returns None when the arc no longer exists or holds no sediment.
fn carve_failure(cube: &Cube, start: usize, len: usize) -> Option<Cube> {
    if cube
        .col(0, start)
        .map(|c| c.thickness() < 1e-5)
        .unwrap_or(true)
    {
        return None;
    }
    let heights = circle_surface(cube, start, len)?;
    let fail = cube.copy_above_1d(start, &heights).ok()?;

    // every interior column of the slide must carry sediment
    for j in 1..fail.n_y().saturating_sub(1) {
        if fail.thickness(0, j) < 1e-5 {
            return None;
        }
    }
    Some(fail)
}
