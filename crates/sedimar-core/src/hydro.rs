//! River hydrograph records.
//!
//! A `Hydro` bundle describes the flow at a river mouth for one flood
//! event: channel geometry, velocity, bed-load flux and the suspended
//! concentration of each grain class above the bed-load class.

use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Hydro {
    /// Event duration (days)
    pub duration: f64,

    /// Channel width (m)
    pub width: f64,

    /// Channel depth (m)
    pub depth: f64,

    /// Flow velocity (m/s)
    pub velocity: f64,

    /// Bed-load mass flux (kg/s)
    pub bed_load: f64,

    /// Suspended concentration of each suspended class (kg/m^3)
    pub concentration: Vec<f64>,
}

impl Hydro {
    pub fn new(n_suspended: usize) -> Self {
        Self {
            duration: 1.0,
            width: 0.0,
            depth: 0.0,
            velocity: 0.0,
            bed_load: 0.0,
            concentration: vec![0.0; n_suspended],
        }
    }

    /// Volume discharge of water (m^3/s)
    pub fn water_flux(&self) -> f64 {
        self.width * self.depth * self.velocity
    }

    /// Mass flux of suspended sediment (kg/s)
    pub fn suspended_flux(&self) -> f64 {
        self.water_flux() * self.concentration.iter().sum::<f64>()
    }

    /// Total sediment mass flux, bed load included (kg/s)
    pub fn total_load(&self) -> f64 {
        self.bed_load + self.suspended_flux()
    }

    /// Density of the sediment-laden flow (kg/m^3), given the density of
    /// the carrier water and the grain density of each suspended class.
    pub fn flow_density(&self, rho_water: f64, grain_density: &[f64]) -> f64 {
        let mut rho = rho_water;
        for (c, rho_g) in self.concentration.iter().zip(grain_density) {
            if *rho_g > 0.0 {
                rho += c * (1.0 - rho_water / rho_g);
            }
        }
        rho
    }

    /// Scale the event's sediment content by `f`, water untouched.
    pub fn adjust_mass(&mut self, f: f64) {
        self.bed_load *= f;
        for c in &mut self.concentration {
            *c *= f;
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_fluxes() {
        let hydro = Hydro {
            duration: 1.0,
            width: 100.0,
            depth: 2.0,
            velocity: 1.0,
            bed_load: 10.0,
            concentration: vec![0.1, 0.05],
        };
        assert!((hydro.water_flux() - 200.0).abs() < 1e-12);
        assert!((hydro.suspended_flux() - 30.0).abs() < 1e-12);
        assert!((hydro.total_load() - 40.0).abs() < 1e-12);
    }

    #[test]
    fn test_flow_density_exceeds_water() {
        let hydro = Hydro {
            duration: 1.0,
            width: 100.0,
            depth: 2.0,
            velocity: 1.0,
            bed_load: 0.0,
            concentration: vec![5.0],
        };
        let rho = hydro.flow_density(1000.0, &[2650.0]);
        assert!(rho > 1000.0 && rho < 1010.0);
    }
}
