//! Grain-size classes and the process-wide sediment registry.
//!
//! A simulation runs against an ordered sequence of grain classes, indexed
//! `0..n_classes`. Class 0 is by convention the bed load; classes 1 and up
//! travel in suspension. The registry is installed once at start-up and is
//! immutable for the rest of the run; every function that needs the class
//! table also accepts a `&Sediment` directly so library users (and tests)
//! can sidestep the global.

use crate::{CoreError, Result, RHO_FRESH_WATER};
use serde::{Deserialize, Serialize};
use std::sync::OnceLock;

/// Sand/silt/clay boundaries (m)
pub const SAND_SILT_BOUNDARY: f64 = 62.5e-6;
pub const SILT_CLAY_BOUNDARY: f64 = 3.9e-6;

/// Size classification of a grain type
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum GrainSizeClass {
    /// > 62.5 um
    Sand,
    /// 3.9 - 62.5 um
    Silt,
    /// < 3.9 um
    Clay,
}

impl GrainSizeClass {
    /// Classify a grain diameter (in meters)
    pub fn from_diameter(d: f64) -> Self {
        if d > SAND_SILT_BOUNDARY {
            Self::Sand
        } else if d >= SILT_CLAY_BOUNDARY {
            Self::Silt
        } else {
            Self::Clay
        }
    }

    pub fn is_mud(&self) -> bool {
        matches!(self, Self::Silt | Self::Clay)
    }
}

/// Physical properties of one grain class
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct GrainClass {
    /// Grain diameter (m)
    pub diameter: f64,

    /// Grain (solid) density (kg/m^3)
    pub grain_density: f64,

    /// Saturated bulk density (kg/m^3)
    pub bulk_density: f64,

    /// Minimum void ratio (closest packing)
    pub void_ratio_min: f64,

    /// Plastic index
    pub plastic_index: f64,

    /// Diffusion coefficient (m^2/s)
    pub diffusion_coefficient: f64,

    /// Removal rate of suspended grains (1/day)
    pub lambda: f64,

    /// Coefficient of consolidation (m^2/yr)
    pub consolidation_coefficient: f64,

    /// Compaction coefficient
    pub compaction_coefficient: f64,

    /// Cohesion (Pa)
    pub cohesion: f64,

    /// Coulomb friction angle (degrees)
    pub friction_angle: f64,
}

impl GrainClass {
    /// Porosity of a saturated deposit of this class, from the density
    /// balance rho_sat = rho_grain (1 - p) + rho_water p.
    pub fn porosity(&self) -> f64 {
        let denom = self.grain_density - RHO_FRESH_WATER;
        if denom > 0.0 {
            ((self.grain_density - self.bulk_density) / denom).clamp(0.0, 1.0)
        } else {
            0.0
        }
    }

    /// Grain size in phi units: phi = -log2(d_mm)
    pub fn grain_size_phi(&self) -> f64 {
        -(self.diameter * 1000.0).log2()
    }

    /// Hydraulic conductivity proxy (m^2), Kozeny-style d^2 scaling
    pub fn permeability(&self) -> f64 {
        let p = self.porosity();
        let denom = (1.0 - p) * (1.0 - p);
        if denom > 0.0 {
            self.diameter * self.diameter * p.powi(3) / (180.0 * denom)
        } else {
            0.0
        }
    }

    pub fn size_class(&self) -> GrainSizeClass {
        GrainSizeClass::from_diameter(self.diameter)
    }
}

/// The ordered table of grain classes for one run
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Sediment {
    classes: Vec<GrainClass>,
}

impl Sediment {
    pub fn new(classes: Vec<GrainClass>) -> Result<Self> {
        if classes.is_empty() {
            return Err(CoreError::EmptySediment);
        }
        Ok(Self { classes })
    }

    /// A workable default: bed-load sand plus three suspended classes.
    pub fn default_classes() -> Self {
        let class = |diameter: f64, bulk: f64, lambda: f64| GrainClass {
            diameter,
            grain_density: 2650.0,
            bulk_density: bulk,
            void_ratio_min: 0.3,
            plastic_index: 0.1,
            diffusion_coefficient: 0.25,
            lambda,
            consolidation_coefficient: 1e-6,
            compaction_coefficient: 3.68e-8,
            cohesion: 100.0,
            friction_angle: 30.0,
        };
        Self {
            classes: vec![
                class(800e-6, 1850.0, 25.0),
                class(150e-6, 1800.0, 16.8),
                class(30e-6, 1700.0, 9.0),
                class(2e-6, 1450.0, 3.5),
            ],
        }
    }

    pub fn len(&self) -> usize {
        self.classes.len()
    }

    pub fn is_empty(&self) -> bool {
        self.classes.is_empty()
    }

    pub fn class(&self, n: usize) -> &GrainClass {
        &self.classes[n]
    }

    pub fn classes(&self) -> &[GrainClass] {
        &self.classes
    }

    pub fn iter(&self) -> impl Iterator<Item = &GrainClass> {
        self.classes.iter()
    }

    /// The bed-load class (index 0)
    pub fn bed_load(&self) -> &GrainClass {
        &self.classes[0]
    }

    /// Number of suspended classes (all but index 0)
    pub fn n_suspended(&self) -> usize {
        self.classes.len().saturating_sub(1)
    }
}

static SEDIMENT_ENV: OnceLock<Sediment> = OnceLock::new();

/// Install the process-wide sediment registry. Fails if already installed.
pub fn install_env(sediment: Sediment) -> Result<()> {
    SEDIMENT_ENV
        .set(sediment)
        .map_err(|_| CoreError::SedimentAlreadySet)
}

/// The process-wide registry, if installed.
pub fn env() -> Option<&'static Sediment> {
    SEDIMENT_ENV.get()
}

/// The process-wide registry, installing the default table on first use.
pub fn env_or_default() -> &'static Sediment {
    SEDIMENT_ENV.get_or_init(Sediment::default_classes)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_size_classification() {
        assert_eq!(GrainSizeClass::from_diameter(200e-6), GrainSizeClass::Sand);
        assert_eq!(GrainSizeClass::from_diameter(30e-6), GrainSizeClass::Silt);
        assert_eq!(GrainSizeClass::from_diameter(1e-6), GrainSizeClass::Clay);
        assert!(GrainSizeClass::from_diameter(1e-6).is_mud());
        assert!(!GrainSizeClass::from_diameter(200e-6).is_mud());
    }

    #[test]
    fn test_porosity_in_range() {
        for class in Sediment::default_classes().iter() {
            let p = class.porosity();
            assert!(p > 0.0 && p < 1.0, "porosity {} out of range", p);
        }
    }

    #[test]
    fn test_phi_units() {
        let sediment = Sediment::default_classes();
        // 2 um clay: phi = -log2(0.002) ~ 8.97
        let phi = sediment.class(3).grain_size_phi();
        assert!(phi > 8.9 && phi < 9.1);
    }

    #[test]
    fn test_empty_rejected() {
        assert!(Sediment::new(Vec::new()).is_err());
    }
}
