//! One stratigraphic layer within a column.
//!
//! A cell stores a thickness at the column's vertical resolution, a
//! per-grain mass-fraction vector, an age, a facies bitmask and a pore
//! pressure. Fractions are renormalized after every mutation: they stay
//! in [0, 1] and sum to 1, or the cell is degenerate and gets dropped by
//! its column.

use crate::sediment::GrainSizeClass;
use crate::{GrainClass, Sediment, MIN_CELL_THICKNESS};
use serde::{Deserialize, Serialize};

/// Depositional facies bitmask
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(transparent)]
pub struct Facies(pub u16);

impl Facies {
    pub const NONE: Facies = Facies(0);
    pub const BEDLOAD: Facies = Facies(1 << 0);
    pub const PLUME: Facies = Facies(1 << 1);
    pub const DEBRIS_FLOW: Facies = Facies(1 << 2);
    pub const TURBIDITE: Facies = Facies(1 << 3);
    pub const DIFFUSED: Facies = Facies(1 << 4);
    pub const RIVER: Facies = Facies(1 << 5);
    pub const WAVE: Facies = Facies(1 << 6);
    pub const ALONG_SHORE: Facies = Facies(1 << 7);

    pub fn contains(&self, other: Facies) -> bool {
        self.0 & other.0 == other.0
    }

    pub fn insert(&mut self, other: Facies) {
        self.0 |= other.0;
    }
}

impl std::ops::BitOr for Facies {
    type Output = Facies;
    fn bitor(self, rhs: Facies) -> Facies {
        Facies(self.0 | rhs.0)
    }
}

/// A layer of deposited sediment
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Cell {
    /// Layer thickness (m)
    thickness: f64,

    /// Mass fraction of each grain class, summing to 1
    fraction: Vec<f64>,

    /// Age of deposition (years)
    age: f64,

    /// Depositional facies
    facies: Facies,

    /// Pore pressure (Pa)
    pressure: f64,

    /// Whether this layer was deposited during the run (as opposed to
    /// read in as initial fill)
    deposited: bool,
}

impl Cell {
    /// An empty cell with `n_grains` zeroed fractions
    pub fn new(n_grains: usize) -> Self {
        Self {
            thickness: 0.0,
            fraction: vec![0.0; n_grains],
            age: 0.0,
            facies: Facies::NONE,
            pressure: 0.0,
            deposited: false,
        }
    }

    /// A cell built from per-grain thickness amounts (m of each class)
    pub fn from_amounts(amounts: &[f64], age: f64, facies: Facies) -> Self {
        let thickness: f64 = amounts.iter().sum();
        let mut cell = Self {
            thickness,
            fraction: amounts.to_vec(),
            age,
            facies,
            pressure: 0.0,
            deposited: true,
        };
        cell.renormalize();
        cell
    }

    /// A uniform cell: equal thickness split over a given fraction vector
    pub fn with_fractions(thickness: f64, fraction: Vec<f64>, age: f64, facies: Facies) -> Self {
        let mut cell = Self {
            thickness,
            fraction,
            age,
            facies,
            pressure: 0.0,
            deposited: true,
        };
        cell.renormalize();
        cell
    }

    pub fn thickness(&self) -> f64 {
        self.thickness
    }

    pub fn fraction(&self) -> &[f64] {
        &self.fraction
    }

    pub fn nth_fraction(&self, n: usize) -> f64 {
        self.fraction.get(n).copied().unwrap_or(0.0)
    }

    pub fn n_grains(&self) -> usize {
        self.fraction.len()
    }

    pub fn age(&self) -> f64 {
        self.age
    }

    pub fn set_age(&mut self, age: f64) {
        self.age = age;
    }

    pub fn facies(&self) -> Facies {
        self.facies
    }

    pub fn set_facies(&mut self, facies: Facies) {
        self.facies = facies;
    }

    pub fn pressure(&self) -> f64 {
        self.pressure
    }

    pub fn set_pressure(&mut self, pressure: f64) {
        self.pressure = pressure;
    }

    pub fn is_deposited(&self) -> bool {
        self.deposited
    }

    pub fn set_thickness(&mut self, thickness: f64) {
        self.thickness = thickness.max(0.0);
    }

    /// Clamp fractions to [0, 1] and rescale to unit sum. Returns false
    /// if the sum vanished: the cell is degenerate and should be dropped.
    pub fn renormalize(&mut self) -> bool {
        for f in &mut self.fraction {
            *f = f.clamp(0.0, 1.0);
        }
        let sum: f64 = self.fraction.iter().sum();
        if sum <= 0.0 {
            return false;
        }
        for f in &mut self.fraction {
            *f /= sum;
        }
        true
    }

    /// Excess pore pressure over a hydrostatic reference, floored at zero.
    pub fn excess_pressure(&self, hydrostatic: f64) -> f64 {
        (self.pressure - hydrostatic).max(0.0)
    }

    /// Whether `other` can be merged into this cell without creating a
    /// visible discontinuity: same facies, age within a year, and
    /// fraction vectors within 1e-9 in the L1 norm.
    pub fn merges_with(&self, other: &Cell) -> bool {
        if self.facies != other.facies || (self.age - other.age).abs() > 1.0 {
            return false;
        }
        if self.fraction.len() != other.fraction.len() {
            return false;
        }
        let l1: f64 = self
            .fraction
            .iter()
            .zip(&other.fraction)
            .map(|(a, b)| (a - b).abs())
            .sum();
        l1 <= 1e-9
    }

    /// Fold `other` into this cell, thickness-weighting fractions, age
    /// and pressure.
    pub fn add(&mut self, other: &Cell) {
        let total = self.thickness + other.thickness;
        if total < MIN_CELL_THICKNESS {
            return;
        }
        let (wa, wb) = (self.thickness / total, other.thickness / total);
        for (f, g) in self.fraction.iter_mut().zip(&other.fraction) {
            *f = *f * wa + *g * wb;
        }
        self.age = self.age * wa + other.age * wb;
        self.pressure = self.pressure * wa + other.pressure * wb;
        self.facies.insert(other.facies);
        self.thickness = total;
        self.deposited = self.deposited || other.deposited;
        self.renormalize();
    }

    /// Split off the top `amount` meters as a new cell with the same
    /// composition. The remainder stays in `self`. `amount` is clamped
    /// to the available thickness.
    pub fn separate_top(&mut self, amount: f64) -> Cell {
        let amount = amount.clamp(0.0, self.thickness);
        let mut top = self.clone();
        top.thickness = amount;
        self.thickness -= amount;
        top
    }

    pub fn clear(&mut self) {
        self.thickness = 0.0;
        self.fraction.fill(0.0);
        self.age = 0.0;
        self.facies = Facies::NONE;
        self.pressure = 0.0;
        self.deposited = false;
    }

    /// Saturated bulk density from the class table (kg/m^3)
    pub fn bulk_density(&self, sediment: &Sediment) -> f64 {
        self.weighted(sediment, |c| c.bulk_density)
    }

    /// Mean grain (solid) density (kg/m^3)
    pub fn grain_density(&self, sediment: &Sediment) -> f64 {
        self.weighted(sediment, |c| c.grain_density)
    }

    /// Porosity from the class table
    pub fn porosity(&self, sediment: &Sediment) -> f64 {
        self.weighted(sediment, |c| c.porosity())
    }

    /// Permeability proxy (m^2)
    pub fn permeability(&self, sediment: &Sediment) -> f64 {
        self.weighted(sediment, |c| c.permeability())
    }

    /// Mean grain size (m)
    pub fn grain_size(&self, sediment: &Sediment) -> f64 {
        self.weighted(sediment, |c| c.diameter)
    }

    /// Mean grain size in phi units
    pub fn grain_size_phi(&self, sediment: &Sediment) -> f64 {
        self.weighted(sediment, |c| c.grain_size_phi())
    }

    /// Cohesion (Pa), fraction-weighted over the class table
    pub fn cohesion(&self, sediment: &Sediment) -> f64 {
        self.weighted(sediment, |c| c.cohesion)
    }

    /// Friction angle (degrees), fraction-weighted
    pub fn friction_angle(&self, sediment: &Sediment) -> f64 {
        self.weighted(sediment, |c| c.friction_angle)
    }

    /// Mass per unit area (kg/m^2)
    pub fn mass(&self, sediment: &Sediment) -> f64 {
        self.thickness * self.bulk_density(sediment)
    }

    pub fn sand_fraction(&self, sediment: &Sediment) -> f64 {
        self.class_fraction(sediment, |c| c == GrainSizeClass::Sand)
    }

    pub fn silt_fraction(&self, sediment: &Sediment) -> f64 {
        self.class_fraction(sediment, |c| c == GrainSizeClass::Silt)
    }

    pub fn clay_fraction(&self, sediment: &Sediment) -> f64 {
        self.class_fraction(sediment, |c| c == GrainSizeClass::Clay)
    }

    pub fn mud_fraction(&self, sediment: &Sediment) -> f64 {
        self.class_fraction(sediment, |c| c.is_mud())
    }

    fn class_fraction(&self, sediment: &Sediment, pick: impl Fn(GrainSizeClass) -> bool) -> f64 {
        self.fraction
            .iter()
            .zip(sediment.iter())
            .filter(|(_, class)| pick(class.size_class()))
            .map(|(f, _)| f)
            .sum()
    }

    fn weighted(&self, sediment: &Sediment, prop: impl Fn(&GrainClass) -> f64) -> f64 {
        self.fraction
            .iter()
            .zip(sediment.iter())
            .map(|(f, class)| f * prop(class))
            .sum()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    fn sediment() -> Sediment {
        Sediment::default_classes()
    }

    #[test]
    fn test_fractions_sum_to_one() {
        let cell = Cell::from_amounts(&[0.2, 0.3, 0.4, 0.1], 0.0, Facies::RIVER);
        let sum: f64 = cell.fraction().iter().sum();
        assert!((sum - 1.0).abs() < 1e-12);
        assert!((cell.thickness() - 1.0).abs() < 1e-12);
    }

    #[test]
    fn test_degenerate_cell_detected() {
        let mut cell = Cell::new(3);
        assert!(!cell.renormalize());
    }

    #[test]
    fn test_add_conserves_mass() {
        let sed = sediment();
        let mut a = Cell::from_amounts(&[1.0, 0.0, 0.0, 0.0], 0.0, Facies::BEDLOAD);
        let b = Cell::from_amounts(&[0.0, 1.0, 0.0, 0.0], 0.0, Facies::BEDLOAD);
        let mass_before = a.mass(&sed) + b.mass(&sed);
        a.add(&b);
        assert!((a.mass(&sed) - mass_before).abs() < 1e-9);
        assert_eq!(a.thickness(), 2.0);
        assert!((a.nth_fraction(0) - 0.5).abs() < 1e-12);
    }

    #[test]
    fn test_separate_top() {
        let mut cell = Cell::with_fractions(2.0, vec![0.5, 0.5, 0.0, 0.0], 10.0, Facies::TURBIDITE);
        let top = cell.separate_top(0.5);
        assert!((top.thickness() - 0.5).abs() < 1e-12);
        assert!((cell.thickness() - 1.5).abs() < 1e-12);
        assert_eq!(top.fraction(), cell.fraction());
    }

    #[test]
    fn test_merge_rule() {
        let a = Cell::with_fractions(1.0, vec![0.5, 0.5], 100.0, Facies::RIVER);
        let b = Cell::with_fractions(0.2, vec![0.5, 0.5], 100.5, Facies::RIVER);
        let c = Cell::with_fractions(0.2, vec![0.5, 0.5], 102.0, Facies::RIVER);
        let d = Cell::with_fractions(0.2, vec![0.6, 0.4], 100.0, Facies::RIVER);
        assert!(a.merges_with(&b));
        assert!(!a.merges_with(&c)); // age gap
        assert!(!a.merges_with(&d)); // composition gap
    }

    #[test]
    fn test_taxonomy_fractions() {
        let sed = sediment();
        // default classes: sand, sand, silt, clay
        let cell = Cell::with_fractions(1.0, vec![0.25, 0.25, 0.3, 0.2], 0.0, Facies::NONE);
        assert!((cell.sand_fraction(&sed) - 0.5).abs() < 1e-12);
        assert!((cell.silt_fraction(&sed) - 0.3).abs() < 1e-12);
        assert!((cell.clay_fraction(&sed) - 0.2).abs() < 1e-12);
        assert!((cell.mud_fraction(&sed) - 0.5).abs() < 1e-12);
    }
}
