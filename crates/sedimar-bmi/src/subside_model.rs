//! The flexure engine behind the driver surface.

use crate::{copy_into, BmiModel, BmiResult, ReturnCode};
use sedimar_core::Grid;
use sedimar_flexure::Isostasy;
use sedimar_io::SymbolTable;
use std::path::Path;
use tracing::warn;

pub const LOAD: &str = "earth_material_load__pressure";
pub const DEFLECTION: &str = "lithosphere__increment_of_elevation";
pub const EET: &str = "lithosphere__effective_elastic_thickness";
pub const YOUNGS: &str = "lithosphere__youngs_modulus";

const INPUT_VAR_NAMES: &[&str] = &[LOAD, EET, YOUNGS];
const OUTPUT_VAR_NAMES: &[&str] = &[DEFLECTION, EET, YOUNGS];

const KEY_EET: &str = "effective elastic thickness";
const KEY_YOUNGS: &str = "Youngs modulus";
const KEY_RELAXATION: &str = "relaxation time";
const KEY_SHAPE: &str = "grid shape";
const KEY_SPACING: &str = "grid spacing";

/// Driver-facing subsidence state: the plate, the applied load field
/// and the resulting deflection increment.
pub struct SubsideModel {
    isostasy: Isostasy,
    n_x: usize,
    n_y: usize,
    dx: f64,
    dy: f64,

    load: Grid<f64>,
    deflection: Grid<f64>,

    eet: [f64; 1],
    youngs: [f64; 1],

    now: f64,
    time_step: f64,
}

impl SubsideModel {
    /// Build from a KEY : VALUE configuration file, or from defaults
    /// (a 100 x 200 grid of kilometre cells, a 25 km plate).
    pub fn initialize(config_path: Option<&Path>) -> BmiResult<Self> {
        let (eet, youngs, relaxation, shape, spacing) = match config_path {
            Some(path) => {
                let tab = SymbolTable::from_file(path).map_err(|_| ReturnCode::UnableToOpen)?;
                let eet = tab.f64_value(KEY_EET).map_err(|e| {
                    warn!(error = %e, "bad subsidence configuration");
                    ReturnCode::BadArgument
                })?;
                let youngs = tab
                    .f64_value(KEY_YOUNGS)
                    .map_err(|_| ReturnCode::BadArgument)?;
                let relaxation = tab.f64_value(KEY_RELAXATION).unwrap_or(0.0);
                let shape = match tab.f64_array_value(KEY_SHAPE) {
                    Ok(v) if v.len() == 2 => (v[0] as usize, v[1] as usize),
                    _ => (100, 200),
                };
                let spacing = match tab.f64_array_value(KEY_SPACING) {
                    Ok(v) if v.len() == 2 => (v[0], v[1]),
                    _ => (1000.0, 1000.0),
                };
                (eet, youngs, relaxation, shape, spacing)
            }
            None => (25e3, 7e10, 0.0, (100, 200), (1000.0, 1000.0)),
        };

        let mut isostasy = Isostasy::new(eet, youngs).map_err(|e| {
            warn!(error = %e, "bad plate parameters");
            ReturnCode::BadArgument
        })?;
        isostasy.relaxation_time = relaxation;

        Ok(Self {
            eet: [isostasy.eet],
            youngs: [isostasy.youngs_modulus],
            isostasy,
            n_x: shape.0,
            n_y: shape.1,
            dx: spacing.0,
            dy: spacing.1,
            load: Grid::new(shape.0, shape.1),
            deflection: Grid::new(shape.0, shape.1),
            now: 0.0,
            time_step: 1.0,
        })
    }

    pub fn isostasy(&self) -> &Isostasy {
        &self.isostasy
    }

    pub fn deflection(&self) -> &Grid<f64> {
        &self.deflection
    }
}

impl BmiModel for SubsideModel {
    fn component_name(&self) -> &'static str {
        "subside"
    }

    fn input_var_names(&self) -> &'static [&'static str] {
        INPUT_VAR_NAMES
    }

    fn output_var_names(&self) -> &'static [&'static str] {
        OUTPUT_VAR_NAMES
    }

    fn current_time(&self) -> f64 {
        self.now
    }

    fn time_step(&self) -> f64 {
        self.time_step
    }

    fn update(&mut self) -> BmiResult<()> {
        let next = self.now + self.time_step;
        self.update_until(next)
    }

    /// Recompute the deflection of the plate under the current load.
    fn update_until(&mut self, time_days: f64) -> BmiResult<()> {
        self.deflection.fill(0.0);
        self.isostasy
            .grid_load(&mut self.deflection, &self.load, self.dx, self.dy)
            .map_err(|_| ReturnCode::Failure)?;
        self.now = time_days;
        Ok(())
    }

    fn finalize(&mut self) -> BmiResult<()> {
        Ok(())
    }

    fn var_units(&self, name: &str) -> BmiResult<&'static str> {
        match name {
            LOAD => Ok("Pa"),
            DEFLECTION => Ok("m"),
            EET => Ok("m"),
            YOUNGS => Ok("Pa"),
            _ => Err(ReturnCode::BadName),
        }
    }

    fn var_rank(&self, name: &str) -> BmiResult<usize> {
        match name {
            LOAD | DEFLECTION => Ok(2),
            EET | YOUNGS => Ok(0),
            _ => Err(ReturnCode::BadName),
        }
    }

    fn grid_shape(&self, name: &str) -> BmiResult<Vec<usize>> {
        match self.var_rank(name)? {
            2 => Ok(vec![self.n_x, self.n_y]),
            _ => Ok(vec![1]),
        }
    }

    fn grid_spacing(&self, name: &str) -> BmiResult<Vec<f64>> {
        match self.var_rank(name)? {
            2 => Ok(vec![self.dx, self.dy]),
            _ => Ok(vec![0.0]),
        }
    }

    fn get_value(&self, name: &str, dest: &mut [f64]) -> BmiResult<()> {
        let src = self.get_value_ref(name)?;
        copy_into(dest, src)
    }

    fn get_value_ref(&self, name: &str) -> BmiResult<&[f64]> {
        match name {
            LOAD => Ok(self.load.as_slice()),
            DEFLECTION => Ok(self.deflection.as_slice()),
            EET => Ok(&self.eet),
            YOUNGS => Ok(&self.youngs),
            _ => Err(ReturnCode::BadName),
        }
    }

    fn set_value(&mut self, name: &str, src: &[f64]) -> BmiResult<()> {
        match name {
            LOAD => {
                if src.len() != self.load.len() {
                    return Err(ReturnCode::BadArgument);
                }
                self.load.as_mut_slice().copy_from_slice(src);
            }
            EET => {
                let value = *src.first().ok_or(ReturnCode::BadArgument)?;
                if value <= 0.0 {
                    return Err(ReturnCode::BadArgument);
                }
                self.isostasy.eet = value;
                self.eet = [value];
            }
            YOUNGS => {
                let value = *src.first().ok_or(ReturnCode::BadArgument)?;
                if value <= 0.0 {
                    return Err(ReturnCode::BadArgument);
                }
                self.isostasy.youngs_modulus = value;
                self.youngs = [value];
            }
            _ => return Err(ReturnCode::BadName),
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults_and_metadata() {
        let model = SubsideModel::initialize(None).unwrap();
        assert_eq!(model.grid_shape(DEFLECTION).unwrap(), vec![100, 200]);
        assert_eq!(model.var_units(LOAD).unwrap(), "Pa");
        assert!(matches!(
            model.var_rank("sea_surface__temperature"),
            Err(ReturnCode::BadName)
        ));
    }

    #[test]
    fn test_load_deflects_the_plate() {
        let mut model = SubsideModel::initialize(None).unwrap();
        let size = model.grid_size(LOAD).unwrap();
        let mut load = vec![0.0; size];
        // a point load near the middle of the grid
        load[100 * 100 + 50] = 2e7;
        model.set_value(LOAD, &load).unwrap();
        model.update().unwrap();

        let w = model.get_value_ref(DEFLECTION).unwrap();
        let peak = w[100 * 100 + 50];
        assert!(peak > 0.0, "no subsidence under the load");
        // the response decays away from the load
        assert!(w[0].abs() < peak);
        assert_eq!(model.current_time(), 1.0);
    }
}
