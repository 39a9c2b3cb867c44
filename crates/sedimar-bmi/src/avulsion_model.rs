//! The avulsion engine behind the driver surface.

use crate::{copy_into, BmiModel, BmiResult, ReturnCode};
use sedimar_avulsion::{AvulsionConfig, AvulsionEngine};
use sedimar_core::Grid;
use std::path::Path;
use tracing::warn;

pub const VARIANCE: &str = "avulsion_model__random_walk_variance_constant";
pub const BED_LOAD_EXPONENT: &str = "avulsion_model__sediment_bed_load_exponent";
pub const DISCHARGE_EXPONENT: &str = "avulsion_model__water_discharge_exponent";
pub const INFLOW_DISCHARGE: &str = "channel_inflow_end_water__discharge";
pub const INFLOW_BED_LOAD: &str = "channel_inflow_end_bed_load_sediment__mass_flow_rate";
pub const OUTFLOW_BED_LOAD: &str = "channel_outflow_end_bed_load_sediment__mass_flow_rate";
pub const OUTFLOW_DISCHARGE: &str = "channel_outflow_end_water__discharge";
pub const OUTFLOW_X: &str = "channel_outflow_end__location_model_x_component";
pub const OUTFLOW_Y: &str = "channel_outflow_end__location_model_y_component";
pub const OUTFLOW_ANGLE: &str = "channel_inflow_end_to_channel_outflow_end__angle";
pub const SURFACE_ELEVATION: &str = "surface__elevation";
pub const SURFACE_BED_LOAD: &str = "surface_bed_load_sediment__mass_flow_rate";

const INPUT_VAR_NAMES: &[&str] = &[
    VARIANCE,
    BED_LOAD_EXPONENT,
    DISCHARGE_EXPONENT,
    INFLOW_DISCHARGE,
    INFLOW_BED_LOAD,
    SURFACE_ELEVATION,
];

const OUTPUT_VAR_NAMES: &[&str] = &[
    VARIANCE,
    BED_LOAD_EXPONENT,
    DISCHARGE_EXPONENT,
    INFLOW_DISCHARGE,
    INFLOW_BED_LOAD,
    OUTFLOW_BED_LOAD,
    OUTFLOW_DISCHARGE,
    OUTFLOW_X,
    OUTFLOW_Y,
    OUTFLOW_ANGLE,
    SURFACE_ELEVATION,
    SURFACE_BED_LOAD,
];

/// Driver-facing avulsion state: the engine plus flat, stable buffers
/// for every exchange item.
pub struct AvulsionModel {
    engine: AvulsionEngine,

    // scalar mirrors, borrowable as one-element slices
    variance: [f64; 1],
    bed_load_exponent: [f64; 1],
    discharge_exponent: [f64; 1],
    inflow_discharge: [f64; 1],
    inflow_bed_load: [f64; 1],

    // per-mouth vectors, padded to the mouth target
    mouth_qb: Vec<f64>,
    mouth_q: Vec<f64>,
    mouth_x: Vec<f64>,
    mouth_y: Vec<f64>,
    mouth_angle: Vec<f64>,

    // map grids, row-major
    elevation: Vec<f64>,
    bed_load: Vec<f64>,
}

impl AvulsionModel {
    /// Build from a JSON configuration file, or from defaults.
    pub fn initialize(config_path: Option<&Path>) -> BmiResult<Self> {
        let config = match config_path {
            Some(path) => {
                let text =
                    std::fs::read_to_string(path).map_err(|_| ReturnCode::UnableToOpen)?;
                AvulsionConfig::from_json(&text).map_err(|e| {
                    warn!(error = %e, "bad avulsion configuration");
                    ReturnCode::BadArgument
                })?
            }
            None => AvulsionConfig::default(),
        };
        let n_mouths = config.number_of_river_mouths;
        let engine = AvulsionEngine::new(config).map_err(|_| ReturnCode::BadArgument)?;
        let size = engine.cube().size();

        let mut model = Self {
            variance: [engine.variance],
            bed_load_exponent: [engine.bed_load_exponent],
            discharge_exponent: [engine.water_discharge_exponent],
            inflow_discharge: [engine.init_discharge],
            inflow_bed_load: [engine.sed_flux],
            mouth_qb: vec![0.0; n_mouths],
            mouth_q: vec![0.0; n_mouths],
            mouth_x: vec![0.0; n_mouths],
            mouth_y: vec![0.0; n_mouths],
            mouth_angle: vec![0.0; n_mouths],
            elevation: vec![0.0; size],
            bed_load: vec![0.0; size],
            engine,
        };
        model.refresh_buffers();
        Ok(model)
    }

    pub fn engine(&self) -> &AvulsionEngine {
        &self.engine
    }

    fn n_mouths(&self) -> usize {
        self.mouth_qb.len()
    }

    fn refresh_buffers(&mut self) {
        let mouths = self.engine.mouths();
        for k in 0..self.n_mouths() {
            self.mouth_qb[k] = mouths.bed_load.get(k).copied().unwrap_or(0.0);
            self.mouth_q[k] = mouths.water_discharge.get(k).copied().unwrap_or(0.0);
            self.mouth_x[k] = mouths.x.get(k).copied().unwrap_or(0.0);
            self.mouth_y[k] = mouths.y.get(k).copied().unwrap_or(0.0);
            self.mouth_angle[k] = mouths.angle.get(k).copied().unwrap_or(0.0);
        }

        let elevation = self.engine.cube().elevation_grid();
        self.elevation.copy_from_slice(elevation.as_slice());
        self.bed_load
            .copy_from_slice(self.engine.bed_load_grid().as_slice());

        self.variance = [self.engine.variance];
        self.bed_load_exponent = [self.engine.bed_load_exponent];
        self.discharge_exponent = [self.engine.water_discharge_exponent];
        self.inflow_discharge = [self.engine.init_discharge];
        self.inflow_bed_load = [self.engine.sed_flux];
    }
}

impl BmiModel for AvulsionModel {
    fn component_name(&self) -> &'static str {
        "avulsion"
    }

    fn input_var_names(&self) -> &'static [&'static str] {
        INPUT_VAR_NAMES
    }

    fn output_var_names(&self) -> &'static [&'static str] {
        OUTPUT_VAR_NAMES
    }

    fn current_time(&self) -> f64 {
        self.engine.now()
    }

    fn time_step(&self) -> f64 {
        self.engine.time_step()
    }

    fn update(&mut self) -> BmiResult<()> {
        let next = self.engine.now() + self.engine.time_step();
        self.update_until(next)
    }

    fn update_until(&mut self, time_days: f64) -> BmiResult<()> {
        self.engine
            .run_until(time_days)
            .map_err(|_| ReturnCode::Failure)?;
        self.refresh_buffers();
        Ok(())
    }

    fn finalize(&mut self) -> BmiResult<()> {
        Ok(())
    }

    fn var_units(&self, name: &str) -> BmiResult<&'static str> {
        match name {
            VARIANCE | OUTFLOW_ANGLE => Ok("rad"),
            BED_LOAD_EXPONENT | DISCHARGE_EXPONENT => Ok("-"),
            INFLOW_DISCHARGE | OUTFLOW_DISCHARGE => Ok("m^3 / s"),
            INFLOW_BED_LOAD | OUTFLOW_BED_LOAD | SURFACE_BED_LOAD => Ok("kg / s"),
            OUTFLOW_X | OUTFLOW_Y | SURFACE_ELEVATION => Ok("m"),
            _ => Err(ReturnCode::BadName),
        }
    }

    fn var_rank(&self, name: &str) -> BmiResult<usize> {
        match name {
            VARIANCE | BED_LOAD_EXPONENT | DISCHARGE_EXPONENT | INFLOW_DISCHARGE
            | INFLOW_BED_LOAD => Ok(0),
            OUTFLOW_BED_LOAD | OUTFLOW_DISCHARGE | OUTFLOW_X | OUTFLOW_Y | OUTFLOW_ANGLE => {
                Ok(1)
            }
            SURFACE_ELEVATION | SURFACE_BED_LOAD => Ok(2),
            _ => Err(ReturnCode::BadName),
        }
    }

    fn grid_shape(&self, name: &str) -> BmiResult<Vec<usize>> {
        match self.var_rank(name)? {
            0 => Ok(vec![1]),
            1 => Ok(vec![self.n_mouths()]),
            _ => Ok(vec![self.engine.cube().n_x(), self.engine.cube().n_y()]),
        }
    }

    fn grid_spacing(&self, name: &str) -> BmiResult<Vec<f64>> {
        match self.var_rank(name)? {
            2 => Ok(vec![
                self.engine.cube().x_res(),
                self.engine.cube().y_res(),
            ]),
            _ => Ok(vec![0.0]),
        }
    }

    fn get_value(&self, name: &str, dest: &mut [f64]) -> BmiResult<()> {
        let src = self.get_value_ref(name)?;
        copy_into(dest, src)
    }

    fn get_value_ref(&self, name: &str) -> BmiResult<&[f64]> {
        match name {
            VARIANCE => Ok(&self.variance),
            BED_LOAD_EXPONENT => Ok(&self.bed_load_exponent),
            DISCHARGE_EXPONENT => Ok(&self.discharge_exponent),
            INFLOW_DISCHARGE => Ok(&self.inflow_discharge),
            INFLOW_BED_LOAD => Ok(&self.inflow_bed_load),
            OUTFLOW_BED_LOAD => Ok(&self.mouth_qb),
            OUTFLOW_DISCHARGE => Ok(&self.mouth_q),
            OUTFLOW_X => Ok(&self.mouth_x),
            OUTFLOW_Y => Ok(&self.mouth_y),
            OUTFLOW_ANGLE => Ok(&self.mouth_angle),
            SURFACE_ELEVATION => Ok(&self.elevation),
            SURFACE_BED_LOAD => Ok(&self.bed_load),
            _ => Err(ReturnCode::BadName),
        }
    }

    fn set_value(&mut self, name: &str, src: &[f64]) -> BmiResult<()> {
        if !INPUT_VAR_NAMES.contains(&name) {
            return Err(ReturnCode::BadName);
        }
        let first = *src.first().ok_or(ReturnCode::BadArgument)?;
        match name {
            VARIANCE => self.engine.set_variance(first),
            BED_LOAD_EXPONENT => self.engine.bed_load_exponent = first,
            DISCHARGE_EXPONENT => self.engine.water_discharge_exponent = first,
            INFLOW_DISCHARGE => self.engine.init_discharge = first,
            INFLOW_BED_LOAD => self.engine.sed_flux = first,
            SURFACE_ELEVATION => {
                let (n_x, n_y) = (self.engine.cube().n_x(), self.engine.cube().n_y());
                if src.len() != n_x * n_y {
                    return Err(ReturnCode::BadArgument);
                }
                let mut grid: Grid<f64> = Grid::new(n_x, n_y);
                grid.as_mut_slice().copy_from_slice(src);
                self.engine
                    .set_elevation(&grid)
                    .map_err(|_| ReturnCode::BadArgument)?;
            }
            _ => return Err(ReturnCode::BadName),
        }
        self.refresh_buffers();
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    fn model() -> AvulsionModel {
        AvulsionModel::initialize(None).unwrap()
    }

    #[test]
    fn test_variable_metadata() {
        let model = model();
        assert_eq!(model.var_rank(SURFACE_ELEVATION).unwrap(), 2);
        assert_eq!(model.var_rank(OUTFLOW_DISCHARGE).unwrap(), 1);
        assert_eq!(model.var_rank(VARIANCE).unwrap(), 0);
        assert_eq!(model.var_type(VARIANCE).unwrap(), "double");
        assert_eq!(model.grid_shape(SURFACE_ELEVATION).unwrap(), vec![30, 40]);
        assert_eq!(model.grid_size(SURFACE_ELEVATION).unwrap(), 1200);
        assert!(matches!(
            model.var_rank("no_such_variable"),
            Err(ReturnCode::BadName)
        ));
    }

    #[test]
    fn test_time_accessors_succeed() {
        let mut model = model();
        assert_eq!(model.current_time(), 0.0);
        model.update().unwrap();
        assert_eq!(model.current_time(), 1.0);
        assert!(model.end_time() > model.current_time());
    }

    #[test]
    fn test_set_then_get_round_trip() {
        let mut model = model();
        model.set_value(INFLOW_DISCHARGE, &[512.0]).unwrap();
        let mut out = [0.0];
        model.get_value(INFLOW_DISCHARGE, &mut out).unwrap();
        assert_eq!(out[0], 512.0);

        assert!(matches!(
            model.set_value(OUTFLOW_DISCHARGE, &[1.0]),
            Err(ReturnCode::BadName)
        ));
    }

    #[test]
    fn test_outputs_fill_after_update() {
        let mut model = model();
        model.set_value(INFLOW_DISCHARGE, &[1000.0]).unwrap();
        model.set_value(INFLOW_BED_LOAD, &[10.0]).unwrap();
        model.update_until(20.0).unwrap();

        let q = model.get_value_ref(OUTFLOW_DISCHARGE).unwrap();
        let total: f64 = q.iter().sum();
        assert!((total - 1000.0).abs() < 1e-9, "discharge sum {}", total);

        let elevation = model.get_value_ref(SURFACE_ELEVATION).unwrap();
        assert_eq!(elevation.len(), 1200);
    }
}
