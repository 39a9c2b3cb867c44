//! Binary full-cube property dumps.
//!
//! An ASCII `key: value` preamble closed by `--- data ---`, then raw
//! native-endian doubles: for every column, one value per vertical row
//! from the top of the window down. Rows above the sediment carry the
//! water sentinel, rows under the basement the rock sentinel.

use crate::Result;
use sedimar_core::{Cell, Cube, Sediment};
use serde::{Deserialize, Serialize};
use std::io::Write;

/// Water cells are filled with this
pub const WATER_VALUE: f64 = -(f32::MAX as f64);

/// Sub-basement cells are filled with this
pub const ROCK_VALUE: f64 = f32::MAX as f64;

/// A per-cell quantity a property file can dump
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum CellProperty {
    Density,
    Porosity,
    /// Grain size in phi units
    GrainSizePhi,
    Age,
    Facies,
    Pressure,
    SandFraction,
    ClayFraction,
}

impl CellProperty {
    pub fn name(&self) -> &'static str {
        match self {
            Self::Density => "DENSITY",
            Self::Porosity => "POROSITY",
            Self::GrainSizePhi => "GRAIN",
            Self::Age => "AGE",
            Self::Facies => "FACIES",
            Self::Pressure => "PRESSURE",
            Self::SandFraction => "SAND",
            Self::ClayFraction => "CLAY",
        }
    }

    pub fn evaluate(&self, cell: &Cell, sediment: &Sediment) -> f64 {
        match self {
            Self::Density => cell.bulk_density(sediment),
            Self::Porosity => cell.porosity(sediment),
            Self::GrainSizePhi => cell.grain_size_phi(sediment),
            Self::Age => cell.age(),
            Self::Facies => cell.facies().0 as f64,
            Self::Pressure => cell.pressure(),
            Self::SandFraction => cell.sand_fraction(sediment),
            Self::ClayFraction => cell.clay_fraction(sediment),
        }
    }
}

/// Writer for one property dump
pub struct PropertyFile {
    pub property: CellProperty,
}

impl PropertyFile {
    pub fn new(property: CellProperty) -> Self {
        Self { property }
    }

    /// Number of vertical rows the cube's stratigraphy spans at its dz.
    fn window(cube: &Cube) -> (f64, usize) {
        let z_min = cube
            .columns()
            .iter()
            .map(|c| c.base_height())
            .fold(f64::INFINITY, f64::min);
        let z_max = cube
            .columns()
            .iter()
            .map(|c| c.top_height())
            .fold(f64::NEG_INFINITY, f64::max);
        let n_rows = ((z_max - z_min) / cube.z_res()).ceil().max(1.0) as usize;
        (z_min, n_rows)
    }

    /// Write the preamble and the full block of doubles.
    pub fn write<W: Write>(&self, sink: &mut W, cube: &Cube, sediment: &Sediment) -> Result<()> {
        let (z_min, n_rows) = Self::window(cube);
        let byte_order = if cfg!(target_endian = "little") {
            "1234"
        } else {
            "4321"
        };

        write!(
            sink,
            "Property: {}\n\
             dx: {}\n\
             dy: {}\n\
             dz: {}\n\
             Number of rows: {}\n\
             Number of x-columns: {}\n\
             Number of y-columns: {}\n\
             Rock value: {}\n\
             Water value: {}\n\
             Byte order: {}\n\
             --- data ---\n",
            self.property.name(),
            cube.x_res(),
            cube.y_res(),
            cube.z_res(),
            n_rows,
            cube.n_x(),
            cube.n_y(),
            ROCK_VALUE,
            WATER_VALUE,
            byte_order,
        )?;

        tracing::debug!(
            n_rows,
            n_columns = cube.size(),
            property = self.property.name(),
            "writing property block"
        );

        let dz = cube.z_res();
        for column in cube.columns() {
            for row in 0..n_rows {
                // rows run from the top of the window down
                let z = z_min + (n_rows - row) as f64 * dz - 0.5 * dz;
                let value = if z > column.top_height() {
                    WATER_VALUE
                } else if z < column.base_height() {
                    ROCK_VALUE
                } else {
                    // a row landing on the surface samples the top cell
                    let idx = column
                        .index_at(z)
                        .unwrap_or_else(|| column.len().saturating_sub(1));
                    match column.nth_cell(idx) {
                        Some(cell) => self.property.evaluate(cell, sediment),
                        None => ROCK_VALUE,
                    }
                };
                sink.write_all(&value.to_ne_bytes())?;
            }
        }

        Ok(())
    }
}
