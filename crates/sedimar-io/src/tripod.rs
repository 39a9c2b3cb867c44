//! Measurement probes.
//!
//! A tripod sits at fixed map positions and measures one sea-floor
//! quantity each time it is read. Every measurement is a deterministic
//! function of the cube and the top of the column under the probe, and
//! turns into NaN off the domain or over bare rock.

use crate::{IoError, Result};
use sedimar_core::{Cube, Sediment};
use serde::{Deserialize, Serialize};
use std::io::Write;
use uuid::Uuid;

/// What a probe measures
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum Measurement {
    Slope,
    Depth,
    Elevation,
    Thickness,
    /// Mean grain size of the surface layer (micrometers)
    GrainSize,
    Age,
    SandFraction,
    SiltFraction,
    ClayFraction,
    MudFraction,
    Facies,
    Density,
    Porosity,
    Permeability,
    Basement,
    /// Cross-shore position of the river mouth (m)
    RiverMouth,
    XSlope,
    YSlope,
}

impl Measurement {
    pub const ALL: [Measurement; 18] = [
        Measurement::Slope,
        Measurement::Depth,
        Measurement::Elevation,
        Measurement::Thickness,
        Measurement::GrainSize,
        Measurement::Age,
        Measurement::SandFraction,
        Measurement::SiltFraction,
        Measurement::ClayFraction,
        Measurement::MudFraction,
        Measurement::Facies,
        Measurement::Density,
        Measurement::Porosity,
        Measurement::Permeability,
        Measurement::Basement,
        Measurement::RiverMouth,
        Measurement::XSlope,
        Measurement::YSlope,
    ];

    pub fn name(&self) -> &'static str {
        match self {
            Self::Slope => "SLOPE",
            Self::Depth => "DEPTH",
            Self::Elevation => "ELEVATION",
            Self::Thickness => "THICKNESS",
            Self::GrainSize => "GRAIN",
            Self::Age => "AGE",
            Self::SandFraction => "SAND",
            Self::SiltFraction => "SILT",
            Self::ClayFraction => "CLAY",
            Self::MudFraction => "MUD",
            Self::Facies => "FACIES",
            Self::Density => "DENSITY",
            Self::Porosity => "POROSITY",
            Self::Permeability => "PERMEABILITY",
            Self::Basement => "BASEMENT",
            Self::RiverMouth => "RIVER_MOUTH",
            Self::XSlope => "XSLOPE",
            Self::YSlope => "YSLOPE",
        }
    }

    pub fn units(&self) -> &'static str {
        match self {
            Self::Slope | Self::XSlope | Self::YSlope => "meter/meter",
            Self::Depth | Self::Elevation | Self::Thickness | Self::Basement
            | Self::RiverMouth => "meter",
            Self::GrainSize => "micrometer",
            Self::Age => "year",
            Self::Density => "kilogram/meter^3",
            Self::Permeability => "meter^2",
            _ => "1",
        }
    }

    pub fn from_name(name: &str) -> Result<Self> {
        let upper = name.trim().to_uppercase();
        Self::ALL
            .iter()
            .find(|m| m.name() == upper)
            .copied()
            .ok_or_else(|| IoError::UnknownMeasurement(name.to_string()))
    }

    /// Take the measurement at cell (i, j).
    pub fn measure(&self, cube: &Cube, sediment: &Sediment, i: usize, j: usize) -> f64 {
        if !cube.contains(i, j) {
            return f64::NAN;
        }
        let column = match cube.col(i, j) {
            Ok(col) => col,
            Err(_) => return f64::NAN,
        };

        match self {
            Self::Slope => cube.slope(i, j),
            Self::Depth => cube.water_depth(i, j),
            Self::Elevation => cube.top_height(i, j),
            Self::Thickness => column.thickness(),
            Self::Basement => column.base_height(),
            Self::RiverMouth => cube.river_mouth_1d() as f64 * cube.y_res(),
            Self::XSlope => cube.x_slope(i, j),
            Self::YSlope => cube.y_slope(i, j),
            _ => {
                let Some(top) = column.top_cell() else {
                    return f64::NAN;
                };
                match self {
                    Self::GrainSize => top.grain_size(sediment) * 1e6,
                    Self::Age => top.age(),
                    Self::SandFraction => top.sand_fraction(sediment),
                    Self::SiltFraction => top.silt_fraction(sediment),
                    Self::ClayFraction => top.clay_fraction(sediment),
                    Self::MudFraction => top.mud_fraction(sediment),
                    Self::Facies => top.facies().0 as f64,
                    Self::Density => top.bulk_density(sediment),
                    Self::Porosity => top.porosity(sediment),
                    Self::Permeability => top.permeability(sediment),
                    _ => f64::NAN,
                }
            }
        }
    }
}

/// A named probe: fixed map positions and one measurement
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Tripod {
    pub id: Uuid,
    pub measurement: Measurement,
    /// Map positions sampled on every read (m)
    pub positions: Vec<(f64, f64)>,
}

impl Tripod {
    pub fn at(measurement: Measurement, positions: Vec<(f64, f64)>) -> Self {
        Self {
            id: Uuid::new_v4(),
            measurement,
            positions,
        }
    }

    /// A probe sweeping every column of a 1-D profile.
    pub fn profile_sweep(measurement: Measurement, cube: &Cube) -> Self {
        let positions = (0..cube.n_y())
            .map(|j| (0.0, j as f64 * cube.y_res()))
            .collect();
        Self::at(measurement, positions)
    }

    /// Read every position; out-of-domain probes read NaN.
    pub fn read(&self, cube: &Cube, sediment: &Sediment) -> Vec<f64> {
        self.positions
            .iter()
            .map(|&(x, y)| {
                let i = (x / cube.x_res()).round() as isize;
                let j = (y / cube.y_res()).round() as isize;
                if i < 0 || j < 0 {
                    return f64::NAN;
                }
                self.measurement
                    .measure(cube, sediment, i as usize, j as usize)
            })
            .collect()
    }
}

/// The binary tripod record file: an ASCII preamble, then one record
/// per read with the time, the probe positions and the values.
pub struct TripodFile<W: Write> {
    sink: W,
    tripod: Tripod,
    wrote_header: bool,
}

impl<W: Write> TripodFile<W> {
    pub fn new(sink: W, tripod: Tripod) -> Self {
        Self {
            sink,
            tripod,
            wrote_header: false,
        }
    }

    fn write_header(&mut self) -> Result<()> {
        let byte_order = if cfg!(target_endian = "little") {
            "1234"
        } else {
            "4321"
        };
        write!(
            self.sink,
            "Measurement: {}\n\
             Units: {}\n\
             Number of measurements: {}\n\
             Byte order: {}\n\
             Creation date: {}\n\
             --- data ---\n",
            self.tripod.measurement.name(),
            self.tripod.measurement.units(),
            self.tripod.positions.len(),
            byte_order,
            chrono::Utc::now().format("%A %e %B %Y %T UTC"),
        )?;
        Ok(())
    }

    /// Append one record: time (years), then every (x, y), then every
    /// measured value.
    pub fn write_record(&mut self, cube: &Cube, sediment: &Sediment, time: f64) -> Result<()> {
        if !self.wrote_header {
            self.write_header()?;
            self.wrote_header = true;
        }
        self.sink.write_all(&time.to_ne_bytes())?;
        for &(x, y) in &self.tripod.positions {
            self.sink.write_all(&x.to_ne_bytes())?;
            self.sink.write_all(&y.to_ne_bytes())?;
        }
        for value in self.tripod.read(cube, sediment) {
            self.sink.write_all(&value.to_ne_bytes())?;
        }
        Ok(())
    }

    pub fn into_inner(self) -> W {
        self.sink
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;
    use sedimar_core::{Cell, Facies};

    fn test_cube() -> (Cube, Sediment) {
        let sediment = Sediment::default_classes();
        let mut cube = Cube::new_profile("probe", 10, 100.0, 0.5);
        for j in 0..10 {
            let col = cube.col_1d_mut(j).unwrap();
            col.set_base_height(2.0 - j as f64);
            col.add_cell(Cell::with_fractions(
                1.0,
                vec![0.5, 0.2, 0.2, 0.1],
                30.0,
                Facies::RIVER,
            ));
        }
        cube.set_sea_level(0.0);
        (cube, sediment)
    }

    #[test]
    fn test_names_round_trip() {
        for m in Measurement::ALL {
            assert_eq!(Measurement::from_name(m.name()).unwrap(), m);
        }
        assert!(Measurement::from_name("TEMPERATURE").is_err());
    }

    #[test]
    fn test_measurements_read_the_top_cell() {
        let (cube, sediment) = test_cube();
        let sand = Measurement::SandFraction.measure(&cube, &sediment, 0, 4);
        assert!((sand - 0.7).abs() < 1e-12);
        let age = Measurement::Age.measure(&cube, &sediment, 0, 4);
        assert_eq!(age, 30.0);
        let thickness = Measurement::Thickness.measure(&cube, &sediment, 0, 4);
        assert!((thickness - 1.0).abs() < 1e-12);
    }

    #[test]
    fn test_out_of_domain_is_nan() {
        let (cube, sediment) = test_cube();
        assert!(Measurement::Depth.measure(&cube, &sediment, 5, 0).is_nan());
        assert!(Measurement::Age.measure(&cube, &sediment, 0, 99).is_nan());
    }

    #[test]
    fn test_profile_sweep_covers_every_column() {
        let (cube, sediment) = test_cube();
        let sweep = Tripod::profile_sweep(Measurement::Elevation, &cube);
        let values = sweep.read(&cube, &sediment);
        assert_eq!(values.len(), cube.n_y());
        for (j, v) in values.iter().enumerate() {
            assert!((v - cube.top_height(0, j)).abs() < 1e-12);
        }
    }

    #[test]
    fn test_tripod_record_layout() {
        let (cube, sediment) = test_cube();
        let tripod = Tripod::at(Measurement::Depth, vec![(0.0, 300.0), (0.0, 700.0)]);
        let mut file = TripodFile::new(Vec::new(), tripod);
        file.write_record(&cube, &sediment, 100.0).unwrap();
        let bytes = file.into_inner();

        let split = bytes
            .windows(12)
            .position(|w| w == b"--- data ---")
            .expect("preamble separator")
            + 13; // separator and its newline
        let body = &bytes[split..];
        // time + 2 positions (x, y) + 2 values
        assert_eq!(body.len(), 8 * (1 + 4 + 2));
        let time = f64::from_ne_bytes(body[0..8].try_into().unwrap());
        assert_eq!(time, 100.0);
    }
}
