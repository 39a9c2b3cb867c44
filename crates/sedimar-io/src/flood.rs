//! Hydrograph record sequences.
//!
//! One record per line: duration (days), channel width (m), depth (m),
//! velocity (m/s), bed-load flux (kg/s), then one suspended
//! concentration (kg/m^3) per suspended grain class. Records apply in
//! file order.

use crate::{IoError, Result};
use sedimar_core::Hydro;
use std::path::Path;

/// Parse a flood file's text into hydrograph records. `n_suspended` is
/// the number of suspended grain classes the run expects.
pub fn parse_flood_records(text: &str, n_suspended: usize) -> Result<Vec<Hydro>> {
    let expected = 5 + n_suspended;
    let mut records = Vec::new();

    for (row, line) in text.lines().enumerate() {
        let line = match line.find('#') {
            Some(pos) => &line[..pos],
            None => line,
        };
        if line.trim().is_empty() {
            continue;
        }
        let fields: Vec<f64> = line
            .split([',', ' ', '\t'])
            .filter(|f| !f.trim().is_empty())
            .map(|f| {
                f.trim().parse().map_err(|_| IoError::BadValue {
                    key: "flood record".into(),
                    value: f.trim().to_string(),
                })
            })
            .collect::<Result<_>>()?;
        if fields.len() != expected {
            return Err(IoError::WrongColumnCount {
                expected,
                found: fields.len(),
                row,
            });
        }

        records.push(Hydro {
            duration: fields[0],
            width: fields[1],
            depth: fields[2],
            velocity: fields[3],
            bed_load: fields[4],
            concentration: fields[5..].to_vec(),
        });
    }

    Ok(records)
}

/// Read hydrograph records from a file.
pub fn read_flood_records(path: impl AsRef<Path>, n_suspended: usize) -> Result<Vec<Hydro>> {
    let path = path.as_ref();
    let text = std::fs::read_to_string(path).map_err(|source| IoError::File {
        path: path.display().to_string(),
        source,
    })?;
    parse_flood_records(&text, n_suspended)
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    #[test]
    fn test_parses_records_in_order() {
        let text = "\
# duration width depth velocity bedload c1 c2 c3
2  263 8.3 1.06 65.1 0.34 0.58 0.42
365 150 4.0 0.80 10.0 0.05 0.08 0.04
";
        let records = parse_flood_records(text, 3).unwrap();
        assert_eq!(records.len(), 2);
        assert_eq!(records[0].duration, 2.0);
        assert_eq!(records[0].concentration, vec![0.34, 0.58, 0.42]);
        assert_eq!(records[1].width, 150.0);
    }

    #[test]
    fn test_wrong_field_count_rejected() {
        let err = parse_flood_records("2 263 8.3 1.06 65.1 0.34\n", 3).unwrap_err();
        assert!(matches!(
            err,
            IoError::WrongColumnCount {
                expected: 8,
                found: 6,
                ..
            }
        ));
    }

    #[test]
    fn test_derived_fluxes() {
        let records = parse_flood_records("1 100 2 1 10 0.1 0.05\n", 2).unwrap();
        let hydro = &records[0];
        assert!((hydro.water_flux() - 200.0).abs() < 1e-12);
        assert!((hydro.total_load() - 40.0).abs() < 1e-12);
    }
}
