//! Delimited bathymetry profiles.
//!
//! Two columns split on `;` or `,`: cross-shore position (m) and depth
//! (m). Positions must increase strictly and at least one must sit at
//! or before the origin so the profile covers the river mouth.

use crate::{IoError, Result};
use serde::{Deserialize, Serialize};
use std::path::Path;

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Bathymetry {
    /// Cross-shore position of each sample (m)
    pub position: Vec<f64>,

    /// Depth at each sample (m), positive down
    pub depth: Vec<f64>,
}

impl Bathymetry {
    pub fn from_text(text: &str) -> Result<Self> {
        let mut position = Vec::new();
        let mut depth = Vec::new();

        for (row, line) in text.lines().enumerate() {
            let line = match line.find('#') {
                Some(pos) => &line[..pos],
                None => line,
            };
            if line.trim().is_empty() {
                continue;
            }
            let fields: Vec<&str> = line
                .split(|c| c == ';' || c == ',')
                .map(str::trim)
                .filter(|f| !f.is_empty())
                .collect();
            if fields.len() != 2 {
                return Err(IoError::WrongColumnCount {
                    expected: 2,
                    found: fields.len(),
                    row,
                });
            }
            let x: f64 = fields[0].parse().map_err(|_| IoError::BadValue {
                key: "position".into(),
                value: fields[0].into(),
            })?;
            let d: f64 = fields[1].parse().map_err(|_| IoError::BadValue {
                key: "depth".into(),
                value: fields[1].into(),
            })?;
            if let Some(&last) = position.last() {
                if x <= last {
                    return Err(IoError::NonMonotonic(row));
                }
            }
            position.push(x);
            depth.push(d);
        }

        if position.first().map_or(true, |&x| x > 0.0) {
            return Err(IoError::InsufficientRange);
        }

        Ok(Self { position, depth })
    }

    pub fn from_file(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref();
        let text = std::fs::read_to_string(path).map_err(|source| IoError::File {
            path: path.display().to_string(),
            source,
        })?;
        Self::from_text(&text)
    }

    pub fn len(&self) -> usize {
        self.position.len()
    }

    pub fn is_empty(&self) -> bool {
        self.position.is_empty()
    }

    /// Depth linearly interpolated at `x`, clamped to the profile ends.
    pub fn depth_at(&self, x: f64) -> f64 {
        let n = self.position.len();
        if n == 0 {
            return 0.0;
        }
        if x <= self.position[0] {
            return self.depth[0];
        }
        if x >= self.position[n - 1] {
            return self.depth[n - 1];
        }
        let k = self.position.partition_point(|&p| p < x);
        let (x0, x1) = (self.position[k - 1], self.position[k]);
        let (d0, d1) = (self.depth[k - 1], self.depth[k]);
        let t = (x - x0) / (x1 - x0);
        d0 + t * (d1 - d0)
    }

    /// Resample the profile onto `n` uniform nodes spaced `dy`,
    /// returning sea-floor elevations (negative below sea level).
    pub fn elevations(&self, n: usize, dy: f64) -> Vec<f64> {
        (0..n).map(|j| -self.depth_at(j as f64 * dy)).collect()
    }
}
