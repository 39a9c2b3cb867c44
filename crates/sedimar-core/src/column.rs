//! The vertical stratigraphic stack at one (x, y) site.
//!
//! Cells are stored bottom to top. The column owns a base elevation (top
//! of basement rock), the vertical resolution dz, and a sea-level
//! reference. All mutating primitives conserve mass and keep the
//! fraction invariant of [`Cell`].

use crate::{Cell, CoreError, Result, Sediment, G, MIN_CELL_THICKNESS, RHO_SEA_WATER};
use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Column {
    /// Cells, bottom to top
    cells: Vec<Cell>,
    /// Map position (m)
    x: f64,
    y: f64,
    /// Elevation of the top of basement rock (m)
    base_height: f64,
    /// Vertical resolution (m)
    dz: f64,
    /// Sea level (m)
    sea_level: f64,
}

impl Column {
    pub fn new(x: f64, y: f64, base_height: f64, dz: f64) -> Self {
        Self {
            cells: Vec::new(),
            x,
            y,
            base_height,
            dz,
            sea_level: 0.0,
        }
    }

    pub fn x(&self) -> f64 {
        self.x
    }

    pub fn y(&self) -> f64 {
        self.y
    }

    pub fn dz(&self) -> f64 {
        self.dz
    }

    pub fn base_height(&self) -> f64 {
        self.base_height
    }

    pub fn set_base_height(&mut self, h: f64) {
        self.base_height = h;
    }

    pub fn adjust_base_height(&mut self, dh: f64) {
        self.base_height += dh;
    }

    pub fn sea_level(&self) -> f64 {
        self.sea_level
    }

    pub fn set_sea_level(&mut self, sea_level: f64) {
        self.sea_level = sea_level;
    }

    pub fn len(&self) -> usize {
        self.cells.len()
    }

    pub fn is_empty(&self) -> bool {
        self.cells.is_empty()
    }

    pub fn cells(&self) -> &[Cell] {
        &self.cells
    }

    pub fn nth_cell(&self, n: usize) -> Option<&Cell> {
        self.cells.get(n)
    }

    pub fn top_cell(&self) -> Option<&Cell> {
        self.cells.last()
    }

    /// Total sediment thickness (m)
    pub fn thickness(&self) -> f64 {
        self.cells.iter().map(Cell::thickness).sum()
    }

    /// Elevation of the sediment surface (m)
    pub fn top_height(&self) -> f64 {
        self.base_height + self.thickness()
    }

    /// Water depth at the surface; negative above sea level (m)
    pub fn water_depth(&self) -> f64 {
        self.sea_level - self.top_height()
    }

    pub fn is_below(&self, elevation: f64) -> bool {
        self.top_height() < elevation
    }

    pub fn is_above(&self, elevation: f64) -> bool {
        self.top_height() > elevation
    }

    /// Elevation of the bottom of cell `n` (m)
    pub fn cell_bottom(&self, n: usize) -> f64 {
        self.base_height + self.cells[..n].iter().map(Cell::thickness).sum::<f64>()
    }

    /// Index of the cell containing elevation `h`, if inside the stack
    pub fn index_at(&self, h: f64) -> Option<usize> {
        if h < self.base_height {
            return None;
        }
        let mut bottom = self.base_height;
        for (n, cell) in self.cells.iter().enumerate() {
            let top = bottom + cell.thickness();
            if h < top {
                return Some(n);
            }
            bottom = top;
        }
        None
    }

    /// Number of cells whose top lies above elevation `h`
    pub fn cells_above(&self, h: f64) -> usize {
        let mut bottom = self.base_height;
        let mut count = 0;
        for cell in &self.cells {
            let top = bottom + cell.thickness();
            if top > h {
                count += 1;
            }
            bottom = top;
        }
        count
    }

    /// Append `cell` at the top. Layers thinner than 1 um are discarded;
    /// a layer matching the top cell (facies, age, composition) merges
    /// into it instead of starting a new one.
    pub fn add_cell(&mut self, mut cell: Cell) {
        if cell.thickness() < MIN_CELL_THICKNESS {
            return;
        }
        if !cell.renormalize() {
            // Nothing to deposit once the fractions vanish.
            return;
        }
        match self.cells.last_mut() {
            Some(top) if top.merges_with(&cell) => top.add(&cell),
            _ => self.cells.push(cell),
        }
    }

    /// Remove exactly `depth` meters from the top and return the removed
    /// material as one mass-averaged cell.
    pub fn remove_top(&mut self, depth: f64) -> Result<Cell> {
        let n_grains = self.cells.first().map_or(0, Cell::n_grains);
        let mut out = Cell::new(n_grains.max(1));
        self.extract_top(depth, &mut out)?;
        Ok(out)
    }

    /// Like [`Column::remove_top`], writing the removed bundle into a
    /// caller-owned cell.
    pub fn extract_top(&mut self, depth: f64, out: &mut Cell) -> Result<()> {
        let available = self.thickness();
        if depth > available + MIN_CELL_THICKNESS {
            return Err(CoreError::InsufficientSediment {
                requested: depth,
                available,
            });
        }

        out.clear();
        let mut remaining = depth.min(available);
        while remaining > MIN_CELL_THICKNESS {
            let Some(top) = self.cells.last_mut() else {
                break;
            };
            if top.thickness() <= remaining + MIN_CELL_THICKNESS {
                remaining -= top.thickness();
                let cell = self.cells.pop().unwrap_or_else(|| Cell::new(1));
                if out.thickness() > 0.0 {
                    out.add(&cell);
                } else {
                    *out = cell;
                }
            } else {
                let slice = top.separate_top(remaining);
                remaining = 0.0;
                if out.thickness() > 0.0 {
                    out.add(&slice);
                } else {
                    *out = slice;
                }
            }
        }
        Ok(())
    }

    /// A read-only mass-averaged bundle of the top `depth` meters; the
    /// column is left untouched. The bundle thickness is clamped to what
    /// is available.
    pub fn top_sample(&self, depth: f64) -> Cell {
        let n_grains = self.cells.first().map_or(1, Cell::n_grains);
        let mut out = Cell::new(n_grains);
        let mut remaining = depth.min(self.thickness());
        for cell in self.cells.iter().rev() {
            if remaining <= MIN_CELL_THICKNESS {
                break;
            }
            let take = cell.thickness().min(remaining);
            let mut piece = cell.clone();
            piece.set_thickness(take);
            if out.thickness() > 0.0 {
                out.add(&piece);
            } else {
                out = piece;
            }
            remaining -= take;
        }
        out
    }

    /// A new column holding every cell whose bottom lies at or above
    /// `elevation`, splitting the straddling cell. Used to carve out a
    /// failure mass.
    pub fn top_above(&self, elevation: f64) -> Column {
        let mut out = Column::new(self.x, self.y, elevation.max(self.base_height), self.dz);
        out.sea_level = self.sea_level;

        let mut bottom = self.base_height;
        for cell in &self.cells {
            let top = bottom + cell.thickness();
            if top > elevation {
                if bottom >= elevation {
                    out.cells.push(cell.clone());
                } else {
                    // straddling cell: keep only the part above
                    let mut piece = cell.clone();
                    piece.set_thickness(top - elevation);
                    out.cells.push(piece);
                }
            }
            bottom = top;
        }
        out
    }

    /// Normalize layer thicknesses to multiples of dz by bottom-up
    /// accumulation. Each output cell is the mass-weighted average of the
    /// inputs that fill it; total mass is unchanged.
    pub fn rebin(&mut self) {
        let total = self.thickness();
        if total < MIN_CELL_THICKNESS || self.cells.is_empty() {
            return;
        }

        let n_grains = self.cells[0].n_grains();
        let mut source = std::mem::take(&mut self.cells);
        source.reverse(); // treat as a stack, bottom cell on top

        let mut fill_bin = |target: f64| -> Option<Cell> {
            let mut bin = Cell::new(n_grains);
            let mut needed = target;
            while needed > MIN_CELL_THICKNESS {
                let Some(cell) = source.last_mut() else {
                    break;
                };
                if cell.thickness() <= needed + MIN_CELL_THICKNESS {
                    needed -= cell.thickness();
                    let whole = source.pop()?;
                    if bin.thickness() > 0.0 {
                        bin.add(&whole);
                    } else {
                        bin = whole;
                    }
                } else {
                    // take the bottom `needed` meters of this cell
                    let keep = cell.thickness() - needed;
                    let mut piece = cell.clone();
                    piece.set_thickness(needed);
                    cell.set_thickness(keep);
                    needed = 0.0;
                    if bin.thickness() > 0.0 {
                        bin.add(&piece);
                    } else {
                        bin = piece;
                    }
                }
            }
            (bin.thickness() > MIN_CELL_THICKNESS).then_some(bin)
        };

        let n_full = (total / self.dz).floor() as usize;
        for _ in 0..n_full {
            if let Some(bin) = fill_bin(self.dz) {
                self.cells.push(bin);
            }
        }
        let partial = total - n_full as f64 * self.dz;
        if partial > MIN_CELL_THICKNESS {
            if let Some(bin) = fill_bin(partial) {
                self.cells.push(bin);
            }
        }
    }

    /// Mean saturated bulk density over the top `depth` meters (kg/m^3)
    pub fn top_density(&self, depth: f64, sediment: &Sediment) -> f64 {
        let depth = depth.min(self.thickness());
        if depth < MIN_CELL_THICKNESS {
            return RHO_SEA_WATER;
        }
        let mut remaining = depth;
        let mut mass = 0.0;
        for cell in self.cells.iter().rev() {
            let t = cell.thickness().min(remaining);
            mass += t * cell.bulk_density(sediment);
            remaining -= t;
            if remaining <= 0.0 {
                break;
            }
        }
        mass / depth
    }

    /// Buoyant load of the top `depth` meters: rho' g d with rho' the
    /// column-mean buoyant density over that interval (Pa).
    pub fn load_at_depth(&self, depth: f64, sediment: &Sediment) -> f64 {
        let depth = depth.min(self.thickness());
        if depth < MIN_CELL_THICKNESS {
            return 0.0;
        }
        let mut remaining = depth;
        let mut load = 0.0;
        for cell in self.cells.iter().rev() {
            let t = cell.thickness().min(remaining);
            load += t * (cell.bulk_density(sediment) - RHO_SEA_WATER) * G;
            remaining -= t;
            if remaining <= 0.0 {
                break;
            }
        }
        load
    }

    /// Total load of the full stack plus the overlying water column (Pa)
    pub fn load(&self, sediment: &Sediment) -> f64 {
        let water = self.water_depth().max(0.0) * RHO_SEA_WATER * G;
        let sediment_load: f64 = self
            .cells
            .iter()
            .map(|cell| cell.thickness() * cell.bulk_density(sediment) * G)
            .sum();
        water + sediment_load
    }

    /// Hydrostatic pressure at the sea floor (Pa)
    pub fn water_pressure(&self) -> f64 {
        self.water_depth().max(0.0) * RHO_SEA_WATER * G
    }

    /// Mass per unit area of the whole stack (kg/m^2)
    pub fn mass(&self, sediment: &Sediment) -> f64 {
        self.cells.iter().map(|cell| cell.mass(sediment)).sum()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::Facies;
    use pretty_assertions::assert_eq;

    fn sediment() -> Sediment {
        Sediment::default_classes()
    }

    fn column_with(thicknesses: &[f64]) -> Column {
        let mut col = Column::new(0.0, 0.0, -100.0, 0.5);
        for (k, &t) in thicknesses.iter().enumerate() {
            col.add_cell(Cell::with_fractions(
                t,
                vec![0.25, 0.25, 0.25, 0.25],
                k as f64 * 10.0,
                Facies::RIVER,
            ));
        }
        col
    }

    #[test]
    fn test_thickness_bookkeeping() {
        let col = column_with(&[1.0, 2.0, 0.5]);
        assert!((col.thickness() - 3.5).abs() < 1e-12);
        assert!((col.top_height() - (-96.5)).abs() < 1e-12);
        assert!((col.top_height() - col.base_height() - col.thickness()).abs() < 1e-9);
    }

    #[test]
    fn test_tiny_cell_is_noop() {
        let mut col = column_with(&[1.0]);
        let before = col.len();
        col.add_cell(Cell::with_fractions(
            5e-7,
            vec![1.0, 0.0, 0.0, 0.0],
            0.0,
            Facies::RIVER,
        ));
        assert_eq!(col.len(), before);
    }

    #[test]
    fn test_matching_cells_merge() {
        let mut col = Column::new(0.0, 0.0, 0.0, 0.5);
        let cell = Cell::with_fractions(0.3, vec![0.5, 0.5, 0.0, 0.0], 1.0, Facies::TURBIDITE);
        col.add_cell(cell.clone());
        col.add_cell(cell);
        assert_eq!(col.len(), 1);
        assert!((col.thickness() - 0.6).abs() < 1e-12);
    }

    #[test]
    fn test_remove_top_splits() {
        let sed = sediment();
        let mut col = column_with(&[1.0, 1.0]);
        let mass_before = col.mass(&sed);
        let removed = col.remove_top(1.5).unwrap();
        assert!((removed.thickness() - 1.5).abs() < 1e-9);
        assert!((col.thickness() - 0.5).abs() < 1e-9);
        assert!((col.mass(&sed) + removed.mass(&sed) - mass_before).abs() < 1e-9);
    }

    #[test]
    fn test_remove_too_much_fails() {
        let mut col = column_with(&[1.0]);
        assert!(matches!(
            col.remove_top(2.0),
            Err(CoreError::InsufficientSediment { .. })
        ));
        // column untouched on failure
        assert!((col.thickness() - 1.0).abs() < 1e-12);
    }

    #[test]
    fn test_remove_then_add_restores() {
        let mut col = column_with(&[1.0, 1.0]);
        let thickness_before = col.thickness();
        let fractions_before = col.top_cell().unwrap().fraction().to_vec();
        let removed = col.remove_top(0.7).unwrap();
        col.add_cell(removed);
        assert!((col.thickness() - thickness_before).abs() < 1e-9);
        let fractions_after = col.top_cell().unwrap().fraction();
        for (a, b) in fractions_before.iter().zip(fractions_after) {
            assert!((a - b).abs() < 1e-9);
        }
    }

    #[test]
    fn test_top_above() {
        let col = column_with(&[2.0, 2.0]);
        // base at -100; take everything above -97 (1 m into the top cell)
        let upper = col.top_above(-97.0);
        assert!((upper.thickness() - 1.0).abs() < 1e-9);
        assert!((upper.base_height() - (-97.0)).abs() < 1e-12);
        assert!((upper.top_height() - col.top_height()).abs() < 1e-9);
    }

    #[test]
    fn test_rebin_conserves_mass_and_is_idempotent() {
        let sed = sediment();
        let mut col = Column::new(0.0, 0.0, 0.0, 0.5);
        col.add_cell(Cell::with_fractions(
            0.8,
            vec![1.0, 0.0, 0.0, 0.0],
            0.0,
            Facies::BEDLOAD,
        ));
        col.add_cell(Cell::with_fractions(
            0.9,
            vec![0.0, 1.0, 0.0, 0.0],
            50.0,
            Facies::TURBIDITE,
        ));
        let mass_before = col.mass(&sed);

        col.rebin();
        let mass_mid = col.mass(&sed);
        assert!((mass_mid - mass_before).abs() / mass_before < 1e-12);
        // 1.7 m at dz = 0.5 -> 3 full bins + 0.2 m partial
        assert_eq!(col.len(), 4);
        for cell in &col.cells()[..3] {
            assert!((cell.thickness() - 0.5).abs() < 1e-9);
        }

        let snapshot = col.clone();
        col.rebin();
        assert_eq!(col.len(), snapshot.len());
        for (a, b) in col.cells().iter().zip(snapshot.cells()) {
            assert!((a.thickness() - b.thickness()).abs() < 1e-12);
        }
    }

    #[test]
    fn test_load_at_depth() {
        let sed = sediment();
        let col = column_with(&[2.0]);
        let rho = col.top_density(2.0, &sed);
        let expected = (rho - RHO_SEA_WATER) * G * 2.0;
        assert!((col.load_at_depth(2.0, &sed) - expected).abs() < 1e-6);
    }

    #[test]
    fn test_index_at() {
        let col = column_with(&[1.0, 1.0]);
        assert_eq!(col.index_at(-99.5), Some(0));
        assert_eq!(col.index_at(-98.5), Some(1));
        assert_eq!(col.index_at(-101.0), None);
        assert_eq!(col.index_at(-90.0), None);
    }
}
