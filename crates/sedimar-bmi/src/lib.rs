//! SEDIMAR BMI - the driver surface.
//!
//! Each engine exposes its own state type behind the [`BmiModel`]
//! trait: fixed variable lists, double-typed values addressed by name,
//! uniform-grid metadata, and day-based time stepping. Errors map onto
//! the small set of integer return codes the orchestrator understands.

pub mod avulsion_model;
pub mod subside_model;

pub use avulsion_model::AvulsionModel;
pub use subside_model::SubsideModel;

/// Integer codes handed back across the driver boundary
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[repr(i32)]
pub enum ReturnCode {
    Success = 0,
    Failure = 1,
    BadArgument = 2,
    Unknown = 3,
    UnableToOpen = 4,
    BadName = 5,
}

impl ReturnCode {
    pub fn code(self) -> i32 {
        self as i32
    }
}

pub type BmiResult<T> = std::result::Result<T, ReturnCode>;

/// The operations an orchestrator drives a model through. Time is in
/// days throughout.
pub trait BmiModel {
    fn component_name(&self) -> &'static str;

    fn input_var_names(&self) -> &'static [&'static str];
    fn output_var_names(&self) -> &'static [&'static str];

    fn start_time(&self) -> f64 {
        0.0
    }
    fn current_time(&self) -> f64;
    fn end_time(&self) -> f64 {
        f64::MAX
    }
    fn time_step(&self) -> f64;
    fn time_units(&self) -> &'static str {
        "d"
    }

    fn update(&mut self) -> BmiResult<()>;
    fn update_until(&mut self, time_days: f64) -> BmiResult<()>;
    fn finalize(&mut self) -> BmiResult<()>;

    /// Every exchange item is typed double.
    fn var_type(&self, name: &str) -> BmiResult<&'static str> {
        self.var_rank(name)?;
        Ok("double")
    }

    fn var_units(&self, name: &str) -> BmiResult<&'static str>;

    /// 0 for scalars, 1 for per-mouth vectors, 2 for map grids.
    fn var_rank(&self, name: &str) -> BmiResult<usize>;

    /// The grid a variable lives on. Each model exposes three: grid 0
    /// holds scalars, grid 1 the per-mouth vectors, grid 2 the uniform
    /// map, so the id coincides with the variable's rank.
    fn var_grid(&self, name: &str) -> BmiResult<i32> {
        Ok(self.var_rank(name)? as i32)
    }

    /// (rows, cols) = (n_x, n_y) for rank-2 variables.
    fn grid_shape(&self, name: &str) -> BmiResult<Vec<usize>>;

    fn grid_size(&self, name: &str) -> BmiResult<usize> {
        Ok(self.grid_shape(name)?.iter().product())
    }

    fn grid_spacing(&self, name: &str) -> BmiResult<Vec<f64>>;

    fn grid_origin(&self, name: &str) -> BmiResult<Vec<f64>> {
        let rank = self.var_rank(name)?;
        Ok(vec![0.0; rank.max(1)])
    }

    /// Copy the variable into `dest`; `dest` must hold `grid_size`
    /// values.
    fn get_value(&self, name: &str, dest: &mut [f64]) -> BmiResult<()>;

    /// Borrow the variable's backing storage.
    fn get_value_ref(&self, name: &str) -> BmiResult<&[f64]>;

    fn set_value(&mut self, name: &str, src: &[f64]) -> BmiResult<()>;
}

/// Copy helper shared by the models.
pub(crate) fn copy_into(dest: &mut [f64], src: &[f64]) -> BmiResult<()> {
    if dest.len() < src.len() {
        return Err(ReturnCode::BadArgument);
    }
    dest[..src.len()].copy_from_slice(src);
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_return_codes_match_the_contract() {
        assert_eq!(ReturnCode::Success.code(), 0);
        assert_eq!(ReturnCode::BadArgument.code(), 2);
        assert_eq!(ReturnCode::Unknown.code(), 3);
        assert_eq!(ReturnCode::UnableToOpen.code(), 4);
        assert_eq!(ReturnCode::BadName.code(), 5);
    }
}
