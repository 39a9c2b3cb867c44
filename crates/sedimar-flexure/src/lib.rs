//! SEDIMAR Flexure - plate-bending response to sediment loads
//!
//! Closed-form deflection of a thin elastic plate floating on an
//! inviscid mantle, evaluated with Kelvin-function Green's functions:
//! point loads, half-plane loads, and gridded load fields (superposed,
//! optionally in parallel by output row).

pub mod kelvin;
pub mod plate;

pub use kelvin::kei0;
pub use plate::{flexure_parameter, Isostasy};

/// Error types for the flexure kernel
#[derive(Debug, thiserror::Error)]
pub enum FlexureError {
    #[error("Invalid parameter: {0}")]
    InvalidParameter(String),

    #[error("Load grid shape ({0}, {1}) does not match deflection grid ({2}, {3})")]
    ShapeMismatch(usize, usize, usize, usize),

    #[error("Half-plane load is only defined for 1-D profiles")]
    NotOneDimensional,
}

pub type Result<T> = std::result::Result<T, FlexureError>;
