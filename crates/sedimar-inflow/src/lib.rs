//! SEDIMAR Inflow - steady hyperpycnal turbidity currents
//!
//! A steady-state turbidity current model after Mulder's treatment of
//! the 1979 Nice event: a sediment-laden density flow is marched down a
//! 1-D bathymetric profile with seawater entrainment, drag, and
//! grain-by-grain deposition and erosion.
//!
//! [`solver`] holds the marching scheme over an abstract profile;
//! [`wrapper`] runs it against a [`sedimar_core::Cube`], one day at a
//! time, and converts the returned rates into stratigraphy.

pub mod solver;
pub mod wrapper;

pub use solver::{
    inflow, BathymetryLine, FloodPacket, InflowConstants, InflowResult, InflowSediment, PheQuery,
};
pub use wrapper::{run_flood, InflowCubeConfig};

/// Error types for the turbidity-current solver
#[derive(Debug, thiserror::Error)]
pub enum InflowError {
    #[error("Velocity dropped to {0} m/s at node {1}")]
    NegativeVelocity(f64, usize),

    #[error("Invalid parameter: {0}")]
    InvalidParameter(String),

    #[error("Bathymetry profile needs at least two nodes, got {0}")]
    ProfileTooShort(usize),

    #[error(transparent)]
    Core(#[from] sedimar_core::CoreError),
}

pub type Result<T> = std::result::Result<T, InflowError>;
