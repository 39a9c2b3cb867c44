//! SEDIMAR Avulsion - stochastic river-mouth migration
//!
//! Drives a branching river tree over the cube: each leaf's angle does
//! a bounded Gaussian random walk around its hinge, its mouth is traced
//! across the bathymetry, and the trunk's water and bed-load discharge
//! are partitioned among the leaves by their channel lengths.

pub mod engine;
pub mod walk;

pub use engine::{split_bed_load, split_discharge, AvulsionConfig, AvulsionEngine};
pub use walk::{avulse_angle, GaussianDeviate};

/// Error types for the avulsion model
#[derive(Debug, thiserror::Error)]
pub enum AvulsionError {
    #[error("Invalid parameter: {0}")]
    InvalidParameter(String),

    #[error("Could not read configuration: {0}")]
    Config(String),

    #[error(transparent)]
    Core(#[from] sedimar_core::CoreError),
}

pub type Result<T> = std::result::Result<T, AvulsionError>;
