//! SEDIMAR Failure - slope stability and failure triggering
//!
//! Scores every candidate circular-arc failure surface on a 1-D profile
//! with a Janbu factor-of-safety computation, keeps the scores cached
//! between time steps, and triggers the weakest surface when it drops
//! below the failure threshold: the sliding mass is carved out of the
//! profile and handed on as a debris flow or a turbidity current.

pub mod janbu;
pub mod profile;
pub mod surface;
pub mod trigger;

pub use janbu::{factor_of_safety_equation, janbu_fos, FailSlice};
pub use profile::{FailColumn, FailProfile, FailureConstants, PorePressureMode};
pub use surface::{circle_surface, failure_line, plane_is_valid};
pub use trigger::{decider, run_failures, FlowKind, TriggeredFailure, TsunamiParameters};

/// Shortest failure surface considered (columns)
pub const MIN_FAILURE_LENGTH: usize = 5;

/// Longest failure surface considered (columns)
pub const MAX_FAILURE_LENGTH: usize = 100;

/// Surfaces with a factor of safety under this fail
pub const MIN_FACTOR_OF_SAFETY: f64 = 1.0;

/// Sentinel: this surface has no valid factor of safety
pub const FOS_NOT_VALID: f64 = -1.0;

/// Sentinel: this surface already failed this step, skip it
pub const FOS_IGNORE: f64 = -2.0;

/// Sentinel elevation: no candidate arc passes through this column
pub const NO_FAIL_SURFACE: f64 = f64::MAX;

/// Whether a cached factor of safety is a real value
pub fn fos_is_valid(fos: f64) -> bool {
    fos >= 0.0
}

/// Error types for the failure engine. A Janbu root that is not
/// bracketed is not an error: it surfaces as the [`FOS_NOT_VALID`]
/// sentinel and the arc is skipped.
#[derive(Debug, thiserror::Error)]
pub enum FailureError {
    #[error("Invalid parameter: {0}")]
    InvalidParameter(String),

    #[error("Failure engine needs a 1-D profile")]
    NotOneDimensional,

    #[error(transparent)]
    Core(#[from] sedimar_core::CoreError),
}

pub type Result<T> = std::result::Result<T, FailureError>;
