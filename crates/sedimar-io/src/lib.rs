//! SEDIMAR I/O - configuration and file formats
//!
//! - [`scanner`] - the KEY : VALUE configuration format
//! - [`bathy`] - delimited bathymetry profiles
//! - [`flood`] - hydrograph record sequences
//! - [`property`] - binary full-cube property dumps
//! - [`tripod`] - measurement probes and their binary record files

pub mod bathy;
pub mod flood;
pub mod property;
pub mod scanner;
pub mod tripod;

pub use bathy::Bathymetry;
pub use flood::read_flood_records;
pub use property::{CellProperty, PropertyFile};
pub use scanner::SymbolTable;
pub use tripod::{Measurement, Tripod, TripodFile};

/// Error types for configuration and file handling
#[derive(Debug, thiserror::Error)]
pub enum IoError {
    #[error("Could not open {path}: {source}")]
    File {
        path: String,
        #[source]
        source: std::io::Error,
    },

    #[error(transparent)]
    Write(#[from] std::io::Error),

    #[error("Missing key: {0}")]
    MissingKey(String),

    #[error("Bad value for {key}: {value}")]
    BadValue { key: String, value: String },

    #[error("Bathymetry positions must increase strictly (row {0})")]
    NonMonotonic(usize),

    #[error("Bathymetry needs at least one position at or before zero")]
    InsufficientRange,

    #[error("Expected {expected} columns, found {found} (row {row})")]
    WrongColumnCount {
        expected: usize,
        found: usize,
        row: usize,
    },

    #[error("Unknown measurement: {0}")]
    UnknownMeasurement(String),
}

pub type Result<T> = std::result::Result<T, IoError>;
