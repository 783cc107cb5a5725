//! # lib-dataset
//!
//! Fixed-shape numeric tables for estimator port runs.
//!
//! - **Reader**: whitespace-separated observation tables (time plus Nz
//!   observation components), shape-checked before anything else happens
//! - **Writer**: estimation tables (time plus Nx state components) written
//!   with six fractional digits to a timestamped file

pub mod error;
pub mod reader;
pub mod writer;

pub use error::{DatasetError, DatasetResult};
pub use reader::{parse_table, read_observations, ObservationTable};
pub use writer::{format_table, write_estimations, EstimationTable};
