//! # lib-types
//!
//! Core type definitions shared across the estimator port workspace:
//! - Observation and estimation records flowing through a batch run
//! - Table shapes and estimator dimensions
//! - Lifecycle state and port information for a native estimator session

pub mod records;
pub mod lifecycle;

pub use records::*;
pub use lifecycle::*;
