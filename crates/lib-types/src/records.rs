//! Row-level records and table shapes.

use serde::{Deserialize, Serialize};
use std::fmt;

/// Default number of rows in both the observation and estimation tables.
pub const DATA_ROWS: usize = 1000;

/// Default observation dimension (Nz).
pub const OBSERVATION_DIMENSION: usize = 2;

/// Default state dimension (Nx).
pub const STATE_DIMENSION: usize = 4;

/// One input row: a time stamp and an Nz-dimensional observation.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct ObservationRecord {
    /// Time stamp (column 0 of the input table).
    pub time: f64,

    /// Observation vector (columns 1..=Nz).
    pub observation: Vec<f64>,
}

/// One output row: a time stamp and an Nx-dimensional state estimate.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct EstimationRecord {
    /// Time stamp copied from the matching observation row.
    pub time: f64,

    /// Estimated state vector.
    pub state: Vec<f64>,
}

impl EstimationRecord {
    /// Pair an estimate with the time stamp of the observation that produced it.
    pub fn new(time: f64, state: Vec<f64>) -> Self {
        Self { time, state }
    }

    /// Number of columns this record occupies in the output table.
    pub fn width(&self) -> usize {
        1 + self.state.len()
    }
}

/// Estimator dimensions, populated by the native module during initialization.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct Dimensions {
    /// State dimension.
    pub nx: usize,

    /// Observation dimension.
    pub nz: usize,
}

impl Dimensions {
    pub fn new(nx: usize, nz: usize) -> Self {
        Self { nx, nz }
    }

    /// Shape of an observation table with `rows` rows for these dimensions.
    pub fn observation_shape(&self, rows: usize) -> TableShape {
        TableShape::new(rows, 1 + self.nz)
    }

    /// Shape of an estimation table with `rows` rows for these dimensions.
    pub fn estimation_shape(&self, rows: usize) -> TableShape {
        TableShape::new(rows, 1 + self.nx)
    }
}

impl Default for Dimensions {
    fn default() -> Self {
        Self::new(STATE_DIMENSION, OBSERVATION_DIMENSION)
    }
}

/// Fixed shape of a numeric table.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct TableShape {
    pub rows: usize,
    pub columns: usize,
}

impl TableShape {
    pub const fn new(rows: usize, columns: usize) -> Self {
        Self { rows, columns }
    }

    /// The canonical observation table: time plus two observation components.
    pub const OBSERVATIONS: TableShape = TableShape::new(DATA_ROWS, 1 + OBSERVATION_DIMENSION);

    /// The canonical estimation table: time plus four state components.
    pub const ESTIMATIONS: TableShape = TableShape::new(DATA_ROWS, 1 + STATE_DIMENSION);
}

impl fmt::Display for TableShape {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} rows x {} columns", self.rows, self.columns)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_canonical_shapes() {
        assert_eq!(TableShape::OBSERVATIONS, TableShape::new(1000, 3));
        assert_eq!(TableShape::ESTIMATIONS, TableShape::new(1000, 5));
    }

    #[test]
    fn test_shapes_follow_dimensions() {
        let dims = Dimensions::default();
        assert_eq!(dims.observation_shape(DATA_ROWS), TableShape::OBSERVATIONS);
        assert_eq!(dims.estimation_shape(DATA_ROWS), TableShape::ESTIMATIONS);
    }

    #[test]
    fn test_record_width() {
        let record = EstimationRecord::new(0.5, vec![1.0, 2.0, 3.0, 4.0]);
        assert_eq!(record.width(), 5);
        assert_eq!(TableShape::new(2, 5).to_string(), "2 rows x 5 columns");
    }
}
