//! Observation table reader.
//!
//! Input format: plain text, one row per line, values separated by spaces
//! or tabs. Column 0 is the time stamp; the remaining columns form the
//! observation vector. Blank lines and lines starting with `#` are skipped.
//!
//! ```text
//! 0.005000 1.002311 0.998741
//! 0.010000 1.004120 0.997902
//! ```

use crate::error::{DatasetError, DatasetResult};
use lib_types::{ObservationRecord, TableShape};
use ndarray::{s, Array2, ArrayView1};
use nom::{
    character::complete::{space0, space1},
    multi::separated_list1,
    number::complete::double,
    sequence::preceded,
    IResult, Parser,
};
use std::path::Path;

/// A validated observation table.
#[derive(Clone, Debug, PartialEq)]
pub struct ObservationTable {
    data: Array2<f64>,
}

impl ObservationTable {
    /// Wrap a table with a time column and at least one observation column.
    pub fn new(data: Array2<f64>) -> DatasetResult<Self> {
        if data.ncols() < 2 {
            return Err(DatasetError::WidthMismatch {
                expected: 2,
                actual: data.ncols(),
            });
        }
        Ok(Self { data })
    }

    /// Number of rows.
    pub fn len(&self) -> usize {
        self.data.nrows()
    }

    pub fn is_empty(&self) -> bool {
        self.data.nrows() == 0
    }

    /// Width of the observation vector (Nz).
    pub fn observation_dim(&self) -> usize {
        self.data.ncols() - 1
    }

    pub fn shape(&self) -> TableShape {
        TableShape::new(self.data.nrows(), self.data.ncols())
    }

    /// Time stamp of one row.
    pub fn time(&self, row: usize) -> f64 {
        self.data[[row, 0]]
    }

    /// The time column.
    pub fn times(&self) -> ArrayView1<'_, f64> {
        self.data.column(0)
    }

    /// Observation vector of one row.
    pub fn observation(&self, row: usize) -> ArrayView1<'_, f64> {
        self.data.slice(s![row, 1..])
    }

    /// Rows in ascending order as owned records.
    pub fn records(&self) -> impl Iterator<Item = ObservationRecord> + '_ {
        self.data.rows().into_iter().map(|row| ObservationRecord {
            time: row[0],
            observation: row.slice(s![1..]).to_vec(),
        })
    }

    /// The underlying table.
    pub fn as_array(&self) -> &Array2<f64> {
        &self.data
    }
}

/// Read an observation table and check it has exactly `expected` shape.
///
/// Nothing else happens until the shape is confirmed; a missing file, a
/// malformed token, a ragged row or a wrong shape are all rejected here.
pub fn read_observations(path: &Path, expected: TableShape) -> DatasetResult<ObservationTable> {
    let content = std::fs::read_to_string(path).map_err(|e| DatasetError::io(path, e))?;
    let data = parse_table(&content)?;

    let actual = TableShape::new(data.nrows(), data.ncols());
    if actual != expected {
        return Err(DatasetError::ShapeMismatch {
            path: path.to_path_buf(),
            expected,
            actual,
        });
    }

    tracing::info!(
        path = %path.display(),
        rows = actual.rows,
        columns = actual.columns,
        "Loaded observation table"
    );

    ObservationTable::new(data)
}

/// Parse whitespace-separated numeric text into a table.
///
/// Every data row must have the same number of columns as the first one.
pub fn parse_table(content: &str) -> DatasetResult<Array2<f64>> {
    let mut values = Vec::new();
    let mut columns: Option<usize> = None;
    let mut rows = 0;

    for (index, raw) in content.lines().enumerate() {
        let line_number = index + 1;
        let line = raw.trim_end();
        let trimmed = line.trim_start();
        if trimmed.is_empty() || trimmed.starts_with('#') {
            continue;
        }

        let row = parse_line(line, line_number)?;
        match columns {
            None => columns = Some(row.len()),
            Some(expected) if expected != row.len() => {
                return Err(DatasetError::RaggedRow {
                    line: line_number,
                    expected,
                    actual: row.len(),
                });
            }
            Some(_) => {}
        }
        values.extend(row);
        rows += 1;
    }

    let columns = columns.unwrap_or(0);
    Array2::from_shape_vec((rows, columns), values)
        .map_err(|e| DatasetError::syntax(0, 0, format!("table assembly failed: {e}")))
}

fn parse_line(line: &str, line_number: usize) -> DatasetResult<Vec<f64>> {
    let column_of = |rest: &str| line.len() - rest.len() + 1;

    match data_row(line) {
        Ok(("", values)) => Ok(values),
        Ok((rest, _)) => Err(DatasetError::syntax(
            line_number,
            column_of(rest),
            format!("unexpected token '{}'", first_token(rest)),
        )),
        Err(nom::Err::Error(e)) | Err(nom::Err::Failure(e)) => Err(DatasetError::syntax(
            line_number,
            column_of(e.input),
            format!("expected a number at '{}'", first_token(e.input)),
        )),
        Err(nom::Err::Incomplete(_)) => {
            Err(DatasetError::syntax(line_number, 1, "incomplete row"))
        }
    }
}

fn first_token(input: &str) -> &str {
    input
        .trim_start()
        .split_whitespace()
        .next()
        .unwrap_or_default()
}

// ============================================================================
// Nom Parsers (nom 8 compatible)
// ============================================================================

fn data_row(input: &str) -> IResult<&str, Vec<f64>> {
    let (input, values) = preceded(space0, separated_list1(space1, double)).parse(input)?;
    let (input, _) = space0(input)?;
    Ok((input, values))
}
