//! Estimation table writer.

use crate::error::{DatasetError, DatasetResult};
use chrono::NaiveDateTime;
use lib_types::{EstimationRecord, TableShape};
use ndarray::{s, Array2, ArrayView1, ArrayView2};
use std::fs::File;
use std::io::{BufWriter, Write};
use std::path::{Path, PathBuf};

/// Default output directory.
pub const DEFAULT_OUTPUT_DIR: &str = "EstimationResult";

/// Default output file name prefix.
pub const DEFAULT_FILE_PREFIX: &str = "EstimationResult";

/// Time stamp layout embedded in output file names.
pub const TIMESTAMP_FORMAT: &str = "%Y%m%d%H%M%S";

/// Preallocated estimation table, filled one row at a time in input order.
#[derive(Clone, Debug)]
pub struct EstimationTable {
    data: Array2<f64>,
    filled: usize,
}

impl EstimationTable {
    /// A table of `rows` rows, each holding a time stamp and `state_dim` values.
    pub fn new(rows: usize, state_dim: usize) -> Self {
        Self {
            data: Array2::zeros((rows, 1 + state_dim)),
            filled: 0,
        }
    }

    /// Append the next row.
    pub fn push(&mut self, record: EstimationRecord) -> DatasetResult<()> {
        if self.filled == self.data.nrows() {
            return Err(DatasetError::TableFull {
                capacity: self.data.nrows(),
            });
        }
        if record.width() != self.data.ncols() {
            return Err(DatasetError::WidthMismatch {
                expected: self.data.ncols(),
                actual: record.width(),
            });
        }

        let mut row = self.data.row_mut(self.filled);
        row[0] = record.time;
        row.slice_mut(s![1..])
            .iter_mut()
            .zip(record.state)
            .for_each(|(slot, value)| *slot = value);
        self.filled += 1;
        Ok(())
    }

    /// Number of rows filled so far.
    pub fn len(&self) -> usize {
        self.filled
    }

    pub fn is_empty(&self) -> bool {
        self.filled == 0
    }

    /// Whether every preallocated row has been filled.
    pub fn is_complete(&self) -> bool {
        self.filled == self.data.nrows()
    }

    /// Allocated shape, including rows not yet filled.
    pub fn shape(&self) -> TableShape {
        TableShape::new(self.data.nrows(), self.data.ncols())
    }

    /// The filled rows.
    pub fn filled_rows(&self) -> ArrayView2<'_, f64> {
        self.data.slice(s![..self.filled, ..])
    }
}

/// Format one row: values with six fractional digits, single-space separated.
pub fn format_row(row: ArrayView1<'_, f64>) -> String {
    row.iter()
        .map(|v| format!("{v:.6}"))
        .collect::<Vec<_>>()
        .join(" ")
}

/// Format a whole table, one newline-terminated line per row.
pub fn format_table(table: ArrayView2<'_, f64>) -> String {
    table
        .rows()
        .into_iter()
        .map(|row| format_row(row) + "\n")
        .collect()
}

/// File name for a run started at `timestamp`.
pub fn output_file_name(prefix: &str, timestamp: &NaiveDateTime) -> String {
    format!("{prefix}_{}.txt", timestamp.format(TIMESTAMP_FORMAT))
}

/// Write the filled rows of `table` into `dir`, creating it if needed.
///
/// The file is named `<prefix>_<YYYYmmddHHMMSS>.txt`. If that name is already
/// taken (two runs in the same second) a `_1`, `_2`, ... suffix is added.
/// Returns the path written.
pub fn write_estimations(
    dir: &Path,
    prefix: &str,
    table: &EstimationTable,
    timestamp: &NaiveDateTime,
) -> DatasetResult<PathBuf> {
    std::fs::create_dir_all(dir).map_err(|e| DatasetError::write(dir, e))?;

    let path = unique_path(dir, &output_file_name(prefix, timestamp));
    write_table(&path, table.filled_rows()).map_err(|e| DatasetError::write(&path, e))?;

    tracing::info!(
        path = %path.display(),
        rows = table.len(),
        columns = table.shape().columns,
        "Estimation data has been written"
    );

    Ok(path)
}

fn write_table(path: &Path, table: ArrayView2<'_, f64>) -> std::io::Result<()> {
    let mut writer = BufWriter::new(File::create(path)?);
    for row in table.rows() {
        writeln!(writer, "{}", format_row(row))?;
    }
    writer.flush()
}

fn unique_path(dir: &Path, file_name: &str) -> PathBuf {
    let candidate = dir.join(file_name);
    if !candidate.exists() {
        return candidate;
    }

    let stem = file_name.strip_suffix(".txt").unwrap_or(file_name);
    (1..)
        .map(|n| dir.join(format!("{stem}_{n}.txt")))
        .find(|path| !path.exists())
        .unwrap_or(candidate)
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::NaiveDate;

    fn timestamp() -> NaiveDateTime {
        NaiveDate::from_ymd_opt(2025, 11, 5)
            .and_then(|d| d.and_hms_opt(14, 3, 9))
            .unwrap()
    }

    fn sample_table() -> EstimationTable {
        let mut table = EstimationTable::new(2, 4);
        table
            .push(EstimationRecord::new(0.005, vec![1.0, -0.25, 1.0 / 3.0, 0.0]))
            .unwrap();
        table
            .push(EstimationRecord::new(0.01, vec![2.0, 0.5, 1e-7, -1.5]))
            .unwrap();
        table
    }

    #[test]
    fn test_format_six_fractional_digits() {
        let table = sample_table();
        assert!(table.is_complete());
        assert_eq!(
            format_table(table.filled_rows()),
            "0.005000 1.000000 -0.250000 0.333333 0.000000\n\
             0.010000 2.000000 0.500000 0.000000 -1.500000\n"
        );
    }

    #[test]
    fn test_push_checks_width_and_capacity() {
        let mut table = EstimationTable::new(1, 4);
        let err = table
            .push(EstimationRecord::new(0.0, vec![1.0, 2.0]))
            .unwrap_err();
        assert!(matches!(err, DatasetError::WidthMismatch { expected: 5, actual: 3 }));

        table.push(EstimationRecord::new(0.0, vec![0.0; 4])).unwrap();
        let err = table.push(EstimationRecord::new(0.1, vec![0.0; 4])).unwrap_err();
        assert!(matches!(err, DatasetError::TableFull { capacity: 1 }));
    }

    #[test]
    fn test_output_file_name() {
        assert_eq!(
            output_file_name(DEFAULT_FILE_PREFIX, &timestamp()),
            "EstimationResult_20251105140309.txt"
        );
    }

    #[test]
    fn test_write_creates_directory() {
        let root = tempfile::tempdir().unwrap();
        let dir = root.path().join("nested").join(DEFAULT_OUTPUT_DIR);

        let path = write_estimations(&dir, DEFAULT_FILE_PREFIX, &sample_table(), &timestamp())
            .unwrap();
        assert_eq!(path, dir.join("EstimationResult_20251105140309.txt"));

        let written = std::fs::read_to_string(&path).unwrap();
        assert_eq!(written, format_table(sample_table().filled_rows()));
        assert_eq!(written.lines().count(), 2);
        assert!(written
            .lines()
            .all(|line| line.split(' ').count() == 5));
    }

    #[test]
    fn test_same_second_runs_do_not_overwrite() {
        let dir = tempfile::tempdir().unwrap();
        let first =
            write_estimations(dir.path(), "Run", &sample_table(), &timestamp()).unwrap();
        let second =
            write_estimations(dir.path(), "Run", &sample_table(), &timestamp()).unwrap();

        assert_ne!(first, second);
        assert_eq!(
            second.file_name().unwrap().to_str().unwrap(),
            "Run_20251105140309_1.txt"
        );
        assert_eq!(
            std::fs::read(&first).unwrap(),
            std::fs::read(&second).unwrap()
        );
    }

    #[test]
    fn test_write_failure_names_path() {
        let dir = tempfile::tempdir().unwrap();
        let blocker = dir.path().join("occupied");
        std::fs::write(&blocker, b"not a directory").unwrap();

        let err = write_estimations(&blocker, "Run", &sample_table(), &timestamp())
            .unwrap_err();
        assert!(err.is_write_error());
        assert!(err.to_string().contains("occupied"));
    }
}
