// THEORY:
// The `SampleTable` is the editable form of an angle series: one row per step,
// holding the time at the end of the step and the step's instantaneous angular
// velocity. It exists for the outlier-editing workflow:
//
// 1.  The analysis exports the table (CSV, UTF-8 with a byte-order mark so
//     spreadsheet programs pick the right encoding).
// 2.  The user deletes rows that are obviously wrong (a reflection picked up
//     as the marker for one frame) or blanks out individual cells.
// 3.  The edited table comes back as a plain value and is handed to the
//     integral reducer. Blank or unparsable velocities become missing values,
//     filled with the mean of the valid ones at reduction time.
//
// The table is owned by whoever edits it. The reducers only read a snapshot.

use crate::core_modules::angle_series::AngleSeries;
use crate::error::{Result, VisionError};
use serde::Serialize;
use std::fs::File;
use std::io::{BufRead, BufReader, BufWriter, Write};
use std::path::Path;

const BOM: &str = "\u{feff}";

#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct TableRow {
    /// Stable row identifier (the sample's position in its series).
    pub index: usize,
    pub time: f64,
    /// Instantaneous angular velocity, rad/s; `None` when missing or invalid.
    pub omega: Option<f64>,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct SampleTable {
    rows: Vec<TableRow>,
}

impl SampleTable {
    /// One row per sample that carries a velocity (every sample but the first).
    pub fn from_series(series: &AngleSeries) -> Self {
        let rows = series
            .samples()
            .iter()
            .enumerate()
            .filter_map(|(index, sample)| {
                sample.omega.map(|omega| TableRow {
                    index,
                    time: sample.time,
                    omega: omega.is_finite().then_some(omega),
                })
            })
            .collect();
        Self { rows }
    }

    pub fn from_rows(rows: Vec<TableRow>) -> Self {
        Self { rows }
    }

    pub fn rows(&self) -> &[TableRow] {
        &self.rows
    }

    pub fn len(&self) -> usize {
        self.rows.len()
    }

    pub fn is_empty(&self) -> bool {
        self.rows.is_empty()
    }

    /// Removes every row whose `index` is listed. Returns how many were removed.
    pub fn remove_rows(&mut self, indices: &[usize]) -> usize {
        let before = self.rows.len();
        self.rows.retain(|row| !indices.contains(&row.index));
        before - self.rows.len()
    }

    /// Overwrites one row's velocity. Returns false if no row has that index.
    pub fn set_omega(&mut self, index: usize, omega: Option<f64>) -> bool {
        match self.rows.iter_mut().find(|row| row.index == index) {
            Some(row) => {
                row.omega = omega.filter(|value| value.is_finite());
                true
            }
            None => false,
        }
    }

    /// Mean of the valid velocities, if there is at least one.
    pub fn valid_mean(&self) -> Option<f64> {
        let valid: Vec<f64> = self
            .rows
            .iter()
            .filter_map(|row| row.omega)
            .filter(|omega| omega.is_finite())
            .collect();
        if valid.is_empty() {
            return None;
        }
        Some(valid.iter().sum::<f64>() / valid.len() as f64)
    }

    /// `(time, omega)` pairs sorted by time with missing velocities replaced by
    /// the mean of the valid ones. `None` if rows exist but none is valid.
    pub fn filled(&self) -> Option<Vec<(f64, f64)>> {
        if self.rows.is_empty() {
            return Some(Vec::new());
        }
        let mean = self.valid_mean()?;
        let mut filled: Vec<(f64, f64)> = self
            .rows
            .iter()
            .map(|row| {
                let omega = row.omega.filter(|value| value.is_finite()).unwrap_or(mean);
                (row.time, omega)
            })
            .collect();
        filled.sort_by(|a, b| a.0.total_cmp(&b.0));
        Some(filled)
    }

    /// Writes `time,omega` (or `index,time,omega`) with a leading byte-order mark.
    pub fn write_csv<W: Write>(&self, writer: &mut W, with_index: bool) -> Result<()> {
        write!(writer, "{BOM}")?;
        if with_index {
            writeln!(writer, "index,time,omega")?;
        } else {
            writeln!(writer, "time,omega")?;
        }
        for row in &self.rows {
            let omega = row.omega.map(|value| value.to_string()).unwrap_or_default();
            if with_index {
                writeln!(writer, "{},{},{}", row.index, row.time, omega)?;
            } else {
                writeln!(writer, "{},{}", row.time, omega)?;
            }
        }
        Ok(())
    }

    pub fn save_csv<P: AsRef<Path>>(&self, path: P, with_index: bool) -> Result<()> {
        let mut writer = BufWriter::new(File::create(path)?);
        self.write_csv(&mut writer, with_index)?;
        writer.flush()?;
        Ok(())
    }

    /// Reads a table written by `write_csv` or edited in a spreadsheet.
    ///
    /// - The header must name `time` and `omega`; an `index` column (or an
    ///   unnamed first column, as dataframe exports write it) is optional.
    /// - Rows without a parsable time are errors; rows with a blank or
    ///   unparsable velocity keep the time and mark the velocity missing.
    /// - Blank lines are skipped.
    pub fn read_csv<R: BufRead>(reader: R) -> Result<Self> {
        let mut lines = reader.lines().enumerate();

        let header = loop {
            match lines.next() {
                Some((_, line)) => {
                    let line = line?;
                    let line = line.trim_start_matches(BOM).trim().to_string();
                    if !line.is_empty() {
                        break line;
                    }
                }
                None => return Ok(Self::default()),
            }
        };

        let columns: Vec<String> = header
            .split(',')
            .map(|name| unquote(name).to_ascii_lowercase())
            .collect();
        let position = |name: &str| columns.iter().position(|column| column == name);
        let time_column = position("time").ok_or_else(|| VisionError::Csv {
            line: 1,
            reason: "header has no `time` column".to_string(),
        })?;
        let omega_column = position("omega").ok_or_else(|| VisionError::Csv {
            line: 1,
            reason: "header has no `omega` column".to_string(),
        })?;
        let index_column = position("index").or_else(|| {
            columns
                .first()
                .filter(|name| name.is_empty())
                .map(|_| 0)
        });

        let mut rows = Vec::new();
        for (line_number, line) in lines {
            let line = line?;
            if line.trim().is_empty() {
                continue;
            }
            let cells: Vec<&str> = line.split(',').map(unquote).collect();
            let line = line_number + 1;

            let time = cells
                .get(time_column)
                .and_then(|cell| cell.parse::<f64>().ok())
                .filter(|time| time.is_finite())
                .ok_or_else(|| VisionError::Csv {
                    line,
                    reason: "missing or invalid time".to_string(),
                })?;
            let omega = cells
                .get(omega_column)
                .and_then(|cell| cell.parse::<f64>().ok())
                .filter(|omega| omega.is_finite());
            let index = index_column
                .and_then(|column| cells.get(column))
                .and_then(|cell| cell.parse::<usize>().ok())
                .unwrap_or(rows.len());

            rows.push(TableRow { index, time, omega });
        }

        Ok(Self { rows })
    }

    pub fn load_csv<P: AsRef<Path>>(path: P) -> Result<Self> {
        Self::read_csv(BufReader::new(File::open(path)?))
    }
}

/// Trims a cell and drops one pair of surrounding double quotes.
fn unquote(cell: &str) -> &str {
    let cell = cell.trim();
    cell.strip_prefix('"')
        .and_then(|inner| inner.strip_suffix('"'))
        .map(str::trim)
        .unwrap_or(cell)
}
