use std::path::Path;

use csv::{ReaderBuilder, StringRecord, Trim, WriterBuilder};
use pyro_types::{CandidateVector, FormatError, InitialDesign, OptimizationHistory, PyroResult};

/// Header names recognized as the objective-value column, compared
/// case-insensitively.
const VALUE_COLUMNS: [&str; 5] = ["f", "fval", "fvals", "value", "objective"];

/// Written by [`write_history`]; a non-empty cell marks a failed evaluation.
const ERROR_COLUMN: &str = "error";

/// Reads a recorded design table: one column per parameter (looked up by
/// name), rows are candidate points, optionally a value column.
#[derive(Debug, Clone)]
pub struct DesignLoader {
    value_columns: Vec<String>,
}

impl DesignLoader {
    pub fn new() -> Self {
        Self {
            value_columns: VALUE_COLUMNS.iter().map(|c| c.to_string()).collect(),
        }
    }

    /// Recognize an extra header as the value column.
    pub fn with_value_column(mut self, name: &str) -> Self {
        self.value_columns.push(name.to_lowercase());
        self
    }

    pub fn load<P: AsRef<Path>>(&self, path: P, param_names: &[String]) -> PyroResult<InitialDesign> {
        let path = path.as_ref();
        tracing::info!("Loading initial design from: {}", path.display());

        let mut rdr = ReaderBuilder::new()
            .has_headers(true)
            .trim(Trim::All)
            .from_path(path)
            .map_err(|e| FormatError::Read {
                path: path.display().to_string(),
                message: e.to_string(),
            })?;

        let headers = rdr.headers().map_err(csv_error(path))?.clone();
        tracing::debug!("Design headers: {:?}", headers);

        let columns = Self::param_columns(&headers, param_names)?;
        let value_idx = self.value_column(&headers, &columns);
        let error_idx = headers
            .iter()
            .enumerate()
            .position(|(i, h)| !columns.contains(&i) && h.eq_ignore_ascii_case(ERROR_COLUMN));

        let mut points: Vec<CandidateVector> = Vec::new();
        let mut fvals: Vec<f64> = Vec::new();

        for result in rdr.records() {
            let record = result.map_err(csv_error(path))?;
            let line = record.position().map(|p| p.line()).unwrap_or(0);

            let point = columns
                .iter()
                .zip(param_names)
                .map(|(&idx, name)| parse_cell(&record, idx, name, line, false))
                .collect::<Result<CandidateVector, FormatError>>()?;
            points.push(point);

            if let Some(idx) = value_idx {
                // A recorded failure is retried rather than resumed as a value.
                let failed = error_idx
                    .and_then(|e| record.get(e))
                    .is_some_and(|cell| !cell.is_empty());
                let value = parse_cell(&record, idx, &headers[idx], line, true)?;
                fvals.push(if failed { f64::NAN } else { value });
            }
        }

        if points.is_empty() {
            return Err(FormatError::Empty {
                path: path.display().to_string(),
            }
            .into());
        }

        tracing::info!(
            "Loaded {} design points ({} with values) from {}",
            points.len(),
            if value_idx.is_some() { fvals.len() } else { 0 },
            path.display()
        );

        match value_idx {
            Some(_) => InitialDesign::with_values(points, fvals),
            None => Ok(InitialDesign::new(points)),
        }
    }

    /// Position of each parameter column in the header.
    fn param_columns(headers: &StringRecord, param_names: &[String]) -> Result<Vec<usize>, FormatError> {
        param_names
            .iter()
            .map(|name| {
                headers
                    .iter()
                    .position(|h| h == name)
                    .ok_or_else(|| FormatError::MissingColumn {
                        column: name.clone(),
                    })
            })
            .collect()
    }

    fn value_column(&self, headers: &StringRecord, param_columns: &[usize]) -> Option<usize> {
        headers.iter().enumerate().position(|(i, h)| {
            let lower = h.to_lowercase();
            !param_columns.contains(&i) && self.value_columns.iter().any(|c| *c == lower)
        })
    }
}

impl Default for DesignLoader {
    fn default() -> Self {
        Self::new()
    }
}

fn parse_cell(
    record: &StringRecord,
    idx: usize,
    column: &str,
    line: u64,
    empty_is_unknown: bool,
) -> Result<f64, FormatError> {
    let raw = record.get(idx).unwrap_or("");
    if raw.is_empty() && empty_is_unknown {
        return Ok(f64::NAN);
    }
    raw.parse::<f64>().map_err(|_| FormatError::InvalidNumber {
        line,
        column: column.to_string(),
        value: raw.to_string(),
    })
}

fn csv_error(path: &Path) -> impl Fn(csv::Error) -> FormatError + '_ {
    move |e| match e.kind() {
        csv::ErrorKind::UnequalLengths {
            pos,
            expected_len,
            len,
        } => FormatError::InconsistentRow {
            line: pos.as_ref().map(|p| p.line()).unwrap_or(0),
            expected: *expected_len as usize,
            found: *len as usize,
        },
        _ => FormatError::Read {
            path: path.display().to_string(),
            message: e.to_string(),
        },
    }
}

/// Write points (and optionally their values) in the format
/// [`DesignLoader::load`] reads back exactly.
pub fn write_design<P: AsRef<Path>>(
    path: P,
    param_names: &[String],
    points: &[CandidateVector],
    values: Option<&[f64]>,
) -> PyroResult<()> {
    let path = path.as_ref();
    let mut wtr = WriterBuilder::new().from_path(path).map_err(|e| FormatError::Read {
        path: path.display().to_string(),
        message: e.to_string(),
    })?;

    let mut header: Vec<&str> = param_names.iter().map(String::as_str).collect();
    if values.is_some() {
        header.push("fval");
    }
    wtr.write_record(&header).map_err(csv_error(path))?;

    for (i, point) in points.iter().enumerate() {
        // `Display` for f64 is the shortest representation that round-trips.
        let mut row: Vec<String> = point.iter().map(|x| x.to_string()).collect();
        if let Some(values) = values {
            row.push(values.get(i).copied().unwrap_or(f64::NAN).to_string());
        }
        wtr.write_record(&row).map_err(csv_error(path))?;
    }
    wtr.flush()?;

    tracing::debug!("Wrote {} design rows to {}", points.len(), path.display());
    Ok(())
}

/// Write a full optimization history, with an `error` column describing failed
/// evaluations. The result can be fed back as an initial-design file.
pub fn write_history<P: AsRef<Path>>(
    path: P,
    param_names: &[String],
    history: &OptimizationHistory,
) -> PyroResult<()> {
    let path = path.as_ref();
    let mut wtr = WriterBuilder::new().from_path(path).map_err(|e| FormatError::Read {
        path: path.display().to_string(),
        message: e.to_string(),
    })?;

    let mut header: Vec<&str> = param_names.iter().map(String::as_str).collect();
    header.push("fval");
    header.push(ERROR_COLUMN);
    wtr.write_record(&header).map_err(csv_error(path))?;

    for ((point, value), error) in history.xi().iter().zip(history.fi()).zip(history.errors()) {
        let mut row: Vec<String> = point.iter().map(|x| x.to_string()).collect();
        row.push(value.to_string());
        row.push(error.as_ref().map(|e| e.to_string()).unwrap_or_default());
        wtr.write_record(&row).map_err(csv_error(path))?;
    }
    wtr.flush()?;

    tracing::info!("Wrote {} history rows to {}", history.len(), path.display());
    Ok(())
}
