//! Single-row summary tables.

use std::path::Path;

use crate::StorageError;
use crate::paths::ensure_parent;

/// Writes `(label, value)` pairs as a one-row CSV: the labels form the
/// header and the values the single data row. Missing values are left
/// empty.
///
/// # Errors
///
/// Returns [`StorageError`] if the file cannot be created or written.
pub fn write_summary_csv(
    path: &Path,
    values: &[(String, Option<f64>)],
) -> Result<(), StorageError> {
    ensure_parent(path)?;
    let mut writer = csv::Writer::from_path(path)?;

    writer.write_record(values.iter().map(|(label, _)| label.as_str()))?;
    writer.write_record(
        values
            .iter()
            .map(|(_, value)| value.map_or_else(String::new, |v| v.to_string())),
    )?;
    writer.flush()?;

    log::info!("Wrote {} summary values to {}", values.len(), path.display());
    Ok(())
}

/// Reads a summary written by [`write_summary_csv`]. Empty or non-numeric
/// cells read as `None`.
///
/// # Errors
///
/// Returns [`StorageError`] if the file cannot be read, or
/// [`StorageError::Schema`] if it has no data row.
pub fn read_summary_csv(path: &Path) -> Result<Vec<(String, Option<f64>)>, StorageError> {
    let mut reader = csv::Reader::from_path(path)?;
    let headers = reader.headers()?.clone();
    let row = reader
        .records()
        .next()
        .transpose()?
        .ok_or_else(|| StorageError::Schema {
            message: format!("{} has no data row", path.display()),
        })?;

    Ok(headers
        .iter()
        .zip(row.iter())
        .map(|(label, cell)| (label.to_string(), cell.trim().parse::<f64>().ok()))
        .collect())
}
