use std::path::Path;

use calamine::{open_workbook, Data, Reader, Xlsx};
use tracing::debug;

use crate::errors::WorksheetError;

/// One worksheet row: a SEI process number plus the instrument number used
/// to locate the matching document folders on disk.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TaskRecord {
    pub process: String,
    pub instrument: String,
}

/// Read the task rows from the first sheet of an `.xlsx` worksheet.
///
/// The two columns are located by header text on the first row. Rows whose
/// process cell is empty are dropped; a row with a process but no instrument
/// is kept with an empty instrument so the batch runner can warn about it.
/// Duplicate process numbers are kept — they are distinct units of work.
pub fn read_tasks(
    path: &Path,
    process_column: &str,
    instrument_column: &str,
) -> Result<Vec<TaskRecord>, WorksheetError> {
    let mut workbook: Xlsx<_> = open_workbook(path)
        .map_err(|e| WorksheetError::Open(format!("{}: {e}", path.display())))?;

    let range = workbook
        .worksheet_range_at(0)
        .ok_or_else(|| WorksheetError::NoSheet(path.display().to_string()))?
        .map_err(|e| WorksheetError::Open(format!("{}: {e}", path.display())))?;

    let mut rows = range.rows();
    let header = rows
        .next()
        .ok_or_else(|| WorksheetError::MissingColumn(process_column.to_string()))?;

    let position = |name: &str| {
        header
            .iter()
            .position(|cell| cell_text(cell).trim() == name)
    };
    let process_idx = position(process_column)
        .ok_or_else(|| WorksheetError::MissingColumn(process_column.to_string()))?;
    let instrument_idx = position(instrument_column)
        .ok_or_else(|| WorksheetError::MissingColumn(instrument_column.to_string()))?;

    let mut tasks = Vec::new();
    for row in rows {
        let process = row.get(process_idx).map(cell_text).unwrap_or_default();
        let process = process.trim();
        if process.is_empty() {
            continue;
        }
        let instrument = row
            .get(instrument_idx)
            .map(cell_text)
            .unwrap_or_default()
            .trim()
            .to_string();
        tasks.push(TaskRecord {
            process: process.to_string(),
            instrument,
        });
    }

    debug!("worksheet yielded {} task rows", tasks.len());
    Ok(tasks)
}

/// Render a cell the way it displays. Instrument numbers are frequently
/// typed as numbers, so integral floats drop the decimal point.
fn cell_text(cell: &Data) -> String {
    match cell {
        Data::String(s) => s.clone(),
        Data::Float(f) if f.fract() == 0.0 => format!("{}", *f as i64),
        Data::Float(f) => f.to_string(),
        Data::Int(i) => i.to_string(),
        Data::Empty => String::new(),
        other => other.to_string(),
    }
}
