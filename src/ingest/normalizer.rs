//! Row normalization for equipment uploads.
//!
//! Parses comma-separated input with a header row, checks that every
//! required column is present and coerces the measurement columns to
//! floating point. Rows whose measurements do not coerce are dropped; they
//! never fail the upload.

use crate::error::IngestError;
use crate::models::EquipmentRow;
use csv::StringRecord;
use tracing::debug;

pub const NAME_COLUMN: &str = "Equipment Name";
pub const TYPE_COLUMN: &str = "Type";
pub const FLOWRATE_COLUMN: &str = "Flowrate";
pub const PRESSURE_COLUMN: &str = "Pressure";
pub const TEMPERATURE_COLUMN: &str = "Temperature";

/// Required headers, in the order they are checked.
pub const REQUIRED_COLUMNS: [&str; 5] = [
    NAME_COLUMN,
    TYPE_COLUMN,
    FLOWRATE_COLUMN,
    PRESSURE_COLUMN,
    TEMPERATURE_COLUMN,
];

const UTF8_BOM: &[u8] = b"\xEF\xBB\xBF";

/// Result of normalizing one upload.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct NormalizedRows {
    /// Valid rows in source order.
    pub rows: Vec<EquipmentRow>,
    /// Data rows discarded because a measurement did not coerce.
    pub dropped: usize,
}

/// Header positions of the required columns.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
struct ColumnIndex {
    name: usize,
    category: usize,
    flowrate: usize,
    pressure: usize,
    temperature: usize,
}

impl ColumnIndex {
    /// Locate every required column by exact header match.
    ///
    /// Reports the first missing column in [`REQUIRED_COLUMNS`] order.
    fn locate(headers: &StringRecord) -> Result<Self, IngestError> {
        let mut positions = [0usize; 5];

        for (slot, column) in positions.iter_mut().zip(REQUIRED_COLUMNS) {
            *slot = headers
                .iter()
                .position(|h| h == column)
                .ok_or_else(|| IngestError::MissingColumn(column.to_string()))?;
        }

        let [name, category, flowrate, pressure, temperature] = positions;
        Ok(Self {
            name,
            category,
            flowrate,
            pressure,
            temperature,
        })
    }
}

/// Normalize raw upload bytes into equipment rows.
///
/// Fails with [`IngestError::InvalidFormat`] when the bytes are not
/// delimited text with a header row, and with
/// [`IngestError::MissingColumn`] when a required header is absent. Zero
/// valid rows is not an error.
pub fn normalize(input: &[u8]) -> Result<NormalizedRows, IngestError> {
    let (headers, records) = read_table(input)?;
    let columns = ColumnIndex::locate(&headers)?;

    let mut normalized = NormalizedRows::default();
    for (row_no, record) in records.iter().enumerate() {
        match coerce_row(record, &columns) {
            Some(row) => normalized.rows.push(row),
            None => {
                debug!("Dropping row {}: non-numeric measurement", row_no + 1);
                normalized.dropped += 1;
            }
        }
    }

    Ok(normalized)
}

/// Read the header and every data record, rejecting structurally broken input.
fn read_table(input: &[u8]) -> Result<(StringRecord, Vec<StringRecord>), IngestError> {
    let input = input.strip_prefix(UTF8_BOM).unwrap_or(input);

    let mut reader = csv::ReaderBuilder::new()
        .has_headers(true)
        .flexible(true)
        .from_reader(input);

    let headers = reader
        .headers()
        .map_err(|_| IngestError::InvalidFormat)?
        .clone();

    if headers.iter().all(str::is_empty) {
        return Err(IngestError::InvalidFormat);
    }

    let mut records = Vec::new();
    for result in reader.records() {
        let record = result.map_err(|_| IngestError::InvalidFormat)?;
        // Short rows are padded with empty cells; long rows have no header to map to.
        if record.len() > headers.len() {
            return Err(IngestError::InvalidFormat);
        }
        records.push(record);
    }

    Ok((headers, records))
}

fn coerce_row(record: &StringRecord, columns: &ColumnIndex) -> Option<EquipmentRow> {
    let cell = |idx: usize| record.get(idx).unwrap_or("");

    Some(EquipmentRow {
        name: cell(columns.name).to_string(),
        category: cell(columns.category).to_string(),
        flowrate: parse_measurement(cell(columns.flowrate))?,
        pressure: parse_measurement(cell(columns.pressure))?,
        temperature: parse_measurement(cell(columns.temperature))?,
    })
}

/// Parse a measurement cell. Only finite numbers are accepted.
pub fn parse_measurement(cell: &str) -> Option<f64> {
    cell.trim()
        .parse::<f64>()
        .ok()
        .filter(|value| value.is_finite())
}
