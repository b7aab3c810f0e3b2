//! Raw tabular view of the relay study CSV export
//!
//! The export is ragged: every row may have a different number of cells and
//! the layout carries no header. All access is positional and forgiving, so
//! out-of-range lookups read as empty text instead of failing.

use super::ConversionError;

/// Immutable, 0-indexed rows of text cells as produced by the CSV reader
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct RawTable {
    rows: Vec<Vec<String>>,
}

impl RawTable {
    pub fn new(rows: Vec<Vec<String>>) -> Self {
        Self { rows }
    }

    /// Read a CSV export without headers, accepting rows of any length
    pub fn from_csv_bytes(data: &[u8]) -> Result<Self, ConversionError> {
        let mut reader = csv::ReaderBuilder::new()
            .has_headers(false)
            .flexible(true)
            .from_reader(data);

        // Byte records: a stray non-UTF-8 byte must not abort the conversion
        let mut rows = Vec::new();
        for (index, record) in reader.byte_records().enumerate() {
            let record = record.map_err(|e| ConversionError::CsvRead {
                message: format!("row {}: {e}", index + 1),
            })?;
            rows.push(record.iter().map(decode_field).collect());
        }

        Ok(Self { rows })
    }

    pub fn len(&self) -> usize {
        self.rows.len()
    }

    pub fn is_empty(&self) -> bool {
        self.rows.is_empty()
    }

    /// Cell text with non-breaking spaces folded and surrounding whitespace
    /// trimmed; missing rows or columns read as ""
    pub fn cell(&self, row: usize, col: usize) -> String {
        self.rows
            .get(row)
            .and_then(|cells| cells.get(col))
            .map(|value| value.replace('\u{00A0}', " ").trim().to_string())
            .unwrap_or_default()
    }

    /// Raw cells of a row, or an empty slice past the end of the table
    pub fn row(&self, row: usize) -> &[String] {
        self.rows.get(row).map_or(&[], Vec::as_slice)
    }

    /// The row's cells joined with commas and trimmed, used for marker search
    pub fn joined_row(&self, row: usize) -> String {
        self.row(row).join(",").trim().to_string()
    }
}

/// UTF-8 fields pass through; anything else is treated as a single-byte
/// export, with 0xA0 read as a space and other invalid bytes replaced
fn decode_field(field: &[u8]) -> String {
    match std::str::from_utf8(field) {
        Ok(text) => text.to_string(),
        Err(_) => {
            let folded: Vec<u8> = field
                .iter()
                .map(|&byte| if byte == 0xA0 { b' ' } else { byte })
                .collect();
            String::from_utf8_lossy(&folded).into_owned()
        }
    }
}

impl From<Vec<Vec<&str>>> for RawTable {
    fn from(rows: Vec<Vec<&str>>) -> Self {
        Self::new(
            rows.into_iter()
                .map(|cells| cells.into_iter().map(str::to_string).collect())
                .collect(),
        )
    }
}
