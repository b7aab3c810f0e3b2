//! A1-style cell addresses, merged regions and write-target resolution

use std::fmt;

use super::ConversionError;

/// Zero-based (row, column) coordinates of a worksheet cell
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct CellPosition {
    pub row: u32,
    pub col: u32,
}

impl CellPosition {
    pub fn new(row: u32, col: u32) -> Self {
        Self { row, col }
    }

    /// Parse "E6", "AA1" or "$R$15" into zero-based coordinates
    pub fn parse(address: &str) -> Result<Self, ConversionError> {
        let invalid = || ConversionError::InvalidAddress {
            address: address.to_string(),
        };

        let cleaned: String = address
            .trim()
            .chars()
            .filter(|c| *c != '$')
            .collect::<String>()
            .to_ascii_uppercase();
        let split = cleaned
            .find(|c: char| c.is_ascii_digit())
            .ok_or_else(invalid)?;
        let (letters, digits) = cleaned.split_at(split);

        if letters.is_empty() || !letters.chars().all(|c| c.is_ascii_uppercase()) {
            return Err(invalid());
        }
        if !digits.chars().all(|c| c.is_ascii_digit()) {
            return Err(invalid());
        }

        let mut col: u32 = 0;
        for byte in letters.bytes() {
            col = col
                .checked_mul(26)
                .and_then(|c| c.checked_add(u32::from(byte - b'A') + 1))
                .ok_or_else(invalid)?;
        }
        let row: u32 = digits.parse().map_err(|_| invalid())?;
        if row == 0 {
            return Err(invalid());
        }

        Ok(Self {
            row: row - 1,
            col: col - 1,
        })
    }

    /// One-based (column, row) pair as used by the xlsx writer
    pub fn to_one_based(self) -> (u32, u32) {
        (self.col + 1, self.row + 1)
    }
}

impl fmt::Display for CellPosition {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}{}", column_letters(self.col), self.row + 1)
    }
}

/// Convert a zero-based column index into its letters (0 = "A", 26 = "AA")
pub fn column_letters(col: u32) -> String {
    let mut remaining = col + 1;
    let mut letters = Vec::new();
    while remaining > 0 {
        remaining -= 1;
        #[allow(clippy::cast_possible_truncation)]
        letters.push(char::from(b'A' + (remaining % 26) as u8));
        remaining /= 26;
    }
    letters.iter().rev().collect()
}

/// Rectangular span of cells that the template presents as one cell
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct MergedRegion {
    pub first: CellPosition,
    pub last: CellPosition,
}

impl MergedRegion {
    /// Parse "D20:F20"; corners given in any order are normalized
    pub fn parse(range: &str) -> Result<Self, ConversionError> {
        let (start, end) = range.split_once(':').unwrap_or((range, range));
        let a = CellPosition::parse(start)?;
        let b = CellPosition::parse(end)?;
        Ok(Self {
            first: CellPosition::new(a.row.min(b.row), a.col.min(b.col)),
            last: CellPosition::new(a.row.max(b.row), a.col.max(b.col)),
        })
    }

    pub fn contains(&self, cell: CellPosition) -> bool {
        (self.first.row..=self.last.row).contains(&cell.row)
            && (self.first.col..=self.last.col).contains(&cell.col)
    }
}

/// Resolve the writable cell for `address`: the anchor (top-left) of the
/// merged region containing it, or the address itself
pub fn resolve(merged: &[MergedRegion], address: &str) -> Result<CellPosition, ConversionError> {
    let target = CellPosition::parse(address)?;
    Ok(resolve_position(merged, target))
}

pub fn resolve_position(merged: &[MergedRegion], target: CellPosition) -> CellPosition {
    merged
        .iter()
        .find(|region| region.contains(target))
        .map_or(target, |region| region.first)
}
