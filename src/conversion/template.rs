//! Workbook access used by the populator
//!
//! The populator only needs merged regions, cell creation by coordinate and
//! number/text writes. Those operations are expressed as traits so the
//! mapping logic stays independent of the xlsx library; [`TemplateBook`] is the
//! `umya_spreadsheet` backed implementation used for real conversions.

use std::io::Cursor;

use umya_spreadsheet::{Spreadsheet, Worksheet};

use super::address::{CellPosition, MergedRegion};
use super::{ConversionError, container};

pub trait TemplateSheet {
    fn merged_regions(&self) -> Vec<MergedRegion>;

    /// Store a number, creating the row and cell when they do not exist
    fn set_number(&mut self, cell: CellPosition, value: f64);

    /// Store text verbatim, creating the row and cell when they do not exist
    fn set_text(&mut self, cell: CellPosition, value: &str);
}

pub trait TemplateWorkbook {
    type Sheet: TemplateSheet;

    fn has_sheet(&self, name: &str) -> bool;

    fn sheet_mut(&mut self, name: &str) -> Option<&mut Self::Sheet>;

    /// Ask the spreadsheet application to recalculate every formula on open
    fn request_full_recalculation(&mut self);
}

impl TemplateSheet for Worksheet {
    fn merged_regions(&self) -> Vec<MergedRegion> {
        self.get_merge_cells()
            .iter()
            .filter_map(|range| {
                let text = range.get_range();
                MergedRegion::parse(&text)
                    .inspect_err(|_| tracing::warn!("Ignoring unreadable merged range '{text}'"))
                    .ok()
            })
            .collect()
    }

    fn set_number(&mut self, cell: CellPosition, value: f64) {
        self.get_cell_mut(cell.to_one_based()).set_value_number(value);
    }

    fn set_text(&mut self, cell: CellPosition, value: &str) {
        self.get_cell_mut(cell.to_one_based()).set_value_string(value);
    }
}

/// A template workbook opened in memory for one conversion
pub struct TemplateBook {
    book: Spreadsheet,
    full_calc_on_load: bool,
}

impl TemplateBook {
    /// Open an (already sanitized) xlsx/xlsm container
    pub fn open(bytes: &[u8]) -> Result<Self, ConversionError> {
        let book = umya_spreadsheet::reader::xlsx::read_reader(Cursor::new(bytes), true).map_err(
            |e| ConversionError::Template {
                message: format!("failed to open template workbook: {e}"),
            },
        )?;
        Ok(Self::from_spreadsheet(book))
    }

    pub fn from_spreadsheet(book: Spreadsheet) -> Self {
        Self {
            book,
            full_calc_on_load: false,
        }
    }

    pub fn spreadsheet(&self) -> &Spreadsheet {
        &self.book
    }

    /// Serialize the workbook, applying the recalculation flag to the
    /// written container when it was requested
    pub fn into_bytes(self) -> Result<Vec<u8>, ConversionError> {
        let mut out = Cursor::new(Vec::new());
        umya_spreadsheet::writer::xlsx::write_writer(&self.book, &mut out).map_err(|e| {
            ConversionError::Template {
                message: format!("failed to write workbook: {e}"),
            }
        })?;
        let bytes = out.into_inner();

        if self.full_calc_on_load {
            container::force_full_calculation(&bytes)
        } else {
            Ok(bytes)
        }
    }
}

impl TemplateWorkbook for TemplateBook {
    type Sheet = Worksheet;

    fn has_sheet(&self, name: &str) -> bool {
        self.book.get_sheet_by_name(name).is_some()
    }

    fn sheet_mut(&mut self, name: &str) -> Option<&mut Worksheet> {
        self.book.get_sheet_by_name_mut(name)
    }

    fn request_full_recalculation(&mut self) {
        self.full_calc_on_load = true;
    }
}
