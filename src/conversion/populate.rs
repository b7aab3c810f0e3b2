//! Writes parsed study values and form fields into the template workbook

use serde::Serialize;

use super::address::{MergedRegion, resolve};
use super::mapping::{
    ASPEN_IMPEDANCES_SHEET, CIRCUIT_COLUMN, CIRCUIT_ROW_OFFSET, CellMapping, DATA_ENTRY_MAPPINGS,
    DATA_ENTRY_SHEET, FAULT_ANALYSIS_MAPPINGS, FAULT_ANALYSIS_SHEET, FIRST_LINE_ROW, FormFields,
    IMPEDANCE_COLUMNS, INFEED_ANGLE_COLUMN, INFEED_FIRST_ROW, INFEED_MAGNITUDE_COLUMN,
    INFEED_SHEET, REQUIRED_SHEETS, SECOND_LINE_ROWS, Source, ValueMode,
};
use super::normalize::{normalize, parse_cell_number};
use super::sections::{ImpedanceSet, InfeedTable, LineImpedance};
use super::table::RawTable;
use super::template::{TemplateSheet, TemplateWorkbook};
use super::{ConversionError, ConversionWarning};

/// Counts of what the populator did to the template
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct PopulationSummary {
    pub cells_written: usize,
    /// Destinations left untouched because their source was blank
    pub cells_skipped: usize,
    pub second_lines_written: usize,
}

/// Writer bound to one sheet, resolving every address through the sheet's
/// merged regions
struct SheetWriter<'a, S: TemplateSheet> {
    name: &'a str,
    sheet: &'a mut S,
    merged: Vec<MergedRegion>,
    summary: &'a mut PopulationSummary,
}

impl<'a, S: TemplateSheet> SheetWriter<'a, S> {
    fn new(name: &'a str, sheet: &'a mut S, summary: &'a mut PopulationSummary) -> Self {
        let merged = sheet.merged_regions();
        Self {
            name,
            sheet,
            merged,
            summary,
        }
    }

    /// Write `raw` to `address` unless it cleans down to nothing.
    ///
    /// Values that parse as finite numbers are stored as numbers, anything
    /// else as text.
    fn write(&mut self, address: &str, raw: &str, mode: ValueMode) -> Result<(), ConversionError> {
        let value = match mode {
            ValueMode::Numeric => normalize(raw),
            ValueMode::Text => raw.to_string(),
        };
        if value.trim().is_empty() {
            self.summary.cells_skipped += 1;
            return Ok(());
        }

        let target = resolve(&self.merged, address)?;
        match parse_cell_number(&value) {
            Some(number) => self.sheet.set_number(target, number),
            None => self.sheet.set_text(target, &value),
        }
        tracing::trace!("Wrote {}!{target} (mapped {address}) = {value}", self.name);
        self.summary.cells_written += 1;
        Ok(())
    }

    fn write_line(&mut self, row: usize, line: &LineImpedance) -> Result<(), ConversionError> {
        let values = [&line.r1, &line.x1, &line.r0, &line.x0, &line.miles];
        for (column, value) in IMPEDANCE_COLUMNS.iter().zip(values) {
            self.write(&format!("{column}{row}"), value, ValueMode::Numeric)?;
        }
        Ok(())
    }
}

fn mapped_value(mapping: &CellMapping, table: &RawTable, form: &FormFields) -> String {
    match mapping.source {
        Source::Form { field, aliases } => form.get_with_aliases(field, aliases).to_string(),
        Source::Csv { row, col } => table.cell(row, col),
    }
}

fn write_mappings<S: TemplateSheet>(
    writer: &mut SheetWriter<'_, S>,
    mappings: &[CellMapping],
    table: &RawTable,
    form: &FormFields,
) -> Result<(), ConversionError> {
    for mapping in mappings {
        let value = mapped_value(mapping, table, form);
        writer.write(mapping.address, &value, mapping.mode)?;
    }
    Ok(())
}

/// Look up an optional sheet, recording a warning when the template lacks it
fn optional_sheet<'w, W: TemplateWorkbook>(
    workbook: &'w mut W,
    name: &str,
    warnings: &mut Vec<ConversionWarning>,
) -> Option<&'w mut W::Sheet> {
    let sheet = workbook.sheet_mut(name);
    if sheet.is_none() {
        tracing::warn!("Sheet '{name}' not found in template, skipping its values");
        warnings.push(ConversionWarning::MissingSheet {
            sheet: name.to_string(),
        });
    }
    sheet
}

/// Fill the template from the parsed export and the form fields.
///
/// Every required sheet is checked before anything is written, so a
/// rejected template is never partially modified.
pub fn populate<W: TemplateWorkbook>(
    workbook: &mut W,
    table: &RawTable,
    form: &FormFields,
    infeed: &InfeedTable,
    impedances: &ImpedanceSet,
    warnings: &mut Vec<ConversionWarning>,
) -> Result<PopulationSummary, ConversionError> {
    if let Some(missing) = REQUIRED_SHEETS.iter().find(|name| !workbook.has_sheet(name)) {
        return Err(ConversionError::MissingSheet {
            sheet: (*missing).to_string(),
        });
    }

    let mut summary = PopulationSummary::default();

    if let Some(sheet) = optional_sheet(workbook, DATA_ENTRY_SHEET, warnings) {
        let mut writer = SheetWriter::new(DATA_ENTRY_SHEET, sheet, &mut summary);
        write_mappings(&mut writer, DATA_ENTRY_MAPPINGS, table, form)?;
    }

    if let Some(sheet) = workbook.sheet_mut(FAULT_ANALYSIS_SHEET) {
        let mut writer = SheetWriter::new(FAULT_ANALYSIS_SHEET, sheet, &mut summary);
        write_mappings(&mut writer, FAULT_ANALYSIS_MAPPINGS, table, form)?;
    }

    if let Some(sheet) = optional_sheet(workbook, INFEED_SHEET, warnings) {
        let mut writer = SheetWriter::new(INFEED_SHEET, sheet, &mut summary);
        for record in &infeed.records {
            let row = INFEED_FIRST_ROW + record.bus;
            writer.write(
                &format!("{INFEED_MAGNITUDE_COLUMN}{row}"),
                &record.magnitude,
                ValueMode::Text,
            )?;
            writer.write(
                &format!("{INFEED_ANGLE_COLUMN}{row}"),
                &record.angle,
                ValueMode::Text,
            )?;
        }
    }

    let found = impedances.second_lines.len();
    let written = found.min(SECOND_LINE_ROWS.len());
    if let Some(sheet) = optional_sheet(workbook, ASPEN_IMPEDANCES_SHEET, warnings) {
        let mut writer = SheetWriter::new(ASPEN_IMPEDANCES_SHEET, sheet, &mut summary);
        if let Some(first_line) = &impedances.first_line {
            writer.write_line(FIRST_LINE_ROW, first_line)?;
        }
        for (anchor, second_line) in SECOND_LINE_ROWS.iter().zip(&impedances.second_lines) {
            writer.write_line(*anchor, &second_line.impedance)?;
            writer.write(
                &format!("{CIRCUIT_COLUMN}{}", anchor + CIRCUIT_ROW_OFFSET),
                &second_line.circuit,
                ValueMode::Text,
            )?;
        }
        summary.second_lines_written = written;
    }
    if found > written {
        tracing::warn!("{found} second lines found, only the first {written} fit the template");
        warnings.push(ConversionWarning::SecondLinesDropped { found, written });
    }

    workbook.request_full_recalculation();
    tracing::debug!(
        "Populated template: {} cells written, {} skipped",
        summary.cells_written,
        summary.cells_skipped
    );
    Ok(summary)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::conversion::address::CellPosition;
    use crate::conversion::sections::{InfeedRecord, SecondLine};
    use std::collections::HashMap;

    #[derive(Debug, Clone, PartialEq)]
    enum CellValue {
        Number(f64),
        Text(String),
    }

    #[derive(Debug, Default)]
    struct MemorySheet {
        merged: Vec<MergedRegion>,
        cells: HashMap<CellPosition, CellValue>,
    }

    impl MemorySheet {
        fn value(&self, address: &str) -> Option<CellValue> {
            self.cells.get(&CellPosition::parse(address).unwrap()).cloned()
        }
    }

    impl TemplateSheet for MemorySheet {
        fn merged_regions(&self) -> Vec<MergedRegion> {
            self.merged.clone()
        }

        fn set_number(&mut self, cell: CellPosition, value: f64) {
            self.cells.insert(cell, CellValue::Number(value));
        }

        fn set_text(&mut self, cell: CellPosition, value: &str) {
            self.cells.insert(cell, CellValue::Text(value.to_string()));
        }
    }

    #[derive(Debug, Default)]
    struct MemoryWorkbook {
        sheets: HashMap<String, MemorySheet>,
        full_recalculation: bool,
    }

    impl MemoryWorkbook {
        fn with_sheets(names: &[&str]) -> Self {
            Self {
                sheets: names
                    .iter()
                    .map(|name| ((*name).to_string(), MemorySheet::default()))
                    .collect(),
                full_recalculation: false,
            }
        }

        fn template() -> Self {
            Self::with_sheets(&[
                DATA_ENTRY_SHEET,
                ASPEN_IMPEDANCES_SHEET,
                FAULT_ANALYSIS_SHEET,
                INFEED_SHEET,
            ])
        }

        fn sheet(&self, name: &str) -> &MemorySheet {
            &self.sheets[name]
        }
    }

    impl TemplateWorkbook for MemoryWorkbook {
        type Sheet = MemorySheet;

        fn has_sheet(&self, name: &str) -> bool {
            self.sheets.contains_key(name)
        }

        fn sheet_mut(&mut self, name: &str) -> Option<&mut MemorySheet> {
            self.sheets.get_mut(name)
        }

        fn request_full_recalculation(&mut self) {
            self.full_recalculation = true;
        }
    }

    fn number(value: f64) -> Option<CellValue> {
        Some(CellValue::Number(value))
    }

    fn text(value: &str) -> Option<CellValue> {
        Some(CellValue::Text(value.to_string()))
    }

    fn impedance(r1: &str) -> LineImpedance {
        LineImpedance {
            r1: r1.to_string(),
            x1: "2.5".to_string(),
            r0: "3.1".to_string(),
            x0: String::new(),
            miles: "12.4".to_string(),
        }
    }

    fn second_lines(count: usize) -> ImpedanceSet {
        ImpedanceSet {
            first_line: None,
            second_lines: (0..count)
                .map(|n| SecondLine {
                    circuit: format!("LINE-{n}"),
                    impedance: impedance(&format!("0.{n}")),
                })
                .collect(),
        }
    }

    fn run(
        workbook: &mut MemoryWorkbook,
        table: &RawTable,
        form: &FormFields,
        impedances: &ImpedanceSet,
    ) -> (Result<PopulationSummary, ConversionError>, Vec<ConversionWarning>) {
        let mut warnings = Vec::new();
        let result = populate(
            workbook,
            table,
            form,
            &InfeedTable::default(),
            impedances,
            &mut warnings,
        );
        (result, warnings)
    }

    #[test]
    fn test_fault_analysis_values_are_normalized() {
        let mut rows = vec![Vec::<String>::new(); 27];
        rows[0] = vec![String::new(), String::new(), "1,234.5 A".into()];
        rows[1] = vec![String::new(), String::new(), "abc".into()];
        rows[9] = vec!["".into(), "".into(), "INFINITE".into(), "".into(), "712".into()];
        let table = RawTable::new(rows);
        let mut workbook = MemoryWorkbook::template();

        let (result, warnings) = run(
            &mut workbook,
            &table,
            &FormFields::default(),
            &ImpedanceSet::default(),
        );
        let summary = result.unwrap();

        let sheet = workbook.sheet(FAULT_ANALYSIS_SHEET);
        assert_eq!(sheet.value("G17"), number(1234.5));
        assert_eq!(sheet.value("G18"), None);
        assert_eq!(sheet.value("G36"), number(0.0));
        assert_eq!(sheet.value("K36"), number(712.0));
        assert!(warnings.is_empty());
        assert!(summary.cells_skipped > 0);
        assert!(workbook.full_recalculation);
    }

    #[test]
    fn test_form_fields_follow_merges_and_aliases() {
        let mut workbook = MemoryWorkbook::template();
        workbook
            .sheets
            .get_mut(DATA_ENTRY_SHEET)
            .unwrap()
            .merged
            .push(MergedRegion::parse("D3:H3").unwrap());
        let form = FormFields::from([
            ("relayLocation", "HOYRD"),
            ("noninalSystemVoltage", "138"),
            ("ctrW", "   "),
        ]);

        let (result, _) = run(
            &mut workbook,
            &RawTable::default(),
            &form,
            &ImpedanceSet::default(),
        );
        result.unwrap();

        let sheet = workbook.sheet(DATA_ENTRY_SHEET);
        assert_eq!(sheet.value("D3"), text("HOYRD"));
        assert_eq!(sheet.value("G3"), None);
        assert_eq!(sheet.value("E16"), number(138.0));
        assert_eq!(sheet.value("E22"), None);
    }

    #[test]
    fn test_infeed_rows_are_always_written() {
        let mut infeed = InfeedTable::default();
        infeed.records[0] = InfeedRecord {
            bus: 1,
            magnitude: "1250.4".into(),
            angle: "-84.2".into(),
        };
        infeed.records[1] = InfeedRecord {
            bus: 2,
            magnitude: "1,250".into(),
            angle: "INF".into(),
        };
        infeed.found = 2;
        let mut workbook = MemoryWorkbook::template();

        populate(
            &mut workbook,
            &RawTable::default(),
            &FormFields::default(),
            &infeed,
            &ImpedanceSet::default(),
            &mut Vec::new(),
        )
        .unwrap();

        let sheet = workbook.sheet(INFEED_SHEET);
        assert_eq!(sheet.value("R15"), number(1250.4));
        assert_eq!(sheet.value("T15"), number(-84.2));
        // Infeed text is not reinterpreted
        assert_eq!(sheet.value("R16"), text("1,250"));
        assert_eq!(sheet.value("T16"), text("INF"));
        for row in 17..=26 {
            assert_eq!(sheet.value(&format!("R{row}")), number(0.0));
            assert_eq!(sheet.value(&format!("T{row}")), number(0.0));
        }
        assert_eq!(sheet.cells.len(), 24);
    }

    #[test]
    fn test_first_line_and_second_lines_fill_their_blocks() {
        let mut impedances = second_lines(2);
        impedances.first_line = Some(impedance("1.25"));
        let mut workbook = MemoryWorkbook::template();

        let (result, _) = run(
            &mut workbook,
            &RawTable::default(),
            &FormFields::default(),
            &impedances,
        );
        assert_eq!(result.unwrap().second_lines_written, 2);

        let sheet = workbook.sheet(ASPEN_IMPEDANCES_SHEET);
        assert_eq!(sheet.value("E6"), number(1.25));
        assert_eq!(sheet.value("F6"), number(2.5));
        assert_eq!(sheet.value("H6"), None);
        assert_eq!(sheet.value("I6"), number(12.4));
        assert_eq!(sheet.value("E15"), number(0.0));
        assert_eq!(sheet.value("D20"), text("LINE-0"));
        assert_eq!(sheet.value("E23"), number(0.1));
        assert_eq!(sheet.value("D28"), text("LINE-1"));
        assert_eq!(sheet.value("E31"), None);
    }

    #[test]
    fn test_extra_second_lines_are_dropped() {
        let mut workbook = MemoryWorkbook::template();

        let (result, warnings) = run(
            &mut workbook,
            &RawTable::default(),
            &FormFields::default(),
            &second_lines(9),
        );
        assert_eq!(result.unwrap().second_lines_written, 8);
        assert_eq!(
            warnings,
            vec![ConversionWarning::SecondLinesDropped { found: 9, written: 8 }]
        );

        let sheet = workbook.sheet(ASPEN_IMPEDANCES_SHEET);
        assert_eq!(sheet.value("D76"), text("LINE-7"));
        assert!(!sheet
            .cells
            .values()
            .any(|value| *value == CellValue::Text("LINE-8".into())));
    }

    #[test]
    fn test_missing_optional_sheet_is_a_warning() {
        let mut workbook = MemoryWorkbook::with_sheets(&[FAULT_ANALYSIS_SHEET, DATA_ENTRY_SHEET]);

        let (result, warnings) = run(
            &mut workbook,
            &RawTable::default(),
            &FormFields::default(),
            &second_lines(1),
        );
        result.unwrap();

        assert_eq!(
            warnings,
            vec![
                ConversionWarning::MissingSheet {
                    sheet: INFEED_SHEET.to_string()
                },
                ConversionWarning::MissingSheet {
                    sheet: ASPEN_IMPEDANCES_SHEET.to_string()
                },
            ]
        );
    }

    #[test]
    fn test_missing_required_sheet_aborts_before_writing() {
        let mut workbook = MemoryWorkbook::with_sheets(&[DATA_ENTRY_SHEET, INFEED_SHEET]);
        let form = FormFields::from([("relayLocation", "HOYRD")]);

        let (result, _) = run(
            &mut workbook,
            &RawTable::default(),
            &form,
            &ImpedanceSet::default(),
        );

        assert_eq!(
            result,
            Err(ConversionError::MissingSheet {
                sheet: FAULT_ANALYSIS_SHEET.to_string()
            })
        );
        assert!(workbook.sheet(DATA_ENTRY_SHEET).cells.is_empty());
        assert!(!workbook.full_recalculation);
    }
}
