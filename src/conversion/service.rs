//! End-to-end conversion: CSV export + form fields + template bytes in,
//! populated workbook bytes out

use serde::Serialize;

use super::container::sanitize_vml;
use super::mapping::FormFields;
use super::populate::{PopulationSummary, populate};
use super::sections::{
    IMPEDANCE_SECTION, INFEED_SECTION, find_section_start, parse_impedance, parse_infeed,
};
use super::table::RawTable;
use super::template::TemplateBook;
use super::{ConversionError, ConversionWarning};

/// What a conversion found and wrote, reported back to the caller
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct ConversionReport {
    pub csv_rows: usize,
    pub infeed_section_row: Option<usize>,
    pub impedance_section_row: Option<usize>,
    pub infeed_buses_found: usize,
    pub first_line_found: bool,
    pub second_lines_found: usize,
    #[serde(flatten)]
    pub population: PopulationSummary,
    pub warnings: Vec<ConversionWarning>,
}

#[derive(Debug)]
pub struct ConversionOutput {
    pub workbook: Vec<u8>,
    pub report: ConversionReport,
}

/// Run one conversion.
///
/// Missing sections and optional sheets only produce warnings; the call
/// fails for an empty or unreadable CSV, a template that cannot be opened or
/// lacks a required sheet, and container errors.
pub fn convert(
    csv: &[u8],
    form: &FormFields,
    template: &[u8],
) -> Result<ConversionOutput, ConversionError> {
    let table = RawTable::from_csv_bytes(csv)?;
    if table.is_empty() {
        return Err(ConversionError::EmptyCsv);
    }
    tracing::info!("Parsed CSV with {} rows", table.len());

    let mut warnings = Vec::new();
    let infeed_start = find_section_start(&table, INFEED_SECTION);
    let impedance_start = find_section_start(&table, IMPEDANCE_SECTION);
    tracing::info!(
        "Section rows: {INFEED_SECTION}={infeed_start:?}, {IMPEDANCE_SECTION}={impedance_start:?}"
    );

    let infeed = parse_infeed(&table, infeed_start, impedance_start, &mut warnings);
    let impedances = parse_impedance(&table, impedance_start, &mut warnings);

    let sanitized = sanitize_vml(template)?;
    let mut book = TemplateBook::open(&sanitized)?;
    let population = populate(
        &mut book,
        &table,
        form,
        &infeed,
        &impedances,
        &mut warnings,
    )?;
    let workbook = book.into_bytes()?;

    let report = ConversionReport {
        csv_rows: table.len(),
        infeed_section_row: infeed_start,
        impedance_section_row: impedance_start,
        infeed_buses_found: infeed.found,
        first_line_found: impedances.first_line.is_some(),
        second_lines_found: impedances.second_lines.len(),
        population,
        warnings,
    };
    tracing::info!(
        "Conversion finished: {} cells written, {} warnings",
        report.population.cells_written,
        report.warnings.len()
    );

    Ok(ConversionOutput { workbook, report })
}
