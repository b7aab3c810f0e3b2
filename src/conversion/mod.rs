//! Conversion of a relay study CSV export plus form fields into a populated
//! line protection calculation sheet

pub mod address;
pub mod container;
pub mod mapping;
pub mod normalize;
pub mod populate;
pub mod sections;
pub mod service;
pub mod table;
pub mod template;

use serde::Serialize;
use std::fmt;

pub use mapping::FormFields;
pub use service::{ConversionOutput, ConversionReport, convert};

/// Failures that stop a conversion
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ConversionError {
    /// The CSV export has no rows at all
    EmptyCsv,
    /// The CSV export could not be read
    CsvRead { message: String },
    /// A destination address in the layout is malformed
    InvalidAddress { address: String },
    /// The template lacks a sheet the conversion cannot do without
    MissingSheet { sheet: String },
    /// The template workbook could not be opened or written
    Template { message: String },
    /// The zip container could not be read or rewritten
    Container { message: String },
}

impl fmt::Display for ConversionError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ConversionError::EmptyCsv => write!(f, "CSV file contains no rows"),
            ConversionError::CsvRead { message } => write!(f, "Could not read CSV: {message}"),
            ConversionError::InvalidAddress { address } => {
                write!(f, "Invalid cell address '{address}'")
            }
            ConversionError::MissingSheet { sheet } => {
                write!(f, "Template is missing required sheet '{sheet}'")
            }
            ConversionError::Template { message } => write!(f, "Template error: {message}"),
            ConversionError::Container { message } => {
                write!(f, "Workbook container error: {message}")
            }
        }
    }
}

impl std::error::Error for ConversionError {}

/// Non-fatal problems reported alongside a successful conversion
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum ConversionWarning {
    /// A CSV section marker was not found; its values were defaulted
    MissingSection { label: String },
    /// An optional template sheet is absent; its writes were skipped
    MissingSheet { sheet: String },
    /// More second-line blocks were found than the template has slots for
    SecondLinesDropped { found: usize, written: usize },
}

impl fmt::Display for ConversionWarning {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ConversionWarning::MissingSection { label } => {
                write!(f, "Section '{label}' not found in CSV; defaults used")
            }
            ConversionWarning::MissingSheet { sheet } => {
                write!(f, "Sheet '{sheet}' not found in template; its values were skipped")
            }
            ConversionWarning::SecondLinesDropped { found, written } => write!(
                f,
                "{found} second lines found but only {written} fit the template"
            ),
        }
    }
}
