//! Fixed layout of the line protection calculation sheet template
//!
//! Every destination the populator writes is listed here as data so the table
//! can be audited against the study report and exercised by table-driven
//! tests. Positions in the export are zero-based (row, column) pairs.

use std::collections::HashMap;

pub const DATA_ENTRY_SHEET: &str = "1) Data Entry";
pub const ASPEN_IMPEDANCES_SHEET: &str = "3) Aspen Impedances";
pub const FAULT_ANALYSIS_SHEET: &str = "4) Fault Analysis";
pub const INFEED_SHEET: &str = "5) Infeed";

/// Sheets the conversion cannot proceed without
pub const REQUIRED_SHEETS: &[&str] = &[FAULT_ANALYSIS_SHEET];

/// Infeed bus N lands on template row `INFEED_FIRST_ROW + N`
pub const INFEED_FIRST_ROW: usize = 14;
pub const INFEED_MAGNITUDE_COLUMN: &str = "R";
pub const INFEED_ANGLE_COLUMN: &str = "T";

/// Template row that receives the first-line impedance
pub const FIRST_LINE_ROW: usize = 6;

/// Primary data-entry rows of the eight second-line blocks on the impedance
/// tab. Rows +1..+4 below each anchor are formula rows.
pub const SECOND_LINE_ROWS: [usize; 8] = [15, 23, 31, 39, 47, 55, 63, 71];

/// The circuit name goes into column D this many rows below the anchor
pub const CIRCUIT_ROW_OFFSET: usize = 5;
pub const CIRCUIT_COLUMN: &str = "D";

/// Columns for r1, x1, r0, x0 and miles on the impedance tab
pub const IMPEDANCE_COLUMNS: [&str; 5] = ["E", "F", "G", "H", "I"];

/// How a source value is cleaned before it is written
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ValueMode {
    /// Reduced to its first number through the numeric normalizer
    Numeric,
    /// Written as entered (still stored as a number when it parses as one)
    Text,
}

/// Where a destination cell takes its value from
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Source {
    /// A submitted form field, with older spellings tried in order
    Form {
        field: &'static str,
        aliases: &'static [&'static str],
    },
    /// A cell of the study export
    Csv { row: usize, col: usize },
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct CellMapping {
    pub sheet: &'static str,
    pub address: &'static str,
    pub source: Source,
    pub mode: ValueMode,
    pub label: &'static str,
}

const fn form(address: &'static str, field: &'static str, label: &'static str) -> CellMapping {
    CellMapping {
        sheet: DATA_ENTRY_SHEET,
        address,
        source: Source::Form {
            field,
            aliases: &[],
        },
        mode: ValueMode::Text,
        label,
    }
}

const fn csv(address: &'static str, row: usize, col: usize, label: &'static str) -> CellMapping {
    CellMapping {
        sheet: FAULT_ANALYSIS_SHEET,
        address,
        source: Source::Csv { row, col },
        mode: ValueMode::Numeric,
        label,
    }
}

/// Form fields copied onto the data entry tab
pub const DATA_ENTRY_MAPPINGS: &[CellMapping] = &[
    form("G3", "relayLocation", "Relay location"),
    form("K3", "lineNumber", "Line number"),
    form("M3", "remoteLocation", "Remote location"),
    CellMapping {
        sheet: DATA_ENTRY_SHEET,
        address: "E16",
        source: Source::Form {
            field: "nominalSystemVoltage",
            // The browser form has always posted this misspelling
            aliases: &["noninalSystemVoltage"],
        },
        mode: ValueMode::Text,
        label: "Nominal system voltage",
    },
    form("E18", "breakerRating", "Breaker rating"),
    form("E19", "conductorRating", "Conductor rating"),
    form("E22", "ctrW", "CTR W"),
    form("E23", "ctrX", "CTR X"),
    form("E24", "ptry", "PTR Y"),
    form("E26", "secondlines", "Number of second lines"),
    form("E27", "numberOfTaps", "Number of taps"),
    form("E28", "autoXfmrAtRemote", "Auto transformer at remote"),
    form("E29", "numberOfBreakers", "Number of breakers"),
    form("E30", "noOfDistributionTransformers", "Distribution transformers"),
    form("E34", "relayLoadbility", "Relay loadability"),
    form("E270", "syncReference", "Sync reference"),
    form("E271", "syncSource", "Sync source"),
    form("E273", "hotLineInd", "Hot line indication"),
    form("E274", "vazPtRatio", "VAZ PT ratio"),
    form("E275", "vbzPtRatio", "VBZ PT ratio"),
    form("E276", "vczPtRatio", "VCZ PT ratio"),
    form("E282", "remoteCTR", "Remote CTR"),
    form("E285", "remoteBFPU", "Remote BF PU"),
    form("E286", "remoteBFGU", "Remote BF GU"),
];

/// Fault study results copied from fixed export positions onto the fault
/// analysis tab
pub const FAULT_ANALYSIS_MAPPINGS: &[CellMapping] = &[
    csv("G17", 0, 2, "Min Line End SLG All Sources"),
    csv("G18", 1, 2, "Min Line End 1LG All Sources"),
    csv("G19", 2, 2, "Min Line End LL I2"),
    csv("G22", 6, 2, "Min Line End n-1 SLG"),
    csv("G23", 7, 2, "Min Line End n-1 I2"),
    csv("G25", 8, 2, "Reverse Local Bus 1LG"),
    csv("G36", 9, 2, "Close In End Open 3LG"),
    csv("K36", 9, 4, "Close In End Open 1LG"),
    csv("G37", 10, 2, "Close In End Closed 3LG"),
    csv("K37", 10, 4, "Close In End Closed 1LG"),
    csv("G38", 12, 2, "Remote Bus Fault 3LG"),
    csv("I38", 12, 4, "Remote Bus Fault L-L"),
    csv("K38", 12, 6, "Remote Bus Fault 1LG 3I0"),
    csv("K39", 13, 2, "Longest 2nd Line SLG 3I0"),
    csv("S35", 15, 2, "Diff Case 1a 3LG"),
    csv("U35", 15, 4, "Diff Case 1a L-L"),
    csv("W35", 15, 6, "Diff Case 1a I2"),
    csv("X35", 15, 8, "Diff Case 1a 3I0"),
    csv("S36", 17, 2, "Diff Case 1b 3LG"),
    csv("U36", 17, 4, "Diff Case 1b L-L"),
    csv("W36", 17, 6, "Diff Case 1b I2"),
    csv("X36", 17, 8, "Diff Case 1b 3I0"),
    csv("S37", 18, 2, "Diff Case 2a 3LG"),
    csv("U37", 18, 4, "Diff Case 2a L-L"),
    csv("W37", 18, 6, "Diff Case 2a I2"),
    csv("X37", 18, 8, "Diff Case 2a 3I0"),
    csv("S38", 19, 2, "Diff Case 2b 3LG"),
    csv("U38", 19, 4, "Diff Case 2b L-L"),
    csv("W38", 19, 6, "Diff Case 2b I2"),
    csv("X38", 19, 8, "Diff Case 2b 3I0"),
    csv("E44", 21, 2, "X/R N-0 3LG"),
    csv("E45", 22, 2, "X/R N-0 SLG"),
    csv("E47", 23, 2, "X/R N-0 R1"),
    csv("G47", 23, 4, "X/R N-0 X1"),
    csv("I47", 23, 6, "X/R N-0 R2"),
    csv("K47", 23, 8, "X/R N-0 X2"),
    csv("M47", 23, 10, "X/R N-0 R0"),
    csv("O47", 23, 12, "X/R N-0 X0"),
    csv("E70", 24, 2, "X/R N-1 3LG"),
    csv("E71", 25, 2, "X/R N-1 SLG"),
    csv("E73", 26, 2, "X/R N-1 R1"),
    csv("G73", 26, 4, "X/R N-1 X1"),
    csv("I73", 26, 6, "X/R N-1 R2"),
    csv("K73", 26, 8, "X/R N-1 X2"),
    csv("M73", 26, 10, "X/R N-1 R0"),
    csv("O73", 26, 12, "X/R N-1 X0"),
];

/// Submitted form values keyed by field name; absent fields read as ""
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct FormFields(HashMap<String, String>);

impl FormFields {
    pub fn new(fields: HashMap<String, String>) -> Self {
        Self(fields)
    }

    /// Decode the JSON object posted by the browser form. Non-string scalar
    /// values are kept in their JSON text form; nulls read as absent.
    pub fn from_json(json: &str) -> Result<Self, serde_json::Error> {
        let raw: HashMap<String, serde_json::Value> = serde_json::from_str(json)?;
        let fields = raw
            .into_iter()
            .filter_map(|(key, value)| {
                let text = match value {
                    serde_json::Value::Null => return None,
                    serde_json::Value::String(s) => s,
                    other => other.to_string(),
                };
                Some((key, text))
            })
            .collect();
        Ok(Self(fields))
    }

    pub fn get(&self, field: &str) -> &str {
        self.0.get(field).map_or("", String::as_str)
    }

    /// First non-blank value among `field` and its aliases
    pub fn get_with_aliases(&self, field: &str, aliases: &[&str]) -> &str {
        std::iter::once(field)
            .chain(aliases.iter().copied())
            .map(|name| self.get(name))
            .find(|value| !value.trim().is_empty())
            .unwrap_or("")
    }

    pub fn len(&self) -> usize {
        self.0.len()
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }
}

impl<const N: usize> From<[(&str, &str); N]> for FormFields {
    fn from(pairs: [(&str, &str); N]) -> Self {
        Self(
            pairs
                .into_iter()
                .map(|(k, v)| (k.to_string(), v.to_string()))
                .collect(),
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::conversion::address::CellPosition;
    use std::collections::HashSet;

    #[test]
    fn test_every_mapped_address_parses() {
        for mapping in DATA_ENTRY_MAPPINGS.iter().chain(FAULT_ANALYSIS_MAPPINGS) {
            assert!(
                CellPosition::parse(mapping.address).is_ok(),
                "{} has a bad address",
                mapping.label
            );
        }
    }

    #[test]
    fn test_destinations_are_unique_per_sheet() {
        let mut seen = HashSet::new();
        for mapping in DATA_ENTRY_MAPPINGS.iter().chain(FAULT_ANALYSIS_MAPPINGS) {
            assert!(
                seen.insert((mapping.sheet, mapping.address)),
                "{}!{} mapped twice",
                mapping.sheet,
                mapping.address
            );
        }
        assert_eq!(DATA_ENTRY_MAPPINGS.len(), 24);
        assert_eq!(FAULT_ANALYSIS_MAPPINGS.len(), 46);
    }

    #[test]
    fn test_form_and_csv_sections_use_expected_modes() {
        assert!(DATA_ENTRY_MAPPINGS
            .iter()
            .all(|m| m.mode == ValueMode::Text && matches!(m.source, Source::Form { .. })));
        assert!(FAULT_ANALYSIS_MAPPINGS
            .iter()
            .all(|m| m.mode == ValueMode::Numeric && matches!(m.source, Source::Csv { .. })));
    }

    #[test]
    fn test_form_fields_default_to_empty() {
        let fields = FormFields::from([("relayLocation", "BUS A")]);
        assert_eq!(fields.get("relayLocation"), "BUS A");
        assert_eq!(fields.get("lineNumber"), "");
    }

    #[test]
    fn test_alias_is_used_when_primary_field_is_blank() {
        let fields = FormFields::from([("nominalSystemVoltage", " "), ("noninalSystemVoltage", "138")]);
        assert_eq!(
            fields.get_with_aliases("nominalSystemVoltage", &["noninalSystemVoltage"]),
            "138"
        );

        let both = FormFields::from([("nominalSystemVoltage", "345"), ("noninalSystemVoltage", "138")]);
        assert_eq!(
            both.get_with_aliases("nominalSystemVoltage", &["noninalSystemVoltage"]),
            "345"
        );
    }

    #[test]
    fn test_form_fields_from_json() {
        let fields =
            FormFields::from_json(r#"{"relayLocation":"HOYRD","numberOfTaps":2,"ptry":null}"#)
                .unwrap();
        assert_eq!(fields.get("relayLocation"), "HOYRD");
        assert_eq!(fields.get("numberOfTaps"), "2");
        assert_eq!(fields.get("ptry"), "");
        assert_eq!(fields.len(), 2);

        assert!(FormFields::from_json("[1, 2]").is_err());
    }
}
