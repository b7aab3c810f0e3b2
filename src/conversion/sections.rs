//! Section discovery and block parsing over the raw study export
//!
//! The export has no schema. Blocks are found by marker phrases and the
//! values sit at fixed offsets below each marker row, so both block parsers
//! are built on [`read_fields`].

use serde::Serialize;

use super::normalize::normalize;
use super::table::RawTable;
use super::ConversionWarning;

pub const INFEED_SECTION: &str = "INFEED TAB";
pub const IMPEDANCE_SECTION: &str = "APA IMPEDANCES TAB";
pub const BUS_FAULT_MARKER: &str = "WHEN APPLYING BUS FAULT AT:";
pub const FIRST_LINE_MARKER: &str = "FIRST LINE IMPEDENCE AT BUS:";
pub const SECOND_LINE_MARKER: &str = "SECOND LINE IMPEDENCES FOR LINE:";

pub const INFEED_BUS_COUNT: usize = 12;

/// Index of the first row whose comma-joined text contains `label`,
/// compared case-insensitively
pub fn find_section_start(table: &RawTable, label: &str) -> Option<usize> {
    let needle = label.to_uppercase();
    (0..table.len()).find(|&row| table.joined_row(row).to_uppercase().contains(&needle))
}

fn row_has_marker(table: &RawTable, row: usize, marker: &str) -> bool {
    table.joined_row(row).to_uppercase().contains(marker)
}

/// Read cells at `(row offset, column)` positions relative to `anchor`.
///
/// Offsets landing on or past `end` yield `None`, so a block cut short by the
/// next section or the end of the table leaves those fields unread.
pub fn read_fields<const N: usize>(
    table: &RawTable,
    anchor: usize,
    end: usize,
    offsets: [(usize, usize); N],
) -> [Option<String>; N] {
    offsets.map(|(row_offset, col)| {
        let row = anchor + row_offset;
        (row < end).then(|| table.cell(row, col))
    })
}

/// Fault current contribution of one infeed bus
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct InfeedRecord {
    pub bus: usize,
    pub magnitude: String,
    pub angle: String,
}

impl InfeedRecord {
    pub fn defaulted(bus: usize) -> Self {
        Self {
            bus,
            magnitude: "0".to_string(),
            angle: "0".to_string(),
        }
    }
}

/// All twelve infeed buses, in bus order; unmeasured buses hold "0"/"0"
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct InfeedTable {
    pub records: Vec<InfeedRecord>,
    /// Buses actually found in the export
    pub found: usize,
}

impl Default for InfeedTable {
    fn default() -> Self {
        Self {
            records: (1..=INFEED_BUS_COUNT).map(InfeedRecord::defaulted).collect(),
            found: 0,
        }
    }
}

/// Extract up to twelve magnitude/angle pairs between the infeed marker and
/// `end` (the impedance section start, or the end of the table)
pub fn parse_infeed(
    table: &RawTable,
    start: Option<usize>,
    end: Option<usize>,
    warnings: &mut Vec<ConversionWarning>,
) -> InfeedTable {
    let mut infeed = InfeedTable::default();

    let Some(start) = start else {
        tracing::warn!("{INFEED_SECTION} section not found in CSV");
        warnings.push(ConversionWarning::MissingSection {
            label: INFEED_SECTION.to_string(),
        });
        return infeed;
    };
    let end = end.unwrap_or(table.len());

    let mut row = start;
    while row < end && infeed.found < INFEED_BUS_COUNT {
        if !row_has_marker(table, row, BUS_FAULT_MARKER) {
            row += 1;
            continue;
        }

        let [magnitude, angle] = read_fields(table, row, end, [(1, 2), (2, 2)]);
        let record = &mut infeed.records[infeed.found];
        // Cell text as exported; only a blank value keeps the "0" default
        if let Some(value) = magnitude.filter(|v| !v.is_empty()) {
            record.magnitude = value;
        }
        if let Some(value) = angle.filter(|v| !v.is_empty()) {
            record.angle = value;
        }
        tracing::debug!(
            "Parsed infeed bus {}: Mag={}, Ang={}",
            record.bus,
            record.magnitude,
            record.angle
        );

        infeed.found += 1;
        row += 3;
    }

    infeed
}

/// Sequence and zero-sequence impedance of a line plus its length
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct LineImpedance {
    pub r1: String,
    pub x1: String,
    pub r0: String,
    pub x0: String,
    pub miles: String,
}

/// Impedance of an adjacent ("second") line and the circuit it belongs to
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct SecondLine {
    pub circuit: String,
    pub impedance: LineImpedance,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct ImpedanceSet {
    pub first_line: Option<LineImpedance>,
    /// In order of appearance in the export; not capped here
    pub second_lines: Vec<SecondLine>,
}

fn read_line_impedance(table: &RawTable, anchor: usize) -> LineImpedance {
    let [r1, x1, r0, x0, miles] = read_fields(
        table,
        anchor,
        table.len(),
        [(1, 2), (1, 3), (2, 2), (2, 3), (3, 2)],
    )
    .map(|value| value.map(|v| normalize(&v)).unwrap_or_default());

    LineImpedance {
        r1,
        x1,
        r0,
        x0,
        miles,
    }
}

/// Circuit name from a marker cell such as
/// "SECOND LINE IMPEDENCES FOR LINE: 5586-YANDELL-22" ("YANDELL-22")
pub fn circuit_identifier(row: &[String]) -> String {
    let Some(label) = row
        .iter()
        .find(|cell| cell.to_uppercase().contains(SECOND_LINE_MARKER))
    else {
        return String::new();
    };

    let label = label.trim();
    let Some(colon) = label.rfind(':') else {
        return String::new();
    };
    let full_id = label[colon + 1..].trim();

    match full_id.find('-') {
        Some(dash) if dash + 1 < full_id.len() => full_id[dash + 1..].trim().to_string(),
        _ => full_id.to_string(),
    }
}

/// Extract the first-line impedance and every second-line impedance from the
/// impedance section to the end of the table
pub fn parse_impedance(
    table: &RawTable,
    start: Option<usize>,
    warnings: &mut Vec<ConversionWarning>,
) -> ImpedanceSet {
    let mut impedances = ImpedanceSet::default();

    let Some(start) = start else {
        tracing::warn!("{IMPEDANCE_SECTION} section not found in CSV");
        warnings.push(ConversionWarning::MissingSection {
            label: IMPEDANCE_SECTION.to_string(),
        });
        return impedances;
    };

    let mut row = start;
    while row < table.len() {
        if row_has_marker(table, row, FIRST_LINE_MARKER) {
            let line = read_line_impedance(table, row);
            tracing::debug!(
                "Parsed first line impedance: R1={}, X1={}, R0={}, X0={}, Miles={}",
                line.r1,
                line.x1,
                line.r0,
                line.x0,
                line.miles
            );
            impedances.first_line = Some(line);
            row += 4;
        } else if row_has_marker(table, row, SECOND_LINE_MARKER) {
            let circuit = circuit_identifier(table.row(row));
            let impedance = read_line_impedance(table, row);
            tracing::debug!(
                "Parsed second line {} ({circuit}): R1={}, X1={}, R0={}, X0={}, Miles={}",
                impedances.second_lines.len() + 1,
                impedance.r1,
                impedance.x1,
                impedance.r0,
                impedance.x0,
                impedance.miles
            );
            impedances.second_lines.push(SecondLine { circuit, impedance });
            row += 4;
        } else {
            row += 1;
        }
    }

    impedances
}

#[cfg(test)]
mod tests {
    use super::*;

    fn table(rows: &[&[&str]]) -> RawTable {
        RawTable::from(rows.iter().map(|r| r.to_vec()).collect::<Vec<_>>())
    }

    fn bus_block(rows: &mut Vec<Vec<String>>, bus: usize, magnitude: &str, angle: &str) {
        rows.push(vec![format!("When applying bus fault at: {bus} BUS{bus} 138.")]);
        rows.push(vec!["Mag".into(), String::new(), magnitude.into()]);
        rows.push(vec!["Ang".into(), String::new(), angle.into()]);
    }

    fn second_line_block(rows: &mut Vec<Vec<String>>, id: &str, r1: &str) {
        rows.push(vec![
            String::new(),
            format!("Second Line Impedences for Line: {id}"),
        ]);
        rows.push(vec!["Z1".into(), String::new(), r1.into(), "2.5".into()]);
        rows.push(vec!["Z0".into(), String::new(), "3.1".into(), "9.8".into()]);
        rows.push(vec!["Miles".into(), String::new(), "12.4 mi".into()]);
    }

    #[test]
    fn test_find_section_start_is_case_insensitive_substring() {
        let t = table(&[&["header"], &["", "see Infeed Tab below"], &["INFEED TAB"]]);
        assert_eq!(find_section_start(&t, INFEED_SECTION), Some(1));
        assert_eq!(find_section_start(&t, IMPEDANCE_SECTION), None);
    }

    #[test]
    fn test_read_fields_stops_at_end() {
        let t = table(&[&["m"], &["", "", "1"], &["", "", "2"], &["", "", "3"]]);
        assert_eq!(
            read_fields(&t, 0, 3, [(1, 2), (2, 2), (3, 2)]),
            [Some("1".to_string()), Some("2".to_string()), None]
        );
        assert_eq!(read_fields(&t, 0, 4, [(1, 9)]), [Some(String::new())]);
    }

    #[test]
    fn test_missing_infeed_section_defaults_all_buses() {
        let mut warnings = Vec::new();
        let infeed = parse_infeed(&RawTable::default(), None, None, &mut warnings);

        assert_eq!(infeed.records.len(), INFEED_BUS_COUNT);
        for (index, record) in infeed.records.iter().enumerate() {
            assert_eq!(*record, InfeedRecord::defaulted(index + 1));
        }
        assert_eq!(infeed.found, 0);
        assert_eq!(
            warnings,
            vec![ConversionWarning::MissingSection {
                label: INFEED_SECTION.to_string()
            }]
        );
    }

    #[test]
    fn test_infeed_buses_are_numbered_in_order() {
        let mut rows = vec![vec!["INFEED TAB".to_string()]];
        bus_block(&mut rows, 1, "1250.4", "-84.2");
        rows.push(vec!["noise".to_string()]);
        bus_block(&mut rows, 2, "", "\u{00A0}-79.5 ");
        bus_block(&mut rows, 3, "1,250", "INF");
        let t = RawTable::new(rows);

        let mut warnings = Vec::new();
        let infeed = parse_infeed(&t, Some(0), None, &mut warnings);

        assert!(warnings.is_empty());
        assert_eq!(infeed.found, 3);
        assert_eq!(infeed.records[0].magnitude, "1250.4");
        assert_eq!(infeed.records[0].angle, "-84.2");
        // Blank magnitude keeps the default; other text is only trimmed
        assert_eq!(infeed.records[1].magnitude, "0");
        assert_eq!(infeed.records[1].angle, "-79.5");
        assert_eq!(infeed.records[2].magnitude, "1,250");
        assert_eq!(infeed.records[2].angle, "INF");
        assert_eq!(infeed.records[3], InfeedRecord::defaulted(4));
        let buses: Vec<usize> = infeed.records.iter().map(|r| r.bus).collect();
        assert_eq!(buses, (1..=12).collect::<Vec<_>>());
    }

    #[test]
    fn test_infeed_stops_after_twelve_buses() {
        let mut rows = vec![vec!["INFEED TAB".to_string()]];
        for bus in 1..=14 {
            bus_block(&mut rows, bus, &format!("{bus}00"), &format!("-{bus}"));
        }
        let t = RawTable::new(rows);

        let infeed = parse_infeed(&t, Some(0), None, &mut Vec::new());
        assert_eq!(infeed.found, 12);
        assert_eq!(infeed.records.len(), 12);
        assert_eq!(infeed.records[11].magnitude, "1200");
        assert_eq!(infeed.records[11].angle, "-12");
    }

    #[test]
    fn test_infeed_does_not_read_past_impedance_section() {
        let mut rows = vec![vec!["INFEED TAB".to_string()]];
        bus_block(&mut rows, 1, "500", "-80");
        rows.push(vec!["WHEN APPLYING BUS FAULT AT: 2".to_string()]);
        rows.push(vec!["APA IMPEDANCES TAB".into(), String::new(), "999".into()]);
        let t = RawTable::new(rows);

        let impedance_start = find_section_start(&t, IMPEDANCE_SECTION);
        assert_eq!(impedance_start, Some(5));
        let infeed = parse_infeed(&t, Some(0), impedance_start, &mut Vec::new());

        assert_eq!(infeed.found, 2);
        assert_eq!(infeed.records[1].magnitude, "0");
        assert_eq!(infeed.records[1].angle, "0");
    }

    #[test]
    fn test_circuit_identifier_takes_text_after_first_hyphen() {
        let row = vec![
            "x".to_string(),
            "SECOND LINE IMPEDENCES FOR LINE: 5586-YANDELL-22".to_string(),
        ];
        assert_eq!(circuit_identifier(&row), "YANDELL-22");

        let no_hyphen = vec!["Second Line Impedences For Line:  HOYRD ".to_string()];
        assert_eq!(circuit_identifier(&no_hyphen), "HOYRD");

        let trailing_colon = vec!["SECOND LINE IMPEDENCES FOR LINE:".to_string()];
        assert_eq!(circuit_identifier(&trailing_colon), "");

        let trailing_hyphen = vec!["SECOND LINE IMPEDENCES FOR LINE: 5586-".to_string()];
        assert_eq!(circuit_identifier(&trailing_hyphen), "5586-");
    }

    #[test]
    fn test_missing_impedance_section_is_empty() {
        let mut warnings = Vec::new();
        let set = parse_impedance(&table(&[&["x"]]), None, &mut warnings);
        assert_eq!(set, ImpedanceSet::default());
        assert_eq!(warnings.len(), 1);
    }

    #[test]
    fn test_parse_impedance_blocks() {
        let mut rows = vec![vec!["APA IMPEDANCES TAB".to_string()]];
        rows.push(vec!["First Line Impedence at Bus: 5586".to_string()]);
        rows.push(vec!["Z1".into(), String::new(), "1.25".into(), "6.5 ohm".into()]);
        rows.push(vec!["Z0".into(), String::new(), "4.0".into(), "infinite".into()]);
        rows.push(vec!["Miles".into(), String::new(), "1,024.5".into()]);
        second_line_block(&mut rows, "5586-YANDELL-22", "0.91");
        rows.push(vec!["unrelated".to_string()]);
        second_line_block(&mut rows, "HOYRD", "abc");
        let t = RawTable::new(rows);

        let set = parse_impedance(&t, Some(0), &mut Vec::new());

        let first = set.first_line.expect("first line parsed");
        assert_eq!(
            first,
            LineImpedance {
                r1: "1.25".into(),
                x1: "6.5".into(),
                r0: "4.0".into(),
                x0: "0".into(),
                miles: "1024.5".into(),
            }
        );
        assert_eq!(set.second_lines.len(), 2);
        assert_eq!(set.second_lines[0].circuit, "YANDELL-22");
        assert_eq!(set.second_lines[0].impedance.r1, "0.91");
        assert_eq!(set.second_lines[0].impedance.miles, "12.4");
        assert_eq!(set.second_lines[1].circuit, "HOYRD");
        assert_eq!(set.second_lines[1].impedance.r1, "");
    }

    #[test]
    fn test_last_first_line_wins_and_second_lines_are_uncapped() {
        let mut rows = vec![vec!["APA IMPEDANCES TAB".to_string()]];
        for r1 in ["1", "2"] {
            rows.push(vec!["FIRST LINE IMPEDENCE AT BUS: 1".to_string()]);
            rows.push(vec![String::new(), String::new(), r1.into()]);
            rows.push(vec![]);
            rows.push(vec![]);
        }
        for n in 0..9 {
            second_line_block(&mut rows, &format!("10{n}-LINE-{n}"), &format!("0.{n}"));
        }
        let t = RawTable::new(rows);

        let set = parse_impedance(&t, Some(0), &mut Vec::new());
        assert_eq!(set.first_line.unwrap().r1, "2");
        assert_eq!(set.second_lines.len(), 9);
        assert_eq!(set.second_lines[8].circuit, "LINE-8");
    }

    #[test]
    fn test_truncated_block_at_end_of_table() {
        let t = table(&[
            &["APA IMPEDANCES TAB"],
            &["FIRST LINE IMPEDENCE AT BUS: 7"],
            &["", "", "0.5", "1.5"],
        ]);
        let first = parse_impedance(&t, Some(0), &mut Vec::new())
            .first_line
            .unwrap();
        assert_eq!(first.r1, "0.5");
        assert_eq!(first.x1, "1.5");
        assert_eq!(first.r0, "");
        assert_eq!(first.miles, "");
    }
}
