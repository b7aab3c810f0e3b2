//! Package-level repairs on the xlsx/xlsm zip container
//!
//! The template carries legacy VML drawings (comment boxes, form controls)
//! whose markup is not well-formed XML: bare `<font>` tags and unescaped
//! ampersands. Those parts are repaired before the workbook is parsed.
//! After writing, the workbook part is patched to recalculate on open.

use std::collections::HashMap;
use std::io::{Cursor, Read, Write};

use lazy_static::lazy_static;
use quick_xml::events::{BytesStart, Event};
use quick_xml::{Reader, Writer};
use regex::{Captures, Regex};
use zip::write::SimpleFileOptions;
use zip::{CompressionMethod, ZipArchive, ZipWriter};

use super::ConversionError;

pub const VML_CONTENT_TYPE: &str = "application/vnd.openxmlformats-officedocument.vmlDrawing";
const CONTENT_TYPES_PART: &str = "[Content_Types].xml";
const WORKBOOK_PART: &str = "xl/workbook.xml";

/// Workbook children that must come after `calcPr`
const CALC_PR_SUCCESSORS: [&[u8]; 9] = [
    b"oleSize",
    b"customWorkbookViews",
    b"pivotCaches",
    b"smartTagPr",
    b"smartTagTypes",
    b"webPublishing",
    b"fileRecoveryPr",
    b"webPublishObjects",
    b"extLst",
];

// VML parts are not well-formed XML, so their repair stays textual
lazy_static! {
    static ref BARE_FONT: Regex = Regex::new(r"(?i)<font\s*>").unwrap();
    static ref AMPERSAND: Regex = Regex::new(r"&([#a-zA-Z0-9]+;)?").unwrap();
}

impl From<zip::result::ZipError> for ConversionError {
    fn from(err: zip::result::ZipError) -> Self {
        ConversionError::Container {
            message: err.to_string(),
        }
    }
}

impl From<std::io::Error> for ConversionError {
    fn from(err: std::io::Error) -> Self {
        ConversionError::Container {
            message: err.to_string(),
        }
    }
}

impl From<quick_xml::Error> for ConversionError {
    fn from(err: quick_xml::Error) -> Self {
        ConversionError::Container {
            message: format!("xml error: {err}"),
        }
    }
}

impl From<quick_xml::events::attributes::AttrError> for ConversionError {
    fn from(err: quick_xml::events::attributes::AttrError) -> Self {
        ConversionError::Container {
            message: format!("xml attribute error: {err}"),
        }
    }
}

/// Content types declared by `[Content_Types].xml`
#[derive(Debug, Default)]
struct ContentTypes {
    defaults: HashMap<String, String>,
    overrides: HashMap<String, String>,
}

impl ContentTypes {
    fn parse(xml: &[u8]) -> Result<Self, ConversionError> {
        let mut reader = Reader::from_reader(xml);
        let mut types = Self::default();
        let mut buf = Vec::new();

        loop {
            match reader.read_event_into(&mut buf)? {
                Event::Start(ref e) | Event::Empty(ref e) => types.add_entry(e)?,
                Event::Eof => break,
                _ => {}
            }
            buf.clear();
        }
        Ok(types)
    }

    fn add_entry(&mut self, e: &BytesStart<'_>) -> Result<(), ConversionError> {
        let is_default = match e.local_name().as_ref() {
            b"Default" => true,
            b"Override" => false,
            _ => return Ok(()),
        };

        let mut key = None;
        let mut content_type = None;
        for attr in e.attributes() {
            let attr = attr?;
            let value = attr.unescape_value()?.into_owned();
            match attr.key.local_name().as_ref() {
                b"Extension" if is_default => key = Some(value.to_ascii_lowercase()),
                b"PartName" if !is_default => {
                    key = Some(value.trim_start_matches('/').to_string());
                }
                b"ContentType" => content_type = Some(value),
                _ => {}
            }
        }

        if let (Some(key), Some(content_type)) = (key, content_type) {
            let target = if is_default {
                &mut self.defaults
            } else {
                &mut self.overrides
            };
            target.insert(key, content_type);
        }
        Ok(())
    }

    /// Content type of a zip entry: its override, else its extension default
    fn of(&self, entry_name: &str) -> Option<&str> {
        if let Some(content_type) = self.overrides.get(entry_name) {
            return Some(content_type);
        }
        let extension = entry_name.rsplit_once('.')?.1.to_ascii_lowercase();
        self.defaults.get(&extension).map(String::as_str)
    }
}

/// Repair VML markup: bare `<font>` tags become `<font/>` and ampersands
/// that do not start an entity or character reference are escaped
pub fn repair_vml_markup(xml: &str) -> String {
    let fonts_fixed = BARE_FONT.replace_all(xml, "<font/>");
    AMPERSAND
        .replace_all(&fonts_fixed, |caps: &Captures| {
            if caps.get(1).is_some() {
                caps[0].to_string()
            } else {
                "&amp;".to_string()
            }
        })
        .into_owned()
}

fn read_entries(bytes: &[u8]) -> Result<Vec<(String, Vec<u8>)>, ConversionError> {
    let mut archive = ZipArchive::new(Cursor::new(bytes))?;
    let mut entries = Vec::with_capacity(archive.len());
    for index in 0..archive.len() {
        let mut entry = archive.by_index(index)?;
        if entry.is_dir() {
            continue;
        }
        let mut content = Vec::new();
        entry.read_to_end(&mut content)?;
        entries.push((entry.name().to_string(), content));
    }
    Ok(entries)
}

/// Rebuild the container with `replacements` swapped in, keeping every other
/// entry, its order and its compression
fn rewrite_container(
    bytes: &[u8],
    replacements: &HashMap<String, Vec<u8>>,
) -> Result<Vec<u8>, ConversionError> {
    let mut archive = ZipArchive::new(Cursor::new(bytes))?;
    let mut writer = ZipWriter::new(Cursor::new(Vec::new()));

    for index in 0..archive.len() {
        let mut entry = archive.by_index(index)?;
        let name = entry.name().to_string();
        let method = match entry.compression() {
            CompressionMethod::Stored => CompressionMethod::Stored,
            _ => CompressionMethod::Deflated,
        };
        let options = SimpleFileOptions::default().compression_method(method);

        if entry.is_dir() {
            writer.add_directory(name, options)?;
            continue;
        }

        let content = match replacements.get(&name) {
            Some(replacement) => replacement.clone(),
            None => {
                let mut original = Vec::new();
                entry.read_to_end(&mut original)?;
                original
            }
        };
        writer.start_file(name, options)?;
        writer.write_all(&content)?;
    }

    Ok(writer.finish()?.into_inner())
}

/// Repair every VML drawing part of a template container.
///
/// Parts are selected by their declared content type. Running this on an
/// already repaired container returns it unchanged.
pub fn sanitize_vml(bytes: &[u8]) -> Result<Vec<u8>, ConversionError> {
    let entries = read_entries(bytes)?;
    let content_types = match entries.iter().find(|(name, _)| name == CONTENT_TYPES_PART) {
        Some((_, content)) => ContentTypes::parse(content)?,
        None => ContentTypes::default(),
    };

    let mut replacements = HashMap::new();
    for (name, content) in &entries {
        if content_types.of(name) != Some(VML_CONTENT_TYPE) {
            continue;
        }
        let Ok(xml) = std::str::from_utf8(content) else {
            tracing::warn!("Skipping VML part {name}: not valid UTF-8");
            continue;
        };
        let repaired = repair_vml_markup(xml);
        if repaired != xml {
            tracing::debug!("Repaired VML markup in {name}");
            replacements.insert(name.clone(), repaired.into_bytes());
        }
    }

    if replacements.is_empty() {
        return Ok(bytes.to_vec());
    }
    rewrite_container(bytes, &replacements)
}

/// Copy of a `calcPr` element with `fullCalcOnLoad="1"` replacing any
/// existing value
fn patched_calc_pr(e: &BytesStart<'_>) -> Result<BytesStart<'static>, ConversionError> {
    let mut calc_pr = BytesStart::new(String::from_utf8_lossy(e.name().as_ref()).into_owned());
    for attr in e.attributes() {
        let attr = attr?;
        if attr.key.local_name().as_ref() == b"fullCalcOnLoad" {
            continue;
        }
        calc_pr.push_attribute((attr.key.as_ref(), attr.value.as_ref()));
    }
    calc_pr.push_attribute(("fullCalcOnLoad", "1"));
    Ok(calc_pr)
}

fn new_calc_pr(prefix: &str) -> BytesStart<'static> {
    let mut calc_pr = BytesStart::new(format!("{prefix}calcPr"));
    calc_pr.push_attribute(("fullCalcOnLoad", "1"));
    calc_pr
}

/// Set `fullCalcOnLoad="1"` on the workbook's calculation properties,
/// creating the element in schema order when the workbook has none
pub fn set_full_calc_on_load(workbook_xml: &[u8]) -> Result<Vec<u8>, ConversionError> {
    let mut reader = Reader::from_reader(workbook_xml);
    reader.config_mut().trim_text(false);
    let mut writer = Writer::new(Vec::with_capacity(workbook_xml.len() + 32));

    let mut buf = Vec::new();
    let mut depth = 0usize;
    let mut prefix = String::new();
    let mut saw_calc_pr = false;

    loop {
        let event = reader.read_event_into(&mut buf)?;
        match event {
            Event::Start(ref e) | Event::Empty(ref e) if e.local_name().as_ref() == b"calcPr" => {
                saw_calc_pr = true;
                let patched = patched_calc_pr(e)?;
                if matches!(event, Event::Start(_)) {
                    depth += 1;
                    writer.write_event(Event::Start(patched))?;
                } else {
                    writer.write_event(Event::Empty(patched))?;
                }
            }
            Event::Start(ref e) | Event::Empty(ref e)
                if depth == 1
                    && !saw_calc_pr
                    && CALC_PR_SUCCESSORS.contains(&e.local_name().as_ref()) =>
            {
                saw_calc_pr = true;
                writer.write_event(Event::Empty(new_calc_pr(&prefix)))?;
                if matches!(event, Event::Start(_)) {
                    depth += 1;
                    writer.write_event(Event::Start(e.to_owned()))?;
                } else {
                    writer.write_event(Event::Empty(e.to_owned()))?;
                }
            }
            Event::Start(ref e) => {
                if depth == 0 && e.local_name().as_ref() == b"workbook" {
                    let name = e.name();
                    let local_len = e.local_name().as_ref().len();
                    let qualified = name.as_ref();
                    prefix = String::from_utf8_lossy(&qualified[..qualified.len() - local_len])
                        .into_owned();
                }
                depth += 1;
                writer.write_event(Event::Start(e.to_owned()))?;
            }
            Event::End(ref e) => {
                if depth == 1 && !saw_calc_pr && e.local_name().as_ref() == b"workbook" {
                    saw_calc_pr = true;
                    writer.write_event(Event::Empty(new_calc_pr(&prefix)))?;
                }
                depth = depth.saturating_sub(1);
                writer.write_event(Event::End(e.to_owned()))?;
            }
            Event::Eof => break,
            other => writer.write_event(other.into_owned())?,
        }
        buf.clear();
    }

    if !saw_calc_pr {
        tracing::warn!("Workbook part has no workbook element; recalculation flag not set");
    }
    Ok(writer.into_inner())
}

/// Patch a written workbook container so formulas recalculate when opened
pub fn force_full_calculation(bytes: &[u8]) -> Result<Vec<u8>, ConversionError> {
    let entries = read_entries(bytes)?;
    let Some((_, workbook)) = entries.iter().find(|(name, _)| name == WORKBOOK_PART) else {
        return Err(ConversionError::Container {
            message: format!("{WORKBOOK_PART} missing from written workbook"),
        });
    };

    let patched = set_full_calc_on_load(workbook)?;
    let replacements = HashMap::from([(WORKBOOK_PART.to_string(), patched)]);
    rewrite_container(bytes, &replacements)
}

fn requests_full_calculation(workbook_xml: &[u8]) -> Result<bool, ConversionError> {
    let mut reader = Reader::from_reader(workbook_xml);
    let mut buf = Vec::new();
    loop {
        match reader.read_event_into(&mut buf)? {
            Event::Start(ref e) | Event::Empty(ref e) if e.local_name().as_ref() == b"calcPr" => {
                for attr in e.attributes() {
                    let attr = attr?;
                    if attr.key.local_name().as_ref() == b"fullCalcOnLoad" {
                        let value = attr.unescape_value()?;
                        return Ok(value == "1" || value == "true");
                    }
                }
                return Ok(false);
            }
            Event::Eof => return Ok(false),
            _ => {}
        }
        buf.clear();
    }
}

/// Whether the container's workbook part requests recalculation on load
pub fn has_full_calculation_flag(bytes: &[u8]) -> Result<bool, ConversionError> {
    let entries = read_entries(bytes)?;
    match entries.iter().find(|(name, _)| name == WORKBOOK_PART) {
        Some((_, content)) => requests_full_calculation(content),
        None => Ok(false),
    }
}
