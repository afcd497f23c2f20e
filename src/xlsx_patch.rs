//! Part-preserving cell patching for xlsx templates.
//!
//! The template package is copied entry by entry. Only the worksheet parts that receive
//! patches are rewritten; everything else is raw-copied so styles, merged cells and
//! drawings survive untouched. Patched cells lose any formula they carried and receive a
//! literal value (numbers as `<v>`, text as an inline string). Because formulas change, the
//! calculation chain is dropped and the workbook is flagged for a full recalculation on load.

use crate::error::{Result, SoaLedgerError};
use crate::utils::{cell_address, parse_address};
use quick_xml::events::{BytesEnd, BytesStart, BytesText, Event};
use quick_xml::{Reader, Writer};
use std::collections::{BTreeMap, BTreeSet, HashMap};
use std::io::{Cursor, Read, Seek, Write};
use zip::write::SimpleFileOptions;
use zip::{CompressionMethod, DateTime, ZipArchive, ZipWriter};

const WORKBOOK_PART: &str = "xl/workbook.xml";
const WORKBOOK_RELS_PART: &str = "xl/_rels/workbook.xml.rels";
const CONTENT_TYPES_PART: &str = "[Content_Types].xml";
const CALC_CHAIN_PART: &str = "xl/calcChain.xml";

#[derive(Debug, Clone, PartialEq)]
pub enum PatchValue {
    Empty,
    Number(f64),
    Text(String),
}

#[derive(Debug, Clone, PartialEq)]
pub struct CellPatch {
    pub sheet: String,
    pub row: usize,
    pub col: usize,
    pub value: PatchValue,
}

impl CellPatch {
    pub fn new(sheet: impl Into<String>, (row, col): (usize, usize), value: PatchValue) -> Self {
        Self {
            sheet: sheet.into(),
            row,
            col,
            value,
        }
    }
}

/// row → col → value, zero-based.
type RowPatches = BTreeMap<usize, BTreeMap<usize, PatchValue>>;

/// Applies `patches` to a copy of `template` and returns the new package bytes.
pub fn patch_template(template: &[u8], patches: &[CellPatch]) -> Result<Vec<u8>> {
    let mut archive = ZipArchive::new(Cursor::new(template))?;
    let parts = worksheet_parts(&mut archive)?;

    let mut by_part: HashMap<String, RowPatches> = HashMap::new();
    for patch in patches {
        let part = parts
            .get(&patch.sheet)
            .ok_or_else(|| SoaLedgerError::TemplateSheetMissing(patch.sheet.clone()))?;
        by_part
            .entry(part.clone())
            .or_default()
            .entry(patch.row)
            .or_default()
            .insert(patch.col, patch.value.clone());
    }

    let options = SimpleFileOptions::default()
        .compression_method(CompressionMethod::Deflated)
        .compression_level(Some(6))
        .last_modified_time(DateTime::default());
    let mut output = ZipWriter::new(Cursor::new(Vec::new()));
    let mut untouched: BTreeSet<&str> = by_part.keys().map(String::as_str).collect();

    for i in 0..archive.len() {
        let mut file = archive.by_index(i)?;
        if file.is_dir() {
            continue;
        }
        let name = file.name().to_string();
        if name == CALC_CHAIN_PART {
            continue;
        }

        let rewritten = if let Some(rows) = by_part.get(&name) {
            untouched.remove(name.as_str());
            Some(patch_worksheet(&read_entry(&mut file)?, rows)?)
        } else if name == CONTENT_TYPES_PART {
            Some(drop_calc_chain_override(&read_entry(&mut file)?)?)
        } else if name == WORKBOOK_RELS_PART {
            Some(drop_calc_chain_relationship(&read_entry(&mut file)?)?)
        } else if name == WORKBOOK_PART {
            Some(force_full_calc_on_load(&read_entry(&mut file)?)?)
        } else {
            None
        };

        match rewritten {
            Some(bytes) => {
                output.start_file(name, options)?;
                output.write_all(&bytes)?;
            }
            None => output.raw_copy_file(file)?,
        }
    }

    if let Some(missing) = untouched.into_iter().next() {
        return Err(SoaLedgerError::TemplatePatch(format!(
            "worksheet part '{}' is not in the package",
            missing
        )));
    }

    Ok(output.finish()?.into_inner())
}

fn read_entry<R: Read>(file: &mut R) -> Result<Vec<u8>> {
    let mut bytes = Vec::new();
    file.read_to_end(&mut bytes)?;
    Ok(bytes)
}

fn read_part<R: Read + Seek>(archive: &mut ZipArchive<R>, name: &str) -> Result<Vec<u8>> {
    let mut file = archive.by_name(name)?;
    read_entry(&mut file)
}

fn attr_value(e: &BytesStart<'_>, local_key: &[u8]) -> Result<Option<String>> {
    for attr in e.attributes() {
        let attr = attr?;
        if attr.key.local_name().as_ref() == local_key {
            let value = attr
                .unescape_value()
                .map_err(|err| SoaLedgerError::TemplatePatch(err.to_string()))?;
            return Ok(Some(value.into_owned()));
        }
    }
    Ok(None)
}

/// Maps sheet names to their worksheet part (`xl/worksheets/sheet1.xml`).
fn worksheet_parts<R: Read + Seek>(archive: &mut ZipArchive<R>) -> Result<HashMap<String, String>> {
    let workbook = read_part(archive, WORKBOOK_PART)?;
    let rels = read_part(archive, WORKBOOK_RELS_PART)?;

    let mut targets: HashMap<String, String> = HashMap::new();
    let mut reader = Reader::from_reader(rels.as_slice());
    loop {
        match reader.read_event()? {
            Event::Eof => break,
            Event::Empty(e) | Event::Start(e) if e.local_name().as_ref() == b"Relationship" => {
                if let (Some(id), Some(target)) = (attr_value(&e, b"Id")?, attr_value(&e, b"Target")?)
                {
                    targets.insert(id, resolve_target(&target));
                }
            }
            _ => {}
        }
    }

    let mut parts = HashMap::new();
    let mut reader = Reader::from_reader(workbook.as_slice());
    loop {
        match reader.read_event()? {
            Event::Eof => break,
            Event::Empty(e) | Event::Start(e) if e.local_name().as_ref() == b"sheet" => {
                if let (Some(name), Some(rel_id)) = (attr_value(&e, b"name")?, attr_value(&e, b"id")?)
                {
                    if let Some(target) = targets.get(&rel_id) {
                        parts.insert(name, target.clone());
                    }
                }
            }
            _ => {}
        }
    }

    Ok(parts)
}

fn resolve_target(target: &str) -> String {
    match target.strip_prefix('/') {
        Some(absolute) => absolute.to_string(),
        None => format!("xl/{}", target.trim_start_matches("./")),
    }
}

fn row_index(e: &BytesStart<'_>) -> Result<usize> {
    attr_value(e, b"r")?
        .and_then(|r| r.parse::<usize>().ok())
        .filter(|r| *r > 0)
        .map(|r| r - 1)
        .ok_or_else(|| SoaLedgerError::TemplatePatch("row without a valid r attribute".into()))
}

fn cell_col(e: &BytesStart<'_>) -> Result<usize> {
    let reference = attr_value(e, b"r")?.unwrap_or_default();
    parse_address(&reference)
        .map(|(_, col)| col)
        .ok_or(SoaLedgerError::InvalidAddress(reference))
}

/// Copy of a row start tag without its `spans` hint, which may no longer hold.
fn without_spans(e: &BytesStart<'_>) -> Result<BytesStart<'static>> {
    let mut start = BytesStart::new(String::from_utf8_lossy(e.name().as_ref()).into_owned());
    for attr in e.attributes() {
        let attr = attr?;
        if attr.key.as_ref() != b"spans" {
            start.push_attribute(attr);
        }
    }
    Ok(start)
}

fn skip_element(reader: &mut Reader<&[u8]>) -> Result<()> {
    let mut depth = 1usize;
    loop {
        match reader.read_event()? {
            Event::Start(_) => depth += 1,
            Event::End(_) => {
                depth -= 1;
                if depth == 0 {
                    return Ok(());
                }
            }
            Event::Eof => {
                return Err(SoaLedgerError::TemplatePatch(
                    "unexpected end of worksheet xml".into(),
                ))
            }
            _ => {}
        }
    }
}

fn write_cell<W: Write>(
    writer: &mut Writer<W>,
    row: usize,
    col: usize,
    value: &PatchValue,
    style: Option<&str>,
) -> Result<()> {
    let reference = cell_address(row, col);
    let mut start = BytesStart::new("c");
    start.push_attribute(("r", reference.as_str()));
    if let Some(style) = style {
        start.push_attribute(("s", style));
    }

    match value {
        PatchValue::Number(n) if n.is_finite() => {
            writer.write_event(Event::Start(start))?;
            writer.write_event(Event::Start(BytesStart::new("v")))?;
            writer.write_event(Event::Text(BytesText::new(&n.to_string())))?;
            writer.write_event(Event::End(BytesEnd::new("v")))?;
            writer.write_event(Event::End(BytesEnd::new("c")))?;
        }
        PatchValue::Text(text) if !text.is_empty() => {
            start.push_attribute(("t", "inlineStr"));
            writer.write_event(Event::Start(start))?;
            writer.write_event(Event::Start(BytesStart::new("is")))?;
            let mut t = BytesStart::new("t");
            if text.trim() != text {
                t.push_attribute(("xml:space", "preserve"));
            }
            writer.write_event(Event::Start(t))?;
            writer.write_event(Event::Text(BytesText::new(text)))?;
            writer.write_event(Event::End(BytesEnd::new("t")))?;
            writer.write_event(Event::End(BytesEnd::new("is")))?;
            writer.write_event(Event::End(BytesEnd::new("c")))?;
        }
        _ => writer.write_event(Event::Empty(start))?,
    }
    Ok(())
}

fn write_cells<W: Write>(
    writer: &mut Writer<W>,
    row: usize,
    cells: &BTreeMap<usize, PatchValue>,
) -> Result<()> {
    for (col, value) in cells {
        write_cell(writer, row, *col, value, None)?;
    }
    Ok(())
}

/// Writes the pending rows that come before `limit` as brand-new rows.
fn write_rows_before<W: Write>(
    writer: &mut Writer<W>,
    pending: &mut RowPatches,
    limit: usize,
) -> Result<()> {
    let rows: Vec<usize> = pending.range(..limit).map(|(row, _)| *row).collect();
    for row in rows {
        let Some(cells) = pending.remove(&row) else {
            continue;
        };
        let mut start = BytesStart::new("row");
        start.push_attribute(("r", (row + 1).to_string().as_str()));
        writer.write_event(Event::Start(start))?;
        write_cells(writer, row, &cells)?;
        writer.write_event(Event::End(BytesEnd::new("row")))?;
    }
    Ok(())
}

/// Writes the pending cells of the current row that sit left of `limit`.
fn write_cells_before<W: Write>(
    writer: &mut Writer<W>,
    row: usize,
    cells: &mut BTreeMap<usize, PatchValue>,
    limit: usize,
) -> Result<()> {
    let cols: Vec<usize> = cells.range(..limit).map(|(col, _)| *col).collect();
    for col in cols {
        if let Some(value) = cells.remove(&col) {
            write_cell(writer, row, col, &value, None)?;
        }
    }
    Ok(())
}

fn patch_worksheet(xml: &[u8], patches: &RowPatches) -> Result<Vec<u8>> {
    let mut pending = patches.clone();
    let mut reader = Reader::from_reader(xml);
    reader.config_mut().trim_text(false);
    let mut writer = Writer::new(Vec::with_capacity(xml.len() + 1024));

    let mut in_sheet_data = false;
    // Row currently open in the source plus the patches still to place in it.
    let mut open_row: Option<(usize, BTreeMap<usize, PatchValue>)> = None;

    loop {
        match reader.read_event()? {
            Event::Eof => break,

            Event::Start(e) if e.local_name().as_ref() == b"sheetData" => {
                in_sheet_data = true;
                writer.write_event(Event::Start(e))?;
            }
            Event::Empty(e) if e.local_name().as_ref() == b"sheetData" => {
                let end = String::from_utf8_lossy(e.name().as_ref()).into_owned();
                writer.write_event(Event::Start(e))?;
                write_rows_before(&mut writer, &mut pending, usize::MAX)?;
                writer.write_event(Event::End(BytesEnd::new(end)))?;
            }
            Event::End(e) if e.local_name().as_ref() == b"sheetData" => {
                write_rows_before(&mut writer, &mut pending, usize::MAX)?;
                in_sheet_data = false;
                writer.write_event(Event::End(e))?;
            }

            Event::Start(e) if in_sheet_data && e.local_name().as_ref() == b"row" => {
                let row = row_index(&e)?;
                write_rows_before(&mut writer, &mut pending, row)?;
                match pending.remove(&row) {
                    Some(cells) => {
                        writer.write_event(Event::Start(without_spans(&e)?))?;
                        open_row = Some((row, cells));
                    }
                    None => writer.write_event(Event::Start(e))?,
                }
            }
            Event::Empty(e) if in_sheet_data && e.local_name().as_ref() == b"row" => {
                let row = row_index(&e)?;
                write_rows_before(&mut writer, &mut pending, row)?;
                match pending.remove(&row) {
                    Some(cells) => {
                        let end = String::from_utf8_lossy(e.name().as_ref()).into_owned();
                        writer.write_event(Event::Start(without_spans(&e)?))?;
                        write_cells(&mut writer, row, &cells)?;
                        writer.write_event(Event::End(BytesEnd::new(end)))?;
                    }
                    None => writer.write_event(Event::Empty(e))?,
                }
            }
            Event::End(e) if in_sheet_data && e.local_name().as_ref() == b"row" => {
                if let Some((row, cells)) = open_row.take() {
                    write_cells(&mut writer, row, &cells)?;
                }
                writer.write_event(Event::End(e))?;
            }

            Event::Start(e) if e.local_name().as_ref() == b"c" => match open_row.as_mut() {
                Some((row, cells)) => {
                    let col = cell_col(&e)?;
                    write_cells_before(&mut writer, *row, cells, col)?;
                    match cells.remove(&col) {
                        Some(value) => {
                            let style = attr_value(&e, b"s")?;
                            write_cell(&mut writer, *row, col, &value, style.as_deref())?;
                            skip_element(&mut reader)?;
                        }
                        None => writer.write_event(Event::Start(e))?,
                    }
                }
                None => writer.write_event(Event::Start(e))?,
            },
            Event::Empty(e) if e.local_name().as_ref() == b"c" => match open_row.as_mut() {
                Some((row, cells)) => {
                    let col = cell_col(&e)?;
                    write_cells_before(&mut writer, *row, cells, col)?;
                    match cells.remove(&col) {
                        Some(value) => {
                            let style = attr_value(&e, b"s")?;
                            write_cell(&mut writer, *row, col, &value, style.as_deref())?;
                        }
                        None => writer.write_event(Event::Empty(e))?,
                    }
                }
                None => writer.write_event(Event::Empty(e))?,
            },

            event => writer.write_event(event)?,
        }
    }

    if !pending.is_empty() {
        return Err(SoaLedgerError::TemplatePatch(
            "worksheet xml has no <sheetData> section".into(),
        ));
    }

    Ok(writer.into_inner())
}

enum Rewrite {
    Keep,
    Drop,
    Replace(BytesStart<'static>),
}

/// Streams `xml` through, letting `decide` keep, drop or replace each element tag.
fn rewrite_elements<F>(xml: &[u8], mut decide: F) -> Result<Vec<u8>>
where
    F: FnMut(&BytesStart<'_>) -> Result<Rewrite>,
{
    let mut reader = Reader::from_reader(xml);
    reader.config_mut().trim_text(false);
    let mut writer = Writer::new(Vec::with_capacity(xml.len()));

    loop {
        match reader.read_event()? {
            Event::Eof => break,
            Event::Empty(e) => match decide(&e)? {
                Rewrite::Keep => writer.write_event(Event::Empty(e))?,
                Rewrite::Drop => {}
                Rewrite::Replace(start) => writer.write_event(Event::Empty(start))?,
            },
            Event::Start(e) => match decide(&e)? {
                Rewrite::Keep => writer.write_event(Event::Start(e))?,
                Rewrite::Drop => skip_element(&mut reader)?,
                Rewrite::Replace(start) => writer.write_event(Event::Start(start))?,
            },
            event => writer.write_event(event)?,
        }
    }

    Ok(writer.into_inner())
}

fn drop_calc_chain_override(xml: &[u8]) -> Result<Vec<u8>> {
    rewrite_elements(xml, |e| {
        if e.local_name().as_ref() == b"Override"
            && attr_value(e, b"PartName")?.is_some_and(|p| p.ends_with("/calcChain.xml"))
        {
            Ok(Rewrite::Drop)
        } else {
            Ok(Rewrite::Keep)
        }
    })
}

fn drop_calc_chain_relationship(xml: &[u8]) -> Result<Vec<u8>> {
    rewrite_elements(xml, |e| {
        if e.local_name().as_ref() == b"Relationship"
            && attr_value(e, b"Type")?.is_some_and(|t| t.ends_with("/calcChain"))
        {
            Ok(Rewrite::Drop)
        } else {
            Ok(Rewrite::Keep)
        }
    })
}

fn force_full_calc_on_load(xml: &[u8]) -> Result<Vec<u8>> {
    rewrite_elements(xml, |e| {
        if e.local_name().as_ref() != b"calcPr" {
            return Ok(Rewrite::Keep);
        }
        let mut start =
            BytesStart::new(String::from_utf8_lossy(e.name().as_ref()).into_owned());
        for attr in e.attributes() {
            let attr = attr?;
            if attr.key.as_ref() != b"fullCalcOnLoad" {
                start.push_attribute(attr);
            }
        }
        start.push_attribute(("fullCalcOnLoad", "1"));
        Ok(Rewrite::Replace(start))
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    const SHEET_XML: &str = r#"<?xml version="1.0" encoding="UTF-8" standalone="yes"?>
<worksheet xmlns="http://schemas.openxmlformats.org/spreadsheetml/2006/main"><sheetData><row r="2" spans="1:3"><c r="A2" s="1" t="s"><v>0</v></c><c r="C2" s="4"><f>A2*2</f><v>10</v></c></row><row r="5"><c r="B5"><v>1</v></c></row></sheetData></worksheet>"#;

    fn patches(entries: &[(usize, usize, PatchValue)]) -> RowPatches {
        let mut rows = RowPatches::new();
        for (row, col, value) in entries {
            rows.entry(*row).or_default().insert(*col, value.clone());
        }
        rows
    }

    fn patched(entries: &[(usize, usize, PatchValue)]) -> String {
        let bytes = patch_worksheet(SHEET_XML.as_bytes(), &patches(entries)).unwrap();
        String::from_utf8(bytes).unwrap()
    }

    #[test]
    fn test_replaces_formula_cell_and_keeps_style() {
        let xml = patched(&[(1, 2, PatchValue::Number(2750.5))]);
        assert!(xml.contains(r#"<c r="C2" s="4"><v>2750.5</v></c>"#));
        assert!(!xml.contains("<f>"));
        assert!(xml.contains(r#"<c r="A2" s="1" t="s"><v>0</v></c>"#));
        assert!(!xml.contains("spans"));
    }

    #[test]
    fn test_inserts_cells_and_rows_in_order() {
        let xml = patched(&[
            (1, 1, PatchValue::Text("Mendoza".into())),
            (0, 2, PatchValue::Number(1.0)),
            (2, 0, PatchValue::Text("DS".into())),
            (9, 3, PatchValue::Number(3.0)),
        ]);

        let row1 = xml.find(r#"<row r="1">"#).unwrap();
        let a2 = xml.find(r#"r="A2""#).unwrap();
        let b2 = xml.find(r#"r="B2""#).unwrap();
        let c2 = xml.find(r#"r="C2""#).unwrap();
        let row3 = xml.find(r#"<row r="3">"#).unwrap();
        let row5 = xml.find(r#"<row r="5">"#).unwrap();
        let row10 = xml.find(r#"<row r="10">"#).unwrap();

        assert!(row1 < a2 && a2 < b2 && b2 < c2 && c2 < row3 && row3 < row5 && row5 < row10);
        assert!(xml.contains(r#"<c r="B2" t="inlineStr"><is><t>Mendoza</t></is></c>"#));
    }

    #[test]
    fn test_empty_value_clears_cell() {
        let xml = patched(&[(4, 1, PatchValue::Empty)]);
        assert!(xml.contains(r#"<c r="B5"/>"#));
    }

    #[test]
    fn test_text_is_escaped() {
        let xml = patched(&[(1, 1, PatchValue::Text("Cruz & Sons".into()))]);
        assert!(xml.contains("Cruz &amp; Sons"));
    }

    #[test]
    fn test_calc_chain_references_are_dropped() {
        let types = br#"<Types><Override PartName="/xl/calcChain.xml" ContentType="x"/><Override PartName="/xl/workbook.xml" ContentType="y"/></Types>"#;
        let out = String::from_utf8(drop_calc_chain_override(types).unwrap()).unwrap();
        assert!(!out.contains("calcChain"));
        assert!(out.contains("/xl/workbook.xml"));

        let workbook = br#"<workbook><calcPr calcId="191029" fullCalcOnLoad="0"/></workbook>"#;
        let out = String::from_utf8(force_full_calc_on_load(workbook).unwrap()).unwrap();
        assert!(out.contains(r#"<calcPr calcId="191029" fullCalcOnLoad="1"/>"#));
    }

    #[test]
    fn test_resolve_target() {
        assert_eq!(resolve_target("worksheets/sheet1.xml"), "xl/worksheets/sheet1.xml");
        assert_eq!(resolve_target("/xl/worksheets/sheet2.xml"), "xl/worksheets/sheet2.xml");
    }
}
