//! Per-lot profile generation from the master list.
//!
//! Every lot group is written into a copy of the profile template: account details and the
//! crop block on the account sheet, the old account and the recomputed charges on the
//! statement sheet. The template on disk is only ever read.

use crate::archive::ProfileArchive;
use crate::error::{Result, SoaLedgerError};
use crate::grid::{CellValue, Workbook};
use crate::layout::*;
use crate::masters_list::{group, parse_masters_list};
use crate::normalize::empty_if_placeholder;
use crate::resolver::{derive_charges, RateLine, SoaSources};
use crate::schema::LotGroup;
use crate::utils::sanitize_file_component;
use crate::xlsx_patch::{patch_template, CellPatch, PatchValue};
use log::{debug, info, warn};
use std::fs;
use std::path::Path;

/// Where the template is looked for when no explicit path is configured.
pub const DEFAULT_TEMPLATE_CANDIDATES: &[&str] = &["data/template.xlsx", "public/template.xlsx"];

/// Raw bytes of the profile template plus where they came from.
#[derive(Debug, Clone)]
pub struct TemplateSource {
    bytes: Vec<u8>,
    origin: String,
}

impl TemplateSource {
    pub fn from_bytes(bytes: Vec<u8>, origin: impl Into<String>) -> Self {
        Self {
            bytes,
            origin: origin.into(),
        }
    }

    pub fn from_path(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref();
        let bytes = fs::read(path)?;
        Ok(Self::from_bytes(bytes, path.display().to_string()))
    }

    /// Loads the first candidate path that exists.
    pub fn locate<P: AsRef<Path>>(candidates: &[P]) -> Result<Self> {
        let mut tried = Vec::with_capacity(candidates.len());

        for candidate in candidates {
            let path = candidate.as_ref();
            tried.push(path.display().to_string());
            if path.is_file() {
                info!("Using profile template {}", path.display());
                return Self::from_path(path);
            }
            debug!("Template candidate {} does not exist", path.display());
        }

        Err(SoaLedgerError::TemplateMissing { tried })
    }

    pub fn locate_default() -> Result<Self> {
        Self::locate(DEFAULT_TEMPLATE_CANDIDATES)
    }

    pub fn bytes(&self) -> &[u8] {
        &self.bytes
    }

    pub fn origin(&self) -> &str {
        &self.origin
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct GeneratedProfile {
    pub bytes: Vec<u8>,
    pub filename: String,
}

pub struct ProfileGenerator {
    template: TemplateSource,
    rate_lines: Vec<RateLine>,
}

impl ProfileGenerator {
    /// Validates the template and reads the rate table of its statement sheet once.
    pub fn new(template: TemplateSource) -> Result<Self> {
        let workbook = Workbook::from_bytes(template.bytes())?;
        if workbook.sheet(ACC_TEMPLATE_SHEET).is_none() {
            return Err(SoaLedgerError::TemplateSheetMissing(
                ACC_TEMPLATE_SHEET.to_string(),
            ));
        }
        let soa = workbook
            .sheet(SOA_TEMPLATE_SHEET)
            .ok_or_else(|| SoaLedgerError::TemplateSheetMissing(SOA_TEMPLATE_SHEET.to_string()))?;

        let rate_lines = SoaSources::new(soa, None).rate_lines();
        debug!(
            "Template {} carries {} rate line(s)",
            template.origin(),
            rate_lines.iter().filter(|l| l.rate.is_some()).count()
        );

        Ok(Self {
            template,
            rate_lines,
        })
    }

    pub fn template(&self) -> &TemplateSource {
        &self.template
    }

    pub fn generate(&self, group: &LotGroup, sequence: usize) -> Result<GeneratedProfile> {
        let patches = profile_patches(group, &self.rate_lines);
        let bytes = patch_template(self.template.bytes(), &patches)?;
        let filename = profile_filename(group, sequence);
        debug!("Generated {} ({} bytes)", filename, bytes.len());
        Ok(GeneratedProfile { bytes, filename })
    }

    /// Generates one profile per group, numbered from 1 in group order.
    pub fn generate_all(&self, groups: &[LotGroup]) -> Result<Vec<GeneratedProfile>> {
        groups
            .iter()
            .enumerate()
            .map(|(i, group)| self.generate(group, i + 1))
            .collect()
    }
}

/// Runs the whole generation path: master list bytes in, zip archive bytes out.
pub fn generate_profiles(master_bytes: &[u8], generator: &ProfileGenerator) -> Result<Vec<u8>> {
    let workbook = Workbook::from_bytes(master_bytes)?;
    let sheet = workbook
        .first_sheet()
        .ok_or_else(|| SoaLedgerError::Parse("master's list has no readable worksheet".into()))?;

    let groups = group(parse_masters_list(sheet));
    if groups.is_empty() {
        return Err(SoaLedgerError::NoLotRecords);
    }

    let profiles = generator.generate_all(&groups)?;
    let archive = ProfileArchive::from_profiles(&profiles)?;
    info!(
        "Generated {} profile(s) from '{}' ({} bytes archived)",
        profiles.len(),
        sheet.name(),
        archive.len()
    );
    Ok(archive)
}

/// Converts master list text into a cell value: "N" and blanks clear the cell, numeric text
/// becomes a number, everything else stays text.
pub fn coerce_cell(raw: &str) -> PatchValue {
    let value = empty_if_placeholder(raw);
    if value.is_empty() {
        return PatchValue::Empty;
    }
    match value.parse::<f64>() {
        Ok(n) if n.is_finite() && value.chars().any(|c| c.is_ascii_digit()) => {
            PatchValue::Number(n)
        }
        _ => PatchValue::Text(value),
    }
}

fn round_cents(value: f64) -> f64 {
    (value * 100.0).round() / 100.0
}

/// Cell writes for one group. Charges are recomputed from the planted areas and the
/// template's rate lines and land as literal values.
pub fn profile_patches(group: &LotGroup, rate_lines: &[RateLine]) -> Vec<CellPatch> {
    let first = group.rows.first();
    let acc = |pos: CellPos, raw: &str| CellPatch::new(ACC_TEMPLATE_SHEET, pos, coerce_cell(raw));

    let mut patches = vec![
        acc(ACC_LOT_CODE, &group.lot_code),
        acc(ACC_OWNER_FIRST, &group.land_owner_first),
        acc(ACC_OWNER_LAST, &group.land_owner_last),
        acc(ACC_FARMER_FIRST, first.map_or("", |r| r.farmer_first.as_str())),
        acc(ACC_FARMER_LAST, first.map_or("", |r| r.farmer_last.as_str())),
    ];

    if group.rows.len() > CROP_BLOCK_CAPACITY {
        warn!(
            "Lot {} has {} crop rows; only the first {} fit the template",
            group.lot_code,
            group.rows.len(),
            CROP_BLOCK_CAPACITY
        );
    }

    let crop_rows = &group.rows[..group.rows.len().min(CROP_BLOCK_CAPACITY)];
    for (i, row) in crop_rows.iter().enumerate() {
        let r = CROP_BLOCK_FIRST_ROW + i;
        patches.push(acc((r, CROP_SEASON_COL), &row.crop_season));
        patches.push(acc((r, CROP_YEAR_COL), &row.crop_year));
        patches.push(acc((r, PLANTED_AREA_COL), &row.planted_area));
    }

    let old_account_raw = first.map_or("", |r| r.old_account.as_str());
    patches.push(CellPatch::new(
        SOA_TEMPLATE_SHEET,
        SOA_OLD_ACCOUNT,
        coerce_cell(old_account_raw),
    ));

    // Charges cover only the crop rows written to the sheet.
    let areas: Vec<Option<f64>> = crop_rows
        .iter()
        .map(|row| CellValue::from(row.planted_area.as_str()).as_number())
        .collect();
    let charges = derive_charges(&areas, rate_lines);
    let old_account = CellValue::from(empty_if_placeholder(old_account_raw).as_str()).as_number();

    let computed = [
        ((SOA_SUBTOTAL_FALLBACK_ROW, SOA_PRINCIPAL_COL), charges.principal),
        ((SOA_SUBTOTAL_FALLBACK_ROW, SOA_PENALTY_COL), charges.penalty),
    ];
    for (pos, value) in computed {
        if let Some(value) = value {
            patches.push(CellPatch::new(
                SOA_TEMPLATE_SHEET,
                pos,
                PatchValue::Number(round_cents(value)),
            ));
        }
    }

    let parts = [charges.principal, charges.penalty, old_account];
    if parts.iter().any(Option::is_some) {
        let total: f64 = parts.iter().flatten().sum();
        patches.push(CellPatch::new(
            SOA_TEMPLATE_SHEET,
            SOA_TOTAL,
            PatchValue::Number(round_cents(total)),
        ));
    }

    patches
}

fn display_name(last: &str, first: &str) -> Option<String> {
    let parts: Vec<String> = [last, first]
        .iter()
        .map(|part| empty_if_placeholder(part))
        .filter(|part| !part.is_empty())
        .collect();
    if parts.is_empty() {
        None
    } else {
        Some(parts.join(", "))
    }
}

/// `"{sequence:02} {lot code} {Last, First}.xlsx"`. The owner's name is preferred, then the
/// farmer's; with neither the name segment is left out.
pub fn profile_filename(group: &LotGroup, sequence: usize) -> String {
    let name = display_name(&group.land_owner_last, &group.land_owner_first).or_else(|| {
        group
            .rows
            .first()
            .and_then(|row| display_name(&row.farmer_last, &row.farmer_first))
    });
    let lot = sanitize_file_component(&group.lot_code);

    match name {
        Some(name) => format!(
            "{:02} {} {}.xlsx",
            sequence,
            lot,
            sanitize_file_component(&name)
        ),
        None => format!("{:02} {}.xlsx", sequence, lot),
    }
}
