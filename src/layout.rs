//! Fixed positions of the two supported workbook layouts (lot profile and master list).
//!
//! Rows and columns are zero-based; the A1 address is noted next to each cell.

/// Sheet name fragments used to pick sheets out of an uploaded profile.
pub const ACC_SHEET_FRAGMENT: &str = "00 ACC DETAILS";
pub const SOA_SHEET_FRAGMENT: &str = "01 SOA";

/// Exact sheet names inside the profile template.
pub const ACC_TEMPLATE_SHEET: &str = "00 ACC DETAILS 01";
pub const SOA_TEMPLATE_SHEET: &str = "01 SOA 01";

pub type CellPos = (usize, usize);

// Account details sheet, template cells.
pub const ACC_LOT_CODE: CellPos = (2, 2); // C3
pub const ACC_OWNER_FIRST: CellPos = (6, 2); // C7
pub const ACC_OWNER_LAST: CellPos = (8, 2); // C9
pub const ACC_FARMER_FIRST: CellPos = (10, 2); // C11
pub const ACC_FARMER_LAST: CellPos = (12, 2); // C13

// Crop block: one row per crop season, B30 downwards.
pub const CROP_BLOCK_FIRST_ROW: usize = 29;
pub const CROP_BLOCK_CAPACITY: usize = 20;
pub const CROP_SEASON_COL: usize = 1; // B
pub const CROP_YEAR_COL: usize = 2; // C
pub const PLANTED_AREA_COL: usize = 3; // D

// Statement of account sheet.
pub const SOA_AREA: CellPos = (12, 6); // G13
pub const SOA_COMPONENT_FIRST_ROW: usize = 15; // row 16
pub const SOA_SUBTOTAL_FALLBACK_ROW: usize = 99; // row 100
pub const SOA_RATE_COL: usize = 2; // C
pub const SOA_PRINCIPAL_COL: usize = 3; // D
pub const SOA_PENALTY_PCT_COL: usize = 4; // E
pub const SOA_PENALTY_COL: usize = 5; // F
pub const SOA_OLD_ACCOUNT: CellPos = (100, 6); // G101
pub const SOA_TOTAL: CellPos = (101, 6); // G102
pub const SOA_TOTAL_ALT: CellPos = (102, 6); // G103

// Master list columns.
pub const ML_LOT: usize = 2; // C
pub const ML_CROP_SEASON: usize = 3; // D
pub const ML_CROP_YEAR: usize = 4; // E
pub const ML_PLANTED_AREA: usize = 7; // H
pub const ML_LAND_OWNER_LAST: usize = 12; // M
pub const ML_LAND_OWNER_FIRST: usize = 13; // N
pub const ML_FARMER_LAST: usize = 14; // O
pub const ML_FARMER_FIRST: usize = 15; // P
pub const ML_OLD_ACCOUNT: usize = 16; // Q
