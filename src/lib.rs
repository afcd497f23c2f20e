//! # SOA Ledger Builder
//!
//! A library for reading statement-of-account records out of per-lot ledger workbooks and for
//! producing those workbooks from a master list.
//!
//! ## Core Concepts
//!
//! - **Lot profile**: A workbook with an account details sheet (`00 ACC DETAILS ..`) and a
//!   statement of account sheet (`01 SOA ..`)
//! - **Anchors**: Label cells ("ACCOUNT DETAILS", "STATEMENT OF ACCOUNT", "SUB-TOTAL") that
//!   fields are located relative to
//! - **Tiered totals**: Statement totals are read from their result cell, else summed from the
//!   component rows, else recomputed from planted areas and rates
//! - **Master list**: One row per crop season of a lot; rows are grouped by lot code and every
//!   group becomes one generated profile
//! - **Injection**: Extracted records are written into a destination sheet at the row whose
//!   identifier matches the file id, with rate-limit aware retries
//!
//! ## Example
//!
//! ```rust,ignore
//! use soa_ledger_builder::*;
//!
//! let bytes = std::fs::read("12 Dela Cruz.xlsx")?;
//! let data = extract_data(&bytes, "12 Dela Cruz.xlsx")?;
//! println!("{}", serde_json::to_string_pretty(&data)?);
//!
//! let generator = ProfileGenerator::new(TemplateSource::locate_default()?)?;
//! let archive = generate_profiles(&std::fs::read("masters-list.xlsx")?, &generator)?;
//! std::fs::write(ARCHIVE_FILENAME, archive)?;
//! ```

pub mod anchor;
pub mod archive;
pub mod error;
pub mod extractor;
pub mod generator;
pub mod grid;
pub mod injection;
pub mod layout;
pub mod masters_list;
pub mod normalize;
pub mod resolver;
pub mod schema;
pub mod utils;
pub mod xlsx_patch;

pub use anchor::{find_row, find_row_any};
pub use archive::{ProfileArchive, ARCHIVE_FILENAME};
pub use error::{Result, SoaLedgerError};
pub use extractor::{
    extract_account_details, extract_data, extract_from_workbook, extract_soa_details,
};
pub use generator::{
    generate_profiles, profile_filename, GeneratedProfile, ProfileGenerator, TemplateSource,
    DEFAULT_TEMPLATE_CANDIDATES,
};
pub use grid::{CellValue, Grid, Workbook};
pub use injection::*;
pub use masters_list::{group, parse_masters_list};
pub use normalize::{empty_if_placeholder, file_id, format_amount};
pub use resolver::{resolve_soa, resolve_with_trace, SoaSources, Tier};
pub use schema::*;
pub use utils::*;

use log::info;
use std::path::Path;

/// Reads a workbook from disk and extracts it, taking the file id from the file name.
pub fn extract_file(path: impl AsRef<Path>) -> Result<ExtractedData> {
    let path = path.as_ref();
    let filename = path
        .file_name()
        .and_then(|n| n.to_str())
        .ok_or_else(|| SoaLedgerError::MissingFileId(path.display().to_string()))?;

    info!("Reading {}", path.display());
    let bytes = std::fs::read(path)?;
    extract_data(&bytes, filename)
}
