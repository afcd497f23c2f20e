//! Batch injection of extracted records into a destination spreadsheet.

pub mod orchestrator;
#[cfg(feature = "sheets")]
pub mod sheets;
pub mod target;
pub mod types;

pub use orchestrator::{BatchOrchestrator, RetryHandle};
#[cfg(feature = "sheets")]
pub use sheets::{GoogleSheetsTarget, SheetsConfig};
pub use target::{build_updates, classify_failure, find_target_row, RangeUpdate, SheetTarget};
pub use types::*;
