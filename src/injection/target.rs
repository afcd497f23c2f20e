use crate::error::{is_rate_limit_message, Result, SoaLedgerError};
use crate::grid::CellValue;
use crate::normalize::leading_integer;
use crate::schema::ExtractedData;
use crate::utils::range_with_sheet;
use log::{debug, warn};
use serde::{Deserialize, Serialize};
use std::future::Future;

/// Column holding the file id of every destination row.
pub const IDENTIFIER_RANGE: &str = "A:A";

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RangeUpdate {
    pub range: String,
    pub values: Vec<Vec<CellValue>>,
}

impl RangeUpdate {
    pub fn row(range: impl Into<String>, values: Vec<CellValue>) -> Self {
        Self {
            range: range.into(),
            values: vec![values],
        }
    }
}

/// A spreadsheet-like destination addressed with A1 ranges.
pub trait SheetTarget: Send + Sync {
    fn read_range(&self, range: &str) -> impl Future<Output = Result<Vec<Vec<CellValue>>>> + Send;

    fn write_range(&self, update: RangeUpdate) -> impl Future<Output = Result<()>> + Send;

    /// Writes several ranges. The default issues one write per range.
    fn batch_write(&self, updates: Vec<RangeUpdate>) -> impl Future<Output = Result<()>> + Send {
        async move {
            for update in updates {
                self.write_range(update).await?;
            }
            Ok(())
        }
    }
}

/// Maps a failed destination call onto the error taxonomy.
pub fn classify_failure(status: Option<u16>, message: impl Into<String>) -> SoaLedgerError {
    let message = message.into();
    if status == Some(429) || is_rate_limit_message(&message) {
        SoaLedgerError::RateLimited(message)
    } else {
        SoaLedgerError::WriteFailed(message)
    }
}

/// Finds the 1-based row whose identifier cell parses to the same integer as `file_id`.
pub async fn find_target_row<T: SheetTarget>(
    target: &T,
    file_id: &str,
    tab_name: Option<&str>,
) -> Result<usize> {
    let wanted = leading_integer(file_id)
        .ok_or_else(|| SoaLedgerError::MissingFileId(file_id.to_string()))?;

    let column = target
        .read_range(&range_with_sheet(tab_name, IDENTIFIER_RANGE))
        .await?;

    let found = column.iter().position(|row| {
        row.first()
            .and_then(|cell| leading_integer(&cell.as_text()))
            .is_some_and(|id| id == wanted)
    });

    match found {
        Some(index) => {
            debug!("File id {} matches destination row {}", file_id, index + 1);
            Ok(index + 1)
        }
        None => {
            let sample: Vec<String> = column
                .iter()
                .take(10)
                .map(|row| row.first().map(CellValue::as_text).unwrap_or_default())
                .collect();
            warn!(
                "File id {} not found among {} identifier rows (first values: {:?})",
                file_id,
                column.len(),
                sample
            );
            Err(SoaLedgerError::TargetRowNotFound {
                file_id: file_id.to_string(),
            })
        }
    }
}

fn text(value: &str) -> CellValue {
    CellValue::Text(value.to_string())
}

/// Range writes for one extracted document landing on destination row `row`.
pub fn build_updates(data: &ExtractedData, row: usize, tab_name: Option<&str>) -> Vec<RangeUpdate> {
    let mut updates = Vec::with_capacity(2);

    if let Some(account) = data.account_details.first() {
        updates.push(RangeUpdate::row(
            range_with_sheet(tab_name, &format!("B{row}:G{row}")),
            vec![
                text(&account.lot_no),
                text(&account.lot_owner.last_name),
                text(&account.lot_owner.first_name),
                text(""),
                text(&account.farmer.last_name),
                text(&account.farmer.first_name),
            ],
        ));
    }

    if let Some(soa) = data.soa_details.first() {
        updates.push(RangeUpdate::row(
            range_with_sheet(tab_name, &format!("I{row}:M{row}")),
            vec![
                text(&soa.area),
                text(&soa.principal),
                text(&soa.penalty),
                text(&soa.old_account),
                text(&soa.total),
            ],
        ));
    }

    updates
}
