use crate::anchor::{find_row, ACCOUNT_DETAILS_MARKER, STATEMENT_OF_ACCOUNT_MARKER};
use crate::error::Result;
use crate::grid::{Grid, Workbook};
use crate::layout::{ACC_SHEET_FRAGMENT, SOA_SHEET_FRAGMENT};
use crate::normalize::{file_id, format_amount};
use crate::resolver::{resolve_soa, SoaSources};
use crate::schema::{AccountDetail, ExtractedData, PersonName, SoaDetail};
use log::{debug, info};

/// Position of a field relative to an anchor row.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct FieldOffset {
    pub d_row: usize,
    pub col: usize,
    pub numeric: bool,
}

impl FieldOffset {
    pub const fn text(d_row: usize, col: usize) -> Self {
        Self {
            d_row,
            col,
            numeric: false,
        }
    }

    pub const fn amount(d_row: usize, col: usize) -> Self {
        Self {
            d_row,
            col,
            numeric: true,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AccountField {
    LotNo,
    OwnerFirst,
    OwnerMiddle,
    OwnerLast,
    FarmerFirst,
    FarmerMiddle,
    FarmerLast,
}

/// Layout of the ACCOUNT DETAILS block, relative to its marker row.
pub const ACCOUNT_DETAIL_OFFSETS: &[(AccountField, FieldOffset)] = &[
    (AccountField::LotNo, FieldOffset::text(1, 2)),
    (AccountField::OwnerFirst, FieldOffset::text(5, 2)),
    (AccountField::OwnerMiddle, FieldOffset::text(6, 2)),
    (AccountField::OwnerLast, FieldOffset::text(7, 2)),
    (AccountField::FarmerFirst, FieldOffset::text(9, 2)),
    (AccountField::FarmerMiddle, FieldOffset::text(10, 2)),
    (AccountField::FarmerLast, FieldOffset::text(11, 2)),
];

/// Field values read through an offset table.
#[derive(Debug, Clone, PartialEq)]
pub struct FieldValues<F> {
    values: Vec<(F, String)>,
}

impl<F: Copy + PartialEq> FieldValues<F> {
    pub fn get(&self, field: F) -> &str {
        self.values
            .iter()
            .find(|(f, _)| *f == field)
            .map(|(_, v)| v.as_str())
            .unwrap_or("")
    }

    pub fn any_present(&self, fields: &[F]) -> bool {
        fields.iter().any(|f| !self.get(*f).is_empty())
    }
}

/// Reads every entry of `table` relative to `anchor`. Cells outside the grid read as empty.
pub fn read_fields<F: Copy>(
    grid: &Grid,
    anchor: usize,
    table: &[(F, FieldOffset)],
) -> FieldValues<F> {
    let values = table
        .iter()
        .map(|(field, offset)| {
            let raw = grid.text(anchor + offset.d_row, offset.col);
            let value = if offset.numeric && !raw.is_empty() {
                format_amount(&raw)
            } else {
                raw
            };
            (*field, value)
        })
        .collect();

    FieldValues { values }
}

/// Extracts the account detail block. Yields nothing when the marker is missing, the lot
/// number is blank, or no name field is filled in.
pub fn extract_account_details(grid: &Grid) -> Vec<AccountDetail> {
    let Some(anchor) = find_row(grid, ACCOUNT_DETAILS_MARKER) else {
        debug!("No ACCOUNT DETAILS block in sheet '{}'", grid.name());
        return Vec::new();
    };

    let fields = read_fields(grid, anchor, ACCOUNT_DETAIL_OFFSETS);
    let lot_no = fields.get(AccountField::LotNo);
    if lot_no.is_empty() {
        return Vec::new();
    }

    let has_names = fields.any_present(&[
        AccountField::OwnerFirst,
        AccountField::OwnerMiddle,
        AccountField::OwnerLast,
        AccountField::FarmerFirst,
        AccountField::FarmerMiddle,
        AccountField::FarmerLast,
    ]);
    if !has_names {
        return Vec::new();
    }

    vec![AccountDetail {
        lot_no: lot_no.to_string(),
        lot_owner: PersonName {
            first_name: fields.get(AccountField::OwnerFirst).to_string(),
            middle_name: fields.get(AccountField::OwnerMiddle).to_string(),
            last_name: fields.get(AccountField::OwnerLast).to_string(),
        },
        farmer: PersonName {
            first_name: fields.get(AccountField::FarmerFirst).to_string(),
            middle_name: fields.get(AccountField::FarmerMiddle).to_string(),
            last_name: fields.get(AccountField::FarmerLast).to_string(),
        },
    }]
}

/// Extracts the statement-of-account totals. The account sheet feeds the derived tier of
/// the resolver when it is available.
pub fn extract_soa_details(soa: &Grid, account: Option<&Grid>) -> Vec<SoaDetail> {
    if find_row(soa, STATEMENT_OF_ACCOUNT_MARKER).is_none() {
        debug!("No STATEMENT OF ACCOUNT block in sheet '{}'", soa.name());
        return Vec::new();
    }

    let detail = resolve_soa(&SoaSources::new(soa, account));
    if detail.is_empty() {
        Vec::new()
    } else {
        vec![detail]
    }
}

pub fn extract_from_workbook(workbook: &Workbook, filename: &str) -> ExtractedData {
    let account = workbook.find_sheet(ACC_SHEET_FRAGMENT);
    let soa = workbook.find_sheet(SOA_SHEET_FRAGMENT);

    let data = ExtractedData {
        file_id: file_id(filename),
        account_details: account.map(extract_account_details).unwrap_or_default(),
        soa_details: soa
            .map(|soa| extract_soa_details(soa, account))
            .unwrap_or_default(),
    };

    info!(
        "Extracted '{}': file id '{}', {} account detail(s), {} SOA detail(s)",
        filename,
        data.file_id,
        data.account_details.len(),
        data.soa_details.len()
    );
    data
}

/// Decodes `bytes` and extracts the account and statement records.
pub fn extract_data(bytes: &[u8], filename: &str) -> Result<ExtractedData> {
    let workbook = Workbook::from_bytes(bytes)?;
    Ok(extract_from_workbook(&workbook, filename))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::grid::CellValue;

    fn account_grid(anchor: usize, values: &[(usize, &str)]) -> Grid {
        let mut rows = vec![vec![CellValue::Empty; 3]; anchor + 12];
        rows[anchor][0] = CellValue::from("ACCOUNT DETAILS");
        for (d_row, text) in values {
            rows[anchor + d_row][2] = CellValue::from(*text);
        }
        Grid::from_rows("00 ACC DETAILS 01", rows)
    }

    #[test]
    fn test_reads_offsets_relative_to_anchor() {
        let grid = account_grid(
            4,
            &[
                (1, "3170-1"),
                (5, "Dominga"),
                (6, "Reyes"),
                (7, "Mendoza"),
                (9, "Juan"),
                (11, "Santos"),
            ],
        );
        let details = extract_account_details(&grid);
        assert_eq!(details.len(), 1);
        let detail = &details[0];
        assert_eq!(detail.lot_no, "3170-1");
        assert_eq!(detail.lot_owner.first_name, "Dominga");
        assert_eq!(detail.lot_owner.middle_name, "Reyes");
        assert_eq!(detail.lot_owner.last_name, "Mendoza");
        assert_eq!(detail.farmer.first_name, "Juan");
        assert_eq!(detail.farmer.middle_name, "");
        assert_eq!(detail.farmer.last_name, "Santos");
    }

    #[test]
    fn test_blank_lot_number_yields_nothing() {
        let grid = account_grid(0, &[(5, "Dominga")]);
        assert!(extract_account_details(&grid).is_empty());
    }

    #[test]
    fn test_lot_without_names_yields_nothing() {
        let grid = account_grid(0, &[(1, "3170-1")]);
        assert!(extract_account_details(&grid).is_empty());
    }

    #[test]
    fn test_numeric_offsets_are_formatted() {
        let grid = Grid::from_rows(
            "sheet",
            vec![
                vec![CellValue::from("anchor")],
                vec![CellValue::Number(1234.5), CellValue::from("PAID")],
            ],
        );
        let table = [("amount", FieldOffset::amount(1, 0)), ("note", FieldOffset::amount(1, 1))];
        let values = read_fields(&grid, 0, &table);
        assert_eq!(values.get("amount"), "1,234.50");
        assert_eq!(values.get("note"), "PAID");
        assert_eq!(values.get("missing"), "");
    }

    #[test]
    fn test_soa_requires_marker() {
        let soa = Grid::from_rows(
            "01 SOA 01",
            vec![vec![CellValue::Empty; 7]; 13]
                .into_iter()
                .enumerate()
                .map(|(i, mut row)| {
                    if i == 12 {
                        row[6] = CellValue::Number(2.5);
                    }
                    row
                })
                .collect(),
        );
        assert!(extract_soa_details(&soa, None).is_empty());
    }
}
