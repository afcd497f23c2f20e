//! Master list parsing and grouping by lot code.
//!
//! Column map (zero-based): C(2)=Lot, D(3)=CropSeason, E(4)=CropYear, H(7)=PlantedArea,
//! M(12)=LandOwnerLast, N(13)=LandOwnerFirst, O(14)=FarmerLast, P(15)=FarmerFirst,
//! Q(16)=OldAccount. The first populated row is the header, wherever the sheet starts.

use crate::grid::Grid;
use crate::layout::*;
use crate::normalize::empty_if_placeholder;
use crate::schema::{LotGroup, MastersListRow};
use log::debug;
use std::collections::HashMap;

pub fn parse_masters_list(grid: &Grid) -> Vec<MastersListRow> {
    let mut rows = Vec::new();
    let Some((header, _, _)) = grid.cells().next() else {
        return rows;
    };

    for row in header + 1..grid.height() {
        let lot_code = grid.text(row, ML_LOT);
        if lot_code.is_empty() {
            continue;
        }

        let field = |col: usize| empty_if_placeholder(&grid.text(row, col));
        rows.push(MastersListRow {
            lot_code,
            crop_season: field(ML_CROP_SEASON),
            crop_year: field(ML_CROP_YEAR),
            planted_area: field(ML_PLANTED_AREA),
            land_owner_first: field(ML_LAND_OWNER_FIRST),
            land_owner_last: field(ML_LAND_OWNER_LAST),
            farmer_first: field(ML_FARMER_FIRST),
            farmer_last: field(ML_FARMER_LAST),
            old_account: field(ML_OLD_ACCOUNT),
        });
    }

    debug!("Parsed {} master list rows from '{}'", rows.len(), grid.name());
    rows
}

/// Groups rows by lot code. The first row seen for a code fixes the group's position and
/// owner name; later rows are appended in source order.
pub fn group(rows: Vec<MastersListRow>) -> Vec<LotGroup> {
    let mut groups: Vec<LotGroup> = Vec::new();
    let mut index_by_lot: HashMap<String, usize> = HashMap::new();

    for row in rows {
        if row.lot_code.is_empty() {
            continue;
        }

        let idx = *index_by_lot
            .entry(row.lot_code.clone())
            .or_insert_with(|| {
                groups.push(LotGroup {
                    lot_code: row.lot_code.clone(),
                    land_owner_first: row.land_owner_first.clone(),
                    land_owner_last: row.land_owner_last.clone(),
                    rows: Vec::new(),
                });
                groups.len() - 1
            });

        groups[idx].rows.push(row);
    }

    groups
}
