//! Resolution of statement-of-account totals.
//!
//! The reading layer only sees cached formula results, which are missing whenever a workbook
//! was saved by a tool that does not recalculate. Each total is therefore resolved through an
//! ordered cascade of sources:
//!
//! 1. **Direct**: the expected result cell (the sub-total row found by label, or its fixed
//!    fallback address).
//! 2. **RowSum**: the sum of the component rows above the sub-total.
//! 3. **Derived**: recomputed from inputs as `principal = Σ(area_i × rate_i)`,
//!    `penalty = Σ(principal_i × pct_i / 100)`, pairing crop rows with rate rows by position.
//!
//! The first tier that yields a non-zero value wins. Tiers are never blended.

use crate::anchor::{find_row_any, SUB_TOTAL_MARKERS};
use crate::grid::Grid;
use crate::layout::*;
use crate::normalize::{format_amount, format_decimal};
use crate::schema::SoaDetail;
use log::debug;
use std::ops::Range;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Tier {
    Direct,
    RowSum,
    Derived,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SoaField {
    Area,
    Principal,
    Penalty,
    Total,
}

/// One candidate source for a total.
pub type Source = fn(&SoaSources<'_>) -> Option<f64>;

/// Grids a statement is resolved from. The account sheet is optional; without it the
/// derived tier has no planted areas to work with.
#[derive(Debug, Clone, Copy)]
pub struct SoaSources<'a> {
    pub soa: &'a Grid,
    pub account: Option<&'a Grid>,
}

/// Rate inputs of one component row of the statement.
#[derive(Debug, Clone, Copy, Default, PartialEq)]
pub struct RateLine {
    pub rate: Option<f64>,
    pub penalty_pct: Option<f64>,
}

#[derive(Debug, Clone, Copy, Default, PartialEq)]
pub struct DerivedCharges {
    pub principal: Option<f64>,
    pub penalty: Option<f64>,
}

impl<'a> SoaSources<'a> {
    pub fn new(soa: &'a Grid, account: Option<&'a Grid>) -> Self {
        Self { soa, account }
    }

    /// Row carrying the "SUB-TOTAL" label, if the statement has one.
    pub fn subtotal_row(&self) -> Option<usize> {
        find_row_any(self.soa, SUB_TOTAL_MARKERS)
    }

    /// Component rows above the sub-total.
    pub fn component_rows(&self) -> Range<usize> {
        let end = self
            .subtotal_row()
            .filter(|row| *row > SOA_COMPONENT_FIRST_ROW)
            .unwrap_or(SOA_SUBTOTAL_FALLBACK_ROW);
        SOA_COMPONENT_FIRST_ROW..end
    }

    pub fn rate_lines(&self) -> Vec<RateLine> {
        rate_lines(self.soa, self.component_rows())
    }

    /// Planted areas of the crop block on the account sheet, in row order.
    pub fn crop_areas(&self) -> Vec<Option<f64>> {
        match self.account {
            Some(account) => (CROP_BLOCK_FIRST_ROW..CROP_BLOCK_FIRST_ROW + CROP_BLOCK_CAPACITY)
                .map(|row| account.number(row, PLANTED_AREA_COL))
                .collect(),
            None => Vec::new(),
        }
    }

    fn subtotal_cell(&self, col: usize) -> Option<f64> {
        self.subtotal_row()
            .and_then(|row| self.soa.number(row, col))
            .or_else(|| self.soa.number(SOA_SUBTOTAL_FALLBACK_ROW, col))
    }

    fn column_sum(&self, col: usize) -> Option<f64> {
        let values: Vec<f64> = self
            .component_rows()
            .filter_map(|row| self.soa.number(row, col))
            .collect();
        if values.is_empty() {
            None
        } else {
            Some(values.iter().sum())
        }
    }

    fn derived(&self) -> DerivedCharges {
        derive_charges(&self.crop_areas(), &self.rate_lines())
    }
}

/// Reads the rate and penalty percentage columns for `rows`.
pub fn rate_lines(soa: &Grid, rows: Range<usize>) -> Vec<RateLine> {
    rows.map(|row| RateLine {
        rate: soa.number(row, SOA_RATE_COL),
        penalty_pct: soa.number(row, SOA_PENALTY_PCT_COL),
    })
    .collect()
}

/// Recomputes principal and penalty from planted areas and rate rows paired by position.
pub fn derive_charges(areas: &[Option<f64>], lines: &[RateLine]) -> DerivedCharges {
    let mut principal = None;
    let mut penalty = None;

    for (area, line) in areas.iter().zip(lines) {
        let (Some(area), Some(rate)) = (area, line.rate) else {
            continue;
        };
        let line_principal = area * rate;
        *principal.get_or_insert(0.0) += line_principal;

        if let Some(pct) = line.penalty_pct {
            *penalty.get_or_insert(0.0) += line_principal * pct / 100.0;
        }
    }

    DerivedCharges { principal, penalty }
}

fn direct_principal(s: &SoaSources<'_>) -> Option<f64> {
    s.subtotal_cell(SOA_PRINCIPAL_COL)
}

fn summed_principal(s: &SoaSources<'_>) -> Option<f64> {
    s.column_sum(SOA_PRINCIPAL_COL)
}

fn derived_principal(s: &SoaSources<'_>) -> Option<f64> {
    s.derived().principal
}

fn direct_penalty(s: &SoaSources<'_>) -> Option<f64> {
    s.subtotal_cell(SOA_PENALTY_COL)
}

fn summed_penalty(s: &SoaSources<'_>) -> Option<f64> {
    s.column_sum(SOA_PENALTY_COL)
}

fn derived_penalty(s: &SoaSources<'_>) -> Option<f64> {
    s.derived().penalty
}

fn direct_area(s: &SoaSources<'_>) -> Option<f64> {
    s.soa.number(SOA_AREA.0, SOA_AREA.1)
}

fn derived_area(s: &SoaSources<'_>) -> Option<f64> {
    let areas: Vec<f64> = s.crop_areas().into_iter().flatten().collect();
    if areas.is_empty() {
        None
    } else {
        Some(areas.iter().sum())
    }
}

fn direct_total(s: &SoaSources<'_>) -> Option<f64> {
    s.soa.number(SOA_TOTAL.0, SOA_TOTAL.1)
}

fn alternate_total(s: &SoaSources<'_>) -> Option<f64> {
    s.soa.number(SOA_TOTAL_ALT.0, SOA_TOTAL_ALT.1)
}

fn derived_total(s: &SoaSources<'_>) -> Option<f64> {
    let parts = [
        resolve(PRINCIPAL_CASCADE, s).map(|(_, v)| v),
        resolve(PENALTY_CASCADE, s).map(|(_, v)| v),
        s.soa.number(SOA_OLD_ACCOUNT.0, SOA_OLD_ACCOUNT.1),
    ];
    if parts.iter().all(Option::is_none) {
        None
    } else {
        Some(parts.iter().flatten().sum())
    }
}

pub const PRINCIPAL_CASCADE: &[(Tier, Source)] = &[
    (Tier::Direct, direct_principal),
    (Tier::RowSum, summed_principal),
    (Tier::Derived, derived_principal),
];

pub const PENALTY_CASCADE: &[(Tier, Source)] = &[
    (Tier::Direct, direct_penalty),
    (Tier::RowSum, summed_penalty),
    (Tier::Derived, derived_penalty),
];

pub const AREA_CASCADE: &[(Tier, Source)] =
    &[(Tier::Direct, direct_area), (Tier::Derived, derived_area)];

pub const TOTAL_CASCADE: &[(Tier, Source)] = &[
    (Tier::Direct, direct_total),
    (Tier::Direct, alternate_total),
    (Tier::Derived, derived_total),
];

/// Evaluates `cascade` in order and returns the first non-zero value with its tier.
pub fn resolve(cascade: &[(Tier, Source)], sources: &SoaSources<'_>) -> Option<(Tier, f64)> {
    cascade.iter().find_map(|(tier, source)| {
        source(sources)
            .filter(|v| v.is_finite() && *v != 0.0)
            .map(|v| (*tier, v))
    })
}

/// A resolved statement plus the tier each total came from.
#[derive(Debug, Clone, PartialEq)]
pub struct ResolvedSoa {
    pub detail: SoaDetail,
    pub trace: Vec<(SoaField, Option<Tier>)>,
}

pub fn resolve_with_trace(sources: &SoaSources<'_>) -> ResolvedSoa {
    let fields = [
        (SoaField::Area, AREA_CASCADE),
        (SoaField::Principal, PRINCIPAL_CASCADE),
        (SoaField::Penalty, PENALTY_CASCADE),
        (SoaField::Total, TOTAL_CASCADE),
    ];

    let mut detail = SoaDetail {
        old_account: format_amount(&sources.soa.text(SOA_OLD_ACCOUNT.0, SOA_OLD_ACCOUNT.1)),
        ..SoaDetail::default()
    };
    let mut trace = Vec::with_capacity(fields.len());

    for (field, cascade) in fields {
        let resolved = resolve(cascade, sources);
        let rendered = resolved.map(|(_, v)| format_decimal(v)).unwrap_or_default();
        match field {
            SoaField::Area => detail.area = rendered,
            SoaField::Principal => detail.principal = rendered,
            SoaField::Penalty => detail.penalty = rendered,
            SoaField::Total => detail.total = rendered,
        }
        debug!(
            "Resolved {:?} from {:?}",
            field,
            resolved.map(|(tier, _)| tier)
        );
        trace.push((field, resolved.map(|(tier, _)| tier)));
    }

    ResolvedSoa { detail, trace }
}

pub fn resolve_soa(sources: &SoaSources<'_>) -> SoaDetail {
    resolve_with_trace(sources).detail
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::grid::CellValue;

    fn soa_grid(cells: &[(usize, usize, CellValue)]) -> Grid {
        let height = cells.iter().map(|(r, _, _)| r + 1).max().unwrap_or(0);
        let mut rows = vec![vec![CellValue::Empty; 8]; height];
        for (r, c, v) in cells {
            rows[*r][*c] = v.clone();
        }
        Grid::from_rows("01 SOA 01", rows)
    }

    fn num(v: f64) -> CellValue {
        CellValue::Number(v)
    }

    fn account_with_areas(areas: &[f64]) -> Grid {
        let mut rows = vec![vec![CellValue::Empty; 4]; CROP_BLOCK_FIRST_ROW + areas.len()];
        for (i, area) in areas.iter().enumerate() {
            rows[CROP_BLOCK_FIRST_ROW + i][PLANTED_AREA_COL] = num(*area);
        }
        Grid::from_rows("00 ACC DETAILS 01", rows)
    }

    #[test]
    fn test_direct_tier_wins_even_when_others_disagree() {
        let soa = soa_grid(&[
            (15, SOA_PRINCIPAL_COL, num(100.0)),
            (16, SOA_PRINCIPAL_COL, num(200.0)),
            (40, 0, CellValue::from("SUB-TOTAL")),
            (40, SOA_PRINCIPAL_COL, num(999.0)),
        ]);
        let sources = SoaSources::new(&soa, None);
        assert_eq!(
            resolve(PRINCIPAL_CASCADE, &sources),
            Some((Tier::Direct, 999.0))
        );
    }

    #[test]
    fn test_label_miss_falls_back_to_fixed_row() {
        let soa = soa_grid(&[(SOA_SUBTOTAL_FALLBACK_ROW, SOA_PENALTY_COL, num(45.5))]);
        let sources = SoaSources::new(&soa, None);
        assert_eq!(resolve(PENALTY_CASCADE, &sources), Some((Tier::Direct, 45.5)));
    }

    #[test]
    fn test_blank_subtotal_uses_row_sum() {
        let soa = soa_grid(&[
            (15, SOA_PRINCIPAL_COL, num(100.0)),
            (16, SOA_PRINCIPAL_COL, CellValue::from("1,200.25")),
            (20, 0, CellValue::from("Sub-Total")),
        ]);
        let sources = SoaSources::new(&soa, None);
        assert_eq!(sources.component_rows(), 15..20);
        assert_eq!(
            resolve(PRINCIPAL_CASCADE, &sources),
            Some((Tier::RowSum, 1300.25))
        );
    }

    #[test]
    fn test_derived_tier_pairs_rows_positionally() {
        let soa = soa_grid(&[
            (15, SOA_RATE_COL, num(1000.0)),
            (15, SOA_PENALTY_PCT_COL, num(10.0)),
            (16, SOA_RATE_COL, num(500.0)),
            (20, 0, CellValue::from("SUB-TOTAL")),
        ]);
        let account = account_with_areas(&[2.0, 1.5, 4.0]);
        let sources = SoaSources::new(&soa, Some(&account));

        assert_eq!(
            resolve(PRINCIPAL_CASCADE, &sources),
            Some((Tier::Derived, 2750.0))
        );
        assert_eq!(
            resolve(PENALTY_CASCADE, &sources),
            Some((Tier::Derived, 200.0))
        );
    }

    #[test]
    fn test_all_tiers_empty_yields_empty_field() {
        let soa = soa_grid(&[(SOA_OLD_ACCOUNT.0, SOA_OLD_ACCOUNT.1, num(150.0))]);
        let resolved = resolve_with_trace(&SoaSources::new(&soa, None));
        assert_eq!(resolved.detail.principal, "");
        assert_eq!(resolved.detail.penalty, "");
        assert_eq!(resolved.detail.area, "");
        assert_eq!(resolved.detail.old_account, "150.00");
        // Only the old account is known, so the derived total equals it.
        assert_eq!(resolved.detail.total, "150.00");
        assert!(resolved
            .trace
            .contains(&(SoaField::Principal, None)));
        assert!(resolved
            .trace
            .contains(&(SoaField::Total, Some(Tier::Derived))));
    }

    #[test]
    fn test_zero_direct_value_falls_through() {
        let soa = soa_grid(&[
            (15, SOA_PENALTY_COL, num(12.0)),
            (SOA_SUBTOTAL_FALLBACK_ROW, SOA_PENALTY_COL, num(0.0)),
        ]);
        let sources = SoaSources::new(&soa, None);
        assert_eq!(resolve(PENALTY_CASCADE, &sources), Some((Tier::RowSum, 12.0)));
    }

    #[test]
    fn test_total_prefers_summary_then_alternate() {
        let soa = soa_grid(&[
            (SOA_TOTAL.0, SOA_TOTAL.1, num(5000.0)),
            (SOA_TOTAL_ALT.0, SOA_TOTAL_ALT.1, num(4000.0)),
        ]);
        assert_eq!(
            resolve(TOTAL_CASCADE, &SoaSources::new(&soa, None)),
            Some((Tier::Direct, 5000.0))
        );

        let soa = soa_grid(&[(SOA_TOTAL_ALT.0, SOA_TOTAL_ALT.1, num(4000.0))]);
        assert_eq!(
            resolve(TOTAL_CASCADE, &SoaSources::new(&soa, None)),
            Some((Tier::Direct, 4000.0))
        );
    }

    #[test]
    fn test_derive_charges_without_rates() {
        let charges = derive_charges(&[Some(2.0)], &[RateLine::default()]);
        assert_eq!(charges, DerivedCharges::default());
    }
}
