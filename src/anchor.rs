use crate::grid::{CellValue, Grid};

pub const ACCOUNT_DETAILS_MARKER: &str = "ACCOUNT DETAILS";
pub const STATEMENT_OF_ACCOUNT_MARKER: &str = "STATEMENT OF ACCOUNT";
pub const SUB_TOTAL_MARKERS: &[&str] = &["SUB-TOTAL", "SUB TOTAL", "SUBTOTAL"];

/// Returns the first row (top to bottom) holding a text cell that contains `marker`,
/// compared case-insensitively. `None` means the block is not in this grid.
pub fn find_row(grid: &Grid, marker: &str) -> Option<usize> {
    find_row_any(grid, &[marker])
}

/// Like [`find_row`], matching any of several spellings of the same label.
pub fn find_row_any(grid: &Grid, markers: &[&str]) -> Option<usize> {
    let markers: Vec<String> = markers.iter().map(|m| m.to_uppercase()).collect();

    grid.cells().find_map(|(row, _, value)| match value {
        CellValue::Text(text) => {
            let upper = text.to_uppercase();
            markers
                .iter()
                .any(|m| upper.contains(m.as_str()))
                .then_some(row)
        }
        _ => None,
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    fn grid_with(cells: &[(usize, usize, &str)]) -> Grid {
        let height = cells.iter().map(|(r, _, _)| r + 1).max().unwrap_or(0);
        let width = cells.iter().map(|(_, c, _)| c + 1).max().unwrap_or(0);
        let mut rows = vec![vec![CellValue::Empty; width]; height];
        for (r, c, text) in cells {
            rows[*r][*c] = CellValue::from(*text);
        }
        Grid::from_rows("sheet", rows)
    }

    #[test]
    fn test_first_match_wins() {
        let grid = grid_with(&[
            (3, 4, "account details"),
            (7, 0, "ACCOUNT DETAILS (copy)"),
        ]);
        assert_eq!(find_row(&grid, ACCOUNT_DETAILS_MARKER), Some(3));
    }

    #[test]
    fn test_row_major_order() {
        // A later column in an earlier row beats an earlier column in a later row.
        let grid = grid_with(&[(2, 9, "Statement of Account"), (5, 0, "STATEMENT OF ACCOUNT")]);
        assert_eq!(find_row(&grid, STATEMENT_OF_ACCOUNT_MARKER), Some(2));
    }

    #[test]
    fn test_missing_marker_is_none() {
        let grid = grid_with(&[(0, 0, "Farmer Profile")]);
        assert_eq!(find_row(&grid, ACCOUNT_DETAILS_MARKER), None);
        assert_eq!(find_row(&Grid::new("empty"), ACCOUNT_DETAILS_MARKER), None);
    }

    #[test]
    fn test_numbers_never_match() {
        let mut rows = vec![vec![CellValue::Number(2024.0)]];
        rows.push(vec![CellValue::from("Sub-Total")]);
        let grid = Grid::from_rows("soa", rows);
        assert_eq!(find_row(&grid, "2024"), None);
        assert_eq!(find_row_any(&grid, SUB_TOTAL_MARKERS), Some(1));
    }
}
