//! A1-style cell and range addressing.

use std::fmt;

/// 1-based worksheet coordinate.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct CellCoord {
    pub row: u32,
    pub col: u32,
}

impl CellCoord {
    pub fn new(row: u32, col: u32) -> Self {
        Self { row, col }
    }
}

impl fmt::Display for CellCoord {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&format_a1(*self))
    }
}

/// Parse `B3` / `$B$3` / `b3` into a coordinate.
pub fn parse_a1(address: &str) -> Option<CellCoord> {
    let cleaned: String = address.trim().chars().filter(|ch| *ch != '$').collect();
    let split = cleaned
        .find(|ch: char| !ch.is_ascii_alphabetic())
        .unwrap_or(cleaned.len());
    let (letters, digits) = cleaned.split_at(split);
    if digits.is_empty() || !digits.bytes().all(|b| b.is_ascii_digit()) {
        return None;
    }

    let col = column_index(letters)?;
    let row: u32 = digits.parse().ok()?;
    if row == 0 {
        return None;
    }
    Some(CellCoord::new(row, col))
}

pub fn column_letters(mut col: u32) -> String {
    let mut letters = Vec::new();
    while col > 0 {
        let rem = (col - 1) % 26;
        letters.push((b'A' + rem as u8) as char);
        col = (col - 1) / 26;
    }
    letters.reverse();
    letters.into_iter().collect()
}

/// Column letters to a 1-based index (`A` -> 1, `AA` -> 27).
fn column_index(letters: &str) -> Option<u32> {
    let mut col: u32 = 0;
    for ch in letters.chars() {
        if !ch.is_ascii_alphabetic() {
            return None;
        }
        col = col
            .checked_mul(26)?
            .checked_add(ch.to_ascii_uppercase() as u32 - 'A' as u32 + 1)?;
    }
    (col > 0).then_some(col)
}

pub fn format_a1(coord: CellCoord) -> String {
    format!("{}{}", column_letters(coord.col), coord.row)
}

/// `(row, col)` of an address; malformed input maps to `(1, 1)`.
pub fn cell_to_coord(cell: &str) -> (u32, u32) {
    match parse_a1(cell) {
        Some(coord) => (coord.row, coord.col),
        None => (1, 1),
    }
}

pub fn coord_to_cell(row: u32, col: u32) -> String {
    format_a1(CellCoord::new(row, col))
}

/// Upper-cased column letters of a cell address, or `B` when there are none.
pub fn extract_column(cell: &str) -> String {
    let letters: String = cell
        .trim()
        .chars()
        .filter(|ch| *ch != '$')
        .take_while(|ch| ch.is_ascii_alphabetic())
        .map(|ch| ch.to_ascii_uppercase())
        .collect();
    if letters.is_empty() {
        "B".to_string()
    } else {
        letters
    }
}

/// Split `A1:B2` into its corners with `$` anchors removed. A single cell is returned twice.
pub fn split_range(range: &str) -> (String, String) {
    let cleaned = range.replace('$', "");
    match cleaned.split_once(':') {
        Some((start, end)) => (start.trim().to_string(), end.trim().to_string()),
        None => {
            let cell = cleaned.trim().to_string();
            (cell.clone(), cell)
        }
    }
}

/// Parse a range into normalized top-left / bottom-right corners.
pub fn parse_range(range: &str) -> Option<(CellCoord, CellCoord)> {
    let (start, end) = split_range(range);
    let start = parse_a1(&start)?;
    let end = parse_a1(&end)?;

    let top = start.row.min(end.row);
    let left = start.col.min(end.col);
    let bottom = start.row.max(end.row);
    let right = start.col.max(end.col);
    Some((CellCoord::new(top, left), CellCoord::new(bottom, right)))
}

/// Every cell of the rectangle between two corners, row-major.
pub fn cells_in_range(start: &str, end: &str) -> Vec<String> {
    let (start_row, start_col) = cell_to_coord(start);
    let (end_row, end_col) = cell_to_coord(end);
    let mut cells = Vec::new();
    for row in start_row.min(end_row)..=start_row.max(end_row) {
        for col in start_col.min(end_col)..=start_col.max(end_col) {
            cells.push(coord_to_cell(row, col));
        }
    }
    cells
}

/// The cell after the top-left corner in row-major order: the next column on the first row,
/// else the next row of a single-column range.
pub fn first_non_top_left_cell(start: &str, end: &str) -> Option<String> {
    let (start_row, start_col) = cell_to_coord(start);
    let (end_row, end_col) = cell_to_coord(end);
    let (top, left) = (start_row.min(end_row), start_col.min(end_col));
    if start_col.max(end_col) > left {
        Some(coord_to_cell(top, left + 1))
    } else if start_row.max(end_row) > top {
        Some(coord_to_cell(top + 1, left))
    } else {
        None
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    #[test]
    fn cell_to_coord_handles_multi_letter_columns() {
        assert_eq!(cell_to_coord("A1"), (1, 1));
        assert_eq!(cell_to_coord("B3"), (3, 2));
        assert_eq!(cell_to_coord("AA1"), (1, 27));
        assert_eq!(cell_to_coord("$C$4"), (4, 3));
    }

    #[test]
    fn cell_to_coord_invalid_returns_origin() {
        assert_eq!(cell_to_coord("123"), (1, 1));
        assert_eq!(cell_to_coord(""), (1, 1));
        assert_eq!(cell_to_coord("A0"), (1, 1));
    }

    #[test]
    fn coord_to_cell_inverts_cell_to_coord() {
        for cell in ["A1", "B3", "Z9", "AA1", "AZ100", "XFD1048576"] {
            let (row, col) = cell_to_coord(cell);
            assert_eq!(coord_to_cell(row, col), cell);
        }
    }

    #[test]
    fn extract_column_uppercases_and_defaults() {
        assert_eq!(extract_column("AB123"), "AB");
        assert_eq!(extract_column("c3"), "C");
        assert_eq!(extract_column("123"), "B");
    }

    #[test]
    fn split_range_strips_anchors() {
        assert_eq!(
            split_range("$A$1:$B$2"),
            ("A1".to_string(), "B2".to_string())
        );
        assert_eq!(split_range("$C$3"), ("C3".to_string(), "C3".to_string()));
    }

    #[test]
    fn cells_in_range_is_row_major() {
        assert_eq!(cells_in_range("A1", "A1"), vec!["A1"]);
        assert_eq!(cells_in_range("A1", "C1"), vec!["A1", "B1", "C1"]);
        assert_eq!(cells_in_range("A1", "B2"), vec!["A1", "B1", "A2", "B2"]);
    }

    #[test]
    fn first_non_top_left_cell_of_single_cell_is_none() {
        assert_eq!(first_non_top_left_cell("A1", "B2").as_deref(), Some("B1"));
        assert_eq!(first_non_top_left_cell("A1", "A1"), None);
        assert_eq!(first_non_top_left_cell("C3", "C9").as_deref(), Some("C4"));
        assert_eq!(first_non_top_left_cell("B2", "A1").as_deref(), Some("B1"));
    }

    #[test]
    fn first_non_top_left_cell_of_a_whole_sheet_range() {
        assert_eq!(
            first_non_top_left_cell("A1", "XFD1048576").as_deref(),
            Some("B1")
        );
        assert_eq!(
            first_non_top_left_cell("A1", "A1048576").as_deref(),
            Some("A2")
        );
    }

    #[test]
    fn parse_range_normalizes_corners() {
        let (tl, br) = parse_range("C3:A1").unwrap();
        assert_eq!(tl, CellCoord::new(1, 1));
        assert_eq!(br, CellCoord::new(3, 3));
        assert_eq!(parse_a1("AA1"), Some(CellCoord::new(1, 27)));
        assert_eq!(parse_a1("A1B"), None);
        assert_eq!(column_index("AA"), Some(27));
        assert_eq!(column_index("1"), None);
    }
}
