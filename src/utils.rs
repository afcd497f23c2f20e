/// Converts column letters ("A", "AA") to a zero-based column index.
pub fn column_index(letters: &str) -> Option<usize> {
    if letters.is_empty() {
        return None;
    }

    let mut index: usize = 0;
    for ch in letters.chars() {
        if !ch.is_ascii_alphabetic() {
            return None;
        }
        let digit = (ch.to_ascii_uppercase() as u8 - b'A') as usize + 1;
        index = index.checked_mul(26)?.checked_add(digit)?;
    }

    Some(index - 1)
}

/// Converts a zero-based column index to spreadsheet column letters.
pub fn column_letters(col: usize) -> String {
    let mut letters = Vec::new();
    let mut n = col + 1;
    while n > 0 {
        let rem = (n - 1) % 26;
        letters.push(b'A' + rem as u8);
        n = (n - 1) / 26;
    }
    letters.reverse();
    String::from_utf8(letters).unwrap_or_default()
}

/// Parses an A1-style address ("D100", "$g$13") into zero-based (row, col).
pub fn parse_address(address: &str) -> Option<(usize, usize)> {
    let cleaned: String = address.trim().chars().filter(|c| *c != '$').collect();
    let split = cleaned.find(|c: char| c.is_ascii_digit())?;
    let (letters, digits) = cleaned.split_at(split);

    let col = column_index(letters)?;
    let row: usize = digits.parse().ok()?;
    if row == 0 {
        return None;
    }

    Some((row - 1, col))
}

/// Formats zero-based (row, col) as an A1-style address.
pub fn cell_address(row: usize, col: usize) -> String {
    format!("{}{}", column_letters(col), row + 1)
}

/// Prefixes an A1 range with a tab name, quoting the tab when it contains
/// whitespace or quote characters.
///
/// # Examples
/// - `range_with_sheet(None, "A:A")` → `A:A`
/// - `range_with_sheet(Some("Lots 2024"), "A:A")` → `'Lots 2024'!A:A`
pub fn range_with_sheet(tab_name: Option<&str>, range: &str) -> String {
    let tab = match tab_name.map(str::trim) {
        Some(tab) if !tab.is_empty() => tab,
        _ => return range.to_string(),
    };

    let needs_quotes = tab
        .chars()
        .any(|c| c.is_whitespace() || c == '\'' || c == '"');
    if needs_quotes {
        format!("'{}'!{}", tab.replace('\'', "''"), range)
    } else {
        format!("{}!{}", tab, range)
    }
}

/// Pulls the spreadsheet id out of a share URL
/// (`https://docs.google.com/spreadsheets/d/{id}/edit#gid=0`).
pub fn spreadsheet_id_from_url(url: &str) -> Option<String> {
    let marker = "/spreadsheets/d/";
    let start = url.find(marker)? + marker.len();
    let id: String = url[start..]
        .chars()
        .take_while(|c| c.is_ascii_alphanumeric() || *c == '-' || *c == '_')
        .collect();

    if id.is_empty() {
        None
    } else {
        Some(id)
    }
}

/// Replaces characters that cannot appear in a file name component.
pub fn sanitize_file_component(value: &str) -> String {
    value
        .trim()
        .chars()
        .map(|c| match c {
            '/' | '\\' | ':' | '*' | '?' | '"' | '<' | '>' | '|' => '-',
            c if c.is_control() => '-',
            c => c,
        })
        .collect()
}
