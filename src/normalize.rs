//! Normalization of raw cell text.

/// Renders a numeric-looking string with exactly two fraction digits and `,` thousands
/// separators. Input that does not parse as a number is returned unchanged.
///
/// # Examples
/// - `"1234.5"` → `"1,234.50"`
/// - `"1,234,567.891"` → `"1,234,567.89"`
/// - `"PAID"` → `"PAID"`
pub fn format_amount(raw: &str) -> String {
    let trimmed = raw.trim();
    match trimmed.replace(',', "").parse::<f64>() {
        Ok(value) if value.is_finite() => format_decimal(value),
        _ => raw.to_string(),
    }
}

/// Formats a value with two fraction digits and thousands separators.
pub fn format_decimal(value: f64) -> String {
    let fixed = format!("{:.2}", value.abs());
    let (int_part, frac_part) = fixed.split_once('.').unwrap_or((fixed.as_str(), "00"));

    let mut grouped = String::with_capacity(int_part.len() + int_part.len() / 3);
    for (i, ch) in int_part.chars().enumerate() {
        if i > 0 && (int_part.len() - i) % 3 == 0 {
            grouped.push(',');
        }
        grouped.push(ch);
    }

    // "-0.00" reads as noise in a statement.
    let negative = value < 0.0 && fixed.chars().any(|c| c.is_ascii_digit() && c != '0');
    if negative {
        format!("-{}.{}", grouped, frac_part)
    } else {
        format!("{}.{}", grouped, frac_part)
    }
}

/// A lone "N" marks "not applicable" in the master list and the templates.
pub fn empty_if_placeholder(value: &str) -> String {
    let trimmed = value.trim();
    if trimmed == "N" {
        String::new()
    } else {
        trimmed.to_string()
    }
}

/// Parses the leading integer of an identifier cell ("007" → 7, "12 A" → 12).
pub fn leading_integer(value: &str) -> Option<u64> {
    let digits: String = value
        .trim()
        .chars()
        .take_while(|c| c.is_ascii_digit())
        .collect();
    digits.parse().ok()
}

/// Derives the file id from a source filename.
///
/// A leading run of digits followed by whitespace wins (`"007 Dela Cruz.xlsx"` → `"7"`).
/// Otherwise the trailing digit run of the stem is used when it is set off by `_`, `-` or a
/// space (`"division10_12345.xlsx"` → `"12345"`). Anything else yields an empty id.
pub fn file_id(filename: &str) -> String {
    let name = filename.trim();

    let leading: String = name.chars().take_while(|c| c.is_ascii_digit()).collect();
    if !leading.is_empty()
        && name[leading.len()..]
            .chars()
            .next()
            .is_some_and(char::is_whitespace)
    {
        return normalize_id(&leading);
    }

    let stem = match name.rfind('.') {
        Some(dot) if dot > 0 => &name[..dot],
        _ => name,
    };
    let trailing_len = stem.chars().rev().take_while(|c| c.is_ascii_digit()).count();
    if trailing_len == 0 || trailing_len == stem.len() {
        return String::new();
    }

    let (head, digits) = stem.split_at(stem.len() - trailing_len);
    match head.chars().last() {
        Some('_') | Some('-') => normalize_id(digits),
        Some(c) if c.is_whitespace() => normalize_id(digits),
        _ => String::new(),
    }
}

fn normalize_id(digits: &str) -> String {
    leading_integer(digits)
        .map(|n| n.to_string())
        .unwrap_or_default()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_format_amount() {
        assert_eq!(format_amount("1234.5"), "1,234.50");
        assert_eq!(format_amount("1,234,567.891"), "1,234,567.89");
        assert_eq!(format_amount("0"), "0.00");
        assert_eq!(format_amount("999.999"), "1,000.00");
        assert_eq!(format_amount("-4500"), "-4,500.00");
        assert_eq!(format_amount("PAID"), "PAID");
        assert_eq!(format_amount(""), "");
    }

    #[test]
    fn test_format_decimal_sign_of_zero() {
        assert_eq!(format_decimal(-0.001), "0.00");
        assert_eq!(format_decimal(123456.0), "123,456.00");
    }

    #[test]
    fn test_placeholder() {
        assert_eq!(empty_if_placeholder("N"), "");
        assert_eq!(empty_if_placeholder(" N "), "");
        assert_eq!(empty_if_placeholder("North 5"), "North 5");
        assert_eq!(empty_if_placeholder("n"), "n");
    }

    #[test]
    fn test_file_id() {
        assert_eq!(file_id("12 Dela Cruz.xlsx"), "12");
        assert_eq!(file_id("007 Santos.xlsx"), "7");
        assert_eq!(file_id("division10_12345.xlsx"), "12345");
        assert_eq!(file_id("lot-88.xlsx"), "88");
        assert_eq!(file_id("summary.xlsx"), "");
        assert_eq!(file_id("profile2024.xlsx"), "");
        assert_eq!(file_id("12.xlsx"), "");
        assert_eq!(file_id(""), "");
    }
}
