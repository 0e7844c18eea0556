// Utility helpers for field parsing and number rendering.
//
// Everything that touches the "dirty" text of the export lives here so the
// stages can assume typed values.
use chrono::NaiveDate;
use num_format::{Locale, ToFormattedString};

use crate::error::ParseError;

/// Parse a money-like field such as `"1,234.50"`.
///
/// - Trims whitespace.
/// - Accepts scientific notation (`1.5e3`) but no other letters, so `NaN`
///   and `inf` are rejected.
/// - Strips every `,` before parsing.
pub fn parse_amount(s: &str) -> Result<f64, ParseError> {
    let s = s.trim();
    if s.is_empty() {
        return Err(ParseError::Empty);
    }
    if has_non_exponent_letters(s) {
        return Err(ParseError::Number(s.to_string()));
    }
    let stripped = s.replace(',', "");
    stripped
        .trim()
        .parse::<f64>()
        .map_err(|_| ParseError::Number(s.to_string()))
}

/// Parse `MM/DD/YYYY`. Month and day may be one or two digits; the year must
/// be exactly four.
pub fn parse_us_date(s: &str) -> Result<NaiveDate, ParseError> {
    let s = s.trim();
    if s.is_empty() {
        return Err(ParseError::Empty);
    }
    let bad = || ParseError::Date(s.to_string());
    let parts: Vec<&str> = s.split('/').collect();
    let &[month, day, year] = parts.as_slice() else {
        return Err(bad());
    };
    let all_digits = |p: &str| !p.is_empty() && p.bytes().all(|b| b.is_ascii_digit());
    if !all_digits(month) || month.len() > 2 || !all_digits(day) || day.len() > 2 {
        return Err(bad());
    }
    if !all_digits(year) || year.len() != 4 {
        return Err(bad());
    }
    let (month, day, year) = match (month.parse::<u32>(), day.parse::<u32>(), year.parse::<i32>()) {
        (Ok(m), Ok(d), Ok(y)) => (m, d, y),
        _ => return Err(bad()),
    };
    NaiveDate::from_ymd_opt(year, month, day).ok_or_else(bad)
}

/// True for text the loader may treat as a number.
pub fn looks_numeric(s: &str) -> bool {
    !s.is_empty() && !has_non_exponent_letters(s)
}

fn has_non_exponent_letters(s: &str) -> bool {
    s.chars()
        .any(|c| c.is_ascii_alphabetic() && !matches!(c, 'e' | 'E'))
}

/// Round `n` half-up to `decimals` places and render it without grouping.
///
/// Rounding works on the shortest decimal representation of the float, so
/// `1.005` becomes `1.01` even though its binary value sits just below.
/// Halves round away from zero for negative values.
pub fn round_half_up(n: f64, decimals: usize) -> String {
    if !n.is_finite() {
        return n.to_string();
    }
    let repr = n.abs().to_string();
    let (int_part, frac_part) = match repr.split_once('.') {
        Some((i, f)) => (i, f),
        None => (repr.as_str(), ""),
    };

    let mut digits: Vec<u8> = int_part.bytes().collect();
    if frac_part.len() <= decimals {
        digits.extend(frac_part.bytes());
        digits.extend(std::iter::repeat(b'0').take(decimals - frac_part.len()));
    } else {
        digits.extend(frac_part[..decimals].bytes());
        if frac_part.as_bytes()[decimals] >= b'5' {
            // carry
            let mut i = digits.len();
            loop {
                if i == 0 {
                    digits.insert(0, b'1');
                    break;
                }
                i -= 1;
                if digits[i] == b'9' {
                    digits[i] = b'0';
                } else {
                    digits[i] += 1;
                    break;
                }
            }
        }
    }

    let split = digits.len() - decimals;
    let int_digits = String::from_utf8_lossy(&digits[..split]).into_owned();
    let frac_digits = String::from_utf8_lossy(&digits[split..]).into_owned();
    let is_zero = digits.iter().all(|d| *d == b'0');
    let sign = if n.is_sign_negative() && !is_zero { "-" } else { "" };
    if decimals == 0 {
        format!("{}{}", sign, int_digits)
    } else {
        format!("{}{}.{}", sign, int_digits, frac_digits)
    }
}

/// Format a floating-point value with a fixed number of decimal places
/// (half-up) and locale thousands separators, e.g. `1,234,567.89`.
pub fn format_number(n: f64, decimals: usize) -> String {
    let plain = round_half_up(n, decimals);
    let (sign, unsigned) = match plain.strip_prefix('-') {
        Some(rest) => ("-", rest),
        None => ("", plain.as_str()),
    };
    let (int_part, frac_part) = match unsigned.split_once('.') {
        Some((i, f)) => (i, Some(f)),
        None => (unsigned, None),
    };
    // Use `num-format` to insert commas into the integer portion.
    let grouped = match int_part.parse::<u128>() {
        Ok(v) => v.to_formatted_string(&Locale::en),
        Err(_) => int_part.to_string(),
    };
    match frac_part {
        Some(frac) => format!("{}{}.{}", sign, grouped, frac),
        None => format!("{}{}", sign, grouped),
    }
}

pub fn format_int<T>(n: T) -> String
where
    T: ToFormattedString,
{
    // Counts in log lines, e.g. `9,855 rows loaded`.
    n.to_formatted_string(&Locale::en)
}
