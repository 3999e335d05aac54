//! Locale-independent decimal text codec for attribute values.
//!
//! The decimal point is always `.` and no grouping separators are produced or accepted,
//! whatever the host locale says.

use crate::error::{IioError, Result};

/// Parse the longest numeric prefix of `text`.
///
/// Leading whitespace is skipped. Accepted forms are an optionally signed decimal with an
/// optional exponent, or `inf`, `infinity` and `nan` in any case. Trailing characters
/// after the numeral are ignored (`"1.5 V"` reads as `1.5`).
///
/// # Errors
///
/// Returns `InvalidFormat` when no characters form a number.
pub fn read_double(text: &str) -> Result<f64> {
    let trimmed = text.trim_start();
    let len = numeric_prefix_len(trimmed.as_bytes());
    if len == 0 {
        return Err(IioError::invalid_format(text));
    }

    let numeral = &trimmed[..len];
    let (negative, body) = match numeral.as_bytes()[0] {
        b'-' => (true, &numeral[1..]),
        b'+' => (false, &numeral[1..]),
        _ => (false, numeral),
    };

    let magnitude = if body.eq_ignore_ascii_case("inf") || body.eq_ignore_ascii_case("infinity")
    {
        f64::INFINITY
    } else if body.eq_ignore_ascii_case("nan") {
        f64::NAN
    } else {
        body.parse::<f64>()
            .map_err(|_| IioError::invalid_format(text))?
    };

    Ok(if negative { -magnitude } else { magnitude })
}

fn numeric_prefix_len(bytes: &[u8]) -> usize {
    let mut pos = 0;
    if matches!(bytes.first(), Some(b'+' | b'-')) {
        pos += 1;
    }

    let rest = &bytes[pos..];
    for word in ["infinity", "inf", "nan"] {
        if rest.len() >= word.len() && rest[..word.len()].eq_ignore_ascii_case(word.as_bytes()) {
            return pos + word.len();
        }
    }

    let int_digits = count_digits(&bytes[pos..]);
    pos += int_digits;

    let mut frac_digits = 0;
    if bytes.get(pos) == Some(&b'.') {
        frac_digits = count_digits(&bytes[pos + 1..]);
        if int_digits > 0 || frac_digits > 0 {
            pos += 1 + frac_digits;
        }
    }

    if int_digits == 0 && frac_digits == 0 {
        return 0;
    }

    if matches!(bytes.get(pos), Some(b'e' | b'E')) {
        let mut exp = pos + 1;
        if matches!(bytes.get(exp), Some(b'+' | b'-')) {
            exp += 1;
        }
        let exp_digits = count_digits(&bytes[exp..]);
        if exp_digits > 0 {
            pos = exp + exp_digits;
        }
    }

    pos
}

fn count_digits(bytes: &[u8]) -> usize {
    bytes.iter().take_while(|b| b.is_ascii_digit()).count()
}

/// Format `value` with six fractional digits.
///
/// Non-finite values are spelled `nan`, `inf` and `-inf`.
pub fn format_double(value: f64) -> String {
    if value.is_nan() {
        "nan".to_string()
    } else if value.is_infinite() {
        if value.is_sign_negative() { "-inf" } else { "inf" }.to_string()
    } else {
        format!("{:.6}", value)
    }
}

/// Format `value` into `buf` as a NUL-terminated string.
///
/// The text is truncated to `buf.len() - 1` bytes when it does not fit. Nothing is written
/// past `buf.len()`. Returns the number of text bytes written, terminator excluded.
pub fn write_double(value: f64, buf: &mut [u8]) -> usize {
    let Some(room) = buf.len().checked_sub(1) else {
        return 0;
    };
    let text = format_double(value);
    let written = text.len().min(room);
    buf[..written].copy_from_slice(&text.as_bytes()[..written]);
    buf[written] = 0;
    written
}
