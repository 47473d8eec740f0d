use crate::cell::CellValue;
use crate::error::CellError;

pub const DEFAULT_PRECISION: usize = 2;

/// Normalise a numeric-like cell to exactly `precision` fractional digits.
///
/// Null and empty text pass through untouched so absent data never shows up
/// as `0.00`. Anything else must parse as a finite number, otherwise the
/// result is [`CellError::ParseFailure`]. Rounding is half away from zero on
/// the shortest decimal form of the number, see [`round_half_away`].
pub fn format_decimal(value: &CellValue, precision: usize) -> Result<CellValue, CellError> {
    match value {
        CellValue::Null => Ok(CellValue::Null),
        CellValue::Text(text) if text.is_empty() => Ok(value.clone()),
        CellValue::Text(text) => {
            let number = parse_number(text)?;
            Ok(CellValue::Text(round_half_away(number, precision)))
        }
        CellValue::Number(number) if number.is_finite() => {
            Ok(CellValue::Text(round_half_away(*number, precision)))
        }
        CellValue::Number(number) => Err(CellError::ParseFailure(number.to_string())),
    }
}

pub fn parse_number(raw: &str) -> Result<f64, CellError> {
    let trimmed = raw.trim();
    match trimmed.parse::<f64>() {
        Ok(value) if value.is_finite() => Ok(value),
        _ => Err(CellError::ParseFailure(raw.to_string())),
    }
}

/// Format `value` with `precision` fractional digits, rounding half away
/// from zero.
///
/// The rounding works on the shortest round-trip decimal representation, so
/// `2.675` rounds to `2.68` even though the nearest `f64` is slightly below
/// it. A result of zero never carries a minus sign.
pub fn round_half_away(value: f64, precision: usize) -> String {
    let repr = value.abs().to_string();
    let (int_part, frac_part) = repr.split_once('.').unwrap_or((repr.as_str(), ""));

    let mut digits: Vec<u8> = int_part
        .bytes()
        .chain(frac_part.bytes().chain(std::iter::repeat(b'0')).take(precision))
        .map(|byte| byte - b'0')
        .collect();

    let round_up = frac_part
        .as_bytes()
        .get(precision)
        .is_some_and(|&next| next >= b'5');
    if round_up && carry_one(&mut digits) {
        digits.insert(0, 1);
    }

    let split = digits.len() - precision;
    let is_zero = digits.iter().all(|&digit| digit == 0);

    let mut out = String::with_capacity(digits.len() + 2);
    if value.is_sign_negative() && !is_zero {
        out.push('-');
    }
    out.extend(digits[..split].iter().map(|&digit| char::from(b'0' + digit)));
    if precision > 0 {
        out.push('.');
        out.extend(digits[split..].iter().map(|&digit| char::from(b'0' + digit)));
    }
    out
}

/// Add one unit in the last place. Returns `true` when the carry overflows.
fn carry_one(digits: &mut [u8]) -> bool {
    for digit in digits.iter_mut().rev() {
        if *digit == 9 {
            *digit = 0;
        } else {
            *digit += 1;
            return false;
        }
    }
    true
}
