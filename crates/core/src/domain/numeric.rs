//! Lenient numeric coercion for model output.
//!
//! The model is asked for JSON numbers but sometimes answers with display
//! strings such as `"1,234.50"` or `"85%"`. Both helpers accept a native
//! number or a string, strip thousands separators and percent signs, and
//! parse the longest numeric prefix. Failure is signalled by a sentinel
//! (`NaN` / `None`) rather than an error so the caller can report every bad
//! field at once.

use serde_json::Value;

/// Coerces `value` to `f64`. Returns `NaN` when nothing numeric can be read.
pub fn to_float(value: &Value) -> f64 {
    match value {
        Value::Number(n) => n.as_f64().unwrap_or(f64::NAN),
        Value::String(s) => parse_float_prefix(&normalize(s)).unwrap_or(f64::NAN),
        _ => f64::NAN,
    }
}

/// Coerces `value` to an integer, truncating any fractional part.
/// Returns `None` when nothing numeric can be read.
pub fn to_int(value: &Value) -> Option<i64> {
    match value {
        Value::Number(n) => {
            if let Some(i) = n.as_i64() {
                return Some(i);
            }
            let f = n.as_f64()?;
            truncate(f)
        }
        Value::String(s) => parse_int_prefix(&normalize(s)),
        _ => None,
    }
}

fn normalize(s: &str) -> String {
    s.chars()
        .filter(|c| *c != ',' && *c != '%')
        .collect::<String>()
        .trim()
        .to_string()
}

fn truncate(f: f64) -> Option<i64> {
    if !f.is_finite() {
        return None;
    }
    let t = f.trunc();
    if t < i64::MIN as f64 || t > i64::MAX as f64 {
        return None;
    }
    Some(t as i64)
}

fn sign_len(bytes: &[u8]) -> usize {
    match bytes.first() {
        Some(b'+') | Some(b'-') => 1,
        _ => 0,
    }
}

fn digits_len(bytes: &[u8]) -> usize {
    bytes.iter().take_while(|b| b.is_ascii_digit()).count()
}

// [sign] digits [. digits] [e [sign] digits], at least one mantissa digit.
fn parse_float_prefix(s: &str) -> Option<f64> {
    let bytes = s.as_bytes();
    let mut end = sign_len(bytes);
    let int_digits = digits_len(&bytes[end..]);
    end += int_digits;

    let mut frac_digits = 0;
    if bytes.get(end) == Some(&b'.') {
        frac_digits = digits_len(&bytes[end + 1..]);
        if int_digits > 0 || frac_digits > 0 {
            end += 1 + frac_digits;
        }
    }
    if int_digits == 0 && frac_digits == 0 {
        return None;
    }

    if matches!(bytes.get(end), Some(b'e') | Some(b'E')) {
        let exp_start = end + 1;
        let exp_sign = sign_len(&bytes[exp_start..]);
        let exp_digits = digits_len(&bytes[exp_start + exp_sign..]);
        if exp_digits > 0 {
            end = exp_start + exp_sign + exp_digits;
        }
    }

    s[..end].parse::<f64>().ok().filter(|f| f.is_finite())
}

// [sign] digits; anything after the digit run is ignored.
fn parse_int_prefix(s: &str) -> Option<i64> {
    let bytes = s.as_bytes();
    let sign = sign_len(bytes);
    let digits = digits_len(&bytes[sign..]);
    if digits == 0 {
        return None;
    }
    s[..sign + digits].parse::<i64>().ok()
}
