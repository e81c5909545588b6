//! Loose coercions over attribute values.

use serde_json::Value;

/// String form used for display, substring and membership tests.
///
/// `null` renders as the empty string; strings are not quoted.
pub fn as_text(value: &Value) -> String {
    match value {
        Value::Null => String::new(),
        Value::String(s) => s.clone(),
        Value::Bool(b) => b.to_string(),
        Value::Number(n) => number_text(n),
        other => other.to_string(),
    }
}

/// Numeric conversion for comparison operators.
///
/// Numbers pass through, booleans map to 1/0, strings are trimmed and parsed
/// (empty string is 0). Anything else is not a number.
pub fn as_number(value: &Value) -> Option<f64> {
    let n = match value {
        Value::Number(n) => n.as_f64()?,
        Value::Bool(b) => f64::from(u8::from(*b)),
        Value::String(s) => {
            let t = s.trim();
            if t.is_empty() { 0.0 } else { t.parse::<f64>().ok()? }
        }
        _ => return None,
    };
    n.is_finite().then_some(n)
}

/// Equality that treats `"3"` and `3` alike and otherwise compares text.
pub fn loose_eq(a: &Value, b: &Value) -> bool {
    match (a, b) {
        (Value::String(_), Value::String(_)) => a == b,
        _ => match (as_number(a), as_number(b)) {
            (Some(x), Some(y)) => x == y,
            _ => as_text(a) == as_text(b),
        },
    }
}

fn number_text(n: &serde_json::Number) -> String {
    if let Some(i) = n.as_i64() {
        return i.to_string();
    }
    match n.as_f64() {
        Some(f) if f.fract() == 0.0 && f.abs() < 1e15 => format!("{}", f as i64),
        Some(f) => f.to_string(),
        None => n.to_string(),
    }
}

#[cfg(test)]
mod tests {
    use serde_json::json;

    use super::*;

    #[test]
    fn numeric_strings_coerce() {
        assert_eq!(as_number(&json!(" 42 ")), Some(42.0));
        assert_eq!(as_number(&json!("")), Some(0.0));
        assert_eq!(as_number(&json!(true)), Some(1.0));
        assert_eq!(as_number(&json!("abc")), None);
        assert_eq!(as_number(&json!(null)), None);
    }

    #[test]
    fn text_form_is_unquoted() {
        assert_eq!(as_text(&json!("x")), "x");
        assert_eq!(as_text(&json!(3)), "3");
        assert_eq!(as_text(&json!(3.0)), "3");
        assert_eq!(as_text(&json!(2.5)), "2.5");
        assert_eq!(as_text(&json!(null)), "");
    }

    #[test]
    fn loose_equality() {
        assert!(loose_eq(&json!("3"), &json!(3)));
        assert!(loose_eq(&json!("abc"), &json!("abc")));
        assert!(!loose_eq(&json!("3.0"), &json!("3")));
        assert!(!loose_eq(&json!("a"), &json!(1)));
    }
}
