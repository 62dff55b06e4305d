// Numeric coercion for loosely-typed device JSON
use serde_json::Value;

/// Convert a JSON scalar to a finite number, or return `fallback`.
///
/// Numbers pass through when finite, strings are trimmed and parsed, booleans
/// map to 1/0. Null, arrays, objects and empty strings yield the fallback.
pub fn to_number(value: Option<&Value>, fallback: f64) -> f64 {
    let parsed = match value {
        Some(Value::Number(n)) => n.as_f64(),
        Some(Value::String(s)) => {
            let trimmed = s.trim();
            if trimmed.is_empty() {
                None
            } else {
                trimmed.parse::<f64>().ok()
            }
        }
        Some(Value::Bool(b)) => Some(if *b { 1.0 } else { 0.0 }),
        _ => None,
    };

    match parsed {
        Some(n) if n.is_finite() => n,
        _ => fallback,
    }
}

/// Like [`to_number`] but `None` instead of a fallback.
pub fn to_finite(value: Option<&Value>) -> Option<f64> {
    let n = to_number(value, f64::NAN);
    n.is_finite().then_some(n)
}

/// A value counts as present when it is not null and not an empty string.
pub fn is_present(value: &Value) -> bool {
    match value {
        Value::Null => false,
        Value::String(s) => !s.is_empty(),
        _ => true,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_to_number_coerces_scalars() {
        assert_eq!(to_number(Some(&json!(550)), 0.0), 550.0);
        assert_eq!(to_number(Some(&json!("12.5")), 0.0), 12.5);
        assert_eq!(to_number(Some(&json!(" 42 ")), 0.0), 42.0);
        assert_eq!(to_number(Some(&json!(true)), 0.0), 1.0);
    }

    #[test]
    fn test_to_number_falls_back() {
        assert_eq!(to_number(None, -1.0), -1.0);
        assert_eq!(to_number(Some(&json!(null)), -1.0), -1.0);
        assert_eq!(to_number(Some(&json!("")), -1.0), -1.0);
        assert_eq!(to_number(Some(&json!("abc")), -1.0), -1.0);
        assert_eq!(to_number(Some(&json!({"a": 1})), -1.0), -1.0);
        assert_eq!(to_number(Some(&json!("inf")), -1.0), -1.0);
        assert!(to_finite(Some(&json!([1, 2]))).is_none());
    }

    #[test]
    fn test_is_present() {
        assert!(!is_present(&json!(null)));
        assert!(!is_present(&json!("")));
        assert!(is_present(&json!(0)));
        assert!(is_present(&json!("x")));
    }
}
