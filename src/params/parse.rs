//! The single ingestion boundary for adjustment values.
//!
//! Clients send numeric fields either as bare JSON numbers or as signed
//! strings ("+15", "-2.5"). Everything downstream of this module operates
//! on strict `f32` values.

use serde::{Deserialize, Deserializer};

/// Parse a loosely-typed adjustment value.
///
/// Accepts a JSON number or a string of the form "N", "+N" or "-N".
/// Returns `None` for anything else, including non-finite numbers.
pub fn parse_signed(value: &serde_json::Value) -> Option<f32> {
    let n = match value {
        serde_json::Value::Number(n) => n.as_f64()?,
        serde_json::Value::String(s) => {
            let s = s.trim();
            let s = s.strip_prefix('+').unwrap_or(s);
            s.parse::<f64>().ok()?
        }
        _ => return None,
    };
    let n = n as f32;
    n.is_finite().then_some(n)
}

/// Serde adapter for adjustment fields.
///
/// Unparsable values resolve to the neutral 0.0 with a warning; a bad
/// field never aborts the whole render request.
pub fn signed<'de, D>(deserializer: D) -> Result<f32, D::Error>
where
    D: Deserializer<'de>,
{
    let value = serde_json::Value::deserialize(deserializer)?;
    Ok(parse_signed(&value).unwrap_or_else(|| {
        tracing::warn!(?value, "unparsable adjustment value, using neutral 0");
        0.0
    }))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn numbers_and_signed_strings_parse_identically() {
        assert_eq!(parse_signed(&serde_json::json!(1.5)), Some(1.5));
        assert_eq!(parse_signed(&serde_json::json!("1.5")), Some(1.5));
        assert_eq!(parse_signed(&serde_json::json!("+1.5")), Some(1.5));
        assert_eq!(parse_signed(&serde_json::json!("-2")), Some(-2.0));
        assert_eq!(parse_signed(&serde_json::json!(-2)), Some(-2.0));
    }

    #[test]
    fn garbage_is_rejected() {
        assert_eq!(parse_signed(&serde_json::json!("teal")), None);
        assert_eq!(parse_signed(&serde_json::json!(null)), None);
        assert_eq!(parse_signed(&serde_json::json!([1])), None);
        assert_eq!(parse_signed(&serde_json::json!({"v": 1})), None);
    }

    #[test]
    fn field_level_garbage_becomes_neutral_in_a_struct() {
        #[derive(serde::Deserialize)]
        struct P {
            #[serde(default, deserialize_with = "super::signed")]
            exposure: f32,
        }
        let p: P = serde_json::from_value(serde_json::json!({ "exposure": "oops" })).unwrap();
        assert_eq!(p.exposure, 0.0);
        let p: P = serde_json::from_value(serde_json::json!({})).unwrap();
        assert_eq!(p.exposure, 0.0);
    }
}
