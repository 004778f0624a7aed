use crate::edm::EdmType;
use base64::prelude::*;
use chrono::{DateTime, SecondsFormat, Utc};
use thiserror::Error as ThisError;
use uuid::Uuid;

///
/// Value
///
/// Tagged wire value for one attribute. Each variant corresponds to exactly
/// one [`EdmType`]; conversion from native shapes picks the narrowest
/// matching variant (integers split into `Int32`/`Int64` by magnitude).
///

#[derive(Clone, Debug, PartialEq)]
pub enum Value {
    Binary(Vec<u8>),
    Bool(bool),
    DateTime(DateTime<Utc>),
    Double(f64),
    Guid(Uuid),
    Int32(i32),
    Int64(i64),
    Str(String),
}

impl Value {
    /// Narrowest integer variant for `n`.
    #[must_use]
    pub const fn integer(n: i64) -> Self {
        if n >= i32::MIN as i64 && n <= i32::MAX as i64 {
            Self::Int32(n as i32)
        } else {
            Self::Int64(n)
        }
    }

    #[must_use]
    pub const fn edm_type(&self) -> EdmType {
        EdmType::of(self)
    }

    #[must_use]
    pub fn as_str(&self) -> Option<&str> {
        match self {
            Self::Str(s) => Some(s),
            _ => None,
        }
    }

    /// Integral reading of the value, widening `Int32`.
    #[must_use]
    pub const fn as_i64(&self) -> Option<i64> {
        match self {
            Self::Int32(n) => Some(*n as i64),
            Self::Int64(n) => Some(*n),
            _ => None,
        }
    }

    #[must_use]
    pub const fn as_f64(&self) -> Option<f64> {
        match self {
            Self::Double(n) => Some(*n),
            _ => None,
        }
    }

    #[must_use]
    pub const fn as_bool(&self) -> Option<bool> {
        match self {
            Self::Bool(b) => Some(*b),
            _ => None,
        }
    }

    #[must_use]
    pub const fn as_datetime(&self) -> Option<DateTime<Utc>> {
        match self {
            Self::DateTime(dt) => Some(*dt),
            _ => None,
        }
    }

    #[must_use]
    pub fn as_binary(&self) -> Option<&[u8]> {
        match self {
            Self::Binary(bytes) => Some(bytes),
            _ => None,
        }
    }

    #[must_use]
    pub const fn as_guid(&self) -> Option<Uuid> {
        match self {
            Self::Guid(guid) => Some(*guid),
            _ => None,
        }
    }

    /// Decode a JSON wire value under an optional declared type.
    ///
    /// With no declared type the shape is inferred (bool, integer by
    /// magnitude, float, string); JSON null, arrays, and objects have no
    /// attribute representation and are rejected.
    pub fn from_json(
        json: &serde_json::Value,
        declared: Option<EdmType>,
    ) -> Result<Self, ValueError> {
        match declared {
            Some(edm_type) => Self::from_json_typed(json, edm_type),
            None => Self::from_json_inferred(json),
        }
    }

    fn from_json_inferred(json: &serde_json::Value) -> Result<Self, ValueError> {
        match json {
            serde_json::Value::Bool(b) => Ok(Self::Bool(*b)),
            serde_json::Value::Number(n) => {
                if let Some(i) = n.as_i64() {
                    Ok(Self::integer(i))
                } else if let Some(f) = n.as_f64() {
                    Ok(Self::Double(f))
                } else {
                    Err(ValueError::UnsupportedValueType { kind: "number" })
                }
            }
            serde_json::Value::String(s) => Ok(Self::Str(s.clone())),
            serde_json::Value::Null => Err(ValueError::UnsupportedValueType { kind: "null" }),
            serde_json::Value::Array(_) => Err(ValueError::UnsupportedValueType { kind: "array" }),
            serde_json::Value::Object(_) => {
                Err(ValueError::UnsupportedValueType { kind: "object" })
            }
        }
    }

    fn from_json_typed(json: &serde_json::Value, edm_type: EdmType) -> Result<Self, ValueError> {
        let invalid = |message: String| ValueError::InvalidValue { edm_type, message };

        match edm_type {
            EdmType::String => json
                .as_str()
                .map(|s| Self::Str(s.to_string()))
                .ok_or_else(|| invalid(format!("expected a JSON string, got {json}"))),
            EdmType::Int32 => match json {
                serde_json::Value::Number(n) => n
                    .as_i64()
                    .and_then(|i| i32::try_from(i).ok())
                    .map(Self::Int32)
                    .ok_or_else(|| invalid(format!("out of range: {n}"))),
                serde_json::Value::String(s) => s
                    .parse::<i32>()
                    .map(Self::Int32)
                    .map_err(|e| invalid(e.to_string())),
                other => Err(invalid(format!("expected an int32, got {other}"))),
            },
            EdmType::Int64 => match json {
                serde_json::Value::Number(n) => n
                    .as_i64()
                    .map(Self::Int64)
                    .ok_or_else(|| invalid(format!("out of range: {n}"))),
                serde_json::Value::String(s) => s
                    .parse::<i64>()
                    .map(Self::Int64)
                    .map_err(|e| invalid(e.to_string())),
                other => Err(invalid(format!("expected an int64, got {other}"))),
            },
            EdmType::Double => match json {
                serde_json::Value::Number(n) => n
                    .as_f64()
                    .map(Self::Double)
                    .ok_or_else(|| invalid(format!("not a double: {n}"))),
                serde_json::Value::String(s) => s
                    .parse::<f64>()
                    .map(Self::Double)
                    .map_err(|e| invalid(e.to_string())),
                other => Err(invalid(format!("expected a double, got {other}"))),
            },
            EdmType::Boolean => match json {
                serde_json::Value::Bool(b) => Ok(Self::Bool(*b)),
                serde_json::Value::String(s) => match s.as_str() {
                    "true" => Ok(Self::Bool(true)),
                    "false" => Ok(Self::Bool(false)),
                    other => Err(invalid(format!("expected a boolean, got {other:?}"))),
                },
                other => Err(invalid(format!("expected a boolean, got {other}"))),
            },
            EdmType::DateTime => {
                let s = json
                    .as_str()
                    .ok_or_else(|| invalid(format!("expected an RFC 3339 string, got {json}")))?;
                DateTime::parse_from_rfc3339(s)
                    .map(|dt| Self::DateTime(dt.with_timezone(&Utc)))
                    .map_err(|e| invalid(e.to_string()))
            }
            EdmType::Binary => {
                let s = json
                    .as_str()
                    .ok_or_else(|| invalid(format!("expected a base64 string, got {json}")))?;
                BASE64_STANDARD
                    .decode(s)
                    .map(Self::Binary)
                    .map_err(|e| invalid(e.to_string()))
            }
            EdmType::Guid => {
                let s = json
                    .as_str()
                    .ok_or_else(|| invalid(format!("expected a guid string, got {json}")))?;
                Uuid::parse_str(s)
                    .map(Self::Guid)
                    .map_err(|e| invalid(e.to_string()))
            }
        }
    }

    /// Canonical JSON wire rendering.
    ///
    /// `Int64` serializes as a string per the OData JSON protocol; binary is
    /// base64; datetimes are RFC 3339.
    #[must_use]
    pub fn to_json(&self) -> serde_json::Value {
        match self {
            Self::Str(s) => serde_json::Value::String(s.clone()),
            Self::Int32(n) => serde_json::Value::Number((*n).into()),
            Self::Int64(n) => serde_json::Value::String(n.to_string()),
            Self::Double(f) => serde_json::Number::from_f64(*f)
                .map_or_else(|| serde_json::Value::String(f.to_string()), Into::into),
            Self::Bool(b) => serde_json::Value::Bool(*b),
            Self::DateTime(dt) => {
                serde_json::Value::String(dt.to_rfc3339_opts(SecondsFormat::AutoSi, true))
            }
            Self::Binary(bytes) => serde_json::Value::String(BASE64_STANDARD.encode(bytes)),
            Self::Guid(guid) => serde_json::Value::String(guid.to_string()),
        }
    }

    /// Canonical textual rendering of the wire payload.
    #[must_use]
    pub fn raw_wire(&self) -> String {
        match self {
            Self::Str(s) => s.clone(),
            Self::Int32(n) => n.to_string(),
            Self::Int64(n) => n.to_string(),
            Self::Double(f) => f.to_string(),
            Self::Bool(b) => b.to_string(),
            Self::DateTime(dt) => dt.to_rfc3339_opts(SecondsFormat::AutoSi, true),
            Self::Binary(bytes) => BASE64_STANDARD.encode(bytes),
            Self::Guid(guid) => guid.to_string(),
        }
    }
}

impl From<&str> for Value {
    fn from(s: &str) -> Self {
        Self::Str(s.to_string())
    }
}

impl From<String> for Value {
    fn from(s: String) -> Self {
        Self::Str(s)
    }
}

impl From<i32> for Value {
    fn from(n: i32) -> Self {
        Self::Int32(n)
    }
}

impl From<i64> for Value {
    fn from(n: i64) -> Self {
        Self::integer(n)
    }
}

impl From<u32> for Value {
    fn from(n: u32) -> Self {
        Self::integer(i64::from(n))
    }
}

impl From<f64> for Value {
    fn from(f: f64) -> Self {
        Self::Double(f)
    }
}

impl From<bool> for Value {
    fn from(b: bool) -> Self {
        Self::Bool(b)
    }
}

impl From<DateTime<Utc>> for Value {
    fn from(dt: DateTime<Utc>) -> Self {
        Self::DateTime(dt)
    }
}

impl From<Vec<u8>> for Value {
    fn from(bytes: Vec<u8>) -> Self {
        Self::Binary(bytes)
    }
}

impl From<&[u8]> for Value {
    fn from(bytes: &[u8]) -> Self {
        Self::Binary(bytes.to_vec())
    }
}

impl From<Uuid> for Value {
    fn from(guid: Uuid) -> Self {
        Self::Guid(guid)
    }
}

///
/// ValueError
///

#[derive(Debug, PartialEq, ThisError)]
pub enum ValueError {
    #[error("unsupported value shape: {kind}")]
    UnsupportedValueType { kind: &'static str },

    #[error("invalid {edm_type} value: {message}")]
    InvalidValue { edm_type: EdmType, message: String },
}

///
/// TESTS
///

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn inferred_decode_picks_integer_by_magnitude() {
        assert_eq!(Value::from_json(&json!(5), None).unwrap(), Value::Int32(5));
        assert_eq!(
            Value::from_json(&json!(5_000_000_000i64), None).unwrap(),
            Value::Int64(5_000_000_000)
        );
        assert_eq!(
            Value::from_json(&json!(1.25), None).unwrap(),
            Value::Double(1.25)
        );
    }

    #[test]
    fn inferred_decode_rejects_composite_shapes() {
        for (json, kind) in [
            (json!(null), "null"),
            (json!([1, 2]), "array"),
            (json!({"a": 1}), "object"),
        ] {
            assert_eq!(
                Value::from_json(&json, None).unwrap_err(),
                ValueError::UnsupportedValueType { kind }
            );
        }
    }

    #[test]
    fn typed_decode_follows_declared_type() {
        assert_eq!(
            Value::from_json(&json!("42"), Some(EdmType::Int64)).unwrap(),
            Value::Int64(42)
        );
        assert_eq!(
            Value::from_json(&json!("true"), Some(EdmType::Boolean)).unwrap(),
            Value::Bool(true)
        );
        assert_eq!(
            Value::from_json(&json!("AQID"), Some(EdmType::Binary)).unwrap(),
            Value::Binary(vec![1, 2, 3])
        );
    }

    #[test]
    fn typed_decode_reports_malformed_payloads() {
        let err = Value::from_json(&json!("not-a-date"), Some(EdmType::DateTime)).unwrap_err();
        assert!(matches!(
            err,
            ValueError::InvalidValue {
                edm_type: EdmType::DateTime,
                ..
            }
        ));
    }

    #[test]
    fn datetime_round_trips_through_json() {
        let dt = DateTime::parse_from_rfc3339("2024-03-01T12:30:45Z")
            .unwrap()
            .with_timezone(&Utc);
        let value = Value::DateTime(dt);
        let decoded = Value::from_json(&value.to_json(), Some(EdmType::DateTime)).unwrap();
        assert_eq!(decoded, value);
    }

    #[test]
    fn int64_serializes_as_string() {
        assert_eq!(Value::Int64(7).to_json(), json!("7"));
        assert_eq!(Value::Int32(7).to_json(), json!(7));
    }
}
