use crate::value::Value;
use serde::{Deserialize, Serialize};
use thiserror::Error as ThisError;

///
/// EdmType
///
/// Closed set of wire-level attribute types understood by the table service.
/// Every persisted attribute carries exactly one of these tags, either
/// declared by the caller or inferred from the value shape.
///

#[derive(Clone, Copy, Debug, Eq, Hash, Ord, PartialEq, PartialOrd, Serialize, Deserialize)]
pub enum EdmType {
    #[serde(rename = "Edm.Binary")]
    Binary,

    #[serde(rename = "Edm.Boolean")]
    Boolean,

    #[serde(rename = "Edm.DateTime")]
    DateTime,

    #[serde(rename = "Edm.Double")]
    Double,

    #[serde(rename = "Edm.Guid")]
    Guid,

    #[serde(rename = "Edm.Int32")]
    Int32,

    #[serde(rename = "Edm.Int64")]
    Int64,

    #[serde(rename = "Edm.String")]
    String,
}

impl EdmType {
    pub const ALL: [Self; 8] = [
        Self::Binary,
        Self::Boolean,
        Self::DateTime,
        Self::Double,
        Self::Guid,
        Self::Int32,
        Self::Int64,
        Self::String,
    ];

    /// Canonical wire name, e.g. `"Edm.Int32"`.
    #[must_use]
    pub const fn wire_name(self) -> &'static str {
        match self {
            Self::Binary => "Edm.Binary",
            Self::Boolean => "Edm.Boolean",
            Self::DateTime => "Edm.DateTime",
            Self::Double => "Edm.Double",
            Self::Guid => "Edm.Guid",
            Self::Int32 => "Edm.Int32",
            Self::Int64 => "Edm.Int64",
            Self::String => "Edm.String",
        }
    }

    /// Short (enum-case) name, e.g. `"INT32"`.
    #[must_use]
    pub const fn short_name(self) -> &'static str {
        match self {
            Self::Binary => "BINARY",
            Self::Boolean => "BOOLEAN",
            Self::DateTime => "DATETIME",
            Self::Double => "DOUBLE",
            Self::Guid => "GUID",
            Self::Int32 => "INT32",
            Self::Int64 => "INT64",
            Self::String => "STRING",
        }
    }

    #[must_use]
    pub fn from_wire_name(name: &str) -> Option<Self> {
        Self::ALL.into_iter().find(|t| t.wire_name() == name)
    }

    #[must_use]
    pub fn from_short_name(name: &str) -> Option<Self> {
        Self::ALL.into_iter().find(|t| t.short_name() == name)
    }

    /// Coerce an optional type-name string into a type tag.
    ///
    /// Accepts either the wire name or the short name. Empty or absent input
    /// coerces to `None`; anything unrecognized is an error.
    pub fn coerce(name: Option<&str>) -> Result<Option<Self>, EdmError> {
        let Some(name) = name else {
            return Ok(None);
        };
        if name.is_empty() {
            return Ok(None);
        }

        Self::from_wire_name(name)
            .or_else(|| Self::from_short_name(name))
            .map(Some)
            .ok_or_else(|| EdmError::UnknownEdmType {
                name: name.to_string(),
            })
    }

    /// Infer the narrowest wire type for a typed value.
    ///
    /// Deterministic and total over [`Value`]; integers are already split
    /// into `Int32`/`Int64` by magnitude at `Value` construction.
    #[must_use]
    pub const fn of(value: &Value) -> Self {
        match value {
            Value::Binary(_) => Self::Binary,
            Value::Bool(_) => Self::Boolean,
            Value::DateTime(_) => Self::DateTime,
            Value::Double(_) => Self::Double,
            Value::Guid(_) => Self::Guid,
            Value::Int32(_) => Self::Int32,
            Value::Int64(_) => Self::Int64,
            Value::Str(_) => Self::String,
        }
    }

    /// Whether the JSON wire protocol requires an explicit `@odata.type`
    /// annotation for this type (it is inferred for the rest).
    #[must_use]
    pub const fn requires_annotation(self) -> bool {
        matches!(
            self,
            Self::Binary | Self::DateTime | Self::Guid | Self::Int64
        )
    }
}

impl std::fmt::Display for EdmType {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.wire_name())
    }
}

///
/// EdmError
///

#[derive(Debug, Eq, PartialEq, ThisError)]
pub enum EdmError {
    #[error("unknown edm type: {name:?}")]
    UnknownEdmType { name: String },
}

///
/// TESTS
///

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Utc;

    #[test]
    fn wire_names_round_trip() {
        for edm_type in EdmType::ALL {
            assert_eq!(
                EdmType::from_wire_name(edm_type.wire_name()),
                Some(edm_type)
            );
            assert_eq!(
                EdmType::from_short_name(edm_type.short_name()),
                Some(edm_type)
            );
        }
    }

    #[test]
    fn coerce_accepts_wire_and_short_names() {
        assert_eq!(
            EdmType::coerce(Some("Edm.Int32")).unwrap(),
            Some(EdmType::Int32)
        );
        assert_eq!(
            EdmType::coerce(Some("INT32")).unwrap(),
            Some(EdmType::Int32)
        );
    }

    #[test]
    fn coerce_maps_empty_input_to_none() {
        assert_eq!(EdmType::coerce(None).unwrap(), None);
        assert_eq!(EdmType::coerce(Some("")).unwrap(), None);
    }

    #[test]
    fn coerce_rejects_unknown_names() {
        let err = EdmType::coerce(Some("Edm.Decimal")).unwrap_err();
        assert_eq!(
            err,
            EdmError::UnknownEdmType {
                name: "Edm.Decimal".to_string()
            }
        );
    }

    #[test]
    fn inference_is_deterministic_and_idempotent() {
        let values = [
            Value::from("text"),
            Value::from(5i32),
            Value::from(i64::MAX),
            Value::from(1.5f64),
            Value::from(true),
            Value::from(Utc::now()),
            Value::from(vec![1u8, 2, 3]),
        ];

        for value in values {
            let first = EdmType::of(&value);
            let second = EdmType::of(&value);
            assert_eq!(first, second);
        }
    }

    #[test]
    fn integers_split_by_magnitude() {
        assert_eq!(EdmType::of(&Value::integer(5)), EdmType::Int32);
        assert_eq!(
            EdmType::of(&Value::integer(i64::from(i32::MAX))),
            EdmType::Int32
        );
        assert_eq!(
            EdmType::of(&Value::integer(i64::from(i32::MAX) + 1)),
            EdmType::Int64
        );
        assert_eq!(
            EdmType::of(&Value::integer(i64::from(i32::MIN) - 1)),
            EdmType::Int64
        );
    }
}
