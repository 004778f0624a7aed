use crate::entity::Entity;
use base64::prelude::*;
use thiserror::Error as ThisError;

/// Defensive decode bound for untrusted cursor token input.
const MAX_CURSOR_TOKEN_LEN: usize = 8 * 1024;

///
/// Location
///
/// Replica the next page must be read from.
///

#[derive(Clone, Copy, Debug, Default, Eq, PartialEq)]
pub enum Location {
    #[default]
    Unspecified,
    PrimaryOnly,
    SecondaryOnly,
}

impl Location {
    #[must_use]
    pub const fn as_wire_str(self) -> &'static str {
        match self {
            Self::Unspecified => "",
            Self::PrimaryOnly => "PrimaryOnly",
            Self::SecondaryOnly => "SecondaryOnly",
        }
    }

    pub fn from_wire_str(s: &str) -> Result<Self, CursorError> {
        match s {
            "" => Ok(Self::Unspecified),
            "PrimaryOnly" => Ok(Self::PrimaryOnly),
            "SecondaryOnly" => Ok(Self::SecondaryOnly),
            other => Err(CursorError::UnknownLocation {
                location: other.to_string(),
            }),
        }
    }
}

///
/// Cursor
///
/// Opaque continuation token marking where a paged query resumes. The
/// all-empty cursor is the sentinel for both "start from the beginning" and
/// "no more pages".
///
/// Wire format: `base64(table "/" b64(pk) "/" b64(rk) "/" location)`. The
/// key components are base64-wrapped (url-safe alphabet, so the join
/// separator cannot appear inside them) before the outer encoding, which
/// keeps `/` inside key values round-trippable.
///

#[derive(Clone, Debug, Default, Eq, PartialEq)]
pub struct Cursor {
    next_table_name: String,
    next_partition_key: String,
    next_row_key: String,
    location: Location,
}

impl Cursor {
    #[must_use]
    pub fn new(
        next_table_name: impl Into<String>,
        next_partition_key: impl Into<String>,
        next_row_key: impl Into<String>,
        location: Location,
    ) -> Self {
        Self {
            next_table_name: next_table_name.into(),
            next_partition_key: next_partition_key.into(),
            next_row_key: next_row_key.into(),
            location,
        }
    }

    /// The canonical "start / no continuation" marker.
    #[must_use]
    pub fn sentinel() -> Self {
        Self::default()
    }

    /// Literal resume point derived from an entity's identity.
    #[must_use]
    pub fn from_entity(entity: &Entity, next_table_name: &str, location: Location) -> Self {
        Self::new(
            next_table_name,
            entity.partition_key(),
            entity.row_key(),
            location,
        )
    }

    #[must_use]
    pub fn next_table_name(&self) -> &str {
        &self.next_table_name
    }

    #[must_use]
    pub fn next_partition_key(&self) -> &str {
        &self.next_partition_key
    }

    #[must_use]
    pub fn next_row_key(&self) -> &str {
        &self.next_row_key
    }

    #[must_use]
    pub const fn location(&self) -> Location {
        self.location
    }

    #[must_use]
    pub fn is_sentinel(&self) -> bool {
        self.next_table_name.is_empty()
            && self.next_partition_key.is_empty()
            && self.next_row_key.is_empty()
            && self.location == Location::Unspecified
    }

    #[must_use]
    pub fn encode(&self) -> String {
        let joined = format!(
            "{}/{}/{}/{}",
            self.next_table_name,
            BASE64_URL_SAFE_NO_PAD.encode(&self.next_partition_key),
            BASE64_URL_SAFE_NO_PAD.encode(&self.next_row_key),
            self.location.as_wire_str(),
        );
        BASE64_STANDARD.encode(joined)
    }

    pub fn decode(token: &str) -> Result<Self, CursorError> {
        let token = token.trim();

        if token.len() > MAX_CURSOR_TOKEN_LEN {
            return Err(CursorError::TooLong {
                len: token.len(),
                max: MAX_CURSOR_TOKEN_LEN,
            });
        }

        let bytes = BASE64_STANDARD
            .decode(token)
            .map_err(|e| CursorError::InvalidEncoding {
                message: e.to_string(),
            })?;
        let joined = String::from_utf8(bytes).map_err(|e| CursorError::InvalidEncoding {
            message: e.to_string(),
        })?;

        let parts: Vec<&str> = joined.split('/').collect();
        if parts.len() != 4 {
            return Err(CursorError::InvalidPartCount { count: parts.len() });
        }

        let next_partition_key = Self::decode_key(parts[1], "partition key")?;
        let next_row_key = Self::decode_key(parts[2], "row key")?;
        let location = Location::from_wire_str(parts[3])?;

        Ok(Self {
            next_table_name: parts[0].to_string(),
            next_partition_key,
            next_row_key,
            location,
        })
    }

    fn decode_key(part: &str, component: &'static str) -> Result<String, CursorError> {
        let bytes =
            BASE64_URL_SAFE_NO_PAD
                .decode(part)
                .map_err(|e| CursorError::InvalidKeyEncoding {
                    component,
                    message: e.to_string(),
                })?;
        String::from_utf8(bytes).map_err(|e| CursorError::InvalidKeyEncoding {
            component,
            message: e.to_string(),
        })
    }
}

impl std::fmt::Display for Cursor {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(&self.encode())
    }
}

///
/// CursorError
///

#[derive(Debug, Eq, PartialEq, ThisError)]
pub enum CursorError {
    #[error("invalid cursor: not a base64 token ({message})")]
    InvalidEncoding { message: String },

    #[error("invalid cursor: expected 4 parts, got {count}")]
    InvalidPartCount { count: usize },

    #[error("invalid cursor: undecodable {component} ({message})")]
    InvalidKeyEncoding {
        component: &'static str,
        message: String,
    },

    #[error("invalid cursor: unknown location {location:?}")]
    UnknownLocation { location: String },

    #[error("cursor token exceeds max length: {len} chars (max {max})")]
    TooLong { len: usize, max: usize },
}

///
/// TESTS
///
