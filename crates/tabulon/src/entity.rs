use crate::{
    cursor::{Cursor, Location},
    edm::{EdmError, EdmType},
    value::{Value, ValueError},
};
use chrono::{DateTime, Utc};
use convert_case::{Case, Casing};
use std::collections::BTreeMap;
use thiserror::Error as ThisError;

/// Attribute names that alias the entity's version token.
const ETAG_NAMES: [&str; 4] = ["etag", "ETag", "eTag", "e_tag"];

/// Server-assigned timestamp attribute backing `CreatedAt`/`UpdatedAt`.
const TIMESTAMP_NAME: &str = "Timestamp";

/// Wire keys reserved by the OData envelope rather than the attribute bag.
const PARTITION_KEY_NAME: &str = "PartitionKey";
const ROW_KEY_NAME: &str = "RowKey";
const ODATA_ETAG_NAME: &str = "odata.etag";
const ODATA_TYPE_SUFFIX: &str = "@odata.type";

///
/// Property
///
/// One stored attribute: explicit wire type, decoded value, and the raw
/// textual payload as received (empty for locally constructed attributes).
///

#[derive(Clone, Debug, PartialEq)]
pub struct Property {
    pub edm_type: EdmType,
    pub value: Value,
    pub raw_value: String,
}

impl Property {
    #[must_use]
    pub fn new(edm_type: EdmType, value: Value) -> Self {
        Self {
            edm_type,
            value,
            raw_value: String::new(),
        }
    }

    #[must_use]
    pub const fn with_raw(edm_type: EdmType, value: Value, raw_value: String) -> Self {
        Self {
            edm_type,
            value,
            raw_value,
        }
    }
}

///
/// Entity
///
/// One row: composite identity, an opaque version token, and a mutable bag
/// of named typed attributes. Attribute names are addressed
/// case-insensitively: lookups check the literal name first, then its
/// PascalCase form, and a name that exists literally is never re-normalized.
///

#[derive(Clone, Debug, Default, PartialEq)]
pub struct Entity {
    partition_key: String,
    row_key: String,
    etag: String,
    properties: BTreeMap<String, Property>,
}

impl Entity {
    #[must_use]
    pub fn new(partition_key: impl Into<String>, row_key: impl Into<String>) -> Self {
        Self {
            partition_key: partition_key.into(),
            row_key: row_key.into(),
            etag: String::new(),
            properties: BTreeMap::new(),
        }
    }

    /// Build an entity from an attribute map.
    #[must_use]
    pub fn make<N, V>(attributes: impl IntoIterator<Item = (N, V)>) -> Self
    where
        N: AsRef<str>,
        V: Into<Value>,
    {
        let mut entity = Self::default();
        entity.fill(attributes);
        entity
    }

    /// Coerce loosely typed construction input into an entity.
    pub fn coerce(input: impl Into<EntityInput>) -> Result<Option<Self>, EntityError> {
        match input.into() {
            EntityInput::None => Ok(None),
            EntityInput::Entity(entity) => Ok(Some(*entity)),
            EntityInput::Json(json) => Self::from_json(&json).map(Some),
            EntityInput::Attrs(attrs) => Ok(Some(Self::make(attrs))),
        }
    }

    // ------------------------------------------------------------------
    // Identity and version
    // ------------------------------------------------------------------

    #[must_use]
    pub fn partition_key(&self) -> &str {
        &self.partition_key
    }

    #[must_use]
    pub fn row_key(&self) -> &str {
        &self.row_key
    }

    pub fn set_partition_key(&mut self, partition_key: impl Into<String>) -> &mut Self {
        self.partition_key = partition_key.into();
        self
    }

    pub fn set_row_key(&mut self, row_key: impl Into<String>) -> &mut Self {
        self.row_key = row_key.into();
        self
    }

    #[must_use]
    pub fn etag(&self) -> &str {
        &self.etag
    }

    pub fn set_etag(&mut self, etag: impl Into<String>) -> &mut Self {
        self.etag = etag.into();
        self
    }

    /// Derived identity view: `"{partition_key}/{row_key}"`.
    #[must_use]
    pub fn key(&self) -> String {
        format!("{}/{}", self.partition_key, self.row_key)
    }

    /// Server-assigned timestamp, when present.
    #[must_use]
    pub fn timestamp(&self) -> Option<DateTime<Utc>> {
        match self.properties.get(TIMESTAMP_NAME) {
            Some(prop) => match &prop.value {
                Value::DateTime(dt) => Some(*dt),
                Value::Str(s) => DateTime::parse_from_rfc3339(s)
                    .ok()
                    .map(|dt| dt.with_timezone(&Utc)),
                _ => None,
            },
            None => None,
        }
    }

    /// Resume cursor pointing just past this entity.
    #[must_use]
    pub fn cursor(&self, next_table_name: &str, location: Option<Location>) -> Cursor {
        Cursor::from_entity(
            self,
            next_table_name,
            location.unwrap_or(Location::PrimaryOnly),
        )
    }

    // ------------------------------------------------------------------
    // Attribute bag
    // ------------------------------------------------------------------

    /// PascalCase normal form used for case-insensitive addressing.
    #[must_use]
    pub fn standard_name(name: &str) -> String {
        name.to_case(Case::Pascal)
    }

    /// Literal-first name resolution: an existing literal name wins,
    /// otherwise the normalized form is used.
    #[must_use]
    pub fn property_name(&self, name: &str) -> String {
        if self.properties.contains_key(name) {
            name.to_string()
        } else {
            Self::standard_name(name)
        }
    }

    #[must_use]
    pub fn has_attribute(&self, name: &str) -> bool {
        self.properties.contains_key(name)
            || self.properties.contains_key(&Self::standard_name(name))
    }

    #[must_use]
    pub fn attribute_names(&self) -> Vec<&str> {
        self.properties.keys().map(String::as_str).collect()
    }

    #[must_use]
    pub fn properties(&self) -> &BTreeMap<String, Property> {
        &self.properties
    }

    #[must_use]
    pub fn property(&self, name: &str) -> Option<&Property> {
        self.properties.get(&self.property_name(name))
    }

    #[must_use]
    pub fn attribute_type(&self, name: &str) -> Option<EdmType> {
        self.property(name).map(|p| p.edm_type)
    }

    #[must_use]
    pub fn raw_value(&self, name: &str) -> Option<&str> {
        self.property(name).map(|p| p.raw_value.as_str())
    }

    /// Store a pre-typed property verbatim under the resolved name.
    pub fn set_property(&mut self, name: &str, property: Property) -> &mut Self {
        let name = self.property_name(name);
        self.properties.insert(name, property);
        self
    }

    /// Set an attribute, inferring the wire type from the value.
    ///
    /// An existing attribute keeps its stored type and has only its value
    /// replaced; a new attribute is added under the normalized name.
    pub fn set_attribute(&mut self, name: &str, value: impl Into<Value>) -> &mut Self {
        self.set_attribute_typed(name, value, None, "")
    }

    /// Set an attribute with an explicitly declared type and raw payload.
    pub fn set_attribute_typed(
        &mut self,
        name: &str,
        value: impl Into<Value>,
        edm_type: Option<EdmType>,
        raw_value: impl Into<String>,
    ) -> &mut Self {
        let name = self.property_name(name);
        let value = value.into();

        if let Some(existing) = self.properties.get_mut(&name) {
            existing.value = value;
        } else {
            let edm_type = edm_type.unwrap_or_else(|| EdmType::of(&value));
            self.properties
                .insert(name, Property::with_raw(edm_type, value, raw_value.into()));
        }
        self
    }

    /// Read an attribute through the alias and normalization rules.
    ///
    /// Returns `None` for both a missing attribute and a derived view with
    /// no backing data; use [`Self::has_attribute`] to distinguish.
    #[must_use]
    pub fn get_attribute(&self, name: &str) -> Option<Value> {
        if ETAG_NAMES.contains(&name) {
            return Some(Value::Str(self.etag.clone()));
        }

        let name = self.property_name(name);

        if name == "Key" {
            return Some(Value::Str(self.key()));
        }

        match self.properties.get(&name) {
            Some(prop) => Some(Self::read_value(prop)),
            None => match name.as_str() {
                "UpdatedAt" | "CreatedAt" => self.timestamp().map(Value::DateTime),
                _ => None,
            },
        }
    }

    /// All attributes through the `get_attribute` conversion rules.
    #[must_use]
    pub fn attributes(&self) -> BTreeMap<String, Value> {
        self.properties
            .iter()
            .map(|(name, prop)| (name.clone(), Self::read_value(prop)))
            .collect()
    }

    fn read_value(prop: &Property) -> Value {
        if prop.edm_type == EdmType::DateTime {
            if let Value::Str(s) = &prop.value {
                if let Ok(dt) = DateTime::parse_from_rfc3339(s) {
                    return Value::DateTime(dt.with_timezone(&Utc));
                }
            }
        }
        prop.value.clone()
    }

    pub fn delete_attribute(&mut self, name: &str) -> &mut Self {
        let name = self.property_name(name);
        self.properties.remove(&name);
        self
    }

    /// Set attributes in bulk.
    pub fn fill<N, V>(&mut self, attributes: impl IntoIterator<Item = (N, V)>) -> &mut Self
    where
        N: AsRef<str>,
        V: Into<Value>,
    {
        for (name, value) in attributes {
            self.set_attribute(name.as_ref(), value);
        }
        self
    }

    /// Merge another entity's attributes into this one, with the other's
    /// values winning on collision. A non-empty version token on `other` is
    /// adopted. Used to absorb server echoes after a write.
    pub fn load(&mut self, other: &Self) -> &mut Self {
        for (name, prop) in &other.properties {
            self.properties.insert(name.clone(), prop.clone());
        }
        if !other.etag.is_empty() {
            self.etag = other.etag.clone();
        }
        self
    }

    // ------------------------------------------------------------------
    // Wire (OData JSON) codec
    // ------------------------------------------------------------------

    /// Decode a raw wire entity: an OData JSON object with optional
    /// `Name@odata.type` annotations and envelope keys.
    pub fn from_json(json: &serde_json::Value) -> Result<Self, EntityError> {
        let Some(object) = json.as_object() else {
            return Err(EntityError::UnsupportedEntityInput {
                kind: json_kind(json),
            });
        };

        let mut entity = Self::default();

        for (name, value) in object {
            if name.ends_with(ODATA_TYPE_SUFFIX) || name.starts_with("odata.") {
                if name == ODATA_ETAG_NAME {
                    entity.etag = value.as_str().unwrap_or_default().to_string();
                }
                continue;
            }
            if name == PARTITION_KEY_NAME {
                entity.partition_key = value.as_str().unwrap_or_default().to_string();
                continue;
            }
            if name == ROW_KEY_NAME {
                entity.row_key = value.as_str().unwrap_or_default().to_string();
                continue;
            }

            let annotation = object
                .get(&format!("{name}{ODATA_TYPE_SUFFIX}"))
                .and_then(serde_json::Value::as_str);
            let declared = EdmType::coerce(annotation)?;
            let decoded = Value::from_json(value, declared)?;
            let edm_type = declared.unwrap_or_else(|| EdmType::of(&decoded));
            let raw_value = match value {
                serde_json::Value::String(s) => s.clone(),
                other => other.to_string(),
            };

            entity
                .properties
                .insert(name.clone(), Property::with_raw(edm_type, decoded, raw_value));
        }

        Ok(entity)
    }

    /// Encode to the wire shape, emitting `@odata.type` annotations for the
    /// types the protocol cannot infer.
    #[must_use]
    pub fn to_json(&self) -> serde_json::Value {
        let mut object = serde_json::Map::new();

        object.insert(
            PARTITION_KEY_NAME.to_string(),
            serde_json::Value::String(self.partition_key.clone()),
        );
        object.insert(
            ROW_KEY_NAME.to_string(),
            serde_json::Value::String(self.row_key.clone()),
        );
        if !self.etag.is_empty() {
            object.insert(
                ODATA_ETAG_NAME.to_string(),
                serde_json::Value::String(self.etag.clone()),
            );
        }

        for (name, prop) in &self.properties {
            if prop.edm_type.requires_annotation() {
                object.insert(
                    format!("{name}{ODATA_TYPE_SUFFIX}"),
                    serde_json::Value::String(prop.edm_type.wire_name().to_string()),
                );
            }
            object.insert(name.clone(), prop.value.to_json());
        }

        serde_json::Value::Object(object)
    }
}

///
/// EntityType
///
/// Typed-deserialization tag carried by query builders. A custom record type
/// wraps an [`Entity`] and keeps it reachable so cursor derivation and edge
/// construction stay available.
///

pub trait EntityType: Sized {
    fn from_entity(entity: Entity) -> Self;

    fn as_entity(&self) -> &Entity;
}

impl EntityType for Entity {
    fn from_entity(entity: Self) -> Self {
        entity
    }

    fn as_entity(&self) -> &Self {
        self
    }
}

///
/// EntityInput
///
/// Loosely typed construction input accepted by [`Entity::coerce`].
///

#[derive(Debug)]
pub enum EntityInput {
    None,
    Entity(Box<Entity>),
    Json(serde_json::Value),
    Attrs(Vec<(String, Value)>),
}

impl From<Entity> for EntityInput {
    fn from(entity: Entity) -> Self {
        Self::Entity(Box::new(entity))
    }
}

impl From<Option<Entity>> for EntityInput {
    fn from(entity: Option<Entity>) -> Self {
        entity.map_or(Self::None, |e| Self::Entity(Box::new(e)))
    }
}

impl From<serde_json::Value> for EntityInput {
    fn from(json: serde_json::Value) -> Self {
        Self::Json(json)
    }
}

impl From<Vec<(String, Value)>> for EntityInput {
    fn from(attrs: Vec<(String, Value)>) -> Self {
        Self::Attrs(attrs)
    }
}

const fn json_kind(json: &serde_json::Value) -> &'static str {
    match json {
        serde_json::Value::Null => "null",
        serde_json::Value::Bool(_) => "boolean",
        serde_json::Value::Number(_) => "number",
        serde_json::Value::String(_) => "string",
        serde_json::Value::Array(_) => "array",
        serde_json::Value::Object(_) => "object",
    }
}

///
/// EntityError
///

#[derive(Debug, PartialEq, ThisError)]
pub enum EntityError {
    #[error("unsupported entity input: {kind}")]
    UnsupportedEntityInput { kind: &'static str },

    #[error(transparent)]
    Edm(#[from] EdmError),

    #[error(transparent)]
    Value(#[from] ValueError),
}

///
/// TESTS
///
