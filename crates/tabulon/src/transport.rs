use crate::{cursor::Cursor, entity::Entity, filter::Filter};
use chrono::{DateTime, Utc};
use thiserror::Error as ThisError;

///
/// Machine-readable service error codes this crate branches on.
///

pub mod error_code {
    pub const TABLE_NOT_FOUND: &str = "TableNotFound";
    pub const TABLE_ALREADY_EXISTS: &str = "TableAlreadyExists";
    pub const ENTITY_ALREADY_EXISTS: &str = "EntityAlreadyExists";
    pub const RESOURCE_NOT_FOUND: &str = "ResourceNotFound";
}

///
/// ServiceError
///
/// Wrapped transport-level failure. The machine-readable error code is
/// populated eagerly from the parsed response at construction time so retry
/// and idempotence logic can branch on it without re-parsing.
///

#[derive(Clone, Debug, Eq, PartialEq, ThisError)]
#[error("table service error ({status}): {message}")]
pub struct ServiceError {
    pub status: u16,
    pub error_code: Option<String>,
    pub message: String,
}

impl ServiceError {
    #[must_use]
    pub fn new(status: u16, message: impl Into<String>) -> Self {
        Self {
            status,
            error_code: None,
            message: message.into(),
        }
    }

    #[must_use]
    pub fn with_code(status: u16, error_code: &str, message: impl Into<String>) -> Self {
        Self {
            status,
            error_code: Some(error_code.to_string()),
            message: message.into(),
        }
    }

    #[must_use]
    pub fn error_code(&self) -> Option<&str> {
        self.error_code.as_deref()
    }

    #[must_use]
    pub fn has_error_code(&self, error_code: &str) -> bool {
        self.error_code() == Some(error_code)
    }
}

///
/// EntityQuery
///
/// One page-sized query as handed to the transport.
///

#[derive(Clone, Debug)]
pub struct EntityQuery {
    pub table: String,
    pub filter: Option<Filter>,
    pub select: Vec<String>,
    pub top: u32,
    pub continuation: Cursor,
}

///
/// EntityPage
///
/// One fetched batch plus the continuation echoed by the service. A
/// sentinel continuation means no further pages.
///

#[derive(Clone, Debug, Default)]
pub struct EntityPage {
    pub entities: Vec<Entity>,
    pub continuation: Cursor,
}

impl EntityPage {
    #[must_use]
    pub fn empty() -> Self {
        Self::default()
    }
}

///
/// TableInfo
///

#[derive(Clone, Debug, Eq, PartialEq)]
pub struct TableInfo {
    pub name: String,
}

///
/// TableAcl
///

#[derive(Clone, Debug, Default, PartialEq)]
pub struct TableAcl {
    pub signed_identifiers: Vec<SignedIdentifier>,
}

#[derive(Clone, Debug, PartialEq)]
pub struct SignedIdentifier {
    pub id: String,
    pub start: Option<DateTime<Utc>>,
    pub expiry: Option<DateTime<Utc>>,
    pub permission: String,
}

///
/// BatchOperation
///

#[derive(Clone, Copy, Debug, Eq, PartialEq)]
pub enum BatchOperationKind {
    Insert,
    Update,
    Merge,
    InsertOrReplace,
    InsertOrMerge,
    Delete,
}

#[derive(Clone, Debug, PartialEq)]
pub enum BatchPayload {
    Entity(Entity),
    Keys {
        partition_key: String,
        row_key: String,
    },
}

#[derive(Clone, Debug, PartialEq)]
pub struct BatchOperation {
    pub kind: BatchOperationKind,
    pub table: String,
    pub payload: BatchPayload,
}

///
/// TableTransport
///
/// The consumed network capability. This crate never performs I/O itself;
/// every operation below is a single bounded round trip whose failures
/// surface as [`ServiceError`] values carrying the service's error code.
///

pub trait TableTransport: Send + Sync {
    fn create_table(&self, table: &str) -> Result<(), ServiceError>;

    fn delete_table(&self, table: &str) -> Result<(), ServiceError>;

    fn get_table(&self, table: &str) -> Result<TableInfo, ServiceError>;

    fn query_tables(&self, filter: Option<&Filter>) -> Result<Vec<TableInfo>, ServiceError>;

    fn query_entities(&self, query: &EntityQuery) -> Result<EntityPage, ServiceError>;

    fn get_entity(
        &self,
        table: &str,
        partition_key: &str,
        row_key: &str,
    ) -> Result<Entity, ServiceError>;

    /// Insert; returns the stored entity as echoed by the service.
    fn insert_entity(&self, table: &str, entity: &Entity) -> Result<Entity, ServiceError>;

    /// Merge into an existing entity; returns the new version token.
    fn merge_entity(&self, table: &str, entity: &Entity) -> Result<String, ServiceError>;

    /// Replace an existing entity; returns the new version token.
    fn update_entity(&self, table: &str, entity: &Entity) -> Result<String, ServiceError>;

    /// Insert-or-replace; returns the new version token.
    fn upsert_entity(&self, table: &str, entity: &Entity) -> Result<String, ServiceError>;

    /// Insert-or-merge; returns the new version token.
    fn insert_or_merge_entity(&self, table: &str, entity: &Entity)
    -> Result<String, ServiceError>;

    fn delete_entity(
        &self,
        table: &str,
        partition_key: &str,
        row_key: &str,
    ) -> Result<(), ServiceError>;

    fn get_table_acl(&self, table: &str) -> Result<TableAcl, ServiceError>;

    fn set_table_acl(&self, table: &str, acl: &TableAcl) -> Result<(), ServiceError>;

    /// Submit an ordered operation list as one atomic unit; the returned
    /// entries correspond to the operations in submission order.
    fn batch(&self, operations: &[BatchOperation]) -> Result<Vec<Entity>, ServiceError>;
}
