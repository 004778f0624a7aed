use crate::{
    batch::Batch,
    edm::EdmType,
    entity::{Entity, EntityType},
    error::Error,
    filter::{CompareOp, Filter},
    query::Builder,
    table::{Table, TableNameError, is_valid_table_name},
    transport::{
        EntityPage, EntityQuery, ServiceError, TableAcl, TableInfo, TableTransport, error_code,
    },
    value::Value,
};
use std::sync::Arc;
use tracing::{debug, warn};

/// Default server-side page size for queries.
const DEFAULT_TOP: u32 = 50;

///
/// ConnectionOptions
///

#[derive(Clone, Copy, Debug)]
pub struct ConnectionOptions {
    /// Page size applied to new query builders.
    pub default_top: u32,

    /// Reject syntactically invalid table names before hitting the service.
    pub validate_table_names: bool,
}

impl Default for ConnectionOptions {
    fn default() -> Self {
        Self {
            default_top: DEFAULT_TOP,
            validate_table_names: true,
        }
    }
}

///
/// TableConnection
///
/// Cheap-to-clone handle over a [`TableTransport`]. Owns the table and
/// entity lifecycle operations, including the documented idempotence cases:
/// `ensure_table_exists` swallows `TableAlreadyExists`; `delete_table`,
/// `delete_entity`, and `query_entities` treat `TableNotFound` as success;
/// and the insert/save/upsert writes self-heal a missing table by creating
/// it and retrying the same write exactly once.
///

#[derive(Clone)]
pub struct TableConnection {
    transport: Arc<dyn TableTransport>,
    options: ConnectionOptions,
}

impl TableConnection {
    #[must_use]
    pub fn new(transport: Arc<dyn TableTransport>) -> Self {
        Self::with_options(transport, ConnectionOptions::default())
    }

    #[must_use]
    pub const fn with_options(
        transport: Arc<dyn TableTransport>,
        options: ConnectionOptions,
    ) -> Self {
        Self { transport, options }
    }

    #[must_use]
    pub const fn options(&self) -> &ConnectionOptions {
        &self.options
    }

    #[must_use]
    pub fn transport(&self) -> &dyn TableTransport {
        self.transport.as_ref()
    }

    /// Start a query against `table`.
    #[must_use]
    pub fn query(&self, table: &str) -> Builder {
        Builder::new(self.clone(), table)
    }

    /// Start a query deserializing into a custom record type.
    #[must_use]
    pub fn query_as<E: EntityType>(&self, table: &str) -> Builder<E> {
        Builder::new(self.clone(), table)
    }

    /// Start a batch scoped to `table`.
    #[must_use]
    pub fn batch(&self, table: &str) -> Batch {
        Batch::new(self.clone(), table.to_string())
    }

    /// Named table handle.
    #[must_use]
    pub fn table(&self, name: &str) -> Table {
        Table::new(self.clone(), name.to_string())
    }

    // ------------------------------------------------------------------
    // Table lifecycle
    // ------------------------------------------------------------------

    pub fn create_table(&self, table: &str) -> Result<Table, Error> {
        if self.options.validate_table_names && !is_valid_table_name(table) {
            return Err(TableNameError {
                name: table.to_string(),
            }
            .into());
        }

        debug!(table, "creating table");
        self.transport.create_table(table)?;
        Ok(self.table(table))
    }

    /// Idempotent `create_table`: an already existing table is success.
    pub fn ensure_table_exists(&self, table: &str) -> Result<Table, Error> {
        match self.create_table(table) {
            Ok(handle) => Ok(handle),
            Err(Error::Service(err)) if err.has_error_code(error_code::TABLE_ALREADY_EXISTS) => {
                Ok(self.table(table))
            }
            Err(err) => Err(err),
        }
    }

    /// Idempotent delete: a missing table is success.
    pub fn delete_table(&self, table: &str) -> Result<(), Error> {
        match self.transport.delete_table(table) {
            Ok(()) => Ok(()),
            Err(err) if err.has_error_code(error_code::TABLE_NOT_FOUND) => Ok(()),
            Err(err) => Err(err.into()),
        }
    }

    pub fn get_table(&self, table: &str) -> Result<TableInfo, Error> {
        Ok(self.transport.get_table(table)?)
    }

    pub fn query_tables(&self, filter: Option<&Filter>) -> Result<Vec<TableInfo>, Error> {
        Ok(self.transport.query_tables(filter)?)
    }

    pub fn tables(&self) -> Result<Vec<TableInfo>, Error> {
        self.query_tables(None)
    }

    /// Existence probe via a filtered query on table metadata; the service
    /// has no dedicated existence endpoint.
    pub fn table_exists(&self, table: &str) -> Result<bool, Error> {
        let filter = Filter::compare(
            CompareOp::Eq,
            Filter::property("TableName"),
            Filter::constant_typed(Value::from(table), EdmType::String),
        );
        Ok(!self.query_tables(Some(&filter))?.is_empty())
    }

    pub fn get_table_acl(&self, table: &str) -> Result<TableAcl, Error> {
        Ok(self.transport.get_table_acl(table)?)
    }

    /// Set the table ACL, creating the table first if it does not exist.
    pub fn set_table_acl(&self, table: &str, acl: &TableAcl) -> Result<(), Error> {
        match self.transport.set_table_acl(table, acl) {
            Ok(()) => Ok(()),
            Err(err) if err.has_error_code(error_code::TABLE_NOT_FOUND) => {
                self.ensure_table_exists(table)?;
                Ok(self.transport.set_table_acl(table, acl)?)
            }
            Err(err) => Err(err.into()),
        }
    }

    // ------------------------------------------------------------------
    // Entity operations
    // ------------------------------------------------------------------

    pub fn get_entity(
        &self,
        table: &str,
        partition_key: &str,
        row_key: &str,
    ) -> Result<Entity, Error> {
        Ok(self.transport.get_entity(table, partition_key, row_key)?)
    }

    /// Insert, self-healing a missing table. The returned entity is the
    /// caller's with the server echo (timestamp, version token) merged in.
    pub fn insert_entity(&self, table: &str, mut entity: Entity) -> Result<Entity, Error> {
        let echo = self.heal_write(table, "insert", |transport| {
            transport.insert_entity(table, &entity)
        })?;
        entity.load(&echo);
        Ok(entity)
    }

    /// Insert-or-merge, self-healing a missing table. Returns the new
    /// version token.
    pub fn save_entity(&self, table: &str, entity: &Entity) -> Result<String, Error> {
        self.heal_write(table, "save", |transport| {
            transport.insert_or_merge_entity(table, entity)
        })
    }

    /// Insert-or-replace, self-healing a missing table. Returns the new
    /// version token.
    pub fn upsert_entity(&self, table: &str, entity: &Entity) -> Result<String, Error> {
        self.heal_write(table, "upsert", |transport| {
            transport.upsert_entity(table, entity)
        })
    }

    /// Merge into an existing entity. Not self-healing: a missing table is
    /// a real failure here.
    pub fn merge_entity(&self, table: &str, entity: &Entity) -> Result<String, Error> {
        Ok(self.transport.merge_entity(table, entity)?)
    }

    /// Replace an existing entity. Not self-healing.
    pub fn update_entity(&self, table: &str, entity: &Entity) -> Result<String, Error> {
        Ok(self.transport.update_entity(table, entity)?)
    }

    /// Idempotent delete: a missing table means nothing to delete.
    pub fn delete_entity(
        &self,
        table: &str,
        partition_key: &str,
        row_key: &str,
    ) -> Result<(), Error> {
        match self.transport.delete_entity(table, partition_key, row_key) {
            Ok(()) => Ok(()),
            Err(err) if err.has_error_code(error_code::TABLE_NOT_FOUND) => {
                debug!(table, "delete against missing table treated as success");
                Ok(())
            }
            Err(err) => Err(err.into()),
        }
    }

    /// Issue one page-sized query. A missing table yields an empty page
    /// with the sentinel continuation rather than an error.
    pub fn query_entities(&self, query: &EntityQuery) -> Result<EntityPage, Error> {
        match self.transport.query_entities(query) {
            Ok(page) => Ok(page),
            Err(err) if err.has_error_code(error_code::TABLE_NOT_FOUND) => {
                debug!(table = %query.table, "query against missing table, empty result");
                Ok(EntityPage::empty())
            }
            Err(err) => Err(err.into()),
        }
    }

    /// Run a write; on `TableNotFound`, create the table and retry the same
    /// write exactly once. A second `TableNotFound` propagates. A racing
    /// creator surfacing `TableAlreadyExists` inside the ensure step is
    /// swallowed by `ensure_table_exists`.
    fn heal_write<T>(
        &self,
        table: &str,
        op: &'static str,
        mut write: impl FnMut(&dyn TableTransport) -> Result<T, ServiceError>,
    ) -> Result<T, Error> {
        match write(self.transport.as_ref()) {
            Ok(value) => Ok(value),
            Err(err) if err.has_error_code(error_code::TABLE_NOT_FOUND) => {
                warn!(table, op, "table missing on write, creating and retrying once");
                self.ensure_table_exists(table)?;
                Ok(write(self.transport.as_ref())?)
            }
            Err(err) => Err(err.into()),
        }
    }
}
