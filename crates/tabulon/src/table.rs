use crate::{connection::TableConnection, error::Error};
use thiserror::Error as ThisError;

/// Table names: 3..=63 chars, leading letter, alphanumeric throughout.
#[must_use]
pub fn is_valid_table_name(name: &str) -> bool {
    let bytes = name.as_bytes();
    (3..=63).contains(&bytes.len())
        && bytes[0].is_ascii_alphabetic()
        && bytes.iter().all(u8::is_ascii_alphanumeric)
}

///
/// TableNameError
///

#[derive(Debug, Eq, PartialEq, ThisError)]
#[error("invalid table name {name:?}")]
pub struct TableNameError {
    pub name: String,
}

///
/// Table
///
/// Named handle over a connection. Existence checks and lifecycle calls
/// delegate to the connection's idempotent operations.
///

#[derive(Clone)]
pub struct Table {
    connection: TableConnection,
    name: String,
}

impl Table {
    #[must_use]
    pub const fn new(connection: TableConnection, name: String) -> Self {
        Self { connection, name }
    }

    #[must_use]
    pub fn name(&self) -> &str {
        &self.name
    }

    #[must_use]
    pub const fn connection(&self) -> &TableConnection {
        &self.connection
    }

    pub fn exists(&self) -> Result<bool, Error> {
        self.connection.table_exists(&self.name)
    }

    pub fn ensure_exists(&self) -> Result<(), Error> {
        self.connection.ensure_table_exists(&self.name)?;
        Ok(())
    }

    pub fn delete(&self) -> Result<(), Error> {
        self.connection.delete_table(&self.name)
    }

    /// Start a query against this table.
    #[must_use]
    pub fn query(&self) -> crate::query::Builder {
        self.connection.query(&self.name)
    }

    /// Start a batch scoped to this table.
    #[must_use]
    pub fn batch(&self) -> crate::batch::Batch {
        self.connection.batch(&self.name)
    }
}

// the connection holds a transport trait object, so only the name prints
impl std::fmt::Debug for Table {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Table")
            .field("name", &self.name)
            .finish_non_exhaustive()
    }
}

///
/// TESTS
///
