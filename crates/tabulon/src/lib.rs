//! Typed entities and cursor-paged queries for partition/row-keyed table
//! stores: the wire type system, the attribute-bag entity, opaque resume
//! cursors, a fluent filter builder, lazily extending result sets, and a
//! connection layer with self-healing writes over a pluggable transport.
#![warn(unreachable_pub)]

pub mod batch;
pub mod connection;
pub mod cursor;
pub mod edm;
pub mod entity;
pub mod error;
pub mod filter;
pub mod query;
pub mod table;
pub mod transport;
pub mod value;

// test
#[cfg(test)]
pub(crate) mod test_support;

pub use error::Error;

///
/// Prelude
///
/// Prelude contains only domain vocabulary.
/// No transports, raw wire types, or per-module errors are re-exported here.
///

pub mod prelude {
    pub use crate::{
        batch::Batch,
        connection::{ConnectionOptions, TableConnection},
        cursor::{Cursor, Location},
        edm::EdmType,
        entity::{Entity, EntityType},
        error::Error,
        filter::{CompareOp, Filter},
        query::{Builder, Page, ResultSet},
        table::Table,
        value::Value,
    };
}
