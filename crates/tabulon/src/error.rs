use crate::{
    cursor::CursorError, edm::EdmError, entity::EntityError, filter::FilterError,
    table::TableNameError, transport::ServiceError, value::ValueError,
};
use thiserror::Error as ThisError;

///
/// Error
///
/// Top-level error, transparent over the per-module errors.
///

#[derive(Debug, ThisError)]
pub enum Error {
    #[error(transparent)]
    Cursor(#[from] CursorError),

    #[error(transparent)]
    Edm(#[from] EdmError),

    #[error(transparent)]
    Entity(#[from] EntityError),

    #[error(transparent)]
    Filter(#[from] FilterError),

    #[error(transparent)]
    Service(#[from] ServiceError),

    #[error(transparent)]
    Table(#[from] TableNameError),

    #[error(transparent)]
    Value(#[from] ValueError),
}
