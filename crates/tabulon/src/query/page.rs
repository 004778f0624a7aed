use crate::{
    cursor::{Cursor, Location},
    entity::{Entity, EntityType},
    error::Error,
    query::builder::Builder,
};
use derive_more::{Deref, IntoIterator};

///
/// Page
///
/// One materialized page of a query, carrying the builder that produced it
/// so the next page can be fetched with the same shape. The builder's own
/// cursor is the position this page was fetched from; `continuation` is the
/// position the next page starts at, sentinel when the scan is exhausted.
///

#[derive(Deref, IntoIterator)]
pub struct Page<E: EntityType = Entity> {
    pub(crate) builder: Builder<E>,
    #[deref]
    #[into_iterator(owned, ref)]
    pub(crate) entities: Vec<E>,
    pub(crate) continuation: Cursor,
}

impl<E: EntityType> Page<E> {
    pub(crate) const fn new(builder: Builder<E>, entities: Vec<E>, continuation: Cursor) -> Self {
        Self {
            builder,
            entities,
            continuation,
        }
    }

    #[must_use]
    pub fn len(&self) -> usize {
        self.entities.len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.entities.is_empty()
    }

    #[must_use]
    pub fn get(&self, index: usize) -> Option<&E> {
        self.entities.get(index)
    }

    #[must_use]
    pub fn entities(&self) -> &[E] {
        &self.entities
    }

    #[must_use]
    pub fn into_entities(self) -> Vec<E> {
        self.entities
    }

    #[must_use]
    pub fn has_next_page(&self) -> bool {
        !self.continuation.is_sentinel()
    }

    /// Whether this page was fetched from a non-initial position.
    #[must_use]
    pub fn has_previous_page(&self) -> bool {
        !self.builder.cursor.is_sentinel()
    }

    /// Position this page was fetched from, when not the start of the scan.
    #[must_use]
    pub fn prev_cursor(&self) -> Option<&Cursor> {
        (!self.builder.cursor.is_sentinel()).then_some(&self.builder.cursor)
    }

    /// Position the next page starts at, when one exists.
    #[must_use]
    pub fn next_cursor(&self) -> Option<&Cursor> {
        self.has_next_page().then_some(&self.continuation)
    }

    /// A builder positioned at the continuation, or `None` when exhausted.
    #[must_use]
    pub fn next_query(&self) -> Option<Builder<E>> {
        if self.continuation.is_sentinel() {
            return None;
        }

        let mut builder = self.builder.clone();
        builder.cursor = self.continuation.clone();

        Some(builder)
    }

    /// Fetch the following page, or `None` when exhausted.
    pub fn next_page(&self) -> Result<Option<Self>, Error> {
        match self.next_query() {
            Some(builder) => Ok(Some(builder.get_page(&[])?)),
            None => Ok(None),
        }
    }

    /// Per-entity resume cursors, each marking the position just after its
    /// node.
    #[must_use]
    pub fn edges(&self) -> Vec<Edge<'_, E>> {
        self.entities
            .iter()
            .map(|node| Edge {
                cursor: Cursor::from_entity(
                    node.as_entity(),
                    &self.builder.table,
                    Location::PrimaryOnly,
                ),
                node,
            })
            .collect()
    }

    #[must_use]
    pub fn page_info(&self) -> PageInfo {
        PageInfo {
            has_next_page: self.has_next_page(),
            has_previous_page: self.has_previous_page(),
            start_cursor: self.prev_cursor().cloned(),
            end_cursor: self.next_cursor().cloned(),
        }
    }

    pub fn iter(&self) -> std::slice::Iter<'_, E> {
        self.entities.iter()
    }
}

///
/// Edge
///
/// An entity paired with the cursor that resumes just after it.
///

pub struct Edge<'a, E: EntityType = Entity> {
    pub cursor: Cursor,
    pub node: &'a E,
}

///
/// PageInfo
///

#[derive(Clone, Debug)]
pub struct PageInfo {
    pub has_next_page: bool,
    pub has_previous_page: bool,
    pub start_cursor: Option<Cursor>,
    pub end_cursor: Option<Cursor>,
}
