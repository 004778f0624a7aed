use crate::{
    connection::TableConnection,
    cursor::{Cursor, CursorError, Location},
    entity::{Entity, EntityType},
    error::Error,
    filter::{CompareOp, Filter, FilterError},
    query::page::Page,
    query::result::ResultSet,
    transport::{EntityPage, EntityQuery, ServiceError, error_code},
    value::Value,
};
use std::marker::PhantomData;

///
/// Builder
///
/// Fluent query over one table. Predicates accumulate left-associatively:
/// the first predicate becomes the root, each later predicate is joined to
/// everything accumulated so far with `and` (or `or` for the `or_*`
/// variants), and the `not_*` variants negate the predicate being added,
/// never the accumulated tree.
///
/// Terminal operations (`get_page`, `get`, `first`) consume the builder;
/// clone it first to reuse the shape.
///

pub struct Builder<E: EntityType = Entity> {
    pub(crate) connection: TableConnection,
    pub(crate) table: String,
    pub(crate) filter: Option<Filter>,
    pub(crate) select: Vec<String>,
    pub(crate) top: u32,
    pub(crate) cursor: Cursor,
    _marker: PhantomData<fn() -> E>,
}

impl<E: EntityType> Clone for Builder<E> {
    fn clone(&self) -> Self {
        Self {
            connection: self.connection.clone(),
            table: self.table.clone(),
            filter: self.filter.clone(),
            select: self.select.clone(),
            top: self.top,
            cursor: self.cursor.clone(),
            _marker: PhantomData,
        }
    }
}

impl<E: EntityType> Builder<E> {
    #[must_use]
    pub(crate) fn new(connection: TableConnection, table: &str) -> Self {
        let top = connection.options().default_top;
        Self {
            connection,
            table: table.to_string(),
            filter: None,
            select: Vec::new(),
            top,
            cursor: Cursor::sentinel(),
            _marker: PhantomData,
        }
    }

    #[must_use]
    pub fn table(&self) -> &str {
        &self.table
    }

    #[must_use]
    pub const fn filter(&self) -> Option<&Filter> {
        self.filter.as_ref()
    }

    /// Fold `predicate` into the accumulated filter tree.
    #[must_use]
    fn add_filter(mut self, predicate: Filter, negate: bool, or: bool) -> Self {
        let predicate = if negate {
            Filter::not(predicate)
        } else {
            predicate
        };
        self.filter = Some(match self.filter.take() {
            None => predicate,
            Some(existing) if or => Filter::or(existing, predicate),
            Some(existing) => Filter::and(existing, predicate),
        });

        self
    }

    // ------------------------------------------------------------------
    // Comparison predicates
    // ------------------------------------------------------------------

    pub fn where_cmp(
        self,
        property: &str,
        operator: &str,
        value: impl Into<Value>,
    ) -> Result<Self, FilterError> {
        self.push_cmp(property, operator, value, false, false)
    }

    pub fn or_where_cmp(
        self,
        property: &str,
        operator: &str,
        value: impl Into<Value>,
    ) -> Result<Self, FilterError> {
        self.push_cmp(property, operator, value, false, true)
    }

    pub fn not_where_cmp(
        self,
        property: &str,
        operator: &str,
        value: impl Into<Value>,
    ) -> Result<Self, FilterError> {
        self.push_cmp(property, operator, value, true, false)
    }

    pub fn or_not_where_cmp(
        self,
        property: &str,
        operator: &str,
        value: impl Into<Value>,
    ) -> Result<Self, FilterError> {
        self.push_cmp(property, operator, value, true, true)
    }

    fn push_cmp(
        self,
        property: &str,
        operator: &str,
        value: impl Into<Value>,
        negate: bool,
        or: bool,
    ) -> Result<Self, FilterError> {
        let op = CompareOp::parse(operator)?;
        let predicate = Filter::compare(
            op,
            Filter::property(property),
            Filter::constant(value.into()),
        );

        Ok(self.add_filter(predicate, negate, or))
    }

    // ------------------------------------------------------------------
    // Grouped and composite predicates
    // ------------------------------------------------------------------

    /// Equality on every pair, joined with `and`. An empty set is a no-op.
    #[must_use]
    pub fn where_all<S, V>(self, pairs: impl IntoIterator<Item = (S, V)>) -> Self
    where
        S: AsRef<str>,
        V: Into<Value>,
    {
        self.push_all(pairs, false)
    }

    /// Like [`Self::where_all`] but the whole group joins with `or`.
    #[must_use]
    pub fn or_where_all<S, V>(self, pairs: impl IntoIterator<Item = (S, V)>) -> Self
    where
        S: AsRef<str>,
        V: Into<Value>,
    {
        self.push_all(pairs, true)
    }

    fn push_all<S, V>(self, pairs: impl IntoIterator<Item = (S, V)>, or: bool) -> Self
    where
        S: AsRef<str>,
        V: Into<Value>,
    {
        let mut group: Option<Filter> = None;
        for (property, value) in pairs {
            let predicate = Filter::compare(
                CompareOp::Eq,
                Filter::property(property.as_ref()),
                Filter::constant(value.into()),
            );
            group = Some(match group {
                None => predicate,
                Some(existing) => Filter::and(existing, predicate),
            });
        }

        match group {
            None => self,
            Some(group) => self.add_filter(group, false, or),
        }
    }

    /// Build a parenthesized sub-filter with `scope` and join it with `and`.
    /// A scope that adds no predicate is a no-op.
    pub fn where_group(
        self,
        scope: impl FnOnce(Self) -> Result<Self, FilterError>,
    ) -> Result<Self, FilterError> {
        self.push_group(scope, false)
    }

    /// Like [`Self::where_group`] but joins with `or`.
    pub fn or_where_group(
        self,
        scope: impl FnOnce(Self) -> Result<Self, FilterError>,
    ) -> Result<Self, FilterError> {
        self.push_group(scope, true)
    }

    fn push_group(
        self,
        scope: impl FnOnce(Self) -> Result<Self, FilterError>,
        or: bool,
    ) -> Result<Self, FilterError> {
        let sub = Self::new(self.connection.clone(), &self.table);
        let sub = scope(sub)?;

        Ok(match sub.filter {
            None => self,
            Some(group) => self.add_filter(group, false, or),
        })
    }

    /// Membership test rendered as an `or`-chain of equalities. An empty
    /// value set is a no-op, not a contradiction.
    #[must_use]
    pub fn where_in<V>(self, property: &str, values: impl IntoIterator<Item = V>) -> Self
    where
        V: Into<Value>,
    {
        self.push_in(property, values, false, false)
    }

    #[must_use]
    pub fn or_where_in<V>(self, property: &str, values: impl IntoIterator<Item = V>) -> Self
    where
        V: Into<Value>,
    {
        self.push_in(property, values, false, true)
    }

    #[must_use]
    pub fn not_where_in<V>(self, property: &str, values: impl IntoIterator<Item = V>) -> Self
    where
        V: Into<Value>,
    {
        self.push_in(property, values, true, false)
    }

    fn push_in<V>(
        self,
        property: &str,
        values: impl IntoIterator<Item = V>,
        negate: bool,
        or: bool,
    ) -> Self
    where
        V: Into<Value>,
    {
        let mut group: Option<Filter> = None;
        for value in values {
            let predicate = Filter::compare(
                CompareOp::Eq,
                Filter::property(property),
                Filter::constant(value.into()),
            );
            group = Some(match group {
                None => predicate,
                Some(existing) => Filter::or(existing, predicate),
            });
        }

        match group {
            None => self,
            Some(group) => self.add_filter(group, negate, or),
        }
    }

    /// Splice a pre-rendered filter fragment in verbatim.
    #[must_use]
    pub fn where_raw(self, expression: &str) -> Self {
        self.add_filter(Filter::raw(expression), false, false)
    }

    #[must_use]
    pub fn or_where_raw(self, expression: &str) -> Self {
        self.add_filter(Filter::raw(expression), false, true)
    }

    #[must_use]
    pub fn not_where_raw(self, expression: &str) -> Self {
        self.add_filter(Filter::raw(expression), true, false)
    }

    // ------------------------------------------------------------------
    // Shape
    // ------------------------------------------------------------------

    /// Server-side page size for each round trip. Not a total result cap.
    #[must_use]
    pub const fn limit(mut self, top: u32) -> Self {
        self.top = top;
        self
    }

    /// Replace the projection list.
    #[must_use]
    pub fn select<S: Into<String>>(mut self, fields: impl IntoIterator<Item = S>) -> Self {
        self.select = fields.into_iter().map(Into::into).collect();
        self
    }

    /// Append one field to the projection list.
    #[must_use]
    pub fn add_select(mut self, field: impl Into<String>) -> Self {
        self.select.push(field.into());
        self
    }

    /// Resume after a prior position: a [`Cursor`], its encoded token, or
    /// an entity whose key marks the position.
    pub fn after(mut self, resume: impl Into<ResumePoint>) -> Result<Self, CursorError> {
        self.cursor = match resume.into() {
            ResumePoint::Cursor(cursor) => cursor,
            ResumePoint::Encoded(token) => Cursor::decode(&token)?,
            ResumePoint::Entity(entity) => {
                Cursor::from_entity(&entity, "", Location::Unspecified)
            }
        };

        Ok(self)
    }

    // ------------------------------------------------------------------
    // Execution
    // ------------------------------------------------------------------

    fn entity_query(&self, fields: &[&str]) -> EntityQuery {
        let mut select = self.select.clone();
        for field in fields {
            if !select.iter().any(|s| s == field) {
                select.push((*field).to_string());
            }
        }

        EntityQuery {
            table: self.table.clone(),
            filter: self.filter.clone(),
            select,
            top: self.top,
            continuation: self.cursor.clone(),
        }
    }

    /// One raw round trip. A missing table yields an empty page.
    pub fn get_raw(&self, fields: &[&str]) -> Result<EntityPage, Error> {
        self.connection.query_entities(&self.entity_query(fields))
    }

    /// Fetch one typed page, capturing this builder for lazy continuation.
    pub fn get_page(self, fields: &[&str]) -> Result<Page<E>, Error> {
        let raw = self.get_raw(fields)?;
        let entities = raw.entities.into_iter().map(E::from_entity).collect();

        Ok(Page::new(self, entities, raw.continuation))
    }

    /// Fetch the first page and wrap it in a lazily extending result set.
    pub fn get(self, fields: &[&str]) -> Result<ResultSet<E>, Error> {
        Ok(ResultSet::from_page(self.get_page(fields)?))
    }

    /// Head of the first fetched page. Exactly one round trip: an empty
    /// page yields `None` even when a continuation remains.
    pub fn first(self, fields: &[&str]) -> Result<Option<E>, Error> {
        let page = self.get_page(fields)?;

        Ok(page.into_entities().into_iter().next())
    }

    /// Like [`Self::first`] but an empty result is an error.
    pub fn first_or_fail(self, fields: &[&str]) -> Result<E, Error> {
        self.first(fields)?.ok_or_else(|| {
            ServiceError::with_code(404, error_code::RESOURCE_NOT_FOUND, "empty result").into()
        })
    }
}

///
/// ResumePoint
///
/// Anything [`Builder::after`] can resume from.
///

pub enum ResumePoint {
    Cursor(Cursor),
    Encoded(String),
    Entity(Box<Entity>),
}

impl From<Cursor> for ResumePoint {
    fn from(cursor: Cursor) -> Self {
        Self::Cursor(cursor)
    }
}

impl From<String> for ResumePoint {
    fn from(token: String) -> Self {
        Self::Encoded(token)
    }
}

impl From<&str> for ResumePoint {
    fn from(token: &str) -> Self {
        Self::Encoded(token.to_string())
    }
}

impl From<Entity> for ResumePoint {
    fn from(entity: Entity) -> Self {
        Self::Entity(Box::new(entity))
    }
}

impl From<&Entity> for ResumePoint {
    fn from(entity: &Entity) -> Self {
        Self::Entity(Box::new(entity.clone()))
    }
}
