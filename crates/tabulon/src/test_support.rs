//! In-memory [`TableTransport`] used across the crate's tests.

use crate::{
    cursor::{Cursor, Location},
    entity::Entity,
    filter::{CompareOp, Filter},
    transport::{
        BatchOperation, BatchOperationKind, BatchPayload, EntityPage, EntityQuery, ServiceError,
        TableAcl, TableInfo, TableTransport, error_code,
    },
    value::Value,
};
use chrono::Utc;
use std::{
    cmp::Ordering,
    collections::{BTreeMap, VecDeque},
    sync::Mutex,
};

type Rows = BTreeMap<(String, String), Entity>;

#[derive(Default)]
struct State {
    tables: BTreeMap<String, Rows>,
    acls: BTreeMap<String, TableAcl>,
    page_size: Option<usize>,
    failures: BTreeMap<&'static str, VecDeque<ServiceError>>,
    calls: BTreeMap<&'static str, usize>,
    etag_seq: u64,
    last_batch: Vec<BatchOperationKind>,
}

///
/// MemoryTransport
///
/// Honors the service's observable contract closely enough for the
/// connection and query layers: missing tables fail with `TableNotFound`,
/// duplicate inserts with `EntityAlreadyExists`, writes stamp a timestamp
/// and a fresh version token, and queries page over scan windows of
/// `page_size` rows with a continuation cursor (a filter is evaluated
/// within the window, so fully filtered windows page as empty, like the
/// real service). Failures can be queued per method to exercise the
/// retry paths, and per-method call counts are recorded.
///

#[derive(Default)]
pub(crate) struct MemoryTransport {
    state: Mutex<State>,
}

impl MemoryTransport {
    pub(crate) fn new() -> Self {
        Self::default()
    }

    pub(crate) fn with_tables<'a>(tables: impl IntoIterator<Item = &'a str>) -> Self {
        let transport = Self::new();
        {
            let mut state = transport.lock();
            for table in tables {
                state.tables.insert(table.to_string(), Rows::new());
            }
        }
        transport
    }

    pub(crate) fn set_page_size(&self, page_size: usize) {
        self.lock().page_size = Some(page_size);
    }

    /// Queue `error` as the next outcome of `method`, ahead of the real
    /// behavior. Multiple queued errors fail successive calls in order.
    pub(crate) fn queue_failure(&self, method: &'static str, error: ServiceError) {
        self.lock()
            .failures
            .entry(method)
            .or_default()
            .push_back(error);
    }

    pub(crate) fn calls(&self, method: &'static str) -> usize {
        self.lock().calls.get(method).copied().unwrap_or(0)
    }

    pub(crate) fn entity_count(&self, table: &str) -> usize {
        self.lock().tables.get(table).map_or(0, Rows::len)
    }

    pub(crate) fn entity(&self, table: &str, partition_key: &str, row_key: &str) -> Option<Entity> {
        self.lock()
            .tables
            .get(table)?
            .get(&(partition_key.to_string(), row_key.to_string()))
            .cloned()
    }

    pub(crate) fn has_table(&self, table: &str) -> bool {
        self.lock().tables.contains_key(table)
    }

    pub(crate) fn last_batch(&self) -> Vec<BatchOperationKind> {
        self.lock().last_batch.clone()
    }

    fn lock(&self) -> std::sync::MutexGuard<'_, State> {
        self.state.lock().unwrap()
    }
}

impl State {
    fn record(&mut self, method: &'static str) -> Result<(), ServiceError> {
        *self.calls.entry(method).or_insert(0) += 1;
        if let Some(queue) = self.failures.get_mut(method)
            && let Some(error) = queue.pop_front()
        {
            return Err(error);
        }

        Ok(())
    }

    fn rows(&self, table: &str) -> Result<&Rows, ServiceError> {
        self.tables.get(table).ok_or_else(|| table_not_found(table))
    }

    fn rows_mut(&mut self, table: &str) -> Result<&mut Rows, ServiceError> {
        self.tables
            .get_mut(table)
            .ok_or_else(|| table_not_found(table))
    }

    fn stamp(&mut self, entity: &mut Entity) -> String {
        self.etag_seq += 1;
        let etag = format!("W/\"{}\"", self.etag_seq);
        entity.set_etag(etag.clone());
        entity.set_attribute("Timestamp", Value::DateTime(Utc::now()));
        etag
    }

    fn apply(&mut self, operation: &BatchOperation) -> Result<Option<Entity>, ServiceError> {
        let table = operation.table.clone();
        match (&operation.kind, &operation.payload) {
            (BatchOperationKind::Insert, BatchPayload::Entity(entity)) => {
                let mut stored = entity.clone();
                self.stamp(&mut stored);
                let rows = self.rows_mut(&table)?;
                let key = (stored.partition_key().to_string(), stored.row_key().to_string());
                if rows.contains_key(&key) {
                    return Err(ServiceError::with_code(
                        409,
                        error_code::ENTITY_ALREADY_EXISTS,
                        "entity already exists",
                    ));
                }
                rows.insert(key, stored.clone());
                Ok(Some(stored))
            }
            (BatchOperationKind::Update, BatchPayload::Entity(entity)) => {
                let mut stored = entity.clone();
                self.stamp(&mut stored);
                let rows = self.rows_mut(&table)?;
                let key = (stored.partition_key().to_string(), stored.row_key().to_string());
                if !rows.contains_key(&key) {
                    return Err(resource_not_found());
                }
                rows.insert(key, stored);
                Ok(None)
            }
            (BatchOperationKind::Merge, BatchPayload::Entity(entity)) => {
                let mut patch = entity.clone();
                self.stamp(&mut patch);
                let rows = self.rows_mut(&table)?;
                let key = (patch.partition_key().to_string(), patch.row_key().to_string());
                let Some(existing) = rows.get_mut(&key) else {
                    return Err(resource_not_found());
                };
                existing.load(&patch);
                Ok(None)
            }
            (BatchOperationKind::InsertOrReplace, BatchPayload::Entity(entity)) => {
                let mut stored = entity.clone();
                self.stamp(&mut stored);
                let rows = self.rows_mut(&table)?;
                let key = (stored.partition_key().to_string(), stored.row_key().to_string());
                rows.insert(key, stored);
                Ok(None)
            }
            (BatchOperationKind::InsertOrMerge, BatchPayload::Entity(entity)) => {
                let mut patch = entity.clone();
                self.stamp(&mut patch);
                let rows = self.rows_mut(&table)?;
                let key = (patch.partition_key().to_string(), patch.row_key().to_string());
                match rows.get_mut(&key) {
                    Some(existing) => {
                        existing.load(&patch);
                    }
                    None => {
                        rows.insert(key, patch);
                    }
                }
                Ok(None)
            }
            (
                BatchOperationKind::Delete,
                BatchPayload::Keys {
                    partition_key,
                    row_key,
                },
            ) => {
                let rows = self.rows_mut(&table)?;
                let key = (partition_key.clone(), row_key.clone());
                if rows.remove(&key).is_none() {
                    return Err(resource_not_found());
                }
                Ok(None)
            }
            _ => Err(ServiceError::new(400, "malformed batch operation")),
        }
    }
}

fn table_not_found(table: &str) -> ServiceError {
    ServiceError::with_code(
        404,
        error_code::TABLE_NOT_FOUND,
        format!("table {table} not found"),
    )
}

fn resource_not_found() -> ServiceError {
    ServiceError::with_code(404, error_code::RESOURCE_NOT_FOUND, "entity not found")
}

/// Minimal filter evaluation: property-to-constant comparisons with the
/// boolean connectives. Raw fragments match everything.
fn eval(filter: &Filter, entity: &Entity) -> bool {
    match filter {
        Filter::And(left, right) => eval(left, entity) && eval(right, entity),
        Filter::Or(left, right) => eval(left, entity) || eval(right, entity),
        Filter::Not(inner) => !eval(inner, entity),
        Filter::Compare { op, left, right } => {
            let (Filter::Property(name), Filter::Constant { value, .. }) =
                (left.as_ref(), right.as_ref())
            else {
                return true;
            };
            let Some(actual) = entity.get_attribute(name) else {
                return false;
            };
            compare(&actual, value).is_some_and(|ordering| match op {
                CompareOp::Lt => ordering == Ordering::Less,
                CompareOp::Le => ordering != Ordering::Greater,
                CompareOp::Gt => ordering == Ordering::Greater,
                CompareOp::Ge => ordering != Ordering::Less,
                CompareOp::Ne => ordering != Ordering::Equal,
                CompareOp::Eq => ordering == Ordering::Equal,
            })
        }
        _ => true,
    }
}

fn compare(left: &Value, right: &Value) -> Option<Ordering> {
    if let (Some(l), Some(r)) = (numeric(left), numeric(right)) {
        return l.partial_cmp(&r);
    }
    match (left, right) {
        (Value::Str(l), Value::Str(r)) => Some(l.cmp(r)),
        (Value::Bool(l), Value::Bool(r)) => Some(l.cmp(r)),
        (Value::DateTime(l), Value::DateTime(r)) => Some(l.cmp(r)),
        (Value::Guid(l), Value::Guid(r)) => Some(l.cmp(r)),
        (Value::Binary(l), Value::Binary(r)) => Some(l.cmp(r)),
        _ => None,
    }
}

#[expect(clippy::cast_precision_loss)]
fn numeric(value: &Value) -> Option<f64> {
    match value {
        Value::Int32(n) => Some(f64::from(*n)),
        Value::Int64(n) => Some(*n as f64),
        Value::Double(n) => Some(*n),
        _ => None,
    }
}

impl TableTransport for MemoryTransport {
    fn create_table(&self, table: &str) -> Result<(), ServiceError> {
        let mut state = self.lock();
        state.record("create_table")?;
        if state.tables.contains_key(table) {
            return Err(ServiceError::with_code(
                409,
                error_code::TABLE_ALREADY_EXISTS,
                "table already exists",
            ));
        }
        state.tables.insert(table.to_string(), Rows::new());
        Ok(())
    }

    fn delete_table(&self, table: &str) -> Result<(), ServiceError> {
        let mut state = self.lock();
        state.record("delete_table")?;
        if state.tables.remove(table).is_none() {
            return Err(table_not_found(table));
        }
        state.acls.remove(table);
        Ok(())
    }

    fn get_table(&self, table: &str) -> Result<TableInfo, ServiceError> {
        let mut state = self.lock();
        state.record("get_table")?;
        state.rows(table)?;
        Ok(TableInfo {
            name: table.to_string(),
        })
    }

    fn query_tables(&self, filter: Option<&Filter>) -> Result<Vec<TableInfo>, ServiceError> {
        let mut state = self.lock();
        state.record("query_tables")?;
        let wanted = filter.and_then(|f| {
            if let Filter::Compare { op: CompareOp::Eq, left, right } = f
                && let Filter::Property(name) = left.as_ref()
                && name == "TableName"
                && let Filter::Constant { value: Value::Str(s), .. } = right.as_ref()
            {
                Some(s.clone())
            } else {
                None
            }
        });
        Ok(state
            .tables
            .keys()
            .filter(|name| wanted.as_ref().is_none_or(|w| *name == w))
            .map(|name| TableInfo { name: name.clone() })
            .collect())
    }

    fn query_entities(&self, query: &EntityQuery) -> Result<EntityPage, ServiceError> {
        let mut state = self.lock();
        state.record("query_entities")?;
        let page_size = state.page_size;
        let rows = state.rows(&query.table)?;

        let resume = (!query.continuation.is_sentinel()).then(|| {
            (
                query.continuation.next_partition_key().to_string(),
                query.continuation.next_row_key().to_string(),
            )
        });

        let scanned: Vec<&Entity> = rows
            .iter()
            .filter(|(key, _)| {
                resume
                    .as_ref()
                    .is_none_or(|after| (&key.0, &key.1) > (&after.0, &after.1))
            })
            .map(|(_, entity)| entity)
            .collect();

        let mut take = query.top as usize;
        if let Some(page_size) = page_size {
            take = take.min(page_size);
        }

        // scan-window paging: the filter applies within the window, so a
        // window with no matches yields an empty page that still carries a
        // continuation
        let window = &scanned[..take.min(scanned.len())];
        let entities: Vec<Entity> = window
            .iter()
            .filter(|entity| query.filter.as_ref().is_none_or(|f| eval(f, entity)))
            .map(|entity| (*entity).clone())
            .collect();
        let continuation = if scanned.len() > window.len() {
            window.last().map_or_else(Cursor::sentinel, |last| {
                Cursor::from_entity(last, &query.table, Location::PrimaryOnly)
            })
        } else {
            Cursor::sentinel()
        };

        Ok(EntityPage {
            entities,
            continuation,
        })
    }

    fn get_entity(
        &self,
        table: &str,
        partition_key: &str,
        row_key: &str,
    ) -> Result<Entity, ServiceError> {
        let mut state = self.lock();
        state.record("get_entity")?;
        state
            .rows(table)?
            .get(&(partition_key.to_string(), row_key.to_string()))
            .cloned()
            .ok_or_else(resource_not_found)
    }

    fn insert_entity(&self, table: &str, entity: &Entity) -> Result<Entity, ServiceError> {
        let mut state = self.lock();
        state.record("insert_entity")?;
        state
            .apply(&BatchOperation {
                kind: BatchOperationKind::Insert,
                table: table.to_string(),
                payload: BatchPayload::Entity(entity.clone()),
            })?
            .ok_or_else(|| ServiceError::new(500, "insert produced no echo"))
    }

    fn merge_entity(&self, table: &str, entity: &Entity) -> Result<String, ServiceError> {
        let mut state = self.lock();
        state.record("merge_entity")?;
        state.apply(&BatchOperation {
            kind: BatchOperationKind::Merge,
            table: table.to_string(),
            payload: BatchPayload::Entity(entity.clone()),
        })?;
        Ok(format!("W/\"{}\"", state.etag_seq))
    }

    fn update_entity(&self, table: &str, entity: &Entity) -> Result<String, ServiceError> {
        let mut state = self.lock();
        state.record("update_entity")?;
        state.apply(&BatchOperation {
            kind: BatchOperationKind::Update,
            table: table.to_string(),
            payload: BatchPayload::Entity(entity.clone()),
        })?;
        Ok(format!("W/\"{}\"", state.etag_seq))
    }

    fn upsert_entity(&self, table: &str, entity: &Entity) -> Result<String, ServiceError> {
        let mut state = self.lock();
        state.record("upsert_entity")?;
        state.apply(&BatchOperation {
            kind: BatchOperationKind::InsertOrReplace,
            table: table.to_string(),
            payload: BatchPayload::Entity(entity.clone()),
        })?;
        Ok(format!("W/\"{}\"", state.etag_seq))
    }

    fn insert_or_merge_entity(
        &self,
        table: &str,
        entity: &Entity,
    ) -> Result<String, ServiceError> {
        let mut state = self.lock();
        state.record("insert_or_merge_entity")?;
        state.apply(&BatchOperation {
            kind: BatchOperationKind::InsertOrMerge,
            table: table.to_string(),
            payload: BatchPayload::Entity(entity.clone()),
        })?;
        Ok(format!("W/\"{}\"", state.etag_seq))
    }

    fn delete_entity(
        &self,
        table: &str,
        partition_key: &str,
        row_key: &str,
    ) -> Result<(), ServiceError> {
        let mut state = self.lock();
        state.record("delete_entity")?;
        state.apply(&BatchOperation {
            kind: BatchOperationKind::Delete,
            table: table.to_string(),
            payload: BatchPayload::Keys {
                partition_key: partition_key.to_string(),
                row_key: row_key.to_string(),
            },
        })?;
        Ok(())
    }

    fn get_table_acl(&self, table: &str) -> Result<TableAcl, ServiceError> {
        let mut state = self.lock();
        state.record("get_table_acl")?;
        state.rows(table)?;
        Ok(state.acls.get(table).cloned().unwrap_or_default())
    }

    fn set_table_acl(&self, table: &str, acl: &TableAcl) -> Result<(), ServiceError> {
        let mut state = self.lock();
        state.record("set_table_acl")?;
        state.rows(table)?;
        state.acls.insert(table.to_string(), acl.clone());
        Ok(())
    }

    fn batch(&self, operations: &[BatchOperation]) -> Result<Vec<Entity>, ServiceError> {
        let mut state = self.lock();
        state.record("batch")?;
        state.last_batch = operations.iter().map(|op| op.kind).collect();

        let mut echoes = Vec::new();
        for operation in operations {
            if let Some(echo) = state.apply(operation)? {
                echoes.push(echo);
            }
        }

        Ok(echoes)
    }
}
