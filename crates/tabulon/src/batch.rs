use crate::{
    connection::TableConnection,
    entity::Entity,
    error::Error,
    transport::{BatchOperation, BatchOperationKind, BatchPayload},
};

///
/// Batch
///
/// Ordered set of write operations submitted in one round trip. Operations
/// are applied in the order they were queued; the fluent methods consume
/// and return the batch so queueing chains.
///

#[derive(Clone)]
pub struct Batch {
    connection: TableConnection,
    table: String,
    operations: Vec<BatchOperation>,
}

impl Batch {
    #[must_use]
    pub(crate) const fn new(connection: TableConnection, table: String) -> Self {
        Self {
            connection,
            table,
            operations: Vec::new(),
        }
    }

    #[must_use]
    pub fn table(&self) -> &str {
        &self.table
    }

    /// Retarget subsequently queued operations at another table. Already
    /// queued operations keep their table.
    #[must_use]
    pub fn for_table(mut self, table: impl Into<String>) -> Self {
        self.table = table.into();
        self
    }

    #[must_use]
    pub fn len(&self) -> usize {
        self.operations.len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.operations.is_empty()
    }

    #[must_use]
    pub fn operations(&self) -> &[BatchOperation] {
        &self.operations
    }

    /// Queue every operation from `other`, after this batch's own.
    #[must_use]
    pub fn append(mut self, other: Self) -> Self {
        self.operations.extend(other.operations);
        self
    }

    // ------------------------------------------------------------------
    // Queueing
    // ------------------------------------------------------------------

    #[must_use]
    pub fn insert(self, entity: Entity) -> Self {
        self.push_entity(BatchOperationKind::Insert, entity)
    }

    #[must_use]
    pub fn update(self, entity: Entity) -> Self {
        self.push_entity(BatchOperationKind::Update, entity)
    }

    #[must_use]
    pub fn merge(self, entity: Entity) -> Self {
        self.push_entity(BatchOperationKind::Merge, entity)
    }

    /// Insert-or-replace.
    #[must_use]
    pub fn upsert(self, entity: Entity) -> Self {
        self.push_entity(BatchOperationKind::InsertOrReplace, entity)
    }

    /// Insert-or-merge.
    #[must_use]
    pub fn save(self, entity: Entity) -> Self {
        self.push_entity(BatchOperationKind::InsertOrMerge, entity)
    }

    #[must_use]
    pub fn delete(self, entity: &Entity) -> Self {
        self.delete_keys(entity.partition_key(), entity.row_key())
    }

    #[must_use]
    pub fn delete_keys(mut self, partition_key: &str, row_key: &str) -> Self {
        self.operations.push(BatchOperation {
            kind: BatchOperationKind::Delete,
            table: self.table.clone(),
            payload: BatchPayload::Keys {
                partition_key: partition_key.to_string(),
                row_key: row_key.to_string(),
            },
        });
        self
    }

    #[must_use]
    pub fn insert_many(self, entities: impl IntoIterator<Item = Entity>) -> Self {
        self.push_many(BatchOperationKind::Insert, entities)
    }

    #[must_use]
    pub fn update_many(self, entities: impl IntoIterator<Item = Entity>) -> Self {
        self.push_many(BatchOperationKind::Update, entities)
    }

    #[must_use]
    pub fn merge_many(self, entities: impl IntoIterator<Item = Entity>) -> Self {
        self.push_many(BatchOperationKind::Merge, entities)
    }

    #[must_use]
    pub fn upsert_many(self, entities: impl IntoIterator<Item = Entity>) -> Self {
        self.push_many(BatchOperationKind::InsertOrReplace, entities)
    }

    #[must_use]
    pub fn save_many(self, entities: impl IntoIterator<Item = Entity>) -> Self {
        self.push_many(BatchOperationKind::InsertOrMerge, entities)
    }

    #[must_use]
    pub fn delete_many<'a>(mut self, entities: impl IntoIterator<Item = &'a Entity>) -> Self {
        for entity in entities {
            self = self.delete(entity);
        }
        self
    }

    fn push_entity(mut self, kind: BatchOperationKind, entity: Entity) -> Self {
        self.operations.push(BatchOperation {
            kind,
            table: self.table.clone(),
            payload: BatchPayload::Entity(entity),
        });
        self
    }

    fn push_many(
        mut self,
        kind: BatchOperationKind,
        entities: impl IntoIterator<Item = Entity>,
    ) -> Self {
        for entity in entities {
            self = self.push_entity(kind, entity);
        }
        self
    }

    // ------------------------------------------------------------------
    // Execution
    // ------------------------------------------------------------------

    /// Submit the batch. Returns the entity echoes for operations that
    /// produce one, in queue order.
    pub fn run(&self) -> Result<Vec<Entity>, Error> {
        Ok(self.connection.transport().batch(&self.operations)?)
    }
}
