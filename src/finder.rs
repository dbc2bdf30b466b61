//! Index-backed lookups of entities by type, id and property value.

use std::sync::Arc;

use crate::context::GraphContext;
use crate::entity::Entity;
use crate::error::Result;
use crate::fieldaccess::{Traversal, TraversalDescription};
use crate::model::{NodeId, PropertyValue, RecordId, RelId};
use crate::schema::{EntityKind, EntityType};

/// Finds entities of one type, subtypes included.
#[derive(Debug, Clone)]
pub struct Finder {
    ctx: Arc<GraphContext>,
    entity_type: Arc<EntityType>,
}

impl Finder {
    pub(crate) fn new(ctx: Arc<GraphContext>, entity_type: Arc<EntityType>) -> Self {
        Self { ctx, entity_type }
    }

    /// Type searched for.
    pub fn entity_type(&self) -> &Arc<EntityType> {
        &self.entity_type
    }

    fn default_index(&self) -> &str {
        match self.entity_type.kind() {
            EntityKind::Relationship => &self.ctx.config().relationship_index,
            _ => &self.ctx.config().node_index,
        }
    }

    fn materialize_all(&self, records: Vec<RecordId>) -> Result<Vec<Entity>> {
        let mut found = Vec::with_capacity(records.len());
        for record in records {
            if let Some(entity) = self.ctx.materialize_as(record, &self.entity_type)? {
                found.push(entity);
            }
        }
        Ok(found)
    }

    fn typed_records(&self) -> Result<Vec<RecordId>> {
        let config = self.ctx.config();
        self.ctx.store().indexed(
            &config.type_index,
            self.entity_type.name(),
            &PropertyValue::Bool(true),
        )
    }

    /// Entity with the given record id, or `None` if there is no such
    /// record or it is of an unrelated type.
    pub fn find_by_id(&self, id: u64) -> Result<Option<Entity>> {
        let record = match self.entity_type.kind() {
            EntityKind::Relationship => RecordId::Relationship(RelId(id)),
            _ => RecordId::Node(NodeId(id)),
        };
        if !self.ctx.store().record_exists(record)? {
            return Ok(None);
        }
        self.ctx.materialize_as(record, &self.entity_type)
    }

    /// Every entity of the type.
    pub fn find_all(&self) -> Result<Vec<Entity>> {
        let records = self.typed_records()?;
        self.materialize_all(records)
    }

    /// Number of entities of the type.
    pub fn count(&self) -> Result<usize> {
        Ok(self.typed_records()?.len())
    }

    /// Single entity indexed under `key = value`. The index defaults to the
    /// node or relationship index of the configuration.
    pub fn find_by_property_value(
        &self,
        index: Option<&str>,
        key: &str,
        value: impl Into<PropertyValue>,
    ) -> Result<Option<Entity>> {
        let index = index.unwrap_or_else(|| self.default_index());
        match self.ctx.store().single_indexed(index, key, &value.into())? {
            Some(record) => self.ctx.materialize_as(record, &self.entity_type),
            None => Ok(None),
        }
    }

    /// Every entity indexed under `key = value`.
    pub fn find_all_by_property_value(
        &self,
        index: Option<&str>,
        key: &str,
        value: impl Into<PropertyValue>,
    ) -> Result<Vec<Entity>> {
        let index = index.unwrap_or_else(|| self.default_index());
        let records = self.ctx.store().indexed(index, key, &value.into())?;
        self.materialize_all(records)
    }

    /// Entities of the type reachable from `start`.
    pub fn find_all_by_traversal(
        &self,
        start: &Entity,
        description: TraversalDescription,
    ) -> Result<Traversal> {
        start.traverse(self.entity_type.name(), description)
    }
}
