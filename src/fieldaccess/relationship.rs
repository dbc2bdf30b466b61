use std::sync::Arc;

use tracing::debug;

use super::accessor::{not_writable, AccessContext, FieldAccessor};
use super::view::{RelatedEntities, RelationshipEntities};
use crate::entity::Entity;
use crate::error::{GraphError, Result};
use crate::model::{Direction, NodeId, RecordId};
use crate::schema::{EntityType, FieldDescriptor};
use crate::store::BackingStore;
use crate::value::Value;

/// Node behind `target`, binding it first. Targets that cannot be bound yet
/// or have the wrong type are usage errors.
pub(crate) fn target_node(
    field: &FieldDescriptor,
    expected: &EntityType,
    target: &Entity,
) -> Result<NodeId> {
    if !target.entity_type().is_a(expected.name()) {
        return Err(GraphError::usage(format!(
            "{} expects {}, got {}",
            field.qualified_name(),
            expected.name(),
            target.entity_type().name()
        )));
    }
    let record = target.ensure_bound()?.ok_or_else(|| {
        GraphError::usage(format!(
            "{} cannot point at an entity that is not persisted yet",
            field.qualified_name()
        ))
    })?;
    record.node()
}

/// Creates `rel_type` between `node` and `other` oriented by `direction`.
pub(crate) fn connect(
    store: &dyn BackingStore,
    node: NodeId,
    other: NodeId,
    rel_type: &str,
    direction: Direction,
) -> Result<()> {
    let rel = match direction {
        Direction::Incoming => store.create_relationship(other, node, rel_type)?,
        Direction::Outgoing | Direction::Both => store.create_relationship(node, other, rel_type)?,
    };
    debug!(rel_id = rel.0, rel_type, %direction, "relationship created");
    Ok(())
}

/// At most one related entity along a typed relationship.
#[derive(Debug)]
pub struct SingleRelationshipFieldAccessor {
    field: Arc<FieldDescriptor>,
    rel_type: String,
    direction: Direction,
    target: Arc<EntityType>,
}

impl SingleRelationshipFieldAccessor {
    /// Accessor for `field` yielding `target` entities.
    pub fn new(
        field: Arc<FieldDescriptor>,
        rel_type: String,
        direction: Direction,
        target: Arc<EntityType>,
    ) -> Self {
        Self {
            field,
            rel_type,
            direction,
            target,
        }
    }
}

impl FieldAccessor for SingleRelationshipFieldAccessor {
    fn read(&self, cx: &AccessContext<'_>) -> Result<Value> {
        let node = cx.record.node()?;
        let existing = cx
            .store()
            .relationships(node, Some(&self.rel_type), self.direction)?;
        match existing.first() {
            Some(rel) => {
                let other = RecordId::Node(rel.other_node(node));
                Ok(Value::Entity(cx.ctx.materialize(other, &self.target)?))
            }
            None => Ok(Value::Null),
        }
    }

    fn write(&self, cx: &AccessContext<'_>, value: &Value) -> Result<()> {
        let node = cx.record.node()?;
        let target = match value {
            Value::Null => None,
            Value::Entity(target) => Some(target_node(&self.field, &self.target, target)?),
            other => {
                return Err(GraphError::usage(format!(
                    "{} holds an entity, got {}",
                    self.field.qualified_name(),
                    other.kind_name()
                )))
            }
        };
        if target == Some(node) {
            return Err(GraphError::usage(format!(
                "{} cannot refer to its own entity",
                self.field.qualified_name()
            )));
        }

        let store = cx.store();
        for rel in store.relationships(node, Some(&self.rel_type), self.direction)? {
            store.delete_relationship(rel.id)?;
            debug!(
                rel_id = rel.id.0,
                field = %self.field.qualified_name(),
                "relationship replaced"
            );
        }
        if let Some(other) = target {
            connect(store, node, other, &self.rel_type, self.direction)?;
        }
        Ok(())
    }
}

/// Live collection of related entities.
#[derive(Debug)]
pub struct OneToNRelationshipFieldAccessor {
    field: Arc<FieldDescriptor>,
    rel_type: String,
    direction: Direction,
    target: Arc<EntityType>,
    read_only: bool,
}

impl OneToNRelationshipFieldAccessor {
    /// Accessor for `field`; `read_only` views reject mutation.
    pub fn new(
        field: Arc<FieldDescriptor>,
        rel_type: String,
        direction: Direction,
        target: Arc<EntityType>,
        read_only: bool,
    ) -> Self {
        Self {
            field,
            rel_type,
            direction,
            target,
            read_only,
        }
    }
}

impl FieldAccessor for OneToNRelationshipFieldAccessor {
    fn read(&self, cx: &AccessContext<'_>) -> Result<Value> {
        Ok(Value::Entities(RelatedEntities::new(
            Arc::clone(cx.ctx),
            cx.record.node()?,
            Arc::clone(&self.field),
            self.rel_type.clone(),
            self.direction,
            Arc::clone(&self.target),
            self.read_only,
        )))
    }

    fn write(&self, _cx: &AccessContext<'_>, _value: &Value) -> Result<()> {
        Err(not_writable(&self.field))
    }
}

/// Live collection of relationship entities.
#[derive(Debug)]
pub struct RelationshipEntitiesFieldAccessor {
    field: Arc<FieldDescriptor>,
    rel_type: String,
    direction: Direction,
    entity_type: Arc<EntityType>,
}

impl RelationshipEntitiesFieldAccessor {
    /// Accessor for `field` yielding `entity_type` relationship entities.
    pub fn new(
        field: Arc<FieldDescriptor>,
        rel_type: String,
        direction: Direction,
        entity_type: Arc<EntityType>,
    ) -> Self {
        Self {
            field,
            rel_type,
            direction,
            entity_type,
        }
    }
}

impl FieldAccessor for RelationshipEntitiesFieldAccessor {
    fn read(&self, cx: &AccessContext<'_>) -> Result<Value> {
        Ok(Value::Relationships(RelationshipEntities::new(
            Arc::clone(cx.ctx),
            cx.record.node()?,
            self.rel_type.clone(),
            self.direction,
            Arc::clone(&self.entity_type),
        )))
    }

    fn write(&self, _cx: &AccessContext<'_>, _value: &Value) -> Result<()> {
        Err(not_writable(&self.field))
    }
}

/// Which end of a relationship an end accessor reads.
#[derive(Copy, Clone, Debug, PartialEq, Eq)]
pub enum RelationshipEnd {
    /// The start node.
    Start,
    /// The end node.
    End,
}

/// Reads one endpoint of a relationship entity.
#[derive(Debug)]
pub struct RelationshipEndFieldAccessor {
    field: Arc<FieldDescriptor>,
    end: RelationshipEnd,
    target: Arc<EntityType>,
}

impl RelationshipEndFieldAccessor {
    /// Accessor for `field` reading the given end.
    pub fn new(field: Arc<FieldDescriptor>, end: RelationshipEnd, target: Arc<EntityType>) -> Self {
        Self { field, end, target }
    }
}

impl FieldAccessor for RelationshipEndFieldAccessor {
    fn read(&self, cx: &AccessContext<'_>) -> Result<Value> {
        let rel = cx
            .store()
            .relationship(cx.record.relationship()?)?
            .ok_or(GraphError::NotFound("relationship"))?;
        let node = match self.end {
            RelationshipEnd::Start => rel.start,
            RelationshipEnd::End => rel.end,
        };
        Ok(Value::Entity(
            cx.ctx.materialize(RecordId::Node(node), &self.target)?,
        ))
    }

    fn write(&self, _cx: &AccessContext<'_>, _value: &Value) -> Result<()> {
        Err(not_writable(&self.field))
    }
}
