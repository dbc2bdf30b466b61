use std::fmt;
use std::sync::Arc;

use tracing::info;

use crate::context::GraphContext;
use crate::error::{GraphError, Result};
use crate::fieldaccess::{
    EntityStateAccessor, RelatedEntities, RelationshipEntities, Traversal, TraversalDescription,
};
use crate::model::{Direction, NodeId, RecordId, RelId};
use crate::schema::{EntityKind, EntityType, FieldKind};
use crate::value::Value;

struct EntityInner {
    ctx: Arc<GraphContext>,
    state: EntityStateAccessor,
}

/// Handle to a domain entity.
///
/// Clones share the same state. Several handles created separately for the
/// same record are independent but compare equal, and all of them read and
/// write the shared record directly.
#[derive(Clone)]
pub struct Entity {
    inner: Arc<EntityInner>,
}

impl Entity {
    pub(crate) fn new(ctx: Arc<GraphContext>, entity_type: Arc<EntityType>) -> Result<Self> {
        let state = EntityStateAccessor::new(&ctx, entity_type)?;
        Ok(Self {
            inner: Arc::new(EntityInner { ctx, state }),
        })
    }

    pub(crate) fn bound(
        ctx: Arc<GraphContext>,
        entity_type: Arc<EntityType>,
        record: RecordId,
    ) -> Result<Self> {
        let entity = Self::new(ctx, entity_type)?;
        entity.inner.state.attach(&entity.inner.ctx, record)?;
        Ok(entity)
    }

    /// Type of the entity.
    pub fn entity_type(&self) -> &Arc<EntityType> {
        self.inner.state.entity_type()
    }

    /// Context the entity belongs to.
    pub fn context(&self) -> &Arc<GraphContext> {
        &self.inner.ctx
    }

    /// Per-field state coordinator.
    pub fn state(&self) -> &EntityStateAccessor {
        &self.inner.state
    }

    /// Backing record, once bound.
    pub fn record(&self) -> Option<RecordId> {
        self.inner.state.record()
    }

    /// Whether the entity has a backing record.
    pub fn is_bound(&self) -> bool {
        self.record().is_some()
    }

    /// Backing node, for bound node-backed entities.
    pub fn node_id(&self) -> Option<NodeId> {
        match self.record()? {
            RecordId::Node(node) => Some(node),
            RecordId::Relationship(_) => None,
        }
    }

    /// Backing relationship, for bound relationship entities.
    pub fn relationship_id(&self) -> Option<RelId> {
        match self.record()? {
            RecordId::Relationship(rel) => Some(rel),
            RecordId::Node(_) => None,
        }
    }

    /// Binds the entity if needed; see [`EntityStateAccessor::ensure_bound`].
    pub fn ensure_bound(&self) -> Result<Option<RecordId>> {
        self.inner.state.ensure_bound(&self.inner.ctx)
    }

    /// Reads a field.
    pub fn read(&self, field: &str) -> Result<Value> {
        self.inner.state.read(&self.inner.ctx, field)
    }

    /// Writes a field.
    pub fn write(&self, field: &str, value: impl Into<Value>) -> Result<()> {
        let value = value.into();
        if let (Some(descriptor), Value::Entity(target)) = (self.entity_type().field(field), &value)
        {
            if matches!(descriptor.kind, FieldKind::SingleRelationship(_)) && self == target {
                return Err(GraphError::usage(format!(
                    "{} cannot refer to its own entity",
                    descriptor.qualified_name()
                )));
            }
        }
        self.inner.state.write(&self.inner.ctx, field, value)
    }

    /// Live view of a relationship collection field.
    pub fn related(&self, field: &str) -> Result<RelatedEntities> {
        self.read(field)?.into_entities().ok_or_else(|| {
            GraphError::usage(format!(
                "{}.{field} is not a relationship collection of a bound entity",
                self.entity_type().name()
            ))
        })
    }

    /// Live view of a relationship-entity collection field.
    pub fn relationship_entities(&self, field: &str) -> Result<RelationshipEntities> {
        self.read(field)?.into_relationships().ok_or_else(|| {
            GraphError::usage(format!(
                "{}.{field} is not a relationship-entity collection of a bound entity",
                self.entity_type().name()
            ))
        })
    }

    /// Fresh traversal of a traversal field.
    pub fn traversal(&self, field: &str) -> Result<Traversal> {
        self.read(field)?.into_traversal().ok_or_else(|| {
            GraphError::usage(format!(
                "{}.{field} is not a traversal field of a bound entity",
                self.entity_type().name()
            ))
        })
    }

    fn bound_node(&self, purpose: &str) -> Result<NodeId> {
        let record = if self.inner.ctx.in_transaction() {
            self.ensure_bound()?
        } else {
            self.record()
        };
        record
            .ok_or_else(|| GraphError::usage(format!("{self} must be persisted before {purpose}")))?
            .node()
    }

    fn relationship_type(&self, entity_type: &str) -> Result<Arc<EntityType>> {
        let entity_type = self.inner.ctx.entity_type(entity_type)?;
        if entity_type.kind() != EntityKind::Relationship {
            return Err(GraphError::usage(format!(
                "{} is not a relationship entity type",
                entity_type.name()
            )));
        }
        Ok(entity_type)
    }

    /// Creates a `rel_type` relationship to `target` and returns it as a
    /// relationship entity of `entity_type`.
    pub fn relate_to(&self, target: &Entity, rel_type: &str, entity_type: &str) -> Result<Entity> {
        let entity_type = self.relationship_type(entity_type)?;
        let ctx = &self.inner.ctx;
        if !ctx.in_transaction() {
            return Err(GraphError::not_in_transaction(format!(
                "relate {self} to {target}"
            )));
        }
        let start = self.bound_node("relate_to")?;
        let end = target.bound_node("relate_to")?;
        let record = RecordId::Relationship(ctx.store().create_relationship(start, end, rel_type)?);
        ctx.post_entity_creation(record, &entity_type)?;
        Entity::bound(Arc::clone(ctx), entity_type, record)
    }

    /// Existing `rel_type` relationship to `target` as a relationship entity.
    pub fn relationship_to(
        &self,
        target: &Entity,
        rel_type: &str,
        entity_type: &str,
    ) -> Result<Option<Entity>> {
        let entity_type = self.relationship_type(entity_type)?;
        let (Some(start), Some(end)) = (self.node_id(), target.node_id()) else {
            return Ok(None);
        };
        let ctx = &self.inner.ctx;
        let found = ctx
            .store()
            .relationships(start, Some(rel_type), Direction::Outgoing)?
            .into_iter()
            .find(|rel| rel.end == end);
        found
            .map(|rel| ctx.materialize(RecordId::Relationship(rel.id), &entity_type))
            .transpose()
    }

    /// Lazy traversal from this entity yielding `target_type` entities.
    pub fn traverse(
        &self,
        target_type: &str,
        description: TraversalDescription,
    ) -> Result<Traversal> {
        let target = self.inner.ctx.entity_type(target_type)?;
        let start = self.bound_node("traversing")?;
        Ok(Traversal::new(
            Arc::clone(&self.inner.ctx),
            start,
            description,
            target,
        ))
    }

    /// Deletes the backing record; nodes take their relationships and index
    /// entries with them.
    pub fn remove(&self) -> Result<()> {
        let record = self
            .record()
            .ok_or_else(|| GraphError::usage(format!("{self} is not persisted")))?;
        let ctx = &self.inner.ctx;
        if !ctx.in_transaction() {
            return Err(GraphError::not_in_transaction(format!("remove {self}")));
        }
        match record {
            RecordId::Node(node) => ctx.store().delete_node(node)?,
            RecordId::Relationship(rel) => ctx.store().delete_relationship(rel)?,
        }
        info!(%record, entity_type = %self.entity_type().name(), "entity removed");
        Ok(())
    }
}

impl PartialEq for Entity {
    fn eq(&self, other: &Self) -> bool {
        if Arc::ptr_eq(&self.inner, &other.inner) {
            return true;
        }
        match (self.record(), other.record()) {
            (Some(left), Some(right)) => left == right,
            _ => false,
        }
    }
}

impl fmt::Display for Entity {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self.record() {
            Some(record) => write!(f, "{}({record})", self.entity_type().name()),
            None => write!(f, "{}(unbound)", self.entity_type().name()),
        }
    }
}

impl fmt::Debug for Entity {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        fmt::Display::fmt(self, f)
    }
}
