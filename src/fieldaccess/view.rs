use std::collections::HashSet;
use std::fmt;
use std::sync::Arc;

use tracing::debug;

use super::relationship::{connect, target_node};
use crate::context::GraphContext;
use crate::entity::Entity;
use crate::error::{GraphError, Result};
use crate::model::{Direction, NodeId, RecordId, Relationship};
use crate::schema::{EntityType, FieldDescriptor};

/// Live view over the entities related to a node through one field.
///
/// Nothing is cached: every call reads the current relationships, and
/// [`add`](Self::add) / [`remove`](Self::remove) create or delete
/// relationships immediately.
#[derive(Clone)]
pub struct RelatedEntities {
    ctx: Arc<GraphContext>,
    node: NodeId,
    field: Arc<FieldDescriptor>,
    rel_type: String,
    direction: Direction,
    target: Arc<EntityType>,
    read_only: bool,
}

impl RelatedEntities {
    pub(crate) fn new(
        ctx: Arc<GraphContext>,
        node: NodeId,
        field: Arc<FieldDescriptor>,
        rel_type: String,
        direction: Direction,
        target: Arc<EntityType>,
        read_only: bool,
    ) -> Self {
        Self {
            ctx,
            node,
            field,
            rel_type,
            direction,
            target,
            read_only,
        }
    }

    /// Whether mutation is rejected.
    pub fn is_read_only(&self) -> bool {
        self.read_only
    }

    fn edges(&self) -> Result<Vec<Relationship>> {
        self.ctx
            .store()
            .relationships(self.node, Some(&self.rel_type), self.direction)
    }

    fn nodes(&self) -> Result<Vec<NodeId>> {
        let mut nodes: Vec<NodeId> = self
            .edges()?
            .iter()
            .map(|rel| rel.other_node(self.node))
            .collect();
        let mut seen = HashSet::new();
        nodes.retain(|node| seen.insert(*node));
        Ok(nodes)
    }

    /// Current members.
    pub fn to_vec(&self) -> Result<Vec<Entity>> {
        self.nodes()?
            .into_iter()
            .map(|node| self.ctx.materialize(RecordId::Node(node), &self.target))
            .collect()
    }

    /// Number of members.
    pub fn len(&self) -> Result<usize> {
        Ok(self.nodes()?.len())
    }

    /// Whether there are no members.
    pub fn is_empty(&self) -> Result<bool> {
        Ok(self.edges()?.is_empty())
    }

    /// Whether `entity` is a member. Unbound entities never are.
    pub fn contains(&self, entity: &Entity) -> Result<bool> {
        let Some(node) = entity.node_id() else {
            return Ok(false);
        };
        Ok(self.nodes()?.contains(&node))
    }

    fn ensure_writable(&self) -> Result<()> {
        if self.read_only {
            return Err(GraphError::usage(format!(
                "{} is read-only",
                self.field.qualified_name()
            )));
        }
        Ok(())
    }

    /// Relates `entity`, binding it first. Returns false if it already was
    /// a member.
    pub fn add(&self, entity: &Entity) -> Result<bool> {
        self.ensure_writable()?;
        let other = target_node(&self.field, &self.target, entity)?;
        if self.nodes()?.contains(&other) {
            return Ok(false);
        }
        connect(
            self.ctx.store(),
            self.node,
            other,
            &self.rel_type,
            self.direction,
        )?;
        Ok(true)
    }

    /// Deletes the relationships to `entity`. Returns false if it was not a
    /// member.
    pub fn remove(&self, entity: &Entity) -> Result<bool> {
        self.ensure_writable()?;
        let Some(other) = entity.node_id() else {
            return Ok(false);
        };
        let mut removed = false;
        for rel in self.edges()? {
            if rel.other_node(self.node) == other {
                self.ctx.store().delete_relationship(rel.id)?;
                debug!(
                rel_id = rel.id.0,
                field = %self.field.qualified_name(),
                "relationship removed"
            );
                removed = true;
            }
        }
        Ok(removed)
    }
}

impl fmt::Debug for RelatedEntities {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("RelatedEntities")
            .field("field", &self.field.qualified_name())
            .field("node", &self.node)
            .field("rel_type", &self.rel_type)
            .field("direction", &self.direction)
            .field("read_only", &self.read_only)
            .finish()
    }
}

/// Live view over the relationship entities attached to a node.
#[derive(Clone)]
pub struct RelationshipEntities {
    ctx: Arc<GraphContext>,
    node: NodeId,
    rel_type: String,
    direction: Direction,
    entity_type: Arc<EntityType>,
}

impl RelationshipEntities {
    pub(crate) fn new(
        ctx: Arc<GraphContext>,
        node: NodeId,
        rel_type: String,
        direction: Direction,
        entity_type: Arc<EntityType>,
    ) -> Self {
        Self {
            ctx,
            node,
            rel_type,
            direction,
            entity_type,
        }
    }

    fn edges(&self) -> Result<Vec<Relationship>> {
        self.ctx
            .store()
            .relationships(self.node, Some(&self.rel_type), self.direction)
    }

    /// Current relationship entities.
    pub fn to_vec(&self) -> Result<Vec<Entity>> {
        self.edges()?
            .into_iter()
            .map(|rel| {
                self.ctx
                    .materialize(RecordId::Relationship(rel.id), &self.entity_type)
            })
            .collect()
    }

    /// Number of relationship entities.
    pub fn len(&self) -> Result<usize> {
        Ok(self.edges()?.len())
    }

    /// Whether there are none.
    pub fn is_empty(&self) -> Result<bool> {
        Ok(self.edges()?.is_empty())
    }
}

impl fmt::Debug for RelationshipEntities {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("RelationshipEntities")
            .field("entity_type", &self.entity_type.name())
            .field("node", &self.node)
            .field("rel_type", &self.rel_type)
            .finish()
    }
}
