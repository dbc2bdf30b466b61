use std::collections::{HashSet, VecDeque};
use std::fmt;
use std::sync::Arc;

use serde::{Deserialize, Serialize};

use super::accessor::{not_writable, AccessContext, FieldAccessor};
use crate::context::GraphContext;
use crate::entity::Entity;
use crate::error::Result;
use crate::model::{Direction, NodeId, RecordId};
use crate::schema::{EntityType, FieldDescriptor};
use crate::value::Value;

/// How a traversal walks the graph from its start node.
#[derive(Clone, Debug, Default, PartialEq, Eq, Deserialize, Serialize)]
#[serde(default)]
pub struct TraversalDescription {
    /// Relationship types to follow; empty follows all.
    pub rel_types: Vec<String>,
    /// Direction to follow them in.
    pub direction: Direction,
    /// Maximum number of hops, unbounded when `None`.
    pub max_depth: Option<usize>,
    /// Whether the start node itself is yielded.
    pub include_start: bool,
}

impl TraversalDescription {
    /// Follows every relationship outwards without a depth limit.
    pub fn new() -> Self {
        Self::default()
    }

    /// Adds a relationship type to follow.
    pub fn relationship(mut self, rel_type: impl Into<String>) -> Self {
        self.rel_types.push(rel_type.into());
        self
    }

    /// Sets the direction.
    pub fn direction(mut self, direction: Direction) -> Self {
        self.direction = direction;
        self
    }

    /// Limits the number of hops.
    pub fn max_depth(mut self, depth: usize) -> Self {
        self.max_depth = Some(depth);
        self
    }

    /// Yields the start node too.
    pub fn include_start(mut self, include: bool) -> Self {
        self.include_start = include;
        self
    }
}

/// Lazy breadth-first walk yielding entities of one type.
///
/// Neighbours are only loaded when the node they hang off is popped, so an
/// abandoned traversal costs nothing beyond what was consumed. Nodes whose
/// concrete type is not the requested one are walked through but skipped.
#[derive(Clone)]
pub struct Traversal {
    ctx: Arc<GraphContext>,
    target: Arc<EntityType>,
    description: TraversalDescription,
    queue: VecDeque<(NodeId, usize)>,
    visited: HashSet<NodeId>,
}

impl Traversal {
    pub(crate) fn new(
        ctx: Arc<GraphContext>,
        start: NodeId,
        description: TraversalDescription,
        target: Arc<EntityType>,
    ) -> Self {
        let mut queue = VecDeque::new();
        queue.push_back((start, 0));
        Self {
            ctx,
            target,
            description,
            queue,
            visited: HashSet::from([start]),
        }
    }

    /// Collects the remaining entities.
    pub fn to_vec(self) -> Result<Vec<Entity>> {
        self.collect()
    }

    fn expand(&mut self, node: NodeId, depth: usize) -> Result<()> {
        if self
            .description
            .max_depth
            .is_some_and(|max_depth| depth >= max_depth)
        {
            return Ok(());
        }
        let store = self.ctx.store();
        let mut rels = Vec::new();
        if self.description.rel_types.is_empty() {
            rels.extend(store.relationships(node, None, self.description.direction)?);
        } else {
            for rel_type in &self.description.rel_types {
                rels.extend(store.relationships(
                    node,
                    Some(rel_type),
                    self.description.direction,
                )?);
            }
        }
        for rel in rels {
            let next = rel.other_node(node);
            if self.visited.insert(next) {
                self.queue.push_back((next, depth + 1));
            }
        }
        Ok(())
    }
}

impl Iterator for Traversal {
    type Item = Result<Entity>;

    fn next(&mut self) -> Option<Self::Item> {
        loop {
            let (node, depth) = self.queue.pop_front()?;
            if let Err(err) = self.expand(node, depth) {
                self.queue.clear();
                return Some(Err(err));
            }
            if depth == 0 && !self.description.include_start {
                continue;
            }
            match self.ctx.materialize_as(RecordId::Node(node), &self.target) {
                Ok(Some(entity)) => return Some(Ok(entity)),
                Ok(None) => continue,
                Err(err) => return Some(Err(err)),
            }
        }
    }
}

impl fmt::Debug for Traversal {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Traversal")
            .field("target", &self.target.name())
            .field("description", &self.description)
            .field("pending", &self.queue.len())
            .finish()
    }
}

/// Field yielding a fresh traversal from the owning node on every read.
#[derive(Debug)]
pub struct TraversalFieldAccessor {
    field: Arc<FieldDescriptor>,
    target: Arc<EntityType>,
    description: TraversalDescription,
}

impl TraversalFieldAccessor {
    /// Accessor for `field` yielding `target` entities.
    pub fn new(
        field: Arc<FieldDescriptor>,
        target: Arc<EntityType>,
        description: TraversalDescription,
    ) -> Self {
        Self {
            field,
            target,
            description,
        }
    }
}

impl FieldAccessor for TraversalFieldAccessor {
    fn read(&self, cx: &AccessContext<'_>) -> Result<Value> {
        Ok(Value::Traversal(Traversal::new(
            Arc::clone(cx.ctx),
            cx.record.node()?,
            self.description.clone(),
            Arc::clone(&self.target),
        )))
    }

    fn write(&self, _cx: &AccessContext<'_>, _value: &Value) -> Result<()> {
        Err(not_writable(&self.field))
    }
}
