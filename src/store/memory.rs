use std::collections::{BTreeMap, BTreeSet};

use parking_lot::Mutex;
use serde::Serialize;
use tracing::{debug, trace};

use super::index::PropertyIndexes;
use super::{BackingStore, TxId};
use crate::error::{GraphError, Result};
use crate::model::{Direction, NodeId, PropertyValue, RecordId, RelId, Relationship};

#[derive(Debug, Clone, Default)]
struct NodeRecord {
    properties: BTreeMap<String, PropertyValue>,
    outgoing: BTreeSet<RelId>,
    incoming: BTreeSet<RelId>,
}

#[derive(Debug, Clone)]
struct RelationshipRecord {
    start: NodeId,
    end: NodeId,
    rel_type: String,
    properties: BTreeMap<String, PropertyValue>,
}

#[derive(Debug, Clone)]
struct GraphState {
    next_node_id: u64,
    next_rel_id: u64,
    nodes: BTreeMap<NodeId, NodeRecord>,
    relationships: BTreeMap<RelId, RelationshipRecord>,
    indexes: PropertyIndexes,
}

impl Default for GraphState {
    fn default() -> Self {
        Self {
            next_node_id: 1,
            next_rel_id: 1,
            nodes: BTreeMap::new(),
            relationships: BTreeMap::new(),
            indexes: PropertyIndexes::default(),
        }
    }
}

#[derive(Debug)]
struct ActiveTx {
    id: TxId,
    snapshot: GraphState,
}

#[derive(Debug)]
struct Inner {
    state: GraphState,
    active: Option<ActiveTx>,
    next_tx_id: TxId,
}

/// Counts reported by [`MemoryGraph::stats`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct GraphStats {
    /// Live nodes.
    pub nodes: usize,
    /// Live relationships.
    pub relationships: usize,
    /// Index entries across all indexes.
    pub index_entries: usize,
}

/// In-memory graph store.
///
/// One transaction may be active at a time. Rollback restores the snapshot
/// taken when the transaction began, so uncommitted records, properties and
/// index entries disappear together.
#[derive(Debug)]
pub struct MemoryGraph {
    inner: Mutex<Inner>,
}

impl Default for MemoryGraph {
    fn default() -> Self {
        Self::new()
    }
}

impl MemoryGraph {
    /// Creates an empty graph.
    pub fn new() -> Self {
        Self {
            inner: Mutex::new(Inner {
                state: GraphState::default(),
                active: None,
                next_tx_id: 1,
            }),
        }
    }

    /// Current record and index counts.
    pub fn stats(&self) -> GraphStats {
        let inner = self.inner.lock();
        GraphStats {
            nodes: inner.state.nodes.len(),
            relationships: inner.state.relationships.len(),
            index_entries: inner.state.indexes.len(),
        }
    }

    fn read<T>(&self, f: impl FnOnce(&GraphState) -> Result<T>) -> Result<T> {
        let inner = self.inner.lock();
        f(&inner.state)
    }

    fn mutate<T>(
        &self,
        operation: &str,
        f: impl FnOnce(&mut GraphState) -> Result<T>,
    ) -> Result<T> {
        let mut inner = self.inner.lock();
        if inner.active.is_none() {
            return Err(GraphError::not_in_transaction(operation));
        }
        f(&mut inner.state)
    }
}

impl GraphState {
    fn node(&self, id: NodeId) -> Result<&NodeRecord> {
        self.nodes.get(&id).ok_or(GraphError::NotFound("node"))
    }

    fn node_mut(&mut self, id: NodeId) -> Result<&mut NodeRecord> {
        self.nodes.get_mut(&id).ok_or(GraphError::NotFound("node"))
    }

    fn rel(&self, id: RelId) -> Result<&RelationshipRecord> {
        self.relationships
            .get(&id)
            .ok_or(GraphError::NotFound("relationship"))
    }

    fn properties(&self, record: RecordId) -> Result<&BTreeMap<String, PropertyValue>> {
        match record {
            RecordId::Node(id) => Ok(&self.node(id)?.properties),
            RecordId::Relationship(id) => Ok(&self.rel(id)?.properties),
        }
    }

    fn properties_mut(
        &mut self,
        record: RecordId,
    ) -> Result<&mut BTreeMap<String, PropertyValue>> {
        match record {
            RecordId::Node(id) => Ok(&mut self.node_mut(id)?.properties),
            RecordId::Relationship(id) => self
                .relationships
                .get_mut(&id)
                .map(|rel| &mut rel.properties)
                .ok_or(GraphError::NotFound("relationship")),
        }
    }

    fn exists(&self, record: RecordId) -> bool {
        match record {
            RecordId::Node(id) => self.nodes.contains_key(&id),
            RecordId::Relationship(id) => self.relationships.contains_key(&id),
        }
    }

    fn remove_relationship(&mut self, id: RelId) -> Result<()> {
        let rel = self
            .relationships
            .remove(&id)
            .ok_or(GraphError::NotFound("relationship"))?;
        if let Some(start) = self.nodes.get_mut(&rel.start) {
            start.outgoing.remove(&id);
        }
        if let Some(end) = self.nodes.get_mut(&rel.end) {
            end.incoming.remove(&id);
        }
        self.indexes.remove_record(RecordId::Relationship(id));
        Ok(())
    }
}

fn to_relationship(id: RelId, record: &RelationshipRecord) -> Relationship {
    Relationship {
        id,
        start: record.start,
        end: record.end,
        rel_type: record.rel_type.clone(),
    }
}

impl BackingStore for MemoryGraph {
    fn is_transaction_active(&self) -> bool {
        self.inner.lock().active.is_some()
    }

    fn begin_transaction(&self) -> Result<TxId> {
        let mut inner = self.inner.lock();
        if let Some(active) = &inner.active {
            return Err(GraphError::InvalidArgument(format!(
                "transaction {} is already active",
                active.id
            )));
        }
        let id = inner.next_tx_id;
        inner.next_tx_id += 1;
        let snapshot = inner.state.clone();
        inner.active = Some(ActiveTx { id, snapshot });
        Ok(id)
    }

    fn commit_transaction(&self, tx: TxId) -> Result<()> {
        let mut inner = self.inner.lock();
        if inner.active.as_ref().is_some_and(|active| active.id == tx) {
            inner.active = None;
            Ok(())
        } else {
            Err(GraphError::InvalidArgument(format!(
                "transaction {tx} is not active"
            )))
        }
    }

    fn rollback_transaction(&self, tx: TxId) -> Result<()> {
        let mut inner = self.inner.lock();
        match inner.active.take() {
            Some(active) if active.id == tx => {
                inner.state = active.snapshot;
                Ok(())
            }
            other => {
                inner.active = other;
                Err(GraphError::InvalidArgument(format!(
                    "transaction {tx} is not active"
                )))
            }
        }
    }

    fn create_node(&self) -> Result<NodeId> {
        self.mutate("create node", |state| {
            let id = NodeId(state.next_node_id);
            state.next_node_id += 1;
            state.nodes.insert(id, NodeRecord::default());
            trace!(node = id.0, "node created");
            Ok(id)
        })
    }

    fn create_relationship(&self, start: NodeId, end: NodeId, rel_type: &str) -> Result<RelId> {
        self.mutate("create relationship", |state| {
            state.node(start)?;
            state.node(end)?;
            let id = RelId(state.next_rel_id);
            state.next_rel_id += 1;
            state.relationships.insert(
                id,
                RelationshipRecord {
                    start,
                    end,
                    rel_type: rel_type.to_string(),
                    properties: BTreeMap::new(),
                },
            );
            state.node_mut(start)?.outgoing.insert(id);
            state.node_mut(end)?.incoming.insert(id);
            trace!(rel = id.0, start = start.0, end = end.0, rel_type, "relationship created");
            Ok(id)
        })
    }

    fn delete_node(&self, node: NodeId) -> Result<()> {
        self.mutate("delete node", |state| {
            let record = state.node(node)?;
            let attached: Vec<RelId> = record
                .outgoing
                .iter()
                .chain(record.incoming.iter())
                .copied()
                .collect();
            for rel in attached {
                if state.relationships.contains_key(&rel) {
                    state.remove_relationship(rel)?;
                }
            }
            state.nodes.remove(&node);
            state.indexes.remove_record(RecordId::Node(node));
            debug!(node = node.0, "node deleted");
            Ok(())
        })
    }

    fn delete_relationship(&self, rel: RelId) -> Result<()> {
        self.mutate("delete relationship", |state| state.remove_relationship(rel))
    }

    fn record_exists(&self, record: RecordId) -> Result<bool> {
        self.read(|state| Ok(state.exists(record)))
    }

    fn relationship(&self, rel: RelId) -> Result<Option<Relationship>> {
        self.read(|state| {
            Ok(state
                .relationships
                .get(&rel)
                .map(|record| to_relationship(rel, record)))
        })
    }

    fn relationships(
        &self,
        node: NodeId,
        rel_type: Option<&str>,
        direction: Direction,
    ) -> Result<Vec<Relationship>> {
        self.read(|state| {
            let record = state.node(node)?;
            let ids: Box<dyn Iterator<Item = &RelId>> = match direction {
                Direction::Outgoing => Box::new(record.outgoing.iter()),
                Direction::Incoming => Box::new(record.incoming.iter()),
                Direction::Both => Box::new(record.outgoing.iter().chain(record.incoming.iter())),
            };
            let mut result = Vec::new();
            for id in ids {
                let rel = state.rel(*id)?;
                if rel_type.map_or(true, |ty| ty == rel.rel_type) {
                    result.push(to_relationship(*id, rel));
                }
            }
            Ok(result)
        })
    }

    fn get_property(&self, record: RecordId, key: &str) -> Result<Option<PropertyValue>> {
        self.read(|state| Ok(state.properties(record)?.get(key).cloned()))
    }

    fn set_property(&self, record: RecordId, key: &str, value: PropertyValue) -> Result<()> {
        self.mutate("set property", |state| {
            state.properties_mut(record)?.insert(key.to_string(), value);
            Ok(())
        })
    }

    fn remove_property(&self, record: RecordId, key: &str) -> Result<Option<PropertyValue>> {
        self.mutate("remove property", |state| {
            Ok(state.properties_mut(record)?.remove(key))
        })
    }

    fn index(
        &self,
        record: RecordId,
        index: &str,
        key: &str,
        value: &PropertyValue,
    ) -> Result<()> {
        self.mutate("index record", |state| {
            if !state.exists(record) {
                return Err(GraphError::NotFound("record"));
            }
            state.indexes.insert(record, index, key, value)
        })
    }

    fn remove_from_index(&self, record: RecordId, index: &str, key: &str) -> Result<()> {
        self.mutate("remove index entry", |state| {
            state.indexes.remove(record, index, key);
            Ok(())
        })
    }

    fn indexed(&self, index: &str, key: &str, value: &PropertyValue) -> Result<Vec<RecordId>> {
        self.read(|state| Ok(state.indexes.lookup(index, key, value)))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn mutations_require_a_transaction() {
        let graph = MemoryGraph::new();
        let err = graph.create_node().unwrap_err();
        assert!(matches!(err, GraphError::NotInTransaction(_)));
    }

    #[test]
    fn rollback_discards_records_and_index_entries() {
        let graph = MemoryGraph::new();
        let tx = graph.begin_transaction().unwrap();
        let kept = graph.create_node().unwrap();
        graph.commit_transaction(tx).unwrap();

        let tx = graph.begin_transaction().unwrap();
        let dropped = graph.create_node().unwrap();
        graph
            .set_property(kept.into(), "name", "Rod".into())
            .unwrap();
        graph
            .index(dropped.into(), "node", "name", &"Rod".into())
            .unwrap();
        graph.rollback_transaction(tx).unwrap();

        assert!(graph.record_exists(kept.into()).unwrap());
        assert!(!graph.record_exists(dropped.into()).unwrap());
        assert_eq!(graph.get_property(kept.into(), "name").unwrap(), None);
        assert!(graph.indexed("node", "name", &"Rod".into()).unwrap().is_empty());
    }

    #[test]
    fn delete_node_cascades_relationships_and_index_entries() {
        let graph = MemoryGraph::new();
        let tx = graph.begin_transaction().unwrap();
        let a = graph.create_node().unwrap();
        let b = graph.create_node().unwrap();
        let c = graph.create_node().unwrap();
        let ab = graph.create_relationship(a, b, "link").unwrap();
        graph.create_relationship(c, a, "link").unwrap();
        graph.index(ab.into(), "relationship", "w", &1.into()).unwrap();
        graph.index(a.into(), "node", "name", &"a".into()).unwrap();

        graph.delete_node(a).unwrap();
        graph.commit_transaction(tx).unwrap();

        assert!(graph.relationship(ab).unwrap().is_none());
        assert!(graph
            .relationships(c, None, Direction::Outgoing)
            .unwrap()
            .is_empty());
        assert_eq!(
            graph.stats(),
            GraphStats {
                nodes: 2,
                relationships: 0,
                index_entries: 0
            }
        );
    }

    #[test]
    fn relationships_filter_by_type_and_direction() {
        let graph = MemoryGraph::new();
        let tx = graph.begin_transaction().unwrap();
        let a = graph.create_node().unwrap();
        let b = graph.create_node().unwrap();
        graph.create_relationship(a, b, "knows").unwrap();
        graph.create_relationship(b, a, "boss").unwrap();
        graph.commit_transaction(tx).unwrap();

        let out = graph.relationships(a, Some("knows"), Direction::Outgoing).unwrap();
        assert_eq!(out.len(), 1);
        assert_eq!(out[0].end, b);
        assert!(graph
            .relationships(a, Some("knows"), Direction::Incoming)
            .unwrap()
            .is_empty());
        assert_eq!(graph.relationships(a, None, Direction::Both).unwrap().len(), 2);
    }

    #[test]
    fn nested_transactions_are_rejected() {
        let graph = MemoryGraph::new();
        let tx = graph.begin_transaction().unwrap();
        assert!(graph.begin_transaction().is_err());
        graph.rollback_transaction(tx).unwrap();
        assert!(!graph.is_transaction_active());
    }
}
