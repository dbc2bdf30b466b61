//! Backing store abstraction the mapping layer is written against.
//!
//! The store owns records, their properties, relationship adjacency and
//! exact-match indexes. It also owns transaction boundaries: every mutation
//! must happen while a transaction is active, and aborting a transaction
//! discards all of its writes and index updates at once. The mapping layer
//! never tries to undo store work itself.
//!
//! Binding a cross-store entity performs an index lookup followed by a
//! create when nothing was found. Two concurrent binders for the same
//! foreign id would both create a record unless the store serializes the
//! sequence, so implementations must run transactions with at least that
//! isolation. [`MemoryGraph`] admits a single transaction at a time.

mod index;
mod memory;
mod transaction;

pub use memory::{GraphStats, MemoryGraph};
pub use transaction::{Transaction, TxId, TxState};

use crate::error::Result;
use crate::model::{Direction, NodeId, PropertyValue, RecordId, RelId, Relationship};

/// Operations the mapping layer consumes from a graph store.
pub trait BackingStore: Send + Sync {
    /// Whether a transaction is currently active.
    fn is_transaction_active(&self) -> bool;

    /// Starts a transaction.
    fn begin_transaction(&self) -> Result<TxId>;

    /// Makes the writes of `tx` permanent.
    fn commit_transaction(&self, tx: TxId) -> Result<()>;

    /// Discards every write and index update made by `tx`.
    fn rollback_transaction(&self, tx: TxId) -> Result<()>;

    /// Creates an empty node.
    fn create_node(&self) -> Result<NodeId>;

    /// Creates a typed relationship from `start` to `end`.
    fn create_relationship(&self, start: NodeId, end: NodeId, rel_type: &str) -> Result<RelId>;

    /// Deletes a node together with its relationships and index entries.
    fn delete_node(&self, node: NodeId) -> Result<()>;

    /// Deletes a relationship and its index entries.
    fn delete_relationship(&self, rel: RelId) -> Result<()>;

    /// Whether the record exists.
    fn record_exists(&self, record: RecordId) -> Result<bool>;

    /// Loads a relationship, or `None` if it does not exist.
    fn relationship(&self, rel: RelId) -> Result<Option<Relationship>>;

    /// Relationships of `node` in `direction`, optionally restricted to a type.
    fn relationships(
        &self,
        node: NodeId,
        rel_type: Option<&str>,
        direction: Direction,
    ) -> Result<Vec<Relationship>>;

    /// Reads a property, `None` when absent.
    fn get_property(&self, record: RecordId, key: &str) -> Result<Option<PropertyValue>>;

    /// Writes a property.
    fn set_property(&self, record: RecordId, key: &str, value: PropertyValue) -> Result<()>;

    /// Removes a property and returns its previous value.
    fn remove_property(&self, record: RecordId, key: &str) -> Result<Option<PropertyValue>>;

    /// Indexes `record` under `key = value` in the named index, replacing
    /// any value the record previously had for that key.
    fn index(&self, record: RecordId, index: &str, key: &str, value: &PropertyValue)
        -> Result<()>;

    /// Removes whatever value `record` has for `key` in the named index.
    fn remove_from_index(&self, record: RecordId, index: &str, key: &str) -> Result<()>;

    /// All records indexed under `key = value`.
    fn indexed(&self, index: &str, key: &str, value: &PropertyValue) -> Result<Vec<RecordId>>;

    /// The single record indexed under `key = value`, if any.
    fn single_indexed(
        &self,
        index: &str,
        key: &str,
        value: &PropertyValue,
    ) -> Result<Option<RecordId>> {
        Ok(self.indexed(index, key, value)?.into_iter().next())
    }
}
