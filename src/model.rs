//! Record identifiers and primitive property values shared by the store and
//! the mapping layer.

use std::fmt;

use serde::{Deserialize, Serialize};

use crate::error::{GraphError, Result};

/// Identifier of a node record.
#[derive(Copy, Clone, Eq, PartialEq, Ord, PartialOrd, Hash, Debug)]
pub struct NodeId(pub u64);

/// Identifier of a relationship record.
#[derive(Copy, Clone, Eq, PartialEq, Ord, PartialOrd, Hash, Debug)]
pub struct RelId(pub u64);

impl fmt::Display for NodeId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl fmt::Display for RelId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// Handle to a backing record: either a node or a relationship.
#[derive(Copy, Clone, Eq, PartialEq, Ord, PartialOrd, Hash, Debug)]
pub enum RecordId {
    /// A node record.
    Node(NodeId),
    /// A relationship record.
    Relationship(RelId),
}

impl RecordId {
    /// Raw numeric identifier, without the record kind.
    pub fn raw(&self) -> u64 {
        match self {
            RecordId::Node(id) => id.0,
            RecordId::Relationship(id) => id.0,
        }
    }

    /// Returns the node id or a usage error for relationship records.
    pub fn node(&self) -> Result<NodeId> {
        match self {
            RecordId::Node(id) => Ok(*id),
            RecordId::Relationship(id) => Err(GraphError::usage(format!(
                "relationship {id} cannot hold node-only fields"
            ))),
        }
    }

    /// Returns the relationship id or a usage error for node records.
    pub fn relationship(&self) -> Result<RelId> {
        match self {
            RecordId::Relationship(id) => Ok(*id),
            RecordId::Node(id) => Err(GraphError::usage(format!(
                "node {id} cannot hold relationship-only fields"
            ))),
        }
    }
}

impl From<NodeId> for RecordId {
    fn from(value: NodeId) -> Self {
        RecordId::Node(value)
    }
}

impl From<RelId> for RecordId {
    fn from(value: RelId) -> Self {
        RecordId::Relationship(value)
    }
}

impl fmt::Display for RecordId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            RecordId::Node(id) => write!(f, "node {id}"),
            RecordId::Relationship(id) => write!(f, "relationship {id}"),
        }
    }
}

/// Direction of a relationship relative to the node it is read from.
#[derive(Copy, Clone, Eq, PartialEq, Hash, Debug, Default, Deserialize, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum Direction {
    /// The node is the start of the relationship.
    #[default]
    Outgoing,
    /// The node is the end of the relationship.
    Incoming,
    /// Either end.
    Both,
}

impl Direction {
    /// The same relationship seen from the other end.
    pub fn reverse(self) -> Self {
        match self {
            Direction::Outgoing => Direction::Incoming,
            Direction::Incoming => Direction::Outgoing,
            Direction::Both => Direction::Both,
        }
    }
}

impl fmt::Display for Direction {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Direction::Outgoing => "outgoing",
            Direction::Incoming => "incoming",
            Direction::Both => "both",
        };
        f.write_str(name)
    }
}

/// Primitive value stored as a record property.
#[derive(Debug, Clone, PartialEq, Deserialize, Serialize)]
#[serde(untagged)]
pub enum PropertyValue {
    /// Boolean value.
    Bool(bool),
    /// Signed integer value.
    Int(i64),
    /// Floating point value.
    Float(f64),
    /// UTF-8 string value.
    String(String),
    /// Raw bytes.
    Bytes(Vec<u8>),
}

impl fmt::Display for PropertyValue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            PropertyValue::Bool(v) => write!(f, "{v}"),
            PropertyValue::Int(v) => write!(f, "{v}"),
            PropertyValue::Float(v) => write!(f, "{v}"),
            PropertyValue::String(v) => f.write_str(v),
            PropertyValue::Bytes(v) => write!(f, "<{} bytes>", v.len()),
        }
    }
}

impl From<bool> for PropertyValue {
    fn from(value: bool) -> Self {
        PropertyValue::Bool(value)
    }
}

impl From<i64> for PropertyValue {
    fn from(value: i64) -> Self {
        PropertyValue::Int(value)
    }
}

impl From<i32> for PropertyValue {
    fn from(value: i32) -> Self {
        PropertyValue::Int(i64::from(value))
    }
}

impl From<f64> for PropertyValue {
    fn from(value: f64) -> Self {
        PropertyValue::Float(value)
    }
}

impl From<&str> for PropertyValue {
    fn from(value: &str) -> Self {
        PropertyValue::String(value.to_string())
    }
}

impl From<String> for PropertyValue {
    fn from(value: String) -> Self {
        PropertyValue::String(value)
    }
}

/// Property values that can live in an exact-match index.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub enum IndexableValue {
    /// Boolean key.
    Bool(bool),
    /// Integer key.
    Int(i64),
    /// String key.
    String(String),
}

impl TryFrom<&PropertyValue> for IndexableValue {
    type Error = GraphError;

    fn try_from(value: &PropertyValue) -> Result<Self> {
        match value {
            PropertyValue::Bool(v) => Ok(IndexableValue::Bool(*v)),
            PropertyValue::Int(v) => Ok(IndexableValue::Int(*v)),
            PropertyValue::String(v) => Ok(IndexableValue::String(v.clone())),
            PropertyValue::Float(_) => Err(GraphError::InvalidArgument(
                "float values cannot be indexed".into(),
            )),
            PropertyValue::Bytes(_) => Err(GraphError::InvalidArgument(
                "byte values cannot be indexed".into(),
            )),
        }
    }
}

/// A relationship record as seen by the mapping layer.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Relationship {
    /// Relationship identifier.
    pub id: RelId,
    /// Start node.
    pub start: NodeId,
    /// End node.
    pub end: NodeId,
    /// Relationship type name.
    pub rel_type: String,
}

impl Relationship {
    /// The node at the opposite end from `node`.
    pub fn other_node(&self, node: NodeId) -> NodeId {
        if self.start == node {
            self.end
        } else {
            self.start
        }
    }
}
