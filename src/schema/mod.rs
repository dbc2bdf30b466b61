//! Capability-tagged descriptions of entity types and their fields.
//!
//! An [`EntitySchema`] is what callers declare. Registering it with a
//! [`GraphContext`](crate::GraphContext) resolves store-side names, index
//! names and relationship types once and yields an [`EntityType`] that every
//! entity instance of the type shares.

pub mod manifest;
mod registry;

pub use registry::{EntityType, SchemaRegistry};

use std::fmt;

use serde::{Deserialize, Serialize};

use crate::fieldaccess::TraversalDescription;
use crate::model::{Direction, PropertyValue};

/// What kind of backing record an entity type maps onto.
#[derive(Copy, Clone, Debug, PartialEq, Eq, Hash, Deserialize, Serialize)]
#[serde(rename_all = "kebab-case")]
pub enum EntityKind {
    /// Backed by a node.
    Node,
    /// Backed by a relationship.
    Relationship,
    /// Owned by another persistence system and partially backed by a node,
    /// identified through a foreign id.
    CrossStore,
}

impl EntityKind {
    /// Whether instances live on node records.
    pub fn is_node_backed(self) -> bool {
        !matches!(self, EntityKind::Relationship)
    }
}

impl fmt::Display for EntityKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            EntityKind::Node => "node",
            EntityKind::Relationship => "relationship",
            EntityKind::CrossStore => "cross-store",
        };
        f.write_str(name)
    }
}

/// Relationship type, direction and target entity type of a relationship
/// field.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct RelationshipSpec {
    /// Relationship type; defaults to the qualified field name.
    pub rel_type: Option<String>,
    /// Direction relative to the owning node.
    pub direction: Direction,
    /// Entity type found at the other end (or of the relationship itself
    /// for relationship-entity collections).
    pub target: String,
}

impl RelationshipSpec {
    fn new(target: impl Into<String>) -> Self {
        Self {
            rel_type: None,
            direction: Direction::Outgoing,
            target: target.into(),
        }
    }

    /// Resolved relationship type. Empty before registration if no type
    /// was declared.
    pub fn rel_type(&self) -> &str {
        self.rel_type.as_deref().unwrap_or_default()
    }
}

/// Storage capability of a declared field.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum FieldKind {
    /// Primitive stored as a record property.
    Property,
    /// Domain value stored through a named converter.
    Converted {
        /// Converter registry name.
        converter: String,
    },
    /// Identifier of the backing record.
    Id,
    /// Identifier owned by the other persistence system of a cross-store
    /// entity.
    ForeignId,
    /// Never stored.
    Transient,
    /// At most one related entity.
    SingleRelationship(RelationshipSpec),
    /// Live collection of related entities.
    Relationships {
        /// Relationship shape.
        spec: RelationshipSpec,
        /// Whether mutation through the view is rejected.
        read_only: bool,
    },
    /// Live collection of relationship entities.
    RelationshipEntities(RelationshipSpec),
    /// Lazy traversal from the owning node.
    Traversal {
        /// Entity type yielded.
        target: String,
        /// How to walk the graph.
        description: TraversalDescription,
    },
    /// Start node of a relationship entity.
    StartNode {
        /// Entity type of the node.
        target: String,
    },
    /// End node of a relationship entity.
    EndNode {
        /// Entity type of the node.
        target: String,
    },
}

impl FieldKind {
    /// Human-readable capability name.
    pub fn label(&self) -> &'static str {
        match self {
            FieldKind::Property => "property",
            FieldKind::Converted { .. } => "converted",
            FieldKind::Id => "id",
            FieldKind::ForeignId => "foreign-id",
            FieldKind::Transient => "transient",
            FieldKind::SingleRelationship(_) => "relationship",
            FieldKind::Relationships {
                read_only: false, ..
            } => "relationships",
            FieldKind::Relationships { read_only: true, .. } => "read-only relationships",
            FieldKind::RelationshipEntities(_) => "relationship entities",
            FieldKind::Traversal { .. } => "traversal",
            FieldKind::StartNode { .. } => "start node",
            FieldKind::EndNode { .. } => "end node",
        }
    }

    /// Whether whole-field writes are allowed.
    pub fn is_writable(&self) -> bool {
        matches!(
            self,
            FieldKind::Property
                | FieldKind::Converted { .. }
                | FieldKind::ForeignId
                | FieldKind::Transient
                | FieldKind::SingleRelationship(_)
        )
    }

    /// Relationship shape for relationship-valued kinds.
    pub fn relationship_spec(&self) -> Option<&RelationshipSpec> {
        match self {
            FieldKind::SingleRelationship(spec)
            | FieldKind::Relationships { spec, .. }
            | FieldKind::RelationshipEntities(spec) => Some(spec),
            _ => None,
        }
    }

    pub(crate) fn relationship_spec_mut(&mut self) -> Option<&mut RelationshipSpec> {
        match self {
            FieldKind::SingleRelationship(spec)
            | FieldKind::Relationships { spec, .. }
            | FieldKind::RelationshipEntities(spec) => Some(spec),
            _ => None,
        }
    }

    /// Entity type the field refers to, if any.
    pub fn target(&self) -> Option<&str> {
        match self {
            FieldKind::Traversal { target, .. }
            | FieldKind::StartNode { target }
            | FieldKind::EndNode { target } => Some(target),
            other => other.relationship_spec().map(|spec| spec.target.as_str()),
        }
    }

    /// Whether the value lives in a record property.
    pub fn is_property(&self) -> bool {
        matches!(self, FieldKind::Property | FieldKind::Converted { .. })
    }
}

/// Static metadata of one declared field.
#[derive(Clone, Debug, PartialEq)]
pub struct FieldDescriptor {
    /// Field name as used by callers.
    pub name: String,
    /// Type that declares the field; filled in at registration.
    pub declaring_type: String,
    /// Storage capability.
    pub kind: FieldKind,
    /// Store-side property name; resolved at registration.
    pub store_name: Option<String>,
    /// Whether writes maintain an index entry.
    pub indexed: bool,
    /// Index to maintain; resolved at registration for indexed fields.
    pub index_name: Option<String>,
    /// Cross-store types only touch the graph for graph-backed fields.
    pub graph_backed: bool,
    /// Value read when the property is absent.
    pub default: Option<PropertyValue>,
}

impl FieldDescriptor {
    fn new(name: impl Into<String>, kind: FieldKind) -> Self {
        Self {
            name: name.into(),
            declaring_type: String::new(),
            kind,
            store_name: None,
            indexed: false,
            index_name: None,
            graph_backed: false,
            default: None,
        }
    }

    /// Plain property.
    pub fn property(name: impl Into<String>) -> Self {
        Self::new(name, FieldKind::Property)
    }

    /// Property stored through the named converter.
    pub fn converted(name: impl Into<String>, converter: impl Into<String>) -> Self {
        Self::new(
            name,
            FieldKind::Converted {
                converter: converter.into(),
            },
        )
    }

    /// Record identifier.
    pub fn id(name: impl Into<String>) -> Self {
        Self::new(name, FieldKind::Id)
    }

    /// Identifier owned by another persistence system.
    pub fn foreign_id(name: impl Into<String>) -> Self {
        Self::new(name, FieldKind::ForeignId)
    }

    /// Field that is never stored.
    pub fn transient(name: impl Into<String>) -> Self {
        Self::new(name, FieldKind::Transient)
    }

    /// Single outgoing relationship to `target`.
    pub fn relationship(name: impl Into<String>, target: impl Into<String>) -> Self {
        Self::new(
            name,
            FieldKind::SingleRelationship(RelationshipSpec::new(target)),
        )
    }

    /// Live collection of related `target` entities.
    pub fn relationships(name: impl Into<String>, target: impl Into<String>) -> Self {
        Self::new(
            name,
            FieldKind::Relationships {
                spec: RelationshipSpec::new(target),
                read_only: false,
            },
        )
    }

    /// Live collection that rejects mutation.
    pub fn read_only_relationships(name: impl Into<String>, target: impl Into<String>) -> Self {
        Self::new(
            name,
            FieldKind::Relationships {
                spec: RelationshipSpec::new(target),
                read_only: true,
            },
        )
    }

    /// Live collection of relationship entities of type `entity_type`.
    pub fn relationship_entities(
        name: impl Into<String>,
        entity_type: impl Into<String>,
    ) -> Self {
        Self::new(
            name,
            FieldKind::RelationshipEntities(RelationshipSpec::new(entity_type)),
        )
    }

    /// Lazy traversal yielding `target` entities.
    pub fn traversal(
        name: impl Into<String>,
        target: impl Into<String>,
        description: TraversalDescription,
    ) -> Self {
        Self::new(
            name,
            FieldKind::Traversal {
                target: target.into(),
                description,
            },
        )
    }

    /// Start node of a relationship entity.
    pub fn start_node(name: impl Into<String>, target: impl Into<String>) -> Self {
        Self::new(
            name,
            FieldKind::StartNode {
                target: target.into(),
            },
        )
    }

    /// End node of a relationship entity.
    pub fn end_node(name: impl Into<String>, target: impl Into<String>) -> Self {
        Self::new(
            name,
            FieldKind::EndNode {
                target: target.into(),
            },
        )
    }

    /// Maintains the default index for this field.
    pub fn indexed(mut self) -> Self {
        self.indexed = true;
        self
    }

    /// Maintains the named index for this field.
    pub fn indexed_in(mut self, index: impl Into<String>) -> Self {
        self.indexed = true;
        self.index_name = Some(index.into());
        self
    }

    /// Overrides the store-side property name.
    pub fn stored_as(mut self, name: impl Into<String>) -> Self {
        self.store_name = Some(name.into());
        self
    }

    /// Overrides the relationship type.
    pub fn rel_type(mut self, rel_type: impl Into<String>) -> Self {
        if let Some(spec) = self.kind.relationship_spec_mut() {
            spec.rel_type = Some(rel_type.into());
        }
        self
    }

    /// Sets the relationship direction.
    pub fn direction(mut self, direction: Direction) -> Self {
        if let Some(spec) = self.kind.relationship_spec_mut() {
            spec.direction = direction;
        }
        self
    }

    /// Marks the field as stored in the graph for cross-store types.
    pub fn graph_backed(mut self) -> Self {
        self.graph_backed = true;
        self
    }

    /// Value read when nothing is stored.
    pub fn default_value(mut self, value: impl Into<PropertyValue>) -> Self {
        self.default = Some(value.into());
        self
    }

    /// Property key on the backing record.
    pub fn key(&self) -> &str {
        self.store_name.as_deref().unwrap_or(&self.name)
    }

    /// `Declaring.field`, for messages.
    pub fn qualified_name(&self) -> String {
        if self.declaring_type.is_empty() {
            self.name.clone()
        } else {
            format!("{}.{}", self.declaring_type, self.name)
        }
    }

    /// Index maintained on writes, if the field is indexed.
    pub fn index(&self) -> Option<&str> {
        if self.indexed {
            self.index_name.as_deref()
        } else {
            None
        }
    }
}

/// Declaration of an entity type.
#[derive(Clone, Debug, PartialEq)]
pub struct EntitySchema {
    /// Type name, unique per context.
    pub name: String,
    /// Backing record kind.
    pub kind: EntityKind,
    /// Registered parent type whose fields are inherited.
    pub parent: Option<String>,
    /// Fields declared by this type.
    pub fields: Vec<FieldDescriptor>,
}

impl EntitySchema {
    fn new(name: impl Into<String>, kind: EntityKind) -> Self {
        Self {
            name: name.into(),
            kind,
            parent: None,
            fields: Vec::new(),
        }
    }

    /// Node-backed entity type.
    pub fn node(name: impl Into<String>) -> Self {
        Self::new(name, EntityKind::Node)
    }

    /// Relationship-backed entity type.
    pub fn relationship(name: impl Into<String>) -> Self {
        Self::new(name, EntityKind::Relationship)
    }

    /// Cross-store entity type.
    pub fn cross_store(name: impl Into<String>) -> Self {
        Self::new(name, EntityKind::CrossStore)
    }

    /// Inherits the fields of `parent`.
    pub fn extends(mut self, parent: impl Into<String>) -> Self {
        self.parent = Some(parent.into());
        self
    }

    /// Declares a field.
    pub fn field(mut self, field: FieldDescriptor) -> Self {
        self.fields.push(field);
        self
    }
}
