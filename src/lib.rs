//! Umbra maps domain entities onto graph records.
//!
//! Entities are declared as [`EntitySchema`]s and registered with a
//! [`GraphContext`]. Each field is served by an accessor picked by the
//! accessor factories of the entity kind, so the same entity API works for
//! node entities, relationship entities and cross-store entities whose
//! identity lives elsewhere. Entities bind lazily: values written before a
//! transaction is active stay in memory and are flushed the first time the
//! entity meets one.
//!
//! ```no_run
//! use std::sync::Arc;
//! use umbra::{EntitySchema, FieldDescriptor, GraphContext, MappingConfig, MemoryGraph};
//!
//! # fn main() -> umbra::Result<()> {
//! let ctx = GraphContext::new(Arc::new(MemoryGraph::new()), MappingConfig::default());
//! ctx.register(EntitySchema::node("Person").field(FieldDescriptor::property("name").indexed()))?;
//!
//! let tx = ctx.begin_transaction()?;
//! let ada = ctx.create("Person")?;
//! ada.write("name", "Ada")?;
//! tx.commit()?;
//!
//! let found = ctx.finder("Person")?.find_by_property_value(None, "Person.name", "Ada")?;
//! assert_eq!(found, Some(ada));
//! # Ok(())
//! # }
//! ```

#![warn(missing_docs)]

pub mod config;
pub mod context;
pub mod convert;
pub mod entity;
pub mod error;
pub mod fieldaccess;
pub mod finder;
pub mod logging;
pub mod model;
pub mod schema;
pub mod store;
pub mod value;

pub use config::{ConfigError, MappingConfig};
pub use context::{FieldPlan, GraphContext, GraphContextBuilder};
pub use convert::{Converter, EnumConverter, TimestampMillisConverter};
pub use entity::Entity;
pub use error::{GraphError, Result};
pub use fieldaccess::{RelatedEntities, RelationshipEntities, Traversal, TraversalDescription};
pub use finder::Finder;
pub use model::{Direction, NodeId, PropertyValue, RecordId, RelId, Relationship};
pub use schema::manifest::Manifest;
pub use schema::{EntityKind, EntitySchema, EntityType, FieldDescriptor, FieldKind};
pub use store::{BackingStore, MemoryGraph, Transaction};
pub use value::Value;
