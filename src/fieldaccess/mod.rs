//! Field access: per-field accessors, the factories that select them, the
//! listeners run after writes, and the per-entity state coordinator.

mod accessor;
mod factory;
mod listener;
mod partial;
mod relationship;
mod state;
mod traversal;
mod view;

pub use accessor::{
    AccessContext, ConvertingPropertyFieldAccessor, FieldAccessor, IdFieldAccessor,
    PropertyFieldAccessor,
};
pub use factory::{
    ConvertingPropertyFieldAccessorFactory, FieldAccessorFactory, FieldAccessorFactoryRegistry,
    GraphBacked, IdFieldAccessorFactory, OneToNRelationshipFieldAccessorFactory,
    PropertyFieldAccessorFactory, ReadOnlyOneToNRelationshipFieldAccessorFactory,
    RelationshipEndFieldAccessorFactory, RelationshipEntityFieldAccessorFactory,
    SingleRelationshipFieldAccessorFactory, TraversalFieldAccessorFactory,
};
pub use listener::{
    FieldAccessListener, FieldAccessorListenerFactory, IndexingFieldAccessListener,
    IndexingFieldAccessorListenerFactory, ListenerFactoryRegistry,
};
pub use partial::{foreign_key, ForeignIdBinding, FOREIGN_ID};
pub use relationship::{
    OneToNRelationshipFieldAccessor, RelationshipEnd, RelationshipEndFieldAccessor,
    RelationshipEntitiesFieldAccessor, SingleRelationshipFieldAccessor,
};
pub use state::{Binding, EntityStateAccessor, NodeBinding, RelationshipBinding, StateBinding};
pub use traversal::{Traversal, TraversalDescription, TraversalFieldAccessor};
pub use view::{RelatedEntities, RelationshipEntities};
