use std::sync::Arc;

use parking_lot::RwLock;
use tracing::{debug, info};

use crate::config::MappingConfig;
use crate::convert::{Converter, ConverterRegistry};
use crate::entity::Entity;
use crate::error::{GraphError, Result};
use crate::fieldaccess::{FieldAccessorFactoryRegistry, ListenerFactoryRegistry};
use crate::finder::Finder;
use crate::model::{PropertyValue, RecordId};
use crate::schema::{
    EntityKind, EntitySchema, EntityType, FieldDescriptor, FieldKind, SchemaRegistry,
};
use crate::store::{BackingStore, Transaction};

/// Accessor and listeners chosen for one field, as reported by
/// [`GraphContext::field_plan`].
#[derive(Debug, Clone)]
pub struct FieldPlan {
    /// The field.
    pub field: Arc<FieldDescriptor>,
    /// Factory that builds its accessor; `None` keeps the value in memory.
    pub accessor: Option<&'static str>,
    /// Listener factories applied after writes.
    pub listeners: Vec<&'static str>,
}

/// Everything the mapping layer needs, passed explicitly to every entity:
/// the store, the configuration, registered types, converters and the
/// accessor and listener factories per entity kind.
pub struct GraphContext {
    store: Arc<dyn BackingStore>,
    config: MappingConfig,
    schemas: SchemaRegistry,
    converters: RwLock<ConverterRegistry>,
    node_factories: FieldAccessorFactoryRegistry,
    relationship_factories: FieldAccessorFactoryRegistry,
    cross_store_factories: FieldAccessorFactoryRegistry,
    listeners: ListenerFactoryRegistry,
    cross_store_listeners: ListenerFactoryRegistry,
}

/// Builder for a [`GraphContext`] with non-default factories or converters.
pub struct GraphContextBuilder {
    store: Arc<dyn BackingStore>,
    config: MappingConfig,
    converters: ConverterRegistry,
    node_factories: FieldAccessorFactoryRegistry,
    relationship_factories: FieldAccessorFactoryRegistry,
    cross_store_factories: FieldAccessorFactoryRegistry,
    listeners: ListenerFactoryRegistry,
    cross_store_listeners: ListenerFactoryRegistry,
}

impl GraphContextBuilder {
    /// Mapping configuration.
    pub fn config(mut self, config: MappingConfig) -> Self {
        self.config = config;
        self
    }

    /// Registers a converter.
    pub fn converter(
        mut self,
        name: impl Into<String>,
        converter: impl Converter + 'static,
    ) -> Self {
        self.converters.register(name, converter);
        self
    }

    /// Replaces the accessor factories used for `kind`.
    pub fn accessor_factories(
        mut self,
        kind: EntityKind,
        factories: FieldAccessorFactoryRegistry,
    ) -> Self {
        match kind {
            EntityKind::Node => self.node_factories = factories,
            EntityKind::Relationship => self.relationship_factories = factories,
            EntityKind::CrossStore => self.cross_store_factories = factories,
        }
        self
    }

    /// Replaces the listener factories used for `kind`. Node and
    /// relationship entities share one set.
    pub fn listener_factories(
        mut self,
        kind: EntityKind,
        listeners: ListenerFactoryRegistry,
    ) -> Self {
        match kind {
            EntityKind::CrossStore => self.cross_store_listeners = listeners,
            _ => self.listeners = listeners,
        }
        self
    }

    /// Finishes the context.
    pub fn build(self) -> Arc<GraphContext> {
        Arc::new(GraphContext {
            store: self.store,
            config: self.config,
            schemas: SchemaRegistry::default(),
            converters: RwLock::new(self.converters),
            node_factories: self.node_factories,
            relationship_factories: self.relationship_factories,
            cross_store_factories: self.cross_store_factories,
            listeners: self.listeners,
            cross_store_listeners: self.cross_store_listeners,
        })
    }
}

impl GraphContext {
    /// Context over `store` with the default factories.
    pub fn new(store: Arc<dyn BackingStore>, config: MappingConfig) -> Arc<Self> {
        Self::builder(store).config(config).build()
    }

    /// Starts a builder over `store`.
    pub fn builder(store: Arc<dyn BackingStore>) -> GraphContextBuilder {
        GraphContextBuilder {
            store,
            config: MappingConfig::default(),
            converters: ConverterRegistry::new(),
            node_factories: FieldAccessorFactoryRegistry::node_entities(),
            relationship_factories: FieldAccessorFactoryRegistry::relationship_entities(),
            cross_store_factories: FieldAccessorFactoryRegistry::cross_store(),
            listeners: ListenerFactoryRegistry::entities(),
            cross_store_listeners: ListenerFactoryRegistry::cross_store(),
        }
    }

    /// Mapping configuration.
    pub fn config(&self) -> &MappingConfig {
        &self.config
    }

    /// The backing store.
    pub fn store(&self) -> &dyn BackingStore {
        self.store.as_ref()
    }

    /// Whether the store has an active transaction.
    pub fn in_transaction(&self) -> bool {
        self.store.is_transaction_active()
    }

    /// Begins a store transaction; the guard rolls back unless committed.
    pub fn begin_transaction(&self) -> Result<Transaction<'_>> {
        Transaction::begin(self.store.as_ref())
    }

    /// Registers a converter under `name`, replacing any previous one.
    pub fn register_converter(&self, name: impl Into<String>, converter: impl Converter + 'static) {
        self.converters.write().register(name, converter);
    }

    /// Looks a converter up.
    pub fn converter(&self, name: &str) -> Option<Arc<dyn Converter>> {
        self.converters.read().get(name)
    }

    /// Registers an entity type.
    ///
    /// The parent must already be registered. Every field that is stored in
    /// the graph must be handled by exactly one accessor factory.
    pub fn register(&self, schema: EntitySchema) -> Result<Arc<EntityType>> {
        let entity_type = {
            let converters = self.converters.read();
            self.schemas.resolve(schema, &self.config, &converters)?
        };
        let factories = self.accessor_factories(entity_type.kind());
        for field in entity_type.fields() {
            if !stored_in_graph(entity_type.kind(), field) {
                continue;
            }
            let accepting = factories.accepting(field);
            match accepting.as_slice() {
                [] => {
                    return Err(GraphError::usage(format!(
                        "no accessor handles {} field {} on {} type {}",
                        field.kind.label(),
                        field.qualified_name(),
                        entity_type.kind(),
                        entity_type.name()
                    )))
                }
                [_] => {}
                several => {
                    return Err(GraphError::usage(format!(
                        "{} is accepted by several accessor factories: {}",
                        field.qualified_name(),
                        several.join(", ")
                    )))
                }
            }
        }
        let registered = self.schemas.insert(entity_type)?;
        info!(
            entity_type = %registered.name(),
            kind = %registered.kind(),
            fields = registered.fields().len(),
            "entity type registered"
        );
        Ok(registered)
    }

    /// Checks that every type referenced by a registered field exists.
    pub fn verify(&self) -> Result<()> {
        self.schemas.verify_targets()
    }

    /// Looks a registered type up.
    pub fn entity_type(&self, name: &str) -> Result<Arc<EntityType>> {
        self.schemas.get(name).ok_or(GraphError::NotFound("entity type"))
    }

    /// Registered types in registration order.
    pub fn entity_types(&self) -> Vec<Arc<EntityType>> {
        self.schemas.all()
    }

    /// Accessor factories used for `kind`.
    pub fn accessor_factories(&self, kind: EntityKind) -> &FieldAccessorFactoryRegistry {
        match kind {
            EntityKind::Node => &self.node_factories,
            EntityKind::Relationship => &self.relationship_factories,
            EntityKind::CrossStore => &self.cross_store_factories,
        }
    }

    /// Listener factories used for `kind`.
    pub fn listener_factories(&self, kind: EntityKind) -> &ListenerFactoryRegistry {
        match kind {
            EntityKind::CrossStore => &self.cross_store_listeners,
            _ => &self.listeners,
        }
    }

    /// Accessor and listeners each field of `entity_type` ends up with.
    pub fn field_plan(&self, entity_type: &EntityType) -> Vec<FieldPlan> {
        let factories = self.accessor_factories(entity_type.kind());
        let listeners = self.listener_factories(entity_type.kind());
        entity_type
            .fields()
            .iter()
            .map(|field| {
                let accessor = factories.factory_for(field).map(|factory| factory.name());
                FieldPlan {
                    field: Arc::clone(field),
                    accessor,
                    listeners: if accessor.is_some() {
                        listeners.accepting(field)
                    } else {
                        Vec::new()
                    },
                }
            })
            .collect()
    }

    /// New entity of a node or cross-store type. Inside a transaction node
    /// entities are bound immediately.
    pub fn create(self: &Arc<Self>, type_name: &str) -> Result<Entity> {
        let entity_type = self.entity_type(type_name)?;
        if entity_type.kind() == EntityKind::Relationship {
            return Err(GraphError::usage(format!(
                "relationship entity {type_name} can only be created with relate_to"
            )));
        }
        let entity = Entity::new(Arc::clone(self), entity_type)?;
        if self.in_transaction() {
            entity.ensure_bound()?;
        }
        Ok(entity)
    }

    /// Wraps an existing record as an entity of `type_name`.
    pub fn entity(self: &Arc<Self>, record: RecordId, type_name: &str) -> Result<Entity> {
        let entity_type = self.entity_type(type_name)?;
        match (record, entity_type.kind().is_node_backed()) {
            (RecordId::Node(_), true) | (RecordId::Relationship(_), false) => {}
            _ => {
                return Err(GraphError::usage(format!(
                    "{record} cannot back {} entity {type_name}",
                    entity_type.kind()
                )))
            }
        }
        if !self.store.record_exists(record)? {
            return Err(GraphError::NotFound(match record {
                RecordId::Node(_) => "node",
                RecordId::Relationship(_) => "relationship",
            }));
        }
        Entity::bound(Arc::clone(self), entity_type, record)
    }

    /// Wraps `record` as its concrete registered type, or as `declared` when
    /// the record carries no known type.
    pub fn materialize(
        self: &Arc<Self>,
        record: RecordId,
        declared: &Arc<EntityType>,
    ) -> Result<Entity> {
        match self.materialize_as(record, declared)? {
            Some(entity) => Ok(entity),
            None => Entity::bound(Arc::clone(self), Arc::clone(declared), record),
        }
    }

    /// Like [`materialize`](Self::materialize), but `None` when the record's
    /// concrete type is not `target` or one of its subtypes.
    pub fn materialize_as(
        self: &Arc<Self>,
        record: RecordId,
        target: &Arc<EntityType>,
    ) -> Result<Option<Entity>> {
        let concrete = match self.store.get_property(record, &self.config.type_property)? {
            Some(PropertyValue::String(name)) => self.schemas.get(&name),
            _ => None,
        };
        match concrete {
            Some(concrete) if concrete.is_a(target.name()) => {
                Entity::bound(Arc::clone(self), concrete, record).map(Some)
            }
            Some(_) => Ok(None),
            None => Entity::bound(Arc::clone(self), Arc::clone(target), record).map(Some),
        }
    }

    /// Lookup surface for entities of `type_name`.
    pub fn finder(self: &Arc<Self>, type_name: &str) -> Result<Finder> {
        Ok(Finder::new(Arc::clone(self), self.entity_type(type_name)?))
    }

    /// Records the concrete type on a fresh record and indexes it under
    /// every type of its lineage.
    pub(crate) fn post_entity_creation(
        &self,
        record: RecordId,
        entity_type: &EntityType,
    ) -> Result<()> {
        self.store.set_property(
            record,
            &self.config.type_property,
            PropertyValue::String(entity_type.name().to_string()),
        )?;
        let marker = PropertyValue::Bool(true);
        for type_name in entity_type.lineage() {
            self.store
                .index(record, &self.config.type_index, type_name, &marker)?;
        }
        debug!(%record, entity_type = %entity_type.name(), "type recorded");
        Ok(())
    }
}

fn stored_in_graph(kind: EntityKind, field: &FieldDescriptor) -> bool {
    !matches!(field.kind, FieldKind::Transient | FieldKind::ForeignId)
        && (kind != EntityKind::CrossStore || field.graph_backed)
}

impl std::fmt::Debug for GraphContext {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("GraphContext")
            .field("config", &self.config)
            .field("schemas", &self.schemas)
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::fieldaccess::{GraphBacked, PropertyFieldAccessorFactory};
    use crate::store::MemoryGraph;

    #[test]
    fn unhandled_capabilities_are_rejected_at_registration() {
        let ctx = GraphContext::new(Arc::new(MemoryGraph::new()), MappingConfig::default());
        let err = ctx
            .register(
                EntitySchema::node("Person").field(FieldDescriptor::start_node("origin", "Person")),
            )
            .unwrap_err();
        assert!(err.is_usage());
        assert!(ctx.entity_type("Person").is_err());
    }

    #[test]
    fn ambiguous_factories_are_a_configuration_error() {
        let factories = FieldAccessorFactoryRegistry::node_entities()
            .with(GraphBacked(PropertyFieldAccessorFactory));
        let ctx = GraphContext::builder(Arc::new(MemoryGraph::new()))
            .accessor_factories(EntityKind::Node, factories)
            .build();
        ctx.register(EntitySchema::node("Person").field(FieldDescriptor::property("name")))
            .unwrap();
        let err = ctx
            .register(
                EntitySchema::node("Customer")
                    .field(FieldDescriptor::property("nickname").graph_backed()),
            )
            .unwrap_err();
        assert!(err.to_string().contains("several accessor factories"));
    }

    #[test]
    fn plans_report_accessors_and_listeners() {
        let ctx = GraphContext::new(Arc::new(MemoryGraph::new()), MappingConfig::default());
        let person = ctx
            .register(
                EntitySchema::node("Person")
                    .field(FieldDescriptor::property("name").indexed())
                    .field(FieldDescriptor::transient("thought")),
            )
            .unwrap();
        let plan = ctx.field_plan(&person);
        assert_eq!(plan[0].accessor, Some("property"));
        assert_eq!(plan[0].listeners, vec!["indexing"]);
        assert_eq!(plan[1].accessor, None);
    }

    #[test]
    fn creating_outside_a_transaction_leaves_entities_unbound() {
        let graph = Arc::new(MemoryGraph::new());
        let ctx = GraphContext::new(graph.clone(), MappingConfig::default());
        ctx.register(EntitySchema::node("Person").field(FieldDescriptor::property("name")))
            .unwrap();
        let person = ctx.create("Person").unwrap();
        assert!(!person.is_bound());
        assert_eq!(graph.stats().nodes, 0);
    }
}
