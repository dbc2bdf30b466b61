use std::collections::HashMap;
use std::sync::Arc;

use parking_lot::RwLock;
use tracing::debug;

use super::{EntityKind, EntitySchema, FieldDescriptor, FieldKind};
use crate::config::MappingConfig;
use crate::convert::ConverterRegistry;
use crate::error::{GraphError, Result};
use crate::model::Direction;

/// A registered entity type with its resolved fields, inherited ones
/// included.
#[derive(Debug)]
pub struct EntityType {
    name: String,
    kind: EntityKind,
    lineage: Vec<String>,
    fields: Vec<Arc<FieldDescriptor>>,
    by_name: HashMap<String, usize>,
    identity: Option<usize>,
}

impl EntityType {
    /// Type name.
    pub fn name(&self) -> &str {
        &self.name
    }

    /// Backing record kind.
    pub fn kind(&self) -> EntityKind {
        self.kind
    }

    /// This type followed by its ancestors, nearest first.
    pub fn lineage(&self) -> &[String] {
        &self.lineage
    }

    /// Direct parent, if any.
    pub fn parent(&self) -> Option<&str> {
        self.lineage.get(1).map(String::as_str)
    }

    /// Whether this type is `name` or one of its descendants.
    pub fn is_a(&self, name: &str) -> bool {
        self.lineage.iter().any(|ancestor| ancestor == name)
    }

    /// All fields, inherited ones first.
    pub fn fields(&self) -> &[Arc<FieldDescriptor>] {
        &self.fields
    }

    /// Looks a field up by name.
    pub fn field(&self, name: &str) -> Option<&Arc<FieldDescriptor>> {
        self.field_index(name).map(|idx| &self.fields[idx])
    }

    pub(crate) fn field_index(&self, name: &str) -> Option<usize> {
        self.by_name.get(name).copied()
    }

    /// Foreign identity field of a cross-store type, found anywhere in the
    /// lineage.
    pub fn identity_field(&self) -> Option<&Arc<FieldDescriptor>> {
        self.identity.map(|idx| &self.fields[idx])
    }
}

#[derive(Debug, Default)]
struct Registered {
    by_name: HashMap<String, Arc<EntityType>>,
    order: Vec<Arc<EntityType>>,
}

/// Registered entity types of one context.
#[derive(Debug, Default)]
pub struct SchemaRegistry {
    inner: RwLock<Registered>,
}

impl SchemaRegistry {
    /// Looks a type up by name.
    pub fn get(&self, name: &str) -> Option<Arc<EntityType>> {
        self.inner.read().by_name.get(name).cloned()
    }

    /// All types in registration order.
    pub fn all(&self) -> Vec<Arc<EntityType>> {
        self.inner.read().order.clone()
    }

    /// Resolves a declaration against the registered types.
    pub(crate) fn resolve(
        &self,
        schema: EntitySchema,
        config: &MappingConfig,
        converters: &ConverterRegistry,
    ) -> Result<EntityType> {
        let EntitySchema {
            name,
            kind,
            parent,
            fields: declared,
        } = schema;

        if self.get(&name).is_some() {
            return Err(GraphError::usage(format!(
                "entity type {name} is already registered"
            )));
        }
        if kind == EntityKind::CrossStore && !config.cross_store {
            return Err(GraphError::usage(format!(
                "cross-store type {name} requires cross_store to be enabled"
            )));
        }

        let mut lineage = vec![name.clone()];
        let mut fields: Vec<Arc<FieldDescriptor>> = Vec::new();
        if let Some(parent_name) = parent {
            let parent = self.get(&parent_name).ok_or_else(|| {
                GraphError::usage(format!(
                    "parent type {parent_name} of {name} is not registered"
                ))
            })?;
            if parent.kind != kind {
                return Err(GraphError::usage(format!(
                    "{name} ({kind}) cannot extend {parent_name} ({})",
                    parent.kind
                )));
            }
            lineage.extend(parent.lineage.iter().cloned());
            fields.extend(parent.fields.iter().cloned());
        }

        for mut field in declared {
            if fields.iter().any(|existing| existing.name == field.name) {
                return Err(GraphError::usage(format!(
                    "field {} is declared twice in the lineage of {name}",
                    field.name
                )));
            }
            field.declaring_type = name.clone();
            self.resolve_field(&mut field, kind, config, converters)?;
            fields.push(Arc::new(field));
        }

        let identity = fields
            .iter()
            .position(|field| field.kind == FieldKind::ForeignId);
        if kind == EntityKind::CrossStore && identity.is_none() {
            return Err(GraphError::usage(format!(
                "cross-store type {name} declares no foreign id field"
            )));
        }

        let by_name = fields
            .iter()
            .enumerate()
            .map(|(idx, field)| (field.name.clone(), idx))
            .collect();

        Ok(EntityType {
            name,
            kind,
            lineage,
            fields,
            by_name,
            identity,
        })
    }

    fn resolve_field(
        &self,
        field: &mut FieldDescriptor,
        kind: EntityKind,
        config: &MappingConfig,
        converters: &ConverterRegistry,
    ) -> Result<()> {
        let qualified = if config.qualify_property_names {
            format!("{}.{}", field.declaring_type, field.name)
        } else {
            field.name.clone()
        };

        if field.kind.is_property() && field.store_name.is_none() {
            field.store_name = Some(qualified.clone());
        }

        if field.indexed {
            if !field.kind.is_property() {
                return Err(GraphError::usage(format!(
                    "{} is a {} field and cannot be indexed",
                    field.qualified_name(),
                    field.kind.label()
                )));
            }
            if field.index_name.is_none() {
                field.index_name = Some(match kind {
                    EntityKind::Relationship => config.relationship_index.clone(),
                    _ => config.node_index.clone(),
                });
            }
        }

        if let FieldKind::Converted { converter } = &field.kind {
            if converters.get(converter).is_none() {
                return Err(GraphError::usage(format!(
                    "{} uses unknown converter '{converter}'",
                    field.qualified_name()
                )));
            }
        }

        if field.kind == FieldKind::ForeignId && kind != EntityKind::CrossStore {
            return Err(GraphError::usage(format!(
                "{} is a foreign id but {} is not a cross-store type",
                field.qualified_name(),
                field.declaring_type
            )));
        }

        if let FieldKind::SingleRelationship(spec) = &field.kind {
            if spec.direction == Direction::Both {
                return Err(GraphError::usage(format!(
                    "single relationship {} needs an outgoing or incoming direction",
                    field.qualified_name()
                )));
            }
        }

        if let Some(spec) = field.kind.relationship_spec_mut() {
            if spec.rel_type.is_none() {
                spec.rel_type = Some(qualified);
            }
        }

        if let Some(target) = field.kind.target() {
            if let Some(target_type) = self.get(target) {
                check_target(field, target_type.kind())?;
            }
        }
        debug!(field = %field.qualified_name(), kind = field.kind.label(), "field resolved");
        Ok(())
    }

    /// Verifies that every referenced target type exists with a fitting
    /// record kind. Forward references are allowed until this runs.
    pub(crate) fn verify_targets(&self) -> Result<()> {
        for entity_type in self.all() {
            for field in &entity_type.fields {
                let Some(target) = field.kind.target() else {
                    continue;
                };
                let target_type = self.get(target).ok_or_else(|| {
                    GraphError::usage(format!(
                        "{} refers to unregistered type {target}",
                        field.qualified_name()
                    ))
                })?;
                check_target(field, target_type.kind())?;
            }
        }
        Ok(())
    }

    pub(crate) fn insert(&self, entity_type: EntityType) -> Result<Arc<EntityType>> {
        let mut inner = self.inner.write();
        if inner.by_name.contains_key(&entity_type.name) {
            return Err(GraphError::usage(format!(
                "entity type {} is already registered",
                entity_type.name
            )));
        }
        let entity_type = Arc::new(entity_type);
        inner
            .by_name
            .insert(entity_type.name.clone(), Arc::clone(&entity_type));
        inner.order.push(Arc::clone(&entity_type));
        Ok(entity_type)
    }
}

fn check_target(field: &FieldDescriptor, target_kind: EntityKind) -> Result<()> {
    let wants_relationship = matches!(field.kind, FieldKind::RelationshipEntities(_));
    if wants_relationship == target_kind.is_node_backed() {
        return Err(GraphError::usage(format!(
            "{} cannot refer to {target_kind} type {}",
            field.qualified_name(),
            field.kind.target().unwrap_or_default()
        )));
    }
    Ok(())
}
