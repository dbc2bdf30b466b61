use std::sync::Arc;

use super::accessor::{
    ConvertingPropertyFieldAccessor, FieldAccessor, IdFieldAccessor, PropertyFieldAccessor,
};
use super::relationship::{
    OneToNRelationshipFieldAccessor, RelationshipEnd, RelationshipEndFieldAccessor,
    RelationshipEntitiesFieldAccessor, SingleRelationshipFieldAccessor,
};
use super::traversal::TraversalFieldAccessor;
use crate::context::GraphContext;
use crate::error::{GraphError, Result};
use crate::schema::{FieldDescriptor, FieldKind, RelationshipSpec};

/// Decides whether it handles a field and builds its accessor.
pub trait FieldAccessorFactory: Send + Sync {
    /// Name shown in diagnostics.
    fn name(&self) -> &'static str;

    /// Whether this factory handles `field`.
    fn accept(&self, field: &FieldDescriptor) -> bool;

    /// Builds the accessor for an accepted field.
    fn create(
        &self,
        field: &Arc<FieldDescriptor>,
        ctx: &GraphContext,
    ) -> Result<Arc<dyn FieldAccessor>>;
}

fn relationship_parts<'f>(field: &'f FieldDescriptor) -> Result<&'f RelationshipSpec> {
    field.kind.relationship_spec().ok_or_else(|| {
        GraphError::usage(format!(
            "{} is not a relationship field",
            field.qualified_name()
        ))
    })
}

/// Plain property fields.
#[derive(Debug, Default)]
pub struct PropertyFieldAccessorFactory;

impl FieldAccessorFactory for PropertyFieldAccessorFactory {
    fn name(&self) -> &'static str {
        "property"
    }

    fn accept(&self, field: &FieldDescriptor) -> bool {
        field.kind == FieldKind::Property
    }

    fn create(
        &self,
        field: &Arc<FieldDescriptor>,
        _ctx: &GraphContext,
    ) -> Result<Arc<dyn FieldAccessor>> {
        Ok(Arc::new(PropertyFieldAccessor::new(Arc::clone(field))))
    }
}

/// Properties stored through a registered converter.
#[derive(Debug, Default)]
pub struct ConvertingPropertyFieldAccessorFactory;

impl FieldAccessorFactory for ConvertingPropertyFieldAccessorFactory {
    fn name(&self) -> &'static str {
        "converting-property"
    }

    fn accept(&self, field: &FieldDescriptor) -> bool {
        matches!(field.kind, FieldKind::Converted { .. })
    }

    fn create(
        &self,
        field: &Arc<FieldDescriptor>,
        ctx: &GraphContext,
    ) -> Result<Arc<dyn FieldAccessor>> {
        let FieldKind::Converted { converter } = &field.kind else {
            return Err(GraphError::usage(format!(
                "{} is not a converted field",
                field.qualified_name()
            )));
        };
        let converter = ctx.converter(converter).ok_or_else(|| {
            GraphError::usage(format!(
                "{} uses unknown converter '{converter}'",
                field.qualified_name()
            ))
        })?;
        Ok(Arc::new(ConvertingPropertyFieldAccessor::new(
            Arc::clone(field),
            converter,
        )))
    }
}

/// Record identifier fields.
#[derive(Debug, Default)]
pub struct IdFieldAccessorFactory;

impl FieldAccessorFactory for IdFieldAccessorFactory {
    fn name(&self) -> &'static str {
        "id"
    }

    fn accept(&self, field: &FieldDescriptor) -> bool {
        field.kind == FieldKind::Id
    }

    fn create(
        &self,
        field: &Arc<FieldDescriptor>,
        _ctx: &GraphContext,
    ) -> Result<Arc<dyn FieldAccessor>> {
        Ok(Arc::new(IdFieldAccessor::new(Arc::clone(field))))
    }
}

/// Single-valued relationship fields.
#[derive(Debug, Default)]
pub struct SingleRelationshipFieldAccessorFactory;

impl FieldAccessorFactory for SingleRelationshipFieldAccessorFactory {
    fn name(&self) -> &'static str {
        "single-relationship"
    }

    fn accept(&self, field: &FieldDescriptor) -> bool {
        matches!(field.kind, FieldKind::SingleRelationship(_))
    }

    fn create(
        &self,
        field: &Arc<FieldDescriptor>,
        ctx: &GraphContext,
    ) -> Result<Arc<dyn FieldAccessor>> {
        let spec = relationship_parts(field)?;
        Ok(Arc::new(SingleRelationshipFieldAccessor::new(
            Arc::clone(field),
            spec.rel_type().to_string(),
            spec.direction,
            ctx.entity_type(&spec.target)?,
        )))
    }
}

/// Writable relationship collections.
#[derive(Debug, Default)]
pub struct OneToNRelationshipFieldAccessorFactory;

impl FieldAccessorFactory for OneToNRelationshipFieldAccessorFactory {
    fn name(&self) -> &'static str {
        "one-to-n-relationship"
    }

    fn accept(&self, field: &FieldDescriptor) -> bool {
        matches!(
            field.kind,
            FieldKind::Relationships {
                read_only: false,
                ..
            }
        )
    }

    fn create(
        &self,
        field: &Arc<FieldDescriptor>,
        ctx: &GraphContext,
    ) -> Result<Arc<dyn FieldAccessor>> {
        let spec = relationship_parts(field)?;
        Ok(Arc::new(OneToNRelationshipFieldAccessor::new(
            Arc::clone(field),
            spec.rel_type().to_string(),
            spec.direction,
            ctx.entity_type(&spec.target)?,
            false,
        )))
    }
}

/// Read-only relationship collections.
#[derive(Debug, Default)]
pub struct ReadOnlyOneToNRelationshipFieldAccessorFactory;

impl FieldAccessorFactory for ReadOnlyOneToNRelationshipFieldAccessorFactory {
    fn name(&self) -> &'static str {
        "read-only-one-to-n-relationship"
    }

    fn accept(&self, field: &FieldDescriptor) -> bool {
        matches!(field.kind, FieldKind::Relationships { read_only: true, .. })
    }

    fn create(
        &self,
        field: &Arc<FieldDescriptor>,
        ctx: &GraphContext,
    ) -> Result<Arc<dyn FieldAccessor>> {
        let spec = relationship_parts(field)?;
        Ok(Arc::new(OneToNRelationshipFieldAccessor::new(
            Arc::clone(field),
            spec.rel_type().to_string(),
            spec.direction,
            ctx.entity_type(&spec.target)?,
            true,
        )))
    }
}

/// Traversal fields.
#[derive(Debug, Default)]
pub struct TraversalFieldAccessorFactory;

impl FieldAccessorFactory for TraversalFieldAccessorFactory {
    fn name(&self) -> &'static str {
        "traversal"
    }

    fn accept(&self, field: &FieldDescriptor) -> bool {
        matches!(field.kind, FieldKind::Traversal { .. })
    }

    fn create(
        &self,
        field: &Arc<FieldDescriptor>,
        ctx: &GraphContext,
    ) -> Result<Arc<dyn FieldAccessor>> {
        let FieldKind::Traversal {
            target,
            description,
        } = &field.kind
        else {
            return Err(GraphError::usage(format!(
                "{} is not a traversal field",
                field.qualified_name()
            )));
        };
        Ok(Arc::new(TraversalFieldAccessor::new(
            Arc::clone(field),
            ctx.entity_type(target)?,
            description.clone(),
        )))
    }
}

/// Collections of relationship entities.
#[derive(Debug, Default)]
pub struct RelationshipEntityFieldAccessorFactory;

impl FieldAccessorFactory for RelationshipEntityFieldAccessorFactory {
    fn name(&self) -> &'static str {
        "one-to-n-relationship-entity"
    }

    fn accept(&self, field: &FieldDescriptor) -> bool {
        matches!(field.kind, FieldKind::RelationshipEntities(_))
    }

    fn create(
        &self,
        field: &Arc<FieldDescriptor>,
        ctx: &GraphContext,
    ) -> Result<Arc<dyn FieldAccessor>> {
        let spec = relationship_parts(field)?;
        Ok(Arc::new(RelationshipEntitiesFieldAccessor::new(
            Arc::clone(field),
            spec.rel_type().to_string(),
            spec.direction,
            ctx.entity_type(&spec.target)?,
        )))
    }
}

/// Start and end node fields of relationship entities.
#[derive(Debug, Default)]
pub struct RelationshipEndFieldAccessorFactory;

impl FieldAccessorFactory for RelationshipEndFieldAccessorFactory {
    fn name(&self) -> &'static str {
        "relationship-node"
    }

    fn accept(&self, field: &FieldDescriptor) -> bool {
        matches!(
            field.kind,
            FieldKind::StartNode { .. } | FieldKind::EndNode { .. }
        )
    }

    fn create(
        &self,
        field: &Arc<FieldDescriptor>,
        ctx: &GraphContext,
    ) -> Result<Arc<dyn FieldAccessor>> {
        let (end, target) = match &field.kind {
            FieldKind::StartNode { target } => (RelationshipEnd::Start, target),
            FieldKind::EndNode { target } => (RelationshipEnd::End, target),
            _ => {
                return Err(GraphError::usage(format!(
                    "{} is not a relationship end field",
                    field.qualified_name()
                )))
            }
        };
        Ok(Arc::new(RelationshipEndFieldAccessor::new(
            Arc::clone(field),
            end,
            ctx.entity_type(target)?,
        )))
    }
}

/// Restricts a factory to fields marked graph-backed.
#[derive(Debug, Default)]
pub struct GraphBacked<F>(pub F);

impl<F: FieldAccessorFactory> FieldAccessorFactory for GraphBacked<F> {
    fn name(&self) -> &'static str {
        self.0.name()
    }

    fn accept(&self, field: &FieldDescriptor) -> bool {
        field.graph_backed && self.0.accept(field)
    }

    fn create(
        &self,
        field: &Arc<FieldDescriptor>,
        ctx: &GraphContext,
    ) -> Result<Arc<dyn FieldAccessor>> {
        self.0.create(field, ctx)
    }
}

/// Ordered set of factories; the first accepting factory wins.
pub struct FieldAccessorFactoryRegistry {
    factories: Vec<Box<dyn FieldAccessorFactory>>,
}

impl FieldAccessorFactoryRegistry {
    /// Registry without any factory.
    pub fn empty() -> Self {
        Self {
            factories: Vec::new(),
        }
    }

    /// Factories for node entities.
    pub fn node_entities() -> Self {
        Self::empty()
            .with(IdFieldAccessorFactory)
            .with(PropertyFieldAccessorFactory)
            .with(ConvertingPropertyFieldAccessorFactory)
            .with(SingleRelationshipFieldAccessorFactory)
            .with(OneToNRelationshipFieldAccessorFactory)
            .with(ReadOnlyOneToNRelationshipFieldAccessorFactory)
            .with(TraversalFieldAccessorFactory)
            .with(RelationshipEntityFieldAccessorFactory)
    }

    /// Factories for relationship entities.
    pub fn relationship_entities() -> Self {
        Self::empty()
            .with(IdFieldAccessorFactory)
            .with(PropertyFieldAccessorFactory)
            .with(ConvertingPropertyFieldAccessorFactory)
            .with(RelationshipEndFieldAccessorFactory)
    }

    /// Factories for cross-store entities: node factories limited to
    /// graph-backed fields.
    pub fn cross_store() -> Self {
        Self::empty()
            .with(GraphBacked(PropertyFieldAccessorFactory))
            .with(GraphBacked(ConvertingPropertyFieldAccessorFactory))
            .with(GraphBacked(SingleRelationshipFieldAccessorFactory))
            .with(GraphBacked(OneToNRelationshipFieldAccessorFactory))
            .with(GraphBacked(ReadOnlyOneToNRelationshipFieldAccessorFactory))
            .with(GraphBacked(TraversalFieldAccessorFactory))
            .with(GraphBacked(RelationshipEntityFieldAccessorFactory))
    }

    /// Appends a factory with the lowest priority.
    pub fn with(mut self, factory: impl FieldAccessorFactory + 'static) -> Self {
        self.factories.push(Box::new(factory));
        self
    }

    /// First factory accepting `field`.
    pub fn factory_for(&self, field: &FieldDescriptor) -> Option<&dyn FieldAccessorFactory> {
        self.factories
            .iter()
            .find(|factory| factory.accept(field))
            .map(|factory| factory.as_ref())
    }

    /// Names of every factory accepting `field`, in priority order.
    pub fn accepting(&self, field: &FieldDescriptor) -> Vec<&'static str> {
        self.factories
            .iter()
            .filter(|factory| factory.accept(field))
            .map(|factory| factory.name())
            .collect()
    }

    /// Accessor for `field`, or `None` when no factory handles it.
    pub fn accessor_for(
        &self,
        field: &Arc<FieldDescriptor>,
        ctx: &GraphContext,
    ) -> Result<Option<Arc<dyn FieldAccessor>>> {
        self.factory_for(field)
            .map(|factory| factory.create(field, ctx))
            .transpose()
    }
}

impl std::fmt::Debug for FieldAccessorFactoryRegistry {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_list()
            .entries(self.factories.iter().map(|factory| factory.name()))
            .finish()
    }
}
