use std::fmt;
use std::sync::Arc;

use tracing::trace;

use super::accessor::AccessContext;
use super::factory::GraphBacked;
use crate::context::GraphContext;
use crate::error::{GraphError, Result};
use crate::model::{IndexableValue, PropertyValue};
use crate::schema::FieldDescriptor;

/// Side effect run after a successful write of a bound field.
pub trait FieldAccessListener: Send + Sync + fmt::Debug {
    /// Called with the stored property before and after the write.
    fn value_changed(
        &self,
        cx: &AccessContext<'_>,
        previous: Option<&PropertyValue>,
        current: Option<&PropertyValue>,
    ) -> Result<()>;

    /// Rejects a property this listener could not record, before it is
    /// written.
    fn check(&self, _current: Option<&PropertyValue>) -> Result<()> {
        Ok(())
    }
}

/// Decides whether a field gets a listener and builds it.
pub trait FieldAccessorListenerFactory: Send + Sync {
    /// Name shown in diagnostics.
    fn name(&self) -> &'static str;

    /// Whether `field` gets a listener from this factory.
    fn accept(&self, field: &FieldDescriptor) -> bool;

    /// Builds the listener for an accepted field.
    fn create(
        &self,
        field: &Arc<FieldDescriptor>,
        ctx: &GraphContext,
    ) -> Result<Arc<dyn FieldAccessListener>>;
}

/// Keeps an index entry in step with an indexed property.
#[derive(Debug)]
pub struct IndexingFieldAccessListener {
    field: Arc<FieldDescriptor>,
    index: String,
}

impl IndexingFieldAccessListener {
    /// Listener maintaining `index` for `field`.
    pub fn new(field: Arc<FieldDescriptor>, index: String) -> Self {
        Self { field, index }
    }
}

impl FieldAccessListener for IndexingFieldAccessListener {
    fn value_changed(
        &self,
        cx: &AccessContext<'_>,
        previous: Option<&PropertyValue>,
        current: Option<&PropertyValue>,
    ) -> Result<()> {
        self.check(current)?;
        let store = cx.store();
        let key = self.field.key();
        if previous.is_some() {
            store.remove_from_index(cx.record, &self.index, key)?;
        }
        if let Some(value) = current {
            store.index(cx.record, &self.index, key, value)?;
        }
        trace!(record = %cx.record, index = %self.index, key, "index entry updated");
        Ok(())
    }

    fn check(&self, current: Option<&PropertyValue>) -> Result<()> {
        if let Some(value) = current {
            IndexableValue::try_from(value)?;
        }
        Ok(())
    }
}

/// Indexing for indexed property and converted fields.
#[derive(Debug, Default)]
pub struct IndexingFieldAccessorListenerFactory;

impl FieldAccessorListenerFactory for IndexingFieldAccessorListenerFactory {
    fn name(&self) -> &'static str {
        "indexing"
    }

    fn accept(&self, field: &FieldDescriptor) -> bool {
        field.kind.is_property() && field.index().is_some()
    }

    fn create(
        &self,
        field: &Arc<FieldDescriptor>,
        _ctx: &GraphContext,
    ) -> Result<Arc<dyn FieldAccessListener>> {
        let index = field.index().ok_or_else(|| {
            GraphError::usage(format!("{} is not indexed", field.qualified_name()))
        })?;
        Ok(Arc::new(IndexingFieldAccessListener::new(
            Arc::clone(field),
            index.to_string(),
        )))
    }
}

impl<F: FieldAccessorListenerFactory> FieldAccessorListenerFactory for GraphBacked<F> {
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
    ) -> Result<Arc<dyn FieldAccessListener>> {
        self.0.create(field, ctx)
    }
}

/// Listener factories consulted for every field; all accepting ones apply.
pub struct ListenerFactoryRegistry {
    factories: Vec<Box<dyn FieldAccessorListenerFactory>>,
}

impl ListenerFactoryRegistry {
    /// Registry without any factory.
    pub fn empty() -> Self {
        Self {
            factories: Vec::new(),
        }
    }

    /// Listeners for node and relationship entities.
    pub fn entities() -> Self {
        Self::empty().with(IndexingFieldAccessorListenerFactory)
    }

    /// Listeners for cross-store entities, limited to graph-backed fields.
    pub fn cross_store() -> Self {
        Self::empty().with(GraphBacked(IndexingFieldAccessorListenerFactory))
    }

    /// Appends a factory.
    pub fn with(mut self, factory: impl FieldAccessorListenerFactory + 'static) -> Self {
        self.factories.push(Box::new(factory));
        self
    }

    /// Names of the factories accepting `field`.
    pub fn accepting(&self, field: &FieldDescriptor) -> Vec<&'static str> {
        self.factories
            .iter()
            .filter(|factory| factory.accept(field))
            .map(|factory| factory.name())
            .collect()
    }

    /// Listeners for `field`.
    pub fn listeners_for(
        &self,
        field: &Arc<FieldDescriptor>,
        ctx: &GraphContext,
    ) -> Result<Vec<Arc<dyn FieldAccessListener>>> {
        self.factories
            .iter()
            .filter(|factory| factory.accept(field))
            .map(|factory| factory.create(field, ctx))
            .collect()
    }
}

impl fmt::Debug for ListenerFactoryRegistry {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_list()
            .entries(self.factories.iter().map(|factory| factory.name()))
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn only_indexed_property_fields_get_the_indexing_listener() {
        let registry = ListenerFactoryRegistry::entities();
        let mut indexed = FieldDescriptor::property("nickname").indexed();
        indexed.index_name = Some("node".into());
        assert_eq!(registry.accepting(&indexed), vec!["indexing"]);
        assert!(registry
            .accepting(&FieldDescriptor::property("age"))
            .is_empty());

        let cross_store = ListenerFactoryRegistry::cross_store();
        assert!(cross_store.accepting(&indexed).is_empty());
        assert_eq!(
            cross_store.accepting(&indexed.graph_backed()),
            vec!["indexing"]
        );
    }
}
