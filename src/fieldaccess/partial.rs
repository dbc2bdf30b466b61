//! Binding of cross-store entities through their foreign identity.

use std::sync::Arc;

use tracing::{debug, info};

use super::state::{Binding, EntityStateAccessor, StateBinding};
use crate::context::GraphContext;
use crate::error::{GraphError, Result};
use crate::model::{PropertyValue, RecordId};
use crate::schema::{FieldDescriptor, FieldKind};

/// Property and index key holding the foreign id on a node.
pub const FOREIGN_ID: &str = "foreignId";

/// Binding policy of entities owned by another persistence system.
///
/// An entity without a foreign id has not been persisted by its owner yet,
/// so binding is deferred. Once an id is present the node is looked up in
/// the foreign id index under `{Type}:{id}` and created only when missing.
/// The lookup and the create are two store calls; the store's transaction
/// isolation must keep concurrent binders of the same id apart.
#[derive(Debug, Default)]
pub struct ForeignIdBinding;

impl ForeignIdBinding {
    fn identity(state: &EntityStateAccessor) -> Result<&Arc<FieldDescriptor>> {
        state.entity_type().identity_field().ok_or_else(|| {
            GraphError::usage(format!(
                "cross-store type {} declares no foreign id field",
                state.entity_type().name()
            ))
        })
    }
}

/// Key of a foreign identity binding.
pub fn foreign_key(type_name: &str, id: &PropertyValue) -> PropertyValue {
    PropertyValue::String(format!("{type_name}:{id}"))
}

impl StateBinding for ForeignIdBinding {
    fn bind(&self, ctx: &Arc<GraphContext>, state: &EntityStateAccessor) -> Result<Binding> {
        let entity_type = state.entity_type();
        let identity = Self::identity(state)?;
        let id = state.memory_value(&identity.name);
        if id.is_null() {
            return Ok(Binding::Deferred);
        }
        if !ctx.in_transaction() {
            return Err(GraphError::not_in_transaction(format!(
                "bind cross-store {}",
                entity_type.name()
            )));
        }
        let id = id.to_property().ok_or_else(|| {
            GraphError::usage(format!(
                "foreign id {} must be a primitive, got {}",
                identity.qualified_name(),
                id.kind_name()
            ))
        })?;

        let store = ctx.store();
        let index = &ctx.config().foreign_id_index;
        let key = foreign_key(entity_type.name(), &id);
        if let Some(record) = store.single_indexed(index, FOREIGN_ID, &key)? {
            debug!(%record, foreign_id = %key, "foreign id already bound");
            return Ok(Binding::Existing(record));
        }

        let record = RecordId::Node(store.create_node()?);
        if store.get_property(record, FOREIGN_ID)?.is_none() {
            store.set_property(record, FOREIGN_ID, id)?;
            store.index(record, index, FOREIGN_ID, &key)?;
        }
        ctx.post_entity_creation(record, entity_type)?;
        info!(%record, foreign_id = %key, "created node for cross-store entity");
        Ok(Binding::Created(record))
    }

    fn binds_on(&self, field: &FieldDescriptor) -> bool {
        field.kind == FieldKind::ForeignId
    }

    fn attach(
        &self,
        ctx: &Arc<GraphContext>,
        record: RecordId,
        state: &EntityStateAccessor,
    ) -> Result<()> {
        let identity = Self::identity(state)?;
        if let Some(id) = ctx.store().get_property(record, FOREIGN_ID)? {
            state.set_memory_value(&identity.name, id.into());
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn keys_combine_type_and_id() {
        assert_eq!(
            foreign_key("Customer", &PropertyValue::Int(7)),
            PropertyValue::String("Customer:7".into())
        );
    }
}
