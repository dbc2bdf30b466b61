use std::collections::BTreeMap;
use std::fmt;
use std::sync::Arc;

use parking_lot::Mutex;
use tracing::{debug, warn};

use super::accessor::{not_writable, AccessContext, FieldAccessor};
use super::listener::FieldAccessListener;
use super::partial::ForeignIdBinding;
use crate::context::GraphContext;
use crate::error::{GraphError, Result};
use crate::model::RecordId;
use crate::schema::{EntityKind, EntityType, FieldDescriptor, FieldKind};
use crate::value::Value;

/// Outcome of an attempt to give an entity its backing record.
#[derive(Copy, Clone, Debug, PartialEq, Eq)]
pub enum Binding {
    /// A new record was created.
    Created(RecordId),
    /// An existing record was found.
    Existing(RecordId),
    /// Binding is postponed; this is not an error.
    Deferred,
}

/// Policy deciding how an unbound entity obtains its record.
pub trait StateBinding: Send + Sync + fmt::Debug {
    /// Finds or creates the record for `state`.
    fn bind(&self, ctx: &Arc<GraphContext>, state: &EntityStateAccessor) -> Result<Binding>;

    /// Whether writing `field` should attempt binding right away.
    fn binds_on(&self, _field: &FieldDescriptor) -> bool {
        false
    }

    /// Called when an entity is wrapped around an already existing record.
    fn attach(
        &self,
        _ctx: &Arc<GraphContext>,
        _record: RecordId,
        _state: &EntityStateAccessor,
    ) -> Result<()> {
        Ok(())
    }
}

/// Default policy: create a node as soon as a transaction is active.
#[derive(Debug, Default)]
pub struct NodeBinding;

impl StateBinding for NodeBinding {
    fn bind(&self, ctx: &Arc<GraphContext>, state: &EntityStateAccessor) -> Result<Binding> {
        let entity_type = state.entity_type();
        if !ctx.in_transaction() {
            return Err(GraphError::not_in_transaction(format!(
                "create node for {}",
                entity_type.name()
            )));
        }
        let record = RecordId::Node(ctx.store().create_node()?);
        ctx.post_entity_creation(record, entity_type)?;
        Ok(Binding::Created(record))
    }
}

/// Relationship entities are created bound by `relate_to` and never bind
/// lazily.
#[derive(Debug, Default)]
pub struct RelationshipBinding;

impl StateBinding for RelationshipBinding {
    fn bind(&self, _ctx: &Arc<GraphContext>, state: &EntityStateAccessor) -> Result<Binding> {
        Err(GraphError::usage(format!(
            "relationship entity {} can only be created with relate_to",
            state.entity_type().name()
        )))
    }
}

#[derive(Debug, Default)]
struct FieldState {
    record: Option<RecordId>,
    shadow: BTreeMap<usize, Value>,
    memory: BTreeMap<usize, Value>,
}

/// Per-entity coordinator of field reads and writes.
///
/// Holds one accessor and the listeners for every field the type stores in
/// the graph. Until the entity is bound, values of those fields live in a
/// local shadow that is written through on binding. Fields without an
/// accessor (transient ones, or fields owned by the other store of a
/// cross-store type) live in memory only.
pub struct EntityStateAccessor {
    entity_type: Arc<EntityType>,
    accessors: Vec<Option<Arc<dyn FieldAccessor>>>,
    listeners: Vec<Vec<Arc<dyn FieldAccessListener>>>,
    binding: Arc<dyn StateBinding>,
    state: Mutex<FieldState>,
}

impl EntityStateAccessor {
    pub(crate) fn new(ctx: &GraphContext, entity_type: Arc<EntityType>) -> Result<Self> {
        let kind = entity_type.kind();
        let factories = ctx.accessor_factories(kind);
        let listener_factories = ctx.listener_factories(kind);
        let mut accessors = Vec::with_capacity(entity_type.fields().len());
        let mut listeners = Vec::with_capacity(entity_type.fields().len());
        for field in entity_type.fields() {
            let accessor = factories.accessor_for(field, ctx)?;
            listeners.push(if accessor.is_some() {
                listener_factories.listeners_for(field, ctx)?
            } else {
                Vec::new()
            });
            accessors.push(accessor);
        }
        let binding: Arc<dyn StateBinding> = match kind {
            EntityKind::Node => Arc::new(NodeBinding),
            EntityKind::Relationship => Arc::new(RelationshipBinding),
            EntityKind::CrossStore => Arc::new(ForeignIdBinding),
        };
        Ok(Self {
            entity_type,
            accessors,
            listeners,
            binding,
            state: Mutex::new(FieldState::default()),
        })
    }

    /// Type of the entity.
    pub fn entity_type(&self) -> &Arc<EntityType> {
        &self.entity_type
    }

    /// Backing record, once bound.
    pub fn record(&self) -> Option<RecordId> {
        self.state.lock().record
    }

    /// In-memory value of a field without an accessor.
    pub fn memory_value(&self, field: &str) -> Value {
        let Some(idx) = self.entity_type.field_index(field) else {
            return Value::Null;
        };
        self.state
            .lock()
            .memory
            .get(&idx)
            .cloned()
            .unwrap_or(Value::Null)
    }

    pub(crate) fn set_memory_value(&self, field: &str, value: Value) {
        if let Some(idx) = self.entity_type.field_index(field) {
            self.state.lock().memory.insert(idx, value);
        }
    }

    pub(crate) fn attach(&self, ctx: &Arc<GraphContext>, record: RecordId) -> Result<()> {
        self.state.lock().record = Some(record);
        self.binding.attach(ctx, record, self)
    }

    fn field_index(&self, name: &str) -> Result<usize> {
        self.entity_type.field_index(name).ok_or_else(|| {
            GraphError::usage(format!(
                "{} has no field named {name}",
                self.entity_type.name()
            ))
        })
    }

    fn unset_value(&self, idx: usize) -> Value {
        self.entity_type.fields()[idx]
            .default
            .clone()
            .map_or(Value::Null, Value::from)
    }

    /// Returns the backing record, binding the entity if needed.
    ///
    /// `Ok(None)` means binding was deferred by the binding policy. Values
    /// written while unbound are checked before any record is touched and
    /// flushed through the regular write path once the record is assigned.
    /// If the flush fails the entity is left unbound with its shadow intact.
    pub fn ensure_bound(&self, ctx: &Arc<GraphContext>) -> Result<Option<RecordId>> {
        if let Some(record) = self.record() {
            return Ok(Some(record));
        }
        let shadowed = self.state.lock().shadow.clone();
        for (idx, value) in &shadowed {
            self.check_value(*idx, value)?;
        }
        let binding = self.binding.bind(ctx, self)?;
        let record = match binding {
            Binding::Deferred => {
                debug!(entity_type = %self.entity_type.name(), "binding deferred");
                return Ok(None);
            }
            Binding::Created(record) => {
                debug!(entity_type = %self.entity_type.name(), %record, "bound to new record");
                record
            }
            Binding::Existing(record) => {
                debug!(entity_type = %self.entity_type.name(), %record, "bound to existing record");
                record
            }
        };
        let pending = {
            let mut state = self.state.lock();
            if let Some(existing) = state.record {
                return Ok(Some(existing));
            }
            state.record = Some(record);
            std::mem::take(&mut state.shadow)
        };
        let flushed = pending
            .iter()
            .try_for_each(|(idx, value)| self.write_bound(ctx, *idx, record, value));
        if let Err(err) = flushed {
            self.abandon_binding(ctx, binding, pending);
            return Err(err);
        }
        Ok(Some(record))
    }

    /// Undoes a binding whose flush failed. The shadow is put back and a
    /// node created for this entity is deleted again.
    fn abandon_binding(
        &self,
        ctx: &Arc<GraphContext>,
        binding: Binding,
        pending: BTreeMap<usize, Value>,
    ) {
        {
            let mut state = self.state.lock();
            state.record = None;
            state.shadow = pending;
        }
        if let Binding::Created(RecordId::Node(node)) = binding {
            if let Err(err) = ctx.store().delete_node(node) {
                warn!(
                    entity_type = %self.entity_type.name(),
                    %node,
                    error = %err,
                    "failed to delete abandoned node"
                );
            }
        }
        debug!(entity_type = %self.entity_type.name(), "binding abandoned");
    }

    /// Checks that `value` can be written to field `idx` without writing it.
    fn check_value(&self, idx: usize, value: &Value) -> Result<()> {
        check_shadowable(&self.entity_type.fields()[idx], value)?;
        let Some(accessor) = &self.accessors[idx] else {
            return Ok(());
        };
        let encoded = accessor.encode(value)?;
        for listener in &self.listeners[idx] {
            listener.check(encoded.as_ref())?;
        }
        Ok(())
    }

    /// Reads a field. Inside a transaction the entity is bound first.
    pub fn read(&self, ctx: &Arc<GraphContext>, field: &str) -> Result<Value> {
        let idx = self.field_index(field)?;
        let Some(accessor) = &self.accessors[idx] else {
            let memory = self.state.lock().memory.get(&idx).cloned();
            return Ok(memory.unwrap_or_else(|| self.unset_value(idx)));
        };
        if ctx.in_transaction() {
            self.ensure_bound(ctx)?;
        }
        let (record, shadowed) = {
            let state = self.state.lock();
            let local = state.shadow.get(&idx).or_else(|| state.memory.get(&idx));
            (state.record, local.cloned())
        };
        match record {
            Some(record) => accessor.read(&AccessContext { ctx, record }),
            None => Ok(shadowed.unwrap_or_else(|| self.unset_value(idx))),
        }
    }

    /// Writes a field.
    ///
    /// Bound entities write through to the store and need an active
    /// transaction. Unbound entities keep the value in their shadow unless a
    /// transaction is active, in which case they bind first. Id fields take
    /// a locally assigned value until the entity is bound.
    pub fn write(&self, ctx: &Arc<GraphContext>, field: &str, value: Value) -> Result<()> {
        let idx = self.field_index(field)?;
        let descriptor = &self.entity_type.fields()[idx];
        if descriptor.kind == FieldKind::Id {
            let mut state = self.state.lock();
            if state.record.is_some() {
                return Err(not_writable(descriptor));
            }
            state.memory.insert(idx, value);
            return Ok(());
        }
        if !descriptor.kind.is_writable() {
            return Err(not_writable(descriptor));
        }

        if self.accessors[idx].is_none() {
            self.state.lock().memory.insert(idx, value);
            if self.binding.binds_on(descriptor) && ctx.in_transaction() {
                self.ensure_bound(ctx)?;
            }
            return Ok(());
        }

        if ctx.in_transaction() {
            self.ensure_bound(ctx)?;
        }
        match self.record() {
            Some(record) => {
                if !ctx.in_transaction() {
                    return Err(GraphError::not_in_transaction(format!(
                        "write {}",
                        descriptor.qualified_name()
                    )));
                }
                self.write_bound(ctx, idx, record, &value)
            }
            None => {
                self.check_value(idx, &value)?;
                self.state.lock().shadow.insert(idx, value);
                Ok(())
            }
        }
    }

    /// Writes through the accessor and runs the listeners. A failing
    /// listener restores the previous property so the write is not left
    /// half applied.
    fn write_bound(
        &self,
        ctx: &Arc<GraphContext>,
        idx: usize,
        record: RecordId,
        value: &Value,
    ) -> Result<()> {
        let Some(accessor) = &self.accessors[idx] else {
            return Ok(());
        };
        let cx = AccessContext { ctx, record };
        let listeners = &self.listeners[idx];
        if listeners.is_empty() {
            return accessor.write(&cx, value);
        }

        let field = &self.entity_type.fields()[idx];
        let store = ctx.store();
        let previous = store.get_property(record, field.key())?;
        accessor.write(&cx, value)?;
        let current = store.get_property(record, field.key())?;
        for listener in listeners {
            if let Err(err) = listener.value_changed(&cx, previous.as_ref(), current.as_ref()) {
                warn!(
                    field = %field.qualified_name(),
                    %record,
                    error = %err,
                    "listener failed; restoring property"
                );
                let restored = match &previous {
                    Some(value) => store.set_property(record, field.key(), value.clone()),
                    None => store.remove_property(record, field.key()).map(|_| ()),
                };
                if let Err(restore_err) = restored {
                    warn!(
                        field = %field.qualified_name(),
                        error = %restore_err,
                        "property restore failed"
                    );
                }
                return Err(err);
            }
        }
        Ok(())
    }
}

fn check_shadowable(field: &FieldDescriptor, value: &Value) -> Result<()> {
    let accepted = match &field.kind {
        FieldKind::Property => value.is_null() || value.to_property().is_some(),
        FieldKind::SingleRelationship(_) => matches!(value, Value::Null | Value::Entity(_)),
        _ => !matches!(
            value,
            Value::Entity(_) | Value::Entities(_) | Value::Relationships(_) | Value::Traversal(_)
        ),
    };
    if accepted {
        Ok(())
    } else {
        Err(GraphError::usage(format!(
            "{} cannot hold a {} value",
            field.qualified_name(),
            value.kind_name()
        )))
    }
}

impl fmt::Debug for EntityStateAccessor {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let state = self.state.lock();
        f.debug_struct("EntityStateAccessor")
            .field("entity_type", &self.entity_type.name())
            .field("record", &state.record)
            .field("shadowed", &state.shadow.len())
            .field("binding", &self.binding)
            .finish()
    }
}
