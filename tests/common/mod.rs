#![allow(dead_code)]

use std::sync::Arc;

use umbra::{
    Direction, EntitySchema, EnumConverter, FieldDescriptor, GraphContext, MappingConfig,
    MemoryGraph, Result, TraversalDescription,
};

pub const PERSONS: &str = "Group.persons";

pub struct Fixture {
    pub graph: Arc<MemoryGraph>,
    pub ctx: Arc<GraphContext>,
}

/// Context over a fresh store with the sample domain registered.
pub fn fixture() -> Fixture {
    let graph = Arc::new(MemoryGraph::new());
    let ctx = GraphContext::new(graph.clone(), MappingConfig::cross_store());
    register_domain(&ctx).expect("register sample domain");
    Fixture { graph, ctx }
}

pub fn register_domain(ctx: &GraphContext) -> Result<()> {
    ctx.register_converter("personality", EnumConverter::new(["INTROVERT", "EXTROVERT"]));

    ctx.register(EntitySchema::node("Car").field(FieldDescriptor::property("brand")))?;
    ctx.register(EntitySchema::node("Volvo").extends("Car"))?;
    ctx.register(EntitySchema::node("Toyota").extends("Car"))?;

    ctx.register(
        EntitySchema::node("Person")
            .field(FieldDescriptor::id("id"))
            .field(FieldDescriptor::property("name").indexed_in("people"))
            .field(FieldDescriptor::property("age"))
            .field(FieldDescriptor::property("height"))
            .field(FieldDescriptor::property("nickname").indexed())
            .field(FieldDescriptor::converted("personality", "personality"))
            .field(FieldDescriptor::transient("thought"))
            .field(FieldDescriptor::relationship("spouse", "Person"))
            .field(FieldDescriptor::relationship("mother", "Person").rel_type("mother"))
            .field(
                FieldDescriptor::relationship("boss", "Person")
                    .rel_type("boss")
                    .direction(Direction::Incoming),
            )
            .field(FieldDescriptor::relationship("car", "Car"))
            .field(
                FieldDescriptor::relationship_entities("friendships", "Friendship")
                    .rel_type("knows"),
            ),
    )?;

    ctx.register(
        EntitySchema::relationship("Friendship")
            .field(FieldDescriptor::start_node("person1", "Person"))
            .field(FieldDescriptor::end_node("person2", "Person"))
            .field(FieldDescriptor::property("years").indexed())
            .field(FieldDescriptor::converted("firstMeetingDate", "timestamp-millis"))
            .field(FieldDescriptor::transient("latestLocation")),
    )?;

    ctx.register(
        EntitySchema::node("Group")
            .field(FieldDescriptor::property("name").stored_as("name").indexed())
            .field(FieldDescriptor::property("unindexedName"))
            .field(FieldDescriptor::relationships("persons", "Person"))
            .field(
                FieldDescriptor::read_only_relationships("readOnlyPersons", "Person")
                    .rel_type(PERSONS),
            )
            .field(FieldDescriptor::traversal(
                "people",
                "Person",
                TraversalDescription::new().relationship(PERSONS).max_depth(1),
            )),
    )?;

    ctx.register(
        EntitySchema::cross_store("Customer")
            .field(FieldDescriptor::foreign_id("id"))
            .field(FieldDescriptor::property("name"))
            .field(FieldDescriptor::property("nickname").graph_backed().indexed())
            .field(FieldDescriptor::relationship("friend", "Person").graph_backed()),
    )?;

    ctx.verify()
}

/// Runs `f` in a transaction that is committed when it succeeds.
pub fn in_tx<T>(ctx: &GraphContext, f: impl FnOnce() -> Result<T>) -> Result<T> {
    let tx = ctx.begin_transaction()?;
    let value = f()?;
    tx.commit()?;
    Ok(value)
}
