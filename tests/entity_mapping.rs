mod common;

use std::sync::Arc;

use common::{fixture, in_tx, Fixture};
use umbra::{
    BackingStore, EntitySchema, FieldDescriptor, GraphContext, GraphError, MappingConfig,
    MemoryGraph, PropertyValue, Result, Value,
};

#[test]
fn person_properties_round_trip_through_the_record() -> Result<()> {
    let Fixture { graph, ctx } = fixture();

    let michael = in_tx(&ctx, || {
        let person = ctx.create("Person")?;
        person.write("name", "Michael")?;
        person.write("age", 35)?;
        Ok(person)
    })?;

    let record = michael.record().expect("bound inside the transaction");
    assert_eq!(
        graph.get_property(record, "Person.name")?,
        Some(PropertyValue::from("Michael"))
    );
    assert_eq!(graph.get_property(record, "Person.age")?, Some(PropertyValue::Int(35)));

    let refetched = ctx
        .finder("Person")?
        .find_by_id(record.raw())?
        .expect("person by id");
    assert_eq!(refetched, michael);
    assert_eq!(refetched.read("name")?.as_str(), Some("Michael"));
    assert_eq!(refetched.read("age")?.as_int(), Some(35));
    Ok(())
}

#[test]
fn values_written_before_a_transaction_are_flushed_on_binding() -> Result<()> {
    let Fixture { graph, ctx } = fixture();

    let ada = ctx.create("Person")?;
    ada.write("name", "Ada")?;
    ada.write("height", 1.68)?;
    assert!(!ada.is_bound());
    assert_eq!(ada.read("name")?.as_str(), Some("Ada"));
    assert_eq!(graph.stats().nodes, 0);

    in_tx(&ctx, || ada.ensure_bound())?;

    let record = ada.record().expect("bound");
    assert_eq!(graph.get_property(record, "Person.height")?, Some(PropertyValue::Float(1.68)));
    let found = ctx
        .finder("Person")?
        .find_by_property_value(Some("people"), "Person.name", "Ada")?;
    assert_eq!(found, Some(ada));
    Ok(())
}

#[test]
fn unbound_writes_are_checked_before_they_are_shadowed() -> Result<()> {
    let Fixture { graph, ctx } = fixture();

    let person = ctx.create("Person")?;
    person.write("personality", Value::Variant("INTROVERT".into()))?;
    let err = person.write("nickname", 1.5).unwrap_err();
    assert!(matches!(err, GraphError::InvalidArgument(_)));
    let err = person
        .write("personality", Value::Variant("SHY".into()))
        .unwrap_err();
    assert!(matches!(err, GraphError::Conversion { .. }));
    assert!(person.read("nickname")?.is_null());

    in_tx(&ctx, || person.ensure_bound())?;
    let record = person.record().expect("bound");
    assert_eq!(
        graph.get_property(record, "Person.personality")?,
        Some(PropertyValue::from("INTROVERT"))
    );
    assert_eq!(graph.get_property(record, "Person.nickname")?, None);
    Ok(())
}

#[test]
fn a_failed_flush_leaves_the_entity_unbound() -> Result<()> {
    let Fixture { graph, ctx } = fixture();

    let person = ctx.create("Person")?;
    person.write("name", "Michael")?;
    person.write("personality", Value::Variant("EXTROVERT".into()))?;
    person.write("spouse", &person)?;

    let tx = ctx.begin_transaction()?;
    assert!(person.ensure_bound().unwrap_err().is_usage());
    assert!(!person.is_bound());
    assert_eq!(graph.stats().nodes, 0);
    assert_eq!(graph.stats().index_entries, 0);
    tx.rollback()?;

    assert_eq!(person.read("name")?.as_str(), Some("Michael"));
    assert!(matches!(person.read("personality")?, Value::Variant(name) if name == "EXTROVERT"));

    person.write("spouse", Value::Null)?;
    in_tx(&ctx, || person.ensure_bound())?;
    let record = person.record().expect("bound");
    assert_eq!(graph.get_property(record, "Person.name")?, Some(PropertyValue::from("Michael")));
    assert_eq!(
        graph.get_property(record, "Person.personality")?,
        Some(PropertyValue::from("EXTROVERT"))
    );
    Ok(())
}

#[test]
fn bound_entities_only_write_inside_a_transaction() -> Result<()> {
    let Fixture { graph, ctx } = fixture();
    let person = in_tx(&ctx, || ctx.create("Person"))?;

    let err = person.write("name", "Grace").unwrap_err();
    assert!(matches!(err, GraphError::NotInTransaction(_)));
    assert!(err.is_retryable());
    assert_eq!(graph.get_property(person.record().unwrap(), "Person.name")?, None);
    Ok(())
}

#[test]
fn transient_fields_never_reach_the_store() -> Result<()> {
    let Fixture { graph, ctx } = fixture();

    let tx = ctx.begin_transaction()?;
    let person = ctx.create("Person")?;
    person.write("thought", "food")?;
    let record = person.record().unwrap();
    assert_eq!(graph.get_property(record, "Person.thought")?, None);
    assert_eq!(graph.get_property(record, "thought")?, None);

    graph.set_property(record, "Person.thought", PropertyValue::from("sleep"))?;
    assert_eq!(person.read("thought")?.as_str(), Some("food"));
    tx.commit()?;
    Ok(())
}

#[test]
fn converted_fields_store_variant_names() -> Result<()> {
    let Fixture { graph, ctx } = fixture();

    let tx = ctx.begin_transaction()?;
    let person = ctx.create("Person")?;
    person.write("personality", Value::Variant("INTROVERT".into()))?;
    let record = person.record().unwrap();
    assert_eq!(
        graph.get_property(record, "Person.personality")?,
        Some(PropertyValue::from("INTROVERT"))
    );
    assert!(matches!(person.read("personality")?, Value::Variant(name) if name == "INTROVERT"));

    let err = person.write("personality", "SHY").unwrap_err();
    assert!(matches!(
        err,
        GraphError::Conversion { ref field, .. } if field == "Person.personality"
    ));
    assert_eq!(
        graph.get_property(record, "Person.personality")?,
        Some(PropertyValue::from("INTROVERT"))
    );
    tx.commit()?;
    Ok(())
}

#[test]
fn indexed_writes_move_the_index_entry() -> Result<()> {
    let Fixture { ctx, .. } = fixture();
    let finder = ctx.finder("Person")?;

    let person = in_tx(&ctx, || {
        let person = ctx.create("Person")?;
        person.write("nickname", "Mike")?;
        Ok(person)
    })?;
    assert_eq!(
        finder.find_by_property_value(None, "Person.nickname", "Mike")?,
        Some(person.clone())
    );

    in_tx(&ctx, || person.write("nickname", "Micky"))?;
    assert_eq!(finder.find_by_property_value(None, "Person.nickname", "Mike")?, None);
    assert_eq!(
        finder.find_by_property_value(None, "Person.nickname", "Micky")?,
        Some(person.clone())
    );

    in_tx(&ctx, || person.write("nickname", Value::Null))?;
    assert!(finder.find_all_by_property_value(None, "Person.nickname", "Micky")?.is_empty());
    Ok(())
}

#[test]
fn unindexable_values_leave_the_previous_value_in_place() -> Result<()> {
    let Fixture { graph, ctx } = fixture();

    let tx = ctx.begin_transaction()?;
    let person = ctx.create("Person")?;
    person.write("nickname", "Mike")?;
    let err = person.write("nickname", 1.5).unwrap_err();
    assert!(matches!(err, GraphError::InvalidArgument(_)));

    let record = person.record().unwrap();
    assert_eq!(graph.get_property(record, "Person.nickname")?, Some(PropertyValue::from("Mike")));
    let found = ctx
        .finder("Person")?
        .find_by_property_value(None, "Person.nickname", "Mike")?;
    assert_eq!(found, Some(person));
    tx.commit()?;
    Ok(())
}

#[test]
fn id_fields_expose_the_record_and_reject_writes() -> Result<()> {
    let Fixture { ctx, .. } = fixture();
    let tx = ctx.begin_transaction()?;
    let person = ctx.create("Person")?;
    let raw = person.record().unwrap().raw();
    assert_eq!(person.read("id")?.as_int(), Some(raw as i64));
    assert!(person.write("id", 99).unwrap_err().is_usage());
    tx.commit()?;
    Ok(())
}

#[test]
fn unbound_entities_keep_a_locally_assigned_id() -> Result<()> {
    let Fixture { ctx, .. } = fixture();
    let person = ctx.create("Person")?;
    assert!(person.read("id")?.is_null());
    person.write("id", 99)?;
    assert_eq!(person.read("id")?.as_int(), Some(99));

    in_tx(&ctx, || person.ensure_bound())?;
    let raw = person.record().unwrap().raw();
    assert_eq!(person.read("id")?.as_int(), Some(raw as i64));
    assert!(person.write("id", 100).unwrap_err().is_usage());
    Ok(())
}

#[test]
fn unknown_fields_and_types_are_reported() -> Result<()> {
    let Fixture { ctx, .. } = fixture();
    let person = ctx.create("Person")?;
    assert!(person.read("salary").unwrap_err().is_usage());
    assert!(matches!(ctx.create("Planet"), Err(GraphError::NotFound("entity type"))));
    Ok(())
}

#[test]
fn defaults_apply_until_a_value_is_stored() -> Result<()> {
    let ctx = GraphContext::new(Arc::new(MemoryGraph::new()), MappingConfig::default());
    ctx.register(
        EntitySchema::node("Counter").field(FieldDescriptor::property("hits").default_value(0)),
    )?;

    let counter = ctx.create("Counter")?;
    assert_eq!(counter.read("hits")?.as_int(), Some(0));
    let tx = ctx.begin_transaction()?;
    assert_eq!(counter.read("hits")?.as_int(), Some(0));
    counter.write("hits", 3)?;
    assert_eq!(counter.read("hits")?.as_int(), Some(3));
    tx.commit()?;
    Ok(())
}

#[test]
fn subtypes_are_materialized_as_their_concrete_type() -> Result<()> {
    let Fixture { ctx, .. } = fixture();

    let person = in_tx(&ctx, || {
        let person = ctx.create("Person")?;
        let volvo = ctx.create("Volvo")?;
        volvo.write("brand", "Volvo")?;
        ctx.create("Toyota")?;
        person.write("car", &volvo)?;
        Ok(person)
    })?;

    let car = person.read("car")?.into_entity().expect("car");
    assert_eq!(car.entity_type().name(), "Volvo");
    assert_eq!(car.read("brand")?.as_str(), Some("Volvo"));

    assert_eq!(ctx.finder("Car")?.count()?, 2);
    assert_eq!(ctx.finder("Volvo")?.count()?, 1);
    let volvos = ctx.finder("Volvo")?.find_all()?;
    assert_eq!(volvos, vec![car]);
    Ok(())
}

#[test]
fn records_of_unrelated_types_are_not_found_by_id() -> Result<()> {
    let Fixture { ctx, .. } = fixture();
    let person = in_tx(&ctx, || ctx.create("Person"))?;
    let raw = person.record().unwrap().raw();

    assert!(ctx.finder("Car")?.find_by_id(raw)?.is_none());
    assert!(ctx.finder("Person")?.find_by_id(raw + 100)?.is_none());
    Ok(())
}

#[test]
fn removed_entities_disappear_from_finders_and_indexes() -> Result<()> {
    let Fixture { graph, ctx } = fixture();

    let person = in_tx(&ctx, || {
        let person = ctx.create("Person")?;
        person.write("nickname", "Ghost")?;
        Ok(person)
    })?;
    assert!(person.remove().unwrap_err().is_retryable());

    in_tx(&ctx, || person.remove())?;
    let finder = ctx.finder("Person")?;
    assert_eq!(finder.count()?, 0);
    assert!(finder.find_by_property_value(None, "Person.nickname", "Ghost")?.is_none());
    assert_eq!(graph.stats().index_entries, 0);
    Ok(())
}
