mod common;

use common::{fixture, in_tx, Fixture, PERSONS};
use time::macros::datetime;
use umbra::{
    BackingStore, Direction, GraphError, PropertyValue, Result, TraversalDescription, Value,
};

fn people(ctx: &std::sync::Arc<umbra::GraphContext>, names: &[&str]) -> Result<Vec<umbra::Entity>> {
    names
        .iter()
        .map(|name| {
            let person = ctx.create("Person")?;
            person.write("name", *name)?;
            Ok(person)
        })
        .collect()
}

#[test]
fn single_relationships_replace_their_edge() -> Result<()> {
    let Fixture { graph, ctx } = fixture();
    let tx = ctx.begin_transaction()?;
    let [michael, emil, andres]: [umbra::Entity; 3] = people(&ctx, &["Michael", "Emil", "Andres"])?
        .try_into()
        .unwrap();

    michael.write("spouse", &emil)?;
    assert_eq!(michael.read("spouse")?.into_entity(), Some(emil.clone()));

    michael.write("spouse", &andres)?;
    assert_eq!(michael.read("spouse")?.into_entity(), Some(andres.clone()));
    let edges = graph.relationships(
        michael.node_id().unwrap(),
        Some("Person.spouse"),
        Direction::Outgoing,
    )?;
    assert_eq!(edges.len(), 1);
    assert_eq!(edges[0].end, andres.node_id().unwrap());
    assert!(graph
        .relationships(emil.node_id().unwrap(), Some("Person.spouse"), Direction::Incoming)?
        .is_empty());

    michael.write("spouse", Value::Null)?;
    assert!(michael.read("spouse")?.is_null());
    assert_eq!(graph.stats().relationships, 0);
    tx.commit()?;
    Ok(())
}

#[test]
fn self_references_fail_without_touching_the_graph() -> Result<()> {
    let Fixture { graph, ctx } = fixture();
    let tx = ctx.begin_transaction()?;
    let [michael, emil]: [umbra::Entity; 2] =
        people(&ctx, &["Michael", "Emil"])?.try_into().unwrap();
    michael.write("spouse", &emil)?;

    let err = michael.write("spouse", &michael).unwrap_err();
    assert!(err.is_usage());
    assert_eq!(graph.stats().relationships, 1);
    assert_eq!(michael.read("spouse")?.into_entity(), Some(emil));

    let again = ctx.entity(michael.record().unwrap(), "Person")?;
    assert!(again.write("spouse", &michael).unwrap_err().is_usage());
    tx.commit()?;
    Ok(())
}

#[test]
fn explicit_types_and_directions_shape_the_edge() -> Result<()> {
    let Fixture { graph, ctx } = fixture();
    let tx = ctx.begin_transaction()?;
    let [michael, mother, boss]: [umbra::Entity; 3] =
        people(&ctx, &["Michael", "Anna", "Peter"])?.try_into().unwrap();

    michael.write("mother", &mother)?;
    michael.write("boss", &boss)?;

    let michael_node = michael.node_id().unwrap();
    let mothers = graph.relationships(michael_node, Some("mother"), Direction::Outgoing)?;
    assert_eq!(mothers[0].end, mother.node_id().unwrap());
    let bosses = graph.relationships(boss.node_id().unwrap(), Some("boss"), Direction::Outgoing)?;
    assert_eq!(bosses[0].end, michael_node);
    assert_eq!(michael.read("boss")?.into_entity(), Some(boss));
    tx.commit()?;
    Ok(())
}

#[test]
fn relationship_fields_check_their_target() -> Result<()> {
    let Fixture { ctx, .. } = fixture();
    let tx = ctx.begin_transaction()?;
    let [michael, emil]: [umbra::Entity; 2] =
        people(&ctx, &["Michael", "Emil"])?.try_into().unwrap();

    assert!(michael.write("car", &emil).unwrap_err().is_usage());
    assert!(michael.write("spouse", "Emil").unwrap_err().is_usage());
    tx.commit()?;
    Ok(())
}

#[test]
fn unbound_targets_are_bound_when_related() -> Result<()> {
    let Fixture { ctx, .. } = fixture();
    let volvo = ctx.create("Volvo")?;
    volvo.write("brand", "Volvo")?;
    assert!(!volvo.is_bound());

    let tx = ctx.begin_transaction()?;
    let michael = ctx.create("Person")?;
    michael.write("car", &volvo)?;
    assert!(volvo.is_bound());
    assert_eq!(volvo.read("brand")?.as_str(), Some("Volvo"));
    tx.commit()?;
    Ok(())
}

#[test]
fn removing_a_group_member_only_drops_that_edge() -> Result<()> {
    let Fixture { graph, ctx } = fixture();
    let tx = ctx.begin_transaction()?;
    let group = ctx.create("Group")?;
    let [michael, emil]: [umbra::Entity; 2] =
        people(&ctx, &["Michael", "Emil"])?.try_into().unwrap();

    let persons = group.related("persons")?;
    assert!(persons.add(&michael)?);
    assert!(persons.add(&emil)?);
    assert!(!persons.add(&emil)?);
    assert_eq!(persons.len()?, 2);

    assert!(persons.remove(&michael)?);
    assert_eq!(persons.to_vec()?, vec![emil.clone()]);
    let edges = graph.relationships(group.node_id().unwrap(), Some(PERSONS), Direction::Outgoing)?;
    assert_eq!(edges.len(), 1);
    assert_eq!(edges[0].end, emil.node_id().unwrap());
    assert!(!persons.contains(&michael)?);
    tx.commit()?;
    Ok(())
}

#[test]
fn collections_cannot_be_assigned_as_a_whole() -> Result<()> {
    let Fixture { ctx, .. } = fixture();
    let tx = ctx.begin_transaction()?;
    let group = ctx.create("Group")?;
    let michael = ctx.create("Person")?;
    let err = group.write("persons", &michael).unwrap_err();
    assert!(err.is_usage());
    assert!(group.related("persons")?.is_empty()?);
    tx.commit()?;
    Ok(())
}

#[test]
fn read_only_collections_reject_every_mutation() -> Result<()> {
    let Fixture { graph, ctx } = fixture();
    let tx = ctx.begin_transaction()?;
    let group = ctx.create("Group")?;
    let [michael, emil]: [umbra::Entity; 2] =
        people(&ctx, &["Michael", "Emil"])?.try_into().unwrap();
    group.related("persons")?.add(&michael)?;
    let before = graph.stats().relationships;

    let read_only = group.related("readOnlyPersons")?;
    assert!(read_only.is_read_only());
    assert_eq!(read_only.to_vec()?, vec![michael.clone()]);
    assert!(read_only.add(&emil).unwrap_err().is_usage());
    assert!(read_only.remove(&michael).unwrap_err().is_usage());
    let err = group.write("readOnlyPersons", &emil).unwrap_err();
    assert!(matches!(err, GraphError::Usage(ref message) if message.contains("read-only")));

    assert_eq!(graph.stats().relationships, before);
    assert_eq!(read_only.len()?, 1);
    tx.commit()?;
    Ok(())
}

#[test]
fn traversal_fields_walk_from_the_owner() -> Result<()> {
    let Fixture { ctx, .. } = fixture();
    let group = in_tx(&ctx, || {
        let group = ctx.create("Group")?;
        let persons = group.related("persons")?;
        for person in people(&ctx, &["Michael", "Emil"])? {
            persons.add(&person)?;
        }
        Ok(group)
    })?;

    let mut names: Vec<String> = group
        .traversal("people")?
        .map(|person| -> Result<String> {
            Ok(person?.read("name")?.as_str().unwrap_or_default().to_string())
        })
        .collect::<Result<_>>()?;
    names.sort();
    assert_eq!(names, ["Emil", "Michael"]);
    assert!(group.write("people", Value::Null).unwrap_err().is_usage());
    Ok(())
}

#[test]
fn traversals_skip_records_of_other_types() -> Result<()> {
    let Fixture { ctx, .. } = fixture();
    let michael = in_tx(&ctx, || {
        let [michael, emil, andres]: [umbra::Entity; 3] =
            people(&ctx, &["Michael", "Emil", "Andres"])?.try_into().unwrap();
        michael.write("spouse", &emil)?;
        emil.write("car", &ctx.create("Toyota")?)?;
        emil.write("mother", &andres)?;
        Ok(michael)
    })?;

    let reached = michael
        .traverse("Person", TraversalDescription::new())?
        .collect::<Result<Vec<_>>>()?;
    assert_eq!(reached.len(), 2);
    let cars = michael
        .traverse("Car", TraversalDescription::new().max_depth(2))?
        .to_vec()?;
    assert_eq!(cars.len(), 1);
    assert_eq!(cars[0].entity_type().name(), "Toyota");

    let spouses = ctx
        .finder("Person")?
        .find_all_by_traversal(&michael, TraversalDescription::new().relationship("Person.spouse"))?
        .to_vec()?;
    assert_eq!(spouses.len(), 1);
    Ok(())
}

#[test]
fn relationship_entities_carry_their_own_fields() -> Result<()> {
    let Fixture { graph, ctx } = fixture();
    let tx = ctx.begin_transaction()?;
    let [michael, emil]: [umbra::Entity; 2] =
        people(&ctx, &["Michael", "Emil"])?.try_into().unwrap();

    let friendship = michael.relate_to(&emil, "knows", "Friendship")?;
    friendship.write("years", 5)?;
    friendship.write("firstMeetingDate", datetime!(1970-01-01 0:00:00.003 UTC))?;
    friendship.write("latestLocation", "Malmo")?;

    let record = friendship.record().unwrap();
    assert_eq!(
        graph.get_property(record, "Friendship.firstMeetingDate")?,
        Some(PropertyValue::from("3"))
    );
    assert_eq!(graph.get_property(record, "Friendship.latestLocation")?, None);
    assert_eq!(friendship.read("person1")?.into_entity(), Some(michael.clone()));
    assert_eq!(friendship.read("person2")?.into_entity(), Some(emil.clone()));
    assert!(friendship.write("person1", &emil).unwrap_err().is_usage());
    tx.commit()?;

    assert_eq!(
        friendship.read("firstMeetingDate")?.as_timestamp(),
        Some(datetime!(1970-01-01 0:00:00.003 UTC))
    );
    let friendships = michael.relationship_entities("friendships")?.to_vec()?;
    assert_eq!(friendships, vec![friendship.clone()]);
    assert_eq!(michael.relationship_to(&emil, "knows", "Friendship")?, Some(friendship.clone()));
    assert_eq!(emil.relationship_to(&michael, "knows", "Friendship")?, None);

    let by_years = ctx
        .finder("Friendship")?
        .find_by_property_value(None, "Friendship.years", 5)?;
    assert_eq!(by_years, Some(friendship));
    Ok(())
}

#[test]
fn relationship_entities_are_only_created_by_relating() -> Result<()> {
    let Fixture { ctx, .. } = fixture();
    let _tx = ctx.begin_transaction()?;
    assert!(ctx.create("Friendship").unwrap_err().is_usage());

    let [michael, emil]: [umbra::Entity; 2] =
        people(&ctx, &["Michael", "Emil"])?.try_into().unwrap();
    assert!(michael.relate_to(&emil, "knows", "Person").unwrap_err().is_usage());
    Ok(())
}
