mod common;

use common::{fixture, Fixture};
use umbra::store::TxState;
use umbra::{BackingStore, GraphError, NodeId, PropertyValue, RecordId, Result};

#[test]
fn rollback_discards_records_and_index_entries() -> Result<()> {
    let Fixture { graph, ctx } = fixture();

    let tx = ctx.begin_transaction()?;
    let person = ctx.create("Person")?;
    person.write("nickname", "Temp")?;
    assert_eq!(graph.stats().nodes, 1);
    tx.rollback()?;

    assert_eq!(graph.stats().nodes, 0);
    assert_eq!(graph.stats().index_entries, 0);
    assert!(ctx
        .finder("Person")?
        .find_by_property_value(None, "Person.nickname", "Temp")?
        .is_none());
    Ok(())
}

#[test]
fn dropping_an_active_guard_rolls_back() -> Result<()> {
    let Fixture { graph, ctx } = fixture();
    {
        let _tx = ctx.begin_transaction()?;
        ctx.create("Group")?;
        assert!(ctx.in_transaction());
    }
    assert!(!ctx.in_transaction());
    assert_eq!(graph.stats().nodes, 0);
    Ok(())
}

#[test]
fn guards_report_their_state() -> Result<()> {
    let Fixture { ctx, .. } = fixture();
    let tx = ctx.begin_transaction()?;
    assert_eq!(tx.state(), TxState::Active);
    tx.commit()?;

    let tx = ctx.begin_transaction()?;
    assert!(tx.id() > 1);
    tx.rollback()?;
    Ok(())
}

#[test]
fn only_one_transaction_is_active_at_a_time() -> Result<()> {
    let Fixture { graph, ctx } = fixture();
    let tx = ctx.begin_transaction()?;
    let err = graph.begin_transaction().unwrap_err();
    assert!(matches!(err, GraphError::InvalidArgument(_)));
    tx.commit()?;
    Ok(())
}

#[test]
fn store_mutations_outside_a_transaction_are_retryable() {
    let Fixture { graph, .. } = fixture();
    let err = graph.create_node().unwrap_err();
    assert!(err.is_retryable());

    let err = graph
        .set_property(RecordId::Node(NodeId(1)), "name", PropertyValue::from("x"))
        .unwrap_err();
    assert!(matches!(err, GraphError::NotInTransaction(_)));
}

#[test]
fn reads_never_need_a_transaction() -> Result<()> {
    let Fixture { graph, ctx } = fixture();
    let tx = ctx.begin_transaction()?;
    let group = ctx.create("Group")?;
    group.write("name", "Chess club")?;
    tx.commit()?;

    assert_eq!(group.read("name")?.as_str(), Some("Chess club"));
    assert!(group.read("unindexedName")?.is_null());
    assert_eq!(
        graph.get_property(group.record().unwrap(), "name")?,
        Some(PropertyValue::from("Chess club"))
    );
    Ok(())
}

#[test]
fn missing_records_are_not_found() -> Result<()> {
    let Fixture { ctx, .. } = fixture();
    let err = ctx.entity(RecordId::Node(NodeId(404)), "Person").unwrap_err();
    assert!(matches!(err, GraphError::NotFound("node")));

    let err = ctx.entity(RecordId::Node(NodeId(404)), "Friendship").unwrap_err();
    assert!(err.is_usage());
    Ok(())
}
