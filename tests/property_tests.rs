mod common;

use common::{fixture, Fixture};
use proptest::prelude::*;
use umbra::{BackingStore, Direction, Value};

fn arb_nickname() -> impl Strategy<Value = Option<String>> {
    prop_oneof![
        1 => Just(None),
        4 => "[a-d]{1,2}".prop_map(Some),
    ]
}

proptest! {
    #[test]
    fn prop_index_follows_the_latest_write(writes in prop::collection::vec(arb_nickname(), 1..20)) {
        let Fixture { ctx, .. } = fixture();
        let finder = ctx.finder("Person").unwrap();
        let tx = ctx.begin_transaction().unwrap();
        let person = ctx.create("Person").unwrap();

        let mut previous: Option<String> = None;
        for nickname in writes {
            let value = nickname.clone().map_or(Value::Null, Value::from);
            person.write("nickname", value).unwrap();

            if let Some(current) = &nickname {
                let found = finder
                    .find_by_property_value(None, "Person.nickname", current.as_str())
                    .unwrap();
                prop_assert_eq!(found, Some(person.clone()));
            }
            if let Some(old) = previous.filter(|old| Some(old) != nickname.as_ref()) {
                let found = finder
                    .find_all_by_property_value(None, "Person.nickname", old.as_str())
                    .unwrap();
                prop_assert!(found.is_empty());
            }
            previous = nickname;
        }
        tx.commit().unwrap();
    }

    #[test]
    fn prop_single_relationship_keeps_at_most_one_edge(
        targets in prop::collection::vec(prop::option::of(0usize..3), 1..20)
    ) {
        let Fixture { graph, ctx } = fixture();
        let tx = ctx.begin_transaction().unwrap();
        let owner = ctx.create("Person").unwrap();
        let candidates: Vec<_> = (0..3).map(|_| ctx.create("Person").unwrap()).collect();
        let owner_node = owner.node_id().unwrap();

        for target in targets {
            let value = target.map_or(Value::Null, |idx| Value::from(&candidates[idx]));
            owner.write("spouse", value).unwrap();

            let edges = graph
                .relationships(owner_node, Some("Person.spouse"), Direction::Outgoing)
                .unwrap();
            prop_assert_eq!(edges.len(), usize::from(target.is_some()));
            let current = owner.read("spouse").unwrap().into_entity();
            prop_assert_eq!(current, target.map(|idx| candidates[idx].clone()));
        }
        tx.commit().unwrap();
    }
}
