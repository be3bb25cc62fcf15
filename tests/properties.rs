//! Property-based tests for the ledger, cursor and codec.
//!
//! Random sequences of API dumps are folded into a history the way a merge
//! does, then replayed and round-tripped.

use std::collections::BTreeMap;

use proptest::prelude::*;

use api_history::merge::sort_actions;
use api_history::{
    codec, diff, Build, Class, Cursor, Enum, EnumItem, Fields, Member, MemberKind, Root, Snapshot,
    TypeDesc, UpdateId, Value,
};

fn value() -> impl Strategy<Value = Value> {
    prop_oneof![
        any::<bool>().prop_map(Value::Bool),
        (0i64..4).prop_map(Value::Int),
        prop::sample::select(vec!["Data", "Behavior"]).prop_map(|s| Value::Text(String::from(s))),
        prop::sample::select(vec!["int", "float"])
            .prop_map(|n| Value::Type(TypeDesc::new("Primitive", n))),
        prop::collection::vec(prop::sample::select(vec!["Hidden", "ReadOnly"]), 0..3)
            .prop_map(|t| Value::Tags(t.into_iter().map(String::from).collect())),
    ]
}

fn fields() -> impl Strategy<Value = Fields> {
    prop::collection::btree_map(
        prop::sample::select(vec!["Category", "Tags", "ValueType"]).prop_map(String::from),
        value(),
        0..3,
    )
}

fn member() -> impl Strategy<Value = Member> {
    let kind = prop_oneof![
        Just(MemberKind::Property),
        Just(MemberKind::Function),
        Just(MemberKind::Event),
        Just(MemberKind::Callback),
    ];
    (kind, fields()).prop_map(|(kind, fields)| Member { kind, fields })
}

fn class() -> impl Strategy<Value = Class> {
    let members = prop::collection::btree_map(
        prop::sample::select(vec!["x", "y", "z"]).prop_map(String::from),
        member(),
        0..3,
    );
    (fields(), members).prop_map(|(fields, members)| Class { fields, members })
}

fn enum_() -> impl Strategy<Value = Enum> {
    let items = prop::collection::btree_map(
        prop::sample::select(vec!["i", "j"]).prop_map(String::from),
        fields().prop_map(|fields| EnumItem { fields }),
        0..2,
    );
    (fields(), items).prop_map(|(fields, items)| Enum { fields, items })
}

fn snapshot() -> impl Strategy<Value = Snapshot> {
    let classes: BoxedStrategy<BTreeMap<String, Class>> = prop::collection::btree_map(
        prop::sample::select(vec!["A", "B", "C"]).prop_map(String::from),
        class(),
        0..3,
    )
    .boxed();
    let enums = prop::collection::btree_map(
        prop::sample::select(vec!["E", "F"]).prop_map(String::from),
        enum_(),
        0..2,
    );
    (classes, enums).prop_map(|(classes, enums)| Snapshot { classes, enums })
}

/// Fold snapshots into a history one update per snapshot.
fn chain(snapshots: &[Snapshot]) -> Root {
    let mut root = Root::new();
    let mut prev: Option<&Snapshot> = None;
    for (i, next) in snapshots.iter().enumerate() {
        let mut actions = diff(prev, next);
        sort_actions(&mut actions);
        let date = chrono::DateTime::from_timestamp(1_577_836_800 + i as i64 * 86_400, 0)
            .expect("valid timestamp");
        root.append_update(&Build::new(&format!("g{i}"), date), actions, prev);
        prev = Some(next);
    }
    root
}

proptest! {
    #![proptest_config(ProptestConfig::with_cases(128))]

    #[test]
    fn cursor_reconstructs_every_build(snapshots in prop::collection::vec(snapshot(), 1..6)) {
        let root = chain(&snapshots);
        for (k, expected) in snapshots.iter().enumerate() {
            let mut cursor = Cursor::new();
            prop_assert!(cursor.roll(&root, UpdateId(k)));
            prop_assert_eq!(cursor.dump(), expected);
        }
    }

    #[test]
    fn cursor_back_and_forth_is_reversible(snapshots in prop::collection::vec(snapshot(), 1..6)) {
        let root = chain(&snapshots);
        let last = UpdateId(snapshots.len() - 1);

        let mut direct = Cursor::new();
        prop_assert!(direct.roll(&root, last));

        let mut cursor = Cursor::new();
        prop_assert!(cursor.roll(&root, last));
        prop_assert!(cursor.roll(&root, UpdateId(0)));
        prop_assert_eq!(cursor.dump(), &snapshots[0]);
        prop_assert!(cursor.roll(&root, last));
        prop_assert_eq!(cursor.dump(), direct.dump());
    }

    #[test]
    fn codec_round_trip(snapshots in prop::collection::vec(snapshot(), 0..5)) {
        let root = chain(&snapshots);
        let decoded = codec::decode(&codec::encode(&root).unwrap()).unwrap();
        prop_assert_eq!(decoded.changes(), root.changes());
        prop_assert_eq!(decoded.updates(), root.updates());
        prop_assert_eq!(decoded.objects(), root.objects());
    }

    #[test]
    fn indexes_rederive_from_changes(snapshots in prop::collection::vec(snapshot(), 0..5)) {
        let root = chain(&snapshots);
        prop_assert_eq!(&root.reindex(), root.objects());
    }
}
