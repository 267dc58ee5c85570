mod common;

use common::{Money, Opaque, init_tracing, named_node, nested_lists, node, person};
use facsimile::duplicate::{CopyChain, CopyHint};
use facsimile::value::Object;
use facsimile::{Duplicator, EqualityEngine, Error, Result, Value};

fn duplicator() -> Duplicator {
    Duplicator::new(EqualityEngine::new())
}

#[test]
fn copies_are_equal_but_separate() {
    let source = person("Alice", 30);
    let copy = duplicator().copy(&source).expect("copy");
    let engine = EqualityEngine::new();
    assert!(engine.equal(&source, &copy).expect("compare"));
    assert_eq!(engine.hash(&source).expect("hash"), engine.hash(&copy).expect("hash"));
    assert!(!source.same_reference(&copy), "a copy is a new object");
}

#[test]
fn self_referencing_graph_round_trips() {
    init_tracing();
    let looped = node();
    looped.set("next", Value::Object(looped.clone()));
    let source = Value::Object(looped);
    let copy = duplicator().copy(&source).expect("copy of a cycle");
    let copied = copy.as_object().expect("object");
    let next = copied.get("next").expect("member");
    assert!(next.same_reference(&copy), "the copy points at itself");
    assert!(!next.same_reference(&source), "and not back at the source");
}

#[test]
fn two_node_cycle_round_trips() {
    let a = named_node("a");
    let b = named_node("b");
    a.set("next", Value::Object(b.clone()));
    b.set("next", Value::Object(a.clone()));
    let source = Value::Object(a);
    let copy = duplicator().copy(&source).expect("copy");
    let engine = EqualityEngine::new();
    assert!(engine.equal(&source, &copy).expect("compare"));
    assert_eq!(engine.hash(&source).expect("hash"), engine.hash(&copy).expect("hash"));
    let back = copy
        .as_object()
        .and_then(|o| o.get("next"))
        .and_then(|b| b.as_object().and_then(|b| b.get("next")))
        .expect("two hops");
    assert!(back.same_reference(&copy), "two hops lead back to the copied root");
}

#[test]
fn shared_nodes_stay_shared() {
    let address = Value::from(
        Object::build("Address")
            .field("street", "string", "Main Street 1")
            .finish(),
    );
    let household = Value::from(
        Object::build("Household")
            .field("home", "Address", address.clone())
            .field("billing", "Address", address.clone())
            .finish(),
    );
    let copy = duplicator().copy(&household).expect("copy");
    let copied = copy.as_object().expect("object");
    let home = copied.get("home").expect("home");
    let billing = copied.get("billing").expect("billing");
    assert!(home.same_reference(&billing), "one copied address behind both members");
    assert!(!home.same_reference(&address), "copied, not borrowed");
}

#[test]
fn mutating_the_copy_leaves_the_source_alone() {
    let source = Value::from(
        Object::build("Team")
            .field("members", "list", Value::list(vec![person("Alice", 30)]))
            .finish(),
    );
    let copy = duplicator().copy(&source).expect("copy");
    let members = copy
        .as_object()
        .and_then(|o| o.get("members"))
        .expect("members");
    let list = members.as_list().expect("list");
    list.push(person("Bob", 25));
    let first = list.get(0).expect("first member");
    first.as_object().expect("person").set("age", Value::Int(99));

    let original = source
        .as_object()
        .and_then(|o| o.get("members"))
        .expect("members");
    let original = original.as_list().expect("list");
    assert_eq!(original.len(), 1, "source list untouched");
    let alice = original.get(0).expect("first member");
    assert_eq!(alice.as_object().and_then(|o| o.get("age")), Some(Value::Int(30)));
}

#[test]
fn maps_and_json_round_trip() {
    let json = serde_json::json!({
        "name": "widget",
        "sizes": [1, 2, 3],
        "price": 9.5,
        "tags": { "color": "red" }
    });
    let source = Value::from(&json);
    let copy = duplicator().copy(&source).expect("copy");
    assert!(EqualityEngine::new().equal(&source, &copy).expect("compare"));
    let map = copy.as_map().expect("map");
    assert_eq!(map.get(&Value::text("name")), Some(Value::text("widget")));
}

#[test]
fn customs_copy_through_duplicate() {
    let money = Value::custom(Money { cents: 250, currency: "SEK" });
    let copy = duplicator().copy(&money).expect("copy");
    assert!(!copy.same_reference(&money));
    assert!(EqualityEngine::new().equal(&money, &copy).expect("compare"));
}

#[test]
fn custom_without_copy_support_is_not_supported() {
    match duplicator().copy(&Value::custom(Opaque(3))) {
        Err(Error::NotSupported { type_name }) => assert_eq!(type_name, "Opaque"),
        other => panic!("expected NotSupported, got {other:?}"),
    }
}

/// Copies text wrongly, which the self-check has to catch.
struct ShoutingTextHint;
impl CopyHint for ShoutingTextHint {
    fn try_copy(&self, value: &Value, _chain: &mut CopyChain<'_>) -> Result<Option<Value>> {
        match value {
            Value::Text(text) => Ok(Some(Value::from(text.to_uppercase()))),
            _ => Ok(None),
        }
    }
}

#[test]
fn broken_hint_fails_the_self_check() {
    let mut duplicator = duplicator();
    duplicator.add_hint(ShoutingTextHint);
    assert!(duplicator.copy(&Value::Int(1)).is_ok(), "other values still copy");
    match duplicator.copy(&person("alice", 30)) {
        Err(Error::CopyMismatch { type_name, difference }) => {
            assert_eq!(type_name, "Person");
            assert!(difference.starts_with("$.name"), "difference locates the member: {difference}");
        }
        other => panic!("expected CopyMismatch, got {other:?}"),
    }
}

#[test]
fn deep_nesting_reports_overflow() {
    let duplicator = Duplicator::new(EqualityEngine::with_max_depth(16));
    let err = duplicator.copy(&nested_lists(40)).expect_err("too deep");
    assert!(matches!(err, Error::RecursionOverflow { .. }), "got {err:?}");
    assert!(err.to_string().contains("list"));
}

#[test]
fn long_chains_copy_within_the_default_depth() {
    let worker = std::thread::Builder::new().stack_size(64 << 20).spawn(|| {
        let nodes: Vec<_> = (0..600).map(|i| named_node(&format!("n{i}"))).collect();
        for pair in nodes.windows(2) {
            pair[0].set("next", Value::Object(pair[1].clone()));
        }
        let original = Value::Object(nodes[0].clone());
        let copy = duplicator().copy(&original)?;
        Ok::<_, Error>((original, copy))
    });
    let (original, copy) = worker.expect("spawn").join().expect("no overflow").expect("copy");
    assert!(!original.same_reference(&copy));
}
