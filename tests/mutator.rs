mod common;

use std::sync::Arc;
use std::sync::atomic::{AtomicUsize, Ordering};

use common::{Counting, Handle, Scripted, init_tracing};
use facsimile::error::Exhausted;
use facsimile::value::Object;
use facsimile::{CancelToken, EqualityEngine, Error, Limiter, Mutator, Value};

fn mutator(generator: Arc<dyn facsimile::ValueGenerator>, limiter: Limiter) -> Mutator {
    Mutator::new(generator, EqualityEngine::new(), limiter)
}

fn ints(values: &[i64]) -> Vec<Value> {
    values.iter().map(|&i| Value::Int(i)).collect()
}

#[tokio::test]
async fn variant_skips_equal_candidates() {
    init_tracing();
    let generator = Scripted::new(ints(&[5, 5, 5, 7]));
    let variant = mutator(generator.clone(), Limiter::with_tries(4))
        .variant(&Value::Int(5), &[])
        .await
        .expect("fourth candidate differs");
    assert_eq!(variant, Value::Int(7));
    assert_eq!(generator.calls(), 4);
}

#[tokio::test]
async fn variant_times_out_when_budget_is_too_small() {
    let generator = Scripted::new(ints(&[5, 5, 5, 7]));
    let err = mutator(generator.clone(), Limiter::with_tries(3))
        .variant(&Value::Int(5), &[])
        .await
        .expect_err("three equal candidates");
    match &err {
        Error::Timeout { subject, exhausted, attempts, .. } => {
            assert_eq!(subject, "Variant of 'i64'");
            assert_eq!(*exhausted, Exhausted::Tries(3));
            assert_eq!(*attempts, 3);
        }
        other => panic!("expected Timeout, got {other:?}"),
    }
    assert_eq!(generator.calls(), 3);
}

#[tokio::test]
async fn variant_avoids_exclusions() {
    let generator = Scripted::new(ints(&[5, 6, 8, 7]));
    let variant = mutator(generator, Limiter::FEW)
        .variant(&Value::Int(5), &ints(&[6, 8]))
        .await
        .expect("variant");
    assert_eq!(variant, Value::Int(7));
}

#[tokio::test]
async fn generator_failures_surface_unchanged() {
    let err = mutator(Counting::starting_at(0), Limiter::FEW)
        .variant(&Value::Bool(true), &[])
        .await
        .expect_err("no booleans from this generator");
    match err {
        Error::NotSupported { type_name } => assert_eq!(type_name, "bool"),
        other => panic!("expected NotSupported, got {other:?}"),
    }
}

fn account(owner: &str, nickname: &str) -> Value {
    Value::from(
        Object::build("Account")
            .field("owner", "string", owner)
            .field("nickname", "string", nickname)
            .field("active", "bool", true)
            .finish(),
    )
}

#[tokio::test]
async fn unique_rejects_shared_text() {
    let generator = Scripted::new(vec![
        account("alice", "bob"),
        account("carol", "al"),
        account("dave", "dee"),
    ]);
    let unique = mutator(generator.clone(), Limiter::FEW)
        .unique(&account("alice", "ally"), &[account("erin", "al")])
        .await
        .expect("third candidate shares nothing");
    let owner = unique.as_object().and_then(|o| o.get("owner"));
    assert_eq!(owner, Some(Value::text("dave")));
    assert_eq!(generator.calls(), 3);
}

#[tokio::test]
async fn unique_ignores_low_entropy_overlap() {
    let generator = Scripted::new(vec![account("frank", "frankie")]);
    let unique = mutator(generator.clone(), Limiter::ONCE)
        .unique(&account("alice", "ally"), &[])
        .await
        .expect("the shared boolean does not count");
    assert!(unique.as_object().is_some());
    assert_eq!(generator.calls(), 1);
}

#[tokio::test]
async fn unique_rejects_equal_values_without_content() {
    let generator = Scripted::new(vec![Value::Bool(true), Value::Bool(false)]);
    let unique = mutator(generator.clone(), Limiter::FEW)
        .unique(&Value::Bool(true), &[])
        .await
        .expect("second candidate differs");
    assert_eq!(unique, Value::Bool(false));
    assert_eq!(generator.calls(), 2);

    let generator = Scripted::new(vec![Value::list(vec![]), Value::list(ints(&[1]))]);
    let unique = mutator(generator.clone(), Limiter::FEW)
        .unique(&Value::list(vec![]), &[])
        .await
        .expect("second candidate differs");
    assert_eq!(unique.as_list().expect("list").len(), 1);
    assert_eq!(generator.calls(), 2, "an empty list is not unique to another empty list");
}

#[tokio::test]
async fn unique_times_out_with_its_own_subject() {
    let generator = Scripted::new(vec![account("alice", "x"), account("alice", "y")]);
    let err = mutator(generator, Limiter::with_tries(2))
        .unique(&account("alice", "ally"), &[])
        .await
        .expect_err("every candidate shares the owner");
    assert!(err.to_string().starts_with("Unique 'Account' timed out"), "{err}");
}

#[tokio::test]
async fn modify_replaces_writable_members_only() {
    let profile = Value::from(
        Object::build("Profile")
            .readonly("id", "i64", 1i64)
            .field("age", "i64", 10i64)
            .field("motto", "string", Value::Null)
            .finish(),
    );
    let modified = mutator(Counting::starting_at(10), Limiter::FEW)
        .modify(&profile)
        .await
        .expect("modify");
    assert!(modified);
    let object = profile.as_object().expect("object");
    assert_eq!(object.get("id"), Some(Value::Int(1)), "read-only member untouched");
    // 10 equals the current age and is rejected
    assert_eq!(object.get("age"), Some(Value::Int(11)));
    assert_eq!(object.get("motto"), Some(Value::text("text-12")), "null member uses its declared type");
}

#[tokio::test]
async fn modify_without_writable_members_changes_nothing() {
    let generator = Scripted::new(Vec::new());
    let mutator = mutator(generator.clone(), Limiter::FEW);
    let frozen = Value::from(Object::build("Frozen").readonly("id", "i64", 1i64).finish());
    assert!(!mutator.modify(&frozen).await.expect("modify"));
    assert!(!mutator.modify(&Value::Int(3)).await.expect("modify"), "not an object");
    assert_eq!(generator.calls(), 0);
}

#[tokio::test]
async fn rejected_candidates_are_disposed() {
    let disposed = Arc::new(AtomicUsize::new(0));
    let handle = |id| {
        Value::custom(Handle {
            id,
            disposed: disposed.clone(),
        })
    };
    let generator = Scripted::new(vec![handle(1), handle(1), handle(2)]);
    let variant = mutator(generator, Limiter::FEW)
        .variant(&handle(1), &[])
        .await
        .expect("failing asynchronous disposal is not an error");
    assert!(EqualityEngine::new().equal(&variant, &handle(2)).expect("compare"));
    assert_eq!(disposed.load(Ordering::SeqCst), 2, "one disposal per rejected candidate");
}

#[tokio::test]
async fn cancelled_mutator_stops_between_attempts() {
    let cancel = CancelToken::new();
    cancel.cancel();
    let generator = Scripted::new(ints(&[5, 5, 6]));
    let outcome = mutator(generator.clone(), Limiter::QUICK)
        .with_cancel(cancel)
        .variant(&Value::Int(5), &[])
        .await;
    assert!(matches!(outcome, Err(Error::Cancelled)), "got {outcome:?}");
    assert_eq!(generator.calls(), 1, "the first attempt still runs");
}
