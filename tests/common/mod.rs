#![allow(dead_code)]

use std::any::Any;
use std::collections::VecDeque;
use std::sync::Arc;
use std::sync::atomic::{AtomicUsize, Ordering};

use facsimile::error::BoxError;
use facsimile::value::{Custom, Object};
use facsimile::{Error, Result, Value, ValueGenerator};
use futures_util::future::BoxFuture;
use parking_lot::Mutex;

/// Log output for a test run, filtered by `RUST_LOG`.
pub fn init_tracing() {
    let _ = tracing_subscriber::fmt()
        .with_env_filter(tracing_subscriber::EnvFilter::from_default_env())
        .with_test_writer()
        .try_init();
}

pub fn person(name: &str, age: i64) -> Value {
    Object::build("Person")
        .field("name", "string", name)
        .field("age", "i64", age)
        .finish()
        .into()
}

/// A node whose only member points at the next node.
pub fn node() -> Arc<Object> {
    Object::build("Node").field("next", "Node", Value::Null).finish()
}

/// Named node that links to the next one, for cycles of any length.
pub fn named_node(name: &str) -> Arc<Object> {
    Object::build("Named")
        .field("name", "string", name)
        .field("next", "Named", Value::Null)
        .finish()
}

/// Lists nested `depth` levels deep around a single integer.
pub fn nested_lists(depth: usize) -> Value {
    let mut value = Value::Int(0);
    for _ in 0..depth {
        value = Value::list(vec![value]);
    }
    value
}

// ------------- Money -------------
/// Value-equatable custom type that can also copy itself.
#[derive(Debug)]
pub struct Money {
    pub cents: i64,
    pub currency: &'static str,
}
impl Custom for Money {
    fn type_name(&self) -> &str {
        "Money"
    }
    fn as_any(&self) -> &dyn Any {
        self
    }
    fn value_eq(&self, other: &Value) -> Option<bool> {
        let other = other.as_custom()?.as_any().downcast_ref::<Money>()?;
        Some(self.cents == other.cents && self.currency == other.currency)
    }
    fn value_hash(&self) -> Option<u64> {
        Some(self.cents as u64 ^ self.currency.len() as u64)
    }
    fn duplicate(&self) -> Option<Arc<dyn Custom>> {
        Some(Arc::new(Money {
            cents: self.cents,
            currency: self.currency,
        }))
    }
}

// ------------- Opaque -------------
/// Custom type that offers no capability at all.
#[derive(Debug)]
pub struct Opaque(pub u32);
impl Custom for Opaque {
    fn type_name(&self) -> &str {
        "Opaque"
    }
    fn as_any(&self) -> &dyn Any {
        self
    }
}

// ------------- Handle -------------
/// Custom type that counts its disposals; asynchronous disposal always fails.
#[derive(Debug)]
pub struct Handle {
    pub id: u32,
    pub disposed: Arc<AtomicUsize>,
}
impl Custom for Handle {
    fn type_name(&self) -> &str {
        "Handle"
    }
    fn as_any(&self) -> &dyn Any {
        self
    }
    fn value_eq(&self, other: &Value) -> Option<bool> {
        let other = other.as_custom()?.as_any().downcast_ref::<Handle>()?;
        Some(self.id == other.id)
    }
    fn value_hash(&self) -> Option<u64> {
        Some(u64::from(self.id))
    }
    fn dispose(&self) -> std::result::Result<(), BoxError> {
        self.disposed.fetch_add(1, Ordering::SeqCst);
        Ok(())
    }
    fn dispose_async(&self) -> Option<BoxFuture<'static, std::result::Result<(), BoxError>>> {
        Some(Box::pin(async { Err(BoxError::from("handle already closed")) }))
    }
}

// ------------- Scripted -------------
/// Generator that hands out prepared values in order and counts its calls.
pub struct Scripted {
    script: Mutex<VecDeque<Value>>,
    calls: AtomicUsize,
}
impl Scripted {
    pub fn new(script: Vec<Value>) -> Arc<Self> {
        Arc::new(Self {
            script: Mutex::new(script.into()),
            calls: AtomicUsize::new(0),
        })
    }
    pub fn calls(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }
}
impl ValueGenerator for Scripted {
    fn create(&self, _type_name: &str) -> Result<Value> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        self.script
            .lock()
            .pop_front()
            .ok_or_else(|| Error::Generation("script ran out".to_owned()))
    }
}

// ------------- Counting -------------
/// Generator producing ascending integers and numbered strings.
pub struct Counting {
    next: AtomicUsize,
}
impl Counting {
    pub fn starting_at(first: usize) -> Arc<Self> {
        Arc::new(Self {
            next: AtomicUsize::new(first),
        })
    }
}
impl ValueGenerator for Counting {
    fn create(&self, type_name: &str) -> Result<Value> {
        let n = self.next.fetch_add(1, Ordering::SeqCst);
        match type_name {
            "i64" => Ok(Value::Int(n as i64)),
            "string" => Ok(Value::from(format!("text-{n}"))),
            other => Err(Error::not_supported(other)),
        }
    }
}
