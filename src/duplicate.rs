//! Deep copies of value graphs.
//!
//! The [`Duplicator`] copies through a [`CopyChain`]: each graph node is copied
//! once per call, and every later reference to the same source node receives
//! the same copy. Container hints register their empty shell before filling
//! it, so a child pointing back at its parent lands on the shell under
//! construction instead of recursing forever.
//!
//! Every copy is checked against its source with the [`EqualityEngine`]. A copy
//! that does not compare equal is a bug in a hint, and is reported as
//! [`Error::CopyMismatch`] rather than handed back.

use std::fmt;
use std::sync::Arc;

use tracing::{debug, trace};

use crate::chain::GraphChainer;
use crate::compare::EqualityEngine;
use crate::error::{Error, Result};
use crate::settings::Settings;
use crate::value::{List, Map, Value};

/// Copies one shape of value, or declines with `None`.
pub trait CopyHint: Send + Sync {
    fn try_copy(&self, value: &Value, chain: &mut CopyChain<'_>) -> Result<Option<Value>>;
}

/// Chainer for one copy; maps source identities to their copies.
pub type CopyChain<'h> = GraphChainer<'h, dyn CopyHint, usize, Value>;

impl CopyChain<'_> {
    pub fn copy(&mut self, value: &Value) -> Result<Value> {
        if let Some(id) = value.identity() {
            if let Some(copied) = self.recall(&id) {
                return Ok(copied.clone());
            }
        }
        self.dispatch(value.type_name(), |hint, chain| hint.try_copy(value, chain))
    }
    /// Registers the shell standing in for `source` while its children are copied.
    pub fn register(&mut self, source: &Value, shell: &Value) {
        if let Some(id) = source.identity() {
            self.remember(id, shell.clone());
        }
    }
}

// ------------- Default hints -------------
/// Leaves are immutable, so the copy can share them.
pub struct LeafCopyHint;
impl CopyHint for LeafCopyHint {
    fn try_copy(&self, value: &Value, _chain: &mut CopyChain<'_>) -> Result<Option<Value>> {
        match value {
            Value::Null
            | Value::Bool(_)
            | Value::Char(_)
            | Value::Byte(_)
            | Value::Int(_)
            | Value::Float(_)
            | Value::Text(_)
            | Value::Enum(..) => Ok(Some(value.clone())),
            _ => Ok(None),
        }
    }
}

pub struct CustomCopyHint;
impl CopyHint for CustomCopyHint {
    fn try_copy(&self, value: &Value, _chain: &mut CopyChain<'_>) -> Result<Option<Value>> {
        Ok(value
            .as_custom()
            .and_then(|custom| custom.duplicate())
            .map(Value::Custom))
    }
}

pub struct ListCopyHint;
impl CopyHint for ListCopyHint {
    fn try_copy(&self, value: &Value, chain: &mut CopyChain<'_>) -> Result<Option<Value>> {
        let Value::List(source) = value else {
            return Ok(None);
        };
        let shell = Arc::new(List::new(source.element().cloned()));
        let copy = Value::List(Arc::clone(&shell));
        chain.register(value, &copy);
        for item in source.items() {
            shell.push(chain.copy(&item)?);
        }
        Ok(Some(copy))
    }
}

pub struct MapCopyHint;
impl CopyHint for MapCopyHint {
    fn try_copy(&self, value: &Value, chain: &mut CopyChain<'_>) -> Result<Option<Value>> {
        let Value::Map(source) = value else {
            return Ok(None);
        };
        let shell = Arc::new(Map::new(
            source.key_type().cloned(),
            source.value_type().cloned(),
        ));
        let copy = Value::Map(Arc::clone(&shell));
        chain.register(value, &copy);
        for (key, item) in source.entries() {
            let key = chain.copy(&key)?;
            let item = chain.copy(&item)?;
            shell.insert(key, item);
        }
        Ok(Some(copy))
    }
}

pub struct ObjectCopyHint;
impl CopyHint for ObjectCopyHint {
    fn try_copy(&self, value: &Value, chain: &mut CopyChain<'_>) -> Result<Option<Value>> {
        let Value::Object(source) = value else {
            return Ok(None);
        };
        let shell = Arc::new(source.shell());
        let copy = Value::Object(Arc::clone(&shell));
        chain.register(value, &copy);
        for (index, member) in source.values().iter().enumerate() {
            shell.set_at(index, chain.copy(member)?);
        }
        Ok(Some(copy))
    }
}

pub fn default_hints() -> Vec<Arc<dyn CopyHint>> {
    vec![
        Arc::new(LeafCopyHint),
        Arc::new(CustomCopyHint),
        Arc::new(ListCopyHint),
        Arc::new(MapCopyHint),
        Arc::new(ObjectCopyHint),
    ]
}

// ------------- Duplicator -------------
#[derive(Clone)]
pub struct Duplicator {
    hints: Vec<Arc<dyn CopyHint>>,
    engine: EqualityEngine,
}

impl fmt::Debug for Duplicator {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        f.debug_struct("Duplicator")
            .field("hints", &self.hints.len())
            .field("engine", &self.engine)
            .finish()
    }
}

impl Duplicator {
    pub fn new(engine: EqualityEngine) -> Self {
        Self {
            hints: default_hints(),
            engine,
        }
    }
    pub fn from_settings(settings: &Settings) -> Self {
        Self::new(EqualityEngine::from_settings(settings))
    }
    /// Puts a hint in front of every hint registered so far.
    pub fn add_hint<H: CopyHint + 'static>(&mut self, hint: H) -> &mut Self {
        self.hints.insert(0, Arc::new(hint));
        self
    }
    pub fn engine(&self) -> &EqualityEngine {
        &self.engine
    }
    pub fn copy(&self, value: &Value) -> Result<Value> {
        let mut chain = CopyChain::new(&self.hints, self.engine.max_depth());
        let copied = chain.copy(value)?;
        if !self.engine.equal(value, &copied)? {
            let difference = self
                .engine
                .differences(value, &copied)?
                .into_iter()
                .next()
                .map_or_else(|| "no difference located".to_owned(), |d| d.to_string());
            debug!(type_name = value.type_name(), %difference, "copy failed its self-check");
            return Err(Error::CopyMismatch {
                type_name: value.type_name().to_owned(),
                difference,
            });
        }
        trace!(type_name = value.type_name(), "copied");
        Ok(copied)
    }
}
