//! Structural equality and hashing over value graphs.
//!
//! The [`EqualityEngine`] answers `equal`, `hash` and `compare` by routing every
//! value through a [`CompareChain`]. Before any hint is asked, the chain applies
//! two fixed rules: the same reference is always equal to itself, and a null is
//! only equal to a non-null when the present side is a value-equatable
//! [`crate::value::Custom`] that says so. Everything else is up to the hints, user hints
//! first, then the defaults:
//!
//! 1. [`ValueEquatableHint`]: customs that define their own comparison.
//! 2. [`MismatchHint`]: different shapes or type names are never equal.
//! 3. [`ScalarHint`]: leaves by native equality.
//! 4. [`DictionaryHint`]: unordered, keyed comparison.
//! 5. [`SequenceHint`]: ordered, element-wise comparison.
//! 6. [`ObjectHint`]: member-wise comparison.
//!
//! Hashing mirrors the same shapes, but sequences fold multiplicatively (order
//! matters) while dictionaries fold additively (order does not). Below
//! [`HASH_DEPTH`] a composite only contributes its type name, which keeps
//! hashing finite on cycles and coherent with equality.

use std::cmp::Ordering;
use std::collections::HashSet;
use std::fmt;
use std::hash::Hasher;
use std::sync::Arc;

// used to hash leaves
use seahash::SeaHasher;
use tracing::trace;

use crate::chain::{DEFAULT_MAX_DEPTH, GraphChainer, IdentityHasher};
use crate::error::Result;
use crate::settings::Settings;
use crate::value::Value;

pub const BASE_HASH: u64 = 17;
pub const HASH_MULTIPLIER: u64 = 31;
pub const NULL_HASH: u64 = 0;
/// Composite nesting below which hashing stops descending.
pub const HASH_DEPTH: usize = 8;

/// Compares or hashes one shape of value, or declines with `None`.
pub trait CompareHint: Send + Sync {
    fn try_equal(&self, a: &Value, b: &Value, chain: &mut CompareChain<'_>) -> Result<Option<bool>>;
    fn try_hash(&self, value: &Value, chain: &mut CompareChain<'_>) -> Result<Option<u64>>;
}

/// What a [`CompareChain`] has already worked out about graph nodes.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Visit {
    /// Two nodes compared, by identity.
    Pair(usize, usize),
    /// One node hashed at a given depth, by identity.
    Hashed(usize, usize),
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Verdict {
    Equal(bool),
    Hash(u64),
}

/// Chainer for one comparison; memoizes node pairs and node hashes by identity.
pub type CompareChain<'h> = GraphChainer<'h, dyn CompareHint, Visit, Verdict>;

impl CompareChain<'_> {
    pub fn equal(&mut self, a: &Value, b: &Value) -> Result<bool> {
        if a.same_reference(b) {
            return Ok(true);
        }
        match (a, b) {
            (Value::Null, Value::Null) => return Ok(true),
            (Value::Null, present) | (present, Value::Null) => return Ok(null_contract(present)),
            _ => {}
        }
        let Some((left, right)) = a.identity().zip(b.identity()) else {
            return self.dispatch(a.type_name(), |hint, chain| hint.try_equal(a, b, chain));
        };
        let pair = Visit::Pair(left, right);
        if let Some(&Verdict::Equal(known)) = self.recall(&pair) {
            return Ok(known);
        }
        let mark = self.mark();
        // assumed equal while in progress, so a cycle closes on itself
        self.remember(pair, Verdict::Equal(true));
        let outcome = self.dispatch(a.type_name(), |hint, chain| hint.try_equal(a, b, chain))?;
        if !outcome {
            // whatever was settled under the refuted assumption is void
            self.forget_since(mark);
            self.remember(pair, Verdict::Equal(false));
        }
        Ok(outcome)
    }
    pub fn hash(&mut self, value: &Value) -> Result<u64> {
        if value.is_null() {
            return Ok(NULL_HASH);
        }
        // a node hashes the same wherever it is met at the same depth
        let visit = value.identity().map(|id| Visit::Hashed(id, self.depth()));
        if let Some(visit) = &visit {
            if let Some(&Verdict::Hash(known)) = self.recall(visit) {
                return Ok(known);
            }
        }
        let hash = self.dispatch(value.type_name(), |hint, chain| hint.try_hash(value, chain))?;
        if let Some(visit) = visit {
            self.remember(visit, Verdict::Hash(hash));
        }
        Ok(hash)
    }
    /// Whether a composite at the current depth should still hash its children.
    pub fn hashes_deeper(&self) -> bool {
        self.depth() <= HASH_DEPTH
    }
}

fn null_contract(present: &Value) -> bool {
    match present {
        Value::Custom(custom) => custom.value_eq(&Value::Null).unwrap_or(false),
        _ => false,
    }
}

/// Hash of a type name, the starting point of every composite hash.
pub fn seed(type_name: &str) -> u64 {
    seahash::hash(type_name.as_bytes())
}

fn is_leaf(value: &Value) -> bool {
    matches!(
        value,
        Value::Bool(_)
            | Value::Char(_)
            | Value::Byte(_)
            | Value::Int(_)
            | Value::Float(_)
            | Value::Text(_)
            | Value::Enum(..)
    )
}

fn leaf_hash(value: &Value) -> Option<u64> {
    let mut hasher = SeaHasher::new();
    match value {
        Value::Bool(b) => {
            hasher.write_u8(1);
            hasher.write_u8(u8::from(*b));
        }
        Value::Char(c) => {
            hasher.write_u8(2);
            hasher.write_u32(u32::from(*c));
        }
        Value::Byte(b) => {
            hasher.write_u8(3);
            hasher.write_u8(*b);
        }
        Value::Int(i) => {
            hasher.write_u8(4);
            hasher.write_i64(*i);
        }
        Value::Float(x) => {
            hasher.write_u8(5);
            hasher.write_u64(x.to_bits());
        }
        Value::Text(s) => {
            hasher.write_u8(6);
            hasher.write(s.as_bytes());
        }
        Value::Enum(type_name, variant) => {
            hasher.write(type_name.as_bytes());
            hasher.write_u8(0xff);
            hasher.write(variant.as_bytes());
        }
        _ => return None,
    }
    Some(hasher.finish())
}

// ------------- Default hints -------------
pub struct ValueEquatableHint;
impl CompareHint for ValueEquatableHint {
    fn try_equal(&self, a: &Value, b: &Value, _chain: &mut CompareChain<'_>) -> Result<Option<bool>> {
        if let Some(verdict) = a.as_custom().and_then(|custom| custom.value_eq(b)) {
            return Ok(Some(verdict));
        }
        Ok(b.as_custom().and_then(|custom| custom.value_eq(a)))
    }
    fn try_hash(&self, value: &Value, _chain: &mut CompareChain<'_>) -> Result<Option<u64>> {
        Ok(value.as_custom().and_then(|custom| custom.value_hash()))
    }
}

pub struct MismatchHint;
impl CompareHint for MismatchHint {
    fn try_equal(&self, a: &Value, b: &Value, _chain: &mut CompareChain<'_>) -> Result<Option<bool>> {
        if a.kind() != b.kind() {
            return Ok(Some(false));
        }
        match (a, b) {
            (Value::Object(_), Value::Object(_)) | (Value::Custom(_), Value::Custom(_))
                if a.type_name() != b.type_name() =>
            {
                Ok(Some(false))
            }
            _ => Ok(None),
        }
    }
    fn try_hash(&self, _value: &Value, _chain: &mut CompareChain<'_>) -> Result<Option<u64>> {
        Ok(None)
    }
}

pub struct ScalarHint;
impl CompareHint for ScalarHint {
    fn try_equal(&self, a: &Value, b: &Value, _chain: &mut CompareChain<'_>) -> Result<Option<bool>> {
        if is_leaf(a) && is_leaf(b) {
            return Ok(Some(a == b));
        }
        Ok(None)
    }
    fn try_hash(&self, value: &Value, _chain: &mut CompareChain<'_>) -> Result<Option<u64>> {
        Ok(leaf_hash(value))
    }
}

pub struct DictionaryHint;
impl CompareHint for DictionaryHint {
    fn try_equal(&self, a: &Value, b: &Value, chain: &mut CompareChain<'_>) -> Result<Option<bool>> {
        let (Value::Map(left), Value::Map(right)) = (a, b) else {
            return Ok(None);
        };
        let (left, right) = (left.entries(), right.entries());
        if left.len() != right.len() {
            return Ok(Some(false));
        }
        for (key, value) in &left {
            let mut matched = false;
            for (other_key, other_value) in &right {
                if chain.equal(key, other_key)? {
                    matched = chain.equal(value, other_value)?;
                    break;
                }
            }
            if !matched {
                return Ok(Some(false));
            }
        }
        Ok(Some(true))
    }
    fn try_hash(&self, value: &Value, chain: &mut CompareChain<'_>) -> Result<Option<u64>> {
        let Value::Map(map) = value else {
            return Ok(None);
        };
        if !chain.hashes_deeper() {
            return Ok(Some(seed(value.type_name())));
        }
        let mut hash = BASE_HASH;
        for (key, item) in map.entries() {
            let pair = chain.hash(&key)?.wrapping_add(chain.hash(&item)?);
            hash = hash.wrapping_add(pair);
        }
        Ok(Some(hash))
    }
}

pub struct SequenceHint;
impl CompareHint for SequenceHint {
    fn try_equal(&self, a: &Value, b: &Value, chain: &mut CompareChain<'_>) -> Result<Option<bool>> {
        let (Value::List(left), Value::List(right)) = (a, b) else {
            return Ok(None);
        };
        let (left, right) = (left.items(), right.items());
        if left.len() != right.len() {
            return Ok(Some(false));
        }
        for (x, y) in left.iter().zip(right.iter()) {
            if !chain.equal(x, y)? {
                return Ok(Some(false));
            }
        }
        Ok(Some(true))
    }
    fn try_hash(&self, value: &Value, chain: &mut CompareChain<'_>) -> Result<Option<u64>> {
        let Value::List(list) = value else {
            return Ok(None);
        };
        if !chain.hashes_deeper() {
            return Ok(Some(seed(value.type_name())));
        }
        let mut hash = BASE_HASH;
        for item in list.items() {
            hash = hash.wrapping_mul(HASH_MULTIPLIER).wrapping_add(chain.hash(&item)?);
        }
        Ok(Some(hash))
    }
}

pub struct ObjectHint;
impl CompareHint for ObjectHint {
    fn try_equal(&self, a: &Value, b: &Value, chain: &mut CompareChain<'_>) -> Result<Option<bool>> {
        let (Value::Object(left), Value::Object(right)) = (a, b) else {
            return Ok(None);
        };
        if left.type_name() != right.type_name() || left.members() != right.members() {
            return Ok(Some(false));
        }
        for (x, y) in left.values().iter().zip(right.values().iter()) {
            if !chain.equal(x, y)? {
                return Ok(Some(false));
            }
        }
        Ok(Some(true))
    }
    fn try_hash(&self, value: &Value, chain: &mut CompareChain<'_>) -> Result<Option<u64>> {
        let Value::Object(object) = value else {
            return Ok(None);
        };
        let mut hash = seed(object.type_name());
        if !chain.hashes_deeper() {
            return Ok(Some(hash));
        }
        for member in object.values() {
            hash = hash.wrapping_mul(HASH_MULTIPLIER).wrapping_add(chain.hash(&member)?);
        }
        Ok(Some(hash))
    }
}

pub fn default_hints() -> Vec<Arc<dyn CompareHint>> {
    vec![
        Arc::new(ValueEquatableHint),
        Arc::new(MismatchHint),
        Arc::new(ScalarHint),
        Arc::new(DictionaryHint),
        Arc::new(SequenceHint),
        Arc::new(ObjectHint),
    ]
}

// ------------- Difference -------------
/// One place where two graphs disagree, e.g. `$.owner.tags[2]`.
#[derive(Debug, Clone)]
pub struct Difference {
    pub path: String,
    pub expected: Value,
    pub actual: Value,
}
impl fmt::Display for Difference {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        write!(f, "{}: expected {:?}, found {:?}", self.path, self.expected, self.actual)
    }
}

// ------------- EqualityEngine -------------
#[derive(Clone)]
pub struct EqualityEngine {
    hints: Vec<Arc<dyn CompareHint>>,
    max_depth: usize,
}

impl Default for EqualityEngine {
    fn default() -> Self {
        Self::new()
    }
}

impl fmt::Debug for EqualityEngine {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        f.debug_struct("EqualityEngine")
            .field("hints", &self.hints.len())
            .field("max_depth", &self.max_depth)
            .finish()
    }
}

impl EqualityEngine {
    pub fn new() -> Self {
        Self::with_max_depth(DEFAULT_MAX_DEPTH)
    }
    pub fn with_max_depth(max_depth: usize) -> Self {
        Self {
            hints: default_hints(),
            max_depth,
        }
    }
    pub fn from_settings(settings: &Settings) -> Self {
        Self::with_max_depth(settings.max_depth)
    }
    /// Puts a hint in front of every hint registered so far.
    pub fn add_hint<H: CompareHint + 'static>(&mut self, hint: H) -> &mut Self {
        self.hints.insert(0, Arc::new(hint));
        self
    }
    pub fn max_depth(&self) -> usize {
        self.max_depth
    }
    fn chain(&self) -> CompareChain<'_> {
        GraphChainer::new(&self.hints, self.max_depth)
    }
    pub fn equal(&self, a: &Value, b: &Value) -> Result<bool> {
        let verdict = self.chain().equal(a, b)?;
        trace!(type_name = a.type_name(), verdict, "compared");
        Ok(verdict)
    }
    pub fn hash(&self, value: &Value) -> Result<u64> {
        self.chain().hash(value)
    }
    /// Hashes several values exactly as a list holding them would hash.
    pub fn hash_all(&self, values: &[Value]) -> Result<u64> {
        self.hash(&Value::list(values.to_vec()))
    }
    /// Orders by hash. Only useful for stable sorting: unequal values may tie.
    pub fn compare(&self, a: &Value, b: &Value) -> Result<Ordering> {
        Ok(self.hash(a)?.cmp(&self.hash(b)?))
    }
    /// Every path at which `actual` departs from `expected`; empty when equal.
    pub fn differences(&self, expected: &Value, actual: &Value) -> Result<Vec<Difference>> {
        let mut found = Vec::new();
        let mut visited = HashSet::<(usize, usize), IdentityHasher>::default();
        self.diff("$".to_owned(), expected, actual, &mut visited, &mut found)?;
        Ok(found)
    }
    fn diff(
        &self,
        path: String,
        expected: &Value,
        actual: &Value,
        visited: &mut HashSet<(usize, usize), IdentityHasher>,
        found: &mut Vec<Difference>,
    ) -> Result<()> {
        if self.equal(expected, actual)? {
            return Ok(());
        }
        if let Some(pair) = expected.identity().zip(actual.identity()) {
            if !visited.insert(pair) {
                return Ok(());
            }
        }
        let before = found.len();
        match (expected, actual) {
            (Value::Object(e), Value::Object(a))
                if e.type_name() == a.type_name() && e.members() == a.members() =>
            {
                let members = e.members().iter().zip(e.values()).zip(a.values());
                for ((member, ev), av) in members {
                    self.diff(format!("{path}.{}", member.name()), &ev, &av, visited, found)?;
                }
            }
            (Value::List(e), Value::List(a)) if e.len() == a.len() => {
                for (i, (ev, av)) in e.items().iter().zip(a.items().iter()).enumerate() {
                    self.diff(format!("{path}[{i}]"), ev, av, visited, found)?;
                }
            }
            (Value::Map(e), Value::Map(a)) if e.len() == a.len() => {
                let others = a.entries();
                for (key, ev) in e.entries() {
                    let mut counterpart = None;
                    for (other_key, av) in &others {
                        if self.equal(&key, other_key)? {
                            counterpart = Some(av.clone());
                            break;
                        }
                    }
                    let entry_path = format!("{path}[{key:?}]");
                    match counterpart {
                        Some(av) => self.diff(entry_path, &ev, &av, visited, found)?,
                        None => found.push(Difference {
                            path: entry_path,
                            expected: ev,
                            actual: Value::Null,
                        }),
                    }
                }
            }
            _ => {}
        }
        if found.len() == before {
            found.push(Difference {
                path,
                expected: expected.clone(),
                actual: actual.clone(),
            });
        }
        Ok(())
    }
}
