//! Flattened view of everything reachable from a value.
//!
//! A [`ContentMap`] keeps, per declared member type, the distinct values found
//! under that type anywhere in a graph. Distinct means natively distinct:
//! leaves by value, graph nodes and customs by reference. It is built once by
//! [`ContentMap::extract`] and read-only afterwards. Its main use is asking
//! whether two graphs share content they should not, see
//! [`ContentMap::find_shared_content`], where the comparison is structural.

use std::collections::{HashMap, HashSet};
use std::collections::hash_map::Entry;

use tracing::trace;

use crate::chain::IdentityHasher;
use crate::compare::EqualityEngine;
use crate::error::Result;
use crate::value::{TypeName, Value};

// ------------- Bucket -------------
#[derive(Default)]
struct Bucket {
    order: Vec<Value>,
    kept: HashSet<Value, IdentityHasher>,
}
impl Bucket {
    fn keep(&mut self, value: &Value) -> bool {
        let previously_kept = !self.kept.insert(value.clone());
        if !previously_kept {
            self.order.push(value.clone());
        }
        previously_kept
    }
}

// ------------- ContentMap -------------
pub struct ContentMap {
    kept: HashMap<TypeName, Bucket, IdentityHasher>,
    // declared types in order of first appearance, so iteration is stable
    types: Vec<TypeName>,
    length: usize,
}

impl ContentMap {
    /// Walks the graph under `root`, which is recorded under its own type name.
    pub fn extract(root: &Value) -> ContentMap {
        let mut map = ContentMap {
            kept: HashMap::default(),
            types: Vec::new(),
            length: 0,
        };
        let mut pending = vec![(TypeName::from(root.type_name()), root.clone())];
        while let Some((declared, value)) = pending.pop() {
            if value.is_null() {
                continue;
            }
            // keeping doubles as the visited check: kept values are not decomposed again
            if !map.keep(declared, &value) {
                let mut children = value.children();
                children.reverse();
                pending.extend(children);
            }
        }
        trace!(
            root = root.type_name(),
            types = map.types.len(),
            values = map.length,
            "content extracted"
        );
        map
    }
    fn keep(&mut self, declared: TypeName, value: &Value) -> bool {
        let bucket = match self.kept.entry(declared) {
            Entry::Occupied(e) => e.into_mut(),
            Entry::Vacant(e) => {
                self.types.push(e.key().clone());
                e.insert(Bucket::default())
            }
        };
        let previously_kept = bucket.keep(value);
        if !previously_kept {
            self.length += 1;
        }
        previously_kept
    }
    /// Number of kept values, counted once per declared type.
    pub fn len(&self) -> usize {
        self.length
    }
    pub fn is_empty(&self) -> bool {
        self.length == 0
    }
    pub fn types(&self) -> impl Iterator<Item = &str> {
        self.types.iter().map(|t| t.as_ref())
    }
    /// Values found under the given declared type.
    pub fn find_all(&self, type_name: &str) -> &[Value] {
        self.kept
            .get(type_name)
            .map(|bucket| bucket.order.as_slice())
            .unwrap_or(&[])
    }
    /// Every kept value once, even if several declared types referenced it.
    pub fn all_content(&self) -> Vec<&Value> {
        let mut seen = HashSet::<&Value, IdentityHasher>::default();
        let mut content = Vec::with_capacity(self.length);
        for declared in &self.types {
            for value in self.find_all(declared) {
                if seen.insert(value) {
                    content.push(value);
                }
            }
        }
        content
    }
    /// Whether any kept value is equal to `item` according to `valuer`.
    pub fn has_content(&self, valuer: &EqualityEngine, item: &Value) -> Result<bool> {
        for value in self.all_content() {
            if valuer.equal(value, item)? {
                return Ok(true);
            }
        }
        Ok(false)
    }
    /// Content of this map also present in any of `others`, leaving out
    /// low-entropy values (booleans, chars, bytes, enums, empty collections)
    /// whose overlap is expected by chance.
    pub fn find_shared_content(&self, valuer: &EqualityEngine, others: &[&ContentMap]) -> Result<Vec<Value>> {
        let mut shared = Vec::new();
        for value in self.all_content() {
            if value.is_low_entropy() {
                continue;
            }
            for other in others {
                if other.has_content(valuer, value)? {
                    shared.push(value.clone());
                    break;
                }
            }
        }
        Ok(shared)
    }
}
