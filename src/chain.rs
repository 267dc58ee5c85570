//! Cycle-safe recursive dispatch over an ordered hint list.
//!
//! A [`GraphChainer`] lives for exactly one top-level call (one comparison, one
//! copy) and is dropped afterwards. It owns:
//! * the hint list, consulted top to bottom, first claim wins;
//! * an identity-keyed memo, so that a graph node visited again (through a
//!   cycle or a shared reference) resolves to what was already produced for it,
//!   and which can be rolled back to a [`GraphChainer::mark`];
//! * a depth counter that turns runaway nesting into [`Error::RecursionOverflow`]
//!   before the thread stack runs out.
//!
//! Hints talk back to the chainer for nested values, which is how recursion
//! gets cycle safety without each hint tracking visits itself.

use std::collections::HashMap;
use std::collections::hash_map::Entry;
use std::hash::{BuildHasherDefault, Hash};
use std::sync::Arc;

use seahash::SeaHasher;
use tracing::{debug, trace};

use crate::error::{Error, Result};

pub type IdentityHasher = BuildHasherDefault<SeaHasher>;

/// Nesting allowed before a traversal is abandoned. Every level costs a few
/// stack frames, so graphs nesting close to this bound want a thread stack of
/// several megabytes.
pub const DEFAULT_MAX_DEPTH: usize = 1024;

pub struct GraphChainer<'h, H: ?Sized, K, M> {
    hints: &'h [Arc<H>],
    memo: HashMap<K, M, IdentityHasher>,
    // keys in the order they were remembered
    recorded: Vec<K>,
    depth: usize,
    max_depth: usize,
}

impl<'h, H: ?Sized, K: Eq + Hash + Clone, M> GraphChainer<'h, H, K, M> {
    pub fn new(hints: &'h [Arc<H>], max_depth: usize) -> Self {
        Self {
            hints,
            memo: HashMap::default(),
            recorded: Vec::new(),
            depth: 0,
            max_depth,
        }
    }
    pub fn depth(&self) -> usize {
        self.depth
    }
    pub fn recall(&self, key: &K) -> Option<&M> {
        self.memo.get(key)
    }
    /// Records a result for a key. A key is only ever recorded once per call;
    /// returns false (and keeps the first record) if it was already there.
    pub fn remember(&mut self, key: K, result: M) -> bool {
        match self.memo.entry(key) {
            Entry::Vacant(e) => {
                self.recorded.push(e.key().clone());
                e.insert(result);
                true
            }
            Entry::Occupied(_) => false,
        }
    }
    /// Position in the record, to return to with [`GraphChainer::forget_since`].
    pub fn mark(&self) -> usize {
        self.recorded.len()
    }
    /// Drops every result remembered after `mark`, for when they rested on an
    /// assumption that turned out false.
    pub fn forget_since(&mut self, mark: usize) {
        if mark >= self.recorded.len() {
            return;
        }
        for key in self.recorded.drain(mark..) {
            self.memo.remove(&key);
        }
    }
    /// Offers the value to each hint in turn until one claims it.
    pub fn dispatch<T>(
        &mut self,
        type_name: &str,
        mut attempt: impl FnMut(&H, &mut Self) -> Result<Option<T>>,
    ) -> Result<T> {
        if self.depth >= self.max_depth {
            debug!(type_name, depth = self.depth, "traversal too deep");
            return Err(Error::RecursionOverflow {
                type_name: type_name.to_owned(),
                depth: self.depth,
            });
        }
        self.depth += 1;
        let hints = self.hints;
        let mut outcome = None;
        for hint in hints {
            match attempt(&**hint, self) {
                Ok(None) => continue,
                claimed => {
                    outcome = Some(claimed);
                    break;
                }
            }
        }
        self.depth -= 1;
        match outcome {
            Some(Ok(Some(result))) => Ok(result),
            Some(Err(e)) => Err(e),
            _ => {
                trace!(type_name, "no hint claimed value");
                Err(Error::not_supported(type_name))
            }
        }
    }
}
