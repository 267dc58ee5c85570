//! Facsimile – value semantics for arbitrary object graphs, made for randomized tests.
//!
//! Everything operates on [`value::Value`], a dynamic graph of leaves (numbers,
//! text, enums), shared containers (lists, maps), objects with declared members
//! and user-defined [`value::Custom`] values. Graphs may share nodes and may
//! contain cycles.
//!
//! On top of that model sit:
//! * [`compare::EqualityEngine`] – structural equality and hashing that
//!   terminates on cycles and agrees with itself (equal values hash equally).
//! * [`duplicate::Duplicator`] – deep copies that keep the shape of the source,
//!   shared nodes included, and verify themselves against it.
//! * [`content::ContentMap`] – a flattened, per-type view of a graph, used to
//!   ask whether two graphs share content.
//! * [`mutator::Mutator`] – new values guaranteed to differ from given ones,
//!   either unequal (variants) or sharing no content (unique).
//! * [`limiter::Limiter`] – bounded, cancellable repetition used by the mutator
//!   and available to tests that wait for something to happen.
//!
//! Each engine walks graphs through a [`chain::GraphChainer`]: an ordered list
//! of hints where the first hint to claim a value handles it. Hints added later
//! take precedence, so behaviour for particular types can be overridden.
//!
//! ## Quick Start
//! ```
//! use facsimile::{Duplicator, EqualityEngine, Value, value::Object};
//!
//! let person: Value = Object::build("Person")
//!     .field("name", "string", "Alice")
//!     .field("age", "i64", 42i64)
//!     .finish()
//!     .into();
//! let engine = EqualityEngine::new();
//! let copy = Duplicator::new(engine.clone()).copy(&person)?;
//! assert!(engine.equal(&person, &copy)?);
//! assert!(!person.same_reference(&copy));
//! # Ok::<(), facsimile::Error>(())
//! ```
//!
//! ## Configuration
//! [`settings::Settings`] collects the recursion bound and the default limiter,
//! loaded from TOML and `FACSIMILE__*` environment variables.
//!
//! Traversals recurse once per level of nesting and stop with
//! [`Error::RecursionOverflow`] at [`chain::DEFAULT_MAX_DEPTH`] (1024) levels
//! unless configured otherwise. A graph nesting that deeply, such as a long
//! linked list, needs a thread stack of several megabytes; run it on a thread
//! built with `std::thread::Builder::stack_size` or lower `max_depth`.
//!
//! ## Logging
//! The crate emits `tracing` events (rejected candidates, exhausted limiters,
//! failed self-checks) and installs no subscriber of its own.

pub mod chain;
pub mod compare;
pub mod content;
pub mod duplicate;
pub mod error;
pub mod limiter;
pub mod mutator;
pub mod settings;
pub mod value;

pub use compare::EqualityEngine;
pub use content::ContentMap;
pub use duplicate::Duplicator;
pub use error::{Error, Result};
pub use limiter::{CancelToken, Limiter};
pub use mutator::{Mutator, ValueGenerator};
pub use settings::Settings;
pub use value::Value;
