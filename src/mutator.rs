//! Values that are guaranteed to differ from other values.
//!
//! The [`Mutator`] asks a pluggable [`ValueGenerator`] for candidates of a type
//! and keeps asking, under its [`Limiter`], until one passes:
//! * a *variant* is unequal to the instance and to every exclusion;
//! * a *unique* value shares no meaningful content with any of them, which is
//!   the stronger promise: structurally disjoint, not merely different.
//!
//! Rejected candidates are offered disposal before the next attempt.

use std::fmt;
use std::sync::Arc;

use tracing::{debug, trace};

use crate::compare::EqualityEngine;
use crate::content::ContentMap;
use crate::error::Result;
use crate::limiter::{CancelToken, Limiter};
use crate::settings::Settings;
use crate::value::Value;

/// Produces an arbitrary instance of a named type.
///
/// How the instance is made is up to the implementation. Types it cannot make
/// should fail with [`crate::Error::NotSupported`].
pub trait ValueGenerator: Send + Sync {
    fn create(&self, type_name: &str) -> Result<Value>;
}

// What a candidate must avoid. Sharing content includes being equal, which
// matters for values too small to have any content worth comparing.
enum Rejection<'a> {
    Equal(Vec<&'a Value>),
    SharedContent(Vec<&'a Value>, Vec<ContentMap>),
}

// ------------- Mutator -------------
#[derive(Clone)]
pub struct Mutator {
    generator: Arc<dyn ValueGenerator>,
    engine: EqualityEngine,
    limiter: Limiter,
    cancel: CancelToken,
}

impl fmt::Debug for Mutator {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        f.debug_struct("Mutator")
            .field("engine", &self.engine)
            .field("limiter", &self.limiter)
            .finish()
    }
}

impl Mutator {
    pub fn new(generator: Arc<dyn ValueGenerator>, engine: EqualityEngine, limiter: Limiter) -> Self {
        Self {
            generator,
            engine,
            limiter,
            cancel: CancelToken::new(),
        }
    }
    pub fn from_settings(generator: Arc<dyn ValueGenerator>, settings: &Settings) -> Self {
        Self::new(generator, EqualityEngine::from_settings(settings), settings.limiter())
    }
    pub fn with_cancel(mut self, cancel: CancelToken) -> Self {
        self.cancel = cancel;
        self
    }
    pub fn limiter(&self) -> Limiter {
        self.limiter
    }
    pub fn engine(&self) -> &EqualityEngine {
        &self.engine
    }

    /// A new value of the instance's type, unequal to it and to every exclusion.
    pub async fn variant(&self, instance: &Value, exclusions: &[Value]) -> Result<Value> {
        self.variant_of(instance.type_name(), instance, exclusions).await
    }

    async fn variant_of(&self, type_name: &str, instance: &Value, exclusions: &[Value]) -> Result<Value> {
        let forbidden = Rejection::Equal(std::iter::once(instance).chain(exclusions).collect());
        self.generate(type_name, &forbidden)
            .await
            .map_err(|e| e.about(format!("Variant of '{type_name}'")))
    }

    /// A new value of the instance's type, unequal to the instance and to every
    /// exclusion and sharing no content with any of them.
    pub async fn unique(&self, instance: &Value, exclusions: &[Value]) -> Result<Value> {
        let type_name = instance.type_name();
        let forbidden: Vec<&Value> = std::iter::once(instance).chain(exclusions).collect();
        let maps = forbidden.iter().map(|value| ContentMap::extract(value)).collect();
        self.generate(type_name, &Rejection::SharedContent(forbidden, maps))
            .await
            .map_err(|e| e.about(format!("Unique '{type_name}'")))
    }

    /// Replaces every writable member of an object with a variant of its
    /// current value. Returns whether any member changed.
    pub async fn modify(&self, instance: &Value) -> Result<bool> {
        let Value::Object(object) = instance else {
            return Ok(false);
        };
        let mut modified = false;
        for (index, member) in object.members().iter().enumerate() {
            if !member.writable() {
                continue;
            }
            let current = object.get_at(index).unwrap_or(Value::Null);
            // a null member says nothing about its type, the declaration does
            let type_name = if current.is_null() {
                &**member.declared()
            } else {
                current.type_name()
            };
            let variant = self.variant_of(type_name, &current, &[]).await?;
            object.set_at(index, variant);
            modified = true;
        }
        trace!(type_name = object.type_name(), modified, "modified");
        Ok(modified)
    }

    async fn generate(&self, type_name: &str, forbidden: &Rejection<'_>) -> Result<Value> {
        self.limiter
            .stall_until_some(&self.cancel, move || self.attempt(type_name, forbidden))
            .await
    }

    async fn attempt(&self, type_name: &str, forbidden: &Rejection<'_>) -> Result<Option<Value>> {
        let candidate = self.generator.create(type_name)?;
        if self.acceptable(&candidate, forbidden)? {
            return Ok(Some(candidate));
        }
        trace!(type_name, "candidate rejected");
        dispose(candidate).await;
        Ok(None)
    }

    fn acceptable(&self, candidate: &Value, forbidden: &Rejection<'_>) -> Result<bool> {
        let (Rejection::Equal(values) | Rejection::SharedContent(values, _)) = forbidden;
        for value in values {
            if self.engine.equal(candidate, value)? {
                return Ok(false);
            }
        }
        let Rejection::SharedContent(_, maps) = forbidden else {
            return Ok(true);
        };
        let others: Vec<&ContentMap> = maps.iter().collect();
        let shared = ContentMap::extract(candidate).find_shared_content(&self.engine, &others)?;
        Ok(shared.is_empty())
    }
}

/// Best-effort release of a rejected candidate; failures are only logged.
async fn dispose(candidate: Value) {
    let Value::Custom(custom) = candidate else {
        return;
    };
    if let Err(e) = custom.dispose() {
        debug!(type_name = custom.type_name(), error = %e, "dispose failed");
    }
    if let Some(pending) = custom.dispose_async() {
        if let Err(e) = pending.await {
            debug!(type_name = custom.type_name(), error = %e, "asynchronous dispose failed");
        }
    }
}
