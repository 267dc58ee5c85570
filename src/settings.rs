//! Settings shared by the engines, read from an optional TOML file and from
//! `FACSIMILE__*` environment variables, for example
//! `FACSIMILE__LIMITER__TRIES=20` or `FACSIMILE__MAX_DEPTH=64`.
//!
//! ```toml
//! max_depth = 1024
//!
//! [limiter]
//! tries = 12
//! timeout_ms = 3000
//! delay_ms = 10
//! ```

use std::path::Path;
use std::time::Duration;

use config::{Config, Environment, File, FileFormat};
use serde::{Deserialize, Serialize};
use tracing::debug;

use crate::chain::DEFAULT_MAX_DEPTH;
use crate::error::Result;
use crate::limiter::Limiter;

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct Settings {
    /// How deep the chainers may recurse before giving up.
    pub max_depth: usize,
    pub limiter: LimiterSettings,
}

impl Default for Settings {
    fn default() -> Self {
        Self {
            max_depth: DEFAULT_MAX_DEPTH,
            limiter: LimiterSettings::default(),
        }
    }
}

/// Serializable form of a [`Limiter`]. A missing timeout means none.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct LimiterSettings {
    pub tries: u32,
    pub timeout_ms: Option<u64>,
    pub delay_ms: u64,
}

impl Default for LimiterSettings {
    fn default() -> Self {
        Limiter::default().into()
    }
}

impl From<Limiter> for LimiterSettings {
    fn from(limiter: Limiter) -> Self {
        let millis = |duration: Duration| u64::try_from(duration.as_millis()).unwrap_or(u64::MAX);
        let timeout = limiter.timeout();
        Self {
            tries: limiter.tries(),
            timeout_ms: (timeout != Duration::MAX).then(|| millis(timeout)),
            delay_ms: millis(limiter.delay()),
        }
    }
}

impl From<LimiterSettings> for Limiter {
    fn from(settings: LimiterSettings) -> Self {
        Limiter::new(
            settings.tries,
            settings.timeout_ms.map_or(Duration::MAX, Duration::from_millis),
            Duration::from_millis(settings.delay_ms),
        )
    }
}

impl Settings {
    /// Defaults, overridden by the file at `path` when given, overridden in turn
    /// by the environment.
    pub fn load(path: Option<&Path>) -> Result<Self> {
        let mut builder = Config::builder().add_source(Config::try_from(&Settings::default())?);
        if let Some(path) = path {
            builder = builder.add_source(File::from(path).format(FileFormat::Toml).required(true));
        }
        builder = builder.add_source(
            Environment::with_prefix("FACSIMILE")
                .prefix_separator("__")
                .separator("__")
                .try_parsing(true),
        );
        let settings: Settings = builder.build()?.try_deserialize()?;
        debug!(?path, max_depth = settings.max_depth, limiter = %settings.limiter(), "settings loaded");
        Ok(settings)
    }

    /// Defaults overridden by TOML text; the environment is not consulted.
    pub fn from_toml(text: &str) -> Result<Self> {
        let settings: Settings = Config::builder()
            .add_source(Config::try_from(&Settings::default())?)
            .add_source(File::from_str(text, FileFormat::Toml))
            .build()?
            .try_deserialize()?;
        Ok(settings)
    }

    pub fn limiter(&self) -> Limiter {
        self.limiter.into()
    }
}
