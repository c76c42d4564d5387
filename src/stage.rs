//! Stage capability interface.
//!
//! A stage is one pluggable extraction step. The pipeline builds each stage once,
//! configures it once, and then shares it across every document it processes,
//! possibly from many threads at the same time. Consequently:
//!
//! - `configure` runs exactly once, before the first `process` call;
//! - `process` takes `&self` and must not keep per-document state between calls.
//!   Everything a run needs lives in the [`Item`] it is handed.
//!
//! # Example
//!
//! ```
//! use ingest_extract::stage::{BoundSettings, NoSettings, Stage, StageDefinition, StageError, StageStatus};
//! use ingest_extract::Item;
//!
//! #[derive(Default)]
//! struct Shouting;
//!
//! impl Stage for Shouting {
//!     fn name(&self) -> &str {
//!         Self::NAME
//!     }
//!
//!     fn process(&self, item: &mut Item) -> StageStatus {
//!         for unit in item.units_mut() {
//!             let len = unit.data().len();
//!             if len > 0 && unit.data().chars().all(|c| !c.is_lowercase()) {
//!                 unit.annotate("shout", 0..len);
//!             }
//!         }
//!         StageStatus::Success
//!     }
//! }
//!
//! impl StageDefinition for Shouting {
//!     const NAME: &'static str = "Shouting";
//!     type Settings = NoSettings;
//!
//!     fn create() -> Result<Self, StageError> {
//!         Ok(Self)
//!     }
//!
//!     fn configure(&mut self, _settings: BoundSettings<NoSettings>) -> Result<(), StageError> {
//!         Ok(())
//!     }
//! }
//! ```

use std::fmt;

use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::item::Item;

/// Outcome of one `process` call.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum StageStatus {
    Success,
    /// The stage could not process the item; aborts the document
    Failure { reason: String },
}

impl StageStatus {
    pub fn failure(reason: impl Into<String>) -> Self {
        StageStatus::Failure {
            reason: reason.into(),
        }
    }

    pub fn is_success(&self) -> bool {
        matches!(self, StageStatus::Success)
    }
}

/// Error reported by a stage while it is being created or configured.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum StageError {
    #[error("{0}")]
    Instantiation(String),

    #[error("{0}")]
    InvalidSettings(String),
}

/// Runtime interface the pipeline drives for every document.
pub trait Stage: Send + Sync {
    /// Identifier used in logs and execution errors.
    fn name(&self) -> &str;

    /// Run this stage against the shared working item.
    fn process(&self, item: &mut Item) -> StageStatus;
}

impl fmt::Debug for dyn Stage {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Stage").field("name", &self.name()).finish()
    }
}

/// Settings shape a stage declares.
///
/// `DECLARED` is false only for [`NoSettings`]; the registry uses it to reject
/// settings payloads for stages that take none.
pub trait StageSettings: DeserializeOwned + Serialize + Send + 'static {
    const DECLARED: bool = true;
}

/// Marker settings type for stages that take no settings.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct NoSettings {}

impl StageSettings for NoSettings {
    const DECLARED: bool = false;
}

/// Settings bound to a stage at pipeline construction.
#[derive(Debug, Clone, PartialEq)]
pub enum BoundSettings<S> {
    /// No settings payload was configured
    Empty,
    /// Payload converted into the stage's settings type
    Typed(S),
}

impl<S> BoundSettings<S> {
    pub fn is_empty(&self) -> bool {
        matches!(self, BoundSettings::Empty)
    }

    pub fn typed(&self) -> Option<&S> {
        match self {
            BoundSettings::Typed(settings) => Some(settings),
            BoundSettings::Empty => None,
        }
    }

    /// Typed settings, or `default` for an empty payload.
    pub fn unwrap_or(self, default: S) -> S {
        match self {
            BoundSettings::Typed(settings) => settings,
            BoundSettings::Empty => default,
        }
    }

    /// Typed settings, failing for stages that cannot run without them.
    pub fn required(self) -> Result<S, StageError> {
        match self {
            BoundSettings::Typed(settings) => Ok(settings),
            BoundSettings::Empty => Err(StageError::InvalidSettings(
                "settings are required".to_string(),
            )),
        }
    }
}

/// A stage type that can be registered and resolved by name.
pub trait StageDefinition: Stage + Sized + 'static {
    /// Canonical identifier the stage is registered and configured under.
    const NAME: &'static str;

    /// Settings shape accepted by `configure`.
    type Settings: StageSettings;

    /// No-argument constructor.
    fn create() -> Result<Self, StageError>;

    /// Apply bound settings; runs once, before any document is processed.
    fn configure(&mut self, settings: BoundSettings<Self::Settings>) -> Result<(), StageError>;
}

/// A resolved stage paired with its bound settings, waiting to be configured.
pub trait PendingStage: Send {
    fn stage_id(&self) -> &str;

    fn has_settings(&self) -> bool;

    /// Configure the stage and hand it over for execution.
    fn configure(self: Box<Self>) -> Result<Box<dyn Stage>, StageError>;
}

impl fmt::Debug for dyn PendingStage {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("PendingStage")
            .field("stage_id", &self.stage_id())
            .field("has_settings", &self.has_settings())
            .finish()
    }
}

/// Typed `(stage, settings)` pair produced by the registry.
pub struct ResolvedStage<S: StageDefinition> {
    stage: S,
    settings: BoundSettings<S::Settings>,
}

impl<S: StageDefinition> ResolvedStage<S> {
    pub fn new(stage: S, settings: BoundSettings<S::Settings>) -> Self {
        Self { stage, settings }
    }

    pub fn settings(&self) -> &BoundSettings<S::Settings> {
        &self.settings
    }
}

impl<S: StageDefinition> PendingStage for ResolvedStage<S> {
    fn stage_id(&self) -> &str {
        S::NAME
    }

    fn has_settings(&self) -> bool {
        !self.settings.is_empty()
    }

    fn configure(self: Box<Self>) -> Result<Box<dyn Stage>, StageError> {
        let ResolvedStage { mut stage, settings } = *self;
        StageDefinition::configure(&mut stage, settings)?;
        Ok(Box::new(stage))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_status_helpers() {
        assert!(StageStatus::Success.is_success());
        assert!(!StageStatus::failure("boom").is_success());
    }

    #[test]
    fn test_bound_settings_accessors() {
        let typed = BoundSettings::Typed(5);
        let empty: BoundSettings<i32> = BoundSettings::Empty;

        assert_eq!(typed.typed(), Some(&5));
        assert!(empty.is_empty());
        assert_eq!(empty.clone().unwrap_or(7), 7);
        assert!(matches!(empty.required(), Err(StageError::InvalidSettings(_))));
        assert_eq!(typed.required(), Ok(5));
    }

    #[test]
    fn test_no_settings_is_not_declared() {
        assert!(!<NoSettings as StageSettings>::DECLARED);
    }
}
