//! Settings model for the extraction pipeline.
//!
//! [`ExtractSettings`] selects which record fields are scanned, where the extracted
//! values are written, and which stages run in which order. Mutators are
//! builder-style and consume `self`.

use std::sync::OnceLock;

use indexmap::IndexSet;
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

use crate::error::{ExtractError, Result};
use crate::registry::{normalize, StageRegistry};
use crate::stage::StageDefinition;
use crate::stages::EmailExtractor;

/// Default value for the "process all fields" setting
pub const DEFAULT_PROCESS_ALL_FIELDS: bool = false;

/// Default name of the field extracted values are written to
pub const DEFAULT_TARGET_FIELD: &str = "extracted";

/// Which record fields the pipeline scans.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum FieldSelection {
    /// Only the named fields, in insertion order
    Explicit(IndexSet<String>),
    /// Every field present in the record
    All,
}

impl Default for FieldSelection {
    fn default() -> Self {
        if DEFAULT_PROCESS_ALL_FIELDS {
            FieldSelection::All
        } else {
            FieldSelection::Explicit(IndexSet::new())
        }
    }
}

/// A stage identifier plus its raw settings payload.
///
/// Equality matches identifiers the way the registry looks them up, so
/// `email_extractor` and `EmailExtractor` name the same stage. Settings compare
/// as maps: descriptors from [`StageDescriptor::of_settings`], from configuration
/// or from [`StageRegistry::descriptor`] carry the bound settings with defaults
/// filled in, so equal bound settings compare equal. An empty payload means
/// "no settings".
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct StageDescriptor {
    #[serde(rename = "class")]
    stage_id: String,
    #[serde(default)]
    settings: Map<String, Value>,
}

impl StageDescriptor {
    /// Descriptor with no settings.
    pub fn new(stage_id: impl Into<String>) -> Self {
        Self {
            stage_id: stage_id.into(),
            settings: Map::new(),
        }
    }

    pub fn with_settings(stage_id: impl Into<String>, settings: Map<String, Value>) -> Self {
        Self {
            stage_id: stage_id.into(),
            settings,
        }
    }

    /// Descriptor for a stage type with no settings.
    pub fn of<S: StageDefinition>() -> Self {
        Self::new(S::NAME)
    }

    /// Descriptor for a stage type with typed settings.
    pub fn of_settings<S: StageDefinition>(settings: &S::Settings) -> Result<Self> {
        let raw = match serde_json::to_value(settings) {
            Ok(Value::Object(map)) => map,
            Ok(Value::Null) => Map::new(),
            Ok(_) => {
                return Err(ExtractError::SettingsBinding {
                    stage: S::NAME.to_string(),
                    reason: "settings must serialize to an object".to_string(),
                })
            }
            Err(e) => {
                return Err(ExtractError::SettingsBinding {
                    stage: S::NAME.to_string(),
                    reason: e.to_string(),
                })
            }
        };

        Ok(Self::with_settings(S::NAME, raw))
    }

    pub fn stage_id(&self) -> &str {
        &self.stage_id
    }

    pub fn settings(&self) -> &Map<String, Value> {
        &self.settings
    }

    pub fn has_settings(&self) -> bool {
        !self.settings.is_empty()
    }
}

impl PartialEq for StageDescriptor {
    fn eq(&self, other: &Self) -> bool {
        self.settings == other.settings && normalize(&self.stage_id) == normalize(&other.stage_id)
    }
}

/// Stages used when none are configured: the email extractor, without settings.
pub fn default_stages() -> &'static [StageDescriptor] {
    static DEFAULT_STAGES: OnceLock<Vec<StageDescriptor>> = OnceLock::new();
    DEFAULT_STAGES.get_or_init(|| vec![StageDescriptor::of::<EmailExtractor>()])
}

/// Settings for an extraction pipeline.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ExtractSettings {
    selection: FieldSelection,
    target_field: String,
    stages: Vec<StageDescriptor>,
}

impl ExtractSettings {
    pub fn new() -> Self {
        Self {
            selection: FieldSelection::default(),
            target_field: DEFAULT_TARGET_FIELD.to_string(),
            stages: Vec::new(),
        }
    }

    /// Add a field to scan; switches off all-fields mode.
    pub fn with_field(mut self, field: impl Into<String>) -> Self {
        self.add_fields(std::iter::once(field.into()));
        self
    }

    /// Add several fields to scan; switches off all-fields mode.
    pub fn with_fields<I, S>(mut self, fields: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.add_fields(fields.into_iter().map(Into::into));
        self
    }

    /// Scan every field of each record; clears the explicit field set.
    pub fn with_all_fields(mut self) -> Self {
        self.selection = FieldSelection::All;
        self
    }

    /// Set the field extracted values are written to.
    pub fn with_target_field(mut self, target_field: impl Into<String>) -> Self {
        self.target_field = target_field.into();
        self
    }

    /// Append a stage type with no settings.
    pub fn with_stage<S: StageDefinition>(mut self) -> Self {
        self.stages.push(StageDescriptor::of::<S>());
        self
    }

    /// Append a stage type with typed settings.
    pub fn with_stage_settings<S: StageDefinition>(mut self, settings: &S::Settings) -> Result<Self> {
        self.stages.push(StageDescriptor::of_settings::<S>(settings)?);
        Ok(self)
    }

    /// Append a stage by identifier with no settings.
    ///
    /// The identifier is resolved immediately; unknown identifiers fail here rather
    /// than when the pipeline is built.
    pub fn with_stage_name(self, registry: &StageRegistry, identifier: &str) -> Result<Self> {
        self.with_stage_name_settings(registry, identifier, Map::new())
    }

    /// Append a stage by identifier with a raw settings payload.
    ///
    /// The payload is bound to the stage's settings type immediately, so binding
    /// errors surface here and the stored descriptor is in canonical form.
    pub fn with_stage_name_settings(
        mut self,
        registry: &StageRegistry,
        identifier: &str,
        settings: Map<String, Value>,
    ) -> Result<Self> {
        self.stages.push(registry.descriptor(identifier, settings)?);
        Ok(self)
    }

    /// Append several stages by identifier, none with settings.
    ///
    /// Fails on the first unknown identifier.
    pub fn with_stage_names<I, S>(self, registry: &StageRegistry, identifiers: I) -> Result<Self>
    where
        I: IntoIterator<Item = S>,
        S: AsRef<str>,
    {
        identifiers
            .into_iter()
            .try_fold(self, |settings, id| settings.with_stage_name(registry, id.as_ref()))
    }

    /// Append a prepared descriptor as is.
    pub fn with_stage_descriptor(mut self, descriptor: StageDescriptor) -> Self {
        self.stages.push(descriptor);
        self
    }

    pub fn field_selection(&self) -> &FieldSelection {
        &self.selection
    }

    /// Explicitly selected fields; empty in all-fields mode.
    pub fn fields(&self) -> impl Iterator<Item = &str> {
        let fields = match &self.selection {
            FieldSelection::Explicit(fields) => Some(fields),
            FieldSelection::All => None,
        };
        fields.into_iter().flatten().map(String::as_str)
    }

    pub fn has_field(&self, field: &str) -> bool {
        match &self.selection {
            FieldSelection::Explicit(fields) => fields.contains(field),
            FieldSelection::All => false,
        }
    }

    pub fn is_all_fields(&self) -> bool {
        matches!(self.selection, FieldSelection::All)
    }

    pub fn target_field(&self) -> &str {
        &self.target_field
    }

    /// Configured stages, or [`default_stages`] when none are configured.
    pub fn stages(&self) -> &[StageDescriptor] {
        if self.stages.is_empty() {
            default_stages()
        } else {
            &self.stages
        }
    }

    fn add_fields(&mut self, new_fields: impl Iterator<Item = String>) {
        match &mut self.selection {
            FieldSelection::Explicit(fields) => fields.extend(new_fields),
            FieldSelection::All => self.selection = FieldSelection::Explicit(new_fields.collect()),
        }
    }
}

impl Default for ExtractSettings {
    fn default() -> Self {
        Self::new()
    }
}
