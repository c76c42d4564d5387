//! Stage registry and settings binding.
//!
//! The registry maps stage identifiers to constructors. Each registered stage
//! declares the settings type it accepts through [`StageDefinition::Settings`], so
//! resolving a descriptor never needs runtime type introspection:
//!
//! 1. the identifier is normalized and looked up,
//! 2. the stage is built with its no-argument constructor,
//! 3. a non-empty raw settings payload is converted into the declared settings type,
//! 4. the `(stage, settings)` pair is returned for the pipeline to configure.

use std::collections::HashMap;
use std::fmt;

use convert_case::{Case, Casing};
use serde::Serialize;
use serde_json::{Map, Value};

use crate::error::{ExtractError, Result};
use crate::settings::StageDescriptor;
use crate::stage::{BoundSettings, PendingStage, ResolvedStage, StageDefinition, StageSettings};
use crate::stages;

/// Converts raw settings maps into typed stage settings.
///
/// Conversion is structural: the map is deserialized into the settings type with
/// the usual serde coercions. In strict mode (the default) properties the settings
/// type does not know are rejected. Unknown properties are found by serializing the
/// bound value back, so settings types that rename or skip fields on output may
/// need [`SettingsConverter::lenient`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SettingsConverter {
    strict: bool,
}

impl SettingsConverter {
    pub fn strict() -> Self {
        Self { strict: true }
    }

    /// Converter that ignores properties the settings type does not declare.
    pub fn lenient() -> Self {
        Self { strict: false }
    }

    pub fn is_strict(&self) -> bool {
        self.strict
    }

    pub fn convert<S: StageSettings>(&self, raw: &Map<String, Value>) -> std::result::Result<S, String> {
        let settings: S =
            serde_json::from_value(Value::Object(raw.clone())).map_err(|e| e.to_string())?;

        if self.strict {
            reject_unknown_properties(raw, &settings)?;
        }

        Ok(settings)
    }
}

impl Default for SettingsConverter {
    fn default() -> Self {
        Self::strict()
    }
}

fn reject_unknown_properties<S: Serialize>(raw: &Map<String, Value>, settings: &S) -> std::result::Result<(), String> {
    let known = match serde_json::to_value(settings).map_err(|e| e.to_string())? {
        Value::Object(map) => map,
        _ => return Ok(()),
    };

    let unknown: Vec<&str> = raw
        .keys()
        .filter(|key| !known.contains_key(key.as_str()))
        .map(String::as_str)
        .collect();

    if unknown.is_empty() {
        Ok(())
    } else {
        Err(format!("unknown properties: {}", unknown.join(", ")))
    }
}

type StageFactory = fn(&Map<String, Value>, &SettingsConverter) -> Result<Box<dyn PendingStage>>;

type SettingsNormalizer = fn(&Map<String, Value>, &SettingsConverter) -> Result<Map<String, Value>>;

#[derive(Clone, Copy)]
struct StageEntry {
    name: &'static str,
    accepts_settings: bool,
    factory: StageFactory,
    normalizer: SettingsNormalizer,
}

/// Convert a raw payload into the stage's settings type and serialize it back, so
/// omitted defaults are filled in and equal bound settings give equal maps.
fn normalize_settings<S: StageDefinition>(
    raw: &Map<String, Value>,
    converter: &SettingsConverter,
) -> Result<Map<String, Value>> {
    if raw.is_empty() || !<S::Settings as StageSettings>::DECLARED {
        return Ok(raw.clone());
    }

    let binding_error = |reason: String| ExtractError::SettingsBinding {
        stage: S::NAME.to_string(),
        reason,
    };

    let typed = converter.convert::<S::Settings>(raw).map_err(binding_error)?;
    match serde_json::to_value(&typed).map_err(|e| binding_error(e.to_string()))? {
        Value::Object(map) => Ok(map),
        _ => Err(binding_error("settings must serialize to an object".to_string())),
    }
}

fn instantiate<S: StageDefinition>(
    raw: &Map<String, Value>,
    converter: &SettingsConverter,
) -> Result<Box<dyn PendingStage>> {
    let stage = S::create().map_err(|e| ExtractError::StageInstantiation {
        stage: S::NAME.to_string(),
        reason: e.to_string(),
    })?;

    let settings = if raw.is_empty() {
        BoundSettings::Empty
    } else if !<S::Settings as StageSettings>::DECLARED {
        return Err(ExtractError::SettingsBinding {
            stage: S::NAME.to_string(),
            reason: "stage does not accept settings".to_string(),
        });
    } else {
        let typed = converter
            .convert::<S::Settings>(raw)
            .map_err(|reason| ExtractError::SettingsBinding {
                stage: S::NAME.to_string(),
                reason,
            })?;
        BoundSettings::Typed(typed)
    };

    Ok(Box::new(ResolvedStage::<S>::new(stage, settings)))
}

/// Lookup key for a stage identifier: case and separator insensitive.
pub(crate) fn normalize(identifier: &str) -> String {
    identifier.trim().to_case(Case::Snake)
}

/// Registry of stage types that pipelines can load by name.
#[derive(Clone)]
pub struct StageRegistry {
    stages: HashMap<String, StageEntry>,
    converter: SettingsConverter,
}

impl StageRegistry {
    /// Create an empty registry with a strict settings converter.
    pub fn new() -> Self {
        Self {
            stages: HashMap::new(),
            converter: SettingsConverter::default(),
        }
    }

    /// Create a registry holding the built-in stages.
    pub fn builtin() -> Self {
        let mut registry = Self::new();
        stages::register_builtins(&mut registry);
        registry
    }

    /// Replace the settings converter used when binding settings.
    pub fn with_converter(mut self, converter: SettingsConverter) -> Self {
        self.converter = converter;
        self
    }

    pub fn converter(&self) -> &SettingsConverter {
        &self.converter
    }

    /// Register a stage type under its [`StageDefinition::NAME`].
    ///
    /// Registering a second type whose name normalizes to the same key replaces
    /// the first.
    pub fn register<S: StageDefinition>(&mut self) {
        let key = normalize(S::NAME);
        if self.stages.contains_key(&key) {
            tracing::debug!("Replacing registered stage {}", S::NAME);
        }

        self.stages.insert(
            key,
            StageEntry {
                name: S::NAME,
                accepts_settings: <S::Settings as StageSettings>::DECLARED,
                factory: instantiate::<S>,
                normalizer: normalize_settings::<S>,
            },
        );
    }

    fn entry(&self, identifier: &str) -> Result<&StageEntry> {
        self.stages
            .get(&normalize(identifier))
            .ok_or_else(|| ExtractError::StageNotFound {
                stage: identifier.to_string(),
            })
    }

    /// Canonical registered name for an identifier.
    pub fn canonical_name(&self, identifier: &str) -> Result<&'static str> {
        self.entry(identifier).map(|entry| entry.name)
    }

    /// Check if a stage is registered
    pub fn has_stage(&self, identifier: &str) -> bool {
        self.entry(identifier).is_ok()
    }

    /// Whether the identified stage declares a settings type.
    pub fn accepts_settings(&self, identifier: &str) -> Result<bool> {
        self.entry(identifier).map(|entry| entry.accepts_settings)
    }

    /// Canonical names of all registered stages, sorted.
    pub fn list_stages(&self) -> Vec<&'static str> {
        let mut names: Vec<&'static str> = self.stages.values().map(|e| e.name).collect();
        names.sort_unstable();
        names
    }

    pub fn count(&self) -> usize {
        self.stages.len()
    }

    /// Descriptor in canonical form: the registered stage name and the settings
    /// payload after a round-trip through the stage's settings type.
    ///
    /// Canonical descriptors compare equal exactly when they bind the same stage
    /// type to equal settings.
    pub fn descriptor(&self, identifier: &str, raw: Map<String, Value>) -> Result<StageDescriptor> {
        let entry = self.entry(identifier)?;
        let settings = (entry.normalizer)(&raw, &self.converter)?;
        Ok(StageDescriptor::with_settings(entry.name, settings))
    }

    /// Canonical form of an existing descriptor.
    pub fn canonicalize(&self, descriptor: &StageDescriptor) -> Result<StageDescriptor> {
        self.descriptor(descriptor.stage_id(), descriptor.settings().clone())
    }

    /// Resolve a descriptor into an instantiated stage bound to its settings.
    pub fn resolve(&self, descriptor: &StageDescriptor) -> Result<Box<dyn PendingStage>> {
        self.resolve_name(descriptor.stage_id(), descriptor.settings())
    }

    /// Resolve an identifier and raw settings payload.
    pub fn resolve_name(&self, identifier: &str, raw: &Map<String, Value>) -> Result<Box<dyn PendingStage>> {
        let entry = self.entry(identifier)?;
        (entry.factory)(raw, &self.converter)
    }
}

impl Default for StageRegistry {
    fn default() -> Self {
        Self::new()
    }
}

impl fmt::Debug for StageRegistry {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("StageRegistry")
            .field("stages", &self.list_stages())
            .field("converter", &self.converter)
            .finish()
    }
}
