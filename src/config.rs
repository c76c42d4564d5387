//! Pipeline configuration loader.
//!
//! Reads the host-supplied configuration map into [`ExtractSettings`]:
//!
//! ```yaml
//! tag: emails                      # optional, used in logs and errors
//! description: tag e-mail entities # optional, ignored
//! process_all_fields: false        # optional
//! fields: [body, subject]          # required unless process_all_fields is true
//! target_field: entities           # optional, default "extracted"
//! processors:                      # optional, default: EmailExtractor
//!   - class: RegexExtractor
//!     settings:
//!       pattern: "ref-[0-9]+"
//! ```

use std::fs;
use std::path::Path;

use serde_json::{Map, Value};

use crate::error::{ExtractError, Result};
use crate::extraction::value_kind;
use crate::pipeline::TYPE;
use crate::registry::StageRegistry;
use crate::settings::ExtractSettings;

/// Name of setting used to control whether all fields should be processed
pub const CONFIG_PROCESS_ALL_FIELDS: &str = "process_all_fields";

/// Name of setting used to control which fields are processed
pub const CONFIG_FIELDS: &str = "fields";

/// Name of the setting used to control where extracted values are saved
pub const CONFIG_TARGET_FIELD: &str = "target_field";

/// Name of setting used to control which stages are run
pub const CONFIG_PROCESSORS: &str = "processors";

/// Optional pipeline tag
pub const CONFIG_TAG: &str = "tag";

/// Optional free-text description
pub const CONFIG_DESCRIPTION: &str = "description";

/// Stage identifier key inside a processor definition
pub const PROCESSOR_CLASS: &str = "class";

/// Stage settings key inside a processor definition
pub const PROCESSOR_SETTINGS: &str = "settings";

const SUPPORTED_KEYS: &[&str] = &[
    CONFIG_PROCESS_ALL_FIELDS,
    CONFIG_FIELDS,
    CONFIG_TARGET_FIELD,
    CONFIG_PROCESSORS,
    CONFIG_TAG,
    CONFIG_DESCRIPTION,
];

/// Load a configuration map from a YAML or JSON file.
pub fn load_config_file<P: AsRef<Path>>(path: P) -> Result<Map<String, Value>> {
    let path = path.as_ref();
    let contents = fs::read_to_string(path)?;
    parse_config(&contents).map_err(|e| match e {
        ExtractError::Configuration(msg) => {
            ExtractError::config(format!("{}: {}", path.display(), msg))
        }
        other => other,
    })
}

/// Parse a configuration map from YAML or JSON text.
pub fn parse_config(contents: &str) -> Result<Map<String, Value>> {
    // YAML is a superset of JSON, so one parser covers both
    let value: Value = serde_yaml::from_str(contents)?;
    match value {
        Value::Object(map) => Ok(map),
        other => Err(ExtractError::config(format!(
            "configuration must be a map, got {}",
            value_kind(&other)
        ))),
    }
}

/// Read the optional pipeline tag, defaulting to the processor type.
pub fn read_tag(config: &Map<String, Value>) -> Result<String> {
    Ok(read_string(config, CONFIG_TAG)?.unwrap_or_else(|| TYPE.to_string()))
}

/// Build settings from a configuration map.
///
/// If `process_all_fields` is present and true, `fields` is ignored; otherwise
/// `fields` is required. Stage classes are resolved against `registry` and their
/// settings bound as they are read, so unknown classes and unbindable settings fail
/// here.
pub fn settings_from_config(config: &Map<String, Value>, registry: &StageRegistry) -> Result<ExtractSettings> {
    reject_unsupported_keys(config)?;

    let mut settings = ExtractSettings::new();

    let all_fields = read_bool(config, CONFIG_PROCESS_ALL_FIELDS)?.unwrap_or(false);
    if all_fields {
        settings = settings.with_all_fields();
    } else {
        let fields = read_string_list(config, CONFIG_FIELDS)?
            .ok_or_else(|| missing(CONFIG_FIELDS))?;
        settings = settings.with_fields(fields);
    }

    if let Some(target_field) = read_string(config, CONFIG_TARGET_FIELD)? {
        settings = settings.with_target_field(target_field);
    }

    if let Some(processors) = config.get(CONFIG_PROCESSORS) {
        let processors = processors.as_array().ok_or_else(|| {
            wrong_type(CONFIG_PROCESSORS, "a list", processors)
        })?;

        for (index, definition) in processors.iter().enumerate() {
            let (class, stage_settings) = read_processor_definition(index, definition)?;
            settings = settings.with_stage_name_settings(registry, &class, stage_settings)?;
        }
    }

    Ok(settings)
}

/// Split one processor definition into its stage class and raw settings.
fn read_processor_definition(index: usize, definition: &Value) -> Result<(String, Map<String, Value>)> {
    let key = format!("{}[{}]", CONFIG_PROCESSORS, index);
    let definition = definition
        .as_object()
        .ok_or_else(|| wrong_type(&key, "a map", definition))?;

    let class = match definition.get(PROCESSOR_CLASS) {
        None => return Err(missing(&format!("{}.{}", key, PROCESSOR_CLASS))),
        Some(Value::String(class)) => class.clone(),
        Some(other) => {
            return Err(wrong_type(&format!("{}.{}", key, PROCESSOR_CLASS), "a string", other))
        }
    };

    let settings = match definition.get(PROCESSOR_SETTINGS) {
        None | Some(Value::Null) => Map::new(),
        Some(Value::Object(settings)) => settings.clone(),
        Some(other) => {
            return Err(wrong_type(&format!("{}.{}", key, PROCESSOR_SETTINGS), "a map", other))
        }
    };

    Ok((class, settings))
}

fn reject_unsupported_keys(config: &Map<String, Value>) -> Result<()> {
    let unsupported: Vec<&str> = config
        .keys()
        .map(String::as_str)
        .filter(|key| !SUPPORTED_KEYS.contains(key))
        .collect();

    if unsupported.is_empty() {
        Ok(())
    } else {
        Err(ExtractError::config(format!(
            "processor [{}] does not support one or more provided configuration parameters {:?}",
            TYPE, unsupported
        )))
    }
}

fn read_bool(config: &Map<String, Value>, key: &str) -> Result<Option<bool>> {
    match config.get(key) {
        None | Some(Value::Null) => Ok(None),
        Some(Value::Bool(value)) => Ok(Some(*value)),
        Some(other) => Err(wrong_type(key, "a boolean", other)),
    }
}

fn read_string(config: &Map<String, Value>, key: &str) -> Result<Option<String>> {
    match config.get(key) {
        None | Some(Value::Null) => Ok(None),
        Some(Value::String(value)) => Ok(Some(value.clone())),
        Some(other) => Err(wrong_type(key, "a string", other)),
    }
}

fn read_string_list(config: &Map<String, Value>, key: &str) -> Result<Option<Vec<String>>> {
    let items = match config.get(key) {
        None | Some(Value::Null) => return Ok(None),
        Some(Value::Array(items)) => items,
        Some(other) => return Err(wrong_type(key, "a list", other)),
    };

    items
        .iter()
        .map(|item| match item {
            Value::String(value) => Ok(value.clone()),
            other => Err(wrong_type(key, "a list of strings", other)),
        })
        .collect::<Result<Vec<_>>>()
        .map(Some)
}

fn missing(key: &str) -> ExtractError {
    ExtractError::config(format!("[{}] required property is missing", key))
}

fn wrong_type(key: &str, expected: &str, actual: &Value) -> ExtractError {
    ExtractError::config(format!(
        "[{}] must be {}, got {}",
        key,
        expected,
        value_kind(actual)
    ))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::settings::{default_stages, StageDescriptor};
    use crate::stages::{EmailExtractor, Ipv4Extractor, RegexExtractor, RegexSettings};
    use serde_json::json;

    fn config(value: Value) -> Map<String, Value> {
        match value {
            Value::Object(map) => map,
            _ => panic!("expected object"),
        }
    }

    fn read(value: Value) -> Result<ExtractSettings> {
        settings_from_config(&config(value), &StageRegistry::builtin())
    }

    #[test]
    fn test_explicit_fields() {
        let settings = read(json!({"fields": ["a", "b"]})).unwrap();

        assert!(!settings.is_all_fields());
        assert_eq!(settings.fields().collect::<Vec<_>>(), vec!["a", "b"]);
        assert_eq!(settings.target_field(), "extracted");
        assert_eq!(settings.stages(), default_stages());
    }

    #[test]
    fn test_all_fields_ignores_fields() {
        let settings = read(json!({"process_all_fields": true, "fields": 42})).unwrap();
        assert!(settings.is_all_fields());
    }

    #[test]
    fn test_all_fields_false_requires_fields() {
        let err = read(json!({"process_all_fields": false})).unwrap_err();
        assert!(err.to_string().contains("fields"));
    }

    #[test]
    fn test_missing_fields() {
        assert!(matches!(read(json!({})), Err(ExtractError::Configuration(_))));
    }

    #[test]
    fn test_wrong_types() {
        assert!(matches!(
            read(json!({"process_all_fields": "yes"})),
            Err(ExtractError::Configuration(_))
        ));
        assert!(matches!(
            read(json!({"fields": ["a", 1]})),
            Err(ExtractError::Configuration(_))
        ));
        assert!(matches!(
            read(json!({"fields": ["a"], "target_field": 3})),
            Err(ExtractError::Configuration(_))
        ));
        assert!(matches!(
            read(json!({"fields": ["a"], "processors": {"class": "EmailExtractor"}})),
            Err(ExtractError::Configuration(_))
        ));
    }

    #[test]
    fn test_processor_definitions() {
        let settings = read(json!({
            "fields": ["a"],
            "target_field": "entities",
            "processors": [
                {"class": "Ipv4Extractor"},
                {"class": "regex_extractor", "settings": {"pattern": "[0-9]", "group": 0, "kind": "digit"}}
            ]
        }))
        .unwrap();

        assert_eq!(settings.target_field(), "entities");
        assert_eq!(
            settings.stages(),
            &[
                StageDescriptor::of::<Ipv4Extractor>(),
                StageDescriptor::of_settings::<RegexExtractor>(&RegexSettings::new("[0-9]", 0, "digit")).unwrap(),
            ]
        );
    }

    #[test]
    fn test_processor_settings_defaults_are_bound() {
        let settings = read(json!({
            "fields": ["a"],
            "processors": [
                {"class": "email-extractor", "settings": {}},
                {"class": "RegexExtractor", "settings": {"pattern": "[0-9]"}}
            ]
        }))
        .unwrap();

        assert_eq!(
            settings.stages(),
            &[
                StageDescriptor::of::<EmailExtractor>(),
                StageDescriptor::of_settings::<RegexExtractor>(&RegexSettings::new("[0-9]", 0, "regex")).unwrap(),
            ]
        );
    }

    #[test]
    fn test_processor_settings_binding_errors() {
        let err = read(json!({
            "fields": ["a"],
            "processors": [{"class": "RegexExtractor", "settings": {"pattern": "[0-9]", "colour": "red"}}]
        }))
        .unwrap_err();
        assert!(matches!(err, ExtractError::SettingsBinding { .. }));
    }

    #[test]
    fn test_processor_class_errors() {
        let err = read(json!({"fields": ["a"], "processors": [{"settings": {}}]})).unwrap_err();
        assert!(err.to_string().contains("class"));

        let err = read(json!({"fields": ["a"], "processors": [{"class": 5}]})).unwrap_err();
        assert!(matches!(err, ExtractError::Configuration(_)));

        let err = read(json!({"fields": ["a"], "processors": [{"class": "EmailExtractor", "settings": "x"}]})).unwrap_err();
        assert!(matches!(err, ExtractError::Configuration(_)));

        let err = read(json!({"fields": ["a"], "processors": [{"class": "not.a.real.Stage"}]})).unwrap_err();
        assert!(matches!(err, ExtractError::StageNotFound { .. }));
    }

    #[test]
    fn test_unsupported_keys_rejected() {
        let err = read(json!({"fields": ["a"], "feilds": ["b"]})).unwrap_err();
        assert!(err.to_string().contains("feilds"));
    }

    #[test]
    fn test_tag() {
        assert_eq!(read_tag(&config(json!({"tag": "emails"}))).unwrap(), "emails");
        assert_eq!(read_tag(&config(json!({}))).unwrap(), TYPE);
        assert!(read_tag(&config(json!({"tag": 1}))).is_err());
    }

    #[test]
    fn test_parse_yaml_and_json() {
        let yaml = "fields:\n  - body\ntarget_field: out\n";
        let json_text = r#"{"fields": ["body"], "target_field": "out"}"#;

        assert_eq!(parse_config(yaml).unwrap(), parse_config(json_text).unwrap());
        assert!(parse_config("- just\n- a list\n").is_err());
    }
}
