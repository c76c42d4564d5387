//! Integration tests for pipeline assembly and execution

use std::collections::HashSet;
use std::sync::atomic::{AtomicUsize, Ordering};

use ingest_extract::stages::{EmailExtractor, Ipv4Extractor, RegexExtractor, RegexSettings, UrlExtractor};
use ingest_extract::{
    BoundSettings, Document, ExtractError, ExtractPipeline, ExtractSettings, Item, NoSettings,
    Stage, StageDefinition, StageDescriptor, StageError, StageRegistry, StageStatus,
};
use serde_json::{json, Value};

fn doc(value: Value) -> Document {
    Document::from_value(value).unwrap()
}

fn extracted(document: &Document, field: &str) -> HashSet<String> {
    document
        .get_field(field)
        .and_then(Value::as_array)
        .map(|values| {
            values
                .iter()
                .filter_map(|v| v.as_str().map(String::from))
                .collect()
        })
        .unwrap_or_default()
}

fn set(values: &[&str]) -> HashSet<String> {
    values.iter().map(|v| v.to_string()).collect()
}

#[test]
fn test_email_end_to_end() {
    let settings = ExtractSettings::new()
        .with_fields(["source_field", "another_source_field"])
        .with_target_field("target_field")
        .with_stage::<EmailExtractor>();
    let pipeline = ExtractPipeline::new("emails", &settings, &StageRegistry::builtin()).unwrap();

    let mut record = doc(json!({
        "source_field": "John (john@example.com) e-mailed jane@example.com last week.",
        "another_source_field": "mary@example.com",
        "dont_process": "peter@example.com"
    }));

    let count = pipeline.execute(&mut record).unwrap();

    assert_eq!(count, 3);
    let values = extracted(&record, "target_field");
    assert_eq!(values, set(&["john@example.com", "jane@example.com", "mary@example.com"]));
    assert!(!values.contains("peter@example.com"));
    assert_eq!(record.get_str("dont_process"), Some("peter@example.com"));
}

#[test]
fn test_email_end_to_end_from_config() {
    let config = ingest_extract::parse_config(
        r#"
fields: [source_field, another_source_field]
target_field: target_field
processors:
  - class: EmailExtractor
"#,
    )
    .unwrap();
    let pipeline = ExtractPipeline::from_config(&config, &StageRegistry::builtin()).unwrap();

    let mut record = doc(json!({
        "source_field": "John (john@example.com) e-mailed jane@example.com last week.",
        "another_source_field": "mary@example.com",
        "dont_process": "peter@example.com"
    }));
    pipeline.execute(&mut record).unwrap();

    assert_eq!(
        extracted(&record, "target_field"),
        set(&["john@example.com", "jane@example.com", "mary@example.com"])
    );
}

#[test]
fn test_unselected_fields_never_contribute() {
    let settings = ExtractSettings::new()
        .with_field("body")
        .with_stage::<EmailExtractor>()
        .with_stage::<Ipv4Extractor>();
    let pipeline = ExtractPipeline::new("t", &settings, &StageRegistry::builtin()).unwrap();

    let mut record = doc(json!({
        "body": "nothing to see",
        "subject": "ops@example.com from 10.0.0.1"
    }));
    let count = pipeline.execute(&mut record).unwrap();

    assert_eq!(count, 0);
    assert_eq!(record.get_field("extracted"), Some(&json!([])));
}

#[test]
fn test_all_fields_follows_each_record() {
    let settings = ExtractSettings::new().with_all_fields();
    let pipeline = ExtractPipeline::new("t", &settings, &StageRegistry::builtin()).unwrap();

    let mut first = doc(json!({"a": "a@example.com", "b": "b@example.com"}));
    pipeline.execute(&mut first).unwrap();
    assert_eq!(extracted(&first, "extracted"), set(&["a@example.com", "b@example.com"]));

    let mut second = doc(json!({"c": "c@example.com"}));
    pipeline.execute(&mut second).unwrap();
    assert_eq!(extracted(&second, "extracted"), set(&["c@example.com"]));
}

#[test]
fn test_absent_selected_field_is_not_an_error() {
    let settings = ExtractSettings::new().with_fields(["body", "missing"]);
    let pipeline = ExtractPipeline::new("t", &settings, &StageRegistry::builtin()).unwrap();

    let mut record = doc(json!({"body": "ops@example.com"}));
    pipeline.execute(&mut record).unwrap();
    assert_eq!(extracted(&record, "extracted"), set(&["ops@example.com"]));

    let mut empty = doc(json!({}));
    assert_eq!(pipeline.execute(&mut empty).unwrap(), 0);
    assert_eq!(empty.get_field("extracted"), Some(&json!([])));
}

#[test]
fn test_default_stage_when_none_configured() {
    let settings = ExtractSettings::new().with_field("body");
    let pipeline = ExtractPipeline::new("t", &settings, &StageRegistry::builtin()).unwrap();

    assert_eq!(pipeline.stage_names(), vec!["EmailExtractor"]);

    let mut record = doc(json!({"body": "ops@example.com and 10.0.0.1"}));
    pipeline.execute(&mut record).unwrap();
    assert_eq!(record.get_field("extracted"), Some(&json!(["ops@example.com"])));
}

#[test]
fn test_duplicates_collapse_across_fields_and_stages() {
    let settings = ExtractSettings::new()
        .with_fields(["a", "b"])
        .with_stage::<EmailExtractor>()
        .with_stage_settings::<RegexExtractor>(&RegexSettings::new("[a-z]+@example\\.com", 0, "regex"))
        .unwrap();
    let pipeline = ExtractPipeline::new("t", &settings, &StageRegistry::builtin()).unwrap();

    let input = json!({
        "a": "ops@example.com ops@example.com",
        "b": "ops@example.com dev@example.com"
    });

    let mut first = doc(input.clone());
    let mut second = doc(input);
    assert_eq!(pipeline.execute(&mut first).unwrap(), 2);
    assert_eq!(pipeline.execute(&mut second).unwrap(), 2);

    assert_eq!(extracted(&first, "extracted"), set(&["ops@example.com", "dev@example.com"]));
    assert_eq!(extracted(&first, "extracted"), extracted(&second, "extracted"));
}

#[test]
fn test_rerun_overwrites_target_field() {
    let settings = ExtractSettings::new().with_field("body");
    let pipeline = ExtractPipeline::new("t", &settings, &StageRegistry::builtin()).unwrap();

    let mut record = doc(json!({"body": "ops@example.com", "extracted": ["stale"]}));
    pipeline.execute(&mut record).unwrap();
    assert_eq!(record.get_field("extracted"), Some(&json!(["ops@example.com"])));
}

#[test]
fn test_dotted_paths() {
    let settings = ExtractSettings::new()
        .with_field("meta.notes")
        .with_target_field("enrichment.emails");
    let pipeline = ExtractPipeline::new("t", &settings, &StageRegistry::builtin()).unwrap();

    let mut record = doc(json!({"meta": {"notes": "ops@example.com"}}));
    pipeline.execute(&mut record).unwrap();

    assert_eq!(
        record.get_field("enrichment.emails"),
        Some(&json!(["ops@example.com"]))
    );
}

#[test]
fn test_mixed_stages() {
    let settings = ExtractSettings::new()
        .with_field("body")
        .with_stage_names(&StageRegistry::builtin(), ["email_extractor", "UrlExtractor", "ipv4-extractor"])
        .unwrap();
    let pipeline = ExtractPipeline::new("t", &settings, &StageRegistry::builtin()).unwrap();

    let mut record = doc(json!({
        "body": "See https://example.com/docs, mail ops@example.com or ping 192.168.1.20."
    }));
    pipeline.execute(&mut record).unwrap();

    let values = extracted(&record, "extracted");
    assert!(values.contains("ops@example.com"));
    assert!(values.contains("https://example.com/docs"));
    assert!(values.contains("192.168.1.20"));
}

static FAILING_CALLS: AtomicUsize = AtomicUsize::new(0);

struct RejectsEverything;

impl Stage for RejectsEverything {
    fn name(&self) -> &str {
        Self::NAME
    }

    fn process(&self, _item: &mut Item) -> StageStatus {
        FAILING_CALLS.fetch_add(1, Ordering::SeqCst);
        StageStatus::failure("rejected")
    }
}

impl StageDefinition for RejectsEverything {
    const NAME: &'static str = "RejectsEverything";
    type Settings = NoSettings;

    fn create() -> Result<Self, StageError> {
        Ok(Self)
    }

    fn configure(&mut self, _settings: BoundSettings<NoSettings>) -> Result<(), StageError> {
        Ok(())
    }
}

#[test]
fn test_stage_failure_leaves_record_untouched() {
    let mut registry = StageRegistry::builtin();
    registry.register::<RejectsEverything>();

    let settings = ExtractSettings::new()
        .with_field("body")
        .with_stage::<EmailExtractor>()
        .with_stage::<RejectsEverything>()
        .with_stage::<UrlExtractor>();
    let pipeline = ExtractPipeline::new("t", &settings, &registry).unwrap();

    let original = doc(json!({"body": "ops@example.com", "extracted": ["keep"]}));
    let mut record = original.clone();

    let err = pipeline.execute(&mut record).unwrap_err();
    match &err {
        ExtractError::StageExecution { stage, .. } => assert_eq!(stage, "RejectsEverything"),
        other => panic!("unexpected error: {}", other),
    }
    assert!(!err.is_construction_error());
    assert_eq!(record, original);
    assert!(FAILING_CALLS.load(Ordering::SeqCst) >= 1);
}

#[test]
fn test_descriptor_equality() {
    let a = StageDescriptor::of_settings::<RegexExtractor>(&RegexSettings::new("x", 0, "k")).unwrap();
    let b = StageDescriptor::of_settings::<RegexExtractor>(&RegexSettings::new("x", 0, "k")).unwrap();
    let c = StageDescriptor::of_settings::<RegexExtractor>(&RegexSettings::new("y", 0, "k")).unwrap();

    assert_eq!(a, b);
    assert_ne!(a, c);
    assert_ne!(StageDescriptor::of::<EmailExtractor>(), StageDescriptor::of::<UrlExtractor>());
    assert_eq!(StageDescriptor::of::<EmailExtractor>(), StageDescriptor::new("EmailExtractor"));
    assert_eq!(StageDescriptor::of::<EmailExtractor>(), StageDescriptor::new("email_extractor"));

    let mut raw = serde_json::Map::new();
    raw.insert("pattern".to_string(), json!("x"));
    let registry = StageRegistry::builtin();
    let from_config = registry.descriptor("regex-extractor", raw.clone()).unwrap();
    assert_eq!(
        from_config,
        StageDescriptor::of_settings::<RegexExtractor>(&RegexSettings::new("x", 0, "regex")).unwrap()
    );
    assert_eq!(
        registry.canonicalize(&StageDescriptor::with_settings("RegexExtractor", raw)).unwrap(),
        from_config
    );
}

#[test]
fn test_construction_errors_reject_pipeline() {
    let registry = StageRegistry::builtin();

    let unknown = ExtractSettings::new()
        .with_field("body")
        .with_stage_descriptor(StageDescriptor::new("com.example.Missing"));
    let err = ExtractPipeline::new("t", &unknown, &registry).unwrap_err();
    assert!(matches!(err, ExtractError::StageNotFound { .. }));
    assert!(err.is_construction_error());

    let mut bad_settings = serde_json::Map::new();
    bad_settings.insert("pattern".to_string(), json!(12));
    let binding = ExtractSettings::new()
        .with_field("body")
        .with_stage_descriptor(StageDescriptor::with_settings("RegexExtractor", bad_settings));
    let err = ExtractPipeline::new("t", &binding, &registry).unwrap_err();
    assert!(matches!(err, ExtractError::SettingsBinding { .. }));

    let invalid = ExtractSettings::new()
        .with_field("body")
        .with_stage_settings::<RegexExtractor>(&RegexSettings::new("(unclosed", 0, "k"))
        .unwrap();
    let err = ExtractPipeline::new("t", &invalid, &registry).unwrap_err();
    assert!(matches!(err, ExtractError::StageConfiguration { .. }));

    let empty_target = ExtractSettings::new().with_field("body").with_target_field("");
    let err = ExtractPipeline::new("t", &empty_target, &registry).unwrap_err();
    assert!(matches!(err, ExtractError::Configuration(_)));
}

#[test]
fn test_shared_pipeline_across_threads() {
    let settings = ExtractSettings::new()
        .with_field("body")
        .with_stage::<EmailExtractor>()
        .with_stage::<Ipv4Extractor>();
    let pipeline = ExtractPipeline::new("t", &settings, &StageRegistry::builtin()).unwrap();

    std::thread::scope(|scope| {
        let handles: Vec<_> = (0..8)
            .map(|n| {
                let pipeline = &pipeline;
                scope.spawn(move || {
                    let mut results = Vec::new();
                    for i in 0..50 {
                        let mut record = doc(json!({
                            "body": format!("user{}-{}@example.com at 10.0.{}.{}", n, i, n, i)
                        }));
                        pipeline.execute(&mut record).unwrap();
                        results.push((n, i, extracted(&record, "extracted")));
                    }
                    results
                })
            })
            .collect();

        for handle in handles {
            for (n, i, values) in handle.join().unwrap() {
                let email = format!("user{}-{}@example.com", n, i);
                let ip = format!("10.0.{}.{}", n, i);
                assert_eq!(values, set(&[email.as_str(), ip.as_str()]));
            }
        }
    });
}
