//! Extraction pipeline: assembly, per-document execution and aggregation.
//!
//! A pipeline is assembled once from [`ExtractSettings`]: every stage descriptor is
//! resolved through the [`StageRegistry`] and configured, and any failure rejects the
//! whole pipeline. The assembled pipeline is then shared read-only across all the
//! documents routed to it, possibly from many threads.
//!
//! # Example Flow
//! 1. Materialize one text unit per selected string field present in the record
//! 2. Run each stage in order against the shared working item
//! 3. Stop at the first stage reporting failure; the record is left untouched
//! 4. Otherwise collect the distinct extracted values into the target field

use indexmap::IndexSet;
use serde_json::{Map, Value};

use crate::config;
use crate::document::Document;
use crate::error::{ExtractError, Result};
use crate::item::Item;
use crate::registry::StageRegistry;
use crate::settings::{ExtractSettings, FieldSelection};
use crate::stage::{Stage, StageStatus};

/// Type name under which this processor is configured by ingestion hosts
pub const TYPE: &str = "extract";

/// Configured, reusable extraction pipeline.
pub struct ExtractPipeline {
    /// Host-supplied tag used in logs and errors
    tag: String,
    selection: FieldSelection,
    target_field: String,
    stages: Vec<Box<dyn Stage>>,
}

impl ExtractPipeline {
    /// Assemble a pipeline from settings.
    ///
    /// # Errors
    /// Returns the first resolution or configuration error; no partial pipeline is
    /// ever returned.
    ///
    /// # Example
    /// ```
    /// use ingest_extract::{Document, ExtractPipeline, ExtractSettings, StageRegistry};
    /// use serde_json::json;
    ///
    /// let settings = ExtractSettings::new().with_field("body");
    /// let pipeline = ExtractPipeline::new("docs", &settings, &StageRegistry::builtin()).unwrap();
    ///
    /// let mut document = Document::from_value(json!({"body": "mail ops@example.com"})).unwrap();
    /// pipeline.execute(&mut document).unwrap();
    /// assert_eq!(document.get_field("extracted"), Some(&json!(["ops@example.com"])));
    /// ```
    pub fn new(tag: impl Into<String>, settings: &ExtractSettings, registry: &StageRegistry) -> Result<Self> {
        let tag = tag.into();

        if settings.target_field().trim().is_empty() {
            return Err(ExtractError::config(format!(
                "[{}] target field must not be empty",
                config::CONFIG_TARGET_FIELD
            )));
        }

        let mut stages = Vec::with_capacity(settings.stages().len());
        for descriptor in settings.stages() {
            let pending = registry.resolve(descriptor)?;
            let stage_id = pending.stage_id().to_string();

            let stage = pending
                .configure()
                .map_err(|e| ExtractError::StageConfiguration {
                    stage: stage_id.clone(),
                    reason: e.to_string(),
                })?;

            tracing::debug!("Pipeline [{}] configured stage {}", tag, stage_id);
            stages.push(stage);
        }

        tracing::info!(
            "Pipeline [{}] ready with {} stage(s), writing to '{}'",
            tag,
            stages.len(),
            settings.target_field()
        );

        Ok(Self {
            tag,
            selection: settings.field_selection().clone(),
            target_field: settings.target_field().to_string(),
            stages,
        })
    }

    /// Assemble a pipeline from a host configuration map.
    ///
    /// The optional `tag` key of the configuration names the pipeline.
    pub fn from_config(config: &Map<String, Value>, registry: &StageRegistry) -> Result<Self> {
        let tag = config::read_tag(config)?;
        let settings = config::settings_from_config(config, registry)?;
        Self::new(tag, &settings, registry)
    }

    pub fn tag(&self) -> &str {
        &self.tag
    }

    pub fn target_field(&self) -> &str {
        &self.target_field
    }

    pub fn field_selection(&self) -> &FieldSelection {
        &self.selection
    }

    /// Names of the configured stages, in execution order.
    pub fn stage_names(&self) -> Vec<&str> {
        self.stages.iter().map(|s| s.name()).collect()
    }

    /// Run the pipeline over one document.
    ///
    /// On success the distinct extracted values are written to the target field,
    /// overwriting any prior value, and their count is returned.
    ///
    /// # Errors
    /// `StageExecution` naming the first stage that reported failure; the document
    /// is not modified in that case. `FieldWrite` if the target path cannot be set.
    pub fn execute(&self, document: &mut Document) -> Result<usize> {
        let mut item = self.materialize(document);
        tracing::debug!(
            "Pipeline [{}] materialized {} text unit(s)",
            self.tag,
            item.unit_count()
        );

        self.run_stages(&mut item)?;

        let extracted = aggregate(&item);
        let count = extracted.len();
        let values = extracted.into_iter().map(Value::String).collect();
        document.set_field(&self.target_field, Value::Array(values))?;

        tracing::debug!(
            "Pipeline [{}] wrote {} value(s) to '{}'",
            self.tag,
            count,
            self.target_field
        );
        Ok(count)
    }

    /// Build the working item from the selected fields of a document.
    ///
    /// Selected fields that are absent or not strings are skipped.
    pub fn materialize(&self, document: &Document) -> Item {
        let mut item = Item::new();

        let names: Vec<String> = match &self.selection {
            FieldSelection::All => document.field_names(),
            FieldSelection::Explicit(fields) => fields.iter().cloned().collect(),
        };

        for name in names {
            match document.get_field(&name) {
                None => continue,
                Some(Value::String(text)) => {
                    item.create_text(name, text.as_str());
                }
                Some(_) => {
                    tracing::debug!(
                        "Pipeline [{}] skipping non-string field '{}'",
                        self.tag,
                        name
                    );
                }
            }
        }

        item
    }

    /// Run every stage in order, stopping at the first failure.
    pub fn run_stages(&self, item: &mut Item) -> Result<()> {
        for stage in &self.stages {
            match stage.process(item) {
                StageStatus::Success => {
                    tracing::debug!("Pipeline [{}] stage {} succeeded", self.tag, stage.name());
                }
                StageStatus::Failure { reason } => {
                    tracing::warn!(
                        "Pipeline [{}] stage {} failed: {}",
                        self.tag,
                        stage.name(),
                        reason
                    );
                    return Err(ExtractError::StageExecution {
                        stage: stage.name().to_string(),
                        reason,
                    });
                }
            }
        }
        Ok(())
    }
}

impl std::fmt::Debug for ExtractPipeline {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ExtractPipeline")
            .field("tag", &self.tag)
            .field("selection", &self.selection)
            .field("target_field", &self.target_field)
            .field("stages", &self.stage_names())
            .finish()
    }
}

/// Collect the distinct extraction values of an item.
///
/// Values are kept in first-seen order (unit order, then attachment order), but
/// callers should not rely on any particular order.
pub fn aggregate(item: &Item) -> IndexSet<String> {
    item.extractions()
        .map(|(_, extraction)| extraction.value.clone())
        .collect()
}
