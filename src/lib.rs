//! # ingest-extract: Configurable Entity Extraction for Ingestion Pipelines
//!
//! Enriches structured records by running an ordered sequence of extraction stages
//! over selected fields and writing the distinct extracted values back into the
//! record under a target field.
//!
//! ## Features
//!
//! - **Field selection**: scan an explicit set of fields (dotted paths allowed) or every field
//! - **Stage registry**: load stages by name, each bound to its own typed settings
//! - **Fail-fast execution**: the first failing stage aborts the document, leaving it untouched
//! - **Deduplicated output**: each extracted value appears once in the target field
//! - **Host adapters**: NDJSON streams, an HTTP enrichment API and NATS JetStream publishing
//!
//! ## Example: Configuration
//!
//! ```yaml
//! tag: emails
//! fields: [source_field, another_source_field]
//! target_field: target_field
//! processors:
//!   - class: EmailExtractor
//!   - class: RegexExtractor
//!     settings:
//!       pattern: "case-[0-9]{4}"
//!       kind: case_number
//! ```
//!
//! ## Example: Builder
//!
//! ```
//! use ingest_extract::{Document, ExtractPipeline, ExtractSettings, StageRegistry};
//! use ingest_extract::stages::EmailExtractor;
//! use serde_json::json;
//!
//! let settings = ExtractSettings::new()
//!     .with_fields(["source_field", "another_source_field"])
//!     .with_target_field("target_field")
//!     .with_stage::<EmailExtractor>();
//!
//! let pipeline = ExtractPipeline::new("emails", &settings, &StageRegistry::builtin()).unwrap();
//!
//! let mut record = Document::from_value(json!({
//!     "source_field": "John (john@example.com) e-mailed jane@example.com last week.",
//!     "another_source_field": "mary@example.com",
//!     "dont_process": "peter@example.com"
//! })).unwrap();
//!
//! pipeline.execute(&mut record).unwrap();
//! ```

// Core modules
pub mod error;
pub mod document;
pub mod extraction;
pub mod item;
pub mod stage;
pub mod settings;
pub mod registry;
pub mod pipeline;
pub mod config;

// Built-in extraction stages
pub mod stages;

// NDJSON record streams
pub mod serialization;

// NATS JetStream integration
pub mod nats;

// Re-export key types
pub use error::{ExtractError, Result};
pub use document::Document;
pub use extraction::{FieldPath, PathSegment};
pub use item::{Extraction, Item, TextUnit};
pub use stage::{BoundSettings, NoSettings, PendingStage, Stage, StageDefinition, StageError, StageSettings, StageStatus};
pub use settings::{ExtractSettings, FieldSelection, StageDescriptor, DEFAULT_TARGET_FIELD};
pub use registry::{SettingsConverter, StageRegistry};
pub use pipeline::{aggregate, ExtractPipeline};
pub use config::{load_config_file, parse_config, settings_from_config};
pub use serialization::{NdjsonReader, NdjsonWriter};

// Re-export nats types
pub use nats::{RecordEnvelope, EnrichmentResponse, EnrichmentStatus, NatsClient, NatsConfig};
