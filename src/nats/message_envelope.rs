/// Envelope for enriched records published to NATS JetStream
///
/// Wraps an enriched record with metadata for downstream indexing and tracing

use serde::{Deserialize, Serialize};
use uuid::Uuid;
use chrono::{DateTime, Utc};

use crate::document::Document;

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RecordEnvelope {
    /// Unique message ID for tracking
    pub message_id: Uuid,

    /// Tag of the pipeline that enriched the record
    pub pipeline: String,

    /// Enriched record
    pub record: Document,

    /// Number of distinct values written to the target field
    pub extracted_count: usize,

    /// Timestamp when the record was enriched
    pub enriched_at: DateTime<Utc>,
}

impl RecordEnvelope {
    /// Create a new record envelope
    pub fn new(pipeline: impl Into<String>, record: Document, extracted_count: usize) -> Self {
        Self {
            message_id: Uuid::new_v4(),
            pipeline: pipeline.into(),
            record,
            extracted_count,
            enriched_at: Utc::now(),
        }
    }
}

/// Response returned to client after enrichment
#[derive(Debug, Serialize)]
pub struct EnrichmentResponse {
    pub message_id: String,
    pub status: EnrichmentStatus,
    pub extracted_count: usize,
    pub record: Document,
    pub timestamp: DateTime<Utc>,
}

impl From<RecordEnvelope> for EnrichmentResponse {
    fn from(envelope: RecordEnvelope) -> Self {
        Self {
            message_id: envelope.message_id.to_string(),
            status: EnrichmentStatus::Enriched,
            extracted_count: envelope.extracted_count,
            record: envelope.record,
            timestamp: envelope.enriched_at,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum EnrichmentStatus {
    Enriched,   // Target field written
    Published,  // Enriched and forwarded to NATS
    Failed,     // Stage failure or invalid record
}
