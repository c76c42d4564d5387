/// NATS JetStream integration module
///
/// Publishes enriched records for downstream indexing

pub mod message_envelope;
pub mod client;

pub use message_envelope::{RecordEnvelope, EnrichmentResponse, EnrichmentStatus};
pub use client::{NatsClient, NatsConfig};
