/// NATS JetStream client for publishing enriched records
///
/// Provides connection management and publishing of enriched records to NATS JetStream

use async_nats::jetstream;
use std::time::Duration;
use crate::nats::message_envelope::RecordEnvelope;

#[derive(Clone)]
pub struct NatsConfig {
    pub url: String,
    pub stream_name: String,
    pub max_age: Duration,
    pub max_bytes: i64,
}

impl Default for NatsConfig {
    fn default() -> Self {
        Self {
            url: std::env::var("NATS_URL")
                .unwrap_or_else(|_| "nats://localhost:4222".to_string()),
            stream_name: std::env::var("NATS_STREAM")
                .unwrap_or_else(|_| "ENRICHED".to_string()),
            max_age: Duration::from_secs(24 * 60 * 60), // 24 hours
            max_bytes: 1024 * 1024 * 1024, // 1GB
        }
    }
}

/// Subject an enriched record is published on.
pub fn enriched_subject(pipeline: &str) -> String {
    let token: String = pipeline
        .chars()
        .map(|c| if c.is_ascii_alphanumeric() || c == '-' || c == '_' { c } else { '_' })
        .collect();
    format!("records.enriched.{}", if token.is_empty() { "default" } else { token.as_str() })
}

#[derive(Clone)]
pub struct NatsClient {
    client: async_nats::Client,
    jetstream: jetstream::Context,
    stream_name: String,
}

impl NatsClient {
    /// Connect to NATS and initialize JetStream
    pub async fn connect(config: NatsConfig) -> Result<Self, async_nats::Error> {
        let client = async_nats::connect(&config.url).await?;
        tracing::info!("Connected to NATS at {}", config.url);

        let jetstream = jetstream::new(client.clone());

        let _stream = jetstream
            .get_or_create_stream(jetstream::stream::Config {
                name: config.stream_name.clone(),
                subjects: vec!["records.>".to_string()],
                max_age: config.max_age,
                max_bytes: config.max_bytes,
                storage: jetstream::stream::StorageType::File,
                num_replicas: 1,
                ..Default::default()
            })
            .await?;

        tracing::info!("JetStream stream '{}' ready", config.stream_name);

        Ok(Self {
            client,
            jetstream,
            stream_name: config.stream_name,
        })
    }

    /// Publish an enriched record to JetStream
    pub async fn publish_record(
        &self,
        envelope: &RecordEnvelope,
    ) -> Result<(), Box<dyn std::error::Error + Send + Sync>> {
        let subject = enriched_subject(&envelope.pipeline);
        let payload = serde_json::to_vec(envelope)?;

        // Publish with JetStream (durable, acknowledged)
        let ack = self.jetstream
            .publish(subject.clone(), payload.into())
            .await?;
        ack.await?;

        tracing::debug!(
            "Published record {} to JetStream subject {}",
            envelope.message_id,
            subject
        );

        Ok(())
    }

    pub fn stream_name(&self) -> &str {
        &self.stream_name
    }

    /// Check if the NATS connection is active
    pub fn is_connected(&self) -> bool {
        self.client.connection_state() == async_nats::connection::State::Connected
    }
}
