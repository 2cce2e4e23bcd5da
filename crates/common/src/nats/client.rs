use crate::nats::trace_context::inject_trace_context;
use crate::nats::traits::{JetStreamConsumer, JetStreamPublisher, PullConsumer};
use anyhow::{Context, Result};
use async_nats::jetstream::{self, stream::Config as StreamConfig};
use async_nats::HeaderMap;
use async_trait::async_trait;
use futures::StreamExt;
use std::sync::Arc;
use std::time::Duration;
use tracing::{info, instrument, warn};

pub struct NatsClient {
    jetstream: jetstream::Context,
}

impl NatsClient {
    pub async fn connect(url: &str, timeout: Duration) -> Result<Self> {
        info!(url = %url, timeout_ms = timeout.as_millis(), "connecting to NATS");

        let client = async_nats::ConnectOptions::new()
            .connection_timeout(timeout)
            .connect(url)
            .await
            .context("Failed to connect to NATS")?;

        info!("connected to NATS");
        Ok(Self {
            jetstream: jetstream::new(client),
        })
    }

    /// Make sure a stream capturing `{subject_prefix}.>` exists
    pub async fn ensure_stream(
        &self,
        stream_name: &str,
        subject_prefix: &str,
        description: &str,
    ) -> Result<()> {
        let publisher = NatsJetStreamPublisher::new(self.jetstream.clone());
        ensure_stream(&publisher, stream_name, subject_prefix, description).await
    }

    pub fn create_consumer_client(&self) -> Arc<dyn JetStreamConsumer> {
        Arc::new(NatsJetStreamConsumer::new(self.jetstream.clone()))
    }

    pub fn create_publisher_client(&self) -> Arc<dyn JetStreamPublisher> {
        Arc::new(NatsJetStreamPublisher::new(self.jetstream.clone()))
    }
}

/// Look a stream up by name and create it when it is missing
pub async fn ensure_stream(
    publisher: &dyn JetStreamPublisher,
    stream_name: &str,
    subject_prefix: &str,
    description: &str,
) -> Result<()> {
    if publisher.get_stream(stream_name).await.is_ok() {
        info!(stream = %stream_name, "stream already exists");
        return Ok(());
    }

    publisher
        .create_stream(StreamConfig {
            name: stream_name.to_string(),
            subjects: vec![format!("{}.>", subject_prefix)],
            description: Some(description.to_string()),
            ..Default::default()
        })
        .await
        .with_context(|| format!("Failed to create stream {}", stream_name))?;

    info!(stream = %stream_name, subjects = %format!("{}.>", subject_prefix), "created stream");
    Ok(())
}

/// JetStreamConsumer backed by async-nats
pub struct NatsJetStreamConsumer {
    context: jetstream::Context,
}

impl NatsJetStreamConsumer {
    pub fn new(context: jetstream::Context) -> Self {
        Self { context }
    }
}

#[async_trait]
impl JetStreamConsumer for NatsJetStreamConsumer {
    async fn create_consumer(
        &self,
        config: jetstream::consumer::pull::Config,
        stream_name: &str,
    ) -> Result<Box<dyn PullConsumer>> {
        let consumer = self
            .context
            .create_consumer_on_stream(config, stream_name)
            .await
            .context("Failed to create consumer")?;

        Ok(Box::new(NatsPullConsumer { consumer }))
    }
}

pub struct NatsPullConsumer {
    consumer: jetstream::consumer::PullConsumer,
}

#[async_trait]
impl PullConsumer for NatsPullConsumer {
    async fn fetch_messages(
        &self,
        max_messages: usize,
        expires: Duration,
    ) -> Result<Vec<jetstream::Message>> {
        let mut batch = self
            .consumer
            .fetch()
            .max_messages(max_messages)
            .expires(expires)
            .messages()
            .await
            .context("Failed to fetch messages")?;

        let mut messages = Vec::new();
        while let Some(next) = batch.next().await {
            match next {
                Ok(message) => messages.push(message),
                Err(e) => warn!(error = %e, "error receiving message from batch"),
            }
        }
        Ok(messages)
    }
}

/// JetStreamPublisher backed by async-nats
pub struct NatsJetStreamPublisher {
    context: jetstream::Context,
}

impl NatsJetStreamPublisher {
    pub fn new(context: jetstream::Context) -> Self {
        Self { context }
    }
}

#[async_trait]
impl JetStreamPublisher for NatsJetStreamPublisher {
    async fn get_stream(&self, stream_name: &str) -> Result<()> {
        self.context
            .get_stream(stream_name)
            .await
            .context("Failed to get stream")?;
        Ok(())
    }

    async fn create_stream(&self, config: jetstream::stream::Config) -> Result<()> {
        self.context
            .create_stream(config)
            .await
            .context("Failed to create stream")?;
        Ok(())
    }

    #[instrument(skip(self, headers, payload), fields(subject = %subject, payload_size = payload.len()))]
    async fn publish_with_headers(
        &self,
        subject: String,
        mut headers: HeaderMap,
        payload: bytes::Bytes,
    ) -> Result<()> {
        inject_trace_context(&mut headers);

        let ack = self
            .context
            .publish_with_headers(subject, headers, payload)
            .await
            .context("Failed to publish message to JetStream")?;

        ack.await
            .context("Failed to receive JetStream acknowledgment")?;
        Ok(())
    }
}
