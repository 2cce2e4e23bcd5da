use crate::nats::traits::{JetStreamConsumer, PullConsumer};
use anyhow::Result;
use async_nats::jetstream::{self, Message};
use futures::future::BoxFuture;
use std::sync::Arc;
use std::time::Duration;
use tokio_util::sync::CancellationToken;
use tracing::{debug, error, info};

/// Processes a fetched batch of raw JetStream messages
/// Deserialization and business logic live in the processor, the consumer only handles acks
pub type BatchProcessor = Box<dyn Fn(&[Message]) -> BoxFuture<'static, ()> + Send + Sync>;

/// Durable pull consumer that feeds message batches to a [`BatchProcessor`]
pub struct NatsConsumer {
    consumer: Box<dyn PullConsumer>,
    batch_size: usize,
    max_wait: Duration,
    processor: BatchProcessor,
}

impl NatsConsumer {
    pub async fn new(
        client: Arc<dyn JetStreamConsumer>,
        stream_name: &str,
        consumer_name: &str,
        subject_filter: &str,
        batch_size: usize,
        max_wait_secs: u64,
        processor: BatchProcessor,
    ) -> Result<Self> {
        debug!(
            stream = stream_name,
            consumer = consumer_name,
            subject = subject_filter,
            "creating JetStream consumer"
        );

        let consumer = client
            .create_consumer(
                jetstream::consumer::pull::Config {
                    name: Some(consumer_name.to_string()),
                    durable_name: Some(consumer_name.to_string()),
                    filter_subject: subject_filter.to_string(),
                    ack_policy: jetstream::consumer::AckPolicy::Explicit,
                    ..Default::default()
                },
                stream_name,
            )
            .await?;

        info!(
            stream = stream_name,
            consumer = consumer_name,
            "consumer created"
        );

        Ok(Self {
            consumer,
            batch_size,
            max_wait: Duration::from_secs(max_wait_secs),
            processor,
        })
    }

    /// Fetch and process batches until the token is cancelled
    ///
    /// Cancellation only interrupts the wait for messages. A batch that has
    /// been fetched is always processed and acknowledged before returning.
    pub async fn run(&self, ctx: CancellationToken) -> Result<()> {
        info!("starting consumer loop");

        while let Some(fetched) = self.next_batch(&ctx).await {
            match fetched {
                Ok(messages) => self.process_batch(messages).await,
                Err(e) => {
                    error!(error = %e, "error fetching batch");
                    tokio::select! {
                        _ = ctx.cancelled() => {}
                        _ = tokio::time::sleep(Duration::from_secs(1)) => {}
                    }
                }
            }
        }

        info!("consumer stopped");
        Ok(())
    }

    /// Wait for the next batch, or `None` once the token is cancelled
    async fn next_batch(&self, ctx: &CancellationToken) -> Option<Result<Vec<Message>>> {
        if ctx.is_cancelled() {
            info!("received shutdown signal, stopping consumer");
            return None;
        }

        tokio::select! {
            // A completed fetch wins over a cancellation seen in the same poll
            biased;
            fetched = self.consumer.fetch_messages(self.batch_size, self.max_wait) => Some(fetched),
            _ = ctx.cancelled() => {
                info!("received shutdown signal, stopping consumer");
                None
            }
        }
    }

    async fn process_batch(&self, messages: Vec<Message>) {
        if messages.is_empty() {
            debug!("no messages in batch");
            return;
        }

        debug!(message_count = messages.len(), "received message batch");

        (self.processor)(&messages).await;

        for (idx, msg) in messages.iter().enumerate() {
            if let Err(e) = msg.ack().await {
                error!(error = %e, message_index = idx, "failed to acknowledge message");
            }
        }
    }
}
