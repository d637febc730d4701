//! Shared consumer-loop plumbing for the three stage consumers: drain a
//! queue, hand each delivery's payload to the stage's handler, and translate
//! the handler's verdict into ack / nack+republish / nack+DLQ per spec §4.2.

pub mod actioner;
pub mod classifier;
pub mod summarizer;

use std::future::Future;
use std::sync::Arc;

use futures::StreamExt;
use sentinel_broker::{ack, nack, retry_count};
use tracing::{error, warn};

use crate::state::AppContext;

/// What a stage handler decided to do with one message.
pub enum Outcome {
    /// Processed successfully (including "nothing to do, already handled").
    Done,
    /// Transient failure; republish with an incremented retry count.
    Retry(String),
    /// Permanent failure; route straight to the DLQ regardless of retry count.
    Fatal(String),
}

/// Run one stage's consume loop until the connection closes or the process
/// is cancelled. `handler` receives the raw payload bytes and the delivery's
/// current retry count.
pub async fn run_stage<F, Fut>(
    ctx: Arc<AppContext>,
    queue_name: String,
    dlq_routing_key: String,
    consumer_tag: String,
    prefetch: u16,
    max_retries: u32,
    handler: F,
) where
    F: Fn(Arc<AppContext>, Vec<u8>, u32) -> Fut + Send + Sync + 'static,
    Fut: Future<Output = Outcome> + Send,
{
    let mut consumer = match ctx.broker.consume(&queue_name, &consumer_tag, prefetch).await {
        Ok(c) => c,
        Err(e) => {
            error!(queue = %queue_name, error = %e, "failed to open consumer, stage exiting");
            return;
        }
    };

    while let Some(delivery) = consumer.next().await {
        let delivery = match delivery {
            Ok(d) => d,
            Err(e) => {
                warn!(queue = %queue_name, error = %e, "delivery error");
                continue;
            }
        };

        let retries = retry_count(&delivery);
        let payload = delivery.data.clone();

        match handler(ctx.clone(), payload.clone(), retries).await {
            Outcome::Done => {
                if let Err(e) = ack(&delivery).await {
                    warn!(queue = %queue_name, error = %e, "ack failed");
                }
            }
            Outcome::Retry(reason) if retries + 1 < max_retries => {
                warn!(queue = %queue_name, retries, reason = %reason, "transient failure, republishing");
                if let Err(e) = nack(&delivery).await {
                    warn!(queue = %queue_name, error = %e, "nack failed");
                }
                if let Err(e) = ctx.broker.publish(&queue_name, &payload, retries + 1).await {
                    error!(queue = %queue_name, error = %e, "republish failed, message dropped");
                }
            }
            Outcome::Retry(reason) | Outcome::Fatal(reason) => {
                warn!(queue = %queue_name, reason = %reason, "routing message to dead-letter queue");
                if let Err(e) = nack(&delivery).await {
                    warn!(queue = %queue_name, error = %e, "nack failed");
                }
                if let Err(e) = ctx.broker.publish_to_dlq(&dlq_routing_key, &payload, &reason).await {
                    error!(queue = %queue_name, error = %e, "dlq publish failed, message dropped");
                }
            }
        }
    }
}
