use crate::infrastructure::queue::rabbitmq::RabbitMqService;
use crate::modules::transcode::pipeline::{JobFailure, JobReport, JobStage};
use crate::state::AppState;
use futures_util::StreamExt;
use lapin::message::Delivery;
use lapin::options::{BasicAckOptions, BasicRejectOptions};
use lapin::Consumer;
use std::time::Duration;
use tracing::{error, info, warn};

const CONSUMER_TAG: &str = "transcoder_worker";
const INITIAL_BACKOFF: Duration = Duration::from_secs(1);
const MAX_BACKOFF: Duration = Duration::from_secs(60);

/// How a delivery is settled with the broker once its job has finished.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Disposition {
    Ack,
    /// Reject without requeue; a dead-letter exchange on the queue catches these.
    DeadLetter,
}

pub fn disposition(outcome: &Result<JobReport, JobFailure>) -> Disposition {
    match outcome {
        Ok(_) => Disposition::Ack,
        Err(failure) => {
            if failure.stage == JobStage::Received {
                warn!("Dropping unparseable message");
            }
            Disposition::DeadLetter
        }
    }
}

/// Consumes the transcode queue, running each delivery on its own task.
/// Concurrency is bounded by the consumer prefetch.
///
/// Never returns: when the subscription fails or the stream closes, the
/// connection is re-established and the consumer re-created after a backoff.
pub async fn start_transcoder_worker(state: AppState, queue: RabbitMqService) {
    info!("🎥 Starting Transcoder Worker...");

    let queue_name = state.config.transcode_queue.clone();
    let prefetch = state.config.worker_prefetch;
    let mut backoff = INITIAL_BACKOFF;

    loop {
        match queue.consume(&queue_name, CONSUMER_TAG, prefetch).await {
            Ok(consumer) => {
                backoff = INITIAL_BACKOFF;
                info!(prefetch, "🎥 Transcoder Worker listening on '{}'", queue_name);
                drain(&state, consumer).await;
                warn!("Consumer stream for '{}' closed", queue_name);
            }
            Err(e) => error!("❌ Could not subscribe to '{}': {:#}", queue_name, e),
        }

        warn!("Re-subscribing to '{}' in {:?}", queue_name, backoff);
        tokio::time::sleep(backoff).await;
        backoff = next_backoff(backoff);

        if let Err(e) = queue.reconnect().await {
            error!("❌ RabbitMQ reconnect failed: {:#}", e);
        }
    }
}

fn next_backoff(current: Duration) -> Duration {
    (current * 2).min(MAX_BACKOFF)
}

async fn drain(state: &AppState, mut consumer: Consumer) {
    while let Some(delivery) = consumer.next().await {
        let delivery = match delivery {
            Ok(delivery) => delivery,
            Err(e) => {
                error!("Consumer error: {}", e);
                continue;
            }
        };

        info!("📦 Received transcoding job");
        let pipeline = state.pipeline.clone();
        tokio::spawn(async move {
            let outcome = pipeline.handle_message(&delivery.data).await;
            settle(&delivery, disposition(&outcome)).await;
        });
    }
}

async fn settle(delivery: &Delivery, disposition: Disposition) {
    let result = match disposition {
        Disposition::Ack => delivery.ack(BasicAckOptions::default()).await,
        Disposition::DeadLetter => {
            delivery
                .reject(BasicRejectOptions { requeue: false })
                .await
        }
    };

    if let Err(e) = result {
        error!("Failed to settle message ({:?}): {}", disposition, e);
    }
}
