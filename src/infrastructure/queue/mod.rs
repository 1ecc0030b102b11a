use anyhow::Result;
use async_trait::async_trait;

pub mod rabbitmq;

/// Anything that can put a message on a named queue.
#[async_trait]
pub trait JobPublisher: Send + Sync {
    async fn publish(&self, queue: &str, payload: &[u8]) -> Result<()>;
}

#[async_trait]
impl JobPublisher for rabbitmq::RabbitMqService {
    async fn publish(&self, queue: &str, payload: &[u8]) -> Result<()> {
        rabbitmq::RabbitMqService::publish(self, queue, payload).await
    }
}
