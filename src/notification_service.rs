use async_trait::async_trait;
use bytes::Bytes;
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::mpsc;
use tokio::task::JoinHandle;
use tracing::{error, info, warn};

pub const USER_CREATED_TOPIC: &str = "user.created";
pub const MAX_DELIVERY_ATTEMPTS: u32 = 5;

#[derive(Debug, thiserror::Error)]
pub enum PublishError {
  #[error("nats: {0}")]
  Nats(String),
  #[error("notification queue is full")]
  QueueFull,
  #[error("notification queue is closed")]
  Closed,
}

#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct UserCreatedNotification {
  pub user_id: String,
  pub role: String,
}

#[async_trait]
pub trait NotificationPublisher: Send + Sync {
  async fn publish(&self, topic: &str, payload: Bytes) -> Result<(), PublishError>;
}

pub struct NatsPublisher {
  client: async_nats::Client,
}

impl NatsPublisher {
  pub fn new(client: async_nats::Client) -> Self {
    NatsPublisher { client }
  }
}

#[async_trait]
impl NotificationPublisher for NatsPublisher {
  async fn publish(&self, topic: &str, payload: Bytes) -> Result<(), PublishError> {
    self
      .client
      .publish(topic.to_owned(), payload)
      .await
      .map_err(|e| PublishError::Nats(e.to_string()))?;
    self
      .client
      .flush()
      .await
      .map_err(|e| PublishError::Nats(e.to_string()))
  }
}

#[derive(Clone, Debug)]
struct Envelope {
  topic: String,
  payload: Bytes,
}

/// Bounded queue in front of a publisher. `publish` only enqueues, delivery
/// and retries happen on the worker task returned by [`Outbox::start`].
#[derive(Clone)]
pub struct Outbox {
  sender: mpsc::Sender<Envelope>,
}

impl Outbox {
  pub fn start(
    publisher: Arc<dyn NotificationPublisher>,
    capacity: usize,
    base_delay: Duration,
  ) -> (Outbox, JoinHandle<()>) {
    let (sender, receiver) = mpsc::channel(capacity);
    let worker = tokio::spawn(run(receiver, publisher, base_delay));
    (Outbox { sender }, worker)
  }
}

#[async_trait]
impl NotificationPublisher for Outbox {
  async fn publish(&self, topic: &str, payload: Bytes) -> Result<(), PublishError> {
    self
      .sender
      .try_send(Envelope {
        topic: topic.to_owned(),
        payload,
      })
      .map_err(|e| match e {
        mpsc::error::TrySendError::Full(_) => PublishError::QueueFull,
        mpsc::error::TrySendError::Closed(_) => PublishError::Closed,
      })
  }
}

async fn run(
  mut receiver: mpsc::Receiver<Envelope>,
  publisher: Arc<dyn NotificationPublisher>,
  base_delay: Duration,
) {
  while let Some(envelope) = receiver.recv().await {
    deliver(publisher.as_ref(), envelope, base_delay).await;
  }
  info!("notification outbox drained");
}

async fn deliver(publisher: &dyn NotificationPublisher, envelope: Envelope, base_delay: Duration) {
  let mut delay = base_delay;
  for attempt in 1..=MAX_DELIVERY_ATTEMPTS {
    match publisher
      .publish(&envelope.topic, envelope.payload.clone())
      .await
    {
      Ok(()) => return,
      Err(e) => {
        warn!(topic = %envelope.topic, attempt, error = %e, "failed to publish notification");
        if attempt < MAX_DELIVERY_ATTEMPTS {
          tokio::time::sleep(delay).await;
          delay *= 2;
        }
      }
    }
  }
  error!(topic = %envelope.topic, "dropping notification after {} attempts", MAX_DELIVERY_ATTEMPTS);
}
