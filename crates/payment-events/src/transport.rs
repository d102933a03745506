//! Message transports feeding the payment event consumer.

use std::sync::atomic::{AtomicI64, Ordering};
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};

use async_trait::async_trait;
use serde::Serialize;
use tokio::sync::mpsc;

use crate::error::TransportError;

/// A message pulled from a transport, with enough position data to ack it.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TransportMessage {
    pub topic: String,
    pub partition: i32,
    pub offset: i64,
    pub payload: Vec<u8>,
}

/// Source of raw payment messages.
///
/// Implementations deliver messages one at a time. A message that is not
/// acknowledged may be delivered again after a restart.
#[async_trait]
pub trait EventTransport: Send + Sync {
    /// Waits for the next message. Returns `None` once the transport is closed.
    async fn receive(&self) -> Result<Option<TransportMessage>, TransportError>;

    /// Marks a message as processed.
    async fn acknowledge(&self, message: &TransportMessage) -> Result<(), TransportError>;

    /// Stops delivery and releases the underlying connection.
    async fn close(&self) -> Result<(), TransportError>;
}

#[async_trait]
impl<T: EventTransport + ?Sized> EventTransport for Arc<T> {
    async fn receive(&self) -> Result<Option<TransportMessage>, TransportError> {
        (**self).receive().await
    }

    async fn acknowledge(&self, message: &TransportMessage) -> Result<(), TransportError> {
        (**self).acknowledge(message).await
    }

    async fn close(&self) -> Result<(), TransportError> {
        (**self).close().await
    }
}

const CHANNEL_TOPIC: &str = "local";

type AckLog = Arc<Mutex<Vec<i64>>>;

fn lock(log: &AckLog) -> MutexGuard<'_, Vec<i64>> {
    log.lock().unwrap_or_else(PoisonError::into_inner)
}

/// Creates an in-process transport and the publisher that feeds it.
pub fn channel(capacity: usize) -> (ChannelPublisher, ChannelTransport) {
    let (sender, receiver) = mpsc::channel(capacity);
    let acknowledged = AckLog::default();
    let publisher = ChannelPublisher {
        sender,
        next_offset: Arc::new(AtomicI64::new(0)),
        acknowledged: acknowledged.clone(),
    };
    let transport = ChannelTransport {
        receiver: tokio::sync::Mutex::new(receiver),
        acknowledged,
    };
    (publisher, transport)
}

/// Sending half of an in-process transport.
///
/// Offsets are assigned in publish order starting at zero. Dropping every
/// publisher closes the transport once its buffer drains.
#[derive(Debug, Clone)]
pub struct ChannelPublisher {
    sender: mpsc::Sender<(i64, Vec<u8>)>,
    next_offset: Arc<AtomicI64>,
    acknowledged: AckLog,
}

impl ChannelPublisher {
    /// Publishes raw bytes and returns the offset they were given.
    pub async fn publish(&self, payload: impl Into<Vec<u8>>) -> Result<i64, TransportError> {
        // Reserve first so offsets follow delivery order
        let permit = self
            .sender
            .reserve()
            .await
            .map_err(|e| TransportError::Publish(e.to_string()))?;
        let offset = self.next_offset.fetch_add(1, Ordering::Relaxed);
        permit.send((offset, payload.into()));
        Ok(offset)
    }

    /// Publishes a value serialized as JSON.
    pub async fn publish_json<T: Serialize>(&self, value: &T) -> Result<i64, TransportError> {
        let payload =
            serde_json::to_vec(value).map_err(|e| TransportError::Publish(e.to_string()))?;
        self.publish(payload).await
    }

    /// Offsets acknowledged by the consumer so far, in acknowledgement order.
    pub fn acknowledged(&self) -> Vec<i64> {
        lock(&self.acknowledged).clone()
    }
}

/// Receiving half of an in-process transport, for tests and local runs.
#[derive(Debug)]
pub struct ChannelTransport {
    receiver: tokio::sync::Mutex<mpsc::Receiver<(i64, Vec<u8>)>>,
    acknowledged: AckLog,
}

impl ChannelTransport {
    /// Offsets acknowledged so far, in acknowledgement order.
    pub fn acknowledged(&self) -> Vec<i64> {
        lock(&self.acknowledged).clone()
    }
}

#[async_trait]
impl EventTransport for ChannelTransport {
    async fn receive(&self) -> Result<Option<TransportMessage>, TransportError> {
        let mut receiver = self.receiver.lock().await;
        Ok(receiver
            .recv()
            .await
            .map(|(offset, payload)| TransportMessage {
                topic: CHANNEL_TOPIC.to_string(),
                partition: 0,
                offset,
                payload,
            }))
    }

    async fn acknowledge(&self, message: &TransportMessage) -> Result<(), TransportError> {
        lock(&self.acknowledged).push(message.offset);
        Ok(())
    }

    async fn close(&self) -> Result<(), TransportError> {
        self.receiver.lock().await.close();
        Ok(())
    }
}
