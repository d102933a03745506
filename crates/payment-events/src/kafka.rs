//! Kafka transport built on rdkafka.

use async_trait::async_trait;
use rdkafka::config::ClientConfig;
use rdkafka::consumer::{CommitMode, Consumer, StreamConsumer};
use rdkafka::error::KafkaError;
use rdkafka::message::Message;
use rdkafka::{Offset, TopicPartitionList};

use crate::error::TransportError;
use crate::transport::{EventTransport, TransportMessage};

pub const DEFAULT_GROUP_ID: &str = "booking-service-group";

/// Connection settings for the payment topic.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct KafkaConfig {
    pub brokers: String,
    pub topic: String,
    pub group_id: String,
    /// SASL/PLAIN over TLS is used when a username is set.
    pub username: Option<String>,
    pub password: Option<String>,
}

impl KafkaConfig {
    pub fn new(brokers: impl Into<String>, topic: impl Into<String>) -> Self {
        Self {
            brokers: brokers.into(),
            topic: topic.into(),
            group_id: DEFAULT_GROUP_ID.to_string(),
            username: None,
            password: None,
        }
    }

    pub fn with_group_id(mut self, group_id: impl Into<String>) -> Self {
        self.group_id = group_id.into();
        self
    }

    pub fn with_credentials(mut self, username: impl Into<String>, password: impl Into<String>) -> Self {
        self.username = Some(username.into());
        self.password = Some(password.into());
        self
    }

    fn client_config(&self) -> ClientConfig {
        let mut config = ClientConfig::new();
        config
            .set("bootstrap.servers", &self.brokers)
            .set("group.id", &self.group_id)
            .set("enable.auto.commit", "false")
            .set("auto.offset.reset", "earliest")
            .set("session.timeout.ms", "10000")
            .set("enable.partition.eof", "false");

        if let Some(username) = &self.username {
            config
                .set("security.protocol", "SASL_SSL")
                .set("sasl.mechanisms", "PLAIN")
                .set("sasl.username", username)
                .set("sasl.password", self.password.as_deref().unwrap_or_default());
        }
        config
    }
}

/// Consumer-group reader with offsets committed only on acknowledge.
pub struct KafkaTransport {
    consumer: StreamConsumer,
    topic: String,
}

impl KafkaTransport {
    /// Creates the consumer and subscribes to the configured topic.
    pub fn connect(config: &KafkaConfig) -> Result<Self, TransportError> {
        let consumer: StreamConsumer = config
            .client_config()
            .create()
            .map_err(|e| TransportError::Config(format!("Failed to create consumer: {e}")))?;

        consumer
            .subscribe(&[config.topic.as_str()])
            .map_err(|e| TransportError::Config(format!("Failed to subscribe: {e}")))?;

        tracing::info!(
            topic = %config.topic,
            group_id = %config.group_id,
            sasl = config.username.is_some(),
            "subscribed to payment topic"
        );

        Ok(Self {
            consumer,
            topic: config.topic.clone(),
        })
    }

    pub fn topic(&self) -> &str {
        &self.topic
    }
}

#[async_trait]
impl EventTransport for KafkaTransport {
    async fn receive(&self) -> Result<Option<TransportMessage>, TransportError> {
        match self.consumer.recv().await {
            Ok(message) => Ok(Some(TransportMessage {
                topic: message.topic().to_string(),
                partition: message.partition(),
                offset: message.offset(),
                payload: message.payload().map(<[u8]>::to_vec).unwrap_or_default(),
            })),
            Err(KafkaError::Canceled) => Ok(None),
            Err(e) => Err(TransportError::Receive(e.to_string())),
        }
    }

    async fn acknowledge(&self, message: &TransportMessage) -> Result<(), TransportError> {
        // The committed offset is the next one to read
        let mut offsets = TopicPartitionList::new();
        offsets
            .add_partition_offset(
                &message.topic,
                message.partition,
                Offset::Offset(message.offset + 1),
            )
            .map_err(|e| TransportError::Acknowledge(e.to_string()))?;

        self.consumer
            .commit(&offsets, CommitMode::Async)
            .map_err(|e| TransportError::Acknowledge(e.to_string()))
    }

    async fn close(&self) -> Result<(), TransportError> {
        self.consumer.unsubscribe();
        tracing::info!(topic = %self.topic, "unsubscribed from payment topic");
        Ok(())
    }
}
