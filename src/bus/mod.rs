//! Message bus adapter over `rdkafka` (§4.D/§4.F/§6). The orders topic
//! feeds the intake worker, the fills topic is written by the publisher.
//! Delivery is at-least-once in both directions: the consumer commits
//! offsets only after a message has been fully processed, and the
//! producer is retried by `rdkafka`'s internal queue until acked.

use rdkafka::ClientConfig;
use rdkafka::admin::{AdminClient, AdminOptions, NewTopic, TopicReplication};
use rdkafka::consumer::{CommitMode, Consumer, StreamConsumer};
use rdkafka::message::Message;
use rdkafka::producer::{FutureProducer, FutureRecord};
use rdkafka::util::Timeout;
use std::time::Duration;

use crate::config::KafkaConfig;
use crate::domain::{FillDto, OrderDto};
use crate::error::EngineError;

/// Creates the fills topic with a single partition if it doesn't already
/// exist. Mirrors the original bootstrap: one partition is enough since
/// fills are published by a single logical producer per deployment.
pub async fn ensure_fills_topic(kafka: &KafkaConfig) -> Result<(), EngineError> {
    let admin: AdminClient<_> = ClientConfig::new()
        .set("bootstrap.servers", &kafka.brokers)
        .create()
        .map_err(|e| EngineError::BusUnavailable(e.to_string()))?;

    let topic = NewTopic::new(&kafka.fills_topic, 1, TopicReplication::Fixed(1));
    let results = admin
        .create_topics(&[topic], &AdminOptions::new())
        .await
        .map_err(|e| EngineError::BusUnavailable(e.to_string()))?;

    for result in results {
        match result {
            Ok(_) => {}
            // TopicAlreadyExists is success from our point of view.
            Err((_, rdkafka::types::RDKafkaErrorCode::TopicAlreadyExists)) => {}
            Err((topic, code)) => {
                return Err(EngineError::BusUnavailable(format!(
                    "failed to create topic {topic}: {code:?}"
                )));
            }
        }
    }
    Ok(())
}

/// Consumes inbound order messages from the orders topic.
pub struct OrdersConsumer {
    consumer: StreamConsumer,
}

impl OrdersConsumer {
    pub fn new(kafka: &KafkaConfig) -> Result<Self, EngineError> {
        let consumer: StreamConsumer = ClientConfig::new()
            .set("bootstrap.servers", &kafka.brokers)
            .set("group.id", &kafka.consumer_group)
            .set("enable.auto.commit", "false")
            .set("auto.offset.reset", "earliest")
            .create()
            .map_err(|e| EngineError::BusUnavailable(e.to_string()))?;

        consumer
            .subscribe(&[kafka.orders_topic.as_str()])
            .map_err(|e| EngineError::BusUnavailable(e.to_string()))?;

        Ok(Self { consumer })
    }

    /// Blocks until the next order arrives, deserializes it, and returns it
    /// alongside a commit handle. Intake must call [`OrdersConsumer::commit`]
    /// only after the order has been durably recorded, preserving
    /// at-least-once delivery across a crash between receipt and commit.
    pub async fn recv(&self) -> Result<(OrderDto, OwnedOffset), EngineError> {
        let message = self
            .consumer
            .recv()
            .await
            .map_err(|e| EngineError::BusUnavailable(e.to_string()))?;

        let payload = message
            .payload()
            .ok_or_else(|| EngineError::Malformed("order message had no payload".into()))?;

        let order: OrderDto = serde_json::from_slice(payload)
            .map_err(|e| EngineError::Malformed(format!("invalid order payload: {e}")))?;

        Ok((
            order,
            OwnedOffset {
                topic: message.topic().to_string(),
                partition: message.partition(),
                offset: message.offset(),
            },
        ))
    }

    pub fn commit(&self, offset: &OwnedOffset) -> Result<(), EngineError> {
        let mut tpl = rdkafka::TopicPartitionList::new();
        tpl.add_partition_offset(
            &offset.topic,
            offset.partition,
            rdkafka::Offset::Offset(offset.offset + 1),
        )
        .map_err(|e| EngineError::BusUnavailable(e.to_string()))?;

        self.consumer
            .commit(&tpl, CommitMode::Sync)
            .map_err(|e| EngineError::BusUnavailable(e.to_string()))
    }
}

/// Position of a consumed message, detached from the borrowed
/// `BorrowedMessage` so it can outlive the call that produced it.
pub struct OwnedOffset {
    topic: String,
    partition: i32,
    offset: i64,
}

/// Publishes outbound fill events to the fills topic.
pub struct FillsProducer {
    producer: FutureProducer,
    topic: String,
}

impl FillsProducer {
    pub fn new(kafka: &KafkaConfig) -> Result<Self, EngineError> {
        let producer: FutureProducer = ClientConfig::new()
            .set("bootstrap.servers", &kafka.brokers)
            .set("message.timeout.ms", "30000")
            .create()
            .map_err(|e| EngineError::BusUnavailable(e.to_string()))?;

        Ok(Self {
            producer,
            topic: kafka.fills_topic.clone(),
        })
    }

    pub async fn publish(&self, fill: &FillDto) -> Result<(), EngineError> {
        let payload = serde_json::to_vec(fill)
            .map_err(|e| EngineError::Malformed(format!("failed to encode fill: {e}")))?;

        self.producer
            .send(
                FutureRecord::<(), _>::to(&self.topic).payload(&payload),
                Timeout::After(Duration::from_secs(10)),
            )
            .await
            .map_err(|(e, _)| EngineError::BusUnavailable(e.to_string()))?;

        Ok(())
    }
}
