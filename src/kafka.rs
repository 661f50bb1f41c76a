// Copyright (c) 2025, The Ruskit Authors
// MIT License
// All rights reserved.

//! # Kafka Producer and Consumer
//!
//! String messages to and from a single topic partition. The topic is
//! created on connect when the cluster does not know it yet. Consumption
//! starts at the earliest offset and stops when the cancellation signal is
//! observed between records; `groupId` is informational, partition clients
//! have no group coordination.

use crate::{config::KafkaConfig, consumer::consume_stream, errors::KafkaError};
use chrono::Utc;
use futures_util::{future, Stream};
use rskafka::{
    client::{
        consumer::{StartOffset, StreamConsumerBuilder},
        partition::{Compression, PartitionClient, UnknownTopicHandling},
        Client, ClientBuilder,
    },
    record::{Record, RecordAndOffset},
    BackoffConfig,
};
use std::{collections::BTreeMap, fmt::Display, sync::Arc, time::Duration};
use tokio::sync::watch;
use tracing::{debug, error, info, warn};

const CONNECT_DEADLINE: Duration = Duration::from_secs(5);
const CONSUMER_MAX_WAIT_MS: i32 = 500;

/// A record read from the topic.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct KafkaMessage {
    pub offset: i64,
    pub key: Option<Vec<u8>>,
    pub value: String,
}

async fn connect(cfg: &KafkaConfig) -> Result<Client, KafkaError> {
    let brokers = cfg.brokers();
    if brokers.is_empty() {
        return Err(KafkaError::ConnectionFailed(
            "`bootstrapServers` is empty".to_owned(),
        ));
    }

    let backoff = BackoffConfig {
        deadline: Some(CONNECT_DEADLINE),
        ..Default::default()
    };

    let client = ClientBuilder::new(brokers)
        .backoff_config(backoff)
        .build()
        .await
        .map_err(|err| {
            error!(error = err.to_string(), "failure to connect to kafka");
            KafkaError::ConnectionFailed(err.to_string())
        })?;

    info!(
        brokers = cfg.bootstrap_servers,
        "established Kafka connection"
    );
    Ok(client)
}

/// Creates `topic` with one partition when the cluster does not list it.
async fn ensure_topic(client: &Client, topic: &str) -> Result<(), KafkaError> {
    let topics = client
        .list_topics()
        .await
        .map_err(|err| KafkaError::ConnectionFailed(err.to_string()))?;

    if topics.iter().any(|t| t.name == topic) {
        return Ok(());
    }

    warn!(topic, "topic not found, creating it");
    client
        .controller_client()
        .map_err(|err| KafkaError::ConnectionFailed(err.to_string()))?
        .create_topic(topic, 1, 1, 5_000)
        .await
        .map_err(|err| {
            error!(error = err.to_string(), topic, "failure to create topic");
            KafkaError::ConnectionFailed(err.to_string())
        })
}

async fn partition_client(cfg: &KafkaConfig) -> Result<PartitionClient, KafkaError> {
    let client = connect(cfg).await?;
    ensure_topic(&client, &cfg.topic).await?;

    client
        .partition_client(
            cfg.topic.clone(),
            cfg.partition,
            UnknownTopicHandling::Retry,
        )
        .await
        .map_err(|err| KafkaError::ConnectionFailed(err.to_string()))
}

/// Builds the record sent for a text message.
pub fn text_record(key: Option<&str>, value: &str, headers: BTreeMap<String, String>) -> Record {
    Record {
        key: key.map(|k| k.as_bytes().to_vec()),
        value: Some(value.as_bytes().to_vec()),
        headers: headers
            .into_iter()
            .map(|(k, v)| (k, v.into_bytes()))
            .collect(),
        timestamp: Utc::now(),
    }
}

/// Sends string messages to the configured topic partition.
pub struct KafkaProducer {
    topic: String,
    partition: PartitionClient,
}

impl KafkaProducer {
    pub async fn connect(cfg: &KafkaConfig) -> Result<KafkaProducer, KafkaError> {
        Ok(KafkaProducer {
            topic: cfg.topic.clone(),
            partition: partition_client(cfg).await?,
        })
    }

    /// Sends `message` and returns its offset.
    pub async fn produce(&self, message: &str) -> Result<i64, KafkaError> {
        let offsets = self
            .partition
            .produce(
                vec![text_record(None, message, BTreeMap::new())],
                Compression::NoCompression,
            )
            .await
            .map_err(|err| {
                error!(
                    error = err.to_string(),
                    topic = self.topic,
                    "failure to produce"
                );
                KafkaError::ProduceFailed(self.topic.clone(), err.to_string())
            })?;

        let offset = offsets.first().copied().unwrap_or_default();
        debug!(topic = self.topic, offset, "message produced");
        Ok(offset)
    }
}

/// Reads the configured topic partition from the earliest offset.
pub struct KafkaConsumer {
    topic: String,
    partition: Arc<PartitionClient>,
}

impl KafkaConsumer {
    pub async fn connect(cfg: &KafkaConfig) -> Result<KafkaConsumer, KafkaError> {
        if !cfg.group_id.is_empty() {
            debug!(
                group_id = cfg.group_id,
                "group id is not used by partition consumers"
            );
        }

        Ok(KafkaConsumer {
            topic: cfg.topic.clone(),
            partition: Arc::new(partition_client(cfg).await?),
        })
    }

    /// Calls `on_message` for every record until `shutdown` turns `true` or
    /// its sender is dropped. Returns the number of records handled.
    pub async fn consume_until<F>(
        &self,
        shutdown: watch::Receiver<bool>,
        on_message: F,
    ) -> Result<usize, KafkaError>
    where
        F: FnMut(KafkaMessage) + Send,
    {
        let stream = StreamConsumerBuilder::new(self.partition.clone(), StartOffset::Earliest)
            .with_max_wait_ms(CONSUMER_MAX_WAIT_MS)
            .build();

        consume_records(&self.topic, stream, shutdown, on_message).await
    }
}

/// Converts a fetched record; a missing or non UTF-8 value is read lossily.
fn kafka_message(record: RecordAndOffset) -> KafkaMessage {
    let value = record
        .record
        .value
        .as_deref()
        .map(|v| String::from_utf8_lossy(v).into_owned())
        .unwrap_or_default();

    KafkaMessage {
        offset: record.offset,
        key: record.record.key,
        value,
    }
}

/// Drives a record stream of `topic`. A stream error ends consumption with
/// `KafkaError::ConsumeFailed`.
async fn consume_records<S, E, F>(
    topic: &str,
    stream: S,
    shutdown: watch::Receiver<bool>,
    mut on_message: F,
) -> Result<usize, KafkaError>
where
    S: Stream<Item = Result<(RecordAndOffset, i64), E>> + Unpin,
    E: Display,
    F: FnMut(KafkaMessage),
{
    consume_stream(stream, shutdown, |next| {
        let result = match next {
            Ok((record, _high_watermark)) => {
                let msg = kafka_message(record);
                info!(topic, "Kafka message received: {}", msg.value);
                on_message(msg);
                Ok(())
            }
            Err(err) => {
                error!(error = err.to_string(), topic, "Kafka consumer error");
                Err(KafkaError::ConsumeFailed(
                    topic.to_owned(),
                    err.to_string(),
                ))
            }
        };
        future::ready(result)
    })
    .await
}
