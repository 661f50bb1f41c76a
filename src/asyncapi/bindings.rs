// Copyright (c) 2025, The Ruskit Authors
// MIT License
// All rights reserved.

//! Protocol bindings for channels and operations.
//!
//! Every binding carries a `bindingVersion`. It is left out of the
//! serialized document when it equals the default version of its protocol
//! and written literally otherwise. Deserializing a binding without the
//! field yields the default version again.

use super::schema::SchemaNode;
use serde::{Deserialize, Serialize};

pub const AMQP_BINDING_VERSION: &str = "0.2.0";
pub const KAFKA_BINDING_VERSION: &str = "0.5.0";
pub const HTTP_BINDING_VERSION: &str = "0.3.0";

fn amqp_version() -> String {
    AMQP_BINDING_VERSION.to_owned()
}

fn kafka_version() -> String {
    KAFKA_BINDING_VERSION.to_owned()
}

fn http_version() -> String {
    HTTP_BINDING_VERSION.to_owned()
}

fn is_amqp_version(v: &str) -> bool {
    v == AMQP_BINDING_VERSION
}

fn is_kafka_version(v: &str) -> bool {
    v == KAFKA_BINDING_VERSION
}

fn is_http_version(v: &str) -> bool {
    v == HTTP_BINDING_VERSION
}

/// What an AMQP channel represents on the broker.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum AmqpChannelKind {
    RoutingKey,
    Queue,
}

/// The exchange behind a `routingKey` channel.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AmqpExchangeBinding {
    pub name: String,
    /// `direct`, `topic`, `fanout`, `headers` or a plugin type
    #[serde(rename = "type")]
    pub kind: String,
    pub durable: bool,
    pub auto_delete: bool,
    pub vhost: String,
}

/// The queue a `queue` channel stands for.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AmqpQueueBinding {
    pub name: String,
    pub durable: bool,
    pub exclusive: bool,
    pub auto_delete: bool,
    pub vhost: String,
}

/// AMQP channel binding.
///
/// Exactly one of `exchange` and `queue` is set, matching `is`; the
/// constructors keep them consistent.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AmqpChannelBinding {
    pub is: AmqpChannelKind,
    #[serde(default = "amqp_version", skip_serializing_if = "is_amqp_version")]
    pub binding_version: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub exchange: Option<AmqpExchangeBinding>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub queue: Option<AmqpQueueBinding>,
}

impl AmqpChannelBinding {
    /// A channel routed through `exchange`.
    pub fn routing_key(exchange: AmqpExchangeBinding) -> AmqpChannelBinding {
        AmqpChannelBinding {
            is: AmqpChannelKind::RoutingKey,
            binding_version: amqp_version(),
            exchange: Some(exchange),
            queue: None,
        }
    }

    /// A channel that is the queue itself.
    pub fn queue(queue: AmqpQueueBinding) -> AmqpChannelBinding {
        AmqpChannelBinding {
            is: AmqpChannelKind::Queue,
            binding_version: amqp_version(),
            exchange: None,
            queue: Some(queue),
        }
    }

    /// Overrides the binding version.
    ///
    /// # Parameters
    ///
    /// * `version` - written to the document unless it is
    ///   [`AMQP_BINDING_VERSION`]
    ///
    /// # Returns
    ///
    /// The binding with its new version.
    pub fn version(mut self, version: &str) -> Self {
        self.binding_version = version.to_owned();
        self
    }
}

/// Per-message AMQP properties of an operation.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AmqpOperationBinding {
    /// TTL of the message in milliseconds
    #[serde(skip_serializing_if = "Option::is_none")]
    pub expiration: Option<u64>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub cc: Vec<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub priority: Option<u32>,
    /// 1 transient, 2 persistent
    #[serde(skip_serializing_if = "Option::is_none")]
    pub delivery_mode: Option<u8>,
    pub mandatory: bool,
    pub immediate: bool,
    #[serde(default = "amqp_version", skip_serializing_if = "is_amqp_version")]
    pub binding_version: String,
}

impl Default for AmqpOperationBinding {
    fn default() -> Self {
        AmqpOperationBinding {
            expiration: None,
            cc: vec![],
            priority: None,
            delivery_mode: None,
            mandatory: false,
            immediate: false,
            binding_version: amqp_version(),
        }
    }
}

/// Kafka topic layout behind a channel.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct KafkaChannelBinding {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub topic: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub partitions: Option<u32>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub replicas: Option<u32>,
    #[serde(default = "kafka_version", skip_serializing_if = "is_kafka_version")]
    pub binding_version: String,
}

impl KafkaChannelBinding {
    /// A binding naming `topic`, partitions and replicas left to the broker.
    pub fn topic(topic: &str) -> KafkaChannelBinding {
        KafkaChannelBinding {
            topic: Some(topic.to_owned()),
            partitions: None,
            replicas: None,
            binding_version: kafka_version(),
        }
    }
}

/// Kafka consumer identity of an operation.
///
/// Both ids are schemas rather than plain strings, so a document can
/// constrain the values clients may use.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct KafkaOperationBinding {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub group_id: Option<SchemaNode>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub client_id: Option<SchemaNode>,
    #[serde(default = "kafka_version", skip_serializing_if = "is_kafka_version")]
    pub binding_version: String,
}

impl Default for KafkaOperationBinding {
    fn default() -> Self {
        KafkaOperationBinding {
            group_id: None,
            client_id: None,
            binding_version: kafka_version(),
        }
    }
}

/// HTTP method and query parameters of an operation.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct HttpOperationBinding {
    /// Upper case, e.g. `POST`
    pub method: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub query: Option<SchemaNode>,
    #[serde(default = "http_version", skip_serializing_if = "is_http_version")]
    pub binding_version: String,
}

impl HttpOperationBinding {
    /// A binding for `method`, upper-cased.
    pub fn method(method: &str) -> HttpOperationBinding {
        HttpOperationBinding {
            method: method.to_uppercase(),
            query: None,
            binding_version: http_version(),
        }
    }
}

/// Bindings of a channel, keyed by protocol.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct ChannelBindings {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub amqp: Option<AmqpChannelBinding>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub kafka: Option<KafkaChannelBinding>,
}

impl ChannelBindings {
    pub fn amqp(binding: AmqpChannelBinding) -> ChannelBindings {
        ChannelBindings {
            amqp: Some(binding),
            ..Default::default()
        }
    }

    pub fn kafka(binding: KafkaChannelBinding) -> ChannelBindings {
        ChannelBindings {
            kafka: Some(binding),
            ..Default::default()
        }
    }
}

/// Bindings of an operation, keyed by protocol.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct OperationBindings {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub amqp: Option<AmqpOperationBinding>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub kafka: Option<KafkaOperationBinding>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub http: Option<HttpOperationBinding>,
}

impl OperationBindings {
    pub fn amqp(binding: AmqpOperationBinding) -> OperationBindings {
        OperationBindings {
            amqp: Some(binding),
            ..Default::default()
        }
    }

    pub fn kafka(binding: KafkaOperationBinding) -> OperationBindings {
        OperationBindings {
            kafka: Some(binding),
            ..Default::default()
        }
    }

    pub fn http(binding: HttpOperationBinding) -> OperationBindings {
        OperationBindings {
            http: Some(binding),
            ..Default::default()
        }
    }
}
