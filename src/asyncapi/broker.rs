// Copyright (c) 2025, The Ruskit Authors
// MIT License
// All rights reserved.

//! # Broker Documents
//!
//! Describes the queues of a [`BrokerConfig`] as an AsyncAPI document: one
//! `rabbitmq` server, one channel per queue with a single publish operation,
//! and the shared security scheme and payload schema under `components`.
//!
//! The only input that is not taken from the configuration is the timestamp
//! of the example message. It defaults to the time the builder was created
//! and can be fixed with [`BrokerDocumentBuilder::with_example_timestamp`],
//! in which case the output is fully deterministic.

use super::{
    bindings::{
        AmqpChannelBinding, AmqpExchangeBinding, AmqpOperationBinding, AmqpQueueBinding,
        ChannelBindings, OperationBindings,
    },
    builder::{AsyncApiBuilder, ChannelEntry, OperationEntry, ServerEntry},
    model::{AsyncApiDocument, CorrelationId, Info, Message, MessageExample, SecurityScheme},
    schema::SchemaNode,
    v3::{Action, V3Document},
};
use crate::{
    config::{BrokerConfig, QueueConfig},
    exchange::{ExchangeKind, IMPLICIT_EXCHANGE_KIND},
    publisher::{JSON_CONTENT_TYPE, PERSISTENT_DELIVERY_MODE},
};
use chrono::{DateTime, SecondsFormat, Utc};
use serde_json::json;
use std::str::FromStr;

pub const SERVER_NAME: &str = "rabbitmq";
pub const AMQP_PROTOCOL: &str = "amqp";
pub const AMQP_PROTOCOL_VERSION: &str = "0.9.1";
pub const USER_PASSWORD_SCHEME: &str = "userPassword";
pub const MESSAGE_PAYLOAD_SCHEMA: &str = "MessagePayload";
pub const MESSAGE_NAME: &str = "Message";
pub const EXAMPLE_NAME: &str = "ExampleMessage";
pub const CORRELATION_ID_LOCATION: &str = "$message.header#/correlationId";

const DEFAULT_TITLE: &str = "Message Broker Example (RabbitMQ)";
const DEFAULT_VERSION: &str = "1.0.0";
const DEFAULT_DESCRIPTION: &str = "This is an example of a message broker using RabbitMQ.";

/// Payload shared by every queue message.
pub fn message_payload_schema() -> SchemaNode {
    SchemaNode::object()
        .required_property(
            "messageId",
            SchemaNode::string().description("Unique identifier of the message"),
        )
        .required_property(
            "timestamp",
            SchemaNode::date_time().description("Time the message was created"),
        )
        .property(
            "data",
            SchemaNode::object().description("Message data"),
        )
}

fn message_headers_schema() -> SchemaNode {
    SchemaNode::object()
        .property(
            "correlationId",
            SchemaNode::string().description("Correlation id of the message"),
        )
        .property(
            "description",
            SchemaNode::string().description("Description of the message"),
        )
}

/// Builds documents describing the queues of a broker configuration.
pub struct BrokerDocumentBuilder<'a> {
    cfg: &'a BrokerConfig,
    info: Info,
    example_timestamp: DateTime<Utc>,
    security_schemes: Vec<(String, SecurityScheme)>,
}

impl<'a> BrokerDocumentBuilder<'a> {
    pub fn new(cfg: &'a BrokerConfig) -> BrokerDocumentBuilder<'a> {
        BrokerDocumentBuilder {
            cfg,
            info: Info::new(DEFAULT_TITLE, DEFAULT_VERSION).description(DEFAULT_DESCRIPTION),
            example_timestamp: Utc::now(),
            security_schemes: vec![],
        }
    }

    pub fn info(mut self, info: Info) -> Self {
        self.info = info;
        self
    }

    pub fn with_example_timestamp(mut self, timestamp: DateTime<Utc>) -> Self {
        self.example_timestamp = timestamp;
        self
    }

    /// Adds a security scheme next to `userPassword`.
    pub fn security_scheme(mut self, name: &str, scheme: SecurityScheme) -> Self {
        self.security_schemes.push((name.to_owned(), scheme));
        self
    }

    pub fn build_v2(&self) -> AsyncApiDocument {
        self.registrations().build_v2()
    }

    pub fn build_v3(&self) -> V3Document {
        self.registrations().build_v3()
    }

    fn registrations(&self) -> AsyncApiBuilder {
        let cfg = self.cfg;
        let scheme = if cfg.use_ssl { "amqps" } else { AMQP_PROTOCOL };

        let mut builder = AsyncApiBuilder::new(self.info.clone())
            .server(
                SERVER_NAME,
                ServerEntry::new(&format!("{}:{}", cfg.host_name, cfg.port), AMQP_PROTOCOL)
                    .scheme(scheme)
                    .protocol_version(AMQP_PROTOCOL_VERSION)
                    .pathname(&cfg.virtual_host)
                    .description("RabbitMQ server")
                    .security(USER_PASSWORD_SCHEME),
            )
            .security_scheme(
                USER_PASSWORD_SCHEME,
                SecurityScheme::user_password().description("RabbitMQ user name and password"),
            )
            .schema(MESSAGE_PAYLOAD_SCHEMA, message_payload_schema());

        for (name, scheme) in &self.security_schemes {
            builder = builder.security_scheme(name, scheme.clone());
        }

        for queue in &cfg.queues {
            builder = builder.channel(&queue.name, self.channel(queue));
        }

        builder
    }

    fn channel(&self, queue: &QueueConfig) -> ChannelEntry {
        let address = if queue.routing_key.is_empty() {
            &queue.name
        } else {
            &queue.routing_key
        };

        let operation = OperationEntry::new(&format!("publishTo{}", queue.name), Action::Send)
            .summary(&format!("Publish a message to queue `{}`", queue.name))
            .message(self.message(queue))
            .bindings(OperationBindings::amqp(AmqpOperationBinding {
                cc: vec![queue.routing_key.clone()],
                delivery_mode: Some(PERSISTENT_DELIVERY_MODE),
                ..Default::default()
            }));

        ChannelEntry::new()
            .address(address)
            .description(&self.channel_description(queue))
            .bindings(ChannelBindings::amqp(self.channel_binding(queue)))
            .operation(operation)
    }

    fn channel_description(&self, queue: &QueueConfig) -> String {
        let retry = &self.cfg.retry_config;

        format!(
            "Queue `{}` bound to exchange `{}` with routing key `{}`. \
             Retries: max {} every {} ms, dead letters to exchange `{}` and queue `{}`.",
            queue.name,
            queue.exchange,
            queue.routing_key,
            retry.max_retries,
            retry.retry_interval,
            retry.dead_letter_exchange,
            retry.dead_letter_queue,
        )
    }

    /// A queue on the default exchange is described as the queue itself,
    /// otherwise as a routing key on its exchange.
    fn channel_binding(&self, queue: &QueueConfig) -> AmqpChannelBinding {
        let cfg = self.cfg;

        if queue.exchange.is_empty() {
            return AmqpChannelBinding::queue(AmqpQueueBinding {
                name: queue.name.clone(),
                durable: queue.durable,
                exclusive: queue.exclusive,
                auto_delete: queue.auto_delete,
                vhost: cfg.virtual_host.clone(),
            });
        }

        let exchange = match cfg.exchange(&queue.exchange) {
            Some(exchange) => AmqpExchangeBinding {
                name: exchange.name.clone(),
                kind: ExchangeKind::from_str(&exchange.kind)
                    .unwrap_or_default()
                    .to_string(),
                durable: exchange.durable,
                auto_delete: exchange.auto_delete,
                vhost: cfg.virtual_host.clone(),
            },
            None => AmqpExchangeBinding {
                name: queue.exchange.clone(),
                kind: IMPLICIT_EXCHANGE_KIND.to_string(),
                durable: true,
                auto_delete: false,
                vhost: cfg.virtual_host.clone(),
            },
        };

        AmqpChannelBinding::routing_key(exchange)
    }

    fn message(&self, queue: &QueueConfig) -> Message {
        let timestamp = self
            .example_timestamp
            .to_rfc3339_opts(SecondsFormat::Millis, true);

        Message {
            name: MESSAGE_NAME.to_owned(),
            title: Some(MESSAGE_NAME.to_owned()),
            summary: Some(format!("Message published to queue `{}`", queue.name)),
            content_type: JSON_CONTENT_TYPE.to_owned(),
            payload: message_payload_schema(),
            headers: Some(message_headers_schema()),
            correlation_id: Some(CorrelationId {
                description: Some("Default correlation id".to_owned()),
                location: CORRELATION_ID_LOCATION.to_owned(),
            }),
            examples: vec![MessageExample {
                name: EXAMPLE_NAME.to_owned(),
                summary: Some("Example message".to_owned()),
                headers: Some(json!({
                    "correlationId": "example-correlation-id",
                    "description": format!("Example message for queue {}", queue.name),
                })),
                payload: json!({
                    "messageId": "example-message-id",
                    "timestamp": timestamp,
                    "data": { "key": "value" },
                }),
            }],
            ..Default::default()
        }
    }
}

/// Describes `cfg` as a 2.6 document, with an example timestamp of now.
pub fn build_v2_document(cfg: &BrokerConfig) -> AsyncApiDocument {
    BrokerDocumentBuilder::new(cfg).build_v2()
}

/// Describes `cfg` as a 3.0 document, with an example timestamp of now.
pub fn build_v3_document(cfg: &BrokerConfig) -> V3Document {
    BrokerDocumentBuilder::new(cfg).build_v3()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{
        asyncapi::bindings::AmqpChannelKind,
        config::{parse_section, ExchangeConfig, RABBITMQ_SECTION},
    };
    use chrono::TimeZone;

    fn fixed_time() -> DateTime<Utc> {
        Utc.with_ymd_and_hms(2025, 1, 2, 3, 4, 5).unwrap()
    }

    fn orders_config() -> BrokerConfig {
        let mut cfg = BrokerConfig::new("localhost", "guest", "guest");
        let orders = QueueConfig::new("orders", "orders.exchange", "orders.created");
        cfg.queues.push(orders);
        cfg
    }

    #[test]
    fn test_one_channel_per_queue() {
        let doc = BrokerDocumentBuilder::new(&orders_config())
            .with_example_timestamp(fixed_time())
            .build_v2();

        assert_eq!(doc.channels.keys().collect::<Vec<_>>(), vec!["orders"]);

        let publish = doc.channels["orders"].publish.as_ref().unwrap();
        assert_eq!(publish.operation_id.as_deref(), Some("publishToorders"));
        assert_eq!(publish.messages.len(), 1);
        let message = &publish.messages[0];
        assert_eq!(message.payload.required, vec!["messageId", "timestamp"]);
        assert_eq!(message.content_type, "application/json");
    }

    #[test]
    fn test_end_to_end_from_yaml() {
        let yaml = r#"
rabbitmq:
  hostName: localhost
  userName: guest
  password: guest
  queues:
    - name: q1
      exchange: ex1
      routingKey: rk1
  retryConfig:
    maxRetries: 3
    retryInterval: 1000
    deadLetterExchange: dlx
    deadLetterQueue: dlq
"#;
        let cfg: BrokerConfig = parse_section(yaml, RABBITMQ_SECTION).unwrap();
        let doc = build_v2_document(&cfg);
        let json = serde_json::to_value(&doc).unwrap();

        assert_eq!(
            json["channels"]["q1"]["publish"]["message"]["payload"]["required"],
            json!(["messageId", "timestamp"])
        );
        let amqp = &json["channels"]["q1"]["bindings"]["amqp"];
        assert_eq!(amqp["exchange"]["name"], "ex1");
        assert_eq!(amqp["exchange"]["type"], "direct");
        assert!(amqp.get("bindingVersion").is_none());

        let description = json["channels"]["q1"]["description"].as_str().unwrap();
        assert!(description.contains("max 3 every 1000 ms"));
        assert!(description.contains("`dlq`"));
    }

    #[test]
    fn test_server_and_components() {
        let mut cfg = orders_config();
        cfg.use_ssl = true;
        cfg.port = 5671;

        let doc = build_v2_document(&cfg);
        let server = &doc.servers[SERVER_NAME];

        assert_eq!(doc.servers.len(), 1);
        assert_eq!(server.url, "amqps://localhost:5671");
        assert_eq!(server.protocol, "amqp");
        assert_eq!(server.protocol_version.as_deref(), Some("0.9.1"));
        assert!(server.security[0].contains_key(USER_PASSWORD_SCHEME));
        let schemes = &doc.components.security_schemes;
        assert!(schemes.contains_key(USER_PASSWORD_SCHEME));
        assert_eq!(
            doc.components.schemas[MESSAGE_PAYLOAD_SCHEMA],
            message_payload_schema()
        );
    }

    #[test]
    fn test_configured_exchange_properties_are_used() {
        let mut cfg = orders_config();
        let mut exchange = ExchangeConfig::new("orders.exchange", "topic");
        exchange.auto_delete = true;
        cfg.exchanges.push(exchange);
        cfg.virtual_host = "shop".to_owned();

        let doc = build_v2_document(&cfg);
        let binding = doc.channels["orders"]
            .bindings
            .as_ref()
            .and_then(|b| b.amqp.as_ref())
            .unwrap();
        let exchange = binding.exchange.as_ref().unwrap();

        assert_eq!(binding.is, AmqpChannelKind::RoutingKey);
        assert_eq!(exchange.kind, "topic");
        assert!(exchange.auto_delete);
        assert_eq!(exchange.vhost, "shop");
    }

    #[test]
    fn test_default_exchange_queue_is_described_as_queue() {
        let mut cfg = BrokerConfig::new("localhost", "guest", "guest");
        cfg.queues.push(QueueConfig::new("jobs", "", ""));

        let doc = build_v3_document(&cfg);
        let channel = &doc.channels["jobs"];
        let binding = channel
            .bindings
            .as_ref()
            .and_then(|b| b.amqp.as_ref())
            .unwrap();

        assert_eq!(channel.address.as_deref(), Some("jobs"));
        assert_eq!(binding.is, AmqpChannelKind::Queue);
        assert_eq!(binding.queue.as_ref().unwrap().name, "jobs");
    }

    #[test]
    fn test_operation_binding() {
        let doc = build_v2_document(&orders_config());
        let binding = doc.channels["orders"]
            .publish
            .as_ref()
            .and_then(|op| op.bindings.as_ref())
            .and_then(|b| b.amqp.as_ref())
            .unwrap();

        assert_eq!(binding.cc, vec!["orders.created"]);
        assert_eq!(binding.delivery_mode, Some(2));
        assert!(!binding.mandatory);
        assert!(!binding.immediate);
    }

    #[test]
    fn test_example_uses_fixed_timestamp() {
        let cfg = orders_config();
        let builder = BrokerDocumentBuilder::new(&cfg).with_example_timestamp(fixed_time());
        let doc = builder.build_v2();
        let publish = doc.channels["orders"].publish.as_ref().unwrap();
        let message = &publish.messages[0];
        let correlation_id = message.correlation_id.as_ref().unwrap();

        assert_eq!(message.examples[0].name, EXAMPLE_NAME);
        assert_eq!(
            message.examples[0].payload["timestamp"],
            "2025-01-02T03:04:05.000Z"
        );
        assert_eq!(correlation_id.location, CORRELATION_ID_LOCATION);
        assert_eq!(builder.build_v2(), doc);
    }

    #[test]
    fn test_v3_document() {
        let doc = BrokerDocumentBuilder::new(&orders_config())
            .with_example_timestamp(fixed_time())
            .build_v3();

        assert_eq!(doc.asyncapi, "3.0.0");
        assert_eq!(doc.servers[SERVER_NAME].host, "localhost:5672");
        assert_eq!(doc.servers[SERVER_NAME].pathname.as_deref(), Some("/"));
        assert_eq!(
            doc.channels["orders"].address.as_deref(),
            Some("orders.created")
        );
        assert_eq!(doc.operations["publishToorders"].action, Action::Send);
        assert_eq!(
            doc.operations["publishToorders"].channel.reference,
            "#/channels/orders"
        );
    }
}
