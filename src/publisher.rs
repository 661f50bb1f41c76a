// Copyright (c) 2025, The Ruskit Authors
// MIT License
// All rights reserved.

//! # RabbitMQ Message Publisher
//!
//! Publishes a message to the exchange/routing-key pair of every configured
//! queue. Publishing is fire-and-forget: no confirmation is awaited and a
//! failed publish is not retried, the transport error goes straight back to
//! the caller. The current OpenTelemetry context is injected into the
//! message headers.

use crate::{
    channel::AmqpChannel, config::BrokerConfig, errors::AmqpError,
    otel::AmqpHeaderPropagator,
};
use lapin::{
    types::{AMQPValue, FieldTable, LongString, ShortString},
    BasicProperties,
};
use opentelemetry::{global, Context};
use std::{collections::BTreeMap, sync::Arc};
use tracing::{debug, info};
use uuid::Uuid;

/// Default content type for JSON messages
pub const JSON_CONTENT_TYPE: &str = "application/json";
/// Default content type for text messages
pub const TEXT_CONTENT_TYPE: &str = "text/plain";
/// AMQP delivery mode for persistent messages
pub const PERSISTENT_DELIVERY_MODE: u8 = 2;
/// AMQP delivery mode for transient messages
pub const TRANSIENT_DELIVERY_MODE: u8 = 1;
/// Expiration of the sample message: 10 hours, in milliseconds
pub const SAMPLE_EXPIRATION_MS: &str = "36000000";

/// A custom header value.
///
/// `Int` travels as an AMQP long-int (32 bits) and `Long` as a long-long-int;
/// the delayed-message plugin only reads `x-delay` as the former.
#[derive(Debug, Clone, PartialEq)]
pub enum HeaderValue {
    Str(String),
    Int(i32),
    Long(i64),
    Double(f64),
    Bool(bool),
}

impl From<&str> for HeaderValue {
    fn from(v: &str) -> Self {
        HeaderValue::Str(v.to_owned())
    }
}

impl From<i32> for HeaderValue {
    fn from(v: i32) -> Self {
        HeaderValue::Int(v)
    }
}

impl From<i64> for HeaderValue {
    fn from(v: i64) -> Self {
        HeaderValue::Long(v)
    }
}

impl From<f64> for HeaderValue {
    fn from(v: f64) -> Self {
        HeaderValue::Double(v)
    }
}

impl From<bool> for HeaderValue {
    fn from(v: bool) -> Self {
        HeaderValue::Bool(v)
    }
}

impl From<&HeaderValue> for AMQPValue {
    fn from(value: &HeaderValue) -> AMQPValue {
        match value {
            HeaderValue::Str(v) => AMQPValue::LongString(LongString::from(v.clone())),
            HeaderValue::Int(v) => AMQPValue::LongInt(*v),
            HeaderValue::Long(v) => AMQPValue::LongLongInt(*v),
            HeaderValue::Double(v) => AMQPValue::Double(*v),
            HeaderValue::Bool(v) => AMQPValue::Boolean(*v),
        }
    }
}

/// A message body with its fixed metadata.
#[derive(Debug, Clone, PartialEq)]
pub struct PublishMessage {
    pub body: Vec<u8>,
    pub content_type: String,
    pub persistent: bool,
    /// Per-message TTL in milliseconds, as AMQP expects it: a string
    pub expiration: Option<String>,
    pub headers: BTreeMap<String, HeaderValue>,
}

impl PublishMessage {
    /// A transient message with no headers.
    pub fn new(body: impl Into<Vec<u8>>, content_type: &str) -> PublishMessage {
        PublishMessage {
            body: body.into(),
            content_type: content_type.to_owned(),
            persistent: false,
            expiration: None,
            headers: BTreeMap::new(),
        }
    }

    /// A JSON message.
    pub fn json(payload: &serde_json::Value) -> PublishMessage {
        PublishMessage::new(payload.to_string(), JSON_CONTENT_TYPE)
    }

    /// The text message the sample publishes: persistent, expiring after 10
    /// hours, tagged with a location and a delay header.
    pub fn sample(text: &str) -> PublishMessage {
        PublishMessage::new(text, TEXT_CONTENT_TYPE)
            .persistent()
            .expiration(SAMPLE_EXPIRATION_MS)
            .header("latitude", 51.5252949)
            .header("longitude", -0.0905493)
            .header("x-delay", 1000_i32)
    }

    pub fn persistent(mut self) -> Self {
        self.persistent = true;
        self
    }

    pub fn expiration(mut self, ms: &str) -> Self {
        self.expiration = Some(ms.to_owned());
        self
    }

    pub fn header(mut self, key: &str, value: impl Into<HeaderValue>) -> Self {
        self.headers.insert(key.to_owned(), value.into());
        self
    }

    /// Text view of the body for logging.
    pub fn body_text(&self) -> String {
        String::from_utf8_lossy(&self.body).into_owned()
    }
}

/// Builds the AMQP properties for `message`.
///
/// A random message id is assigned and the current trace context is
/// injected next to the custom headers.
pub(crate) fn amqp_properties(message: &PublishMessage) -> BasicProperties {
    let mut headers = BTreeMap::<ShortString, AMQPValue>::default();

    global::get_text_map_propagator(|propagator| {
        propagator.inject_context(
            &Context::current(),
            &mut AmqpHeaderPropagator::new(&mut headers),
        )
    });

    for (key, value) in &message.headers {
        headers.insert(ShortString::from(key.clone()), value.into());
    }

    let delivery_mode = if message.persistent {
        PERSISTENT_DELIVERY_MODE
    } else {
        TRANSIENT_DELIVERY_MODE
    };

    let props = BasicProperties::default()
        .with_content_type(ShortString::from(message.content_type.clone()))
        .with_delivery_mode(delivery_mode)
        .with_message_id(ShortString::from(Uuid::new_v4().to_string()))
        .with_headers(FieldTable::from(headers));

    match &message.expiration {
        Some(expiration) => props.with_expiration(ShortString::from(expiration.clone())),
        None => props,
    }
}

/// Publishes messages to the queues of a [`BrokerConfig`].
pub struct MessagePublisher<C: AmqpChannel> {
    channel: Arc<C>,
}

impl<C: AmqpChannel> MessagePublisher<C> {
    pub fn new(channel: Arc<C>) -> MessagePublisher<C> {
        MessagePublisher { channel }
    }

    /// Sends `message` once per configured queue, to the queue's exchange
    /// with the queue's routing key. Queues on the default exchange without
    /// a routing key receive it under their own name. Stops at the first
    /// failure.
    pub async fn publish_to_queues(
        &self,
        cfg: &BrokerConfig,
        message: &PublishMessage,
    ) -> Result<usize, AmqpError> {
        for queue in &cfg.queues {
            // the default exchange routes by queue name
            let routing_key = if queue.exchange.is_empty() && queue.routing_key.is_empty() {
                &queue.name
            } else {
                &queue.routing_key
            };

            self.channel
                .publish(&queue.exchange, routing_key, message)
                .await?;

            debug!(exchange = queue.exchange, routing_key, "message published");
            info!(
                " [x] Sent '{}' to queue '{}'",
                message.body_text(),
                queue.name
            );
        }

        Ok(cfg.queues.len())
    }

    /// Sends `message` to a single exchange.
    pub async fn publish(
        &self,
        exchange: &str,
        routing_key: &str,
        message: &PublishMessage,
    ) -> Result<(), AmqpError> {
        self.channel.publish(exchange, routing_key, message).await
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{channel::MockAmqpChannel, config::QueueConfig};
    use mockall::{predicate::eq, Sequence};

    fn header(props: &BasicProperties, key: &str) -> Option<AMQPValue> {
        props
            .headers()
            .as_ref()
            .and_then(|h| h.inner().get(&ShortString::from(key)).cloned())
    }

    #[test]
    fn test_sample_message_properties() {
        let props = amqp_properties(&PublishMessage::sample("Hello World!"));

        assert_eq!(
            props.content_type().as_ref().map(|c| c.as_str()),
            Some(TEXT_CONTENT_TYPE)
        );
        assert_eq!(*props.delivery_mode(), Some(PERSISTENT_DELIVERY_MODE));
        assert_eq!(
            props.expiration().as_ref().map(|e| e.as_str()),
            Some("36000000")
        );
        assert_eq!(
            header(&props, "latitude"),
            Some(AMQPValue::Double(51.5252949))
        );
        assert_eq!(
            header(&props, "longitude"),
            Some(AMQPValue::Double(-0.0905493))
        );
        assert_eq!(header(&props, "x-delay"), Some(AMQPValue::LongInt(1000)));
        assert!(props.message_id().is_some());
    }

    #[test]
    fn test_integer_header_widths() {
        let message = PublishMessage::new("x", TEXT_CONTENT_TYPE)
            .header("short", 7_i32)
            .header("long", 5_000_000_000_i64);
        let props = amqp_properties(&message);

        assert_eq!(header(&props, "short"), Some(AMQPValue::LongInt(7)));
        assert_eq!(
            header(&props, "long"),
            Some(AMQPValue::LongLongInt(5_000_000_000))
        );
    }

    #[test]
    fn test_transient_message_has_no_expiration() {
        let props = amqp_properties(&PublishMessage::json(&serde_json::json!({"a": 1})));

        assert_eq!(*props.delivery_mode(), Some(TRANSIENT_DELIVERY_MODE));
        assert!(props.expiration().is_none());
    }

    #[tokio::test]
    async fn test_publish_to_every_queue() {
        let mut cfg = BrokerConfig::new("localhost", "guest", "guest");
        cfg.queues.push(QueueConfig::new("q1", "ex1", "rk1"));
        cfg.queues.push(QueueConfig::new("q2", "ex2", "rk2"));

        let mut channel = MockAmqpChannel::new();
        let mut seq = Sequence::new();
        channel
            .expect_publish()
            .with(eq("ex1"), eq("rk1"), mockall::predicate::always())
            .times(1)
            .in_sequence(&mut seq)
            .returning(|_, _, _| Ok(()));
        channel
            .expect_publish()
            .with(eq("ex2"), eq("rk2"), mockall::predicate::always())
            .times(1)
            .in_sequence(&mut seq)
            .returning(|_, _, _| Ok(()));

        let publisher = MessagePublisher::new(Arc::new(channel));
        let sent = publisher
            .publish_to_queues(&cfg, &PublishMessage::sample("Hello World!"))
            .await
            .unwrap();

        assert_eq!(sent, 2);
    }

    #[tokio::test]
    async fn test_publish_error_propagates() {
        let mut cfg = BrokerConfig::new("localhost", "guest", "guest");
        cfg.queues.push(QueueConfig::new("q1", "ex1", "rk1"));
        cfg.queues.push(QueueConfig::new("q2", "ex2", "rk2"));

        let mut channel = MockAmqpChannel::new();
        channel
            .expect_publish()
            .times(1)
            .returning(|exchange, _, _| {
                Err(AmqpError::PublishingError(exchange.to_owned()))
            });

        let publisher = MessagePublisher::new(Arc::new(channel));
        let err = publisher
            .publish_to_queues(&cfg, &PublishMessage::sample("Hello World!"))
            .await
            .unwrap_err();

        assert_eq!(err, AmqpError::PublishingError("ex1".to_owned()));
    }

    #[tokio::test]
    async fn test_default_exchange_routes_by_queue_name() {
        let mut cfg = BrokerConfig::new("localhost", "guest", "guest");
        cfg.queues.push(QueueConfig::new("jobs", "", ""));

        let mut channel = MockAmqpChannel::new();
        channel
            .expect_publish()
            .with(eq(""), eq("jobs"), mockall::predicate::always())
            .times(1)
            .returning(|_, _, _| Ok(()));

        let publisher = MessagePublisher::new(Arc::new(channel));
        let sent = publisher
            .publish_to_queues(&cfg, &PublishMessage::json(&serde_json::json!({"id": 1})))
            .await
            .unwrap();

        assert_eq!(sent, 1);
    }
}
