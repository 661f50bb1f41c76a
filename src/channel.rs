// Copyright (c) 2025, The Ruskit Authors
// MIT License
// All rights reserved.

//! # AMQP Channel Management
//!
//! This module handles the creation of AMQP connections and channels, and
//! defines [`AmqpChannel`], the narrow set of broker calls the topology
//! installer and the publisher rely on. `lapin::Channel` implements it; tests
//! substitute a mock.

use crate::{
    config::{Arguments, BrokerConfig},
    errors::AmqpError,
    exchange::ExchangeDefinition,
    publisher::{amqp_properties, PublishMessage},
    queue::{QueueBinding, QueueDefinition, AMQP_ARGS_MESSAGE_TTL},
};
use async_trait::async_trait;
use lapin::{
    options::{BasicPublishOptions, ExchangeDeclareOptions, QueueBindOptions, QueueDeclareOptions},
    types::{AMQPValue, FieldArray, FieldTable, LongString, ShortString},
    Channel, Connection, ConnectionProperties,
};
use std::{collections::BTreeMap, sync::Arc};
use tracing::{debug, error};

/// Broker operations needed to install a topology and publish messages.
#[cfg_attr(test, mockall::automock)]
#[async_trait]
pub trait AmqpChannel: Send + Sync {
    /// Declares an exchange. Redeclaring with the same properties is a no-op.
    async fn declare_exchange(&self, def: &ExchangeDefinition) -> Result<(), AmqpError>;

    /// Declares a queue. Redeclaring with the same properties is a no-op.
    async fn declare_queue(&self, def: &QueueDefinition) -> Result<(), AmqpError>;

    /// Binds a queue to an exchange with a routing key.
    async fn bind_queue(&self, binding: &QueueBinding) -> Result<(), AmqpError>;

    /// Publishes a message without waiting for a broker confirmation.
    async fn publish(
        &self,
        exchange: &str,
        routing_key: &str,
        message: &PublishMessage,
    ) -> Result<(), AmqpError>;
}

/// Creates a new AMQP connection and a channel on it.
///
/// Host, credentials, port, virtual host, TLS, heartbeat and connection
/// timeout come from `cfg`. Both the connection and channel are wrapped in
/// Arc for sharing with background consumers. Dropping the connection closes
/// it, nothing is pooled.
pub async fn new_amqp_channel(
    cfg: &BrokerConfig,
    connection_name: &str,
) -> Result<(Arc<Connection>, Arc<Channel>), AmqpError> {
    debug!("creating amqp connection...");
    let options = ConnectionProperties::default()
        .with_connection_name(LongString::from(connection_name.to_owned()));

    debug!(
        recovery_interval_ms = cfg.network_recovery_interval,
        "automatic connection recovery is not available, reconnecting is left to the caller"
    );

    let conn = match Connection::connect(&amqp_uri(cfg), options).await {
        Ok(c) => Ok(c),
        Err(err) => {
            error!(
                error = err.to_string(),
                host = cfg.host_name,
                "failure to connect"
            );
            Err(AmqpError::ConnectionError)
        }
    }?;
    debug!("amqp connected");

    debug!("creating amqp channel...");
    match conn.create_channel().await {
        Ok(c) => {
            debug!("channel created");
            Ok((Arc::new(conn), Arc::new(c)))
        }
        Err(err) => {
            error!(error = err.to_string(), "error to create the channel");
            Err(AmqpError::ChannelError)
        }
    }
}

/// Builds the AMQP URI for `cfg`.
///
/// The virtual host and the credentials are percent-encoded, so the default
/// vhost `/` becomes `%2F`. Heartbeat and connection timeout travel as query
/// parameters.
pub fn amqp_uri(cfg: &BrokerConfig) -> String {
    let scheme = if cfg.use_ssl { "amqps" } else { "amqp" };

    format!(
        "{}://{}:{}@{}:{}/{}?heartbeat={}&connection_timeout={}",
        scheme,
        urlencoding::encode(&cfg.user_name),
        urlencoding::encode(&cfg.password),
        cfg.host_name,
        cfg.port,
        urlencoding::encode(&cfg.virtual_host),
        cfg.requested_heartbeat,
        cfg.connection_timeout
    )
}

/// Converts free-form arguments into an AMQP field table.
///
/// `x-message-ttl` given as a numeric string is declared as an integer, the
/// broker rejects a string TTL.
pub(crate) fn field_table(args: &Arguments) -> FieldTable {
    let mut table = BTreeMap::new();

    for (key, value) in args {
        let value = match value {
            serde_json::Value::String(s) if key == AMQP_ARGS_MESSAGE_TTL => s
                .trim()
                .parse::<i64>()
                .map(integer_value)
                .unwrap_or_else(|_| amqp_value(value)),
            _ => amqp_value(value),
        };
        table.insert(ShortString::from(key.clone()), value);
    }

    FieldTable::from(table)
}

pub(crate) fn amqp_value(value: &serde_json::Value) -> AMQPValue {
    match value {
        serde_json::Value::Null => AMQPValue::Void,
        serde_json::Value::Bool(b) => AMQPValue::Boolean(*b),
        serde_json::Value::Number(n) => match n.as_i64() {
            Some(i) => integer_value(i),
            None => AMQPValue::Double(n.as_f64().unwrap_or_default()),
        },
        serde_json::Value::String(s) => AMQPValue::LongString(LongString::from(s.clone())),
        serde_json::Value::Array(items) => AMQPValue::FieldArray(FieldArray::from(
            items.iter().map(amqp_value).collect::<Vec<_>>(),
        )),
        serde_json::Value::Object(map) => AMQPValue::FieldTable(FieldTable::from(
            map.iter()
                .map(|(k, v)| (ShortString::from(k.clone()), amqp_value(v)))
                .collect::<BTreeMap<_, _>>(),
        )),
    }
}

fn integer_value(i: i64) -> AMQPValue {
    match i32::try_from(i) {
        Ok(i) => AMQPValue::LongInt(i),
        Err(_) => AMQPValue::LongLongInt(i),
    }
}

#[async_trait]
impl AmqpChannel for Channel {
    async fn declare_exchange(&self, def: &ExchangeDefinition) -> Result<(), AmqpError> {
        debug!("creating exchange: {}", def.name);

        match self
            .exchange_declare(
                &def.name,
                (&def.kind).into(),
                ExchangeDeclareOptions {
                    passive: false,
                    durable: def.durable,
                    auto_delete: def.auto_delete,
                    internal: false,
                    nowait: false,
                },
                field_table(&def.arguments),
            )
            .await
        {
            Err(err) => {
                error!(
                    error = err.to_string(),
                    name = def.name,
                    "error to declare the exchange"
                );
                Err(AmqpError::DeclareExchangeError(def.name.clone()))
            }
            _ => {
                debug!("exchange: {} was created", def.name);
                Ok(())
            }
        }
    }

    async fn declare_queue(&self, def: &QueueDefinition) -> Result<(), AmqpError> {
        debug!("creating queue: {}", def.name);

        match self
            .queue_declare(
                &def.name,
                QueueDeclareOptions {
                    passive: false,
                    durable: def.durable,
                    exclusive: def.exclusive,
                    auto_delete: def.auto_delete,
                    nowait: false,
                },
                field_table(&def.arguments),
            )
            .await
        {
            Err(err) => {
                error!(
                    error = err.to_string(),
                    name = def.name,
                    "error to declare the queue"
                );
                Err(AmqpError::DeclareQueueError(def.name.clone()))
            }
            _ => {
                debug!("queue: {} was created", def.name);
                Ok(())
            }
        }
    }

    async fn bind_queue(&self, binding: &QueueBinding) -> Result<(), AmqpError> {
        debug!(
            "binding queue: {} to the exchange: {} with the key: {}",
            binding.queue_name, binding.exchange_name, binding.routing_key
        );

        match self
            .queue_bind(
                &binding.queue_name,
                &binding.exchange_name,
                &binding.routing_key,
                QueueBindOptions { nowait: false },
                FieldTable::default(),
            )
            .await
        {
            Err(err) => {
                error!(error = err.to_string(), "error to bind queue to exchange");
                Err(AmqpError::BindingExchangeToQueueError(
                    binding.exchange_name.clone(),
                    binding.queue_name.clone(),
                ))
            }
            _ => Ok(()),
        }
    }

    async fn publish(
        &self,
        exchange: &str,
        routing_key: &str,
        message: &PublishMessage,
    ) -> Result<(), AmqpError> {
        match self
            .basic_publish(
                exchange,
                routing_key,
                BasicPublishOptions {
                    immediate: false,
                    mandatory: false,
                },
                &message.body,
                amqp_properties(message),
            )
            .await
        {
            Err(err) => {
                error!(
                    error = err.to_string(),
                    exchange,
                    "error publishing message"
                );
                Err(AmqpError::PublishingError(exchange.to_owned()))
            }
            _ => Ok(()),
        }
    }
}
