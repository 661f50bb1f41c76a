// Copyright (c) 2025, The Ruskit Authors
// MIT License
// All rights reserved.

//! # Queue Management for RabbitMQ
//!
//! Queue definitions and queue-to-exchange bindings, built from
//! [`QueueConfig`] entries.

use crate::config::{Arguments, QueueConfig};

/// Queue argument holding the message TTL in milliseconds
pub const AMQP_ARGS_MESSAGE_TTL: &str = "x-message-ttl";
/// Queue argument naming the dead letter exchange
pub const AMQP_ARGS_DEAD_LETTER_EXCHANGE: &str = "x-dead-letter-exchange";
/// Queue argument naming the dead letter routing key
pub const AMQP_ARGS_DEAD_LETTER_ROUTING_KEY: &str = "x-dead-letter-routing-key";
/// Queue argument holding the maximum number of messages
pub const AMQP_ARGS_MAX_LENGTH: &str = "x-max-length";

/// Definition of a RabbitMQ queue with its configuration parameters.
///
/// This struct implements the builder pattern. Broker features such as TTL,
/// max length and dead-lettering are expressed through `arguments`.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct QueueDefinition {
    pub name: String,
    pub durable: bool,
    pub exclusive: bool,
    pub auto_delete: bool,
    pub arguments: Arguments,
}

impl QueueDefinition {
    /// Creates a new queue definition with the given name.
    ///
    /// By default, the queue is non-durable, non-exclusive and not auto-deleted.
    pub fn new(name: &str) -> QueueDefinition {
        QueueDefinition {
            name: name.to_owned(),
            ..Default::default()
        }
    }

    /// Makes the queue durable, persisting across broker restarts.
    pub fn durable(mut self) -> Self {
        self.durable = true;
        self
    }

    /// Makes the queue exclusive to the connection.
    ///
    /// Exclusive queues are deleted when the connection closes.
    pub fn exclusive(mut self) -> Self {
        self.exclusive = true;
        self
    }

    /// Sets the queue to auto-delete when its last consumer goes away.
    pub fn auto_delete(mut self) -> Self {
        self.auto_delete = true;
        self
    }

    /// Sets the message Time-To-Live (TTL) for the queue, in milliseconds.
    pub fn ttl(self, ttl: i64) -> Self {
        self.argument(AMQP_ARGS_MESSAGE_TTL, ttl.into())
    }

    /// Sets the maximum number of messages the queue can hold.
    pub fn max_length(self, max: i64) -> Self {
        self.argument(AMQP_ARGS_MAX_LENGTH, max.into())
    }

    /// Routes rejected and expired messages to `exchange` using `routing_key`.
    pub fn dead_letter(self, exchange: &str, routing_key: &str) -> Self {
        self.argument(AMQP_ARGS_DEAD_LETTER_EXCHANGE, exchange.into())
            .argument(AMQP_ARGS_DEAD_LETTER_ROUTING_KEY, routing_key.into())
    }

    /// Adds a single declaration argument.
    pub fn argument(mut self, key: &str, value: serde_json::Value) -> Self {
        self.arguments.insert(key.to_owned(), value);
        self
    }
}

impl From<&QueueConfig> for QueueDefinition {
    fn from(cfg: &QueueConfig) -> QueueDefinition {
        QueueDefinition {
            name: cfg.name.clone(),
            durable: cfg.durable,
            exclusive: cfg.exclusive,
            auto_delete: cfg.auto_delete,
            arguments: cfg.arguments.clone(),
        }
    }
}

/// Configuration for binding a queue to an exchange.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct QueueBinding {
    pub queue_name: String,
    pub exchange_name: String,
    pub routing_key: String,
}

impl QueueBinding {
    /// Creates a new queue binding for the given queue.
    ///
    /// The exchange name and routing key start empty; set them with
    /// `exchange` and `routing_key`.
    pub fn new(queue: &str) -> QueueBinding {
        QueueBinding {
            queue_name: queue.to_owned(),
            exchange_name: String::new(),
            routing_key: String::new(),
        }
    }

    /// Sets the exchange to bind the queue to.
    pub fn exchange(mut self, exchange: &str) -> Self {
        self.exchange_name = exchange.to_owned();
        self
    }

    /// Sets the routing key for the binding.
    pub fn routing_key(mut self, key: &str) -> Self {
        self.routing_key = key.to_owned();
        self
    }
}

impl From<&QueueConfig> for QueueBinding {
    fn from(cfg: &QueueConfig) -> QueueBinding {
        QueueBinding::new(&cfg.name)
            .exchange(&cfg.exchange)
            .routing_key(&cfg.routing_key)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_builder_arguments() {
        let def = QueueDefinition::new("orders")
            .durable()
            .ttl(60_000)
            .max_length(10)
            .dead_letter("dlx", "orders.dead");

        assert!(def.durable);
        assert_eq!(def.arguments[AMQP_ARGS_MESSAGE_TTL], json!(60_000));
        assert_eq!(def.arguments[AMQP_ARGS_MAX_LENGTH], json!(10));
        assert_eq!(def.arguments[AMQP_ARGS_DEAD_LETTER_EXCHANGE], json!("dlx"));
        assert_eq!(
            def.arguments[AMQP_ARGS_DEAD_LETTER_ROUTING_KEY],
            json!("orders.dead")
        );
    }

    #[test]
    fn test_from_config() {
        let mut cfg = QueueConfig::new("orders", "orders.exchange", "orders.created");
        cfg.exclusive = true;
        cfg.arguments.insert("x-max-priority".into(), json!(5));

        let def = QueueDefinition::from(&cfg);
        let binding = QueueBinding::from(&cfg);

        assert!(def.durable);
        assert!(def.exclusive);
        assert_eq!(def.arguments["x-max-priority"], json!(5));
        assert_eq!(binding.exchange_name, "orders.exchange");
        assert_eq!(binding.routing_key, "orders.created");
    }
}
