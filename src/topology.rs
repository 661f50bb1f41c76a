// Copyright (c) 2025, The Ruskit Authors
// MIT License
// All rights reserved.

//! # RabbitMQ Topology Management
//!
//! This module turns a [`BrokerConfig`] into an ordered list of declarations
//! and installs them on a channel. The order is:
//!
//! 1. every configured exchange, in configuration order;
//! 2. for every queue, in configuration order: its exchange when nobody
//!    configured it (direct, durable, not auto-deleted), the queue itself,
//!    then the binding with the queue's routing key.
//!
//! Declarations are idempotent on the broker side, so installing the same
//! topology twice is harmless. Redeclaring an entity with different
//! properties fails with a declaration error.

use crate::{
    channel::AmqpChannel,
    config::BrokerConfig,
    errors::AmqpError,
    exchange::ExchangeDefinition,
    queue::{QueueBinding, QueueDefinition},
};
use std::{collections::HashSet, sync::Arc};
use tracing::{debug, warn};

/// A single declaration against the broker.
#[derive(Debug, Clone, PartialEq)]
pub enum TopologyStep {
    DeclareExchange(ExchangeDefinition),
    DeclareQueue(QueueDefinition),
    BindQueue(QueueBinding),
}

/// An ordered set of declarations, installed on an [`AmqpChannel`].
pub struct AmqpTopology<C: AmqpChannel> {
    channel: Arc<C>,
    steps: Vec<TopologyStep>,
    implicit_exchanges: Vec<String>,
}

impl<C: AmqpChannel> AmqpTopology<C> {
    /// Creates an empty topology.
    pub fn new(channel: Arc<C>) -> AmqpTopology<C> {
        AmqpTopology {
            channel,
            steps: vec![],
            implicit_exchanges: vec![],
        }
    }

    /// Plans the topology described by `cfg`.
    ///
    /// A queue bound to the empty (default) exchange is declared but not
    /// bound: the default exchange already routes by queue name.
    pub fn from_config(channel: Arc<C>, cfg: &BrokerConfig) -> AmqpTopology<C> {
        let mut topology = AmqpTopology::new(channel);
        let mut declared = HashSet::new();

        for exchange in &cfg.exchanges {
            declared.insert(exchange.name.as_str());
            topology = topology.exchange(exchange.into());
        }

        for queue in &cfg.queues {
            let uses_default_exchange = queue.exchange.is_empty();

            if !uses_default_exchange && declared.insert(queue.exchange.as_str()) {
                warn!(
                    exchange = queue.exchange,
                    queue = queue.name,
                    "exchange not found in configuration, declaring it as 'direct'"
                );
                topology.implicit_exchanges.push(queue.exchange.clone());
                topology = topology.exchange(ExchangeDefinition::implicit(&queue.exchange));
            }

            topology = topology.queue(queue.into());

            if !uses_default_exchange {
                topology = topology.queue_binding(queue.into());
            }
        }

        topology
    }

    /// Adds an exchange declaration.
    pub fn exchange(mut self, def: ExchangeDefinition) -> Self {
        self.steps.push(TopologyStep::DeclareExchange(def));
        self
    }

    /// Adds a queue declaration.
    pub fn queue(mut self, def: QueueDefinition) -> Self {
        self.steps.push(TopologyStep::DeclareQueue(def));
        self
    }

    /// Adds a queue-to-exchange binding.
    pub fn queue_binding(mut self, binding: QueueBinding) -> Self {
        self.steps.push(TopologyStep::BindQueue(binding));
        self
    }

    pub fn steps(&self) -> &[TopologyStep] {
        &self.steps
    }

    /// Exchanges declared only because a queue referenced them.
    pub fn implicit_exchanges(&self) -> &[String] {
        &self.implicit_exchanges
    }

    /// Runs every declaration in order, stopping at the first failure.
    pub async fn install(&self) -> Result<(), AmqpError> {
        for step in &self.steps {
            match step {
                TopologyStep::DeclareExchange(def) => self.channel.declare_exchange(def).await?,
                TopologyStep::DeclareQueue(def) => self.channel.declare_queue(def).await?,
                TopologyStep::BindQueue(binding) => self.channel.bind_queue(binding).await?,
            }
        }

        debug!(steps = self.steps.len(), "topology installed");
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{
        channel::MockAmqpChannel,
        config::{ExchangeConfig, QueueConfig},
        exchange::ExchangeKind,
    };
    use mockall::Sequence;

    fn single_queue_config() -> BrokerConfig {
        let mut cfg = BrokerConfig::new("localhost", "guest", "guest");
        cfg.queues.push(QueueConfig::new("q1", "ex1", "rk1"));
        cfg
    }

    #[test]
    fn test_missing_exchange_is_declared_direct_before_binding() {
        let topology = AmqpTopology::from_config(
            Arc::new(MockAmqpChannel::new()),
            &single_queue_config(),
        );

        assert_eq!(topology.implicit_exchanges(), ["ex1"]);
        assert_eq!(
            topology.steps(),
            &[
                TopologyStep::DeclareExchange(ExchangeDefinition {
                    name: "ex1".into(),
                    kind: ExchangeKind::Direct,
                    durable: true,
                    auto_delete: false,
                    arguments: Default::default(),
                }),
                TopologyStep::DeclareQueue(QueueDefinition::new("q1").durable()),
                TopologyStep::BindQueue(QueueBinding::new("q1").exchange("ex1").routing_key("rk1")),
            ]
        );
    }

    #[test]
    fn test_configured_exchange_is_not_redeclared() {
        let mut cfg = single_queue_config();
        cfg.exchanges.push(ExchangeConfig::new("ex1", "topic"));
        cfg.queues.push(QueueConfig::new("q2", "ex1", "rk2"));

        let topology = AmqpTopology::from_config(Arc::new(MockAmqpChannel::new()), &cfg);

        let exchanges: Vec<_> = topology
            .steps()
            .iter()
            .filter_map(|s| match s {
                TopologyStep::DeclareExchange(def) => Some(def.kind.clone()),
                _ => None,
            })
            .collect();

        assert_eq!(exchanges, vec![ExchangeKind::Topic]);
        assert!(topology.implicit_exchanges().is_empty());
    }

    #[test]
    fn test_implicit_exchange_declared_once() {
        let mut cfg = single_queue_config();
        cfg.queues.push(QueueConfig::new("q2", "ex1", "rk2"));

        let topology = AmqpTopology::from_config(Arc::new(MockAmqpChannel::new()), &cfg);

        assert_eq!(topology.implicit_exchanges(), ["ex1"]);
        assert_eq!(topology.steps().len(), 5);
    }

    #[test]
    fn test_default_exchange_queue_is_not_bound() {
        let mut cfg = BrokerConfig::new("localhost", "guest", "guest");
        cfg.queues.push(QueueConfig::new("q1", "", ""));

        let topology = AmqpTopology::from_config(Arc::new(MockAmqpChannel::new()), &cfg);

        let expected = TopologyStep::DeclareQueue(QueueDefinition::new("q1").durable());
        assert_eq!(topology.steps(), &[expected]);
    }

    #[tokio::test]
    async fn test_install_runs_in_order() {
        let mut channel = MockAmqpChannel::new();
        let mut seq = Sequence::new();

        channel
            .expect_declare_exchange()
            .withf(|def| {
                def.name == "ex1" && def.kind == ExchangeKind::Direct && def.durable
            })
            .times(1)
            .in_sequence(&mut seq)
            .returning(|_| Ok(()));
        channel
            .expect_declare_queue()
            .withf(|def| def.name == "q1")
            .times(1)
            .in_sequence(&mut seq)
            .returning(|_| Ok(()));
        channel
            .expect_bind_queue()
            .withf(|b| {
                b.queue_name == "q1" && b.exchange_name == "ex1" && b.routing_key == "rk1"
            })
            .times(1)
            .in_sequence(&mut seq)
            .returning(|_| Ok(()));

        let topology = AmqpTopology::from_config(Arc::new(channel), &single_queue_config());

        assert_eq!(topology.install().await, Ok(()));
    }

    #[tokio::test]
    async fn test_install_stops_at_declaration_error() {
        let mut channel = MockAmqpChannel::new();
        channel
            .expect_declare_exchange()
            .times(1)
            .returning(|def| Err(AmqpError::DeclareExchangeError(def.name.clone())));
        channel.expect_declare_queue().times(0);
        channel.expect_bind_queue().times(0);

        let topology = AmqpTopology::from_config(Arc::new(channel), &single_queue_config());

        assert_eq!(
            topology.install().await,
            Err(AmqpError::DeclareExchangeError("ex1".to_owned()))
        );
    }
}
