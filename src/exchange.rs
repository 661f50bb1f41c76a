// Copyright (c) 2025, The Ruskit Authors
// MIT License
// All rights reserved.

//! # Exchange Management for RabbitMQ
//!
//! This module provides types for defining RabbitMQ exchanges. Exchanges are
//! the routing mechanism in RabbitMQ that determine how messages are
//! distributed to queues. Definitions are built from [`ExchangeConfig`]
//! entries, or implicitly when a queue references an exchange that was never
//! configured.

use crate::config::{Arguments, ExchangeConfig};
use std::{fmt, str::FromStr};

/// Exchange type used for exchanges a queue references but nobody configured
pub const IMPLICIT_EXCHANGE_KIND: ExchangeKind = ExchangeKind::Direct;

/// Represents the types of exchanges available in RabbitMQ.
///
/// Each exchange type has specific routing behavior:
/// - Direct: Routes messages to queues based on an exact match of routing keys
/// - Fanout: Broadcasts messages to all bound queues regardless of routing keys
/// - Topic: Routes messages based on wildcard pattern matching of routing keys
/// - Headers: Routes based on message header values instead of routing keys
/// - Custom: Plugin provided types such as `x-delayed-message`
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub enum ExchangeKind {
    #[default]
    Direct,
    Fanout,
    Topic,
    Headers,
    Custom(String),
}

impl ExchangeKind {
    pub fn as_str(&self) -> &str {
        match self {
            ExchangeKind::Direct => "direct",
            ExchangeKind::Fanout => "fanout",
            ExchangeKind::Topic => "topic",
            ExchangeKind::Headers => "headers",
            ExchangeKind::Custom(kind) => kind,
        }
    }
}

impl FromStr for ExchangeKind {
    type Err = std::convert::Infallible;

    /// Parses the `type` field of an exchange. Unknown names are kept as
    /// custom types so plugin exchanges can be declared.
    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Ok(match s.to_lowercase().as_str() {
            "" | "direct" => ExchangeKind::Direct,
            "fanout" => ExchangeKind::Fanout,
            "topic" => ExchangeKind::Topic,
            "headers" => ExchangeKind::Headers,
            _ => ExchangeKind::Custom(s.to_owned()),
        })
    }
}

impl fmt::Display for ExchangeKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl From<&ExchangeKind> for lapin::ExchangeKind {
    fn from(kind: &ExchangeKind) -> lapin::ExchangeKind {
        match kind {
            ExchangeKind::Direct => lapin::ExchangeKind::Direct,
            ExchangeKind::Fanout => lapin::ExchangeKind::Fanout,
            ExchangeKind::Headers => lapin::ExchangeKind::Headers,
            ExchangeKind::Topic => lapin::ExchangeKind::Topic,
            ExchangeKind::Custom(kind) => lapin::ExchangeKind::Custom(kind.clone()),
        }
    }
}

/// Definition of a RabbitMQ exchange with its declaration parameters.
///
/// Implements the builder pattern; the flags map one to one onto
/// `exchange.declare`.
#[derive(Debug, Clone, PartialEq)]
pub struct ExchangeDefinition {
    pub name: String,
    pub kind: ExchangeKind,
    pub durable: bool,
    pub auto_delete: bool,
    pub arguments: Arguments,
}

impl ExchangeDefinition {
    /// Creates a new, non-durable direct exchange definition.
    pub fn new(name: &str) -> ExchangeDefinition {
        ExchangeDefinition {
            name: name.to_owned(),
            kind: ExchangeKind::Direct,
            durable: false,
            auto_delete: false,
            arguments: Arguments::default(),
        }
    }

    /// The exchange declared for a queue whose exchange is not configured:
    /// direct, durable, not auto-deleted, no arguments.
    pub fn implicit(name: &str) -> ExchangeDefinition {
        ExchangeDefinition::new(name)
            .kind(IMPLICIT_EXCHANGE_KIND)
            .durable()
    }

    /// Sets the exchange type.
    pub fn kind(mut self, kind: ExchangeKind) -> Self {
        self.kind = kind;
        self
    }

    /// Makes the exchange durable, persisting across broker restarts.
    pub fn durable(mut self) -> Self {
        self.durable = true;
        self
    }

    /// Sets the exchange to auto-delete when the last queue is unbound.
    pub fn auto_delete(mut self) -> Self {
        self.auto_delete = true;
        self
    }

    /// Replaces the declaration arguments.
    pub fn arguments(mut self, arguments: Arguments) -> Self {
        self.arguments = arguments;
        self
    }
}

impl From<&ExchangeConfig> for ExchangeDefinition {
    fn from(cfg: &ExchangeConfig) -> ExchangeDefinition {
        let kind = cfg.kind.parse().unwrap_or_default();

        let mut def = ExchangeDefinition::new(&cfg.name)
            .kind(kind)
            .arguments(cfg.arguments.clone());
        def.durable = cfg.durable;
        def.auto_delete = cfg.auto_delete;
        def
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_kinds() {
        assert_eq!("direct".parse::<ExchangeKind>(), Ok(ExchangeKind::Direct));
        assert_eq!("Topic".parse::<ExchangeKind>(), Ok(ExchangeKind::Topic));
        assert_eq!("FANOUT".parse::<ExchangeKind>(), Ok(ExchangeKind::Fanout));
        assert_eq!("headers".parse::<ExchangeKind>(), Ok(ExchangeKind::Headers));
        assert_eq!(
            "x-delayed-message".parse::<ExchangeKind>(),
            Ok(ExchangeKind::Custom("x-delayed-message".to_owned()))
        );
    }

    #[test]
    fn test_implicit_exchange() {
        let def = ExchangeDefinition::implicit("ex1");

        assert_eq!(def.kind, ExchangeKind::Direct);
        assert!(def.durable);
        assert!(!def.auto_delete);
        assert!(def.arguments.is_empty());
    }

    #[test]
    fn test_from_config() {
        let mut cfg = ExchangeConfig::new("events", "fanout");
        cfg.durable = false;
        cfg.auto_delete = true;

        let def = ExchangeDefinition::from(&cfg);

        assert_eq!(def.name, "events");
        assert_eq!(def.kind, ExchangeKind::Fanout);
        assert!(!def.durable);
        assert!(def.auto_delete);
    }

    #[test]
    fn test_lapin_conversion() {
        let kind: lapin::ExchangeKind = (&ExchangeKind::Custom("x-delayed-message".into())).into();
        match kind {
            lapin::ExchangeKind::Custom(k) => assert_eq!(k, "x-delayed-message"),
            other => panic!("unexpected kind {other:?}"),
        }
    }
}
