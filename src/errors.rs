// Copyright (c) 2025, The Ruskit Authors
// MIT License
// All rights reserved.

//! # Error Types
//!
//! One error enum per concern: loading configuration, talking to RabbitMQ,
//! talking to Kafka, and exporting AsyncAPI documents. Broker errors carry
//! the name of the entity that failed so the caller can report it without
//! digging through the logs.

use thiserror::Error;

/// Errors raised while loading a configuration file.
#[derive(Error, Debug)]
pub enum ConfigError {
    /// The file could not be read
    #[error("failure to read configuration file `{path}`: {source}")]
    Io {
        path: String,
        #[source]
        source: std::io::Error,
    },

    /// The file is not a valid YAML document
    #[error("failure to parse configuration: {0}")]
    Yaml(#[from] serde_yaml::Error),

    /// The well-known top-level key is absent
    #[error("missing `{0}` section in the YAML configuration")]
    MissingSection(String),

    /// The section exists but does not describe a valid configuration
    #[error("invalid `{section}` section: {reason}")]
    Invalid { section: String, reason: String },
}

/// Represents errors that can occur during AMQP/RabbitMQ operations.
///
/// Covers connecting, opening a channel, declaring the topology, publishing
/// and consuming.
#[derive(Error, Debug, PartialEq, Eq)]
pub enum AmqpError {
    /// Error establishing a connection to the RabbitMQ server
    #[error("failure to connect")]
    ConnectionError,

    /// Error creating a channel from an established connection
    #[error("failure to create a channel")]
    ChannelError,

    /// Error declaring an exchange with the given name
    #[error("failure to declare an exchange `{0}`")]
    DeclareExchangeError(String),

    /// Error declaring a queue with the given name
    #[error("failure to declare a queue `{0}`")]
    DeclareQueueError(String),

    /// Error binding an exchange to a queue
    #[error("failure to binding exchange `{0}` to queue `{1}`")]
    BindingExchangeToQueueError(String, String),

    /// Error publishing a message to the given exchange
    #[error("failure to publish to exchange `{0}`")]
    PublishingError(String),

    /// Error declaring a consumer on the given queue
    #[error("failure to declare consumer `{0}`")]
    ConsumerDeclarationError(String),

    /// Error consuming a message
    #[error("failure to consume message `{0}`")]
    ConsumerError(String),
}

/// Errors raised by the Kafka producer and consumer.
#[derive(Error, Debug, PartialEq, Eq)]
pub enum KafkaError {
    #[error("failure to connect to kafka: {0}")]
    ConnectionFailed(String),

    #[error("failure to produce to topic `{0}`: {1}")]
    ProduceFailed(String, String),

    #[error("failure to consume from topic `{0}`: {1}")]
    ConsumeFailed(String, String),
}

/// Errors raised while serializing or writing an AsyncAPI document.
#[derive(Error, Debug)]
pub enum ExportError {
    /// The document could not be serialized to the requested format
    #[error("failure to serialize document: {0}")]
    Serialization(String),

    /// The output file or one of its parent directories could not be written
    #[error("failure to write `{path}`: {source}")]
    Io {
        path: String,
        #[source]
        source: std::io::Error,
    },
}

impl From<serde_yaml::Error> for ExportError {
    fn from(err: serde_yaml::Error) -> Self {
        ExportError::Serialization(err.to_string())
    }
}

impl From<serde_json::Error> for ExportError {
    fn from(err: serde_json::Error) -> Self {
        ExportError::Serialization(err.to_string())
    }
}

/// Error raised when the global tracing subscriber cannot be installed.
#[derive(Error, Debug)]
#[error("failure to initialize logging: {0}")]
pub struct LoggingError(pub String);
