// Copyright (c) 2025, The Ruskit Authors
// MIT License
// All rights reserved.

//! # Broker Configuration
//!
//! Strongly-typed configuration loaded from a YAML file. The file holds one
//! mapping per broker under a well-known top-level key (`rabbitmq`, `kafka`).
//!
//! Field matching is case-insensitive and tolerant to `snake_case` and
//! `kebab-case` spellings: `hostName`, `HostName`, `host_name` and `host-name`
//! all resolve to the same field. Keys inside `arguments` maps are broker
//! arguments (`x-message-ttl`, `x-dead-letter-exchange`, ...) and are kept
//! verbatim.

use crate::errors::ConfigError;
use serde::{de::DeserializeOwned, Deserialize, Serialize};
use serde_yaml::{Mapping, Value};
use std::{
    collections::{BTreeMap, HashSet},
    fs,
    path::Path,
};
use tracing::{debug, error};

/// Top-level key of the RabbitMQ section
pub const RABBITMQ_SECTION: &str = "rabbitmq";
/// Top-level key of the Kafka section
pub const KAFKA_SECTION: &str = "kafka";

const ARGUMENTS_KEY: &str = "arguments";

/// Every field name the loader knows about, in canonical camelCase.
const KNOWN_FIELDS: &[&str] = &[
    "hostName",
    "userName",
    "password",
    "port",
    "virtualHost",
    "useSsl",
    "connectionTimeout",
    "requestedHeartbeat",
    "networkRecoveryInterval",
    "queues",
    "exchanges",
    "retryConfig",
    "monitoringConfig",
    "name",
    "exchange",
    "routingKey",
    "durable",
    "exclusive",
    "autoDelete",
    "arguments",
    "type",
    "maxRetries",
    "retryInterval",
    "deadLetterExchange",
    "deadLetterQueue",
    "enableMetrics",
    "metricsEndpoint",
    "bootstrapServers",
    "topic",
    "groupId",
    "partition",
];

/// Free-form broker arguments, e.g. `x-message-ttl: 60000`.
pub type Arguments = BTreeMap<String, serde_json::Value>;

/// RabbitMQ connection and topology settings.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct BrokerConfig {
    pub host_name: String,
    pub user_name: String,
    pub password: String,
    #[serde(default = "default_port")]
    pub port: u16,
    #[serde(default = "default_virtual_host")]
    pub virtual_host: String,
    #[serde(default)]
    pub use_ssl: bool,
    /// Milliseconds
    #[serde(default = "default_connection_timeout")]
    pub connection_timeout: u64,
    /// Seconds
    #[serde(default = "default_heartbeat")]
    pub requested_heartbeat: u16,
    /// Milliseconds
    #[serde(default = "default_recovery_interval")]
    pub network_recovery_interval: u64,
    #[serde(default)]
    pub queues: Vec<QueueConfig>,
    #[serde(default)]
    pub exchanges: Vec<ExchangeConfig>,
    #[serde(default)]
    pub retry_config: RetryConfig,
    #[serde(default)]
    pub monitoring_config: MonitoringConfig,
}

/// A queue and the exchange it is bound to.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct QueueConfig {
    pub name: String,
    pub exchange: String,
    #[serde(default)]
    pub routing_key: String,
    #[serde(default = "default_true")]
    pub durable: bool,
    #[serde(default)]
    pub exclusive: bool,
    #[serde(default)]
    pub auto_delete: bool,
    #[serde(default, skip_serializing_if = "BTreeMap::is_empty")]
    pub arguments: Arguments,
}

/// An exchange declared up-front, before any queue.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ExchangeConfig {
    pub name: String,
    #[serde(rename = "type", default = "default_exchange_type")]
    pub kind: String,
    #[serde(default = "default_true")]
    pub durable: bool,
    #[serde(default)]
    pub auto_delete: bool,
    #[serde(default, skip_serializing_if = "BTreeMap::is_empty")]
    pub arguments: Arguments,
}

/// Retry settings. Informational only, nothing in this crate retries.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct RetryConfig {
    pub max_retries: u32,
    /// Milliseconds
    pub retry_interval: u64,
    pub dead_letter_exchange: String,
    pub dead_letter_queue: String,
}

/// Monitoring settings. Informational only.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct MonitoringConfig {
    pub enable_metrics: bool,
    pub metrics_endpoint: String,
}

/// Kafka producer/consumer settings.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct KafkaConfig {
    /// Comma separated `host:port` list
    pub bootstrap_servers: String,
    pub topic: String,
    #[serde(default)]
    pub group_id: String,
    #[serde(default)]
    pub partition: i32,
}

fn default_port() -> u16 {
    5672
}

fn default_virtual_host() -> String {
    "/".to_owned()
}

fn default_connection_timeout() -> u64 {
    30_000
}

fn default_heartbeat() -> u16 {
    60
}

fn default_recovery_interval() -> u64 {
    5_000
}

fn default_true() -> bool {
    true
}

fn default_exchange_type() -> String {
    "direct".to_owned()
}

impl BrokerConfig {
    /// Returns a configuration with every optional field at its default.
    pub fn new(host_name: &str, user_name: &str, password: &str) -> BrokerConfig {
        BrokerConfig {
            host_name: host_name.to_owned(),
            user_name: user_name.to_owned(),
            password: password.to_owned(),
            port: default_port(),
            virtual_host: default_virtual_host(),
            use_ssl: false,
            connection_timeout: default_connection_timeout(),
            requested_heartbeat: default_heartbeat(),
            network_recovery_interval: default_recovery_interval(),
            queues: vec![],
            exchanges: vec![],
            retry_config: RetryConfig::default(),
            monitoring_config: MonitoringConfig::default(),
        }
    }

    /// Looks up an explicitly configured exchange by name.
    pub fn exchange(&self, name: &str) -> Option<&ExchangeConfig> {
        self.exchanges.iter().find(|e| e.name == name)
    }

    /// Serializes the configuration back under the `rabbitmq` key.
    pub fn to_yaml(&self) -> Result<String, ConfigError> {
        let mut root = BTreeMap::new();
        root.insert(RABBITMQ_SECTION, self);
        Ok(serde_yaml::to_string(&root)?)
    }

    fn validate(&self) -> Result<(), ConfigError> {
        let invalid = |reason: String| ConfigError::Invalid {
            section: RABBITMQ_SECTION.to_owned(),
            reason,
        };

        if self.host_name.trim().is_empty() {
            return Err(invalid("`hostName` must not be empty".to_owned()));
        }

        if self.user_name.trim().is_empty() {
            return Err(invalid("`userName` must not be empty".to_owned()));
        }

        let mut names = HashSet::new();
        for queue in &self.queues {
            if !names.insert(queue.name.as_str()) {
                return Err(invalid(format!("duplicated queue `{}`", queue.name)));
            }
        }

        let mut names = HashSet::new();
        for exchange in &self.exchanges {
            if !names.insert(exchange.name.as_str()) {
                return Err(invalid(format!("duplicated exchange `{}`", exchange.name)));
            }
        }

        Ok(())
    }
}

impl QueueConfig {
    pub fn new(name: &str, exchange: &str, routing_key: &str) -> QueueConfig {
        QueueConfig {
            name: name.to_owned(),
            exchange: exchange.to_owned(),
            routing_key: routing_key.to_owned(),
            durable: true,
            exclusive: false,
            auto_delete: false,
            arguments: Arguments::default(),
        }
    }
}

impl ExchangeConfig {
    pub fn new(name: &str, kind: &str) -> ExchangeConfig {
        ExchangeConfig {
            name: name.to_owned(),
            kind: kind.to_owned(),
            durable: true,
            auto_delete: false,
            arguments: Arguments::default(),
        }
    }
}

impl KafkaConfig {
    /// Splits `bootstrapServers` into individual broker addresses.
    pub fn brokers(&self) -> Vec<String> {
        self.bootstrap_servers
            .split(',')
            .map(|s| s.trim().to_owned())
            .filter(|s| !s.is_empty())
            .collect()
    }
}

/// Loads the `rabbitmq` section of the given YAML file.
pub fn load_broker_config(path: impl AsRef<Path>) -> Result<BrokerConfig, ConfigError> {
    let cfg: BrokerConfig = load_section(path, RABBITMQ_SECTION)?;
    cfg.validate()?;
    Ok(cfg)
}

/// Loads the `kafka` section of the given YAML file.
pub fn load_kafka_config(path: impl AsRef<Path>) -> Result<KafkaConfig, ConfigError> {
    load_section(path, KAFKA_SECTION)
}

/// Reads `path` and deserializes the mapping stored under `section`.
pub fn load_section<T>(path: impl AsRef<Path>, section: &str) -> Result<T, ConfigError>
where
    T: DeserializeOwned,
{
    let path = path.as_ref();
    debug!("loading configuration from {}", path.display());

    let yaml = fs::read_to_string(path).map_err(|err| {
        error!(
            error = err.to_string(),
            "failure to read configuration file"
        );
        ConfigError::Io {
            path: path.display().to_string(),
            source: err,
        }
    })?;

    parse_section(&yaml, section)
}

/// Deserializes the mapping stored under `section` in a YAML document.
pub fn parse_section<T>(yaml: &str, section: &str) -> Result<T, ConfigError>
where
    T: DeserializeOwned,
{
    let root: Value = serde_yaml::from_str(yaml)?;

    let Value::Mapping(root) = root else {
        return Err(ConfigError::MissingSection(section.to_owned()));
    };

    let wanted = fold(section);
    let value = root.into_iter().find_map(|(k, v)| match k {
        Value::String(k) if fold(&k) == wanted => Some(v),
        _ => None,
    });
    let Some(value) = value else {
        return Err(ConfigError::MissingSection(section.to_owned()));
    };

    serde_yaml::from_value(canonicalize(value)).map_err(|err| {
        error!(error = err.to_string(), section, "invalid configuration");
        ConfigError::Invalid {
            section: section.to_owned(),
            reason: err.to_string(),
        }
    })
}

/// Lowercases and drops `_`/`-` so that spelling variants compare equal.
fn fold(key: &str) -> String {
    key.chars()
        .filter(|c| *c != '_' && *c != '-')
        .flat_map(char::to_lowercase)
        .collect()
}

fn canonical_name(key: &str) -> Option<&'static str> {
    let folded = fold(key);
    KNOWN_FIELDS.iter().copied().find(|f| fold(f) == folded)
}

/// Rewrites every known mapping key to its camelCase spelling.
fn canonicalize(value: Value) -> Value {
    match value {
        Value::Mapping(map) => Value::Mapping(
            map.into_iter()
                .map(|(key, value)| match key {
                    Value::String(key) => {
                        let key = canonical_name(&key).map(str::to_owned).unwrap_or(key);
                        let value = if key == ARGUMENTS_KEY {
                            value
                        } else {
                            canonicalize(value)
                        };
                        (Value::String(key), value)
                    }
                    other => (other, canonicalize(value)),
                })
                .collect::<Mapping>(),
        ),
        Value::Sequence(seq) => Value::Sequence(seq.into_iter().map(canonicalize).collect()),
        other => other,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;

    const FULL: &str = r#"
rabbitmq:
  hostName: rabbit.local
  userName: admin
  password: secret
  port: 5673
  virtualHost: /orders
  useSsl: true
  connectionTimeout: 1000
  requestedHeartbeat: 30
  networkRecoveryInterval: 2000
  queues:
    - name: orders
      exchange: orders.exchange
      routingKey: orders.created
      durable: false
      exclusive: true
      autoDelete: true
      arguments:
        x-message-ttl: "60000"
        x-dead-letter-exchange: dlx
  exchanges:
    - name: orders.exchange
      type: topic
      durable: true
      autoDelete: false
  retryConfig:
    maxRetries: 3
    retryInterval: 500
    deadLetterExchange: dlx
    deadLetterQueue: dlq
  monitoringConfig:
    enableMetrics: true
    metricsEndpoint: /metrics
"#;

    #[test]
    fn test_parse_full_section() {
        let cfg: BrokerConfig = parse_section(FULL, RABBITMQ_SECTION).unwrap();

        assert_eq!(cfg.host_name, "rabbit.local");
        assert_eq!(cfg.port, 5673);
        assert_eq!(cfg.virtual_host, "/orders");
        assert!(cfg.use_ssl);
        assert_eq!(cfg.requested_heartbeat, 30);
        assert_eq!(cfg.queues.len(), 1);
        assert_eq!(cfg.queues[0].routing_key, "orders.created");
        assert!(cfg.queues[0].exclusive);
        assert_eq!(
            cfg.queues[0].arguments.get("x-message-ttl"),
            Some(&serde_json::json!("60000"))
        );
        assert_eq!(cfg.exchanges[0].kind, "topic");
        assert_eq!(cfg.retry_config.max_retries, 3);
        assert_eq!(cfg.monitoring_config.metrics_endpoint, "/metrics");
    }

    #[test]
    fn test_defaults_are_applied() {
        let yaml = r#"
rabbitmq:
  hostName: localhost
  userName: app
  password: pw
  queues:
    - name: q1
      exchange: ex1
"#;
        let cfg: BrokerConfig = parse_section(yaml, RABBITMQ_SECTION).unwrap();

        assert_eq!(cfg, {
            let mut expected = BrokerConfig::new("localhost", "app", "pw");
            expected.queues.push(QueueConfig::new("q1", "ex1", ""));
            expected
        });
    }

    #[test]
    fn test_case_insensitive_keys() {
        let yaml = r#"
RabbitMQ:
  HostName: localhost
  user_name: bob
  PASSWORD: secret
  Virtual-Host: /vh
  QUEUES:
    - Name: q1
      EXCHANGE: ex1
      routing_key: rk1
      Auto-Delete: true
      arguments:
        X-Message-TTL: 10
"#;
        let cfg: BrokerConfig = parse_section(yaml, RABBITMQ_SECTION).unwrap();

        assert_eq!(cfg.user_name, "bob");
        assert_eq!(cfg.virtual_host, "/vh");
        assert_eq!(cfg.queues[0].routing_key, "rk1");
        assert!(cfg.queues[0].auto_delete);
        assert!(cfg.queues[0].arguments.contains_key("X-Message-TTL"));
    }

    #[test]
    fn test_missing_section() {
        let err = parse_section::<BrokerConfig>("kafka:\n  topic: t\n", RABBITMQ_SECTION)
            .unwrap_err();
        match err {
            ConfigError::MissingSection(section) => assert_eq!(section, "rabbitmq"),
            other => panic!("unexpected error {other:?}"),
        }
    }

    #[test]
    fn test_missing_required_field() {
        let err = parse_section::<BrokerConfig>("rabbitmq:\n  port: 5672\n", RABBITMQ_SECTION)
            .unwrap_err();
        match err {
            ConfigError::Invalid { reason, .. } => assert!(reason.contains("hostName")),
            other => panic!("unexpected error {other:?}"),
        }
    }

    #[test]
    fn test_missing_credentials_fail() {
        let err = parse_section::<BrokerConfig>("rabbitmq:\n  hostName: h\n", RABBITMQ_SECTION)
            .unwrap_err();
        match err {
            ConfigError::Invalid { reason, .. } => assert!(reason.contains("userName")),
            other => panic!("unexpected error {other:?}"),
        }

        let err = parse_section::<BrokerConfig>(
            "rabbitmq:\n  hostName: h\n  userName: u\n",
            RABBITMQ_SECTION,
        )
        .unwrap_err();
        match err {
            ConfigError::Invalid { reason, .. } => assert!(reason.contains("password")),
            other => panic!("unexpected error {other:?}"),
        }
    }

    #[test]
    fn test_empty_user_name_rejected() {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        file.write_all(b"rabbitmq: {hostName: h, userName: '', password: p}\n")
            .unwrap();

        let err = load_broker_config(file.path()).unwrap_err();
        match err {
            ConfigError::Invalid { reason, .. } => assert!(reason.contains("userName")),
            other => panic!("unexpected error {other:?}"),
        }
    }

    #[test]
    fn test_queue_without_exchange_fails() {
        let yaml = r#"
rabbitmq:
  hostName: h
  userName: u
  password: p
  queues:
    - name: q1
"#;
        let err = parse_section::<BrokerConfig>(yaml, RABBITMQ_SECTION).unwrap_err();
        match err {
            ConfigError::Invalid { reason, .. } => assert!(reason.contains("exchange")),
            other => panic!("unexpected error {other:?}"),
        }
    }

    #[test]
    fn test_round_trip_is_lossless() {
        let cfg: BrokerConfig = parse_section(FULL, RABBITMQ_SECTION).unwrap();
        let yaml = cfg.to_yaml().unwrap();

        assert!(yaml.contains("hostName: rabbit.local"));
        assert!(yaml.contains("deadLetterQueue: dlq"));

        let reloaded: BrokerConfig = parse_section(&yaml, RABBITMQ_SECTION).unwrap();
        assert_eq!(cfg, reloaded);
    }

    #[test]
    fn test_load_from_file() {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        file.write_all(FULL.as_bytes()).unwrap();

        let cfg = load_broker_config(file.path()).unwrap();
        assert_eq!(cfg.user_name, "admin");
    }

    #[test]
    fn test_load_unreadable_file() {
        let err = load_broker_config("/definitely/not/here.yaml").unwrap_err();
        assert!(matches!(err, ConfigError::Io { .. }));
    }

    #[test]
    fn test_duplicated_queue_rejected() {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        file.write_all(
            b"rabbitmq:\n  hostName: h\n  userName: u\n  password: p\n  queues:\n    - {name: q, exchange: e}\n    - {name: q, exchange: e}\n",
        )
        .unwrap();

        let err = load_broker_config(file.path()).unwrap_err();
        match err {
            ConfigError::Invalid { reason, .. } => assert!(reason.contains("`q`")),
            other => panic!("unexpected error {other:?}"),
        }
    }

    #[test]
    fn test_kafka_section() {
        let yaml = r#"
kafka:
  bootstrap_servers: 'k1:9092, k2:9092'
  topic: events
  groupId: g
"#;
        let cfg: KafkaConfig = parse_section(yaml, KAFKA_SECTION).unwrap();

        assert_eq!(cfg.brokers(), vec!["k1:9092", "k2:9092"]);
        assert_eq!(cfg.partition, 0);
    }
}
