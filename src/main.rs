// Copyright (c) 2025, The Ruskit Authors
// MIT License
// All rights reserved.

use anyhow::Context;
use broker_asyncapi::{
    asyncapi::{
        export_all, write_document, BrokerDocumentBuilder, Document, ExportFormat, ExportTarget,
    },
    channel::new_amqp_channel,
    config::{load_broker_config, load_kafka_config},
    errors::ConfigError,
    kafka::KafkaProducer,
    logging::{init_logging, LogFormat},
    publisher::{MessagePublisher, PublishMessage},
    topology::AmqpTopology,
};
use tracing::warn;

const CONFIG_FILE: &str = "rabbitmq-config.yaml";
const SPEC_DIR: &str = "asyncapispec";
const SPEC_FILE: &str = "asyncapispec/asyncapi.yaml";
const CONNECTION_NAME: &str = "broker-asyncapi";
const SAMPLE_TEXT: &str = "Hello World!";

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    init_logging(LogFormat::from_env())?;

    let cfg = load_broker_config(CONFIG_FILE)
        .with_context(|| format!("failed to load `{}`", CONFIG_FILE))?;

    println!(
        "Initializing RabbitMQ topology on {}:{}...",
        cfg.host_name, cfg.port
    );
    let (conn, channel) = new_amqp_channel(&cfg, CONNECTION_NAME)
        .await
        .context("failed to connect to RabbitMQ")?;

    let topology = AmqpTopology::from_config(channel.clone(), &cfg);
    topology
        .install()
        .await
        .context("failed to install the topology")?;
    println!(
        "Topology installed ({} declarations)",
        topology.steps().len()
    );

    let sent = MessagePublisher::new(channel)
        .publish_to_queues(&cfg, &PublishMessage::sample(SAMPLE_TEXT))
        .await
        .context("failed to publish the sample message")?;
    println!("Sent '{}' to {} queue(s)", SAMPLE_TEXT, sent);

    match load_kafka_config(CONFIG_FILE) {
        Ok(kafka) => match KafkaProducer::connect(&kafka).await {
            Ok(producer) => {
                let offset = producer.produce(SAMPLE_TEXT).await?;
                println!(
                    "Sent '{}' to Kafka topic '{}' at offset {}",
                    SAMPLE_TEXT, kafka.topic, offset
                );
            }
            Err(err) => warn!(error = err.to_string(), "Kafka is unavailable, skipping"),
        },
        Err(ConfigError::MissingSection(_)) => {}
        Err(err) => return Err(err).context("failed to load the Kafka configuration"),
    }

    let builder = BrokerDocumentBuilder::new(&cfg);
    let v2 = builder.build_v2();
    let v3 = builder.build_v3();
    let title = v2.info.title.clone();

    println!("Generating AsyncAPI specification...");
    let path = write_document(&Document::V2(v2.clone()), SPEC_FILE)
        .context("failed to write the AsyncAPI specification")?;
    println!("AsyncAPI specification written to {}", path.display());

    let targets = vec![
        ExportTarget::new(&title, &v2.asyncapi, Some(Document::V2(v2.clone()))),
        ExportTarget::new(&title, &v3.asyncapi, Some(Document::V3(v3.clone()))),
    ];
    let report = export_all(&targets, SPEC_DIR, ExportFormat::Yaml);
    for path in &report.written {
        println!("Exported {}", path.display());
    }
    for id in &report.skipped {
        println!("Skipped '{}'", id);
    }
    for (id, err) in &report.failed {
        println!("Failed to export '{}': {}", id, err);
    }

    conn.close(200, "OK")
        .await
        .context("failed to close the RabbitMQ connection")?;

    Ok(())
}
