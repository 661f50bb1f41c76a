// Copyright (c) 2025, The Ruskit Authors
// MIT License
// All rights reserved.

//! # RabbitMQ Message Consumer
//!
//! A single background loop consuming every registered queue. Each delivery
//! is handed to the handler registered for its queue. The loop observes a
//! cancellation signal between deliveries and exits cleanly; a delivery being
//! handled when the signal arrives is finished first.
//!
//! Deliveries are consumed in auto-ack mode: a failing handler is logged and
//! the message is not redelivered.

use crate::{errors::AmqpError, otel};
use async_trait::async_trait;
use futures_util::{stream::select_all, Stream, StreamExt};
use lapin::{message::Delivery, options::BasicConsumeOptions, types::FieldTable, Channel};
use opentelemetry::{
    global,
    trace::{Span, Status},
};
use std::{borrow::Cow, collections::HashMap, future::Future, sync::Arc};
use tokio::sync::watch;
use tracing::{debug, error, info};

/// A message received from a queue.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ConsumerMessage {
    pub queue: String,
    pub msg_type: String,
    pub content_type: String,
    pub data: Vec<u8>,
}

impl ConsumerMessage {
    pub fn new(queue: &str, delivery: &Delivery) -> ConsumerMessage {
        let props = &delivery.properties;

        ConsumerMessage {
            queue: queue.to_owned(),
            msg_type: props
                .kind()
                .as_ref()
                .map(|k| k.to_string())
                .unwrap_or_default(),
            content_type: props
                .content_type()
                .as_ref()
                .map(|c| c.to_string())
                .unwrap_or_default(),
            data: delivery.data.clone(),
        }
    }
}

/// Handles the messages of one queue.
#[async_trait]
pub trait ConsumerHandler: Send + Sync {
    async fn exec(&self, msg: &ConsumerMessage) -> Result<(), AmqpError>;
}

/// Logs every message it receives.
pub struct LoggingHandler;

#[async_trait]
impl ConsumerHandler for LoggingHandler {
    async fn exec(&self, msg: &ConsumerMessage) -> Result<(), AmqpError> {
        info!(
            queue = msg.queue,
            content_type = msg.content_type,
            "message received: {}",
            String::from_utf8_lossy(&msg.data)
        );
        Ok(())
    }
}

/// Handlers keyed by queue name.
#[derive(Clone, Default)]
pub struct HandlerRegistry {
    handlers: HashMap<String, Arc<dyn ConsumerHandler>>,
}

impl HandlerRegistry {
    /// Registers the handler of `queue`, replacing any previous one.
    pub fn register(&mut self, queue: &str, handler: Arc<dyn ConsumerHandler>) {
        self.handlers.insert(queue.to_owned(), handler);
    }

    pub fn queues(&self) -> impl Iterator<Item = &String> {
        self.handlers.keys()
    }

    /// Hands `msg` to the handler of its queue.
    pub async fn dispatch(&self, msg: &ConsumerMessage) -> Result<(), AmqpError> {
        let Some(handler) = self.handlers.get(&msg.queue) else {
            return Err(AmqpError::ConsumerError(format!(
                "no handler registered for queue `{}`",
                msg.queue
            )));
        };

        handler.exec(msg).await.inspect_err(|err| {
            error!(
                error = err.to_string(),
                queue = msg.queue,
                "error consume msg"
            );
        })
    }
}

/// Hands every item of `stream` to `on_item` until `shutdown` turns `true`,
/// its sender is dropped, or the stream ends.
///
/// The signal is checked before each read, so an item being handled when
/// it flips is finished first. The first error returned by `on_item` stops
/// the loop.
///
/// # Returns
///
/// The number of items handled.
pub async fn consume_stream<S, F, Fut, E>(
    mut stream: S,
    mut shutdown: watch::Receiver<bool>,
    mut on_item: F,
) -> Result<usize, E>
where
    S: Stream + Unpin,
    F: FnMut(S::Item) -> Fut,
    Fut: Future<Output = Result<(), E>>,
{
    let mut handled = 0;

    loop {
        if *shutdown.borrow() {
            break;
        }

        tokio::select! {
            changed = shutdown.changed() => {
                if changed.is_err() || *shutdown.borrow() {
                    break;
                }
            }
            next = stream.next() => match next {
                Some(item) => {
                    on_item(item).await?;
                    handled += 1;
                }
                None => break,
            }
        }
    }

    Ok(handled)
}

/// Consumes registered queues until cancelled.
pub struct QueueConsumer {
    channel: Arc<Channel>,
    tag: String,
    registry: HandlerRegistry,
}

impl QueueConsumer {
    /// Creates a consumer; `tag` prefixes the consumer tag of every queue.
    pub fn new(channel: Arc<Channel>, tag: &str) -> Self {
        QueueConsumer {
            channel,
            tag: tag.to_owned(),
            registry: HandlerRegistry::default(),
        }
    }

    /// Registers the handler of `queue`, replacing any previous one.
    pub fn register(mut self, queue: &str, handler: Arc<dyn ConsumerHandler>) -> Self {
        self.registry.register(queue, handler);
        self
    }

    /// Consumes until `shutdown` turns `true` or its sender is dropped, or
    /// until the broker closes every consumer.
    pub async fn consume_until(&self, shutdown: watch::Receiver<bool>) -> Result<(), AmqpError> {
        let mut streams = vec![];

        for queue in self.registry.queues() {
            let consumer = match self
                .channel
                .basic_consume(
                    queue,
                    &format!("{}-{}", self.tag, queue),
                    BasicConsumeOptions {
                        no_local: false,
                        no_ack: true,
                        exclusive: false,
                        nowait: false,
                    },
                    FieldTable::default(),
                )
                .await
            {
                Err(err) => {
                    error!(
                        error = err.to_string(),
                        queue,
                        "failure to create the consumer"
                    );
                    Err(AmqpError::ConsumerDeclarationError(queue.clone()))
                }
                Ok(c) => Ok(c),
            }?;

            let queue = queue.clone();
            let tagged = consumer.map(move |delivery| (queue.clone(), delivery));
            streams.push(tagged.boxed());
        }

        let registry = &self.registry;
        let tracer = global::tracer("amqp consumer");
        let tracer = &tracer;

        let deliveries = select_all(streams);
        let handled = consume_stream(deliveries, shutdown, |(queue, delivery)| async move {
            match delivery {
                Ok(delivery) => {
                    let mut span = otel::consumer_span(&delivery.properties, tracer, &queue);
                    let msg = ConsumerMessage::new(&queue, &delivery);

                    match registry.dispatch(&msg).await {
                        Ok(()) => span.set_status(Status::Ok),
                        Err(err) => {
                            span.record_error(&err);
                            span.set_status(Status::Error {
                                description: Cow::from(err.to_string()),
                            });
                        }
                    }
                }
                Err(err) => {
                    error!(error = err.to_string(), queue, "errors consume msg");
                }
            }
            Ok::<(), AmqpError>(())
        })
        .await?;

        debug!(handled, "consumer stopped");
        Ok(())
    }
}
