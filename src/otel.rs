// Copyright (c) 2025, The Ruskit Authors
// MIT License
// All rights reserved.

//! Trace context propagation through AMQP message headers.

use lapin::{
    protocol::basic::AMQPProperties,
    types::{AMQPValue, ShortString},
};
use opentelemetry::{
    global::{self, BoxedSpan, BoxedTracer},
    propagation::{Extractor, Injector},
    trace::{SpanKind, Tracer},
    Context,
};
use std::{borrow::Cow, collections::BTreeMap};
use tracing::error;

/// Reads and writes trace context entries in an AMQP header table.
pub(crate) struct AmqpHeaderPropagator<'a> {
    headers: &'a mut BTreeMap<ShortString, AMQPValue>,
}

impl<'a> AmqpHeaderPropagator<'a> {
    pub(crate) fn new(headers: &'a mut BTreeMap<ShortString, AMQPValue>) -> Self {
        Self { headers }
    }
}

impl Injector for AmqpHeaderPropagator<'_> {
    fn set(&mut self, key: &str, value: String) {
        self.headers.insert(
            key.to_lowercase().into(),
            AMQPValue::LongString(value.into()),
        );
    }
}

impl Extractor for AmqpHeaderPropagator<'_> {
    fn get(&self, key: &str) -> Option<&str> {
        match self.headers.get(key) {
            Some(AMQPValue::LongString(value)) => std::str::from_utf8(value.as_bytes())
                .map_err(|e| error!("error decoding header value {:?}", e))
                .ok(),
            _ => None,
        }
    }

    fn keys(&self) -> Vec<&str> {
        self.headers.keys().map(|header| header.as_str()).collect()
    }
}

/// Starts a consumer span named `name`, parented to the trace context found
/// in the delivery headers.
pub(crate) fn consumer_span(props: &AMQPProperties, tracer: &BoxedTracer, name: &str) -> BoxedSpan {
    let mut headers = props
        .headers()
        .as_ref()
        .map(|h| h.inner().clone())
        .unwrap_or_default();

    let ctx: Context = global::get_text_map_propagator(|propagator| {
        propagator.extract(&AmqpHeaderPropagator::new(&mut headers))
    });

    tracer
        .span_builder(Cow::from(name.to_owned()))
        .with_kind(SpanKind::Consumer)
        .start_with_context(tracer, &ctx)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_inject_then_extract() {
        let mut headers = BTreeMap::new();
        {
            let mut propagator = AmqpHeaderPropagator::new(&mut headers);
            propagator.set("TraceParent", "00-abc-def-01".to_owned());
        }

        let propagator = AmqpHeaderPropagator::new(&mut headers);
        assert_eq!(propagator.get("traceparent"), Some("00-abc-def-01"));
        assert_eq!(propagator.keys(), vec!["traceparent"]);
    }

    #[test]
    fn test_non_string_header_is_ignored() {
        let mut headers = BTreeMap::new();
        headers.insert(ShortString::from("x-delay"), AMQPValue::LongInt(1000));

        let propagator = AmqpHeaderPropagator::new(&mut headers);
        assert_eq!(propagator.get("x-delay"), None);
    }
}
