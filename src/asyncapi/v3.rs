// Copyright (c) 2025, The Ruskit Authors
// MIT License
// All rights reserved.

//! AsyncAPI 3.0 document model.
//!
//! Operations are top-level in 3.0 and point at their channel and messages
//! through references.

use super::{
    bindings::{ChannelBindings, OperationBindings},
    model::{Components, Info, Message, Reference},
};
use serde::Serialize;
use std::collections::BTreeMap;

pub const ASYNCAPI_V3_VERSION: &str = "3.0.0";

/// A 3.0 server. Unlike 2.6, host and path are separate fields.
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct V3Server {
    /// `host[:port]`, without scheme
    pub host: String,
    pub protocol: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub protocol_version: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub pathname: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
    #[serde(skip_serializing_if = "Vec::is_empty")]
    pub security: Vec<Reference>,
}

/// A 3.0 channel and the messages that may flow through it.
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct V3Channel {
    /// Topic, routing key or path; the channel name when unset
    #[serde(skip_serializing_if = "Option::is_none")]
    pub address: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
    #[serde(skip_serializing_if = "BTreeMap::is_empty")]
    pub messages: BTreeMap<String, Message>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub bindings: Option<ChannelBindings>,
}

/// What the application does on a channel.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum Action {
    Send,
    Receive,
}

/// A top-level 3.0 operation.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct V3Operation {
    pub action: Action,
    pub channel: Reference,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub summary: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
    #[serde(skip_serializing_if = "Vec::is_empty")]
    pub security: Vec<Reference>,
    #[serde(skip_serializing_if = "Vec::is_empty")]
    pub messages: Vec<Reference>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub bindings: Option<OperationBindings>,
}

impl V3Operation {
    /// An operation on a channel.
    ///
    /// # Parameters
    ///
    /// * `action` - whether the application sends or receives
    /// * `channel` - name of the channel under `channels`
    /// * `message_ids` - keys of the channel messages the operation carries
    ///
    /// # Returns
    ///
    /// An operation referencing the channel and each of its messages, with
    /// no summary, security or bindings.
    pub fn new(action: Action, channel: &str, message_ids: &[&str]) -> V3Operation {
        let message_ref = |id: &&str| Reference::local(&["channels", channel, "messages", *id]);

        V3Operation {
            action,
            channel: Reference::local(&["channels", channel]),
            summary: None,
            description: None,
            security: vec![],
            messages: message_ids.iter().map(message_ref).collect(),
            bindings: None,
        }
    }
}

/// An AsyncAPI 3.0 document.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct V3Document {
    pub asyncapi: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub id: Option<String>,
    pub info: Info,
    #[serde(skip_serializing_if = "BTreeMap::is_empty")]
    pub servers: BTreeMap<String, V3Server>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub default_content_type: Option<String>,
    pub channels: BTreeMap<String, V3Channel>,
    #[serde(skip_serializing_if = "BTreeMap::is_empty")]
    pub operations: BTreeMap<String, V3Operation>,
    #[serde(skip_serializing_if = "Components::is_empty")]
    pub components: Components,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_operation_references() {
        let op = V3Operation::new(Action::Send, "orders", &["Message"]);
        let json = serde_json::to_value(&op).unwrap();

        assert_eq!(json["action"], "send");
        assert_eq!(json["channel"]["$ref"], "#/channels/orders");
        assert_eq!(
            json["messages"][0]["$ref"],
            "#/channels/orders/messages/Message"
        );
    }
}
