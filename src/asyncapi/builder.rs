// Copyright (c) 2025, The Ruskit Authors
// MIT License
// All rights reserved.

//! # Document Registration
//!
//! [`AsyncApiBuilder`] collects servers, channels and their operations,
//! security schemes, schemas and binding components through plain function
//! calls, then renders them as a 2.6 or a 3.0 document. Both renderings come
//! from the same registrations:
//!
//! - in 2.6, a `send` operation becomes the channel's `publish` and a
//!   `receive` operation its `subscribe`;
//! - in 3.0, operations are top-level, keyed by id, and reference their
//!   channel and messages.

use super::{
    bindings::{ChannelBindings, OperationBindings},
    model::{
        AsyncApiDocument, Channel, Components, Info, Message, Operation, Reference,
        SecurityScheme, Server, ASYNCAPI_V2_VERSION,
    },
    schema::SchemaNode,
    v3::{Action, V3Channel, V3Document, V3Operation, V3Server, ASYNCAPI_V3_VERSION},
};
use std::collections::BTreeMap;
use tracing::warn;

#[derive(Debug, Clone, PartialEq)]
pub struct ServerEntry {
    pub host: String,
    pub protocol: String,
    /// Scheme of the 2.6 `url`; the protocol when unset
    pub scheme: Option<String>,
    pub protocol_version: Option<String>,
    /// Only rendered in 3.0 documents
    pub pathname: Option<String>,
    pub description: Option<String>,
    /// Names of the security schemes guarding the server
    pub security: Vec<String>,
}

impl ServerEntry {
    pub fn new(host: &str, protocol: &str) -> ServerEntry {
        ServerEntry {
            host: host.to_owned(),
            protocol: protocol.to_owned(),
            scheme: None,
            protocol_version: None,
            pathname: None,
            description: None,
            security: vec![],
        }
    }

    pub fn scheme(mut self, scheme: &str) -> Self {
        self.scheme = Some(scheme.to_owned());
        self
    }

    pub fn protocol_version(mut self, version: &str) -> Self {
        self.protocol_version = Some(version.to_owned());
        self
    }

    pub fn pathname(mut self, pathname: &str) -> Self {
        self.pathname = Some(pathname.to_owned());
        self
    }

    pub fn description(mut self, description: &str) -> Self {
        self.description = Some(description.to_owned());
        self
    }

    pub fn security(mut self, scheme_name: &str) -> Self {
        self.security.push(scheme_name.to_owned());
        self
    }

    fn url(&self) -> String {
        let scheme = self.scheme.as_deref().unwrap_or(&self.protocol);
        format!("{}://{}", scheme, self.host)
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct OperationEntry {
    pub id: String,
    pub action: Action,
    pub summary: Option<String>,
    pub description: Option<String>,
    pub messages: Vec<Message>,
    pub bindings: Option<OperationBindings>,
}

impl OperationEntry {
    pub fn new(id: &str, action: Action) -> OperationEntry {
        OperationEntry {
            id: id.to_owned(),
            action,
            summary: None,
            description: None,
            messages: vec![],
            bindings: None,
        }
    }

    pub fn summary(mut self, summary: &str) -> Self {
        self.summary = Some(summary.to_owned());
        self
    }

    pub fn description(mut self, description: &str) -> Self {
        self.description = Some(description.to_owned());
        self
    }

    pub fn message(mut self, message: Message) -> Self {
        self.messages.push(message);
        self
    }

    pub fn bindings(mut self, bindings: OperationBindings) -> Self {
        self.bindings = Some(bindings);
        self
    }
}

#[derive(Debug, Clone, Default, PartialEq)]
pub struct ChannelEntry {
    /// Address in 3.0 documents; the channel name when unset
    pub address: Option<String>,
    pub description: Option<String>,
    pub bindings: Option<ChannelBindings>,
    pub operations: Vec<OperationEntry>,
}

impl ChannelEntry {
    pub fn new() -> ChannelEntry {
        ChannelEntry::default()
    }

    pub fn address(mut self, address: &str) -> Self {
        self.address = Some(address.to_owned());
        self
    }

    pub fn description(mut self, description: &str) -> Self {
        self.description = Some(description.to_owned());
        self
    }

    pub fn bindings(mut self, bindings: ChannelBindings) -> Self {
        self.bindings = Some(bindings);
        self
    }

    pub fn operation(mut self, operation: OperationEntry) -> Self {
        self.operations.push(operation);
        self
    }
}

/// Registers document parts and renders them as 2.6 or 3.0 documents.
#[derive(Debug, Clone)]
pub struct AsyncApiBuilder {
    id: Option<String>,
    info: Info,
    default_content_type: Option<String>,
    servers: BTreeMap<String, ServerEntry>,
    channels: BTreeMap<String, ChannelEntry>,
    components: Components,
}

impl AsyncApiBuilder {
    pub fn new(info: Info) -> AsyncApiBuilder {
        AsyncApiBuilder {
            id: None,
            info,
            default_content_type: None,
            servers: BTreeMap::new(),
            channels: BTreeMap::new(),
            components: Components::default(),
        }
    }

    pub fn id(mut self, id: &str) -> Self {
        self.id = Some(id.to_owned());
        self
    }

    pub fn default_content_type(mut self, content_type: &str) -> Self {
        self.default_content_type = Some(content_type.to_owned());
        self
    }

    /// Registers a server, replacing any previous one with the same name.
    pub fn server(mut self, name: &str, server: ServerEntry) -> Self {
        self.servers.insert(name.to_owned(), server);
        self
    }

    /// Registers a channel, replacing any previous one with the same name.
    pub fn channel(mut self, name: &str, channel: ChannelEntry) -> Self {
        self.channels.insert(name.to_owned(), channel);
        self
    }

    pub fn security_scheme(mut self, name: &str, scheme: SecurityScheme) -> Self {
        self.components
            .security_schemes
            .insert(name.to_owned(), scheme);
        self
    }

    pub fn schema(mut self, name: &str, schema: SchemaNode) -> Self {
        self.components.schemas.insert(name.to_owned(), schema);
        self
    }

    pub fn message_component(mut self, name: &str, message: Message) -> Self {
        self.components.messages.insert(name.to_owned(), message);
        self
    }

    pub fn channel_binding_component(mut self, name: &str, bindings: ChannelBindings) -> Self {
        self.components
            .channel_bindings
            .insert(name.to_owned(), bindings);
        self
    }

    pub fn operation_binding_component(mut self, name: &str, bindings: OperationBindings) -> Self {
        self.components
            .operation_bindings
            .insert(name.to_owned(), bindings);
        self
    }

    /// Renders a 2.6 document. A channel keeps the first operation of each
    /// action; later ones are dropped with a warning.
    pub fn build_v2(&self) -> AsyncApiDocument {
        let servers = self
            .servers
            .iter()
            .map(|(name, s)| {
                let server = Server {
                    url: s.url(),
                    protocol: s.protocol.clone(),
                    protocol_version: s.protocol_version.clone(),
                    description: s.description.clone(),
                    security: s
                        .security
                        .iter()
                        .map(|scheme| BTreeMap::from([(scheme.clone(), vec![])]))
                        .collect(),
                };
                (name.clone(), server)
            })
            .collect();

        let channels = self
            .channels
            .iter()
            .map(|(name, entry)| {
                let mut channel = Channel {
                    description: entry.description.clone(),
                    bindings: entry.bindings.clone(),
                    ..Default::default()
                };

                for op in &entry.operations {
                    let slot = match op.action {
                        Action::Send => &mut channel.publish,
                        Action::Receive => &mut channel.subscribe,
                    };
                    if slot.is_some() {
                        warn!(
                            channel = name,
                            operation = op.id,
                            "channel already has this action, operation dropped"
                        );
                        continue;
                    }
                    *slot = Some(Operation {
                        operation_id: Some(op.id.clone()),
                        summary: op.summary.clone(),
                        description: op.description.clone(),
                        messages: op.messages.clone(),
                        bindings: op.bindings.clone(),
                    });
                }

                (name.clone(), channel)
            })
            .collect();

        AsyncApiDocument {
            asyncapi: ASYNCAPI_V2_VERSION.to_owned(),
            id: self.id.clone(),
            info: self.info.clone(),
            servers,
            default_content_type: self.default_content_type.clone(),
            channels,
            components: self.components.clone(),
        }
    }

    /// Renders a 3.0 document.
    pub fn build_v3(&self) -> V3Document {
        let scheme_ref =
            |name: &String| Reference::local(&["components", "securitySchemes", name.as_str()]);

        let servers = self
            .servers
            .iter()
            .map(|(name, s)| {
                let server = V3Server {
                    host: s.host.clone(),
                    protocol: s.protocol.clone(),
                    protocol_version: s.protocol_version.clone(),
                    pathname: s.pathname.clone(),
                    description: s.description.clone(),
                    security: s.security.iter().map(scheme_ref).collect(),
                };
                (name.clone(), server)
            })
            .collect();

        let mut channels = BTreeMap::new();
        let mut operations = BTreeMap::new();

        for (name, entry) in &self.channels {
            let mut messages = BTreeMap::new();

            for op in &entry.operations {
                let ids: Vec<&str> = op.messages.iter().map(|m| m.name.as_str()).collect();
                for message in &op.messages {
                    messages.insert(message.name.clone(), message.clone());
                }

                let mut operation = V3Operation::new(op.action, name, &ids);
                operation.summary = op.summary.clone();
                operation.description = op.description.clone();
                operation.bindings = op.bindings.clone();
                operations.insert(op.id.clone(), operation);
            }

            channels.insert(
                name.clone(),
                V3Channel {
                    address: entry.address.clone().or_else(|| Some(name.clone())),
                    description: entry.description.clone(),
                    messages,
                    bindings: entry.bindings.clone(),
                },
            );
        }

        V3Document {
            asyncapi: ASYNCAPI_V3_VERSION.to_owned(),
            id: self.id.clone(),
            info: self.info.clone(),
            servers,
            default_content_type: self.default_content_type.clone(),
            channels,
            operations,
            components: self.components.clone(),
        }
    }
}
