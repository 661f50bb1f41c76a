// Copyright (c) 2025, The Ruskit Authors
// MIT License
// All rights reserved.

//! AsyncAPI 2.6 document model, plus the pieces shared with 3.0 documents
//! (info, messages, security schemes and components).

use super::{
    bindings::{ChannelBindings, OperationBindings},
    schema::SchemaNode,
    v3::V3Document,
};
use serde::{ser::SerializeMap, Serialize, Serializer};
use std::collections::BTreeMap;

pub const ASYNCAPI_V2_VERSION: &str = "2.6.0";

/// Metadata about the API, shared by both document versions.
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct Info {
    pub title: String,
    pub version: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub terms_of_service: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub contact: Option<Contact>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub license: Option<License>,
}

impl Info {
    /// Creates the metadata of an API.
    ///
    /// # Parameters
    ///
    /// * `title` - name of the API, also used to name exported files
    /// * `version` - version of the API itself, not of AsyncAPI
    pub fn new(title: &str, version: &str) -> Info {
        Info {
            title: title.to_owned(),
            version: version.to_owned(),
            ..Default::default()
        }
    }

    pub fn description(mut self, description: &str) -> Self {
        self.description = Some(description.to_owned());
        self
    }
}

#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct Contact {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub name: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub url: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub email: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct License {
    pub name: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub url: Option<String>,
}

/// A `$ref` to another part of the document.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Reference {
    #[serde(rename = "$ref")]
    pub reference: String,
}

impl Reference {
    /// Builds a local reference from path segments, escaping each one as a
    /// JSON pointer token.
    pub fn local(segments: &[&str]) -> Reference {
        let path: Vec<String> = segments
            .iter()
            .map(|s| s.replace('~', "~0").replace('/', "~1"))
            .collect();

        Reference {
            reference: format!("#/{}", path.join("/")),
        }
    }
}

/// Where the correlation id of a message lives.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct CorrelationId {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
    /// Runtime expression, e.g. `$message.header#/correlationId`
    pub location: String,
}

/// A sample message; `payload` must satisfy the message's payload schema.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct MessageExample {
    pub name: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub summary: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub headers: Option<serde_json::Value>,
    pub payload: serde_json::Value,
}

/// A message definition.
///
/// In 3.0 documents `name` is also the key of the message under its channel,
/// so operations can reference it.
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct Message {
    pub name: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub title: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub summary: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
    pub content_type: String,
    pub payload: SchemaNode,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub headers: Option<SchemaNode>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub correlation_id: Option<CorrelationId>,
    #[serde(skip_serializing_if = "Vec::is_empty")]
    pub examples: Vec<MessageExample>,
}

/// The `type` of a security scheme.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub enum SecuritySchemeType {
    UserPassword,
    ApiKey,
    #[serde(rename = "X509")]
    X509,
    SymmetricEncryption,
    AsymmetricEncryption,
    HttpApiKey,
    Http,
    #[serde(rename = "oauth2")]
    OAuth2,
    OpenIdConnect,
    Plain,
    ScramSha256,
    ScramSha512,
    Gssapi,
}

/// One OAuth2 flow.
///
/// `scopes` serializes as `scopes`; 3.0 exports rename it to
/// `availableScopes` after serialization.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct OAuthFlow {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub authorization_url: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub token_url: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub refresh_url: Option<String>,
    pub scopes: BTreeMap<String, String>,
}

impl OAuthFlow {
    /// Adds a scope, replacing the description of an existing one.
    pub fn scope(mut self, name: &str, description: &str) -> Self {
        self.scopes.insert(name.to_owned(), description.to_owned());
        self
    }
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct OAuthFlows {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub implicit: Option<OAuthFlow>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub password: Option<OAuthFlow>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub client_credentials: Option<OAuthFlow>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub authorization_code: Option<OAuthFlow>,
}

/// A security scheme. Which optional fields apply depends on `kind`:
/// `flows` for OAuth2, `name` and `location` for API keys, `scheme` and
/// `bearer_format` for HTTP.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct SecurityScheme {
    #[serde(rename = "type")]
    pub kind: SecuritySchemeType,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub name: Option<String>,
    /// `user`, `password`, `query`, `header` or `cookie`
    #[serde(rename = "in", skip_serializing_if = "Option::is_none")]
    pub location: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub scheme: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub bearer_format: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub flows: Option<OAuthFlows>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub open_id_connect_url: Option<String>,
}

impl SecurityScheme {
    /// A scheme of `kind` with every optional field unset.
    pub fn new(kind: SecuritySchemeType) -> SecurityScheme {
        SecurityScheme {
            kind,
            description: None,
            name: None,
            location: None,
            scheme: None,
            bearer_format: None,
            flows: None,
            open_id_connect_url: None,
        }
    }

    pub fn user_password() -> SecurityScheme {
        SecurityScheme::new(SecuritySchemeType::UserPassword)
    }

    /// An OAuth2 scheme.
    ///
    /// # Parameters
    ///
    /// * `flows` - the supported flows, at least one should be set
    ///
    /// # Returns
    ///
    /// A scheme of type `oauth2`.
    pub fn oauth2(flows: OAuthFlows) -> SecurityScheme {
        SecurityScheme {
            flows: Some(flows),
            ..SecurityScheme::new(SecuritySchemeType::OAuth2)
        }
    }

    pub fn description(mut self, description: &str) -> Self {
        self.description = Some(description.to_owned());
        self
    }
}

/// Reusable definitions referenced from channels and operations.
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct Components {
    #[serde(skip_serializing_if = "BTreeMap::is_empty")]
    pub schemas: BTreeMap<String, SchemaNode>,
    #[serde(skip_serializing_if = "BTreeMap::is_empty")]
    pub messages: BTreeMap<String, Message>,
    #[serde(skip_serializing_if = "BTreeMap::is_empty")]
    pub security_schemes: BTreeMap<String, SecurityScheme>,
    #[serde(skip_serializing_if = "BTreeMap::is_empty")]
    pub channel_bindings: BTreeMap<String, ChannelBindings>,
    #[serde(skip_serializing_if = "BTreeMap::is_empty")]
    pub operation_bindings: BTreeMap<String, OperationBindings>,
}

impl Components {
    /// True when nothing was registered; empty components are not written.
    pub fn is_empty(&self) -> bool {
        self.schemas.is_empty()
            && self.messages.is_empty()
            && self.security_schemes.is_empty()
            && self.channel_bindings.is_empty()
            && self.operation_bindings.is_empty()
    }
}

/// Security scheme name to the scopes it requires; empty for non-OAuth
/// schemes.
pub type SecurityRequirement = BTreeMap<String, Vec<String>>;

/// A 2.6 server.
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct Server {
    /// `scheme://host[:port]`
    pub url: String,
    pub protocol: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub protocol_version: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
    #[serde(skip_serializing_if = "Vec::is_empty")]
    pub security: Vec<SecurityRequirement>,
}

/// A single message is written as is, several as `oneOf`.
fn serialize_messages<S: Serializer>(
    messages: &[Message],
    serializer: S,
) -> Result<S::Ok, S::Error> {
    match messages {
        [single] => single.serialize(serializer),
        many => {
            let mut map = serializer.serialize_map(Some(1))?;
            map.serialize_entry("oneOf", many)?;
            map.end()
        }
    }
}

/// A 2.6 `publish` or `subscribe` operation.
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct Operation {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub operation_id: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub summary: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
    #[serde(
        rename = "message",
        serialize_with = "serialize_messages",
        skip_serializing_if = "Vec::is_empty"
    )]
    pub messages: Vec<Message>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub bindings: Option<OperationBindings>,
}

/// A 2.6 channel. `publish` holds what clients send to it, `subscribe` what
/// they receive from it.
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct Channel {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub subscribe: Option<Operation>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub publish: Option<Operation>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub bindings: Option<ChannelBindings>,
}

/// An AsyncAPI 2.6 document.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct AsyncApiDocument {
    pub asyncapi: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub id: Option<String>,
    pub info: Info,
    #[serde(skip_serializing_if = "BTreeMap::is_empty")]
    pub servers: BTreeMap<String, Server>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub default_content_type: Option<String>,
    pub channels: BTreeMap<String, Channel>,
    #[serde(skip_serializing_if = "Components::is_empty")]
    pub components: Components,
}

/// A document of either major version.
#[derive(Debug, Clone, PartialEq)]
pub enum Document {
    V2(AsyncApiDocument),
    V3(V3Document),
}

impl Document {
    /// Metadata of the document, whatever its version.
    pub fn info(&self) -> &Info {
        match self {
            Document::V2(doc) => &doc.info,
            Document::V3(doc) => &doc.info,
        }
    }

    pub fn is_v3(&self) -> bool {
        matches!(self, Document::V3(_))
    }
}

impl From<AsyncApiDocument> for Document {
    fn from(doc: AsyncApiDocument) -> Self {
        Document::V2(doc)
    }
}

impl From<V3Document> for Document {
    fn from(doc: V3Document) -> Self {
        Document::V3(doc)
    }
}
