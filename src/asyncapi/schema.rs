// Copyright (c) 2025, The Ruskit Authors
// MIT License
// All rights reserved.

//! JSON-schema subset used for message payloads and headers.
//!
//! A [`SchemaNode`] owns its children, so a schema tree is always finite and
//! acyclic.

use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

/// Format hint for RFC 3339 timestamps
pub const DATE_TIME_FORMAT: &str = "date-time";

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum SchemaType {
    Object,
    String,
    Number,
    Integer,
    Boolean,
    Array,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SchemaNode {
    #[serde(rename = "type", skip_serializing_if = "Option::is_none")]
    pub kind: Option<SchemaType>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub format: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
    #[serde(default, skip_serializing_if = "BTreeMap::is_empty")]
    pub properties: BTreeMap<String, SchemaNode>,
    /// Ordered, without duplicates
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub required: Vec<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub items: Option<Box<SchemaNode>>,
}

impl SchemaNode {
    pub fn of(kind: SchemaType) -> SchemaNode {
        SchemaNode {
            kind: Some(kind),
            ..Default::default()
        }
    }

    pub fn object() -> SchemaNode {
        SchemaNode::of(SchemaType::Object)
    }

    pub fn string() -> SchemaNode {
        SchemaNode::of(SchemaType::String)
    }

    pub fn integer() -> SchemaNode {
        SchemaNode::of(SchemaType::Integer)
    }

    pub fn number() -> SchemaNode {
        SchemaNode::of(SchemaType::Number)
    }

    pub fn boolean() -> SchemaNode {
        SchemaNode::of(SchemaType::Boolean)
    }

    pub fn array(items: SchemaNode) -> SchemaNode {
        SchemaNode {
            items: Some(Box::new(items)),
            ..SchemaNode::of(SchemaType::Array)
        }
    }

    /// A string carrying an RFC 3339 timestamp.
    pub fn date_time() -> SchemaNode {
        SchemaNode::string().format(DATE_TIME_FORMAT)
    }

    pub fn format(mut self, format: &str) -> Self {
        self.format = Some(format.to_owned());
        self
    }

    pub fn description(mut self, description: &str) -> Self {
        self.description = Some(description.to_owned());
        self
    }

    /// Adds an optional property.
    pub fn property(mut self, name: &str, schema: SchemaNode) -> Self {
        self.properties.insert(name.to_owned(), schema);
        self
    }

    /// Adds a property and marks it as required.
    pub fn required_property(self, name: &str, schema: SchemaNode) -> Self {
        self.property(name, schema).require(name)
    }

    /// Marks an existing or future property as required.
    pub fn require(mut self, name: &str) -> Self {
        if !self.is_required(name) {
            self.required.push(name.to_owned());
        }
        self
    }

    pub fn is_required(&self, name: &str) -> bool {
        self.required.iter().any(|r| r == name)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_required_has_no_duplicates() {
        let schema = SchemaNode::object()
            .required_property("messageId", SchemaNode::string())
            .require("messageId")
            .required_property("timestamp", SchemaNode::date_time());

        assert_eq!(schema.required, vec!["messageId", "timestamp"]);
        assert!(schema.is_required("timestamp"));
        assert!(!schema.is_required("data"));
    }

    #[test]
    fn test_serialized_shape() {
        let schema = SchemaNode::object()
            .required_property("sentAt", SchemaNode::date_time())
            .property("tags", SchemaNode::array(SchemaNode::string()));

        let yaml = serde_yaml::to_string(&schema).unwrap();

        assert_eq!(
            yaml,
            "type: object\nproperties:\n  sentAt:\n    type: string\n    format: date-time\n  tags:\n    type: array\n    items:\n      type: string\nrequired:\n- sentAt\n"
        );
    }
}
