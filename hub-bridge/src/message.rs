/********************************************************************************
 * Copyright (c) 2024 Contributors to the Eclipse Foundation
 *
 * See the NOTICE file(s) distributed with this work for additional
 * information regarding copyright ownership.
 *
 * This program and the accompanying materials are made available under the
 * terms of the Apache License Version 2.0 which is available at
 * https://www.apache.org/licenses/LICENSE-2.0
 *
 * SPDX-License-Identifier: Apache-2.0
 ********************************************************************************/

//! One value-change notification as it travels through the pipeline.

use serde_json::{Map, Value};

/// A single shaped notification, immutable once enqueued.
///
/// Fields are `Option`s: a `None` field is omitted from the emitted hub
/// message entirely. Shaping ([`crate::telemetry::EndpointTelemetry::shape`])
/// runs exactly once, on the notification-delivery path, before the value
/// reaches the queue.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct MessageData {
    /// URL of the owning endpoint, used to route the message to its
    /// endpoint's resolved telemetry settings. Never serialized; the
    /// publishable copy lives in `endpoint_url`.
    pub owner_endpoint: String,
    /// URL of the endpoint the notification originated from.
    pub endpoint_url: Option<String>,
    /// Node identifier in the form it was configured (may be the
    /// namespace-URI form).
    pub node_id: Option<String>,
    /// Canonical namespace-index form of the node identifier.
    pub expanded_node_id: Option<String>,
    pub application_uri: Option<String>,
    pub display_name: Option<String>,
    /// Value encoded as a string; `preserve_value_quotes` controls whether
    /// it is re-emitted as a JSON string or as raw JSON.
    pub value: Option<String>,
    /// Source timestamp, ISO 8601 formatted.
    pub source_timestamp: Option<String>,
    pub status_code: Option<u32>,
    pub status: Option<String>,
    /// True when the source value was string-typed and must keep its
    /// quoting when serialized.
    pub preserve_value_quotes: bool,
}

impl MessageData {
    pub fn new() -> Self {
        Self {
            owner_endpoint: String::new(),
            endpoint_url: None,
            node_id: None,
            expanded_node_id: None,
            application_uri: None,
            display_name: None,
            value: None,
            source_timestamp: None,
            status_code: None,
            status: None,
            preserve_value_quotes: false,
        }
    }

    /// Serializes to one JSON object using the resolved output key names.
    ///
    /// `None` fields are omitted. A non-string-typed value that parses as
    /// JSON is embedded raw so numbers and booleans keep their type on the
    /// wire; anything else falls back to a quoted string.
    pub fn to_json(&self, names: &FieldNames) -> String {
        let mut object = Map::new();

        if let Some(endpoint_url) = &self.endpoint_url {
            object.insert(
                names.endpoint_url.clone(),
                Value::String(endpoint_url.clone()),
            );
        }
        if let Some(node_id) = &self.node_id {
            object.insert(names.node_id.clone(), Value::String(node_id.clone()));
        }
        if let Some(expanded_node_id) = &self.expanded_node_id {
            object.insert(
                names.expanded_node_id.clone(),
                Value::String(expanded_node_id.clone()),
            );
        }
        if let Some(application_uri) = &self.application_uri {
            object.insert(
                names.application_uri.clone(),
                Value::String(application_uri.clone()),
            );
        }
        if let Some(display_name) = &self.display_name {
            object.insert(
                names.display_name.clone(),
                Value::String(display_name.clone()),
            );
        }
        if let Some(value) = &self.value {
            object.insert(names.value.clone(), self.encode_value(value));
        }
        if let Some(source_timestamp) = &self.source_timestamp {
            object.insert(
                names.source_timestamp.clone(),
                Value::String(source_timestamp.clone()),
            );
        }
        if let Some(status_code) = self.status_code {
            object.insert(names.status_code.clone(), Value::from(status_code));
        }
        if let Some(status) = &self.status {
            object.insert(names.status.clone(), Value::String(status.clone()));
        }

        Value::Object(object).to_string()
    }

    fn encode_value(&self, value: &str) -> Value {
        if self.preserve_value_quotes {
            return Value::String(value.to_string());
        }
        serde_json::from_str(value).unwrap_or_else(|_| Value::String(value.to_string()))
    }
}

impl Default for MessageData {
    fn default() -> Self {
        Self::new()
    }
}

/// Resolved output key names for one endpoint, materialized at
/// configuration-load time from name overrides and defaults.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct FieldNames {
    pub endpoint_url: String,
    pub node_id: String,
    pub expanded_node_id: String,
    pub application_uri: String,
    pub display_name: String,
    pub value: String,
    pub source_timestamp: String,
    pub status_code: String,
    pub status: String,
}

impl Default for FieldNames {
    fn default() -> Self {
        Self {
            endpoint_url: "EndpointUrl".to_string(),
            node_id: "NodeId".to_string(),
            expanded_node_id: "ExpandedNodeId".to_string(),
            application_uri: "ApplicationUri".to_string(),
            display_name: "DisplayName".to_string(),
            value: "Value".to_string(),
            source_timestamp: "SourceTimestamp".to_string(),
            status_code: "StatusCode".to_string(),
            status: "Status".to_string(),
        }
    }
}
