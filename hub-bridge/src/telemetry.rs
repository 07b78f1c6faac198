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

//! Per-endpoint telemetry shaping: publish flags, output names, and regex
//! extraction patterns.
//!
//! Configuration is merged exactly once, at load time: every setting an
//! endpoint leaves as `inherit` is replaced by the corresponding default,
//! and patterns are compiled. The hot path only ever touches fully
//! resolved settings.

use crate::error::ConfigError;
use crate::message::{FieldNames, MessageData};
use regex::Regex;
use serde::Deserialize;
use std::collections::HashMap;

/// Tri-state publish effect for one telemetry field.
#[derive(Clone, Copy, Debug, Default, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum PublishFlag {
    /// Take the default-level setting at load time.
    #[default]
    Inherit,
    On,
    Off,
}

impl PublishFlag {
    fn resolve(self, default: bool) -> bool {
        match self {
            PublishFlag::Inherit => default,
            PublishFlag::On => true,
            PublishFlag::Off => false,
        }
    }
}

/// Unresolved settings for one telemetry field, as configured.
#[derive(Clone, Debug, Default, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct FieldSpec {
    #[serde(default)]
    pub publish: PublishFlag,
    /// Output key override; empty or absent means inherit.
    #[serde(default)]
    pub name: Option<String>,
    /// Extraction regex; empty or absent means pass-through.
    #[serde(default)]
    pub pattern: Option<String>,
}

/// Unresolved per-endpoint telemetry settings.
#[derive(Clone, Debug, Default, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct EndpointTelemetrySpec {
    #[serde(default)]
    pub endpoint_url: FieldSpec,
    #[serde(default)]
    pub node_id: FieldSpec,
    #[serde(default)]
    pub expanded_node_id: FieldSpec,
    #[serde(default)]
    pub application_uri: FieldSpec,
    #[serde(default)]
    pub display_name: FieldSpec,
    #[serde(default)]
    pub value: FieldSpec,
    #[serde(default)]
    pub source_timestamp: FieldSpec,
    #[serde(default)]
    pub status_code: FieldSpec,
    #[serde(default)]
    pub status: FieldSpec,
}

/// Unresolved telemetry configuration: process-wide defaults plus
/// per-endpoint overrides keyed by endpoint URL.
#[derive(Clone, Debug, Default, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct TelemetrySpec {
    #[serde(default)]
    pub defaults: EndpointTelemetrySpec,
    #[serde(default)]
    pub endpoints: HashMap<String, EndpointTelemetrySpec>,
}

/// Fully resolved settings for one telemetry field.
#[derive(Clone, Debug)]
pub struct FieldSettings {
    publish: bool,
    name: String,
    pattern: Option<Regex>,
}

impl FieldSettings {
    fn resolve(
        spec: &FieldSpec,
        field: &str,
        default_publish: bool,
        default_name: &str,
    ) -> Result<Self, ConfigError> {
        let pattern = match spec.pattern.as_deref() {
            None | Some("") => None,
            Some(raw) => Some(Regex::new(raw).map_err(|source| ConfigError::InvalidPattern {
                field: field.to_string(),
                pattern: raw.to_string(),
                source,
            })?),
        };

        let name = match spec.name.as_deref() {
            None | Some("") => default_name.to_string(),
            Some(name) => name.to_string(),
        };

        Ok(Self {
            publish: spec.publish.resolve(default_publish),
            name,
            pattern,
        })
    }

    pub fn publish(&self) -> bool {
        self.publish
    }

    /// Applies the extraction pattern to `input`.
    ///
    /// Extraction semantics, not filtering: with capture groups the result
    /// is the concatenation of the captured substrings in order; without
    /// groups it is the full match; on no match it is the empty string.
    /// With no pattern configured the input passes through unchanged.
    pub fn pattern_match(&self, input: &str) -> String {
        let Some(pattern) = &self.pattern else {
            return input.to_string();
        };

        let Some(captures) = pattern.captures(input) else {
            return String::new();
        };

        if captures.len() == 1 {
            return captures[0].to_string();
        }

        captures
            .iter()
            .skip(1)
            .flatten()
            .map(|group| group.as_str())
            .collect()
    }

    /// Shapes one optional field in place: clears it when unpublished,
    /// otherwise applies the extraction pattern.
    fn shape_field(&self, field: &mut Option<String>) {
        if !self.publish {
            *field = None;
            return;
        }
        if let Some(value) = field.as_deref() {
            if self.pattern.is_some() {
                *field = Some(self.pattern_match(value));
            }
        }
    }
}

/// Fully resolved telemetry settings for one endpoint.
#[derive(Clone, Debug)]
pub struct EndpointTelemetry {
    pub endpoint_url: FieldSettings,
    pub node_id: FieldSettings,
    pub expanded_node_id: FieldSettings,
    pub application_uri: FieldSettings,
    pub display_name: FieldSettings,
    pub value: FieldSettings,
    pub source_timestamp: FieldSettings,
    pub status_code: FieldSettings,
    pub status: FieldSettings,
    names: FieldNames,
}

impl EndpointTelemetry {
    fn resolve(spec: &EndpointTelemetrySpec) -> Result<Self, ConfigError> {
        let default_names = FieldNames::default();

        // Default publish flags match the original publisher behavior:
        // endpoint URL, status code and status text stay dark unless
        // explicitly switched on.
        let endpoint_url =
            FieldSettings::resolve(&spec.endpoint_url, "endpoint_url", false, &default_names.endpoint_url)?;
        let node_id = FieldSettings::resolve(&spec.node_id, "node_id", true, &default_names.node_id)?;
        let expanded_node_id = FieldSettings::resolve(
            &spec.expanded_node_id,
            "expanded_node_id",
            false,
            &default_names.expanded_node_id,
        )?;
        let application_uri = FieldSettings::resolve(
            &spec.application_uri,
            "application_uri",
            true,
            &default_names.application_uri,
        )?;
        let display_name = FieldSettings::resolve(
            &spec.display_name,
            "display_name",
            true,
            &default_names.display_name,
        )?;
        let value = FieldSettings::resolve(&spec.value, "value", true, &default_names.value)?;
        let source_timestamp = FieldSettings::resolve(
            &spec.source_timestamp,
            "source_timestamp",
            true,
            &default_names.source_timestamp,
        )?;
        let status_code = FieldSettings::resolve(
            &spec.status_code,
            "status_code",
            false,
            &default_names.status_code,
        )?;
        let status = FieldSettings::resolve(&spec.status, "status", false, &default_names.status)?;

        let names = FieldNames {
            endpoint_url: endpoint_url.name.clone(),
            node_id: node_id.name.clone(),
            expanded_node_id: expanded_node_id.name.clone(),
            application_uri: application_uri.name.clone(),
            display_name: display_name.name.clone(),
            value: value.name.clone(),
            source_timestamp: source_timestamp.name.clone(),
            status_code: status_code.name.clone(),
            status: status.name.clone(),
        };

        Ok(Self {
            endpoint_url,
            node_id,
            expanded_node_id,
            application_uri,
            display_name,
            value,
            source_timestamp,
            status_code,
            status,
            names,
        })
    }

    fn merge(endpoint: &EndpointTelemetrySpec, defaults: &EndpointTelemetrySpec) -> EndpointTelemetrySpec {
        EndpointTelemetrySpec {
            endpoint_url: Self::merge_field(&endpoint.endpoint_url, &defaults.endpoint_url),
            node_id: Self::merge_field(&endpoint.node_id, &defaults.node_id),
            expanded_node_id: Self::merge_field(&endpoint.expanded_node_id, &defaults.expanded_node_id),
            application_uri: Self::merge_field(&endpoint.application_uri, &defaults.application_uri),
            display_name: Self::merge_field(&endpoint.display_name, &defaults.display_name),
            value: Self::merge_field(&endpoint.value, &defaults.value),
            source_timestamp: Self::merge_field(&endpoint.source_timestamp, &defaults.source_timestamp),
            status_code: Self::merge_field(&endpoint.status_code, &defaults.status_code),
            status: Self::merge_field(&endpoint.status, &defaults.status),
        }
    }

    fn merge_field(endpoint: &FieldSpec, default: &FieldSpec) -> FieldSpec {
        FieldSpec {
            publish: match endpoint.publish {
                PublishFlag::Inherit => default.publish,
                explicit => explicit,
            },
            name: endpoint.name.clone().or_else(|| default.name.clone()),
            pattern: endpoint.pattern.clone().or_else(|| default.pattern.clone()),
        }
    }

    /// Shapes one message in place: unpublished fields are cleared,
    /// published string fields run through their extraction patterns.
    ///
    /// Must be invoked exactly once per message, before enqueue.
    pub fn shape(&self, message: &mut MessageData) {
        self.endpoint_url.shape_field(&mut message.endpoint_url);
        self.node_id.shape_field(&mut message.node_id);
        self.expanded_node_id.shape_field(&mut message.expanded_node_id);
        self.application_uri.shape_field(&mut message.application_uri);
        self.display_name.shape_field(&mut message.display_name);
        self.value.shape_field(&mut message.value);
        self.source_timestamp.shape_field(&mut message.source_timestamp);
        if !self.status_code.publish {
            message.status_code = None;
        }
        self.status.shape_field(&mut message.status);
    }

    /// Resolved output key names for serialization.
    pub fn field_names(&self) -> &FieldNames {
        &self.names
    }
}

/// Resolved telemetry settings for every configured endpoint, plus the
/// resolved defaults used for endpoints without explicit settings.
#[derive(Clone, Debug)]
pub struct TelemetryRegistry {
    defaults: EndpointTelemetry,
    endpoints: HashMap<String, EndpointTelemetry>,
}

impl TelemetryRegistry {
    /// Materializes the registry from an unresolved spec.
    ///
    /// Fails on the first invalid regex pattern; nothing of a partially
    /// invalid configuration is kept.
    pub fn resolve(spec: &TelemetrySpec) -> Result<Self, ConfigError> {
        let defaults = EndpointTelemetry::resolve(&spec.defaults)?;

        let mut endpoints = HashMap::with_capacity(spec.endpoints.len());
        for (endpoint_url, endpoint_spec) in &spec.endpoints {
            let merged = EndpointTelemetry::merge(endpoint_spec, &spec.defaults);
            endpoints.insert(endpoint_url.clone(), EndpointTelemetry::resolve(&merged)?);
        }

        Ok(Self {
            defaults,
            endpoints,
        })
    }

    pub fn for_endpoint(&self, endpoint_url: &str) -> &EndpointTelemetry {
        self.endpoints.get(endpoint_url).unwrap_or(&self.defaults)
    }
}

impl Default for TelemetryRegistry {
    fn default() -> Self {
        Self::resolve(&TelemetrySpec::default())
            .unwrap_or_else(|_| unreachable!("default spec has no patterns"))
    }
}
