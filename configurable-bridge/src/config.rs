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

use hub_bridge::source::{EndpointCredentials, NodeSpec};
use hub_bridge::telemetry::TelemetrySpec;
use hub_bridge::BridgeSettings;
use serde::Deserialize;
use std::time::Duration;

#[derive(Deserialize, Debug, Clone)]
#[serde(deny_unknown_fields)]
pub struct Config {
    pub(crate) pipeline: PipelineConfig,
    #[serde(default)]
    pub(crate) telemetry: TelemetrySpec,
    pub(crate) endpoints: Vec<EndpointConfig>,
}

#[derive(Deserialize, Debug, Clone)]
#[serde(deny_unknown_fields)]
pub struct PipelineConfig {
    #[serde(default = "default_queue_capacity")]
    pub(crate) queue_capacity: usize,
    #[serde(default = "default_send_interval_seconds")]
    pub(crate) send_interval_seconds: u64,
    #[serde(default = "default_max_message_bytes")]
    pub(crate) max_message_bytes: usize,
    /// Zero disables the periodic diagnostics report.
    #[serde(default)]
    pub(crate) diagnostics_interval_seconds: u64,
}

#[derive(Deserialize, Debug, Clone)]
#[serde(deny_unknown_fields)]
pub struct EndpointConfig {
    pub(crate) url: String,
    #[serde(default)]
    pub(crate) credentials: Option<EndpointCredentials>,
    pub(crate) nodes: Vec<NodeSpec>,
    /// Interval at which the simulated source emits a value per node.
    #[serde(default = "default_simulation_interval_ms")]
    pub(crate) simulation_interval_ms: u64,
}

impl Config {
    pub(crate) fn settings(&self) -> BridgeSettings {
        let diagnostics_interval = (self.pipeline.diagnostics_interval_seconds > 0)
            .then(|| Duration::from_secs(self.pipeline.diagnostics_interval_seconds));
        BridgeSettings {
            queue_capacity: self.pipeline.queue_capacity,
            send_interval: Duration::from_secs(self.pipeline.send_interval_seconds),
            max_message_bytes: self.pipeline.max_message_bytes,
            diagnostics_interval,
            ..BridgeSettings::default()
        }
    }
}

fn default_queue_capacity() -> usize {
    8192
}

fn default_send_interval_seconds() -> u64 {
    10
}

fn default_max_message_bytes() -> usize {
    262_144
}

fn default_simulation_interval_ms() -> u64 {
    1000
}
