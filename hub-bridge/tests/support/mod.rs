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

use hub_bridge::source::NodeSpec;
use hub_bridge::telemetry::TelemetrySpec;
use hub_bridge::{BridgeSettings, HubBridge};
use integration_test_utils::{RecordingHubTransport, SimulatedSourceClient};
use std::sync::Arc;
use std::time::Duration;

pub(crate) const ENDPOINT: &str = "opc.tcp://plant:4840";

pub(crate) fn node(node_id: &str) -> NodeSpec {
    NodeSpec {
        node_id: node_id.to_string(),
        display_name: None,
        sampling_interval_ms: None,
        publishing_interval_ms: None,
    }
}

pub(crate) struct Harness {
    pub bridge: HubBridge,
    pub source: Arc<SimulatedSourceClient>,
    pub hub: Arc<RecordingHubTransport>,
}

pub(crate) fn start_bridge(settings: BridgeSettings) -> Harness {
    start_bridge_with_telemetry(settings, &TelemetrySpec::default())
}

#[allow(dead_code)]
pub(crate) fn start_bridge_with_telemetry(
    settings: BridgeSettings,
    telemetry: &TelemetrySpec,
) -> Harness {
    let source = Arc::new(SimulatedSourceClient::default());
    let hub = Arc::new(RecordingHubTransport::default());
    let bridge = HubBridge::start(settings, telemetry, source.clone(), hub.clone())
        .expect("bridge starts");
    Harness {
        bridge,
        source,
        hub,
    }
}

/// Settings with a flush interval far in the future, for tests that
/// exercise the control plane without the data path firing.
#[allow(dead_code)]
pub(crate) fn control_plane_settings() -> BridgeSettings {
    BridgeSettings {
        send_interval: Duration::from_secs(3600),
        ..BridgeSettings::default()
    }
}
