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

//! Notification-to-hub flow through a fully assembled bridge: simulated
//! source in, recorded batches out.

mod support;

use hub_bridge::telemetry::{EndpointTelemetrySpec, FieldSpec, PublishFlag, TelemetrySpec};
use hub_bridge::BridgeSettings;
use std::time::Duration;
use support::{node, start_bridge, start_bridge_with_telemetry, ENDPOINT};

fn fast_settings() -> BridgeSettings {
    BridgeSettings {
        send_interval: Duration::from_secs(5),
        ..BridgeSettings::default()
    }
}

#[tokio::test(start_paused = true)]
async fn notifications_flow_into_one_json_batch() {
    let harness = start_bridge(fast_settings());
    harness
        .bridge
        .publish_nodes(ENDPOINT, None, vec![node("ns=2;i=1"), node("ns=2;i=2")])
        .await
        .expect("publish succeeds");

    assert_eq!(harness.source.emit_value("ns=2;i=1", "41"), 1);
    assert_eq!(harness.source.emit_value("ns=2;i=2", "42"), 1);

    tokio::time::sleep(Duration::from_secs(6)).await;

    let batches = harness.hub.batches();
    assert_eq!(batches.len(), 1);
    let parsed: serde_json::Value =
        serde_json::from_str(&batches[0]).expect("batch parses as JSON");
    let items = parsed.as_array().expect("batch is a JSON array");
    assert_eq!(items.len(), 2);
    assert_eq!(items[0]["Value"], 41);
    assert_eq!(items[1]["Value"], 42);
    // default publish flags keep the endpoint URL off the wire
    assert!(items[0].get("EndpointUrl").is_none());
    assert!(items[0].get("NodeId").is_some());

    let info = harness.bridge.diagnostic_info();
    assert_eq!(info.sent_messages, 1);
    assert_eq!(info.enqueue_count, 2);
    assert_eq!(info.dequeued_items, 2);

    harness.bridge.shutdown().await;
}

#[tokio::test(start_paused = true)]
async fn telemetry_patterns_shape_the_emitted_fields() {
    let mut telemetry = TelemetrySpec::default();
    telemetry.endpoints.insert(
        ENDPOINT.to_string(),
        EndpointTelemetrySpec {
            display_name: FieldSpec {
                pattern: Some(r"^Line1\.(.*)$".to_string()),
                ..FieldSpec::default()
            },
            application_uri: FieldSpec {
                publish: PublishFlag::Off,
                ..FieldSpec::default()
            },
            value: FieldSpec {
                name: Some("val".to_string()),
                ..FieldSpec::default()
            },
            ..EndpointTelemetrySpec::default()
        },
    );

    let harness = start_bridge_with_telemetry(fast_settings(), &telemetry);
    let spec = hub_bridge::source::NodeSpec {
        display_name: Some("Line1.Pressure".to_string()),
        ..node("ns=2;i=7")
    };
    harness
        .bridge
        .publish_nodes(ENDPOINT, None, vec![spec])
        .await
        .expect("publish succeeds");

    harness.source.emit_value("ns=2;i=7", "9.5");
    tokio::time::sleep(Duration::from_secs(6)).await;

    let batches = harness.hub.batches();
    assert_eq!(batches.len(), 1);
    let parsed: serde_json::Value =
        serde_json::from_str(&batches[0]).expect("batch parses as JSON");
    let item = &parsed.as_array().expect("array")[0];
    assert_eq!(item["DisplayName"], "Pressure");
    assert_eq!(item["val"], 9.5);
    assert!(item.get("ApplicationUri").is_none());
    assert!(item.get("Value").is_none());

    harness.bridge.shutdown().await;
}

#[tokio::test(start_paused = true)]
async fn batches_are_split_at_the_byte_cap() {
    // one emitted item runs 125-150 bytes, so a 200-byte cap admits
    // exactly one per batch
    let harness = start_bridge(BridgeSettings {
        send_interval: Duration::from_secs(5),
        max_message_bytes: 200,
        ..BridgeSettings::default()
    });
    harness
        .bridge
        .publish_nodes(ENDPOINT, None, vec![node("i=1")])
        .await
        .expect("publish succeeds");

    for value in ["1", "2", "3"] {
        harness.source.emit_value("i=1", value);
    }

    tokio::time::sleep(Duration::from_secs(16)).await;

    let batches = harness.hub.batches();
    assert_eq!(batches.len(), 3, "one item per 200-byte batch");
    for batch in &batches {
        assert!(batch.len() <= 200);
        let parsed: serde_json::Value =
            serde_json::from_str(batch).expect("batch parses as JSON");
        assert!(parsed.is_array());
    }
    let total_items: usize = batches
        .iter()
        .map(|batch| {
            serde_json::from_str::<serde_json::Value>(batch)
                .expect("batch parses as JSON")
                .as_array()
                .expect("array")
                .len()
        })
        .sum();
    assert_eq!(total_items, 3);

    harness.bridge.shutdown().await;
}

#[tokio::test(start_paused = true)]
async fn failed_sends_are_counted_and_do_not_stall_the_pipeline() {
    let harness = start_bridge(fast_settings());
    harness
        .bridge
        .publish_nodes(ENDPOINT, None, vec![node("i=1")])
        .await
        .expect("publish succeeds");

    harness.hub.set_failing(true);
    harness.source.emit_value("i=1", "1");
    tokio::time::sleep(Duration::from_secs(6)).await;
    assert_eq!(harness.hub.batch_count(), 0);
    assert_eq!(harness.bridge.diagnostic_info().failed_messages, 1);

    // transport recovers; later notifications still flow
    harness.hub.set_failing(false);
    harness.source.emit_value("i=1", "2");
    tokio::time::sleep(Duration::from_secs(6)).await;
    assert_eq!(harness.hub.batch_count(), 1);

    harness.bridge.shutdown().await;
}

#[tokio::test(start_paused = true)]
async fn shutdown_closes_the_queue_to_new_notifications() {
    let harness = start_bridge(fast_settings());
    harness
        .bridge
        .publish_nodes(ENDPOINT, None, vec![node("i=1")])
        .await
        .expect("publish succeeds");

    harness.bridge.shutdown().await;

    // the simulated item was deleted during teardown; nothing listens
    assert_eq!(harness.source.emit_value("i=1", "1"), 0);
    assert_eq!(harness.source.active_item_count(), 0);
}

#[tokio::test(start_paused = true)]
async fn reporter_writes_into_the_diagnostic_log() {
    let harness = start_bridge(BridgeSettings {
        send_interval: Duration::from_secs(3600),
        diagnostics_interval: Some(Duration::from_secs(30)),
        ..BridgeSettings::default()
    });
    harness.bridge.complete_startup();

    tokio::time::sleep(Duration::from_secs(31)).await;

    let snapshot = harness.bridge.diagnostic_log();
    assert!(snapshot.log_message_count > 0);
    assert!(snapshot
        .log
        .iter()
        .any(|line| line.contains("MonitoredItems")));

    harness.bridge.shutdown().await;
}
