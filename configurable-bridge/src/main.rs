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

mod config;

use crate::config::Config;
use async_trait::async_trait;
use clap::Parser;
use hub_bridge::error::HubError;
use hub_bridge::hub::HubTransport;
use hub_bridge::HubBridge;
use integration_test_utils::SimulatedSourceClient;
use std::fs::File;
use std::io::Read;
use std::sync::Arc;
use std::time::Duration;
use tracing::{info, warn};

#[derive(Parser)]
#[command()]
struct BridgeArgs {
    #[arg(short, long, value_name = "FILE")]
    config: String,
}

/// Hub transport that prints every batch through the log. Stands in for
/// a real hub client, which is an external collaborator.
struct TracingHubTransport;

#[async_trait]
impl HubTransport for TracingHubTransport {
    async fn send(&self, payload: Vec<u8>) -> Result<(), HubError> {
        info!(
            component = "tracing_hub",
            bytes = payload.len(),
            "hub message: {}",
            String::from_utf8_lossy(&payload)
        );
        Ok(())
    }
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    let _ = tracing_subscriber::fmt::try_init();

    info!("Started configurable-bridge");

    let args = BridgeArgs::parse();
    let mut file = File::open(args.config)?;
    let mut contents = String::new();
    file.read_to_string(&mut contents)?;
    let config: Config = json5::from_str(&contents)?;

    let source = Arc::new(SimulatedSourceClient::default());
    let bridge = Arc::new(HubBridge::start(
        config.settings(),
        &config.telemetry,
        source.clone(),
        Arc::new(TracingHubTransport),
    )?);

    for endpoint in &config.endpoints {
        let outcomes = bridge
            .publish_nodes(
                &endpoint.url,
                endpoint.credentials.clone(),
                endpoint.nodes.clone(),
            )
            .await?;
        for outcome in outcomes.iter().filter(|o| o.result.is_err()) {
            warn!(
                endpoint = endpoint.url.as_str(),
                node_id = outcome.node_id.as_str(),
                "node could not be published"
            );
        }
    }
    bridge.complete_startup();

    // drive the simulated source: one monotonically increasing value per
    // configured node
    let mut feeders = Vec::new();
    for endpoint in &config.endpoints {
        let source = source.clone();
        let nodes: Vec<String> = endpoint
            .nodes
            .iter()
            .map(|node| node.node_id.clone())
            .collect();
        let interval = Duration::from_millis(endpoint.simulation_interval_ms.max(1));
        feeders.push(tokio::spawn(async move {
            let mut ticker = tokio::time::interval(interval);
            let mut value = 0u64;
            loop {
                ticker.tick().await;
                value += 1;
                for node_id in &nodes {
                    source.emit_value(node_id, &value.to_string());
                }
            }
        }));
    }

    tokio::signal::ctrl_c().await?;
    info!("Shutdown signal received");

    for feeder in &feeders {
        feeder.abort();
    }
    bridge.shutdown().await;

    Ok(())
}
