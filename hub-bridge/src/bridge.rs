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

//! The bridge facade: owns the pipeline, the desired configuration, and
//! every background task.

use crate::control_plane::{NodeOutcome, PublishedNodesStore, Session};
use crate::data_plane::{BatchSender, NotificationQueue};
use crate::diagnostics::{
    spawn_reporter, DiagnosticInfo, DiagnosticLog, DiagnosticLogSnapshot, PipelineCounters,
};
use crate::error::BridgeError;
use crate::hub::HubTransport;
use crate::observability::events;
use crate::source::{EndpointCredentials, NodeSpec, SourceClient};
use crate::telemetry::{TelemetryRegistry, TelemetrySpec};
use std::collections::HashMap;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::Duration;
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;
use tracing::{info, warn};

const COMPONENT: &str = "bridge";

/// Pipeline settings, resolved before the bridge starts.
#[derive(Clone, Debug)]
pub struct BridgeSettings {
    /// Capacity of the notification queue.
    pub queue_capacity: usize,
    /// Interval between batch-sender flushes.
    pub send_interval: Duration,
    /// Upper bound on one serialized hub message.
    pub max_message_bytes: usize,
    /// Interval between diagnostic reports; `None` disables the reporter.
    pub diagnostics_interval: Option<Duration>,
    /// Capacity of the diagnostic log ring.
    pub log_capacity: usize,
}

impl Default for BridgeSettings {
    fn default() -> Self {
        Self {
            queue_capacity: 8192,
            send_interval: Duration::from_secs(10),
            max_message_bytes: 262_144,
            diagnostics_interval: None,
            log_capacity: crate::diagnostics::DEFAULT_LOG_CAPACITY,
        }
    }
}

/// Desired configuration plus the live sessions converging to it.
///
/// One lock over both: reconciliation reads the store and mutates
/// sessions, so a single guard serializes reconciliation passes and
/// keeps paged reads consistent with what reconciliation saw.
struct ControlState {
    store: PublishedNodesStore,
    sessions: HashMap<String, Session>,
}

/// The assembled bridge.
///
/// Owns the queue, the batch-sender and reporter tasks, the desired-node
/// store, and one session per configured endpoint. Source stack and hub
/// transport are injected collaborators.
pub struct HubBridge {
    source: Arc<dyn SourceClient>,
    queue: Arc<NotificationQueue>,
    counters: Arc<PipelineCounters>,
    diagnostic_log: Arc<DiagnosticLog>,
    telemetry: Arc<TelemetryRegistry>,
    state: tokio::sync::Mutex<ControlState>,
    cancellation: CancellationToken,
    tasks: std::sync::Mutex<Vec<JoinHandle<()>>>,
    shut_down: AtomicBool,
}

impl HubBridge {
    /// Resolves the telemetry configuration, builds the pipeline, and
    /// spawns the background tasks. Must run inside a tokio runtime.
    pub fn start(
        settings: BridgeSettings,
        telemetry: &TelemetrySpec,
        source: Arc<dyn SourceClient>,
        hub: Arc<dyn HubTransport>,
    ) -> Result<Self, BridgeError> {
        let telemetry = Arc::new(TelemetryRegistry::resolve(telemetry)?);
        let counters = Arc::new(PipelineCounters::default());
        let queue = Arc::new(NotificationQueue::new(
            settings.queue_capacity,
            counters.clone(),
        ));
        let diagnostic_log = Arc::new(DiagnosticLog::new(settings.log_capacity));
        let cancellation = CancellationToken::new();

        let mut tasks = Vec::with_capacity(2);
        let sender = BatchSender::new(
            queue.clone(),
            hub,
            telemetry.clone(),
            counters.clone(),
            settings.send_interval,
            settings.max_message_bytes,
        );
        tasks.push(sender.spawn(cancellation.child_token()));

        if let Some(interval) = settings.diagnostics_interval {
            if !interval.is_zero() {
                tasks.push(spawn_reporter(
                    counters.clone(),
                    queue.clone(),
                    diagnostic_log.clone(),
                    interval,
                    cancellation.child_token(),
                ));
            }
        }

        Ok(Self {
            source,
            queue,
            counters,
            diagnostic_log,
            telemetry,
            state: tokio::sync::Mutex::new(ControlState {
                store: PublishedNodesStore::default(),
                sessions: HashMap::new(),
            }),
            cancellation,
            tasks: std::sync::Mutex::new(tasks),
            shut_down: AtomicBool::new(false),
        })
    }

    /// Adds nodes to an endpoint's desired set and reconciles the
    /// endpoint. Returns one outcome per desired node on the endpoint;
    /// failures are partial, not fatal.
    pub async fn publish_nodes(
        &self,
        endpoint_url: &str,
        credentials: Option<EndpointCredentials>,
        nodes: Vec<NodeSpec>,
    ) -> Result<Vec<NodeOutcome>, BridgeError> {
        self.ensure_running()?;

        let mut state = self.state.lock().await;
        state.store.upsert(endpoint_url, credentials, nodes);
        let outcomes = self.reconcile_endpoint(&mut state, endpoint_url).await;
        self.refresh_gauges(&state);
        Ok(outcomes)
    }

    /// Removes nodes from an endpoint's desired set and reconciles. An
    /// endpoint left without nodes is torn down entirely.
    pub async fn unpublish_nodes(
        &self,
        endpoint_url: &str,
        node_ids: &[String],
    ) -> Result<Vec<NodeOutcome>, BridgeError> {
        self.ensure_running()?;

        let mut state = self.state.lock().await;
        state.store.remove(endpoint_url, node_ids)?;
        let outcomes = self.reconcile_endpoint(&mut state, endpoint_url).await;
        self.refresh_gauges(&state);
        Ok(outcomes)
    }

    /// Drops every configured node, on one endpoint when given or on all
    /// endpoints otherwise, and tears the affected sessions down.
    pub async fn unpublish_all(&self, endpoint_url: Option<&str>) -> Result<(), BridgeError> {
        self.ensure_running()?;

        let mut state = self.state.lock().await;
        match endpoint_url {
            Some(endpoint_url) => {
                state.store.remove_endpoint(endpoint_url)?;
                self.reconcile_endpoint(&mut state, endpoint_url).await;
            }
            None => {
                state.store.remove_all();
                for session in state.sessions.values_mut() {
                    session.teardown(self.source.as_ref()).await;
                }
                state.sessions.clear();
            }
        }
        self.refresh_gauges(&state);
        Ok(())
    }

    /// One page of configured endpoint URLs.
    pub async fn configured_endpoints(
        &self,
        continuation: Option<u64>,
    ) -> Result<(Vec<String>, Option<u64>), BridgeError> {
        let state = self.state.lock().await;
        state.store.endpoints_page(continuation)
    }

    /// One page of node specs configured on an endpoint.
    pub async fn configured_nodes_on_endpoint(
        &self,
        endpoint_url: &str,
        continuation: Option<u64>,
    ) -> Result<(Vec<NodeSpec>, Option<u64>), BridgeError> {
        let state = self.state.lock().await;
        state.store.nodes_page(endpoint_url, continuation)
    }

    /// Point-in-time counters and gauges; never fails.
    pub fn diagnostic_info(&self) -> DiagnosticInfo {
        self.counters
            .snapshot(self.queue.capacity() as u64, self.queue.len() as u64)
    }

    /// Drains and returns the buffered diagnostic log.
    pub fn diagnostic_log(&self) -> DiagnosticLogSnapshot {
        self.diagnostic_log.snapshot()
    }

    /// Feeds one line into the diagnostic log buffer.
    pub fn write_log(&self, line: impl Into<String>) {
        self.diagnostic_log.write(line);
    }

    /// Ends the unbounded startup-log phase.
    pub fn complete_startup(&self) {
        self.diagnostic_log.complete_startup();
    }

    /// Orderly shutdown: queue admission closes first, then the
    /// background tasks are cancelled and awaited, then every session is
    /// torn down. Idempotent; a second call returns immediately.
    pub async fn shutdown(&self) {
        if self.shut_down.swap(true, Ordering::SeqCst) {
            return;
        }

        info!(
            event = events::SHUTDOWN_START,
            component = COMPONENT,
            queued = self.queue.len(),
        );

        self.queue.close();
        self.cancellation.cancel();

        let tasks: Vec<JoinHandle<()>> = match self.tasks.lock() {
            Ok(mut tasks) => tasks.drain(..).collect(),
            Err(_) => Vec::new(),
        };
        for task in tasks {
            if let Err(err) = task.await {
                warn!(component = COMPONENT, error = %err, "background task panicked");
            }
        }

        let mut state = self.state.lock().await;
        for session in state.sessions.values_mut() {
            session.teardown(self.source.as_ref()).await;
        }
        state.sessions.clear();
        self.refresh_gauges(&state);

        info!(event = events::SHUTDOWN_COMPLETE, component = COMPONENT);
    }

    fn ensure_running(&self) -> Result<(), BridgeError> {
        if self.shut_down.load(Ordering::SeqCst) {
            return Err(BridgeError::ShutDown);
        }
        Ok(())
    }

    /// Converges one endpoint's session to the store. Called with the
    /// control lock held, so passes never interleave.
    async fn reconcile_endpoint(
        &self,
        state: &mut ControlState,
        endpoint_url: &str,
    ) -> Vec<NodeOutcome> {
        match state.store.get(endpoint_url) {
            Some(desired) => {
                let descriptor = desired.descriptor(endpoint_url);
                let nodes = desired.nodes.clone();
                let session = state
                    .sessions
                    .entry(endpoint_url.to_string())
                    .or_insert_with(|| Session::new(descriptor));
                session
                    .reconcile(&nodes, self.source.as_ref(), &self.queue, &self.telemetry)
                    .await
            }
            None => {
                // endpoint fully unconfigured: converge to empty, then drop
                if let Some(mut session) = state.sessions.remove(endpoint_url) {
                    let outcomes = session
                        .reconcile(&[], self.source.as_ref(), &self.queue, &self.telemetry)
                        .await;
                    session.teardown(self.source.as_ref()).await;
                    return outcomes;
                }
                Vec::new()
            }
        }
    }

    fn refresh_gauges(&self, state: &ControlState) {
        let sessions = state.sessions.len() as u64;
        let connected = state
            .sessions
            .values()
            .filter(|session| session.connected)
            .count() as u64;
        let subscriptions = state
            .sessions
            .values()
            .map(|session| session.subscriptions.len() as u64)
            .sum();
        let items = state
            .sessions
            .values()
            .map(|session| session.monitored_item_count() as u64)
            .sum();
        self.counters
            .set_session_gauges(sessions, connected, subscriptions, items);
    }
}

#[cfg(test)]
mod tests {
    use super::{BridgeSettings, HubBridge};
    use crate::error::{BridgeError, HubError, SourceError};
    use crate::hub::HubTransport;
    use crate::source::{
        EndpointDescriptor, MonitoredItemHandle, MonitoredItemRequest, NodeSpec,
        NotificationListener, SourceClient, SubscriptionHandle,
    };
    use crate::telemetry::TelemetrySpec;
    use async_trait::async_trait;
    use std::collections::HashSet;
    use std::sync::atomic::{AtomicU64, Ordering};
    use std::sync::{Arc, Mutex};
    use std::time::Duration;

    /// Stack double that tracks which handles are currently live.
    #[derive(Default)]
    struct StubSource {
        next_handle: AtomicU64,
        live_items: Mutex<HashSet<u64>>,
    }

    impl StubSource {
        fn handle(&self) -> u64 {
            self.next_handle.fetch_add(1, Ordering::Relaxed) + 1
        }

        fn active_item_count(&self) -> usize {
            self.live_items.lock().unwrap().len()
        }
    }

    #[async_trait]
    impl SourceClient for StubSource {
        async fn create_subscription(
            &self,
            _endpoint: &EndpointDescriptor,
            requested_publishing_interval_ms: u32,
        ) -> Result<(SubscriptionHandle, u32), SourceError> {
            Ok((
                SubscriptionHandle(self.handle()),
                requested_publishing_interval_ms,
            ))
        }

        async fn create_monitored_item(
            &self,
            _subscription: SubscriptionHandle,
            request: &MonitoredItemRequest,
            _listener: Arc<dyn NotificationListener>,
        ) -> Result<(MonitoredItemHandle, u32), SourceError> {
            let handle = self.handle();
            self.live_items.lock().unwrap().insert(handle);
            Ok((
                MonitoredItemHandle(handle),
                request.requested_sampling_interval_ms,
            ))
        }

        async fn delete_monitored_item(
            &self,
            _subscription: SubscriptionHandle,
            item: MonitoredItemHandle,
        ) -> Result<(), SourceError> {
            self.live_items.lock().unwrap().remove(&item.0);
            Ok(())
        }

        async fn delete_subscription(
            &self,
            _subscription: SubscriptionHandle,
        ) -> Result<(), SourceError> {
            Ok(())
        }
    }

    struct NullHub;

    #[async_trait]
    impl HubTransport for NullHub {
        async fn send(&self, _payload: Vec<u8>) -> Result<(), HubError> {
            Ok(())
        }
    }

    fn node(node_id: &str) -> NodeSpec {
        NodeSpec {
            node_id: node_id.to_string(),
            display_name: None,
            sampling_interval_ms: None,
            publishing_interval_ms: None,
        }
    }

    fn bridge_with(source: Arc<StubSource>) -> HubBridge {
        HubBridge::start(
            BridgeSettings {
                send_interval: Duration::from_secs(3600),
                ..BridgeSettings::default()
            },
            &TelemetrySpec::default(),
            source,
            Arc::new(NullHub),
        )
        .expect("bridge starts")
    }

    #[tokio::test]
    async fn publish_then_unpublish_updates_gauges() {
        let source = Arc::new(StubSource::default());
        let bridge = bridge_with(source.clone());

        let outcomes = bridge
            .publish_nodes(
                "opc.tcp://plant:4840",
                None,
                vec![node("ns=2;i=1"), node("ns=2;i=2")],
            )
            .await
            .expect("publish succeeds");
        assert!(outcomes.iter().all(|o| o.result.is_ok()));

        let info = bridge.diagnostic_info();
        assert_eq!(info.num_sessions, 1);
        assert_eq!(info.num_connected_sessions, 1);
        assert_eq!(info.num_monitored_items, 2);

        bridge
            .unpublish_nodes("opc.tcp://plant:4840", &["ns=2;i=1".to_string()])
            .await
            .expect("unpublish succeeds");
        assert_eq!(bridge.diagnostic_info().num_monitored_items, 1);

        bridge.shutdown().await;
    }

    #[tokio::test]
    async fn unpublishing_the_last_node_tears_the_session_down() {
        let source = Arc::new(StubSource::default());
        let bridge = bridge_with(source.clone());

        bridge
            .publish_nodes("opc.tcp://plant:4840", None, vec![node("ns=2;i=1")])
            .await
            .expect("publish succeeds");
        bridge
            .unpublish_nodes("opc.tcp://plant:4840", &["ns=2;i=1".to_string()])
            .await
            .expect("unpublish succeeds");

        let info = bridge.diagnostic_info();
        assert_eq!(info.num_sessions, 0);
        assert_eq!(info.num_monitored_items, 0);

        let (endpoints, _) = bridge
            .configured_endpoints(None)
            .await
            .expect("listing succeeds");
        assert!(endpoints.is_empty());

        bridge.shutdown().await;
    }

    #[tokio::test]
    async fn unpublish_on_unknown_endpoint_is_an_error() {
        let source = Arc::new(StubSource::default());
        let bridge = bridge_with(source);

        let result = bridge
            .unpublish_nodes("opc.tcp://nowhere:4840", &["ns=2;i=1".to_string()])
            .await;
        assert!(matches!(result, Err(BridgeError::UnknownEndpoint(_))));

        bridge.shutdown().await;
    }

    #[tokio::test]
    async fn shutdown_is_idempotent_and_rejects_later_calls() {
        let source = Arc::new(StubSource::default());
        let bridge = bridge_with(source);

        bridge.shutdown().await;
        bridge.shutdown().await;

        let result = bridge
            .publish_nodes("opc.tcp://plant:4840", None, vec![node("ns=2;i=1")])
            .await;
        assert!(matches!(result, Err(BridgeError::ShutDown)));
    }

    #[tokio::test]
    async fn unpublish_all_clears_configuration_and_sessions() {
        let source = Arc::new(StubSource::default());
        let bridge = bridge_with(source.clone());

        bridge
            .publish_nodes("opc.tcp://a:4840", None, vec![node("ns=2;i=1")])
            .await
            .expect("publish succeeds");
        bridge
            .publish_nodes("opc.tcp://b:4840", None, vec![node("ns=2;i=2")])
            .await
            .expect("publish succeeds");

        bridge
            .unpublish_all(None)
            .await
            .expect("unpublish all succeeds");

        let info = bridge.diagnostic_info();
        assert_eq!(info.num_sessions, 0);
        assert_eq!(info.num_subscriptions, 0);
        assert_eq!(source.active_item_count(), 0);

        bridge.shutdown().await;
    }

    #[tokio::test]
    async fn unpublish_all_on_one_endpoint_leaves_the_others_alone() {
        let source = Arc::new(StubSource::default());
        let bridge = bridge_with(source.clone());

        bridge
            .publish_nodes("opc.tcp://a:4840", None, vec![node("ns=2;i=1")])
            .await
            .expect("publish succeeds");
        bridge
            .publish_nodes("opc.tcp://b:4840", None, vec![node("ns=2;i=2")])
            .await
            .expect("publish succeeds");

        bridge
            .unpublish_all(Some("opc.tcp://a:4840"))
            .await
            .expect("unpublish endpoint succeeds");

        let info = bridge.diagnostic_info();
        assert_eq!(info.num_sessions, 1);
        assert_eq!(info.num_monitored_items, 1);
        assert_eq!(source.active_item_count(), 1);

        let result = bridge.unpublish_all(Some("opc.tcp://a:4840")).await;
        assert!(matches!(result, Err(BridgeError::UnknownEndpoint(_))));

        bridge.shutdown().await;
    }
}
