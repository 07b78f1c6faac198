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

//! One subscribed data point and its notification-to-queue path.

use crate::data_plane::NotificationQueue;
use crate::message::MessageData;
use crate::observability::events;
use crate::source::{
    MonitoredItemHandle, MonitoredItemRequest, NodeSpec, NotificationListener, SourceNotification,
};
use crate::telemetry::EndpointTelemetry;
use std::sync::Arc;
use tracing::warn;

const COMPONENT: &str = "monitored_item";

pub const DEFAULT_SAMPLING_INTERVAL_MS: u32 = 1000;
pub(crate) const DEFAULT_ITEM_QUEUE_SIZE: u32 = 2;

/// Attribute id for a node's value attribute, the only attribute the
/// bridge samples.
pub(crate) const VALUE_ATTRIBUTE_ID: u32 = 13;

/// Which identifier form the operator configured the node with.
#[derive(Clone, Copy, Debug, Eq, PartialEq)]
pub enum ConfiguredIdFormat {
    /// `ns=<index>;...` form, resolved against the session's namespace
    /// table by the stack.
    NamespaceIndex,
    /// `nsu=<uri>;...` form, stable across servers.
    NamespaceUri,
}

/// Lifecycle of one monitored item.
///
/// `Errored` is reachable from any state when the source reports the
/// node invalid or unreachable; an errored item is excluded from active
/// monitoring but retained for diagnostic reporting until removed.
#[derive(Clone, Copy, Debug, Eq, PartialEq)]
pub enum MonitoredItemState {
    /// Created locally, not yet applied against the live subscription.
    Init,
    /// Live on the stack and delivering notifications.
    Monitoring,
    /// Reconciliation decided the item is no longer desired.
    RemovalRequested,
    /// Deletion confirmed by the stack; about to be evicted.
    Removed,
    /// The source rejected or lost the node.
    Errored,
}

/// Monitoring mode requested for the stack-side item.
#[derive(Clone, Copy, Debug, Default, Eq, PartialEq)]
pub enum MonitoringMode {
    #[default]
    Reporting,
    Sampling,
    Disabled,
}

/// One configured data point, exclusively owned by its [`super::Subscription`].
#[derive(Debug)]
pub struct MonitoredItem {
    pub display_name: String,
    /// True when the display name came from configuration rather than
    /// being derived from the node id.
    pub display_name_from_config: bool,
    pub state: MonitoredItemState,
    pub monitoring_mode: MonitoringMode,
    /// Attribute sampled on the node; always the value attribute.
    pub attribute_id: u32,
    pub requested_sampling_interval_ms: u32,
    /// True when the sampling interval was requested by configuration.
    pub sampling_interval_from_config: bool,
    /// Whatever the stack reported back after creation; may differ from
    /// the requested value.
    pub negotiated_sampling_interval_ms: Option<u32>,
    /// Depth of the stack's own per-item buffer.
    pub queue_size: u32,
    pub discard_oldest: bool,
    pub endpoint_url: String,
    /// Node identifier exactly as configured.
    pub config_node_id: String,
    pub id_format: ConfiguredIdFormat,
    /// Canonical match key used by reconciliation (namespace-index form
    /// when configured that way).
    pub canonical_node_id: String,
    /// Namespace-URI form, when the configured identifier carried one.
    pub expanded_node_id: Option<String>,
    pub handle: Option<MonitoredItemHandle>,
}

impl MonitoredItem {
    /// Builds an item in `Init` state from one desired node spec.
    pub(crate) fn from_spec(spec: &NodeSpec, endpoint_url: &str) -> Self {
        let canonical_node_id = canonicalize_node_id(&spec.node_id);
        let id_format = if canonical_node_id.starts_with("nsu=") {
            ConfiguredIdFormat::NamespaceUri
        } else {
            ConfiguredIdFormat::NamespaceIndex
        };
        let expanded_node_id = (id_format == ConfiguredIdFormat::NamespaceUri)
            .then(|| canonical_node_id.clone());

        let (display_name, display_name_from_config) = match &spec.display_name {
            Some(name) => (name.clone(), true),
            None => (canonical_node_id.clone(), false),
        };

        let (requested_sampling_interval_ms, sampling_interval_from_config) =
            match spec.sampling_interval_ms {
                Some(interval) => (interval, true),
                None => (DEFAULT_SAMPLING_INTERVAL_MS, false),
            };

        Self {
            display_name,
            display_name_from_config,
            state: MonitoredItemState::Init,
            monitoring_mode: MonitoringMode::default(),
            attribute_id: VALUE_ATTRIBUTE_ID,
            requested_sampling_interval_ms,
            sampling_interval_from_config,
            negotiated_sampling_interval_ms: None,
            queue_size: DEFAULT_ITEM_QUEUE_SIZE,
            discard_oldest: true,
            endpoint_url: endpoint_url.to_string(),
            config_node_id: spec.node_id.clone(),
            id_format,
            canonical_node_id,
            expanded_node_id,
            handle: None,
        }
    }

    /// The creation request handed to the source stack.
    pub(crate) fn creation_request(&self) -> MonitoredItemRequest {
        MonitoredItemRequest {
            node_id: self.config_node_id.clone(),
            attribute_id: self.attribute_id,
            requested_sampling_interval_ms: self.requested_sampling_interval_ms,
            queue_size: self.queue_size,
            discard_oldest: self.discard_oldest,
        }
    }

    /// The per-item listener handed to the stack at creation time.
    pub(crate) fn notifier(
        &self,
        telemetry: Arc<EndpointTelemetry>,
        queue: Arc<NotificationQueue>,
    ) -> Arc<dyn NotificationListener> {
        Arc::new(ItemNotifier {
            endpoint_url: self.endpoint_url.clone(),
            config_node_id: self.config_node_id.clone(),
            expanded_node_id: self.expanded_node_id.clone(),
            display_name: self.display_name.clone(),
            telemetry,
            queue,
        })
    }

    pub fn is_active(&self) -> bool {
        matches!(
            self.state,
            MonitoredItemState::Init | MonitoredItemState::Monitoring
        )
    }
}

/// Normalizes a configured node identifier into the reconciliation match
/// key. Identifier resolution against the server namespace table is the
/// stack's job; here only whitespace is stripped.
pub(crate) fn canonicalize_node_id(node_id: &str) -> String {
    node_id.trim().to_string()
}

/// Runs on the stack's delivery thread for one monitored item: builds the
/// shaped message and performs the non-blocking enqueue. Never blocks,
/// never panics across the callback boundary.
struct ItemNotifier {
    endpoint_url: String,
    config_node_id: String,
    expanded_node_id: Option<String>,
    display_name: String,
    telemetry: Arc<EndpointTelemetry>,
    queue: Arc<NotificationQueue>,
}

impl NotificationListener for ItemNotifier {
    fn on_notification(&self, _item: MonitoredItemHandle, notification: SourceNotification) {
        let mut message = MessageData {
            owner_endpoint: self.endpoint_url.clone(),
            endpoint_url: Some(self.endpoint_url.clone()),
            node_id: Some(self.config_node_id.clone()),
            expanded_node_id: self.expanded_node_id.clone(),
            application_uri: notification.application_uri,
            display_name: Some(self.display_name.clone()),
            value: Some(notification.value),
            source_timestamp: Some(notification.source_timestamp.to_rfc3339()),
            status_code: notification.status_code,
            status: notification.status,
            preserve_value_quotes: notification.value_is_string,
        };

        // shaping happens exactly once, before enqueue
        self.telemetry.shape(&mut message);

        if !self.queue.try_enqueue(message) {
            warn!(
                event = events::ENQUEUE_REJECTED,
                component = COMPONENT,
                node_id = self.config_node_id.as_str(),
                lost_total = self.queue_failure_total(),
                "notification queue full; notification dropped"
            );
        }
    }
}

impl ItemNotifier {
    fn queue_failure_total(&self) -> u64 {
        self.queue.counters().enqueue_failure_count()
    }
}

#[cfg(test)]
mod tests {
    use super::{MonitoredItem, MonitoredItemState, DEFAULT_SAMPLING_INTERVAL_MS};
    use crate::data_plane::NotificationQueue;
    use crate::diagnostics::PipelineCounters;
    use crate::source::{MonitoredItemHandle, NodeSpec, SourceNotification};
    use crate::telemetry::TelemetryRegistry;
    use chrono::{TimeZone, Utc};
    use std::sync::Arc;

    fn spec(node_id: &str) -> NodeSpec {
        NodeSpec {
            node_id: node_id.to_string(),
            display_name: None,
            sampling_interval_ms: None,
            publishing_interval_ms: None,
        }
    }

    fn notification(value: &str) -> SourceNotification {
        SourceNotification {
            value: value.to_string(),
            value_is_string: false,
            source_timestamp: Utc.with_ymd_and_hms(2024, 5, 1, 12, 0, 0).unwrap(),
            status_code: Some(0),
            status: Some("Good".to_string()),
            application_uri: Some("urn:plant:server".to_string()),
        }
    }

    #[test]
    fn from_spec_derives_display_name_and_defaults() {
        let item = MonitoredItem::from_spec(&spec(" ns=2;i=55 "), "opc.tcp://plant:4840");

        assert_eq!(item.state, MonitoredItemState::Init);
        assert_eq!(item.canonical_node_id, "ns=2;i=55");
        assert_eq!(item.display_name, "ns=2;i=55");
        assert!(!item.display_name_from_config);
        assert_eq!(
            item.requested_sampling_interval_ms,
            DEFAULT_SAMPLING_INTERVAL_MS
        );
        assert!(!item.sampling_interval_from_config);
        assert!(item.expanded_node_id.is_none());
    }

    #[test]
    fn from_spec_honors_configured_name_and_interval() {
        let configured = NodeSpec {
            node_id: "nsu=http://plant;i=7".to_string(),
            display_name: Some("Pressure".to_string()),
            sampling_interval_ms: Some(250),
            publishing_interval_ms: None,
        };
        let item = MonitoredItem::from_spec(&configured, "opc.tcp://plant:4840");

        assert_eq!(item.display_name, "Pressure");
        assert!(item.display_name_from_config);
        assert_eq!(item.requested_sampling_interval_ms, 250);
        assert!(item.sampling_interval_from_config);
        assert_eq!(
            item.expanded_node_id.as_deref(),
            Some("nsu=http://plant;i=7")
        );
    }

    #[test]
    fn notifier_shapes_and_enqueues() {
        let counters = Arc::new(PipelineCounters::default());
        let queue = Arc::new(NotificationQueue::new(4, counters));
        let registry = TelemetryRegistry::default();
        let telemetry = Arc::new(registry.for_endpoint("opc.tcp://plant:4840").clone());

        let item = MonitoredItem::from_spec(&spec("ns=2;i=55"), "opc.tcp://plant:4840");
        let notifier = item.notifier(telemetry, queue.clone());

        notifier.on_notification(MonitoredItemHandle(1), notification("42"));

        let message = queue.dequeue().expect("one shaped message");
        // default publish flags: endpoint URL and status stay dark
        assert!(message.endpoint_url.is_none());
        assert!(message.status_code.is_none());
        assert_eq!(message.value.as_deref(), Some("42"));
        assert_eq!(message.owner_endpoint, "opc.tcp://plant:4840");
        assert_eq!(
            message.source_timestamp.as_deref(),
            Some("2024-05-01T12:00:00+00:00")
        );
    }

    #[test]
    fn notifier_drop_on_full_queue_is_counted_not_thrown() {
        let counters = Arc::new(PipelineCounters::default());
        let queue = Arc::new(NotificationQueue::new(1, counters.clone()));
        let registry = TelemetryRegistry::default();
        let telemetry = Arc::new(registry.for_endpoint("any").clone());

        let item = MonitoredItem::from_spec(&spec("ns=2;i=55"), "opc.tcp://plant:4840");
        let notifier = item.notifier(telemetry, queue.clone());

        notifier.on_notification(MonitoredItemHandle(1), notification("1"));
        notifier.on_notification(MonitoredItemHandle(1), notification("2"));

        assert_eq!(queue.len(), 1);
        assert_eq!(counters.enqueue_failure_count(), 1);
    }
}
