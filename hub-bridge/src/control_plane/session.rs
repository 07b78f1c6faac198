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

//! Per-endpoint session state and the reconciliation pass that converges
//! it to the desired node set.

use crate::control_plane::monitored_item::{
    canonicalize_node_id, MonitoredItem, MonitoredItemState,
};
use crate::control_plane::subscription::{Subscription, DEFAULT_PUBLISHING_INTERVAL_MS};
use crate::data_plane::NotificationQueue;
use crate::error::ReconcileError;
use crate::observability::events;
use crate::source::{EndpointDescriptor, NodeSpec, SourceClient};
use crate::telemetry::TelemetryRegistry;
use std::collections::HashMap;
use std::sync::Arc;
use tracing::{info, warn};

const COMPONENT: &str = "session";

/// Per-node result of one reconciliation pass.
#[derive(Debug)]
pub struct NodeOutcome {
    /// Node identifier in the form it was configured.
    pub node_id: String,
    pub result: Result<(), ReconcileError>,
}

/// Live state against one endpoint: its subscriptions and their items.
///
/// The session never talks to the wire itself; every stack interaction
/// goes through the [`SourceClient`] passed into the lifecycle methods,
/// and whatever intervals the stack negotiates are recorded verbatim.
#[derive(Debug)]
pub struct Session {
    pub endpoint: EndpointDescriptor,
    pub connected: bool,
    pub subscriptions: Vec<Subscription>,
}

impl Session {
    pub fn new(endpoint: EndpointDescriptor) -> Self {
        Self {
            endpoint,
            connected: false,
            subscriptions: Vec::new(),
        }
    }

    /// Converges live subscriptions and monitored items to `desired`.
    ///
    /// Removals run first so queue capacity and server resources are
    /// released before additions claim them. Failures are per-node: a
    /// node the stack rejects is kept in `Errored` state and retried on
    /// the next pass, and never blocks the other nodes. Calling twice
    /// with the same desired set performs no stack operations the second
    /// time.
    pub async fn reconcile(
        &mut self,
        desired: &[NodeSpec],
        source: &dyn SourceClient,
        queue: &Arc<NotificationQueue>,
        telemetry: &TelemetryRegistry,
    ) -> Vec<NodeOutcome> {
        info!(
            event = events::RECONCILE_START,
            component = COMPONENT,
            endpoint = self.endpoint.url.as_str(),
            desired_nodes = desired.len(),
        );

        // canonical node id -> requested publishing interval
        let desired_intervals: HashMap<String, u32> = desired
            .iter()
            .map(|spec| {
                (
                    canonicalize_node_id(&spec.node_id),
                    spec.publishing_interval_ms
                        .unwrap_or(DEFAULT_PUBLISHING_INTERVAL_MS),
                )
            })
            .collect();

        self.remove_undesired(&desired_intervals, source).await;
        let outcomes = self.apply_desired(desired, source, queue, telemetry).await;
        self.prune_empty_subscriptions(source).await;

        let failed = outcomes
            .iter()
            .filter(|outcome| outcome.result.is_err())
            .count();
        info!(
            event = events::RECONCILE_OK,
            component = COMPONENT,
            endpoint = self.endpoint.url.as_str(),
            subscriptions = self.subscriptions.len(),
            monitored_items = self.monitored_item_count(),
            failed_nodes = failed,
        );

        outcomes
    }

    /// Marks and deletes items no longer desired, or desired under a
    /// different publishing interval. A failed deletion keeps the item
    /// in `RemovalRequested` so the next pass retries it.
    async fn remove_undesired(
        &mut self,
        desired_intervals: &HashMap<String, u32>,
        source: &dyn SourceClient,
    ) {
        for subscription in &mut self.subscriptions {
            let mut kept = Vec::with_capacity(subscription.items.len());
            for mut item in subscription.items.drain(..) {
                let still_desired = desired_intervals.get(&item.canonical_node_id)
                    == Some(&subscription.requested_publishing_interval_ms);
                if still_desired && item.state != MonitoredItemState::RemovalRequested {
                    kept.push(item);
                    continue;
                }

                item.state = MonitoredItemState::RemovalRequested;
                let removed = match (subscription.handle, item.handle) {
                    // never made it to the stack, nothing to delete
                    (_, None) => Ok(()),
                    (Some(sub_handle), Some(item_handle)) => {
                        source.delete_monitored_item(sub_handle, item_handle).await
                    }
                    (None, Some(_)) => Ok(()),
                };

                match removed {
                    Ok(()) => {
                        item.state = MonitoredItemState::Removed;
                        info!(
                            event = events::ITEM_REMOVE_OK,
                            component = COMPONENT,
                            endpoint = self.endpoint.url.as_str(),
                            node_id = item.config_node_id.as_str(),
                        );
                        // evicted by not re-adding to `kept`
                    }
                    Err(err) => {
                        warn!(
                            event = events::ITEM_REMOVE_FAILED,
                            component = COMPONENT,
                            endpoint = self.endpoint.url.as_str(),
                            node_id = item.config_node_id.as_str(),
                            error = %err,
                        );
                        kept.push(item);
                    }
                }
            }
            subscription.items = kept;
        }
    }

    /// Creates missing subscriptions and items for the desired set.
    async fn apply_desired(
        &mut self,
        desired: &[NodeSpec],
        source: &dyn SourceClient,
        queue: &Arc<NotificationQueue>,
        telemetry: &TelemetryRegistry,
    ) -> Vec<NodeOutcome> {
        let mut outcomes = Vec::with_capacity(desired.len());

        for spec in desired {
            let canonical = canonicalize_node_id(&spec.node_id);
            let requested_interval = spec
                .publishing_interval_ms
                .unwrap_or(DEFAULT_PUBLISHING_INTERVAL_MS);

            // a stale item whose deletion keeps failing still holds a live
            // stack handle; defer the create until the delete lands, or
            // the stack would carry two items for one node
            let removal_pending = self.subscriptions.iter().any(|subscription| {
                subscription.items.iter().any(|existing| {
                    existing.canonical_node_id == canonical
                        && !existing.is_active()
                        && existing.handle.is_some()
                })
            });
            if removal_pending {
                outcomes.push(NodeOutcome {
                    node_id: spec.node_id.clone(),
                    result: Err(ReconcileError::RemovalPending {
                        node_id: spec.node_id.clone(),
                    }),
                });
                continue;
            }

            let subscription_index = match self.subscriptions.iter().position(|subscription| {
                subscription.requested_publishing_interval_ms == requested_interval
            }) {
                Some(index) => index,
                None => {
                    self.subscriptions.push(Subscription::new(
                        requested_interval,
                        spec.publishing_interval_ms.is_some(),
                    ));
                    self.subscriptions.len() - 1
                }
            };

            // already monitored: idempotent no-op
            if let Some(existing) = self.subscriptions[subscription_index].find_item_mut(&canonical)
            {
                if existing.is_active() {
                    outcomes.push(NodeOutcome {
                        node_id: spec.node_id.clone(),
                        result: Ok(()),
                    });
                    continue;
                }
            }

            if self.subscriptions[subscription_index].handle.is_none() {
                match source
                    .create_subscription(&self.endpoint, requested_interval)
                    .await
                {
                    Ok((handle, negotiated_interval)) => {
                        self.connected = true;
                        let subscription = &mut self.subscriptions[subscription_index];
                        subscription.handle = Some(handle);
                        subscription.negotiated_publishing_interval_ms = Some(negotiated_interval);
                        info!(
                            event = events::SUBSCRIPTION_CREATE_OK,
                            component = COMPONENT,
                            endpoint = self.endpoint.url.as_str(),
                            requested_interval_ms = requested_interval,
                            negotiated_interval_ms = negotiated_interval,
                        );
                    }
                    Err(err) => {
                        warn!(
                            event = events::SUBSCRIPTION_CREATE_FAILED,
                            component = COMPONENT,
                            endpoint = self.endpoint.url.as_str(),
                            requested_interval_ms = requested_interval,
                            error = %err,
                        );
                        outcomes.push(NodeOutcome {
                            node_id: spec.node_id.clone(),
                            result: Err(ReconcileError::SubscriptionCreate {
                                endpoint: self.endpoint.url.clone(),
                                source: err,
                            }),
                        });
                        continue;
                    }
                }
            }
            let Some(subscription_handle) = self.subscriptions[subscription_index].handle else {
                continue;
            };

            let mut item = MonitoredItem::from_spec(spec, &self.endpoint.url);
            let notifier = item.notifier(
                Arc::new(telemetry.for_endpoint(&self.endpoint.url).clone()),
                queue.clone(),
            );
            let result = match source
                .create_monitored_item(subscription_handle, &item.creation_request(), notifier)
                .await
            {
                Ok((handle, negotiated_interval)) => {
                    item.handle = Some(handle);
                    item.negotiated_sampling_interval_ms = Some(negotiated_interval);
                    item.state = MonitoredItemState::Monitoring;
                    info!(
                        event = events::ITEM_CREATE_OK,
                        component = COMPONENT,
                        endpoint = self.endpoint.url.as_str(),
                        node_id = spec.node_id.as_str(),
                        negotiated_sampling_ms = negotiated_interval,
                    );
                    Ok(())
                }
                Err(err) => {
                    item.state = MonitoredItemState::Errored;
                    warn!(
                        event = events::ITEM_CREATE_FAILED,
                        component = COMPONENT,
                        endpoint = self.endpoint.url.as_str(),
                        node_id = spec.node_id.as_str(),
                        error = %err,
                    );
                    Err(ReconcileError::ItemCreate {
                        node_id: spec.node_id.clone(),
                        source: err,
                    })
                }
            };

            let subscription = &mut self.subscriptions[subscription_index];
            match subscription
                .items
                .iter()
                .position(|existing| existing.canonical_node_id == canonical)
            {
                // errored item from an earlier pass: replace with the retry
                Some(index) => subscription.items[index] = item,
                None => subscription.items.push(item),
            }
            outcomes.push(NodeOutcome {
                node_id: spec.node_id.clone(),
                result,
            });
        }

        outcomes
    }

    /// Deletes subscriptions left without any items.
    async fn prune_empty_subscriptions(&mut self, source: &dyn SourceClient) {
        let mut remaining = Vec::with_capacity(self.subscriptions.len());
        for subscription in self.subscriptions.drain(..) {
            if !subscription.items.is_empty() {
                remaining.push(subscription);
                continue;
            }
            if let Some(handle) = subscription.handle {
                if let Err(err) = source.delete_subscription(handle).await {
                    warn!(
                        event = events::SUBSCRIPTION_DELETE_FAILED,
                        component = COMPONENT,
                        endpoint = self.endpoint.url.as_str(),
                        error = %err,
                    );
                }
            }
        }
        self.subscriptions = remaining;
    }

    /// Releases every stack resource the session holds, items before
    /// their subscription. Best-effort and idempotent: deletion failures
    /// are logged, local state is cleared either way, and a second call
    /// finds nothing to do.
    pub async fn teardown(&mut self, source: &dyn SourceClient) {
        info!(
            event = events::SESSION_TEARDOWN,
            component = COMPONENT,
            endpoint = self.endpoint.url.as_str(),
            subscriptions = self.subscriptions.len(),
        );

        for subscription in &mut self.subscriptions {
            let Some(subscription_handle) = subscription.handle else {
                continue;
            };
            for item in &mut subscription.items {
                let Some(item_handle) = item.handle.take() else {
                    continue;
                };
                if let Err(err) = source
                    .delete_monitored_item(subscription_handle, item_handle)
                    .await
                {
                    warn!(
                        event = events::ITEM_REMOVE_FAILED,
                        component = COMPONENT,
                        endpoint = self.endpoint.url.as_str(),
                        node_id = item.config_node_id.as_str(),
                        error = %err,
                    );
                }
                item.state = MonitoredItemState::Removed;
            }
            if let Err(err) = source.delete_subscription(subscription_handle).await {
                warn!(
                    event = events::SUBSCRIPTION_DELETE_FAILED,
                    component = COMPONENT,
                    endpoint = self.endpoint.url.as_str(),
                    error = %err,
                );
            }
            subscription.handle = None;
        }

        self.subscriptions.clear();
        self.connected = false;
    }

    pub fn monitored_item_count(&self) -> usize {
        self.subscriptions
            .iter()
            .map(Subscription::active_item_count)
            .sum()
    }
}
