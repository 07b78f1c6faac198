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

use async_trait::async_trait;
use chrono::Utc;
use hub_bridge::error::SourceError;
use hub_bridge::source::{
    EndpointDescriptor, MonitoredItemHandle, MonitoredItemRequest, NotificationListener,
    SourceClient, SourceNotification, SubscriptionHandle,
};
use std::collections::{HashMap, HashSet};
use std::sync::atomic::{AtomicU64, AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};

struct ActiveItem {
    subscription: SubscriptionHandle,
    node_id: String,
    listener: Arc<dyn NotificationListener>,
}

#[derive(Default)]
struct SimState {
    items: HashMap<MonitoredItemHandle, ActiveItem>,
    subscriptions: HashSet<SubscriptionHandle>,
    rejected_nodes: HashSet<String>,
    unreachable: bool,
}

/// Scripted source stack: hands out handles, keeps the listener for each
/// created item, and lets tests drive notifications through `emit`.
///
/// Failures are programmable per node (`reject_node`) or per endpoint
/// (`set_unreachable`), matching the failure domains the real stack
/// exposes.
#[derive(Default)]
pub struct SimulatedSourceClient {
    next_handle: AtomicU64,
    state: Mutex<SimState>,
    subscription_creates: AtomicUsize,
    item_creates: AtomicUsize,
    item_deletes: AtomicUsize,
    subscription_deletes: AtomicUsize,
}

impl SimulatedSourceClient {
    /// Makes `create_monitored_item` fail for this node id until
    /// [`Self::accept_node`] is called.
    pub fn reject_node(&self, node_id: &str) {
        if let Ok(mut state) = self.state.lock() {
            state.rejected_nodes.insert(node_id.to_string());
        }
    }

    pub fn accept_node(&self, node_id: &str) {
        if let Ok(mut state) = self.state.lock() {
            state.rejected_nodes.remove(node_id);
        }
    }

    /// Makes `create_subscription` fail for any endpoint.
    pub fn set_unreachable(&self, unreachable: bool) {
        if let Ok(mut state) = self.state.lock() {
            state.unreachable = unreachable;
        }
    }

    /// Delivers one notification to every live item monitoring `node_id`,
    /// on the caller's thread, exactly as the real stack invokes its
    /// callbacks. Returns the number of listeners reached.
    pub fn emit(&self, node_id: &str, notification: &SourceNotification) -> usize {
        let targets: Vec<(MonitoredItemHandle, Arc<dyn NotificationListener>)> =
            match self.state.lock() {
                Ok(state) => state
                    .items
                    .iter()
                    .filter(|(_, item)| item.node_id == node_id)
                    .map(|(handle, item)| (*handle, item.listener.clone()))
                    .collect(),
                Err(_) => Vec::new(),
            };

        for (handle, listener) in &targets {
            listener.on_notification(*handle, notification.clone());
        }
        targets.len()
    }

    /// Convenience for the common case: a numeric value stamped now.
    pub fn emit_value(&self, node_id: &str, value: &str) -> usize {
        self.emit(
            node_id,
            &SourceNotification {
                value: value.to_string(),
                value_is_string: false,
                source_timestamp: Utc::now(),
                status_code: Some(0),
                status: Some("Good".to_string()),
                application_uri: Some("urn:sim:server".to_string()),
            },
        )
    }

    pub fn active_item_count(&self) -> usize {
        self.state.lock().map(|state| state.items.len()).unwrap_or(0)
    }

    pub fn active_subscription_count(&self) -> usize {
        self.state
            .lock()
            .map(|state| state.subscriptions.len())
            .unwrap_or(0)
    }

    pub fn subscription_create_count(&self) -> usize {
        self.subscription_creates.load(Ordering::SeqCst)
    }

    pub fn item_create_count(&self) -> usize {
        self.item_creates.load(Ordering::SeqCst)
    }

    pub fn item_delete_count(&self) -> usize {
        self.item_deletes.load(Ordering::SeqCst)
    }

    pub fn subscription_delete_count(&self) -> usize {
        self.subscription_deletes.load(Ordering::SeqCst)
    }

    fn next_handle(&self) -> u64 {
        self.next_handle.fetch_add(1, Ordering::Relaxed) + 1
    }
}

#[async_trait]
impl SourceClient for SimulatedSourceClient {
    async fn create_subscription(
        &self,
        endpoint: &EndpointDescriptor,
        requested_publishing_interval_ms: u32,
    ) -> Result<(SubscriptionHandle, u32), SourceError> {
        self.subscription_creates.fetch_add(1, Ordering::SeqCst);
        let Ok(mut state) = self.state.lock() else {
            return Err(SourceError::Internal("simulator poisoned".to_string()));
        };
        if state.unreachable {
            return Err(SourceError::EndpointUnreachable(endpoint.url.clone()));
        }
        let handle = SubscriptionHandle(self.next_handle());
        state.subscriptions.insert(handle);
        Ok((handle, requested_publishing_interval_ms))
    }

    async fn create_monitored_item(
        &self,
        subscription: SubscriptionHandle,
        request: &MonitoredItemRequest,
        listener: Arc<dyn NotificationListener>,
    ) -> Result<(MonitoredItemHandle, u32), SourceError> {
        self.item_creates.fetch_add(1, Ordering::SeqCst);
        let Ok(mut state) = self.state.lock() else {
            return Err(SourceError::Internal("simulator poisoned".to_string()));
        };
        if !state.subscriptions.contains(&subscription) {
            return Err(SourceError::Internal(format!(
                "unknown subscription handle {}",
                subscription.0
            )));
        }
        if state.rejected_nodes.contains(&request.node_id) {
            return Err(SourceError::NodeUnknown(request.node_id.clone()));
        }
        let handle = MonitoredItemHandle(self.next_handle());
        state.items.insert(
            handle,
            ActiveItem {
                subscription,
                node_id: request.node_id.clone(),
                listener,
            },
        );
        Ok((handle, request.requested_sampling_interval_ms))
    }

    async fn delete_monitored_item(
        &self,
        _subscription: SubscriptionHandle,
        item: MonitoredItemHandle,
    ) -> Result<(), SourceError> {
        self.item_deletes.fetch_add(1, Ordering::SeqCst);
        let Ok(mut state) = self.state.lock() else {
            return Err(SourceError::Internal("simulator poisoned".to_string()));
        };
        state.items.remove(&item);
        Ok(())
    }

    async fn delete_subscription(
        &self,
        subscription: SubscriptionHandle,
    ) -> Result<(), SourceError> {
        self.subscription_deletes.fetch_add(1, Ordering::SeqCst);
        let Ok(mut state) = self.state.lock() else {
            return Err(SourceError::Internal("simulator poisoned".to_string()));
        };
        state.subscriptions.remove(&subscription);
        // the server releases a subscription's items with it
        state.items.retain(|_, item| item.subscription != subscription);
        Ok(())
    }
}
