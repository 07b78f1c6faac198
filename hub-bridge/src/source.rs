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

//! Contract with the source-protocol stack that owns sessions, wire
//! encoding, and notification delivery.

use crate::error::SourceError;
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use serde::Deserialize;
use std::sync::Arc;

/// Opaque handle to a subscription created on the stack.
#[derive(Clone, Copy, Debug, Eq, Hash, PartialEq)]
pub struct SubscriptionHandle(pub u64);

/// Opaque handle to a monitored item created on the stack.
#[derive(Clone, Copy, Debug, Eq, Hash, PartialEq)]
pub struct MonitoredItemHandle(pub u64);

/// One desired data point as configured by the operator.
#[derive(Clone, Debug, Deserialize, PartialEq, Eq)]
#[serde(deny_unknown_fields)]
pub struct NodeSpec {
    /// Node identifier in namespace-index (`ns=2;i=55`) or namespace-URI
    /// (`nsu=http://...;i=55`) form.
    pub node_id: String,
    #[serde(default)]
    pub display_name: Option<String>,
    /// Requested sampling interval; the stack may negotiate another value.
    #[serde(default)]
    pub sampling_interval_ms: Option<u32>,
    /// Requested publishing interval; nodes sharing one value share one
    /// subscription on their endpoint.
    #[serde(default)]
    pub publishing_interval_ms: Option<u32>,
}

/// Credentials presented to the stack when a session is established.
#[derive(Clone, Debug, Deserialize, PartialEq, Eq)]
#[serde(deny_unknown_fields)]
pub struct EndpointCredentials {
    pub username: String,
    pub password: String,
}

/// Endpoint identity handed to the stack for session establishment.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct EndpointDescriptor {
    pub url: String,
    pub credentials: Option<EndpointCredentials>,
}

/// Creation request for one monitored item on an existing subscription.
#[derive(Clone, Debug)]
pub struct MonitoredItemRequest {
    pub node_id: String,
    /// Attribute to sample on the node (the value attribute, 13).
    pub attribute_id: u32,
    pub requested_sampling_interval_ms: u32,
    /// Depth of the stack's own per-item buffer.
    pub queue_size: u32,
    /// Drop-oldest policy for the stack's per-item buffer.
    pub discard_oldest: bool,
}

/// One raw value-change notification as delivered by the stack.
#[derive(Clone, Debug, PartialEq)]
pub struct SourceNotification {
    pub value: String,
    /// True when the source value is string-typed.
    pub value_is_string: bool,
    pub source_timestamp: DateTime<Utc>,
    pub status_code: Option<u32>,
    pub status: Option<String>,
    /// Application URI of the originating server, when known.
    pub application_uri: Option<String>,
}

/// Receives notifications for one monitored item.
///
/// Invoked on the stack's own delivery thread: implementations must
/// complete quickly, must not block, and must not panic across the
/// callback boundary.
pub trait NotificationListener: Send + Sync {
    fn on_notification(&self, item: MonitoredItemHandle, notification: SourceNotification);
}

/// Async facade over the source-protocol stack.
///
/// Connection/session establishment, security negotiation, and retry all
/// live behind this trait; the bridge only drives lifecycle and records
/// whatever intervals the stack reports back.
#[async_trait]
pub trait SourceClient: Send + Sync {
    /// Creates a subscription; returns its handle and the negotiated
    /// publishing interval, which may differ from the requested one.
    async fn create_subscription(
        &self,
        endpoint: &EndpointDescriptor,
        requested_publishing_interval_ms: u32,
    ) -> Result<(SubscriptionHandle, u32), SourceError>;

    /// Creates a monitored item on a subscription; returns its handle and
    /// the negotiated sampling interval. Notifications for the item are
    /// delivered to `listener` until the item is deleted.
    async fn create_monitored_item(
        &self,
        subscription: SubscriptionHandle,
        request: &MonitoredItemRequest,
        listener: Arc<dyn NotificationListener>,
    ) -> Result<(MonitoredItemHandle, u32), SourceError>;

    async fn delete_monitored_item(
        &self,
        subscription: SubscriptionHandle,
        item: MonitoredItemHandle,
    ) -> Result<(), SourceError>;

    async fn delete_subscription(
        &self,
        subscription: SubscriptionHandle,
    ) -> Result<(), SourceError>;
}
