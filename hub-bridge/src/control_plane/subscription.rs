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

//! A publishing-interval group of monitored items on one session.

use crate::control_plane::monitored_item::MonitoredItem;
use crate::source::SubscriptionHandle;

pub const DEFAULT_PUBLISHING_INTERVAL_MS: u32 = 1000;

/// One stack-side subscription and the monitored items grouped under it.
///
/// Items land on the subscription whose *requested* publishing interval
/// equals theirs; the negotiated value the stack reports back is recorded
/// but never used for matching, so a server that rounds intervals cannot
/// split one configured group across subscriptions.
#[derive(Debug)]
pub struct Subscription {
    pub requested_publishing_interval_ms: u32,
    /// True when the publishing interval was requested by configuration.
    pub publishing_interval_from_config: bool,
    pub negotiated_publishing_interval_ms: Option<u32>,
    pub handle: Option<SubscriptionHandle>,
    pub items: Vec<MonitoredItem>,
}

impl Subscription {
    pub(crate) fn new(requested_publishing_interval_ms: u32, from_config: bool) -> Self {
        Self {
            requested_publishing_interval_ms,
            publishing_interval_from_config: from_config,
            negotiated_publishing_interval_ms: None,
            handle: None,
            items: Vec::new(),
        }
    }

    /// Finds an item by its canonical node identifier.
    pub(crate) fn find_item_mut(&mut self, canonical_node_id: &str) -> Option<&mut MonitoredItem> {
        self.items
            .iter_mut()
            .find(|item| item.canonical_node_id == canonical_node_id)
    }

    pub fn active_item_count(&self) -> usize {
        self.items.iter().filter(|item| item.is_active()).count()
    }
}

#[cfg(test)]
mod tests {
    use super::{Subscription, DEFAULT_PUBLISHING_INTERVAL_MS};
    use crate::control_plane::monitored_item::{MonitoredItem, MonitoredItemState};
    use crate::source::NodeSpec;

    fn item(node_id: &str) -> MonitoredItem {
        MonitoredItem::from_spec(
            &NodeSpec {
                node_id: node_id.to_string(),
                display_name: None,
                sampling_interval_ms: None,
                publishing_interval_ms: None,
            },
            "opc.tcp://plant:4840",
        )
    }

    #[test]
    fn find_item_matches_on_canonical_node_id() {
        let mut subscription = Subscription::new(DEFAULT_PUBLISHING_INTERVAL_MS, false);
        subscription.items.push(item("ns=2;i=55"));

        assert!(subscription.find_item_mut("ns=2;i=55").is_some());
        assert!(subscription.find_item_mut("ns=2;i=56").is_none());
    }

    #[test]
    fn active_item_count_excludes_removal_and_errored() {
        let mut subscription = Subscription::new(DEFAULT_PUBLISHING_INTERVAL_MS, false);
        subscription.items.push(item("ns=2;i=1"));
        subscription.items.push(item("ns=2;i=2"));
        subscription.items.push(item("ns=2;i=3"));
        subscription.items[1].state = MonitoredItemState::RemovalRequested;
        subscription.items[2].state = MonitoredItemState::Errored;

        assert_eq!(subscription.active_item_count(), 1);
    }
}
