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

//! The desired-configuration store: which nodes should be published from
//! which endpoints, with versioned continuation tokens for paged reads.

use crate::control_plane::monitored_item::canonicalize_node_id;
use crate::error::BridgeError;
use crate::source::{EndpointCredentials, EndpointDescriptor, NodeSpec};
use std::collections::BTreeMap;

/// Upper bound on entries returned per paged read.
pub(crate) const PAGE_SIZE: usize = 100;

/// Desired state for one endpoint.
#[derive(Clone, Debug)]
pub(crate) struct DesiredEndpoint {
    pub credentials: Option<EndpointCredentials>,
    pub nodes: Vec<NodeSpec>,
}

impl DesiredEndpoint {
    pub(crate) fn descriptor(&self, url: &str) -> EndpointDescriptor {
        EndpointDescriptor {
            url: url.to_string(),
            credentials: self.credentials.clone(),
        }
    }
}

/// Authoritative desired configuration, keyed by endpoint URL.
///
/// Every successful mutation bumps the version. Continuation tokens
/// embed the version they were minted under, so a page sequence that
/// straddles a mutation fails loudly instead of returning a silently
/// inconsistent listing.
#[derive(Debug, Default)]
pub(crate) struct PublishedNodesStore {
    endpoints: BTreeMap<String, DesiredEndpoint>,
    version: u32,
}

impl PublishedNodesStore {
    /// Adds or replaces nodes on an endpoint, creating the endpoint entry
    /// on first use. A node already configured under the same canonical
    /// identifier is replaced by the incoming spec.
    pub fn upsert(
        &mut self,
        endpoint_url: &str,
        credentials: Option<EndpointCredentials>,
        nodes: Vec<NodeSpec>,
    ) {
        let entry = self
            .endpoints
            .entry(endpoint_url.to_string())
            .or_insert_with(|| DesiredEndpoint {
                credentials: None,
                nodes: Vec::new(),
            });
        if credentials.is_some() {
            entry.credentials = credentials;
        }

        for node in nodes {
            let canonical = canonicalize_node_id(&node.node_id);
            match entry
                .nodes
                .iter()
                .position(|existing| canonicalize_node_id(&existing.node_id) == canonical)
            {
                Some(index) => entry.nodes[index] = node,
                None => entry.nodes.push(node),
            }
        }

        self.version = self.version.wrapping_add(1);
    }

    /// Removes the listed nodes from an endpoint. Node ids not currently
    /// configured are ignored; removing the last node removes the
    /// endpoint entry itself.
    pub fn remove(&mut self, endpoint_url: &str, node_ids: &[String]) -> Result<(), BridgeError> {
        let entry = self
            .endpoints
            .get_mut(endpoint_url)
            .ok_or_else(|| BridgeError::UnknownEndpoint(endpoint_url.to_string()))?;

        let removed: Vec<String> = node_ids.iter().map(|id| canonicalize_node_id(id)).collect();
        entry
            .nodes
            .retain(|node| !removed.contains(&canonicalize_node_id(&node.node_id)));

        if entry.nodes.is_empty() {
            self.endpoints.remove(endpoint_url);
        }
        self.version = self.version.wrapping_add(1);
        Ok(())
    }

    /// Drops one endpoint and every node configured on it.
    pub fn remove_endpoint(&mut self, endpoint_url: &str) -> Result<(), BridgeError> {
        if self.endpoints.remove(endpoint_url).is_none() {
            return Err(BridgeError::UnknownEndpoint(endpoint_url.to_string()));
        }
        self.version = self.version.wrapping_add(1);
        Ok(())
    }

    /// Drops the entire desired configuration.
    pub fn remove_all(&mut self) {
        self.endpoints.clear();
        self.version = self.version.wrapping_add(1);
    }

    pub fn get(&self, endpoint_url: &str) -> Option<&DesiredEndpoint> {
        self.endpoints.get(endpoint_url)
    }

    pub fn iter(&self) -> impl Iterator<Item = (&String, &DesiredEndpoint)> {
        self.endpoints.iter()
    }

    pub fn endpoint_count(&self) -> usize {
        self.endpoints.len()
    }

    /// One page of configured endpoint URLs, in stable (sorted) order.
    pub fn endpoints_page(
        &self,
        continuation: Option<u64>,
    ) -> Result<(Vec<String>, Option<u64>), BridgeError> {
        let start = self.decode_token(continuation)?;
        let urls: Vec<String> = self
            .endpoints
            .keys()
            .skip(start)
            .take(PAGE_SIZE)
            .cloned()
            .collect();
        let next = self.next_token(start, urls.len(), self.endpoints.len());
        Ok((urls, next))
    }

    /// One page of node specs configured on an endpoint.
    pub fn nodes_page(
        &self,
        endpoint_url: &str,
        continuation: Option<u64>,
    ) -> Result<(Vec<NodeSpec>, Option<u64>), BridgeError> {
        let entry = self
            .endpoints
            .get(endpoint_url)
            .ok_or_else(|| BridgeError::UnknownEndpoint(endpoint_url.to_string()))?;

        let start = self.decode_token(continuation)?;
        let nodes: Vec<NodeSpec> = entry
            .nodes
            .iter()
            .skip(start)
            .take(PAGE_SIZE)
            .cloned()
            .collect();
        let next = self.next_token(start, nodes.len(), entry.nodes.len());
        Ok((nodes, next))
    }

    /// Token layout: store version in the high 32 bits, next start index
    /// in the low 32.
    fn decode_token(&self, continuation: Option<u64>) -> Result<usize, BridgeError> {
        let Some(token) = continuation else {
            return Ok(0);
        };
        let version = (token >> 32) as u32;
        if version != self.version {
            return Err(BridgeError::InvalidContinuationToken);
        }
        Ok((token & u64::from(u32::MAX)) as usize)
    }

    fn next_token(&self, start: usize, page_len: usize, total: usize) -> Option<u64> {
        let consumed = start + page_len;
        (consumed < total).then(|| (u64::from(self.version) << 32) | consumed as u64)
    }
}

#[cfg(test)]
mod tests {
    use super::{PublishedNodesStore, PAGE_SIZE};
    use crate::error::BridgeError;
    use crate::source::NodeSpec;

    fn node(node_id: &str) -> NodeSpec {
        NodeSpec {
            node_id: node_id.to_string(),
            display_name: None,
            sampling_interval_ms: None,
            publishing_interval_ms: None,
        }
    }

    #[test]
    fn upsert_replaces_nodes_with_the_same_canonical_id() {
        let mut store = PublishedNodesStore::default();
        store.upsert("opc.tcp://plant:4840", None, vec![node("ns=2;i=1")]);

        let updated = NodeSpec {
            sampling_interval_ms: Some(250),
            ..node(" ns=2;i=1 ")
        };
        store.upsert("opc.tcp://plant:4840", None, vec![updated]);

        let entry = store.get("opc.tcp://plant:4840").expect("endpoint exists");
        assert_eq!(entry.nodes.len(), 1);
        assert_eq!(entry.nodes[0].sampling_interval_ms, Some(250));
    }

    #[test]
    fn removing_the_last_node_removes_the_endpoint() {
        let mut store = PublishedNodesStore::default();
        store.upsert("opc.tcp://plant:4840", None, vec![node("ns=2;i=1")]);

        store
            .remove("opc.tcp://plant:4840", &["ns=2;i=1".to_string()])
            .expect("endpoint known");

        assert!(store.get("opc.tcp://plant:4840").is_none());
        assert_eq!(store.endpoint_count(), 0);
    }

    #[test]
    fn remove_on_unknown_endpoint_is_an_error() {
        let mut store = PublishedNodesStore::default();

        let result = store.remove("opc.tcp://nowhere:4840", &["ns=2;i=1".to_string()]);
        assert!(matches!(result, Err(BridgeError::UnknownEndpoint(_))));
    }

    #[test]
    fn endpoints_page_walks_the_full_listing_in_order() {
        let mut store = PublishedNodesStore::default();
        for index in 0..(PAGE_SIZE + 3) {
            store.upsert(&format!("opc.tcp://srv{index:03}"), None, vec![node("ns=2;i=1")]);
        }

        let (first, token) = store.endpoints_page(None).expect("first page");
        assert_eq!(first.len(), PAGE_SIZE);
        let token = token.expect("more pages remain");

        let (second, token) = store.endpoints_page(Some(token)).expect("second page");
        assert_eq!(second.len(), 3);
        assert!(token.is_none());

        assert_eq!(first[0], "opc.tcp://srv000");
        assert_eq!(second[2], format!("opc.tcp://srv{:03}", PAGE_SIZE + 2));
    }

    #[test]
    fn continuation_token_goes_stale_after_a_mutation() {
        let mut store = PublishedNodesStore::default();
        for index in 0..(PAGE_SIZE + 1) {
            store.upsert(&format!("opc.tcp://srv{index:03}"), None, vec![node("ns=2;i=1")]);
        }
        let (_, token) = store.endpoints_page(None).expect("first page");
        let token = token.expect("more pages remain");

        store.upsert("opc.tcp://new:4840", None, vec![node("ns=2;i=1")]);

        assert!(matches!(
            store.endpoints_page(Some(token)),
            Err(BridgeError::InvalidContinuationToken)
        ));
    }

    #[test]
    fn nodes_page_lists_configured_specs() {
        let mut store = PublishedNodesStore::default();
        store.upsert(
            "opc.tcp://plant:4840",
            None,
            vec![node("ns=2;i=1"), node("ns=2;i=2")],
        );

        let (nodes, token) = store
            .nodes_page("opc.tcp://plant:4840", None)
            .expect("endpoint known");
        assert_eq!(nodes.len(), 2);
        assert!(token.is_none());

        assert!(store.nodes_page("opc.tcp://other:4840", None).is_err());
    }

    #[test]
    fn remove_endpoint_drops_only_that_endpoint() {
        let mut store = PublishedNodesStore::default();
        store.upsert("opc.tcp://plant:4840", None, vec![node("ns=2;i=1")]);
        store.upsert("opc.tcp://lab:4840", None, vec![node("ns=2;i=2")]);

        store
            .remove_endpoint("opc.tcp://plant:4840")
            .expect("endpoint known");

        assert!(store.get("opc.tcp://plant:4840").is_none());
        assert!(store.get("opc.tcp://lab:4840").is_some());
        assert!(matches!(
            store.remove_endpoint("opc.tcp://plant:4840"),
            Err(BridgeError::UnknownEndpoint(_))
        ));
    }

    #[test]
    fn remove_all_clears_everything() {
        let mut store = PublishedNodesStore::default();
        store.upsert("opc.tcp://plant:4840", None, vec![node("ns=2;i=1")]);

        store.remove_all();
        assert_eq!(store.endpoint_count(), 0);
    }
}
