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

//! Contract with the message-hub transport collaborator.

use crate::error::HubError;
use async_trait::async_trait;

/// Async facade over the hub client.
///
/// The transport owns connection lifecycle, authentication, and any
/// retry/backoff for transient network errors. The pipeline hands over
/// one batch at a time and treats any error as a single terminal failure
/// for that batch (at-most-once delivery).
#[async_trait]
pub trait HubTransport: Send + Sync {
    /// Sends one encoded batch. The payload never exceeds the maximum
    /// message size the pipeline was configured with.
    async fn send(&self, payload: Vec<u8>) -> Result<(), HubError>;
}
