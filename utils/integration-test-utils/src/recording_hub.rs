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
use hub_bridge::error::HubError;
use hub_bridge::hub::HubTransport;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Mutex;

/// Hub transport double that records every batch it accepts.
///
/// Flip `set_failing(true)` to make every send fail with
/// [`HubError::NotConnected`] until flipped back.
#[derive(Debug, Default)]
pub struct RecordingHubTransport {
    batches: Mutex<Vec<Vec<u8>>>,
    failing: AtomicBool,
}

impl RecordingHubTransport {
    pub fn set_failing(&self, failing: bool) {
        self.failing.store(failing, Ordering::SeqCst);
    }

    pub fn batch_count(&self) -> usize {
        self.batches.lock().map(|batches| batches.len()).unwrap_or(0)
    }

    /// Accepted batches decoded as UTF-8 strings, in send order.
    pub fn batches(&self) -> Vec<String> {
        self.batches
            .lock()
            .map(|batches| {
                batches
                    .iter()
                    .map(|bytes| String::from_utf8_lossy(bytes).into_owned())
                    .collect()
            })
            .unwrap_or_default()
    }
}

#[async_trait]
impl HubTransport for RecordingHubTransport {
    async fn send(&self, payload: Vec<u8>) -> Result<(), HubError> {
        if self.failing.load(Ordering::SeqCst) {
            return Err(HubError::NotConnected);
        }
        if let Ok(mut batches) = self.batches.lock() {
            batches.push(payload);
        }
        Ok(())
    }
}
