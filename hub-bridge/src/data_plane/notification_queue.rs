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

//! Bounded, non-blocking ingestion queue between notification callbacks
//! and the batch sender.

use crate::diagnostics::PipelineCounters;
use crate::message::MessageData;
use std::collections::VecDeque;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex};

/// Many-producer, single-consumer FIFO with a static capacity.
///
/// Producers are notification callbacks running on the source stack's
/// delivery threads: they must never block, so a full queue fails the
/// enqueue immediately and the item is lost: counted, never silent.
/// Counter updates happen inside the same locked section as the queue
/// mutation, so depth and counts never drift apart under concurrency.
#[derive(Debug)]
pub struct NotificationQueue {
    items: Mutex<VecDeque<MessageData>>,
    capacity: usize,
    closed: AtomicBool,
    counters: Arc<PipelineCounters>,
}

impl NotificationQueue {
    pub fn new(capacity: usize, counters: Arc<PipelineCounters>) -> Self {
        Self {
            items: Mutex::new(VecDeque::with_capacity(capacity)),
            capacity,
            closed: AtomicBool::new(false),
            counters,
        }
    }

    /// Attempts to enqueue without blocking. Returns `false` when the
    /// queue is at capacity or admission is closed; the item is dropped
    /// and the failure counter incremented.
    pub fn try_enqueue(&self, item: MessageData) -> bool {
        self.counters.record_enqueue_attempt();

        if self.closed.load(Ordering::Acquire) {
            self.counters.record_enqueue_failure();
            return false;
        }

        let Ok(mut items) = self.items.lock() else {
            self.counters.record_enqueue_failure();
            return false;
        };

        if items.len() >= self.capacity {
            self.counters.record_enqueue_failure();
            return false;
        }

        items.push_back(item);
        true
    }

    /// Non-blocking pop used by the single consumer; `None` when empty.
    pub fn dequeue(&self) -> Option<MessageData> {
        self.items.lock().ok()?.pop_front()
    }

    /// Returns an item to the head of the queue.
    ///
    /// Consumer-only: used when a dequeued item does not fit the current
    /// batch and must be first out on the next flush. FIFO order is
    /// preserved because the single consumer is the only caller.
    pub(crate) fn requeue_front(&self, item: MessageData) {
        if let Ok(mut items) = self.items.lock() {
            items.push_front(item);
        }
    }

    /// Stops admitting notifications; every later enqueue is a counted
    /// no-op failure. Already-queued items stay readable.
    pub fn close(&self) {
        self.closed.store(true, Ordering::Release);
    }

    pub fn len(&self) -> usize {
        self.items.lock().map(|items| items.len()).unwrap_or(0)
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    pub fn capacity(&self) -> usize {
        self.capacity
    }

    pub(crate) fn counters(&self) -> &PipelineCounters {
        &self.counters
    }
}
