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

//! Process-wide pipeline counters.
//!
//! One shared object passed by `Arc` to every component that updates it.
//! Counters are monotonically increasing `u64`s, reset only by process
//! restart; gauges are point-in-time values refreshed by reconciliation
//! and read live from the queue.

use chrono::{DateTime, Utc};
use serde::Serialize;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Mutex;

/// Shared counter set updated by producers, the batch sender, and
/// reconciliation. All updates are atomic; concurrent writers never lose
/// increments.
#[derive(Debug, Default)]
pub struct PipelineCounters {
    enqueue_count: AtomicU64,
    enqueue_failure_count: AtomicU64,
    dequeued_items: AtomicU64,
    sent_messages: AtomicU64,
    sent_bytes: AtomicU64,
    failed_messages: AtomicU64,
    too_large_count: AtomicU64,
    missed_send_interval_count: AtomicU64,

    num_sessions: AtomicU64,
    num_connected_sessions: AtomicU64,
    num_subscriptions: AtomicU64,
    num_monitored_items: AtomicU64,

    sent_last_time: Mutex<Option<DateTime<Utc>>>,
}

impl PipelineCounters {
    pub fn record_enqueue_attempt(&self) {
        self.enqueue_count.fetch_add(1, Ordering::Relaxed);
    }

    pub fn record_enqueue_failure(&self) {
        self.enqueue_failure_count.fetch_add(1, Ordering::Relaxed);
    }

    pub fn record_dequeued_item(&self) {
        self.dequeued_items.fetch_add(1, Ordering::Relaxed);
    }

    pub fn record_sent_message(&self, bytes: u64) {
        self.sent_messages.fetch_add(1, Ordering::Relaxed);
        self.sent_bytes.fetch_add(bytes, Ordering::Relaxed);
        if let Ok(mut last) = self.sent_last_time.lock() {
            *last = Some(Utc::now());
        }
    }

    pub fn record_send_failure(&self) {
        self.failed_messages.fetch_add(1, Ordering::Relaxed);
    }

    pub fn record_oversize_drop(&self) {
        self.too_large_count.fetch_add(1, Ordering::Relaxed);
    }

    pub fn record_missed_send_interval(&self) {
        self.missed_send_interval_count.fetch_add(1, Ordering::Relaxed);
    }

    pub fn set_session_gauges(
        &self,
        sessions: u64,
        connected_sessions: u64,
        subscriptions: u64,
        monitored_items: u64,
    ) {
        self.num_sessions.store(sessions, Ordering::Relaxed);
        self.num_connected_sessions
            .store(connected_sessions, Ordering::Relaxed);
        self.num_subscriptions.store(subscriptions, Ordering::Relaxed);
        self.num_monitored_items
            .store(monitored_items, Ordering::Relaxed);
    }

    pub fn enqueue_failure_count(&self) -> u64 {
        self.enqueue_failure_count.load(Ordering::Relaxed)
    }

    /// Takes an atomic-read snapshot; never fails, best effort across
    /// concurrently updating counters.
    pub fn snapshot(&self, queue_capacity: u64, queue_depth: u64) -> DiagnosticInfo {
        DiagnosticInfo {
            enqueue_count: self.enqueue_count.load(Ordering::Relaxed),
            enqueue_failure_count: self.enqueue_failure_count.load(Ordering::Relaxed),
            dequeued_items: self.dequeued_items.load(Ordering::Relaxed),
            sent_messages: self.sent_messages.load(Ordering::Relaxed),
            sent_bytes: self.sent_bytes.load(Ordering::Relaxed),
            failed_messages: self.failed_messages.load(Ordering::Relaxed),
            too_large_count: self.too_large_count.load(Ordering::Relaxed),
            missed_send_interval_count: self.missed_send_interval_count.load(Ordering::Relaxed),
            num_sessions: self.num_sessions.load(Ordering::Relaxed),
            num_connected_sessions: self.num_connected_sessions.load(Ordering::Relaxed),
            num_subscriptions: self.num_subscriptions.load(Ordering::Relaxed),
            num_monitored_items: self.num_monitored_items.load(Ordering::Relaxed),
            queue_capacity,
            queue_depth,
            sent_last_time: self
                .sent_last_time
                .lock()
                .ok()
                .and_then(|last| *last),
        }
    }
}

/// Point-in-time view of every counter and gauge.
#[derive(Clone, Debug, PartialEq, Eq, Serialize)]
pub struct DiagnosticInfo {
    pub enqueue_count: u64,
    pub enqueue_failure_count: u64,
    pub dequeued_items: u64,
    pub sent_messages: u64,
    pub sent_bytes: u64,
    pub failed_messages: u64,
    pub too_large_count: u64,
    pub missed_send_interval_count: u64,
    pub num_sessions: u64,
    pub num_connected_sessions: u64,
    pub num_subscriptions: u64,
    pub num_monitored_items: u64,
    pub queue_capacity: u64,
    pub queue_depth: u64,
    pub sent_last_time: Option<DateTime<Utc>>,
}

impl DiagnosticInfo {
    /// Formats the multi-line status report emitted by the periodic
    /// reporter.
    pub fn render_report(&self) -> Vec<String> {
        vec![
            "==========================================================================".to_string(),
            format!(
                "OpcSessions: {} (connected: {}), OpcSubscriptions: {}, MonitoredItems: {}",
                self.num_sessions,
                self.num_connected_sessions,
                self.num_subscriptions,
                self.num_monitored_items
            ),
            format!(
                "Queue: {}/{} items, enqueued: {}, lost: {}",
                self.queue_depth, self.queue_capacity, self.enqueue_count, self.enqueue_failure_count
            ),
            format!(
                "Hub: sent {} messages / {} bytes, failed: {}, too large: {}, missed intervals: {}",
                self.sent_messages,
                self.sent_bytes,
                self.failed_messages,
                self.too_large_count,
                self.missed_send_interval_count
            ),
            format!(
                "Last successful send: {}",
                self.sent_last_time
                    .map(|at| at.to_rfc3339())
                    .unwrap_or_else(|| "never".to_string())
            ),
        ]
    }
}
