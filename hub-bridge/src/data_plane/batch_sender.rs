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

//! The single consumer task: drains the notification queue into
//! size-bounded hub messages on a timer.

use crate::data_plane::NotificationQueue;
use crate::diagnostics::PipelineCounters;
use crate::hub::HubTransport;
use crate::observability::events;
use crate::telemetry::TelemetryRegistry;
use std::sync::Arc;
use std::time::Duration;
use tokio::task::JoinHandle;
use tokio::time::{Instant, MissedTickBehavior};
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};

const COMPONENT: &str = "batch_sender";

// A batch is a JSON array: two bytes of brackets plus one comma per
// additional item.
const BATCH_FRAMING_BYTES: usize = 2;

/// Owns the flush loop between the queue and the hub transport.
///
/// Exactly one instance runs per bridge. A flush attempt happens at
/// least once per send interval; batches are at-most-once (a failed
/// send drops the batch and the pipeline moves on).
pub(crate) struct BatchSender {
    queue: Arc<NotificationQueue>,
    hub: Arc<dyn HubTransport>,
    telemetry: Arc<TelemetryRegistry>,
    counters: Arc<PipelineCounters>,
    send_interval: Duration,
    max_message_bytes: usize,
}

impl BatchSender {
    pub(crate) fn new(
        queue: Arc<NotificationQueue>,
        hub: Arc<dyn HubTransport>,
        telemetry: Arc<TelemetryRegistry>,
        counters: Arc<PipelineCounters>,
        send_interval: Duration,
        max_message_bytes: usize,
    ) -> Self {
        Self {
            queue,
            hub,
            telemetry,
            counters,
            send_interval,
            max_message_bytes,
        }
    }

    pub(crate) fn spawn(self, cancellation: CancellationToken) -> JoinHandle<()> {
        tokio::spawn(self.run(cancellation))
    }

    async fn run(self, cancellation: CancellationToken) {
        let mut ticker = tokio::time::interval(self.send_interval);
        ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);
        // discard the immediate first tick so the first flush happens one
        // interval after startup
        ticker.tick().await;

        loop {
            tokio::select! {
                _ = cancellation.cancelled() => break,
                _ = ticker.tick() => {}
            }

            let flush_started = Instant::now();
            self.flush().await;
            if flush_started.elapsed() > self.send_interval {
                self.counters.record_missed_send_interval();
                warn!(
                    event = events::SEND_INTERVAL_MISSED,
                    component = COMPONENT,
                    interval_ms = self.send_interval.as_millis() as u64,
                    "flush took longer than the send interval; consumer cannot keep up"
                );
            }
        }

        info!(
            event = events::BATCH_SENDER_STOPPED,
            component = COMPONENT,
            undrained = self.queue.len(),
            "batch sender stopped; undrained items are discarded"
        );
    }

    /// One flush attempt: build at most one batch from the queue head and
    /// hand it to the hub transport. An item that does not fit goes back
    /// to the queue head for the next flush.
    pub(crate) async fn flush(&self) {
        let Some(payload) = self.collect_batch() else {
            return;
        };

        let payload_len = payload.len() as u64;
        match self.hub.send(payload).await {
            Ok(()) => {
                self.counters.record_sent_message(payload_len);
                debug!(
                    event = events::BATCH_SEND_OK,
                    component = COMPONENT,
                    bytes = payload_len,
                    "batch sent"
                );
            }
            Err(err) => {
                self.counters.record_send_failure();
                warn!(
                    event = events::BATCH_SEND_FAILED,
                    component = COMPONENT,
                    bytes = payload_len,
                    err = %err,
                    "hub send failed; batch dropped"
                );
            }
        }
    }

    fn collect_batch(&self) -> Option<Vec<u8>> {
        let mut body = String::from("[");
        let mut item_count = 0usize;

        while let Some(item) = self.queue.dequeue() {
            let endpoint_telemetry = self.telemetry.for_endpoint(&item.owner_endpoint);
            let serialized = item.to_json(endpoint_telemetry.field_names());

            // an item that cannot even fit alone can never be sent
            if serialized.len() + BATCH_FRAMING_BYTES > self.max_message_bytes {
                self.counters.record_dequeued_item();
                self.counters.record_oversize_drop();
                warn!(
                    event = events::BATCH_ITEM_OVERSIZE,
                    component = COMPONENT,
                    item_bytes = serialized.len(),
                    max_message_bytes = self.max_message_bytes,
                    node_id = item.node_id.as_deref().unwrap_or("unset"),
                    "item larger than any possible hub message; dropped"
                );
                continue;
            }

            let separator = usize::from(item_count > 0);
            if body.len() + separator + serialized.len() + 1 > self.max_message_bytes {
                // batch is full; this item leads the next flush
                self.queue.requeue_front(item);
                break;
            }

            if item_count > 0 {
                body.push(',');
            }
            body.push_str(&serialized);
            item_count += 1;
            self.counters.record_dequeued_item();
        }

        if item_count == 0 {
            return None;
        }

        body.push(']');
        Some(body.into_bytes())
    }
}
