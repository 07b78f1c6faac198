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

//! `hub-bridge` moves value-change notifications from an industrial
//! data source into a cloud message hub.
//!
//! Many source-side notification callbacks feed one bounded,
//! non-blocking [`data_plane::NotificationQueue`]; a single batch-sender
//! task drains it on a timer into size-capped JSON batches handed to a
//! [`hub::HubTransport`]. The control plane keeps live subscriptions and
//! monitored items converged to a versioned desired-node store, and the
//! diagnostics module exposes counters, a bounded log ring, and a
//! periodic status reporter.
//!
//! The source-protocol stack and the hub client are injected
//! collaborators behind the [`source::SourceClient`] and
//! [`hub::HubTransport`] traits; everything in between is owned by
//! [`HubBridge`].

pub mod control_plane;
pub mod data_plane;
pub mod diagnostics;
pub mod error;
pub mod hub;
pub mod message;
pub mod observability;
pub mod source;
pub mod telemetry;

mod bridge;

pub use bridge::{BridgeSettings, HubBridge};
