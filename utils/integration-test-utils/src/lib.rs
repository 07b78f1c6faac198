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

//! Mock collaborators for `hub-bridge` tests: a scripted source stack
//! and a recording hub transport.

mod recording_hub;
mod simulated_source;

pub use recording_hub::RecordingHubTransport;
pub use simulated_source::SimulatedSourceClient;
