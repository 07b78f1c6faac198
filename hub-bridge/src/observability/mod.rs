//! Structured logging conventions shared across the bridge.

pub mod events;
