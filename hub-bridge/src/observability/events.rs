//! Canonical structured event names used across `hub-bridge`.

// Queue and batch-sender events.
pub const ENQUEUE_REJECTED: &str = "enqueue_rejected";
pub const BATCH_SEND_OK: &str = "batch_send_ok";
pub const BATCH_SEND_FAILED: &str = "batch_send_failed";
pub const BATCH_ITEM_OVERSIZE: &str = "batch_item_oversize";
pub const SEND_INTERVAL_MISSED: &str = "send_interval_missed";
pub const BATCH_SENDER_STOPPED: &str = "batch_sender_stopped";

// Reconciliation and session lifecycle events.
pub const RECONCILE_START: &str = "reconcile_start";
pub const RECONCILE_OK: &str = "reconcile_ok";
pub const SUBSCRIPTION_CREATE_OK: &str = "subscription_create_ok";
pub const SUBSCRIPTION_CREATE_FAILED: &str = "subscription_create_failed";
pub const SUBSCRIPTION_DELETE_FAILED: &str = "subscription_delete_failed";
pub const ITEM_CREATE_OK: &str = "item_create_ok";
pub const ITEM_CREATE_FAILED: &str = "item_create_failed";
pub const ITEM_REMOVE_OK: &str = "item_remove_ok";
pub const ITEM_REMOVE_FAILED: &str = "item_remove_failed";
pub const SESSION_TEARDOWN: &str = "session_teardown";

// Diagnostics events.
pub const REPORTER_STOPPED: &str = "reporter_stopped";
pub const SHUTDOWN_START: &str = "shutdown_start";
pub const SHUTDOWN_COMPLETE: &str = "shutdown_complete";
