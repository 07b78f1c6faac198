//! Desired-configuration ownership and the reconciliation lifecycle that
//! converges live subscriptions/monitored items to it.

mod desired_nodes;
mod monitored_item;
mod session;
mod subscription;

pub(crate) use desired_nodes::PublishedNodesStore;
pub use monitored_item::DEFAULT_SAMPLING_INTERVAL_MS;
pub use subscription::DEFAULT_PUBLISHING_INTERVAL_MS;
pub use monitored_item::{ConfiguredIdFormat, MonitoredItem, MonitoredItemState, MonitoringMode};
pub use session::{NodeOutcome, Session};
pub use subscription::Subscription;
