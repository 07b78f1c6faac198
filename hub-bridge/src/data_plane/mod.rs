//! The notification-to-message data path: bounded ingestion queue and
//! the batching hub sender.

mod batch_sender;
mod notification_queue;

pub(crate) use batch_sender::BatchSender;
pub use notification_queue::NotificationQueue;
