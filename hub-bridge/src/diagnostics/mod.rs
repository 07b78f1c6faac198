//! Operational counters, the diagnostic log ring, and the periodic
//! status reporter.

mod counters;
mod log_buffer;
mod reporter;

pub use counters::{DiagnosticInfo, PipelineCounters};
pub use log_buffer::{DiagnosticLog, DiagnosticLogSnapshot, DEFAULT_LOG_CAPACITY};
pub(crate) use reporter::spawn_reporter;
