//! Bounded diagnostic log ring with a separate unbounded startup phase.
//!
//! Diagnostic text is best-effort and recency-biased: when the ring is
//! full the oldest line is evicted and counted as missed. This is the
//! opposite policy of the notification queue, which fails the newest
//! enqueue instead, since data points are not best-effort.

use serde::Serialize;
use std::collections::VecDeque;
use std::sync::Mutex;

pub const DEFAULT_LOG_CAPACITY: usize = 100;

#[derive(Debug, Default)]
struct LogState {
    startup: Vec<String>,
    startup_completed: bool,
    startup_replayed: bool,
    ring: VecDeque<String>,
    missed_message_count: u64,
}

/// Thread-safe diagnostic log sink, guarded by its own mutex independent
/// of the notification queue's.
#[derive(Debug)]
pub struct DiagnosticLog {
    state: Mutex<LogState>,
    capacity: usize,
}

impl DiagnosticLog {
    pub fn new(capacity: usize) -> Self {
        Self {
            state: Mutex::new(LogState::default()),
            capacity,
        }
    }

    /// Log ingestion entry point used by the logging subsystem's sink
    /// adapter. Before startup completes lines accumulate unbounded;
    /// afterwards they flow into the ring, evicting the oldest at
    /// capacity.
    pub fn write(&self, line: impl Into<String>) {
        let Ok(mut state) = self.state.lock() else {
            return;
        };

        if !state.startup_completed {
            state.startup.push(line.into());
            return;
        }

        if state.ring.len() >= self.capacity {
            state.ring.pop_front();
            state.missed_message_count += 1;
        }
        state.ring.push_back(line.into());
    }

    /// Switches from the startup phase to the bounded ring.
    pub fn complete_startup(&self) {
        if let Ok(mut state) = self.state.lock() {
            state.startup_completed = true;
        }
    }

    /// Drains the ring into a snapshot. The startup log is replayed on
    /// the first read only; later snapshots report its count but not its
    /// lines again.
    pub fn snapshot(&self) -> DiagnosticLogSnapshot {
        let Ok(mut state) = self.state.lock() else {
            return DiagnosticLogSnapshot::default();
        };

        let startup_log = if state.startup_replayed {
            Vec::new()
        } else {
            state.startup_replayed = true;
            state.startup.clone()
        };

        let log: Vec<String> = state.ring.drain(..).collect();

        DiagnosticLogSnapshot {
            missed_message_count: state.missed_message_count,
            log_message_count: log.len() as u64,
            startup_log_message_count: state.startup.len() as u64,
            startup_log,
            log,
        }
    }
}

impl Default for DiagnosticLog {
    fn default() -> Self {
        Self::new(DEFAULT_LOG_CAPACITY)
    }
}

/// Pull-based view returned by the diagnostic-log entry point.
#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize)]
pub struct DiagnosticLogSnapshot {
    pub missed_message_count: u64,
    pub log_message_count: u64,
    pub startup_log_message_count: u64,
    pub startup_log: Vec<String>,
    pub log: Vec<String>,
}

#[cfg(test)]
mod tests {
    use super::DiagnosticLog;

    #[test]
    fn startup_lines_accumulate_unbounded_and_replay_once() {
        let log = DiagnosticLog::new(2);
        for i in 0..5 {
            log.write(format!("startup {i}"));
        }
        log.complete_startup();

        let first = log.snapshot();
        assert_eq!(first.startup_log.len(), 5);
        assert_eq!(first.startup_log_message_count, 5);
        assert_eq!(first.missed_message_count, 0);

        let second = log.snapshot();
        assert!(second.startup_log.is_empty());
        assert_eq!(second.startup_log_message_count, 5);
    }

    #[test]
    fn ring_evicts_oldest_and_counts_missed() {
        let log = DiagnosticLog::new(2);
        log.complete_startup();

        log.write("one");
        log.write("two");
        log.write("three");

        let snapshot = log.snapshot();
        assert_eq!(snapshot.log, vec!["two".to_string(), "three".to_string()]);
        assert_eq!(snapshot.missed_message_count, 1);
        assert_eq!(snapshot.log_message_count, 2);
    }

    #[test]
    fn snapshot_drains_the_ring() {
        let log = DiagnosticLog::new(4);
        log.complete_startup();
        log.write("line");

        assert_eq!(log.snapshot().log.len(), 1);
        assert!(log.snapshot().log.is_empty());
    }
}
