//! Security event logging.
//!
//! Every detected threat is reported to a query-activity log supplied by the
//! host. Recording is best-effort: a failing or panicking log is swallowed so
//! that the availability of the safety gate never depends on the sink.

use crate::constants::{DEFAULT_ACTIVITY_LOG_CAPACITY, SECURITY_EVENT_PREVIEW_LENGTH};
use crate::error::GuardError;
use crate::security::ThreatCategory;
use chrono::{DateTime, Utc};
use parking_lot::Mutex;
use serde::{Deserialize, Serialize};
use std::collections::VecDeque;
use std::panic::{self, AssertUnwindSafe};
use std::sync::Arc;
use tracing::{debug, info};

/// Classification of security events.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SecurityEventType {
    /// A threat pattern matched raw query text.
    ThreatDetected,
}

/// A structured security event record.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SecurityEvent {
    /// Event classification.
    pub event_type: SecurityEventType,
    /// Threat category that matched.
    pub query_type: ThreatCategory,
    /// Original query text, truncated to a bounded preview.
    pub sql: String,
    /// When the event occurred.
    pub timestamp: DateTime<Utc>,
}

impl SecurityEvent {
    /// Create a threat event for `query` with the current timestamp.
    pub fn threat_detected(category: ThreatCategory, query: &str) -> Self {
        Self {
            event_type: SecurityEventType::ThreatDetected,
            query_type: category,
            sql: truncate_for_log(query, SECURITY_EVENT_PREVIEW_LENGTH),
            timestamp: Utc::now(),
        }
    }
}

/// A sink for query-activity records, implemented by the host.
pub trait QueryActivityLog: Send + Sync {
    fn record(&self, event: &SecurityEvent) -> Result<(), GuardError>;
}

/// Best-effort wrapper around a [`QueryActivityLog`].
///
/// [`notify`](Self::notify) never fails and never unwinds into the caller.
#[derive(Clone)]
pub struct BestEffortSink {
    inner: Arc<dyn QueryActivityLog>,
}

impl BestEffortSink {
    pub fn new(log: Arc<dyn QueryActivityLog>) -> Self {
        Self { inner: log }
    }

    /// Deliver an event, discarding any error or panic from the sink.
    pub fn notify(&self, event: &SecurityEvent) {
        match panic::catch_unwind(AssertUnwindSafe(|| self.inner.record(event))) {
            Ok(Ok(())) => {}
            Ok(Err(e)) => debug!("Dropped security event: {}", e),
            Err(_) => debug!("Dropped security event: activity log panicked"),
        }
    }
}

impl std::fmt::Debug for BestEffortSink {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("BestEffortSink").finish_non_exhaustive()
    }
}

/// Activity log that emits events as JSON via `tracing` with target
/// `"query_activity"`.
#[derive(Debug, Clone, Default)]
pub struct TracingActivityLog;

impl QueryActivityLog for TracingActivityLog {
    fn record(&self, event: &SecurityEvent) -> Result<(), GuardError> {
        let json = serde_json::to_string(event)?;
        info!(target: "query_activity", event = %json, "security_event");
        Ok(())
    }
}

/// Bounded in-memory activity log.
///
/// Keeps the most recent events; older ones are evicted first.
#[derive(Debug)]
pub struct MemoryActivityLog {
    events: Mutex<VecDeque<SecurityEvent>>,
    capacity: usize,
}

impl MemoryActivityLog {
    pub fn new() -> Self {
        Self::with_capacity(DEFAULT_ACTIVITY_LOG_CAPACITY)
    }

    pub fn with_capacity(capacity: usize) -> Self {
        Self {
            events: Mutex::new(VecDeque::new()),
            capacity: capacity.max(1),
        }
    }

    /// Snapshot of retained events, oldest first.
    pub fn events(&self) -> Vec<SecurityEvent> {
        self.events.lock().iter().cloned().collect()
    }

    pub fn len(&self) -> usize {
        self.events.lock().len()
    }

    pub fn is_empty(&self) -> bool {
        self.events.lock().is_empty()
    }

    pub fn clear(&self) {
        self.events.lock().clear();
    }
}

impl Default for MemoryActivityLog {
    fn default() -> Self {
        Self::new()
    }
}

impl QueryActivityLog for MemoryActivityLog {
    fn record(&self, event: &SecurityEvent) -> Result<(), GuardError> {
        let mut events = self.events.lock();
        if events.len() >= self.capacity {
            events.pop_front();
        }
        events.push_back(event.clone());
        Ok(())
    }
}

/// Truncate text for logging without splitting a character.
pub fn truncate_for_log(s: &str, max_chars: usize) -> String {
    match s.char_indices().nth(max_chars) {
        Some((end, _)) => format!("{}...", &s[..end]),
        None => s.to_string(),
    }
}
