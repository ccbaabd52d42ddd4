//! In-process live event feed.
//!
//! A bounded ring buffer of recent events backing the admin dashboard's live
//! log. Postback and error events are additionally persisted to the database
//! in a fire-and-forget task; the buffer itself is non-authoritative and lost
//! on restart.

use std::collections::VecDeque;
use std::sync::Arc;

use chrono::Utc;
use parking_lot::Mutex;
use serde::Serialize;
use serde_json::Value;
use tracing::{error, info, warn};

use crate::storage::{PostbackLogEntry, Repository};

const MAX_EVENTS: usize = 200;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum EventKind {
    Click,
    Attribution,
    Postback,
    Error,
    System,
}

#[derive(Debug, Clone, Serialize)]
pub struct Event {
    pub id: String,
    /// Unix millis, newest events first in the feed.
    pub timestamp: i64,
    #[serde(rename = "type")]
    pub kind: EventKind,
    pub summary: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub details: Option<Value>,
}

struct Inner {
    events: Mutex<VecDeque<Event>>,
    repository: Option<Arc<dyn Repository>>,
}

#[derive(Clone)]
pub struct EventLog {
    inner: Arc<Inner>,
}

impl EventLog {
    pub fn new() -> Self {
        EventLog {
            inner: Arc::new(Inner {
                events: Mutex::new(VecDeque::with_capacity(MAX_EVENTS)),
                repository: None,
            }),
        }
    }

    /// Feed that also persists postback/error events to the audit tables.
    pub fn with_repository(repository: Arc<dyn Repository>) -> Self {
        EventLog {
            inner: Arc::new(Inner {
                events: Mutex::new(VecDeque::with_capacity(MAX_EVENTS)),
                repository: Some(repository),
            }),
        }
    }

    pub fn record(&self, kind: EventKind, summary: impl Into<String>, details: Option<Value>) {
        let summary = summary.into();
        match kind {
            EventKind::Error => error!("[{:?}] {}", kind, summary),
            _ => info!("[{:?}] {}", kind, summary),
        }

        let event = Event {
            id: crate::utils::keys::random_event_id(),
            timestamp: Utc::now().timestamp_millis(),
            kind,
            summary,
            details,
        };

        let mut events = self.inner.events.lock();
        if events.len() >= MAX_EVENTS {
            events.pop_back();
        }
        events.push_front(event);
    }

    /// Records a postback event and persists the audit row off the critical
    /// path. The caller never waits on the database write.
    pub fn record_postback(&self, summary: impl Into<String>, entry: PostbackLogEntry) {
        let details = serde_json::json!({
            "click_id": entry.click_id,
            "url": entry.url,
            "method": entry.method,
            "response_status": entry.response_status,
        });
        self.record(EventKind::Postback, summary, Some(details));

        if let Some(repository) = self.inner.repository.clone() {
            tokio::spawn(async move {
                if let Err(e) = repository.log_postback(entry).await {
                    warn!("Failed to persist postback log: {}", e);
                }
            });
        }
    }

    /// Records an error event and persists it to the error audit table.
    pub fn record_error(&self, kind: &str, message: impl Into<String>, detail: Value) {
        let message = message.into();
        self.record(EventKind::Error, message.clone(), Some(detail.clone()));

        if let Some(repository) = self.inner.repository.clone() {
            let kind = kind.to_string();
            tokio::spawn(async move {
                let detail_text = detail.to_string();
                if let Err(e) = repository.log_error(&kind, &message, &detail_text).await {
                    warn!("Failed to persist error log: {}", e);
                }
            });
        }
    }

    /// Events newer than `since` (unix millis), newest first.
    pub fn recent(&self, since: Option<i64>) -> Vec<Event> {
        let events = self.inner.events.lock();
        match since {
            Some(ts) => events.iter().filter(|e| e.timestamp > ts).cloned().collect(),
            None => events.iter().cloned().collect(),
        }
    }

    pub fn clear(&self) {
        self.inner.events.lock().clear();
    }
}

impl Default for EventLog {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn ring_buffer_evicts_oldest() {
        let log = EventLog::new();
        for i in 0..(MAX_EVENTS + 10) {
            log.record(EventKind::Click, format!("click {}", i), None);
        }
        let events = log.recent(None);
        assert_eq!(events.len(), MAX_EVENTS);
        // Newest first.
        assert_eq!(events[0].summary, format!("click {}", MAX_EVENTS + 9));
    }

    #[test]
    fn since_filter_excludes_older_events() {
        let log = EventLog::new();
        log.record(EventKind::System, "old", None);
        let cutoff = Utc::now().timestamp_millis() + 1;
        assert!(log.recent(Some(cutoff)).is_empty());
        assert_eq!(log.recent(None).len(), 1);
    }

    #[test]
    fn clear_empties_feed() {
        let log = EventLog::new();
        log.record(EventKind::Attribution, "matched", None);
        log.clear();
        assert!(log.recent(None).is_empty());
    }
}
