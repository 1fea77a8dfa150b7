//! Persistent log of delivered notifications.

use std::sync::{Arc, Mutex};

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use super::{NotificationPayload, NotificationSink};
use crate::clock::Clock;
use crate::error::{NotifyError, StorageError};
use crate::storage::KvStore;

pub const HISTORY_PARTITION: &str = "notification_history";
const HISTORY_KEY: &str = "entries";

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct HistoryEntry {
    pub uuid: Uuid,
    /// Delivery id handed to the sink. Not unique.
    pub id: u32,
    pub delivered_at: DateTime<Utc>,
    pub payload: NotificationPayload,
}

/// Newest-first list capped at `limit` entries. Clones share one write guard.
#[derive(Clone)]
pub struct NotificationHistory {
    kv: Arc<dyn KvStore>,
    limit: usize,
    writes: Arc<Mutex<()>>,
}

impl NotificationHistory {
    pub fn new(kv: Arc<dyn KvStore>, limit: usize) -> Self {
        Self {
            kv,
            limit,
            writes: Arc::new(Mutex::new(())),
        }
    }

    pub fn list(&self) -> Result<Vec<HistoryEntry>, StorageError> {
        match self.kv.get_string(HISTORY_PARTITION, HISTORY_KEY)? {
            Some(raw) => serde_json::from_str(&raw).map_err(|e| StorageError::Corrupt {
                partition: HISTORY_PARTITION.into(),
                key: HISTORY_KEY.into(),
                message: e.to_string(),
            }),
            None => Ok(Vec::new()),
        }
    }

    pub fn push(&self, entry: HistoryEntry) -> Result<(), StorageError> {
        let _guard = self.writes.lock().map_err(|_| StorageError::Poisoned)?;
        let mut entries = self.list()?;
        entries.insert(0, entry);
        entries.truncate(self.limit);
        let raw = serde_json::to_string(&entries).map_err(|e| StorageError::Corrupt {
            partition: HISTORY_PARTITION.into(),
            key: HISTORY_KEY.into(),
            message: e.to_string(),
        })?;
        self.kv.set_string(HISTORY_PARTITION, HISTORY_KEY, &raw)
    }
}

/// Forwards to an inner sink and records successful deliveries.
pub struct HistorySink {
    inner: Arc<dyn NotificationSink>,
    history: NotificationHistory,
    clock: Arc<dyn Clock>,
}

impl HistorySink {
    pub fn new(
        inner: Arc<dyn NotificationSink>,
        history: NotificationHistory,
        clock: Arc<dyn Clock>,
    ) -> Self {
        Self {
            inner,
            history,
            clock,
        }
    }
}

impl NotificationSink for HistorySink {
    fn deliver(&self, id: u32, payload: &NotificationPayload) -> Result<(), NotifyError> {
        self.inner.deliver(id, payload)?;
        let entry = HistoryEntry {
            uuid: Uuid::new_v4(),
            id,
            delivered_at: self.clock.now().with_timezone(&Utc),
            payload: payload.clone(),
        };
        // The notification is already on screen; a history write failure
        // must not turn it into a delivery failure.
        if let Err(e) = self.history.push(entry) {
            tracing::warn!(id, error = %e, "failed to record notification history");
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::clock::SystemClock;
    use crate::notify::RecordingSink;
    use crate::storage::MemoryKvStore;

    #[test]
    fn history_is_newest_first_and_capped() {
        let kv: Arc<dyn KvStore> = Arc::new(MemoryKvStore::new());
        let inner = Arc::new(RecordingSink::new());
        let history = NotificationHistory::new(kv, 3);
        let sink = HistorySink::new(inner.clone(), history.clone(), Arc::new(SystemClock));

        for i in 0..5u32 {
            sink.deliver(1000 + i, &NotificationPayload::reminder(format!("m{i}")))
                .unwrap();
        }

        let entries = history.list().unwrap();
        assert_eq!(entries.len(), 3);
        assert_eq!(entries[0].payload.body, "m4");
        assert_eq!(entries[2].payload.body, "m2");
        assert_eq!(inner.delivered().len(), 5);
    }

    #[test]
    fn concurrent_deliveries_are_all_recorded() {
        let kv: Arc<dyn KvStore> = Arc::new(MemoryKvStore::new());
        let history = NotificationHistory::new(kv, 100_000);
        let sink = Arc::new(HistorySink::new(
            Arc::new(RecordingSink::new()),
            history.clone(),
            Arc::new(SystemClock),
        ));

        let handles: Vec<_> = (0..8u32)
            .map(|t| {
                let sink = sink.clone();
                std::thread::spawn(move || {
                    for i in 0..50u32 {
                        sink.deliver(1000 + t * 50 + i, &NotificationPayload::threat("run"))
                            .unwrap();
                    }
                })
            })
            .collect();
        for handle in handles {
            handle.join().unwrap();
        }

        assert_eq!(history.list().unwrap().len(), 400);
    }
}
