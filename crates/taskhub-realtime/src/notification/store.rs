//! Bounded, persisted notification history shared by all producers.

use std::collections::HashSet;
use std::sync::{Arc, Mutex, MutexGuard};

use tokio::sync::watch;
use tracing::{debug, warn};

use taskhub_core::config::StoreConfig;

use crate::error::{NotifyError, NotifyResult};

use super::persistence::HistoryStorage;
use super::record::{NotificationId, NotificationRecord};

/// Result of [`NotificationStore::append`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum AppendOutcome {
    /// The record was prepended; `evicted` lists records pushed out by the bound.
    Inserted {
        /// Ids dropped from the tail, oldest last.
        evicted: Vec<NotificationId>,
    },
    /// A record with the same id already exists; nothing changed.
    Duplicate,
}

impl AppendOutcome {
    /// Whether the store changed.
    pub fn is_inserted(&self) -> bool {
        matches!(self, Self::Inserted { .. })
    }
}

#[derive(Debug, Default)]
struct StoreInner {
    /// Newest first.
    records: Vec<NotificationRecord>,
    /// Id of the most recently appended record.
    latest_id: Option<NotificationId>,
}

/// Single source of truth for notification history.
///
/// Every mutation runs to completion under one lock, persistence included,
/// so no reader observes more than `capacity` records or a duplicate id.
/// Persistence failures are logged and never reach the caller.
#[derive(Debug)]
pub struct NotificationStore {
    inner: Mutex<StoreInner>,
    storage: Arc<dyn HistoryStorage>,
    key: String,
    capacity: usize,
    revision: watch::Sender<u64>,
}

impl NotificationStore {
    /// Reconstruct the store from persisted state.
    ///
    /// Missing or malformed documents yield an empty store.
    pub fn load(storage: Arc<dyn HistoryStorage>, key: impl Into<String>, capacity: usize) -> Self {
        let key = key.into();
        let capacity = capacity.max(1);

        let records = match storage.read(&key) {
            Ok(Some(document)) => match parse_document(&document, capacity) {
                Ok(records) => records,
                Err(e) => {
                    warn!(key = %key, error = %e, "Discarding unreadable notification history");
                    Vec::new()
                }
            },
            Ok(None) => Vec::new(),
            Err(e) => {
                warn!(key = %key, error = %e, "Failed to read notification history");
                Vec::new()
            }
        };

        debug!(key = %key, count = records.len(), "Notification history loaded");

        let (revision, _) = watch::channel(0);
        Self {
            inner: Mutex::new(StoreInner {
                latest_id: records.first().map(|r| r.id.clone()),
                records,
            }),
            storage,
            key,
            capacity,
            revision,
        }
    }

    /// Load using the configured key and capacity.
    pub fn from_config(config: &StoreConfig, storage: Arc<dyn HistoryStorage>) -> Self {
        Self::load(storage, config.storage_key.clone(), config.capacity)
    }

    /// Prepend `record` unless its id is already present, then enforce the bound
    /// and persist.
    pub fn append(&self, record: NotificationRecord) -> AppendOutcome {
        let mut inner = self.lock();

        if inner.records.iter().any(|r| r.id == record.id) {
            debug!(id = %record.id, "Duplicate notification ignored");
            return AppendOutcome::Duplicate;
        }

        inner.latest_id = Some(record.id.clone());
        inner.records.insert(0, record);

        let evicted: Vec<NotificationId> = if inner.records.len() > self.capacity {
            inner
                .records
                .split_off(self.capacity)
                .into_iter()
                .map(|r| r.id)
                .collect()
        } else {
            Vec::new()
        };

        self.persist(&inner.records);
        drop(inner);
        self.bump();

        AppendOutcome::Inserted { evicted }
    }

    /// Mark one record read. Returns `true` when a record changed.
    pub fn mark_read(&self, id: &NotificationId) -> bool {
        let mut inner = self.lock();

        let Some(record) = inner.records.iter_mut().find(|r| &r.id == id) else {
            return false;
        };
        if record.read {
            return false;
        }
        record.read = true;

        self.persist(&inner.records);
        drop(inner);
        self.bump();
        true
    }

    /// Mark every record read and persist once. Returns how many changed.
    pub fn mark_all_read(&self) -> usize {
        let mut inner = self.lock();

        let mut changed = 0;
        for record in inner.records.iter_mut().filter(|r| !r.read) {
            record.read = true;
            changed += 1;
        }

        if !inner.records.is_empty() {
            self.persist(&inner.records);
        }
        drop(inner);
        if changed > 0 {
            self.bump();
        }
        changed
    }

    /// Drop all records and delete the persisted document.
    pub fn clear(&self) {
        let mut inner = self.lock();
        inner.records.clear();
        inner.latest_id = None;

        if let Err(e) = self.storage.remove(&self.key) {
            warn!(key = %self.key, error = %e, "Failed to remove notification history");
        }
        drop(inner);
        self.bump();
    }

    /// Copy of the records, newest first.
    pub fn snapshot(&self) -> Vec<NotificationRecord> {
        self.lock().records.clone()
    }

    /// Look up one record.
    pub fn get(&self, id: &NotificationId) -> Option<NotificationRecord> {
        self.lock().records.iter().find(|r| &r.id == id).cloned()
    }

    /// Id of the most recently appended record.
    pub fn latest_id(&self) -> Option<NotificationId> {
        self.lock().latest_id.clone()
    }

    /// Whether `id` is present.
    pub fn contains(&self, id: &NotificationId) -> bool {
        self.lock().records.iter().any(|r| &r.id == id)
    }

    /// Number of records.
    pub fn len(&self) -> usize {
        self.lock().records.len()
    }

    /// Whether the store is empty.
    pub fn is_empty(&self) -> bool {
        self.lock().records.is_empty()
    }

    /// Maximum number of records retained.
    pub fn capacity(&self) -> usize {
        self.capacity
    }

    /// Receiver that ticks after every mutation.
    pub fn watch(&self) -> watch::Receiver<u64> {
        self.revision.subscribe()
    }

    fn lock(&self) -> MutexGuard<'_, StoreInner> {
        self.inner.lock().unwrap_or_else(|e| e.into_inner())
    }

    fn persist(&self, records: &[NotificationRecord]) {
        let document = match serde_json::to_string(records) {
            Ok(d) => d,
            Err(e) => {
                warn!(error = %e, "Failed to serialize notification history");
                return;
            }
        };

        if let Err(e) = self.storage.write(&self.key, &document) {
            warn!(key = %self.key, error = %e, "Failed to persist notification history");
        }
    }

    fn bump(&self) {
        self.revision.send_modify(|rev| *rev += 1);
    }
}

/// Parse a persisted document, re-establishing the store invariants.
///
/// Duplicate ids keep their first (newest) occurrence; the list is capped
/// at `capacity`.
pub fn parse_document(document: &str, capacity: usize) -> NotifyResult<Vec<NotificationRecord>> {
    let parsed: Vec<NotificationRecord> = serde_json::from_str(document)
        .map_err(|e| NotifyError::PersistenceCorrupt(e.to_string()))?;

    let mut seen = HashSet::new();
    let mut records: Vec<NotificationRecord> = parsed
        .into_iter()
        .filter(|r| seen.insert(r.id.clone()))
        .collect();
    records.truncate(capacity);
    Ok(records)
}

#[cfg(test)]
mod tests {
    use chrono::{Duration, Utc};

    use super::*;
    use crate::notification::persistence::{JsonFileStorage, MemoryStorage};
    use crate::notification::record::NotificationKind;

    const KEY: &str = "notification_history";

    fn record(id: &str, body: &str) -> NotificationRecord {
        NotificationRecord::new(id.into(), NotificationKind::TaskCreated, "Tugas Baru", body)
    }

    fn make_store() -> (Arc<MemoryStorage>, NotificationStore) {
        let storage = Arc::new(MemoryStorage::new());
        let store = NotificationStore::load(storage.clone(), KEY, 20);
        (storage, store)
    }

    #[test]
    fn test_append_twice_keeps_first_copy() {
        let (_, store) = make_store();
        assert!(store.append(record("e1", "first")).is_inserted());
        assert_eq!(store.append(record("e1", "second")), AppendOutcome::Duplicate);

        let records = store.snapshot();
        assert_eq!(records.len(), 1);
        assert_eq!(records[0].body, "first");
    }

    #[test]
    fn test_bound_evicts_oldest() {
        let (_, store) = make_store();
        let mut last = AppendOutcome::Duplicate;
        for i in 0..21 {
            last = store.append(record(&format!("e{i}"), "body"));
        }

        assert_eq!(store.len(), 20);
        assert!(!store.contains(&"e0".into()));
        assert!(store.contains(&"e20".into()));
        assert_eq!(
            last,
            AppendOutcome::Inserted {
                evicted: vec!["e0".into()]
            }
        );
        assert_eq!(store.snapshot()[0].id, "e20".into());
        assert_eq!(store.latest_id(), Some("e20".into()));
    }

    #[test]
    fn test_bound_holds_for_long_sequences() {
        let (_, store) = make_store();
        for i in 0..57 {
            store.append(record(&format!("n{i}"), ""));
            assert!(store.len() <= 20);
        }
        let ids: Vec<String> = store.snapshot().iter().map(|r| r.id.to_string()).collect();
        let expected: Vec<String> = (37..57).rev().map(|i| format!("n{i}")).collect();
        assert_eq!(ids, expected);
    }

    #[test]
    fn test_mark_read_is_monotonic() {
        let (_, store) = make_store();
        store.append(record("e1", ""));

        assert!(store.mark_read(&"e1".into()));
        assert!(!store.mark_read(&"e1".into()));
        assert!(!store.mark_read(&"missing".into()));
        assert!(store.get(&"e1".into()).expect("present").read);

        store.append(record("e2", ""));
        assert_eq!(store.mark_all_read(), 1);
        assert!(store.snapshot().iter().all(|r| r.read));
    }

    #[test]
    fn test_mutations_are_persisted_in_full() {
        let (storage, store) = make_store();
        store.append(record("e1", ""));
        store.append(record("e2", ""));
        store.mark_read(&"e1".into());

        let document = storage.document(KEY).expect("persisted");
        let persisted = parse_document(&document, 20).expect("valid document");
        assert_eq!(persisted, store.snapshot());
    }

    #[test]
    fn test_round_trip_through_file_storage() {
        let dir = tempfile::tempdir().expect("tempdir");
        let storage: Arc<dyn HistoryStorage> = Arc::new(JsonFileStorage::new(dir.path()));

        let before = {
            let store = NotificationStore::load(storage.clone(), KEY, 20);
            store.append(record("a", "one").received_at(Utc::now() - Duration::hours(3)));
            store.append(
                record("b", "two")
                    .with_task(Some(taskhub_core::types::TaskId::new(42))),
            );
            store.mark_read(&"a".into());
            store.snapshot()
        };

        let reloaded = NotificationStore::load(storage, KEY, 20);
        assert_eq!(reloaded.snapshot(), before);
        assert_eq!(reloaded.latest_id(), Some("b".into()));
    }

    #[test]
    fn test_corrupt_document_loads_empty() {
        let storage = Arc::new(MemoryStorage::with_document(KEY, "{not json"));
        let store = NotificationStore::load(storage, KEY, 20);
        assert!(store.is_empty());

        store.append(record("fresh", ""));
        assert_eq!(store.len(), 1);
    }

    #[test]
    fn test_load_restores_invariants() {
        let mut records: Vec<NotificationRecord> =
            (0..25).map(|i| record(&format!("r{i}"), "")).collect();
        records.insert(1, record("r0", "older duplicate"));
        let document = serde_json::to_string(&records).expect("serialize");

        let storage = Arc::new(MemoryStorage::with_document(KEY, &document));
        let store = NotificationStore::load(storage, KEY, 20);
        assert_eq!(store.len(), 20);
        assert_eq!(store.get(&"r0".into()).expect("kept").body, "");
    }

    #[test]
    fn test_clear_removes_document() {
        let (storage, store) = make_store();
        store.append(record("e1", ""));
        assert!(storage.document(KEY).is_some());

        store.clear();
        assert!(store.is_empty());
        assert_eq!(store.latest_id(), None);
        assert!(storage.document(KEY).is_none());
    }

    #[test]
    fn test_watch_ticks_on_mutation() {
        let (_, store) = make_store();
        let rx = store.watch();
        let start = *rx.borrow();

        store.append(record("e1", ""));
        store.append(record("e1", ""));
        assert_eq!(*rx.borrow(), start + 1);

        store.mark_read(&"e1".into());
        assert_eq!(*rx.borrow(), start + 2);
    }
}
