mod inmemory;
mod json_file;

use super::shared::json_file::JsonFileError;
use chrono::{DateTime, Utc};
use nudgeme_domain::{ReminderKey, ReminderRecord};
use std::collections::BTreeMap;
use thiserror::Error;

pub use inmemory::InMemoryReminderLedger;
pub use json_file::JsonFileReminderLedger;

/// Persisted layout: `{ "<event_id>": { "<offset_id>": ReminderRecord } }`
pub type LedgerDocument = BTreeMap<String, BTreeMap<String, ReminderRecord>>;

#[derive(Error, Debug)]
pub enum LedgerError {
    #[error(transparent)]
    Storage(#[from] JsonFileError),
    #[error("The reminder ledger is unavailable: {0}")]
    Unavailable(String),
}

/// Durable record of which reminders were sent for which event version.
///
/// Records are staged in memory by `record` and only become durable when
/// `flush` succeeds. A failed flush keeps the staged records so the next
/// flush writes them again.
#[async_trait::async_trait]
pub trait IReminderLedger: Send + Sync {
    /// Staged records shadow committed ones
    fn lookup(&self, key: &ReminderKey) -> Option<ReminderRecord>;
    /// Idempotent upsert into the staged batch
    fn record(&self, key: &ReminderKey, record: ReminderRecord);
    /// Number of staged records not yet durable
    fn pending(&self) -> usize;
    /// Drops records dispatched before `cutoff` and returns how many were removed
    fn prune_dispatched_before(&self, cutoff: DateTime<Utc>) -> usize;
    async fn flush(&self) -> Result<(), LedgerError>;
}

type StagedRecords = BTreeMap<ReminderKey, ReminderRecord>;

/// In-memory view shared by the ledger implementations
#[derive(Debug, Default)]
struct LedgerState {
    committed: LedgerDocument,
    staged: StagedRecords,
    /// Committed records were pruned since the last flush
    dirty: bool,
}

impl LedgerState {
    fn from_document(committed: LedgerDocument) -> Self {
        Self {
            committed,
            ..Default::default()
        }
    }

    fn lookup(&self, key: &ReminderKey) -> Option<ReminderRecord> {
        self.staged
            .get(key)
            .or_else(|| {
                self.committed
                    .get(&key.event_id)
                    .and_then(|offsets| offsets.get(&key.offset_id))
            })
            .cloned()
    }

    fn stage(&mut self, key: &ReminderKey, record: ReminderRecord) {
        if self.lookup(key).as_ref() == Some(&record) {
            return;
        }
        self.staged.insert(key.clone(), record);
    }

    /// The full document to write together with the staged records it
    /// contains, or `None` when there is nothing new to persist
    fn prepare_flush(&self) -> Option<(LedgerDocument, StagedRecords)> {
        if self.staged.is_empty() && !self.dirty {
            return None;
        }
        let mut document = self.committed.clone();
        for (key, record) in &self.staged {
            document
                .entry(key.event_id.clone())
                .or_default()
                .insert(key.offset_id.clone(), record.clone());
        }
        Some((document, self.staged.clone()))
    }

    fn commit(&mut self, flushed: StagedRecords) {
        for (key, record) in flushed {
            if self.staged.get(&key) == Some(&record) {
                self.staged.remove(&key);
            }
            self.committed
                .entry(key.event_id)
                .or_default()
                .insert(key.offset_id, record);
        }
        self.dirty = false;
    }

    fn prune(&mut self, cutoff: DateTime<Utc>) -> usize {
        let mut removed = 0;
        for offsets in self.committed.values_mut() {
            let before = offsets.len();
            offsets.retain(|_, record| record.dispatched_at >= cutoff);
            removed += before - offsets.len();
        }
        self.committed.retain(|_, offsets| !offsets.is_empty());
        if removed > 0 {
            self.dirty = true;
        }

        let before = self.staged.len();
        self.staged.retain(|_, record| record.dispatched_at >= cutoff);
        removed + before - self.staged.len()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::{Duration, TimeZone};
    use nudgeme_domain::VersionMarker;
    use std::sync::Arc;

    fn key(event_id: &str, offset_id: &str) -> ReminderKey {
        ReminderKey {
            event_id: event_id.into(),
            offset_id: offset_id.into(),
        }
    }

    fn record(version: &str, dispatched_at: DateTime<Utc>) -> ReminderRecord {
        ReminderRecord {
            version: VersionMarker::new(version),
            dispatched_at,
        }
    }

    async fn create_ledgers(dir: &tempfile::TempDir) -> Vec<Arc<dyn IReminderLedger>> {
        let file_ledger = JsonFileReminderLedger::open(dir.path().join("ledger.json"))
            .await
            .unwrap();
        vec![
            Arc::new(InMemoryReminderLedger::new()),
            Arc::new(file_ledger),
        ]
    }

    #[tokio::test]
    async fn staged_records_are_visible_before_flush() {
        let dir = tempfile::tempdir().unwrap();
        let now = Utc.with_ymd_and_hms(2021, 2, 21, 12, 0, 0).unwrap();

        for ledger in create_ledgers(&dir).await {
            let k = key("e1", "2h");
            assert!(ledger.lookup(&k).is_none());

            ledger.record(&k, record("v1", now));
            assert_eq!(ledger.lookup(&k), Some(record("v1", now)));
            assert_eq!(ledger.pending(), 1);

            // Same record again is a no-op
            ledger.record(&k, record("v1", now));
            assert_eq!(ledger.pending(), 1);

            ledger.flush().await.unwrap();
            assert_eq!(ledger.pending(), 0);
            assert_eq!(ledger.lookup(&k), Some(record("v1", now)));

            // Replaying a committed record stages nothing
            ledger.record(&k, record("v1", now));
            assert_eq!(ledger.pending(), 0);

            // A newer version overwrites
            ledger.record(&k, record("v2", now + Duration::minutes(5)));
            assert_eq!(ledger.pending(), 1);
            ledger.flush().await.unwrap();
            assert_eq!(
                ledger.lookup(&k),
                Some(record("v2", now + Duration::minutes(5)))
            );
        }
    }

    #[tokio::test]
    async fn prune_removes_old_records() {
        let dir = tempfile::tempdir().unwrap();
        let now = Utc.with_ymd_and_hms(2021, 2, 21, 12, 0, 0).unwrap();

        for ledger in create_ledgers(&dir).await {
            ledger.record(&key("old", "2h"), record("v1", now - Duration::hours(50)));
            ledger.record(&key("old", "10m"), record("v1", now - Duration::hours(49)));
            ledger.record(&key("new", "2h"), record("v1", now - Duration::hours(1)));
            ledger.flush().await.unwrap();

            let removed = ledger.prune_dispatched_before(now - Duration::hours(48));
            assert_eq!(removed, 2);
            assert!(ledger.lookup(&key("old", "2h")).is_none());
            assert!(ledger.lookup(&key("new", "2h")).is_some());
            // Pruning alone has to be persisted as well
            ledger.flush().await.unwrap();
            assert_eq!(ledger.prune_dispatched_before(now - Duration::hours(48)), 0);
        }
    }
}
