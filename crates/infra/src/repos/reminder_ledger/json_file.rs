use super::{IReminderLedger, LedgerDocument, LedgerError, LedgerState};
use crate::repos::shared::inmemory_repo::lock;
use crate::repos::shared::json_file::{read_json_file, write_json_file};
use chrono::{DateTime, Utc};
use nudgeme_domain::{ReminderKey, ReminderRecord};
use std::path::PathBuf;
use std::sync::Mutex;
use tracing::info;

/// Ledger persisted as a single JSON document that is rewritten on every flush
pub struct JsonFileReminderLedger {
    path: PathBuf,
    state: Mutex<LedgerState>,
    /// Only one flush writes the file at a time
    flush_lock: tokio::sync::Mutex<()>,
}

impl JsonFileReminderLedger {
    /// Loads the ledger at `path`. A missing file is an empty ledger,
    /// unreadable or corrupt contents are an error.
    pub async fn open<P: Into<PathBuf>>(path: P) -> Result<Self, LedgerError> {
        let path = path.into();
        let document = read_json_file::<LedgerDocument>(&path)
            .await?
            .unwrap_or_default();
        info!(
            path = %path.display(),
            events = document.len(),
            "Loaded reminder ledger"
        );
        Ok(Self {
            path,
            state: Mutex::new(LedgerState::from_document(document)),
            flush_lock: tokio::sync::Mutex::new(()),
        })
    }
}

#[async_trait::async_trait]
impl IReminderLedger for JsonFileReminderLedger {
    fn lookup(&self, key: &ReminderKey) -> Option<ReminderRecord> {
        lock(&self.state).lookup(key)
    }

    fn record(&self, key: &ReminderKey, record: ReminderRecord) {
        lock(&self.state).stage(key, record);
    }

    fn pending(&self) -> usize {
        lock(&self.state).staged.len()
    }

    fn prune_dispatched_before(&self, cutoff: DateTime<Utc>) -> usize {
        lock(&self.state).prune(cutoff)
    }

    async fn flush(&self) -> Result<(), LedgerError> {
        let _guard = self.flush_lock.lock().await;
        let prepared = lock(&self.state).prepare_flush();
        if let Some((document, flushed)) = prepared {
            write_json_file(&self.path, &document).await?;
            lock(&self.state).commit(flushed);
        }
        Ok(())
    }
}
