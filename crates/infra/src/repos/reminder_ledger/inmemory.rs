use super::{IReminderLedger, LedgerDocument, LedgerError, LedgerState};
use crate::repos::shared::inmemory_repo::lock;
use chrono::{DateTime, Utc};
use nudgeme_domain::{ReminderKey, ReminderRecord};
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Mutex;

/// Ledger kept in process memory. `persisted` plays the role of the durable
/// store, so a restart can be simulated with `from_document(ledger.persisted())`.
pub struct InMemoryReminderLedger {
    state: Mutex<LedgerState>,
    persisted: Mutex<LedgerDocument>,
    failing_flushes: AtomicUsize,
    flushes: AtomicUsize,
}

impl InMemoryReminderLedger {
    pub fn new() -> Self {
        Self::from_document(LedgerDocument::default())
    }

    pub fn from_document(document: LedgerDocument) -> Self {
        Self {
            state: Mutex::new(LedgerState::from_document(document.clone())),
            persisted: Mutex::new(document),
            failing_flushes: AtomicUsize::new(0),
            flushes: AtomicUsize::new(0),
        }
    }

    /// The next `count` calls to `flush` fail without persisting anything
    pub fn fail_next_flushes(&self, count: usize) {
        self.failing_flushes.store(count, Ordering::SeqCst);
    }

    /// What a restarted process would load
    pub fn persisted(&self) -> LedgerDocument {
        lock(&self.persisted).clone()
    }

    /// Number of successful flushes that wrote something
    pub fn flush_count(&self) -> usize {
        self.flushes.load(Ordering::SeqCst)
    }
}

impl Default for InMemoryReminderLedger {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait::async_trait]
impl IReminderLedger for InMemoryReminderLedger {
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
        let failing = self
            .failing_flushes
            .fetch_update(Ordering::SeqCst, Ordering::SeqCst, |n| n.checked_sub(1));
        if failing.is_ok() {
            return Err(LedgerError::Unavailable("simulated flush failure".into()));
        }

        let mut state = lock(&self.state);
        if let Some((document, flushed)) = state.prepare_flush() {
            *lock(&self.persisted) = document;
            state.commit(flushed);
            self.flushes.fetch_add(1, Ordering::SeqCst);
        }
        Ok(())
    }
}
