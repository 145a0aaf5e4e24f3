use std::sync::{Mutex, MutexGuard};

/// Useful functions for creating inmemory repositories

/// Locks the collection. A panic while holding the lock leaves the data
/// itself valid for these repos, so poisoning is ignored.
pub fn lock<T>(collection: &Mutex<T>) -> MutexGuard<'_, T> {
    collection
        .lock()
        .unwrap_or_else(|poisoned| poisoned.into_inner())
}

pub fn find<T: Clone>(collection: &Mutex<Option<T>>) -> Option<T> {
    lock(collection).clone()
}

pub fn save<T: Clone>(val: &T, collection: &Mutex<Option<T>>) {
    *lock(collection) = Some(val.clone());
}
