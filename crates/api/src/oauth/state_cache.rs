use chrono::{DateTime, Duration, Utc};
use nudgeme_utils::create_random_secret;
use std::collections::HashMap;
use std::sync::{Mutex, MutexGuard};

const STATE_LENGTH: usize = 16;

/// `state` values handed out by the OAuth start route, each accepted once
#[derive(Debug)]
pub struct OAuthStateCache {
    ttl: Duration,
    states: Mutex<HashMap<String, DateTime<Utc>>>,
}

impl OAuthStateCache {
    pub fn new(ttl: Duration) -> Self {
        Self {
            ttl,
            states: Mutex::new(HashMap::new()),
        }
    }

    fn states(&self) -> MutexGuard<'_, HashMap<String, DateTime<Utc>>> {
        self.states
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner())
    }

    pub fn issue(&self, now: DateTime<Utc>) -> String {
        let state = create_random_secret(STATE_LENGTH);
        let mut states = self.states();
        states.retain(|_, expires_at| *expires_at > now);
        states.insert(state.clone(), now + self.ttl);
        state
    }

    /// Whether `state` was issued and has not expired. It can not be used again afterwards.
    pub fn consume(&self, state: &str, now: DateTime<Utc>) -> bool {
        match self.states().remove(state) {
            Some(expires_at) => expires_at > now,
            None => false,
        }
    }
}

impl Default for OAuthStateCache {
    fn default() -> Self {
        Self::new(Duration::minutes(10))
    }
}

#[cfg(test)]
mod test {
    use super::*;
    use chrono::TimeZone;

    #[test]
    fn states_are_single_use_and_expire() {
        let cache = OAuthStateCache::default();
        let now = Utc.with_ymd_and_hms(2021, 2, 21, 12, 0, 0).unwrap();

        let state = cache.issue(now);
        assert_eq!(state.len(), STATE_LENGTH);
        assert!(!cache.consume("unknown", now));
        assert!(cache.consume(&state, now + Duration::minutes(1)));
        assert!(!cache.consume(&state, now + Duration::minutes(1)));

        let state = cache.issue(now);
        assert!(!cache.consume(&state, now + Duration::minutes(11)));
    }
}
