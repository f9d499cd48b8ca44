//! One-time codes for step-up verification and account recovery.
//!
//! Codes live behind the [`OtpStore`] trait so the backing store can move out
//! of process without touching call sites. The default store is an in-memory
//! map, which means the cooldown and single-use guarantees hold per instance.

use rand::{Rng, rngs::OsRng};
use std::collections::HashMap;
use std::sync::Mutex;
use std::time::{Duration, Instant};

/// A live code as seen by callers. Expiry is the store's concern; `get` never
/// returns an expired entry.
#[derive(Debug, Clone)]
pub struct StoredCode {
    pub code: String,
    pub issued_at: Instant,
}

/// Key-value store for one-time codes, keyed by normalized email.
/// At most one live code per key; `set` replaces any previous entry.
pub trait OtpStore: Send + Sync {
    fn set(&self, email: &str, code: String, ttl: Duration);
    fn get(&self, email: &str) -> Option<StoredCode>;
    fn delete(&self, email: &str);
}

struct Entry {
    code: String,
    issued_at: Instant,
    expires_at: Instant,
}

/// Process-local [`OtpStore`]. Expired entries are dropped on access.
#[derive(Default)]
pub struct InMemoryOtpStore {
    entries: Mutex<HashMap<String, Entry>>,
}

impl InMemoryOtpStore {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    fn lock(&self) -> std::sync::MutexGuard<'_, HashMap<String, Entry>> {
        // A poisoned lock only happens if a holder panicked; the map stays usable.
        self.entries
            .lock()
            .unwrap_or_else(std::sync::PoisonError::into_inner)
    }
}

impl OtpStore for InMemoryOtpStore {
    fn set(&self, email: &str, code: String, ttl: Duration) {
        let now = Instant::now();
        let mut entries = self.lock();
        entries.retain(|_, entry| entry.expires_at > now);
        entries.insert(
            email.to_string(),
            Entry {
                code,
                issued_at: now,
                expires_at: now + ttl,
            },
        );
    }

    fn get(&self, email: &str) -> Option<StoredCode> {
        let mut entries = self.lock();
        match entries.get(email) {
            Some(entry) if entry.expires_at > Instant::now() => Some(StoredCode {
                code: entry.code.clone(),
                issued_at: entry.issued_at,
            }),
            Some(_) => {
                entries.remove(email);
                None
            }
            None => None,
        }
    }

    fn delete(&self, email: &str) {
        self.lock().remove(email);
    }
}

/// Generate a 6-digit code. The range keeps a leading non-zero digit so the
/// code survives clients that strip leading zeros.
pub(super) fn generate_code() -> String {
    OsRng.gen_range(100_000..1_000_000).to_string()
}

#[cfg(test)]
mod tests {
    use super::*;

    const TTL: Duration = Duration::from_secs(600);

    #[test]
    fn set_then_get_returns_live_code() {
        let store = InMemoryOtpStore::new();
        store.set("a@x.com", "123456".to_string(), TTL);

        let stored = store.get("a@x.com").expect("live code");
        assert_eq!(stored.code, "123456");
    }

    #[test]
    fn expired_codes_are_not_returned() {
        let store = InMemoryOtpStore::new();
        store.set("a@x.com", "123456".to_string(), Duration::ZERO);

        assert!(store.get("a@x.com").is_none());
        // The expired entry is gone, not just hidden.
        assert!(store.lock().is_empty());
    }

    #[test]
    fn set_replaces_previous_code() {
        let store = InMemoryOtpStore::new();
        store.set("a@x.com", "111111".to_string(), TTL);
        store.set("a@x.com", "222222".to_string(), TTL);

        let stored = store.get("a@x.com").expect("live code");
        assert_eq!(stored.code, "222222");
    }

    #[test]
    fn delete_removes_entry() {
        let store = InMemoryOtpStore::new();
        store.set("a@x.com", "123456".to_string(), TTL);
        store.delete("a@x.com");
        assert!(store.get("a@x.com").is_none());
    }

    #[test]
    fn keys_are_independent() {
        let store = InMemoryOtpStore::new();
        store.set("a@x.com", "111111".to_string(), TTL);
        store.set("b@x.com", "222222".to_string(), TTL);
        store.delete("a@x.com");

        assert!(store.get("a@x.com").is_none());
        assert!(store.get("b@x.com").is_some());
    }

    #[test]
    fn generated_codes_are_six_digits() {
        for _ in 0..32 {
            let code = generate_code();
            assert_eq!(code.len(), 6);
            assert!(code.chars().all(|c| c.is_ascii_digit()));
            assert_ne!(code.chars().next(), Some('0'));
        }
    }
}
