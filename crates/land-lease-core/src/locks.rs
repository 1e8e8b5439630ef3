//! Keyed advisory locks with a bounded wait.

use parking_lot::{Condvar, Mutex};
use std::collections::HashSet;
use std::fmt::Display;
use std::hash::Hash;
use std::time::{Duration, Instant};

use crate::error::LeaseError;
use crate::LeaseResult;

/// Exclusive locks addressed by key; a key is locked while its guard lives.
#[derive(Debug)]
pub struct KeyedLocks<K> {
    resource: &'static str,
    held: Mutex<HashSet<K>>,
    released: Condvar,
}

/// Held lock; released on drop.
#[must_use = "the lock is released as soon as the guard is dropped"]
pub struct KeyedGuard<'a, K>
where
    K: Eq + Hash + Copy + Display,
{
    locks: &'a KeyedLocks<K>,
    key: K,
}

impl<K> KeyedLocks<K>
where
    K: Eq + Hash + Copy + Display,
{
    pub fn new(resource: &'static str) -> Self {
        Self {
            resource,
            held: Mutex::new(HashSet::new()),
            released: Condvar::new(),
        }
    }

    /// Wait up to `timeout` for the lock on `key`.
    pub fn acquire(&self, key: K, timeout: Duration) -> LeaseResult<KeyedGuard<'_, K>> {
        let deadline = Instant::now() + timeout;
        let mut held = self.held.lock();
        while held.contains(&key) {
            if self.released.wait_until(&mut held, deadline).timed_out() && held.contains(&key) {
                return Err(LeaseError::LockTimeout {
                    resource: format!("{} {}", self.resource, key),
                });
            }
        }
        held.insert(key);
        Ok(KeyedGuard { locks: self, key })
    }

    pub fn is_locked(&self, key: K) -> bool {
        self.held.lock().contains(&key)
    }
}

impl<K> Drop for KeyedGuard<'_, K>
where
    K: Eq + Hash + Copy + Display,
{
    fn drop(&mut self) {
        self.locks.held.lock().remove(&self.key);
        self.locks.released.notify_all();
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::LeaseId;
    use std::sync::Arc;
    use std::thread;

    #[test]
    fn test_second_acquire_times_out() {
        let locks = KeyedLocks::new("lease");
        let _held = locks.acquire(LeaseId(1), Duration::from_millis(10)).unwrap();
        let err = locks
            .acquire(LeaseId(1), Duration::from_millis(10))
            .err()
            .unwrap();
        assert!(err.is_transient());
        assert!(err.to_string().contains("lease 1"));
    }

    #[test]
    fn test_distinct_keys_independent() {
        let locks = KeyedLocks::new("lease");
        let _a = locks.acquire(LeaseId(1), Duration::from_millis(10)).unwrap();
        assert!(locks.acquire(LeaseId(2), Duration::from_millis(10)).is_ok());
    }

    #[test]
    fn test_released_on_drop() {
        let locks = KeyedLocks::new("invoice");
        drop(locks.acquire(LeaseId(1), Duration::from_millis(10)).unwrap());
        assert!(!locks.is_locked(LeaseId(1)));
        assert!(locks.acquire(LeaseId(1), Duration::from_millis(10)).is_ok());
    }

    #[test]
    fn test_waiter_wakes_after_release() {
        let locks = Arc::new(KeyedLocks::new("lease"));
        let guard = locks.acquire(LeaseId(7), Duration::from_millis(10)).unwrap();
        let waiter = {
            let locks = Arc::clone(&locks);
            thread::spawn(move || {
                let acquired = locks.acquire(LeaseId(7), Duration::from_secs(5)).is_ok();
                acquired
            })
        };
        thread::sleep(Duration::from_millis(20));
        drop(guard);
        assert!(waiter.join().unwrap());
    }
}
