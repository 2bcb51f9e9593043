//! Named locks
//!
//! Terraform runs operations on independent resources in parallel. Several
//! Cloud Avenue objects (a VDC group's firewall, its security groups, an edge
//! gateway's networks) are written through a single parent document, so
//! concurrent writers must take the lock named after that parent first.

use dashmap::DashMap;
use once_cell::sync::Lazy;
use std::sync::Arc;
use tokio::sync::{Mutex, OwnedMutexGuard};
use tracing::trace;

/// Process-wide lock table shared by every resource.
pub static KV_MUTEX: Lazy<KvMutex> = Lazy::new(KvMutex::new);

/// A mutex per key, created on first use.
#[derive(Default)]
pub struct KvMutex {
    locks: DashMap<String, Arc<Mutex<()>>>,
}

/// Held while the key is locked; dropping it releases the key.
pub struct KvGuard {
    key: String,
    _guard: OwnedMutexGuard<()>,
}

impl KvGuard {
    pub fn key(&self) -> &str {
        &self.key
    }
}

impl Drop for KvGuard {
    fn drop(&mut self) {
        trace!(key = %self.key, "unlocked");
    }
}

impl KvMutex {
    pub fn new() -> Self {
        Self {
            locks: DashMap::new(),
        }
    }

    /// Waits until `key` is free and locks it.
    pub async fn lock(&self, key: impl Into<String>) -> KvGuard {
        let key = key.into();
        // Clone the Arc out so the shard lock is not held across the await.
        let mutex = self
            .locks
            .entry(key.clone())
            .or_insert_with(|| Arc::new(Mutex::new(())))
            .clone();

        trace!(key = %key, "locking");
        let guard = mutex.lock_owned().await;
        trace!(key = %key, "locked");

        KvGuard { key, _guard: guard }
    }

    /// Locks `key` only if nobody holds it.
    pub fn try_lock(&self, key: &str) -> Option<KvGuard> {
        let mutex = self
            .locks
            .entry(key.to_string())
            .or_insert_with(|| Arc::new(Mutex::new(())))
            .clone();
        mutex.try_lock_owned().ok().map(|guard| KvGuard {
            key: key.to_string(),
            _guard: guard,
        })
    }

    pub fn len(&self) -> usize {
        self.locks.len()
    }

    pub fn is_empty(&self) -> bool {
        self.locks.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::time::Duration;

    #[tokio::test]
    async fn test_same_key_serializes() {
        let kv = Arc::new(KvMutex::new());
        let inside = Arc::new(AtomicUsize::new(0));
        let max_inside = Arc::new(AtomicUsize::new(0));

        let mut handles = Vec::new();
        for _ in 0..8 {
            let kv = kv.clone();
            let inside = inside.clone();
            let max_inside = max_inside.clone();
            handles.push(tokio::spawn(async move {
                let _guard = kv.lock("urn:vcloud:vdcGroup:1").await;
                let now = inside.fetch_add(1, Ordering::SeqCst) + 1;
                max_inside.fetch_max(now, Ordering::SeqCst);
                tokio::time::sleep(Duration::from_millis(5)).await;
                inside.fetch_sub(1, Ordering::SeqCst);
            }));
        }
        for handle in handles {
            handle.await.unwrap();
        }

        assert_eq!(max_inside.load(Ordering::SeqCst), 1);
        assert_eq!(kv.len(), 1);
    }

    #[tokio::test]
    async fn test_distinct_keys_do_not_block() {
        let kv = KvMutex::new();
        let _a = kv.lock("vdcg-a").await;
        let b = kv.try_lock("vdcg-b");
        assert!(b.is_some());
        assert!(kv.try_lock("vdcg-a").is_none());
    }

    #[tokio::test]
    async fn test_drop_releases() {
        let kv = KvMutex::new();
        {
            let guard = kv.lock("edge-01").await;
            assert_eq!(guard.key(), "edge-01");
            assert!(kv.try_lock("edge-01").is_none());
        }
        assert!(kv.try_lock("edge-01").is_some());
    }
}
