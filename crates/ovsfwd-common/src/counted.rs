//! Reference-counted resource tracking.
//!
//! Host artifacts shared between connections (parent interfaces, VXLAN
//! tunnel ports) are created on first use and destroyed when the last
//! user releases them. `RefCounts` keeps the count per key and runs the
//! caller-supplied create/destroy effect at the edges.
//!
//! The map never auto-creates entries on lookup; an entry exists iff the
//! underlying resource is currently attached to the bridge. Owners wrap
//! the map in their own mutex and hold it across the create/destroy
//! command plus the count update.

use std::collections::HashMap;
use std::future::Future;

use crate::error::FwdResult;

/// Reference counts for shared, named resources.
#[derive(Debug, Default)]
pub struct RefCounts {
    counts: HashMap<String, i64>,
}

impl RefCounts {
    /// Creates an empty counter map.
    pub fn new() -> Self {
        Self::default()
    }

    /// Returns true if the resource is currently tracked.
    pub fn contains(&self, key: &str) -> bool {
        self.counts.contains_key(key)
    }

    /// Returns the current count for the key (0 when absent).
    pub fn count(&self, key: &str) -> i64 {
        self.counts.get(key).copied().unwrap_or(0)
    }

    /// Returns true if no resources are tracked.
    pub fn is_empty(&self) -> bool {
        self.counts.is_empty()
    }

    /// Returns the number of tracked resources.
    pub fn len(&self) -> usize {
        self.counts.len()
    }

    /// Acquires a reference to the keyed resource.
    ///
    /// Runs `create` only when the key is not yet tracked, then
    /// increments the count. Returns the new count.
    pub async fn acquire<Fut>(&mut self, key: &str, create: Fut) -> FwdResult<i64>
    where
        Fut: Future<Output = FwdResult<()>>,
    {
        if !self.counts.contains_key(key) {
            create.await?;
        }
        let count = self.counts.entry(key.to_string()).or_insert(0);
        *count += 1;
        Ok(*count)
    }

    /// Releases one reference to the keyed resource.
    ///
    /// When other references remain the count is decremented and
    /// `destroy` is not run. On the last reference (or an untracked key,
    /// which teardown treats as "count exhausted") `destroy` runs and the
    /// entry is removed. Returns true if `destroy` ran.
    ///
    /// If `destroy` fails the entry is left at zero so a retried close
    /// attempts the teardown again.
    pub async fn release<Fut>(&mut self, key: &str, destroy: Fut) -> FwdResult<bool>
    where
        Fut: Future<Output = FwdResult<()>>,
    {
        if let Some(count) = self.counts.get_mut(key) {
            if *count > 1 {
                *count -= 1;
                return Ok(false);
            }
            *count = 0;
        }
        destroy.await?;
        self.counts.remove(key);
        Ok(true)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::FwdError;
    use std::sync::atomic::{AtomicUsize, Ordering};

    #[tokio::test]
    async fn test_acquire_creates_once() {
        let created = AtomicUsize::new(0);
        let mut counts = RefCounts::new();

        let n = counts
            .acquire("v10002", async {
                created.fetch_add(1, Ordering::SeqCst);
                Ok(())
            })
            .await
            .unwrap();
        assert_eq!(n, 1);

        let n = counts
            .acquire("v10002", async {
                created.fetch_add(1, Ordering::SeqCst);
                Ok(())
            })
            .await
            .unwrap();
        assert_eq!(n, 2);
        assert_eq!(created.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn test_release_destroys_on_last() {
        let destroyed = AtomicUsize::new(0);
        let mut counts = RefCounts::new();
        counts.acquire("v10002", async { Ok(()) }).await.unwrap();
        counts.acquire("v10002", async { Ok(()) }).await.unwrap();

        let ran = counts
            .release("v10002", async {
                destroyed.fetch_add(1, Ordering::SeqCst);
                Ok(())
            })
            .await
            .unwrap();
        assert!(!ran);
        assert_eq!(counts.count("v10002"), 1);

        let ran = counts
            .release("v10002", async {
                destroyed.fetch_add(1, Ordering::SeqCst);
                Ok(())
            })
            .await
            .unwrap();
        assert!(ran);
        assert_eq!(destroyed.load(Ordering::SeqCst), 1);
        assert!(counts.is_empty());
    }

    #[tokio::test]
    async fn test_release_untracked_key_runs_destroy() {
        let mut counts = RefCounts::new();
        let destroyed = counts.release("gone", async { Ok(()) }).await.unwrap();
        assert!(destroyed);
        assert!(counts.is_empty());
    }

    #[tokio::test]
    async fn test_acquire_create_failure_leaves_no_entry() {
        let mut counts = RefCounts::new();
        let result = counts
            .acquire("v10002", async { Err(FwdError::internal("add-port failed")) })
            .await;
        assert!(result.is_err());
        assert!(!counts.contains("v10002"));
    }

    #[tokio::test]
    async fn test_release_destroy_failure_keeps_entry() {
        let mut counts = RefCounts::new();
        counts.acquire("v10002", async { Ok(()) }).await.unwrap();

        let result = counts
            .release("v10002", async { Err(FwdError::internal("del-port failed")) })
            .await;
        assert!(result.is_err());
        // entry stays at zero so a retried close runs the teardown again
        assert!(counts.contains("v10002"));
        assert_eq!(counts.count("v10002"), 0);
    }
}
