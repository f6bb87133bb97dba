//! Mutual exclusion keyed by the unordered user pair.
//!
//! Every reconciliation step for `{a, b}` runs while holding the pair lock,
//! so at most one caller reads the reciprocal like and decides on promotion.

use std::sync::Arc;
use std::time::Duration;

use backon::{ExponentialBuilder, Retryable};
use dashmap::DashMap;
use tokio::sync::{Mutex, OwnedMutexGuard};
use uuid::Uuid;

use amora_shared::clients::redis::RedisClient;

use crate::models::PairKey;

const LOCK_PREFIX: &str = "matching:pair_lock";

#[derive(Debug, thiserror::Error)]
pub enum LockError {
    #[error("pair lock {0} is held by another caller")]
    Contended(PairKey),

    #[error("lock backend unavailable: {0}")]
    Backend(String),
}

pub enum PairLocks {
    /// In-process locks. Correct only when every caller shares this process.
    Local(LocalPairLocks),
    /// Redis lease shared by every instance of the service.
    Redis(RedisPairLocks),
}

impl PairLocks {
    pub fn local() -> Self {
        Self::Local(LocalPairLocks::default())
    }

    pub async fn acquire(&self, key: PairKey) -> Result<PairGuard, LockError> {
        match self {
            Self::Local(locks) => Ok(locks.acquire(key).await),
            Self::Redis(locks) => locks.acquire(key).await,
        }
    }

    /// Check that the lock backend answers. Always succeeds for local locks.
    pub async fn ping(&self) -> Result<(), LockError> {
        match self {
            Self::Local(_) => Ok(()),
            Self::Redis(locks) => locks
                .redis
                .ping()
                .await
                .map_err(|e| LockError::Backend(e.to_string())),
        }
    }

    pub fn backend_name(&self) -> &'static str {
        match self {
            Self::Local(_) => "local",
            Self::Redis(_) => "redis",
        }
    }
}

#[derive(Default)]
pub struct LocalPairLocks {
    slots: Arc<DashMap<PairKey, Arc<Mutex<()>>>>,
}

impl LocalPairLocks {
    async fn acquire(&self, key: PairKey) -> PairGuard {
        // Declared before the wait so a cancelled waiter still cleans up.
        let lease = SlotLease {
            key,
            slots: self.slots.clone(),
        };
        let slot = self
            .slots
            .entry(key)
            .or_insert_with(|| Arc::new(Mutex::new(())))
            .clone();
        let guard = slot.lock_owned().await;
        PairGuard::Local(LocalGuard { _guard: guard, _lease: lease })
    }

    /// Number of pairs with a live slot. Slots are dropped once unheld.
    pub fn active_slots(&self) -> usize {
        self.slots.len()
    }
}

pub struct RedisPairLocks {
    redis: RedisClient,
    ttl: Duration,
    max_retries: usize,
}

impl RedisPairLocks {
    pub fn new(redis: RedisClient, ttl: Duration, max_retries: usize) -> Self {
        Self { redis, ttl, max_retries }
    }

    async fn acquire(&self, key: PairKey) -> Result<PairGuard, LockError> {
        let redis_key = format!("{LOCK_PREFIX}:{key}");
        let token = Uuid::new_v4().to_string();
        let ttl_ms = u64::try_from(self.ttl.as_millis()).unwrap_or(u64::MAX);

        let (redis, lock_key, lock_token) = (&self.redis, redis_key.as_str(), token.as_str());
        let attempt = || async move {
            match redis.set_nx_px(lock_key, lock_token, ttl_ms).await {
                Ok(true) => Ok(()),
                Ok(false) => Err(LockError::Contended(key)),
                Err(e) => Err(LockError::Backend(e.to_string())),
            }
        };

        attempt
            .retry(
                ExponentialBuilder::default()
                    .with_min_delay(Duration::from_millis(10))
                    .with_max_delay(Duration::from_millis(250))
                    .with_max_times(self.max_retries),
            )
            .when(|e| matches!(e, LockError::Contended(_)))
            .await?;

        Ok(PairGuard::Redis {
            key,
            redis: self.redis.clone(),
            redis_key,
            token,
        })
    }
}

/// Removes the pair's slot once nobody holds or waits on it.
struct SlotLease {
    key: PairKey,
    slots: Arc<DashMap<PairKey, Arc<Mutex<()>>>>,
}

impl Drop for SlotLease {
    fn drop(&mut self) {
        self.slots.remove_if(&self.key, |_, slot| Arc::strong_count(slot) == 1);
    }
}

/// A held local lock. Fields drop in order: the mutex guard, then the lease.
pub struct LocalGuard {
    _guard: OwnedMutexGuard<()>,
    _lease: SlotLease,
}

/// Releasing explicitly is required for Redis leases. A dropped Redis guard
/// stays locked until its TTL runs out.
#[must_use = "a pair guard holds its lock until released or dropped"]
pub enum PairGuard {
    Local(LocalGuard),
    Redis {
        key: PairKey,
        redis: RedisClient,
        redis_key: String,
        token: String,
    },
}

impl PairGuard {
    pub async fn release(self) {
        match self {
            Self::Local(held) => drop(held),
            Self::Redis { key, redis, redis_key, token } => {
                match redis.compare_and_delete(&redis_key, &token).await {
                    Ok(true) => {}
                    Ok(false) => tracing::warn!(pair = %key, "pair lock lease expired before release"),
                    Err(e) => tracing::error!(pair = %key, error = %e, "failed to release pair lock"),
                }
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicUsize, Ordering};

    #[tokio::test]
    async fn both_orders_share_one_lock() {
        let locks = PairLocks::local();
        let (a, b) = (Uuid::now_v7(), Uuid::now_v7());
        let guard = locks.acquire(PairKey::new(a, b)).await.unwrap();

        let blocked = tokio::time::timeout(Duration::from_millis(50), locks.acquire(PairKey::new(b, a))).await;
        assert!(blocked.is_err());

        guard.release().await;
        let again = locks.acquire(PairKey::new(b, a)).await.unwrap();
        again.release().await;
    }

    #[tokio::test]
    async fn slots_are_removed_after_release() {
        let locks = LocalPairLocks::default();
        let guard = locks.acquire(PairKey::new(Uuid::now_v7(), Uuid::now_v7())).await;
        assert_eq!(locks.active_slots(), 1);
        guard.release().await;
        assert_eq!(locks.active_slots(), 0);
    }

    #[tokio::test]
    async fn dropped_guard_frees_its_slot() {
        let locks = LocalPairLocks::default();
        let key = PairKey::new(Uuid::now_v7(), Uuid::now_v7());
        let guard = locks.acquire(key).await;
        drop(guard);
        assert_eq!(locks.active_slots(), 0);
    }

    #[tokio::test]
    async fn cancelled_waiters_leave_no_slot_behind() {
        let locks = LocalPairLocks::default();
        let key = PairKey::new(Uuid::now_v7(), Uuid::now_v7());
        let holder = locks.acquire(key).await;

        for _ in 0..3 {
            let waited = tokio::time::timeout(Duration::from_millis(10), locks.acquire(key)).await;
            assert!(waited.is_err());
        }
        assert_eq!(locks.active_slots(), 1);

        holder.release().await;
        assert_eq!(locks.active_slots(), 0);
    }

    #[tokio::test]
    async fn local_backend_always_answers_ping() {
        assert!(PairLocks::local().ping().await.is_ok());
    }

    #[tokio::test(flavor = "multi_thread", worker_threads = 4)]
    async fn holders_never_overlap() {
        let locks = Arc::new(PairLocks::local());
        let inside = Arc::new(AtomicUsize::new(0));
        let key = PairKey::new(Uuid::now_v7(), Uuid::now_v7());

        let tasks: Vec<_> = (0..16)
            .map(|_| {
                let locks = locks.clone();
                let inside = inside.clone();
                tokio::spawn(async move {
                    let guard = locks.acquire(key).await.unwrap();
                    assert_eq!(inside.fetch_add(1, Ordering::SeqCst), 0);
                    tokio::time::sleep(Duration::from_millis(2)).await;
                    inside.fetch_sub(1, Ordering::SeqCst);
                    guard.release().await;
                })
            })
            .collect();

        for task in tasks {
            task.await.unwrap();
        }
    }
}
