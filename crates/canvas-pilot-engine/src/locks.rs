//! Advisory per-zone locks.
//!
//! Macros touching the same `(canvas, zone)` run one at a time. Multi-zone
//! macros take their locks in sorted order so two moves in opposite
//! directions cannot deadlock.

use std::collections::HashMap;
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};

use tokio::sync::{Mutex as AsyncMutex, OwnedMutexGuard};

type ZoneKey = (String, String);
type Registry = Mutex<HashMap<ZoneKey, Arc<AsyncMutex<()>>>>;

/// Zone mutexes exist only while some macro holds or waits for them.
#[derive(Default)]
pub struct ZoneLocks {
    zones: Arc<Registry>,
}

/// Held for the duration of a macro; dropping it releases every zone.
pub struct ZoneGuard {
    held: Vec<OwnedMutexGuard<()>>,
    keys: Vec<ZoneKey>,
    zones: Arc<Registry>,
}

fn registry(zones: &Registry) -> MutexGuard<'_, HashMap<ZoneKey, Arc<AsyncMutex<()>>>> {
    zones.lock().unwrap_or_else(PoisonError::into_inner)
}

impl ZoneLocks {
    pub fn new() -> Self {
        Self::default()
    }

    pub async fn acquire(&self, canvas_id: &str, zone_ids: &[&str]) -> ZoneGuard {
        let mut keys: Vec<ZoneKey> = zone_ids
            .iter()
            .map(|z| (canvas_id.to_string(), z.to_string()))
            .collect();
        keys.sort();
        keys.dedup();

        let mutexes: Vec<Arc<AsyncMutex<()>>> = {
            let mut zones = registry(&self.zones);
            zones.retain(|_, m| Arc::strong_count(m) > 1);
            keys.iter()
                .map(|k| zones.entry(k.clone()).or_default().clone())
                .collect()
        };

        let mut guard = ZoneGuard {
            held: Vec::with_capacity(mutexes.len()),
            keys,
            zones: self.zones.clone(),
        };
        for m in mutexes {
            guard.held.push(m.lock_owned().await);
        }
        guard
    }

    #[cfg(test)]
    fn tracked(&self) -> usize {
        registry(&self.zones).len()
    }
}

impl Drop for ZoneGuard {
    fn drop(&mut self) {
        self.held.clear();
        let mut zones = registry(&self.zones);
        for key in &self.keys {
            // Only the registry's own handle left: nobody holds or waits.
            if zones.get(key).is_some_and(|m| Arc::strong_count(m) == 1) {
                zones.remove(key);
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::time::Duration;

    #[tokio::test]
    async fn test_same_zone_is_exclusive() {
        let locks = Arc::new(ZoneLocks::new());
        let guard = locks.acquire("cv", &["a"]).await;

        let contender = {
            let locks = locks.clone();
            tokio::spawn(async move {
                let _g = locks.acquire("cv", &["a", "b"]).await;
            })
        };
        tokio::time::sleep(Duration::from_millis(30)).await;
        assert!(!contender.is_finished());

        drop(guard);
        tokio::time::timeout(Duration::from_secs(1), contender)
            .await
            .unwrap()
            .unwrap();
    }

    #[tokio::test]
    async fn test_other_zone_or_canvas_not_blocked() {
        let locks = ZoneLocks::new();
        let _a = locks.acquire("cv", &["a"]).await;
        let _b = tokio::time::timeout(Duration::from_millis(100), locks.acquire("cv", &["b"]))
            .await
            .unwrap();
        let _other = tokio::time::timeout(Duration::from_millis(100), locks.acquire("cv2", &["a"]))
            .await
            .unwrap();
    }

    #[tokio::test]
    async fn test_duplicate_zone_ids_do_not_self_deadlock() {
        let locks = ZoneLocks::new();
        let _g = tokio::time::timeout(Duration::from_millis(100), locks.acquire("cv", &["a", "a"]))
            .await
            .unwrap();
    }

    #[tokio::test]
    async fn test_released_zones_are_forgotten() {
        let locks = ZoneLocks::new();
        for i in 0..1000 {
            let zone = format!("z{i}");
            let _g = locks.acquire("cv", &[zone.as_str(), "shared"]).await;
        }
        assert_eq!(locks.tracked(), 0);
    }

    #[tokio::test]
    async fn test_entry_kept_while_waiter_queued() {
        let locks = Arc::new(ZoneLocks::new());
        let first = locks.acquire("cv", &["a"]).await;
        let waiter = {
            let locks = locks.clone();
            tokio::spawn(async move {
                let _g = locks.acquire("cv", &["a"]).await;
            })
        };
        tokio::time::sleep(Duration::from_millis(30)).await;

        drop(first);
        assert_eq!(locks.tracked(), 1);
        tokio::time::timeout(Duration::from_secs(1), waiter)
            .await
            .unwrap()
            .unwrap();
        assert_eq!(locks.tracked(), 0);
    }

    #[tokio::test]
    async fn test_cancelled_acquire_is_pruned_later() {
        let locks = ZoneLocks::new();
        let held = locks.acquire("cv", &["a"]).await;
        let timed_out =
            tokio::time::timeout(Duration::from_millis(20), locks.acquire("cv", &["a", "b"])).await;
        assert!(timed_out.is_err());
        drop(held);

        let _other = locks.acquire("cv", &["c"]).await;
        assert_eq!(locks.tracked(), 1);
    }
}
