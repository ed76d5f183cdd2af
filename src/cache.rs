use std::{
    any::Any,
    collections::HashMap,
    future::Future,
    sync::Arc,
    time::{Duration, Instant},
};
use tokio::sync::RwLock;
use tracing::debug;

type Entry = (Instant, Arc<dyn Any + Send + Sync>);

/// Short-lived cache of backend reads, keyed by strings like
/// `membership:{email}:{club_id}`.
///
/// Mutations drop entries by key prefix so the next page load refetches.
#[derive(Debug)]
pub struct QueryCache {
    ttl: Duration,
    entries: RwLock<HashMap<String, Entry>>,
}

pub mod keys {
    pub const FEATURED_CLUBS: &str = "clubs:featured";
    pub const APPROVED_CLUBS: &str = "clubs:approved";
    pub const CLUBS: &str = "clubs:";
    pub const ALL_EVENTS: &str = "events:all";
    pub const EVENTS: &str = "events:";
    pub const MEMBERSHIP_CHECKS: &str = "membership:";

    pub fn club(id: &str) -> String {
        format!("club:{id}")
    }

    pub fn event(id: &str) -> String {
        format!("event:{id}")
    }

    pub fn membership(email: &str, club_id: &str) -> String {
        format!("membership:{email}:{club_id}")
    }

    pub fn registration(email: &str, event_id: &str) -> String {
        format!("registration:{email}:{event_id}")
    }

    /// Prefixes covering every view that depends on what `email` has joined.
    pub fn enrollments(email: &str) -> [String; 4] {
        [
            format!("membership:{email}:"),
            format!("registration:{email}:"),
            format!("memberships:{email}"),
            format!("registrations:{email}"),
        ]
    }
}

impl QueryCache {
    pub fn new(ttl: Duration) -> Self {
        Self {
            ttl,
            entries: RwLock::new(HashMap::new()),
        }
    }

    /// Returns the cached value under `key`, or runs `fetch` and caches a
    /// successful result. Failures are never cached.
    pub async fn get_or_fetch<T, E, F, Fut>(&self, key: &str, fetch: F) -> Result<T, E>
    where
        T: Clone + Send + Sync + 'static,
        F: FnOnce() -> Fut,
        Fut: Future<Output = Result<T, E>>,
    {
        if let Some(value) = self.get::<T>(key).await {
            return Ok(value);
        }

        let value = fetch().await?;
        let mut entries = self.entries.write().await;
        entries.retain(|_, (stored_at, _)| stored_at.elapsed() <= self.ttl);
        entries.insert(key.to_string(), (Instant::now(), Arc::new(value.clone())));
        Ok(value)
    }

    pub async fn get<T: Clone + 'static>(&self, key: &str) -> Option<T> {
        let entries = self.entries.read().await;
        let (stored_at, value) = entries.get(key)?;
        if stored_at.elapsed() > self.ttl {
            return None;
        }
        value.downcast_ref::<T>().cloned()
    }

    #[cfg(test)]
    async fn len(&self) -> usize {
        self.entries.read().await.len()
    }

    #[cfg(test)]
    async fn contains(&self, key: &str) -> bool {
        self.entries
            .read()
            .await
            .get(key)
            .is_some_and(|(stored_at, _)| stored_at.elapsed() <= self.ttl)
    }

    pub async fn invalidate(&self, key: &str) {
        self.entries.write().await.remove(key);
    }

    pub async fn invalidate_prefix(&self, prefix: &str) {
        let mut entries = self.entries.write().await;
        let before = entries.len();
        entries.retain(|key, _| !key.starts_with(prefix));
        debug!("invalidated {} cache entries under {:?}", before - entries.len(), prefix);
    }

    pub async fn invalidate_all<I, S>(&self, prefixes: I)
    where
        I: IntoIterator<Item = S>,
        S: AsRef<str>,
    {
        for prefix in prefixes {
            self.invalidate_prefix(prefix.as_ref()).await;
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicUsize, Ordering};

    #[tokio::test]
    async fn second_read_is_served_from_cache() {
        let cache = QueryCache::new(Duration::from_secs(60));
        let counter = AtomicUsize::new(0);
        let calls = &counter;
        for _ in 0..2 {
            let value: Result<u32, ()> = cache
                .get_or_fetch("club:c1", move || async move {
                    calls.fetch_add(1, Ordering::SeqCst);
                    Ok(7)
                })
                .await;
            assert_eq!(value, Ok(7));
        }
        assert_eq!(counter.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn failures_are_not_cached() {
        let cache = QueryCache::new(Duration::from_secs(60));
        let failed: Result<u32, &str> = cache.get_or_fetch("k", || async { Err("down") }).await;
        assert_eq!(failed, Err("down"));
        assert!(!cache.contains("k").await);
    }

    #[tokio::test]
    async fn prefix_invalidation_is_scoped() {
        let cache = QueryCache::new(Duration::from_secs(60));
        for key in [
            keys::membership("a@x.io", "c1"),
            keys::membership("a@x.io", "c2"),
            keys::membership("b@x.io", "c1"),
        ] {
            let _: Result<bool, ()> = cache.get_or_fetch(&key, || async { Ok(true) }).await;
        }

        cache.invalidate_all(keys::enrollments("a@x.io")).await;

        assert!(!cache.contains(&keys::membership("a@x.io", "c1")).await);
        assert!(!cache.contains(&keys::membership("a@x.io", "c2")).await);
        assert!(cache.contains(&keys::membership("b@x.io", "c1")).await);
    }

    #[tokio::test]
    async fn expired_entries_are_refetched() {
        let cache = QueryCache::new(Duration::ZERO);
        let _: Result<u8, ()> = cache.get_or_fetch("k", || async { Ok(1) }).await;
        tokio::time::sleep(Duration::from_millis(5)).await;
        let second: Result<u8, ()> = cache.get_or_fetch("k", || async { Ok(2) }).await;
        assert_eq!(second, Ok(2));
    }

    #[tokio::test]
    async fn writes_sweep_expired_entries() {
        let cache = QueryCache::new(Duration::ZERO);
        for club in 0..500 {
            let key = keys::membership("a@x.io", &format!("c{club}"));
            let _: Result<bool, ()> = cache.get_or_fetch(&key, || async { Ok(true) }).await;
        }
        tokio::time::sleep(Duration::from_millis(5)).await;

        let _: Result<bool, ()> = cache
            .get_or_fetch(&keys::membership("b@x.io", "c1"), || async { Ok(true) })
            .await;

        assert_eq!(cache.len().await, 1);
    }

    #[tokio::test]
    async fn wrong_type_is_a_miss() {
        let cache = QueryCache::new(Duration::from_secs(60));
        let _: Result<u8, ()> = cache.get_or_fetch("k", || async { Ok(1) }).await;
        assert_eq!(cache.get::<String>("k").await, None);
    }
}
