//! Session Cache Service
//!
//! Keeps each session under `session:<id>` and a reverse pointer under
//! `ip_session:<ip>`. Both keys are written, extended, and deleted together
//! and always share one TTL.
//!
//! Ordering matters where a failure could split the pair: the payload is
//! written before the pointer and the pointer is deleted before the payload,
//! so a pointer never outlives the session it names.

use chrono::Utc;
use tracing::{debug, info, warn};

use crate::cache::CacheStore;
use crate::config::Config;
use crate::error::{CacheError, Result};
use crate::models::{IpSessionStats, Session};
use crate::services::keys::{
    ip_session_key, session_id_from_key, session_key, IP_SESSION_PATTERN, SESSION_PATTERN,
};

/// Session lifetime when none is configured: 24 hours.
pub const DEFAULT_SESSION_TTL: u64 = 86_400;

// == Session Cache Service ==
#[derive(Clone)]
pub struct SessionCacheService {
    store: CacheStore,
    ttl: u64,
}

impl SessionCacheService {
    pub fn new(store: CacheStore) -> Self {
        Self::with_ttl(store, DEFAULT_SESSION_TTL)
    }

    pub fn with_ttl(store: CacheStore, ttl: u64) -> Self {
        Self {
            store,
            ttl: ttl.max(1),
        }
    }

    pub fn from_config(store: CacheStore, config: &Config) -> Self {
        Self::with_ttl(store, config.session_ttl)
    }

    pub fn ttl(&self) -> u64 {
        self.ttl
    }

    /// Writes the session and its IP pointer with the default TTL.
    pub async fn cache_session(&self, session: &Session) -> Result<()> {
        self.cache_session_for(session, self.ttl).await
    }

    /// Writes the session and its IP pointer, both expiring in `ttl` seconds.
    pub async fn cache_session_for(&self, session: &Session, ttl: u64) -> Result<()> {
        let payload = serde_json::to_string(session)?;
        let forward = session_key(&session.id);

        self.store.set(&forward, payload, Some(ttl)).await?;
        if let Err(err) = self
            .store
            .set(&ip_session_key(&session.ip), session.id.as_str(), Some(ttl))
            .await
        {
            // Keep the pair all-or-nothing
            if let Err(rollback) = self.store.del(&forward).await {
                warn!(
                    session_id = %session.id,
                    error = %rollback,
                    "failed to roll back session payload"
                );
            }
            return Err(err);
        }

        debug!(session_id = %session.id, ip = %session.ip, ttl, "session cached");
        Ok(())
    }

    /// The session stored under `id`. An unreadable payload is treated as absent.
    pub async fn get_session_by_id(&self, id: &str) -> Result<Option<Session>> {
        let raw = self.store.get(&session_key(id)).await?;
        Ok(raw.and_then(|payload| decode_session(id, &payload)))
    }

    /// Follows the IP pointer to its session. A pointer whose session is gone
    /// is removed on the way.
    ///
    /// The removal is best-effort: the pointer is re-read and only deleted if
    /// it still names the missing session, so a pointer rewritten for a new
    /// session in the meantime survives. A rewrite landing between that
    /// re-read and the delete can still be lost.
    pub async fn get_session_by_ip(&self, ip: &str) -> Result<Option<Session>> {
        let pointer = ip_session_key(ip);
        let Some(id) = self.store.get(&pointer).await? else {
            return Ok(None);
        };

        match self.store.get(&session_key(&id)).await? {
            Some(payload) => Ok(decode_session(&id, &payload)),
            None => {
                if self.remove_pointer_if_names(&pointer, &id).await? {
                    warn!(ip = %ip, session_id = %id, "removed dangling session pointer");
                }
                Ok(None)
            }
        }
    }

    /// Deletes the session and its IP pointer.
    pub async fn remove_session(&self, id: &str, ip: &str) -> Result<()> {
        self.store.del(&ip_session_key(ip)).await?;
        self.store.del(&session_key(id)).await?;
        debug!(session_id = %id, ip = %ip, "session removed");
        Ok(())
    }

    pub async fn session_exists(&self, id: &str) -> Result<bool> {
        self.store.exists(&session_key(id)).await
    }

    /// Restarts the expiry of both keys at `ttl` seconds.
    ///
    /// A `ttl` too large to schedule is rejected before either key changes.
    pub async fn extend_session_ttl(&self, id: &str, ip: &str, ttl: u64) -> Result<()> {
        let seconds = i64::try_from(ttl)
            .ok()
            .filter(|seconds| *seconds > 0)
            .ok_or_else(|| {
                CacheError::InvalidRequest(format!("invalid session ttl: {}s", ttl))
            })?;
        let extended = self.store.expire(&session_key(id), seconds).await?;
        self.store.expire(&ip_session_key(ip), seconds).await?;

        if !extended {
            debug!(session_id = %id, "extend requested for missing session");
        }
        Ok(())
    }

    /// Stamps `lastActiveAt` without changing the remaining lifetime.
    ///
    /// Returns `false` when the session does not exist.
    pub async fn touch_session(&self, id: &str) -> Result<bool> {
        let Some(mut session) = self.get_session_by_id(id).await? else {
            return Ok(false);
        };

        let remaining = self.store.ttl(&session_key(id)).await?;
        let ttl = match remaining {
            -2 => return Ok(false),
            seconds if seconds > 0 => seconds as u64,
            _ => self.ttl,
        };

        session.last_active_at = Utc::now();
        self.cache_session_for(&session, ttl).await?;
        Ok(true)
    }

    pub async fn get_ip_session_stats(&self, ip: &str) -> Result<IpSessionStats> {
        let Some(id) = self.store.get(&ip_session_key(ip)).await? else {
            return Ok(IpSessionStats::none());
        };

        let remaining = self.store.ttl(&session_key(&id)).await?;
        if remaining == -2 {
            return Ok(IpSessionStats::none());
        }

        Ok(IpSessionStats {
            has_active_session: true,
            session_id: Some(id),
            remaining_ttl: Some(remaining),
        })
    }

    /// Removes sessions that were written without an expiry.
    ///
    /// Expiring sessions are left to the backend. Returns the number removed.
    pub async fn clean_expired_sessions(&self) -> Result<usize> {
        let keys = self.store.keys(SESSION_PATTERN).await?;
        let mut cleaned = 0;

        for key in keys {
            if self.store.ttl(&key).await? != -1 {
                continue;
            }
            let Some(id) = session_id_from_key(&key) else {
                continue;
            };

            let ip = self
                .store
                .get(&key)
                .await?
                .and_then(|payload| decode_session(id, &payload))
                .map(|session| session.ip);

            match ip {
                Some(ip) => {
                    self.remove_pointer_if_names(&ip_session_key(&ip), id).await?;
                }
                None => self.remove_pointers_to(id).await?,
            }
            self.store.del(&key).await?;
            cleaned += 1;
        }

        if cleaned > 0 {
            info!("Session cleanup: removed {} sessions without expiry", cleaned);
        }
        Ok(cleaned)
    }
}

impl SessionCacheService {
    /// Deletes `pointer` only while it still holds `id`. Returns whether it
    /// was deleted.
    async fn remove_pointer_if_names(&self, pointer: &str, id: &str) -> Result<bool> {
        if self.store.get(pointer).await?.as_deref() != Some(id) {
            return Ok(false);
        }
        Ok(self.store.del(pointer).await? == 1)
    }

    /// Deletes every IP pointer that names `id`. Used when the payload that
    /// would have told us the IP cannot be read.
    async fn remove_pointers_to(&self, id: &str) -> Result<()> {
        for pointer in self.store.keys(IP_SESSION_PATTERN).await? {
            if self.remove_pointer_if_names(&pointer, id).await? {
                debug!(session_id = %id, pointer = %pointer, "removed orphaned session pointer");
            }
        }
        Ok(())
    }
}

fn decode_session(id: &str, payload: &str) -> Option<Session> {
    match serde_json::from_str(payload) {
        Ok(session) => Some(session),
        Err(e) => {
            warn!(session_id = %id, error = %e, "discarding unreadable session payload");
            None
        }
    }
}

// == Unit Tests ==
#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::QuotaSnapshot;

    fn service() -> (CacheStore, SessionCacheService) {
        let store = CacheStore::memory();
        (store.clone(), SessionCacheService::new(store))
    }

    fn session(id: &str, ip: &str) -> Session {
        Session::new(
            id,
            ip,
            QuotaSnapshot {
                used: 1,
                total: 5,
                remaining: 4,
            },
        )
    }

    #[tokio::test]
    async fn test_cache_and_lookup_both_ways() {
        let (_, service) = service();
        let s1 = session("s1", "10.0.0.1");

        service.cache_session(&s1).await.unwrap();

        assert_eq!(service.get_session_by_id("s1").await.unwrap(), Some(s1.clone()));
        let by_ip = service.get_session_by_ip("10.0.0.1").await.unwrap().unwrap();
        assert_eq!(by_ip.id, "s1");
        assert!(service.session_exists("s1").await.unwrap());
    }

    #[tokio::test]
    async fn test_both_keys_share_ttl() {
        let (store, service) = service();
        service.cache_session(&session("s1", "10.0.0.1")).await.unwrap();

        let forward = store.ttl("session:s1").await.unwrap();
        let pointer = store.ttl("ip_session:10.0.0.1").await.unwrap();
        assert!((86_399..=86_400).contains(&forward));
        assert!((86_399..=86_400).contains(&pointer));
    }

    #[tokio::test]
    async fn test_remove_session_removes_both_keys() {
        let (store, service) = service();
        service.cache_session(&session("s1", "10.0.0.1")).await.unwrap();

        service.remove_session("s1", "10.0.0.1").await.unwrap();

        assert_eq!(service.get_session_by_id("s1").await.unwrap(), None);
        assert_eq!(service.get_session_by_ip("10.0.0.1").await.unwrap(), None);
        assert!(!store.exists("ip_session:10.0.0.1").await.unwrap());
        assert!(!service.session_exists("s1").await.unwrap());
    }

    #[tokio::test]
    async fn test_extend_session_ttl() {
        let (store, service) = service();
        service
            .cache_session_for(&session("s1", "10.0.0.1"), 30)
            .await
            .unwrap();

        service.extend_session_ttl("s1", "10.0.0.1", 600).await.unwrap();

        assert!((599..=600).contains(&store.ttl("session:s1").await.unwrap()));
        assert!((599..=600).contains(&store.ttl("ip_session:10.0.0.1").await.unwrap()));
    }

    #[tokio::test]
    async fn test_extend_with_unschedulable_ttl_is_rejected() {
        let (store, service) = service();
        service
            .cache_session_for(&session("s1", "10.0.0.1"), 30)
            .await
            .unwrap();

        for ttl in [0, u64::MAX, i64::MAX as u64 + 1, i64::MAX as u64] {
            let result = service.extend_session_ttl("s1", "10.0.0.1", ttl).await;
            assert!(matches!(result, Err(CacheError::InvalidRequest(_))), "ttl {}", ttl);
        }

        assert!(service.session_exists("s1").await.unwrap());
        assert_eq!(
            service.get_session_by_ip("10.0.0.1").await.unwrap().map(|s| s.id),
            Some("s1".to_string())
        );
        assert!((29..=30).contains(&store.ttl("session:s1").await.unwrap()));
        assert!((29..=30).contains(&store.ttl("ip_session:10.0.0.1").await.unwrap()));
    }

    #[tokio::test]
    async fn test_corrupt_payload_reads_as_missing() {
        let (store, service) = service();
        store.set("session:bad", "{not json", Some(60)).await.unwrap();
        store.set("ip_session:10.0.0.9", "bad", Some(60)).await.unwrap();

        assert_eq!(service.get_session_by_id("bad").await.unwrap(), None);
        assert_eq!(service.get_session_by_ip("10.0.0.9").await.unwrap(), None);
    }

    #[tokio::test]
    async fn test_dangling_pointer_is_removed() {
        let (store, service) = service();
        store.set("ip_session:10.0.0.1", "gone", Some(60)).await.unwrap();

        assert_eq!(service.get_session_by_ip("10.0.0.1").await.unwrap(), None);
        assert!(!store.exists("ip_session:10.0.0.1").await.unwrap());
    }

    #[tokio::test]
    async fn test_repointed_pointer_is_not_removed() {
        let (store, service) = service();
        // "old" is gone, but the pointer was rewritten for a live session
        // before the dangling cleanup ran.
        service.cache_session(&session("new", "10.0.0.1")).await.unwrap();

        let removed = service
            .remove_pointer_if_names("ip_session:10.0.0.1", "old")
            .await
            .unwrap();
        assert!(!removed);
        assert_eq!(
            store.get("ip_session:10.0.0.1").await.unwrap().as_deref(),
            Some("new")
        );
        let found = service.get_session_by_ip("10.0.0.1").await.unwrap();
        assert_eq!(found.map(|s| s.id), Some("new".to_string()));
    }

    #[tokio::test]
    async fn test_ip_session_stats() {
        let (_, service) = service();
        assert_eq!(
            service.get_ip_session_stats("10.0.0.1").await.unwrap(),
            IpSessionStats::none()
        );

        service
            .cache_session_for(&session("s1", "10.0.0.1"), 120)
            .await
            .unwrap();
        let stats = service.get_ip_session_stats("10.0.0.1").await.unwrap();
        assert!(stats.has_active_session);
        assert_eq!(stats.session_id.as_deref(), Some("s1"));
        assert!((119..=120).contains(&stats.remaining_ttl.unwrap()));
    }

    #[tokio::test]
    async fn test_touch_session_keeps_remaining_ttl() {
        let (store, service) = service();
        let original = session("s1", "10.0.0.1");
        service.cache_session_for(&original, 300).await.unwrap();

        assert!(service.touch_session("s1").await.unwrap());
        assert!(!service.touch_session("missing").await.unwrap());

        let touched = service.get_session_by_id("s1").await.unwrap().unwrap();
        assert!(touched.last_active_at >= original.last_active_at);
        assert_eq!(touched.created_at, original.created_at);
        assert!((299..=300).contains(&store.ttl("session:s1").await.unwrap()));
    }

    #[tokio::test]
    async fn test_clean_expired_sessions_only_removes_unbounded() {
        let (store, service) = service();
        service.cache_session(&session("good", "10.0.0.1")).await.unwrap();

        let stray = session("stray", "10.0.0.2");
        store
            .set("session:stray", serde_json::to_string(&stray).unwrap(), None)
            .await
            .unwrap();
        store.set("ip_session:10.0.0.2", "stray", None).await.unwrap();
        store.set("session:junk", "not json", None).await.unwrap();
        store.set("ip_session:10.0.0.3", "junk", None).await.unwrap();

        assert_eq!(service.clean_expired_sessions().await.unwrap(), 2);

        assert!(service.session_exists("good").await.unwrap());
        assert!(!store.exists("session:stray").await.unwrap());
        assert!(!store.exists("ip_session:10.0.0.2").await.unwrap());
        assert!(!store.exists("session:junk").await.unwrap());
        assert!(!store.exists("ip_session:10.0.0.3").await.unwrap());
        assert!(store.exists("ip_session:10.0.0.1").await.unwrap());
    }

    #[tokio::test]
    async fn test_unreadable_payload_cleanup_keeps_other_pointers() {
        let (store, service) = service();
        service.cache_session(&session("live", "10.0.0.1")).await.unwrap();
        store.set("session:junk", "{", None).await.unwrap();
        store.set("ip_session:10.0.0.5", "junk", Some(60)).await.unwrap();

        assert_eq!(service.clean_expired_sessions().await.unwrap(), 1);

        assert!(!store.exists("ip_session:10.0.0.5").await.unwrap());
        assert_eq!(
            store.get("ip_session:10.0.0.1").await.unwrap().as_deref(),
            Some("live")
        );
    }
}
