//! End-to-end scenarios for the quota and session services
//!
//! Both services share one injected store, the way the worker wires them.

use quota_cache::models::{BonusType, QuotaSnapshot, Session};
use quota_cache::services::DayClock;
use quota_cache::{CacheStore, Config, SessionCacheService, UsageQuotaService};

const IP: &str = "203.0.113.5";

fn services() -> (CacheStore, UsageQuotaService, SessionCacheService) {
    let store = CacheStore::from_config(&Config::default()).unwrap();
    let quota = UsageQuotaService::new(store.clone(), DayClock::utc());
    let sessions = SessionCacheService::new(store.clone());
    (store, quota, sessions)
}

#[tokio::test]
async fn test_quota_exhaustion_then_payment_bonus() {
    let (_, quota, _) = services();

    for expected in 1..=5 {
        assert_eq!(quota.increment_daily_usage(IP).await.unwrap(), expected);
    }

    let status = quota.get_usage_status(IP, 5).await.unwrap();
    assert_eq!(status.used, 5);
    assert_eq!(status.quota.total, 5);
    assert_eq!(status.remaining, 0);
    assert!(!status.can_use);

    quota.add_bonus_quota(IP, BonusType::Payment, 3).await.unwrap();

    let status = quota.get_usage_status(IP, 5).await.unwrap();
    assert_eq!(status.quota.total, 8);
    assert_eq!(status.quota.payment, 3);
    assert_eq!(status.remaining, 3);
    assert!(status.can_use);
}

#[tokio::test]
async fn test_usage_keys_follow_published_layout() {
    let (store, quota, _) = services();
    quota.increment_daily_usage(IP).await.unwrap();
    quota
        .add_bonus_quota(IP, "questionnaire".parse().unwrap(), 2)
        .await
        .unwrap();

    let today = DayClock::utc().today(DayClock::utc().now());
    let date = today.format("%Y-%m-%d").to_string();

    assert_eq!(
        store.keys("usage:daily:*").await.unwrap(),
        vec![format!("usage:daily:{}:{}", date, IP)]
    );
    assert_eq!(
        store.keys("usage:bonus:*").await.unwrap(),
        vec![format!("usage:bonus:questionnaire:{}:{}", date, IP)]
    );
}

#[tokio::test]
async fn test_over_quota_usage_never_reports_negative_remaining() {
    let (_, quota, _) = services();
    for _ in 0..7 {
        quota.increment_daily_usage(IP).await.unwrap();
    }

    let status = quota.get_usage_status(IP, 5).await.unwrap();
    assert_eq!(status.used, 7);
    assert_eq!(status.remaining, 0);
    assert!(!quota.can_use(IP, 5).await.unwrap());
}

#[tokio::test]
async fn test_session_lifecycle() {
    let (store, _, sessions) = services();
    let session = Session::new("s1", "10.0.0.1", QuotaSnapshot::default());

    sessions.cache_session(&session).await.unwrap();
    assert_eq!(
        sessions.get_session_by_ip("10.0.0.1").await.unwrap().unwrap().id,
        "s1"
    );

    sessions.extend_session_ttl("s1", "10.0.0.1", 60).await.unwrap();
    let stats = sessions.get_ip_session_stats("10.0.0.1").await.unwrap();
    assert!(stats.has_active_session);
    assert!((59..=60).contains(&stats.remaining_ttl.unwrap()));

    sessions.remove_session("s1", "10.0.0.1").await.unwrap();
    assert_eq!(sessions.get_session_by_id("s1").await.unwrap(), None);
    assert_eq!(sessions.get_session_by_ip("10.0.0.1").await.unwrap(), None);
    assert!(store.keys("ip_session:*").await.unwrap().is_empty());
    assert!(store.keys("session:*").await.unwrap().is_empty());
}

#[tokio::test]
async fn test_session_expires_with_its_pointer() {
    let (store, _, sessions) = services();
    let session = Session::new("short", "10.0.0.2", QuotaSnapshot::default());

    sessions.cache_session_for(&session, 1).await.unwrap();
    tokio::time::sleep(std::time::Duration::from_millis(1100)).await;

    assert_eq!(sessions.get_session_by_ip("10.0.0.2").await.unwrap(), None);
    assert!(!sessions.session_exists("short").await.unwrap());
    assert!(!store.exists("ip_session:10.0.0.2").await.unwrap());
}
