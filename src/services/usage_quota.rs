//! Usage Quota Service
//!
//! Per-IP daily usage counters and bonus pools. Every key is scoped to the
//! current day and expires at the next midnight of the service's clock.

use chrono::{DateTime, FixedOffset, NaiveDate, Utc};
use tracing::{debug, info, warn};

use crate::cache::CacheStore;
use crate::config::Config;
use crate::error::{CacheError, Result};
use crate::models::{BonusType, TotalQuota, UsageStatus};
use crate::services::keys::{bonus_quota_key, daily_usage_key};
use crate::services::DayClock;

/// Daily allowance used when none is configured.
pub const DEFAULT_BASE_QUOTA: i64 = 5;

// == Usage Quota Service ==
#[derive(Clone)]
pub struct UsageQuotaService {
    store: CacheStore,
    clock: DayClock,
    base_quota: i64,
}

impl UsageQuotaService {
    pub fn new(store: CacheStore, clock: DayClock) -> Self {
        Self {
            store,
            clock,
            base_quota: DEFAULT_BASE_QUOTA,
        }
    }

    /// Replaces the allowance used by the `*_default` methods.
    pub fn with_base_quota(mut self, base_quota: i64) -> Self {
        self.base_quota = base_quota.max(0);
        self
    }

    pub fn from_config(store: CacheStore, config: &Config) -> Self {
        Self::new(
            store,
            DayClock::from_offset_minutes(config.quota_utc_offset_minutes),
        )
        .with_base_quota(config.base_daily_quota)
    }

    /// The configured daily allowance.
    pub fn base_quota(&self) -> i64 {
        self.base_quota
    }

    fn today(&self) -> (DateTime<FixedOffset>, NaiveDate) {
        let now = self.clock.now();
        (now, self.clock.today(now))
    }

    /// Today's usage count for `ip`, 0 if nothing was recorded.
    pub async fn get_daily_usage(&self, ip: &str) -> Result<i64> {
        let (_, date) = self.today();
        let key = daily_usage_key(date, ip);
        let raw = self.store.get(&key).await?;
        Ok(parse_count(&key, raw))
    }

    /// Records one use. The first use of the day starts the counter's
    /// expiry at the next midnight.
    pub async fn increment_daily_usage(&self, ip: &str) -> Result<i64> {
        let (now, date) = self.today();
        let key = daily_usage_key(date, ip);

        let count = self.store.incr(&key).await?;
        if count == 1 {
            let ttl = self.clock.seconds_until_midnight(now);
            self.store.expire(&key, ttl as i64).await?;
            debug!(ip = %ip, ttl, "started daily usage counter");
        }
        Ok(count)
    }

    /// Clears today's counter. Idempotent.
    pub async fn reset_daily_usage(&self, ip: &str) -> Result<()> {
        let (_, date) = self.today();
        let removed = self.store.del(&daily_usage_key(date, ip)).await?;
        info!(ip = %ip, removed, "daily usage reset");
        Ok(())
    }

    pub async fn get_bonus_quota(&self, ip: &str, bonus_type: BonusType) -> Result<i64> {
        let (_, date) = self.today();
        let key = bonus_quota_key(bonus_type, date, ip);
        let raw = self.store.get(&key).await?;
        Ok(parse_count(&key, raw))
    }

    /// Adds `amount` to today's pool and pushes its expiry to the next
    /// midnight. Returns the new pool total.
    pub async fn add_bonus_quota(
        &self,
        ip: &str,
        bonus_type: BonusType,
        amount: i64,
    ) -> Result<i64> {
        if amount <= 0 {
            return Err(CacheError::InvalidRequest(format!(
                "bonus amount must be positive, got {}",
                amount
            )));
        }

        let (now, date) = self.today();
        let key = bonus_quota_key(bonus_type, date, ip);

        let total = self.store.incr_by(&key, amount).await?;
        let ttl = self.clock.seconds_until_midnight(now);
        self.store.expire(&key, ttl as i64).await?;

        info!(ip = %ip, bonus = %bonus_type, amount, total, "bonus quota added");
        Ok(total)
    }

    /// Base allowance plus today's bonus pools, read in one batch.
    pub async fn get_total_quota(&self, ip: &str, base_quota: i64) -> Result<TotalQuota> {
        let (_, date) = self.today();
        let keys: Vec<String> = BonusType::ALL
            .iter()
            .map(|bonus_type| bonus_quota_key(*bonus_type, date, ip))
            .collect();

        let values = self.store.mget(&keys).await?;
        let counts = parse_counts(&keys, values);
        Ok(TotalQuota::new(base_quota, counts[0], counts[1]))
    }

    /// Today's usage against today's quota.
    ///
    /// The counter and bonus pools come from one batched read. The reset time
    /// follows the counter's live TTL, or the next midnight if it has none.
    pub async fn get_usage_status(&self, ip: &str, base_quota: i64) -> Result<UsageStatus> {
        let (now, date) = self.today();
        let usage_key = daily_usage_key(date, ip);

        let mut keys = vec![usage_key.clone()];
        keys.extend(
            BonusType::ALL
                .iter()
                .map(|bonus_type| bonus_quota_key(*bonus_type, date, ip)),
        );

        let values = self.store.mget(&keys).await?;
        let counts = parse_counts(&keys, values);
        let quota = TotalQuota::new(base_quota, counts[1], counts[2]);

        let ttl = self.store.ttl(&usage_key).await?;
        let reset_time = if ttl > 0 {
            Utc::now() + chrono::Duration::seconds(ttl)
        } else {
            self.clock.next_midnight(now)
        };

        Ok(UsageStatus::new(counts[0], quota, reset_time))
    }

    /// [`get_usage_status`](Self::get_usage_status) with the configured allowance.
    pub async fn get_usage_status_default(&self, ip: &str) -> Result<UsageStatus> {
        self.get_usage_status(ip, self.base_quota).await
    }

    pub async fn can_use(&self, ip: &str, base_quota: i64) -> Result<bool> {
        Ok(self.get_usage_status(ip, base_quota).await?.can_use)
    }

    pub async fn can_use_default(&self, ip: &str) -> Result<bool> {
        self.can_use(ip, self.base_quota).await
    }
}

/// Reads a stored counter. Missing or non-numeric values count as 0.
fn parse_count(key: &str, raw: Option<String>) -> i64 {
    match raw {
        None => 0,
        Some(value) => value.parse().unwrap_or_else(|_| {
            warn!(key = %key, value = %value, "ignoring non-numeric counter");
            0
        }),
    }
}

fn parse_counts(keys: &[String], values: Vec<Option<String>>) -> Vec<i64> {
    let mut counts: Vec<i64> = keys
        .iter()
        .zip(values)
        .map(|(key, raw)| parse_count(key, raw))
        .collect();
    counts.resize(keys.len(), 0);
    counts
}
