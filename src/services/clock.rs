//! Day boundary used by the quota service.

use chrono::{DateTime, Duration, FixedOffset, Local, NaiveDate, TimeZone, Utc};

/// Time zone whose midnight ends a quota day.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DayClock {
    /// The process's local time zone
    Local,
    /// A fixed UTC offset
    Fixed(FixedOffset),
}

impl DayClock {
    /// `None`, or an offset outside ±24h, falls back to local time.
    pub fn from_offset_minutes(minutes: Option<i32>) -> Self {
        minutes
            .and_then(|m| m.checked_mul(60))
            .and_then(FixedOffset::east_opt)
            .map(DayClock::Fixed)
            .unwrap_or(DayClock::Local)
    }

    pub fn utc() -> Self {
        DayClock::Fixed(FixedOffset::east_opt(0).expect("zero offset is valid"))
    }

    pub fn now(&self) -> DateTime<FixedOffset> {
        match self {
            DayClock::Local => Local::now().fixed_offset(),
            DayClock::Fixed(offset) => Utc::now().with_timezone(offset),
        }
    }

    /// Calendar date of `now` in this clock's zone.
    pub fn today(&self, now: DateTime<FixedOffset>) -> NaiveDate {
        match self {
            DayClock::Local => now.with_timezone(&Local).date_naive(),
            DayClock::Fixed(offset) => now.with_timezone(offset).date_naive(),
        }
    }

    /// The first instant of the day after `now`.
    pub fn next_midnight(&self, now: DateTime<FixedOffset>) -> DateTime<Utc> {
        let midnight = self
            .today(now)
            .succ_opt()
            .and_then(|date| date.and_hms_opt(0, 0, 0));

        let resolved = midnight.and_then(|naive| match self {
            DayClock::Local => Local
                .from_local_datetime(&naive)
                .earliest()
                .map(|dt| dt.with_timezone(&Utc)),
            DayClock::Fixed(offset) => offset
                .from_local_datetime(&naive)
                .single()
                .map(|dt| dt.with_timezone(&Utc)),
        });

        resolved.unwrap_or_else(|| now.with_timezone(&Utc) + Duration::days(1))
    }

    /// Whole seconds from `now` to the next midnight, at least 1.
    pub fn seconds_until_midnight(&self, now: DateTime<FixedOffset>) -> u64 {
        let remaining = self.next_midnight(now) - now.with_timezone(&Utc);
        remaining.num_seconds().max(1) as u64
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn at(offset_hours: i32, rfc3339: &str) -> DateTime<FixedOffset> {
        let offset = FixedOffset::east_opt(offset_hours * 3600).unwrap();
        DateTime::parse_from_rfc3339(rfc3339)
            .unwrap()
            .with_timezone(&offset)
    }

    #[test]
    fn test_seconds_until_midnight_utc() {
        let clock = DayClock::utc();
        let now = at(0, "2024-05-01T23:00:00Z");
        assert_eq!(clock.seconds_until_midnight(now), 3600);
    }

    #[test]
    fn test_seconds_until_midnight_uses_clock_zone() {
        // 23:00 UTC is 07:00 the next day at +08:00
        let clock = DayClock::from_offset_minutes(Some(8 * 60));
        let now = at(0, "2024-05-01T23:00:00Z");

        assert_eq!(
            clock.today(now),
            NaiveDate::from_ymd_opt(2024, 5, 2).unwrap()
        );
        assert_eq!(clock.seconds_until_midnight(now), 17 * 3600);
    }

    #[test]
    fn test_at_midnight_counts_a_full_day() {
        let clock = DayClock::utc();
        let now = at(0, "2024-05-01T00:00:00Z");
        assert_eq!(clock.seconds_until_midnight(now), 86_400);
    }

    #[test]
    fn test_never_below_one_second() {
        let clock = DayClock::utc();
        let now = DateTime::parse_from_rfc3339("2024-05-01T23:59:59.900Z").unwrap();
        assert_eq!(clock.seconds_until_midnight(now), 1);
    }

    #[test]
    fn test_invalid_offset_falls_back_to_local() {
        assert_eq!(DayClock::from_offset_minutes(Some(100 * 60)), DayClock::Local);
        assert_eq!(DayClock::from_offset_minutes(None), DayClock::Local);
    }

    #[test]
    fn test_local_midnight_is_in_the_future() {
        let clock = DayClock::Local;
        let now = clock.now();
        let seconds = clock.seconds_until_midnight(now);
        assert!((1..=25 * 3600).contains(&seconds));
    }
}
