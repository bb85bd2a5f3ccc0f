use chrono::{DateTime, Days, NaiveDate, TimeZone, Timelike, Utc};
use chrono_tz::Tz;

use super::WatchError;

/// Source of the current instant. The watcher converts it to its own zone.
pub(crate) trait Clock: Send {
    fn now(&self) -> DateTime<Utc>;
}

#[derive(Debug, Clone, Copy, Default)]
pub(crate) struct SystemClock;

impl Clock for SystemClock {
    fn now(&self) -> DateTime<Utc> {
        Utc::now()
    }
}

/// Fires once per local day during `hour` in `zone`.
#[derive(Debug, Clone, Copy, PartialEq)]
pub(crate) struct DailySchedule {
    zone: Tz,
    hour: u32,
}

impl DailySchedule {
    pub(crate) fn new(zone: &str, hour: u32) -> Result<Self, WatchError> {
        let zone: Tz = zone
            .parse()
            .map_err(|e| WatchError::Clock(format!("unknown time zone {:?}: {}", zone, e)))?;
        if hour > 23 {
            return Err(WatchError::Clock(format!(
                "notice hour {} is not an hour of the day",
                hour
            )));
        }
        Ok(Self { zone, hour })
    }

    pub(crate) fn zone(&self) -> Tz {
        self.zone
    }

    pub(crate) fn hour(&self) -> u32 {
        self.hour
    }

    pub(crate) fn local(&self, now: DateTime<Utc>) -> DateTime<Tz> {
        now.with_timezone(&self.zone)
    }

    pub(crate) fn today(&self, now: DateTime<Utc>) -> NaiveDate {
        self.local(now).date_naive()
    }

    pub(crate) fn is_trigger_hour(&self, now: DateTime<Utc>) -> bool {
        self.local(now).hour() == self.hour
    }

    /// First trigger instant strictly after `now`.
    pub(crate) fn next_after(&self, now: DateTime<Utc>) -> DateTime<Utc> {
        let today = self.today(now);
        for offset in 0..=7 {
            let candidate = today
                .checked_add_days(Days::new(offset))
                .and_then(|day| day.and_hms_opt(self.hour, 0, 0))
                .and_then(|naive| self.zone.from_local_datetime(&naive).earliest())
                .map(|local| local.with_timezone(&Utc));
            // a DST gap can swallow the trigger hour, try the next day
            if let Some(at) = candidate {
                if at > now {
                    return at;
                }
            }
        }
        now + chrono::Duration::days(1)
    }
}

/// Inclusive date range `[today, today + days]`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) struct ExpiringWindow {
    start: NaiveDate,
    end: NaiveDate,
}

impl ExpiringWindow {
    pub(crate) const DEFAULT_DAYS: u32 = 5;

    pub(crate) fn starting(today: NaiveDate, days: u32) -> Self {
        let end = today
            .checked_add_days(Days::new(u64::from(days)))
            .unwrap_or(NaiveDate::MAX);
        Self { start: today, end }
    }

    pub(crate) fn start(&self) -> NaiveDate {
        self.start
    }

    pub(crate) fn end(&self) -> NaiveDate {
        self.end
    }

    #[cfg(test)]
    pub(crate) fn contains(&self, date: NaiveDate) -> bool {
        self.start <= date && date <= self.end
    }
}
