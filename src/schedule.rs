//! Daily trigger for the channel sync job.

use std::time::Duration;

use anyhow::{Context, Result, bail};
use chrono::{Days, Local, NaiveDateTime, NaiveTime, TimeZone};

/// Wall-clock time of day at which the sync runs, in local time.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct DailySchedule {
    at: NaiveTime,
}

impl DailySchedule {
    /// Parses `HH:MM` (24h).
    pub fn parse(value: &str) -> Result<Self> {
        let value = value.trim();
        let (hour, minute) = value
            .split_once(':')
            .with_context(|| format!("expected HH:MM, got {value:?}"))?;
        let hour: u32 = hour
            .parse()
            .with_context(|| format!("invalid hour in {value:?}"))?;
        let minute: u32 = minute
            .parse()
            .with_context(|| format!("invalid minute in {value:?}"))?;
        let Some(at) = NaiveTime::from_hms_opt(hour, minute, 0) else {
            bail!("time of day out of range: {value:?}");
        };
        Ok(Self { at })
    }

    pub fn time(&self) -> NaiveTime {
        self.at
    }

    /// First trigger strictly after `now`.
    pub fn next_after(&self, now: NaiveDateTime) -> NaiveDateTime {
        let today = now.date().and_time(self.at);
        if today > now {
            return today;
        }
        now.date()
            .checked_add_days(Days::new(1))
            .map(|date| date.and_time(self.at))
            .unwrap_or(today)
    }

    /// Time to sleep until the next local trigger.
    pub fn until_next(&self) -> Duration {
        let now = Local::now();
        let next = self.next_after(now.naive_local());
        // Spring-forward gaps have no local representation; fall back to an
        // hour later on the same wall clock.
        let next = Local
            .from_local_datetime(&next)
            .earliest()
            .or_else(|| {
                Local
                    .from_local_datetime(&(next + chrono::Duration::hours(1)))
                    .earliest()
            });
        match next {
            Some(next) => (next - now).to_std().unwrap_or(Duration::from_secs(1)),
            None => Duration::from_secs(60 * 60),
        }
    }
}
