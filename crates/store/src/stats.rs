//! Rolling windows for environment stats.
//!
//! Weekly is the last 7 days, monthly the last calendar month, yearly the last
//! 12 calendar months, all ending at the same reference instant.

use chrono::{DateTime, Duration, Months, Utc};

use notifeed_common::types::NotificationStats;

/// Lower bounds of the three stats windows, plus their shared upper bound.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct StatsWindow {
    pub week_start: DateTime<Utc>,
    pub month_start: DateTime<Utc>,
    pub year_start: DateTime<Utc>,
    pub end: DateTime<Utc>,
}

impl StatsWindow {
    pub fn ending_at(now: DateTime<Utc>) -> Self {
        Self {
            week_start: now - Duration::days(7),
            month_start: now.checked_sub_months(Months::new(1)).unwrap_or(now),
            year_start: now.checked_sub_months(Months::new(12)).unwrap_or(now),
            end: now,
        }
    }

    /// Count timestamps the same way the SQL aggregation does.
    pub fn tally<'a, I>(&self, timestamps: I) -> NotificationStats
    where
        I: IntoIterator<Item = &'a DateTime<Utc>>,
    {
        let mut stats = NotificationStats::default();
        for ts in timestamps {
            if *ts < self.year_start || *ts > self.end {
                continue;
            }
            stats.yearly += 1;
            if *ts >= self.month_start {
                stats.monthly += 1;
            }
            if *ts >= self.week_start {
                stats.weekly += 1;
            }
        }
        stats
    }
}
