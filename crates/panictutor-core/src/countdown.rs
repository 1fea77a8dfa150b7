//! Countdown to the next test.
//!
//! A test starts at the start time of its first non-blank period. Under
//! three days the countdown is shown to the centisecond; up to a week it is
//! shown in days; past that it is hidden.

use std::fmt;

use chrono::{DateTime, Local, NaiveTime};
use serde::Serialize;

use crate::schedule::ScheduleEntry;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum Countdown {
    Precise {
        hours: i64,
        minutes: i64,
        seconds: i64,
        centis: i64,
    },
    /// Whole days remaining, counted inclusively.
    Days(i64),
    /// A test today has already started and nothing later is scheduled.
    Underway,
    Hidden,
}

impl fmt::Display for Countdown {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Countdown::Precise {
                hours,
                minutes,
                seconds,
                centis,
            } => write!(
                f,
                "{hours:02}:{minutes:02}:{seconds:02}.{centis:02} until the next test"
            ),
            Countdown::Days(n) => write!(f, "{n} day(s) until the next test"),
            Countdown::Underway => f.write_str("test period is underway"),
            Countdown::Hidden => Ok(()),
        }
    }
}

/// Start instant of `entry`, or `None` if its date does not parse or it has
/// no subjects. Without a usable period start time the test starts at midnight.
pub fn test_start(entry: &ScheduleEntry, period_starts: &[Option<NaiveTime>]) -> Option<DateTime<Local>> {
    let date = entry.parsed_date().ok()?;
    let (first_period, _) = entry.occupied().next()?;
    let time = period_starts
        .get(usize::from(first_period - 1))
        .copied()
        .flatten()
        .unwrap_or(NaiveTime::MIN);
    date.and_time(time).and_local_timezone(Local).earliest()
}

/// The soonest test start at or after `now`.
pub fn next_test_start(
    entries: &[ScheduleEntry],
    period_starts: &[Option<NaiveTime>],
    now: DateTime<Local>,
) -> Option<(String, DateTime<Local>)> {
    entries
        .iter()
        .filter_map(|e| test_start(e, period_starts).map(|start| (e.date.clone(), start)))
        .filter(|(_, start)| *start >= now)
        .min_by_key(|(_, start)| *start)
}

pub fn countdown(
    entries: &[ScheduleEntry],
    period_starts: &[Option<NaiveTime>],
    now: DateTime<Local>,
) -> Countdown {
    let Some((_, start)) = next_test_start(entries, period_starts, now) else {
        let started_today = entries
            .iter()
            .filter_map(|e| test_start(e, period_starts))
            .any(|start| start.date_naive() == now.date_naive() && start < now);
        return if started_today {
            Countdown::Underway
        } else {
            Countdown::Hidden
        };
    };

    let diff = start - now;
    let days = diff.num_days();
    if days < 3 {
        let millis = diff.num_milliseconds();
        Countdown::Precise {
            hours: diff.num_hours(),
            minutes: diff.num_minutes() % 60,
            seconds: diff.num_seconds() % 60,
            centis: (millis % 1000) / 10,
        }
    } else if days <= 7 {
        Countdown::Days(days + 1)
    } else {
        Countdown::Hidden
    }
}
