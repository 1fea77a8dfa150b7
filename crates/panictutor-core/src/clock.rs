//! Wall-clock access.
//!
//! Compliance is scoped to the local calendar day, so every "now" and
//! "today" decision is routed through a [`Clock`] that tests can pin.

use std::sync::Mutex;

use chrono::{DateTime, Duration, Local, NaiveDate};

pub trait Clock: Send + Sync {
    fn now(&self) -> DateTime<Local>;

    /// The current local calendar day.
    fn today(&self) -> NaiveDate {
        self.now().date_naive()
    }
}

/// The host's local clock.
#[derive(Debug, Default, Clone, Copy)]
pub struct SystemClock;

impl Clock for SystemClock {
    fn now(&self) -> DateTime<Local> {
        Local::now()
    }
}

/// A clock that only moves when told to.
#[derive(Debug)]
pub struct FixedClock {
    now: Mutex<DateTime<Local>>,
}

impl FixedClock {
    pub fn new(now: DateTime<Local>) -> Self {
        Self {
            now: Mutex::new(now),
        }
    }

    /// Pin the clock to local noon of `day`.
    ///
    /// Noon keeps day arithmetic clear of DST transitions.
    pub fn at_noon(day: NaiveDate) -> Self {
        Self::new(local_noon(day))
    }

    pub fn set(&self, now: DateTime<Local>) {
        if let Ok(mut guard) = self.now.lock() {
            *guard = now;
        }
    }

    pub fn advance(&self, by: Duration) {
        if let Ok(mut guard) = self.now.lock() {
            *guard += by;
        }
    }
}

impl Clock for FixedClock {
    fn now(&self) -> DateTime<Local> {
        match self.now.lock() {
            Ok(guard) => *guard,
            Err(poisoned) => *poisoned.into_inner(),
        }
    }
}

/// Local noon of `day`, falling back to the earliest valid local time.
pub fn local_noon(day: NaiveDate) -> DateTime<Local> {
    let naive = day.and_hms_opt(12, 0, 0).unwrap_or_default();
    naive
        .and_local_timezone(Local)
        .earliest()
        .unwrap_or_else(|| DateTime::from_naive_utc_and_offset(naive, *Local::now().offset()))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn fixed_clock_advances_across_days() {
        let day = NaiveDate::from_ymd_opt(2026, 10, 16).unwrap();
        let clock = FixedClock::at_noon(day);
        assert_eq!(clock.today(), day);

        clock.advance(Duration::days(1));
        assert_eq!(clock.today(), day.succ_opt().unwrap());
    }
}
